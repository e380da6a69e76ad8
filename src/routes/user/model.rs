use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::error::AppError;
use crate::routes::property::Property;
use crate::utils::{hash_password, is_valid_aadhaar, is_valid_mobile};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub user_id: i32,
    pub name: String,
    pub email: String,
    pub mobile: String,
    pub aadhaar: i64,
    pub u_address: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Serialize)]
pub struct UserWithProperties {
    #[serde(flatten)]
    pub user: User,
    pub properties: Vec<Property>,
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub mobile: String,
    pub password: String,
    pub aadhaar: i64,
    pub u_address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub name: String,
    pub email: String,
    pub mobile: String,
    pub aadhaar: i64,
    pub u_address: Option<String>,
    /// Left unchanged when absent.
    pub password: Option<String>,
}

fn validate_identity(name: &str, email: &str, mobile: &str, aadhaar: i64) -> Result<(), AppError> {
    if name.trim().is_empty() {
        return Err(AppError::Validation("name is required".into()));
    }
    if !email.contains('@') {
        return Err(AppError::Validation("invalid email address".into()));
    }
    if !is_valid_aadhaar(&aadhaar.to_string()) || !is_valid_mobile(mobile) {
        return Err(AppError::Validation(
            "Invalid Aadhaar or Mobile number format".into(),
        ));
    }
    Ok(())
}

impl CreateUserRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_identity(&self.name, &self.email, &self.mobile, self.aadhaar)?;
        if self.password.len() < 6 {
            return Err(AppError::Validation(
                "password must be at least 6 characters".into(),
            ));
        }
        Ok(())
    }
}

impl UpdateUserRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_identity(&self.name, &self.email, &self.mobile, self.aadhaar)?;
        if self.password.as_ref().is_some_and(|p| p.len() < 6) {
            return Err(AppError::Validation(
                "password must be at least 6 characters".into(),
            ));
        }
        Ok(())
    }
}

/// Hashes a plaintext password off the async executor.
pub async fn hash_password_blocking(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AppError::Internal(format!("password hashing task failed: {}", e)))?
        .map_err(|e| AppError::Internal(format!("failed to hash password: {}", e)))
}

impl User {
    pub async fn create(
        pool: &PgPool,
        req: &CreateUserRequest,
        password_hash: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, mobile, password, aadhaar, u_address)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING user_id, name, email, mobile, aadhaar, u_address, created_at
            "#,
        )
        .bind(&req.name)
        .bind(&req.email)
        .bind(&req.mobile)
        .bind(password_hash)
        .bind(req.aadhaar)
        .bind(&req.u_address)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, user_id: i32) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT user_id, name, email, mobile, aadhaar, u_address, created_at
            FROM users
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// Returns `None` when no row has `user_id`.
    pub async fn update(
        pool: &PgPool,
        user_id: i32,
        req: &UpdateUserRequest,
        password_hash: Option<&str>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET name = $1, email = $2, mobile = $3, aadhaar = $4, u_address = $5,
                password = COALESCE($6, password), updated_at = NOW()
            WHERE user_id = $7
            RETURNING user_id, name, email, mobile, aadhaar, u_address, created_at
            "#,
        )
        .bind(&req.name)
        .bind(&req.email)
        .bind(&req.mobile)
        .bind(req.aadhaar)
        .bind(&req.u_address)
        .bind(password_hash)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// Returns the number of rows removed (0 or 1).
    pub async fn delete(pool: &PgPool, user_id: i32) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE user_id = $1")
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
