use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::error::AppError;
use crate::utils::is_valid_mobile;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Appointment {
    pub appointment_id: i32,
    pub user_id: i32,
    pub property_id: i32,
    pub time: NaiveTime,
    pub date: NaiveDate,
    pub mobile: String,
    pub address: String,
}

#[derive(Debug, Deserialize)]
pub struct AppointmentQuery {
    pub user_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct AppointmentRequest {
    pub user_id: i32,
    pub property_id: i32,
    pub time: NaiveTime,
    pub date: NaiveDate,
    pub mobile: String,
    pub address: String,
}

impl AppointmentRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if !is_valid_mobile(&self.mobile) {
            return Err(AppError::Validation("Invalid Mobile number format".into()));
        }
        if self.address.trim().is_empty() {
            return Err(AppError::Validation("address is required".into()));
        }
        Ok(())
    }
}

impl Appointment {
    pub async fn create(pool: &PgPool, req: &AppointmentRequest) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Appointment>(
            r#"
            INSERT INTO appointments (user_id, property_id, "time", "date", mobile, address)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING appointment_id, user_id, property_id, "time", "date", mobile, address
            "#,
        )
        .bind(req.user_id)
        .bind(req.property_id)
        .bind(req.time)
        .bind(req.date)
        .bind(&req.mobile)
        .bind(&req.address)
        .fetch_one(pool)
        .await
    }

    /// All appointments, or only those booked by `user_id`.
    pub async fn find(pool: &PgPool, user_id: Option<i32>) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Appointment>(
            r#"
            SELECT appointment_id, user_id, property_id, "time", "date", mobile, address
            FROM appointments
            WHERE $1::INT4 IS NULL OR user_id = $1
            ORDER BY "date", "time", appointment_id
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        appointment_id: i32,
        req: &AppointmentRequest,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Appointment>(
            r#"
            UPDATE appointments
            SET user_id = $1, property_id = $2, "time" = $3, "date" = $4,
                mobile = $5, address = $6, updated_at = NOW()
            WHERE appointment_id = $7
            RETURNING appointment_id, user_id, property_id, "time", "date", mobile, address
            "#,
        )
        .bind(req.user_id)
        .bind(req.property_id)
        .bind(req.time)
        .bind(req.date)
        .bind(&req.mobile)
        .bind(&req.address)
        .bind(appointment_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, appointment_id: i32) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM appointments WHERE appointment_id = $1")
            .bind(appointment_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
