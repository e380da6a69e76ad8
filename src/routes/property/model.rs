use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Property {
    pub property_id: i32,
    pub user_id: i32,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: String,
    pub p_address: String,
    pub prize: f64,
    pub map_link: Option<String>,
    pub created_at: NaiveDateTime,
}

/// A property joined with its owner, as served by the listing.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PropertyListing {
    #[sqlx(flatten)]
    pub property: Property,
    pub user_name: String,
    pub user_email: String,
}

#[derive(Debug, Deserialize)]
pub struct PropertyRequest {
    pub user_id: i32,
    #[serde(rename = "type")]
    pub kind: String,
    pub p_address: String,
    pub prize: f64,
    pub map_link: Option<String>,
}

impl PropertyRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.kind.trim().is_empty() || self.p_address.trim().is_empty() {
            return Err(AppError::Validation(
                "type and p_address are required".into(),
            ));
        }
        // NUMERIC(12,2) upper bound
        if !self.prize.is_finite() || self.prize < 0.0 || self.prize >= 1e10 {
            return Err(AppError::Validation(format!(
                "prize out of range: {}",
                self.prize
            )));
        }
        Ok(())
    }
}

// prize is NUMERIC(12,2); it is read back as FLOAT8 to match the JSON model.
impl Property {
    pub async fn create(pool: &PgPool, req: &PropertyRequest) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Property>(
            r#"
            INSERT INTO properties (user_id, type, p_address, prize, map_link)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING property_id, user_id, type, p_address, prize::FLOAT8 AS prize,
                      map_link, created_at
            "#,
        )
        .bind(req.user_id)
        .bind(&req.kind)
        .bind(&req.p_address)
        .bind(req.prize)
        .bind(&req.map_link)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_owner(pool: &PgPool, user_id: i32) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Property>(
            r#"
            SELECT property_id, user_id, type, p_address, prize::FLOAT8 AS prize,
                   map_link, created_at
            FROM properties
            WHERE user_id = $1
            ORDER BY property_id
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        property_id: i32,
        req: &PropertyRequest,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Property>(
            r#"
            UPDATE properties
            SET user_id = $1, type = $2, p_address = $3, prize = $4, map_link = $5,
                updated_at = NOW()
            WHERE property_id = $6
            RETURNING property_id, user_id, type, p_address, prize::FLOAT8 AS prize,
                      map_link, created_at
            "#,
        )
        .bind(req.user_id)
        .bind(&req.kind)
        .bind(&req.p_address)
        .bind(req.prize)
        .bind(&req.map_link)
        .bind(property_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, property_id: i32) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM properties WHERE property_id = $1")
            .bind(property_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

impl PropertyListing {
    /// The expensive aggregate read sitting behind the cache.
    pub async fn find_all(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, PropertyListing>(
            r#"
            SELECT p.property_id, p.user_id, p.type, p.p_address, p.prize::FLOAT8 AS prize,
                   p.map_link, p.created_at,
                   u.name AS user_name, u.email AS user_email
            FROM properties p
            JOIN users u ON p.user_id = u.user_id
            ORDER BY p.property_id
            "#,
        )
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> PropertyRequest {
        PropertyRequest {
            user_id: 1,
            kind: "Apartment".into(),
            p_address: "12 MG Road".into(),
            prize: 4_500_000.0,
            map_link: None,
        }
    }

    #[test]
    fn request_accepts_type_field_name() {
        let req: PropertyRequest = serde_json::from_value(serde_json::json!({
            "user_id": 2,
            "type": "Villa",
            "p_address": "Lake View",
            "prize": 12.5
        }))
        .unwrap();
        assert_eq!(req.kind, "Villa");
        assert!(req.map_link.is_none());
    }

    #[test]
    fn prize_must_be_a_finite_non_negative_amount() {
        assert!(request().validate().is_ok());
        for prize in [-1.0, f64::NAN, f64::INFINITY, 1e10] {
            let req = PropertyRequest { prize, ..request() };
            assert!(req.validate().is_err(), "prize {prize} accepted");
        }
    }

    #[test]
    fn blank_address_is_rejected() {
        let req = PropertyRequest {
            p_address: "  ".into(),
            ..request()
        };
        assert!(matches!(req.validate(), Err(AppError::Validation(_))));
    }
}
