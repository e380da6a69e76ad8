use axum::Json;
use bcrypt::{DEFAULT_COST, hash};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    hash(password.as_bytes(), DEFAULT_COST)
}

/// Exactly 12 ASCII digits.
pub fn is_valid_aadhaar(aadhaar: &str) -> bool {
    aadhaar.len() == 12 && aadhaar.bytes().all(|b| b.is_ascii_digit())
}

/// Exactly 10 ASCII digits.
pub fn is_valid_mobile(mobile: &str) -> bool {
    mobile.len() == 10 && mobile.bytes().all(|b| b.is_ascii_digit())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i32,
    pub exp: i64,
    pub iat: i64,
}

/// HS256 bearer-token verifier. Yields the caller's user id or rejects the token.
pub struct Authenticator {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl Authenticator {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Claims>(token, &self.decoding, &self.validation).map(|data| data.claims)
    }

    /// Mints a token for `user_id`. Public so a login service or an operator
    /// tool built on this crate can hand out tokens the server accepts.
    pub fn issue(
        &self,
        user_id: i32,
        ttl: Duration,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = Claims {
            user_id,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resp_data: Option<T>,
}

pub fn success_to_api_response<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        code: error_codes::SUCCESS,
        msg: "success".into(),
        resp_data: Some(data),
    })
}

pub fn error_to_api_response<T>(code: i32, msg: String) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        code,
        msg,
        resp_data: None,
    })
}

pub mod error_codes {
    pub const SUCCESS: i32 = 0;
    pub const VALIDATION_ERROR: i32 = 1000;
    pub const CONFLICT: i32 = 1001;
    pub const AUTH_FAILED: i32 = 1002;
    pub const NOT_FOUND: i32 = 1004;
    pub const WRITE_BUSY: i32 = 1006;
    pub const INTERNAL_ERROR: i32 = 5000;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aadhaar_needs_twelve_digits() {
        assert!(is_valid_aadhaar("123456789012"));
        assert!(!is_valid_aadhaar("12345678901"));
        assert!(!is_valid_aadhaar("12345678901a"));
        assert!(!is_valid_aadhaar("１23456789012"));
    }

    #[test]
    fn mobile_needs_ten_digits() {
        assert!(is_valid_mobile("9876543210"));
        assert!(!is_valid_mobile("+919876543210"));
        assert!(!is_valid_mobile(""));
    }

    #[test]
    fn issued_token_verifies_with_same_secret_only() {
        let auth = Authenticator::new("s3cret");
        let token = auth.issue(42, Duration::hours(1)).unwrap();

        assert_eq!(auth.verify(&token).unwrap().user_id, 42);
        assert!(Authenticator::new("other").verify(&token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let auth = Authenticator::new("s3cret");
        let token = auth.issue(7, Duration::hours(-2)).unwrap();
        assert!(auth.verify(&token).is_err());
    }

    #[test]
    fn error_envelope_omits_data() {
        let Json(body) = error_to_api_response::<()>(error_codes::NOT_FOUND, "gone".into());
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({ "code": 1004, "msg": "gone" }));
    }
}
