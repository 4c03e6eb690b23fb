/**
 * Admin Authentication Guard
 * Single bearer-token pass/fail check for admin-mutating endpoints.
 */
use axum::{
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::routes::{api_error, ErrorResponse};

/// JWT claims carried by admin tokens.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
}

fn jwt_secret() -> Option<String> {
    std::env::var("JWT_SECRET").ok().filter(|s| !s.is_empty())
}

/// Verify the `Authorization: Bearer <token>` header against the shared
/// secret. Must run before any persistence or upload work. Binary pass/fail:
/// no scopes, no refresh.
pub fn verify_admin(headers: &HeaderMap) -> Result<(), (StatusCode, Json<ErrorResponse>)> {
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    let token = match token {
        Some(t) => t,
        None => {
            return Err(api_error(
                StatusCode::UNAUTHORIZED,
                "Authorization required",
            ));
        }
    };

    let secret = match jwt_secret() {
        Some(s) => s,
        None => {
            tracing::error!("JWT_SECRET is not configured; rejecting admin request");
            return Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Server authentication is not configured",
            ));
        }
    };

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| api_error(StatusCode::UNAUTHORIZED, "Invalid or expired token"))?;

    Ok(())
}

/// Issue an admin token. Used by the operator tooling and by tests; there is
/// no login endpoint in this service.
pub fn issue_token(subject: &str, ttl_hours: i64) -> Result<String, jsonwebtoken::errors::Error> {
    let secret = jwt_secret().ok_or_else(|| {
        jsonwebtoken::errors::Error::from(jsonwebtoken::errors::ErrorKind::InvalidKeyFormat)
    })?;
    let now = Utc::now();
    let claims = Claims {
        sub: subject.to_string(),
        exp: (now + Duration::hours(ttl_hours)).timestamp(),
        iat: now.timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    // Tests run in parallel; every caller sets the same value and nothing
    // unsets it, so there is no env race between them.
    fn with_secret<T>(f: impl FnOnce() -> T) -> T {
        std::env::set_var("JWT_SECRET", "test-secret");
        f()
    }

    #[test]
    fn test_missing_header_is_unauthorized() {
        let headers = HeaderMap::new();
        let err = verify_admin(&headers).unwrap_err();
        assert_eq!(err.0, StatusCode::UNAUTHORIZED);
        assert_eq!(err.1.error, "Authorization required");
    }

    #[test]
    fn test_garbage_token_is_unauthorized() {
        with_secret(|| {
            let mut headers = HeaderMap::new();
            headers.insert("authorization", "Bearer not.a.jwt".parse().unwrap());
            let err = verify_admin(&headers).unwrap_err();
            assert_eq!(err.0, StatusCode::UNAUTHORIZED);
        });
    }

    #[test]
    fn test_issued_token_passes_guard() {
        with_secret(|| {
            let token = issue_token("admin", 1).unwrap();
            let mut headers = HeaderMap::new();
            headers.insert(
                "authorization",
                format!("Bearer {}", token).parse().unwrap(),
            );
            assert!(verify_admin(&headers).is_ok());
        });
    }

    #[test]
    fn test_expired_token_is_rejected() {
        with_secret(|| {
            let token = issue_token("admin", -1).unwrap();
            let mut headers = HeaderMap::new();
            headers.insert(
                "authorization",
                format!("Bearer {}", token).parse().unwrap(),
            );
            assert!(verify_admin(&headers).is_err());
        });
    }
}
