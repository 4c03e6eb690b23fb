/**
 * SMTP Settings Routes
 * Admin management of the outbound mail configuration. The table holds a
 * single logical row; PUT updates it in place or creates it on first use.
 * Passwords never serialize into responses.
 */
use axum::{
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::db::{self, models::SmtpSettings};
use crate::routes::auth::verify_admin;
use crate::routes::{api_error, DataResponse};

const SMTP_COLUMNS: &str = "id, host, port, username, password, from_email, from_name, \
     admin_email, is_active, updated_at";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmtpSettingsRequest {
    pub host: Option<String>,
    pub port: Option<i32>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_email: Option<String>,
    pub from_name: Option<String>,
    pub admin_email: Option<String>,
    pub is_active: Option<bool>,
}

fn missing_required(req: &SmtpSettingsRequest) -> Vec<&'static str> {
    let mut missing = Vec::new();
    let blank = |v: &Option<String>| v.as_deref().map(str::trim).unwrap_or("").is_empty();
    if blank(&req.host) {
        missing.push("host");
    }
    if blank(&req.username) {
        missing.push("username");
    }
    if blank(&req.password) {
        missing.push("password");
    }
    if blank(&req.from_email) {
        missing.push("fromEmail");
    }
    if blank(&req.admin_email) {
        missing.push("adminEmail");
    }
    missing
}

/// GET /api/admin/smtp - Current settings (password omitted from the JSON).
pub async fn get_settings(headers: HeaderMap) -> impl IntoResponse {
    if let Err(err) = verify_admin(&headers) {
        return err.into_response();
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return api_error(StatusCode::SERVICE_UNAVAILABLE, "Database not available")
                .into_response();
        }
    };

    let query = format!(
        "SELECT {} FROM smtp_settings ORDER BY updated_at DESC LIMIT 1",
        SMTP_COLUMNS
    );
    match sqlx::query_as::<_, SmtpSettings>(&query)
        .fetch_optional(pool.as_ref())
        .await
    {
        Ok(Some(settings)) => (
            StatusCode::OK,
            Json(DataResponse {
                success: true,
                data: settings,
                message: None,
            }),
        )
            .into_response(),
        Ok(None) => api_error(StatusCode::NOT_FOUND, "SMTP settings not configured").into_response(),
        Err(e) => {
            tracing::error!("Database error fetching SMTP settings: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// PUT /api/admin/smtp - Replace the settings row, creating it if absent.
pub async fn put_settings(
    headers: HeaderMap,
    Json(payload): Json<SmtpSettingsRequest>,
) -> impl IntoResponse {
    if let Err(err) = verify_admin(&headers) {
        return err.into_response();
    }

    let missing = missing_required(&payload);
    if !missing.is_empty() {
        return api_error(
            StatusCode::BAD_REQUEST,
            format!("Missing required fields: {}", missing.join(", ")),
        )
        .into_response();
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return api_error(StatusCode::SERVICE_UNAVAILABLE, "Database not available")
                .into_response();
        }
    };

    let host = payload.host.unwrap_or_default().trim().to_string();
    let port = payload.port.unwrap_or(587);
    let username = payload.username.unwrap_or_default().trim().to_string();
    let password = payload.password.unwrap_or_default();
    let from_email = payload.from_email.unwrap_or_default().trim().to_string();
    let from_name = payload.from_name.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    let admin_email = payload.admin_email.unwrap_or_default().trim().to_string();
    let is_active = payload.is_active.unwrap_or(true);

    let existing_id: Option<Uuid> =
        match sqlx::query_as::<_, (Uuid,)>("SELECT id FROM smtp_settings ORDER BY updated_at DESC LIMIT 1")
            .fetch_optional(pool.as_ref())
            .await
        {
            Ok(row) => row.map(|(id,)| id),
            Err(e) => {
                tracing::error!("Database error fetching SMTP settings: {}", e);
                return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
                    .into_response();
            }
        };

    let result = if let Some(id) = existing_id {
        let query = format!(
            "UPDATE smtp_settings \
             SET host = $1, port = $2, username = $3, password = $4, from_email = $5, \
                 from_name = $6, admin_email = $7, is_active = $8, updated_at = now() \
             WHERE id = $9 \
             RETURNING {}",
            SMTP_COLUMNS
        );
        sqlx::query_as::<_, SmtpSettings>(&query)
            .bind(&host)
            .bind(port)
            .bind(&username)
            .bind(&password)
            .bind(&from_email)
            .bind(&from_name)
            .bind(&admin_email)
            .bind(is_active)
            .bind(id)
            .fetch_one(pool.as_ref())
            .await
    } else {
        let query = format!(
            "INSERT INTO smtp_settings \
                 (host, port, username, password, from_email, from_name, admin_email, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {}",
            SMTP_COLUMNS
        );
        sqlx::query_as::<_, SmtpSettings>(&query)
            .bind(&host)
            .bind(port)
            .bind(&username)
            .bind(&password)
            .bind(&from_email)
            .bind(&from_name)
            .bind(&admin_email)
            .bind(is_active)
            .fetch_one(pool.as_ref())
            .await
    };

    match result {
        Ok(settings) => (
            StatusCode::OK,
            Json(DataResponse {
                success: true,
                data: settings,
                message: Some("SMTP settings saved".to_string()),
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database error saving SMTP settings: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::routing::put;
    use axum::Router;
    use tower::ServiceExt;

    #[test]
    fn test_missing_required_lists_wire_names() {
        let req = SmtpSettingsRequest {
            host: Some("smtp.example.com".into()),
            port: None,
            username: None,
            password: Some("  ".into()),
            from_email: Some("noreply@example.com".into()),
            from_name: None,
            admin_email: None,
            is_active: None,
        };
        assert_eq!(missing_required(&req), vec!["username", "password", "adminEmail"]);
    }

    #[tokio::test]
    async fn test_put_requires_bearer() {
        let app = Router::new().route("/api/admin/smtp", put(put_settings));
        let req = axum::http::Request::put("/api/admin/smtp")
            .header("content-type", "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
}
