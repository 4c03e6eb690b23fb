/**
 * Feedback Routes
 * Public feedback intake (optionally anonymous) plus admin CRUD.
 */
use axum::{
    extract::{Path, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::QueryBuilder;
use uuid::Uuid;

use crate::db::{
    self,
    models::{Feedback, FEEDBACK_STATUSES, FEEDBACK_TYPES},
};
use crate::email::notify;
use crate::routes::auth::verify_admin;
use crate::routes::{
    api_error, clamp_paging, DataResponse, ListResponse, MessageResponse, Pagination,
};

const FEEDBACK_COLUMNS: &str = "id, feedback_type, feedback, is_anonymous, name, email, phone, \
     resolution, admin_notes, status, submitted_at, last_updated";

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitFeedbackRequest {
    #[serde(default)]
    pub is_anonymous: bool,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub feedback_type: Option<String>,
    pub feedback: Option<String>,
    pub resolution: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFeedbackRequest {
    pub status: Option<String>,
    pub admin_notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackListQuery {
    #[serde(default = "crate::routes::default_page")]
    pub page: i64,
    #[serde(default = "crate::routes::default_limit")]
    pub limit: i64,
    pub status: Option<String>,
    pub feedback_type: Option<String>,
}

/// Submission response data: only the new record's id is echoed back.
#[derive(Debug, Serialize)]
pub struct FeedbackSubmissionData {
    pub id: Uuid,
}

// ============================================================================
// Validation / scrubbing
// ============================================================================

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |s| s.trim().is_empty())
}

fn missing_required(payload: &SubmitFeedbackRequest) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if is_blank(&payload.feedback_type) {
        missing.push("feedbackType");
    }
    if is_blank(&payload.feedback) {
        missing.push("feedback");
    }
    missing
}

/// Derive the identity columns from the anonymity flag. The client's values
/// are not trusted: an anonymous submission is scrubbed here regardless of
/// what was sent.
pub fn scrubbed_identity(
    is_anonymous: bool,
    name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
) -> (String, String, String) {
    if is_anonymous {
        ("Anonymous".to_string(), String::new(), String::new())
    } else {
        (
            name.unwrap_or_default().trim().to_string(),
            email.unwrap_or_default().trim().to_string(),
            phone.unwrap_or_default().trim().to_string(),
        )
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/feedback - Public feedback submission.
pub async fn submit_feedback(Json(payload): Json<SubmitFeedbackRequest>) -> impl IntoResponse {
    let missing = missing_required(&payload);
    if !missing.is_empty() {
        return api_error(
            StatusCode::BAD_REQUEST,
            format!("Missing required fields: {}", missing.join(", ")),
        )
        .into_response();
    }

    let feedback_type = payload.feedback_type.as_deref().unwrap_or_default();
    if !FEEDBACK_TYPES.contains(&feedback_type) {
        return api_error(
            StatusCode::BAD_REQUEST,
            format!(
                "Invalid feedbackType: must be one of {}",
                FEEDBACK_TYPES.join(", ")
            ),
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

    let (name, email, phone) = scrubbed_identity(
        payload.is_anonymous,
        payload.name,
        payload.email,
        payload.phone,
    );

    let query = format!(
        "INSERT INTO feedback \
             (feedback_type, feedback, is_anonymous, name, email, phone, resolution) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING {}",
        FEEDBACK_COLUMNS
    );
    match sqlx::query_as::<_, Feedback>(&query)
        .bind(feedback_type)
        .bind(payload.feedback.as_deref().unwrap_or_default())
        .bind(payload.is_anonymous)
        .bind(&name)
        .bind(&email)
        .bind(&phone)
        .bind(&payload.resolution)
        .fetch_one(pool.as_ref())
        .await
    {
        Ok(feedback) => {
            tracing::info!(
                feedback_id = %feedback.id,
                feedback_type = %feedback.feedback_type,
                anonymous = feedback.is_anonymous,
                "feedback submitted"
            );
            let id = feedback.id;
            notify::spawn_feedback_notifications(feedback);
            (
                StatusCode::CREATED,
                Json(DataResponse {
                    success: true,
                    data: FeedbackSubmissionData { id },
                    message: Some("Thank you for your feedback.".to_string()),
                }),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!("Database error saving feedback: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// GET /api/admin/feedback - Paginated list with status/type filters.
pub async fn list_feedback(
    headers: HeaderMap,
    Query(query): Query<FeedbackListQuery>,
) -> impl IntoResponse {
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

    let (page, limit, offset) = clamp_paging(query.page, query.limit);

    let mut select = QueryBuilder::new(format!(
        "SELECT {} FROM feedback WHERE 1=1",
        FEEDBACK_COLUMNS
    ));
    let mut count = QueryBuilder::new("SELECT COUNT(*) FROM feedback WHERE 1=1");
    for qb in [&mut select, &mut count] {
        if let Some(status) = &query.status {
            qb.push(" AND status = ").push_bind(status.clone());
        }
        if let Some(feedback_type) = &query.feedback_type {
            qb.push(" AND feedback_type = ").push_bind(feedback_type.clone());
        }
    }
    select
        .push(" ORDER BY submitted_at DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    let rows = select
        .build_query_as::<Feedback>()
        .fetch_all(pool.as_ref())
        .await;
    let total = count
        .build_query_as::<(i64,)>()
        .fetch_one(pool.as_ref())
        .await;

    match (rows, total) {
        (Ok(rows), Ok((total,))) => (
            StatusCode::OK,
            Json(ListResponse {
                success: true,
                data: rows,
                pagination: Pagination::new(page, limit, total),
            }),
        )
            .into_response(),
        (Err(e), _) | (_, Err(e)) => {
            tracing::error!("Database error listing feedback: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// PATCH /api/admin/feedback/{id} - Admin edit of status and notes.
pub async fn update_feedback(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateFeedbackRequest>,
) -> impl IntoResponse {
    if let Err(err) = verify_admin(&headers) {
        return err.into_response();
    }

    if let Some(status) = &payload.status {
        if !FEEDBACK_STATUSES.contains(&status.as_str()) {
            return api_error(
                StatusCode::BAD_REQUEST,
                format!(
                    "Invalid status: must be one of {}",
                    FEEDBACK_STATUSES.join(", ")
                ),
            )
            .into_response();
        }
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return api_error(StatusCode::SERVICE_UNAVAILABLE, "Database not available")
                .into_response();
        }
    };

    let query = format!(
        "UPDATE feedback \
         SET status = COALESCE($1, status), \
             admin_notes = COALESCE($2, admin_notes), \
             last_updated = now() \
         WHERE id = $3 \
         RETURNING {}",
        FEEDBACK_COLUMNS
    );
    match sqlx::query_as::<_, Feedback>(&query)
        .bind(&payload.status)
        .bind(&payload.admin_notes)
        .bind(id)
        .fetch_optional(pool.as_ref())
        .await
    {
        Ok(Some(feedback)) => (
            StatusCode::OK,
            Json(DataResponse {
                success: true,
                data: feedback,
                message: Some("Feedback updated".to_string()),
            }),
        )
            .into_response(),
        Ok(None) => api_error(StatusCode::NOT_FOUND, "Feedback not found").into_response(),
        Err(e) => {
            tracing::error!("Database error updating feedback: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// DELETE /api/admin/feedback/{id}
pub async fn delete_feedback(headers: HeaderMap, Path(id): Path<Uuid>) -> impl IntoResponse {
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

    match sqlx::query("DELETE FROM feedback WHERE id = $1")
        .bind(id)
        .execute(pool.as_ref())
        .await
    {
        Ok(result) if result.rows_affected() == 0 => {
            api_error(StatusCode::NOT_FOUND, "Feedback not found").into_response()
        }
        Ok(_) => {
            tracing::info!(feedback_id = %id, "feedback deleted");
            (
                StatusCode::OK,
                Json(MessageResponse {
                    success: true,
                    message: "Feedback deleted".to_string(),
                }),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!("Database error deleting feedback: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::post;
    use axum::Router;
    use tower::ServiceExt;

    #[test]
    fn test_anonymous_submission_scrubs_identity() {
        let (name, email, phone) = scrubbed_identity(
            true,
            Some("Jane Doe".to_string()),
            Some("jane@example.com".to_string()),
            Some("+49 151 0000000".to_string()),
        );
        assert_eq!(name, "Anonymous");
        assert_eq!(email, "");
        assert_eq!(phone, "");
    }

    #[test]
    fn test_named_submission_keeps_identity() {
        let (name, email, phone) = scrubbed_identity(
            false,
            Some(" Jane ".to_string()),
            Some("jane@example.com".to_string()),
            None,
        );
        assert_eq!(name, "Jane");
        assert_eq!(email, "jane@example.com");
        assert_eq!(phone, "");
    }

    #[test]
    fn test_missing_required_names_wire_fields() {
        let payload = SubmitFeedbackRequest {
            is_anonymous: false,
            name: None,
            email: None,
            phone: None,
            feedback_type: None,
            feedback: Some("".to_string()),
            resolution: None,
        };
        assert_eq!(missing_required(&payload), vec!["feedbackType", "feedback"]);
    }

    #[tokio::test]
    async fn test_submission_missing_fields_returns_400() {
        let app = Router::new().route("/api/feedback", post(submit_feedback));
        let req = Request::post("/api/feedback")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"isAnonymous": true}"#))
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            body["error"],
            "Missing required fields: feedbackType, feedback"
        );
    }

    #[tokio::test]
    async fn test_unknown_feedback_type_rejected_at_intake() {
        let app = Router::new().route("/api/feedback", post(submit_feedback));
        let req = Request::post("/api/feedback")
            .header("content-type", "application/json")
            .body(Body::from(
                r#"{"feedbackType": "rant", "feedback": "hello"}"#,
            ))
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
