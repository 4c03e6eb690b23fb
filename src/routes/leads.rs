/**
 * Lead Routes
 * Public contact-form intake plus admin CRUD over sales enquiries.
 */
use axum::{
    extract::{Path, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use sqlx::QueryBuilder;
use uuid::Uuid;

use crate::db::{
    self,
    models::{Lead, LEAD_PRIORITIES, LEAD_SOURCES, LEAD_STATUSES},
};
use crate::email::notify;
use crate::routes::auth::verify_admin;
use crate::routes::{
    api_error, clamp_paging, DataResponse, ListResponse, MessageResponse, Pagination,
};

const LEAD_COLUMNS: &str = "id, first_name, last_name, email, phone, subject, message, notes, \
     estimated_cost, review_link, status, priority, source, submitted_at, last_updated";

// ============================================================================
// Request types
// ============================================================================

/// Body for POST /api/leads and POST /api/admin/leads. Required fields are
/// optional here so validation can report every missing one by name instead
/// of failing deserialization.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitLeadRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub subject: Option<String>,
    pub message: Option<String>,
    pub notes: Option<String>,
    pub estimated_cost: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub source: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLeadRequest {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub source: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub estimated_cost: Option<String>,
    pub review_link: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LeadListQuery {
    #[serde(default = "crate::routes::default_page")]
    pub page: i64,
    #[serde(default = "crate::routes::default_limit")]
    pub limit: i64,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub source: Option<String>,
}

// ============================================================================
// Validation
// ============================================================================

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |s| s.trim().is_empty())
}

/// Collect the wire names of every missing required field.
fn missing_required(payload: &SubmitLeadRequest) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if is_blank(&payload.first_name) {
        missing.push("firstName");
    }
    if is_blank(&payload.last_name) {
        missing.push("lastName");
    }
    if is_blank(&payload.email) {
        missing.push("email");
    }
    if is_blank(&payload.subject) {
        missing.push("subject");
    }
    if is_blank(&payload.message) {
        missing.push("message");
    }
    missing
}

fn validate_enum(
    value: &Option<String>,
    allowed: &[&str],
    field: &str,
) -> Result<(), (StatusCode, Json<crate::routes::ErrorResponse>)> {
    if let Some(v) = value {
        if !allowed.contains(&v.as_str()) {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                format!("Invalid {}: must be one of {}", field, allowed.join(", ")),
            ));
        }
    }
    Ok(())
}

// ============================================================================
// Persistence
// ============================================================================

async fn insert_lead(
    pool: &sqlx::PgPool,
    payload: &SubmitLeadRequest,
) -> Result<Lead, sqlx::Error> {
    let query = format!(
        "INSERT INTO leads \
             (first_name, last_name, email, phone, subject, message, notes, \
              estimated_cost, status, priority, source) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
         RETURNING {}",
        LEAD_COLUMNS
    );
    sqlx::query_as::<_, Lead>(&query)
        .bind(payload.first_name.as_deref().unwrap_or_default().trim())
        .bind(payload.last_name.as_deref().unwrap_or_default().trim())
        .bind(payload.email.as_deref().unwrap_or_default().trim())
        .bind(&payload.phone)
        .bind(payload.subject.as_deref().unwrap_or_default().trim())
        .bind(payload.message.as_deref().unwrap_or_default())
        .bind(&payload.notes)
        .bind(&payload.estimated_cost)
        .bind(payload.status.as_deref().unwrap_or("new"))
        .bind(payload.priority.as_deref().unwrap_or("medium"))
        .bind(payload.source.as_deref().unwrap_or("website"))
        .fetch_one(pool)
        .await
}

fn validate_submission(
    payload: &SubmitLeadRequest,
) -> Result<(), (StatusCode, Json<crate::routes::ErrorResponse>)> {
    let missing = missing_required(payload);
    if !missing.is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("Missing required fields: {}", missing.join(", ")),
        ));
    }
    validate_enum(&payload.status, LEAD_STATUSES, "status")?;
    validate_enum(&payload.priority, LEAD_PRIORITIES, "priority")?;
    validate_enum(&payload.source, LEAD_SOURCES, "source")?;
    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/leads - Public contact-form submission.
///
/// The success response is produced as soon as the record is persisted;
/// notification emails run in a spawned task and can never block or fail it.
pub async fn submit_lead(Json(payload): Json<SubmitLeadRequest>) -> impl IntoResponse {
    if let Err(err) = validate_submission(&payload) {
        return err.into_response();
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return api_error(StatusCode::SERVICE_UNAVAILABLE, "Database not available")
                .into_response();
        }
    };

    match insert_lead(pool.as_ref(), &payload).await {
        Ok(lead) => {
            tracing::info!(lead_id = %lead.id, source = %lead.source, "lead submitted");
            notify::spawn_lead_notifications(lead.clone());
            (
                StatusCode::CREATED,
                Json(DataResponse {
                    success: true,
                    data: lead,
                    message: Some(
                        "Thank you for your enquiry. We will be in touch shortly.".to_string(),
                    ),
                }),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!("Database error saving lead: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// POST /api/admin/leads - Manual admin entry (no notification emails).
pub async fn create_lead(
    headers: HeaderMap,
    Json(payload): Json<SubmitLeadRequest>,
) -> impl IntoResponse {
    if let Err(err) = verify_admin(&headers) {
        return err.into_response();
    }
    if let Err(err) = validate_submission(&payload) {
        return err.into_response();
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return api_error(StatusCode::SERVICE_UNAVAILABLE, "Database not available")
                .into_response();
        }
    };

    match insert_lead(pool.as_ref(), &payload).await {
        Ok(lead) => {
            tracing::info!(lead_id = %lead.id, "lead created by admin");
            (
                StatusCode::CREATED,
                Json(DataResponse {
                    success: true,
                    data: lead,
                    message: Some("Lead created".to_string()),
                }),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!("Database error creating lead: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// GET /api/admin/leads - Paginated list with status/priority/source filters.
pub async fn list_leads(
    headers: HeaderMap,
    Query(query): Query<LeadListQuery>,
) -> impl IntoResponse {
    if let Err(err) = verify_admin(&headers) {
        return err.into_response();
    }

    if let Err(err) = validate_enum(&query.status, LEAD_STATUSES, "status")
        .and_then(|_| validate_enum(&query.priority, LEAD_PRIORITIES, "priority"))
        .and_then(|_| validate_enum(&query.source, LEAD_SOURCES, "source"))
    {
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

    let mut select = QueryBuilder::new(format!("SELECT {} FROM leads WHERE 1=1", LEAD_COLUMNS));
    let mut count = QueryBuilder::new("SELECT COUNT(*) FROM leads WHERE 1=1");
    for qb in [&mut select, &mut count] {
        if let Some(status) = &query.status {
            qb.push(" AND status = ").push_bind(status.clone());
        }
        if let Some(priority) = &query.priority {
            qb.push(" AND priority = ").push_bind(priority.clone());
        }
        if let Some(source) = &query.source {
            qb.push(" AND source = ").push_bind(source.clone());
        }
    }
    select
        .push(" ORDER BY submitted_at DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    let leads = select
        .build_query_as::<Lead>()
        .fetch_all(pool.as_ref())
        .await;
    let total = count
        .build_query_as::<(i64,)>()
        .fetch_one(pool.as_ref())
        .await;

    match (leads, total) {
        (Ok(leads), Ok((total,))) => (
            StatusCode::OK,
            Json(ListResponse {
                success: true,
                data: leads,
                pagination: Pagination::new(page, limit, total),
            }),
        )
            .into_response(),
        (Err(e), _) | (_, Err(e)) => {
            tracing::error!("Database error listing leads: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// PATCH /api/admin/leads/{id} - Admin edit. Any status may follow any other;
/// there is no transition state machine.
pub async fn update_lead(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLeadRequest>,
) -> impl IntoResponse {
    if let Err(err) = verify_admin(&headers) {
        return err.into_response();
    }

    if let Err(err) = validate_enum(&payload.status, LEAD_STATUSES, "status")
        .and_then(|_| validate_enum(&payload.priority, LEAD_PRIORITIES, "priority"))
        .and_then(|_| validate_enum(&payload.source, LEAD_SOURCES, "source"))
    {
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
        "SELECT {} FROM leads WHERE id = $1",
        LEAD_COLUMNS
    );
    let existing = match sqlx::query_as::<_, Lead>(&query)
        .bind(id)
        .fetch_optional(pool.as_ref())
        .await
    {
        Ok(Some(lead)) => lead,
        Ok(None) => {
            return api_error(StatusCode::NOT_FOUND, "Lead not found").into_response();
        }
        Err(e) => {
            tracing::error!("Database error fetching lead: {}", e);
            return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    };

    let status = payload.status.unwrap_or(existing.status);
    let priority = payload.priority.unwrap_or(existing.priority);
    let source = payload.source.unwrap_or(existing.source);
    let phone = payload.phone.or(existing.phone);
    let notes = payload.notes.or(existing.notes);
    let estimated_cost = payload.estimated_cost.or(existing.estimated_cost);
    let review_link = payload.review_link.or(existing.review_link);

    let query = format!(
        "UPDATE leads \
         SET status = $1, priority = $2, source = $3, phone = $4, notes = $5, \
             estimated_cost = $6, review_link = $7, last_updated = now() \
         WHERE id = $8 \
         RETURNING {}",
        LEAD_COLUMNS
    );
    match sqlx::query_as::<_, Lead>(&query)
        .bind(&status)
        .bind(&priority)
        .bind(&source)
        .bind(&phone)
        .bind(&notes)
        .bind(&estimated_cost)
        .bind(&review_link)
        .bind(id)
        .fetch_one(pool.as_ref())
        .await
    {
        Ok(lead) => (
            StatusCode::OK,
            Json(DataResponse {
                success: true,
                data: lead,
                message: Some("Lead updated".to_string()),
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database error updating lead: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// DELETE /api/admin/leads/{id} - Hard delete; no tombstone is kept.
pub async fn delete_lead(headers: HeaderMap, Path(id): Path<Uuid>) -> impl IntoResponse {
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

    match sqlx::query("DELETE FROM leads WHERE id = $1")
        .bind(id)
        .execute(pool.as_ref())
        .await
    {
        Ok(result) if result.rows_affected() == 0 => {
            api_error(StatusCode::NOT_FOUND, "Lead not found").into_response()
        }
        Ok(_) => {
            tracing::info!(lead_id = %id, "lead deleted");
            (
                StatusCode::OK,
                Json(MessageResponse {
                    success: true,
                    message: "Lead deleted".to_string(),
                }),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!("Database error deleting lead: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::ErrorResponse;
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::{get, post};
    use axum::Router;
    use tower::ServiceExt;

    fn leads_router() -> Router {
        Router::new()
            .route("/api/leads", post(submit_lead))
            .route("/api/admin/leads", get(list_leads).post(create_lead))
    }

    async fn send_json(
        app: Router,
        method: &str,
        uri: &str,
        json: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&json).unwrap()))
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_missing_required_lists_every_field() {
        let payload = SubmitLeadRequest {
            first_name: Some("Jane".to_string()),
            last_name: None,
            email: Some("  ".to_string()),
            phone: None,
            subject: None,
            message: Some("hi".to_string()),
            notes: None,
            estimated_cost: None,
            status: None,
            priority: None,
            source: None,
        };
        assert_eq!(missing_required(&payload), vec!["lastName", "email", "subject"]);
    }

    #[tokio::test]
    async fn test_submission_missing_fields_returns_400_naming_them() {
        let (status, body) = send_json(
            leads_router(),
            "POST",
            "/api/leads",
            serde_json::json!({ "firstName": "Jane", "message": "hello" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let err: ErrorResponse = serde_json::from_value(body).unwrap();
        assert!(!err.success);
        assert_eq!(err.error, "Missing required fields: lastName, email, subject");
    }

    #[tokio::test]
    async fn test_submission_invalid_priority_rejected() {
        let (status, body) = send_json(
            leads_router(),
            "POST",
            "/api/leads",
            serde_json::json!({
                "firstName": "Jane",
                "lastName": "Doe",
                "email": "jane@example.com",
                "subject": "Quote",
                "message": "hello",
                "priority": "urgent"
            }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("priority"));
    }

    #[tokio::test]
    async fn test_admin_list_requires_bearer_before_touching_db() {
        // No pool is initialized in tests: a 401 (not 503) proves the guard
        // short-circuits ahead of any persistence work.
        let req = Request::builder()
            .method("GET")
            .uri("/api/admin/leads")
            .body(Body::empty())
            .unwrap();
        let res = leads_router().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_admin_create_requires_bearer() {
        let (status, body) = send_json(
            leads_router(),
            "POST",
            "/api/admin/leads",
            serde_json::json!({
                "firstName": "Jane",
                "lastName": "Doe",
                "email": "jane@example.com",
                "subject": "Quote",
                "message": "hello"
            }),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Authorization required");
    }
}
