/**
 * Testimonial Routes
 * Public read of active testimonials plus admin CRUD. Avatars go through the
 * CDN; the admin list read is intentionally open, mutations are guarded.
 */
use axum::{
    extract::{FromRequest, Multipart, Path, Query, Request},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use bytes::Bytes;
use serde::Deserialize;
use uuid::Uuid;

use crate::cdn;
use crate::db::{self, models::Testimonial};
use crate::routes::auth::verify_admin;
use crate::routes::forms::{is_multipart, CollectedForm};
use crate::routes::{
    api_error, clamp_paging, generate_slug, is_unique_violation, upload_error, DataResponse,
    ErrorResponse, ListResponse, MessageResponse, PageQuery, Pagination,
};

const TESTIMONIAL_COLUMNS: &str =
    "id, name, slug, role, quote, rating, avatar_url, active, created_at, updated_at";

const CDN_FOLDER: &str = "testimonials";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestimonialListQuery {
    #[serde(default = "crate::routes::default_page")]
    pub page: i64,
    #[serde(default = "crate::routes::default_limit")]
    pub limit: i64,
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestimonialRequest {
    pub name: Option<String>,
    pub role: Option<String>,
    pub quote: Option<String>,
    pub rating: Option<i32>,
    pub avatar: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Default)]
struct TestimonialForm {
    name: Option<String>,
    role: Option<String>,
    quote: Option<String>,
    rating: Option<i32>,
    active: Option<bool>,
    avatar_file: Option<Bytes>,
    existing_avatar: Option<String>,
}

impl TestimonialForm {
    fn from_json(payload: TestimonialRequest) -> Self {
        Self {
            name: payload.name,
            role: payload.role,
            quote: payload.quote,
            rating: payload.rating,
            active: payload.active,
            avatar_file: None,
            existing_avatar: payload.avatar,
        }
    }

    fn from_collected(form: CollectedForm) -> Self {
        Self {
            name: form.get("name"),
            role: form.get("role"),
            quote: form.get("quote"),
            rating: form.get_i32("rating"),
            active: form.get_bool("active"),
            avatar_file: form.image,
            existing_avatar: form.existing_image,
        }
    }
}

async fn read_testimonial_form(
    headers: &HeaderMap,
    req: Request,
) -> Result<TestimonialForm, (StatusCode, Json<ErrorResponse>)> {
    if is_multipart(headers) {
        let multipart = Multipart::from_request(req, &())
            .await
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("Invalid multipart data: {}", e)))?;
        let collected = CollectedForm::collect(multipart, "avatar")
            .await
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?;
        Ok(TestimonialForm::from_collected(collected))
    } else {
        let Json(payload) = Json::<TestimonialRequest>::from_request(req, &())
            .await
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("Invalid JSON body: {}", e)))?;
        Ok(TestimonialForm::from_json(payload))
    }
}

fn validate_rating(rating: i32) -> Result<(), (StatusCode, Json<ErrorResponse>)> {
    if (1..=5).contains(&rating) {
        Ok(())
    } else {
        Err(api_error(
            StatusCode::BAD_REQUEST,
            "rating must be between 1 and 5",
        ))
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/testimonials - Public list, active entries only.
pub async fn list_testimonials(Query(query): Query<PageQuery>) -> impl IntoResponse {
    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return api_error(StatusCode::SERVICE_UNAVAILABLE, "Database not available")
                .into_response();
        }
    };

    let (page, limit, offset) = clamp_paging(query.page, query.limit);

    let select = format!(
        "SELECT {} FROM testimonials WHERE active = true \
         ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        TESTIMONIAL_COLUMNS
    );
    let rows = sqlx::query_as::<_, Testimonial>(&select)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool.as_ref())
        .await;
    let total =
        sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM testimonials WHERE active = true")
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
            tracing::error!("Database error listing testimonials: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// GET /api/admin/testimonials - Admin list. Read-only and deliberately
/// unguarded; mutations below require the bearer token.
pub async fn admin_list_testimonials(
    Query(query): Query<TestimonialListQuery>,
) -> impl IntoResponse {
    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return api_error(StatusCode::SERVICE_UNAVAILABLE, "Database not available")
                .into_response();
        }
    };

    let (page, limit, offset) = clamp_paging(query.page, query.limit);

    let mut select = sqlx::QueryBuilder::new(format!(
        "SELECT {} FROM testimonials WHERE 1=1",
        TESTIMONIAL_COLUMNS
    ));
    let mut count = sqlx::QueryBuilder::new("SELECT COUNT(*) FROM testimonials WHERE 1=1");
    for qb in [&mut select, &mut count] {
        if let Some(active) = query.active {
            qb.push(" AND active = ").push_bind(active);
        }
    }
    select
        .push(" ORDER BY created_at DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    let rows = select
        .build_query_as::<Testimonial>()
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
            tracing::error!("Database error listing testimonials: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// POST /api/admin/testimonials
pub async fn create_testimonial(headers: HeaderMap, req: Request) -> impl IntoResponse {
    if let Err(err) = verify_admin(&headers) {
        return err.into_response();
    }

    let form = match read_testimonial_form(&headers, req).await {
        Ok(form) => form,
        Err(err) => return err.into_response(),
    };

    let mut missing = Vec::new();
    if form.name.is_none() {
        missing.push("name");
    }
    if form.quote.is_none() {
        missing.push("quote");
    }
    if !missing.is_empty() {
        return api_error(
            StatusCode::BAD_REQUEST,
            format!("Missing required fields: {}", missing.join(", ")),
        )
        .into_response();
    }
    let name = form.name.clone().unwrap_or_default();
    let quote = form.quote.clone().unwrap_or_default();

    let rating = form.rating.unwrap_or(5);
    if let Err(err) = validate_rating(rating) {
        return err.into_response();
    }

    let slug = generate_slug(&name);
    if slug.is_empty() {
        return api_error(
            StatusCode::BAD_REQUEST,
            "Name must contain at least one letter or digit",
        )
        .into_response();
    }

    let avatar_url = match cdn::resolve_image(
        form.avatar_file.clone(),
        form.existing_avatar.clone(),
        CDN_FOLDER,
        true,
    )
    .await
    {
        Ok(Some(url)) => url,
        Ok(None) => return upload_error(cdn::UploadError::MissingImage).into_response(),
        Err(e) => return upload_error(e).into_response(),
    };

    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return api_error(StatusCode::SERVICE_UNAVAILABLE, "Database not available")
                .into_response();
        }
    };

    let query = format!(
        "INSERT INTO testimonials (name, slug, role, quote, rating, avatar_url, active) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING {}",
        TESTIMONIAL_COLUMNS
    );
    match sqlx::query_as::<_, Testimonial>(&query)
        .bind(&name)
        .bind(&slug)
        .bind(&form.role)
        .bind(&quote)
        .bind(rating)
        .bind(&avatar_url)
        .bind(form.active.unwrap_or(true))
        .fetch_one(pool.as_ref())
        .await
    {
        Ok(testimonial) => (
            StatusCode::CREATED,
            Json(DataResponse {
                success: true,
                data: testimonial,
                message: Some("Testimonial created".to_string()),
            }),
        )
            .into_response(),
        Err(e) if is_unique_violation(&e) => {
            api_error(StatusCode::CONFLICT, "Slug already exists").into_response()
        }
        Err(e) => {
            tracing::error!("Database error creating testimonial: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// PATCH /api/admin/testimonials/{id}
pub async fn update_testimonial(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    req: Request,
) -> impl IntoResponse {
    if let Err(err) = verify_admin(&headers) {
        return err.into_response();
    }

    let form = match read_testimonial_form(&headers, req).await {
        Ok(form) => form,
        Err(err) => return err.into_response(),
    };

    if let Some(rating) = form.rating {
        if let Err(err) = validate_rating(rating) {
            return err.into_response();
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
        "SELECT {} FROM testimonials WHERE id = $1",
        TESTIMONIAL_COLUMNS
    );
    let existing = match sqlx::query_as::<_, Testimonial>(&query)
        .bind(id)
        .fetch_optional(pool.as_ref())
        .await
    {
        Ok(Some(row)) => row,
        Ok(None) => {
            return api_error(StatusCode::NOT_FOUND, "Testimonial not found").into_response();
        }
        Err(e) => {
            tracing::error!("Database error fetching testimonial: {}", e);
            return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    };

    let avatar_url = match cdn::resolve_image(
        form.avatar_file.clone(),
        form.existing_avatar.clone(),
        CDN_FOLDER,
        false,
    )
    .await
    {
        Ok(resolved) => resolved.unwrap_or(existing.avatar_url),
        Err(e) => return upload_error(e).into_response(),
    };

    let name = form.name.unwrap_or(existing.name);
    let role = form.role.or(existing.role);
    let quote = form.quote.unwrap_or(existing.quote);
    let rating = form.rating.unwrap_or(existing.rating);
    let active = form.active.unwrap_or(existing.active);

    let query = format!(
        "UPDATE testimonials \
         SET name = $1, role = $2, quote = $3, rating = $4, avatar_url = $5, \
             active = $6, updated_at = now() \
         WHERE id = $7 \
         RETURNING {}",
        TESTIMONIAL_COLUMNS
    );
    match sqlx::query_as::<_, Testimonial>(&query)
        .bind(&name)
        .bind(&role)
        .bind(&quote)
        .bind(rating)
        .bind(&avatar_url)
        .bind(active)
        .bind(id)
        .fetch_one(pool.as_ref())
        .await
    {
        Ok(testimonial) => (
            StatusCode::OK,
            Json(DataResponse {
                success: true,
                data: testimonial,
                message: Some("Testimonial updated".to_string()),
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database error updating testimonial: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// DELETE /api/admin/testimonials/{id}
pub async fn delete_testimonial(headers: HeaderMap, Path(id): Path<Uuid>) -> impl IntoResponse {
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

    match sqlx::query("DELETE FROM testimonials WHERE id = $1")
        .bind(id)
        .execute(pool.as_ref())
        .await
    {
        Ok(result) if result.rows_affected() == 0 => {
            api_error(StatusCode::NOT_FOUND, "Testimonial not found").into_response()
        }
        Ok(_) => (
            StatusCode::OK,
            Json(MessageResponse {
                success: true,
                message: "Testimonial deleted".to_string(),
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database error deleting testimonial: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::routing::post;
    use axum::Router;
    use tower::ServiceExt;

    #[test]
    fn test_rating_bounds() {
        assert!(validate_rating(1).is_ok());
        assert!(validate_rating(5).is_ok());
        assert!(validate_rating(0).is_err());
        assert!(validate_rating(6).is_err());
    }

    #[tokio::test]
    async fn test_create_requires_bearer() {
        let app = Router::new().route("/api/admin/testimonials", post(create_testimonial));
        let req = axum::http::Request::post("/api/admin/testimonials")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"name": "Jo", "quote": "Great"}"#))
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
}
