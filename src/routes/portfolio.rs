/**
 * Portfolio Routes
 * Public reads of active projects ordered by display position, plus admin
 * CRUD. Display order is unique across projects; the database index is the
 * authority and a violation surfaces as 409.
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
use crate::db::{self, models::PortfolioProject};
use crate::routes::auth::verify_admin;
use crate::routes::forms::{is_multipart, CollectedForm};
use crate::routes::{
    api_error, clamp_paging, generate_slug, is_unique_violation, is_valid_slug, upload_error,
    DataResponse, ErrorResponse, ListResponse, MessageResponse, PageQuery, Pagination,
};

const PORTFOLIO_COLUMNS: &str = "id, name, slug, description, category, location, image_url, \
     gallery, seo_title, seo_description, seo_keywords, display_order, active, \
     created_at, updated_at";

const CDN_FOLDER: &str = "portfolio";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioListQuery {
    #[serde(default = "crate::routes::default_page")]
    pub page: i64,
    #[serde(default = "crate::routes::default_limit")]
    pub limit: i64,
    pub active: Option<bool>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub image: Option<String>,
    pub gallery: Option<Vec<String>>,
    pub seo_title: Option<String>,
    pub seo_description: Option<String>,
    pub seo_keywords: Option<String>,
    pub display_order: Option<i32>,
    pub active: Option<bool>,
}

#[derive(Debug, Default)]
struct PortfolioForm {
    name: Option<String>,
    description: Option<String>,
    category: Option<String>,
    location: Option<String>,
    seo_title: Option<String>,
    seo_description: Option<String>,
    seo_keywords: Option<String>,
    display_order: Option<i32>,
    active: Option<bool>,
    image_file: Option<Bytes>,
    existing_image: Option<String>,
    gallery_files: Vec<Bytes>,
    existing_gallery: Vec<String>,
    gallery_touched: bool,
}

impl PortfolioForm {
    fn from_json(payload: PortfolioRequest) -> Self {
        let gallery_touched = payload.gallery.is_some();
        Self {
            name: payload.name,
            description: payload.description,
            category: payload.category,
            location: payload.location,
            seo_title: payload.seo_title,
            seo_description: payload.seo_description,
            seo_keywords: payload.seo_keywords,
            display_order: payload.display_order,
            active: payload.active,
            image_file: None,
            existing_image: payload.image,
            gallery_files: Vec::new(),
            existing_gallery: payload.gallery.unwrap_or_default(),
            gallery_touched,
        }
    }

    fn from_collected(form: CollectedForm) -> Self {
        let gallery_touched = !form.existing_gallery.is_empty() || !form.gallery_files.is_empty();
        Self {
            name: form.get("name"),
            description: form.get("description"),
            category: form.get("category"),
            location: form.get("location"),
            seo_title: form.get("seoTitle"),
            seo_description: form.get("seoDescription"),
            seo_keywords: form.get("seoKeywords"),
            display_order: form.get_i32("displayOrder"),
            active: form.get_bool("active"),
            image_file: form.image,
            existing_image: form.existing_image,
            gallery_files: form.gallery_files,
            existing_gallery: form.existing_gallery,
            gallery_touched,
        }
    }
}

async fn read_portfolio_form(
    headers: &HeaderMap,
    req: Request,
) -> Result<PortfolioForm, (StatusCode, Json<ErrorResponse>)> {
    if is_multipart(headers) {
        let multipart = Multipart::from_request(req, &())
            .await
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("Invalid multipart data: {}", e)))?;
        let collected = CollectedForm::collect(multipart, "image")
            .await
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?;
        Ok(PortfolioForm::from_collected(collected))
    } else {
        let Json(payload) = Json::<PortfolioRequest>::from_request(req, &())
            .await
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("Invalid JSON body: {}", e)))?;
        Ok(PortfolioForm::from_json(payload))
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/portfolio - Public list, active projects in display order.
pub async fn list_projects(Query(query): Query<PageQuery>) -> impl IntoResponse {
    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return api_error(StatusCode::SERVICE_UNAVAILABLE, "Database not available")
                .into_response();
        }
    };

    let (page, limit, offset) = clamp_paging(query.page, query.limit);

    let select = format!(
        "SELECT {} FROM portfolio_projects WHERE active = true \
         ORDER BY display_order ASC LIMIT $1 OFFSET $2",
        PORTFOLIO_COLUMNS
    );
    let rows = sqlx::query_as::<_, PortfolioProject>(&select)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool.as_ref())
        .await;
    let total =
        sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM portfolio_projects WHERE active = true")
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
            tracing::error!("Database error listing portfolio projects: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// GET /api/portfolio/{slug} - Public single project (active only).
pub async fn get_project(Path(slug): Path<String>) -> impl IntoResponse {
    if !is_valid_slug(&slug) {
        return api_error(StatusCode::BAD_REQUEST, "Invalid slug").into_response();
    }

    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return api_error(StatusCode::SERVICE_UNAVAILABLE, "Database not available")
                .into_response();
        }
    };

    let query = format!(
        "SELECT {} FROM portfolio_projects WHERE slug = $1 AND active = true",
        PORTFOLIO_COLUMNS
    );
    match sqlx::query_as::<_, PortfolioProject>(&query)
        .bind(&slug)
        .fetch_optional(pool.as_ref())
        .await
    {
        Ok(Some(project)) => (
            StatusCode::OK,
            Json(DataResponse {
                success: true,
                data: project,
                message: None,
            }),
        )
            .into_response(),
        Ok(None) => api_error(StatusCode::NOT_FOUND, "Project not found").into_response(),
        Err(e) => {
            tracing::error!("Database error fetching portfolio project: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// GET /api/admin/portfolio - Admin list, inactive included.
pub async fn admin_list_projects(
    headers: HeaderMap,
    Query(query): Query<PortfolioListQuery>,
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

    let mut select = sqlx::QueryBuilder::new(format!(
        "SELECT {} FROM portfolio_projects WHERE 1=1",
        PORTFOLIO_COLUMNS
    ));
    let mut count = sqlx::QueryBuilder::new("SELECT COUNT(*) FROM portfolio_projects WHERE 1=1");
    for qb in [&mut select, &mut count] {
        if let Some(active) = query.active {
            qb.push(" AND active = ").push_bind(active);
        }
        if let Some(category) = &query.category {
            qb.push(" AND category = ").push_bind(category.clone());
        }
    }
    select
        .push(" ORDER BY display_order ASC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    let rows = select
        .build_query_as::<PortfolioProject>()
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
            tracing::error!("Database error listing portfolio projects: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// POST /api/admin/portfolio
pub async fn create_project(headers: HeaderMap, req: Request) -> impl IntoResponse {
    if let Err(err) = verify_admin(&headers) {
        return err.into_response();
    }

    let form = match read_portfolio_form(&headers, req).await {
        Ok(form) => form,
        Err(err) => return err.into_response(),
    };

    let mut missing = Vec::new();
    if form.name.is_none() {
        missing.push("name");
    }
    if form.display_order.is_none() {
        missing.push("displayOrder");
    }
    if !missing.is_empty() {
        return api_error(
            StatusCode::BAD_REQUEST,
            format!("Missing required fields: {}", missing.join(", ")),
        )
        .into_response();
    }
    let name = form.name.clone().unwrap_or_default();
    let display_order = form.display_order.unwrap_or_default();

    let slug = generate_slug(&name);
    if slug.is_empty() {
        return api_error(
            StatusCode::BAD_REQUEST,
            "Name must contain at least one letter or digit",
        )
        .into_response();
    }

    let image_url = match cdn::resolve_image(
        form.image_file.clone(),
        form.existing_image.clone(),
        CDN_FOLDER,
        true,
    )
    .await
    {
        Ok(Some(url)) => url,
        Ok(None) => return upload_error(cdn::UploadError::MissingImage).into_response(),
        Err(e) => return upload_error(e).into_response(),
    };

    let gallery = match cdn::resolve_gallery(
        form.existing_gallery.clone(),
        form.gallery_files.clone(),
        CDN_FOLDER,
    )
    .await
    {
        Ok(gallery) => gallery,
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
        "INSERT INTO portfolio_projects \
             (name, slug, description, category, location, image_url, gallery, \
              seo_title, seo_description, seo_keywords, display_order, active) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
         RETURNING {}",
        PORTFOLIO_COLUMNS
    );
    match sqlx::query_as::<_, PortfolioProject>(&query)
        .bind(&name)
        .bind(&slug)
        .bind(&form.description)
        .bind(&form.category)
        .bind(&form.location)
        .bind(&image_url)
        .bind(&gallery)
        .bind(&form.seo_title)
        .bind(&form.seo_description)
        .bind(&form.seo_keywords)
        .bind(display_order)
        .bind(form.active.unwrap_or(true))
        .fetch_one(pool.as_ref())
        .await
    {
        Ok(project) => (
            StatusCode::CREATED,
            Json(DataResponse {
                success: true,
                data: project,
                message: Some("Project created".to_string()),
            }),
        )
            .into_response(),
        Err(e) if is_unique_violation(&e) => api_error(
            StatusCode::CONFLICT,
            "Slug or display order already exists",
        )
        .into_response(),
        Err(e) => {
            tracing::error!("Database error creating portfolio project: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// PATCH /api/admin/portfolio/{id}
pub async fn update_project(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    req: Request,
) -> impl IntoResponse {
    if let Err(err) = verify_admin(&headers) {
        return err.into_response();
    }

    let form = match read_portfolio_form(&headers, req).await {
        Ok(form) => form,
        Err(err) => return err.into_response(),
    };

    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return api_error(StatusCode::SERVICE_UNAVAILABLE, "Database not available")
                .into_response();
        }
    };

    let query = format!(
        "SELECT {} FROM portfolio_projects WHERE id = $1",
        PORTFOLIO_COLUMNS
    );
    let existing = match sqlx::query_as::<_, PortfolioProject>(&query)
        .bind(id)
        .fetch_optional(pool.as_ref())
        .await
    {
        Ok(Some(project)) => project,
        Ok(None) => return api_error(StatusCode::NOT_FOUND, "Project not found").into_response(),
        Err(e) => {
            tracing::error!("Database error fetching portfolio project: {}", e);
            return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    };

    let image_url = match cdn::resolve_image(
        form.image_file.clone(),
        form.existing_image.clone(),
        CDN_FOLDER,
        false,
    )
    .await
    {
        Ok(resolved) => resolved.unwrap_or(existing.image_url),
        Err(e) => return upload_error(e).into_response(),
    };

    let gallery = if form.gallery_touched {
        match cdn::resolve_gallery(
            form.existing_gallery.clone(),
            form.gallery_files.clone(),
            CDN_FOLDER,
        )
        .await
        {
            Ok(gallery) => {
                tracing::info!(
                    project_id = %id,
                    before = existing.gallery.len(),
                    after = gallery.len(),
                    "portfolio gallery reconciled from client state"
                );
                gallery
            }
            Err(e) => return upload_error(e).into_response(),
        }
    } else {
        existing.gallery
    };

    let name = form.name.unwrap_or(existing.name);
    let description = form.description.or(existing.description);
    let category = form.category.or(existing.category);
    let location = form.location.or(existing.location);
    let seo_title = form.seo_title.or(existing.seo_title);
    let seo_description = form.seo_description.or(existing.seo_description);
    let seo_keywords = form.seo_keywords.or(existing.seo_keywords);
    let display_order = form.display_order.unwrap_or(existing.display_order);
    let active = form.active.unwrap_or(existing.active);

    let query = format!(
        "UPDATE portfolio_projects \
         SET name = $1, description = $2, category = $3, location = $4, \
             image_url = $5, gallery = $6, seo_title = $7, seo_description = $8, \
             seo_keywords = $9, display_order = $10, active = $11, updated_at = now() \
         WHERE id = $12 \
         RETURNING {}",
        PORTFOLIO_COLUMNS
    );
    match sqlx::query_as::<_, PortfolioProject>(&query)
        .bind(&name)
        .bind(&description)
        .bind(&category)
        .bind(&location)
        .bind(&image_url)
        .bind(&gallery)
        .bind(&seo_title)
        .bind(&seo_description)
        .bind(&seo_keywords)
        .bind(display_order)
        .bind(active)
        .bind(id)
        .fetch_one(pool.as_ref())
        .await
    {
        Ok(project) => (
            StatusCode::OK,
            Json(DataResponse {
                success: true,
                data: project,
                message: Some("Project updated".to_string()),
            }),
        )
            .into_response(),
        Err(e) if is_unique_violation(&e) => api_error(
            StatusCode::CONFLICT,
            "Slug or display order already exists",
        )
        .into_response(),
        Err(e) => {
            tracing::error!("Database error updating portfolio project: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// DELETE /api/admin/portfolio/{id}
pub async fn delete_project(headers: HeaderMap, Path(id): Path<Uuid>) -> impl IntoResponse {
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

    match sqlx::query("DELETE FROM portfolio_projects WHERE id = $1")
        .bind(id)
        .execute(pool.as_ref())
        .await
    {
        Ok(result) if result.rows_affected() == 0 => {
            api_error(StatusCode::NOT_FOUND, "Project not found").into_response()
        }
        Ok(_) => (
            StatusCode::OK,
            Json(MessageResponse {
                success: true,
                message: "Project deleted".to_string(),
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database error deleting portfolio project: {}", e);
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

    #[tokio::test]
    async fn test_create_requires_bearer() {
        let app = Router::new().route("/api/admin/portfolio", post(create_project));
        let req = axum::http::Request::post("/api/admin/portfolio")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"name": "Tower", "displayOrder": 1}"#))
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_multipart_form_parses_typed_fields() {
        let mut collected = CollectedForm::default();
        collected.text.insert("name".into(), "ABC Tower".into());
        collected.text.insert("displayOrder".into(), "3".into());
        collected.text.insert("active".into(), "false".into());

        let form = PortfolioForm::from_collected(collected);
        assert_eq!(form.name.as_deref(), Some("ABC Tower"));
        assert_eq!(form.display_order, Some(3));
        assert_eq!(form.active, Some(false));
        assert!(!form.gallery_touched);
    }
}
