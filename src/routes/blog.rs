/**
 * Blog Routes
 * Public reads plus admin CRUD for blog posts. Admin writes accept JSON or
 * multipart form-data; images land on the CDN, never on local disk.
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
use crate::db::{self, models::BlogPost};
use crate::routes::auth::verify_admin;
use crate::routes::forms::{is_multipart, CollectedForm};
use crate::routes::{
    api_error, clamp_paging, generate_slug, is_unique_violation, is_valid_slug, upload_error,
    DataResponse, ErrorResponse, ListResponse, MessageResponse, PageQuery, Pagination,
};

const BLOG_COLUMNS: &str = "id, title, slug, excerpt, content, image_url, gallery, seo_title, \
     seo_description, seo_keywords, published, created_at, updated_at";

const CDN_FOLDER: &str = "blog";

// ============================================================================
// Request types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogListQuery {
    #[serde(default = "crate::routes::default_page")]
    pub page: i64,
    #[serde(default = "crate::routes::default_limit")]
    pub limit: i64,
    pub published: Option<bool>,
}

/// JSON body for admin create/update. The `image` and `gallery` members are
/// existing CDN URLs; fresh files only arrive via multipart.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogRequest {
    pub title: Option<String>,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub image: Option<String>,
    pub gallery: Option<Vec<String>>,
    pub seo_title: Option<String>,
    pub seo_description: Option<String>,
    pub seo_keywords: Option<String>,
    pub published: Option<bool>,
}

/// Normalized form shared by the JSON and multipart paths.
#[derive(Debug, Default)]
struct BlogForm {
    title: Option<String>,
    excerpt: Option<String>,
    content: Option<String>,
    seo_title: Option<String>,
    seo_description: Option<String>,
    seo_keywords: Option<String>,
    published: Option<bool>,
    image_file: Option<Bytes>,
    existing_image: Option<String>,
    gallery_files: Vec<Bytes>,
    existing_gallery: Vec<String>,
    gallery_touched: bool,
}

impl BlogForm {
    fn from_json(payload: BlogRequest) -> Self {
        let gallery_touched = payload.gallery.is_some();
        Self {
            title: payload.title,
            excerpt: payload.excerpt,
            content: payload.content,
            seo_title: payload.seo_title,
            seo_description: payload.seo_description,
            seo_keywords: payload.seo_keywords,
            published: payload.published,
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
            title: form.get("title"),
            excerpt: form.get("excerpt"),
            content: form.get("content"),
            seo_title: form.get("seoTitle"),
            seo_description: form.get("seoDescription"),
            seo_keywords: form.get("seoKeywords"),
            published: form.get_bool("published"),
            image_file: form.image,
            existing_image: form.existing_image,
            gallery_files: form.gallery_files,
            existing_gallery: form.existing_gallery,
            gallery_touched,
        }
    }
}

/// Parse the admin write body, branching on content type.
async fn read_blog_form(
    headers: &HeaderMap,
    req: Request,
) -> Result<BlogForm, (StatusCode, Json<ErrorResponse>)> {
    if is_multipart(headers) {
        let multipart = Multipart::from_request(req, &())
            .await
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("Invalid multipart data: {}", e)))?;
        let collected = CollectedForm::collect(multipart, "image")
            .await
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?;
        Ok(BlogForm::from_collected(collected))
    } else {
        let Json(payload) = Json::<BlogRequest>::from_request(req, &())
            .await
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("Invalid JSON body: {}", e)))?;
        Ok(BlogForm::from_json(payload))
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/blog - Public list, published posts only.
pub async fn list_posts(Query(query): Query<PageQuery>) -> impl IntoResponse {
    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return api_error(StatusCode::SERVICE_UNAVAILABLE, "Database not available")
                .into_response();
        }
    };

    let (page, limit, offset) = clamp_paging(query.page, query.limit);

    let select = format!(
        "SELECT {} FROM blog_posts WHERE published = true \
         ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        BLOG_COLUMNS
    );
    let posts = sqlx::query_as::<_, BlogPost>(&select)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool.as_ref())
        .await;
    let total = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM blog_posts WHERE published = true")
        .fetch_one(pool.as_ref())
        .await;

    match (posts, total) {
        (Ok(posts), Ok((total,))) => (
            StatusCode::OK,
            Json(ListResponse {
                success: true,
                data: posts,
                pagination: Pagination::new(page, limit, total),
            }),
        )
            .into_response(),
        (Err(e), _) | (_, Err(e)) => {
            tracing::error!("Database error listing blog posts: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// GET /api/blog/{slug} - Public single post (published only).
pub async fn get_post(Path(slug): Path<String>) -> impl IntoResponse {
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
        "SELECT {} FROM blog_posts WHERE slug = $1 AND published = true",
        BLOG_COLUMNS
    );
    match sqlx::query_as::<_, BlogPost>(&query)
        .bind(&slug)
        .fetch_optional(pool.as_ref())
        .await
    {
        Ok(Some(post)) => (
            StatusCode::OK,
            Json(DataResponse {
                success: true,
                data: post,
                message: None,
            }),
        )
            .into_response(),
        Ok(None) => api_error(StatusCode::NOT_FOUND, "Post not found").into_response(),
        Err(e) => {
            tracing::error!("Database error fetching blog post: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// GET /api/admin/blog - Admin list, drafts included.
pub async fn admin_list_posts(
    headers: HeaderMap,
    Query(query): Query<BlogListQuery>,
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
        "SELECT {} FROM blog_posts WHERE 1=1",
        BLOG_COLUMNS
    ));
    let mut count = sqlx::QueryBuilder::new("SELECT COUNT(*) FROM blog_posts WHERE 1=1");
    for qb in [&mut select, &mut count] {
        if let Some(published) = query.published {
            qb.push(" AND published = ").push_bind(published);
        }
    }
    select
        .push(" ORDER BY created_at DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    let posts = select
        .build_query_as::<BlogPost>()
        .fetch_all(pool.as_ref())
        .await;
    let total = count
        .build_query_as::<(i64,)>()
        .fetch_one(pool.as_ref())
        .await;

    match (posts, total) {
        (Ok(posts), Ok((total,))) => (
            StatusCode::OK,
            Json(ListResponse {
                success: true,
                data: posts,
                pagination: Pagination::new(page, limit, total),
            }),
        )
            .into_response(),
        (Err(e), _) | (_, Err(e)) => {
            tracing::error!("Database error listing blog posts: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// POST /api/admin/blog - Create a post. Slug is derived from the title;
/// the database unique index is the collision authority.
pub async fn create_post(headers: HeaderMap, req: Request) -> impl IntoResponse {
    if let Err(err) = verify_admin(&headers) {
        return err.into_response();
    }

    let form = match read_blog_form(&headers, req).await {
        Ok(form) => form,
        Err(err) => return err.into_response(),
    };

    let title = match &form.title {
        Some(t) => t.clone(),
        None => {
            return api_error(StatusCode::BAD_REQUEST, "Missing required fields: title")
                .into_response();
        }
    };
    let slug = generate_slug(&title);
    if slug.is_empty() {
        return api_error(
            StatusCode::BAD_REQUEST,
            "Title must contain at least one letter or digit",
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

    let gallery =
        match cdn::resolve_gallery(form.existing_gallery.clone(), form.gallery_files.clone(), CDN_FOLDER)
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

    let content = form.content.map(|c| ammonia::clean(&c));

    let query = format!(
        "INSERT INTO blog_posts \
             (title, slug, excerpt, content, image_url, gallery, seo_title, \
              seo_description, seo_keywords, published) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         RETURNING {}",
        BLOG_COLUMNS
    );
    match sqlx::query_as::<_, BlogPost>(&query)
        .bind(&title)
        .bind(&slug)
        .bind(&form.excerpt)
        .bind(&content)
        .bind(&image_url)
        .bind(&gallery)
        .bind(&form.seo_title)
        .bind(&form.seo_description)
        .bind(&form.seo_keywords)
        .bind(form.published.unwrap_or(false))
        .fetch_one(pool.as_ref())
        .await
    {
        Ok(post) => (
            StatusCode::CREATED,
            Json(DataResponse {
                success: true,
                data: post,
                message: Some("Post created".to_string()),
            }),
        )
            .into_response(),
        Err(e) if is_unique_violation(&e) => {
            api_error(StatusCode::CONFLICT, "Slug already exists").into_response()
        }
        Err(e) => {
            tracing::error!("Database error creating blog post: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// PATCH /api/admin/blog/{id} - Update a post. A fresh upload wins over an
/// explicitly passed existing URL; with neither the stored image is kept.
pub async fn update_post(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    req: Request,
) -> impl IntoResponse {
    if let Err(err) = verify_admin(&headers) {
        return err.into_response();
    }

    let form = match read_blog_form(&headers, req).await {
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

    let query = format!("SELECT {} FROM blog_posts WHERE id = $1", BLOG_COLUMNS);
    let existing = match sqlx::query_as::<_, BlogPost>(&query)
        .bind(id)
        .fetch_optional(pool.as_ref())
        .await
    {
        Ok(Some(post)) => post,
        Ok(None) => return api_error(StatusCode::NOT_FOUND, "Post not found").into_response(),
        Err(e) => {
            tracing::error!("Database error fetching blog post: {}", e);
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
                    post_id = %id,
                    before = existing.gallery.len(),
                    after = gallery.len(),
                    "blog gallery reconciled from client state"
                );
                gallery
            }
            Err(e) => return upload_error(e).into_response(),
        }
    } else {
        existing.gallery
    };

    let title = form.title.unwrap_or(existing.title);
    let excerpt = form.excerpt.or(existing.excerpt);
    let content = form
        .content
        .map(|c| ammonia::clean(&c))
        .or(existing.content);
    let seo_title = form.seo_title.or(existing.seo_title);
    let seo_description = form.seo_description.or(existing.seo_description);
    let seo_keywords = form.seo_keywords.or(existing.seo_keywords);
    let published = form.published.unwrap_or(existing.published);

    let query = format!(
        "UPDATE blog_posts \
         SET title = $1, excerpt = $2, content = $3, image_url = $4, gallery = $5, \
             seo_title = $6, seo_description = $7, seo_keywords = $8, published = $9, \
             updated_at = now() \
         WHERE id = $10 \
         RETURNING {}",
        BLOG_COLUMNS
    );
    match sqlx::query_as::<_, BlogPost>(&query)
        .bind(&title)
        .bind(&excerpt)
        .bind(&content)
        .bind(&image_url)
        .bind(&gallery)
        .bind(&seo_title)
        .bind(&seo_description)
        .bind(&seo_keywords)
        .bind(published)
        .bind(id)
        .fetch_one(pool.as_ref())
        .await
    {
        Ok(post) => (
            StatusCode::OK,
            Json(DataResponse {
                success: true,
                data: post,
                message: Some("Post updated".to_string()),
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database error updating blog post: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// DELETE /api/admin/blog/{id}
pub async fn delete_post(headers: HeaderMap, Path(id): Path<Uuid>) -> impl IntoResponse {
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

    match sqlx::query("DELETE FROM blog_posts WHERE id = $1")
        .bind(id)
        .execute(pool.as_ref())
        .await
    {
        Ok(result) if result.rows_affected() == 0 => {
            api_error(StatusCode::NOT_FOUND, "Post not found").into_response()
        }
        Ok(_) => (
            StatusCode::OK,
            Json(MessageResponse {
                success: true,
                message: "Post deleted".to_string(),
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database error deleting blog post: {}", e);
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
    async fn test_create_requires_bearer_before_any_work() {
        let app = Router::new().route("/api/admin/blog", post(create_post));
        let req = axum::http::Request::post("/api/admin/blog")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"title": "Hello"}"#))
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_json_form_marks_gallery_touched_only_when_present() {
        let with_gallery = BlogForm::from_json(BlogRequest {
            title: Some("t".into()),
            excerpt: None,
            content: None,
            image: None,
            gallery: Some(vec![]),
            seo_title: None,
            seo_description: None,
            seo_keywords: None,
            published: None,
        });
        assert!(with_gallery.gallery_touched);

        let without_gallery = BlogForm::from_json(BlogRequest {
            title: Some("t".into()),
            excerpt: None,
            content: None,
            image: None,
            gallery: None,
            seo_title: None,
            seo_description: None,
            seo_keywords: None,
            published: None,
        });
        assert!(!without_gallery.gallery_touched);
    }
}
