/**
 * Routes Module
 * API route handlers plus the response envelope and pagination math shared
 * across them.
 */
pub mod auth;
pub mod blog;
pub mod dashboard;
pub mod feedback;
pub mod forms;
pub mod health;
pub mod leads;
pub mod portfolio;
pub mod smtp;
pub mod testimonials;

use axum::http::StatusCode;
use axum::Json;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Error response: `{ "success": false, "error": "..." }`
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

/// Build an error response tuple for a handler early-return.
pub fn api_error(status: StatusCode, error: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            success: false,
            error: error.into(),
        }),
    )
}

/// Bare success response (for deletes and similar).
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

/// Success envelope carrying a record: `{ success, data, message? }`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Success envelope for list endpoints.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse<T> {
    pub success: bool,
    pub data: Vec<T>,
    pub pagination: Pagination,
}

/// Pagination block returned by every list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: i64,
    pub total_pages: i64,
    pub total_items: i64,
    pub limit: i64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl Pagination {
    pub fn new(page: i64, limit: i64, total_items: i64) -> Self {
        let total_pages = if total_items == 0 {
            0
        } else {
            (total_items + limit - 1) / limit
        };
        Self {
            current_page: page,
            total_pages,
            total_items,
            limit,
            has_next_page: page < total_pages,
            has_prev_page: page > 1,
        }
    }
}

/// Common `page` / `limit` query parameters.
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

pub fn default_page() -> i64 {
    1
}

pub fn default_limit() -> i64 {
    10
}

/// Clamp page to >= 1 and limit to 1..=100, returning (page, limit, offset).
pub fn clamp_paging(page: i64, limit: i64) -> (i64, i64, i64) {
    let limit = limit.clamp(1, 100);
    let page = page.max(1);
    (page, limit, (page - 1) * limit)
}

lazy_static::lazy_static! {
    /// Valid slug pattern: lowercase letters, numbers, and hyphens
    static ref SLUG_REGEX: Regex = Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap();
}

pub fn is_valid_slug(slug: &str) -> bool {
    SLUG_REGEX.is_match(slug)
}

/// Derive a URL slug from a display name: lowercase, runs of
/// non-alphanumeric characters collapsed to a single hyphen, leading and
/// trailing hyphens stripped.
pub fn generate_slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }
    slug
}

/// Map an upload failure to a response: client mistakes (bad type, too
/// large, missing file) are 400s, CDN/transport trouble is a logged 500.
pub fn upload_error(e: crate::cdn::UploadError) -> (StatusCode, Json<ErrorResponse>) {
    let status = if e.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        tracing::error!("CDN upload failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    };
    api_error(status, e.to_string())
}

/// Detect a Postgres unique-constraint violation. The database index is the
/// uniqueness authority for slugs and portfolio display order; this error is
/// the collision signal.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23505"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_slug_collapses_non_alphanumerics() {
        assert_eq!(
            generate_slug("Corporate Office Facade - ABC Tower!!"),
            "corporate-office-facade-abc-tower"
        );
    }

    #[test]
    fn test_generate_slug_strips_edge_hyphens() {
        assert_eq!(generate_slug("  --Hello, World--  "), "hello-world");
        assert_eq!(generate_slug("already-a-slug"), "already-a-slug");
        assert_eq!(generate_slug("!!!"), "");
    }

    #[test]
    fn test_generated_slugs_pass_validation() {
        let slug = generate_slug("Glass Curtain Wall (2024)");
        assert_eq!(slug, "glass-curtain-wall-2024");
        assert!(is_valid_slug(&slug));
    }

    #[test]
    fn test_pagination_last_page() {
        let p = Pagination::new(3, 10, 25);
        assert_eq!(p.total_pages, 3);
        assert!(!p.has_next_page);
        assert!(p.has_prev_page);
    }

    #[test]
    fn test_pagination_first_of_many() {
        let p = Pagination::new(1, 10, 25);
        assert_eq!(p.total_pages, 3);
        assert!(p.has_next_page);
        assert!(!p.has_prev_page);
    }

    #[test]
    fn test_pagination_empty_collection() {
        let p = Pagination::new(1, 10, 0);
        assert_eq!(p.total_pages, 0);
        assert!(!p.has_next_page);
        assert!(!p.has_prev_page);
    }

    #[test]
    fn test_clamp_paging_bounds() {
        assert_eq!(clamp_paging(0, 500), (1, 100, 0));
        assert_eq!(clamp_paging(3, 10), (3, 10, 20));
        assert_eq!(clamp_paging(-5, 0), (1, 1, 0));
    }
}
