/**
 * Dashboard Routes
 * Aggregate counts and growth percentages across all collections, computed
 * with one filtered-count query per table, issued concurrently.
 */
use axum::{http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::db;
use crate::routes::{api_error, DataResponse};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionStats {
    pub total: i64,
    pub current_month: i64,
    pub previous_month: i64,
    pub month_growth: f64,
    pub current_week: i64,
    pub previous_week: i64,
    pub week_growth: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub leads: CollectionStats,
    pub feedback: CollectionStats,
    pub blog_posts: CollectionStats,
    pub testimonials: CollectionStats,
    pub portfolio_projects: CollectionStats,
    pub generated_at: DateTime<Utc>,
}

/// Boundaries for the month/week comparison windows, all derived from one
/// `now` so the five queries agree.
#[derive(Debug, Clone, Copy)]
struct Windows {
    month_start: DateTime<Utc>,
    prev_month_start: DateTime<Utc>,
    week_start: DateTime<Utc>,
    prev_week_start: DateTime<Utc>,
}

impl Windows {
    fn at(now: DateTime<Utc>) -> Self {
        let month_start = Utc
            .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
            .single()
            .unwrap_or(now);
        let (prev_year, prev_month) = if now.month() == 1 {
            (now.year() - 1, 12)
        } else {
            (now.year(), now.month() - 1)
        };
        let prev_month_start = Utc
            .with_ymd_and_hms(prev_year, prev_month, 1, 0, 0, 0)
            .single()
            .unwrap_or(month_start);
        Self {
            month_start,
            prev_month_start,
            week_start: now - Duration::days(7),
            prev_week_start: now - Duration::days(14),
        }
    }
}

/// Percentage change from `previous` to `current`. A rise from zero reads as
/// 100%, zero to zero as 0%.
fn growth_pct(current: i64, previous: i64) -> f64 {
    if previous == 0 {
        if current > 0 {
            100.0
        } else {
            0.0
        }
    } else {
        let delta = (current - previous) as f64;
        (delta / previous as f64 * 10000.0).round() / 100.0
    }
}

#[derive(sqlx::FromRow)]
struct CountRow {
    total: i64,
    current_month: i64,
    previous_month: i64,
    current_week: i64,
    previous_week: i64,
}

/// One round trip per table: total plus the four window counts via
/// `COUNT(*) FILTER`.
async fn collection_stats(
    pool: &PgPool,
    table: &str,
    ts_column: &str,
    w: Windows,
) -> Result<CollectionStats, sqlx::Error> {
    let query = format!(
        "SELECT COUNT(*) AS total, \
             COUNT(*) FILTER (WHERE {ts} >= $1) AS current_month, \
             COUNT(*) FILTER (WHERE {ts} >= $2 AND {ts} < $1) AS previous_month, \
             COUNT(*) FILTER (WHERE {ts} >= $3) AS current_week, \
             COUNT(*) FILTER (WHERE {ts} >= $4 AND {ts} < $3) AS previous_week \
         FROM {table}",
        ts = ts_column,
        table = table
    );
    let row = sqlx::query_as::<_, CountRow>(&query)
        .bind(w.month_start)
        .bind(w.prev_month_start)
        .bind(w.week_start)
        .bind(w.prev_week_start)
        .fetch_one(pool)
        .await?;

    Ok(CollectionStats {
        total: row.total,
        current_month: row.current_month,
        previous_month: row.previous_month,
        month_growth: growth_pct(row.current_month, row.previous_month),
        current_week: row.current_week,
        previous_week: row.previous_week,
        week_growth: growth_pct(row.current_week, row.previous_week),
    })
}

/// GET /api/admin/dashboard - Aggregates for the admin landing page.
/// Read-only and deliberately unguarded, like the admin testimonial list.
pub async fn get_dashboard() -> impl IntoResponse {
    let pool = match db::get_pool() {
        Some(p) => p,
        None => {
            return api_error(StatusCode::SERVICE_UNAVAILABLE, "Database not available")
                .into_response();
        }
    };

    let now = Utc::now();
    let windows = Windows::at(now);

    let result = tokio::try_join!(
        collection_stats(pool.as_ref(), "leads", "submitted_at", windows),
        collection_stats(pool.as_ref(), "feedback", "submitted_at", windows),
        collection_stats(pool.as_ref(), "blog_posts", "created_at", windows),
        collection_stats(pool.as_ref(), "testimonials", "created_at", windows),
        collection_stats(pool.as_ref(), "portfolio_projects", "created_at", windows),
    );

    match result {
        Ok((leads, feedback, blog_posts, testimonials, portfolio_projects)) => (
            StatusCode::OK,
            Json(DataResponse {
                success: true,
                data: DashboardStats {
                    leads,
                    feedback,
                    blog_posts,
                    testimonials,
                    portfolio_projects,
                    generated_at: now,
                },
                message: None,
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database error computing dashboard stats: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_growth_pct() {
        assert_eq!(growth_pct(15, 10), 50.0);
        assert_eq!(growth_pct(5, 10), -50.0);
        assert_eq!(growth_pct(10, 10), 0.0);
        assert_eq!(growth_pct(1, 3), -66.67);
    }

    #[test]
    fn test_growth_pct_zero_previous() {
        assert_eq!(growth_pct(4, 0), 100.0);
        assert_eq!(growth_pct(0, 0), 0.0);
    }

    #[test]
    fn test_window_boundaries_cross_year() {
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap();
        let w = Windows::at(now);
        assert_eq!(
            w.month_start,
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            w.prev_month_start,
            Utc.with_ymd_and_hms(2025, 12, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(w.week_start, now - Duration::days(7));
        assert_eq!(w.prev_week_start, now - Duration::days(14));
    }
}
