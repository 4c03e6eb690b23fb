//! Facade Backend - library for app logic and testing

pub mod cdn;
pub mod db;
pub mod email;
pub mod logging;
pub mod routes;

use axum::{
    http::{HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer,
};

/// Configure CORS from environment variables.
/// Uses ALLOWED_ORIGINS (comma-separated) or FRONTEND_ORIGIN.
/// Falls back to the local dev origins.
pub fn configure_cors() -> CorsLayer {
    let allowed_origins = std::env::var("ALLOWED_ORIGINS")
        .ok()
        .and_then(|s| {
            let origins: Vec<HeaderValue> = s
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                None
            } else {
                Some(origins)
            }
        })
        .or_else(|| {
            std::env::var("FRONTEND_ORIGIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(|origin| vec![origin])
        })
        .unwrap_or_else(|| {
            vec![
                "http://localhost:3000".parse().unwrap(),
                "http://127.0.0.1:3000".parse().unwrap(),
            ]
        });

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
        ])
        .allow_credentials(true)
}

/// Create and configure the application router.
pub fn create_app() -> Router {
    let cors = configure_cors();
    tracing::info!("CORS configured");

    Router::new()
        // Public intake
        .route("/api/leads", post(routes::leads::submit_lead))
        .route("/api/feedback", post(routes::feedback::submit_feedback))
        // Public content reads
        .route("/api/blog", get(routes::blog::list_posts))
        .route("/api/blog/{slug}", get(routes::blog::get_post))
        .route(
            "/api/testimonials",
            get(routes::testimonials::list_testimonials),
        )
        .route("/api/portfolio", get(routes::portfolio::list_projects))
        .route(
            "/api/portfolio/{slug}",
            get(routes::portfolio::get_project),
        )
        // Admin: leads and feedback
        .route(
            "/api/admin/leads",
            get(routes::leads::list_leads).post(routes::leads::create_lead),
        )
        .route(
            "/api/admin/leads/{id}",
            axum::routing::patch(routes::leads::update_lead).delete(routes::leads::delete_lead),
        )
        .route("/api/admin/feedback", get(routes::feedback::list_feedback))
        .route(
            "/api/admin/feedback/{id}",
            axum::routing::patch(routes::feedback::update_feedback)
                .delete(routes::feedback::delete_feedback),
        )
        // Admin: content
        .route(
            "/api/admin/blog",
            get(routes::blog::admin_list_posts).post(routes::blog::create_post),
        )
        .route(
            "/api/admin/blog/{id}",
            axum::routing::patch(routes::blog::update_post).delete(routes::blog::delete_post),
        )
        .route(
            "/api/admin/testimonials",
            get(routes::testimonials::admin_list_testimonials)
                .post(routes::testimonials::create_testimonial),
        )
        .route(
            "/api/admin/testimonials/{id}",
            axum::routing::patch(routes::testimonials::update_testimonial)
                .delete(routes::testimonials::delete_testimonial),
        )
        .route(
            "/api/admin/portfolio",
            get(routes::portfolio::admin_list_projects).post(routes::portfolio::create_project),
        )
        .route(
            "/api/admin/portfolio/{id}",
            axum::routing::patch(routes::portfolio::update_project)
                .delete(routes::portfolio::delete_project),
        )
        // Admin: configuration and aggregates
        .route(
            "/api/admin/smtp",
            get(routes::smtp::get_settings).put(routes::smtp::put_settings),
        )
        .route("/api/admin/dashboard", get(routes::dashboard::get_dashboard))
        // Health
        .route("/health", get(routes::health::health_ping))
        .route("/health/detailed", get(routes::health::health_detailed))
        .route("/health/database", get(routes::health::health_database))
        .layer(logging::middleware::propagate_request_id_layer())
        .layer(middleware::from_fn(logging::middleware::log_request))
        .layer(logging::middleware::request_id_layer())
        .layer(TraceLayer::new_for_http())
        // Compress responses with gzip/br/zstd automatically
        .layer(CompressionLayer::new())
        // 10 MB request body cap; multipart uploads carry images up to 5 MB
        // each plus form overhead
        .layer(RequestBodyLimitLayer::new(10 * 1024 * 1024))
        .layer(cors)
}

/// Run the server (used by main).
pub async fn run() {
    dotenvy::dotenv().ok();

    // Guards MUST be held for the programme's lifetime; dropping them early
    // shuts down background log-writer threads and loses buffered log lines.
    let _log_guards = logging::init();

    routes::health::init_start_time();

    // Refuse to start in production without a real JWT secret.
    let environment = std::env::var("ENVIRONMENT").unwrap_or_default();
    if environment == "production" {
        let secret = std::env::var("JWT_SECRET").unwrap_or_default();
        if secret.is_empty() || secret == "default-jwt-secret-change-in-production" {
            panic!(
                "FATAL: JWT_SECRET must be set to a secure, unique value in production. \
                 Refusing to start with the default secret."
            );
        }
    }

    if std::env::var("DATABASE_URL").is_ok() {
        match db::init_pool(None).await {
            Ok(pool) => {
                if let Err(e) = db::run_migrations(&pool).await {
                    tracing::error!("Failed to run database migrations: {}", e);
                }
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to initialize database pool: {}. Continuing without database.",
                    e
                );
            }
        }
    } else {
        tracing::info!("DATABASE_URL not set. Running without database connection.");
    }

    let app = create_app();

    // Bind address is configurable via HOST / PORT env vars, defaulting to
    // 127.0.0.1:3001 so existing dev setups keep working unchanged.
    let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(3001);
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .expect("Invalid HOST/PORT configuration");
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server error");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[test]
    fn test_create_app_returns_router() {
        let _app = create_app();
    }

    #[tokio::test]
    async fn test_health_route_is_wired() {
        let app = create_app();
        let req = Request::get("/health").body(Body::empty()).unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_admin_mutations_rejected_without_token() {
        for (method, uri) in [
            ("POST", "/api/admin/blog"),
            ("POST", "/api/admin/testimonials"),
            ("POST", "/api/admin/portfolio"),
            ("GET", "/api/admin/leads"),
            ("GET", "/api/admin/feedback"),
            ("GET", "/api/admin/smtp"),
        ] {
            let app = create_app();
            let req = Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from("{}"))
                .unwrap();
            let res = app.oneshot(req).await.unwrap();
            assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "{} {}", method, uri);
        }
    }
}
