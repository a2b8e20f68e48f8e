//! Axum router configuration.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, Method};
use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{debug_sources, health_check, metrics_text, version_check};
use super::state::AppState;

/// Builds the observability router: health, version, Prometheus metrics, and
/// a per-source debug snapshot. No media is ever served from this router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route("/healthz", get(health_check))
        .route("/version", get(version_check))
        .route("/metrics", get(metrics_text))
        .route("/debug/sources", get(debug_sources))
        .layer(TraceLayer::new_for_http());

    if state.config.cors_enabled {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::OPTIONS])
            .allow_headers([header::ACCEPT, header::CONTENT_TYPE, header::ORIGIN])
            .max_age(Duration::from_secs(3600));
        router = router.layer(cors);
    }

    router.with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;

    use parking_lot::RwLock;

    use super::*;
    use crate::config::ServerConfig;
    use crate::metrics::Metrics;
    use crate::scene::SceneSnapshot;

    fn test_state() -> Arc<AppState> {
        Arc::new(AppState::new(
            ServerConfig::default(),
            Arc::new(Metrics::new()),
            Arc::new(RwLock::new(SceneSnapshot::default())),
            Arc::new(AtomicBool::new(true)),
        ))
    }

    #[test]
    fn create_router_does_not_panic() {
        let _router = create_router(test_state());
    }

    #[tokio::test]
    async fn health_returns_ok() {
        use axum::body::Body;
        use axum::http::{Request, StatusCode};
        use tower::util::ServiceExt;

        let app = create_router(test_state());
        let request = Request::builder().uri("/healthz").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn debug_sources_returns_ok_before_any_source_is_configured() {
        use axum::body::Body;
        use axum::http::{Request, StatusCode};
        use tower::util::ServiceExt;

        let app = create_router(test_state());
        let request = Request::builder().uri("/debug/sources").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
