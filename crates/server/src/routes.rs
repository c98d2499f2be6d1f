//! Route configuration.

use crate::handlers;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Room for multipart boundaries and the text fields next to the file.
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let body_limit = state
        .config
        .server
        .max_upload_bytes
        .saturating_add(MULTIPART_OVERHEAD);

    let api_routes = Router::new()
        .route("/api/health", get(handlers::health_check))
        .route("/api/storage/upload", post(handlers::upload))
        .route("/api/storage/download", post(handlers::download_json))
        .route(
            "/api/storage/download/{root_hash}",
            get(handlers::download_raw),
        )
        .route("/api/storage/exists/{root_hash}", get(handlers::exists))
        .route("/api/storage/info/{root_hash}", get(handlers::info))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(
            usize::try_from(body_limit).unwrap_or(usize::MAX),
        ));

    let mut router = Router::new().merge(api_routes);

    // The metrics endpoint must be network-restricted to the scraper.
    if state.config.server.metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    router
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
