use crate::{handlers, AppState};
use axum::{
    http::HeaderValue,
    routing::{get, put},
    Router,
};
use checktree_core::SecurityConfig;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.settings().security);

    Router::new()
        .route("/", get(handlers::get_random_tree))
        .route("/node/{node_id}", get(handlers::get_node))
        .route("/override/{node_id}", put(handlers::override_status))
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Browser access for the configured origins only. Methods and headers are
/// mirrored because wildcards cannot be combined with credentials.
pub fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = security
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(%origin, error = %e, "ignoring unusable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(security.allow_credentials)
}
