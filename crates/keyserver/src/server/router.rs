//! Axum router construction.

use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use common::protocol::{DECRYPT_PATH, GET_KEY_PATH, HEALTH_PATH, UPLOAD_PATH};
use tower_http::{compression::CompressionLayer, timeout::TimeoutLayer, trace::TraceLayer};

use super::{handlers, middleware, state::AppState};

/// Transport limits applied to every route.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_body_bytes: usize,
    pub request_timeout: Duration,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_body_bytes: 512 * 1024 * 1024,
            request_timeout: middleware::REQUEST_TIMEOUT,
        }
    }
}

/// Build the application [`Router`] with all routes and middleware attached.
///
/// Key, upload and decrypt routes sit behind the Basic-auth guard; the guard
/// is attached with `route_layer`, so unknown paths still fall through to 404.
pub fn build(state: AppState, limits: Limits) -> Router {
    let protected = Router::new()
        .route(GET_KEY_PATH, get(handlers::get_key))
        .route(UPLOAD_PATH, post(handlers::upload_model))
        .route(DECRYPT_PATH, post(handlers::decrypt))
        .route_layer(from_fn_with_state(state.clone(), middleware::require_principal));

    Router::new()
        .merge(protected)
        .route(HEALTH_PATH, get(handlers::health))
        .fallback(handlers::not_found)
        .layer(DefaultBodyLimit::max(limits.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(limits.request_timeout))
        .layer(CompressionLayer::new())
        .with_state(state)
}
