//! Axum middleware applied to the router.
//!
//! [`require_principal`] is the authentication guard. It runs before every
//! protected handler and short-circuits with `401` before any handler side
//! effect (key generation, upload write, store lookup) can happen.

use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use common::ServiceError;
use tracing::warn;

use super::{handlers::ApiError, state::AppState};
use crate::auth::Credentials;

/// Default per-request timeout applied to all routes.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Authenticate the caller with HTTP Basic credentials.
///
/// On success the verified [`crate::auth::Principal`] is inserted into the
/// request extensions for handlers to extract.
pub async fn require_principal(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let principal = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(Credentials::from_basic_header)
        .and_then(|creds| state.credentials.verify(&creds));

    match principal {
        Some(principal) => {
            req.extensions_mut().insert(principal);
            next.run(req).await
        }
        None => {
            warn!(path = %req.uri().path(), "rejected request: authentication failed");
            ApiError(ServiceError::AuthenticationFailed).into_response()
        }
    }
}
