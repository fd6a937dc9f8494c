//! Axum request handlers for all service endpoints.

use axum::{
    body::Bytes,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use common::protocol::{ErrorResponse, HealthResponse, KeyResponse, UploadResponse, FILE_FIELD};
use common::ServiceError;
use tracing::{error, info, warn};

use super::state::AppState;
use crate::auth::Principal;
use crate::uploads::UploadError;

/// Handler error: a [`ServiceError`] rendered as an [`ErrorResponse`].
///
/// 5xx bodies carry a fixed message; the detailed cause goes to the log only.
#[derive(Debug)]
pub struct ApiError(pub ServiceError);

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let message = match &self.0 {
            ServiceError::StorageUnavailable(_) => {
                error!(error = %self.0, "key store failure");
                "key store unavailable".to_owned()
            }
            ServiceError::Internal(_) | ServiceError::InvalidKey => {
                error!(error = %self.0, "internal failure");
                "internal error".to_owned()
            }
            other => other.to_string(),
        };

        let body = Json(ErrorResponse::new(self.0.code(), message));
        let mut resp = (status, body).into_response();
        if matches!(self.0, ServiceError::AuthenticationFailed) {
            resp.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static(r#"Basic realm="keyserver""#),
            );
        }
        resp
    }
}

/// `GET /get-key` — issue a fresh key for the caller.
///
/// Every call rotates the caller's key; blobs sealed under the previous key
/// can no longer be decrypted by `POST /decrypt`.
pub async fn get_key(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Response, ApiError> {
    let issuer = state.issuer.clone();
    let name = principal.as_str().to_owned();
    let record = tokio::task::spawn_blocking(move || issuer.issue(&name))
        .await
        .map_err(|e| ServiceError::Internal(format!("issuer task failed: {e}")))?
        .map_err(|e| ServiceError::StorageUnavailable(e.to_string()))?;

    let body = Json(KeyResponse {
        key: record.key.encode(),
    });
    Ok(([(header::CACHE_CONTROL, "no-store")], body).into_response())
}

/// `POST /upload-model` — persist an opaque ciphertext upload verbatim.
pub async fn upload_model(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let part = read_file_part(multipart).await?;
    let filename = part
        .filename
        .ok_or_else(|| ServiceError::BadRequest("no file selected".into()))?;

    let stored = state
        .uploads
        .save(&principal, &filename, part.data)
        .await
        .map_err(|e| match e {
            UploadError::Rejected(msg) => ServiceError::BadRequest(msg),
            UploadError::Io(e) => ServiceError::Internal(format!("upload write failed: {e}")),
        })?;

    Ok(Json(UploadResponse {
        message: format!("File saved to {}", stored.relative_path),
        path: stored.relative_path,
        bytes: stored.bytes,
    }))
}

/// `POST /decrypt` — decrypt a ciphertext under the caller's current key.
///
/// Returns the raw plaintext as `application/octet-stream`.
pub async fn decrypt(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let part = read_file_part(multipart).await?;
    if part.data.is_empty() {
        return Err(ServiceError::BadRequest("uploaded file is empty".into()).into());
    }

    let store = state.key_store.clone();
    let name = principal.as_str().to_owned();
    let record = tokio::task::spawn_blocking(move || store.lookup(&name))
        .await
        .map_err(|e| ServiceError::Internal(format!("lookup task failed: {e}")))?
        .map_err(|e| ServiceError::StorageUnavailable(e.to_string()))?
        .ok_or(ServiceError::NoKeyForPrincipal)?;

    let ciphertext = part.data;
    let plaintext = tokio::task::spawn_blocking(move || {
        common::crypto::decrypt(record.key.as_bytes(), &ciphertext)
    })
    .await
    .map_err(|e| ServiceError::Internal(format!("decrypt task failed: {e}")))?
    .map_err(|e| {
        warn!(principal = %principal, "decryption failed: stale key or corrupted upload");
        ServiceError::from(e)
    })?;

    info!(principal = %principal, bytes = plaintext.len(), "decrypted payload");
    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        plaintext,
    )
        .into_response())
}

/// `GET /health` — liveness plus a count of principals holding a key.
///
/// Returns `503 Service Unavailable` when the key store does not answer.
pub async fn health(State(state): State<AppState>) -> Response {
    let store = state.key_store.clone();
    let count = tokio::task::spawn_blocking(move || store.count()).await;

    let (status_code, body) = match count {
        Ok(Ok(keys_issued)) => (
            StatusCode::OK,
            HealthResponse {
                status: "ok".into(),
                store_ready: true,
                keys_issued,
            },
        ),
        Ok(Err(e)) => {
            warn!(error = %e, "health check: key store not ready");
            (StatusCode::SERVICE_UNAVAILABLE, degraded())
        }
        Err(e) => {
            warn!(error = %e, "health check task failed");
            (StatusCode::SERVICE_UNAVAILABLE, degraded())
        }
    };
    (status_code, Json(body)).into_response()
}

/// Catch-all 404 handler.
pub async fn not_found() -> impl IntoResponse {
    let err = ErrorResponse::new("not_found", "the requested resource does not exist");
    (StatusCode::NOT_FOUND, Json(err))
}

fn degraded() -> HealthResponse {
    HealthResponse {
        status: "degraded".into(),
        store_ready: false,
        keys_issued: 0,
    }
}

// ---------------------------------------------------------------------------
// Multipart helpers
// ---------------------------------------------------------------------------

/// The `file` part of a multipart body.
struct FilePart {
    filename: Option<String>,
    data: Bytes,
}

/// Pull the first [`FILE_FIELD`] part out of `multipart`, skipping others.
async fn read_file_part(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<FilePart, ServiceError> {
    let mut multipart = multipart
        .map_err(|e| ServiceError::BadRequest(format!("expected a multipart body: {e}")))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error("malformed multipart body", e))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_owned)
            .filter(|n| !n.is_empty());
        let data = field
            .bytes()
            .await
            .map_err(|e| multipart_error("failed to read file part", e))?;
        return Ok(FilePart { filename, data });
    }

    Err(ServiceError::BadRequest("no file part in the request".into()))
}

/// Over-limit bodies surface as multipart errors; keep them apart from malformed ones.
fn multipart_error(context: &str, e: MultipartError) -> ServiceError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServiceError::PayloadTooLarge("request body exceeds the upload limit".into())
    } else {
        ServiceError::BadRequest(format!("{context}: {e}"))
    }
}
