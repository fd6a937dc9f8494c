//! HTTP client for the key server.

use common::protocol::{
    ErrorResponse, KeyResponse, UploadResponse, DECRYPT_PATH, FILE_FIELD, GET_KEY_PATH,
    UPLOAD_PATH,
};
use common::SymmetricKey;
use reqwest::{multipart, Client, Response};
use tracing::debug;
use zeroize::Zeroizing;

use crate::config::RemoteConfig;
use crate::error::{describe, TransferError};

/// Authenticated client for the three protected endpoints.
///
/// Every request carries Basic credentials and is bounded by the configured
/// timeout. Nothing is retried.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    username: String,
    password: Zeroizing<String>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(cfg: &RemoteConfig) -> Result<Self, TransferError> {
        let http = Client::builder()
            .timeout(cfg.request_timeout)
            .user_agent(concat!("uploader/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransferError::Config(e.to_string()))?;

        Ok(Self {
            http,
            base_url: cfg.server_url.clone(),
            username: cfg.username.clone(),
            password: cfg.password.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Request a freshly issued key. The server rotates on every call.
    pub async fn fetch_key(&self) -> Result<SymmetricKey, TransferError> {
        let resp = self
            .http
            .get(self.url(GET_KEY_PATH))
            .basic_auth(&self.username, Some(self.password.as_str()))
            .send()
            .await
            .map_err(|e| TransferError::KeyRequestFailed(describe(&e)))?;

        let resp = check_status(resp).await.map_err(TransferError::KeyRequestFailed)?;
        let body: KeyResponse = resp.json().await.map_err(|e| {
            TransferError::KeyRequestFailed(format!("malformed key response: {}", describe(&e)))
        })?;

        let encoded = Zeroizing::new(body.key);
        SymmetricKey::decode(&encoded)
            .map_err(|_| TransferError::KeyRequestFailed("server returned an invalid key".into()))
    }

    /// Upload an encrypted blob under `filename`.
    pub async fn upload(
        &self,
        filename: &str,
        blob: Vec<u8>,
    ) -> Result<UploadResponse, TransferError> {
        let failed = |reason: String| TransferError::UploadFailed {
            file: filename.to_owned(),
            reason,
        };

        let part = multipart::Part::bytes(blob)
            .file_name(filename.to_owned())
            .mime_str("application/octet-stream")
            .map_err(|e| failed(e.to_string()))?;
        let form = multipart::Form::new().part(FILE_FIELD, part);

        let resp = self
            .http
            .post(self.url(UPLOAD_PATH))
            .basic_auth(&self.username, Some(self.password.as_str()))
            .multipart(form)
            .send()
            .await
            .map_err(|e| failed(describe(&e)))?;

        let resp = check_status(resp).await.map_err(failed)?;
        let body: UploadResponse = resp
            .json()
            .await
            .map_err(|e| failed(format!("malformed upload response: {}", describe(&e))))?;
        debug!(path = %body.path, bytes = body.bytes, "server accepted upload");
        Ok(body)
    }

    /// Ask the server to decrypt `blob` under the caller's current key.
    pub async fn decrypt_remote(
        &self,
        filename: &str,
        blob: Vec<u8>,
    ) -> Result<Vec<u8>, TransferError> {
        let part = multipart::Part::bytes(blob)
            .file_name(filename.to_owned())
            .mime_str("application/octet-stream")
            .map_err(|e| TransferError::DecryptRequestFailed(e.to_string()))?;
        let form = multipart::Form::new().part(FILE_FIELD, part);

        let resp = self
            .http
            .post(self.url(DECRYPT_PATH))
            .basic_auth(&self.username, Some(self.password.as_str()))
            .multipart(form)
            .send()
            .await
            .map_err(|e| TransferError::DecryptRequestFailed(describe(&e)))?;

        let resp = check_status(resp)
            .await
            .map_err(TransferError::DecryptRequestFailed)?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| TransferError::DecryptRequestFailed(describe(&e)))?;
        Ok(bytes.to_vec())
    }
}

/// Pass 2xx responses through; turn anything else into a readable reason.
async fn check_status(resp: Response) -> Result<Response, String> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let detail = match resp.json::<ErrorResponse>().await {
        Ok(err) => format!("{} ({})", err.message, err.code),
        Err(_) => status
            .canonical_reason()
            .unwrap_or("unexpected response")
            .to_owned(),
    };
    Err(format!("server returned {}: {detail}", status.as_u16()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn remote(url: &str) -> RemoteConfig {
        RemoteConfig {
            server_url: url.into(),
            username: "alice".into(),
            password: Zeroizing::new("wonderland".into()),
            request_timeout: Duration::from_secs(2),
        }
    }

    #[test]
    fn urls_join_base_and_path() {
        let client = ApiClient::new(&remote("http://127.0.0.1:5000")).unwrap();
        assert_eq!(client.url(GET_KEY_PATH), "http://127.0.0.1:5000/get-key");
    }

    #[test]
    fn debug_omits_password() {
        let client = ApiClient::new(&remote("http://127.0.0.1:5000")).unwrap();
        assert!(!format!("{client:?}").contains("wonderland"));
    }

    #[tokio::test]
    async fn unreachable_server_is_a_key_request_failure() {
        // Bind then drop to get a port nothing listens on.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let client = ApiClient::new(&remote(&format!("http://127.0.0.1:{port}"))).unwrap();
        let err = client.fetch_key().await.unwrap_err();
        assert!(matches!(err, TransferError::KeyRequestFailed(_)));
    }
}
