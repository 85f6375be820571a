//! HTTP object store client for plant images.
//!
//! Images arrive base64-encoded from the mobile client, are uploaded with a
//! `PUT {upload_url}/{key}` and are later served from `{public_url}/{key}`.
//! Only the key is persisted on the plant row.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{header, Client};
use thiserror::Error;

use crate::error::AppError;

#[derive(Error, Debug)]
pub enum ObjectStoreError {
    #[error("Invalid image payload: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Object store API error ({status}): {body}")]
    Api { status: u16, body: String },
}

impl From<ObjectStoreError> for AppError {
    fn from(err: ObjectStoreError) -> Self {
        match err {
            ObjectStoreError::Decode(e) => AppError::BadRequest(format!("Invalid image: {}", e)),
            other => AppError::Upstream(other.to_string()),
        }
    }
}

fn content_type_for(key: &str) -> &'static str {
    let extension = key.rsplit('.').next().unwrap_or_default().to_ascii_lowercase();
    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "heic" => "image/heic",
        _ => "application/octet-stream",
    }
}

/// Accepts both raw base64 and `data:<mime>;base64,<payload>` URLs.
fn decode_image(payload: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let raw = match payload.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => payload,
    };
    STANDARD.decode(raw.trim())
}

#[derive(Clone)]
pub struct ObjectStore {
    client: Client,
    upload_url: String,
    public_url: String,
    api_key: Option<String>,
}

impl ObjectStore {
    pub fn new(upload_url: &str, public_url: &str, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            upload_url: upload_url.trim_end_matches('/').to_string(),
            public_url: public_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Uploads the decoded image under `key` and returns the key to persist.
    pub async fn upload_base64(&self, key: &str, payload: &str) -> Result<String, ObjectStoreError> {
        let bytes = decode_image(payload)?;
        let url = format!("{}/{}", self.upload_url, key);

        let mut request = self
            .client
            .put(&url)
            .header(header::CONTENT_TYPE, content_type_for(key))
            .body(bytes);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ObjectStoreError::Api { status, body });
        }

        tracing::debug!(key, "image uploaded");
        Ok(key.to_string())
    }

    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_url, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_bytes, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_decode_image_accepts_data_urls() {
        assert_eq!(decode_image("aGVsbG8=").unwrap(), b"hello");
        assert_eq!(decode_image("data:image/png;base64,aGVsbG8=").unwrap(), b"hello");
        assert!(decode_image("not base64!").is_err());
    }

    #[test]
    fn test_public_url_joins_without_double_slash() {
        let store = ObjectStore::new("http://upload/", "https://cdn.example/", None);
        assert_eq!(store.public_url("plants/a.png"), "https://cdn.example/plants/a.png");
    }

    #[tokio::test]
    async fn test_upload_puts_decoded_bytes() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/plants/fern.png"))
            .and(header("content-type", "image/png"))
            .and(header("authorization", "Bearer store-key"))
            .and(body_bytes(b"hello".to_vec()))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let store = ObjectStore::new(&mock_server.uri(), "https://cdn", Some("store-key".into()));
        let key = store.upload_base64("plants/fern.png", "aGVsbG8=").await.unwrap();
        assert_eq!(key, "plants/fern.png");
    }

    #[tokio::test]
    async fn test_upload_failure_surfaces_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(403).set_body_string("denied"))
            .mount(&mock_server)
            .await;

        let store = ObjectStore::new(&mock_server.uri(), "https://cdn", None);
        let err = store.upload_base64("a.jpg", "aGVsbG8=").await.unwrap_err();
        assert!(matches!(err, ObjectStoreError::Api { status: 403, .. }));
        assert!(matches!(AppError::from(err), AppError::Upstream(_)));
    }
}
