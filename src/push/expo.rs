//! Client for the Expo push notification service.

use reqwest::{header, Client};
use serde::Deserialize;

use super::{PushError, PushGateway, PushMessage, PushTicket};

/// Same acceptance rule as the Expo server SDK: a bracketed
/// `ExponentPushToken[...]`/`ExpoPushToken[...]`, or a bare 8-4-4-4-12
/// alphanumeric device id.
pub fn is_expo_push_token(token: &str) -> bool {
    let bracketed = ["ExponentPushToken[", "ExpoPushToken["]
        .iter()
        .any(|prefix| token.starts_with(prefix))
        && token.ends_with(']');

    bracketed || is_device_id(token)
}

fn is_device_id(token: &str) -> bool {
    const GROUPS: [usize; 5] = [8, 4, 4, 4, 12];

    let parts: Vec<&str> = token.split('-').collect();
    parts.len() == GROUPS.len()
        && parts.iter().zip(GROUPS).all(|(part, len)| {
            part.len() == len && part.chars().all(|c| c.is_ascii_alphanumeric())
        })
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    data: Option<Vec<PushTicket>>,
    #[serde(default)]
    errors: Option<Vec<serde_json::Value>>,
}

#[derive(Clone)]
pub struct ExpoClient {
    client: Client,
    send_url: String,
    access_token: Option<String>,
}

impl ExpoClient {
    pub fn new(base_url: &str, access_token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            send_url: format!("{}/--/api/v2/push/send", base_url.trim_end_matches('/')),
            access_token,
        }
    }
}

impl PushGateway for ExpoClient {
    fn is_valid_token(&self, token: &str) -> bool {
        is_expo_push_token(token)
    }

    async fn send(&self, chunk: &[PushMessage]) -> Result<Vec<PushTicket>, PushError> {
        let mut request = self
            .client
            .post(&self.send_url)
            .header(header::ACCEPT, "application/json")
            .json(chunk);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(PushError::Api(format!("{}: {}", status, error_text)));
        }

        let body: SendResponse = response.json().await?;
        if let Some(errors) = body.errors.filter(|e| !e.is_empty()) {
            return Err(PushError::Api(serde_json::Value::Array(errors).to_string()));
        }

        Ok(body.data.unwrap_or_default())
    }
}
