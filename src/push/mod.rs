//! Push gateway abstraction and the Expo implementation.

pub mod expo;

pub use expo::ExpoClient;

use serde::{Deserialize, Serialize};
use std::future::Future;
use thiserror::Error;

/// Largest batch the Expo push API accepts in one request.
pub const PUSH_CHUNK_LIMIT: usize = 100;

#[derive(Error, Debug)]
pub enum PushError {
    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Push API error: {0}")]
    Api(String),
}

/// One notification addressed to one device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushMessage {
    pub to: String,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
}

/// Per-message acknowledgement returned by the gateway.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PushTicket {
    Ok {
        id: String,
    },
    Error {
        message: String,
        #[serde(default)]
        details: Option<serde_json::Value>,
    },
}

pub trait PushGateway: Send + Sync {
    fn is_valid_token(&self, token: &str) -> bool;

    fn chunk(&self, messages: Vec<PushMessage>) -> Vec<Vec<PushMessage>> {
        chunk_messages(messages, PUSH_CHUNK_LIMIT)
    }

    fn send(
        &self,
        chunk: &[PushMessage],
    ) -> impl Future<Output = Result<Vec<PushTicket>, PushError>> + Send;
}

/// Splits `items` into consecutive groups of at most `max` (a zero limit acts as one).
pub fn chunk_messages<T>(items: Vec<T>, max: usize) -> Vec<Vec<T>> {
    let max = max.max(1);
    let mut chunks = Vec::with_capacity(items.len().div_ceil(max));
    let mut iter = items.into_iter().peekable();
    while iter.peek().is_some() {
        chunks.push(iter.by_ref().take(max).collect());
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_count_is_ceiling_and_order_is_kept() {
        for (n, m) in [(0, 100), (1, 100), (100, 100), (101, 100), (250, 100), (7, 3)] {
            let items: Vec<usize> = (0..n).collect();
            let chunks = chunk_messages(items.clone(), m);

            assert_eq!(chunks.len(), n.div_ceil(m), "n={} m={}", n, m);
            assert!(chunks.iter().all(|c| !c.is_empty() && c.len() <= m));
            assert_eq!(chunks.concat(), items);
        }
    }

    #[test]
    fn test_zero_limit_does_not_loop_forever() {
        assert_eq!(chunk_messages(vec![1, 2], 0), vec![vec![1], vec![2]]);
    }

    #[test]
    fn test_ticket_deserialization() {
        let tickets: Vec<PushTicket> = serde_json::from_value(serde_json::json!([
            { "status": "ok", "id": "XXXX-1" },
            {
                "status": "error",
                "message": "\"ExponentPushToken[abc]\" is not a registered push notification recipient",
                "details": { "error": "DeviceNotRegistered" }
            }
        ]))
        .unwrap();

        assert_eq!(tickets[0], PushTicket::Ok { id: "XXXX-1".into() });
        assert!(matches!(&tickets[1], PushTicket::Error { details: Some(_), .. }));
    }
}
