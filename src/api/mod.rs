//! Backend access: a small transport seam plus the typed calls the fan-out
//! needs (device listing, prekey claiming, message posting).

mod http;
pub mod schema;

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

pub use http::HttpTransport;

use crate::error::{FanoutError, FanoutResult};
use crate::model::{ConversationId, DeviceId, UserId};

/// Raw response from the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub body: String,
}

impl Reply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn json<T: DeserializeOwned>(&self) -> FanoutResult<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Anything that can carry a request to the backend and bring back a reply.
///
/// Implementations return `Unavailable` for network-level failures only;
/// status codes are interpreted by the caller.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn get(&self, path: &str) -> FanoutResult<Reply>;

    async fn post(&self, path: &str, body: &serde_json::Value) -> FanoutResult<Reply>;
}

pub fn clients_path(user: &UserId) -> String {
    format!("/users/{user}/clients")
}

pub fn prekey_path(user: &UserId, device: &DeviceId) -> String {
    format!("/users/{user}/prekeys/{device}")
}

pub fn messages_path(conversation: &ConversationId) -> String {
    format!("/conversations/{conversation}/otr/messages")
}

/// A transport with a per-call deadline. A call that runs out of time is
/// reported as `Unavailable`.
pub struct Backend<T> {
    transport: T,
    timeout: Duration,
}

impl<T: Transport> Backend<T> {
    pub fn new(transport: T, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn get(&self, path: &str) -> FanoutResult<Reply> {
        debug!(path, "GET");
        tokio::time::timeout(self.timeout, self.transport.get(path))
            .await
            .map_err(|_| FanoutError::Unavailable(format!("GET {path} timed out")))?
    }

    pub async fn post(&self, path: &str, body: &serde_json::Value) -> FanoutResult<Reply> {
        debug!(path, "POST");
        tokio::time::timeout(self.timeout, self.transport.post(path, body))
            .await
            .map_err(|_| FanoutError::Unavailable(format!("POST {path} timed out")))?
    }
}
