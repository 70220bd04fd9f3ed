//! Control API client.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use relaydeck_ipc::{Channel, ChannelId, CreateBroadcastRequest, CreateRelayRequest};

use crate::address::path_segment;
use crate::error::TransportError;
use crate::TransportResult;

/// Directory and lifecycle operations against the relay's control API.
#[async_trait]
pub trait ControlApi: Send + Sync {
    /// `GET /api/channels`
    async fn list_channels(&self) -> TransportResult<Vec<Channel>>;

    /// `POST /api/channels`
    async fn create_broadcast(&self, req: &CreateBroadcastRequest) -> TransportResult<Channel>;

    /// `POST /api/channels/relay`
    async fn create_relay(&self, req: &CreateRelayRequest) -> TransportResult<Channel>;

    /// `DELETE /api/channels/{id}`
    async fn delete_channel(&self, id: &ChannelId) -> TransportResult<()>;
}

/// [`ControlApi`] over HTTP/JSON.
#[derive(Debug, Clone)]
pub struct HttpControlClient {
    http: Client,
    api_base: String,
}

impl HttpControlClient {
    /// Create a client for the given API base (e.g. `http://localhost:17144/api`).
    pub fn new(api_base: impl Into<String>) -> Self {
        Self::with_client(Client::new(), api_base)
    }

    /// Create a client sharing an existing connection pool.
    pub fn with_client(http: Client, api_base: impl Into<String>) -> Self {
        let api_base = api_base.into().trim_end_matches('/').to_string();
        Self { http, api_base }
    }

    /// Base URL requests are issued against.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }
}

#[async_trait]
impl ControlApi for HttpControlClient {
    #[instrument(name = "api_list_channels", skip(self))]
    async fn list_channels(&self) -> TransportResult<Vec<Channel>> {
        let resp = self.http.get(self.url("/channels")).send().await?;
        decode(check(resp).await?).await
    }

    #[instrument(name = "api_create_broadcast", skip(self, req), fields(name = %req.name))]
    async fn create_broadcast(&self, req: &CreateBroadcastRequest) -> TransportResult<Channel> {
        let resp = self
            .http
            .post(self.url("/channels"))
            .json(req)
            .send()
            .await?;
        decode(check(resp).await?).await
    }

    #[instrument(name = "api_create_relay", skip(self, req), fields(id = %req.id))]
    async fn create_relay(&self, req: &CreateRelayRequest) -> TransportResult<Channel> {
        let resp = self
            .http
            .post(self.url("/channels/relay"))
            .json(req)
            .send()
            .await?;
        decode(check(resp).await?).await
    }

    #[instrument(name = "api_delete_channel", skip(self))]
    async fn delete_channel(&self, id: &ChannelId) -> TransportResult<()> {
        let resp = self
            .http
            .delete(self.url(&format!("/channels/{}", path_segment(id)?)))
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }
}

/// Turn a non-success status into [`TransportError::Rejected`].
async fn check(resp: Response) -> TransportResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let message = rejection_message(&body)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());

    debug!(status = status.as_u16(), %message, "Control API rejected request");
    Err(TransportError::Rejected {
        status: status.as_u16(),
        message,
    })
}

/// Status-only check for responses whose body must stay unread.
pub(crate) fn ensure_success(resp: &Response) -> TransportResult<()> {
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }
    Err(TransportError::Rejected {
        status: status.as_u16(),
        message: status.canonical_reason().unwrap_or("request failed").to_string(),
    })
}

async fn decode<T: DeserializeOwned>(resp: Response) -> TransportResult<T> {
    let bytes = resp.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Extract a human-readable reason from an error body.
fn rejection_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["message", "error", "result"] {
            if let Some(serde_json::Value::String(s)) = map.get(key) {
                return Some(s.clone());
            }
        }
    }

    Some(body.to_string())
}
