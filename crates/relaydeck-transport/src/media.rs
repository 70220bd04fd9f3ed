//! Live media stream source.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};
use reqwest::Client;
use tracing::{debug, instrument};

use crate::control::ensure_success;
use crate::error::TransportError;
use crate::TransportResult;

/// Continuous, unbounded stream of media bytes.
pub type MediaStream = BoxStream<'static, TransportResult<Bytes>>;

/// Opens live media streams by URL.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Open the stream at `url`. Resolves once the response headers arrive.
    async fn open_stream(&self, url: &str) -> TransportResult<MediaStream>;
}

/// [`MediaSource`] over a streaming HTTP GET.
#[derive(Debug, Clone, Default)]
pub struct HttpMediaSource {
    http: Client,
}

impl HttpMediaSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Share an existing connection pool.
    pub fn with_client(http: Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl MediaSource for HttpMediaSource {
    #[instrument(name = "media_open_stream", skip(self))]
    async fn open_stream(&self, url: &str) -> TransportResult<MediaStream> {
        let resp = self.http.get(url).send().await?;
        ensure_success(&resp)?;

        debug!(
            content_type = ?resp.headers().get(reqwest::header::CONTENT_TYPE),
            "Media stream opened"
        );

        Ok(resp.bytes_stream().map_err(TransportError::from).boxed())
    }
}
