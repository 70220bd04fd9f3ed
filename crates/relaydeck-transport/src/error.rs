//! Error types for the transport module.

use thiserror::Error;

/// Errors that can occur during transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Request could not be sent or the response could not be read.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status.
    #[error("Rejected by server ({status}): {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,

        /// Server-reported reason.
        message: String,
    },

    /// Response body did not match the expected shape.
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Channel id that cannot be placed in a URL path.
    #[error("Invalid channel id: {0:?}")]
    InvalidChannelId(String),

    /// WebSocket protocol or connect failure.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] Box<tokio_tungstenite::tungstenite::Error>),

    /// Already connected.
    #[error("Already connected")]
    AlreadyConnected,
}

impl TransportError {
    /// Returns the HTTP status if the server rejected the request.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Returns true if the server reported the resource as absent.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(e))
    }
}
