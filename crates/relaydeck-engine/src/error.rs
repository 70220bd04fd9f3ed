//! Client error taxonomy.

use std::fmt;

use thiserror::Error;

use relaydeck_ipc::ChannelId;
use relaydeck_transport::TransportError;

/// Form field a validation error is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Genre,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Name => "name",
            Self::Genre => "genre",
        })
    }
}

/// Errors surfaced to the UI layer.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Local input check failed; nothing was sent.
    #[error("Invalid {field}: {message}")]
    Validation { field: Field, message: String },

    /// Relay source URL could not be parsed.
    #[error("Malformed source URL: {0}")]
    MalformedSourceUrl(String),

    /// Server refused a lifecycle intent.
    #[error("Rejected by server: {0}")]
    RemoteRejected(String),

    /// Directory refresh failed; the previous snapshot is retained.
    #[error("Channel directory unavailable: {0}")]
    DirectoryUnavailable(String),

    /// Decode or network failure mid-stream.
    #[error("Playback failed: {0}")]
    PlaybackFailed(String),

    /// Delete rejected or the channel was already absent.
    #[error("Failed to drop channel {id}: {reason}")]
    ChannelDropFailed { id: ChannelId, reason: String },

    /// Realtime push channel failure.
    #[error("Notifier error: {0}")]
    Notifier(#[source] TransportError),
}

impl ClientError {
    /// Field the error is scoped to, for attaching to a form control.
    pub fn field(&self) -> Option<Field> {
        match self {
            Self::Validation { field, .. } => Some(*field),
            _ => None,
        }
    }

    /// Returns true for errors resolved before any network call.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::MalformedSourceUrl(_))
    }
}

/// Reason text for a transport failure, preferring the server's message.
pub(crate) fn remote_reason(e: &TransportError) -> String {
    match e {
        TransportError::Rejected { message, .. } => message.clone(),
        other => other.to_string(),
    }
}
