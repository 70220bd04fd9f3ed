//! Lifecycle intent and playback session state machines.

use serde::{Deserialize, Serialize};

use crate::types::ChannelId;

/// State of a submitted lifecycle intent.
///
/// `Pending` is entered on submit and left exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntentState {
    /// Sent to the control API, awaiting a response.
    Pending,

    /// Accepted by the server.
    Succeeded,

    /// Refused by the server or failed in transit.
    Rejected {
        /// Server-reported or transport reason.
        reason: String,
    },
}

impl IntentState {
    /// Returns true while the intent awaits a response.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Returns true once the intent has left `Pending`.
    pub fn is_settled(&self) -> bool {
        !self.is_pending()
    }

    /// Returns a simple string representation of the state.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Succeeded => "Succeeded",
            Self::Rejected { .. } => "Rejected",
        }
    }
}

/// State of the live playback session owned by one player.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// No session open.
    #[default]
    Idle,

    /// Session opened, waiting for the media sink to mount.
    AwaitingSink { channel_id: ChannelId },

    /// Sink ready, opening the media stream.
    Connecting {
        channel_id: ChannelId,
        stream_url: String,
    },

    /// Media is flowing into the sink.
    Playing {
        channel_id: ChannelId,
        stream_url: String,
    },
}

impl SessionState {
    /// Returns true if no session is open.
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Returns true if media is flowing.
    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Playing { .. })
    }

    /// Channel bound to the session, if any.
    pub fn channel_id(&self) -> Option<&ChannelId> {
        match self {
            Self::Idle => None,
            Self::AwaitingSink { channel_id }
            | Self::Connecting { channel_id, .. }
            | Self::Playing { channel_id, .. } => Some(channel_id),
        }
    }

    /// Returns a simple string representation of the state.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::AwaitingSink { .. } => "AwaitingSink",
            Self::Connecting { .. } => "Connecting",
            Self::Playing { .. } => "Playing",
        }
    }
}

/// Reason a playback session was closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    /// Caller closed the player.
    UserRequested,

    /// A newer `open` took over the sink.
    Replaced,

    /// The server ended the stream.
    StreamEnded,

    /// Decode or network failure mid-stream.
    PlaybackFailed { message: String },
}

impl CloseReason {
    /// Returns a display message for this reason.
    pub fn message(&self) -> String {
        match self {
            Self::UserRequested => "Playback closed by user".to_string(),
            Self::Replaced => "Playback replaced by another channel".to_string(),
            Self::StreamEnded => "Stream ended".to_string(),
            Self::PlaybackFailed { message } => format!("Playback failed: {message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_state_reports_bound_channel() {
        let id = ChannelId::from("abc");
        assert_eq!(SessionState::Idle.channel_id(), None);
        let state = SessionState::Playing {
            channel_id: id.clone(),
            stream_url: "http://h:1/stream/abc".into(),
        };
        assert_eq!(state.channel_id(), Some(&id));
        assert!(state.is_playing());
        assert_eq!(state.name(), "Playing");
    }

    #[test]
    fn intent_settles_once_out_of_pending() {
        assert!(!IntentState::Pending.is_settled());
        assert!(IntentState::Succeeded.is_settled());
        assert!(IntentState::Rejected { reason: "x".into() }.is_settled());
    }
}
