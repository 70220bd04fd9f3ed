//! Events sent from the client to the UI.

use serde::{Deserialize, Serialize};

use crate::state::{CloseReason, IntentState, SessionState};
use crate::types::{Channel, ChannelId, IntentId, LifecycleIntent};

/// Events that the client can send to the UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientEvent {
    /// A fresh directory snapshot was applied.
    DirectoryUpdated { channels: Vec<Channel> },

    /// A refresh failed; the previous snapshot is retained.
    DirectoryUnavailable { message: String },

    /// A lifecycle intent changed state.
    IntentChanged {
        id: IntentId,
        intent: LifecycleIntent,
        state: IntentState,
    },

    /// Playback session state has changed.
    SessionChanged {
        /// Previous state.
        previous: Box<SessionState>,

        /// Current state.
        current: Box<SessionState>,
    },

    /// The playback session failed and has been closed.
    PlaybackFailed {
        channel_id: ChannelId,
        message: String,
    },

    /// The playback session was closed without failure.
    PlaybackEnded {
        channel_id: ChannelId,
        reason: CloseReason,
    },

    /// The realtime push channel is open.
    NotifierConnected,

    /// Opaque text message from the push channel.
    NotifierMessage(String),

    /// The push channel closed or was lost.
    NotifierDisconnected { reason: Option<String> },

    /// Error occurred.
    Error {
        /// Error message.
        message: String,
    },

    /// Client has shut down.
    Shutdown,
}
