//! Push channel connection state.

/// Connection state for the realtime notifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum NotifierState {
    /// Not connected.
    #[default]
    Disconnected,

    /// Opening the socket.
    Connecting,

    /// Connected and receiving.
    Connected,

    /// Connection dropped by the peer or the network. Not retried.
    Lost { reason: String },
}

impl NotifierState {
    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Check if the connection was lost.
    pub fn is_lost(&self) -> bool {
        matches!(self, Self::Lost { .. })
    }

    /// Get status message for UI.
    pub fn message(&self) -> String {
        match self {
            Self::Disconnected => "Disconnected".to_string(),
            Self::Connecting => "Connecting...".to_string(),
            Self::Connected => "Connected".to_string(),
            Self::Lost { reason } => format!("Lost: {}", reason),
        }
    }
}

/// Event delivered to the notifier's registered handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifierEvent {
    /// Opaque application text, in arrival order.
    Message(String),

    /// The channel closed. `None` when closed locally.
    Disconnected { reason: Option<String> },
}
