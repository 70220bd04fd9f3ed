//! Channel data model and request payloads.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Opaque, stable channel identifier assigned by the relay server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    /// Wrap a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the identifier is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ChannelId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A channel as last reported by the control API.
///
/// Identity is [`Channel::id`]; every other field may change between
/// directory refreshes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    /// Channel identifier.
    pub id: ChannelId,

    /// Whether this node originates or relays the channel.
    #[serde(default)]
    pub channel_type: ChannelType,

    /// Display information. Shared and replaced wholesale, never edited.
    #[serde(default)]
    pub info: Arc<ChannelInfo>,

    /// Currently playing track metadata.
    #[serde(default)]
    pub track: TrackInfo,

    /// Lifecycle status on the server.
    #[serde(default)]
    pub status: ChannelStatus,

    /// Creation time (RFC 3339) as reported by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Channel {
    /// Create a channel with the given identifier and info, other fields defaulted.
    pub fn new(id: impl Into<ChannelId>, info: ChannelInfo) -> Self {
        Self {
            id: id.into(),
            channel_type: ChannelType::default(),
            info: Arc::new(info),
            track: TrackInfo::default(),
            status: ChannelStatus::default(),
            created_at: None,
        }
    }

    /// Display name of the channel.
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Whether this channel is originated locally.
    pub fn is_broadcast(&self) -> bool {
        self.channel_type.typ == ChannelKind::Broadcast
    }
}

/// Wire wrapper around [`ChannelKind`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelType {
    #[serde(default)]
    pub typ: ChannelKind,
}

/// Origin of a channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelKind {
    /// This node is the source.
    Broadcast,

    /// Joined from a remote seed peer and re-distributed.
    Relay,

    /// Not reported, or a kind this client does not know.
    #[default]
    #[serde(other)]
    Unknown,
}

/// Server-side lifecycle status of a channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelStatus {
    Init,
    Searching,
    Receiving,
    Idle,
    Finish,
    Error,

    #[default]
    #[serde(other)]
    Unknown,
}

impl ChannelStatus {
    /// Returns a short label for listings.
    pub fn name(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Searching => "searching",
            Self::Receiving => "receiving",
            Self::Idle => "idle",
            Self::Finish => "finish",
            Self::Error => "error",
            Self::Unknown => "unknown",
        }
    }
}

/// Display information block of a channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelInfo {
    pub name: String,
    pub genre: String,
    #[serde(alias = "description")]
    pub desc: String,
    pub comment: String,
    pub url: String,

    /// Stream type tag (e.g. "FLV").
    pub typ: String,
    pub stream_type: String,
    pub stream_ext: String,

    /// Nominal bitrate in kbps.
    pub bitrate: i32,
}

/// Track metadata attached to a channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackInfo {
    pub title: String,
    pub creator: String,
    pub url: String,
    pub album: String,
    pub genre: String,
}

/// Body of `POST /api/channels`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateBroadcastRequest {
    pub name: String,
    pub genre: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Body of `POST /api/channels/relay`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRelayRequest {
    /// Identifier of the channel to join.
    pub id: String,

    /// Seed peer `host:port`, empty when the source URL named none.
    pub host: String,
}

/// A user-issued lifecycle request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleIntent {
    BroadcastCreate { name: String, genre: String },
    RelayCreate { id: ChannelId, source_host: String },
    Drop { id: ChannelId },
}

impl LifecycleIntent {
    /// Returns a simple string representation of the intent.
    pub fn name(&self) -> &'static str {
        match self {
            Self::BroadcastCreate { .. } => "BroadcastCreate",
            Self::RelayCreate { .. } => "RelayCreate",
            Self::Drop { .. } => "Drop",
        }
    }
}

/// Monotonic identifier of a submitted lifecycle intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IntentId(pub u64);

impl fmt::Display for IntentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
