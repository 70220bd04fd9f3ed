//! Control-API and media origin resolution.
//!
//! A pure function of the page location and the build mode: in development the
//! override pair wins, otherwise the page's own host and port are used.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use relaydeck_ipc::ChannelId;

use crate::error::TransportError;
use crate::{TransportResult, DEFAULT_DEV_HOST, DEFAULT_DEV_PORT};

/// Bytes escaped when a channel id becomes a single path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Host and port the UI was served from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLocation {
    pub host: String,
    pub port: u16,
}

impl PageLocation {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

/// Build configuration the client runs under.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BuildMode {
    /// Served by the relay itself; the page origin is the server.
    #[default]
    Production,

    /// Served by a dev server; talk to this relay instead.
    Development { host: String, port: u16 },
}

impl BuildMode {
    /// Development mode pointed at the default local relay.
    pub fn development_default() -> Self {
        Self::Development {
            host: DEFAULT_DEV_HOST.to_string(),
            port: DEFAULT_DEV_PORT,
        }
    }

    /// Returns true for the development configuration.
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development { .. })
    }
}

/// Resolved origins for the control API, media streams and playlists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    authority: String,
}

impl Endpoints {
    /// Resolve endpoints for a page location under a build mode.
    pub fn resolve(page: &PageLocation, mode: &BuildMode) -> Self {
        let (host, port) = match mode {
            BuildMode::Development { host, port } => (host.as_str(), *port),
            BuildMode::Production => (page.host.as_str(), page.port),
        };

        Self {
            authority: authority(host, port),
        }
    }

    /// `host:port` the client talks to.
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Base URL of the control API.
    pub fn api_base(&self) -> String {
        format!("http://{}/api", self.authority)
    }

    /// Live media stream URL for a channel.
    pub fn stream_url(&self, id: &ChannelId) -> TransportResult<String> {
        Ok(format!("http://{}/stream/{}", self.authority, path_segment(id)?))
    }

    /// Playlist URL for handing a channel to an external player.
    pub fn playlist_url(&self, id: &ChannelId) -> TransportResult<String> {
        Ok(format!("http://{}/pls/{}", self.authority, path_segment(id)?))
    }

    /// Realtime push channel URL.
    pub fn notifier_url(&self) -> String {
        format!("ws://{}/ws", self.authority)
    }
}

/// Percent-encode `id` as exactly one URL path segment.
///
/// Empty and dot-only ids cannot be expressed as a segment and are refused.
pub fn path_segment(id: &ChannelId) -> TransportResult<String> {
    if matches!(id.as_str(), "" | "." | "..") {
        return Err(TransportError::InvalidChannelId(id.to_string()));
    }
    Ok(utf8_percent_encode(id.as_str(), PATH_SEGMENT).to_string())
}

fn authority(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}
