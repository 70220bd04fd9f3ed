//! Network plumbing for relaydeck.
//!
//! This crate resolves the relay's origins and provides the control API
//! client, the live media stream source and the realtime push channel.

mod address;
mod connection;
mod control;
mod error;
mod media;
mod notifier;

pub use address::{path_segment, BuildMode, Endpoints, PageLocation};
pub use connection::{NotifierEvent, NotifierState};
pub use control::{ControlApi, HttpControlClient};
pub use error::TransportError;
pub use media::{HttpMediaSource, MediaSource, MediaStream};
pub use notifier::{NotifierHandler, RealtimeNotifier};

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Relay host used by the development configuration when none is given.
pub const DEFAULT_DEV_HOST: &str = "localhost";

/// Relay port used by the development configuration when none is given.
pub const DEFAULT_DEV_PORT: u16 = 17144;

/// First message sent on a freshly opened push channel.
pub const NOTIFIER_GREETING: &str = "Hello Server!";
