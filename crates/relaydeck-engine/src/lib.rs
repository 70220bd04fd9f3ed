//! Client core for relaydeck.
//!
//! This crate keeps the channel directory, issues lifecycle intents and
//! owns the live playback session, reporting to the UI over one event
//! channel.

mod directory;
mod error;
mod events;
mod lifecycle;
mod orchestrator;
mod session;

#[cfg(test)]
mod test_support;

pub use directory::{DirectoryStore, Snapshot};
pub use error::{ClientError, Field};
pub use lifecycle::{
    parse_relay_source, BroadcastDraft, LifecycleController, GENRE_MAX_CHARS, NAME_MAX_CHARS,
    SEED_HOST_PARAM,
};
pub use orchestrator::Client;
pub use session::{LiveSessionController, MediaSink, SessionId};

use std::sync::Arc;

use crossbeam_channel::Sender;
use relaydeck_ipc::ClientEvent;
use relaydeck_transport::Endpoints;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Create a client instance reporting on `event_tx`.
pub fn create_client(
    endpoints: Endpoints,
    sink: Arc<dyn MediaSink>,
    event_tx: Sender<ClientEvent>,
) -> Client {
    Client::new(endpoints, sink, event_tx)
}
