//! Typed UI<->client messages for relaydeck.
//!
//! This crate defines the channel data model and all the message types used
//! between the UI layer and the client core.

mod commands;
mod events;
mod state;
mod types;

pub use commands::ClientCommand;
pub use events::ClientEvent;
pub use state::{CloseReason, IntentState, SessionState};
pub use types::{
    Channel, ChannelId, ChannelInfo, ChannelKind, ChannelStatus, ChannelType,
    CreateBroadcastRequest, CreateRelayRequest, IntentId, LifecycleIntent, TrackInfo,
};

use crossbeam_channel::{Receiver, Sender};

/// Default channel capacity for events (client → UI).
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Creates a bounded event channel.
pub fn event_channel() -> (Sender<ClientEvent>, Receiver<ClientEvent>) {
    event_channel_with_capacity(EVENT_CHANNEL_CAPACITY)
}

/// Creates a bounded event channel with an explicit capacity.
pub fn event_channel_with_capacity(capacity: usize) -> (Sender<ClientEvent>, Receiver<ClientEvent>) {
    crossbeam_channel::bounded(capacity.max(1))
}
