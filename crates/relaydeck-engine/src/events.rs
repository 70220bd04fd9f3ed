//! Event emission to the UI.

use crossbeam_channel::Sender;
use tracing::warn;

use relaydeck_ipc::ClientEvent;

/// Optional, non-blocking handle on the UI event channel.
#[derive(Debug, Clone, Default)]
pub(crate) struct EventEmitter {
    tx: Option<Sender<ClientEvent>>,
}

impl EventEmitter {
    pub(crate) fn new(tx: Option<Sender<ClientEvent>>) -> Self {
        Self { tx }
    }

    /// Send without blocking; a full or closed channel drops the event.
    pub(crate) fn send(&self, event: ClientEvent) {
        if let Some(tx) = &self.tx {
            if let Err(e) = tx.try_send(event) {
                warn!("Failed to send event: {}", e);
            }
        }
    }
}
