//! Channel directory store.
//!
//! Session-scoped cache of the channel list and the only writer of the
//! directory snapshot. Snapshots are replaced wholesale; readers hold an
//! `Arc` to whichever snapshot was current when they asked.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::Sender;
use parking_lot::RwLock;
use tracing::{debug, info, instrument, warn};

use relaydeck_ipc::{Channel, ChannelId, ClientEvent};
use relaydeck_transport::ControlApi;

use crate::error::ClientError;
use crate::events::EventEmitter;

/// Read-only view of the directory at one point in time.
pub type Snapshot = Arc<Vec<Channel>>;

struct DirectoryState {
    snapshot: Snapshot,

    /// Ticket of the load that produced `snapshot`; 0 before the first load.
    applied_ticket: u64,
}

/// Cached, eventually-refreshed view of the remote channel directory.
pub struct DirectoryStore {
    api: Arc<dyn ControlApi>,
    state: RwLock<DirectoryState>,
    next_ticket: AtomicU64,
    closed: AtomicBool,
    events: EventEmitter,
}

impl DirectoryStore {
    /// Create an empty store backed by `api`.
    pub fn new(api: Arc<dyn ControlApi>) -> Self {
        Self::build(api, EventEmitter::default())
    }

    /// Create an empty store that reports changes on `events`.
    pub fn with_events(api: Arc<dyn ControlApi>, events: Sender<ClientEvent>) -> Self {
        Self::build(api, EventEmitter::new(Some(events)))
    }

    fn build(api: Arc<dyn ControlApi>, events: EventEmitter) -> Self {
        Self {
            api,
            state: RwLock::new(DirectoryState {
                snapshot: Arc::new(Vec::new()),
                applied_ticket: 0,
            }),
            next_ticket: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            events,
        }
    }

    /// Fetch the channel list and replace the snapshot.
    ///
    /// A response is applied only if no load started after this one has
    /// already been applied. On failure the previous snapshot is kept.
    #[instrument(name = "directory_load", skip(self))]
    pub async fn load(&self) -> Result<Snapshot, ClientError> {
        let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst) + 1;
        let result = self.api.list_channels().await;

        match result {
            Ok(channels) => {
                let channels = dedup_last_write_wins(channels);
                let count = channels.len();

                let applied = {
                    let mut state = self.state.write();
                    if self.is_closed() {
                        debug!(ticket, "Directory closed, discarding load result");
                        return Ok(state.snapshot.clone());
                    }
                    if ticket > state.applied_ticket {
                        state.snapshot = Arc::new(channels);
                        state.applied_ticket = ticket;
                        Some(state.snapshot.clone())
                    } else {
                        None
                    }
                };

                match applied {
                    Some(snapshot) => {
                        info!(ticket, count, "Directory updated");
                        self.events.send(ClientEvent::DirectoryUpdated {
                            channels: snapshot.to_vec(),
                        });
                        Ok(snapshot)
                    }
                    None => {
                        debug!(ticket, "Newer directory already applied, dropping stale result");
                        Ok(self.get())
                    }
                }
            }
            Err(e) => {
                let message = e.to_string();
                let superseded = ticket <= self.state.read().applied_ticket;
                if self.is_closed() {
                    debug!(ticket, "Directory closed, ignoring load failure");
                } else if !superseded {
                    warn!(ticket, error = %message, "Directory refresh failed, keeping last snapshot");
                    self.events.send(ClientEvent::DirectoryUnavailable {
                        message: message.clone(),
                    });
                }
                Err(ClientError::DirectoryUnavailable(message))
            }
        }
    }

    /// Reconcile with the server after a lifecycle mutation.
    ///
    /// The server may not reflect a just-issued command yet; the next
    /// successful load is authoritative.
    pub async fn refresh(&self) -> Result<Snapshot, ClientError> {
        self.load().await
    }

    /// Current snapshot. Empty before the first successful load.
    pub fn get(&self) -> Snapshot {
        self.state.read().snapshot.clone()
    }

    /// Look up a channel in the current snapshot.
    pub fn find(&self, id: &ChannelId) -> Option<Channel> {
        self.state.read().snapshot.iter().find(|ch| &ch.id == id).cloned()
    }

    /// Whether the current snapshot lists `id`.
    pub fn contains(&self, id: &ChannelId) -> bool {
        self.state.read().snapshot.iter().any(|ch| &ch.id == id)
    }

    /// Optimistically remove `id` from the local view until the next load.
    ///
    /// Returns true if the channel was present.
    pub fn hide(&self, id: &ChannelId) -> bool {
        let mut state = self.state.write();
        if !state.snapshot.iter().any(|ch| &ch.id == id) {
            return false;
        }
        let remaining: Vec<Channel> = state
            .snapshot
            .iter()
            .filter(|ch| &ch.id != id)
            .cloned()
            .collect();
        state.snapshot = Arc::new(remaining);
        debug!(%id, "Channel hidden pending reconciliation");
        true
    }

    /// Detach the store from its view. In-flight loads no longer apply.
    pub fn close(&self) {
        let _state = self.state.write();
        self.closed.store(true, Ordering::SeqCst);
        debug!("Directory store closed");
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Keep the first position of each identifier, holding its last value.
fn dedup_last_write_wins(channels: Vec<Channel>) -> Vec<Channel> {
    let mut index: HashMap<ChannelId, usize> = HashMap::with_capacity(channels.len());
    let mut out: Vec<Channel> = Vec::with_capacity(channels.len());

    for ch in channels {
        match index.get(&ch.id) {
            Some(&i) => {
                debug!(id = %ch.id, "Duplicate channel id in response");
                out[i] = ch;
            }
            None => {
                index.insert(ch.id.clone(), out.len());
                out.push(ch);
            }
        }
    }

    out
}
