//! Client facade wiring the controllers to one event channel.

use std::sync::Arc;

use crossbeam_channel::Sender;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use relaydeck_ipc::{ChannelId, ClientCommand, ClientEvent, SessionState};
use relaydeck_transport::{
    ControlApi, Endpoints, HttpControlClient, HttpMediaSource, MediaSource, NotifierEvent,
    NotifierHandler, NotifierState, RealtimeNotifier, TransportResult,
};

use crate::directory::DirectoryStore;
use crate::error::ClientError;
use crate::events::EventEmitter;
use crate::lifecycle::{BroadcastDraft, LifecycleController};
use crate::session::{LiveSessionController, MediaSink, SessionId};
use crate::ClientResult;

/// The relay client.
///
/// Owns the directory, lifecycle and playback controllers plus the push
/// channel, all reporting on the same event sender.
pub struct Client {
    endpoints: Endpoints,
    directory: Arc<DirectoryStore>,
    lifecycle: LifecycleController,
    sessions: LiveSessionController,
    notifier: Mutex<RealtimeNotifier>,
    sink: Arc<dyn MediaSink>,
    events: EventEmitter,
}

impl Client {
    /// Create a client talking HTTP to the resolved endpoints.
    pub fn new(endpoints: Endpoints, sink: Arc<dyn MediaSink>, events: Sender<ClientEvent>) -> Self {
        let api = Arc::new(HttpControlClient::new(endpoints.api_base()));
        let source = Arc::new(HttpMediaSource::new());
        Self::with_parts(endpoints, api, source, sink, events)
    }

    /// Create a client over explicit control and media implementations.
    pub fn with_parts(
        endpoints: Endpoints,
        api: Arc<dyn ControlApi>,
        source: Arc<dyn MediaSource>,
        sink: Arc<dyn MediaSink>,
        events: Sender<ClientEvent>,
    ) -> Self {
        let directory = Arc::new(DirectoryStore::with_events(Arc::clone(&api), events.clone()));
        let lifecycle =
            LifecycleController::with_events(api, Arc::clone(&directory), events.clone());
        let sessions =
            LiveSessionController::with_events(endpoints.clone(), source, events.clone());
        let notifier = Mutex::new(RealtimeNotifier::new(endpoints.notifier_url()));

        Self {
            endpoints,
            directory,
            lifecycle,
            sessions,
            notifier,
            sink,
            events: EventEmitter::new(Some(events)),
        }
    }

    /// Dispatch a UI command.
    ///
    /// Failures that no other event reports are also sent as
    /// [`ClientEvent::Error`].
    #[instrument(name = "client_execute", skip(self))]
    pub async fn execute(&self, command: ClientCommand) -> ClientResult<()> {
        debug!(?command, "Handling command");

        let result = match command {
            ClientCommand::LoadDirectory => self.directory.load().await.map(|_| ()),
            ClientCommand::CreateBroadcast {
                name,
                genre,
                desc,
                comment,
            } => {
                let draft = BroadcastDraft {
                    name,
                    genre,
                    desc,
                    comment,
                    url: None,
                };
                self.lifecycle.submit_broadcast(draft).await.map(|_| ())
            }
            ClientCommand::CreateRelay { source_url } => {
                self.lifecycle.create_relay(&source_url).await.map(|_| ())
            }
            ClientCommand::Drop { channel_id } => self.lifecycle.drop_channel(&channel_id).await,
            ClientCommand::OpenPlayback { channel_id } => {
                self.open_playback(channel_id).map(|_| ())
            }
            ClientCommand::ClosePlayback => {
                self.sessions.close();
                Ok(())
            }
            ClientCommand::ConnectNotifier => self.connect_notifier().await,
            ClientCommand::DisconnectNotifier => {
                self.disconnect_notifier().await;
                Ok(())
            }
            ClientCommand::Shutdown => {
                self.shutdown().await;
                Ok(())
            }
        };

        if let Err(e) = &result {
            if e.is_local()
                || matches!(e, ClientError::Notifier(_) | ClientError::PlaybackFailed(_))
            {
                self.events.send(ClientEvent::Error {
                    message: e.to_string(),
                });
            }
        }

        result
    }

    /// Open the player on `channel_id` using the client's sink.
    pub fn open_playback(&self, channel_id: ChannelId) -> ClientResult<SessionId> {
        self.sessions.open(channel_id, Arc::clone(&self.sink))
    }

    /// Open the push channel and forward its messages as events.
    pub async fn connect_notifier(&self) -> ClientResult<()> {
        let events = self.events.clone();
        let handler: NotifierHandler = Box::new(move |event| match event {
            NotifierEvent::Message(text) => events.send(ClientEvent::NotifierMessage(text)),
            NotifierEvent::Disconnected { reason } => {
                events.send(ClientEvent::NotifierDisconnected { reason })
            }
        });

        let mut notifier = self.notifier.lock().await;
        notifier.connect(handler).await.map_err(|e| {
            warn!("Notifier connect failed: {}", e);
            ClientError::Notifier(e)
        })?;

        self.events.send(ClientEvent::NotifierConnected);
        Ok(())
    }

    /// Close the push channel. A no-op when it is not open.
    pub async fn disconnect_notifier(&self) {
        self.notifier.lock().await.disconnect().await;
    }

    /// Close playback, detach the directory and the push channel.
    #[instrument(name = "client_shutdown", skip(self))]
    pub async fn shutdown(&self) {
        info!("Client shutting down");
        self.sessions.close();
        self.directory.close();
        self.disconnect_notifier().await;
        self.events.send(ClientEvent::Shutdown);
    }

    /// Resolved relay endpoints.
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Playlist URL for an external player.
    pub fn playlist_url(&self, id: &ChannelId) -> TransportResult<String> {
        self.endpoints.playlist_url(id)
    }

    /// Channel directory shared with the lifecycle controller.
    pub fn directory(&self) -> &Arc<DirectoryStore> {
        &self.directory
    }

    /// Lifecycle controller.
    pub fn lifecycle(&self) -> &LifecycleController {
        &self.lifecycle
    }

    /// Current playback session state.
    pub fn session_state(&self) -> SessionState {
        self.sessions.state()
    }

    /// Current push channel state.
    pub async fn notifier_state(&self) -> NotifierState {
        self.notifier.lock().await.state()
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.directory.close();
    }
}
