//! Realtime push channel.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, instrument, warn};

use crate::connection::{NotifierEvent, NotifierState};
use crate::error::TransportError;
use crate::{TransportResult, NOTIFIER_GREETING};

/// Receives notifier events in arrival order.
pub type NotifierHandler = Box<dyn FnMut(NotifierEvent) + Send + 'static>;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Text push channel to the relay (`ws://{host}:{port}/ws`).
///
/// Connection loss is reported to the handler and never retried here.
pub struct RealtimeNotifier {
    url: String,
    state: Arc<RwLock<NotifierState>>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl RealtimeNotifier {
    /// Create a notifier for the given WebSocket URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            state: Arc::new(RwLock::new(NotifierState::Disconnected)),
            shutdown: None,
            task: None,
        }
    }

    /// Open the channel, send the greeting and start delivering messages.
    #[instrument(name = "notifier_connect", skip(self, handler), fields(url = %self.url))]
    pub async fn connect(&mut self, handler: NotifierHandler) -> TransportResult<()> {
        if self.state.read().is_connected() {
            return Err(TransportError::AlreadyConnected);
        }
        self.reap().await;

        *self.state.write() = NotifierState::Connecting;

        let mut socket = match self.open().await {
            Ok(socket) => socket,
            Err(e) => {
                *self.state.write() = NotifierState::Disconnected;
                return Err(e);
            }
        };

        if let Err(e) = socket.send(Message::Text(NOTIFIER_GREETING.to_string())).await {
            *self.state.write() = NotifierState::Disconnected;
            return Err(e.into());
        }

        *self.state.write() = NotifierState::Connected;
        info!("Notifier connected");

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let state = Arc::clone(&self.state);
        self.shutdown = Some(shutdown_tx);
        self.task = Some(tokio::spawn(read_loop(socket, shutdown_rx, state, handler)));

        Ok(())
    }

    /// Close the channel. Safe to call repeatedly or before `connect`.
    #[instrument(name = "notifier_disconnect", skip(self))]
    pub async fn disconnect(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        self.reap().await;
        *self.state.write() = NotifierState::Disconnected;
    }

    /// Get the current connection state.
    pub fn state(&self) -> NotifierState {
        self.state.read().clone()
    }

    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        self.state.read().is_connected()
    }

    async fn open(&self) -> TransportResult<Socket> {
        let (socket, response) = connect_async(self.url.as_str()).await?;
        debug!(status = %response.status(), "WebSocket handshake complete");
        Ok(socket)
    }

    /// Wait for a finished reader task so it is not leaked.
    async fn reap(&mut self) {
        self.shutdown = None;
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Notifier reader task failed: {}", e);
            }
        }
    }
}

impl Drop for RealtimeNotifier {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

async fn read_loop(
    mut socket: Socket,
    mut shutdown: oneshot::Receiver<()>,
    state: Arc<RwLock<NotifierState>>,
    mut handler: NotifierHandler,
) {
    let lost_reason = loop {
        tokio::select! {
            _ = &mut shutdown => {
                if let Err(e) = socket.close(None).await {
                    debug!("Close handshake failed: {}", e);
                }
                handler(NotifierEvent::Disconnected { reason: None });
                return;
            }
            msg = socket.next() => match msg {
                Some(Ok(Message::Text(text))) => handler(NotifierEvent::Message(text)),
                Some(Ok(Message::Close(frame))) => {
                    break frame
                        .map(|f| f.reason.to_string())
                        .filter(|r| !r.is_empty())
                        .unwrap_or_else(|| "closed by peer".to_string());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => break e.to_string(),
                None => break "stream ended".to_string(),
            }
        }
    };

    warn!(reason = %lost_reason, "Notifier connection lost");
    *state.write() = NotifierState::Lost {
        reason: lost_reason.clone(),
    };
    handler(NotifierEvent::Disconnected {
        reason: Some(lost_reason),
    });
}
