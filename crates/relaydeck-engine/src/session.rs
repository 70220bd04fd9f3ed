//! Live playback session controller.
//!
//! Binds at most one live decode session to a UI-owned media sink. Sessions
//! are acquired with `open` and released with `close`; a newer `open` takes
//! over the sink and releases the previous session.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use crossbeam_channel::Sender;
use futures_util::StreamExt;
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use relaydeck_ipc::{ChannelId, ClientEvent, CloseReason, SessionState};
use relaydeck_transport::{Endpoints, MediaSource};

use crate::error::ClientError;
use crate::events::EventEmitter;
use crate::ClientResult;

/// UI-owned destination for live media (a video element, a file, a pipe).
///
/// For one session, `attach` is called at most once, every `attach` is
/// followed by exactly one `detach`, and no `append` follows `detach`.
#[async_trait]
pub trait MediaSink: Send + Sync {
    /// Resolves once the sink is mounted and can accept media.
    async fn wait_ready(&self);

    /// Bind the sink to a channel's stream.
    fn attach(&self, channel_id: &ChannelId, stream_url: &str);

    /// Feed the next chunk of the live stream.
    fn append(&self, chunk: Bytes);

    /// Release the binding and any buffered media.
    fn detach(&self);
}

/// Identifier of one `open` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

#[derive(Default)]
struct Binding {
    closed: bool,
    attached: bool,
}

/// Close the binding once, detaching the sink if it was attached.
fn release_binding(binding: &Mutex<Binding>, sink: &dyn MediaSink) {
    let mut binding = binding.lock();
    if binding.closed {
        return;
    }
    binding.closed = true;
    if binding.attached {
        sink.detach();
    }
}

struct ActiveSession {
    id: SessionId,
    channel_id: ChannelId,
    sink: Arc<dyn MediaSink>,
    binding: Arc<Mutex<Binding>>,
    task: JoinHandle<()>,
}

impl ActiveSession {
    fn release(self) {
        self.task.abort();
        release_binding(&self.binding, self.sink.as_ref());
    }
}

struct Shared {
    active: Mutex<Option<ActiveSession>>,
    state: RwLock<SessionState>,
    events: EventEmitter,
}

impl Shared {
    fn transition_to(&self, new_state: SessionState) {
        let previous = std::mem::replace(&mut *self.state.write(), new_state.clone());

        debug!(
            previous = %previous.name(),
            current = %new_state.name(),
            "Session transition"
        );

        self.events.send(ClientEvent::SessionChanged {
            previous: Box::new(previous),
            current: Box::new(new_state),
        });
    }

    /// Transition only if `id` is still the active session.
    fn transition_if_current(&self, id: SessionId, new_state: SessionState) -> bool {
        let active = self.active.lock();
        if active.as_ref().map(|s| s.id) != Some(id) {
            return false;
        }
        self.transition_to(new_state);
        true
    }

    /// Session-initiated teardown after stream end or failure.
    fn finish(
        &self,
        id: SessionId,
        channel_id: &ChannelId,
        reason: CloseReason,
        binding: &Mutex<Binding>,
        sink: &dyn MediaSink,
    ) {
        let mut active = self.active.lock();
        release_binding(binding, sink);
        if active.as_ref().map(|s| s.id) != Some(id) {
            return;
        }
        active.take();
        self.transition_to(SessionState::Idle);
        drop(active);

        match reason {
            CloseReason::PlaybackFailed { message } => {
                warn!(%channel_id, %message, "Playback failed");
                self.events.send(ClientEvent::PlaybackFailed {
                    channel_id: channel_id.clone(),
                    message,
                });
            }
            reason => {
                info!(%channel_id, reason = %reason.message(), "Playback ended");
                self.events.send(ClientEvent::PlaybackEnded {
                    channel_id: channel_id.clone(),
                    reason,
                });
            }
        }
    }
}

/// Owns the single live playback session of one player.
///
/// No automatic reconnection: after a failure the caller may `open` again.
pub struct LiveSessionController {
    endpoints: Endpoints,
    source: Arc<dyn MediaSource>,
    shared: Arc<Shared>,
    next_session: AtomicU64,
}

impl LiveSessionController {
    /// Create a controller resolving stream URLs through `endpoints`.
    pub fn new(endpoints: Endpoints, source: Arc<dyn MediaSource>) -> Self {
        Self::build(endpoints, source, EventEmitter::default())
    }

    /// Create a controller that reports session changes on `events`.
    pub fn with_events(
        endpoints: Endpoints,
        source: Arc<dyn MediaSource>,
        events: Sender<ClientEvent>,
    ) -> Self {
        Self::build(endpoints, source, EventEmitter::new(Some(events)))
    }

    fn build(endpoints: Endpoints, source: Arc<dyn MediaSource>, events: EventEmitter) -> Self {
        Self {
            endpoints,
            source,
            shared: Arc::new(Shared {
                active: Mutex::new(None),
                state: RwLock::new(SessionState::Idle),
                events,
            }),
            next_session: AtomicU64::new(1),
        }
    }

    /// Open a live session for `channel_id` on `sink`.
    ///
    /// Returns immediately; attachment waits for the sink to become ready.
    /// Any session already open is closed first. An id that cannot be
    /// addressed fails with [`ClientError::PlaybackFailed`] and leaves the
    /// open session untouched. Must be called from within a tokio runtime.
    #[instrument(name = "session_open", skip(self, sink))]
    pub fn open(
        &self,
        channel_id: ChannelId,
        sink: Arc<dyn MediaSink>,
    ) -> ClientResult<SessionId> {
        let stream_url = self.endpoints.stream_url(&channel_id).map_err(|e| {
            warn!(%channel_id, "Cannot open playback: {}", e);
            ClientError::PlaybackFailed(e.to_string())
        })?;
        let id = SessionId(self.next_session.fetch_add(1, Ordering::SeqCst));
        let binding = Arc::new(Mutex::new(Binding::default()));

        let mut active = self.shared.active.lock();

        let replaced = active.take().map(|previous| {
            let previous_channel = previous.channel_id.clone();
            debug!(previous = %previous_channel, "Replacing open session");
            previous.release();
            previous_channel
        });

        self.shared.transition_to(SessionState::AwaitingSink {
            channel_id: channel_id.clone(),
        });

        let task = tokio::spawn(run_session(
            Arc::clone(&self.shared),
            Arc::clone(&self.source),
            id,
            channel_id.clone(),
            stream_url,
            Arc::clone(&sink),
            Arc::clone(&binding),
        ));

        *active = Some(ActiveSession {
            id,
            channel_id,
            sink,
            binding,
            task,
        });
        drop(active);

        if let Some(channel_id) = replaced {
            self.shared.events.send(ClientEvent::PlaybackEnded {
                channel_id,
                reason: CloseReason::Replaced,
            });
        }

        Ok(id)
    }

    /// Release the open session. A no-op when nothing is open.
    ///
    /// Returns true if a session was closed.
    #[instrument(name = "session_close", skip(self))]
    pub fn close(&self) -> bool {
        let mut active = self.shared.active.lock();
        let Some(session) = active.take() else {
            debug!("No open session, ignoring close");
            return false;
        };

        let channel_id = session.channel_id.clone();
        session.release();
        self.shared.transition_to(SessionState::Idle);
        drop(active);

        info!(%channel_id, "Playback closed");
        self.shared.events.send(ClientEvent::PlaybackEnded {
            channel_id,
            reason: CloseReason::UserRequested,
        });
        true
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.shared.state.read().clone()
    }

    /// Channel of the open session, if any.
    pub fn active_channel(&self) -> Option<ChannelId> {
        self.shared
            .active
            .lock()
            .as_ref()
            .map(|s| s.channel_id.clone())
    }

    /// Whether a session is open.
    pub fn is_open(&self) -> bool {
        self.shared.active.lock().is_some()
    }
}

impl Drop for LiveSessionController {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_session(
    shared: Arc<Shared>,
    source: Arc<dyn MediaSource>,
    id: SessionId,
    channel_id: ChannelId,
    stream_url: String,
    sink: Arc<dyn MediaSink>,
    binding: Arc<Mutex<Binding>>,
) {
    sink.wait_ready().await;

    let connecting = SessionState::Connecting {
        channel_id: channel_id.clone(),
        stream_url: stream_url.clone(),
    };
    if !shared.transition_if_current(id, connecting) {
        return;
    }

    let mut stream = match source.open_stream(&stream_url).await {
        Ok(stream) => stream,
        Err(e) => {
            let reason = CloseReason::PlaybackFailed {
                message: e.to_string(),
            };
            shared.finish(id, &channel_id, reason, &binding, sink.as_ref());
            return;
        }
    };

    {
        let mut bound = binding.lock();
        if bound.closed {
            return;
        }
        sink.attach(&channel_id, &stream_url);
        bound.attached = true;
    }

    let playing = SessionState::Playing {
        channel_id: channel_id.clone(),
        stream_url: stream_url.clone(),
    };
    if !shared.transition_if_current(id, playing) {
        release_binding(&binding, sink.as_ref());
        return;
    }
    info!(%channel_id, %stream_url, "Playback started");

    let mut chunks: u64 = 0;
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(bytes) => {
                let bound = binding.lock();
                if bound.closed {
                    return;
                }
                sink.append(bytes);
                chunks += 1;
            }
            Err(e) => {
                let reason = CloseReason::PlaybackFailed {
                    message: e.to_string(),
                };
                shared.finish(id, &channel_id, reason, &binding, sink.as_ref());
                return;
            }
        }
    }

    debug!(%channel_id, chunks, "Media stream ended");
    shared.finish(id, &channel_id, CloseReason::StreamEnded, &binding, sink.as_ref());
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaydeck_transport::{BuildMode, PageLocation};

    use crate::test_support::{rejected, wait_until, FakeMediaSource, FakeSink, SinkCall};

    fn endpoints() -> Endpoints {
        Endpoints::resolve(&PageLocation::new("relay", 7144), &BuildMode::Production)
    }

    fn controller(source: &Arc<FakeMediaSource>) -> LiveSessionController {
        LiveSessionController::new(endpoints(), source.clone())
    }

    #[tokio::test]
    async fn open_attaches_and_streams() {
        let source = FakeMediaSource::new();
        let sessions = controller(&source);
        let sink = FakeSink::mounted();

        sessions.open("abc".into(), sink.clone()).unwrap();
        wait_until(|| sessions.state().is_playing()).await;

        assert_eq!(source.opened(), ["http://relay:7144/stream/abc"]);
        source.feed(0).send(Ok(Bytes::from_static(b"one"))).unwrap();
        source.feed(0).send(Ok(Bytes::from_static(b"two"))).unwrap();
        wait_until(|| sink.calls().len() == 3).await;

        assert_eq!(
            sink.calls(),
            [
                SinkCall::Attach("abc".into()),
                SinkCall::Append(Bytes::from_static(b"one")),
                SinkCall::Append(Bytes::from_static(b"two")),
            ]
        );
    }

    #[tokio::test]
    async fn attachment_waits_for_sink_mount() {
        let source = FakeMediaSource::new();
        let sessions = controller(&source);
        let sink = FakeSink::unmounted();

        sessions.open("abc".into(), sink.clone()).unwrap();
        tokio::task::yield_now().await;

        assert!(matches!(sessions.state(), SessionState::AwaitingSink { .. }));
        assert!(source.opened().is_empty());

        sink.mount();
        wait_until(|| sink.attach_count() == 1).await;
        assert_eq!(sessions.active_channel(), Some("abc".into()));
    }

    #[tokio::test]
    async fn rapid_reopen_leaves_only_latest_session() {
        let source = FakeMediaSource::new();
        let sessions = controller(&source);
        let sink_a = FakeSink::mounted();
        let sink_b = FakeSink::mounted();

        sessions.open("a".into(), sink_a.clone()).unwrap();
        sessions.open("b".into(), sink_b.clone()).unwrap();
        wait_until(|| sessions.state().is_playing()).await;

        assert_eq!(sessions.active_channel(), Some("b".into()));
        assert_eq!(sink_b.attach_count(), 1);
        assert_eq!(sink_a.attach_count(), sink_a.detach_count());
        assert_eq!(source.opened(), ["http://relay:7144/stream/b"]);
    }

    #[tokio::test]
    async fn reopen_releases_playing_session() {
        let source = FakeMediaSource::new();
        let sessions = controller(&source);
        let sink = FakeSink::mounted();

        sessions.open("a".into(), sink.clone()).unwrap();
        wait_until(|| sessions.state().is_playing()).await;
        sessions.open("b".into(), sink.clone()).unwrap();
        wait_until(|| sink.attach_count() == 2).await;

        assert_eq!(
            sink.calls(),
            [
                SinkCall::Attach("a".into()),
                SinkCall::Detach,
                SinkCall::Attach("b".into()),
            ]
        );
        wait_until(|| source.is_released(0)).await;
        assert!(!source.is_released(1));
    }

    #[tokio::test]
    async fn close_without_open_is_noop() {
        let sessions = controller(&FakeMediaSource::new());
        assert!(!sessions.close());
        assert!(sessions.state().is_idle());
    }

    #[tokio::test]
    async fn close_detaches_once() {
        let source = FakeMediaSource::new();
        let (tx, rx) = relaydeck_ipc::event_channel();
        let sessions = LiveSessionController::with_events(endpoints(), source.clone(), tx);
        let sink = FakeSink::mounted();

        sessions.open("abc".into(), sink.clone()).unwrap();
        wait_until(|| sessions.state().is_playing()).await;

        assert!(sessions.close());
        assert!(!sessions.close());
        assert_eq!(sink.detach_count(), 1);
        assert!(sessions.state().is_idle());
        wait_until(|| source.is_released(0)).await;

        let ended = rx.try_iter().any(|e| {
            matches!(e, ClientEvent::PlaybackEnded { reason: CloseReason::UserRequested, .. })
        });
        assert!(ended);
    }

    #[tokio::test]
    async fn close_before_mount_never_attaches() {
        let source = FakeMediaSource::new();
        let sessions = controller(&source);
        let sink = FakeSink::unmounted();

        sessions.open("abc".into(), sink.clone()).unwrap();
        sessions.close();
        sink.mount();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert!(sink.calls().is_empty());
        assert!(source.opened().is_empty());
    }

    #[tokio::test]
    async fn stream_error_reports_failure_and_closes() {
        let source = FakeMediaSource::new();
        let (tx, rx) = relaydeck_ipc::event_channel();
        let sessions = LiveSessionController::with_events(endpoints(), source.clone(), tx);
        let sink = FakeSink::mounted();

        sessions.open("abc".into(), sink.clone()).unwrap();
        wait_until(|| sessions.state().is_playing()).await;
        source.feed(0).send(Err(rejected(502, "reset"))).unwrap();
        wait_until(|| !sessions.is_open()).await;

        assert!(sessions.state().is_idle());
        assert_eq!(sink.detach_count(), 1);
        assert_eq!(source.opened().len(), 1);
        let failed = rx
            .try_iter()
            .find(|e| matches!(e, ClientEvent::PlaybackFailed { .. }));
        assert!(failed.is_some());
    }

    #[tokio::test]
    async fn open_failure_never_attaches() {
        let source = FakeMediaSource::new();
        source.fail_next_open(rejected(404, "Not Found"));
        let sessions = controller(&source);
        let sink = FakeSink::mounted();

        sessions.open("gone".into(), sink.clone()).unwrap();
        wait_until(|| !sessions.is_open()).await;

        assert!(sink.calls().is_empty());
        assert!(sessions.state().is_idle());
    }

    #[tokio::test]
    async fn unaddressable_id_fails_and_keeps_current_session() {
        let source = FakeMediaSource::new();
        let sessions = controller(&source);
        let sink = FakeSink::mounted();

        sessions.open("abc".into(), sink.clone()).unwrap();
        wait_until(|| sessions.state().is_playing()).await;

        let err = sessions.open("..".into(), sink.clone()).unwrap_err();

        assert!(matches!(err, ClientError::PlaybackFailed(_)));
        assert_eq!(sessions.active_channel(), Some("abc".into()));
        assert_eq!(sink.detach_count(), 0);
        assert_eq!(source.opened().len(), 1);
    }

    #[tokio::test]
    async fn stream_end_closes_session() {
        let source = FakeMediaSource::new();
        let sessions = controller(&source);
        let sink = FakeSink::mounted();

        sessions.open("abc".into(), sink.clone()).unwrap();
        wait_until(|| sessions.state().is_playing()).await;
        source.end(0);
        wait_until(|| !sessions.is_open()).await;

        assert_eq!(sink.detach_count(), 1);
        assert!(!sessions.close());
    }
}
