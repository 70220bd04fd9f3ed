//! In-memory fakes shared by the engine tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_stream::wrappers::UnboundedReceiverStream;

use relaydeck_ipc::{Channel, ChannelId, ChannelInfo, CreateBroadcastRequest, CreateRelayRequest};
use relaydeck_transport::{ControlApi, MediaSource, MediaStream, TransportError, TransportResult};

use crate::session::MediaSink;

pub(crate) fn channel(id: &str, name: &str) -> Channel {
    Channel::new(
        id,
        ChannelInfo {
            name: name.to_string(),
            ..Default::default()
        },
    )
}

pub(crate) fn rejected(status: u16, message: &str) -> TransportError {
    TransportError::Rejected {
        status,
        message: message.to_string(),
    }
}

/// Poll `cond` until it holds or a few seconds pass.
pub(crate) async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

/// Scripted control API. `list_channels` responses are queued; a queued
/// gate delays the matching response until released.
#[derive(Default)]
pub(crate) struct FakeControlApi {
    lists: Mutex<VecDeque<(Option<oneshot::Receiver<()>>, TransportResult<Vec<Channel>>)>>,
    server: Mutex<Vec<Channel>>,
    create_result: Mutex<Option<TransportResult<Channel>>>,
    delete_result: Mutex<Option<TransportResult<()>>>,
    pub calls: AtomicUsize,
    pub relay_requests: Mutex<Vec<CreateRelayRequest>>,
    pub broadcast_requests: Mutex<Vec<CreateBroadcastRequest>>,
}

impl FakeControlApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Serve `channels` from every unscripted `list_channels` call.
    pub fn set_server(&self, channels: Vec<Channel>) {
        *self.server.lock() = channels;
    }

    pub fn push_list(&self, result: TransportResult<Vec<Channel>>) {
        self.lists.lock().push_back((None, result));
    }

    /// Queue a list response that resolves only when the returned sender fires.
    pub fn push_gated_list(&self, result: TransportResult<Vec<Channel>>) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.lists.lock().push_back((Some(rx), result));
        tx
    }

    pub fn set_create_result(&self, result: TransportResult<Channel>) {
        *self.create_result.lock() = Some(result);
    }

    pub fn set_delete_result(&self, result: TransportResult<()>) {
        *self.delete_result.lock() = Some(result);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ControlApi for FakeControlApi {
    async fn list_channels(&self) -> TransportResult<Vec<Channel>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.lists.lock().pop_front();
        match scripted {
            Some((gate, result)) => {
                if let Some(gate) = gate {
                    let _ = gate.await;
                }
                result
            }
            None => Ok(self.server.lock().clone()),
        }
    }

    async fn create_broadcast(&self, req: &CreateBroadcastRequest) -> TransportResult<Channel> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.broadcast_requests.lock().push(req.clone());
        match self.create_result.lock().take() {
            Some(result) => {
                if let Ok(ch) = &result {
                    self.server.lock().push(ch.clone());
                }
                result
            }
            None => {
                let ch = channel(&format!("bc-{}", req.name), &req.name);
                self.server.lock().push(ch.clone());
                Ok(ch)
            }
        }
    }

    async fn create_relay(&self, req: &CreateRelayRequest) -> TransportResult<Channel> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.relay_requests.lock().push(req.clone());
        match self.create_result.lock().take() {
            Some(result) => result,
            None => {
                let ch = channel(&req.id, "");
                self.server.lock().push(ch.clone());
                Ok(ch)
            }
        }
    }

    async fn delete_channel(&self, id: &ChannelId) -> TransportResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(result) = self.delete_result.lock().take() {
            return result;
        }
        let mut server = self.server.lock();
        let before = server.len();
        server.retain(|ch| &ch.id != id);
        if server.len() == before {
            Err(rejected(404, "Not Found"))
        } else {
            Ok(())
        }
    }
}

/// Media source whose streams are fed by the test through `feed`.
#[derive(Default)]
pub(crate) struct FakeMediaSource {
    feeds: Mutex<Vec<(String, mpsc::UnboundedSender<TransportResult<Bytes>>)>>,
    fail_open: Mutex<Option<TransportError>>,
}

impl FakeMediaSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_next_open(&self, e: TransportError) {
        *self.fail_open.lock() = Some(e);
    }

    /// URLs opened so far, in order.
    pub fn opened(&self) -> Vec<String> {
        self.feeds.lock().iter().map(|(url, _)| url.clone()).collect()
    }

    /// Sender feeding the n-th opened stream.
    pub fn feed(&self, n: usize) -> mpsc::UnboundedSender<TransportResult<Bytes>> {
        self.feeds.lock()[n].1.clone()
    }

    /// End the n-th stream.
    pub fn end(&self, n: usize) {
        let (tx, _) = mpsc::unbounded_channel();
        self.feeds.lock()[n].1 = tx;
    }

    /// Whether the consumer of the n-th stream has gone away.
    pub fn is_released(&self, n: usize) -> bool {
        self.feeds.lock()[n].1.is_closed()
    }
}

#[async_trait]
impl MediaSource for FakeMediaSource {
    async fn open_stream(&self, url: &str) -> TransportResult<MediaStream> {
        if let Some(e) = self.fail_open.lock().take() {
            return Err(e);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.feeds.lock().push((url.to_string(), tx));
        Ok(UnboundedReceiverStream::new(rx).boxed())
    }
}

/// What a [`FakeSink`] has seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SinkCall {
    Attach(ChannelId),
    Append(Bytes),
    Detach,
}

/// Media sink recording every call; mounts when `mount()` is called.
pub(crate) struct FakeSink {
    calls: Mutex<Vec<SinkCall>>,
    mounted: watch::Sender<bool>,
}

impl FakeSink {
    pub fn mounted() -> Arc<Self> {
        let sink = Self::unmounted();
        sink.mount();
        sink
    }

    pub fn unmounted() -> Arc<Self> {
        let (mounted, _) = watch::channel(false);
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            mounted,
        })
    }

    pub fn mount(&self) {
        self.mounted.send_replace(true);
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls.lock().clone()
    }

    pub fn attach_count(&self) -> usize {
        self.count(|c| matches!(c, SinkCall::Attach(_)))
    }

    pub fn detach_count(&self) -> usize {
        self.count(|c| matches!(c, SinkCall::Detach))
    }

    fn count(&self, f: impl Fn(&SinkCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| f(c)).count()
    }
}

#[async_trait]
impl MediaSink for FakeSink {
    async fn wait_ready(&self) {
        let mut rx = self.mounted.subscribe();
        let _ = rx.wait_for(|mounted| *mounted).await;
    }

    fn attach(&self, channel_id: &ChannelId, _stream_url: &str) {
        self.calls.lock().push(SinkCall::Attach(channel_id.clone()));
    }

    fn append(&self, chunk: Bytes) {
        self.calls.lock().push(SinkCall::Append(chunk));
    }

    fn detach(&self) {
        self.calls.lock().push(SinkCall::Detach);
    }
}
