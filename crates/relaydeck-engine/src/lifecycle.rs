//! Broadcast, relay and drop orchestration.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::Sender;
use tracing::{debug, info, instrument, warn};
use url::Url;

use relaydeck_ipc::{
    Channel, ChannelId, ClientEvent, CreateBroadcastRequest, CreateRelayRequest, IntentId,
    IntentState, LifecycleIntent,
};
use relaydeck_transport::ControlApi;

use crate::directory::DirectoryStore;
use crate::error::{remote_reason, ClientError, Field};
use crate::events::EventEmitter;

/// Maximum channel name length, in characters.
pub const NAME_MAX_CHARS: usize = 64;

/// Maximum genre length, in characters.
pub const GENRE_MAX_CHARS: usize = 64;

/// Query parameter of a relay source URL naming the seed peer.
pub const SEED_HOST_PARAM: &str = "tip";

/// Broadcast form contents before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastDraft {
    pub name: String,
    pub genre: String,
    pub desc: Option<String>,
    pub comment: Option<String>,
    pub url: Option<String>,
}

impl BroadcastDraft {
    pub fn new(name: impl Into<String>, genre: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            genre: genre.into(),
            ..Default::default()
        }
    }

    /// Check field bounds and build the request body.
    pub fn validate(&self) -> Result<CreateBroadcastRequest, ClientError> {
        let name_len = self.name.chars().count();
        if name_len == 0 {
            return Err(ClientError::Validation {
                field: Field::Name,
                message: "must not be empty".to_string(),
            });
        }
        if name_len > NAME_MAX_CHARS {
            return Err(ClientError::Validation {
                field: Field::Name,
                message: format!("must be at most {NAME_MAX_CHARS} characters"),
            });
        }
        if self.genre.chars().count() > GENRE_MAX_CHARS {
            return Err(ClientError::Validation {
                field: Field::Genre,
                message: format!("must be at most {GENRE_MAX_CHARS} characters"),
            });
        }

        Ok(CreateBroadcastRequest {
            name: self.name.clone(),
            genre: self.genre.clone(),
            desc: non_empty(&self.desc),
            comment: non_empty(&self.comment),
            url: non_empty(&self.url),
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|s| !s.is_empty()).cloned()
}

/// Build a relay request from a pasted source URL.
///
/// The channel id is the final path segment; the seed peer comes from the
/// `tip` query parameter and is empty when absent.
pub fn parse_relay_source(source_url: &str) -> Result<CreateRelayRequest, ClientError> {
    let url = Url::parse(source_url.trim())
        .map_err(|e| ClientError::MalformedSourceUrl(format!("{source_url}: {e}")))?;

    let id = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();
    if id.is_empty() {
        return Err(ClientError::MalformedSourceUrl(format!(
            "{source_url}: missing channel id"
        )));
    }

    let host = url
        .query_pairs()
        .find(|(key, _)| key == SEED_HOST_PARAM)
        .map(|(_, value)| value.into_owned())
        .unwrap_or_default();

    Ok(CreateRelayRequest {
        id: id.to_string(),
        host,
    })
}

/// Issues lifecycle intents and reconciles the directory afterwards.
///
/// No intent is retried automatically; the caller decides whether to resubmit.
pub struct LifecycleController {
    api: Arc<dyn ControlApi>,
    directory: Arc<DirectoryStore>,
    events: EventEmitter,
    next_intent: AtomicU64,
}

impl LifecycleController {
    /// Create a controller that refreshes `directory` after mutations.
    pub fn new(api: Arc<dyn ControlApi>, directory: Arc<DirectoryStore>) -> Self {
        Self::build(api, directory, EventEmitter::default())
    }

    /// Create a controller that reports intent transitions on `events`.
    pub fn with_events(
        api: Arc<dyn ControlApi>,
        directory: Arc<DirectoryStore>,
        events: Sender<ClientEvent>,
    ) -> Self {
        Self::build(api, directory, EventEmitter::new(Some(events)))
    }

    fn build(api: Arc<dyn ControlApi>, directory: Arc<DirectoryStore>, events: EventEmitter) -> Self {
        Self {
            api,
            directory,
            events,
            next_intent: AtomicU64::new(1),
        }
    }

    /// Start broadcasting a channel with the given name and genre.
    pub async fn create_broadcast(&self, name: &str, genre: &str) -> Result<Channel, ClientError> {
        self.submit_broadcast(BroadcastDraft::new(name, genre)).await
    }

    /// Start broadcasting from a full form draft.
    #[instrument(name = "create_broadcast", skip(self, draft), fields(name = %draft.name))]
    pub async fn submit_broadcast(&self, draft: BroadcastDraft) -> Result<Channel, ClientError> {
        let req = draft.validate()?;
        let intent = LifecycleIntent::BroadcastCreate {
            name: req.name.clone(),
            genre: req.genre.clone(),
        };
        let intent_id = self.begin(&intent);

        match self.api.create_broadcast(&req).await {
            Ok(channel) => {
                info!(id = %channel.id, "Broadcast created");
                self.settle(intent_id, intent, IntentState::Succeeded);
                self.reconcile().await;
                Ok(channel)
            }
            Err(e) => {
                let reason = remote_reason(&e);
                warn!(%reason, "Broadcast rejected");
                self.settle(intent_id, intent, IntentState::Rejected {
                    reason: reason.clone(),
                });
                Err(ClientError::RemoteRejected(reason))
            }
        }
    }

    /// Join a relay described by a pasted source URL.
    #[instrument(name = "create_relay", skip(self))]
    pub async fn create_relay(&self, source_url: &str) -> Result<Channel, ClientError> {
        let req = parse_relay_source(source_url)?;
        let intent = LifecycleIntent::RelayCreate {
            id: ChannelId::new(req.id.clone()),
            source_host: req.host.clone(),
        };
        let intent_id = self.begin(&intent);

        match self.api.create_relay(&req).await {
            Ok(channel) => {
                info!(id = %channel.id, seed = %req.host, "Relay created");
                self.settle(intent_id, intent, IntentState::Succeeded);
                self.reconcile().await;
                Ok(channel)
            }
            Err(e) => {
                let reason = remote_reason(&e);
                warn!(%reason, "Relay rejected");
                self.settle(intent_id, intent, IntentState::Rejected {
                    reason: reason.clone(),
                });
                Err(ClientError::RemoteRejected(reason))
            }
        }
    }

    /// Terminate a channel, then reconcile the directory whatever the outcome.
    #[instrument(name = "drop_channel", skip(self))]
    pub async fn drop_channel(&self, id: &ChannelId) -> Result<(), ClientError> {
        let intent = LifecycleIntent::Drop { id: id.clone() };
        let intent_id = self.begin(&intent);

        let outcome = match self.api.delete_channel(id).await {
            Ok(()) => {
                info!(%id, "Channel dropped");
                self.settle(intent_id, intent, IntentState::Succeeded);
                Ok(())
            }
            Err(e) => {
                let reason = remote_reason(&e);
                warn!(%id, %reason, not_found = e.is_not_found(), "Drop failed");
                self.settle(intent_id, intent, IntentState::Rejected {
                    reason: reason.clone(),
                });
                Err(ClientError::ChannelDropFailed {
                    id: id.clone(),
                    reason,
                })
            }
        };

        self.reconcile().await;
        outcome
    }

    fn begin(&self, intent: &LifecycleIntent) -> IntentId {
        let id = IntentId(self.next_intent.fetch_add(1, Ordering::SeqCst));
        debug!(%id, intent = intent.name(), "Intent pending");
        self.events.send(ClientEvent::IntentChanged {
            id,
            intent: intent.clone(),
            state: IntentState::Pending,
        });
        id
    }

    fn settle(&self, id: IntentId, intent: LifecycleIntent, state: IntentState) {
        debug!(%id, intent = intent.name(), state = state.name(), "Intent settled");
        self.events.send(ClientEvent::IntentChanged { id, intent, state });
    }

    async fn reconcile(&self) {
        if let Err(e) = self.directory.refresh().await {
            warn!("Directory reconciliation failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{channel, rejected, FakeControlApi};

    fn controller(api: &Arc<FakeControlApi>) -> (LifecycleController, Arc<DirectoryStore>) {
        let directory = Arc::new(DirectoryStore::new(api.clone()));
        (
            LifecycleController::new(api.clone(), Arc::clone(&directory)),
            directory,
        )
    }

    #[tokio::test]
    async fn empty_name_is_rejected_locally() {
        let api = FakeControlApi::new();
        let (lifecycle, _) = controller(&api);

        let err = lifecycle.create_broadcast("", "x").await.unwrap_err();

        assert_eq!(err.field(), Some(Field::Name));
        assert!(err.is_local());
        assert_eq!(api.call_count(), 0);
    }

    #[test]
    fn field_bounds_count_characters() {
        let at_limit = "あ".repeat(NAME_MAX_CHARS);
        assert!(BroadcastDraft::new(at_limit, "").validate().is_ok());

        let too_long = "a".repeat(NAME_MAX_CHARS + 1);
        let err = BroadcastDraft::new(too_long, "").validate().unwrap_err();
        assert_eq!(err.field(), Some(Field::Name));

        let err = BroadcastDraft::new("ok", "g".repeat(GENRE_MAX_CHARS + 1))
            .validate()
            .unwrap_err();
        assert_eq!(err.field(), Some(Field::Genre));
    }

    #[test]
    fn draft_drops_empty_optionals() {
        let draft = BroadcastDraft {
            desc: Some(String::new()),
            comment: Some("hi".into()),
            ..BroadcastDraft::new("n", "g")
        };
        let req = draft.validate().unwrap();
        assert_eq!(req.desc, None);
        assert_eq!(req.comment.as_deref(), Some("hi"));
    }

    #[tokio::test]
    async fn broadcast_success_refreshes_directory() {
        let api = FakeControlApi::new();
        api.set_create_result(Ok(channel("new", "live")));
        let (tx, rx) = relaydeck_ipc::event_channel();
        let directory = Arc::new(DirectoryStore::new(api.clone()));
        let lifecycle = LifecycleController::with_events(api.clone(), Arc::clone(&directory), tx);

        let ch = lifecycle.create_broadcast("live", "Game").await.unwrap();

        assert_eq!(ch.id.as_str(), "new");
        assert!(directory.contains(&"new".into()));
        let states: Vec<IntentState> = rx
            .try_iter()
            .filter_map(|e| match e {
                ClientEvent::IntentChanged { state, .. } => Some(state),
                _ => None,
            })
            .collect();
        assert_eq!(states, [IntentState::Pending, IntentState::Succeeded]);
    }

    #[tokio::test]
    async fn broadcast_rejection_leaves_directory_untouched() {
        let api = FakeControlApi::new();
        api.set_server(vec![channel("a", "A")]);
        let (lifecycle, directory) = controller(&api);
        directory.load().await.unwrap();
        api.set_create_result(Err(rejected(400, "name taken")));

        let err = lifecycle.create_broadcast("dup", "").await.unwrap_err();

        assert!(matches!(err, ClientError::RemoteRejected(ref r) if r == "name taken"));
        // load + create, no refresh
        assert_eq!(api.call_count(), 2);
        assert_eq!(directory.get().len(), 1);
    }

    #[tokio::test]
    async fn not_a_url_is_malformed_without_network() {
        let api = FakeControlApi::new();
        let (lifecycle, _) = controller(&api);

        let err = lifecycle.create_relay("not a url").await.unwrap_err();

        assert!(matches!(err, ClientError::MalformedSourceUrl(_)));
        assert_eq!(api.call_count(), 0);
    }

    #[test]
    fn relay_source_parsing() {
        let req = parse_relay_source(
            "http://192.168.0.10:7144/pls/0123456789ABCDEF0123456789ABCDEF?tip=203.0.113.5:7144",
        )
        .unwrap();
        assert_eq!(req.id, "0123456789ABCDEF0123456789ABCDEF");
        assert_eq!(req.host, "203.0.113.5:7144");

        let req = parse_relay_source("pcp://relay.example/stream/ABC").unwrap();
        assert_eq!(req.id, "ABC");
        assert_eq!(req.host, "");

        assert!(matches!(
            parse_relay_source("http://relay.example/pls/"),
            Err(ClientError::MalformedSourceUrl(_))
        ));
        assert!(matches!(
            parse_relay_source("http://relay.example"),
            Err(ClientError::MalformedSourceUrl(_))
        ));
    }

    #[tokio::test]
    async fn relay_sends_parsed_request() {
        let api = FakeControlApi::new();
        let (lifecycle, directory) = controller(&api);

        lifecycle
            .create_relay("http://peer:7144/pls/XYZ?tip=10.0.0.1:7144")
            .await
            .unwrap();

        let sent = api.relay_requests.lock().clone();
        assert_eq!(
            sent,
            [CreateRelayRequest {
                id: "XYZ".into(),
                host: "10.0.0.1:7144".into()
            }]
        );
        assert!(directory.contains(&"XYZ".into()));
    }

    #[tokio::test]
    async fn relay_rejection_reports_server_reason() {
        let api = FakeControlApi::new();
        api.set_server(vec![channel("a", "A")]);
        let (lifecycle, directory) = controller(&api);
        directory.load().await.unwrap();
        api.set_create_result(Err(rejected(409, "already relaying")));

        let err = lifecycle
            .create_relay("http://peer:7144/stream/ABC?tip=10.0.0.1:7144")
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::RemoteRejected(ref r) if r == "already relaying"));
        // load + create, no refresh
        assert_eq!(api.call_count(), 2);
        assert_eq!(api.relay_requests.lock().len(), 1);
        assert_eq!(directory.get().len(), 1);
        assert!(!directory.contains(&"ABC".into()));
    }

    #[tokio::test]
    async fn drop_then_refresh_removes_channel() {
        let api = FakeControlApi::new();
        api.set_server(vec![channel("abc", "Test")]);
        let (lifecycle, directory) = controller(&api);

        directory.load().await.unwrap();
        assert_eq!(directory.get().len(), 1);

        lifecycle.drop_channel(&"abc".into()).await.unwrap();
        assert!(directory.get().is_empty());
    }

    #[tokio::test]
    async fn second_drop_fails_without_crashing() {
        let api = FakeControlApi::new();
        api.set_server(vec![channel("abc", "Test")]);
        let (lifecycle, directory) = controller(&api);

        lifecycle.drop_channel(&"abc".into()).await.unwrap();
        let err = lifecycle.drop_channel(&"abc".into()).await.unwrap_err();

        assert!(matches!(err, ClientError::ChannelDropFailed { ref id, .. } if id.as_str() == "abc"));
        assert!(directory.get().is_empty());
    }

    #[tokio::test]
    async fn failed_drop_still_reconciles() {
        let api = FakeControlApi::new();
        api.set_server(vec![channel("a", "A")]);
        let (lifecycle, directory) = controller(&api);
        api.set_delete_result(Err(rejected(500, "internal")));

        let err = lifecycle.drop_channel(&"a".into()).await.unwrap_err();

        assert!(matches!(err, ClientError::ChannelDropFailed { .. }));
        // delete + reconciliation load
        assert_eq!(api.call_count(), 2);
        assert!(directory.contains(&"a".into()));
    }
}
