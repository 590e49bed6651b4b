//! Per-channel event emitter backed by the pub/sub transport.
//!
//! Listener mutations are local and followed by a subscription refresh.
//! `emit` is remote only: local listeners fire when the transport delivers
//! the message back through the registry, so a process hears its own
//! emissions only while it is subscribed.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use serde_json::Value;
use tracing::{debug, warn};

use eventhub_core::result::AppResult;
use eventhub_core::traits::PubSubTransport;

use crate::message::codec::MessageCodec;
use crate::message::types::{Event, Message};

use super::listener::{self, Listener, ListenerTable};
use super::subscription::{ChannelKind, Interest, InterestSource, SubscriptionManager};

/// Local event emitted when a publish reached nobody despite local interest.
pub const DEAF_EVENT: &str = "deaf";

/// Handle to one channel. Cloning is cheap and clones share state.
#[derive(Clone)]
pub struct ChannelEmitter {
    inner: Arc<EmitterInner>,
}

struct EmitterInner {
    /// Channel name (literal name or glob pattern).
    name: String,
    /// Fixed at construction.
    kind: ChannelKind,
    /// Local listeners.
    table: Mutex<ListenerTable>,
    /// Concrete channel of the latest delivery.
    remote_channel: RwLock<String>,
    codec: Arc<dyn MessageCodec>,
    transport: Arc<dyn PubSubTransport>,
    subscriptions: Arc<SubscriptionManager>,
}

impl std::fmt::Debug for ChannelEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelEmitter")
            .field("name", &self.inner.name)
            .field("kind", &self.inner.kind)
            .field("interest", &self.interest())
            .finish()
    }
}

impl ChannelEmitter {
    /// Creates an emitter with its collaborators injected.
    pub(crate) fn new(
        name: &str,
        codec: Arc<dyn MessageCodec>,
        transport: Arc<dyn PubSubTransport>,
        subscriptions: Arc<SubscriptionManager>,
    ) -> Self {
        Self {
            inner: Arc::new(EmitterInner {
                name: name.to_string(),
                kind: ChannelKind::classify(name),
                table: Mutex::new(ListenerTable::new()),
                remote_channel: RwLock::new(name.to_string()),
                codec,
                transport,
                subscriptions,
            }),
        }
    }

    /// Channel name this emitter publishes on and subscribes to.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Literal or pattern.
    pub fn kind(&self) -> ChannelKind {
        self.inner.kind
    }

    /// Concrete channel of the most recent delivery. For literal channels
    /// this is always the channel name.
    pub fn remote_channel(&self) -> String {
        self.inner
            .remote_channel
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set_remote_channel(&self, channel: &str) {
        *self
            .inner
            .remote_channel
            .write()
            .unwrap_or_else(PoisonError::into_inner) = channel.to_string();
    }

    /// Returns whether two handles refer to the same emitter.
    pub fn same_channel(&self, other: &ChannelEmitter) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Publishes `[event, ...args]` on this channel.
    ///
    /// Returns the transport's delivery count. Local listeners are not
    /// invoked directly.
    pub async fn emit(&self, event: &str, args: Vec<Value>) -> AppResult<u64> {
        let payload = self
            .inner
            .codec
            .encode_message(&Message::new(event, args))?;

        let delivered = self.inner.transport.publish(&self.inner.name, payload).await?;
        debug!(channel = %self.inner.name, event, delivered, "Published event");

        if delivered == 0 && self.interest().is_interested() {
            warn!(channel = %self.inner.name, event, "Channel is deaf");
            self.emit_local(
                DEAF_EVENT,
                vec![
                    Value::String(self.inner.name.clone()),
                    Value::String(event.to_string()),
                ],
            );
        }

        Ok(delivered)
    }

    /// Delivers an event to local listeners only. No I/O.
    ///
    /// Returns the number of listeners invoked.
    pub fn emit_local(&self, event: &str, args: Vec<Value>) -> usize {
        self.deliver(Event {
            channel: self.remote_channel(),
            event: event.to_string(),
            args,
        })
    }

    /// Adds a listener for `event`, then refreshes the subscription.
    pub async fn on(&self, event: &str, callback: Listener) -> AppResult<()> {
        self.table().add(event, callback, false);
        self.refresh().await
    }

    /// Adds a listener removed after its first delivery.
    pub async fn once(&self, event: &str, callback: Listener) -> AppResult<()> {
        self.table().add(event, callback, true);
        self.refresh().await
    }

    /// Removes a listener for `event`, then refreshes the subscription.
    pub async fn off(&self, event: &str, callback: &Listener) -> AppResult<()> {
        self.table().remove(event, callback);
        self.refresh().await
    }

    /// Removes every listener for `event`, or all listeners when `None`.
    pub async fn remove_all_listeners(&self, event: Option<&str>) -> AppResult<()> {
        self.table().remove_all(event);
        self.refresh().await
    }

    /// Adds a listener that receives every event.
    pub async fn on_any(&self, callback: Listener) -> AppResult<()> {
        self.table().add_any(callback);
        self.refresh().await
    }

    /// Removes an any-listener.
    pub async fn off_any(&self, callback: &Listener) -> AppResult<()> {
        self.table().remove_any(callback);
        self.refresh().await
    }

    /// Listeners registered for `event`.
    pub fn listeners(&self, event: &str) -> Vec<Listener> {
        self.table().listeners(event)
    }

    /// Any-listeners.
    pub fn listeners_any(&self) -> Vec<Listener> {
        self.table().listeners_any()
    }

    /// Reconciles the transport subscription with current listeners.
    pub async fn refresh(&self) -> AppResult<()> {
        self.inner
            .subscriptions
            .refresh(&self.inner.name, self)
            .await
            .map(|_| ())
    }

    /// Invokes local listeners for a delivered event, isolating failures.
    pub(crate) fn deliver(&self, event: Event) -> usize {
        let delivery = self.table().take_for_delivery(&event.event);

        if delivery.consumed_once {
            self.spawn_refresh();
        }

        listener::invoke_isolated(&delivery.callbacks, &event)
    }

    /// Refreshes in the background after a `once` listener was consumed
    /// during delivery, where awaiting is not possible.
    fn spawn_refresh(&self) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!(channel = %self.inner.name, "No runtime; subscription refresh deferred");
            return;
        };
        let emitter = self.clone();
        handle.spawn(async move {
            if let Err(e) = emitter.refresh().await {
                warn!(channel = %emitter.name(), error = %e, "Subscription refresh failed");
            }
        });
    }

    fn table(&self) -> MutexGuard<'_, ListenerTable> {
        self.inner
            .table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl InterestSource for ChannelEmitter {
    fn interest(&self) -> Interest {
        self.table().interest()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use serde_json::json;

    use super::*;
    use crate::channel::listener::{CATCH_ALL, listener};
    use crate::message::codec::JsonCodec;
    use crate::test_support::{RecordingTransport, TransportCall};

    fn emitter(name: &str) -> (ChannelEmitter, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::new());
        let subscriptions = Arc::new(SubscriptionManager::new(transport.clone()));
        let emitter = ChannelEmitter::new(name, Arc::new(JsonCodec), transport.clone(), subscriptions);
        (emitter, transport)
    }

    fn recorder() -> (Listener, Arc<StdMutex<Vec<Event>>>) {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = seen.clone();
        let callback = listener(move |event| {
            sink.lock().unwrap().push(event.clone());
            Ok(())
        });
        (callback, seen)
    }

    #[tokio::test]
    async fn test_on_and_off_drive_subscription() {
        let (room, transport) = emitter("room1");
        let (callback, _) = recorder();

        room.on("chat", callback.clone()).await.unwrap();
        assert_eq!(
            transport.calls(),
            vec![TransportCall::Subscribe("room1".into())]
        );

        room.off("chat", &callback).await.unwrap();
        assert_eq!(
            transport.calls(),
            vec![
                TransportCall::Subscribe("room1".into()),
                TransportCall::Unsubscribe("room1".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_second_listener_does_not_resubscribe() {
        let (room, transport) = emitter("room1");
        let (a, _) = recorder();
        let (b, _) = recorder();

        room.on("chat", a.clone()).await.unwrap();
        room.on("join", b).await.unwrap();
        room.off("chat", &a).await.unwrap();

        assert_eq!(
            transport.calls(),
            vec![TransportCall::Subscribe("room1".into())]
        );
    }

    #[tokio::test]
    async fn test_any_listeners_count_as_interest() {
        let (room, transport) = emitter("room1");
        let (callback, _) = recorder();

        room.on_any(callback.clone()).await.unwrap();
        assert_eq!(room.listeners_any().len(), 1);
        room.off_any(&callback).await.unwrap();

        assert_eq!(transport.calls().len(), 2);
        assert!(room.listeners_any().is_empty());
    }

    #[tokio::test]
    async fn test_catch_all_keeps_channel_subscribed() {
        let (room, transport) = emitter("room1");
        let (monitor, seen) = recorder();
        let (chat, _) = recorder();

        room.on(CATCH_ALL, monitor).await.unwrap();
        room.on("chat", chat.clone()).await.unwrap();
        room.off("chat", &chat).await.unwrap();

        assert_eq!(
            transport.calls(),
            vec![TransportCall::Subscribe("room1".into())]
        );

        room.emit_local("anything", vec![json!(1)]);
        assert_eq!(seen.lock().unwrap()[0].event, "anything");
    }

    #[tokio::test]
    async fn test_remove_all_listeners() {
        let (room, transport) = emitter("room1");
        let (a, _) = recorder();
        let (b, _) = recorder();
        room.on("chat", a).await.unwrap();
        room.on_any(b).await.unwrap();

        room.remove_all_listeners(Some("chat")).await.unwrap();
        assert!(room.listeners("chat").is_empty());
        assert_eq!(transport.calls().len(), 1);

        room.remove_all_listeners(None).await.unwrap();
        assert_eq!(
            transport.calls().last(),
            Some(&TransportCall::Unsubscribe("room1".into()))
        );
    }

    #[tokio::test]
    async fn test_emit_publishes_encoded_tuple_without_local_delivery() {
        let (room, transport) = emitter("chat");
        let (callback, seen) = recorder();
        transport.set_deliveries(3);
        room.on("msg", callback).await.unwrap();

        let delivered = room.emit("msg", vec![json!("hello"), json!(42)]).await.unwrap();

        assert_eq!(delivered, 3);
        assert_eq!(
            transport.published(),
            vec![("chat".to_string(), br#"["msg","hello",42]"#.to_vec())]
        );
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_emit_surfaces_transport_errors() {
        let (room, transport) = emitter("chat");
        transport.fail_next();
        assert!(room.emit("msg", vec![]).await.is_err());
    }

    #[tokio::test]
    async fn test_failed_subscribe_keeps_listener_and_retries_on_refresh() {
        let (room, transport) = emitter("room1");
        let (callback, _) = recorder();

        transport.fail_next();
        assert!(room.on("chat", callback).await.is_err());
        assert_eq!(room.listeners("chat").len(), 1);
        assert!(!room.inner.subscriptions.is_subscribed("room1").await);
        assert!(transport.calls().is_empty());

        room.refresh().await.unwrap();
        room.refresh().await.unwrap();
        assert!(room.inner.subscriptions.is_subscribed("room1").await);
        assert_eq!(
            transport.calls(),
            vec![TransportCall::Subscribe("room1".into())]
        );
    }

    #[tokio::test]
    async fn test_deaf_event_when_publish_reaches_nobody() {
        let (room, _) = emitter("chat");
        let (deaf, seen) = recorder();
        room.on(DEAF_EVENT, deaf).await.unwrap();

        assert_eq!(room.emit("msg", vec![json!(1)]).await.unwrap(), 0);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].args, vec![json!("chat"), json!("msg")]);
    }

    #[tokio::test]
    async fn test_deaf_without_listeners_is_silent() {
        let (room, _) = emitter("chat");
        assert_eq!(room.emit("msg", vec![]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_once_listener_fires_once_and_releases_subscription() {
        let (room, transport) = emitter("room1");
        let (callback, seen) = recorder();
        room.once("ping", callback).await.unwrap();

        assert_eq!(room.emit_local("ping", vec![]), 1);
        assert_eq!(room.emit_local("ping", vec![]), 0);
        assert_eq!(seen.lock().unwrap().len(), 1);

        // Let the background refresh run.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(
            transport.calls(),
            vec![
                TransportCall::Subscribe("room1".into()),
                TransportCall::Unsubscribe("room1".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_listener_can_reenter_emitter() {
        let (room, _) = emitter("room1");
        let handle = room.clone();
        let observed = Arc::new(StdMutex::new(None));
        let sink = observed.clone();
        room.on(
            "x",
            listener(move |_| {
                *sink.lock().unwrap() = Some(handle.listeners("x").len());
                Ok(())
            }),
        )
        .await
        .unwrap();

        room.emit_local("x", vec![]);
        assert_eq!(*observed.lock().unwrap(), Some(1));
    }

    #[test]
    fn test_pattern_emitter_kind_and_remote_channel() {
        let (pattern, _) = emitter("room.*");
        assert_eq!(pattern.kind(), ChannelKind::Pattern);
        assert_eq!(pattern.remote_channel(), "room.*");

        pattern.set_remote_channel("room.42");
        assert_eq!(pattern.remote_channel(), "room.42");
    }
}
