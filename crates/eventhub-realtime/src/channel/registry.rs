//! Channel registry: owns every channel emitter and routes inbound messages.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};

use eventhub_core::config::{CodecKind, HubConfig};
use eventhub_core::traits::PubSubTransport;

use crate::message::codec::{MessageCodec, codec_for};
use crate::message::types::{Event, InboundMessage, Message};

use super::emitter::ChannelEmitter;
use super::subscription::SubscriptionManager;

/// Registry of channel emitters.
///
/// Emitters are created on first use and live as long as the registry.
#[derive(Debug)]
pub struct ChannelRegistry {
    /// Channel name → emitter.
    channels: DashMap<String, ChannelEmitter>,
    /// Transport subscription state.
    subscriptions: Arc<SubscriptionManager>,
    /// Wire codec shared by all channels.
    codec: Arc<dyn MessageCodec>,
    /// Outbound transport.
    transport: Arc<dyn PubSubTransport>,
    /// Delimiter for [`ChannelRegistry::acquire_path`].
    delimiter: String,
}

impl ChannelRegistry {
    /// Creates a registry using the given codec.
    pub fn new(transport: Arc<dyn PubSubTransport>, codec: CodecKind) -> Self {
        Self::with_codec(transport, codec_for(codec))
    }

    /// Creates a registry from configuration.
    pub fn from_config(transport: Arc<dyn PubSubTransport>, config: &HubConfig) -> Self {
        let mut registry = Self::new(transport, config.codec);
        registry.delimiter = config.delimiter.clone();
        registry
    }

    /// Creates a registry with a custom codec.
    pub fn with_codec(transport: Arc<dyn PubSubTransport>, codec: Arc<dyn MessageCodec>) -> Self {
        Self {
            channels: DashMap::new(),
            subscriptions: Arc::new(SubscriptionManager::new(transport.clone())),
            codec,
            transport,
            delimiter: ".".to_string(),
        }
    }

    /// Returns the emitter for `name`, creating it on first use.
    pub fn acquire(&self, name: &str) -> ChannelEmitter {
        if let Some(existing) = self.channels.get(name) {
            return existing.value().clone();
        }
        self.channels
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!(channel = %name, codec = self.codec.name(), "Creating channel emitter");
                ChannelEmitter::new(
                    name,
                    self.codec.clone(),
                    self.transport.clone(),
                    self.subscriptions.clone(),
                )
            })
            .value()
            .clone()
    }

    /// Acquires the channel named by joining `segments` with the delimiter.
    pub fn acquire_path<S: AsRef<str>>(&self, segments: &[S]) -> ChannelEmitter {
        let name = segments
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(self.delimiter.as_str());
        self.acquire(&name)
    }

    /// Returns the emitter for `name` without creating one.
    pub fn get(&self, name: &str) -> Option<ChannelEmitter> {
        self.channels.get(name).map(|entry| entry.value().clone())
    }

    /// Number of emitters created so far.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Returns whether `name` is subscribed at the transport.
    pub async fn is_subscribed(&self, name: &str) -> bool {
        self.subscriptions.is_subscribed(name).await
    }

    /// Subscription manager shared by all emitters.
    pub fn subscriptions(&self) -> &Arc<SubscriptionManager> {
        &self.subscriptions
    }

    /// Active codec.
    pub fn codec(&self) -> &Arc<dyn MessageCodec> {
        &self.codec
    }

    /// Routes one inbound transport notification.
    pub fn dispatch(&self, message: InboundMessage) -> usize {
        match message {
            InboundMessage::Literal { channel, payload } => {
                self.dispatch_literal(&channel, &payload)
            }
            InboundMessage::Pattern {
                pattern,
                channel,
                payload,
            } => self.dispatch_pattern(&pattern, &channel, &payload),
        }
    }

    /// Delivers a literal-subscription message to the channel's listeners.
    ///
    /// Unknown channels and undecodable payloads are logged and dropped.
    /// Returns the number of listeners invoked.
    pub fn dispatch_literal(&self, channel: &str, payload: &[u8]) -> usize {
        let Some(emitter) = self.get(channel) else {
            debug!(channel, "Dropping message for unknown channel");
            return 0;
        };
        let Some(message) = self.decode(channel, payload) else {
            return 0;
        };
        emitter.deliver(Event {
            channel: channel.to_string(),
            event: message.event,
            args: message.args,
        })
    }

    /// Delivers a pattern-subscription message to the pattern's listeners,
    /// recording `channel` as the emitter's current remote channel.
    pub fn dispatch_pattern(&self, pattern: &str, channel: &str, payload: &[u8]) -> usize {
        let Some(emitter) = self.get(pattern) else {
            debug!(pattern, channel, "Dropping message for unknown pattern");
            return 0;
        };
        let Some(message) = self.decode(channel, payload) else {
            return 0;
        };
        emitter.set_remote_channel(channel);
        emitter.deliver(Event {
            channel: channel.to_string(),
            event: message.event,
            args: message.args,
        })
    }

    fn decode(&self, channel: &str, payload: &[u8]) -> Option<Message> {
        match self.codec.decode_message(payload) {
            Ok(message) => Some(message),
            Err(e) => {
                warn!(
                    channel,
                    codec = self.codec.name(),
                    bytes = payload.len(),
                    error = %e,
                    "Dropping undecodable message"
                );
                None
            }
        }
    }
}
