//! Inbound transport notifications → registry dispatch.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::channel::registry::ChannelRegistry;
use crate::message::types::InboundMessage;

/// Feeds a transport's inbound stream into a [`ChannelRegistry`].
///
/// Messages are dispatched one at a time, in arrival order.
#[derive(Debug, Clone)]
pub struct TransportBridge {
    /// Target registry.
    registry: Arc<ChannelRegistry>,
}

impl TransportBridge {
    /// Create a new bridge.
    pub fn new(registry: Arc<ChannelRegistry>) -> Self {
        Self { registry }
    }

    /// Handles a literal delivery.
    pub fn on_message(&self, channel: &str, payload: &[u8]) -> usize {
        self.registry.dispatch_literal(channel, payload)
    }

    /// Handles a pattern delivery.
    pub fn on_pattern_message(&self, pattern: &str, channel: &str, payload: &[u8]) -> usize {
        self.registry.dispatch_pattern(pattern, channel, payload)
    }

    /// Handles one inbound notification.
    pub fn handle(&self, message: InboundMessage) -> usize {
        match &message {
            InboundMessage::Literal { channel, payload } => self.on_message(channel, payload),
            InboundMessage::Pattern {
                pattern,
                channel,
                payload,
            } => self.on_pattern_message(pattern, channel, payload),
        }
    }

    /// Drains `inbound` until the transport closes it.
    pub async fn run<S>(self, inbound: S)
    where
        S: Stream<Item = InboundMessage> + Unpin,
    {
        let mut inbound = inbound;
        let mut handled: u64 = 0;
        while let Some(message) = inbound.next().await {
            let invoked = self.handle(message);
            handled += 1;
            debug!(invoked, "Inbound message dispatched");
        }
        info!(handled, "Inbound stream closed");
    }

    /// Spawns [`TransportBridge::run`] on the current runtime.
    pub fn spawn<S>(registry: Arc<ChannelRegistry>, inbound: S) -> JoinHandle<()>
    where
        S: Stream<Item = InboundMessage> + Send + Unpin + 'static,
    {
        let bridge = Self::new(registry);
        tokio::spawn(bridge.run(inbound))
    }
}
