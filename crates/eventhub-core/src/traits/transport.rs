//! Pub/sub transport trait for pluggable delivery backends.

use async_trait::async_trait;

use crate::result::AppResult;

/// Outbound half of a pub/sub transport (Redis, in-memory).
///
/// Literal channels and glob patterns use separate calls, mirroring
/// `SUBSCRIBE` and `PSUBSCRIBE`. Inbound deliveries are not part of this
/// trait; each backend hands out a stream of inbound messages when it
/// connects.
#[async_trait]
pub trait PubSubTransport: Send + Sync + std::fmt::Debug + 'static {
    /// Subscribe to an exact channel name.
    async fn subscribe(&self, channel: &str) -> AppResult<()>;

    /// Unsubscribe from an exact channel name.
    async fn unsubscribe(&self, channel: &str) -> AppResult<()>;

    /// Subscribe to every channel matching a glob pattern.
    async fn pattern_subscribe(&self, pattern: &str) -> AppResult<()>;

    /// Drop a glob pattern subscription.
    async fn pattern_unsubscribe(&self, pattern: &str) -> AppResult<()>;

    /// Publish a payload. Returns the number of subscriptions that received it.
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> AppResult<u64>;
}
