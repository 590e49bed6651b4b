//! Transports and the bridge that feeds their deliveries into the registry.

pub mod event_bridge;
pub mod memory_pubsub;
#[cfg(feature = "redis-pubsub")]
pub mod redis_pubsub;

pub use event_bridge::TransportBridge;
pub use memory_pubsub::{MemoryBroker, MemoryTransport};
#[cfg(feature = "redis-pubsub")]
pub use redis_pubsub::RedisTransport;
