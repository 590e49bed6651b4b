//! # eventhub-realtime
//!
//! Channel event emitters over pub/sub for EventHub. Provides:
//!
//! - Per-channel emitters with local listeners and remote `emit`
//! - Interest-driven transport subscriptions (literal and glob pattern)
//! - Inbound dispatch with payload and listener failure isolation
//! - JSON and MessagePack wire codecs
//! - In-memory and Redis pub/sub transports

pub mod bridge;
pub mod channel;
pub mod global;
pub mod message;

#[cfg(test)]
pub(crate) mod test_support;

pub use bridge::{MemoryBroker, TransportBridge};
pub use channel::{CATCH_ALL, ChannelEmitter, ChannelKind, ChannelRegistry, Listener, listener};
pub use message::{Event, InboundMessage};
