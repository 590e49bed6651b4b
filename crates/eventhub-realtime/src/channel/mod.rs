//! Channel emitters, listener tables, and interest-driven subscriptions.

pub mod emitter;
pub mod listener;
pub mod registry;
pub mod subscription;

pub use emitter::{ChannelEmitter, DEAF_EVENT};
pub use listener::{CATCH_ALL, Listener, ListenerResult, ListenerTable, listener};
pub use registry::ChannelRegistry;
pub use subscription::{ChannelKind, Interest, InterestSource, SubscriptionManager};
