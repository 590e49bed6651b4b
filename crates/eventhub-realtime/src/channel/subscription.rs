//! Subscription tracking: which channels are subscribed at the transport.
//!
//! Decisions are made purely from local listener counts. Every transition
//! runs under one async lock, held across the transport call, so concurrent
//! refreshes of the same channel can never issue a duplicate subscribe or
//! miss an unsubscribe.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use eventhub_core::result::AppResult;
use eventhub_core::traits::PubSubTransport;

/// How a channel name is subscribed and routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    /// Exact channel name.
    Literal,
    /// Glob pattern matched by the transport.
    Pattern,
}

impl ChannelKind {
    /// Classifies a channel name by syntax: any `*` or `?` makes it a pattern.
    pub fn classify(name: &str) -> Self {
        if name.contains(['*', '?']) {
            ChannelKind::Pattern
        } else {
            ChannelKind::Literal
        }
    }

    /// Returns whether this is a pattern channel.
    pub fn is_pattern(self) -> bool {
        self == ChannelKind::Pattern
    }
}

/// Listener counts for one channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Interest {
    /// Listeners registered for a named event.
    pub specific: usize,
    /// Any-listeners.
    pub any: usize,
    /// Listeners under the catch-all key.
    pub catch_all: usize,
}

impl Interest {
    /// Total listener count.
    pub fn total(&self) -> usize {
        self.specific + self.any + self.catch_all
    }

    /// Returns whether the channel should be subscribed.
    pub fn is_interested(&self) -> bool {
        self.total() > 0
    }
}

/// Anything that can report current listener counts for a channel.
pub trait InterestSource: Send + Sync {
    /// Current listener counts.
    fn interest(&self) -> Interest;
}

/// Tracks transport subscription state per channel name.
#[derive(Debug)]
pub struct SubscriptionManager {
    /// Outbound transport.
    transport: Arc<dyn PubSubTransport>,
    /// Channel name → currently subscribed.
    state: Mutex<HashMap<String, bool>>,
}

impl SubscriptionManager {
    /// Creates a new subscription manager.
    pub fn new(transport: Arc<dyn PubSubTransport>) -> Self {
        Self {
            transport,
            state: Mutex::new(HashMap::new()),
        }
    }

    /// Classifies a channel name.
    pub fn classify(&self, name: &str) -> ChannelKind {
        ChannelKind::classify(name)
    }

    /// Subscribes at the transport and records the channel as subscribed.
    ///
    /// Listener interest is not consulted. Emitters call [`Self::refresh`]
    /// after every mutation, which undoes a subscription nobody listens to.
    pub async fn subscribe(&self, name: &str) -> AppResult<()> {
        let mut state = self.state.lock().await;
        self.subscribe_locked(&mut state, name).await
    }

    /// Unsubscribes at the transport and records the channel as unsubscribed.
    ///
    /// Listener interest is not consulted, so a channel with listeners stops
    /// receiving until its next [`Self::refresh`].
    pub async fn unsubscribe(&self, name: &str) -> AppResult<()> {
        let mut state = self.state.lock().await;
        self.unsubscribe_locked(&mut state, name).await
    }

    /// Reconciles transport state with the listener counts of `source`.
    ///
    /// Counts are read after the lock is taken, so the decision reflects the
    /// latest mutation. Issues at most one transport call, and none when the
    /// state already matches. Returns whether the channel is now subscribed.
    pub async fn refresh<S>(&self, name: &str, source: &S) -> AppResult<bool>
    where
        S: InterestSource + ?Sized,
    {
        let mut state = self.state.lock().await;
        let interest = source.interest();
        let subscribed = state.get(name).copied().unwrap_or(false);

        match (interest.is_interested(), subscribed) {
            (true, false) => {
                self.subscribe_locked(&mut state, name).await?;
                Ok(true)
            }
            (false, true) => {
                self.unsubscribe_locked(&mut state, name).await?;
                Ok(false)
            }
            (_, current) => {
                debug!(channel = %name, total = interest.total(), "Subscription unchanged");
                Ok(current)
            }
        }
    }

    /// Returns whether a channel is currently subscribed.
    pub async fn is_subscribed(&self, name: &str) -> bool {
        self.state.lock().await.get(name).copied().unwrap_or(false)
    }

    /// Returns all currently subscribed channel names, sorted.
    pub async fn subscribed_channels(&self) -> Vec<String> {
        let state = self.state.lock().await;
        let mut names: Vec<String> = state
            .iter()
            .filter(|(_, subscribed)| **subscribed)
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    async fn subscribe_locked(&self, state: &mut HashMap<String, bool>, name: &str) -> AppResult<()> {
        let kind = self.classify(name);
        match kind {
            ChannelKind::Literal => self.transport.subscribe(name).await?,
            ChannelKind::Pattern => self.transport.pattern_subscribe(name).await?,
        }
        state.insert(name.to_string(), true);
        info!(channel = %name, ?kind, "Subscribed");
        Ok(())
    }

    async fn unsubscribe_locked(
        &self,
        state: &mut HashMap<String, bool>,
        name: &str,
    ) -> AppResult<()> {
        let kind = self.classify(name);
        match kind {
            ChannelKind::Literal => self.transport.unsubscribe(name).await?,
            ChannelKind::Pattern => self.transport.pattern_unsubscribe(name).await?,
        }
        state.insert(name.to_string(), false);
        info!(channel = %name, ?kind, "Unsubscribed");
        Ok(())
    }
}
