//! In-memory pub/sub for single-node deployments and tests.
//!
//! A [`MemoryBroker`] plays the role of the pub/sub server. Each
//! [`MemoryBroker::connect`] call returns one client: an outbound
//! [`MemoryTransport`] and the stream of its inbound deliveries.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;

use eventhub_core::result::AppResult;
use eventhub_core::traits::PubSubTransport;

use crate::message::types::InboundMessage;

/// One connected client.
#[derive(Debug)]
struct Client {
    sender: mpsc::UnboundedSender<InboundMessage>,
    channels: HashSet<String>,
    patterns: HashSet<String>,
}

/// In-memory pub/sub server shared by any number of clients.
#[derive(Debug, Clone, Default)]
pub struct MemoryBroker {
    /// Client ID → client.
    clients: Arc<RwLock<HashMap<u64, Client>>>,
    next_id: Arc<AtomicU64>,
}

impl MemoryBroker {
    /// Create a new in-memory broker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Connects a new client.
    pub async fn connect(&self) -> (MemoryTransport, UnboundedReceiverStream<InboundMessage>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.clients.write().await.insert(
            id,
            Client {
                sender: tx,
                channels: HashSet::new(),
                patterns: HashSet::new(),
            },
        );
        debug!(client = id, "Memory pub/sub client connected");

        let transport = MemoryTransport {
            id,
            broker: self.clone(),
        };
        (transport, UnboundedReceiverStream::new(rx))
    }

    /// Number of connected clients.
    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Delivers a payload to every matching subscription.
    ///
    /// A client subscribed both exactly and through a pattern receives one
    /// copy per subscription. Returns the number of copies sent.
    pub async fn publish(&self, channel: &str, payload: &[u8]) -> u64 {
        let mut clients = self.clients.write().await;
        clients.retain(|_, client| !client.sender.is_closed());

        let mut delivered = 0;
        for client in clients.values() {
            if client.channels.contains(channel) {
                let message = InboundMessage::Literal {
                    channel: channel.to_string(),
                    payload: payload.to_vec(),
                };
                if client.sender.send(message).is_ok() {
                    delivered += 1;
                }
            }
            for pattern in &client.patterns {
                if !glob_match(pattern, channel) {
                    continue;
                }
                let message = InboundMessage::Pattern {
                    pattern: pattern.clone(),
                    channel: channel.to_string(),
                    payload: payload.to_vec(),
                };
                if client.sender.send(message).is_ok() {
                    delivered += 1;
                }
            }
        }
        delivered
    }

    async fn update<F>(&self, id: u64, change: F)
    where
        F: FnOnce(&mut Client),
    {
        if let Some(client) = self.clients.write().await.get_mut(&id) {
            change(client);
        }
    }
}

/// Outbound half of a memory broker client.
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    id: u64,
    broker: MemoryBroker,
}

#[async_trait]
impl PubSubTransport for MemoryTransport {
    async fn subscribe(&self, channel: &str) -> AppResult<()> {
        self.broker
            .update(self.id, |c| {
                c.channels.insert(channel.to_string());
            })
            .await;
        Ok(())
    }

    async fn unsubscribe(&self, channel: &str) -> AppResult<()> {
        self.broker
            .update(self.id, |c| {
                c.channels.remove(channel);
            })
            .await;
        Ok(())
    }

    async fn pattern_subscribe(&self, pattern: &str) -> AppResult<()> {
        self.broker
            .update(self.id, |c| {
                c.patterns.insert(pattern.to_string());
            })
            .await;
        Ok(())
    }

    async fn pattern_unsubscribe(&self, pattern: &str) -> AppResult<()> {
        self.broker
            .update(self.id, |c| {
                c.patterns.remove(pattern);
            })
            .await;
        Ok(())
    }

    async fn publish(&self, channel: &str, payload: Vec<u8>) -> AppResult<u64> {
        Ok(self.broker.publish(channel, &payload).await)
    }
}

/// Glob matching with `*` (any run of characters) and `?` (one character).
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                star = Some((p, t));
                p += 1;
            }
            Some(&c) if c == '?' || c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match star {
                Some((star_p, star_t)) => {
                    p = star_p + 1;
                    t = star_t + 1;
                    star = Some((star_p, star_t + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}
