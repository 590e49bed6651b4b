//! Test doubles shared by unit tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;

use eventhub_core::error::AppError;
use eventhub_core::result::AppResult;
use eventhub_core::traits::PubSubTransport;

/// A call made against [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Subscribe(String),
    Unsubscribe(String),
    PatternSubscribe(String),
    PatternUnsubscribe(String),
    Publish(String, Vec<u8>),
}

/// Transport that records every call and delivers nothing.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    calls: Mutex<Vec<TransportCall>>,
    fail_next: AtomicBool,
    deliveries: AtomicU64,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call so far, excluding publishes.
    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| !matches!(c, TransportCall::Publish(..)))
            .cloned()
            .collect()
    }

    /// Every publish so far as `(channel, payload)`.
    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| match c {
                TransportCall::Publish(channel, payload) => Some((channel.clone(), payload.clone())),
                _ => None,
            })
            .collect()
    }

    /// Makes the next call fail with a transport error.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Sets the delivery count reported by `publish`.
    pub fn set_deliveries(&self, count: u64) {
        self.deliveries.store(count, Ordering::SeqCst);
    }

    fn record(&self, call: TransportCall) -> AppResult<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(AppError::transport("connection refused"));
        }
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

#[async_trait]
impl PubSubTransport for RecordingTransport {
    async fn subscribe(&self, channel: &str) -> AppResult<()> {
        self.record(TransportCall::Subscribe(channel.to_string()))
    }

    async fn unsubscribe(&self, channel: &str) -> AppResult<()> {
        self.record(TransportCall::Unsubscribe(channel.to_string()))
    }

    async fn pattern_subscribe(&self, pattern: &str) -> AppResult<()> {
        self.record(TransportCall::PatternSubscribe(pattern.to_string()))
    }

    async fn pattern_unsubscribe(&self, pattern: &str) -> AppResult<()> {
        self.record(TransportCall::PatternUnsubscribe(pattern.to_string()))
    }

    async fn publish(&self, channel: &str, payload: Vec<u8>) -> AppResult<u64> {
        self.record(TransportCall::Publish(channel.to_string(), payload))?;
        Ok(self.deliveries.load(Ordering::SeqCst))
    }
}
