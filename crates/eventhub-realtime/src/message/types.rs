//! Event tuple and transport notification type definitions.

use serde_json::Value;

/// A decoded wire message: `[event, arg0, arg1, ...]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Event name (first element of the tuple).
    pub event: String,
    /// Remaining tuple elements, in emit order.
    pub args: Vec<Value>,
}

impl Message {
    /// Creates a message from an event name and its arguments.
    pub fn new(event: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            event: event.into(),
            args,
        }
    }

    /// Flattens the message back into the wire tuple.
    pub fn to_tuple(&self) -> Vec<Value> {
        let mut tuple = Vec::with_capacity(self.args.len() + 1);
        tuple.push(Value::String(self.event.clone()));
        tuple.extend(self.args.iter().cloned());
        tuple
    }
}

/// What a listener sees when an event is delivered.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Concrete channel the event arrived on. For a pattern emitter this is
    /// the matched channel, not the pattern.
    pub channel: String,
    /// Event name.
    pub event: String,
    /// Event arguments.
    pub args: Vec<Value>,
}

impl Event {
    /// Returns the argument at `index`, if present.
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }
}

/// A notification produced by a transport's inbound side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// Delivery for an exact channel subscription.
    Literal {
        /// Channel name.
        channel: String,
        /// Encoded payload.
        payload: Vec<u8>,
    },
    /// Delivery for a pattern subscription.
    Pattern {
        /// The subscribed glob pattern.
        pattern: String,
        /// The concrete channel that matched.
        channel: String,
        /// Encoded payload.
        payload: Vec<u8>,
    },
}
