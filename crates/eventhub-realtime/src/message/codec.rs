//! Wire codecs for event tuples.
//!
//! A payload on the wire is the encoded sequence `[event, arg0, arg1, ...]`.
//! Two codecs are built in: JSON (readable, the default) and MessagePack
//! (compact). A registry picks one at construction and keeps it.

use std::fmt::Debug;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use eventhub_core::config::CodecKind;
use eventhub_core::error::{AppError, ErrorKind};

use super::types::Message;

/// Deepest nesting accepted from the wire, matching `serde_json`'s limit.
const MAX_DECODE_DEPTH: usize = 128;

/// Errors produced while encoding or decoding a payload.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The tuple could not be serialized.
    #[error("failed to encode payload with {codec}: {reason}")]
    Encode {
        /// Codec name.
        codec: &'static str,
        /// Underlying failure.
        reason: String,
    },
    /// The bytes are not a valid document for this codec.
    #[error("failed to decode payload with {codec}: {reason}")]
    Decode {
        /// Codec name.
        codec: &'static str,
        /// Underlying failure.
        reason: String,
    },
    /// The payload decoded, but not to a sequence.
    #[error("payload is not a sequence")]
    NotASequence,
    /// The payload decoded to an empty sequence.
    #[error("payload sequence is empty")]
    EmptyMessage,
    /// The first tuple element is not a string.
    #[error("event name must be a string, got {0}")]
    InvalidEventName(Value),
}

impl From<CodecError> for AppError {
    fn from(err: CodecError) -> Self {
        AppError::with_source(ErrorKind::Serialization, err.to_string(), err)
    }
}

/// Encodes and decodes event tuples.
pub trait MessageCodec: Send + Sync + Debug + 'static {
    /// Short codec name used in logs.
    fn name(&self) -> &'static str;

    /// Encodes a tuple into wire bytes.
    fn encode(&self, tuple: &[Value]) -> Result<Vec<u8>, CodecError>;

    /// Decodes wire bytes into a tuple.
    fn decode(&self, bytes: &[u8]) -> Result<Vec<Value>, CodecError>;

    /// Encodes an event name and arguments.
    fn encode_message(&self, message: &Message) -> Result<Vec<u8>, CodecError> {
        self.encode(&message.to_tuple())
    }

    /// Decodes wire bytes and checks the tuple shape.
    fn decode_message(&self, bytes: &[u8]) -> Result<Message, CodecError> {
        let mut tuple = self.decode(bytes)?.into_iter();
        match tuple.next() {
            None => Err(CodecError::EmptyMessage),
            Some(Value::String(event)) => Ok(Message::new(event, tuple.collect())),
            Some(other) => Err(CodecError::InvalidEventName(other)),
        }
    }
}

/// Human-readable JSON codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl MessageCodec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode(&self, tuple: &[Value]) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(tuple).map_err(|e| CodecError::Encode {
            codec: self.name(),
            reason: e.to_string(),
        })
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<Value>, CodecError> {
        let value: Value = serde_json::from_slice(bytes).map_err(|e| CodecError::Decode {
            codec: self.name(),
            reason: e.to_string(),
        })?;
        into_sequence(value)
    }
}

/// Compact MessagePack codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgPackCodec;

impl MessageCodec for MsgPackCodec {
    fn name(&self) -> &'static str {
        "msgpack"
    }

    fn encode(&self, tuple: &[Value]) -> Result<Vec<u8>, CodecError> {
        rmp_serde::to_vec(tuple).map_err(|e| CodecError::Encode {
            codec: self.name(),
            reason: e.to_string(),
        })
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<Value>, CodecError> {
        let mut deserializer = rmp_serde::Deserializer::from_read_ref(bytes);
        deserializer.set_max_depth(MAX_DECODE_DEPTH);
        let value = Value::deserialize(&mut deserializer).map_err(|e| CodecError::Decode {
            codec: self.name(),
            reason: e.to_string(),
        })?;
        into_sequence(value)
    }
}

fn into_sequence(value: Value) -> Result<Vec<Value>, CodecError> {
    match value {
        Value::Array(items) => Ok(items),
        _ => Err(CodecError::NotASequence),
    }
}

/// Builds the codec selected in configuration.
pub fn codec_for(kind: CodecKind) -> Arc<dyn MessageCodec> {
    match kind {
        CodecKind::Json => Arc::new(JsonCodec),
        CodecKind::Msgpack => Arc::new(MsgPackCodec),
    }
}
