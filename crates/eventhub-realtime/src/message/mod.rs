//! Event tuples, wire codecs, and transport notification types.

pub mod codec;
pub mod types;

pub use codec::{CodecError, JsonCodec, MessageCodec, MsgPackCodec, codec_for};
pub use types::{Event, InboundMessage, Message};
