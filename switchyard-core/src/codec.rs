//! Codec for wire message serialization and deserialization
//!
//! This module provides functions for encoding messages to JSON text and
//! decoding JSON text back into [`Message`] values, for transports that
//! carry one JSON object per frame.
//!
//! # Why a Codec Module?
//!
//! While serde provides generic JSON serialization, this module adds:
//! - **Error mapping**: serde failures become `Error::Serialization`
//! - **A single seam**: transports and tests encode/decode through one place,
//!   so the wire representation can only change here
//!
//! # Examples
//!
//! ```rust
//! use switchyard_core::{codec, Message, messages::SubscribeRequest};
//!
//! let msg = Message::Subscribe(SubscribeRequest {
//!     request_id: "1".into(),
//!     topic: "prices".into(),
//! });
//! let json = codec::encode(&msg).unwrap();
//! let decoded = codec::decode(&json).unwrap();
//! assert_eq!(decoded, msg);
//! ```

use crate::error::{Error, Result};
use crate::messages::Message;
use serde::{Deserialize, Serialize};

/// Encode any serializable message to a JSON string
///
/// # Errors
///
/// Returns `Error::Serialization` if the value cannot be serialized to JSON.
pub fn encode<T: Serialize>(msg: &T) -> Result<String> {
    serde_json::to_string(msg).map_err(|e| Error::Serialization(e.to_string()))
}

/// Decode a JSON string into a wire [`Message`]
///
/// The `type` field selects the variant; text that is not valid JSON, or
/// that names an unknown message kind, fails with `Error::Serialization`.
pub fn decode(data: &str) -> Result<Message> {
    decode_as(data)
}

/// Decode a JSON string to a specific wire type
///
/// Lower-level variant of [`decode`] for callers that know exactly which
/// shape to expect (tests, mostly).
pub fn decode_as<'de, T: Deserialize<'de>>(data: &'de str) -> Result<T> {
    serde_json::from_str(data).map_err(|e| Error::Serialization(e.to_string()))
}
