//! Payload serialization provided by [`serde_json`]
//!
//! Used by the [`message_union!`](crate::message_union) macro. Swapping the serialization format of
//! all messages is a matter of changing these two functions.

use super::super::event::CodecError;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Serializes a payload using [`serde_json::to_vec`]
pub fn encode<T: Serialize>(message_type: &str, value: &T) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(value).map_err(|source| CodecError::Payload {
        message_type: message_type.to_owned(),
        source,
    })
}

/// Parses a payload using [`serde_json::from_slice`]
pub fn decode<T: DeserializeOwned>(message_type: &str, payload: &[u8]) -> Result<T, CodecError> {
    serde_json::from_slice(payload).map_err(|source| CodecError::Payload {
        message_type: message_type.to_owned(),
        source,
    })
}
