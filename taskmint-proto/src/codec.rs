//! JSON serialization for the `TaskMint` REST payloads.
//!
//! Both backends speak JSON. Responses are decoded from raw bytes so
//! that decode failures surface as [`CodecError`] rather than as an
//! opaque HTTP client error.

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Error type for codec encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Encodes a value into a JSON byte vector.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the value cannot be serialized.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(value).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Decodes a value from a JSON byte slice.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the bytes are not valid JSON
/// for `T`.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    serde_json::from_slice(bytes).map_err(|e| CodecError::Serialization(e.to_string()))
}
