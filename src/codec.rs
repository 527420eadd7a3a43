//! Value serialization
//!
//! Object payloads cross the engine boundary as opaque bytes produced by a
//! pluggable codec. The default codec is JSON. Plain string payloads use a
//! separate raw UTF-8 path to avoid the object encoding overhead.

use crate::error::{KvError, Result};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Serialization capability for stored values
///
/// Turns arbitrary serializable payloads into the opaque bytes the engine
/// stores, and back. The concrete codec is resolved at the call site via
/// the facade's type parameter; no runtime type inspection.
pub trait Codec: Send + Sync {
    /// Serialize a value to bytes
    fn encode<T: Serialize>(&self, value: &T) -> Result<Bytes>;

    /// Deserialize a value from bytes
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T>;
}

/// JSON codec backed by serde_json
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Bytes> {
        let buf = serde_json::to_vec(value)?;
        Ok(Bytes::from(buf))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Encode a plain string payload (raw UTF-8, no codec)
pub(crate) fn string_to_bytes(value: &str) -> Bytes {
    Bytes::copy_from_slice(value.as_bytes())
}

/// Decode a plain string payload
pub(crate) fn string_from_bytes(bytes: &Bytes) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|_| KvError::InvalidUtf8)
}
