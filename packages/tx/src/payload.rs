//! Values accepted by `set_data`.

use bytes::Bytes;
use burrow_path::Fp;
use serde_json::Value as JsonValue;

use crate::TxError;

/// Something that can be written as an entity's payload.
///
/// `Null`, empty text and empty bytes all mean "delete the payload"; stored-empty and absent
/// are the same thing.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Null,
    Bytes(Bytes),
    Text(String),
    /// Serialized before storage.
    Json(JsonValue),
}

impl Payload {
    pub fn is_delete(&self) -> bool {
        match self {
            Payload::Null | Payload::Json(JsonValue::Null) => true,
            Payload::Bytes(b) => b.is_empty(),
            Payload::Text(s) => s.is_empty(),
            Payload::Json(_) => false,
        }
    }

    /// The bytes to store, or `None` for a delete.
    pub(crate) fn into_stored(self, path: &Fp) -> Result<Option<Bytes>, TxError> {
        if self.is_delete() {
            return Ok(None);
        }
        let bytes = match self {
            Payload::Bytes(b) => b,
            Payload::Text(s) => Bytes::from(s),
            Payload::Json(v) => Bytes::from(serde_json::to_vec(&v).map_err(|source| {
                TxError::Serialize {
                    path: path.clone(),
                    source,
                }
            })?),
            Payload::Null => Bytes::new(),
        };
        Ok(Some(bytes))
    }
}

impl From<Bytes> for Payload {
    fn from(b: Bytes) -> Self {
        Payload::Bytes(b)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(b: Vec<u8>) -> Self {
        Payload::Bytes(Bytes::from(b))
    }
}

impl From<&[u8]> for Payload {
    fn from(b: &[u8]) -> Self {
        Payload::Bytes(Bytes::copy_from_slice(b))
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Payload::Text(s)
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Payload::Text(s.to_string())
    }
}

impl From<JsonValue> for Payload {
    fn from(v: JsonValue) -> Self {
        Payload::Json(v)
    }
}

impl<T: Into<Payload>> From<Option<T>> for Payload {
    fn from(v: Option<T>) -> Self {
        v.map_or(Payload::Null, Into::into)
    }
}
