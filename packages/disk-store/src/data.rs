//! Interpreting stored bytes.

use bytes::Bytes;
use burrow_path::Fp;
use serde_json::Value as JsonValue;

use crate::StoreError;

/// How a caller wants a payload interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    Binary,
    /// UTF-8; invalid sequences are replaced with U+FFFD.
    Text,
    /// JSON.
    Json,
}

/// A decoded payload. Absent payloads decode to empty bytes, empty text, or `None`.
#[derive(Debug, Clone, PartialEq)]
pub enum Data {
    Binary(Bytes),
    Text(String),
    Json(Option<JsonValue>),
}

impl Data {
    /// Decode raw payload bytes read from `path`.
    pub fn decode(bytes: Bytes, encoding: Encoding, path: &Fp) -> Result<Data, StoreError> {
        Ok(match encoding {
            Encoding::Binary => Data::Binary(bytes),
            Encoding::Text => Data::Text(String::from_utf8_lossy(&bytes).into_owned()),
            Encoding::Json if bytes.is_empty() => Data::Json(None),
            Encoding::Json => Data::Json(Some(serde_json::from_slice(&bytes).map_err(
                |source| StoreError::NonStructuredPayload {
                    path: path.clone(),
                    source,
                },
            )?)),
        })
    }

    pub fn encoding(&self) -> Encoding {
        match self {
            Data::Binary(_) => Encoding::Binary,
            Data::Text(_) => Encoding::Text,
            Data::Json(_) => Encoding::Json,
        }
    }

    /// The payload as raw bytes; structured values are re-serialized.
    pub fn into_bytes(self) -> Bytes {
        match self {
            Data::Binary(b) => b,
            Data::Text(s) => Bytes::from(s),
            Data::Json(None) => Bytes::new(),
            Data::Json(Some(v)) => Bytes::from(v.to_string()),
        }
    }

    /// The payload as text, replacing invalid UTF-8.
    pub fn into_text(self) -> String {
        match self {
            Data::Binary(b) => String::from_utf8_lossy(&b).into_owned(),
            Data::Text(s) => s,
            Data::Json(None) => String::new(),
            Data::Json(Some(v)) => v.to_string(),
        }
    }

    /// The structured payload; `None` when absent or when raw bytes don't parse.
    pub fn into_json(self) -> Option<JsonValue> {
        match self {
            Data::Binary(b) => serde_json::from_slice(&b).ok(),
            Data::Text(s) => serde_json::from_str(&s).ok(),
            Data::Json(v) => v,
        }
    }

    /// True for the value an absent payload decodes to.
    pub fn is_absent(&self) -> bool {
        match self {
            Data::Binary(b) => b.is_empty(),
            Data::Text(s) => s.is_empty(),
            Data::Json(v) => v.is_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burrow_path::fp;
    use serde_json::json;

    #[test]
    fn empty_decodes_to_absent_values() {
        for encoding in [Encoding::Binary, Encoding::Text, Encoding::Json] {
            let data = Data::decode(Bytes::new(), encoding, &fp!("a")).unwrap();
            assert!(data.is_absent());
            assert_eq!(data.encoding(), encoding);
        }
    }

    #[test]
    fn json_decodes() {
        let data = Data::decode(Bytes::from_static(br#"{"a":1}"#), Encoding::Json, &fp!("a"));
        assert_eq!(data.unwrap(), Data::Json(Some(json!({ "a": 1 }))));
    }

    #[test]
    fn conversions() {
        let json = Data::Json(Some(json!({ "k": [1] })));
        assert_eq!(json.clone().into_text(), r#"{"k":[1]}"#);
        assert_eq!(&json.clone().into_bytes()[..], br#"{"k":[1]}"#);
        assert_eq!(json.into_json(), Some(json!({ "k": [1] })));

        assert_eq!(Data::Text("[1,2]".into()).into_json(), Some(json!([1, 2])));
        assert_eq!(Data::Binary(Bytes::from_static(b"nope")).into_json(), None);
        assert_eq!(Data::Json(None).into_text(), "");
    }

    #[test]
    fn non_json_fails_structured_decode_only() {
        let raw = Bytes::from_static(&[0xff, 0x00, b'x']);
        let err = Data::decode(raw.clone(), Encoding::Json, &fp!("a")).unwrap_err();
        assert!(matches!(err, StoreError::NonStructuredPayload { .. }));

        assert_eq!(
            Data::decode(raw.clone(), Encoding::Binary, &fp!("a")).unwrap(),
            Data::Binary(raw.clone())
        );
        match Data::decode(raw, Encoding::Text, &fp!("a")).unwrap() {
            Data::Text(s) => assert!(s.contains('\u{fffd}')),
            other => panic!("unexpected {other:?}"),
        }
    }
}
