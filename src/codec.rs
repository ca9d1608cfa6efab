//! Canonical byte encoding for payloads.
//!
//! Every payload the client produces is encoded through this module so
//! that identical inputs always yield byte-identical output. The codec
//! is pure, total over the types it is given, and invertible:
//! `decode(encode(v)) == v` and `encode(decode(bytes)) == bytes`.

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{ClientError, Result};

/// Encode a value to its canonical byte form.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| ClientError::Codec(e.to_string()))
}

/// Decode a value from its canonical byte form.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| ClientError::Codec(e.to_string()))
}

/// Build the exact message a signer signs: the module's context label,
/// length-prefixed to keep the framing unambiguous, followed by the
/// canonical payload bytes. The payload bytes already bind the nonce.
pub fn signing_input(context_label: &[u8], payload_bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + context_label.len() + payload_bytes.len());
    out.extend_from_slice(&(context_label.len() as u32).to_le_bytes());
    out.extend_from_slice(context_label);
    out.extend_from_slice(payload_bytes);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        a: u64,
        b: Vec<u8>,
        c: Option<String>,
    }

    #[test]
    fn test_encode_deterministic() {
        let v = Sample {
            a: 7,
            b: vec![1, 2, 3],
            c: Some("x".into()),
        };
        assert_eq!(encode(&v).unwrap(), encode(&v).unwrap());
    }

    #[test]
    fn test_roundtrip() {
        let v = Sample {
            a: 42,
            b: vec![],
            c: None,
        };
        let bytes = encode(&v).unwrap();
        let back: Sample = decode(&bytes).unwrap();
        assert_eq!(back, v);
        assert_eq!(encode(&back).unwrap(), bytes);
    }

    #[test]
    fn test_signing_input_framing() {
        // Moving a byte across the label/payload boundary must change the message.
        let a = signing_input(b"ab", b"c");
        let b = signing_input(b"a", b"bc");
        assert_ne!(a, b);
    }
}
