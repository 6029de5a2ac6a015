//! Canonical CBOR encoding for deterministic serialization.
//!
//! This module implements RFC 8949 Core Deterministic Encoding:
//! - Map keys sorted by encoded byte comparison
//! - Integers use smallest valid encoding
//! - Definite lengths only
//! - No floats (COSE structures never carry them)
//!
//! The canonical encoding is critical: protected headers, Sig/MAC/Enc
//! structures, and keys must produce identical bytes across peers so that
//! signatures and MACs roundtrip bit-for-bit.

use std::io::Cursor;

use ciborium::value::Value;

use crate::error::{CoseError, Result};

/// Encode a CBOR value to canonical bytes.
pub fn encode(value: &Value) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_value_to(&mut buf, value)?;
    Ok(buf)
}

/// Decode a single CBOR item, rejecting trailing bytes.
pub fn decode(bytes: &[u8]) -> Result<Value> {
    let mut cursor = Cursor::new(bytes);
    let value: Value = ciborium::from_reader(&mut cursor)
        .map_err(|e| CoseError::MalformedMessage(e.to_string()))?;
    if cursor.position() != bytes.len() as u64 {
        return Err(CoseError::MalformedMessage(format!(
            "{} trailing bytes after CBOR item",
            bytes.len() as u64 - cursor.position()
        )));
    }
    Ok(value)
}

/// Integer content of a CBOR value, when it is an integer that fits i64.
pub fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(i) => i64::try_from(i128::from(*i)).ok(),
        _ => None,
    }
}

/// Byte-string content of a CBOR value.
pub fn as_bytes(value: &Value) -> Option<&[u8]> {
    match value {
        Value::Bytes(b) => Some(b),
        _ => None,
    }
}

/// Recursively encode a CBOR value.
fn encode_value_to(buf: &mut Vec<u8>, value: &Value) -> Result<()> {
    match value {
        Value::Integer(i) => {
            encode_integer(buf, i128::from(*i))?;
        }
        Value::Bytes(b) => {
            encode_bytes(buf, b);
        }
        Value::Text(s) => {
            encode_text(buf, s);
        }
        Value::Array(arr) => {
            encode_uint(buf, 4, arr.len() as u64);
            for item in arr {
                encode_value_to(buf, item)?;
            }
        }
        Value::Map(entries) => {
            encode_map_canonical(buf, entries)?;
        }
        Value::Tag(tag, inner) => {
            encode_uint(buf, 6, *tag);
            encode_value_to(buf, inner)?;
        }
        Value::Bool(b) => {
            buf.push(if *b { 0xf5 } else { 0xf4 });
        }
        Value::Null => {
            buf.push(0xf6);
        }
        _ => {
            return Err(CoseError::MalformedMessage(
                "value type not allowed in canonical encoding".into(),
            ));
        }
    }
    Ok(())
}

/// Encode a CBOR integer (major types 0 and 1).
fn encode_integer(buf: &mut Vec<u8>, n: i128) -> Result<()> {
    if n >= 0 {
        if n > u64::MAX as i128 {
            return Err(CoseError::MalformedMessage("integer out of range".into()));
        }
        encode_uint(buf, 0, n as u64);
    } else {
        // CBOR encodes -1 as 0, -2 as 1, etc.
        let abs = -1 - n;
        if abs > u64::MAX as i128 {
            return Err(CoseError::MalformedMessage("integer out of range".into()));
        }
        encode_uint(buf, 1, abs as u64);
    }
    Ok(())
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

/// Encode a byte string (major type 2).
fn encode_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    encode_uint(buf, 2, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

/// Encode a text string (major type 3).
fn encode_text(buf: &mut Vec<u8>, s: &str) {
    encode_uint(buf, 3, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

/// Encode a map canonically (major type 5).
///
/// Keys are sorted by their encoded byte comparison.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Value, Value)]) -> Result<()> {
    let mut pairs: Vec<(Vec<u8>, &Value)> = Vec::with_capacity(entries.len());
    for (k, v) in entries {
        let mut key_buf = Vec::new();
        encode_value_to(&mut key_buf, k)?;
        pairs.push((key_buf, v));
    }

    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, pairs.len() as u64);
    for (key_bytes, value) in pairs {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn integer_encoding_smallest_form() {
        let mut buf = Vec::new();
        encode_uint(&mut buf, 0, 0);
        assert_eq!(buf, vec![0x00]);

        buf.clear();
        encode_uint(&mut buf, 0, 23);
        assert_eq!(buf, vec![0x17]);

        buf.clear();
        encode_uint(&mut buf, 0, 24);
        assert_eq!(buf, vec![0x18, 24]);

        buf.clear();
        encode_uint(&mut buf, 0, 256);
        assert_eq!(buf, vec![0x19, 0x01, 0x00]);

        buf.clear();
        encode_uint(&mut buf, 0, 65536);
        assert_eq!(buf, vec![0x1a, 0x00, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn negative_integer_encoding() {
        // alg label for ES256 is -7, encoded as 0x26
        let bytes = encode(&Value::from(-7)).unwrap();
        assert_eq!(bytes, vec![0x26]);

        let bytes = encode(&Value::from(-25)).unwrap();
        assert_eq!(bytes, vec![0x38, 24]);
    }

    #[test]
    fn map_keys_sorted_by_encoded_bytes() {
        let map = Value::Map(vec![
            (Value::from(4), Value::Bytes(vec![0x31, 0x31])),
            (Value::from(1), Value::from(-7)),
        ]);
        // {1: -7, 4: h'3131'}
        assert_eq!(encode(&map).unwrap(), hex!("a20126044231 31"));
    }

    #[test]
    fn protected_header_alg_es256() {
        // {1: -7} is the canonical protected bucket for ES256
        let map = Value::Map(vec![(Value::from(1), Value::from(-7))]);
        assert_eq!(encode(&map).unwrap(), hex!("a10126"));
    }

    #[test]
    fn tagged_value() {
        let tagged = Value::Tag(18, Box::new(Value::Array(vec![Value::Bytes(vec![])])));
        assert_eq!(encode(&tagged).unwrap(), vec![0xd2, 0x81, 0x40]);
    }

    #[test]
    fn decode_rejects_trailing_bytes() {
        let mut bytes = encode(&Value::from(1)).unwrap();
        bytes.push(0x00);
        assert!(matches!(
            decode(&bytes),
            Err(CoseError::MalformedMessage(_))
        ));
    }

    #[test]
    fn decode_roundtrip() {
        let value = Value::Array(vec![
            Value::Text("Signature1".into()),
            Value::Bytes(hex!("a10126").to_vec()),
            Value::Bytes(vec![]),
            Value::Bytes(b"This is the content.".to_vec()),
        ]);
        let bytes = encode(&value).unwrap();
        assert_eq!(decode(&bytes).unwrap(), value);
    }

    #[test]
    fn floats_rejected() {
        assert!(encode(&Value::Float(1.5)).is_err());
    }

    proptest::proptest! {
        #[test]
        fn integers_roundtrip(n in proptest::prelude::any::<i64>()) {
            let bytes = encode(&Value::from(n)).unwrap();
            proptest::prop_assert_eq!(decode(&bytes).unwrap(), Value::from(n));
        }

        #[test]
        fn byte_strings_roundtrip(b in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..128)) {
            let bytes = encode(&Value::Bytes(b.clone())).unwrap();
            proptest::prop_assert_eq!(decode(&bytes).unwrap(), Value::Bytes(b));
        }
    }
}
