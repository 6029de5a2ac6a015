//! The COSE message family and the tag-dispatching codec.
//!
//! Every message encodes as a CBOR array, optionally wrapped in its
//! registered tag. Decoding dispatches on the tag; untagged input needs an
//! explicit kind from the caller.

use ciborium::value::Value;
use ensign_core::canonical;
use ensign_core::{CoseError, Result};

use crate::headers::{self, HeaderMap, ProtectedHeader};

pub mod encrypt;
pub mod mac;
pub mod sign;

pub use encrypt::{CoseEncrypt, CoseEncrypt0};
pub use mac::{CoseMac, CoseMac0};
pub use sign::{CoseSign, CoseSign1, CoseSignature};

/// CBOR tags for the message variants (RFC 8152 table 1).
pub mod tags {
    pub const ENCRYPT0: u64 = 16;
    pub const MAC0: u64 = 17;
    pub const SIGN1: u64 = 18;
    pub const ENCRYPT: u64 = 96;
    pub const MAC: u64 = 97;
    pub const SIGN: u64 = 98;
}

/// Message variant, for decoding untagged input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Sign1,
    Sign,
    Mac0,
    Mac,
    Encrypt0,
    Encrypt,
}

/// Any COSE message.
#[derive(Debug, Clone)]
pub enum CoseMessage {
    Sign1(CoseSign1),
    Sign(CoseSign),
    Mac0(CoseMac0),
    Mac(CoseMac),
    Encrypt0(CoseEncrypt0),
    Encrypt(CoseEncrypt),
}

impl CoseMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            CoseMessage::Sign1(_) => MessageKind::Sign1,
            CoseMessage::Sign(_) => MessageKind::Sign,
            CoseMessage::Mac0(_) => MessageKind::Mac0,
            CoseMessage::Mac(_) => MessageKind::Mac,
            CoseMessage::Encrypt0(_) => MessageKind::Encrypt0,
            CoseMessage::Encrypt(_) => MessageKind::Encrypt,
        }
    }

    /// Serialize, optionally attaching the variant's tag.
    pub fn to_bytes(&self, attach_tag: bool) -> Result<Vec<u8>> {
        match self {
            CoseMessage::Sign1(m) => m.to_bytes(attach_tag),
            CoseMessage::Sign(m) => m.to_bytes(attach_tag),
            CoseMessage::Mac0(m) => m.to_bytes(attach_tag),
            CoseMessage::Mac(m) => m.to_bytes(attach_tag),
            CoseMessage::Encrypt0(m) => m.to_bytes(attach_tag),
            CoseMessage::Encrypt(m) => m.to_bytes(attach_tag),
        }
    }
}

/// Encode a message, optionally wrapping it in its tag.
pub fn encode(msg: &CoseMessage, attach_tag: bool) -> Result<Vec<u8>> {
    msg.to_bytes(attach_tag)
}

/// Decode a tagged message, dispatching on the tag.
pub fn decode(bytes: &[u8]) -> Result<CoseMessage> {
    decode_inner(bytes, None, false)
}

/// Decode with strict header handling (unknown attributes are errors).
pub fn decode_strict(bytes: &[u8]) -> Result<CoseMessage> {
    decode_inner(bytes, None, true)
}

/// Decode input that may be untagged, using `kind` as the type hint.
/// A present tag must still match the hint.
pub fn decode_as(kind: MessageKind, bytes: &[u8]) -> Result<CoseMessage> {
    decode_inner(bytes, Some(kind), false)
}

fn decode_inner(bytes: &[u8], hint: Option<MessageKind>, strict: bool) -> Result<CoseMessage> {
    let value = canonical::decode(bytes)?;
    let (kind, body) = match &value {
        Value::Tag(tag, inner) => {
            let kind = kind_for_tag(*tag)?;
            if let Some(hint) = hint {
                if hint != kind {
                    return Err(CoseError::MalformedMessage(format!(
                        "tag {tag} does not match expected {hint:?}"
                    )));
                }
            }
            tracing::debug!(tag = *tag, ?kind, "decoding tagged message");
            (kind, inner.as_ref())
        }
        other => {
            let kind = hint.ok_or_else(|| {
                CoseError::MalformedMessage("untagged message requires an expected kind".into())
            })?;
            (kind, other)
        }
    };

    Ok(match kind {
        MessageKind::Sign1 => CoseMessage::Sign1(CoseSign1::from_value(body, strict)?),
        MessageKind::Sign => CoseMessage::Sign(CoseSign::from_value(body, strict)?),
        MessageKind::Mac0 => CoseMessage::Mac0(CoseMac0::from_value(body, strict)?),
        MessageKind::Mac => CoseMessage::Mac(CoseMac::from_value(body, strict)?),
        MessageKind::Encrypt0 => CoseMessage::Encrypt0(CoseEncrypt0::from_value(body, strict)?),
        MessageKind::Encrypt => CoseMessage::Encrypt(CoseEncrypt::from_value(body, strict)?),
    })
}

fn kind_for_tag(tag: u64) -> Result<MessageKind> {
    Ok(match tag {
        tags::SIGN1 => MessageKind::Sign1,
        tags::SIGN => MessageKind::Sign,
        tags::MAC0 => MessageKind::Mac0,
        tags::MAC => MessageKind::Mac,
        tags::ENCRYPT0 => MessageKind::Encrypt0,
        tags::ENCRYPT => MessageKind::Encrypt,
        _ => {
            return Err(CoseError::MalformedMessage(format!(
                "unknown COSE tag {tag}"
            )))
        }
    })
}

// shared decode plumbing

/// Check the variant's array shape and return the elements.
pub(crate) fn expect_array<'a>(value: &'a Value, len: usize, what: &str) -> Result<&'a [Value]> {
    match value {
        Value::Array(items) if items.len() == len => Ok(items),
        Value::Array(items) => Err(CoseError::MalformedMessage(format!(
            "{what} must be an array of {len} elements, got {}",
            items.len()
        ))),
        _ => Err(CoseError::MalformedMessage(format!("{what} must be an array"))),
    }
}

/// Parse elements 0 and 1: protected bucket bstr and unprotected map.
pub(crate) fn parse_buckets(
    items: &[Value],
    strict: bool,
) -> Result<(ProtectedHeader, HeaderMap)> {
    let protected = match &items[0] {
        Value::Bytes(b) => ProtectedHeader::from_bytes(b, strict)?,
        _ => {
            return Err(CoseError::MalformedMessage(
                "protected bucket must be a bstr".into(),
            ))
        }
    };
    let unprotected = match &items[1] {
        map @ Value::Map(_) => HeaderMap::from_value(map, strict)?,
        _ => {
            return Err(CoseError::MalformedMessage(
                "unprotected bucket must be a map".into(),
            ))
        }
    };
    headers::assert_no_overlap(protected.map(), &unprotected)?;
    headers::validate_crit(protected.map(), &unprotected)?;
    Ok((protected, unprotected))
}

/// A payload slot: bstr, or nil for detached content.
pub(crate) fn parse_payload(value: &Value, what: &str) -> Result<Option<Vec<u8>>> {
    match value {
        Value::Bytes(b) => Ok(Some(b.clone())),
        Value::Null => Ok(None),
        _ => Err(CoseError::MalformedMessage(format!(
            "{what} must be a bstr or nil"
        ))),
    }
}

pub(crate) fn expect_bstr(value: &Value, what: &str) -> Result<Vec<u8>> {
    match value {
        Value::Bytes(b) => Ok(b.clone()),
        _ => Err(CoseError::MalformedMessage(format!("{what} must be a bstr"))),
    }
}

/// Attached payload wins; a detached one must be supplied by the caller.
pub(crate) fn resolve_payload<'a>(
    stored: &'a Option<Vec<u8>>,
    supplied: Option<&'a [u8]>,
) -> Result<&'a [u8]> {
    match (stored, supplied) {
        (Some(p), _) => Ok(p),
        (None, Some(p)) => Ok(p),
        (None, None) => Err(CoseError::MalformedMessage(
            "detached payload must be supplied by the caller".into(),
        )),
    }
}

pub(crate) fn payload_value(payload: &Option<Vec<u8>>) -> Value {
    match payload {
        Some(p) => Value::Bytes(p.clone()),
        None => Value::Null,
    }
}

pub(crate) fn maybe_tag(value: Value, tag: u64, attach: bool) -> Value {
    if attach {
        Value::Tag(tag, Box::new(value))
    } else {
        value
    }
}
