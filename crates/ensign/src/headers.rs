//! Header buckets and the attribute registry.
//!
//! Every message carries two buckets: the protected bucket, serialized as
//! a byte string containing a CBOR map, and the unprotected bucket, a CBOR
//! map emitted in place. The protected bucket's byte form is part of the
//! cryptographic input, so received bytes are retained verbatim and never
//! re-encoded.

use ciborium::value::Value;
use ensign_core::algs::{self, Algorithm};
use ensign_core::canonical::{self, as_i64};
use ensign_core::keys::CoseKey;
use ensign_core::{CoseError, Result};

/// Registered header attribute labels (IANA COSE Header Parameters and
/// the HKDF/ECDH algorithm parameters).
pub mod attr {
    pub const ALG: i64 = 1;
    pub const CRIT: i64 = 2;
    pub const CONTENT_TYPE: i64 = 3;
    pub const KID: i64 = 4;
    pub const IV: i64 = 5;
    pub const PARTIAL_IV: i64 = 6;
    pub const COUNTER_SIGNATURE: i64 = 7;
    pub const X5CHAIN: i64 = 33;

    // HKDF parameters
    pub const SALT: i64 = -20;
    pub const PARTY_U_IDENTITY: i64 = -21;
    pub const PARTY_U_NONCE: i64 = -22;
    pub const PARTY_U_OTHER: i64 = -23;
    pub const PARTY_V_IDENTITY: i64 = -24;
    pub const PARTY_V_NONCE: i64 = -25;
    pub const PARTY_V_OTHER: i64 = -26;

    // ECDH parameters
    pub const EPHEMERAL_KEY: i64 = -1;
    pub const STATIC_KEY: i64 = -2;
    pub const STATIC_KEY_ID: i64 = -3;
}

/// A header map label: integer or text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Label {
    Int(i64),
    Text(String),
}

impl Label {
    pub fn to_value(&self) -> Value {
        match self {
            Label::Int(i) => Value::from(*i),
            Label::Text(s) => Value::Text(s.clone()),
        }
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Text(s) => Ok(Label::Text(s.clone())),
            _ => as_i64(value)
                .map(Label::Int)
                .ok_or_else(|| CoseError::InvalidHeader("label must be int or tstr".into())),
        }
    }
}

impl From<i64> for Label {
    fn from(i: i64) -> Self {
        Label::Int(i)
    }
}

impl From<&str> for Label {
    fn from(s: &str) -> Self {
        Label::Text(s.to_string())
    }
}

/// The registry name of a known attribute, or `None` when the label is
/// outside the closed set this implementation understands.
pub fn attr_name(label: &Label) -> Option<&'static str> {
    match label {
        Label::Int(attr::ALG) => Some("alg"),
        Label::Int(attr::CRIT) => Some("crit"),
        Label::Int(attr::CONTENT_TYPE) => Some("content type"),
        Label::Int(attr::KID) => Some("kid"),
        Label::Int(attr::IV) => Some("IV"),
        Label::Int(attr::PARTIAL_IV) => Some("Partial IV"),
        Label::Int(attr::COUNTER_SIGNATURE) => Some("counter signature"),
        Label::Int(attr::X5CHAIN) => Some("x5chain"),
        Label::Int(attr::SALT) => Some("salt"),
        Label::Int(attr::PARTY_U_IDENTITY) => Some("PartyU identity"),
        Label::Int(attr::PARTY_U_NONCE) => Some("PartyU nonce"),
        Label::Int(attr::PARTY_U_OTHER) => Some("PartyU other"),
        Label::Int(attr::PARTY_V_IDENTITY) => Some("PartyV identity"),
        Label::Int(attr::PARTY_V_NONCE) => Some("PartyV nonce"),
        Label::Int(attr::PARTY_V_OTHER) => Some("PartyV other"),
        Label::Int(attr::EPHEMERAL_KEY) => Some("ephemeral key"),
        Label::Int(attr::STATIC_KEY) => Some("static key"),
        Label::Int(attr::STATIC_KEY_ID) => Some("static key id"),
        _ => None,
    }
}

/// Validate a value against its attribute's expected shape.
///
/// Unknown attributes accept any value and round-trip unchanged.
fn validate_value(label: &Label, value: &Value) -> Result<()> {
    let bad = |want: &str| {
        Err(CoseError::InvalidHeader(format!(
            "{} must be {want}",
            attr_name(label).unwrap_or("attribute")
        )))
    };
    match label {
        Label::Int(attr::ALG) => match value {
            Value::Integer(_) => {
                algs::lookup(as_i64(value).ok_or_else(|| {
                    CoseError::InvalidAlgorithm("algorithm id out of range".into())
                })?)?;
                Ok(())
            }
            Value::Text(name) => algs::lookup_name(name).map(|_| ()),
            _ => bad("an int or tstr"),
        },
        Label::Int(attr::CRIT) => match value {
            Value::Array(items) if !items.is_empty() => {
                for item in items {
                    Label::from_value(item)?;
                }
                Ok(())
            }
            _ => bad("a non-empty array of labels"),
        },
        Label::Int(attr::CONTENT_TYPE) => match value {
            Value::Integer(_) | Value::Text(_) => Ok(()),
            _ => bad("an int or tstr"),
        },
        Label::Int(
            attr::KID
            | attr::IV
            | attr::PARTIAL_IV
            | attr::SALT
            | attr::STATIC_KEY_ID,
        ) => match value {
            Value::Bytes(_) => Ok(()),
            _ => bad("a bstr"),
        },
        Label::Int(
            attr::PARTY_U_IDENTITY
            | attr::PARTY_U_NONCE
            | attr::PARTY_U_OTHER
            | attr::PARTY_V_IDENTITY
            | attr::PARTY_V_NONCE
            | attr::PARTY_V_OTHER,
        ) => match value {
            Value::Bytes(_) | Value::Null => Ok(()),
            _ => bad("a bstr or nil"),
        },
        Label::Int(attr::EPHEMERAL_KEY | attr::STATIC_KEY) => match value {
            Value::Map(_) => Ok(()),
            _ => bad("a COSE_Key map"),
        },
        // carried opaquely
        Label::Int(attr::COUNTER_SIGNATURE | attr::X5CHAIN) => Ok(()),
        _ => Ok(()),
    }
}

/// An ordered attribute map. Duplicate labels are rejected on parse;
/// `insert` replaces an existing entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderMap {
    entries: Vec<(Label, Value)>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an attribute, validating its value shape.
    pub fn insert(&mut self, label: impl Into<Label>, value: Value) -> Result<()> {
        let label = label.into();
        validate_value(&label, &value)?;
        if let Some(slot) = self.entries.iter_mut().find(|(l, _)| *l == label) {
            slot.1 = value;
        } else {
            self.entries.push((label, value));
        }
        Ok(())
    }

    pub fn get(&self, label: impl Into<Label>) -> Option<&Value> {
        let label = label.into();
        self.entries.iter().find(|(l, _)| *l == label).map(|(_, v)| v)
    }

    pub fn remove(&mut self, label: impl Into<Label>) -> Option<Value> {
        let label = label.into();
        let pos = self.entries.iter().position(|(l, _)| *l == label)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn contains(&self, label: impl Into<Label>) -> bool {
        self.get(label).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Label, Value)> {
        self.entries.iter()
    }

    /// The `alg` attribute resolved against the registry.
    pub fn alg(&self) -> Result<Option<Algorithm>> {
        match self.get(attr::ALG) {
            None => Ok(None),
            Some(Value::Text(name)) => algs::lookup_name(name).map(Some),
            Some(v) => {
                let id = as_i64(v).ok_or_else(|| {
                    CoseError::InvalidAlgorithm("algorithm id out of range".into())
                })?;
                algs::lookup(id).map(Some)
            }
        }
    }

    /// A byte-string attribute.
    pub fn bytes(&self, label: i64) -> Option<&[u8]> {
        match self.get(label) {
            Some(Value::Bytes(b)) => Some(b),
            _ => None,
        }
    }

    /// The `crit` list, when present.
    pub fn crit(&self) -> Result<Option<Vec<Label>>> {
        match self.get(attr::CRIT) {
            None => Ok(None),
            Some(Value::Array(items)) => {
                let mut labels = Vec::with_capacity(items.len());
                for item in items {
                    labels.push(Label::from_value(item)?);
                }
                Ok(Some(labels))
            }
            Some(_) => Err(CoseError::InvalidHeader("crit must be an array".into())),
        }
    }

    /// A COSE_Key carried as an attribute value (ephemeral or static key).
    pub fn key_attr(&self, label: i64) -> Result<Option<CoseKey>> {
        match self.get(label) {
            None => Ok(None),
            Some(value) => CoseKey::from_value(value).map(Some),
        }
    }

    pub fn set_alg(&mut self, alg: Algorithm) {
        // registered algorithm values always pass validation
        let _ = self.insert(attr::ALG, Value::from(alg.value()));
    }

    pub fn set_kid(&mut self, kid: impl Into<Vec<u8>>) {
        let _ = self.insert(attr::KID, Value::Bytes(kid.into()));
    }

    pub fn set_iv(&mut self, iv: impl Into<Vec<u8>>) {
        let _ = self.insert(attr::IV, Value::Bytes(iv.into()));
    }

    pub fn set_partial_iv(&mut self, iv: impl Into<Vec<u8>>) {
        let _ = self.insert(attr::PARTIAL_IV, Value::Bytes(iv.into()));
    }

    /// The CBOR map form.
    pub fn to_value(&self) -> Value {
        Value::Map(
            self.entries
                .iter()
                .map(|(l, v)| (l.to_value(), v.clone()))
                .collect(),
        )
    }

    /// Parse a bucket from a decoded CBOR map.
    ///
    /// Duplicate labels are rejected. Unknown attributes are preserved
    /// verbatim; with `strict` they are an error instead.
    pub fn from_value(value: &Value, strict: bool) -> Result<Self> {
        let entries = match value {
            Value::Map(m) => m,
            _ => return Err(CoseError::InvalidHeader("bucket must be a map".into())),
        };
        let mut map = HeaderMap::new();
        for (raw_label, raw_value) in entries {
            let label = Label::from_value(raw_label)?;
            if map.contains(label.clone()) {
                return Err(CoseError::InvalidHeader(format!(
                    "duplicate attribute {label:?}"
                )));
            }
            if attr_name(&label).is_none() {
                if strict {
                    return Err(CoseError::UnknownAttribute(format!("{label:?}")));
                }
                tracing::warn!(?label, "preserving unknown header attribute");
            }
            validate_value(&label, raw_value)?;
            map.entries.push((label, raw_value.clone()));
        }
        Ok(map)
    }
}

/// The protected bucket: a header map plus its byte-string form.
///
/// Once a message is decoded (or a tag/signature computed), the byte form
/// is pinned and reused for every Sig/MAC/Enc-structure computation.
/// Mutation clears the pin.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProtectedHeader {
    map: HeaderMap,
    raw: Option<Vec<u8>>,
}

impl ProtectedHeader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map(&self) -> &HeaderMap {
        &self.map
    }

    pub fn insert(&mut self, label: impl Into<Label>, value: Value) -> Result<()> {
        self.raw = None;
        self.map.insert(label, value)
    }

    pub fn remove(&mut self, label: impl Into<Label>) -> Option<Value> {
        self.raw = None;
        self.map.remove(label)
    }

    pub fn set_alg(&mut self, alg: Algorithm) {
        self.raw = None;
        self.map.set_alg(alg);
    }

    /// Whether the byte form is pinned.
    pub fn is_frozen(&self) -> bool {
        self.raw.is_some()
    }

    /// The serialized bucket: pinned bytes when present, otherwise the
    /// deterministic encoding (empty map encodes as zero bytes).
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if let Some(raw) = &self.raw {
            return Ok(raw.clone());
        }
        if self.map.is_empty() {
            return Ok(Vec::new());
        }
        canonical::encode(&self.map.to_value())
    }

    /// Serialize and pin the byte form.
    pub fn freeze(&mut self) -> Result<Vec<u8>> {
        let bytes = self.to_bytes()?;
        self.raw = Some(bytes.clone());
        Ok(bytes)
    }

    /// Parse a received bucket, retaining `bytes` verbatim.
    pub fn from_bytes(bytes: &[u8], strict: bool) -> Result<Self> {
        let map = if bytes.is_empty() {
            HeaderMap::new()
        } else {
            let value = canonical::decode(bytes)
                .map_err(|e| CoseError::InvalidHeader(e.to_string()))?;
            HeaderMap::from_value(&value, strict)?
        };
        Ok(Self {
            map,
            raw: Some(bytes.to_vec()),
        })
    }
}

/// Reject an attribute present in both buckets.
pub fn assert_no_overlap(protected: &HeaderMap, unprotected: &HeaderMap) -> Result<()> {
    for (label, _) in protected.iter() {
        if unprotected.contains(label.clone()) {
            return Err(CoseError::InvalidHeader(format!(
                "attribute {label:?} present in both buckets"
            )));
        }
    }
    Ok(())
}

/// Enforce the `crit` rules: protected-bucket only, and every listed
/// attribute present in the protected bucket and understood.
pub fn validate_crit(protected: &HeaderMap, unprotected: &HeaderMap) -> Result<()> {
    if unprotected.contains(attr::CRIT) {
        return Err(CoseError::InvalidHeader(
            "crit may only appear in the protected bucket".into(),
        ));
    }
    if let Some(labels) = protected.crit()? {
        for label in labels {
            if !protected.contains(label.clone()) {
                return Err(CoseError::InvalidCriticalValue(format!(
                    "critical attribute {label:?} not present in protected bucket"
                )));
            }
            if attr_name(&label).is_none() {
                return Err(CoseError::InvalidCriticalValue(format!(
                    "critical attribute {label:?} not understood"
                )));
            }
        }
    }
    Ok(())
}

/// Combined lookup: protected first, then unprotected. An attribute in
/// both buckets is an error.
pub fn get_attr<'a>(
    protected: &'a HeaderMap,
    unprotected: &'a HeaderMap,
    label: impl Into<Label>,
) -> Result<Option<&'a Value>> {
    let label = label.into();
    match (protected.get(label.clone()), unprotected.get(label.clone())) {
        (Some(_), Some(_)) => Err(CoseError::InvalidHeader(format!(
            "attribute {label:?} present in both buckets"
        ))),
        (Some(v), None) => Ok(Some(v)),
        (None, Some(v)) => Ok(Some(v)),
        (None, None) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn alg_resolves_through_registry() {
        let mut map = HeaderMap::new();
        map.set_alg(Algorithm::ES256);
        assert_eq!(map.alg().unwrap(), Some(Algorithm::ES256));

        let mut by_name = HeaderMap::new();
        by_name.insert(attr::ALG, Value::Text("ES256".into())).unwrap();
        assert_eq!(by_name.alg().unwrap(), Some(Algorithm::ES256));
    }

    #[test]
    fn unregistered_alg_rejected() {
        let mut map = HeaderMap::new();
        assert!(map.insert(attr::ALG, Value::from(0)).is_err());
        assert!(map.insert(attr::ALG, Value::Text("NOPE".into())).is_err());
    }

    #[test]
    fn kid_must_be_bstr() {
        let mut map = HeaderMap::new();
        assert!(map.insert(attr::KID, Value::Text("11".into())).is_err());
        map.set_kid(*b"11");
        assert_eq!(map.bytes(attr::KID), Some(&b"11"[..]));
    }

    #[test]
    fn protected_empty_map_encodes_to_zero_bytes() {
        let hdr = ProtectedHeader::new();
        assert!(hdr.to_bytes().unwrap().is_empty());
    }

    #[test]
    fn protected_encoding_is_canonical() {
        let mut hdr = ProtectedHeader::new();
        hdr.set_alg(Algorithm::ES256);
        assert_eq!(hdr.to_bytes().unwrap(), hex!("a10126"));
    }

    #[test]
    fn received_bytes_pinned_verbatim() {
        // non-canonical but valid encoding of the empty map
        let hdr = ProtectedHeader::from_bytes(&hex!("a0"), false).unwrap();
        assert!(hdr.map().is_empty());
        assert_eq!(hdr.to_bytes().unwrap(), hex!("a0"));
    }

    #[test]
    fn mutation_clears_the_pin() {
        let mut hdr = ProtectedHeader::from_bytes(&hex!("a10126"), false).unwrap();
        assert!(hdr.is_frozen());
        hdr.set_alg(Algorithm::ES384);
        assert!(!hdr.is_frozen());
        assert_eq!(hdr.to_bytes().unwrap(), hex!("a1013822"));
    }

    #[test]
    fn duplicate_label_in_bucket_rejected() {
        let value = Value::Map(vec![
            (Value::from(4), Value::Bytes(vec![0x01])),
            (Value::from(4), Value::Bytes(vec![0x02])),
        ]);
        assert!(matches!(
            HeaderMap::from_value(&value, false),
            Err(CoseError::InvalidHeader(_))
        ));
    }

    #[test]
    fn cross_bucket_duplicate_rejected() {
        let mut protected = HeaderMap::new();
        protected.set_alg(Algorithm::ES256);
        let mut unprotected = HeaderMap::new();
        unprotected.set_alg(Algorithm::ES256);
        assert!(assert_no_overlap(&protected, &unprotected).is_err());
        assert!(get_attr(&protected, &unprotected, attr::ALG).is_err());
    }

    #[test]
    fn get_attr_prefers_protected() {
        let mut protected = HeaderMap::new();
        protected.set_alg(Algorithm::ES256);
        let mut unprotected = HeaderMap::new();
        unprotected.set_kid(*b"11");
        assert_eq!(
            get_attr(&protected, &unprotected, attr::ALG).unwrap(),
            Some(&Value::from(-7))
        );
        assert!(get_attr(&protected, &unprotected, attr::IV).unwrap().is_none());
    }

    #[test]
    fn crit_rules() {
        let mut protected = HeaderMap::new();
        protected.set_alg(Algorithm::ES256);
        protected
            .insert(attr::CRIT, Value::Array(vec![Value::from(attr::ALG)]))
            .unwrap();
        let unprotected = HeaderMap::new();
        assert!(validate_crit(&protected, &unprotected).is_ok());

        // listed attribute missing from the protected bucket
        let mut missing = HeaderMap::new();
        missing
            .insert(attr::CRIT, Value::Array(vec![Value::from(attr::KID)]))
            .unwrap();
        assert!(matches!(
            validate_crit(&missing, &unprotected),
            Err(CoseError::InvalidCriticalValue(_))
        ));

        // crit in the unprotected bucket
        let mut bad_unprotected = HeaderMap::new();
        bad_unprotected
            .insert(attr::CRIT, Value::Array(vec![Value::from(attr::ALG)]))
            .unwrap();
        assert!(validate_crit(&HeaderMap::new(), &bad_unprotected).is_err());

        // listed attribute present but not understood
        let mut not_understood = HeaderMap::new();
        not_understood
            .insert(attr::CRIT, Value::Array(vec![Value::from(-70000)]))
            .unwrap();
        not_understood.insert(-70000, Value::from(1)).unwrap();
        assert!(matches!(
            validate_crit(&not_understood, &unprotected),
            Err(CoseError::InvalidCriticalValue(_))
        ));
    }

    #[test]
    fn unknown_attributes_roundtrip() {
        let value = Value::Map(vec![
            (Value::from(1), Value::from(-7)),
            (Value::from(-70000), Value::Text("vendor".into())),
            (Value::Text("app".into()), Value::from(42)),
        ]);
        let map = HeaderMap::from_value(&value, false).unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map.to_value(), value);
    }

    #[test]
    fn strict_mode_rejects_unknown_attributes() {
        let value = Value::Map(vec![(Value::from(-70000), Value::from(1))]);
        assert!(matches!(
            HeaderMap::from_value(&value, true),
            Err(CoseError::UnknownAttribute(_))
        ));
    }
}
