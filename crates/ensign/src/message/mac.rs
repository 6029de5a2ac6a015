//! COSE_Mac0 and COSE_Mac.

use ciborium::value::Value;
use ensign_core::algs::{AlgKind, Algorithm};
use ensign_core::crypto;
use ensign_core::keys::{CoseKey, KeyOp};
use ensign_core::{canonical, CoseError, Result};

use crate::headers::{self, attr, HeaderMap, ProtectedHeader};
use crate::message::{self, tags};
use crate::recipient::{self, CoseRecipient};
use crate::structure::{mac_structure, MacContext};

fn mac_alg(protected: &HeaderMap, unprotected: &HeaderMap) -> Result<Algorithm> {
    let alg = match headers::get_attr(protected, unprotected, attr::ALG)? {
        Some(_) => match protected.alg()? {
            Some(alg) => alg,
            None => unprotected
                .alg()?
                .ok_or_else(|| CoseError::InvalidAlgorithm("alg missing".into()))?,
        },
        None => return Err(CoseError::InvalidAlgorithm("alg missing".into())),
    };
    if alg.info().kind != AlgKind::Mac {
        return Err(CoseError::InvalidAlgorithm(format!(
            "{} is not a MAC algorithm",
            alg.info().name
        )));
    }
    Ok(alg)
}

/// A MACed message whose key is implied by context (tag 17).
#[derive(Debug, Clone, Default)]
pub struct CoseMac0 {
    pub protected: ProtectedHeader,
    pub unprotected: HeaderMap,
    pub payload: Option<Vec<u8>>,
    pub tag: Vec<u8>,
}

impl CoseMac0 {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_headers(&self) -> Result<()> {
        headers::assert_no_overlap(self.protected.map(), &self.unprotected)?;
        headers::validate_crit(self.protected.map(), &self.unprotected)
    }

    /// Compute the authentication tag, freezing the protected bucket.
    pub fn compute_tag(&mut self, key: &CoseKey, external_aad: &[u8]) -> Result<()> {
        self.check_headers()?;
        let alg = mac_alg(self.protected.map(), &self.unprotected)?;
        key.check(KeyOp::MacCreate, alg)?;
        let payload = self
            .payload
            .as_deref()
            .ok_or_else(|| CoseError::MalformedMessage("payload required".into()))?;
        let body_protected = self.protected.freeze()?;
        let tbm = mac_structure(MacContext::Mac0, &body_protected, external_aad, payload)?;
        self.tag = crypto::mac::tag(alg, key.symmetric_key()?, &tbm)?;
        Ok(())
    }

    /// Constant-time tag verification.
    pub fn verify_tag(
        &self,
        key: &CoseKey,
        external_aad: &[u8],
        detached_payload: Option<&[u8]>,
    ) -> Result<bool> {
        self.check_headers()?;
        let alg = mac_alg(self.protected.map(), &self.unprotected)?;
        key.check(KeyOp::MacVerify, alg)?;
        let payload = message::resolve_payload(&self.payload, detached_payload)?;
        let tbm = mac_structure(
            MacContext::Mac0,
            &self.protected.to_bytes()?,
            external_aad,
            payload,
        )?;
        crypto::mac::verify(alg, key.symmetric_key()?, &tbm, &self.tag)
    }

    pub fn to_value(&self, attach_tag: bool) -> Result<Value> {
        let body = Value::Array(vec![
            Value::Bytes(self.protected.to_bytes()?),
            self.unprotected.to_value(),
            message::payload_value(&self.payload),
            Value::Bytes(self.tag.clone()),
        ]);
        Ok(message::maybe_tag(body, tags::MAC0, attach_tag))
    }

    pub fn to_bytes(&self, attach_tag: bool) -> Result<Vec<u8>> {
        canonical::encode(&self.to_value(attach_tag)?)
    }

    pub(crate) fn from_value(value: &Value, strict: bool) -> Result<Self> {
        let items = message::expect_array(value, 4, "COSE_Mac0")?;
        let (protected, unprotected) = message::parse_buckets(items, strict)?;
        Ok(Self {
            protected,
            unprotected,
            payload: message::parse_payload(&items[2], "payload")?,
            tag: message::expect_bstr(&items[3], "tag")?,
        })
    }

    /// Parse a COSE_Mac0, with or without its tag.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        match message::decode_as(message::MessageKind::Mac0, bytes)? {
            message::CoseMessage::Mac0(msg) => Ok(msg),
            _ => unreachable!("decode_as enforces the kind"),
        }
    }
}

/// A MACed message with explicit recipients (tag 97).
#[derive(Debug, Clone, Default)]
pub struct CoseMac {
    pub protected: ProtectedHeader,
    pub unprotected: HeaderMap,
    pub payload: Option<Vec<u8>>,
    pub tag: Vec<u8>,
    pub recipients: Vec<CoseRecipient>,
}

impl CoseMac {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_recipient(&mut self, recipient: CoseRecipient) {
        self.recipients.push(recipient);
    }

    fn check_headers(&self) -> Result<()> {
        headers::assert_no_overlap(self.protected.map(), &self.unprotected)?;
        headers::validate_crit(self.protected.map(), &self.unprotected)
    }

    /// Establish the CEK through the recipients and compute the tag.
    pub fn compute_tag(&mut self, external_aad: &[u8]) -> Result<()> {
        self.check_headers()?;
        let alg = mac_alg(self.protected.map(), &self.unprotected)?;
        let key_len = alg
            .info()
            .key_len
            .ok_or_else(|| CoseError::InvalidAlgorithm("MAC without key length".into()))?;
        let payload = self
            .payload
            .as_deref()
            .ok_or_else(|| CoseError::MalformedMessage("payload required".into()))?
            .to_vec();
        let cek = recipient::establish_cek(alg, key_len, &mut self.recipients)?;
        let body_protected = self.protected.freeze()?;
        let tbm = mac_structure(MacContext::Mac, &body_protected, external_aad, &payload)?;
        self.tag = crypto::mac::tag(alg, cek.as_slice(), &tbm)?;
        Ok(())
    }

    /// Recover the CEK via the recipient at `path` and verify the tag.
    pub fn verify_tag(
        &self,
        key: &CoseKey,
        external_aad: &[u8],
        path: &[usize],
        detached_payload: Option<&[u8]>,
    ) -> Result<bool> {
        self.check_headers()?;
        let alg = mac_alg(self.protected.map(), &self.unprotected)?;
        let key_len = alg
            .info()
            .key_len
            .ok_or_else(|| CoseError::InvalidAlgorithm("MAC without key length".into()))?;
        let (&head, rest) = path.split_first().ok_or_else(|| {
            CoseError::UnsupportedRecipient("a recipient path is required".into())
        })?;
        let node = self
            .recipients
            .get(head)
            .ok_or_else(|| CoseError::UnsupportedRecipient("recipient index out of range".into()))?;
        let cek = recipient::recover_cek(alg, key_len, node, key, rest)?;
        let payload = message::resolve_payload(&self.payload, detached_payload)?;
        let tbm = mac_structure(
            MacContext::Mac,
            &self.protected.to_bytes()?,
            external_aad,
            payload,
        )?;
        crypto::mac::verify(alg, cek.as_slice(), &tbm, &self.tag)
    }

    pub fn to_value(&self, attach_tag: bool) -> Result<Value> {
        if self.recipients.is_empty() {
            return Err(CoseError::MalformedMessage(
                "COSE_Mac requires at least one recipient".into(),
            ));
        }
        let recipients = self
            .recipients
            .iter()
            .map(|r| r.to_value())
            .collect::<Result<Vec<_>>>()?;
        let body = Value::Array(vec![
            Value::Bytes(self.protected.to_bytes()?),
            self.unprotected.to_value(),
            message::payload_value(&self.payload),
            Value::Bytes(self.tag.clone()),
            Value::Array(recipients),
        ]);
        Ok(message::maybe_tag(body, tags::MAC, attach_tag))
    }

    pub fn to_bytes(&self, attach_tag: bool) -> Result<Vec<u8>> {
        canonical::encode(&self.to_value(attach_tag)?)
    }

    pub(crate) fn from_value(value: &Value, strict: bool) -> Result<Self> {
        let items = message::expect_array(value, 5, "COSE_Mac")?;
        let (protected, unprotected) = message::parse_buckets(items, strict)?;
        let recipients = match &items[4] {
            Value::Array(rs) if !rs.is_empty() => rs
                .iter()
                .map(|r| CoseRecipient::from_value(r, strict))
                .collect::<Result<Vec<_>>>()?,
            _ => {
                return Err(CoseError::MalformedMessage(
                    "COSE_Mac requires a non-empty recipient array".into(),
                ))
            }
        };
        Ok(Self {
            protected,
            unprotected,
            payload: message::parse_payload(&items[2], "payload")?,
            tag: message::expect_bstr(&items[3], "tag")?,
            recipients,
        })
    }

    /// Parse a COSE_Mac, with or without its tag.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        match message::decode_as(message::MessageKind::Mac, bytes)? {
            message::CoseMessage::Mac(msg) => Ok(msg),
            _ => unreachable!("decode_as enforces the kind"),
        }
    }
}
