//! COSE_Sign1 and COSE_Sign.

use ciborium::value::Value;
use ensign_core::algs::{AlgKind, Algorithm};
use ensign_core::crypto;
use ensign_core::keys::{CoseKey, KeyOp};
use ensign_core::{canonical, CoseError, Result};

use crate::headers::{self, attr, HeaderMap, ProtectedHeader};
use crate::message::{self, tags};
use crate::structure::{sig_structure, SigContext};

fn signature_alg(protected: &HeaderMap, unprotected: &HeaderMap) -> Result<Algorithm> {
    let alg = match headers::get_attr(protected, unprotected, attr::ALG)? {
        Some(_) => match protected.alg()? {
            Some(alg) => alg,
            None => unprotected
                .alg()?
                .ok_or_else(|| CoseError::InvalidAlgorithm("alg missing".into()))?,
        },
        None => return Err(CoseError::InvalidAlgorithm("alg missing".into())),
    };
    if alg.info().kind != AlgKind::Signature {
        return Err(CoseError::InvalidAlgorithm(format!(
            "{} is not a signature algorithm",
            alg.info().name
        )));
    }
    Ok(alg)
}

/// A single-signer signed message (tag 18).
#[derive(Debug, Clone, Default)]
pub struct CoseSign1 {
    pub protected: ProtectedHeader,
    pub unprotected: HeaderMap,
    pub payload: Option<Vec<u8>>,
    pub signature: Vec<u8>,
}

impl CoseSign1 {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_headers(&self) -> Result<()> {
        headers::assert_no_overlap(self.protected.map(), &self.unprotected)?;
        headers::validate_crit(self.protected.map(), &self.unprotected)
    }

    /// Sign the attached payload, freezing the protected bucket.
    pub fn sign(&mut self, key: &CoseKey, external_aad: &[u8]) -> Result<()> {
        self.check_headers()?;
        let alg = signature_alg(self.protected.map(), &self.unprotected)?;
        key.check(KeyOp::Sign, alg)?;
        let payload = self.payload.as_deref().ok_or_else(|| {
            CoseError::MalformedMessage("payload required; use sign_detached".into())
        })?;
        let body_protected = self.protected.freeze()?;
        let tbs = sig_structure(
            SigContext::Signature1,
            &body_protected,
            None,
            external_aad,
            payload,
        )?;
        self.signature = crypto::sign::sign(alg, key, &tbs)?;
        Ok(())
    }

    /// Sign detached content: the payload is signed but not carried.
    pub fn sign_detached(
        &mut self,
        key: &CoseKey,
        external_aad: &[u8],
        payload: &[u8],
    ) -> Result<()> {
        self.payload = Some(payload.to_vec());
        let result = self.sign(key, external_aad);
        self.payload = None;
        result
    }

    /// Verify the signature. Detached content is supplied by the caller.
    pub fn verify(
        &self,
        key: &CoseKey,
        external_aad: &[u8],
        detached_payload: Option<&[u8]>,
    ) -> Result<bool> {
        self.check_headers()?;
        let alg = signature_alg(self.protected.map(), &self.unprotected)?;
        key.check(KeyOp::Verify, alg)?;
        let payload = message::resolve_payload(&self.payload, detached_payload)?;
        let tbs = sig_structure(
            SigContext::Signature1,
            &self.protected.to_bytes()?,
            None,
            external_aad,
            payload,
        )?;
        crypto::sign::verify(alg, key, &tbs, &self.signature)
    }

    pub fn to_value(&self, attach_tag: bool) -> Result<Value> {
        let body = Value::Array(vec![
            Value::Bytes(self.protected.to_bytes()?),
            self.unprotected.to_value(),
            message::payload_value(&self.payload),
            Value::Bytes(self.signature.clone()),
        ]);
        Ok(message::maybe_tag(body, tags::SIGN1, attach_tag))
    }

    pub fn to_bytes(&self, attach_tag: bool) -> Result<Vec<u8>> {
        canonical::encode(&self.to_value(attach_tag)?)
    }

    pub(crate) fn from_value(value: &Value, strict: bool) -> Result<Self> {
        let items = message::expect_array(value, 4, "COSE_Sign1")?;
        let (protected, unprotected) = message::parse_buckets(items, strict)?;
        Ok(Self {
            protected,
            unprotected,
            payload: message::parse_payload(&items[2], "payload")?,
            signature: message::expect_bstr(&items[3], "signature")?,
        })
    }

    /// Parse a COSE_Sign1, with or without its tag.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        match message::decode_as(message::MessageKind::Sign1, bytes)? {
            message::CoseMessage::Sign1(msg) => Ok(msg),
            _ => unreachable!("decode_as enforces the kind"),
        }
    }
}

/// One signer of a COSE_Sign message: its own buckets plus the signature.
#[derive(Debug, Clone, Default)]
pub struct CoseSignature {
    pub protected: ProtectedHeader,
    pub unprotected: HeaderMap,
    pub signature: Vec<u8>,
}

impl CoseSignature {
    pub fn new(alg: Algorithm) -> Self {
        let mut s = Self::default();
        s.protected.set_alg(alg);
        s
    }

    pub fn with_kid(mut self, kid: impl Into<Vec<u8>>) -> Self {
        self.unprotected.set_kid(kid);
        self
    }

    fn to_value(&self) -> Result<Value> {
        Ok(Value::Array(vec![
            Value::Bytes(self.protected.to_bytes()?),
            self.unprotected.to_value(),
            Value::Bytes(self.signature.clone()),
        ]))
    }

    fn from_value(value: &Value, strict: bool) -> Result<Self> {
        let items = message::expect_array(value, 3, "COSE_Signature")?;
        let (protected, unprotected) = message::parse_buckets(items, strict)?;
        Ok(Self {
            protected,
            unprotected,
            signature: message::expect_bstr(&items[2], "signature")?,
        })
    }
}

/// A multi-signer signed message (tag 98).
#[derive(Debug, Clone, Default)]
pub struct CoseSign {
    pub protected: ProtectedHeader,
    pub unprotected: HeaderMap,
    pub payload: Option<Vec<u8>>,
    pub signatures: Vec<CoseSignature>,
}

impl CoseSign {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_signature(&mut self, signature: CoseSignature) {
        self.signatures.push(signature);
    }

    fn check_headers(&self) -> Result<()> {
        headers::assert_no_overlap(self.protected.map(), &self.unprotected)?;
        headers::validate_crit(self.protected.map(), &self.unprotected)?;
        for s in &self.signatures {
            headers::assert_no_overlap(s.protected.map(), &s.unprotected)?;
            headers::validate_crit(s.protected.map(), &s.unprotected)?;
        }
        Ok(())
    }

    /// Sign for the signer at `index`, freezing both protected buckets.
    pub fn sign(&mut self, index: usize, key: &CoseKey, external_aad: &[u8]) -> Result<()> {
        self.check_headers()?;
        let payload = self
            .payload
            .as_deref()
            .ok_or_else(|| CoseError::MalformedMessage("payload required to sign".into()))?
            .to_vec();
        let body_protected = self.protected.freeze()?;
        let signer = self
            .signatures
            .get_mut(index)
            .ok_or_else(|| CoseError::MalformedMessage("signer index out of range".into()))?;
        let alg = signature_alg(signer.protected.map(), &signer.unprotected)?;
        key.check(KeyOp::Sign, alg)?;
        let sign_protected = signer.protected.freeze()?;
        let tbs = sig_structure(
            SigContext::Signature,
            &body_protected,
            Some(&sign_protected),
            external_aad,
            &payload,
        )?;
        signer.signature = crypto::sign::sign(alg, key, &tbs)?;
        Ok(())
    }

    /// Verify the signer at `index`.
    pub fn verify(
        &self,
        index: usize,
        key: &CoseKey,
        external_aad: &[u8],
        detached_payload: Option<&[u8]>,
    ) -> Result<bool> {
        self.check_headers()?;
        let signer = self
            .signatures
            .get(index)
            .ok_or_else(|| CoseError::MalformedMessage("signer index out of range".into()))?;
        let alg = signature_alg(signer.protected.map(), &signer.unprotected)?;
        key.check(KeyOp::Verify, alg)?;
        let payload = message::resolve_payload(&self.payload, detached_payload)?;
        let tbs = sig_structure(
            SigContext::Signature,
            &self.protected.to_bytes()?,
            Some(&signer.protected.to_bytes()?),
            external_aad,
            payload,
        )?;
        crypto::sign::verify(alg, key, &tbs, &signer.signature)
    }

    pub fn to_value(&self, attach_tag: bool) -> Result<Value> {
        if self.signatures.is_empty() {
            return Err(CoseError::MalformedMessage(
                "COSE_Sign requires at least one signature".into(),
            ));
        }
        let signatures = self
            .signatures
            .iter()
            .map(|s| s.to_value())
            .collect::<Result<Vec<_>>>()?;
        let body = Value::Array(vec![
            Value::Bytes(self.protected.to_bytes()?),
            self.unprotected.to_value(),
            message::payload_value(&self.payload),
            Value::Array(signatures),
        ]);
        Ok(message::maybe_tag(body, tags::SIGN, attach_tag))
    }

    pub fn to_bytes(&self, attach_tag: bool) -> Result<Vec<u8>> {
        canonical::encode(&self.to_value(attach_tag)?)
    }

    pub(crate) fn from_value(value: &Value, strict: bool) -> Result<Self> {
        let items = message::expect_array(value, 4, "COSE_Sign")?;
        let (protected, unprotected) = message::parse_buckets(items, strict)?;
        let signatures = match &items[3] {
            Value::Array(sigs) if !sigs.is_empty() => sigs
                .iter()
                .map(|s| CoseSignature::from_value(s, strict))
                .collect::<Result<Vec<_>>>()?,
            _ => {
                return Err(CoseError::MalformedMessage(
                    "COSE_Sign requires a non-empty signature array".into(),
                ))
            }
        };
        Ok(Self {
            protected,
            unprotected,
            payload: message::parse_payload(&items[2], "payload")?,
            signatures,
        })
    }

    /// Parse a COSE_Sign, with or without its tag.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        match message::decode_as(message::MessageKind::Sign, bytes)? {
            message::CoseMessage::Sign(msg) => Ok(msg),
            _ => unreachable!("decode_as enforces the kind"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ensign_core::keys::Curve;
    use hex_literal::hex;

    fn p256_key() -> CoseKey {
        CoseKey::ec2_private(
            Curve::P256,
            hex!("bac5b11cad8f99f9c72b05cf4b9e26d244dc189f745228255a219a86d6a09eff").to_vec(),
            hex!("20138bf82dc1b6d562be0fa54ab7804a3a64b6d72ccfed6b6fb6ed28bbfc117e").to_vec(),
            hex!("57c92077664146e876760c9520d054aa93c3afb04e306705db6090308507b4d3").to_vec(),
        )
        .unwrap()
        .with_kid(*b"11")
    }

    #[test]
    fn sign1_roundtrip() {
        let key = p256_key();
        let mut msg = CoseSign1::new();
        msg.protected.set_alg(Algorithm::ES256);
        msg.unprotected.set_kid(*b"11");
        msg.payload = Some(b"This is the content.".to_vec());
        msg.sign(&key, b"").unwrap();

        let bytes = msg.to_bytes(true).unwrap();
        assert_eq!(bytes[0], 0xd2); // tag 18

        let decoded = CoseSign1::from_bytes(&bytes).unwrap();
        assert!(decoded.verify(&key, b"", None).unwrap());
        assert_eq!(decoded.to_bytes(true).unwrap(), bytes);
    }

    #[test]
    fn sign1_wrong_external_aad_fails() {
        let key = p256_key();
        let mut msg = CoseSign1::new();
        msg.protected.set_alg(Algorithm::ES256);
        msg.payload = Some(b"data".to_vec());
        msg.sign(&key, b"context").unwrap();
        assert!(msg.verify(&key, b"context", None).unwrap());
        assert!(!msg.verify(&key, b"other", None).unwrap());
    }

    #[test]
    fn sign1_detached_payload() {
        let key = p256_key();
        let mut msg = CoseSign1::new();
        msg.protected.set_alg(Algorithm::ES256);
        msg.sign_detached(&key, b"", b"detached content").unwrap();
        assert!(msg.payload.is_none());

        let bytes = msg.to_bytes(true).unwrap();
        let decoded = CoseSign1::from_bytes(&bytes).unwrap();
        assert!(decoded.payload.is_none());
        assert!(decoded.verify(&key, b"", Some(b"detached content")).unwrap());
        assert!(!decoded.verify(&key, b"", Some(b"wrong content")).unwrap());
        // absent payload without caller-supplied content is an error
        assert!(decoded.verify(&key, b"", None).is_err());
    }

    #[test]
    fn sign1_requires_signature_alg() {
        let key = p256_key();
        let mut msg = CoseSign1::new();
        msg.protected.set_alg(Algorithm::A128Gcm);
        msg.payload = Some(b"x".to_vec());
        assert!(matches!(
            msg.sign(&key, b""),
            Err(CoseError::InvalidAlgorithm(_))
        ));
    }

    #[test]
    fn sign_two_signers_verify_independently() {
        let key1 = p256_key();
        let seed = [0x51u8; 32];
        let sk = ed25519_dalek::SigningKey::from_bytes(&seed);
        let key2 = CoseKey::okp_private(
            Curve::Ed25519,
            sk.verifying_key().to_bytes().to_vec(),
            seed.to_vec(),
        )
        .unwrap();

        let mut msg = CoseSign::new();
        msg.payload = Some(b"This is the content.".to_vec());
        msg.add_signature(CoseSignature::new(Algorithm::ES256).with_kid(*b"11"));
        msg.add_signature(CoseSignature::new(Algorithm::EdDSA).with_kid(*b"ed"));
        msg.sign(0, &key1, b"").unwrap();
        msg.sign(1, &key2, b"").unwrap();

        let bytes = msg.to_bytes(true).unwrap();
        assert_eq!(bytes[0], 0xd8);
        assert_eq!(bytes[1], 98);

        let decoded = CoseSign::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.signatures.len(), 2);
        assert!(decoded.verify(0, &key1, b"", None).unwrap());
        assert!(decoded.verify(1, &key2, b"", None).unwrap());
        // keys are not interchangeable between signers
        assert!(decoded.verify(1, &key1, b"", None).is_err());
    }

    #[test]
    fn sign_without_signers_rejected() {
        let msg = CoseSign::new();
        assert!(msg.to_bytes(true).is_err());
    }
}
