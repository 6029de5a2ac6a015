//! COSE_Encrypt0 and COSE_Encrypt.

use ciborium::value::Value;
use ensign_core::algs::{AlgKind, Algorithm};
use ensign_core::crypto::{aead, random};
use ensign_core::keys::{CoseKey, KeyOp};
use ensign_core::{canonical, CoseError, Result};

use crate::headers::{self, attr, HeaderMap, ProtectedHeader};
use crate::message::{self, tags};
use crate::recipient::{self, CoseRecipient};
use crate::structure::{enc_structure, EncContext};

fn aead_alg(protected: &HeaderMap, unprotected: &HeaderMap) -> Result<Algorithm> {
    let alg = match headers::get_attr(protected, unprotected, attr::ALG)? {
        Some(_) => match protected.alg()? {
            Some(alg) => alg,
            None => unprotected
                .alg()?
                .ok_or_else(|| CoseError::InvalidAlgorithm("alg missing".into()))?,
        },
        None => return Err(CoseError::InvalidAlgorithm("alg missing".into())),
    };
    if alg.info().kind != AlgKind::Aead {
        return Err(CoseError::InvalidAlgorithm(format!(
            "{} is not a content encryption algorithm",
            alg.info().name
        )));
    }
    Ok(alg)
}

/// Resolve the effective nonce from the IV / Partial IV headers.
///
/// A Partial IV is left-padded with zeros to the nonce length and XORed
/// with the key's base IV. When neither header is present and `generate`
/// is set, a fresh IV is drawn and recorded in the unprotected bucket.
fn derive_nonce(
    protected: &HeaderMap,
    unprotected: &mut HeaderMap,
    alg: Algorithm,
    base_iv: Option<&[u8]>,
    generate: bool,
) -> Result<Vec<u8>> {
    let nonce_len = alg
        .info()
        .nonce_len
        .ok_or_else(|| CoseError::InvalidAlgorithm("AEAD without nonce length".into()))?;

    let iv = headers::get_attr(protected, unprotected, attr::IV)?.cloned();
    let partial = headers::get_attr(protected, unprotected, attr::PARTIAL_IV)?.cloned();

    match (iv, partial) {
        (Some(_), Some(_)) => Err(CoseError::InvalidHeader(
            "IV and Partial IV are mutually exclusive".into(),
        )),
        (Some(Value::Bytes(iv)), None) => Ok(iv),
        (Some(_), None) => Err(CoseError::InvalidHeader("IV must be a bstr".into())),
        (None, Some(Value::Bytes(partial))) => {
            let base = base_iv.ok_or_else(|| {
                CoseError::InvalidHeader("Partial IV requires a key with a base IV".into())
            })?;
            if partial.len() > nonce_len || base.len() > nonce_len {
                return Err(CoseError::InvalidHeader(
                    "Partial IV longer than the nonce".into(),
                ));
            }
            let mut nonce = vec![0u8; nonce_len];
            nonce[..base.len()].copy_from_slice(base);
            let offset = nonce_len - partial.len();
            for (i, b) in partial.iter().enumerate() {
                nonce[offset + i] ^= b;
            }
            Ok(nonce)
        }
        (None, Some(_)) => Err(CoseError::InvalidHeader("Partial IV must be a bstr".into())),
        (None, None) => {
            if !generate {
                return Err(CoseError::InvalidHeader("no IV present".into()));
            }
            let nonce = random::bytes(nonce_len)?;
            unprotected.set_iv(nonce.clone());
            Ok(nonce)
        }
    }
}

/// An encrypted message whose key is implied by context (tag 16).
#[derive(Debug, Clone, Default)]
pub struct CoseEncrypt0 {
    pub protected: ProtectedHeader,
    pub unprotected: HeaderMap,
    /// Plaintext input; never serialized.
    pub payload: Option<Vec<u8>>,
    /// Ciphertext with the tag appended; nil on the wire when detached.
    pub ciphertext: Option<Vec<u8>>,
}

impl CoseEncrypt0 {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_headers(&self) -> Result<()> {
        headers::assert_no_overlap(self.protected.map(), &self.unprotected)?;
        headers::validate_crit(self.protected.map(), &self.unprotected)
    }

    /// Encrypt the payload in place, freezing the protected bucket.
    pub fn encrypt(&mut self, key: &CoseKey, external_aad: &[u8]) -> Result<()> {
        self.check_headers()?;
        let alg = aead_alg(self.protected.map(), &self.unprotected)?;
        key.check(KeyOp::Encrypt, alg)?;
        let payload = self
            .payload
            .as_deref()
            .ok_or_else(|| CoseError::MalformedMessage("payload required".into()))?
            .to_vec();
        let nonce = derive_nonce(
            self.protected.map(),
            &mut self.unprotected,
            alg,
            key.base_iv.as_deref(),
            true,
        )?;
        let body_protected = self.protected.freeze()?;
        let aad = enc_structure(EncContext::Encrypt0, &body_protected, external_aad)?;
        self.ciphertext = Some(aead::encrypt(
            alg,
            key.symmetric_key()?,
            &nonce,
            &aad,
            &payload,
        )?);
        Ok(())
    }

    /// Decrypt and return the plaintext. Detached ciphertext is supplied
    /// by the caller.
    pub fn decrypt(
        &self,
        key: &CoseKey,
        external_aad: &[u8],
        detached_ciphertext: Option<&[u8]>,
    ) -> Result<Vec<u8>> {
        self.check_headers()?;
        let alg = aead_alg(self.protected.map(), &self.unprotected)?;
        key.check(KeyOp::Decrypt, alg)?;
        let mut unprotected = self.unprotected.clone();
        let nonce = derive_nonce(
            self.protected.map(),
            &mut unprotected,
            alg,
            key.base_iv.as_deref(),
            false,
        )?;
        let ciphertext = message::resolve_payload(&self.ciphertext, detached_ciphertext)?;
        let aad = enc_structure(EncContext::Encrypt0, &self.protected.to_bytes()?, external_aad)?;
        aead::decrypt(alg, key.symmetric_key()?, &nonce, &aad, ciphertext)
    }

    pub fn to_value(&self, attach_tag: bool) -> Result<Value> {
        let body = Value::Array(vec![
            Value::Bytes(self.protected.to_bytes()?),
            self.unprotected.to_value(),
            message::payload_value(&self.ciphertext),
        ]);
        Ok(message::maybe_tag(body, tags::ENCRYPT0, attach_tag))
    }

    pub fn to_bytes(&self, attach_tag: bool) -> Result<Vec<u8>> {
        canonical::encode(&self.to_value(attach_tag)?)
    }

    pub(crate) fn from_value(value: &Value, strict: bool) -> Result<Self> {
        let items = message::expect_array(value, 3, "COSE_Encrypt0")?;
        let (protected, unprotected) = message::parse_buckets(items, strict)?;
        Ok(Self {
            protected,
            unprotected,
            payload: None,
            ciphertext: message::parse_payload(&items[2], "ciphertext")?,
        })
    }

    /// Parse a COSE_Encrypt0, with or without its tag.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        match message::decode_as(message::MessageKind::Encrypt0, bytes)? {
            message::CoseMessage::Encrypt0(msg) => Ok(msg),
            _ => unreachable!("decode_as enforces the kind"),
        }
    }
}

/// An encrypted message with explicit recipients (tag 96).
#[derive(Debug, Clone, Default)]
pub struct CoseEncrypt {
    pub protected: ProtectedHeader,
    pub unprotected: HeaderMap,
    /// Plaintext input; never serialized.
    pub payload: Option<Vec<u8>>,
    pub ciphertext: Option<Vec<u8>>,
    pub recipients: Vec<CoseRecipient>,
}

impl CoseEncrypt {
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

    /// Establish the CEK through the recipients and encrypt the payload.
    pub fn encrypt(&mut self, external_aad: &[u8]) -> Result<()> {
        self.check_headers()?;
        let alg = aead_alg(self.protected.map(), &self.unprotected)?;
        let key_len = alg
            .info()
            .key_len
            .ok_or_else(|| CoseError::InvalidAlgorithm("AEAD without key length".into()))?;
        let payload = self
            .payload
            .as_deref()
            .ok_or_else(|| CoseError::MalformedMessage("payload required".into()))?
            .to_vec();
        let cek = recipient::establish_cek(alg, key_len, &mut self.recipients)?;
        // a lone direct recipient may contribute its key's base IV
        let base_iv = match self.recipients.as_slice() {
            [only] => only.key.as_ref().and_then(|k| k.base_iv.clone()),
            _ => None,
        };
        let nonce = derive_nonce(
            self.protected.map(),
            &mut self.unprotected,
            alg,
            base_iv.as_deref(),
            true,
        )?;
        let body_protected = self.protected.freeze()?;
        let aad = enc_structure(EncContext::Encrypt, &body_protected, external_aad)?;
        self.ciphertext = Some(aead::encrypt(alg, cek.as_slice(), &nonce, &aad, &payload)?);
        Ok(())
    }

    /// Recover the CEK via the recipient at `path` and decrypt.
    pub fn decrypt(
        &self,
        key: &CoseKey,
        external_aad: &[u8],
        path: &[usize],
        detached_ciphertext: Option<&[u8]>,
    ) -> Result<Vec<u8>> {
        self.check_headers()?;
        let alg = aead_alg(self.protected.map(), &self.unprotected)?;
        let key_len = alg
            .info()
            .key_len
            .ok_or_else(|| CoseError::InvalidAlgorithm("AEAD without key length".into()))?;
        let (&head, rest) = path.split_first().ok_or_else(|| {
            CoseError::UnsupportedRecipient("a recipient path is required".into())
        })?;
        let node = self
            .recipients
            .get(head)
            .ok_or_else(|| CoseError::UnsupportedRecipient("recipient index out of range".into()))?;
        let cek = recipient::recover_cek(alg, key_len, node, key, rest)?;
        let mut unprotected = self.unprotected.clone();
        let nonce = derive_nonce(
            self.protected.map(),
            &mut unprotected,
            alg,
            key.base_iv.as_deref(),
            false,
        )?;
        let ciphertext = message::resolve_payload(&self.ciphertext, detached_ciphertext)?;
        let aad = enc_structure(EncContext::Encrypt, &self.protected.to_bytes()?, external_aad)?;
        aead::decrypt(alg, cek.as_slice(), &nonce, &aad, ciphertext)
    }

    pub fn to_value(&self, attach_tag: bool) -> Result<Value> {
        if self.recipients.is_empty() {
            return Err(CoseError::MalformedMessage(
                "COSE_Encrypt requires at least one recipient".into(),
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
            message::payload_value(&self.ciphertext),
            Value::Array(recipients),
        ]);
        Ok(message::maybe_tag(body, tags::ENCRYPT, attach_tag))
    }

    pub fn to_bytes(&self, attach_tag: bool) -> Result<Vec<u8>> {
        canonical::encode(&self.to_value(attach_tag)?)
    }

    pub(crate) fn from_value(value: &Value, strict: bool) -> Result<Self> {
        let items = message::expect_array(value, 4, "COSE_Encrypt")?;
        let (protected, unprotected) = message::parse_buckets(items, strict)?;
        let recipients = match &items[3] {
            Value::Array(rs) if !rs.is_empty() => rs
                .iter()
                .map(|r| CoseRecipient::from_value(r, strict))
                .collect::<Result<Vec<_>>>()?,
            _ => {
                return Err(CoseError::MalformedMessage(
                    "COSE_Encrypt requires a non-empty recipient array".into(),
                ))
            }
        };
        Ok(Self {
            protected,
            unprotected,
            payload: None,
            ciphertext: message::parse_payload(&items[2], "ciphertext")?,
            recipients,
        })
    }

    /// Parse a COSE_Encrypt, with or without its tag.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        match message::decode_as(message::MessageKind::Encrypt, bytes)? {
            message::CoseMessage::Encrypt(msg) => Ok(msg),
            _ => unreachable!("decode_as enforces the kind"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ensign_core::crypto::agree;
    use ensign_core::keys::Curve;
    use hex_literal::hex;

    fn aes_key() -> CoseKey {
        CoseKey::symmetric(vec![0x0Fu8; 16]).with_kid(*b"our-secret")
    }

    #[test]
    fn encrypt0_roundtrip_with_explicit_iv() {
        let key = aes_key();
        let mut msg = CoseEncrypt0::new();
        msg.protected.set_alg(Algorithm::A128Gcm);
        msg.unprotected.set_iv(hex!("89f52f65a1c580933b5261a7").to_vec());
        msg.payload = Some(b"This is the content.".to_vec());
        msg.encrypt(&key, b"").unwrap();

        let bytes = msg.to_bytes(true).unwrap();
        assert_eq!(bytes[0], 0xd0); // tag 16

        let decoded = CoseEncrypt0::from_bytes(&bytes).unwrap();
        let plaintext = decoded.decrypt(&key, b"", None).unwrap();
        assert_eq!(plaintext, b"This is the content.");
        assert_eq!(decoded.to_bytes(true).unwrap(), bytes);
    }

    #[test]
    fn encrypt0_generates_iv_when_absent() {
        let key = aes_key();
        let mut msg = CoseEncrypt0::new();
        msg.protected.set_alg(Algorithm::A128Gcm);
        msg.payload = Some(b"content".to_vec());
        msg.encrypt(&key, b"").unwrap();
        assert_eq!(msg.unprotected.bytes(attr::IV).unwrap().len(), 12);
        assert_eq!(msg.decrypt(&key, b"", None).unwrap(), b"content");
    }

    #[test]
    fn encrypt0_ccm_roundtrip() {
        let key = aes_key();
        let mut msg = CoseEncrypt0::new();
        msg.protected.set_alg(Algorithm::AesCcm16_64_128);
        msg.unprotected.set_iv(hex!("89f52f65a1c580933b526081f8").to_vec());
        msg.payload = Some(b"This is the content.".to_vec());
        msg.encrypt(&key, b"").unwrap();
        // 8-byte CCM tag appended
        assert_eq!(msg.ciphertext.as_ref().unwrap().len(), 20 + 8);
        assert_eq!(msg.decrypt(&key, b"", None).unwrap(), b"This is the content.");
    }

    #[test]
    fn encrypt0_partial_iv() {
        let key = CoseKey::symmetric(vec![0x0Fu8; 16])
            .with_base_iv(hex!("89f52f65a1c580933b52").to_vec());
        let mut msg = CoseEncrypt0::new();
        msg.protected.set_alg(Algorithm::A128Gcm);
        msg.unprotected.set_partial_iv(vec![0x61]);
        msg.payload = Some(b"content".to_vec());
        msg.encrypt(&key, b"").unwrap();
        assert_eq!(msg.decrypt(&key, b"", None).unwrap(), b"content");

        // the same message without the base IV cannot resolve its nonce
        let bare = CoseKey::symmetric(vec![0x0Fu8; 16]);
        assert!(matches!(
            msg.decrypt(&bare, b"", None),
            Err(CoseError::InvalidHeader(_))
        ));
    }

    #[test]
    fn encrypt0_iv_and_partial_iv_conflict() {
        let key = aes_key().with_base_iv(vec![0x01; 12]);
        let mut msg = CoseEncrypt0::new();
        msg.protected.set_alg(Algorithm::A128Gcm);
        msg.unprotected.set_iv(vec![0x02; 12]);
        msg.unprotected.set_partial_iv(vec![0x03]);
        msg.payload = Some(b"x".to_vec());
        assert!(matches!(
            msg.encrypt(&key, b""),
            Err(CoseError::InvalidHeader(_))
        ));
    }

    #[test]
    fn encrypt0_tampered_ciphertext_fails() {
        let key = aes_key();
        let mut msg = CoseEncrypt0::new();
        msg.protected.set_alg(Algorithm::A128Gcm);
        msg.payload = Some(b"secret".to_vec());
        msg.encrypt(&key, b"").unwrap();

        let mut decoded = CoseEncrypt0::from_bytes(&msg.to_bytes(true).unwrap()).unwrap();
        if let Some(ct) = decoded.ciphertext.as_mut() {
            ct[0] ^= 0x01;
        }
        assert!(matches!(
            decoded.decrypt(&key, b"", None),
            Err(CoseError::DecryptionFailure)
        ));
    }

    #[test]
    fn encrypt_with_key_wrap_recipient() {
        let kek = CoseKey::symmetric(vec![0x61; 16]).with_kid(*b"018c0ae5-4d9b");
        let mut msg = CoseEncrypt::new();
        msg.protected.set_alg(Algorithm::A128Gcm);
        msg.payload = Some(b"This is the content.".to_vec());
        msg.add_recipient(CoseRecipient::key_wrap(Algorithm::A128Kw, kek.clone()));
        msg.encrypt(b"").unwrap();

        let bytes = msg.to_bytes(true).unwrap();
        assert_eq!(bytes[0], 0xd8);
        assert_eq!(bytes[1], 96);

        let decoded = CoseEncrypt::from_bytes(&bytes).unwrap();
        assert_eq!(
            decoded.decrypt(&kek, b"", &[0], None).unwrap(),
            b"This is the content."
        );
    }

    #[test]
    fn encrypt_with_ecdh_es_recipient() {
        let receiver = agree::generate_ephemeral(Curve::P256).unwrap();
        let (crv, x, y, _) = receiver.ec2_params().unwrap();
        let receiver_public = CoseKey::ec2(crv, x.to_vec(), y.to_vec())
            .unwrap()
            .with_kid(*b"meriadoc");

        let mut msg = CoseEncrypt::new();
        msg.protected.set_alg(Algorithm::A128Gcm);
        msg.payload = Some(b"This is the content.".to_vec());
        msg.add_recipient(CoseRecipient::key_agreement(
            Algorithm::EcdhEsA128Kw,
            receiver_public,
        ));
        msg.encrypt(b"").unwrap();

        let bytes = msg.to_bytes(true).unwrap();
        let decoded = CoseEncrypt::from_bytes(&bytes).unwrap();
        assert_eq!(
            decoded.decrypt(&receiver, b"", &[0], None).unwrap(),
            b"This is the content."
        );
    }

    #[test]
    fn encrypt_external_aad_is_authenticated() {
        let kek = CoseKey::symmetric(vec![0x61; 16]);
        let mut msg = CoseEncrypt::new();
        msg.protected.set_alg(Algorithm::A128Gcm);
        msg.payload = Some(b"data".to_vec());
        msg.add_recipient(CoseRecipient::key_wrap(Algorithm::A128Kw, kek.clone()));
        msg.encrypt(b"aad").unwrap();

        assert!(msg.decrypt(&kek, b"other", &[0], None).is_err());
        assert_eq!(msg.decrypt(&kek, b"aad", &[0], None).unwrap(), b"data");
    }
}
