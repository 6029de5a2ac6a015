//! The recipient tree: per-recipient CEK establishment for MAC and
//! Encrypt messages.
//!
//! A recipient's `alg` decides how the content encryption key reaches it:
//! carried out-of-band (direct), derived (HKDF or ECDH), or wrapped
//! (AES-KW, RSA-OAEP), possibly with the KEK itself delivered through
//! nested recipients.

use ciborium::value::Value;
use ensign_core::algs::{AlgKind, Algorithm};
use ensign_core::crypto::{agree, kdf, kw, random};
use ensign_core::keys::{CoseKey, Curve, KeyOp, SecretBytes};
use ensign_core::{CoseError, Result};

use crate::headers::{self, attr, HeaderMap, ProtectedHeader};
use crate::structure::{kdf_context, PartyInfo};

/// CEK-establishment variant, derived from the recipient's `alg`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipientKind {
    Direct,
    DirectHkdf,
    DirectKeyAgreement,
    KeyWrap,
    KeyTransport,
    KeyAgreementWithKeyWrap,
}

impl RecipientKind {
    /// Direct-class recipients carry no wrapped key and must be the only
    /// recipient of their message.
    pub fn is_direct_class(&self) -> bool {
        matches!(
            self,
            RecipientKind::Direct | RecipientKind::DirectHkdf | RecipientKind::DirectKeyAgreement
        )
    }
}

/// Classify a recipient algorithm.
pub fn classify(alg: Algorithm) -> Result<RecipientKind> {
    match alg.info().kind {
        AlgKind::Direct => Ok(RecipientKind::Direct),
        AlgKind::DirectHkdf => Ok(RecipientKind::DirectHkdf),
        AlgKind::DirectKeyAgreement => Ok(RecipientKind::DirectKeyAgreement),
        AlgKind::KeyWrap => Ok(RecipientKind::KeyWrap),
        AlgKind::KeyTransport => Ok(RecipientKind::KeyTransport),
        AlgKind::KeyAgreementWithKeyWrap => Ok(RecipientKind::KeyAgreementWithKeyWrap),
        _ => Err(CoseError::UnsupportedRecipient(format!(
            "{} is not a recipient algorithm",
            alg.info().name
        ))),
    }
}

/// One node of the recipient tree.
///
/// `key` and `sender_key` hold caller-supplied key material and are never
/// serialized. On the sender side `key` is the peer's key (KEK, RSA public,
/// or static ECDH public); `sender_key` is the sender's own static private
/// key for the ECDH-SS variants.
#[derive(Debug, Clone, Default)]
pub struct CoseRecipient {
    pub protected: ProtectedHeader,
    pub unprotected: HeaderMap,
    pub ciphertext: Vec<u8>,
    pub recipients: Vec<CoseRecipient>,
    pub key: Option<CoseKey>,
    pub sender_key: Option<CoseKey>,
}

impl CoseRecipient {
    pub fn new() -> Self {
        Self::default()
    }

    /// A direct recipient: the CEK is the shared symmetric key itself.
    pub fn direct(key: CoseKey) -> Self {
        let mut r = Self::new();
        r.unprotected.set_alg(Algorithm::Direct);
        if let Some(kid) = &key.kid {
            r.unprotected.set_kid(kid.clone());
        }
        r.key = Some(key);
        r
    }

    /// A key-wrap recipient holding the KEK.
    pub fn key_wrap(alg: Algorithm, kek: CoseKey) -> Self {
        let mut r = Self::new();
        r.unprotected.set_alg(alg);
        if let Some(kid) = &kek.kid {
            r.unprotected.set_kid(kid.clone());
        }
        r.key = Some(kek);
        r
    }

    /// A key-agreement recipient addressed to the peer's public key.
    pub fn key_agreement(alg: Algorithm, peer: CoseKey) -> Self {
        let mut r = Self::new();
        r.protected.set_alg(alg);
        if let Some(kid) = &peer.kid {
            r.unprotected.set_kid(kid.clone());
        }
        r.key = Some(peer);
        r
    }

    /// The recipient's algorithm (protected bucket preferred).
    pub fn alg(&self) -> Result<Algorithm> {
        match headers::get_attr(self.protected.map(), &self.unprotected, attr::ALG)? {
            Some(_) => {
                // value shape already validated on insert/parse
                match self.protected.map().alg()? {
                    Some(alg) => Ok(alg),
                    None => self.unprotected.alg()?.ok_or_else(missing_alg),
                }
            }
            None => Err(missing_alg()),
        }
    }

    /// This recipient's CEK-establishment variant.
    pub fn kind(&self) -> Result<RecipientKind> {
        classify(self.alg()?)
    }

    /// Serialize as the 3- or 4-element recipient array.
    pub fn to_value(&self) -> Result<Value> {
        let mut items = vec![
            Value::Bytes(self.protected.to_bytes()?),
            self.unprotected.to_value(),
            Value::Bytes(self.ciphertext.clone()),
        ];
        if !self.recipients.is_empty() {
            let nested = self
                .recipients
                .iter()
                .map(|r| r.to_value())
                .collect::<Result<Vec<_>>>()?;
            items.push(Value::Array(nested));
        }
        Ok(Value::Array(items))
    }

    /// Parse a recipient array (3 elements, or 4 with nested recipients).
    pub fn from_value(value: &Value, strict: bool) -> Result<Self> {
        let items = match value {
            Value::Array(items) if items.len() == 3 || items.len() == 4 => items,
            Value::Array(items) => {
                return Err(CoseError::MalformedMessage(format!(
                    "recipient array has {} elements",
                    items.len()
                )))
            }
            _ => return Err(CoseError::MalformedMessage("recipient must be an array".into())),
        };

        let protected = match &items[0] {
            Value::Bytes(b) => ProtectedHeader::from_bytes(b, strict)?,
            _ => {
                return Err(CoseError::MalformedMessage(
                    "recipient protected bucket must be a bstr".into(),
                ))
            }
        };
        let unprotected = HeaderMap::from_value(&items[1], strict)?;
        headers::assert_no_overlap(protected.map(), &unprotected)?;
        headers::validate_crit(protected.map(), &unprotected)?;

        let ciphertext = match &items[2] {
            Value::Bytes(b) => b.clone(),
            Value::Null => Vec::new(),
            _ => {
                return Err(CoseError::MalformedMessage(
                    "recipient ciphertext must be a bstr or nil".into(),
                ))
            }
        };

        let recipients = match items.get(3) {
            None => Vec::new(),
            Some(Value::Array(nested)) => nested
                .iter()
                .map(|r| CoseRecipient::from_value(r, strict))
                .collect::<Result<Vec<_>>>()?,
            Some(_) => {
                return Err(CoseError::MalformedMessage(
                    "nested recipients must be an array".into(),
                ))
            }
        };

        Ok(Self {
            protected,
            unprotected,
            ciphertext,
            recipients,
            key: None,
            sender_key: None,
        })
    }
}

fn missing_alg() -> CoseError {
    CoseError::InvalidAlgorithm("recipient alg missing".into())
}

/// Enforce the recipient-set rules: a direct-class recipient must be the
/// message's only recipient, and direct-class recipients never mix with
/// wrapped ones.
pub fn verify_recipient_set(recipients: &[CoseRecipient]) -> Result<()> {
    let mut direct = 0usize;
    for r in recipients {
        if r.kind()?.is_direct_class() {
            direct += 1;
        }
    }
    if direct > 0 && recipients.len() > 1 {
        return Err(CoseError::UnsupportedRecipient(
            "a direct or direct-key-agreement recipient must be the only recipient".into(),
        ));
    }
    Ok(())
}

/// Establish the CEK on the sender side, filling in recipient ciphertexts
/// and ephemeral-key headers as needed.
///
/// `target_alg` is the algorithm the derived key feeds (the message's
/// content algorithm, or a key-wrap algorithm for nested levels);
/// `target_len` its key length in bytes.
pub fn establish_cek(
    target_alg: Algorithm,
    target_len: usize,
    recipients: &mut [CoseRecipient],
) -> Result<SecretBytes> {
    if recipients.is_empty() {
        return Err(CoseError::UnsupportedRecipient(
            "at least one recipient is required".into(),
        ));
    }
    verify_recipient_set(recipients)?;

    if recipients.len() == 1 && recipients[0].kind()?.is_direct_class() {
        return derive_direct_sender(target_alg, target_len, &mut recipients[0]);
    }

    let cek = SecretBytes::new(random::bytes(target_len)?);
    for recipient in recipients.iter_mut() {
        wrap_cek_into(recipient, cek.as_slice())?;
    }
    Ok(cek)
}

/// Recover the CEK on the receiver side, walking `path` through nested
/// recipients. `key` is the caller-supplied key material for the leaf.
pub fn recover_cek(
    target_alg: Algorithm,
    target_len: usize,
    recipient: &CoseRecipient,
    key: &CoseKey,
    path: &[usize],
) -> Result<SecretBytes> {
    let alg = recipient.alg()?;
    let kind = classify(alg)?;

    if let Some((&head, rest)) = path.split_first() {
        // the KEK for this level is delivered through a nested recipient
        if kind != RecipientKind::KeyWrap {
            return Err(CoseError::UnsupportedRecipient(format!(
                "{} recipients cannot carry nested recipients",
                alg.info().name
            )));
        }
        let kek_len = alg
            .info()
            .key_len
            .ok_or_else(|| CoseError::InvalidAlgorithm("key wrap without key length".into()))?;
        let sub = recipient
            .recipients
            .get(head)
            .ok_or_else(|| CoseError::UnsupportedRecipient("recipient index out of range".into()))?;
        let kek = recover_cek(alg, kek_len, sub, key, rest)?;
        let cek = kw::unwrap(alg, kek.as_slice(), &recipient.ciphertext)?;
        return expect_len(cek, target_len);
    }

    match kind {
        RecipientKind::Direct => {
            key.check(KeyOp::Decrypt, target_alg).or_else(|_| {
                key.check(KeyOp::MacVerify, target_alg)
            })?;
            expect_len(key.symmetric_key()?.to_vec(), target_len)
        }
        RecipientKind::DirectHkdf => {
            key.check(KeyOp::DeriveKey, alg)?;
            let context = build_kdf_context(target_alg, target_len, recipient)?;
            let salt_owned = salt_of(recipient)?;
            let okm = kdf::derive(
                alg.info().hash.ok_or_else(|| bad_kdf(alg))?,
                key.symmetric_key()?,
                salt_owned.as_deref(),
                &context,
                target_len,
            )?;
            Ok(SecretBytes::new(okm))
        }
        RecipientKind::DirectKeyAgreement => {
            key.check(KeyOp::DeriveKey, alg)?;
            let peer = peer_key_from_headers(recipient, alg)?;
            let secret = agree::agree(key, &peer)?;
            let context = build_kdf_context(target_alg, target_len, recipient)?;
            let salt_owned = salt_of(recipient)?;
            let okm = kdf::derive(
                alg.info().hash.ok_or_else(|| bad_kdf(alg))?,
                secret.as_slice(),
                salt_owned.as_deref(),
                &context,
                target_len,
            )?;
            Ok(SecretBytes::new(okm))
        }
        RecipientKind::KeyWrap => {
            key.check(KeyOp::UnwrapKey, alg)?;
            let cek = kw::unwrap(alg, key.symmetric_key()?, &recipient.ciphertext)?;
            expect_len(cek, target_len)
        }
        RecipientKind::KeyTransport => {
            let cek = kw::rsa_oaep_unwrap(alg, key, &recipient.ciphertext)?;
            expect_len(cek, target_len)
        }
        RecipientKind::KeyAgreementWithKeyWrap => {
            let info = alg.info();
            let kw_alg = info.key_wrap.ok_or_else(|| bad_kdf(alg))?;
            let kek_len = info.key_len.ok_or_else(|| bad_kdf(alg))?;
            let peer = peer_key_from_headers(recipient, alg)?;
            let secret = agree::agree(key, &peer)?;
            let context = build_kdf_context(kw_alg, kek_len, recipient)?;
            let salt_owned = salt_of(recipient)?;
            let kek = kdf::derive(
                info.hash.ok_or_else(|| bad_kdf(alg))?,
                secret.as_slice(),
                salt_owned.as_deref(),
                &context,
                kek_len,
            )?;
            let cek = kw::unwrap(kw_alg, &kek, &recipient.ciphertext)?;
            expect_len(cek, target_len)
        }
    }
}

fn derive_direct_sender(
    target_alg: Algorithm,
    target_len: usize,
    recipient: &mut CoseRecipient,
) -> Result<SecretBytes> {
    let alg = recipient.alg()?;
    if !recipient.ciphertext.is_empty() {
        return Err(CoseError::UnsupportedRecipient(
            "direct recipients carry no ciphertext".into(),
        ));
    }
    match classify(alg)? {
        RecipientKind::Direct => {
            let key = recipient
                .key
                .as_ref()
                .ok_or_else(|| missing_key("direct"))?;
            expect_len(key.symmetric_key()?.to_vec(), target_len)
        }
        RecipientKind::DirectHkdf => {
            let key = recipient
                .key
                .as_ref()
                .ok_or_else(|| missing_key("direct HKDF"))?;
            let context = build_kdf_context(target_alg, target_len, recipient)?;
            let salt_owned = salt_of(recipient)?;
            let okm = kdf::derive(
                alg.info().hash.ok_or_else(|| bad_kdf(alg))?,
                key.symmetric_key()?,
                salt_owned.as_deref(),
                &context,
                target_len,
            )?;
            Ok(SecretBytes::new(okm))
        }
        RecipientKind::DirectKeyAgreement => {
            let secret = sender_agreement(recipient, alg)?;
            let context = build_kdf_context(target_alg, target_len, recipient)?;
            let salt_owned = salt_of(recipient)?;
            let okm = kdf::derive(
                alg.info().hash.ok_or_else(|| bad_kdf(alg))?,
                secret.as_slice(),
                salt_owned.as_deref(),
                &context,
                target_len,
            )?;
            Ok(SecretBytes::new(okm))
        }
        _ => unreachable!("caller checked is_direct_class"),
    }
}

fn wrap_cek_into(recipient: &mut CoseRecipient, cek: &[u8]) -> Result<()> {
    let alg = recipient.alg()?;
    match classify(alg)? {
        RecipientKind::KeyWrap => {
            let kek = match &recipient.key {
                Some(key) => {
                    key.check(KeyOp::WrapKey, alg)?;
                    SecretBytes::new(key.symmetric_key()?.to_vec())
                }
                None if !recipient.recipients.is_empty() => {
                    // KEK delivered through this recipient's own recipients
                    let kek_len = alg.info().key_len.ok_or_else(|| bad_kdf(alg))?;
                    establish_cek(alg, kek_len, &mut recipient.recipients)?
                }
                None => return Err(missing_key("key wrap")),
            };
            recipient.ciphertext = kw::wrap(alg, kek.as_slice(), cek)?;
            Ok(())
        }
        RecipientKind::KeyTransport => {
            let key = recipient
                .key
                .as_ref()
                .ok_or_else(|| missing_key("key transport"))?;
            recipient.ciphertext = kw::rsa_oaep_wrap(alg, key, cek)?;
            Ok(())
        }
        RecipientKind::KeyAgreementWithKeyWrap => {
            let info = alg.info();
            let kw_alg = info.key_wrap.ok_or_else(|| bad_kdf(alg))?;
            let kek_len = info.key_len.ok_or_else(|| bad_kdf(alg))?;
            let secret = sender_agreement(recipient, alg)?;
            let context = build_kdf_context(kw_alg, kek_len, recipient)?;
            let salt_owned = salt_of(recipient)?;
            let kek = kdf::derive(
                info.hash.ok_or_else(|| bad_kdf(alg))?,
                secret.as_slice(),
                salt_owned.as_deref(),
                &context,
                kek_len,
            )?;
            recipient.ciphertext = kw::wrap(kw_alg, &kek, cek)?;
            Ok(())
        }
        kind if kind.is_direct_class() => Err(CoseError::UnsupportedRecipient(
            "direct recipients cannot be combined with wrapped recipients".into(),
        )),
        _ => Err(CoseError::UnsupportedRecipient(alg.info().name.into())),
    }
}

/// Perform the sender-side ECDH, generating and attaching an ephemeral key
/// for the ES variants and advertising the static public key for SS.
fn sender_agreement(recipient: &mut CoseRecipient, alg: Algorithm) -> Result<SecretBytes> {
    let peer = recipient
        .key
        .clone()
        .ok_or_else(|| missing_key("key agreement"))?;
    if alg.is_ephemeral_static() {
        let curve = peer_curve(&peer)?;
        let ephemeral = agree::generate_ephemeral(curve)?;
        let secret = agree::agree(&ephemeral, &peer)?;
        let public = public_part(&ephemeral);
        recipient
            .unprotected
            .insert(attr::EPHEMERAL_KEY, public.to_value()?)?;
        Ok(secret)
    } else {
        let sender = recipient
            .sender_key
            .clone()
            .ok_or_else(|| missing_key("static-static key agreement"))?;
        let secret = agree::agree(&sender, &peer)?;
        if recipient.unprotected.get(attr::STATIC_KEY).is_none()
            && recipient.unprotected.get(attr::STATIC_KEY_ID).is_none()
        {
            let public = public_part(&sender);
            recipient
                .unprotected
                .insert(attr::STATIC_KEY, public.to_value()?)?;
        }
        Ok(secret)
    }
}

/// The peer public key a receiver agrees against: the sender's ephemeral
/// key for ES, or its static key for SS.
fn peer_key_from_headers(recipient: &CoseRecipient, alg: Algorithm) -> Result<CoseKey> {
    let label = if alg.is_ephemeral_static() {
        attr::EPHEMERAL_KEY
    } else {
        attr::STATIC_KEY
    };
    let from_protected = recipient.protected.map().key_attr(label)?;
    let key = match from_protected {
        Some(key) => Some(key),
        None => recipient.unprotected.key_attr(label)?,
    };
    key.ok_or_else(|| {
        CoseError::InvalidHeader(format!(
            "{} requires the {} header",
            alg.info().name,
            if alg.is_ephemeral_static() { "ephemeral key" } else { "static key" }
        ))
    })
}

fn peer_curve(peer: &CoseKey) -> Result<Curve> {
    if let Ok((crv, _, _, _)) = peer.ec2_params() {
        return Ok(crv);
    }
    let (crv, _, _) = peer.okp_params()?;
    Ok(crv)
}

/// Strip private components for header transport.
fn public_part(key: &CoseKey) -> CoseKey {
    let mut public = key.clone();
    match &mut public.params {
        ensign_core::keys::KeyParams::Ec2 { d, .. } => *d = None,
        ensign_core::keys::KeyParams::Okp { d, .. } => *d = None,
        _ => {}
    }
    public
}

fn build_kdf_context(
    target_alg: Algorithm,
    target_len: usize,
    recipient: &CoseRecipient,
) -> Result<Vec<u8>> {
    let party_u = party_info(
        recipient,
        attr::PARTY_U_IDENTITY,
        attr::PARTY_U_NONCE,
        attr::PARTY_U_OTHER,
    )?;
    let party_v = party_info(
        recipient,
        attr::PARTY_V_IDENTITY,
        attr::PARTY_V_NONCE,
        attr::PARTY_V_OTHER,
    )?;
    kdf_context(
        target_alg.value(),
        &party_u,
        &party_v,
        target_len * 8,
        &recipient.protected.to_bytes()?,
        None,
        None,
    )
}

fn party_info(
    recipient: &CoseRecipient,
    identity: i64,
    nonce: i64,
    other: i64,
) -> Result<PartyInfo> {
    let field = |label: i64| -> Result<Option<Vec<u8>>> {
        match headers::get_attr(recipient.protected.map(), &recipient.unprotected, label)? {
            Some(Value::Bytes(b)) => Ok(Some(b.clone())),
            Some(Value::Null) | None => Ok(None),
            Some(_) => Err(CoseError::InvalidHeader(format!(
                "party info {label} must be a bstr or nil"
            ))),
        }
    };
    Ok(PartyInfo {
        identity: field(identity)?,
        nonce: field(nonce)?,
        other: field(other)?,
    })
}

fn salt_of(recipient: &CoseRecipient) -> Result<Option<Vec<u8>>> {
    match headers::get_attr(recipient.protected.map(), &recipient.unprotected, attr::SALT)? {
        Some(Value::Bytes(b)) => Ok(Some(b.clone())),
        Some(_) => Err(CoseError::InvalidHeader("salt must be a bstr".into())),
        None => Ok(None),
    }
}

fn expect_len(cek: Vec<u8>, target_len: usize) -> Result<SecretBytes> {
    if cek.len() != target_len {
        return Err(CoseError::InvalidKey(format!(
            "recovered key is {} bytes, expected {target_len}",
            cek.len()
        )));
    }
    Ok(SecretBytes::new(cek))
}

fn bad_kdf(alg: Algorithm) -> CoseError {
    CoseError::InvalidAlgorithm(format!("{} descriptor incomplete", alg.info().name))
}

fn missing_key(what: &str) -> CoseError {
    CoseError::InvalidKey(format!("{what} recipient is missing key material"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kek_128() -> CoseKey {
        CoseKey::symmetric(vec![0x61; 16])
            .with_kid(*b"our-secret")
            .with_key_ops(vec![KeyOp::WrapKey, KeyOp::UnwrapKey])
    }

    #[test]
    fn key_wrap_roundtrip() {
        let mut recipients = vec![CoseRecipient::key_wrap(Algorithm::A128Kw, kek_128())];
        let cek = establish_cek(Algorithm::A128Gcm, 16, &mut recipients).unwrap();
        assert_eq!(recipients[0].ciphertext.len(), 24);

        let recovered =
            recover_cek(Algorithm::A128Gcm, 16, &recipients[0], &kek_128(), &[]).unwrap();
        assert_eq!(cek.as_slice(), recovered.as_slice());
    }

    #[test]
    fn direct_recipient_passes_key_through() {
        let cek_key = CoseKey::symmetric(vec![0x99; 32]);
        let mut recipients = vec![CoseRecipient::direct(cek_key.clone())];
        let cek = establish_cek(Algorithm::A256Gcm, 32, &mut recipients).unwrap();
        assert_eq!(cek.as_slice(), &[0x99; 32][..]);
        assert!(recipients[0].ciphertext.is_empty());

        let recovered =
            recover_cek(Algorithm::A256Gcm, 32, &recipients[0], &cek_key, &[]).unwrap();
        assert_eq!(recovered.as_slice(), &[0x99; 32][..]);
    }

    #[test]
    fn direct_mixed_with_wrap_rejected() {
        let mut recipients = vec![
            CoseRecipient::direct(CoseKey::symmetric(vec![0x99; 16])),
            CoseRecipient::key_wrap(Algorithm::A128Kw, kek_128()),
        ];
        assert!(matches!(
            establish_cek(Algorithm::A128Gcm, 16, &mut recipients),
            Err(CoseError::UnsupportedRecipient(_))
        ));
    }

    #[test]
    fn ecdh_es_kw_roundtrip() {
        let receiver = agree::generate_ephemeral(Curve::P256).unwrap();
        let receiver_public = public_part(&receiver);

        let mut recipients = vec![CoseRecipient::key_agreement(
            Algorithm::EcdhEsA128Kw,
            receiver_public,
        )];
        let cek = establish_cek(Algorithm::A128Gcm, 16, &mut recipients).unwrap();
        // sender attached its ephemeral public key
        assert!(recipients[0]
            .unprotected
            .get(attr::EPHEMERAL_KEY)
            .is_some());
        assert_eq!(recipients[0].ciphertext.len(), 24);

        let recovered =
            recover_cek(Algorithm::A128Gcm, 16, &recipients[0], &receiver, &[]).unwrap();
        assert_eq!(cek.as_slice(), recovered.as_slice());
    }

    #[test]
    fn ecdh_es_hkdf_direct_agreement() {
        let receiver = agree::generate_ephemeral(Curve::P256).unwrap();
        let receiver_public = public_part(&receiver);

        let mut recipients = vec![CoseRecipient::key_agreement(
            Algorithm::EcdhEsHkdf256,
            receiver_public,
        )];
        let cek = establish_cek(Algorithm::A128Gcm, 16, &mut recipients).unwrap();
        assert!(recipients[0].ciphertext.is_empty());

        let recovered =
            recover_cek(Algorithm::A128Gcm, 16, &recipients[0], &receiver, &[]).unwrap();
        assert_eq!(cek.as_slice(), recovered.as_slice());
    }

    #[test]
    fn ecdh_ss_uses_static_keys() {
        let sender = agree::generate_ephemeral(Curve::P256).unwrap();
        let receiver = agree::generate_ephemeral(Curve::P256).unwrap();

        let mut recipient =
            CoseRecipient::key_agreement(Algorithm::EcdhSsHkdf256, public_part(&receiver));
        recipient.sender_key = Some(sender.clone());
        let mut recipients = vec![recipient];

        let cek = establish_cek(Algorithm::A256Gcm, 32, &mut recipients).unwrap();
        // sender advertised its static public key
        assert!(recipients[0].unprotected.get(attr::STATIC_KEY).is_some());

        let recovered =
            recover_cek(Algorithm::A256Gcm, 32, &recipients[0], &receiver, &[]).unwrap();
        assert_eq!(cek.as_slice(), recovered.as_slice());
    }

    #[test]
    fn nested_recipient_delivers_kek() {
        // level 2: a key-wrap recipient delivers the level-1 KEK
        let outer_kek = kek_128();
        let mut level1 = CoseRecipient::new();
        level1.unprotected.set_alg(Algorithm::A128Kw);
        level1
            .recipients
            .push(CoseRecipient::key_wrap(Algorithm::A128Kw, outer_kek.clone()));

        let mut recipients = vec![level1];
        let cek = establish_cek(Algorithm::A128Gcm, 16, &mut recipients).unwrap();
        assert!(!recipients[0].ciphertext.is_empty());
        assert!(!recipients[0].recipients[0].ciphertext.is_empty());

        let recovered =
            recover_cek(Algorithm::A128Gcm, 16, &recipients[0], &outer_kek, &[0]).unwrap();
        assert_eq!(cek.as_slice(), recovered.as_slice());
    }

    #[test]
    fn recipient_serialization_roundtrip() {
        let mut recipients = vec![CoseRecipient::key_wrap(Algorithm::A128Kw, kek_128())];
        establish_cek(Algorithm::A128Gcm, 16, &mut recipients).unwrap();

        let value = recipients[0].to_value().unwrap();
        let decoded = CoseRecipient::from_value(&value, false).unwrap();
        assert_eq!(decoded.ciphertext, recipients[0].ciphertext);
        assert_eq!(decoded.unprotected.alg().unwrap(), Some(Algorithm::A128Kw));
        assert!(decoded.key.is_none());
    }

    #[test]
    fn wrong_cek_length_from_direct_rejected() {
        let mut recipients = vec![CoseRecipient::direct(CoseKey::symmetric(vec![0x99; 16]))];
        assert!(matches!(
            establish_cek(Algorithm::A256Gcm, 32, &mut recipients),
            Err(CoseError::InvalidKey(_))
        ));
    }
}
