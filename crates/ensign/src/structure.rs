//! Builders for the byte strings handed to the primitives: Sig_structure,
//! MAC_structure, Enc_structure, and COSE_KDF_Context.
//!
//! Every builder emits deterministic CBOR. Empty optional fields are
//! zero-length byte strings, never nil.

use ciborium::value::Value;
use ensign_core::canonical;
use ensign_core::Result;

/// Context string for a Sig_structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigContext {
    Signature,
    Signature1,
}

impl SigContext {
    fn as_str(&self) -> &'static str {
        match self {
            SigContext::Signature => "Signature",
            SigContext::Signature1 => "Signature1",
        }
    }
}

/// Context string for a MAC_structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacContext {
    Mac,
    Mac0,
}

impl MacContext {
    fn as_str(&self) -> &'static str {
        match self {
            MacContext::Mac => "MAC",
            MacContext::Mac0 => "MAC0",
        }
    }
}

/// Context string for an Enc_structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncContext {
    Encrypt,
    Encrypt0,
    EncRecipient,
    MacRecipient,
    RecRecipient,
}

impl EncContext {
    fn as_str(&self) -> &'static str {
        match self {
            EncContext::Encrypt => "Encrypt",
            EncContext::Encrypt0 => "Encrypt0",
            EncContext::EncRecipient => "Enc_Recipient",
            EncContext::MacRecipient => "Mac_Recipient",
            EncContext::RecRecipient => "Rec_Recipient",
        }
    }
}

/// The to-be-signed bytes. `sign_protected` is present only for the
/// per-signer context of a COSE_Sign message.
pub fn sig_structure(
    context: SigContext,
    body_protected: &[u8],
    sign_protected: Option<&[u8]>,
    external_aad: &[u8],
    payload: &[u8],
) -> Result<Vec<u8>> {
    let mut items = vec![
        Value::Text(context.as_str().into()),
        Value::Bytes(body_protected.to_vec()),
    ];
    if let Some(sp) = sign_protected {
        items.push(Value::Bytes(sp.to_vec()));
    }
    items.push(Value::Bytes(external_aad.to_vec()));
    items.push(Value::Bytes(payload.to_vec()));
    canonical::encode(&Value::Array(items))
}

/// The to-be-MACed bytes.
pub fn mac_structure(
    context: MacContext,
    body_protected: &[u8],
    external_aad: &[u8],
    payload: &[u8],
) -> Result<Vec<u8>> {
    canonical::encode(&Value::Array(vec![
        Value::Text(context.as_str().into()),
        Value::Bytes(body_protected.to_vec()),
        Value::Bytes(external_aad.to_vec()),
        Value::Bytes(payload.to_vec()),
    ]))
}

/// The AEAD additional authenticated data.
pub fn enc_structure(
    context: EncContext,
    body_protected: &[u8],
    external_aad: &[u8],
) -> Result<Vec<u8>> {
    canonical::encode(&Value::Array(vec![
        Value::Text(context.as_str().into()),
        Value::Bytes(body_protected.to_vec()),
        Value::Bytes(external_aad.to_vec()),
    ]))
}

/// One party's contribution to the KDF context.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartyInfo {
    pub identity: Option<Vec<u8>>,
    pub nonce: Option<Vec<u8>>,
    pub other: Option<Vec<u8>>,
}

impl PartyInfo {
    fn to_value(&self) -> Value {
        let field = |f: &Option<Vec<u8>>| match f {
            Some(bytes) => Value::Bytes(bytes.clone()),
            None => Value::Null,
        };
        Value::Array(vec![
            field(&self.identity),
            field(&self.nonce),
            field(&self.other),
        ])
    }
}

/// The HKDF info input: COSE_KDF_Context.
///
/// `key_data_length` is in bits. `protected` is the recipient's protected
/// bucket bytes.
#[allow(clippy::too_many_arguments)]
pub fn kdf_context(
    algorithm_id: i64,
    party_u: &PartyInfo,
    party_v: &PartyInfo,
    key_data_length: usize,
    protected: &[u8],
    supp_pub_other: Option<&[u8]>,
    supp_priv_info: Option<&[u8]>,
) -> Result<Vec<u8>> {
    let mut supp_pub = vec![
        Value::from(key_data_length as u64),
        Value::Bytes(protected.to_vec()),
    ];
    if let Some(other) = supp_pub_other {
        supp_pub.push(Value::Bytes(other.to_vec()));
    }

    let mut items = vec![
        Value::from(algorithm_id),
        party_u.to_value(),
        party_v.to_value(),
        Value::Array(supp_pub),
    ];
    if let Some(priv_info) = supp_priv_info {
        items.push(Value::Bytes(priv_info.to_vec()));
    }
    canonical::encode(&Value::Array(items))
}
