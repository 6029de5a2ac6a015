//! COSE key model: typed key variants with validation and CBOR encoding.
//!
//! Keys are values. Secret material is zeroized on drop and never leaves
//! the process through this crate.

use std::fmt;

use ciborium::value::Value;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::algs::{AlgKind, Algorithm};
use crate::canonical::{self, as_i64};
use crate::crypto::random;
use crate::error::{CoseError, Result};

/// Key map labels per RFC 8152 tables 3-6 (integer keys for compact encoding).
mod labels {
    pub const KTY: i64 = 1;
    pub const KID: i64 = 2;
    pub const ALG: i64 = 3;
    pub const KEY_OPS: i64 = 4;
    pub const BASE_IV: i64 = 5;

    // kty-specific labels share the negative space
    pub const CRV: i64 = -1; // EC2 / OKP
    pub const X: i64 = -2;
    pub const Y: i64 = -3; // EC2 only
    pub const D: i64 = -4;

    pub const K: i64 = -1; // Symmetric

    pub const RSA_N: i64 = -1;
    pub const RSA_E: i64 = -2;
    pub const RSA_D: i64 = -3;
    pub const RSA_P: i64 = -4;
    pub const RSA_Q: i64 = -5;
    pub const RSA_DP: i64 = -6;
    pub const RSA_DQ: i64 = -7;
    pub const RSA_QINV: i64 = -8;
    pub const RSA_OTHER: i64 = -9;
}

/// Secret key material, zeroized on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretBytes(Vec<u8>);

impl SecretBytes {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBytes({} bytes)", self.0.len())
    }
}

impl From<Vec<u8>> for SecretBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for SecretBytes {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

/// COSE key types (IANA COSE Key Types registry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyType {
    Okp = 1,
    Ec2 = 2,
    Rsa = 3,
    Symmetric = 4,
}

impl KeyType {
    pub fn from_i64(id: i64) -> Option<Self> {
        match id {
            1 => Some(KeyType::Okp),
            2 => Some(KeyType::Ec2),
            3 => Some(KeyType::Rsa),
            4 => Some(KeyType::Symmetric),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "OKP" => Some(KeyType::Okp),
            "EC2" => Some(KeyType::Ec2),
            "RSA" => Some(KeyType::Rsa),
            "Symmetric" => Some(KeyType::Symmetric),
            _ => None,
        }
    }

    pub fn value(&self) -> i64 {
        *self as i64
    }
}

/// Elliptic curves (IANA COSE Elliptic Curves registry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Curve {
    P256 = 1,
    P384 = 2,
    P521 = 3,
    X25519 = 4,
    X448 = 5,
    Ed25519 = 6,
    Ed448 = 7,
    Secp256k1 = 8,
}

impl Curve {
    pub fn from_i64(id: i64) -> Option<Self> {
        match id {
            1 => Some(Curve::P256),
            2 => Some(Curve::P384),
            3 => Some(Curve::P521),
            4 => Some(Curve::X25519),
            5 => Some(Curve::X448),
            6 => Some(Curve::Ed25519),
            7 => Some(Curve::Ed448),
            8 => Some(Curve::Secp256k1),
            _ => None,
        }
    }

    pub fn value(&self) -> i64 {
        *self as i64
    }

    /// Fixed field-element length in bytes; leading zeros are preserved.
    pub const fn coordinate_len(&self) -> usize {
        match self {
            Curve::P256 | Curve::Secp256k1 => 32,
            Curve::P384 => 48,
            Curve::P521 => 66,
            Curve::X25519 | Curve::Ed25519 => 32,
            Curve::X448 | Curve::Ed448 => 57,
        }
    }

    /// The key type this curve belongs to.
    pub const fn key_type(&self) -> KeyType {
        match self {
            Curve::P256 | Curve::P384 | Curve::P521 | Curve::Secp256k1 => KeyType::Ec2,
            Curve::X25519 | Curve::X448 | Curve::Ed25519 | Curve::Ed448 => KeyType::Okp,
        }
    }
}

/// Key operation restrictions (IANA COSE Key Common Parameters, `key_ops`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyOp {
    Sign = 1,
    Verify = 2,
    Encrypt = 3,
    Decrypt = 4,
    WrapKey = 5,
    UnwrapKey = 6,
    DeriveKey = 7,
    DeriveBits = 8,
    MacCreate = 9,
    MacVerify = 10,
}

impl KeyOp {
    pub fn from_i64(id: i64) -> Option<Self> {
        match id {
            1 => Some(KeyOp::Sign),
            2 => Some(KeyOp::Verify),
            3 => Some(KeyOp::Encrypt),
            4 => Some(KeyOp::Decrypt),
            5 => Some(KeyOp::WrapKey),
            6 => Some(KeyOp::UnwrapKey),
            7 => Some(KeyOp::DeriveKey),
            8 => Some(KeyOp::DeriveBits),
            9 => Some(KeyOp::MacCreate),
            10 => Some(KeyOp::MacVerify),
            _ => None,
        }
    }

    pub fn value(&self) -> i64 {
        *self as i64
    }
}

/// Per-type key parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyParams {
    Symmetric {
        k: SecretBytes,
    },
    Ec2 {
        crv: Curve,
        x: Vec<u8>,
        y: Vec<u8>,
        d: Option<SecretBytes>,
    },
    Okp {
        crv: Curve,
        x: Vec<u8>,
        d: Option<SecretBytes>,
    },
    Rsa {
        n: Vec<u8>,
        e: Vec<u8>,
        d: Option<SecretBytes>,
        p: Option<SecretBytes>,
        q: Option<SecretBytes>,
        dp: Option<SecretBytes>,
        dq: Option<SecretBytes>,
        qinv: Option<SecretBytes>,
        /// Additional prime info, carried opaquely.
        other: Option<Value>,
    },
}

impl KeyParams {
    fn key_type(&self) -> KeyType {
        match self {
            KeyParams::Symmetric { .. } => KeyType::Symmetric,
            KeyParams::Ec2 { .. } => KeyType::Ec2,
            KeyParams::Okp { .. } => KeyType::Okp,
            KeyParams::Rsa { .. } => KeyType::Rsa,
        }
    }
}

/// A COSE key: common attributes plus per-type parameters.
///
/// Unknown labels seen while parsing are preserved verbatim in `extra`
/// and round-trip unchanged.
#[derive(Clone, PartialEq)]
pub struct CoseKey {
    pub kid: Option<Vec<u8>>,
    pub alg: Option<Algorithm>,
    pub key_ops: Vec<KeyOp>,
    pub base_iv: Option<Vec<u8>>,
    pub params: KeyParams,
    pub extra: Vec<(Value, Value)>,
}

impl CoseKey {
    fn new(params: KeyParams) -> Self {
        Self {
            kid: None,
            alg: None,
            key_ops: Vec::new(),
            base_iv: None,
            params,
            extra: Vec::new(),
        }
    }

    /// A symmetric key from raw bytes.
    pub fn symmetric(k: impl Into<Vec<u8>>) -> Self {
        Self::new(KeyParams::Symmetric { k: SecretBytes::new(k.into()) })
    }

    /// An EC2 public key. Coordinates must be the curve's fixed length.
    pub fn ec2(crv: Curve, x: Vec<u8>, y: Vec<u8>) -> Result<Self> {
        let key = Self::new(KeyParams::Ec2 { crv, x, y, d: None });
        key.validate()?;
        Ok(key)
    }

    /// An EC2 private key.
    pub fn ec2_private(crv: Curve, x: Vec<u8>, y: Vec<u8>, d: Vec<u8>) -> Result<Self> {
        let key = Self::new(KeyParams::Ec2 {
            crv,
            x,
            y,
            d: Some(SecretBytes::new(d)),
        });
        key.validate()?;
        Ok(key)
    }

    /// An OKP public key.
    pub fn okp(crv: Curve, x: Vec<u8>) -> Result<Self> {
        let key = Self::new(KeyParams::Okp { crv, x, d: None });
        key.validate()?;
        Ok(key)
    }

    /// An OKP private key.
    pub fn okp_private(crv: Curve, x: Vec<u8>, d: Vec<u8>) -> Result<Self> {
        let key = Self::new(KeyParams::Okp {
            crv,
            x,
            d: Some(SecretBytes::new(d)),
        });
        key.validate()?;
        Ok(key)
    }

    /// An RSA public key (big-endian unsigned modulus and exponent).
    pub fn rsa(n: Vec<u8>, e: Vec<u8>) -> Result<Self> {
        let key = Self::new(KeyParams::Rsa {
            n,
            e,
            d: None,
            p: None,
            q: None,
            dp: None,
            dq: None,
            qinv: None,
            other: None,
        });
        key.validate()?;
        Ok(key)
    }

    /// An RSA private key with CRT components.
    #[allow(clippy::too_many_arguments)]
    pub fn rsa_private(
        n: Vec<u8>,
        e: Vec<u8>,
        d: Vec<u8>,
        p: Vec<u8>,
        q: Vec<u8>,
        dp: Vec<u8>,
        dq: Vec<u8>,
        qinv: Vec<u8>,
    ) -> Result<Self> {
        let key = Self::new(KeyParams::Rsa {
            n,
            e,
            d: Some(SecretBytes::new(d)),
            p: Some(SecretBytes::new(p)),
            q: Some(SecretBytes::new(q)),
            dp: Some(SecretBytes::new(dp)),
            dq: Some(SecretBytes::new(dq)),
            qinv: Some(SecretBytes::new(qinv)),
            other: None,
        });
        key.validate()?;
        Ok(key)
    }

    /// Generate a fresh symmetric key sized for `alg`, with `key_ops`
    /// defaulted from the algorithm kind.
    pub fn generate(alg: Algorithm) -> Result<Self> {
        let info = alg.info();
        let len = info.key_len.ok_or_else(|| {
            CoseError::InvalidAlgorithm(format!("{} has no key length", info.name))
        })?;
        let ops = match info.kind {
            AlgKind::Aead => vec![KeyOp::Encrypt, KeyOp::Decrypt],
            AlgKind::Mac => vec![KeyOp::MacCreate, KeyOp::MacVerify],
            AlgKind::KeyWrap => vec![KeyOp::WrapKey, KeyOp::UnwrapKey],
            _ => {
                return Err(CoseError::InvalidAlgorithm(format!(
                    "cannot generate a key for {}",
                    info.name
                )))
            }
        };
        Ok(Self::symmetric(random::bytes(len)?)
            .with_alg(alg)
            .with_key_ops(ops))
    }

    pub fn with_kid(mut self, kid: impl Into<Vec<u8>>) -> Self {
        self.kid = Some(kid.into());
        self
    }

    pub fn with_alg(mut self, alg: Algorithm) -> Self {
        self.alg = Some(alg);
        self
    }

    pub fn with_key_ops(mut self, ops: Vec<KeyOp>) -> Self {
        self.key_ops = ops;
        self
    }

    pub fn with_base_iv(mut self, iv: impl Into<Vec<u8>>) -> Self {
        self.base_iv = Some(iv.into());
        self
    }

    /// The key type.
    pub fn kty(&self) -> KeyType {
        self.params.key_type()
    }

    /// The symmetric key bytes, or `InvalidKey` for other key types.
    pub fn symmetric_key(&self) -> Result<&[u8]> {
        match &self.params {
            KeyParams::Symmetric { k } => Ok(k.as_slice()),
            _ => Err(CoseError::InvalidKey("symmetric key required".into())),
        }
    }

    /// EC2 parameters, or `InvalidKey` for other key types.
    pub fn ec2_params(&self) -> Result<(Curve, &[u8], &[u8], Option<&[u8]>)> {
        match &self.params {
            KeyParams::Ec2 { crv, x, y, d } => {
                Ok((*crv, x, y, d.as_ref().map(|d| d.as_slice())))
            }
            _ => Err(CoseError::InvalidKey("EC2 key required".into())),
        }
    }

    /// OKP parameters, or `InvalidKey` for other key types.
    pub fn okp_params(&self) -> Result<(Curve, &[u8], Option<&[u8]>)> {
        match &self.params {
            KeyParams::Okp { crv, x, d } => Ok((*crv, x, d.as_ref().map(|d| d.as_slice()))),
            _ => Err(CoseError::InvalidKey("OKP key required".into())),
        }
    }

    fn validate(&self) -> Result<()> {
        match &self.params {
            KeyParams::Symmetric { k } => {
                if k.is_empty() {
                    return Err(CoseError::InvalidKeyFormat("empty symmetric key".into()));
                }
            }
            KeyParams::Ec2 { crv, x, y, d } => {
                if crv.key_type() != KeyType::Ec2 {
                    return Err(CoseError::InvalidKeyFormat(format!(
                        "curve {crv:?} is not an EC2 curve"
                    )));
                }
                let len = crv.coordinate_len();
                if x.len() != len || y.len() != len {
                    return Err(CoseError::InvalidKeyFormat(format!(
                        "coordinate length {}/{} does not match curve {crv:?} ({len})",
                        x.len(),
                        y.len()
                    )));
                }
                if let Some(d) = d {
                    if d.len() != len {
                        return Err(CoseError::InvalidKeyFormat(
                            "private scalar length does not match curve".into(),
                        ));
                    }
                }
            }
            KeyParams::Okp { crv, x, d } => {
                if crv.key_type() != KeyType::Okp {
                    return Err(CoseError::InvalidKeyFormat(format!(
                        "curve {crv:?} is not an OKP curve"
                    )));
                }
                let len = crv.coordinate_len();
                if x.len() != len {
                    return Err(CoseError::InvalidKeyFormat(format!(
                        "public key length {} does not match curve {crv:?} ({len})",
                        x.len()
                    )));
                }
                if let Some(d) = d {
                    if d.len() != len {
                        return Err(CoseError::InvalidKeyFormat(
                            "private key length does not match curve".into(),
                        ));
                    }
                }
            }
            KeyParams::Rsa { n, e, .. } => {
                if n.is_empty() || e.is_empty() {
                    return Err(CoseError::InvalidKeyFormat(
                        "RSA key requires modulus and exponent".into(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Gate the key for an operation with an algorithm.
    ///
    /// Succeeds iff the `key_ops` restriction (when present) permits `op`,
    /// the key type and curve are compatible with `alg`, and the key's own
    /// `alg` (when present) equals `alg`.
    pub fn check(&self, op: KeyOp, alg: Algorithm) -> Result<()> {
        if !self.key_ops.is_empty() && !self.key_ops.contains(&op) {
            return Err(CoseError::InvalidKey(format!(
                "key_ops does not permit {op:?}"
            )));
        }
        if let Some(key_alg) = self.alg {
            if key_alg != alg {
                return Err(CoseError::InvalidKey(format!(
                    "key is bound to {} but {} was requested",
                    key_alg.info().name,
                    alg.info().name
                )));
            }
        }

        let info = alg.info();
        match info.kind {
            AlgKind::Signature => match alg {
                Algorithm::EdDSA => {
                    let (crv, _, _) = self.okp_params()?;
                    if !matches!(crv, Curve::Ed25519 | Curve::Ed448) {
                        return Err(CoseError::InvalidKey(format!(
                            "EdDSA requires an Ed25519 or Ed448 key, got {crv:?}"
                        )));
                    }
                }
                Algorithm::ES256 | Algorithm::ES384 | Algorithm::ES512 | Algorithm::ES256K => {
                    let (crv, _, _, _) = self.ec2_params()?;
                    if Some(crv) != info.curve {
                        return Err(CoseError::InvalidKey(format!(
                            "{} requires curve {:?}, got {crv:?}",
                            info.name, info.curve
                        )));
                    }
                }
                // RSA signature family
                _ => {
                    if self.kty() != KeyType::Rsa {
                        return Err(CoseError::InvalidKey(format!(
                            "{} requires an RSA key",
                            info.name
                        )));
                    }
                }
            },
            AlgKind::Aead | AlgKind::Mac | AlgKind::KeyWrap => {
                let k = self.symmetric_key()?;
                if let Some(len) = info.key_len {
                    if k.len() != len {
                        return Err(CoseError::InvalidKey(format!(
                            "{} requires a {len}-byte key, got {}",
                            info.name,
                            k.len()
                        )));
                    }
                }
            }
            AlgKind::Direct | AlgKind::DirectHkdf => {
                self.symmetric_key()?;
            }
            AlgKind::KeyTransport => {
                if self.kty() != KeyType::Rsa {
                    return Err(CoseError::InvalidKey(format!(
                        "{} requires an RSA key",
                        info.name
                    )));
                }
            }
            AlgKind::DirectKeyAgreement | AlgKind::KeyAgreementWithKeyWrap => {
                match &self.params {
                    KeyParams::Ec2 { .. } => {}
                    KeyParams::Okp { crv, .. }
                        if matches!(crv, Curve::X25519 | Curve::X448) => {}
                    _ => {
                        return Err(CoseError::InvalidKey(format!(
                            "{} requires an EC2 or X-curve OKP key",
                            info.name
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Encode as a deterministic CBOR map.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        canonical::encode(&self.to_value()?)
    }

    /// The CBOR map form of the key.
    pub fn to_value(&self) -> Result<Value> {
        let mut entries: Vec<(Value, Value)> = Vec::new();
        entries.push((Value::from(labels::KTY), Value::from(self.kty().value())));
        if let Some(kid) = &self.kid {
            entries.push((Value::from(labels::KID), Value::Bytes(kid.clone())));
        }
        if let Some(alg) = self.alg {
            entries.push((Value::from(labels::ALG), Value::from(alg.value())));
        }
        if !self.key_ops.is_empty() {
            let ops = self.key_ops.iter().map(|op| Value::from(op.value())).collect();
            entries.push((Value::from(labels::KEY_OPS), Value::Array(ops)));
        }
        if let Some(iv) = &self.base_iv {
            entries.push((Value::from(labels::BASE_IV), Value::Bytes(iv.clone())));
        }

        match &self.params {
            KeyParams::Symmetric { k } => {
                entries.push((Value::from(labels::K), Value::Bytes(k.as_slice().to_vec())));
            }
            KeyParams::Ec2 { crv, x, y, d } => {
                entries.push((Value::from(labels::CRV), Value::from(crv.value())));
                entries.push((Value::from(labels::X), Value::Bytes(x.clone())));
                entries.push((Value::from(labels::Y), Value::Bytes(y.clone())));
                if let Some(d) = d {
                    entries.push((Value::from(labels::D), Value::Bytes(d.as_slice().to_vec())));
                }
            }
            KeyParams::Okp { crv, x, d } => {
                entries.push((Value::from(labels::CRV), Value::from(crv.value())));
                entries.push((Value::from(labels::X), Value::Bytes(x.clone())));
                if let Some(d) = d {
                    entries.push((Value::from(labels::D), Value::Bytes(d.as_slice().to_vec())));
                }
            }
            KeyParams::Rsa { n, e, d, p, q, dp, dq, qinv, other } => {
                entries.push((Value::from(labels::RSA_N), Value::Bytes(minimal_uint(n))));
                entries.push((Value::from(labels::RSA_E), Value::Bytes(minimal_uint(e))));
                let mut private = |label: i64, field: &Option<SecretBytes>| {
                    if let Some(v) = field {
                        entries.push((Value::from(label), Value::Bytes(minimal_uint(v.as_slice()))));
                    }
                };
                private(labels::RSA_D, d);
                private(labels::RSA_P, p);
                private(labels::RSA_Q, q);
                private(labels::RSA_DP, dp);
                private(labels::RSA_DQ, dq);
                private(labels::RSA_QINV, qinv);
                if let Some(other) = other {
                    entries.push((Value::from(labels::RSA_OTHER), other.clone()));
                }
            }
        }

        for (label, value) in &self.extra {
            entries.push((label.clone(), value.clone()));
        }
        Ok(Value::Map(entries))
    }

    /// Parse a key from its CBOR map encoding.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let value = canonical::decode(bytes)
            .map_err(|e| CoseError::InvalidKeyFormat(e.to_string()))?;
        Self::from_value(&value)
    }

    /// Parse a key from a decoded CBOR map.
    pub fn from_value(value: &Value) -> Result<Self> {
        let entries = match value {
            Value::Map(m) => m,
            _ => return Err(CoseError::InvalidKeyFormat("expected a CBOR map".into())),
        };

        for (i, (label, _)) in entries.iter().enumerate() {
            if entries.iter().skip(i + 1).any(|(other, _)| other == label) {
                return Err(CoseError::InvalidKeyFormat(format!(
                    "duplicate label {label:?}"
                )));
            }
        }

        let get = |label: i64| -> Option<&Value> {
            entries
                .iter()
                .find(|(k, _)| as_i64(k) == Some(label))
                .map(|(_, v)| v)
        };

        let kty = match get(labels::KTY) {
            Some(v) => match v {
                Value::Integer(_) => as_i64(v).and_then(KeyType::from_i64),
                Value::Text(name) => KeyType::from_name(name),
                _ => None,
            }
            .ok_or_else(|| CoseError::InvalidKeyFormat("unknown kty".into()))?,
            None => return Err(CoseError::InvalidKeyFormat("missing kty".into())),
        };

        let kid = match get(labels::KID) {
            Some(Value::Bytes(b)) => Some(b.clone()),
            Some(_) => return Err(CoseError::InvalidKeyFormat("kid must be a bstr".into())),
            None => None,
        };

        let alg = match get(labels::ALG) {
            Some(Value::Text(name)) => Some(crate::algs::lookup_name(name)?),
            Some(v) => match as_i64(v) {
                Some(id) => Some(crate::algs::lookup(id)?),
                None => return Err(CoseError::InvalidKeyFormat("bad alg value".into())),
            },
            None => None,
        };

        let key_ops = match get(labels::KEY_OPS) {
            Some(Value::Array(items)) => {
                let mut ops = Vec::with_capacity(items.len());
                for item in items {
                    let op = as_i64(item)
                        .and_then(KeyOp::from_i64)
                        .ok_or_else(|| CoseError::InvalidKeyFormat("unknown key_op".into()))?;
                    ops.push(op);
                }
                ops
            }
            Some(_) => return Err(CoseError::InvalidKeyFormat("key_ops must be an array".into())),
            None => Vec::new(),
        };

        let base_iv = match get(labels::BASE_IV) {
            Some(Value::Bytes(b)) => Some(b.clone()),
            Some(_) => return Err(CoseError::InvalidKeyFormat("base IV must be a bstr".into())),
            None => None,
        };

        let bytes_param = |label: i64| -> Result<Option<Vec<u8>>> {
            match get(label) {
                Some(Value::Bytes(b)) => Ok(Some(b.clone())),
                Some(_) => Err(CoseError::InvalidKeyFormat(format!(
                    "label {label} must be a bstr"
                ))),
                None => Ok(None),
            }
        };
        let required_bytes = |label: i64, name: &str| -> Result<Vec<u8>> {
            bytes_param(label)?
                .ok_or_else(|| CoseError::InvalidKeyFormat(format!("missing {name}")))
        };

        let mut known_labels: Vec<i64> = vec![
            labels::KTY,
            labels::KID,
            labels::ALG,
            labels::KEY_OPS,
            labels::BASE_IV,
        ];

        let params = match kty {
            KeyType::Symmetric => {
                known_labels.push(labels::K);
                KeyParams::Symmetric {
                    k: SecretBytes::new(required_bytes(labels::K, "k")?),
                }
            }
            KeyType::Ec2 | KeyType::Okp => {
                let crv = get(labels::CRV)
                    .and_then(as_i64)
                    .and_then(Curve::from_i64)
                    .ok_or_else(|| CoseError::InvalidKeyFormat("missing or unknown crv".into()))?;
                if crv.key_type() != kty {
                    return Err(CoseError::InvalidKeyFormat(format!(
                        "curve {crv:?} does not belong to kty {kty:?}"
                    )));
                }
                let x = required_bytes(labels::X, "x")?;
                let d = bytes_param(labels::D)?.map(SecretBytes::new);
                known_labels.extend([labels::CRV, labels::X, labels::D]);
                if kty == KeyType::Ec2 {
                    known_labels.push(labels::Y);
                    KeyParams::Ec2 {
                        crv,
                        x,
                        y: required_bytes(labels::Y, "y")?,
                        d,
                    }
                } else {
                    KeyParams::Okp { crv, x, d }
                }
            }
            KeyType::Rsa => {
                known_labels.extend([
                    labels::RSA_N,
                    labels::RSA_E,
                    labels::RSA_D,
                    labels::RSA_P,
                    labels::RSA_Q,
                    labels::RSA_DP,
                    labels::RSA_DQ,
                    labels::RSA_QINV,
                    labels::RSA_OTHER,
                ]);
                KeyParams::Rsa {
                    n: required_bytes(labels::RSA_N, "n")?,
                    e: required_bytes(labels::RSA_E, "e")?,
                    d: bytes_param(labels::RSA_D)?.map(SecretBytes::new),
                    p: bytes_param(labels::RSA_P)?.map(SecretBytes::new),
                    q: bytes_param(labels::RSA_Q)?.map(SecretBytes::new),
                    dp: bytes_param(labels::RSA_DP)?.map(SecretBytes::new),
                    dq: bytes_param(labels::RSA_DQ)?.map(SecretBytes::new),
                    qinv: bytes_param(labels::RSA_QINV)?.map(SecretBytes::new),
                    other: get(labels::RSA_OTHER).cloned(),
                }
            }
        };

        let extra = entries
            .iter()
            .filter(|(label, _)| match as_i64(label) {
                Some(id) => !known_labels.contains(&id),
                None => true,
            })
            .cloned()
            .collect();

        let key = CoseKey {
            kid,
            alg,
            key_ops,
            base_iv,
            params,
            extra,
        };
        key.validate()?;
        Ok(key)
    }
}

impl fmt::Debug for CoseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoseKey")
            .field("kty", &self.kty())
            .field("kid", &self.kid.as_deref().map(hex::encode))
            .field("alg", &self.alg)
            .field("key_ops", &self.key_ops)
            .field("params", &self.params)
            .finish()
    }
}

/// Minimal-length unsigned big-endian form (leading zero bytes stripped).
fn minimal_uint(bytes: &[u8]) -> Vec<u8> {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    bytes[start..].to_vec()
}
