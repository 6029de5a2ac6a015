//! Algorithm registry: IANA COSE algorithm identifiers and descriptors.
//!
//! The registry is closed. Every identifier maps to a descriptor naming the
//! primitive binding, key/nonce/tag sizes, hash function, and curve
//! constraint. Values match the IANA COSE Algorithms registry verbatim.

use serde::{Deserialize, Serialize};

use crate::error::{CoseError, Result};
use crate::keys::Curve;

/// Hash functions referenced by algorithm descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HashAlg {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlg {
    /// Digest length in bytes.
    pub const fn len(&self) -> usize {
        match self {
            HashAlg::Sha1 => 20,
            HashAlg::Sha256 => 32,
            HashAlg::Sha384 => 48,
            HashAlg::Sha512 => 64,
        }
    }
}

/// The primitive class an algorithm binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlgKind {
    /// Authenticated encryption over the message payload.
    Aead,
    /// MAC over the payload.
    Mac,
    /// Digital signature.
    Signature,
    /// AES key wrap of a CEK.
    KeyWrap,
    /// RSA-OAEP key transport of a CEK.
    KeyTransport,
    /// CEK is the recipient's symmetric key, used as-is.
    Direct,
    /// CEK derived from the recipient's symmetric key via HKDF.
    DirectHkdf,
    /// CEK derived from an ECDH shared secret via HKDF.
    DirectKeyAgreement,
    /// ECDH-derived KEK wraps a fresh CEK via AES-KW.
    KeyAgreementWithKeyWrap,
}

/// A registered COSE algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Algorithm {
    RS1 = -65535,
    RS512 = -259,
    RS384 = -258,
    RS256 = -257,
    ES256K = -47,
    RsaesOaepSha512 = -42,
    RsaesOaepSha256 = -41,
    RsaesOaepSha1 = -40,
    PS512 = -39,
    PS384 = -38,
    PS256 = -37,
    ES512 = -36,
    ES384 = -35,
    EcdhSsA256Kw = -34,
    EcdhSsA192Kw = -33,
    EcdhSsA128Kw = -32,
    EcdhEsA256Kw = -31,
    EcdhEsA192Kw = -30,
    EcdhEsA128Kw = -29,
    EcdhSsHkdf512 = -28,
    EcdhSsHkdf256 = -27,
    EcdhEsHkdf512 = -26,
    EcdhEsHkdf256 = -25,
    DirectHkdfSha512 = -11,
    DirectHkdfSha256 = -10,
    EdDSA = -8,
    ES256 = -7,
    Direct = -6,
    A256Kw = -5,
    A192Kw = -4,
    A128Kw = -3,
    A128Gcm = 1,
    A192Gcm = 2,
    A256Gcm = 3,
    Hmac256_64 = 4,
    Hmac256 = 5,
    Hmac384 = 6,
    Hmac512 = 7,
    AesCcm16_64_128 = 10,
    AesCcm16_64_256 = 11,
    AesCcm64_64_128 = 12,
    AesCcm64_64_256 = 13,
    AesMac128_64 = 14,
    AesMac256_64 = 15,
    ChaCha20Poly1305 = 24,
    AesMac128_128 = 25,
    AesMac256_128 = 26,
    AesCcm16_128_128 = 30,
    AesCcm16_128_256 = 31,
    AesCcm64_128_128 = 32,
    AesCcm64_128_256 = 33,
}

/// Descriptor for a registered algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlgInfo {
    /// IANA registry name.
    pub name: &'static str,
    pub kind: AlgKind,
    /// Symmetric key (or derived key) length in bytes.
    pub key_len: Option<usize>,
    /// AEAD nonce length in bytes.
    pub nonce_len: Option<usize>,
    /// AEAD/MAC tag length in bytes.
    pub tag_len: Option<usize>,
    pub hash: Option<HashAlg>,
    /// Curve constraint for EC signature algorithms.
    pub curve: Option<Curve>,
    /// Key-wrap algorithm bound to a key-agreement-with-key-wrap variant.
    pub key_wrap: Option<Algorithm>,
}

impl Algorithm {
    /// Resolve an integer identifier. Unknown identifiers are not registered.
    pub fn from_i64(id: i64) -> Option<Self> {
        use Algorithm::*;
        Some(match id {
            -65535 => RS1,
            -259 => RS512,
            -258 => RS384,
            -257 => RS256,
            -47 => ES256K,
            -42 => RsaesOaepSha512,
            -41 => RsaesOaepSha256,
            -40 => RsaesOaepSha1,
            -39 => PS512,
            -38 => PS384,
            -37 => PS256,
            -36 => ES512,
            -35 => ES384,
            -34 => EcdhSsA256Kw,
            -33 => EcdhSsA192Kw,
            -32 => EcdhSsA128Kw,
            -31 => EcdhEsA256Kw,
            -30 => EcdhEsA192Kw,
            -29 => EcdhEsA128Kw,
            -28 => EcdhSsHkdf512,
            -27 => EcdhSsHkdf256,
            -26 => EcdhEsHkdf512,
            -25 => EcdhEsHkdf256,
            -11 => DirectHkdfSha512,
            -10 => DirectHkdfSha256,
            -8 => EdDSA,
            -7 => ES256,
            -6 => Direct,
            -5 => A256Kw,
            -4 => A192Kw,
            -3 => A128Kw,
            1 => A128Gcm,
            2 => A192Gcm,
            3 => A256Gcm,
            4 => Hmac256_64,
            5 => Hmac256,
            6 => Hmac384,
            7 => Hmac512,
            10 => AesCcm16_64_128,
            11 => AesCcm16_64_256,
            12 => AesCcm64_64_128,
            13 => AesCcm64_64_256,
            14 => AesMac128_64,
            15 => AesMac256_64,
            24 => ChaCha20Poly1305,
            25 => AesMac128_128,
            26 => AesMac256_128,
            30 => AesCcm16_128_128,
            31 => AesCcm16_128_256,
            32 => AesCcm64_128_128,
            33 => AesCcm64_128_256,
            _ => return None,
        })
    }

    /// Resolve a text alias (IANA registry name).
    pub fn from_name(name: &str) -> Option<Self> {
        use Algorithm::*;
        Some(match name {
            "RS1" => RS1,
            "RS512" => RS512,
            "RS384" => RS384,
            "RS256" => RS256,
            "ES256K" => ES256K,
            "RSAES-OAEP w/ SHA-512" => RsaesOaepSha512,
            "RSAES-OAEP w/ SHA-256" => RsaesOaepSha256,
            "RSAES-OAEP w/ RFC 8017 default parameters" => RsaesOaepSha1,
            "PS512" => PS512,
            "PS384" => PS384,
            "PS256" => PS256,
            "ES512" => ES512,
            "ES384" => ES384,
            "ECDH-SS + A256KW" => EcdhSsA256Kw,
            "ECDH-SS + A192KW" => EcdhSsA192Kw,
            "ECDH-SS + A128KW" => EcdhSsA128Kw,
            "ECDH-ES + A256KW" => EcdhEsA256Kw,
            "ECDH-ES + A192KW" => EcdhEsA192Kw,
            "ECDH-ES + A128KW" => EcdhEsA128Kw,
            "ECDH-SS + HKDF-512" => EcdhSsHkdf512,
            "ECDH-SS + HKDF-256" => EcdhSsHkdf256,
            "ECDH-ES + HKDF-512" => EcdhEsHkdf512,
            "ECDH-ES + HKDF-256" => EcdhEsHkdf256,
            "direct+HKDF-SHA-512" => DirectHkdfSha512,
            "direct+HKDF-SHA-256" => DirectHkdfSha256,
            "EdDSA" => EdDSA,
            "ES256" => ES256,
            "direct" => Direct,
            "A256KW" => A256Kw,
            "A192KW" => A192Kw,
            "A128KW" => A128Kw,
            "A128GCM" => A128Gcm,
            "A192GCM" => A192Gcm,
            "A256GCM" => A256Gcm,
            "HMAC 256/64" => Hmac256_64,
            "HMAC 256/256" => Hmac256,
            "HMAC 384/384" => Hmac384,
            "HMAC 512/512" => Hmac512,
            "AES-CCM-16-64-128" => AesCcm16_64_128,
            "AES-CCM-16-64-256" => AesCcm16_64_256,
            "AES-CCM-64-64-128" => AesCcm64_64_128,
            "AES-CCM-64-64-256" => AesCcm64_64_256,
            "AES-MAC 128/64" => AesMac128_64,
            "AES-MAC 256/64" => AesMac256_64,
            "ChaCha20/Poly1305" => ChaCha20Poly1305,
            "AES-MAC 128/128" => AesMac128_128,
            "AES-MAC 256/128" => AesMac256_128,
            "AES-CCM-16-128-128" => AesCcm16_128_128,
            "AES-CCM-16-128-256" => AesCcm16_128_256,
            "AES-CCM-64-128-128" => AesCcm64_128_128,
            "AES-CCM-64-128-256" => AesCcm64_128_256,
            _ => return None,
        })
    }

    /// The IANA registry value.
    pub fn value(&self) -> i64 {
        *self as i64
    }

    /// The descriptor for this algorithm.
    pub fn info(&self) -> AlgInfo {
        use Algorithm::*;
        use HashAlg::*;

        let sig = |name, hash, curve| AlgInfo {
            name,
            kind: AlgKind::Signature,
            key_len: None,
            nonce_len: None,
            tag_len: None,
            hash: Some(hash),
            curve,
            key_wrap: None,
        };
        let aead = |name, key_len, nonce_len, tag_len| AlgInfo {
            name,
            kind: AlgKind::Aead,
            key_len: Some(key_len),
            nonce_len: Some(nonce_len),
            tag_len: Some(tag_len),
            hash: None,
            curve: None,
            key_wrap: None,
        };
        let mac = |name, key_len, tag_len, hash| AlgInfo {
            name,
            kind: AlgKind::Mac,
            key_len: Some(key_len),
            nonce_len: None,
            tag_len: Some(tag_len),
            hash,
            curve: None,
            key_wrap: None,
        };
        let agree = |name, kind, hash, key_len, key_wrap| AlgInfo {
            name,
            kind,
            key_len,
            nonce_len: None,
            tag_len: None,
            hash: Some(hash),
            curve: None,
            key_wrap,
        };

        match self {
            RS1 => sig("RS1", Sha1, None),
            RS512 => sig("RS512", Sha512, None),
            RS384 => sig("RS384", Sha384, None),
            RS256 => sig("RS256", Sha256, None),
            PS512 => sig("PS512", Sha512, None),
            PS384 => sig("PS384", Sha384, None),
            PS256 => sig("PS256", Sha256, None),
            ES256K => sig("ES256K", Sha256, Some(Curve::Secp256k1)),
            ES512 => sig("ES512", Sha512, Some(Curve::P521)),
            ES384 => sig("ES384", Sha384, Some(Curve::P384)),
            ES256 => sig("ES256", Sha256, Some(Curve::P256)),
            EdDSA => sig("EdDSA", Sha512, None),

            A128Gcm => aead("A128GCM", 16, 12, 16),
            A192Gcm => aead("A192GCM", 24, 12, 16),
            A256Gcm => aead("A256GCM", 32, 12, 16),
            ChaCha20Poly1305 => aead("ChaCha20/Poly1305", 32, 12, 16),
            AesCcm16_64_128 => aead("AES-CCM-16-64-128", 16, 13, 8),
            AesCcm16_64_256 => aead("AES-CCM-16-64-256", 32, 13, 8),
            AesCcm64_64_128 => aead("AES-CCM-64-64-128", 16, 7, 8),
            AesCcm64_64_256 => aead("AES-CCM-64-64-256", 32, 7, 8),
            AesCcm16_128_128 => aead("AES-CCM-16-128-128", 16, 13, 16),
            AesCcm16_128_256 => aead("AES-CCM-16-128-256", 32, 13, 16),
            AesCcm64_128_128 => aead("AES-CCM-64-128-128", 16, 7, 16),
            AesCcm64_128_256 => aead("AES-CCM-64-128-256", 32, 7, 16),

            Hmac256_64 => mac("HMAC 256/64", 32, 8, Some(Sha256)),
            Hmac256 => mac("HMAC 256/256", 32, 32, Some(Sha256)),
            Hmac384 => mac("HMAC 384/384", 48, 48, Some(Sha384)),
            Hmac512 => mac("HMAC 512/512", 64, 64, Some(Sha512)),
            AesMac128_64 => mac("AES-MAC 128/64", 16, 8, None),
            AesMac256_64 => mac("AES-MAC 256/64", 32, 8, None),
            AesMac128_128 => mac("AES-MAC 128/128", 16, 16, None),
            AesMac256_128 => mac("AES-MAC 256/128", 32, 16, None),

            A128Kw => AlgInfo {
                name: "A128KW",
                kind: AlgKind::KeyWrap,
                key_len: Some(16),
                nonce_len: None,
                tag_len: None,
                hash: None,
                curve: None,
                key_wrap: None,
            },
            A192Kw => AlgInfo { name: "A192KW", key_len: Some(24), ..A128Kw.info() },
            A256Kw => AlgInfo { name: "A256KW", key_len: Some(32), ..A128Kw.info() },

            RsaesOaepSha1 => AlgInfo {
                name: "RSAES-OAEP w/ RFC 8017 default parameters",
                kind: AlgKind::KeyTransport,
                key_len: None,
                nonce_len: None,
                tag_len: None,
                hash: Some(Sha1),
                curve: None,
                key_wrap: None,
            },
            RsaesOaepSha256 => AlgInfo {
                name: "RSAES-OAEP w/ SHA-256",
                hash: Some(Sha256),
                ..RsaesOaepSha1.info()
            },
            RsaesOaepSha512 => AlgInfo {
                name: "RSAES-OAEP w/ SHA-512",
                hash: Some(Sha512),
                ..RsaesOaepSha1.info()
            },

            Direct => AlgInfo {
                name: "direct",
                kind: AlgKind::Direct,
                key_len: None,
                nonce_len: None,
                tag_len: None,
                hash: None,
                curve: None,
                key_wrap: None,
            },
            DirectHkdfSha256 => agree("direct+HKDF-SHA-256", AlgKind::DirectHkdf, Sha256, None, None),
            DirectHkdfSha512 => agree("direct+HKDF-SHA-512", AlgKind::DirectHkdf, Sha512, None, None),

            EcdhEsHkdf256 => agree("ECDH-ES + HKDF-256", AlgKind::DirectKeyAgreement, Sha256, None, None),
            EcdhEsHkdf512 => agree("ECDH-ES + HKDF-512", AlgKind::DirectKeyAgreement, Sha512, None, None),
            EcdhSsHkdf256 => agree("ECDH-SS + HKDF-256", AlgKind::DirectKeyAgreement, Sha256, None, None),
            EcdhSsHkdf512 => agree("ECDH-SS + HKDF-512", AlgKind::DirectKeyAgreement, Sha512, None, None),

            EcdhEsA128Kw => agree(
                "ECDH-ES + A128KW",
                AlgKind::KeyAgreementWithKeyWrap,
                Sha256,
                Some(16),
                Some(A128Kw),
            ),
            EcdhEsA192Kw => agree(
                "ECDH-ES + A192KW",
                AlgKind::KeyAgreementWithKeyWrap,
                Sha256,
                Some(24),
                Some(A192Kw),
            ),
            EcdhEsA256Kw => agree(
                "ECDH-ES + A256KW",
                AlgKind::KeyAgreementWithKeyWrap,
                Sha256,
                Some(32),
                Some(A256Kw),
            ),
            EcdhSsA128Kw => agree(
                "ECDH-SS + A128KW",
                AlgKind::KeyAgreementWithKeyWrap,
                Sha256,
                Some(16),
                Some(A128Kw),
            ),
            EcdhSsA192Kw => agree(
                "ECDH-SS + A192KW",
                AlgKind::KeyAgreementWithKeyWrap,
                Sha256,
                Some(24),
                Some(A192Kw),
            ),
            EcdhSsA256Kw => agree(
                "ECDH-SS + A256KW",
                AlgKind::KeyAgreementWithKeyWrap,
                Sha256,
                Some(32),
                Some(A256Kw),
            ),
        }
    }

    /// Whether the ephemeral-static flavor of ECDH applies (sender generates
    /// a fresh key pair per message).
    pub fn is_ephemeral_static(&self) -> bool {
        matches!(
            self,
            Algorithm::EcdhEsHkdf256
                | Algorithm::EcdhEsHkdf512
                | Algorithm::EcdhEsA128Kw
                | Algorithm::EcdhEsA192Kw
                | Algorithm::EcdhEsA256Kw
        )
    }
}

/// Resolve an integer identifier or fail with `InvalidAlgorithm`.
pub fn lookup(id: i64) -> Result<Algorithm> {
    Algorithm::from_i64(id)
        .ok_or_else(|| CoseError::InvalidAlgorithm(format!("unknown algorithm {id}")))
}

/// Resolve a text alias or fail with `InvalidAlgorithm`.
pub fn lookup_name(name: &str) -> Result<Algorithm> {
    Algorithm::from_name(name)
        .ok_or_else(|| CoseError::InvalidAlgorithm(format!("unknown algorithm {name:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_values_match_iana() {
        assert_eq!(Algorithm::ES256.value(), -7);
        assert_eq!(Algorithm::EdDSA.value(), -8);
        assert_eq!(Algorithm::Direct.value(), -6);
        assert_eq!(Algorithm::A128Kw.value(), -3);
        assert_eq!(Algorithm::A128Gcm.value(), 1);
        assert_eq!(Algorithm::Hmac256_64.value(), 4);
        assert_eq!(Algorithm::ChaCha20Poly1305.value(), 24);
        assert_eq!(Algorithm::RS256.value(), -257);
        assert_eq!(Algorithm::RS1.value(), -65535);
    }

    #[test]
    fn from_i64_roundtrip() {
        for id in [-65535, -259, -47, -36, -29, -25, -8, -7, -6, -3, 1, 4, 10, 24, 33] {
            let alg = Algorithm::from_i64(id).unwrap();
            assert_eq!(alg.value(), id);
        }
    }

    #[test]
    fn unknown_identifier_rejected() {
        assert!(Algorithm::from_i64(-70000).is_none());
        assert!(matches!(lookup(0), Err(CoseError::InvalidAlgorithm(_))));
    }

    #[test]
    fn name_aliases_resolve() {
        assert_eq!(Algorithm::from_name("ES256"), Some(Algorithm::ES256));
        assert_eq!(
            Algorithm::from_name("ECDH-ES + A128KW"),
            Some(Algorithm::EcdhEsA128Kw)
        );
        assert_eq!(
            Algorithm::from_name("direct+HKDF-SHA-256"),
            Some(Algorithm::DirectHkdfSha256)
        );
        assert!(Algorithm::from_name("ES1024").is_none());
    }

    #[test]
    fn aead_descriptor_sizes() {
        let info = Algorithm::A128Gcm.info();
        assert_eq!(info.kind, AlgKind::Aead);
        assert_eq!(info.key_len, Some(16));
        assert_eq!(info.nonce_len, Some(12));
        assert_eq!(info.tag_len, Some(16));

        let info = Algorithm::AesCcm64_64_256.info();
        assert_eq!(info.key_len, Some(32));
        assert_eq!(info.nonce_len, Some(7));
        assert_eq!(info.tag_len, Some(8));
    }

    #[test]
    fn signature_curve_constraints() {
        assert_eq!(Algorithm::ES256.info().curve, Some(Curve::P256));
        assert_eq!(Algorithm::ES512.info().curve, Some(Curve::P521));
        assert_eq!(Algorithm::ES256K.info().curve, Some(Curve::Secp256k1));
        assert_eq!(Algorithm::EdDSA.info().curve, None);
    }

    #[test]
    fn key_agreement_binds_key_wrap() {
        let info = Algorithm::EcdhEsA128Kw.info();
        assert_eq!(info.kind, AlgKind::KeyAgreementWithKeyWrap);
        assert_eq!(info.key_wrap, Some(Algorithm::A128Kw));
        assert_eq!(info.key_len, Some(16));
        assert_eq!(info.hash, Some(HashAlg::Sha256));
    }
}
