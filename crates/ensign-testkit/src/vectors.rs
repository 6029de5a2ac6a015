//! Golden byte vectors for cross-release verification.
//!
//! These pin the deterministic encodings: once a vector is checked in,
//! every build must keep producing the same bytes.

use hex_literal::hex;

/// A signed-message vector: the wire bytes plus everything needed to
/// verify the signature.
#[derive(Debug, Clone)]
pub struct Sign1Vector {
    pub name: &'static str,
    /// Full tagged COSE_Sign1 wire bytes.
    pub message: Vec<u8>,
    /// The exact Sig_structure bytes the signature covers.
    pub to_be_signed: Vec<u8>,
    pub payload: &'static [u8],
    pub external_aad: &'static [u8],
}

/// RFC 8152 Appendix C.2.1: COSE_Sign1 over "This is the content." with
/// ES256 and the key with kid "11".
pub fn rfc8152_sign1_es256() -> Sign1Vector {
    Sign1Vector {
        name: "RFC 8152 C.2.1 Sign1 ES256",
        message: hex!(
            "d28443a10126a10442313154546869732069732074686520636f6e74656e742e"
            "58408eb33e4ca31d1c465ab05aac34cc6b23d58fef5c083106c4d25a91aef0b0"
            "117e2af9a291aa32e14ab834dc56ed2a223444547e01f11d3b0916e5a4c345ca"
            "cb36"
        )
        .to_vec(),
        to_be_signed: hex!(
            "846a5369676e617475726531"
            "43a101264054546869732069732074686520636f6e74656e742e"
        )
        .to_vec(),
        payload: b"This is the content.",
        external_aad: b"",
    }
}

/// A structure-builder vector: inputs and the exact output bytes.
#[derive(Debug, Clone)]
pub struct StructureVector {
    pub name: &'static str,
    pub expected: Vec<u8>,
}

/// Enc_structure for an Encrypt0 with empty protected bucket and
/// external AAD h'010203'.
pub fn enc_structure_encrypt0() -> StructureVector {
    StructureVector {
        name: "Enc_structure Encrypt0",
        expected: hex!("8368456e6372797074304043010203").to_vec(),
    }
}

/// COSE_KDF_Context for A128GCM (128 bits), empty party info, empty
/// protected bucket.
pub fn kdf_context_a128gcm() -> StructureVector {
    StructureVector {
        name: "KDF context A128GCM",
        expected: hex!("840183f6f6f683f6f6f682188040").to_vec(),
    }
}

/// Canonical-encoding vectors: CBOR value → exact bytes.
pub fn canonical_vectors() -> Vec<(&'static str, Vec<u8>)> {
    vec![
        ("alg ES256 protected bucket", hex!("a10126").to_vec()),
        ("alg HMAC 256/256 protected bucket", hex!("a10105").to_vec()),
        ("two-entry sorted map", hex!("a20126044231 31").to_vec()),
    ]
}
