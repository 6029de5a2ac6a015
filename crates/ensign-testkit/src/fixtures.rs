//! Key fixtures, mostly from RFC 8152 Appendix C.7.

use ensign_core::algs::Algorithm;
use ensign_core::keys::{CoseKey, Curve, KeyOp};
use hex_literal::hex;

/// The P-256 key with kid "11" used by the Appendix C signature examples.
pub fn p256_key_11() -> CoseKey {
    CoseKey::ec2_private(
        Curve::P256,
        hex!("bac5b11cad8f99f9c72b05cf4b9e26d244dc189f745228255a219a86d6a09eff").to_vec(),
        hex!("20138bf82dc1b6d562be0fa54ab7804a3a64b6d72ccfed6b6fb6ed28bbfc117e").to_vec(),
        hex!("57c92077664146e876760c9520d054aa93c3afb04e306705db6090308507b4d3").to_vec(),
    )
    .expect("fixture key is well-formed")
    .with_kid(*b"11")
}

/// The public half of [`p256_key_11`].
pub fn p256_key_11_public() -> CoseKey {
    let key = p256_key_11();
    let (crv, x, y, _) = key.ec2_params().expect("fixture is EC2");
    CoseKey::ec2(crv, x.to_vec(), y.to_vec())
        .expect("fixture key is well-formed")
        .with_kid(*b"11")
}

/// The 256-bit shared secret with kid "our-secret".
pub fn shared_secret() -> CoseKey {
    CoseKey::symmetric(
        hex!("849b57219dae48de646d07dbb533566e976686457c1491be3a76dcea6c427188").to_vec(),
    )
    .with_kid(*b"our-secret")
}

/// A 128-bit KEK with the Appendix C.3 recipient kid.
pub fn kek_128() -> CoseKey {
    CoseKey::symmetric(hex!("849b5786457c1491be3a76dcea6c4271").to_vec())
        .with_kid(*b"018c0ae5-4d9b-471b-bfd6-eef314bc7037")
        .with_key_ops(vec![KeyOp::WrapKey, KeyOp::UnwrapKey])
}

/// A deterministic Ed25519 signing key for EdDSA tests.
pub fn ed25519_key() -> CoseKey {
    let seed = [0x9du8; 32];
    let sk = ed25519_dalek::SigningKey::from_bytes(&seed);
    CoseKey::okp_private(
        Curve::Ed25519,
        sk.verifying_key().to_bytes().to_vec(),
        seed.to_vec(),
    )
    .expect("fixture key is well-formed")
    .with_kid(*b"ed25519-fixture")
    .with_alg(Algorithm::EdDSA)
}
