//! The RFC 8152 Appendix C scenarios, driven end to end.

use ensign::{
    decode, encode, headers::attr, Algorithm, CoseEncrypt, CoseEncrypt0, CoseMac, CoseMac0,
    CoseMessage, CoseRecipient, CoseSign, CoseSign1, CoseSignature,
};

#[test]
fn sign_message_parses_with_explicit_kind() {
    let key = fixtures::p256_key_11();
    let mut msg = CoseSign::new();
    msg.payload = Some(b"untagged".to_vec());
    msg.add_signature(CoseSignature::new(Algorithm::ES256));
    msg.sign(0, &key, b"").unwrap();

    let untagged = msg.to_bytes(false).unwrap();
    let decoded = CoseSign::from_bytes(&untagged).unwrap();
    assert!(decoded.verify(0, &key, b"", None).unwrap());
}

use ensign_core::crypto::agree;
use ensign_core::keys::{CoseKey, Curve};
use ensign_testkit::{fixtures, vectors};
use hex_literal::hex;

#[test]
fn sign1_es256_appendix_c_2_1_verifies() {
    let vector = vectors::rfc8152_sign1_es256();
    let msg = CoseSign1::from_bytes(&vector.message).unwrap();

    assert_eq!(msg.payload.as_deref(), Some(vector.payload));
    assert_eq!(msg.unprotected.bytes(attr::KID), Some(&b"11"[..]));

    let key = fixtures::p256_key_11_public();
    assert!(msg.verify(&key, vector.external_aad, None).unwrap());

    // the recomputed Sig_structure matches the vector byte for byte
    let tbs = ensign::structure::sig_structure(
        ensign::SigContext::Signature1,
        &msg.protected.to_bytes().unwrap(),
        None,
        vector.external_aad,
        vector.payload,
    )
    .unwrap();
    assert_eq!(tbs, vector.to_be_signed);
}

#[test]
fn sign1_appendix_message_reencodes_identically() {
    let vector = vectors::rfc8152_sign1_es256();
    let msg = CoseSign1::from_bytes(&vector.message).unwrap();
    assert_eq!(msg.to_bytes(true).unwrap(), vector.message);
}

#[test]
fn sign1_tampered_payload_rejected() {
    let vector = vectors::rfc8152_sign1_es256();
    let mut msg = CoseSign1::from_bytes(&vector.message).unwrap();
    if let Some(p) = msg.payload.as_mut() {
        p[0] ^= 0x01;
    }
    let key = fixtures::p256_key_11_public();
    assert!(!msg.verify(&key, b"", None).unwrap());
}

#[test]
fn mac0_hmac_256_64_shared_secret() {
    let key = fixtures::shared_secret();
    let mut msg = CoseMac0::new();
    msg.protected.set_alg(Algorithm::Hmac256_64);
    msg.payload = Some(b"This is the content.".to_vec());
    msg.compute_tag(&key, b"").unwrap();
    assert_eq!(msg.tag.len(), 8);

    let wire = msg.to_bytes(true).unwrap();
    let decoded = CoseMac0::from_bytes(&wire).unwrap();
    assert!(decoded.verify_tag(&key, b"", None).unwrap());
}

#[test]
fn encrypt0_aes_ccm_16_64_128() {
    let key = CoseKey::symmetric(hex!("849b5786457c1491be3a76dcea6c4271").to_vec());
    let mut msg = CoseEncrypt0::new();
    msg.protected.set_alg(Algorithm::AesCcm16_64_128);
    msg.unprotected
        .set_iv(hex!("89f52f65a1c580933b5261a78c").to_vec());
    msg.payload = Some(b"This is the content.".to_vec());
    msg.encrypt(&key, b"").unwrap();

    let wire = msg.to_bytes(true).unwrap();
    let decoded = CoseEncrypt0::from_bytes(&wire).unwrap();
    assert_eq!(
        decoded.decrypt(&key, b"", None).unwrap(),
        b"This is the content."
    );
}

#[test]
fn mac_with_a128kw_recipient_recovers_cek() {
    let kek = fixtures::kek_128();
    let mut msg = CoseMac::new();
    msg.protected.set_alg(Algorithm::Hmac256);
    msg.payload = Some(b"This is the content.".to_vec());
    msg.add_recipient(CoseRecipient::key_wrap(Algorithm::A128Kw, kek.clone()));
    msg.compute_tag(b"").unwrap();

    // wrapped CEK is 32 bytes of key + 8 of integrity
    assert_eq!(msg.recipients[0].ciphertext.len(), 40);

    let wire = msg.to_bytes(true).unwrap();
    let decoded = CoseMac::from_bytes(&wire).unwrap();
    assert!(decoded.verify_tag(&kek, b"", &[0], None).unwrap());
}

#[test]
fn encrypt_with_ecdh_es_a128kw_ephemeral_p256() {
    let receiver = agree::generate_ephemeral(Curve::P256).unwrap();
    let (crv, x, y, _) = receiver.ec2_params().unwrap();
    let receiver_public = CoseKey::ec2(crv, x.to_vec(), y.to_vec())
        .unwrap()
        .with_kid(*b"meriadoc.brandybuck@buckland.example");

    let mut msg = CoseEncrypt::new();
    msg.protected.set_alg(Algorithm::A128Gcm);
    msg.payload = Some(b"This is the content.".to_vec());
    msg.add_recipient(CoseRecipient::key_agreement(
        Algorithm::EcdhEsA128Kw,
        receiver_public,
    ));
    msg.encrypt(b"").unwrap();

    let wire = msg.to_bytes(true).unwrap();
    let decoded = CoseEncrypt::from_bytes(&wire).unwrap();

    // the ephemeral key travels in the recipient's unprotected bucket
    let ephemeral = decoded.recipients[0]
        .unprotected
        .key_attr(attr::EPHEMERAL_KEY)
        .unwrap()
        .expect("ephemeral key present");
    assert_eq!(ephemeral.ec2_params().unwrap().0, Curve::P256);

    assert_eq!(
        decoded.decrypt(&receiver, b"", &[0], None).unwrap(),
        b"This is the content."
    );
}

#[test]
fn sign_with_es256_and_es512_signers() {
    let key_es256 = fixtures::p256_key_11();
    let key_es512 = agree::generate_ephemeral(Curve::P521).unwrap();

    let mut msg = CoseSign::new();
    msg.payload = Some(b"This is the content.".to_vec());
    msg.add_signature(CoseSignature::new(Algorithm::ES256).with_kid(*b"11"));
    msg.add_signature(
        CoseSignature::new(Algorithm::ES512).with_kid(*b"bilbo.baggins@hobbiton.example"),
    );
    msg.sign(0, &key_es256, b"").unwrap();
    msg.sign(1, &key_es512, b"").unwrap();

    let wire = msg.to_bytes(true).unwrap();
    match decode(&wire).unwrap() {
        CoseMessage::Sign(decoded) => {
            assert!(decoded.verify(0, &key_es256, b"", None).unwrap());
            assert!(decoded.verify(1, &key_es512, b"", None).unwrap());
            assert_eq!(encode(&CoseMessage::Sign(decoded), true).unwrap(), wire);
        }
        other => panic!("expected a Sign message, got {other:?}"),
    }
}

#[test]
fn byte_flips_break_mac0() {
    let key = fixtures::shared_secret();
    let mut msg = CoseMac0::new();
    msg.protected.set_alg(Algorithm::Hmac256);
    msg.payload = Some(b"This is the content.".to_vec());
    msg.compute_tag(&key, b"").unwrap();
    let wire = msg.to_bytes(true).unwrap();

    for i in 0..wire.len() {
        let mut flipped = wire.clone();
        flipped[i] ^= 0x01;
        let survives = match CoseMac0::from_bytes(&flipped) {
            Ok(decoded) => decoded.verify_tag(&key, b"", None).unwrap_or(false),
            Err(_) => false,
        };
        assert!(!survives, "flip at byte {i} went unnoticed");
    }
}

#[test]
fn byte_flips_break_encrypt0() {
    let key = CoseKey::symmetric(vec![0x6Bu8; 16]);
    let mut msg = CoseEncrypt0::new();
    msg.protected.set_alg(Algorithm::A128Gcm);
    msg.payload = Some(b"This is the content.".to_vec());
    msg.encrypt(&key, b"").unwrap();
    let wire = msg.to_bytes(true).unwrap();

    for i in 0..wire.len() {
        let mut flipped = wire.clone();
        flipped[i] ^= 0x01;
        let survives = match CoseEncrypt0::from_bytes(&flipped) {
            Ok(decoded) => decoded.decrypt(&key, b"", None).is_ok(),
            Err(_) => false,
        };
        assert!(!survives, "flip at byte {i} went unnoticed");
    }
}
