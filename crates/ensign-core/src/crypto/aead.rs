//! AEAD adapter: AES-GCM, AES-CCM, and ChaCha20-Poly1305.
//!
//! Ciphertexts carry the authentication tag appended, per the COSE
//! convention. Nonce lengths are validated against the algorithm
//! descriptor before the backend is invoked.

use aes::{Aes128, Aes192, Aes256};
use aes_gcm::{
    aead::{Aead, KeyInit, Nonce, Payload},
    Aes128Gcm, Aes256Gcm, AesGcm,
};
use ccm::{
    consts::{U12, U13, U16, U7, U8},
    Ccm,
};
use chacha20poly1305::ChaCha20Poly1305;

use crate::algs::Algorithm;
use crate::error::{CoseError, Result};

type Aes192Gcm = AesGcm<Aes192, U12>;

type Ccm16_64_128 = Ccm<Aes128, U8, U13>;
type Ccm16_64_256 = Ccm<Aes256, U8, U13>;
type Ccm64_64_128 = Ccm<Aes128, U8, U7>;
type Ccm64_64_256 = Ccm<Aes256, U8, U7>;
type Ccm16_128_128 = Ccm<Aes128, U16, U13>;
type Ccm16_128_256 = Ccm<Aes256, U16, U13>;
type Ccm64_128_128 = Ccm<Aes128, U16, U7>;
type Ccm64_128_256 = Ccm<Aes256, U16, U7>;

/// Encrypt `plaintext`, authenticating `aad`. Returns ciphertext || tag.
pub fn encrypt(
    alg: Algorithm,
    key: &[u8],
    nonce: &[u8],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    check_sizes(alg, key, nonce)?;
    match alg {
        Algorithm::A128Gcm => seal::<Aes128Gcm>(key, nonce, aad, plaintext),
        Algorithm::A192Gcm => seal::<Aes192Gcm>(key, nonce, aad, plaintext),
        Algorithm::A256Gcm => seal::<Aes256Gcm>(key, nonce, aad, plaintext),
        Algorithm::ChaCha20Poly1305 => seal::<ChaCha20Poly1305>(key, nonce, aad, plaintext),
        Algorithm::AesCcm16_64_128 => seal::<Ccm16_64_128>(key, nonce, aad, plaintext),
        Algorithm::AesCcm16_64_256 => seal::<Ccm16_64_256>(key, nonce, aad, plaintext),
        Algorithm::AesCcm64_64_128 => seal::<Ccm64_64_128>(key, nonce, aad, plaintext),
        Algorithm::AesCcm64_64_256 => seal::<Ccm64_64_256>(key, nonce, aad, plaintext),
        Algorithm::AesCcm16_128_128 => seal::<Ccm16_128_128>(key, nonce, aad, plaintext),
        Algorithm::AesCcm16_128_256 => seal::<Ccm16_128_256>(key, nonce, aad, plaintext),
        Algorithm::AesCcm64_128_128 => seal::<Ccm64_128_128>(key, nonce, aad, plaintext),
        Algorithm::AesCcm64_128_256 => seal::<Ccm64_128_256>(key, nonce, aad, plaintext),
        _ => Err(CoseError::InvalidAlgorithm(format!(
            "{} is not an AEAD",
            alg.info().name
        ))),
    }
}

/// Decrypt ciphertext || tag, authenticating `aad`.
pub fn decrypt(
    alg: Algorithm,
    key: &[u8],
    nonce: &[u8],
    aad: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>> {
    check_sizes(alg, key, nonce)?;
    match alg {
        Algorithm::A128Gcm => open::<Aes128Gcm>(key, nonce, aad, ciphertext),
        Algorithm::A192Gcm => open::<Aes192Gcm>(key, nonce, aad, ciphertext),
        Algorithm::A256Gcm => open::<Aes256Gcm>(key, nonce, aad, ciphertext),
        Algorithm::ChaCha20Poly1305 => open::<ChaCha20Poly1305>(key, nonce, aad, ciphertext),
        Algorithm::AesCcm16_64_128 => open::<Ccm16_64_128>(key, nonce, aad, ciphertext),
        Algorithm::AesCcm16_64_256 => open::<Ccm16_64_256>(key, nonce, aad, ciphertext),
        Algorithm::AesCcm64_64_128 => open::<Ccm64_64_128>(key, nonce, aad, ciphertext),
        Algorithm::AesCcm64_64_256 => open::<Ccm64_64_256>(key, nonce, aad, ciphertext),
        Algorithm::AesCcm16_128_128 => open::<Ccm16_128_128>(key, nonce, aad, ciphertext),
        Algorithm::AesCcm16_128_256 => open::<Ccm16_128_256>(key, nonce, aad, ciphertext),
        Algorithm::AesCcm64_128_128 => open::<Ccm64_128_128>(key, nonce, aad, ciphertext),
        Algorithm::AesCcm64_128_256 => open::<Ccm64_128_256>(key, nonce, aad, ciphertext),
        _ => Err(CoseError::InvalidAlgorithm(format!(
            "{} is not an AEAD",
            alg.info().name
        ))),
    }
}

fn check_sizes(alg: Algorithm, key: &[u8], nonce: &[u8]) -> Result<()> {
    let info = alg.info();
    if let Some(len) = info.key_len {
        if key.len() != len {
            return Err(CoseError::InvalidKey(format!(
                "{} requires a {len}-byte key, got {}",
                info.name,
                key.len()
            )));
        }
    }
    if let Some(len) = info.nonce_len {
        if nonce.len() != len {
            return Err(CoseError::InvalidHeader(format!(
                "{} requires a {len}-byte IV, got {}",
                info.name,
                nonce.len()
            )));
        }
    }
    Ok(())
}

// Nonce lengths are validated by check_sizes before from_slice is reached.
fn seal<C: Aead + KeyInit>(key: &[u8], nonce: &[u8], aad: &[u8], pt: &[u8]) -> Result<Vec<u8>> {
    let cipher =
        C::new_from_slice(key).map_err(|e| CoseError::CryptoBackend(format!("aead key: {e}")))?;
    cipher
        .encrypt(Nonce::<C>::from_slice(nonce), Payload { msg: pt, aad })
        .map_err(|e| CoseError::CryptoBackend(format!("aead encrypt: {e}")))
}

fn open<C: Aead + KeyInit>(key: &[u8], nonce: &[u8], aad: &[u8], ct: &[u8]) -> Result<Vec<u8>> {
    let cipher =
        C::new_from_slice(key).map_err(|e| CoseError::CryptoBackend(format!("aead key: {e}")))?;
    cipher
        .decrypt(Nonce::<C>::from_slice(nonce), Payload { msg: ct, aad })
        .map_err(|_| CoseError::DecryptionFailure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn a128gcm_nist_zero_vector() {
        // NIST GCM known answer: zero key, zero nonce, empty plaintext
        let ct = encrypt(Algorithm::A128Gcm, &[0u8; 16], &[0u8; 12], b"", b"").unwrap();
        assert_eq!(ct, hex!("58e2fccefa7e3061367f1d57a4e7455a"));
    }

    #[test]
    fn gcm_roundtrip_with_aad() {
        let key = [0x42u8; 32];
        let nonce = [0x24u8; 12];
        let ct = encrypt(Algorithm::A256Gcm, &key, &nonce, b"aad", b"payload").unwrap();
        assert_eq!(ct.len(), 7 + 16);
        let pt = decrypt(Algorithm::A256Gcm, &key, &nonce, b"aad", &ct).unwrap();
        assert_eq!(pt, b"payload");
    }

    #[test]
    fn ccm_roundtrip_short_nonce() {
        let key = [0x11u8; 16];
        let nonce = [0x22u8; 7];
        let ct = encrypt(Algorithm::AesCcm64_64_128, &key, &nonce, b"", b"content").unwrap();
        assert_eq!(ct.len(), 7 + 8);
        let pt = decrypt(Algorithm::AesCcm64_64_128, &key, &nonce, b"", &ct).unwrap();
        assert_eq!(pt, b"content");
    }

    #[test]
    fn chacha_roundtrip() {
        let key = [0x07u8; 32];
        let nonce = [0x09u8; 12];
        let ct = encrypt(Algorithm::ChaCha20Poly1305, &key, &nonce, b"x", b"hello").unwrap();
        let pt = decrypt(Algorithm::ChaCha20Poly1305, &key, &nonce, b"x", &ct).unwrap();
        assert_eq!(pt, b"hello");
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let key = [0x42u8; 16];
        let nonce = [0x24u8; 12];
        let mut ct = encrypt(Algorithm::A128Gcm, &key, &nonce, b"", b"payload").unwrap();
        ct[0] ^= 0x01;
        assert!(matches!(
            decrypt(Algorithm::A128Gcm, &key, &nonce, b"", &ct),
            Err(CoseError::DecryptionFailure)
        ));
    }

    #[test]
    fn wrong_aad_fails() {
        let key = [0x42u8; 16];
        let nonce = [0x24u8; 12];
        let ct = encrypt(Algorithm::A128Gcm, &key, &nonce, b"aad", b"payload").unwrap();
        assert!(decrypt(Algorithm::A128Gcm, &key, &nonce, b"other", &ct).is_err());
    }

    #[test]
    fn wrong_nonce_length_rejected() {
        let err = encrypt(Algorithm::A128Gcm, &[0u8; 16], &[0u8; 13], b"", b"").unwrap_err();
        assert!(matches!(err, CoseError::InvalidHeader(_)));
    }
}
