//! MAC adapter: HMAC (SHA-2 family) and AES-CBC-MAC.
//!
//! Tags are truncated to the algorithm's registered length. Verification
//! always compares in constant time.

use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use aes::{Aes128, Aes256};
use hmac::{Hmac, Mac as _};
use sha2::{Sha256, Sha384, Sha512};
use subtle::ConstantTimeEq;

use crate::algs::Algorithm;
use crate::error::{CoseError, Result};

/// Compute the MAC tag for `msg`, truncated per the algorithm descriptor.
pub fn tag(alg: Algorithm, key: &[u8], msg: &[u8]) -> Result<Vec<u8>> {
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
    let full = match alg {
        Algorithm::Hmac256_64 | Algorithm::Hmac256 => hmac_sha256(key, msg)?,
        Algorithm::Hmac384 => hmac_sha384(key, msg)?,
        Algorithm::Hmac512 => hmac_sha512(key, msg)?,
        Algorithm::AesMac128_64 | Algorithm::AesMac128_128 => cbc_mac::<Aes128>(key, msg)?,
        Algorithm::AesMac256_64 | Algorithm::AesMac256_128 => cbc_mac::<Aes256>(key, msg)?,
        _ => {
            return Err(CoseError::InvalidAlgorithm(format!(
                "{} is not a MAC",
                info.name
            )))
        }
    };
    let tag_len = info.tag_len.unwrap_or(full.len());
    Ok(full[..tag_len].to_vec())
}

/// Recompute and compare in constant time.
pub fn verify(alg: Algorithm, key: &[u8], msg: &[u8], expected: &[u8]) -> Result<bool> {
    let computed = tag(alg, key, msg)?;
    Ok(computed.ct_eq(expected).into())
}

macro_rules! hmac_fn {
    ($name:ident, $digest:ty) => {
        fn $name(key: &[u8], msg: &[u8]) -> Result<Vec<u8>> {
            let mut mac = <Hmac<$digest> as hmac::Mac>::new_from_slice(key)
                .map_err(|e| CoseError::CryptoBackend(format!("hmac key: {e}")))?;
            mac.update(msg);
            Ok(mac.finalize().into_bytes().to_vec())
        }
    };
}

hmac_fn!(hmac_sha256, Sha256);
hmac_fn!(hmac_sha384, Sha384);
hmac_fn!(hmac_sha512, Sha512);

// CBC-MAC with a zero IV and zero padding of the final block, per the
// COSE AES-MAC definition.
fn cbc_mac<C: BlockEncrypt + KeyInit>(key: &[u8], msg: &[u8]) -> Result<Vec<u8>> {
    let cipher = C::new_from_slice(key)
        .map_err(|e| CoseError::CryptoBackend(format!("cbc-mac key: {e}")))?;
    let mut state = [0u8; 16];
    let mut chunks = msg.chunks(16).peekable();
    if chunks.peek().is_none() {
        // empty message still MACs one zero block
        let mut block = GenericArray::clone_from_slice(&state);
        cipher.encrypt_block(&mut block);
        return Ok(block.to_vec());
    }
    for chunk in chunks {
        for (s, b) in state.iter_mut().zip(chunk) {
            *s ^= b;
        }
        let mut block = GenericArray::clone_from_slice(&state);
        cipher.encrypt_block(&mut block);
        state.copy_from_slice(&block);
    }
    Ok(state.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn hmac_sha256_rfc4231_case_1() {
        let key = [0x0b; 20];
        // HMAC keys in COSE are full-length; call the inner helper directly
        let out = hmac_sha256(&key, b"Hi There").unwrap();
        assert_eq!(
            out,
            hex!("b0344c61d8db38535ca8afceaf0bf12b881dc200c9833da726e9376c2e32cff7")
        );
    }

    #[test]
    fn hmac_256_64_truncates_to_8_bytes() {
        let key = [0xA5u8; 32];
        let t = tag(Algorithm::Hmac256_64, &key, b"This is the content.").unwrap();
        assert_eq!(t.len(), 8);
        let full = tag(Algorithm::Hmac256, &key, b"This is the content.").unwrap();
        assert_eq!(&full[..8], &t[..]);
    }

    #[test]
    fn hmac_verify_constant_time_paths() {
        let key = [0x33u8; 48];
        let t = tag(Algorithm::Hmac384, &key, b"data").unwrap();
        assert!(verify(Algorithm::Hmac384, &key, b"data", &t).unwrap());
        let mut bad = t.clone();
        bad[0] ^= 0xff;
        assert!(!verify(Algorithm::Hmac384, &key, b"data", &bad).unwrap());
        assert!(!verify(Algorithm::Hmac384, &key, b"other", &t).unwrap());
    }

    #[test]
    fn cbc_mac_zero_padding() {
        let key = [0x01u8; 16];
        // 16-byte message gets no padding block; shorter is zero padded
        let exact = tag(Algorithm::AesMac128_128, &key, &[0xAB; 16]).unwrap();
        let padded = tag(Algorithm::AesMac128_128, &key, &[0xAB; 16][..12]).unwrap();
        assert_eq!(exact.len(), 16);
        assert_ne!(exact, padded);

        let mut zero_padded = [0u8; 16];
        zero_padded[..12].copy_from_slice(&[0xAB; 12]);
        let explicit = tag(Algorithm::AesMac128_128, &key, &zero_padded).unwrap();
        assert_eq!(padded, explicit);
    }

    #[test]
    fn cbc_mac_truncated_variants() {
        let key = [0x02u8; 32];
        let short = tag(Algorithm::AesMac256_64, &key, b"message").unwrap();
        let long = tag(Algorithm::AesMac256_128, &key, b"message").unwrap();
        assert_eq!(short.len(), 8);
        assert_eq!(long.len(), 16);
        assert_eq!(&long[..8], &short[..]);
    }

    #[test]
    fn wrong_key_length_rejected() {
        assert!(matches!(
            tag(Algorithm::AesMac128_64, &[0u8; 24], b"x"),
            Err(CoseError::InvalidKey(_))
        ));
    }
}
