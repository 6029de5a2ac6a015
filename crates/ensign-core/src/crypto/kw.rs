//! Key wrap adapter: AES-KW (RFC 3394) and RSA-OAEP key transport.

use aes::{Aes128, Aes192, Aes256};
use aes_kw::Kek;
use rand::rngs::OsRng;
use rsa::Oaep;
use sha1::Sha1;
use sha2::{Sha256, Sha512};

use crate::algs::{Algorithm, HashAlg};
use crate::error::{CoseError, Result};
use crate::keys::CoseKey;

/// Wrap `cek` under a symmetric KEK with AES-KW.
pub fn wrap(alg: Algorithm, kek: &[u8], cek: &[u8]) -> Result<Vec<u8>> {
    if cek.len() % 8 != 0 || cek.len() < 16 {
        return Err(CoseError::InvalidKey(
            "AES-KW input must be a multiple of 8 bytes, at least 16".into(),
        ));
    }
    check_kek(alg, kek)?;
    let mut out = vec![0u8; cek.len() + 8];
    match alg {
        Algorithm::A128Kw => kek128(kek)?.wrap(cek, &mut out),
        Algorithm::A192Kw => kek192(kek)?.wrap(cek, &mut out),
        Algorithm::A256Kw => kek256(kek)?.wrap(cek, &mut out),
        _ => {
            return Err(CoseError::InvalidAlgorithm(format!(
                "{} is not a key wrap algorithm",
                alg.info().name
            )))
        }
    }
    .map_err(|e| CoseError::CryptoBackend(format!("key wrap: {e}")))?;
    Ok(out)
}

/// Unwrap an AES-KW blob. Integrity failure maps to `DecryptionFailure`.
pub fn unwrap(alg: Algorithm, kek: &[u8], wrapped: &[u8]) -> Result<Vec<u8>> {
    if wrapped.len() % 8 != 0 || wrapped.len() < 24 {
        return Err(CoseError::MalformedMessage("bad key wrap length".into()));
    }
    check_kek(alg, kek)?;
    let mut out = vec![0u8; wrapped.len() - 8];
    match alg {
        Algorithm::A128Kw => kek128(kek)?.unwrap(wrapped, &mut out),
        Algorithm::A192Kw => kek192(kek)?.unwrap(wrapped, &mut out),
        Algorithm::A256Kw => kek256(kek)?.unwrap(wrapped, &mut out),
        _ => {
            return Err(CoseError::InvalidAlgorithm(format!(
                "{} is not a key wrap algorithm",
                alg.info().name
            )))
        }
    }
    .map_err(|_| CoseError::DecryptionFailure)?;
    Ok(out)
}

fn check_kek(alg: Algorithm, kek: &[u8]) -> Result<()> {
    let info = alg.info();
    if let Some(len) = info.key_len {
        if kek.len() != len {
            return Err(CoseError::InvalidKey(format!(
                "{} requires a {len}-byte KEK, got {}",
                info.name,
                kek.len()
            )));
        }
    }
    Ok(())
}

macro_rules! kek_fn {
    ($name:ident, $cipher:ty) => {
        fn $name(key: &[u8]) -> Result<Kek<$cipher>> {
            Kek::<$cipher>::try_from(key)
                .map_err(|e| CoseError::CryptoBackend(format!("kek: {e}")))
        }
    };
}

kek_fn!(kek128, Aes128);
kek_fn!(kek192, Aes192);
kek_fn!(kek256, Aes256);

/// Encrypt a CEK to an RSA public key with OAEP.
pub fn rsa_oaep_wrap(alg: Algorithm, key: &CoseKey, cek: &[u8]) -> Result<Vec<u8>> {
    let pk = super::sign::rsa_public_key(key)?;
    pk.encrypt(&mut OsRng, oaep_padding(alg)?, cek)
        .map_err(|e| CoseError::CryptoBackend(format!("oaep: {e}")))
}

/// Decrypt an OAEP-encrypted CEK with an RSA private key.
pub fn rsa_oaep_unwrap(alg: Algorithm, key: &CoseKey, wrapped: &[u8]) -> Result<Vec<u8>> {
    let sk = super::sign::rsa_private_key(key)?;
    sk.decrypt(oaep_padding(alg)?, wrapped)
        .map_err(|_| CoseError::DecryptionFailure)
}

fn oaep_padding(alg: Algorithm) -> Result<Oaep> {
    Ok(match alg.info().hash {
        Some(HashAlg::Sha1) => Oaep::new::<Sha1>(),
        Some(HashAlg::Sha256) => Oaep::new::<Sha256>(),
        Some(HashAlg::Sha512) => Oaep::new::<Sha512>(),
        _ => {
            return Err(CoseError::InvalidAlgorithm(format!(
                "{} is not an RSA-OAEP algorithm",
                alg.info().name
            )))
        }
    })
}
