//! HKDF adapter (RFC 5869).

use hkdf::Hkdf;
use sha2::{Sha256, Sha384, Sha512};

use crate::algs::HashAlg;
use crate::error::{CoseError, Result};

/// Derive `length` bytes of key material.
///
/// An absent salt behaves as the RFC's all-zero default.
pub fn derive(
    hash: HashAlg,
    ikm: &[u8],
    salt: Option<&[u8]>,
    info: &[u8],
    length: usize,
) -> Result<Vec<u8>> {
    let mut okm = vec![0u8; length];
    let expand = match hash {
        HashAlg::Sha256 => Hkdf::<Sha256>::new(salt, ikm).expand(info, &mut okm),
        HashAlg::Sha384 => Hkdf::<Sha384>::new(salt, ikm).expand(info, &mut okm),
        HashAlg::Sha512 => Hkdf::<Sha512>::new(salt, ikm).expand(info, &mut okm),
        HashAlg::Sha1 => {
            return Err(CoseError::InvalidAlgorithm("HKDF with SHA-1".into()))
        }
    };
    expand.map_err(|e| CoseError::CryptoBackend(format!("hkdf: {e}")))?;
    Ok(okm)
}
