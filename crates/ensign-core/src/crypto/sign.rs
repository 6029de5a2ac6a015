//! Signature adapter: ECDSA (P-256/384/521, secp256k1), EdDSA (Ed25519),
//! RSA-PSS and RSA PKCS#1 v1.5.
//!
//! ECDSA signatures are the raw r || s concatenation COSE uses on the
//! wire. Ed448 keys are accepted by the key model but have no backend
//! here; operations on them fail with `CryptoBackend`.

use rand::rngs::OsRng;
use rsa::{BigUint, Pkcs1v15Sign, Pss, RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::algs::{Algorithm, HashAlg};
use crate::error::{CoseError, Result};
use crate::keys::{CoseKey, Curve, KeyParams};

/// Sign `msg` with the private key. Returns the wire-format signature.
pub fn sign(alg: Algorithm, key: &CoseKey, msg: &[u8]) -> Result<Vec<u8>> {
    match alg {
        Algorithm::ES256 => ecdsa_sign_p256(key, msg),
        Algorithm::ES384 => ecdsa_sign_p384(key, msg),
        Algorithm::ES512 => ecdsa_sign_p521(key, msg),
        Algorithm::ES256K => ecdsa_sign_k256(key, msg),
        Algorithm::EdDSA => eddsa_sign(key, msg),
        Algorithm::PS256 | Algorithm::PS384 | Algorithm::PS512 => rsa_pss_sign(alg, key, msg),
        Algorithm::RS1 | Algorithm::RS256 | Algorithm::RS384 | Algorithm::RS512 => {
            rsa_pkcs1_sign(alg, key, msg)
        }
        _ => Err(CoseError::InvalidAlgorithm(format!(
            "{} is not a signature algorithm",
            alg.info().name
        ))),
    }
}

/// Verify a wire-format signature. Returns `false` on mismatch.
pub fn verify(alg: Algorithm, key: &CoseKey, msg: &[u8], sig: &[u8]) -> Result<bool> {
    match alg {
        Algorithm::ES256 => ecdsa_verify_p256(key, msg, sig),
        Algorithm::ES384 => ecdsa_verify_p384(key, msg, sig),
        Algorithm::ES512 => ecdsa_verify_p521(key, msg, sig),
        Algorithm::ES256K => ecdsa_verify_k256(key, msg, sig),
        Algorithm::EdDSA => eddsa_verify(key, msg, sig),
        Algorithm::PS256 | Algorithm::PS384 | Algorithm::PS512 => rsa_pss_verify(alg, key, msg, sig),
        Algorithm::RS1 | Algorithm::RS256 | Algorithm::RS384 | Algorithm::RS512 => {
            rsa_pkcs1_verify(alg, key, msg, sig)
        }
        _ => Err(CoseError::InvalidAlgorithm(format!(
            "{} is not a signature algorithm",
            alg.info().name
        ))),
    }
}

fn backend<E: std::fmt::Display>(e: E) -> CoseError {
    CoseError::CryptoBackend(e.to_string())
}

macro_rules! ecdsa_pair {
    ($sign_name:ident, $verify_name:ident, $curve:path) => {
        fn $sign_name(key: &CoseKey, msg: &[u8]) -> Result<Vec<u8>> {
            use $curve as c;
            let (_, _, _, d) = key.ec2_params()?;
            let d = d.ok_or_else(|| CoseError::InvalidKey("private key required".into()))?;
            let sk = c::ecdsa::SigningKey::from_slice(d).map_err(backend)?;
            let sig: c::ecdsa::Signature = c::ecdsa::signature::Signer::sign(&sk, msg);
            Ok(sig.to_bytes().to_vec())
        }

        fn $verify_name(key: &CoseKey, msg: &[u8], sig: &[u8]) -> Result<bool> {
            use $curve as c;
            let (_, x, y, _) = key.ec2_params()?;
            let mut sec1 = Vec::with_capacity(1 + x.len() + y.len());
            sec1.push(0x04);
            sec1.extend_from_slice(x);
            sec1.extend_from_slice(y);
            let vk = c::ecdsa::VerifyingKey::from_sec1_bytes(&sec1).map_err(backend)?;
            let sig = match c::ecdsa::Signature::from_slice(sig) {
                Ok(sig) => sig,
                Err(_) => return Ok(false),
            };
            Ok(c::ecdsa::signature::Verifier::verify(&vk, msg, &sig).is_ok())
        }
    };
}

ecdsa_pair!(ecdsa_sign_p256, ecdsa_verify_p256, ::p256);
ecdsa_pair!(ecdsa_sign_p384, ecdsa_verify_p384, ::p384);
ecdsa_pair!(ecdsa_sign_p521, ecdsa_verify_p521, ::p521);
ecdsa_pair!(ecdsa_sign_k256, ecdsa_verify_k256, ::k256);

fn eddsa_sign(key: &CoseKey, msg: &[u8]) -> Result<Vec<u8>> {
    let (crv, _, d) = key.okp_params()?;
    if crv != Curve::Ed25519 {
        return Err(CoseError::CryptoBackend(format!(
            "no EdDSA backend for {crv:?}"
        )));
    }
    let d = d.ok_or_else(|| CoseError::InvalidKey("private key required".into()))?;
    let seed: [u8; 32] = d
        .try_into()
        .map_err(|_| CoseError::InvalidKeyFormat("Ed25519 private key must be 32 bytes".into()))?;
    let sk = ed25519_dalek::SigningKey::from_bytes(&seed);
    let sig = ed25519_dalek::Signer::sign(&sk, msg);
    Ok(sig.to_bytes().to_vec())
}

fn eddsa_verify(key: &CoseKey, msg: &[u8], sig: &[u8]) -> Result<bool> {
    let (crv, x, _) = key.okp_params()?;
    if crv != Curve::Ed25519 {
        return Err(CoseError::CryptoBackend(format!(
            "no EdDSA backend for {crv:?}"
        )));
    }
    let pk: [u8; 32] = x
        .try_into()
        .map_err(|_| CoseError::InvalidKeyFormat("Ed25519 public key must be 32 bytes".into()))?;
    let vk = ed25519_dalek::VerifyingKey::from_bytes(&pk).map_err(backend)?;
    let sig = match ed25519_dalek::Signature::from_slice(sig) {
        Ok(sig) => sig,
        Err(_) => return Ok(false),
    };
    Ok(ed25519_dalek::Verifier::verify(&vk, msg, &sig).is_ok())
}

fn digest_for(hash: HashAlg, msg: &[u8]) -> Vec<u8> {
    match hash {
        HashAlg::Sha1 => Sha1::digest(msg).to_vec(),
        HashAlg::Sha256 => Sha256::digest(msg).to_vec(),
        HashAlg::Sha384 => Sha384::digest(msg).to_vec(),
        HashAlg::Sha512 => Sha512::digest(msg).to_vec(),
    }
}

pub(crate) fn rsa_private_key(key: &CoseKey) -> Result<RsaPrivateKey> {
    match &key.params {
        KeyParams::Rsa { n, e, d, p, q, .. } => {
            let (d, p, q) = match (d, p, q) {
                (Some(d), Some(p), Some(q)) => (d, p, q),
                _ => {
                    return Err(CoseError::InvalidKey(
                        "RSA private operations require d, p, and q".into(),
                    ))
                }
            };
            RsaPrivateKey::from_components(
                BigUint::from_bytes_be(n),
                BigUint::from_bytes_be(e),
                BigUint::from_bytes_be(d.as_slice()),
                vec![
                    BigUint::from_bytes_be(p.as_slice()),
                    BigUint::from_bytes_be(q.as_slice()),
                ],
            )
            .map_err(backend)
        }
        _ => Err(CoseError::InvalidKey("RSA key required".into())),
    }
}

pub(crate) fn rsa_public_key(key: &CoseKey) -> Result<RsaPublicKey> {
    match &key.params {
        KeyParams::Rsa { n, e, .. } => {
            RsaPublicKey::new(BigUint::from_bytes_be(n), BigUint::from_bytes_be(e))
                .map_err(backend)
        }
        _ => Err(CoseError::InvalidKey("RSA key required".into())),
    }
}

fn pkcs1_scheme(hash: HashAlg) -> Result<Pkcs1v15Sign> {
    Ok(match hash {
        HashAlg::Sha1 => Pkcs1v15Sign::new::<Sha1>(),
        HashAlg::Sha256 => Pkcs1v15Sign::new::<Sha256>(),
        HashAlg::Sha384 => Pkcs1v15Sign::new::<Sha384>(),
        HashAlg::Sha512 => Pkcs1v15Sign::new::<Sha512>(),
    })
}

fn pss_scheme(hash: HashAlg) -> Result<Pss> {
    // salt length equals the hash length, per the COSE registrations
    Ok(match hash {
        HashAlg::Sha256 => Pss::new::<Sha256>(),
        HashAlg::Sha384 => Pss::new::<Sha384>(),
        HashAlg::Sha512 => Pss::new::<Sha512>(),
        HashAlg::Sha1 => {
            return Err(CoseError::InvalidAlgorithm("PSS with SHA-1".into()))
        }
    })
}

fn rsa_hash(alg: Algorithm) -> HashAlg {
    alg.info().hash.unwrap_or(HashAlg::Sha256)
}

fn rsa_pkcs1_sign(alg: Algorithm, key: &CoseKey, msg: &[u8]) -> Result<Vec<u8>> {
    let hash = rsa_hash(alg);
    let sk = rsa_private_key(key)?;
    sk.sign(pkcs1_scheme(hash)?, &digest_for(hash, msg))
        .map_err(backend)
}

fn rsa_pkcs1_verify(alg: Algorithm, key: &CoseKey, msg: &[u8], sig: &[u8]) -> Result<bool> {
    let hash = rsa_hash(alg);
    let pk = rsa_public_key(key)?;
    Ok(pk
        .verify(pkcs1_scheme(hash)?, &digest_for(hash, msg), sig)
        .is_ok())
}

fn rsa_pss_sign(alg: Algorithm, key: &CoseKey, msg: &[u8]) -> Result<Vec<u8>> {
    let hash = rsa_hash(alg);
    let sk = rsa_private_key(key)?;
    sk.sign_with_rng(&mut OsRng, pss_scheme(hash)?, &digest_for(hash, msg))
        .map_err(backend)
}

fn rsa_pss_verify(alg: Algorithm, key: &CoseKey, msg: &[u8], sig: &[u8]) -> Result<bool> {
    let hash = rsa_hash(alg);
    let pk = rsa_public_key(key)?;
    Ok(pk
        .verify(pss_scheme(hash)?, &digest_for(hash, msg), sig)
        .is_ok())
}
