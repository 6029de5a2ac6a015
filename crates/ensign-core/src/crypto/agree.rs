//! ECDH adapter: P-256/384/521 and X25519 key agreement, plus ephemeral
//! key pair generation for the ES variants.
//!
//! X448 keys are accepted by the key model but have no backend here;
//! agreement with them fails with `CryptoBackend`.

use p256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use rand::rngs::OsRng;

use crate::error::{CoseError, Result};
use crate::keys::{CoseKey, Curve, KeyParams, SecretBytes};

/// Compute the raw ECDH shared secret between a private and a public key.
///
/// Both keys must live on the same curve.
pub fn agree(private: &CoseKey, public: &CoseKey) -> Result<SecretBytes> {
    match (&private.params, &public.params) {
        (
            KeyParams::Ec2 { crv: ca, d: Some(d), .. },
            KeyParams::Ec2 { crv: cb, x, y, .. },
        ) => {
            if ca != cb {
                return Err(CoseError::InvalidKey(format!(
                    "curve mismatch: {ca:?} vs {cb:?}"
                )));
            }
            match ca {
                Curve::P256 => p256_agree(d.as_slice(), x, y),
                Curve::P384 => p384_agree(d.as_slice(), x, y),
                Curve::P521 => p521_agree(d.as_slice(), x, y),
                other => Err(CoseError::CryptoBackend(format!(
                    "no ECDH backend for {other:?}"
                ))),
            }
        }
        (
            KeyParams::Okp { crv: Curve::X25519, d: Some(d), .. },
            KeyParams::Okp { crv: Curve::X25519, x, .. },
        ) => x25519_agree(d.as_slice(), x),
        (KeyParams::Okp { crv, d: Some(_), .. }, KeyParams::Okp { .. }) => Err(
            CoseError::CryptoBackend(format!("no ECDH backend for {crv:?}")),
        ),
        (KeyParams::Ec2 { d: None, .. }, _) | (KeyParams::Okp { d: None, .. }, _) => Err(
            CoseError::InvalidKey("private key required for key agreement".into()),
        ),
        _ => Err(CoseError::InvalidKey(
            "key agreement requires EC2 or X25519 keys of the same curve".into(),
        )),
    }
}

/// Generate an ephemeral key pair on the given curve.
pub fn generate_ephemeral(crv: Curve) -> Result<CoseKey> {
    match crv {
        Curve::P256 => p256_ephemeral(),
        Curve::P384 => p384_ephemeral(),
        Curve::P521 => p521_ephemeral(),
        Curve::X25519 => {
            let secret = x25519_dalek::StaticSecret::random_from_rng(OsRng);
            let public = x25519_dalek::PublicKey::from(&secret);
            CoseKey::okp_private(
                Curve::X25519,
                public.as_bytes().to_vec(),
                secret.to_bytes().to_vec(),
            )
        }
        other => Err(CoseError::CryptoBackend(format!(
            "no ephemeral key backend for {other:?}"
        ))),
    }
}

macro_rules! ecdh_pair {
    ($agree:ident, $ephemeral:ident, $curve:ident, $crv:expr) => {
        fn $agree(d: &[u8], x: &[u8], y: &[u8]) -> Result<SecretBytes> {
            let sk = $curve::SecretKey::from_slice(d)
                .map_err(|e| CoseError::CryptoBackend(e.to_string()))?;
            let point = $curve::EncodedPoint::from_affine_coordinates(
                $curve::FieldBytes::from_slice(x),
                $curve::FieldBytes::from_slice(y),
                false,
            );
            let pk = Option::<$curve::PublicKey>::from($curve::PublicKey::from_encoded_point(
                &point,
            ))
            .ok_or_else(|| CoseError::InvalidKey("point is not on the curve".into()))?;
            let shared = $curve::ecdh::diffie_hellman(sk.to_nonzero_scalar(), pk.as_affine());
            Ok(SecretBytes::new(shared.raw_secret_bytes().to_vec()))
        }

        fn $ephemeral() -> Result<CoseKey> {
            let sk = $curve::SecretKey::random(&mut OsRng);
            let point = sk.public_key().to_encoded_point(false);
            let (x, y) = match (point.x(), point.y()) {
                (Some(x), Some(y)) => (x, y),
                _ => return Err(CoseError::CryptoBackend("degenerate public point".into())),
            };
            CoseKey::ec2_private($crv, x.to_vec(), y.to_vec(), sk.to_bytes().to_vec())
        }
    };
}

ecdh_pair!(p256_agree, p256_ephemeral, p256, Curve::P256);
ecdh_pair!(p384_agree, p384_ephemeral, p384, Curve::P384);
ecdh_pair!(p521_agree, p521_ephemeral, p521, Curve::P521);

fn x25519_agree(d: &[u8], x: &[u8]) -> Result<SecretBytes> {
    let d: [u8; 32] = d
        .try_into()
        .map_err(|_| CoseError::InvalidKeyFormat("X25519 private key must be 32 bytes".into()))?;
    let x: [u8; 32] = x
        .try_into()
        .map_err(|_| CoseError::InvalidKeyFormat("X25519 public key must be 32 bytes".into()))?;
    let secret = x25519_dalek::StaticSecret::from(d);
    let shared = secret.diffie_hellman(&x25519_dalek::PublicKey::from(x));
    Ok(SecretBytes::new(shared.as_bytes().to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn p256_two_party_agreement() {
        let alice = generate_ephemeral(Curve::P256).unwrap();
        let bob = generate_ephemeral(Curve::P256).unwrap();

        let ab = agree(&alice, &bob).unwrap();
        let ba = agree(&bob, &alice).unwrap();
        assert_eq!(ab.as_slice(), ba.as_slice());
        assert_eq!(ab.len(), 32);
    }

    #[test]
    fn p521_two_party_agreement() {
        let alice = generate_ephemeral(Curve::P521).unwrap();
        let bob = generate_ephemeral(Curve::P521).unwrap();
        assert_eq!(
            agree(&alice, &bob).unwrap().as_slice(),
            agree(&bob, &alice).unwrap().as_slice()
        );
    }

    #[test]
    fn x25519_rfc7748_vector() {
        let alice_d =
            hex!("77076d0a7318a57d3c16c17251b26645df4c2f87ebc0992ab177fba51db92c2a");
        let bob_x =
            hex!("de9edb7d7b7dc1b4d35b61c2ece435373f8343c85b78674dadfc7e146f882b4f");
        let alice = CoseKey::okp_private(
            Curve::X25519,
            // public part is unused when alice is the private side
            hex!("8520f0098930a754748b7ddcb43ef75a0dbf3a0d26381af4eba4a98eaa9b4e6a").to_vec(),
            alice_d.to_vec(),
        )
        .unwrap();
        let bob = CoseKey::okp(Curve::X25519, bob_x.to_vec()).unwrap();

        let shared = agree(&alice, &bob).unwrap();
        assert_eq!(
            shared.as_slice(),
            hex!("4a5d9d5ba4ce2de1728e3bf480350f25e07e21c947d19e3376f09b3c1e161742")
        );
    }

    #[test]
    fn curve_mismatch_rejected() {
        let a = generate_ephemeral(Curve::P256).unwrap();
        let b = generate_ephemeral(Curve::P384).unwrap();
        assert!(matches!(agree(&a, &b), Err(CoseError::InvalidKey(_))));
    }

    #[test]
    fn public_only_private_side_rejected() {
        let a = generate_ephemeral(Curve::P256).unwrap();
        let (crv, x, y, _) = a.ec2_params().unwrap();
        let public = CoseKey::ec2(crv, x.to_vec(), y.to_vec()).unwrap();
        let b = generate_ephemeral(Curve::P256).unwrap();
        assert!(matches!(agree(&public, &b), Err(CoseError::InvalidKey(_))));
    }
}
