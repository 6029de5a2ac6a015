//! # ensign-core
//!
//! Pure COSE primitives: deterministic CBOR, the algorithm registry, the
//! key model, and narrow adapters over the cryptographic backends.
//!
//! This crate contains no I/O and no message logic. It is pure computation
//! over CBOR values and key material.
//!
//! ## Key Types
//!
//! - [`Algorithm`] - IANA-registered algorithm identifiers and descriptors
//! - [`CoseKey`] - Typed key variants (Symmetric, EC2, OKP, RSA)
//! - [`CoseError`] - The error taxonomy shared by the whole workspace
//!
//! ## Canonicalization
//!
//! All CBOR emitted here and by the message layer is deterministic
//! (RFC 8949 core deterministic encoding). See [`canonical`].

pub mod algs;
pub mod canonical;
pub mod crypto;
pub mod error;
pub mod keys;

pub use algs::{AlgInfo, AlgKind, Algorithm, HashAlg};
pub use error::{CoseError, Result};
pub use keys::{CoseKey, Curve, KeyOp, KeyParams, KeyType, SecretBytes};
