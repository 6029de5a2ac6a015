//! Primitive adapters: narrow interfaces over the cryptographic backends.
//!
//! Each submodule wraps one primitive class. Backend errors are mapped to
//! `CoseError::CryptoBackend`; authentication failures map to
//! `DecryptionFailure`. No module here knows about messages or headers.

pub mod aead;
pub mod agree;
pub mod kdf;
pub mod kw;
pub mod mac;
pub mod random;
pub mod sign;
