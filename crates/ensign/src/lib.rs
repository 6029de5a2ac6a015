//! # ensign
//!
//! CBOR Object Signing and Encryption (COSE, RFC 8152): the message
//! family, header buckets, and the recipient tree, over the primitives
//! and key model from [`ensign_core`].
//!
//! ## Message Types
//!
//! - [`CoseSign1`] / [`CoseSign`] - signed messages (tags 18 / 98)
//! - [`CoseMac0`] / [`CoseMac`] - MACed messages (tags 17 / 97)
//! - [`CoseEncrypt0`] / [`CoseEncrypt`] - encrypted messages (tags 16 / 96)
//!
//! ## Codec
//!
//! [`decode`] dispatches on the CBOR tag; [`decode_as`] handles untagged
//! input given an expected [`MessageKind`]. [`encode`] serializes with or
//! without the tag. All emission is deterministic CBOR, and the protected
//! bucket of a received message is reused byte-for-byte.
//!
//! ```
//! use ensign::{Algorithm, CoseSign1};
//! use ensign_core::keys::CoseKey;
//!
//! # fn demo(key: &CoseKey) -> ensign_core::Result<()> {
//! let mut msg = CoseSign1::new();
//! msg.protected.set_alg(Algorithm::ES256);
//! msg.payload = Some(b"This is the content.".to_vec());
//! msg.sign(key, b"")?;
//! let wire = msg.to_bytes(true)?;
//! # Ok(())
//! # }
//! ```

pub mod headers;
pub mod message;
pub mod recipient;
pub mod structure;

pub use ensign_core::{Algorithm, CoseError, CoseKey, Curve, KeyOp, KeyType, Result};

pub use headers::{HeaderMap, Label, ProtectedHeader};
pub use message::{
    decode, decode_as, decode_strict, encode, CoseEncrypt, CoseEncrypt0, CoseMac, CoseMac0,
    CoseMessage, CoseSign, CoseSign1, CoseSignature, MessageKind,
};
pub use recipient::{CoseRecipient, RecipientKind};
pub use structure::{EncContext, MacContext, PartyInfo, SigContext};
