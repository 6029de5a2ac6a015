//! # ensign-testkit
//!
//! Testing utilities for the ensign workspace.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: the RFC 8152 Appendix C key material as [`CoseKey`]s
//! - **Golden vectors**: known byte strings for the structure builders and
//!   the Appendix C.2.1 signed message
//! - **Generators**: proptest strategies for property-based testing
//!
//! ## Golden Vectors
//!
//! Golden vectors pin the deterministic encodings across releases:
//!
//! ```
//! use ensign_testkit::vectors;
//!
//! let sign1 = vectors::rfc8152_sign1_es256();
//! assert_eq!(sign1.message[0], 0xd2); // tag 18
//! ```
//!
//! [`CoseKey`]: ensign_core::keys::CoseKey

pub mod fixtures;
pub mod generators;
pub mod vectors;
