//! Error types shared across the COSE engine.

use thiserror::Error;

/// Errors raised by key, algorithm, and message operations.
#[derive(Debug, Error)]
pub enum CoseError {
    /// Algorithm is missing, unknown, or unsupported for the operation.
    #[error("invalid algorithm: {0}")]
    InvalidAlgorithm(String),

    /// Key type, curve, or key_ops incompatible with the algorithm or operation.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Structural failure parsing a key (bad length, missing required field).
    #[error("invalid key format: {0}")]
    InvalidKeyFormat(String),

    /// Duplicate attribute across buckets, IV conflicts, or malformed header values.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// `crit` lists an attribute not present in the protected bucket or not understood.
    #[error("invalid critical value: {0}")]
    InvalidCriticalValue(String),

    /// Wrong CBOR shape, wrong array length for the variant, or wrong tag.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// Recipient `alg` does not resolve to a known CEK-establishment variant.
    #[error("unsupported recipient: {0}")]
    UnsupportedRecipient(String),

    /// AEAD tag mismatch during decryption.
    #[error("decryption failed")]
    DecryptionFailure,

    /// Bad signature or MAC.
    #[error("verification failed")]
    VerificationFailure,

    /// An underlying primitive returned an error, or the RNG failed.
    #[error("crypto backend: {0}")]
    CryptoBackend(String),

    /// Unknown attribute encountered while strict decoding is on.
    #[error("unknown attribute: {0}")]
    UnknownAttribute(String),
}

/// Result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, CoseError>;
