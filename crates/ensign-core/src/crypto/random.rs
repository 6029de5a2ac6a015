//! Random byte source.

use rand::RngCore;

use crate::error::{CoseError, Result};

/// Fill a buffer from the process CSPRNG. RNG failure is fatal.
pub fn fill(buf: &mut [u8]) -> Result<()> {
    rand::rngs::OsRng
        .try_fill_bytes(buf)
        .map_err(|e| CoseError::CryptoBackend(format!("rng: {e}")))
}

/// Fresh random bytes of the given length.
pub fn bytes(len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    fill(&mut buf)?;
    Ok(buf)
}
