//! Cryptographically secure random bytes.
//!
//! Everything here draws from [`OsRng`], which asks the operating system for
//! every fill. It holds no state, so concurrent requests can share it freely.
//! A failing entropy source is reported as [`Error::EntropySource`]; nothing
//! falls back to a weaker generator.

use crate::error::{Error, Result};
use rand::{rngs::OsRng, RngCore};

/// Fills `buf` with random bytes.
pub(crate) fn fill(buf: &mut [u8]) -> Result<()> {
    OsRng.try_fill_bytes(buf).map_err(|err| {
        tracing::error!(error = %err, "entropy source failed");
        Error::EntropySource(err)
    })
}

/// Generates `len` random bytes.
///
/// # Errors
///
/// Returns [`Error::EntropySource`] if the operating system generator fails.
pub fn generate(len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0; len];
    fill(&mut buf)?;
    Ok(buf)
}
