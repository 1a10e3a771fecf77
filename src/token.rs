//! Canonical tokens and their masked, per-response encodings.
//!
//! A [`CanonicalToken`] is the durable secret stored in the cookie. It is never
//! sent in a response body. Instead every response carries a fresh
//! [`MaskedToken`]: a random one-time pad followed by the pad xor-ed with the
//! canonical token. The bytes differ on every emission, which defeats
//! [BREACH](http://breachattack.com/) style compression oracles, yet all of
//! them unmask to the same canonical token.
use crate::error::{Error, Result};
use crate::rng;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length in bytes of a canonical token.
pub const TOKEN_LEN: usize = 32;
/// Length in bytes of a masked token: the pad followed by the xor-ed token.
pub const MASKED_LEN: usize = TOKEN_LEN * 2;

const ENCODED_LEN: usize = 43;
const MASKED_ENCODED_LEN: usize = 86;

#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct CanonicalToken {
    data: [u8; TOKEN_LEN],
}

impl CanonicalToken {
    /// Draws a new token from the operating system generator.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EntropySource`] if no randomness is available.
    pub fn generate() -> Result<Self> {
        let mut t = Self {
            data: [0; TOKEN_LEN],
        };
        rng::fill(&mut t.data)?;
        Ok(t)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let data = <[u8; TOKEN_LEN]>::try_from(bytes).map_err(|_| Error::MalformedToken)?;
        Ok(Self { data })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Produces a new masked token using a fresh one-time pad.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EntropySource`] if the pad cannot be generated.
    pub fn mask(&self) -> Result<MaskedToken> {
        let mut t = MaskedToken {
            pad: [0; TOKEN_LEN],
            masked: [0; TOKEN_LEN],
        };
        rng::fill(&mut t.pad)?;
        xor_into(&t.pad, &self.data, &mut t.masked);
        Ok(t)
    }

    /// Checks that `token` unmasks to this token, in constant time.
    pub fn verify(&self, token: &MaskedToken) -> Result<()> {
        let expected = token.unmask();
        if *self == expected {
            Ok(())
        } else {
            Err(Error::TokenMismatch)
        }
    }
}

impl PartialEq for CanonicalToken {
    fn eq(&self, other: &Self) -> bool {
        self.data.ct_eq(&other.data).into()
    }
}

impl Eq for CanonicalToken {}

impl fmt::Debug for CanonicalToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CanonicalToken(..)")
    }
}

impl fmt::Display for CanonicalToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&URL_SAFE_NO_PAD.encode(self.data))
    }
}

impl TryFrom<&str> for CanonicalToken {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        if value.len() != ENCODED_LEN {
            return Err(Error::MalformedToken);
        }
        let bytes = URL_SAFE_NO_PAD
            .decode(value)
            .map_err(|_| Error::MalformedToken)?;
        Self::from_bytes(&bytes)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaskedToken {
    pad: [u8; TOKEN_LEN],
    masked: [u8; TOKEN_LEN],
}

impl MaskedToken {
    /// Splits raw bytes into pad and xor-ed token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedToken`] unless `bytes` is exactly
    /// [`MASKED_LEN`] long.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != MASKED_LEN {
            return Err(Error::MalformedToken);
        }
        let (pad, masked) = bytes.split_at(TOKEN_LEN);
        let mut t = Self {
            pad: [0; TOKEN_LEN],
            masked: [0; TOKEN_LEN],
        };
        t.pad.copy_from_slice(pad);
        t.masked.copy_from_slice(masked);
        Ok(t)
    }

    pub fn to_bytes(&self) -> [u8; MASKED_LEN] {
        let mut out = [0; MASKED_LEN];
        out[..TOKEN_LEN].copy_from_slice(&self.pad);
        out[TOKEN_LEN..].copy_from_slice(&self.masked);
        out
    }

    /// Recovers the canonical token this was masked from.
    pub fn unmask(&self) -> CanonicalToken {
        let mut t = CanonicalToken {
            data: [0; TOKEN_LEN],
        };
        xor_into(&self.pad, &self.masked, &mut t.data);
        t
    }
}

impl fmt::Display for MaskedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&URL_SAFE_NO_PAD.encode(self.to_bytes()))
    }
}

impl TryFrom<&str> for MaskedToken {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        if value.len() != MASKED_ENCODED_LEN {
            return Err(Error::MalformedToken);
        }
        let bytes = URL_SAFE_NO_PAD
            .decode(value)
            .map_err(|_| Error::MalformedToken)?;
        Self::from_bytes(&bytes)
    }
}

/// Decodes a transported masked token back to its canonical form.
///
/// # Errors
///
/// Returns [`Error::MalformedToken`] if `value` is not a well formed encoding
/// of exactly [`MASKED_LEN`] bytes.
pub fn unmask(value: &str) -> Result<CanonicalToken> {
    MaskedToken::try_from(value).map(|t| t.unmask())
}

fn xor_into(a: &[u8], b: &[u8], into: &mut [u8]) {
    let l = a.len();
    debug_assert_eq!(b.len(), l);
    debug_assert_eq!(into.len(), l);
    a.iter()
        .zip(b.iter())
        .enumerate()
        .for_each(|(index, (a, b))| into[index] = a ^ b)
}
