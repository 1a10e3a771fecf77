use crate::config::MIN_KEY_LEN;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("malformed xsrf token")]
    MalformedToken,
    #[error("xsrf token mismatch")]
    TokenMismatch,
    #[error("entropy source failed: {0}")]
    EntropySource(#[from] rand::Error),
    #[error("signing key must be at least {} bytes", MIN_KEY_LEN)]
    KeyTooShort,
}

pub type Result<T> = std::result::Result<T, Error>;
