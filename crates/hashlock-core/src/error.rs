//! Error types for the Hashlock library

use thiserror::Error;

pub type Result<T> = std::result::Result<T, HashlockError>;

#[derive(Error, Debug)]
pub enum HashlockError {
    #[error("Missing or empty required field: {0}")]
    MissingField(String),

    #[error("Internal invariant violated: {0}")]
    Internal(String),

    #[error("Unknown condition type id: {0}")]
    UnknownType(u8),

    #[error("Malformed encoding: {0}")]
    Decode(String),

    #[error("Invalid salt: {0}")]
    InvalidSalt(String),

    #[error("Invalid rounds: {0} (accepted range is 4..=31)")]
    InvalidRounds(u32),

    #[error("Password hash error: {0}")]
    PasswordHash(String),
}
