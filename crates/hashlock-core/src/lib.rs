//! Hashlock Core - crypto-condition codec and password-derived preimages
//!
//! This crate protects conditional value-release operations with either a
//! random secret or a password-derived secret. It provides:
//!
//! - a byte-exact codec for the crypto-conditions DER CHOICE structure
//!   (conditions and fulfillments, PREIMAGE-SHA-256 being the kind this
//!   system actually produces);
//! - a derivation engine that turns a password, a per-subject pepper, and a
//!   bcrypt salt into a reproducible 32-byte preimage without ever persisting
//!   the derived value;
//! - a builder that ties the two together, self-checks its output, and
//!   estimates the ledger fee.

pub mod builder;
pub mod condition;
pub mod der;
pub mod error;
pub mod secret;
pub mod types;

pub use builder::{build, fee_drops, verify, verify_hex, BuildRequest, ConditionBundle, SaltMetadata};
pub use condition::{Condition, ConditionType, Fulfillment};
pub use error::{HashlockError, Result};
pub use secret::{
    random_preimage, DerivedSecret, SaltSource, DEFAULT_ROUNDS, MAX_ROUNDS, MIN_ROUNDS,
    PREIMAGE_LEN,
};
pub use types::{sha256, Fingerprint};
