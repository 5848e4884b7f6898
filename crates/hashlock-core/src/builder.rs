//! Condition builder - the single external entry point
//!
//! Orchestrates the derivation engine and the codec: derives a preimage,
//! commits to it as a PREIMAGE-SHA-256 condition, and hands back the hex
//! strings the ledger workflow submits. The builder re-derives and compares
//! before returning on the reuse path; a wrong byte sequence here is a
//! security defect, never a warning.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::condition::{Condition, Fulfillment};
use crate::error::{HashlockError, Result};
use crate::secret::{self, SaltSource, DEFAULT_ROUNDS};

/// What to build a condition from
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// Password for deterministic derivation; None selects random mode
    pub password: Option<String>,
    /// Per-subject personalization string, typically an account identifier
    pub pepper: String,
    /// Salt origin for password mode
    pub salt_source: SaltSource,
    /// bcrypt cost factor; defaults to [`DEFAULT_ROUNDS`]
    pub rounds: Option<u32>,
}

impl BuildRequest {
    /// Random-secret request: no password, nothing to write down but the
    /// fulfillment itself
    pub fn random() -> Self {
        Self {
            password: None,
            pepper: String::new(),
            salt_source: SaltSource::Random,
            rounds: None,
        }
    }

    /// Password-derived request
    pub fn password(
        password: impl Into<String>,
        pepper: impl Into<String>,
        salt_source: SaltSource,
    ) -> Self {
        Self {
            password: Some(password.into()),
            pepper: pepper.into(),
            salt_source,
            rounds: None,
        }
    }

    pub fn with_rounds(mut self, rounds: u32) -> Self {
        self.rounds = Some(rounds);
        self
    }
}

/// Salt details the caller must record to regenerate a password secret
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaltMetadata {
    /// Formatted bcrypt salt string
    pub value: String,
    /// Cost factor embedded in the salt
    pub rounds: u32,
    /// True when the salt was freshly random rather than derived or reused
    pub is_random: bool,
}

/// Everything a caller needs to publish and later fulfill a condition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionBundle {
    /// Uppercase hex condition, the publicly published commitment
    pub condition_hex: String,
    /// Uppercase hex fulfillment, the secret that releases the value
    pub fulfillment_hex: String,
    /// The raw preimage as hex
    pub preimage_hex: String,
    /// Present only for password-derived secrets
    pub salt: Option<SaltMetadata>,
    /// True when the preimage came from system randomness
    pub is_random: bool,
    /// Ledger fee for submitting this fulfillment, in drops
    pub fee_drops: u64,
}

/// Build a condition and its fulfillment from a request
pub fn build(request: &BuildRequest) -> Result<ConditionBundle> {
    let rounds = request.rounds.unwrap_or(DEFAULT_ROUNDS);
    let secret = match &request.password {
        None => secret::random_preimage(),
        Some(password) => secret::derive(password, &request.pepper, &request.salt_source, rounds)?,
    };

    let condition = Condition::preimage_sha256(&secret.preimage);
    let condition_bytes = condition.encode();
    let fulfillment = Fulfillment::PreimageSha256 {
        preimage: secret.preimage.clone(),
    };
    let fulfillment_bytes = fulfillment.encode();

    // Reuse path: derive a second time and require byte-identical output
    if let (Some(password), SaltSource::Existing(_)) = (&request.password, &request.salt_source) {
        let recheck = secret::derive(password, &request.pepper, &request.salt_source, rounds)?;
        let recheck_bytes = Condition::preimage_sha256(&recheck.preimage).encode();
        if recheck_bytes != condition_bytes {
            return Err(HashlockError::Internal(
                "re-derived condition does not match the first derivation".to_string(),
            ));
        }
    }

    let fee_drops = fee_drops(secret.preimage.len());
    debug!(
        random = secret.is_random,
        preimage_len = secret.preimage.len(),
        fee_drops,
        "built crypto-condition"
    );

    Ok(ConditionBundle {
        condition_hex: hex::encode_upper(&condition_bytes),
        fulfillment_hex: hex::encode_upper(&fulfillment_bytes),
        preimage_hex: secret.preimage_hex(),
        salt: secret.salt.clone().map(|value| SaltMetadata {
            value,
            rounds: secret.rounds.unwrap_or(rounds),
            is_random: secret.is_salt_random,
        }),
        is_random: secret.is_random,
        fee_drops,
    })
}

/// Ledger fee in drops for fulfilling a condition: a 330-drop base plus 10
/// drops per started 16-byte block of preimage
pub fn fee_drops(preimage_len: usize) -> u64 {
    330 + 10 * (preimage_len as u64).div_ceil(16)
}

/// Check a candidate preimage against an externally published condition.
///
/// Comparison is case-insensitive and never errors, so a caller can walk a
/// list of candidate secrets.
pub fn verify(preimage: &[u8], condition_hex: &str) -> bool {
    Condition::preimage_sha256(preimage)
        .to_hex()
        .eq_ignore_ascii_case(condition_hex.trim())
}

/// Hex front-end for [`verify`], for verify-only callers holding a recorded
/// preimage string
pub fn verify_hex(preimage_hex: &str, condition_hex: &str) -> Result<bool> {
    let preimage = hex::decode(preimage_hex.trim())
        .map_err(|e| HashlockError::Decode(format!("preimage hex: {e}")))?;
    Ok(verify(&preimage, condition_hex))
}
