//! Secret derivation engine
//!
//! Produces the preimage behind a condition either from system randomness or
//! deterministically from a password. The deterministic path composes
//! HMAC-SHA256 (keyed by the salt string) with bcrypt, and the preimage is the
//! trailing 32 bytes of bcrypt's textual output. That slicing rule looks odd
//! but is load-bearing: previously generated conditions can only be
//! regenerated by reproducing it bit-for-bit.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use bcrypt::Version;
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{HashlockError, Result};

/// Preimage length in bytes; also the minimum a fulfillment may carry
pub const PREIMAGE_LEN: usize = 32;

/// Default bcrypt cost factor
pub const DEFAULT_ROUNDS: u32 = 10;

/// Lowest cost factor bcrypt accepts
pub const MIN_ROUNDS: u32 = 4;

/// Highest cost factor bcrypt accepts
pub const MAX_ROUNDS: u32 = 31;

/// Fixed input hashed during the permanent-salt self-check
const SALT_PROBE: &[u8] = b"hashlock salt probe";

/// bcrypt's own base64 alphabet; not interchangeable with standard base64
const BCRYPT_ALPHABET: &[u8; 64] =
    b"./ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

type HmacSha256 = Hmac<Sha256>;

/// Where the bcrypt salt comes from in password mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaltSource {
    /// Fresh 16 random bytes; the salt must be written down to reproduce the
    /// secret later
    Random,
    /// Deterministic salt from SHA-256(password || pepper); the same password
    /// and pepper always regenerate the same secret
    Permanent,
    /// A previously issued salt string, for the reuse/verify path
    Existing(String),
}

/// Output of one derivation; preimage material is wiped on drop
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedSecret {
    /// The fulfillment preimage (32 bytes)
    pub preimage: Vec<u8>,
    /// Formatted bcrypt salt string; None in random mode
    pub salt: Option<String>,
    /// Cost factor used; None in random mode
    pub rounds: Option<u32>,
    /// True when the preimage came straight from system randomness
    pub is_random: bool,
    /// True when the salt was freshly random (as opposed to permanent or
    /// caller-supplied)
    pub is_salt_random: bool,
}

impl DerivedSecret {
    /// Preimage as hex
    pub fn preimage_hex(&self) -> String {
        hex::encode(&self.preimage)
    }
}

// Preimage and salt regenerate the secret; neither may leak through logs
impl std::fmt::Debug for DerivedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedSecret")
            .field("preimage", &"<redacted>")
            .field("salt", &self.salt.as_ref().map(|_| "<redacted>"))
            .field("rounds", &self.rounds)
            .field("is_random", &self.is_random)
            .field("is_salt_random", &self.is_salt_random)
            .finish()
    }
}

/// Draw a 32-byte preimage from system randomness
pub fn random_preimage() -> DerivedSecret {
    let mut preimage = vec![0u8; PREIMAGE_LEN];
    OsRng.fill_bytes(&mut preimage);
    DerivedSecret {
        preimage,
        salt: None,
        rounds: None,
        is_random: true,
        is_salt_random: false,
    }
}

/// Derive a preimage from a password
///
/// `rounds` applies when the salt is freshly generated; an existing salt
/// carries its own cost factor which takes precedence.
pub fn derive(
    password: &str,
    pepper: &str,
    salt_source: &SaltSource,
    rounds: u32,
) -> Result<DerivedSecret> {
    if password.is_empty() {
        return Err(HashlockError::MissingField("password".to_string()));
    }
    if !(MIN_ROUNDS..=MAX_ROUNDS).contains(&rounds) {
        return Err(HashlockError::InvalidRounds(rounds));
    }

    let (salt, is_salt_random) = match salt_source {
        SaltSource::Existing(text) => (ParsedSalt::parse(text)?, false),
        SaltSource::Permanent => (permanent_salt(password, pepper, rounds)?, false),
        SaltSource::Random => (ParsedSalt::random(rounds), true),
    };

    let mut mac = HmacSha256::new_from_slice(salt.text.as_bytes())
        .map_err(|e| HashlockError::Internal(format!("HMAC init: {e}")))?;
    mac.update(password.as_bytes());
    let mut prehash = BASE64_STANDARD.encode(mac.finalize().into_bytes());

    let full = bcrypt::hash_with_salt(prehash.as_bytes(), salt.rounds, salt.seed)
        .map_err(|e| HashlockError::PasswordHash(e.to_string()))?
        .format_for_version(salt.version.to_bcrypt());
    prehash.zeroize();

    if full.len() < PREIMAGE_LEN {
        return Err(HashlockError::Internal(format!(
            "derived hash too short: {} chars",
            full.len()
        )));
    }
    let preimage = full.as_bytes()[full.len() - PREIMAGE_LEN..].to_vec();

    Ok(DerivedSecret {
        preimage,
        salt: Some(salt.text.clone()),
        rounds: Some(salt.rounds),
        is_random: false,
        is_salt_random,
    })
}

/// Salt version marker, the `2x` between the leading dollar signs.
/// `bcrypt::Version` carries no Copy/Clone/Debug impls, so the marker is kept
/// in this local type and mapped at the hashing call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SaltVersion {
    TwoA,
    TwoB,
    TwoX,
    TwoY,
}

impl SaltVersion {
    fn to_bcrypt(self) -> Version {
        match self {
            Self::TwoA => Version::TwoA,
            Self::TwoB => Version::TwoB,
            Self::TwoX => Version::TwoX,
            Self::TwoY => Version::TwoY,
        }
    }
}

/// A bcrypt salt split into its working parts
#[derive(Debug, Clone)]
struct ParsedSalt {
    version: SaltVersion,
    rounds: u32,
    seed: [u8; 16],
    /// The formatted `$2a$NN$<22 chars>` string; also the HMAC key
    text: String,
}

impl ParsedSalt {
    fn random(rounds: u32) -> Self {
        let mut seed = [0u8; 16];
        OsRng.fill_bytes(&mut seed);
        Self::from_seed(seed, rounds)
    }

    fn from_seed(seed: [u8; 16], rounds: u32) -> Self {
        let text = format!("$2a${rounds:02}${}", bcrypt_b64_encode(&seed));
        Self {
            version: SaltVersion::TwoA,
            rounds,
            seed,
            text,
        }
    }

    /// Parse a `$2x$NN$<22 chars>` salt string; a full 60-char hash is
    /// accepted and truncated to its salt segment, as bcrypt itself does
    fn parse(text: &str) -> Result<Self> {
        if !text.is_ascii() {
            return Err(HashlockError::InvalidSalt("salt must be ASCII".to_string()));
        }
        let bytes = text.as_bytes();
        if bytes.len() < 29 {
            return Err(HashlockError::InvalidSalt(format!(
                "salt too short: {} chars",
                bytes.len()
            )));
        }
        if bytes[0] != b'$' || bytes[1] != b'2' || bytes[3] != b'$' || bytes[6] != b'$' {
            return Err(HashlockError::InvalidSalt("salt does not match $2x$NN$ layout".to_string()));
        }
        let version = match bytes[2] {
            b'a' => SaltVersion::TwoA,
            b'b' => SaltVersion::TwoB,
            b'x' => SaltVersion::TwoX,
            b'y' => SaltVersion::TwoY,
            other => {
                return Err(HashlockError::InvalidSalt(format!(
                    "unknown salt version marker: {}",
                    other as char
                )))
            }
        };
        let rounds: u32 = text[4..6]
            .parse()
            .map_err(|_| HashlockError::InvalidSalt(format!("bad cost factor: {}", &text[4..6])))?;
        if !(MIN_ROUNDS..=MAX_ROUNDS).contains(&rounds) {
            return Err(HashlockError::InvalidRounds(rounds));
        }
        let seed = bcrypt_b64_decode(&text[7..29])?;
        Ok(Self {
            version,
            rounds,
            seed,
            text: text[..29].to_string(),
        })
    }
}

/// Deterministic salt from password and pepper
///
/// The seed is the first 16 bytes of SHA-256(password || pepper); the pepper
/// keeps identical passwords on different subjects from colliding.
fn permanent_salt(password: &str, pepper: &str, rounds: u32) -> Result<ParsedSalt> {
    if pepper.is_empty() {
        return Err(HashlockError::MissingField("pepper".to_string()));
    }
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(pepper.as_bytes());
    let digest = hasher.finalize();
    let mut seed = [0u8; 16];
    seed.copy_from_slice(&digest[..16]);

    let salt = ParsedSalt::from_seed(seed, rounds);
    self_check(&salt)?;
    Ok(salt)
}

/// Hash a fixed probe with the salt and require the output to echo the salt
/// string exactly. Catches alphabet or padding mistakes in the salt encoding;
/// a failure is deterministic and must never be retried.
fn self_check(salt: &ParsedSalt) -> Result<()> {
    let echo = bcrypt::hash_with_salt(SALT_PROBE, salt.rounds, salt.seed)
        .map_err(|e| HashlockError::PasswordHash(e.to_string()))?
        .format_for_version(salt.version.to_bcrypt());
    if !echo.starts_with(&salt.text) {
        return Err(HashlockError::Internal(
            "derived salt failed self-check: hash does not echo the salt".to_string(),
        ));
    }
    Ok(())
}

/// Encode bytes with bcrypt's base64 alphabet, 3-byte groups into 4 symbols,
/// no padding characters
fn bcrypt_b64_encode(input: &[u8]) -> String {
    let mut out = String::with_capacity(input.len().div_ceil(3) * 4);
    let mut chunks = input.chunks_exact(3);
    for c in &mut chunks {
        out.push(BCRYPT_ALPHABET[(c[0] >> 2) as usize] as char);
        out.push(BCRYPT_ALPHABET[(((c[0] & 0x03) << 4) | (c[1] >> 4)) as usize] as char);
        out.push(BCRYPT_ALPHABET[(((c[1] & 0x0F) << 2) | (c[2] >> 6)) as usize] as char);
        out.push(BCRYPT_ALPHABET[(c[2] & 0x3F) as usize] as char);
    }
    match *chunks.remainder() {
        [b0] => {
            out.push(BCRYPT_ALPHABET[(b0 >> 2) as usize] as char);
            out.push(BCRYPT_ALPHABET[((b0 & 0x03) << 4) as usize] as char);
        }
        [b0, b1] => {
            out.push(BCRYPT_ALPHABET[(b0 >> 2) as usize] as char);
            out.push(BCRYPT_ALPHABET[(((b0 & 0x03) << 4) | (b1 >> 4)) as usize] as char);
            out.push(BCRYPT_ALPHABET[((b1 & 0x0F) << 2) as usize] as char);
        }
        _ => {}
    }
    out
}

/// Decode a 22-symbol bcrypt-base64 salt body into 16 bytes. Stray bits in
/// the final symbol are masked off, matching bcrypt's own decoder.
fn bcrypt_b64_decode(body: &str) -> Result<[u8; 16]> {
    if body.len() != 22 {
        return Err(HashlockError::InvalidSalt(format!(
            "salt body must be 22 chars, got {}",
            body.len()
        )));
    }
    let mut values = [0u8; 22];
    for (i, symbol) in body.bytes().enumerate() {
        values[i] = BCRYPT_ALPHABET
            .iter()
            .position(|a| *a == symbol)
            .ok_or_else(|| {
                HashlockError::InvalidSalt(format!("invalid salt character: {}", symbol as char))
            })? as u8;
    }

    let mut out = [0u8; 16];
    let mut pos = 0;
    for chunk in values.chunks(4) {
        match *chunk {
            [v0, v1, v2, v3] => {
                out[pos] = (v0 << 2) | (v1 >> 4);
                out[pos + 1] = (v1 << 4) | (v2 >> 2);
                out[pos + 2] = (v2 << 6) | v3;
                pos += 3;
            }
            [v0, v1] => {
                out[pos] = (v0 << 2) | (v1 >> 4);
                pos += 1;
            }
            _ => return Err(HashlockError::InvalidSalt("ragged salt body".to_string())),
        }
    }
    debug_assert_eq!(pos, 16);
    Ok(out)
}
