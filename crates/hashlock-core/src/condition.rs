//! Condition and Fulfillment values and their tagged DER codec
//!
//! The wire format is the crypto-conditions CHOICE structure: each of the five
//! condition kinds is selected by an implicit constructed context tag, and the
//! payload fields carry implicit primitive tags. The external verifier accepts
//! these bytes as-is, so the encoding must be byte-exact.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::der;
use crate::error::{HashlockError, Result};
use crate::types::Fingerprint;

/// The five known condition kinds, tagged by CHOICE branch id
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConditionType {
    PreimageSha256 = 0,
    PrefixSha256 = 1,
    ThresholdSha256 = 2,
    RsaSha256 = 3,
    Ed25519Sha256 = 4,
}

impl ConditionType {
    /// Resolve a CHOICE branch id, rejecting anything outside the five kinds
    pub fn from_id(id: u8) -> Result<Self> {
        match id {
            0 => Ok(Self::PreimageSha256),
            1 => Ok(Self::PrefixSha256),
            2 => Ok(Self::ThresholdSha256),
            3 => Ok(Self::RsaSha256),
            4 => Ok(Self::Ed25519Sha256),
            other => Err(HashlockError::UnknownType(other)),
        }
    }

    /// CHOICE branch id
    pub fn id(&self) -> u8 {
        *self as u8
    }

    /// Compound kinds carry a subtypes bit string in their condition payload
    pub fn is_compound(&self) -> bool {
        matches!(self, Self::PrefixSha256 | Self::ThresholdSha256)
    }

    /// Canonical type name
    pub fn name(&self) -> &'static str {
        match self {
            Self::PreimageSha256 => "preimage-sha-256",
            Self::PrefixSha256 => "prefix-sha-256",
            Self::ThresholdSha256 => "threshold-sha-256",
            Self::RsaSha256 => "rsa-sha-256",
            Self::Ed25519Sha256 => "ed25519-sha-256",
        }
    }
}

/// A public commitment to a fingerprint and a cost
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub condition_type: ConditionType,
    pub fingerprint: Fingerprint,
    pub cost: u64,
    /// Present condition types reachable below a compound condition; always
    /// empty for the simple kinds
    pub subtypes: BTreeSet<ConditionType>,
}

impl Condition {
    /// Build the PREIMAGE-SHA-256 condition committing to a preimage
    pub fn preimage_sha256(preimage: &[u8]) -> Self {
        Self {
            condition_type: ConditionType::PreimageSha256,
            fingerprint: Fingerprint::of_preimage(preimage),
            cost: preimage.len() as u64,
            subtypes: BTreeSet::new(),
        }
    }

    /// Encode into the tagged DER structure
    pub fn encode(&self) -> Vec<u8> {
        let mut payload = Vec::new();
        der::write_tlv(
            &mut payload,
            der::context_primitive(0),
            self.fingerprint.as_bytes(),
        );
        der::write_tlv(
            &mut payload,
            der::context_primitive(1),
            &der::integer_body(self.cost),
        );
        if self.condition_type.is_compound() {
            der::write_tlv(
                &mut payload,
                der::context_primitive(2),
                &subtype_bitstring(&self.subtypes),
            );
        }
        let mut out = Vec::new();
        der::write_tlv(
            &mut out,
            der::context_constructed(self.condition_type.id()),
            &payload,
        );
        out
    }

    /// Decode a single condition, rejecting trailing bytes
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = der::Reader::new(bytes);
        let (tag, payload) = reader.read_tlv()?;
        reader.expect_end()?;
        Self::decode_tlv(tag, payload)
    }

    pub(crate) fn decode_tlv(tag: u8, payload: &[u8]) -> Result<Self> {
        if tag & 0xE0 != 0xA0 {
            return Err(HashlockError::Decode(format!(
                "expected constructed context tag, found {tag:#04x}"
            )));
        }
        let condition_type = ConditionType::from_id(tag & 0x1F)?;

        let mut fields = der::Reader::new(payload);
        let fp = fields.read_expected(der::context_primitive(0))?;
        let fingerprint = Fingerprint::new(
            fp.try_into()
                .map_err(|_| HashlockError::Decode(format!("fingerprint must be 32 bytes, got {}", fp.len())))?,
        );
        let cost = der::parse_integer(fields.read_expected(der::context_primitive(1))?)?;
        let subtypes = if condition_type.is_compound() {
            parse_subtype_bitstring(fields.read_expected(der::context_primitive(2))?)?
        } else {
            BTreeSet::new()
        };
        fields.expect_end()?;

        Ok(Self {
            condition_type,
            fingerprint,
            cost,
            subtypes,
        })
    }

    /// Uppercase hex of the encoding; the externally published form
    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.encode())
    }

    /// Decode from a hex string (either case)
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes =
            hex::decode(s.trim()).map_err(|e| HashlockError::Decode(format!("condition hex: {e}")))?;
        Self::decode(&bytes)
    }
}

/// BIT STRING body for a subtype set: bit `7 - id % 8` of byte `id >> 3` per
/// present id, prefixed by the unused-bit count of the final byte.
fn subtype_bitstring(subtypes: &BTreeSet<ConditionType>) -> Vec<u8> {
    let max = match subtypes.iter().map(ConditionType::id).max() {
        Some(max) => max,
        None => return vec![0],
    };
    let mut bits = vec![0u8; (max >> 3) as usize + 1];
    for id in subtypes.iter().map(ConditionType::id) {
        bits[(id >> 3) as usize] |= 1 << (7 - id % 8);
    }
    let mut body = vec![7 - max % 8];
    body.extend(bits);
    body
}

fn parse_subtype_bitstring(body: &[u8]) -> Result<BTreeSet<ConditionType>> {
    let (unused, bits) = body
        .split_first()
        .ok_or_else(|| HashlockError::Decode("empty BIT STRING body".to_string()))?;
    if *unused > 7 || (bits.is_empty() && *unused != 0) {
        return Err(HashlockError::Decode(format!("invalid unused-bit count {unused}")));
    }
    let total_bits = bits.len() * 8 - *unused as usize;
    let mut subtypes = BTreeSet::new();
    let mut max_seen = None;
    for (byte_index, byte) in bits.iter().enumerate() {
        for bit in 0..8u8 {
            if byte & (1 << (7 - bit)) == 0 {
                continue;
            }
            let id = byte_index as u8 * 8 + bit;
            if id as usize >= total_bits {
                return Err(HashlockError::Decode("set bit in unused region".to_string()));
            }
            subtypes.insert(ConditionType::from_id(id)?);
            max_seen = Some(id);
        }
    }
    // DER demands the shortest encoding: the final declared bit must be set
    if let Some(max) = max_seen {
        if max as usize + 1 != total_bits {
            return Err(HashlockError::Decode("non-canonical BIT STRING padding".to_string()));
        }
    } else if total_bits != 0 {
        return Err(HashlockError::Decode("non-canonical BIT STRING padding".to_string()));
    }
    Ok(subtypes)
}

/// The secret side of a condition; prefix and threshold branches nest further
/// fulfillments, so the type is recursive through heap indirection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fulfillment {
    PreimageSha256 {
        preimage: Vec<u8>,
    },
    PrefixSha256 {
        prefix: Vec<u8>,
        max_message_length: u64,
        subfulfillment: Box<Fulfillment>,
    },
    ThresholdSha256 {
        subfulfillments: Vec<Fulfillment>,
        subconditions: Vec<Condition>,
    },
    RsaSha256 {
        modulus: Vec<u8>,
        signature: Vec<u8>,
    },
    Ed25519Sha256 {
        public_key: Vec<u8>,
        signature: Vec<u8>,
    },
}

impl Fulfillment {
    /// The condition kind this fulfillment satisfies
    pub fn condition_type(&self) -> ConditionType {
        match self {
            Self::PreimageSha256 { .. } => ConditionType::PreimageSha256,
            Self::PrefixSha256 { .. } => ConditionType::PrefixSha256,
            Self::ThresholdSha256 { .. } => ConditionType::ThresholdSha256,
            Self::RsaSha256 { .. } => ConditionType::RsaSha256,
            Self::Ed25519Sha256 { .. } => ConditionType::Ed25519Sha256,
        }
    }

    /// Encode into the tagged DER structure
    pub fn encode(&self) -> Vec<u8> {
        let mut payload = Vec::new();
        match self {
            Self::PreimageSha256 { preimage } => {
                der::write_tlv(&mut payload, der::context_primitive(0), preimage);
            }
            Self::PrefixSha256 {
                prefix,
                max_message_length,
                subfulfillment,
            } => {
                der::write_tlv(&mut payload, der::context_primitive(0), prefix);
                der::write_tlv(
                    &mut payload,
                    der::context_primitive(1),
                    &der::integer_body(*max_message_length),
                );
                // The nested CHOICE takes an explicit wrapper tag
                der::write_tlv(
                    &mut payload,
                    der::context_constructed(2),
                    &subfulfillment.encode(),
                );
            }
            Self::ThresholdSha256 {
                subfulfillments,
                subconditions,
            } => {
                let mut subf = Vec::new();
                for f in subfulfillments {
                    subf.extend(f.encode());
                }
                der::write_tlv(&mut payload, der::context_constructed(0), &subf);
                let mut subc = Vec::new();
                for c in subconditions {
                    subc.extend(c.encode());
                }
                der::write_tlv(&mut payload, der::context_constructed(1), &subc);
            }
            Self::RsaSha256 { modulus, signature } => {
                der::write_tlv(&mut payload, der::context_primitive(0), modulus);
                der::write_tlv(&mut payload, der::context_primitive(1), signature);
            }
            Self::Ed25519Sha256 {
                public_key,
                signature,
            } => {
                der::write_tlv(&mut payload, der::context_primitive(0), public_key);
                der::write_tlv(&mut payload, der::context_primitive(1), signature);
            }
        }
        let mut out = Vec::new();
        der::write_tlv(
            &mut out,
            der::context_constructed(self.condition_type().id()),
            &payload,
        );
        out
    }

    /// Decode a single fulfillment, rejecting trailing bytes
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = der::Reader::new(bytes);
        let (tag, payload) = reader.read_tlv()?;
        reader.expect_end()?;
        Self::decode_tlv(tag, payload)
    }

    fn decode_tlv(tag: u8, payload: &[u8]) -> Result<Self> {
        if tag & 0xE0 != 0xA0 {
            return Err(HashlockError::Decode(format!(
                "expected constructed context tag, found {tag:#04x}"
            )));
        }
        let condition_type = ConditionType::from_id(tag & 0x1F)?;
        let mut fields = der::Reader::new(payload);
        let value = match condition_type {
            ConditionType::PreimageSha256 => Self::PreimageSha256 {
                preimage: fields.read_expected(der::context_primitive(0))?.to_vec(),
            },
            ConditionType::PrefixSha256 => {
                let prefix = fields.read_expected(der::context_primitive(0))?.to_vec();
                let max_message_length =
                    der::parse_integer(fields.read_expected(der::context_primitive(1))?)?;
                let wrapper = fields.read_expected(der::context_constructed(2))?;
                let mut inner = der::Reader::new(wrapper);
                let (sub_tag, sub_payload) = inner.read_tlv()?;
                inner.expect_end()?;
                Self::PrefixSha256 {
                    prefix,
                    max_message_length,
                    subfulfillment: Box::new(Self::decode_tlv(sub_tag, sub_payload)?),
                }
            }
            ConditionType::ThresholdSha256 => {
                let mut subfulfillments = Vec::new();
                let mut subf = der::Reader::new(fields.read_expected(der::context_constructed(0))?);
                while !subf.is_empty() {
                    let (sub_tag, sub_payload) = subf.read_tlv()?;
                    subfulfillments.push(Self::decode_tlv(sub_tag, sub_payload)?);
                }
                let mut subconditions = Vec::new();
                let mut subc = der::Reader::new(fields.read_expected(der::context_constructed(1))?);
                while !subc.is_empty() {
                    let (sub_tag, sub_payload) = subc.read_tlv()?;
                    subconditions.push(Condition::decode_tlv(sub_tag, sub_payload)?);
                }
                Self::ThresholdSha256 {
                    subfulfillments,
                    subconditions,
                }
            }
            ConditionType::RsaSha256 => Self::RsaSha256 {
                modulus: fields.read_expected(der::context_primitive(0))?.to_vec(),
                signature: fields.read_expected(der::context_primitive(1))?.to_vec(),
            },
            ConditionType::Ed25519Sha256 => Self::Ed25519Sha256 {
                public_key: fields.read_expected(der::context_primitive(0))?.to_vec(),
                signature: fields.read_expected(der::context_primitive(1))?.to_vec(),
            },
        };
        fields.expect_end()?;
        Ok(value)
    }

    /// Uppercase hex of the encoding; the externally published form
    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.encode())
    }

    /// Decode from a hex string (either case)
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes =
            hex::decode(s.trim()).map_err(|e| HashlockError::Decode(format!("fulfillment hex: {e}")))?;
        Self::decode(&bytes)
    }
}
