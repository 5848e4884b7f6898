//! Minimal DER primitives for the crypto-conditions wire format
//!
//! Only what the tagged CHOICE structures need: definite lengths (long form
//! above 127), implicit context tags, and unsigned INTEGER bodies. This is
//! deliberately not a general-purpose ASN.1 library.

use crate::error::{HashlockError, Result};

/// Implicit context tag, primitive encoding (`[n] IMPLICIT`)
pub const fn context_primitive(n: u8) -> u8 {
    0x80 | n
}

/// Implicit context tag, constructed encoding (`[n] IMPLICIT SEQUENCE`)
pub const fn context_constructed(n: u8) -> u8 {
    0xA0 | n
}

/// Append a tag-length-value triple
pub fn write_tlv(out: &mut Vec<u8>, tag: u8, body: &[u8]) {
    out.push(tag);
    write_len(out, body.len());
    out.extend_from_slice(body);
}

fn write_len(out: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        out.push(len as u8);
        return;
    }
    let mut digits = Vec::new();
    let mut v = len;
    while v > 0 {
        digits.push((v & 0xFF) as u8);
        v >>= 8;
    }
    digits.reverse();
    out.push(0x80 | digits.len() as u8);
    out.extend_from_slice(&digits);
}

/// DER INTEGER body for an unsigned value: minimal big-endian digits, with a
/// leading zero byte when the high bit would otherwise read as a sign bit.
pub fn integer_body(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count().min(7);
    let mut body = bytes[skip..].to_vec();
    if body[0] & 0x80 != 0 {
        body.insert(0, 0);
    }
    body
}

/// Parse a DER INTEGER body back into an unsigned value
pub fn parse_integer(body: &[u8]) -> Result<u64> {
    if body.is_empty() {
        return Err(HashlockError::Decode("empty INTEGER body".to_string()));
    }
    if body[0] & 0x80 != 0 {
        return Err(HashlockError::Decode("negative INTEGER".to_string()));
    }
    if body.len() > 1 && body[0] == 0 && body[1] & 0x80 == 0 {
        return Err(HashlockError::Decode("non-minimal INTEGER".to_string()));
    }
    let digits = if body[0] == 0 { &body[1..] } else { body };
    if digits.len() > 8 {
        return Err(HashlockError::Decode("INTEGER exceeds 64 bits".to_string()));
    }
    Ok(digits.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}

/// Cursor over a DER byte sequence
pub struct Reader<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    /// Read the next tag-length-value triple
    pub fn read_tlv(&mut self) -> Result<(u8, &'a [u8])> {
        let tag = self.take(1)?[0];
        let first = self.take(1)?[0];
        let len = if first < 0x80 {
            first as usize
        } else {
            let digits = (first & 0x7F) as usize;
            if digits == 0 || digits > core::mem::size_of::<usize>() {
                return Err(HashlockError::Decode(format!("unsupported length form: {first:#04x}")));
            }
            let bytes = self.take(digits)?;
            if bytes[0] == 0 {
                return Err(HashlockError::Decode("non-minimal length".to_string()));
            }
            let len = bytes.iter().fold(0usize, |acc, b| (acc << 8) | *b as usize);
            if len < 0x80 {
                return Err(HashlockError::Decode("non-minimal length".to_string()));
            }
            len
        };
        let body = self.take(len)?;
        Ok((tag, body))
    }

    /// Read a TLV and require a specific tag
    pub fn read_expected(&mut self, expected: u8) -> Result<&'a [u8]> {
        let (tag, body) = self.read_tlv()?;
        if tag != expected {
            return Err(HashlockError::Decode(format!(
                "expected tag {expected:#04x}, found {tag:#04x}"
            )));
        }
        Ok(body)
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Reject trailing bytes after the last expected value
    pub fn expect_end(&self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(HashlockError::Decode(format!(
                "{} trailing bytes after value",
                self.input.len() - self.pos
            )))
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.input.len() - self.pos < n {
            return Err(HashlockError::Decode("truncated input".to_string()));
        }
        let out = &self.input[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_form_length() {
        let mut out = Vec::new();
        write_tlv(&mut out, 0x80, &[0xAA; 3]);
        assert_eq!(out, vec![0x80, 0x03, 0xAA, 0xAA, 0xAA]);
    }

    #[test]
    fn test_long_form_length() {
        let mut out = Vec::new();
        write_tlv(&mut out, 0x80, &[0u8; 300]);
        assert_eq!(&out[..4], &[0x80, 0x82, 0x01, 0x2C]);
        assert_eq!(out.len(), 4 + 300);
    }

    #[test]
    fn test_length_boundary() {
        let mut short = Vec::new();
        write_tlv(&mut short, 0x04, &[0u8; 127]);
        assert_eq!(&short[..2], &[0x04, 0x7F]);

        let mut long = Vec::new();
        write_tlv(&mut long, 0x04, &[0u8; 128]);
        assert_eq!(&long[..3], &[0x04, 0x81, 0x80]);
    }

    #[test]
    fn test_integer_body_vectors() {
        assert_eq!(integer_body(0), vec![0x00]);
        assert_eq!(integer_body(127), vec![0x7F]);
        assert_eq!(integer_body(128), vec![0x00, 0x80]);
        assert_eq!(integer_body(256), vec![0x01, 0x00]);
        let mut max = vec![0x00];
        max.extend([0xFF; 8]);
        assert_eq!(integer_body(u64::MAX), max);
    }

    #[test]
    fn test_integer_roundtrip() {
        for v in [0u64, 1, 16, 32, 127, 128, 255, 256, 65535, 1 << 40, u64::MAX] {
            assert_eq!(parse_integer(&integer_body(v)).unwrap(), v);
        }
    }

    #[test]
    fn test_integer_rejects_non_minimal() {
        assert!(parse_integer(&[0x00, 0x01]).is_err());
        assert!(parse_integer(&[]).is_err());
        assert!(parse_integer(&[0x80]).is_err());
    }

    #[test]
    fn test_reader_roundtrip() {
        let mut out = Vec::new();
        write_tlv(&mut out, 0xA0, b"hello");
        let mut reader = Reader::new(&out);
        let (tag, body) = reader.read_tlv().unwrap();
        assert_eq!(tag, 0xA0);
        assert_eq!(body, b"hello");
        assert!(reader.expect_end().is_ok());
    }

    #[test]
    fn test_reader_rejects_truncation_and_garbage() {
        let mut out = Vec::new();
        write_tlv(&mut out, 0x80, &[1, 2, 3]);

        let mut truncated = Reader::new(&out[..3]);
        assert!(truncated.read_tlv().is_err());

        out.push(0xFF);
        let mut trailing = Reader::new(&out);
        trailing.read_tlv().unwrap();
        assert!(trailing.expect_end().is_err());
    }
}
