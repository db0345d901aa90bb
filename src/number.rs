//! Arbitrary-width integers carried as gate parameters.
//!
//! [`BlockNumber`] is the unit the block codec produces and consumes: a
//! non-negative integer stored as its big-endian magnitude.  It never holds
//! leading zero bytes, so two equal values always compare equal byte-for-byte.
//!
//! [`Parameter`] is what a host hands back when it reads a gate parameter.
//! Hosts that route parameters through floating or complex types deliver the
//! same integer in a different shape; [`Parameter::to_block_number`] turns any
//! of them back into an exact integer or fails.  Nothing is truncated.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    #[error("Parameter {0} is negative")]
    Negative(f64),
    #[error("Parameter {0} is not integral")]
    Fractional(f64),
    #[error("Parameter {0} is not finite")]
    NonFinite(f64),
    #[error("Complex parameter has non-zero imaginary part {0}")]
    Imaginary(f64),
    #[error("Cannot parse integer from {0:?}")]
    Parse(String),
}

// ── BlockNumber ──────────────────────────────────────────────────────────────

/// Non-negative integer of any width, big-endian, no leading zero bytes.
/// Zero is the empty magnitude.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BlockNumber {
    be: Vec<u8>,
}

impl BlockNumber {
    pub fn zero() -> Self {
        Self::default()
    }

    /// Interpret `bytes` as a big-endian integer.
    pub fn from_be_bytes(bytes: &[u8]) -> Self {
        let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
        Self { be: bytes[start..].to_vec() }
    }

    pub fn from_u64(value: u64) -> Self {
        Self::from_be_bytes(&value.to_be_bytes())
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.be.is_empty()
    }

    /// Minimal big-endian magnitude (empty for zero).
    #[inline]
    pub fn as_be_bytes(&self) -> &[u8] {
        &self.be
    }

    /// Number of bytes needed to hold the value.
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.be.len()
    }

    /// Render as exactly `width` big-endian bytes, left-padded with zeros.
    /// Returns `None` if the value needs more than `width` bytes.
    pub fn to_be_bytes_padded(&self, width: usize) -> Option<Vec<u8>> {
        if self.be.len() > width {
            return None;
        }
        let mut out = vec![0u8; width - self.be.len()];
        out.extend_from_slice(&self.be);
        Some(out)
    }

    /// `self * 2^bits`.
    pub fn shl(&self, bits: u32) -> Self {
        if self.is_zero() {
            return Self::zero();
        }
        let byte_shift = (bits / 8) as usize;
        let bit_shift = bits % 8;

        let mut out = Vec::with_capacity(self.be.len() + byte_shift + 1);
        out.push(0u8);
        out.extend_from_slice(&self.be);
        if bit_shift != 0 {
            for i in 0..out.len() {
                let next = out.get(i + 1).copied().unwrap_or(0);
                out[i] = (out[i] << bit_shift) | (next >> (8 - bit_shift));
            }
        }
        out.resize(out.len() + byte_shift, 0);
        Self::from_be_bytes(&out)
    }

    /// Parse a decimal string.
    pub fn from_decimal(s: &str) -> Result<Self, ParameterError> {
        if s.is_empty() {
            return Err(ParameterError::Parse(s.to_owned()));
        }
        // Little-endian accumulator keeps the carry loop simple.
        let mut le: Vec<u8> = Vec::new();
        for c in s.chars() {
            let digit = c.to_digit(10).ok_or_else(|| ParameterError::Parse(s.to_owned()))?;
            let mut carry = digit;
            for byte in le.iter_mut() {
                let v = (*byte as u32) * 10 + carry;
                *byte = (v & 0xff) as u8;
                carry = v >> 8;
            }
            while carry > 0 {
                le.push((carry & 0xff) as u8);
                carry >>= 8;
            }
        }
        le.reverse();
        Ok(Self::from_be_bytes(&le))
    }

    /// Parse a hex string, with or without a `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, ParameterError> {
        let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
        if digits.is_empty() {
            return Err(ParameterError::Parse(s.to_owned()));
        }
        let padded;
        let digits = if digits.len() % 2 == 1 {
            padded = format!("0{digits}");
            padded.as_str()
        } else {
            digits
        };
        let bytes = hex::decode(digits).map_err(|_| ParameterError::Parse(s.to_owned()))?;
        Ok(Self::from_be_bytes(&bytes))
    }

    /// Exact conversion from a float.  Rejects anything that is not a
    /// finite, non-negative whole number.
    pub fn from_f64(value: f64) -> Result<Self, ParameterError> {
        if !value.is_finite() {
            return Err(ParameterError::NonFinite(value));
        }
        if value < 0.0 {
            return Err(ParameterError::Negative(value));
        }
        if value.fract() != 0.0 {
            return Err(ParameterError::Fractional(value));
        }
        if value == 0.0 {
            return Ok(Self::zero());
        }

        // value >= 1, so it is a normal float and the low mantissa bits
        // below the binary point are all zero.
        let bits = value.to_bits();
        let exponent = ((bits >> 52) & 0x7ff) as i32;
        let mantissa = (bits & ((1u64 << 52) - 1)) | (1u64 << 52);
        let shift = exponent - 1075;
        if shift >= 0 {
            Ok(Self::from_u64(mantissa).shl(shift as u32))
        } else {
            Ok(Self::from_u64(mantissa >> (-shift) as u32))
        }
    }
}

impl From<u64> for BlockNumber {
    fn from(value: u64) -> Self {
        Self::from_u64(value)
    }
}

impl fmt::Display for BlockNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return f.write_str("0x0");
        }
        write!(f, "0x{}", hex::encode(&self.be))
    }
}

impl FromStr for BlockNumber {
    type Err = ParameterError;

    /// `0x`-prefixed text is hex, anything else decimal.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.starts_with("0x") || s.starts_with("0X") {
            Self::from_hex(s)
        } else {
            Self::from_decimal(s)
        }
    }
}

impl Serialize for BlockNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

struct BlockNumberVisitor;

impl<'de> Visitor<'de> for BlockNumberVisitor {
    type Value = BlockNumber;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a non-negative integer or a decimal / 0x-hex string")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<BlockNumber, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<BlockNumber, E> {
        Ok(BlockNumber::from_u64(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<BlockNumber, E> {
        u64::try_from(v)
            .map(BlockNumber::from_u64)
            .map_err(|_| E::custom(ParameterError::Negative(v as f64)))
    }
}

/// Written as a hex string; read from a string or a plain JSON integer.
impl<'de> Deserialize<'de> for BlockNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(BlockNumberVisitor)
    }
}

// ── Parameter ────────────────────────────────────────────────────────────────

/// A gate parameter as the host reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parameter {
    Int(BlockNumber),
    Float(f64),
    Complex { re: f64, im: f64 },
}

impl Parameter {
    /// Validated conversion to an exact integer.
    pub fn to_block_number(&self) -> Result<BlockNumber, ParameterError> {
        match self {
            Parameter::Int(n) => Ok(n.clone()),
            Parameter::Float(v) => BlockNumber::from_f64(*v),
            Parameter::Complex { re, im } => {
                if *im != 0.0 {
                    return Err(ParameterError::Imaginary(*im));
                }
                BlockNumber::from_f64(*re)
            }
        }
    }
}

impl From<BlockNumber> for Parameter {
    fn from(n: BlockNumber) -> Self {
        Parameter::Int(n)
    }
}
