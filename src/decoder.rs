//! Register word decoding
//!
//! Converts 16-bit register words into typed values. Words arrive in protocol
//! order (most significant byte first within a word). The byte order axis only
//! matters when a transport hands over raw byte pairs, see [`words_from_bytes`];
//! the word order axis decides which word of a multi-word value is the most
//! significant.

use crate::error::{MeterError, Result};
use crate::register_map::{RegisterField, ValueKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Endianness as accepted from configuration
///
/// Parsed case-insensitively from both YAML and the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE", try_from = "String")]
pub enum Endian {
    Auto,
    #[default]
    Big,
    Little,
}

impl FromStr for Endian {
    type Err = MeterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "AUTO" => Ok(Endian::Auto),
            "BIG" => Ok(Endian::Big),
            "LITTLE" => Ok(Endian::Little),
            _ => Err(MeterError::config(format!(
                "Invalid endianness '{}', expected AUTO, BIG or LITTLE",
                s
            ))),
        }
    }
}

impl TryFrom<String> for Endian {
    type Error = MeterError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl fmt::Display for Endian {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Endian::Auto => "AUTO",
            Endian::Big => "BIG",
            Endian::Little => "LITTLE",
        })
    }
}

/// A resolved ordering on one axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Order {
    #[default]
    Big,
    Little,
}

impl Order {
    fn resolve(axis: &str, endian: Endian) -> Result<Self> {
        match endian {
            Endian::Big => Ok(Order::Big),
            Endian::Little => Ok(Order::Little),
            Endian::Auto => Err(MeterError::config(format!(
                "{} AUTO cannot be inferred; configure BIG or LITTLE",
                axis
            ))),
        }
    }
}

/// Byte and word order of a device, fixed for a service instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Endianness {
    pub byte_order: Order,
    pub word_order: Order,
}

impl Endianness {
    pub const fn new(byte_order: Order, word_order: Order) -> Self {
        Self {
            byte_order,
            word_order,
        }
    }

    /// Resolve configured endianness; `AUTO` on either axis is rejected
    pub fn resolve(byte_order: Endian, word_order: Endian) -> Result<Self> {
        Ok(Self {
            byte_order: Order::resolve("byte_order", byte_order)?,
            word_order: Order::resolve("word_order", word_order)?,
        })
    }
}

/// A decoded register value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Numeric view of the value, `None` for text
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Unsigned(v) => Some(v as f64),
            Value::Signed(v) => Some(v as f64),
            Value::Float(v) => Some(v),
            Value::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unsigned(v) => write!(f, "{}", v),
            Value::Signed(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(v) => f.write_str(v),
        }
    }
}

/// Build register words from raw byte pairs
///
/// With [`Order::Big`] the first byte of each pair is the high byte, with
/// [`Order::Little`] the pair is swapped.
pub fn words_from_bytes(bytes: &[u8], byte_order: Order) -> Result<Vec<u16>> {
    if bytes.len() % 2 != 0 {
        return Err(MeterError::decode(format!(
            "odd number of bytes ({}) cannot form register words",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| match byte_order {
            Order::Big => u16::from_be_bytes([pair[0], pair[1]]),
            Order::Little => u16::from_le_bytes([pair[0], pair[1]]),
        })
        .collect())
}

/// Inverse of [`words_from_bytes`]
pub fn bytes_from_words(words: &[u16], byte_order: Order) -> Vec<u8> {
    words
        .iter()
        .flat_map(|w| match byte_order {
            Order::Big => w.to_be_bytes(),
            Order::Little => w.to_le_bytes(),
        })
        .collect()
}

fn combine(words: &[u16], word_order: Order) -> u64 {
    let push = |acc: u64, w: &u16| (acc << 16) | u64::from(*w);
    match word_order {
        Order::Big => words.iter().fold(0, push),
        Order::Little => words.iter().rev().fold(0, push),
    }
}

fn decode_text(words: &[u16]) -> String {
    // Registers in address order, high byte first; trailing NULs are padding
    let bytes = bytes_from_words(words, Order::Big);
    String::from_utf8_lossy(&bytes)
        .trim_matches('\0')
        .trim()
        .to_string()
}

/// Decode the words of one value
///
/// Numeric kinds need exactly their fixed width, text needs at least one word.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub fn decode_words(words: &[u16], kind: ValueKind, word_order: Order) -> Result<Value> {
    match kind.fixed_word_count() {
        Some(width) if words.len() != usize::from(width) => {
            return Err(MeterError::decode(format!(
                "{} needs {} words, got {}",
                kind,
                width,
                words.len()
            )));
        }
        None if words.is_empty() => {
            return Err(MeterError::decode("string needs at least one word"));
        }
        _ => {}
    }

    let raw = || combine(words, word_order);
    let value = match kind {
        ValueKind::UInt16 | ValueKind::UInt32 | ValueKind::UInt64 => Value::Unsigned(raw()),
        ValueKind::Int16 => Value::Signed(i64::from(raw() as u16 as i16)),
        ValueKind::Int32 => Value::Signed(i64::from(raw() as u32 as i32)),
        ValueKind::Int64 => Value::Signed(raw() as i64),
        ValueKind::Float32 => Value::Float(f64::from(f32::from_bits(raw() as u32))),
        ValueKind::Float64 => Value::Float(f64::from_bits(raw())),
        ValueKind::String => Value::Text(decode_text(words)),
    };
    Ok(value)
}

/// Multiply by `scale` when present; a scaled value is always a float
pub fn apply_scale(value: Value, scale: Option<f64>) -> Value {
    match (scale, value.as_f64()) {
        (Some(s), Some(v)) => Value::Float(v * s),
        _ => value,
    }
}

/// Decode one field from its own words
pub fn decode_field(
    words: &[u16],
    field: &RegisterField,
    endianness: &Endianness,
) -> Result<Value> {
    if words.len() != usize::from(field.word_count) {
        return Err(MeterError::decode(format!(
            "field '{}' needs {} words, got {}",
            field.name,
            field.word_count,
            words.len()
        )));
    }
    let value = decode_words(words, field.kind, endianness.word_order)?;
    Ok(apply_scale(value, field.scale))
}

#[allow(clippy::cast_possible_truncation)]
fn integer_of(value: &Value, kind: ValueKind) -> Result<i128> {
    match *value {
        Value::Unsigned(v) => Ok(i128::from(v)),
        Value::Signed(v) => Ok(i128::from(v)),
        Value::Float(v) if v.is_finite() && v.fract() == 0.0 => Ok(v as i128),
        _ => Err(MeterError::decode(format!(
            "{} is not an integer and cannot be encoded as {}",
            value, kind
        ))),
    }
}

fn float_of(value: &Value, kind: ValueKind) -> Result<f64> {
    value.as_f64().ok_or_else(|| {
        MeterError::decode(format!("'{}' cannot be encoded as {}", value, kind))
    })
}

/// Encode a value into register words, the inverse of [`decode_words`]
///
/// Text is packed two bytes per word and NUL padded to a whole word.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn encode_value(value: &Value, kind: ValueKind, word_order: Order) -> Result<Vec<u16>> {
    let out_of_range = |_| MeterError::decode(format!("{} does not fit into {}", value, kind));

    let raw: u64 = match kind {
        ValueKind::String => {
            let text = value.as_str().ok_or_else(|| {
                MeterError::decode(format!("{} cannot be encoded as string", value))
            })?;
            let mut bytes = text.as_bytes().to_vec();
            if bytes.len() % 2 != 0 {
                bytes.push(0);
            }
            return words_from_bytes(&bytes, Order::Big);
        }
        ValueKind::Float32 => u64::from((float_of(value, kind)? as f32).to_bits()),
        ValueKind::Float64 => float_of(value, kind)?.to_bits(),
        ValueKind::UInt16 => u16::try_from(integer_of(value, kind)?)
            .map(u64::from)
            .map_err(out_of_range)?,
        ValueKind::Int16 => i16::try_from(integer_of(value, kind)?)
            .map(|v| u64::from(v as u16))
            .map_err(out_of_range)?,
        ValueKind::UInt32 => u32::try_from(integer_of(value, kind)?)
            .map(u64::from)
            .map_err(out_of_range)?,
        ValueKind::Int32 => i32::try_from(integer_of(value, kind)?)
            .map(|v| u64::from(v as u32))
            .map_err(out_of_range)?,
        ValueKind::UInt64 => u64::try_from(integer_of(value, kind)?).map_err(out_of_range)?,
        ValueKind::Int64 => i64::try_from(integer_of(value, kind)?)
            .map(|v| v as u64)
            .map_err(out_of_range)?,
    };

    let n = kind.fixed_word_count().map_or(0, usize::from);
    let mut words: Vec<u16> = (0..n)
        .map(|i| (raw >> (16 * (n - 1 - i))) as u16)
        .collect();
    if word_order == Order::Little {
        words.reverse();
    }
    Ok(words)
}
