//! Register map of a metering device
//!
//! A [`DeviceDescriptor`] is the static, validated description of every
//! measurement a device exposes: where it lives in the register space, how
//! many words it occupies and how those words are interpreted.

use crate::error::{MeterError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Size of the 16-bit register address space
const REGISTER_SPACE: u32 = 0x1_0000;

/// Interpretation of a field's register words
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    UInt16,
    Int16,
    UInt32,
    Int32,
    Float32,
    UInt64,
    Int64,
    Float64,
    /// Text packed two bytes per register, width set by the field
    String,
}

impl ValueKind {
    /// Number of 16-bit words a value of this kind occupies, `None` for text
    pub const fn fixed_word_count(self) -> Option<u16> {
        match self {
            ValueKind::UInt16 | ValueKind::Int16 => Some(1),
            ValueKind::UInt32 | ValueKind::Int32 | ValueKind::Float32 => Some(2),
            ValueKind::UInt64 | ValueKind::Int64 | ValueKind::Float64 => Some(4),
            ValueKind::String => None,
        }
    }

    pub const fn is_numeric(self) -> bool {
        !matches!(self, ValueKind::String)
    }

    pub const fn is_float(self) -> bool {
        matches!(self, ValueKind::Float32 | ValueKind::Float64)
    }

    pub const fn is_signed(self) -> bool {
        matches!(self, ValueKind::Int16 | ValueKind::Int32 | ValueKind::Int64)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::UInt16 => "uint16",
            ValueKind::Int16 => "int16",
            ValueKind::UInt32 => "uint32",
            ValueKind::Int32 => "int32",
            ValueKind::Float32 => "float32",
            ValueKind::UInt64 => "uint64",
            ValueKind::Int64 => "int64",
            ValueKind::Float64 => "float64",
            ValueKind::String => "string",
        };
        f.write_str(name)
    }
}

/// One logical measurement of a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterField {
    /// Unique identifier within the device
    pub name: String,

    /// Zero-based register offset
    pub address: u16,

    /// Number of 16-bit words occupied
    pub word_count: u16,

    /// How the words are interpreted
    pub kind: ValueKind,

    /// Multiplier applied after decoding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,

    /// Engineering unit, for display only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl RegisterField {
    /// Create a field whose width is derived from its kind
    ///
    /// A [`ValueKind::String`] field created this way is one register wide;
    /// use [`RegisterField::string`] to set its width.
    pub fn new<S: Into<String>>(name: S, address: u16, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            address,
            word_count: kind.fixed_word_count().unwrap_or(1),
            kind,
            scale: None,
            unit: None,
        }
    }

    /// Create a text field spanning `word_count` registers
    pub fn string<S: Into<String>>(name: S, address: u16, word_count: u16) -> Self {
        Self {
            word_count,
            ..Self::new(name, address, ValueKind::String)
        }
    }

    /// Set the post-decode multiplier
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = Some(scale);
        self
    }

    /// Set the engineering unit
    pub fn with_unit<S: Into<String>>(mut self, unit: S) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// First register address past this field
    pub fn end_address(&self) -> u32 {
        u32::from(self.address) + u32::from(self.word_count)
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(MeterError::config(format!(
                "field at address {} has an empty name",
                self.address
            )));
        }
        if self.word_count == 0 {
            return Err(MeterError::config(format!(
                "field '{}' has zero word_count",
                self.name
            )));
        }
        if let Some(expected) = self.kind.fixed_word_count()
            && self.word_count != expected
        {
            return Err(MeterError::config(format!(
                "field '{}' declares {} words but {} requires {}",
                self.name, self.word_count, self.kind, expected
            )));
        }
        if self.scale.is_some() && !self.kind.is_numeric() {
            return Err(MeterError::config(format!(
                "field '{}' is text and cannot be scaled",
                self.name
            )));
        }
        if self.end_address() > REGISTER_SPACE {
            return Err(MeterError::config(format!(
                "field '{}' at address {} runs past the end of the register space",
                self.name, self.address
            )));
        }
        if let Some(scale) = self.scale
            && !scale.is_finite()
        {
            return Err(MeterError::config(format!(
                "field '{}' has a non-finite scale",
                self.name
            )));
        }
        Ok(())
    }
}

/// Validated, immutable register map of one device
#[derive(Debug, Clone)]
pub struct DeviceDescriptor {
    name: String,
    fields: Vec<RegisterField>,
    index: HashMap<String, usize>,
}

impl DeviceDescriptor {
    /// Validate `fields` and build the descriptor
    ///
    /// Fails with [`MeterError::Config`] on an empty field list, duplicate or
    /// empty names, a zero or mismatched `word_count`, a field running past
    /// the register space, a non-finite scale, or overlapping address ranges.
    pub fn new<S: Into<String>>(name: S, fields: Vec<RegisterField>) -> Result<Self> {
        let name = name.into();
        if fields.is_empty() {
            return Err(MeterError::config(format!(
                "device '{}' declares no register fields",
                name
            )));
        }

        let mut index = HashMap::with_capacity(fields.len());
        for (i, field) in fields.iter().enumerate() {
            field.validate()?;
            if index.insert(field.name.clone(), i).is_some() {
                return Err(MeterError::config(format!(
                    "duplicate field name '{}' in device '{}'",
                    field.name, name
                )));
            }
        }

        check_overlaps(&fields)?;

        Ok(Self {
            name,
            fields,
            index,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in declaration order
    pub fn fields(&self) -> &[RegisterField] {
        &self.fields
    }

    /// Look up a field by name
    pub fn field(&self, name: &str) -> Option<&RegisterField> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    /// Declaration index of a field
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Widest field in words
    pub fn max_word_count(&self) -> u16 {
        self.fields.iter().map(|f| f.word_count).max().unwrap_or(0)
    }
}

fn check_overlaps(fields: &[RegisterField]) -> Result<()> {
    let mut order: Vec<&RegisterField> = fields.iter().collect();
    order.sort_by_key(|f| f.address);
    for pair in order.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if a.end_address() > u32::from(b.address) {
            return Err(MeterError::config(format!(
                "fields '{}' ({}..{}) and '{}' ({}..{}) overlap",
                a.name,
                a.address,
                a.end_address(),
                b.name,
                b.address,
                b.end_address()
            )));
        }
    }
    Ok(())
}
