//! This module defines the canonical, type-safe representation of the element
//! types a chunk may carry into the codec.

use crate::error::PcmpackError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The element type of a chunk handed to the codec.
///
/// Integer types map directly onto engine sample words at their native width.
/// `Float32` selects the engine's dedicated floating-point mode.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SampleDtype {
    Int8,
    Int16,
    Int32,
    Float32,
}

impl SampleDtype {
    /// The on-disk tag written into a chunk descriptor. Part of the wire format.
    pub fn tag(&self) -> u8 {
        match self {
            Self::Int8 => 1,
            Self::Int16 => 2,
            Self::Int32 => 3,
            Self::Float32 => 4,
        }
    }

    /// Inverse of [`SampleDtype::tag`].
    pub fn from_tag(tag: u8) -> Result<Self, PcmpackError> {
        match tag {
            1 => Ok(Self::Int8),
            2 => Ok(Self::Int16),
            3 => Ok(Self::Int32),
            4 => Ok(Self::Float32),
            t => Err(PcmpackError::CorruptStream(format!(
                "Unknown dtype tag {} in chunk descriptor",
                t
            ))),
        }
    }

    /// Parses a numpy-style dtype name (`"int16"`, `"<i2"`, `"float32"`, ...).
    pub fn from_name(name: &str) -> Result<Self, PcmpackError> {
        match name.trim().to_lowercase().as_str() {
            "int8" | "i1" | "|i1" => Ok(Self::Int8),
            "int16" | "i2" | "<i2" => Ok(Self::Int16),
            "int32" | "i4" | "<i4" => Ok(Self::Int32),
            "float32" | "f4" | "<f4" => Ok(Self::Float32),
            other => Err(PcmpackError::UnsupportedType(format!(
                "dtype '{}' is not supported (expected int8, int16, int32 or float32)",
                other
            ))),
        }
    }

    /// Native width of one element in bits.
    pub fn bit_width(&self) -> u8 {
        match self {
            Self::Int8 => 8,
            Self::Int16 => 16,
            Self::Int32 | Self::Float32 => 32,
        }
    }

    /// Native width of one element in bytes.
    pub fn byte_width(&self) -> usize {
        usize::from(self.bit_width() / 8)
    }

    /// Returns `true` if the data type is a floating-point number.
    pub fn is_float(&self) -> bool {
        matches!(self, Self::Float32)
    }
}

/// Provides the canonical string representation for a `SampleDtype`.
impl fmt::Display for SampleDtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Float32 => "float32",
        };
        f.write_str(name)
    }
}
