//! Numeric value types carried by telemetry records

use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric storage types used by record fields.
///
/// Everything except `Float64` appears on the wire; `Float64` is reserved for
/// fields derived at decode time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    /// 8-bit signed integer
    Int8,
    /// 8-bit unsigned integer
    UInt8,
    /// 16-bit unsigned integer
    UInt16,
    /// 32-bit signed integer
    Int32,
    /// 32-bit unsigned integer
    UInt32,
    /// 32-bit IEEE-754 float
    Float32,
    /// 64-bit IEEE-754 float (derived fields only)
    Float64,
}

impl ValueType {
    /// Returns the size in bytes of this type.
    pub const fn size(&self) -> usize {
        match self {
            ValueType::Int8 | ValueType::UInt8 => 1,
            ValueType::UInt16 => 2,
            ValueType::Int32 | ValueType::UInt32 | ValueType::Float32 => 4,
            ValueType::Float64 => 8,
        }
    }

    /// Whether this type is part of the packet layout.
    pub const fn is_wire(&self) -> bool {
        !matches!(self, ValueType::Float64)
    }
}

/// Runtime value of a single numeric field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Int8(i8),
    UInt8(u8),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Float32(f32),
    Float64(f64),
}

impl FieldValue {
    /// Widen to `f64` for statistics.
    pub fn as_f64(&self) -> f64 {
        match *self {
            FieldValue::Int8(v) => f64::from(v),
            FieldValue::UInt8(v) => f64::from(v),
            FieldValue::UInt16(v) => f64::from(v),
            FieldValue::Int32(v) => f64::from(v),
            FieldValue::UInt32(v) => f64::from(v),
            FieldValue::Float32(v) => f64::from(v),
            FieldValue::Float64(v) => v,
        }
    }

    /// The storage type of this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            FieldValue::Int8(_) => ValueType::Int8,
            FieldValue::UInt8(_) => ValueType::UInt8,
            FieldValue::UInt16(_) => ValueType::UInt16,
            FieldValue::Int32(_) => ValueType::Int32,
            FieldValue::UInt32(_) => ValueType::UInt32,
            FieldValue::Float32(_) => ValueType::Float32,
            FieldValue::Float64(_) => ValueType::Float64,
        }
    }
}

// Float formatting uses the shortest representation that parses back to the
// same bits, so rows survive a write/read cycle unchanged.
impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int8(v) => write!(f, "{v}"),
            FieldValue::UInt8(v) => write!(f, "{v}"),
            FieldValue::UInt16(v) => write!(f, "{v}"),
            FieldValue::Int32(v) => write!(f, "{v}"),
            FieldValue::UInt32(v) => write!(f, "{v}"),
            FieldValue::Float32(v) => write!(f, "{v}"),
            FieldValue::Float64(v) => write!(f, "{v}"),
        }
    }
}

macro_rules! field_value_from {
    ($($ty:ty => $variant:ident),+ $(,)?) => {
        $(
            impl From<$ty> for FieldValue {
                fn from(value: $ty) -> Self {
                    FieldValue::$variant(value)
                }
            }
        )+
    };
}

field_value_from! {
    i8 => Int8,
    u8 => UInt8,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    f32 => Float32,
    f64 => Float64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_match_wire_widths() {
        assert_eq!(ValueType::Int8.size(), 1);
        assert_eq!(ValueType::UInt8.size(), 1);
        assert_eq!(ValueType::UInt16.size(), 2);
        assert_eq!(ValueType::Int32.size(), 4);
        assert_eq!(ValueType::UInt32.size(), 4);
        assert_eq!(ValueType::Float32.size(), 4);
        assert_eq!(ValueType::Float64.size(), 8);
        assert!(!ValueType::Float64.is_wire());
    }

    #[test]
    fn display_round_trips_floats() {
        for value in [0.1f32, -3.25, 1.0e-7, 123456.79, f32::MAX] {
            let text = FieldValue::from(value).to_string();
            assert_eq!(text.parse::<f32>().unwrap().to_bits(), value.to_bits());
        }
        assert_eq!(FieldValue::from(-5i8).to_string(), "-5");
        assert_eq!(FieldValue::from(11u8).as_f64(), 11.0);
    }
}
