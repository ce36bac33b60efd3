//! Decoded values produced by reading data through a [`Datatype`].
//!
//! [`Datatype`]: crate::datatype::Datatype

#[cfg(not(feature = "std"))]
use alloc::{string::String, vec::Vec};

/// One decoded value.
///
/// A closed union constructed per variant kind; produced fresh on every
/// read and never cached on the datatype tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    /// Fixed-width or variable-length string with padding trimmed.
    Str(String),
    /// Raw byte run.
    Bytes(Vec<u8>),
    /// Compound value: (member name, member value) in declared order.
    Struct(Vec<(String, Value)>),
    /// Variable-length sequence of base-type values.
    Seq(Vec<Value>),
    /// Reference handle wrapping an 8-byte address.
    Ref(u64),
    /// Absent variable-length data.
    Null,
}

impl Value {
    /// Signed integer view of any integer variant.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int8(v) => Some(*v as i64),
            Value::Int16(v) => Some(*v as i64),
            Value::Int32(v) => Some(*v as i64),
            Value::Int64(v) => Some(*v),
            Value::UInt8(v) => Some(*v as i64),
            Value::UInt16(v) => Some(*v as i64),
            Value::UInt32(v) => Some(*v as i64),
            Value::UInt64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Float view of any numeric variant.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float32(v) => Some(*v as f64),
            Value::Float64(v) => Some(*v),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    /// String view of [`Value::Str`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}
