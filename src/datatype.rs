//! HDF5 Datatype message decoding (message type 0x0003).
//!
//! A datatype message is a self-describing, recursively nested, versioned
//! binary description of one data element's layout. [`Datatype::decode`]
//! parses one message into an immutable [`Datatype`] tree; value reading
//! lives in `value_read`.
//!
//! Message headers and properties are little-endian regardless of the
//! byte order the described values use.

#[cfg(not(feature = "std"))]
use alloc::{boxed::Box, string::String, vec::Vec};

use crate::cursor::{ByteOrder, Cursor};
use crate::error::DatatypeError;

/// String padding type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringPadding {
    NullTerminate,
    NullPad,
    SpacePad,
}

/// Character set encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacterSet {
    Ascii,
    Utf8,
}

/// Reference type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Object,
    DatasetRegion,
}

/// Directly readable fixed-point layouts.
///
/// Only byte-aligned widths are readable: bit offset 0 and a precision of
/// 8, 16, 32, or 64 matching the element size. Unsigned 64-bit is not
/// among them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
}

/// Directly readable floating-point layouts (exact IEEE-754 field maps).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatKind {
    Binary32,
    Binary64,
}

/// A member of a compound datatype.
///
/// Ordering is significant for layout; byte offsets are relative to the
/// enclosing struct and always lie within `[0, size)`.
#[derive(Debug, Clone, PartialEq)]
pub struct CompoundMember {
    /// Member name.
    pub name: String,
    /// Byte offset within the compound.
    pub byte_offset: u64,
    /// Member datatype.
    pub datatype: Datatype,
}

/// Parallel name/value lists of an enumeration datatype.
///
/// Retained for symbolic lookup; raw value reading goes straight through
/// the base type and never consults this table.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumMapping {
    pub names: Vec<String>,
    pub values: Vec<i64>,
}

impl EnumMapping {
    /// Resolve a declared value to its symbolic name.
    pub fn name_of(&self, value: i64) -> Option<&str> {
        self.values
            .iter()
            .position(|&v| v == value)
            .map(|i| self.names[i].as_str())
    }

    /// Resolve a symbolic name to its declared value.
    pub fn value_of(&self, name: &str) -> Option<i64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.values[i])
    }
}

/// Parsed HDF5 datatype.
///
/// Immutable once decoded; composite variants exclusively own their nested
/// datatypes, so the structure is always a tree. A decoded tree carries no
/// I/O state and may be shared read-only across threads, each supplying
/// its own cursor.
#[derive(Debug, Clone, PartialEq)]
pub enum Datatype {
    /// Class 0: Fixed-point (integer) types.
    FixedPoint {
        size: u32,
        byte_order: ByteOrder,
        signed: bool,
        /// Lo/hi pad bits, recorded only.
        padding: u8,
        bit_offset: u16,
        bit_precision: u16,
        kind: ScalarKind,
    },
    /// Class 1: Floating-point types.
    FloatingPoint {
        size: u32,
        byte_order: ByteOrder,
        /// Lo/hi/internal pad bits, recorded only.
        padding: u8,
        /// Mantissa normalization, recorded only.
        mantissa_norm: u8,
        sign_location: u8,
        bit_offset: u16,
        bit_precision: u16,
        exponent_location: u8,
        exponent_size: u8,
        mantissa_location: u8,
        mantissa_size: u8,
        exponent_bias: u32,
        kind: FloatKind,
    },
    /// Class 2: Time. The on-disk semantics are unspecified in the format
    /// documentation, so values are read as opaque unsigned counters; no
    /// calendar interpretation is attempted.
    Time {
        size: u32,
        byte_order: ByteOrder,
        bit_precision: u16,
    },
    /// Class 3: Fixed-length string.
    String {
        size: u32,
        padding: StringPadding,
        charset: CharacterSet,
    },
    /// Class 4: Bit field.
    BitField {
        size: u32,
        byte_order: ByteOrder,
        /// Lo/hi pad bits, recorded only.
        padding: u8,
        bit_offset: u16,
        bit_precision: u16,
    },
    /// Class 5: Opaque data. Recognized but not readable.
    Opaque { size: u32, tag: Vec<u8> },
    /// Class 6: Compound type.
    Compound {
        size: u32,
        members: Vec<CompoundMember>,
    },
    /// Class 7: Reference type.
    Reference {
        size: u32,
        ref_kind: ReferenceKind,
        /// Reference version sub-field (message version 4 only).
        ref_version: u8,
    },
    /// Class 8: Enumeration type.
    Enumeration {
        size: u32,
        base_type: Box<Datatype>,
        mapping: EnumMapping,
    },
    /// Class 9: Variable-length type (sequence or string).
    VariableLength {
        size: u32,
        is_string: bool,
        padding: Option<StringPadding>,
        charset: Option<CharacterSet>,
        base_type: Box<Datatype>,
    },
    /// Class 10: Array type. Recognized but not readable.
    Array {
        size: u32,
        base_type: Box<Datatype>,
        dimensions: Vec<u32>,
    },
}

fn parse_string_padding(val: u8) -> Result<StringPadding, DatatypeError> {
    match val {
        0 => Ok(StringPadding::NullTerminate),
        1 => Ok(StringPadding::NullPad),
        2 => Ok(StringPadding::SpacePad),
        _ => Err(DatatypeError::MalformedStructure {
            class: "String",
            detail: "invalid string padding type",
        }),
    }
}

fn parse_charset(val: u8) -> Result<CharacterSet, DatatypeError> {
    match val {
        0 => Ok(CharacterSet::Ascii),
        1 => Ok(CharacterSet::Utf8),
        _ => Err(DatatypeError::MalformedStructure {
            class: "String",
            detail: "invalid character set",
        }),
    }
}

fn require_version(
    class: &'static str,
    version: u8,
    min: u8,
    max: u8,
) -> Result<(), DatatypeError> {
    if (min..=max).contains(&version) {
        Ok(())
    } else {
        Err(DatatypeError::UnsupportedVersion { class, version })
    }
}

/// Read a null-terminated string from the cursor.
/// Returns (string, bytes consumed including the terminator).
fn read_null_terminated_string(cur: &mut Cursor<'_>) -> Result<(String, usize), DatatypeError> {
    let mut bytes = Vec::new();
    loop {
        let b = cur.read_u8()?;
        if b == 0 {
            break;
        }
        bytes.push(b);
    }
    let consumed = bytes.len() + 1;
    Ok((String::from_utf8_lossy(&bytes).into_owned(), consumed))
}

/// Round up to next multiple of 8.
fn pad8(x: usize) -> usize {
    (x + 7) & !7
}

/// Width of a v3 compound member byte offset, chosen by the compound size.
fn offset_width_for_size(compound_size: u32) -> usize {
    if compound_size < 0x100 {
        1
    } else if compound_size < 0x1_0000 {
        2
    } else if compound_size < 0x100_0000 {
        3
    } else {
        4
    }
}

fn scalar_kind(
    signed: bool,
    bit_offset: u16,
    bit_precision: u16,
    size: u32,
) -> Result<ScalarKind, DatatypeError> {
    let unsupported = DatatypeError::UnsupportedLayout {
        class: "FixedPoint",
        detail: "only byte-aligned 8/16/32/64-bit layouts are readable",
    };
    if bit_offset != 0 || u64::from(size) * 8 != u64::from(bit_precision) {
        return Err(unsupported);
    }
    match (signed, bit_precision) {
        (true, 8) => Ok(ScalarKind::Int8),
        (true, 16) => Ok(ScalarKind::Int16),
        (true, 32) => Ok(ScalarKind::Int32),
        (true, 64) => Ok(ScalarKind::Int64),
        (false, 8) => Ok(ScalarKind::UInt8),
        (false, 16) => Ok(ScalarKind::UInt16),
        (false, 32) => Ok(ScalarKind::UInt32),
        _ => Err(unsupported),
    }
}

#[allow(clippy::too_many_arguments)]
fn float_kind(
    size: u32,
    sign_location: u8,
    bit_offset: u16,
    bit_precision: u16,
    exponent_location: u8,
    exponent_size: u8,
    mantissa_location: u8,
    mantissa_size: u8,
    exponent_bias: u32,
) -> Result<FloatKind, DatatypeError> {
    match (
        size,
        sign_location,
        bit_offset,
        bit_precision,
        exponent_location,
        exponent_size,
        mantissa_location,
        mantissa_size,
        exponent_bias,
    ) {
        (4, 31, 0, 32, 23, 8, 0, 23, 127) => Ok(FloatKind::Binary32),
        (8, 63, 0, 64, 52, 11, 0, 52, 1023) => Ok(FloatKind::Binary64),
        _ => Err(DatatypeError::UnsupportedLayout {
            class: "FloatingPoint",
            detail: "only IEEE-754 binary32 and binary64 layouts are readable",
        }),
    }
}

/// Read one enumeration value of the base scalar kind as `i64`.
fn read_enum_value(cur: &mut Cursor<'_>, kind: ScalarKind) -> Result<i64, DatatypeError> {
    Ok(match kind {
        ScalarKind::Int8 => cur.read_i8()? as i64,
        ScalarKind::Int16 => cur.read_i16()? as i64,
        ScalarKind::Int32 => cur.read_i32()? as i64,
        ScalarKind::Int64 => cur.read_i64()?,
        ScalarKind::UInt8 => cur.read_u8()? as i64,
        ScalarKind::UInt16 => cur.read_u16()? as i64,
        ScalarKind::UInt32 => cur.read_u32()? as i64,
    })
}

impl Datatype {
    /// Decode a datatype message at the cursor's current position.
    ///
    /// The cursor is left just past the message; its active byte order is
    /// restored regardless of what the message declares for its values.
    pub fn decode(cur: &mut Cursor<'_>) -> Result<Datatype, DatatypeError> {
        cur.with_order(ByteOrder::LittleEndian, Datatype::decode_le)
    }

    fn decode_le(cur: &mut Cursor<'_>) -> Result<Datatype, DatatypeError> {
        let class_and_version = cur.read_u8()?;
        let class_id = class_and_version & 0x0F;
        let version = (class_and_version >> 4) & 0x0F;

        // 24-bit class bit field, interpreted per class below.
        let bf0 = cur.read_u8()?;
        let bf1 = cur.read_u8()?;
        let _bf2 = cur.read_u8()?;

        let size = cur.read_u32()?;

        match class_id {
            0 => {
                require_version("FixedPoint", version, 1, 3)?;
                let byte_order = if bf0 & 0x01 == 0 {
                    ByteOrder::LittleEndian
                } else {
                    ByteOrder::BigEndian
                };
                let padding = (bf0 >> 1) & 0x03;
                let signed = (bf0 >> 3) & 0x01 == 1;
                let bit_offset = cur.read_u16()?;
                let bit_precision = cur.read_u16()?;
                let kind = scalar_kind(signed, bit_offset, bit_precision, size)?;
                Ok(Datatype::FixedPoint {
                    size,
                    byte_order,
                    signed,
                    padding,
                    bit_offset,
                    bit_precision,
                    kind,
                })
            }
            1 => {
                require_version("FloatingPoint", version, 1, 3)?;
                // Byte order is a non-contiguous 2-bit field (bits 0 and 6).
                let bo_low = bf0 & 0x01;
                let bo_high = (bf0 >> 6) & 0x01;
                let byte_order = match (bo_high, bo_low) {
                    (0, 0) => ByteOrder::LittleEndian,
                    (0, 1) => ByteOrder::BigEndian,
                    _ => {
                        return Err(DatatypeError::UnsupportedLayout {
                            class: "FloatingPoint",
                            detail: "VAX byte order",
                        })
                    }
                };
                let padding = (bf0 >> 1) & 0x07;
                let mantissa_norm = (bf0 >> 4) & 0x03;
                let sign_location = bf1;
                let bit_offset = cur.read_u16()?;
                let bit_precision = cur.read_u16()?;
                let exponent_location = cur.read_u8()?;
                let exponent_size = cur.read_u8()?;
                let mantissa_location = cur.read_u8()?;
                let mantissa_size = cur.read_u8()?;
                let exponent_bias = cur.read_u32()?;
                let kind = float_kind(
                    size,
                    sign_location,
                    bit_offset,
                    bit_precision,
                    exponent_location,
                    exponent_size,
                    mantissa_location,
                    mantissa_size,
                    exponent_bias,
                )?;
                Ok(Datatype::FloatingPoint {
                    size,
                    byte_order,
                    padding,
                    mantissa_norm,
                    sign_location,
                    bit_offset,
                    bit_precision,
                    exponent_location,
                    exponent_size,
                    mantissa_location,
                    mantissa_size,
                    exponent_bias,
                    kind,
                })
            }
            2 => {
                require_version("Time", version, 1, 3)?;
                let byte_order = if bf0 & 0x01 == 0 {
                    ByteOrder::LittleEndian
                } else {
                    ByteOrder::BigEndian
                };
                let bit_precision = cur.read_u16()?;
                Ok(Datatype::Time {
                    size,
                    byte_order,
                    bit_precision,
                })
            }
            3 => {
                require_version("String", version, 1, 3)?;
                let padding = parse_string_padding(bf0 & 0x0F)?;
                let charset = parse_charset((bf0 >> 4) & 0x0F)?;
                Ok(Datatype::String {
                    size,
                    padding,
                    charset,
                })
            }
            4 => {
                require_version("BitField", version, 1, 3)?;
                let byte_order = if bf0 & 0x01 == 0 {
                    ByteOrder::LittleEndian
                } else {
                    ByteOrder::BigEndian
                };
                let padding = (bf0 >> 1) & 0x03;
                let bit_offset = cur.read_u16()?;
                let bit_precision = cur.read_u16()?;
                Ok(Datatype::BitField {
                    size,
                    byte_order,
                    padding,
                    bit_offset,
                    bit_precision,
                })
            }
            5 => {
                require_version("Opaque", version, 1, 3)?;
                // Tags are padded to a multiple of 8 bytes.
                let tag_len = bf0 as usize;
                let tag = cur.read_bytes(tag_len)?.to_vec();
                cur.skip(pad8(tag_len) - tag_len)?;
                Ok(Datatype::Opaque { size, tag })
            }
            6 => {
                require_version("Compound", version, 1, 3)?;
                let num_members = (bf0 as u16) | ((bf1 as u16) << 8);
                let mut members = Vec::with_capacity(num_members as usize);
                for _ in 0..num_members {
                    let (name, name_len) = read_null_terminated_string(cur)?;
                    let byte_offset = if version == 3 {
                        // v3: unpadded name, offset width chosen by the
                        // compound size.
                        cur.read_uint(offset_width_for_size(size))?
                    } else {
                        // v1/v2: names are padded to an 8-byte boundary,
                        // offsets are fixed 4 bytes.
                        cur.skip(pad8(name_len) - name_len)?;
                        cur.read_u32()? as u64
                    };
                    if version == 1 {
                        // Legacy array-field support: dimensionality(1) +
                        // reserved(3) + permutation(4) + four dimension
                        // sizes(16), all skipped.
                        cur.skip(24)?;
                    }
                    if byte_offset >= u64::from(size) {
                        return Err(DatatypeError::MalformedStructure {
                            class: "Compound",
                            detail: "member offset outside compound extent",
                        });
                    }
                    let datatype = Datatype::decode_le(cur)?;
                    members.push(CompoundMember {
                        name,
                        byte_offset,
                        datatype,
                    });
                }
                Ok(Datatype::Compound { size, members })
            }
            7 => {
                require_version("Reference", version, 1, 4)?;
                let ref_kind = match bf0 & 0x0F {
                    0 => ReferenceKind::Object,
                    1 => ReferenceKind::DatasetRegion,
                    _ => {
                        return Err(DatatypeError::MalformedStructure {
                            class: "Reference",
                            detail: "invalid reference type",
                        })
                    }
                };
                let ref_version = if version == 4 { (bf0 >> 4) & 0x0F } else { 0 };
                Ok(Datatype::Reference {
                    size,
                    ref_kind,
                    ref_version,
                })
            }
            8 => {
                require_version("Enumeration", version, 1, 3)?;
                let num_members = (bf0 as u16) | ((bf1 as u16) << 8);
                let base_type = Datatype::decode_le(cur)?;
                let (base_kind, base_order) = match &base_type {
                    Datatype::FixedPoint {
                        kind, byte_order, ..
                    } => (*kind, *byte_order),
                    _ => {
                        return Err(DatatypeError::MalformedStructure {
                            class: "Enumeration",
                            detail: "base type must be fixed-point",
                        })
                    }
                };
                // Layout: all names first, then all values.
                let mut names = Vec::with_capacity(num_members as usize);
                for _ in 0..num_members {
                    let (name, name_len) = read_null_terminated_string(cur)?;
                    if version < 3 {
                        cur.skip(pad8(name_len) - name_len)?;
                    }
                    names.push(name);
                }
                let mut values = Vec::with_capacity(num_members as usize);
                for _ in 0..num_members {
                    let v = cur.with_order(base_order, |c| read_enum_value(c, base_kind))?;
                    values.push(v);
                }
                Ok(Datatype::Enumeration {
                    size,
                    base_type: Box::new(base_type),
                    mapping: EnumMapping { names, values },
                })
            }
            9 => {
                require_version("VariableLength", version, 1, 3)?;
                let is_string = match bf0 & 0x0F {
                    0 => false,
                    1 => true,
                    _ => {
                        return Err(DatatypeError::MalformedStructure {
                            class: "VariableLength",
                            detail: "unknown variable-length kind",
                        })
                    }
                };
                let padding = if is_string {
                    Some(parse_string_padding((bf0 >> 4) & 0x0F)?)
                } else {
                    None
                };
                let charset = if is_string {
                    Some(parse_charset(bf1 & 0x0F)?)
                } else {
                    None
                };
                let base_type = Datatype::decode_le(cur)?;
                Ok(Datatype::VariableLength {
                    size,
                    is_string,
                    padding,
                    charset,
                    base_type: Box::new(base_type),
                })
            }
            10 => {
                require_version("Array", version, 2, 3)?;
                let ndims = cur.read_u8()? as usize;
                if version == 2 {
                    cur.skip(3)?; // reserved
                }
                let mut dimensions = Vec::with_capacity(ndims);
                for _ in 0..ndims {
                    dimensions.push(cur.read_u32()?);
                }
                if version == 2 {
                    // Permutation indices, unused.
                    cur.skip(ndims * 4)?;
                }
                let base_type = Datatype::decode_le(cur)?;
                Ok(Datatype::Array {
                    size,
                    base_type: Box::new(base_type),
                    dimensions,
                })
            }
            other => Err(DatatypeError::UnknownClass(other)),
        }
    }

    /// Size in bytes of one element of this type.
    pub fn type_size(&self) -> u32 {
        match self {
            Datatype::FixedPoint { size, .. } => *size,
            Datatype::FloatingPoint { size, .. } => *size,
            Datatype::Time { size, .. } => *size,
            Datatype::String { size, .. } => *size,
            Datatype::BitField { size, .. } => *size,
            Datatype::Opaque { size, .. } => *size,
            Datatype::Compound { size, .. } => *size,
            Datatype::Reference { size, .. } => *size,
            Datatype::Enumeration { size, .. } => *size,
            Datatype::VariableLength { size, .. } => *size,
            Datatype::Array { size, .. } => *size,
        }
    }

    /// Human-readable class name, used in error reporting.
    pub fn class_name(&self) -> &'static str {
        match self {
            Datatype::FixedPoint { .. } => "FixedPoint",
            Datatype::FloatingPoint { .. } => "FloatingPoint",
            Datatype::Time { .. } => "Time",
            Datatype::String { .. } => "String",
            Datatype::BitField { .. } => "BitField",
            Datatype::Opaque { .. } => "Opaque",
            Datatype::Compound { .. } => "Compound",
            Datatype::Reference { .. } => "Reference",
            Datatype::Enumeration { .. } => "Enumeration",
            Datatype::VariableLength { .. } => "VariableLength",
            Datatype::Array { .. } => "Array",
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_messages::*;
    use super::*;

    fn decode(data: &[u8]) -> Result<(Datatype, usize), DatatypeError> {
        let mut cur = Cursor::new(data);
        let dt = Datatype::decode(&mut cur)?;
        Ok((dt, cur.position()))
    }

    #[test]
    fn fixed_point_u8() {
        let data = build_fixed_point(1, false, false, 0, 8);
        let (dt, consumed) = decode(&data).unwrap();
        assert_eq!(consumed, 12);
        match dt {
            Datatype::FixedPoint {
                size,
                byte_order,
                signed,
                bit_offset,
                bit_precision,
                kind,
                ..
            } => {
                assert_eq!(size, 1);
                assert_eq!(byte_order, ByteOrder::LittleEndian);
                assert!(!signed);
                assert_eq!(bit_offset, 0);
                assert_eq!(bit_precision, 8);
                assert_eq!(kind, ScalarKind::UInt8);
            }
            other => panic!("expected FixedPoint, got {other:?}"),
        }
    }

    #[test]
    fn fixed_point_i64_be() {
        let data = build_fixed_point(8, true, true, 0, 64);
        let (dt, _) = decode(&data).unwrap();
        match dt {
            Datatype::FixedPoint {
                byte_order, kind, ..
            } => {
                assert_eq!(byte_order, ByteOrder::BigEndian);
                assert_eq!(kind, ScalarKind::Int64);
            }
            other => panic!("expected FixedPoint, got {other:?}"),
        }
    }

    #[test]
    fn fixed_point_unaligned_precision_unsupported() {
        let data = build_fixed_point(3, false, true, 0, 24);
        let err = decode(&data).unwrap_err();
        assert!(matches!(
            err,
            DatatypeError::UnsupportedLayout {
                class: "FixedPoint",
                ..
            }
        ));
    }

    #[test]
    fn fixed_point_nonzero_offset_unsupported() {
        let data = build_fixed_point(4, false, true, 3, 29);
        let err = decode(&data).unwrap_err();
        assert!(matches!(err, DatatypeError::UnsupportedLayout { .. }));
    }

    #[test]
    fn fixed_point_unsigned_64_unsupported() {
        let data = build_fixed_point(8, false, false, 0, 64);
        let err = decode(&data).unwrap_err();
        assert!(matches!(err, DatatypeError::UnsupportedLayout { .. }));
    }

    #[test]
    fn float_binary32_le() {
        let data = build_float_ieee(4, false);
        let (dt, consumed) = decode(&data).unwrap();
        assert_eq!(consumed, 20);
        match dt {
            Datatype::FloatingPoint {
                size,
                byte_order,
                kind,
                exponent_bias,
                ..
            } => {
                assert_eq!(size, 4);
                assert_eq!(byte_order, ByteOrder::LittleEndian);
                assert_eq!(kind, FloatKind::Binary32);
                assert_eq!(exponent_bias, 127);
            }
            other => panic!("expected FloatingPoint, got {other:?}"),
        }
    }

    #[test]
    fn float_binary64_be() {
        let data = build_float_ieee(8, true);
        let (dt, _) = decode(&data).unwrap();
        match dt {
            Datatype::FloatingPoint {
                byte_order, kind, ..
            } => {
                assert_eq!(byte_order, ByteOrder::BigEndian);
                assert_eq!(kind, FloatKind::Binary64);
            }
            other => panic!("expected FloatingPoint, got {other:?}"),
        }
    }

    #[test]
    fn float_noncanonical_unsupported() {
        // binary32 fields but a wrong exponent bias
        let data = build_float(4, false, 31, 23, 8, 0, 23, 126);
        let err = decode(&data).unwrap_err();
        assert!(matches!(
            err,
            DatatypeError::UnsupportedLayout {
                class: "FloatingPoint",
                ..
            }
        ));
    }

    #[test]
    fn float_vax_order_unsupported() {
        let mut data = build_float_ieee(8, false);
        data[1] |= 0x40; // set the high byte-order bit
        let err = decode(&data).unwrap_err();
        assert_eq!(
            err,
            DatatypeError::UnsupportedLayout {
                class: "FloatingPoint",
                detail: "VAX byte order",
            }
        );
    }

    #[test]
    fn string_null_terminated_ascii() {
        let data = build_string(10, 0, 0);
        let (dt, consumed) = decode(&data).unwrap();
        assert_eq!(consumed, 8);
        assert_eq!(
            dt,
            Datatype::String {
                size: 10,
                padding: StringPadding::NullTerminate,
                charset: CharacterSet::Ascii,
            }
        );
    }

    #[test]
    fn string_space_padded_utf8() {
        let data = build_string(32, 2, 1);
        let (dt, _) = decode(&data).unwrap();
        assert_eq!(
            dt,
            Datatype::String {
                size: 32,
                padding: StringPadding::SpacePad,
                charset: CharacterSet::Utf8,
            }
        );
    }

    #[test]
    fn string_invalid_padding_is_malformed() {
        let data = build_string(10, 3, 0);
        let err = decode(&data).unwrap_err();
        assert!(matches!(err, DatatypeError::MalformedStructure { .. }));
    }

    #[test]
    fn string_invalid_charset_is_malformed() {
        let data = build_string(10, 0, 2);
        let err = decode(&data).unwrap_err();
        assert!(matches!(err, DatatypeError::MalformedStructure { .. }));
    }

    #[test]
    fn bitfield_header() {
        let mut data = build_dt_header(4, 1, [0, 0, 0], 2);
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(&16u16.to_le_bytes());
        let (dt, _) = decode(&data).unwrap();
        match dt {
            Datatype::BitField {
                size,
                bit_offset,
                bit_precision,
                ..
            } => {
                assert_eq!((size, bit_offset, bit_precision), (2, 0, 16));
            }
            other => panic!("expected BitField, got {other:?}"),
        }
    }

    #[test]
    fn opaque_tag_padded() {
        let mut data = build_dt_header(5, 1, [4, 0, 0], 64);
        data.extend_from_slice(b"BLOB");
        data.extend_from_slice(&[0, 0, 0, 0]); // tag pad to 8
        let (dt, consumed) = decode(&data).unwrap();
        assert_eq!(consumed, 16);
        assert_eq!(
            dt,
            Datatype::Opaque {
                size: 64,
                tag: b"BLOB".to_vec(),
            }
        );
    }

    #[test]
    fn time_header() {
        let mut data = build_dt_header(2, 1, [1, 0, 0], 8);
        data.extend_from_slice(&64u16.to_le_bytes());
        let (dt, consumed) = decode(&data).unwrap();
        assert_eq!(consumed, 10);
        assert_eq!(
            dt,
            Datatype::Time {
                size: 8,
                byte_order: ByteOrder::BigEndian,
                bit_precision: 64,
            }
        );
    }

    #[test]
    fn compound_v3_two_members() {
        // size 12 < 256, so member offsets are 1 byte wide
        let mut data = build_dt_header(6, 3, [2, 0, 0], 12);
        data.extend_from_slice(b"x\0");
        data.push(0);
        data.extend_from_slice(&build_fixed_point(4, false, false, 0, 32));
        data.extend_from_slice(b"y\0");
        data.push(4);
        data.extend_from_slice(&build_float_ieee(8, false));

        let (dt, _) = decode(&data).unwrap();
        match dt {
            Datatype::Compound { size, members } => {
                assert_eq!(size, 12);
                assert_eq!(members.len(), 2);
                assert_eq!(members[0].name, "x");
                assert_eq!(members[0].byte_offset, 0);
                assert_eq!(members[1].name, "y");
                assert_eq!(members[1].byte_offset, 4);
                assert!(matches!(
                    members[0].datatype,
                    Datatype::FixedPoint { size: 4, .. }
                ));
                assert!(matches!(
                    members[1].datatype,
                    Datatype::FloatingPoint { size: 8, .. }
                ));
            }
            other => panic!("expected Compound, got {other:?}"),
        }
    }

    #[test]
    fn compound_v3_wide_offsets() {
        // size 300 needs 2-byte member offsets
        let mut data = build_dt_header(6, 3, [1, 0, 0], 300);
        data.extend_from_slice(b"tail\0");
        data.extend_from_slice(&296u16.to_le_bytes());
        data.extend_from_slice(&build_fixed_point(4, false, true, 0, 32));

        let (dt, _) = decode(&data).unwrap();
        match dt {
            Datatype::Compound { members, .. } => {
                assert_eq!(members[0].byte_offset, 296);
            }
            other => panic!("expected Compound, got {other:?}"),
        }
    }

    #[test]
    fn compound_v2_padded_names() {
        // v2: name padded to 8 bytes, fixed 4-byte offset, no legacy dims
        let mut data = build_dt_header(6, 2, [1, 0, 0], 8);
        data.extend_from_slice(b"value\0\0\0"); // "value" + NUL padded to 8
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&build_fixed_point(8, false, true, 0, 64));

        let (dt, _) = decode(&data).unwrap();
        match dt {
            Datatype::Compound { members, .. } => {
                assert_eq!(members[0].name, "value");
                assert_eq!(members[0].byte_offset, 0);
            }
            other => panic!("expected Compound, got {other:?}"),
        }
    }

    #[test]
    fn compound_v1_legacy_dimension_fields() {
        let mut data = build_dt_header(6, 1, [1, 0, 0], 4);
        data.extend_from_slice(b"a\0\0\0\0\0\0\0"); // "a" + NUL padded to 8
        data.extend_from_slice(&0u32.to_le_bytes()); // offset
        data.push(0); // dimensionality
        data.extend_from_slice(&[0u8; 3]); // reserved
        data.extend_from_slice(&0u32.to_le_bytes()); // permutation
        data.extend_from_slice(&[0u8; 16]); // four dimension sizes
        data.extend_from_slice(&build_fixed_point(4, false, true, 0, 32));

        let (dt, _) = decode(&data).unwrap();
        match dt {
            Datatype::Compound { members, .. } => {
                assert_eq!(members.len(), 1);
                assert_eq!(members[0].name, "a");
                assert!(matches!(
                    members[0].datatype,
                    Datatype::FixedPoint {
                        kind: ScalarKind::Int32,
                        ..
                    }
                ));
            }
            other => panic!("expected Compound, got {other:?}"),
        }
    }

    #[test]
    fn compound_member_offset_out_of_range() {
        let mut data = build_dt_header(6, 3, [1, 0, 0], 4);
        data.extend_from_slice(b"x\0");
        data.push(4); // offset == size
        data.extend_from_slice(&build_fixed_point(4, false, true, 0, 32));
        let err = decode(&data).unwrap_err();
        assert_eq!(
            err,
            DatatypeError::MalformedStructure {
                class: "Compound",
                detail: "member offset outside compound extent",
            }
        );
    }

    #[test]
    fn compound_unsupported_version() {
        let data = build_dt_header(6, 5, [0, 0, 0], 4);
        let err = decode(&data).unwrap_err();
        assert_eq!(
            err,
            DatatypeError::UnsupportedVersion {
                class: "Compound",
                version: 5,
            }
        );
    }

    #[test]
    fn reference_kinds() {
        let data = build_dt_header(7, 1, [0, 0, 0], 8);
        let (dt, _) = decode(&data).unwrap();
        assert_eq!(
            dt,
            Datatype::Reference {
                size: 8,
                ref_kind: ReferenceKind::Object,
                ref_version: 0,
            }
        );

        let data = build_dt_header(7, 1, [1, 0, 0], 8);
        let (dt, _) = decode(&data).unwrap();
        assert!(matches!(
            dt,
            Datatype::Reference {
                ref_kind: ReferenceKind::DatasetRegion,
                ..
            }
        ));
    }

    #[test]
    fn reference_v4_subversion() {
        let data = build_dt_header(7, 4, [0x21, 0, 0], 8); // type = 1, sub-version = 2
        let (dt, _) = decode(&data).unwrap();
        assert_eq!(
            dt,
            Datatype::Reference {
                size: 8,
                ref_kind: ReferenceKind::DatasetRegion,
                ref_version: 2,
            }
        );
    }

    #[test]
    fn reference_invalid_type() {
        let data = build_dt_header(7, 1, [5, 0, 0], 8);
        let err = decode(&data).unwrap_err();
        assert!(matches!(err, DatatypeError::MalformedStructure { .. }));
    }

    #[test]
    fn enumeration_mapping() {
        let mut data = build_dt_header(8, 3, [3, 0, 0], 4);
        data.extend_from_slice(&build_fixed_point(4, false, true, 0, 32));
        data.extend_from_slice(b"RED\0GREEN\0BLUE\0");
        data.extend_from_slice(&0i32.to_le_bytes());
        data.extend_from_slice(&1i32.to_le_bytes());
        data.extend_from_slice(&2i32.to_le_bytes());

        let (dt, _) = decode(&data).unwrap();
        match dt {
            Datatype::Enumeration {
                size,
                base_type,
                mapping,
            } => {
                assert_eq!(size, 4);
                assert!(matches!(
                    *base_type,
                    Datatype::FixedPoint {
                        kind: ScalarKind::Int32,
                        ..
                    }
                ));
                assert_eq!(mapping.names, vec!["RED", "GREEN", "BLUE"]);
                assert_eq!(mapping.values, vec![0, 1, 2]);
                assert_eq!(mapping.name_of(1), Some("GREEN"));
                assert_eq!(mapping.name_of(7), None);
                assert_eq!(mapping.value_of("BLUE"), Some(2));
            }
            other => panic!("expected Enumeration, got {other:?}"),
        }
    }

    #[test]
    fn enumeration_v1_padded_names() {
        let mut data = build_dt_header(8, 1, [2, 0, 0], 2);
        data.extend_from_slice(&build_fixed_point(2, false, false, 0, 16));
        data.extend_from_slice(b"ON\0\0\0\0\0\0"); // padded to 8
        data.extend_from_slice(b"OFF\0\0\0\0\0");
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());

        let (dt, _) = decode(&data).unwrap();
        match dt {
            Datatype::Enumeration { mapping, .. } => {
                assert_eq!(mapping.names, vec!["ON", "OFF"]);
                assert_eq!(mapping.values, vec![1, 0]);
            }
            other => panic!("expected Enumeration, got {other:?}"),
        }
    }

    #[test]
    fn enumeration_non_integer_base_is_malformed() {
        let mut data = build_dt_header(8, 3, [1, 0, 0], 4);
        data.extend_from_slice(&build_float_ieee(4, false));
        data.extend_from_slice(b"X\0");
        data.extend_from_slice(&0u32.to_le_bytes());
        let err = decode(&data).unwrap_err();
        assert_eq!(
            err,
            DatatypeError::MalformedStructure {
                class: "Enumeration",
                detail: "base type must be fixed-point",
            }
        );
    }

    #[test]
    fn variable_length_string_utf8() {
        let data = build_vl_string(0, 1);
        let (dt, _) = decode(&data).unwrap();
        match dt {
            Datatype::VariableLength {
                is_string,
                padding,
                charset,
                base_type,
                ..
            } => {
                assert!(is_string);
                assert_eq!(padding, Some(StringPadding::NullTerminate));
                assert_eq!(charset, Some(CharacterSet::Utf8));
                assert_eq!(base_type.type_size(), 1);
            }
            other => panic!("expected VariableLength, got {other:?}"),
        }
    }

    #[test]
    fn variable_length_sequence() {
        let data = build_vl_sequence(&build_float_ieee(4, false));
        let (dt, _) = decode(&data).unwrap();
        match dt {
            Datatype::VariableLength {
                is_string,
                padding,
                charset,
                base_type,
                ..
            } => {
                assert!(!is_string);
                assert_eq!(padding, None);
                assert_eq!(charset, None);
                assert_eq!(base_type.type_size(), 4);
            }
            other => panic!("expected VariableLength, got {other:?}"),
        }
    }

    #[test]
    fn array_v3_two_dims() {
        let mut data = build_dt_header(10, 3, [0, 0, 0], 48);
        data.push(2); // ndims
        data.extend_from_slice(&3u32.to_le_bytes());
        data.extend_from_slice(&4u32.to_le_bytes());
        data.extend_from_slice(&build_fixed_point(4, false, true, 0, 32));

        let (dt, _) = decode(&data).unwrap();
        match dt {
            Datatype::Array {
                dimensions,
                base_type,
                ..
            } => {
                assert_eq!(dimensions, vec![3, 4]);
                assert!(matches!(*base_type, Datatype::FixedPoint { size: 4, .. }));
            }
            other => panic!("expected Array, got {other:?}"),
        }
    }

    #[test]
    fn array_v2_with_permutations() {
        let mut data = build_dt_header(10, 2, [0, 0, 0], 8);
        data.push(1); // ndims
        data.extend_from_slice(&[0u8; 3]); // reserved
        data.extend_from_slice(&2u32.to_le_bytes()); // dim
        data.extend_from_slice(&0u32.to_le_bytes()); // permutation
        data.extend_from_slice(&build_fixed_point(4, false, true, 0, 32));

        let (dt, _) = decode(&data).unwrap();
        match dt {
            Datatype::Array { dimensions, .. } => assert_eq!(dimensions, vec![2]),
            other => panic!("expected Array, got {other:?}"),
        }
    }

    #[test]
    fn array_v1_unsupported() {
        let data = build_dt_header(10, 1, [0, 0, 0], 8);
        let err = decode(&data).unwrap_err();
        assert_eq!(
            err,
            DatatypeError::UnsupportedVersion {
                class: "Array",
                version: 1,
            }
        );
    }

    #[test]
    fn nested_compound_array_enum() {
        // Compound { data: Array[2] of Enum(i32, {A:0, B:1}) }
        let mut enum_bytes = build_dt_header(8, 3, [2, 0, 0], 4);
        enum_bytes.extend_from_slice(&build_fixed_point(4, false, true, 0, 32));
        enum_bytes.extend_from_slice(b"A\0B\0");
        enum_bytes.extend_from_slice(&0i32.to_le_bytes());
        enum_bytes.extend_from_slice(&1i32.to_le_bytes());

        let mut array_bytes = build_dt_header(10, 3, [0, 0, 0], 8);
        array_bytes.push(1);
        array_bytes.extend_from_slice(&2u32.to_le_bytes());
        array_bytes.extend_from_slice(&enum_bytes);

        let mut data = build_dt_header(6, 3, [1, 0, 0], 8);
        data.extend_from_slice(b"data\0");
        data.push(0);
        data.extend_from_slice(&array_bytes);

        let (dt, _) = decode(&data).unwrap();
        match dt {
            Datatype::Compound { members, .. } => {
                assert_eq!(members[0].name, "data");
                match &members[0].datatype {
                    Datatype::Array {
                        dimensions,
                        base_type,
                        ..
                    } => {
                        assert_eq!(dimensions, &[2]);
                        match base_type.as_ref() {
                            Datatype::Enumeration { mapping, .. } => {
                                assert_eq!(mapping.names, vec!["A", "B"]);
                            }
                            other => panic!("expected Enumeration, got {other:?}"),
                        }
                    }
                    other => panic!("expected Array, got {other:?}"),
                }
            }
            other => panic!("expected Compound, got {other:?}"),
        }
    }

    #[test]
    fn unknown_class_codes() {
        for class in [11u8, 13, 15] {
            let data = build_dt_header(class, 1, [0, 0, 0], 4);
            let err = decode(&data).unwrap_err();
            assert_eq!(err, DatatypeError::UnknownClass(class));
        }
    }

    #[test]
    fn truncated_header_is_io_failure() {
        let data = [0u8; 4];
        let err = decode(&data).unwrap_err();
        assert!(matches!(err, DatatypeError::IoFailure { .. }));
    }

    #[test]
    fn decode_restores_cursor_byte_order() {
        let data = build_fixed_point(4, true, true, 0, 32);
        let mut cur = Cursor::new(&data);
        cur.set_byte_order(ByteOrder::BigEndian);
        Datatype::decode(&mut cur).unwrap();
        assert_eq!(cur.byte_order(), ByteOrder::BigEndian);
    }

    #[test]
    fn type_size_per_class() {
        let data = build_fixed_point(4, false, true, 0, 32);
        let (dt, _) = decode(&data).unwrap();
        assert_eq!(dt.type_size(), 4);
        assert_eq!(dt.class_name(), "FixedPoint");
    }
}
