//! Typed value reading driven by a decoded [`Datatype`].
//!
//! A datatype tree is decoded once and then reused to read any number of
//! values. Every read leaves the cursor at a deterministic position and
//! restores the cursor's byte order, also on failure, so a failed read
//! never poisons the descriptor or sibling reads.

#[cfg(not(feature = "std"))]
use alloc::{string::String, vec::Vec};

use crate::cursor::{ByteOrder, Cursor};
use crate::datatype::{
    CharacterSet, CompoundMember, Datatype, FloatKind, ScalarKind, StringPadding,
};
use crate::error::DatatypeError;
use crate::global_heap::GlobalHeapResolver;
use crate::value::Value;

/// Trim trailing pad bytes per the padding convention and decode the rest.
///
/// Null-terminate and null-pad both strip trailing NULs; space-pad strips
/// trailing spaces. UTF-8 decoding covers the ASCII charset as a subset.
fn decode_padded_string(bytes: &[u8], padding: StringPadding, charset: CharacterSet) -> String {
    let pad = match padding {
        StringPadding::NullTerminate | StringPadding::NullPad => 0u8,
        StringPadding::SpacePad => b' ',
    };
    let end = bytes.iter().rposition(|&b| b != pad).map_or(0, |p| p + 1);
    match charset {
        CharacterSet::Ascii | CharacterSet::Utf8 => {
            String::from_utf8_lossy(&bytes[..end]).into_owned()
        }
    }
}

fn read_scalar(cur: &mut Cursor<'_>, kind: ScalarKind) -> Result<Value, DatatypeError> {
    Ok(match kind {
        ScalarKind::Int8 => Value::Int8(cur.read_i8()?),
        ScalarKind::Int16 => Value::Int16(cur.read_i16()?),
        ScalarKind::Int32 => Value::Int32(cur.read_i32()?),
        ScalarKind::Int64 => Value::Int64(cur.read_i64()?),
        ScalarKind::UInt8 => Value::UInt8(cur.read_u8()?),
        ScalarKind::UInt16 => Value::UInt16(cur.read_u16()?),
        ScalarKind::UInt32 => Value::UInt32(cur.read_u32()?),
    })
}

fn read_bit_field(
    cur: &mut Cursor<'_>,
    size: u32,
    bit_offset: u16,
    bit_precision: u16,
) -> Result<Value, DatatypeError> {
    if bit_precision > 64 {
        return Err(DatatypeError::UnsupportedLayout {
            class: "BitField",
            detail: "precision wider than 64 bits",
        });
    }
    let total_bits = u32::from(bit_offset) + u32::from(bit_precision);
    if total_bits.div_ceil(8) != size {
        return Err(DatatypeError::MalformedStructure {
            class: "BitField",
            detail: "bit span does not match element size",
        });
    }
    cur.skip_bits(bit_offset)?;
    let v = cur.read_bits(bit_precision)?;
    cur.align_to_byte();
    Ok(Value::UInt64(v))
}

fn read_compound(
    cur: &mut Cursor<'_>,
    heap: &dyn GlobalHeapResolver,
    size: u32,
    members: &[CompoundMember],
) -> Result<Value, DatatypeError> {
    let start = cur.position();
    let result = (|| -> Result<Value, DatatypeError> {
        let mut fields = Vec::with_capacity(members.len());
        for member in members {
            cur.seek(start + member.byte_offset as usize)?;
            let value = member.datatype.read(cur, heap)?;
            fields.push((member.name.clone(), value));
        }
        Ok(Value::Struct(fields))
    })();
    // Always land at the struct end, also when a member read failed or
    // member layouts overlap or leave gaps.
    cur.seek(start + size as usize)?;
    result
}

fn read_variable_length(
    cur: &mut Cursor<'_>,
    heap: &dyn GlobalHeapResolver,
    is_string: bool,
    padding: Option<StringPadding>,
    charset: Option<CharacterSet>,
    base_type: &Datatype,
) -> Result<Value, DatatypeError> {
    // Element layout: reserved(4) + collection address(4) + object
    // index(4). The reserved field is undocumented in the format
    // specification and preserved as a skip.
    let (address, index) = cur.with_order(ByteOrder::LittleEndian, |c| {
        c.skip(4)?;
        let address = c.read_i32()?;
        let index = c.read_u32()?;
        Ok((address, index))
    })?;

    if address <= 0 {
        // No data; the heap resolver is never consulted.
        return Ok(Value::Null);
    }
    let span = match heap.resolve(address as u64, index) {
        Some(span) => span,
        // A missing heap object is recovered as null, not an error.
        None => return Ok(Value::Null),
    };

    cur.mark();
    let result = (|| -> Result<Value, DatatypeError> {
        cur.seek(span.offset as usize)?;
        if is_string {
            let bytes = cur.read_bytes(span.length as usize)?;
            let padding = padding.unwrap_or(StringPadding::NullTerminate);
            let charset = charset.unwrap_or(CharacterSet::Utf8);
            Ok(Value::Str(decode_padded_string(bytes, padding, charset)))
        } else {
            let elem_size = u64::from(base_type.type_size());
            if elem_size == 0 {
                return Err(DatatypeError::MalformedStructure {
                    class: "VariableLength",
                    detail: "zero-size element type",
                });
            }
            // Bounded by the heap object's length, not a fixed element
            // size: read as many base elements as fit.
            let count = (span.length / elem_size) as usize;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(base_type.read(cur, heap)?);
            }
            Ok(Value::Seq(items))
        }
    })();
    cur.reset()?;
    result
}

impl Datatype {
    /// Read one value laid out per this datatype at the cursor position.
    ///
    /// The cursor's byte order is restored on every exit path; scalar
    /// members switch to their declared order only for the duration of
    /// their own read.
    pub fn read(
        &self,
        cur: &mut Cursor<'_>,
        heap: &dyn GlobalHeapResolver,
    ) -> Result<Value, DatatypeError> {
        match self {
            Datatype::FixedPoint {
                byte_order, kind, ..
            } => cur.with_order(*byte_order, |c| read_scalar(c, *kind)),
            Datatype::FloatingPoint {
                byte_order, kind, ..
            } => cur.with_order(*byte_order, |c| {
                Ok(match kind {
                    FloatKind::Binary32 => Value::Float32(c.read_f32()?),
                    FloatKind::Binary64 => Value::Float64(c.read_f64()?),
                })
            }),
            // Opaque unsigned counter; the format leaves time semantics
            // unspecified, so no calendar interpretation is attempted.
            Datatype::Time {
                size, byte_order, ..
            } => {
                if !(1..=8).contains(size) {
                    return Err(DatatypeError::UnsupportedLayout {
                        class: "Time",
                        detail: "counter wider than 8 bytes",
                    });
                }
                cur.with_order(*byte_order, |c| Ok(Value::UInt64(c.read_uint(*size as usize)?)))
            }
            Datatype::String {
                size,
                padding,
                charset,
            } => {
                let bytes = cur.read_bytes(*size as usize)?;
                Ok(Value::Str(decode_padded_string(bytes, *padding, *charset)))
            }
            Datatype::BitField {
                size,
                bit_offset,
                bit_precision,
                ..
            } => read_bit_field(cur, *size, *bit_offset, *bit_precision),
            Datatype::Opaque { .. } => Err(DatatypeError::UnsupportedLayout {
                class: "Opaque",
                detail: "opaque value layout is not implemented",
            }),
            Datatype::Compound { size, members } => read_compound(cur, heap, *size, members),
            Datatype::Reference { .. } => {
                cur.with_order(ByteOrder::LittleEndian, |c| Ok(Value::Ref(c.read_u64()?)))
            }
            // Transparent pass-through; the name/value table is for
            // symbolic lookup only.
            Datatype::Enumeration { base_type, .. } => base_type.read(cur, heap),
            Datatype::VariableLength {
                is_string,
                padding,
                charset,
                base_type,
                ..
            } => read_variable_length(cur, heap, *is_string, *padding, *charset, base_type),
            Datatype::Array { .. } => Err(DatatypeError::UnsupportedLayout {
                class: "Array",
                detail: "array value layout is not implemented",
            }),
        }
    }

    /// Read `count` consecutive values.
    pub fn read_many(
        &self,
        cur: &mut Cursor<'_>,
        heap: &dyn GlobalHeapResolver,
        count: usize,
    ) -> Result<Vec<Value>, DatatypeError> {
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(self.read(cur, heap)?);
        }
        Ok(out)
    }

    /// Read a row-major `rows` x `cols` grid of values.
    pub fn read_grid(
        &self,
        cur: &mut Cursor<'_>,
        heap: &dyn GlobalHeapResolver,
        rows: usize,
        cols: usize,
    ) -> Result<Vec<Vec<Value>>, DatatypeError> {
        let mut out = Vec::with_capacity(rows);
        for _ in 0..rows {
            out.push(self.read_many(cur, heap, cols)?);
        }
        Ok(out)
    }
}
