//! Seekable, byte-order-switchable, bit-granular reader over a byte slice.
//!
//! All multi-byte reads honor the cursor's active [`ByteOrder`]. Datatype
//! message headers are always little-endian, while the values they describe
//! carry their own declared order, so readers flip the active order per
//! value via [`Cursor::with_order`] and the previous order is restored on
//! every exit path.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use byteorder::{BigEndian, ByteOrder as _, LittleEndian};

use crate::error::DatatypeError;

/// Byte order used for multi-byte reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    LittleEndian,
    BigEndian,
}

/// Random-access reader over an in-memory byte buffer.
///
/// Tracks a byte position, a running bit offset for bit-granular reads,
/// the active byte order, and a LIFO stack of marked positions used for
/// out-of-band indirection (a variable-length value whose element type is
/// itself variable-length needs properly nested save/restore, not a
/// single-slot mark).
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
    /// Bit offset within the current byte, 0-7. Nonzero only between
    /// bit-granular reads; byte-level reads expect byte alignment.
    bit: u8,
    order: ByteOrder,
    marks: Vec<usize>,
}

impl<'a> Cursor<'a> {
    /// Create a cursor at position 0 with little-endian byte order.
    pub fn new(data: &'a [u8]) -> Cursor<'a> {
        Cursor {
            data,
            pos: 0,
            bit: 0,
            order: ByteOrder::LittleEndian,
            marks: Vec::new(),
        }
    }

    /// Current byte position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of bytes from the current position to the end of the buffer.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Seek to an absolute byte position. Positions up to and including
    /// the buffer length are valid; anything beyond is an I/O failure.
    pub fn seek(&mut self, pos: usize) -> Result<(), DatatypeError> {
        if pos > self.data.len() {
            return Err(DatatypeError::IoFailure {
                expected: pos,
                available: self.data.len(),
            });
        }
        self.pos = pos;
        self.bit = 0;
        Ok(())
    }

    /// Advance the position by `n` bytes.
    pub fn skip(&mut self, n: usize) -> Result<(), DatatypeError> {
        self.ensure(n)?;
        self.pos += n;
        Ok(())
    }

    /// The active byte order.
    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    /// Set the active byte order.
    pub fn set_byte_order(&mut self, order: ByteOrder) {
        self.order = order;
    }

    /// Run `f` with the active byte order temporarily set to `order`.
    ///
    /// The previous order is restored whether `f` succeeds or fails, so
    /// nested reads with differing orders never leak state to siblings.
    pub fn with_order<T>(
        &mut self,
        order: ByteOrder,
        f: impl FnOnce(&mut Cursor<'a>) -> Result<T, DatatypeError>,
    ) -> Result<T, DatatypeError> {
        let prev = self.order;
        self.order = order;
        let out = f(self);
        self.order = prev;
        out
    }

    /// Push the current position onto the mark stack.
    pub fn mark(&mut self) {
        self.marks.push(self.pos);
    }

    /// Pop the most recent mark and seek back to it.
    ///
    /// Marks and resets must be balanced; resetting with no mark set is
    /// an error.
    pub fn reset(&mut self) -> Result<(), DatatypeError> {
        match self.marks.pop() {
            Some(pos) => {
                self.pos = pos;
                self.bit = 0;
                Ok(())
            }
            None => Err(DatatypeError::MalformedStructure {
                class: "Cursor",
                detail: "position reset without a matching mark",
            }),
        }
    }

    fn ensure(&self, needed: usize) -> Result<(), DatatypeError> {
        match self.pos.checked_add(needed) {
            Some(end) if end <= self.data.len() => Ok(()),
            _ => Err(DatatypeError::IoFailure {
                expected: self.pos.saturating_add(needed),
                available: self.data.len(),
            }),
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DatatypeError> {
        self.ensure(n)?;
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Read `n` raw bytes.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], DatatypeError> {
        self.take(n)
    }

    pub fn read_u8(&mut self) -> Result<u8, DatatypeError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8, DatatypeError> {
        Ok(self.take(1)?[0] as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16, DatatypeError> {
        let s = self.take(2)?;
        Ok(match self.order {
            ByteOrder::LittleEndian => LittleEndian::read_u16(s),
            ByteOrder::BigEndian => BigEndian::read_u16(s),
        })
    }

    pub fn read_i16(&mut self) -> Result<i16, DatatypeError> {
        Ok(self.read_u16()? as i16)
    }

    pub fn read_u32(&mut self) -> Result<u32, DatatypeError> {
        let s = self.take(4)?;
        Ok(match self.order {
            ByteOrder::LittleEndian => LittleEndian::read_u32(s),
            ByteOrder::BigEndian => BigEndian::read_u32(s),
        })
    }

    pub fn read_i32(&mut self) -> Result<i32, DatatypeError> {
        Ok(self.read_u32()? as i32)
    }

    pub fn read_u64(&mut self) -> Result<u64, DatatypeError> {
        let s = self.take(8)?;
        Ok(match self.order {
            ByteOrder::LittleEndian => LittleEndian::read_u64(s),
            ByteOrder::BigEndian => BigEndian::read_u64(s),
        })
    }

    pub fn read_i64(&mut self) -> Result<i64, DatatypeError> {
        Ok(self.read_u64()? as i64)
    }

    pub fn read_f32(&mut self) -> Result<f32, DatatypeError> {
        let s = self.take(4)?;
        Ok(match self.order {
            ByteOrder::LittleEndian => LittleEndian::read_f32(s),
            ByteOrder::BigEndian => BigEndian::read_f32(s),
        })
    }

    pub fn read_f64(&mut self) -> Result<f64, DatatypeError> {
        let s = self.take(8)?;
        Ok(match self.order {
            ByteOrder::LittleEndian => LittleEndian::read_f64(s),
            ByteOrder::BigEndian => BigEndian::read_f64(s),
        })
    }

    /// Read an unsigned integer of 1 to 8 bytes in the active byte order.
    pub fn read_uint(&mut self, nbytes: usize) -> Result<u64, DatatypeError> {
        if !(1..=8).contains(&nbytes) {
            return Err(DatatypeError::MalformedStructure {
                class: "Cursor",
                detail: "integer read must be 1 to 8 bytes wide",
            });
        }
        let s = self.take(nbytes)?;
        Ok(match self.order {
            ByteOrder::LittleEndian => LittleEndian::read_uint(s, nbytes),
            ByteOrder::BigEndian => BigEndian::read_uint(s, nbytes),
        })
    }

    /// Read `count` bits (at most 64) as an unsigned integer.
    ///
    /// Bits are consumed LSB-first within each byte; the first bit read
    /// becomes the least significant bit of the result. The running bit
    /// offset carries across calls until [`Cursor::align_to_byte`].
    pub fn read_bits(&mut self, count: u16) -> Result<u64, DatatypeError> {
        if count > 64 {
            return Err(DatatypeError::MalformedStructure {
                class: "Cursor",
                detail: "bit read wider than 64 bits",
            });
        }
        let mut out = 0u64;
        for i in 0..count {
            if self.pos >= self.data.len() {
                return Err(DatatypeError::IoFailure {
                    expected: self.pos + 1,
                    available: self.data.len(),
                });
            }
            let bit = (self.data[self.pos] >> self.bit) & 1;
            out |= u64::from(bit) << i;
            self.bit += 1;
            if self.bit == 8 {
                self.bit = 0;
                self.pos += 1;
            }
        }
        Ok(out)
    }

    /// Advance the running bit offset by `count` bits without reading.
    pub fn skip_bits(&mut self, count: u16) -> Result<(), DatatypeError> {
        let total = self.bit as usize + count as usize;
        let end = self.pos + total / 8;
        if end > self.data.len() {
            return Err(DatatypeError::IoFailure {
                expected: end,
                available: self.data.len(),
            });
        }
        self.pos = end;
        self.bit = (total % 8) as u8;
        Ok(())
    }

    /// Skip forward to the next byte boundary if mid-byte.
    pub fn align_to_byte(&mut self) {
        if self.bit != 0 {
            self.bit = 0;
            self.pos += 1;
        }
    }
}
