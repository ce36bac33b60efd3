//! HDF5 Global Heap collection parsing and reference resolution.
//!
//! Variable-length values live out-of-band in global heap collections
//! (signature `GCOL`), addressed by a (collection address, object index)
//! pair. The reader only needs the absolute byte range of an object, so
//! parsing records spans into the underlying buffer instead of copying
//! object data.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use crate::error::DatatypeError;

/// Magic signature for global heap collections.
const GCOL_SIGNATURE: [u8; 4] = [b'G', b'C', b'O', b'L'];

/// Absolute byte range of a resolved heap object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapSpan {
    /// Absolute offset of the object data in the file buffer.
    pub offset: u64,
    /// Length of the object data in bytes.
    pub length: u64,
}

/// Resolves a (collection address, object index) reference to the absolute
/// byte range of the referenced object, or `None` when the object cannot
/// be found. Variable-length reads recover a miss as a null value.
pub trait GlobalHeapResolver {
    fn resolve(&self, collection_address: u64, object_index: u32) -> Option<HeapSpan>;
}

/// Resolver for data that contains no variable-length elements.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHeap;

impl GlobalHeapResolver for NoHeap {
    fn resolve(&self, _collection_address: u64, _object_index: u32) -> Option<HeapSpan> {
        None
    }
}

/// A parsed global heap collection.
#[derive(Debug, Clone)]
pub struct GlobalHeapCollection {
    /// Total size of this collection including header.
    pub collection_size: u64,
    /// Objects within this collection.
    pub objects: Vec<GlobalHeapObject>,
}

/// A single object within a global heap collection.
#[derive(Debug, Clone)]
pub struct GlobalHeapObject {
    /// Object index (1-based; 0 is the free space marker).
    pub index: u16,
    /// Reference count.
    pub reference_count: u16,
    /// Absolute byte range of the object data.
    pub span: HeapSpan,
}

fn ensure_len(data: &[u8], offset: usize, needed: usize) -> Result<(), DatatypeError> {
    match offset.checked_add(needed) {
        Some(end) if end <= data.len() => Ok(()),
        _ => Err(DatatypeError::IoFailure {
            expected: offset.saturating_add(needed),
            available: data.len(),
        }),
    }
}

fn read_length(data: &[u8], offset: usize, length_size: u8) -> Result<u64, DatatypeError> {
    let s = length_size as usize;
    ensure_len(data, offset, s)?;
    let slice = &data[offset..offset + s];
    Ok(match length_size {
        2 => u16::from_le_bytes([slice[0], slice[1]]) as u64,
        4 => u32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]) as u64,
        8 => u64::from_le_bytes([
            slice[0], slice[1], slice[2], slice[3], slice[4], slice[5], slice[6], slice[7],
        ]),
        _ => {
            return Err(DatatypeError::MalformedStructure {
                class: "GlobalHeap",
                detail: "length size must be 2, 4, or 8",
            })
        }
    })
}

/// Round up to next multiple of 8.
fn pad8(x: usize) -> usize {
    (x + 7) & !7
}

impl GlobalHeapCollection {
    /// Parse a global heap collection at the given offset in the file data.
    pub fn parse(
        file_data: &[u8],
        offset: usize,
        length_size: u8,
    ) -> Result<GlobalHeapCollection, DatatypeError> {
        // signature(4) + version(1) + reserved(3) + collection_size(length_size)
        let header_size = 8 + length_size as usize;
        ensure_len(file_data, offset, header_size)?;

        if file_data[offset..offset + 4] != GCOL_SIGNATURE {
            return Err(DatatypeError::MalformedStructure {
                class: "GlobalHeap",
                detail: "collection signature mismatch",
            });
        }

        let version = file_data[offset + 4];
        if version != 1 {
            return Err(DatatypeError::UnsupportedVersion {
                class: "GlobalHeap",
                version,
            });
        }

        let collection_size = read_length(file_data, offset + 8, length_size)?;
        let collection_end = offset + collection_size as usize;

        let mut pos = offset + header_size;
        let mut objects = Vec::new();

        // Walk objects until the free space marker (index 0) or end of
        // collection.
        while pos + 2 <= collection_end {
            ensure_len(file_data, pos, 2)?;
            let object_index = u16::from_le_bytes([file_data[pos], file_data[pos + 1]]);

            if object_index == 0 {
                break;
            }

            // object_index(2) + reference_count(2) + reserved(4) + object_size(length_size)
            let obj_header_size = 8 + length_size as usize;
            ensure_len(file_data, pos, obj_header_size)?;

            let reference_count = u16::from_le_bytes([file_data[pos + 2], file_data[pos + 3]]);
            let object_size = read_length(file_data, pos + 8, length_size)? as usize;

            pos += obj_header_size;
            ensure_len(file_data, pos, object_size)?;

            objects.push(GlobalHeapObject {
                index: object_index,
                reference_count,
                span: HeapSpan {
                    offset: pos as u64,
                    length: object_size as u64,
                },
            });

            // Object data is padded to an 8-byte boundary.
            pos += pad8(object_size);
        }

        Ok(GlobalHeapCollection {
            collection_size,
            objects,
        })
    }

    /// Get an object by its index.
    pub fn get_object(&self, index: u16) -> Option<&GlobalHeapObject> {
        self.objects.iter().find(|o| o.index == index)
    }
}

/// Resolver backed by the same file buffer the cursor reads from.
///
/// Collections are parsed on demand at the referenced address; the
/// resolved span points back into the buffer, so the reader can seek the
/// cursor there directly.
#[derive(Debug, Clone, Copy)]
pub struct FileHeapResolver<'a> {
    file_data: &'a [u8],
    length_size: u8,
}

impl<'a> FileHeapResolver<'a> {
    pub fn new(file_data: &'a [u8], length_size: u8) -> FileHeapResolver<'a> {
        FileHeapResolver {
            file_data,
            length_size,
        }
    }

    /// Locate a heap object, distinguishing corrupt collections from
    /// missing objects.
    pub fn locate(
        &self,
        collection_address: u64,
        object_index: u32,
    ) -> Result<HeapSpan, DatatypeError> {
        let coll = GlobalHeapCollection::parse(
            self.file_data,
            collection_address as usize,
            self.length_size,
        )?;
        let index = u16::try_from(object_index).map_err(|_| DatatypeError::IndirectionMiss {
            collection_address,
            object_index,
        })?;
        coll.get_object(index)
            .map(|o| o.span)
            .ok_or(DatatypeError::IndirectionMiss {
                collection_address,
                object_index,
            })
    }
}

impl GlobalHeapResolver for FileHeapResolver<'_> {
    fn resolve(&self, collection_address: u64, object_index: u32) -> Option<HeapSpan> {
        self.locate(collection_address, object_index).ok()
    }
}
