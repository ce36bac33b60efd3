//! Error types for datatype message decoding and value reading.

use core::fmt;

/// Errors that can occur while decoding a datatype message or reading a
/// value described by one.
///
/// Everything here is fatal to the decode or read in progress and
/// propagates to the caller unchanged; binary layout mismatches are not
/// transient, so nothing is retried. The one local recovery is a global
/// heap miss during a variable-length read, which yields a null value
/// instead of surfacing [`DatatypeError::IndirectionMiss`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatatypeError {
    /// Datatype class code outside the recognized range 0-10.
    UnknownClass(u8),
    /// Recognized class, but a message version this reader does not handle.
    UnsupportedVersion {
        /// Name of the datatype class.
        class: &'static str,
        /// The offending version.
        version: u8,
    },
    /// Recognized class and version, but a bit pattern with no reader
    /// (non-canonical fixed/floating-point layouts, array, opaque).
    UnsupportedLayout {
        /// Name of the datatype class.
        class: &'static str,
        /// What about the layout is unhandled.
        detail: &'static str,
    },
    /// Structurally inconsistent message or data region.
    MalformedStructure {
        /// Name of the structure being decoded.
        class: &'static str,
        /// What is inconsistent.
        detail: &'static str,
    },
    /// A referenced global heap object was not found.
    IndirectionMiss {
        /// Address of the heap collection.
        collection_address: u64,
        /// Index of the object within the collection.
        object_index: u32,
    },
    /// Cursor read or seek past the end of the underlying data.
    IoFailure {
        /// Number of bytes the operation needed.
        expected: usize,
        /// Number of bytes actually available.
        available: usize,
    },
}

impl fmt::Display for DatatypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatatypeError::UnknownClass(c) => {
                write!(f, "unknown datatype class: {c}")
            }
            DatatypeError::UnsupportedVersion { class, version } => {
                write!(f, "unsupported {class} datatype message version: {version}")
            }
            DatatypeError::UnsupportedLayout { class, detail } => {
                write!(f, "unsupported {class} layout: {detail}")
            }
            DatatypeError::MalformedStructure { class, detail } => {
                write!(f, "malformed {class} structure: {detail}")
            }
            DatatypeError::IndirectionMiss {
                collection_address,
                object_index,
            } => {
                write!(
                    f,
                    "global heap object {object_index} not found in collection at {collection_address:#x}"
                )
            }
            DatatypeError::IoFailure {
                expected,
                available,
            } => {
                write!(f, "read past end of data: need {expected} bytes, have {available}")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DatatypeError {}
