//! HDF5 datatype message decoding and typed value reading.
//!
//! This crate decodes Datatype messages (class 0 through 10) into an
//! immutable [`Datatype`] tree and reads typed values laid out per that
//! tree from an in-memory byte buffer, resolving variable-length data
//! through a pluggable global heap resolver.
//! It supports `no_std` environments with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod cursor;
pub mod datatype;
pub mod error;
pub mod global_heap;
pub mod value;
mod value_read;

pub use cursor::{ByteOrder, Cursor};
pub use datatype::Datatype;
pub use error::DatatypeError;
pub use global_heap::{FileHeapResolver, GlobalHeapResolver, HeapSpan, NoHeap};
pub use value::Value;
