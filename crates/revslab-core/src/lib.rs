//! Core identifiers and error types for revslab managed pointers.
//!
//! This is the leaf crate with zero internal dependencies. It defines the
//! vocabulary shared by the slab tables and the allocator: slot addresses,
//! revisions, generation stamps, type tags, the reserved sentinel values,
//! and the [`PointerError`] taxonomy.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod id;

pub use error::PointerError;
pub use id::{sentinel, Address, Generation, Revision, TypeTag};
