//! revslab: revision-checked slab pointers.
//!
//! Hands out lightweight, copyable handles to foreign memory (engine
//! objects, GPU buffers, anything addressed by one to three words) without
//! asking a garbage collector to scan them. Every dereference re-validates
//! the handle against its slab slot, so use-after-free and double release
//! become immediate, attributable failures. A cooperative mark-and-sweep
//! pass reclaims handles the application no longer reaches.
//!
//! This is the facade crate re-exporting the public API of the revslab
//! sub-crates.
//!
//! # Quick start
//!
//! ```rust
//! use revslab::prelude::*;
//!
//! // A foreign texture id, released by the engine.
//! struct Texture;
//! impl Pointer for Texture {
//!     type Shape = [u64; 1];
//!     const NAME: &'static str = "Texture";
//!     fn free(_id: [u64; 1]) {}
//! }
//!
//! let pointers = Pointers::default();
//! let texture = pointers.alloc::<Texture>([42]);
//! assert_eq!(pointers.get(texture), [42]);
//!
//! // Nothing reaches the texture, so it ages out.
//! for _ in 0..3 {
//!     pointers.advance_cycle();
//! }
//! let report = pointers.mark_and_sweep(&());
//! assert_eq!(report.reclaimed, 1);
//! assert_eq!(pointers.ask(texture).1, Kind::Expired);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `revslab-core` | Addresses, revisions, generations, `PointerError` |
//! | [`table`] | `revslab-table` | Slab and static tables, pages, slots, families |
//! | [`pointers`] | `revslab-pointers` | The allocator, handles, marking and sweeping |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Identifiers, sentinels and errors (`revslab-core`).
pub use revslab_core as types;

/// Storage mechanics (`revslab-table`).
///
/// Most users never touch this directly; [`table::TableConfig`] is also
/// available in the [`prelude`].
pub use revslab_table as table;

/// The allocator surface (`revslab-pointers`).
///
/// [`pointers::Pointers`] is the allocator; [`pointers::Markable`] is the
/// trait object graphs implement to take part in marking.
pub use revslab_pointers as pointers;

pub use revslab_pointers::unmarked;

/// Common imports for typical revslab usage.
///
/// ```rust
/// use revslab::prelude::*;
/// ```
pub mod prelude {
    // Allocator and handles
    pub use revslab_pointers::{Encoding, Handle, Kind, Pointer, Pointers};

    // Marking and sweeping
    pub use revslab_pointers::{Markable, Marker, SweepReport};

    // Configuration
    pub use revslab_pointers::{ConfigError, PointersConfig, TableConfig};

    // Errors and identifiers
    pub use revslab_core::{Generation, PointerError};

    // Process-wide instance
    pub use revslab_pointers::{global, install};
}
