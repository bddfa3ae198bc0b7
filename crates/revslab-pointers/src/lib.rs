//! Revision-checked managed pointers with generational reclamation.
//!
//! Provides the allocator a binding layer uses to hand out handles to
//! foreign memory without exposing raw addresses: [`Pointers`] issues
//! [`Handle`]s backed by slab slots, re-validates them on every
//! dereference, and turns use-after-free into a loud failure instead of a
//! wrong pointer.
//!
//! # Verbs
//!
//! | verb | method | notes |
//! |------|--------|-------|
//! | New  | [`Pointers::alloc`] | may recycle a stale slot, running its `Free` |
//! | Get  | [`Pointers::get`] | panics with "expired pointer" on a stale handle |
//! | End  | [`Pointers::end`] | idempotent; `(payload, first_release)` |
//! | Free | [`Pointers::free`] | `End` plus the type's `Free` callback |
//! | Pin  | [`Pointers::pin`] | exempts a slot from reclamation |
//! | Add / Set | [`Pointers::add`], [`Pointers::set`] | never-freed static entries |
//! | Raw / Let | [`Pointers::raw`], [`Pointers::lend`] | unmanaged, embedded payload |
//! | Ask  | [`Pointers::ask`] | classify without panicking |
//! | Cut  | [`Pointers::cut`] | read, optionally transferring ownership |
//!
//! Every panicking verb has a `try_*` twin returning [`PointerError`].
//!
//! # Reclamation
//!
//! The embedding application advances the generation with
//! [`Pointers::advance_cycle`] and occasionally runs
//! [`Pointers::mark_and_sweep`] over its root object graph. Handles
//! reachable from the root are stamped with the current generation; live,
//! unpinned slots whose stamp falls more than `max_generation_age`
//! generations behind are reclaimed and their `Free` callbacks run.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod cycle;
pub mod global;
pub mod handle;
pub mod mark;
pub mod pointer;
pub mod pointers;
pub mod stats;
pub mod sweep;

// Public re-exports for the primary API surface.
pub use config::{ConfigError, PointersConfig};
pub use cycle::CycleCounter;
pub use global::{global, install};
pub use handle::{Encoding, Handle, Kind};
pub use mark::{Markable, Marker};
pub use pointer::Pointer;
pub use pointers::Pointers;
pub use revslab_core::{Address, Generation, PointerError, Revision, TypeTag};
pub use revslab_table::TableConfig;
pub use stats::{ShapeStats, Stats};
pub use sweep::SweepReport;
