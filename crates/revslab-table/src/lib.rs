//! Append-only, revision-checked slab tables backing revslab pointers.
//!
//! Provides the storage half of the managed pointer allocator: paged slot
//! tables that never move a slot once created, per-slot revision and age
//! words updated only by compare-and-swap, and a never-freed static table.
//!
//! # Architecture
//!
//! ```text
//! TableSet (one per allocator)
//! ├── Table<[u64; N]> × 3 (one per payload shape)
//! │   ├── PageDirectory<Slot> (append-only pages, growth under a mutex)
//! │   ├── Family (TypeId → TypeTag + Free callback)
//! │   ├── free queue (released slot indices, crossbeam channel)
//! │   └── ring cursor + high-water mark
//! └── StaticTable<[u64; N]> × 3 (append-only, never freed)
//! ```
//!
//! # Slot protocol
//!
//! A slot's `revision` word is the occupancy lock: releasing, pinning and
//! recycling all win the slot by CAS-ing its revision. The `age` word is
//! the claim lock used by allocation and sweeping, and doubles as the
//! generation stamp refreshed by marking. See [`slot`] for the states.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod family;
pub mod page;
pub mod set;
pub mod shape;
pub mod slot;
pub mod static_table;
pub mod table;

// Public re-exports for the primary API surface.
pub use config::TableConfig;
pub use family::{Family, Member};
pub use page::PageDirectory;
pub use set::TableSet;
pub use shape::Shape;
pub use slot::{Slot, SlotState};
pub use static_table::StaticTable;
pub use table::{Claimed, Recycled, Table};
