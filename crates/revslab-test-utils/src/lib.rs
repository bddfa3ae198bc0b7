//! Test fixtures for revslab development.
//!
//! Provides one fixture [`Pointer`] type per payload shape whose `free`
//! callbacks are observable, small allocator configurations that make page
//! growth and exhaustion easy to reach, and a sample [`Markable`] object
//! graph.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod graph;

use std::cell::RefCell;

use revslab_pointers::{Pointer, Pointers, PointersConfig, TableConfig};

pub use graph::{Scene, SceneNode};

thread_local! {
    static FREED: RefCell<Vec<(&'static str, Vec<u64>)>> = const { RefCell::new(Vec::new()) };
}

fn record(name: &'static str, words: &[u64]) {
    FREED.with(|f| f.borrow_mut().push((name, words.to_vec())));
}

/// Frees run on the current thread, oldest first, as `(type name, payload)`.
pub fn freed() -> Vec<(&'static str, Vec<u64>)> {
    FREED.with(|f| f.borrow().clone())
}

/// Number of frees run on the current thread.
pub fn freed_count() -> usize {
    FREED.with(|f| f.borrow().len())
}

/// Forget the current thread's free log.
pub fn reset_freed() {
    FREED.with(|f| f.borrow_mut().clear());
}

/// One-word fixture: a texture id.
pub struct Texture;

impl Pointer for Texture {
    type Shape = [u64; 1];
    const NAME: &'static str = "Texture";

    fn free(payload: [u64; 1]) {
        record(Self::NAME, &payload);
    }
}

/// Two-word fixture: a mesh (buffer id, vertex count).
pub struct Mesh;

impl Pointer for Mesh {
    type Shape = [u64; 2];
    const NAME: &'static str = "Mesh";

    fn free(payload: [u64; 2]) {
        record(Self::NAME, &payload);
    }
}

/// Three-word fixture: a physics body (world, body id, flags).
pub struct Body;

impl Pointer for Body {
    type Shape = [u64; 3];
    const NAME: &'static str = "Body";

    fn free(payload: [u64; 3]) {
        record(Self::NAME, &payload);
    }
}

/// A second one-word type sharing [`Texture`]'s table and family.
pub struct Sound;

impl Pointer for Sound {
    type Shape = [u64; 1];
    const NAME: &'static str = "Sound";

    fn free(payload: [u64; 1]) {
        record(Self::NAME, &payload);
    }
}

/// Pages of 8 slots, at most 8 pages per table (64 slots).
pub fn small_config() -> PointersConfig {
    PointersConfig {
        table: TableConfig {
            page_capacity: 8,
            max_pages: 8,
            probe_limit: 4,
            family_capacity: 8,
        },
        ..PointersConfig::default()
    }
}

/// A single page of `slots` slots (`slots` must be a power of two).
pub fn single_page_config(slots: u32) -> PointersConfig {
    PointersConfig {
        table: TableConfig {
            page_capacity: slots,
            max_pages: 1,
            probe_limit: slots,
            family_capacity: 8,
        },
        ..PointersConfig::default()
    }
}

/// An allocator built from [`small_config`].
pub fn small_pointers() -> Pointers {
    Pointers::new(small_config()).expect("small_config is valid")
}

/// Advance `pointers` by `n` generations.
pub fn advance(pointers: &Pointers, n: usize) {
    for _ in 0..n {
        pointers.advance_cycle();
    }
}
