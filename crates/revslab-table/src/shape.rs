//! Payload shapes: the word width of a managed pointer.
//!
//! A foreign pointer value is one to three machine words. Each width gets
//! its own [`Table`] and [`StaticTable`], selected at compile time through
//! the sealed [`Shape`] trait, so no runtime tag check is needed to find
//! the storage for a handle.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::set::TableSet;
use crate::static_table::StaticTable;
use crate::table::Table;

mod sealed {
    pub trait Sealed {}
}

/// Word width of a pointer payload.
///
/// Implemented for `[u64; 1]`, `[u64; 2]` and `[u64; 3]` only.
pub trait Shape: Copy + Eq + fmt::Debug + Send + Sync + 'static + sealed::Sealed {
    /// Number of payload words.
    const WORDS: usize;

    /// Atomic storage for one payload.
    type Cells: Send + Sync;

    /// Zeroed atomic storage.
    fn empty_cells() -> Self::Cells;

    /// Read every word of `cells`.
    fn load(cells: &Self::Cells) -> Self;

    /// Overwrite every word of `cells`.
    fn store(cells: &Self::Cells, payload: Self);

    /// The all-zero payload.
    fn zeroed() -> Self;

    /// The payload as a word slice.
    fn words(&self) -> &[u64];

    /// This shape's slab table within `set`.
    fn table(set: &TableSet) -> &Table<Self>;

    /// This shape's static table within `set`.
    fn statics(set: &TableSet) -> &StaticTable<Self>;
}

macro_rules! impl_shape {
    ($n:literal, $table:ident, $statics:ident) => {
        impl sealed::Sealed for [u64; $n] {}

        impl Shape for [u64; $n] {
            const WORDS: usize = $n;

            type Cells = [AtomicU64; $n];

            fn empty_cells() -> Self::Cells {
                std::array::from_fn(|_| AtomicU64::new(0))
            }

            fn load(cells: &Self::Cells) -> Self {
                std::array::from_fn(|i| cells[i].load(Ordering::Acquire))
            }

            fn store(cells: &Self::Cells, payload: Self) {
                for (cell, word) in cells.iter().zip(payload) {
                    cell.store(word, Ordering::Release);
                }
            }

            fn zeroed() -> Self {
                [0; $n]
            }

            fn words(&self) -> &[u64] {
                self
            }

            fn table(set: &TableSet) -> &Table<Self> {
                &set.$table
            }

            fn statics(set: &TableSet) -> &StaticTable<Self> {
                &set.$statics
            }
        }
    };
}

impl_shape!(1, one, static_one);
impl_shape!(2, two, static_two);
impl_shape!(3, three, static_three);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_match_width() {
        assert_eq!(<[u64; 1]>::WORDS, 1);
        assert_eq!(<[u64; 2]>::WORDS, 2);
        assert_eq!(<[u64; 3]>::WORDS, 3);
    }

    #[test]
    fn cells_store_then_load() {
        let cells = <[u64; 3]>::empty_cells();
        assert_eq!(<[u64; 3]>::load(&cells), [0, 0, 0]);
        <[u64; 3]>::store(&cells, [1, 2, 3]);
        assert_eq!(<[u64; 3]>::load(&cells), [1, 2, 3]);
    }

    #[test]
    fn zeroed_is_all_zero() {
        assert!(<[u64; 2]>::zeroed().words().iter().all(|&w| w == 0));
    }
}
