//! Never-freed storage for process-lifetime payloads.
//!
//! [`StaticTable`] backs static handles: payloads that are added once,
//! possibly overwritten in place, and never released. It reuses the same
//! append-only [`PageDirectory`] as the slab tables but carries no
//! revision, age or family state.

use std::sync::atomic::{AtomicU32, Ordering};

use revslab_core::{Address, PointerError};

use crate::config::TableConfig;
use crate::page::PageDirectory;
use crate::shape::Shape;

/// Append-only payload storage for shape `S`.
pub struct StaticTable<S: Shape> {
    cells: PageDirectory<S::Cells>,
    /// Next entry index. May run past the capacity; readers clamp.
    next: AtomicU32,
}

impl<S: Shape> StaticTable<S> {
    /// Create an empty static table.
    pub fn new(config: &TableConfig) -> Self {
        Self {
            cells: PageDirectory::new(config.page_capacity, config.max_pages, S::WORDS, S::empty_cells),
            next: AtomicU32::new(0),
        }
    }

    /// Append `payload` and return its permanent address.
    pub fn add(&self, payload: S) -> Result<Address, PointerError> {
        if self.len() >= self.cells.capacity() {
            return Err(PointerError::CapacityExceeded {
                shape_words: S::WORDS,
                capacity: self.cells.capacity(),
            });
        }
        let index = self.next.fetch_add(1, Ordering::AcqRel);
        let cells = self.cells.get_or_grow(index)?;
        S::store(cells, payload);
        Ok(Address::from_index(index))
    }

    /// Read the payload stored at `address`.
    pub fn get(&self, address: Address) -> Option<S> {
        self.entry(address).map(S::load)
    }

    /// Overwrite the payload stored at `address`.
    ///
    /// Returns `false` if nothing was ever added at `address`.
    pub fn set(&self, address: Address, payload: S) -> bool {
        match self.entry(address) {
            Some(cells) => {
                S::store(cells, payload);
                true
            }
            None => false,
        }
    }

    fn entry(&self, address: Address) -> Option<&S::Cells> {
        let index = address.index()?;
        if index as usize >= self.len() {
            return None;
        }
        self.cells.get(index)
    }

    /// Number of entries added.
    pub fn len(&self) -> usize {
        (self.next.load(Ordering::Acquire) as usize).min(self.cells.capacity())
    }

    /// Whether nothing has been added.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> TableConfig {
        TableConfig {
            page_capacity: 4,
            max_pages: 2,
            ..TableConfig::default()
        }
    }

    #[test]
    fn add_then_get() {
        let table = StaticTable::<[u64; 2]>::new(&small());
        let address = table.add([4, 2]).unwrap();
        assert_eq!(address, Address(1));
        assert_eq!(table.get(address), Some([4, 2]));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn set_overwrites_in_place() {
        let table = StaticTable::<[u64; 1]>::new(&small());
        let address = table.add([1]).unwrap();
        assert!(table.set(address, [9]));
        assert_eq!(table.get(address), Some([9]));
    }

    #[test]
    fn unknown_address_reads_nothing() {
        let table = StaticTable::<[u64; 1]>::new(&small());
        assert_eq!(table.get(Address::NONE), None);
        assert_eq!(table.get(Address(3)), None);
        assert!(!table.set(Address(3), [1]));
    }

    #[test]
    fn grows_across_pages_until_capacity() {
        let table = StaticTable::<[u64; 1]>::new(&small());
        for i in 0..8 {
            table.add([i]).unwrap();
        }
        assert_eq!(table.get(Address(8)), Some([7]));
        assert!(matches!(
            table.add([8]),
            Err(PointerError::CapacityExceeded { .. })
        ));
        assert_eq!(table.len(), 8);
    }
}
