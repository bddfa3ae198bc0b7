//! Append-only page directory.
//!
//! A [`PageDirectory`] is a fixed-length directory of lazily created,
//! fixed-size pages. Pages are appended in order under a growth mutex and
//! are never moved, shrunk or freed while the directory lives, so readers
//! resolve an index to a `&C` without taking any lock.

use std::sync::{Mutex, OnceLock, PoisonError};

use log::debug;
use revslab_core::PointerError;

/// A growable, pointer-stable collection of fixed-size pages.
///
/// Index `i` lives on page `i / page_capacity` at offset
/// `i % page_capacity`. The directory itself is sized for `max_pages` up
/// front; only the pages are allocated on demand.
pub struct PageDirectory<C> {
    /// One entry per potential page. Set exactly once, under `grow`.
    pages: Box<[OnceLock<Box<[C]>>]>,
    /// Number of pages appended so far. Held only while appending.
    grow: Mutex<usize>,
    page_capacity: u32,
    /// Builds one empty element of a fresh page.
    make: fn() -> C,
    /// Payload width of the owning table, for logging and errors.
    shape_words: usize,
}

impl<C> PageDirectory<C> {
    /// Create an empty directory with room for `max_pages` pages of
    /// `page_capacity` elements each.
    ///
    /// # Panics
    ///
    /// Panics if `page_capacity` is zero.
    pub fn new(page_capacity: u32, max_pages: u32, shape_words: usize, make: fn() -> C) -> Self {
        assert!(page_capacity > 0, "page_capacity must be non-zero");
        let pages = (0..max_pages).map(|_| OnceLock::new()).collect();
        Self {
            pages,
            grow: Mutex::new(0),
            page_capacity,
            make,
            shape_words,
        }
    }

    /// Return page `index`, appending pages up to and including it if it
    /// does not exist yet.
    ///
    /// Returns `Err(PointerError::CapacityExceeded)` if `index` is beyond
    /// `max_pages`.
    pub fn index(&self, index: usize) -> Result<&[C], PointerError> {
        if let Some(page) = self.page(index) {
            return Ok(page);
        }
        let entry = self.pages.get(index).ok_or(PointerError::CapacityExceeded {
            shape_words: self.shape_words,
            capacity: self.capacity(),
        })?;

        let mut count = self.grow.lock().unwrap_or_else(PoisonError::into_inner);
        // Pages are appended strictly in order, so fill any gap below
        // `index` as well; another thread may already have done so.
        while *count <= index {
            let fresh: Box<[C]> = (0..self.page_capacity).map(|_| (self.make)()).collect();
            let _ = self.pages[*count].set(fresh);
            debug!(
                "appended page {} to {}-word table ({} slots per page)",
                *count, self.shape_words, self.page_capacity
            );
            *count += 1;
        }
        drop(count);

        Ok(entry.get_or_init(|| (0..self.page_capacity).map(|_| (self.make)()).collect()))
    }

    /// Return page `index` if it has been appended.
    pub fn page(&self, index: usize) -> Option<&[C]> {
        self.pages.get(index)?.get().map(|page| &**page)
    }

    /// Resolve element `index` without growing.
    pub fn get(&self, index: u32) -> Option<&C> {
        let page = (index / self.page_capacity) as usize;
        let offset = (index % self.page_capacity) as usize;
        self.page(page)?.get(offset)
    }

    /// Resolve element `index`, appending its page if needed.
    pub fn get_or_grow(&self, index: u32) -> Result<&C, PointerError> {
        let page = (index / self.page_capacity) as usize;
        let offset = (index % self.page_capacity) as usize;
        Ok(&self.index(page)?[offset])
    }

    /// Number of pages appended so far.
    pub fn page_count(&self) -> usize {
        *self.grow.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Elements per page.
    pub fn page_capacity(&self) -> u32 {
        self.page_capacity
    }

    /// Total element capacity across all potential pages.
    pub fn capacity(&self) -> usize {
        self.pages.len() * self.page_capacity as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn make() -> AtomicU64 {
        AtomicU64::new(0)
    }

    #[test]
    fn starts_without_pages() {
        let dir = PageDirectory::new(16, 4, 1, make);
        assert_eq!(dir.page_count(), 0);
        assert!(dir.get(0).is_none());
        assert_eq!(dir.capacity(), 64);
    }

    #[test]
    fn index_appends_page() {
        let dir = PageDirectory::new(16, 4, 1, make);
        let page = dir.index(0).unwrap();
        assert_eq!(page.len(), 16);
        assert_eq!(dir.page_count(), 1);
        assert!(dir.get(15).is_some());
        assert!(dir.get(16).is_none());
    }

    #[test]
    fn index_fills_gaps_in_order() {
        let dir = PageDirectory::new(16, 4, 1, make);
        dir.index(2).unwrap();
        assert_eq!(dir.page_count(), 3);
        assert!(dir.page(0).is_some());
        assert!(dir.page(1).is_some());
    }

    #[test]
    fn elements_are_pointer_stable() {
        let dir = PageDirectory::new(4, 8, 1, make);
        let first = dir.get_or_grow(1).unwrap();
        first.store(42, Ordering::Relaxed);
        let before = first as *const AtomicU64;
        dir.index(7).unwrap();
        let after = dir.get(1).unwrap() as *const AtomicU64;
        assert_eq!(before, after);
        assert_eq!(dir.get(1).unwrap().load(Ordering::Relaxed), 42);
    }

    #[test]
    fn beyond_max_pages_is_capacity_error() {
        let dir = PageDirectory::new(16, 2, 3, make);
        let err = dir.index(2).unwrap_err();
        assert_eq!(
            err,
            PointerError::CapacityExceeded {
                shape_words: 3,
                capacity: 32
            }
        );
    }

    #[test]
    fn concurrent_growth_appends_each_page_once() {
        let dir = PageDirectory::new(8, 16, 1, make);
        std::thread::scope(|s| {
            for t in 0..4 {
                let dir = &dir;
                s.spawn(move || {
                    for i in 0..128u32 {
                        dir.get_or_grow((i * 7 + t) % 128)
                            .unwrap()
                            .fetch_add(1, Ordering::Relaxed);
                    }
                });
            }
        });
        assert_eq!(dir.page_count(), 16);
        let total: u64 = (0..128).map(|i| dir.get(i).unwrap().load(Ordering::Relaxed)).sum();
        assert_eq!(total, 4 * 128);
    }
}
