//! Point-in-time allocator statistics.

use revslab_core::Generation;
use revslab_table::{Shape, TableSet};
use smallvec::SmallVec;

use crate::pointers::Pointers;

/// Occupancy of the tables for one payload shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShapeStats {
    /// Payload width in words.
    pub words: usize,
    /// Slots ever handed out (live, pinned, or waiting for reuse).
    pub used: u32,
    /// Released slots waiting in the free queue.
    pub queued: usize,
    /// Pages appended to the slab table.
    pub pages: usize,
    /// Pointer types registered in the shape's family.
    pub types: usize,
    /// Entries in the static table.
    pub statics: usize,
}

impl ShapeStats {
    fn collect<S: Shape>(tables: &TableSet) -> Self {
        let table = tables.table::<S>();
        Self {
            words: S::WORDS,
            used: table.used(),
            queued: table.queued(),
            pages: table.page_count(),
            types: table.family().len(),
            statics: tables.statics::<S>().len(),
        }
    }
}

/// Snapshot returned by [`Pointers::stats`].
///
/// Counters are read one at a time without a global lock, so a snapshot
/// taken under concurrent use is approximate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stats {
    /// Current generation.
    pub generation: Generation,
    /// One entry per shape, narrowest first.
    pub shapes: SmallVec<[ShapeStats; 3]>,
}

impl Stats {
    /// Total slots handed out across shapes.
    pub fn used(&self) -> u64 {
        self.shapes.iter().map(|s| u64::from(s.used)).sum()
    }

    /// Statistics for the shape `words` wide, if it exists.
    pub fn shape(&self, words: usize) -> Option<&ShapeStats> {
        self.shapes.iter().find(|s| s.words == words)
    }
}

impl Pointers {
    /// Take a statistics snapshot.
    pub fn stats(&self) -> Stats {
        let mut shapes = SmallVec::new();
        shapes.push(ShapeStats::collect::<[u64; 1]>(&self.tables));
        shapes.push(ShapeStats::collect::<[u64; 2]>(&self.tables));
        shapes.push(ShapeStats::collect::<[u64; 3]>(&self.tables));
        Stats {
            generation: self.cycle(),
            shapes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pointer::Pointer;

    struct Two;

    impl Pointer for Two {
        type Shape = [u64; 2];
        const NAME: &'static str = "Two";
        fn free(_: [u64; 2]) {}
    }

    #[test]
    fn empty_allocator_reports_zeroes() {
        let stats = Pointers::default().stats();
        assert_eq!(stats.generation, Generation::FIRST);
        assert_eq!(stats.shapes.len(), 3);
        assert_eq!(stats.used(), 0);
        assert!(stats.shapes.iter().all(|s| s.pages == 0));
    }

    #[test]
    fn counts_follow_operations() {
        let p = Pointers::default();
        let a = p.alloc::<Two>([1, 1]);
        let _b = p.alloc::<Two>([2, 2]);
        p.end(a);
        let _s = p.add::<Two>([3, 3]);
        p.advance_cycle();

        let stats = p.stats();
        assert_eq!(stats.generation, Generation(Generation::FIRST.0 + 1));
        let two = stats.shape(2).unwrap();
        assert_eq!(two.used, 2);
        assert_eq!(two.queued, 1);
        assert_eq!(two.pages, 1);
        assert_eq!(two.types, 1);
        assert_eq!(two.statics, 1);
        assert_eq!(stats.shape(1).unwrap().used, 0);
        assert!(stats.shape(4).is_none());
    }
}
