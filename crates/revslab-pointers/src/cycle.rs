//! The allocation cycle counter.
//!
//! [`CycleCounter`] is the coarse generation clock. The embedding
//! application advances it once per unit of work; the allocator only reads
//! it, to stamp new and marked slots and to decide which stamps are stale.

use std::sync::atomic::{AtomicU64, Ordering};

use revslab_core::Generation;

/// Monotonic generation counter.
///
/// Starts at [`Generation::FIRST`]. Never wraps in practice: see
/// [`Generation`].
pub struct CycleCounter {
    current: AtomicU64,
}

impl Default for CycleCounter {
    fn default() -> Self {
        Self::new()
    }
}

// Compile-time assertion: CycleCounter must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<CycleCounter>();
};

impl CycleCounter {
    /// Create a counter at [`Generation::FIRST`].
    pub fn new() -> Self {
        Self {
            current: AtomicU64::new(Generation::FIRST.0),
        }
    }

    /// Advance the generation and return the new value.
    pub fn advance(&self) -> Generation {
        Generation(self.current.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// Read the current generation.
    pub fn current(&self) -> Generation {
        Generation(self.current.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_first_generation() {
        assert_eq!(CycleCounter::new().current(), Generation::FIRST);
    }

    #[test]
    fn advance_is_monotonic() {
        let cycle = CycleCounter::new();
        let a = cycle.advance();
        let b = cycle.advance();
        assert_eq!(a, Generation(Generation::FIRST.0 + 1));
        assert_eq!(b, Generation(Generation::FIRST.0 + 2));
        assert_eq!(cycle.current(), b);
    }

    #[test]
    fn concurrent_advances_are_not_lost() {
        let cycle = CycleCounter::new();
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..1000 {
                        cycle.advance();
                    }
                });
            }
        });
        assert_eq!(cycle.current(), Generation(Generation::FIRST.0 + 4000));
    }
}
