//! The cooperative mark-and-sweep pass.

use log::{debug, warn};
use revslab_core::Generation;
use revslab_table::{Shape, Table};

use crate::mark::{Markable, Marker};
use crate::pointers::{run_free, Pointers};

/// Outcome of one [`Pointers::mark_and_sweep`] pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Generation the pass ran in.
    pub generation: Generation,
    /// Handles stamped by the mark phase.
    pub marked: usize,
    /// Slots inspected by the sweep, across all shapes.
    pub scanned: usize,
    /// Slots reclaimed (their `Free` callbacks have run).
    pub reclaimed: usize,
    /// The mark phase could not walk the whole root, so the sweep was
    /// skipped.
    pub incomplete: bool,
}

impl Pointers {
    /// Mark every handle reachable from `root`, then reclaim stale slots.
    ///
    /// The mark phase stamps reachable managed slots with the current
    /// generation. The sweep then visits every slot of every table and
    /// reclaims live, unpinned occupants stamped before
    /// [`stale_before`](Self::stale_before): each one's `Free` callback runs
    /// and the slot is queued for reuse, exactly as if its owner had freed
    /// it.
    ///
    /// If part of the root could not be walked (a `RefCell` mutably
    /// borrowed elsewhere), nothing is reclaimed and the report has
    /// `incomplete` set. Handles marked before that point keep their new
    /// stamps.
    ///
    /// Safe to run alongside other verbs. Concurrent allocations are
    /// stamped with the current generation and are never stale here.
    ///
    /// # Panics
    ///
    /// With "bad free" if a slot leaves the locked state while its `Free`
    /// callback runs.
    pub fn mark_and_sweep<R: Markable + ?Sized>(&self, root: &R) -> SweepReport {
        let generation = self.cycle();
        let mut marker = Marker::new(self, generation);
        root.mark(&mut marker);
        let mut report = SweepReport {
            generation,
            marked: marker.marked(),
            ..SweepReport::default()
        };
        if !marker.is_complete() {
            warn!(
                "mark_and_sweep: generation {} walk was incomplete, nothing reclaimed",
                generation
            );
            report.incomplete = true;
            return report;
        }

        let stale_before = self.stale_before();
        sweep_table(self.tables.table::<[u64; 1]>(), stale_before, &mut report);
        sweep_table(self.tables.table::<[u64; 2]>(), stale_before, &mut report);
        sweep_table(self.tables.table::<[u64; 3]>(), stale_before, &mut report);

        debug!(
            "mark_and_sweep: generation {} marked {} scanned {} reclaimed {}",
            report.generation, report.marked, report.scanned, report.reclaimed
        );
        report
    }
}

fn sweep_table<S: Shape>(table: &Table<S>, stale_before: Generation, report: &mut SweepReport) {
    let used = table.used();
    report.scanned += used as usize;
    for index in 0..used {
        let Some(claimed) = table.reclaim(index, stale_before) else {
            continue;
        };
        if let Some(recycled) = claimed.recycled() {
            run_free(table, recycled);
        }
        if let Err(err) = table.vacate(claimed) {
            panic!("{err}");
        }
        report.reclaimed += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PointersConfig;
    use crate::handle::Kind;
    use crate::pointer::Pointer;
    use std::cell::{Cell, RefCell};

    thread_local! {
        static FREED: Cell<usize> = const { Cell::new(0) };
    }

    struct Res;

    impl Pointer for Res {
        type Shape = [u64; 3];
        const NAME: &'static str = "Res";
        fn free(_: [u64; 3]) {
            FREED.with(|f| f.set(f.get() + 1));
        }
    }

    fn advance(p: &Pointers, n: usize) {
        for _ in 0..n {
            p.advance_cycle();
        }
    }

    #[test]
    fn fresh_handles_survive_a_sweep() {
        let p = Pointers::default();
        let h = p.alloc::<Res>([1, 2, 3]);
        let report = p.mark_and_sweep(&());
        assert_eq!(report.reclaimed, 0);
        assert_eq!(report.scanned, 1);
        assert_eq!(p.get(h), [1, 2, 3]);
    }

    #[test]
    fn unreachable_stale_handles_are_reclaimed() {
        let p = Pointers::default();
        let h = p.alloc::<Res>([1, 2, 3]);
        advance(&p, 5);
        let report = p.mark_and_sweep(&());
        assert_eq!(report.reclaimed, 1);
        assert_eq!(FREED.with(Cell::get), 1);
        assert_eq!(p.ask(h).1, Kind::Expired);
        // The reclaimed slot is reused.
        let again = p.alloc::<Res>([4, 5, 6]);
        assert_eq!(again.address(), h.address());
    }

    #[test]
    fn reachable_handles_are_kept() {
        let p = Pointers::default();
        let kept = p.alloc::<Res>([1, 1, 1]);
        let dropped = p.alloc::<Res>([2, 2, 2]);
        advance(&p, 5);
        let report = p.mark_and_sweep(&vec![kept]);
        assert_eq!(report.marked, 1);
        assert_eq!(report.reclaimed, 1);
        assert_eq!(p.ask(kept).1, Kind::Managed);
        assert_eq!(p.ask(dropped).1, Kind::Expired);
    }

    #[test]
    fn incomplete_walk_reclaims_nothing() {
        let p = Pointers::default();
        let held = p.alloc::<Res>([7, 7, 7]);
        let root = RefCell::new(vec![held]);
        advance(&p, 5);

        let guard = root.borrow_mut();
        let report = p.mark_and_sweep(&root);
        drop(guard);
        assert!(report.incomplete);
        assert_eq!(report.reclaimed, 0);
        assert_eq!(report.scanned, 0);
        assert_eq!(FREED.with(Cell::get), 0);
        assert_eq!(p.ask(held).1, Kind::Managed);

        let report = p.mark_and_sweep(&root);
        assert!(!report.incomplete);
        assert_eq!(report.marked, 1);
        assert_eq!(report.reclaimed, 0);
        assert_eq!(p.get(held), [7, 7, 7]);
    }

    #[test]
    fn pinned_handles_are_never_reclaimed() {
        let p = Pointers::default();
        let pinned = p.pin(p.alloc::<Res>([1, 2, 3]));
        for _ in 0..10 {
            advance(&p, 3);
            assert_eq!(p.mark_and_sweep(&()).reclaimed, 0);
        }
        assert_eq!(p.get(pinned), [1, 2, 3]);
    }

    #[test]
    fn staleness_follows_configured_age() {
        let p = Pointers::new(PointersConfig {
            max_generation_age: 4,
            ..PointersConfig::default()
        })
        .unwrap();
        let h = p.alloc::<Res>([1, 2, 3]);
        advance(&p, 4);
        assert_eq!(p.mark_and_sweep(&()).reclaimed, 0);
        advance(&p, 1);
        assert_eq!(p.mark_and_sweep(&()).reclaimed, 1);
        assert_eq!(p.ask(h).1, Kind::Expired);
    }
}
