//! The slab table for one payload shape.
//!
//! [`Table`] hands out slots for new pointers, validates handles against
//! them, and releases, pins, marks and reclaims them. It owns:
//!
//! - a [`PageDirectory`] of [`Slot`]s (append-only, lock-free reads),
//! - the [`Family`] of pointer types sharing this shape,
//! - a free queue of released slot indices,
//! - a ring cursor that probes existing slots for aged-out occupants,
//! - a high-water mark designating the next never-used slot,
//! - the revision source for new occupants.
//!
//! Allocation is split into [`claim`](Table::claim) and
//! [`commit`](Table::commit) so the caller can run the previous
//! occupant's `Free` callback while holding the claim.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crossbeam_channel::{Receiver, Sender};
use log::trace;
use revslab_core::sentinel::FIRST_REVISION;
use revslab_core::{Address, Generation, PointerError, Revision, TypeTag};

use crate::config::TableConfig;
use crate::family::Family;
use crate::page::PageDirectory;
use crate::shape::Shape;
use crate::slot::{ClaimFilter, Slot, SlotState};

/// The previous occupant of a recycled slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Recycled<S> {
    /// Family tag of the previous occupant.
    pub tag: TypeTag,
    /// Payload of the previous occupant.
    pub payload: S,
}

/// A slot locked for allocation or reclamation.
///
/// Must be consumed by [`Table::commit`] or [`Table::vacate`]; dropping it
/// leaves the slot locked for good.
#[derive(Debug)]
#[must_use = "a claimed slot stays locked until committed or vacated"]
pub struct Claimed<S> {
    index: u32,
    recycled: Option<Recycled<S>>,
}

impl<S: Copy> Claimed<S> {
    /// Slot index within the table.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// The live occupant this claim displaced, if any. Its `Free` callback
    /// has not run yet.
    pub fn recycled(&self) -> Option<Recycled<S>> {
        self.recycled
    }
}

/// Slab table for pointers of shape `S`.
pub struct Table<S: Shape> {
    slots: PageDirectory<Slot<S>>,
    family: Family<S>,
    /// Released slot indices, in release order.
    free_tx: Sender<u32>,
    free_rx: Receiver<u32>,
    /// Next never-used slot index. May run past the capacity; readers clamp.
    high_water: AtomicU32,
    /// Probe position over `[0, high_water)`.
    ring: AtomicU32,
    /// Next revision to hand out.
    revisions: AtomicU64,
    probe_limit: u32,
}

// Compile-time assertion: tables are shared across threads.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<Table<[u64; 1]>>();
    assert::<Table<[u64; 3]>>();
};

impl<S: Shape> Table<S> {
    /// Create an empty table.
    pub fn new(config: &TableConfig) -> Self {
        let (free_tx, free_rx) = crossbeam_channel::unbounded();
        Self {
            slots: PageDirectory::new(config.page_capacity, config.max_pages, S::WORDS, Slot::vacant),
            family: Family::new(config.family_capacity),
            free_tx,
            free_rx,
            high_water: AtomicU32::new(0),
            ring: AtomicU32::new(0),
            revisions: AtomicU64::new(FIRST_REVISION),
            probe_limit: config.probe_limit,
        }
    }

    /// The pointer types sharing this table.
    pub fn family(&self) -> &Family<S> {
        &self.family
    }

    /// Lock a slot for a new occupant.
    ///
    /// Candidates are tried in order: released slots from the free queue,
    /// then up to `probe_limit` existing slots on the ring cursor, then a
    /// never-used slot at the high-water mark (appending a page if needed).
    /// With `recycle_before` set, the ring probe may also take live,
    /// unpinned slots stamped before that generation; the displaced
    /// occupant is reported through [`Claimed::recycled`].
    pub fn claim(&self, recycle_before: Option<Generation>) -> Result<Claimed<S>, PointerError> {
        loop {
            while let Ok(index) = self.free_rx.try_recv() {
                // Queue entries only ever name vacant slots.
                if let Some(claimed) = self.try_claim(index, 0) {
                    return Ok(claimed);
                }
            }

            let cutoff = recycle_before.map_or(0, |g| g.0);
            let used = self.used();
            if used > 0 {
                for _ in 0..self.probe_limit.min(used) {
                    let index = self.ring.fetch_add(1, Ordering::Relaxed) % used;
                    if let Some(claimed) = self.try_claim(index, cutoff) {
                        return Ok(claimed);
                    }
                }
            }

            if self.high_water.load(Ordering::Acquire) as usize >= self.slots.capacity() {
                return Err(self.capacity_error());
            }
            let index = self.high_water.fetch_add(1, Ordering::AcqRel);
            if index as usize >= self.slots.capacity() {
                return Err(self.capacity_error());
            }
            self.slots.get_or_grow(index)?;
            if let Some(claimed) = self.try_claim(index, 0) {
                return Ok(claimed);
            }
            // A concurrent probe took the fresh slot first; go around.
        }
    }

    fn try_claim(&self, index: u32, stale_before: u64) -> Option<Claimed<S>> {
        let slot = self.slots.get(index)?;
        let previous = slot.try_claim(stale_before, ClaimFilter::VacantOrStale)?;
        let recycled = (previous >= FIRST_REVISION).then(|| Recycled {
            tag: slot.tag(),
            payload: slot.payload(),
        });
        if recycled.is_some() {
            trace!("recycling stale {}-word slot {index}", S::WORDS);
        }
        Some(Claimed { index, recycled })
    }

    /// Install a new occupant into a claimed slot.
    ///
    /// Returns the occupant's address and revision, or
    /// `Err(PointerError::BadFree)` if the slot left the locked state while
    /// it was claimed.
    pub fn commit(
        &self,
        claimed: Claimed<S>,
        tag: TypeTag,
        payload: S,
        now: Generation,
    ) -> Result<(Address, Revision), PointerError> {
        let address = Address::from_index(claimed.index);
        let slot = self.slot(claimed.index)?;
        let revision = self.revisions.fetch_add(1, Ordering::Relaxed);
        slot.commit(revision, tag, payload, now.0)
            .map_err(|found| PointerError::BadFree {
                address,
                found: Revision(found),
            })?;
        Ok((address, Revision(revision)))
    }

    /// Empty a claimed slot and queue it for reuse.
    pub fn vacate(&self, claimed: Claimed<S>) -> Result<(), PointerError> {
        let address = Address::from_index(claimed.index);
        let slot = self.slot(claimed.index)?;
        slot.vacate().map_err(|found| PointerError::BadFree {
            address,
            found: Revision(found),
        })?;
        let _ = self.free_tx.send(claimed.index);
        Ok(())
    }

    /// Check a handle against its slot and return the live payload.
    pub fn validate(&self, address: Address, revision: Revision, payload: S) -> Result<S, PointerError> {
        match self.state(address, revision, payload) {
            SlotState::Live | SlotState::Pinned => Ok(payload),
            SlotState::Expired => Err(self.expired(address, revision)),
        }
    }

    /// Classify a handle against its slot.
    pub fn state(&self, address: Address, revision: Revision, payload: S) -> SlotState {
        match address.index().and_then(|index| self.slots.get(index)) {
            Some(slot) => slot.state(revision.0, payload),
            None => SlotState::Expired,
        }
    }

    /// Pin the slot a handle designates.
    pub fn pin(&self, address: Address, revision: Revision, payload: S) -> Result<(), PointerError> {
        let pinned = address
            .index()
            .and_then(|index| self.slots.get(index))
            .map(|slot| slot.pin(revision.0, payload));
        match pinned {
            Some(SlotState::Pinned) => Ok(()),
            _ => Err(self.expired(address, revision)),
        }
    }

    /// Release the slot a handle designates.
    ///
    /// Returns the payload on the first release and `None` on every later
    /// one (or for a handle that never matched).
    pub fn release(&self, address: Address, revision: Revision, payload: S) -> Option<S> {
        let index = address.index()?;
        let slot = self.slots.get(index)?;
        let words = slot.lock_occupant(revision.0, payload)?;
        if slot.finish_release() {
            let _ = self.free_tx.send(index);
        }
        Some(words)
    }

    /// Refresh the age stamp of the slot a handle designates.
    pub fn mark(&self, address: Address, revision: Revision, payload: S, now: Generation) -> bool {
        address
            .index()
            .and_then(|index| self.slots.get(index))
            .is_some_and(|slot| slot.mark(revision.0, payload, now.0))
    }

    /// Lock the slot at `index` for reclamation if its occupant is live,
    /// unpinned and stamped before `stale_before`.
    pub fn reclaim(&self, index: u32, stale_before: Generation) -> Option<Claimed<S>> {
        let slot = self.slots.get(index)?;
        slot.try_claim(stale_before.0, ClaimFilter::StaleOnly)?;
        Some(Claimed {
            index,
            recycled: Some(Recycled {
                tag: slot.tag(),
                payload: slot.payload(),
            }),
        })
    }

    /// Number of slot indices ever handed out (the sweep range).
    pub fn used(&self) -> u32 {
        let high_water = self.high_water.load(Ordering::Acquire) as usize;
        high_water.min(self.slots.capacity()) as u32
    }

    /// Number of released slots waiting in the free queue.
    pub fn queued(&self) -> usize {
        self.free_rx.len()
    }

    /// Number of pages appended so far.
    pub fn page_count(&self) -> usize {
        self.slots.page_count()
    }

    /// Total slot capacity.
    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    /// Direct access to a slot, for inspection.
    pub fn get(&self, index: u32) -> Option<&Slot<S>> {
        self.slots.get(index)
    }

    fn slot(&self, index: u32) -> Result<&Slot<S>, PointerError> {
        self.slots.get(index).ok_or_else(|| self.capacity_error())
    }

    fn expired(&self, address: Address, revision: Revision) -> PointerError {
        let found = address
            .index()
            .and_then(|index| self.slots.get(index))
            .map_or(0, |slot| slot.revision());
        PointerError::Expired {
            address,
            expected: revision,
            found: Revision(found),
        }
    }

    fn capacity_error(&self) -> PointerError {
        PointerError::CapacityExceeded {
            shape_words: S::WORDS,
            capacity: self.slots.capacity(),
        }
    }
}
