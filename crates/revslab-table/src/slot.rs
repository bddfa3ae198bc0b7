//! The slot: one managed pointer's live state.
//!
//! | state          | revision        | age              |
//! |----------------|-----------------|------------------|
//! | unused         | `FREE`          | `UNUSED`         |
//! | claimed        | `LOCKED`/any    | `LOCKED`         |
//! | live           | stamp `>= 3`    | generation `>= 3`|
//! | pinned         | `PINNED`        | generation `>= 3`|
//! | releasing      | `LOCKED`        | generation       |
//! | queued         | `FREE`          | `QUEUED`         |
//!
//! Every transition is a compare-and-swap on one of the two words; no
//! plain read-modify-write ever touches a slot.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use revslab_core::sentinel::{
    AGE_LOCKED, AGE_QUEUED, AGE_UNUSED, FIRST_REVISION, REVISION_FREE, REVISION_LOCKED,
    REVISION_PINNED,
};
use revslab_core::TypeTag;

use crate::shape::Shape;

/// How a handle's cached revision and payload relate to its slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotState {
    /// The handle's revision matches and the payload is unchanged.
    Live,
    /// The slot is pinned and holds the handle's payload.
    Pinned,
    /// The handle no longer designates this slot's occupant.
    Expired,
}

/// Storage for one managed pointer.
pub struct Slot<S: Shape> {
    revision: AtomicU64,
    age: AtomicU64,
    /// Family tag of the occupant; written under the claim lock.
    tag: AtomicU32,
    cells: S::Cells,
}

/// What [`Slot::try_claim`] is allowed to take.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ClaimFilter {
    /// Vacant slots, or live unpinned ones stamped before the cutoff.
    VacantOrStale,
    /// Only live unpinned slots stamped before the cutoff.
    StaleOnly,
}

impl<S: Shape> Slot<S> {
    /// An unused slot.
    pub fn vacant() -> Self {
        Self {
            revision: AtomicU64::new(REVISION_FREE),
            age: AtomicU64::new(AGE_UNUSED),
            tag: AtomicU32::new(0),
            cells: S::empty_cells(),
        }
    }

    /// Current revision word.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    /// Current age word.
    pub fn age(&self) -> u64 {
        self.age.load(Ordering::Acquire)
    }

    /// Family tag of the current (or last) occupant.
    pub fn tag(&self) -> TypeTag {
        TypeTag(self.tag.load(Ordering::Acquire) as u16)
    }

    /// Current payload words.
    pub fn payload(&self) -> S {
        S::load(&self.cells)
    }

    /// Classify a handle carrying `revision` and `payload` against this slot.
    ///
    /// The payload is compared word by word and the revision is re-read
    /// afterwards, so a release racing with the read reports `Expired`
    /// rather than returning torn words.
    pub fn state(&self, revision: u64, payload: S) -> SlotState {
        let live = self.revision();
        let state = match live {
            REVISION_PINNED => SlotState::Pinned,
            r if r >= FIRST_REVISION && r == revision => SlotState::Live,
            _ => return SlotState::Expired,
        };
        if self.payload() != payload || self.revision() != live {
            return SlotState::Expired;
        }
        state
    }

    /// Try to take the claim lock for allocation or sweeping.
    ///
    /// On success both words hold their lock values and the previous
    /// revision is returned (`REVISION_FREE` for a vacant slot). On failure
    /// the slot is left as it was.
    pub(crate) fn try_claim(&self, stale_before: u64, filter: ClaimFilter) -> Option<u64> {
        let age = self.age();
        if age == AGE_LOCKED {
            return None;
        }
        let revision = self.revision();
        let stale = age > AGE_QUEUED && age < stale_before;
        let eligible = match revision {
            REVISION_FREE => filter == ClaimFilter::VacantOrStale,
            REVISION_LOCKED | REVISION_PINNED => false,
            _ => stale,
        };
        if !eligible {
            return None;
        }
        self.age
            .compare_exchange(age, AGE_LOCKED, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        if self
            .revision
            .compare_exchange(revision, REVISION_LOCKED, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            // Lost the occupant to a release or pin; hand the age back.
            self.age.store(age, Ordering::Release);
            return None;
        }
        Some(revision)
    }

    /// Install a new occupant into a claimed slot and drop both locks.
    ///
    /// Returns the revision found if the slot was not in the locked state,
    /// in which case nothing is written.
    pub(crate) fn commit(&self, revision: u64, tag: TypeTag, payload: S, now: u64) -> Result<(), u64> {
        let found = self.revision();
        if found != REVISION_LOCKED {
            return Err(found);
        }
        S::store(&self.cells, payload);
        self.tag.store(u32::from(tag.0), Ordering::Release);
        self.revision.store(revision, Ordering::Release);
        self.age.store(now, Ordering::Release);
        Ok(())
    }

    /// Empty a claimed slot and mark it queued for reuse.
    pub(crate) fn vacate(&self) -> Result<(), u64> {
        let found = self.revision();
        if found != REVISION_LOCKED {
            return Err(found);
        }
        self.revision.store(REVISION_FREE, Ordering::Release);
        self.age.store(AGE_QUEUED, Ordering::Release);
        Ok(())
    }

    /// Take the occupancy lock on behalf of a handle, for release.
    ///
    /// Succeeds when the slot still holds the handle's occupant: either the
    /// exact revision, or the pinned sentinel with an identical payload.
    /// Returns the payload read under the lock.
    pub(crate) fn lock_occupant(&self, revision: u64, payload: S) -> Option<S> {
        let live = self.revision();
        let holds = match live {
            REVISION_PINNED => self.payload() == payload,
            r => r >= FIRST_REVISION && r == revision,
        };
        if !holds {
            return None;
        }
        self.revision
            .compare_exchange(live, REVISION_LOCKED, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        Some(self.payload())
    }

    /// Finish a release begun by [`lock_occupant`](Self::lock_occupant).
    ///
    /// Returns `true` if the slot should be pushed onto the free queue. A
    /// slot whose age is held by a concurrent claimer is left for that
    /// claimer (or a later probe) to pick up.
    pub(crate) fn finish_release(&self) -> bool {
        self.revision.store(REVISION_FREE, Ordering::Release);
        let mut age = self.age();
        // A concurrent mark may still move a generation stamp forward.
        while age > AGE_QUEUED {
            match self
                .age
                .compare_exchange(age, AGE_QUEUED, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return true,
                Err(found) => age = found,
            }
        }
        false
    }

    /// Force the slot's revision to the pinned sentinel.
    pub(crate) fn pin(&self, revision: u64, payload: S) -> SlotState {
        loop {
            match self.state(revision, payload) {
                SlotState::Expired => return SlotState::Expired,
                SlotState::Pinned => return SlotState::Pinned,
                SlotState::Live => {
                    if self
                        .revision
                        .compare_exchange(
                            revision,
                            REVISION_PINNED,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                        )
                        .is_ok()
                    {
                        return SlotState::Pinned;
                    }
                }
            }
        }
    }

    /// Overwrite the age word, standing in for a concurrent claimer.
    #[cfg(test)]
    pub(crate) fn store_age(&self, age: u64) {
        self.age.store(age, Ordering::Release);
    }

    /// Refresh the age stamp to `now` if the slot still holds the handle's
    /// occupant. Never moves a stamp backwards and never touches a locked
    /// or queued slot.
    pub(crate) fn mark(&self, revision: u64, payload: S, now: u64) -> bool {
        loop {
            let age = self.age();
            if age <= AGE_QUEUED {
                return false;
            }
            // Re-checked on every attempt: the occupant may have changed
            // since the last failed exchange.
            if self.state(revision, payload) != SlotState::Live {
                return false;
            }
            if age >= now {
                return true;
            }
            if self
                .age
                .compare_exchange(age, now, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Slot1 = Slot<[u64; 1]>;

    fn live(revision: u64, payload: u64, now: u64) -> Slot1 {
        let slot = Slot1::vacant();
        assert_eq!(slot.try_claim(0, ClaimFilter::VacantOrStale), Some(REVISION_FREE));
        slot.commit(revision, TypeTag(0), [payload], now).unwrap();
        slot
    }

    #[test]
    fn vacant_slot_is_claimable() {
        let slot = Slot1::vacant();
        assert_eq!(slot.try_claim(0, ClaimFilter::VacantOrStale), Some(REVISION_FREE));
        assert_eq!(slot.revision(), REVISION_LOCKED);
        assert_eq!(slot.age(), AGE_LOCKED);
    }

    #[test]
    fn claimed_slot_is_not_claimable_twice() {
        let slot = Slot1::vacant();
        slot.try_claim(0, ClaimFilter::VacantOrStale).unwrap();
        assert_eq!(slot.try_claim(0, ClaimFilter::VacantOrStale), None);
    }

    #[test]
    fn fresh_live_slot_is_not_stale() {
        let slot = live(10, 7, 5);
        assert_eq!(slot.try_claim(5, ClaimFilter::VacantOrStale), None);
        assert_eq!(slot.try_claim(6, ClaimFilter::StaleOnly), Some(10));
    }

    #[test]
    fn stale_only_skips_vacant() {
        let slot = Slot1::vacant();
        assert_eq!(slot.try_claim(100, ClaimFilter::StaleOnly), None);
    }

    #[test]
    fn state_requires_revision_and_payload() {
        let slot = live(10, 7, 5);
        assert_eq!(slot.state(10, [7]), SlotState::Live);
        assert_eq!(slot.state(11, [7]), SlotState::Expired);
        assert_eq!(slot.state(10, [8]), SlotState::Expired);
    }

    #[test]
    fn release_then_state_is_expired() {
        let slot = live(10, 7, 5);
        assert_eq!(slot.lock_occupant(10, [7]), Some([7]));
        assert!(slot.finish_release());
        assert_eq!(slot.revision(), REVISION_FREE);
        assert_eq!(slot.age(), AGE_QUEUED);
        assert_eq!(slot.state(10, [7]), SlotState::Expired);
        assert_eq!(slot.lock_occupant(10, [7]), None);
    }

    #[test]
    fn pinned_slot_survives_staleness() {
        let slot = live(10, 7, 5);
        assert_eq!(slot.pin(10, [7]), SlotState::Pinned);
        assert_eq!(slot.try_claim(u64::MAX, ClaimFilter::VacantOrStale), None);
        assert_eq!(slot.state(REVISION_PINNED, [7]), SlotState::Pinned);
        // The pre-pin handle still designates the same occupant.
        assert_eq!(slot.state(10, [7]), SlotState::Pinned);
    }

    #[test]
    fn mark_moves_age_forward_only() {
        let slot = live(10, 7, 5);
        assert!(slot.mark(10, [7], 9));
        assert_eq!(slot.age(), 9);
        assert!(slot.mark(10, [7], 6));
        assert_eq!(slot.age(), 9);
        assert!(!slot.mark(11, [7], 12));
        assert_eq!(slot.age(), 9);
    }

    #[test]
    fn release_leaves_a_claimed_age_alone() {
        let slot = live(10, 7, 5);
        assert_eq!(slot.lock_occupant(10, [7]), Some([7]));
        // A claimer holds the age word while the release lands.
        slot.age.store(AGE_LOCKED, Ordering::Release);
        assert!(!slot.finish_release());
        assert_eq!(slot.revision(), REVISION_FREE);
        assert_eq!(slot.age(), AGE_LOCKED);

        // Once the claimer backs off, the vacant slot is claimable again.
        slot.age.store(5, Ordering::Release);
        assert_eq!(slot.try_claim(0, ClaimFilter::VacantOrStale), Some(REVISION_FREE));
    }

    #[test]
    fn release_queues_any_generation_stamp() {
        let slot = live(10, 7, 5);
        assert!(slot.mark(10, [7], 40));
        slot.lock_occupant(10, [7]).unwrap();
        assert!(slot.finish_release());
        assert_eq!(slot.age(), AGE_QUEUED);
    }

    #[test]
    fn mark_after_reuse_leaves_new_occupant_alone() {
        let slot = live(10, 7, 5);
        slot.lock_occupant(10, [7]).unwrap();
        assert!(slot.finish_release());
        slot.try_claim(0, ClaimFilter::VacantOrStale).unwrap();
        slot.commit(11, TypeTag(0), [7], 6).unwrap();

        assert!(!slot.mark(10, [7], 9));
        assert_eq!(slot.age(), 6);
        assert!(slot.mark(11, [7], 9));
        assert_eq!(slot.age(), 9);
    }

    #[test]
    fn commit_outside_lock_reports_revision() {
        let slot = live(10, 7, 5);
        assert_eq!(slot.commit(11, TypeTag(0), [1], 5), Err(10));
        assert_eq!(slot.vacate(), Err(10));
    }

    #[cfg(not(miri))]
    mod proptests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Clone, Debug)]
        enum Op {
            Claim { now: u64, stale_before: u64 },
            Release,
            Pin,
            Mark(u64),
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                3 => (3u64..20, 0u64..24)
                    .prop_map(|(now, stale_before)| Op::Claim { now, stale_before }),
                2 => Just(Op::Release),
                1 => Just(Op::Pin),
                2 => (3u64..20).prop_map(Op::Mark),
            ]
        }

        #[derive(Clone, Copy, Debug)]
        struct Occupant {
            revision: u64,
            payload: u64,
            age: u64,
            pinned: bool,
        }

        proptest! {
            /// One slot driven through claim, release, pin and mark stays in
            /// step with a single-occupant model, and every retired handle
            /// stays expired.
            #[test]
            fn slot_follows_single_occupant_model(ops in prop::collection::vec(op(), 1..60)) {
                let slot = Slot::<[u64; 1]>::vacant();
                let mut current: Option<Occupant> = None;
                let mut retired: Vec<(u64, u64)> = Vec::new();
                let mut next = FIRST_REVISION;

                for op in ops {
                    match op {
                        Op::Claim { now, stale_before } => {
                            let eligible = current
                                .map_or(true, |o| !o.pinned && o.age < stale_before);
                            let claimed = slot.try_claim(stale_before, ClaimFilter::VacantOrStale);
                            prop_assert_eq!(claimed.is_some(), eligible);
                            if claimed.is_some() {
                                if let Some(o) = current.take() {
                                    retired.push((o.revision, o.payload));
                                }
                                prop_assert!(slot.commit(next, TypeTag(0), [next], now).is_ok());
                                current = Some(Occupant {
                                    revision: next,
                                    payload: next,
                                    age: now,
                                    pinned: false,
                                });
                                next += 1;
                            }
                        }
                        Op::Release => {
                            if let Some(o) = current.take() {
                                prop_assert_eq!(slot.lock_occupant(o.revision, [o.payload]), Some([o.payload]));
                                prop_assert!(slot.finish_release());
                                prop_assert_eq!(slot.age(), AGE_QUEUED);
                                retired.push((o.revision, o.payload));
                            }
                        }
                        Op::Pin => {
                            if let Some(o) = current.as_mut() {
                                prop_assert_eq!(slot.pin(o.revision, [o.payload]), SlotState::Pinned);
                                o.pinned = true;
                            }
                        }
                        Op::Mark(now) => {
                            if let Some(o) = current.as_mut() {
                                prop_assert_eq!(slot.mark(o.revision, [o.payload], now), !o.pinned);
                                if !o.pinned {
                                    o.age = o.age.max(now);
                                }
                            }
                        }
                    }

                    if let Some(o) = current {
                        let expected = if o.pinned { SlotState::Pinned } else { SlotState::Live };
                        prop_assert_eq!(slot.state(o.revision, [o.payload]), expected);
                        prop_assert_eq!(slot.age(), o.age);
                    }
                    for &(revision, payload) in &retired {
                        prop_assert_eq!(slot.state(revision, [payload]), SlotState::Expired);
                        prop_assert_eq!(slot.lock_occupant(revision, [payload]), None);
                    }
                }
            }
        }
    }
}
