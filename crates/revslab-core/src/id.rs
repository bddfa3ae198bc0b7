//! Strongly-typed identifiers and the reserved slot sentinels.

use std::fmt;

/// Reserved values for a slot's `revision` and `age` words.
///
/// Both words share the same convention: values `0..=2` are sentinels and
/// anything above is a real stamp. A handle never carries a revision of
/// [`REVISION_LOCKED`](sentinel::REVISION_LOCKED) for a managed slot, so a
/// slot caught mid-transition can never validate.
pub mod sentinel {
    /// Slot has no occupant (never used, or released).
    pub const REVISION_FREE: u64 = 0;
    /// Slot is locked by a thread moving it between states.
    pub const REVISION_LOCKED: u64 = 1;
    /// Slot is pinned: exempt from generational reclamation.
    pub const REVISION_PINNED: u64 = 2;
    /// First revision handed to a live occupant.
    pub const FIRST_REVISION: u64 = 3;

    /// Slot has never been claimed.
    pub const AGE_UNUSED: u64 = 0;
    /// Slot is claimed by an allocating or sweeping thread.
    pub const AGE_LOCKED: u64 = 1;
    /// Slot has been released and queued for reuse.
    pub const AGE_QUEUED: u64 = 2;
    /// First generation stamp.
    pub const FIRST_GENERATION: u64 = 3;
}

/// Caller-visible slot address.
///
/// Addresses are the slot index plus one, so that `Address(0)` stays free
/// to mean "no slot" (raw and lent handles).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub u32);

impl Address {
    /// The "no slot" address used by raw and lent handles.
    pub const NONE: Address = Address(0);

    /// Address of the slot at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index == u32::MAX`; table configuration guarantees slot
    /// indices stay below that.
    pub fn from_index(index: u32) -> Self {
        Self(index.checked_add(1).expect("slot index below u32::MAX"))
    }

    /// The slot index this address designates, or `None` for [`Address::NONE`].
    pub fn index(self) -> Option<u32> {
        self.0.checked_sub(1)
    }

    /// Whether this is [`Address::NONE`].
    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Occupancy stamp of a slot, copied into every handle issued for it.
///
/// Revisions for a given slot strictly increase across its reuse history
/// (ignoring the sentinel range), which is what makes stale handles
/// detectable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Revision(pub u64);

impl Revision {
    /// Whether this revision is one of the reserved sentinels.
    pub fn is_sentinel(self) -> bool {
        self.0 < sentinel::FIRST_REVISION
    }

    /// Whether this is the pinned sentinel.
    pub fn is_pinned(self) -> bool {
        self.0 == sentinel::REVISION_PINNED
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Revision {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Allocation cycle: a coarse, explicitly advanced logical clock.
///
/// Starts at [`Generation::FIRST`] so every real stamp lies above the
/// `age` sentinels. Never wraps in practice (a 64-bit counter advanced a
/// million times per second lasts ~580,000 years).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Generation(pub u64);

impl Generation {
    /// The generation a freshly constructed allocator starts in.
    pub const FIRST: Generation = Generation(sentinel::FIRST_GENERATION);

    /// Oldest stamp that is still considered live when `max_age`
    /// generations of slack are allowed.
    ///
    /// Slots stamped strictly below the returned generation are stale.
    /// Saturates at [`Generation::FIRST`], so nothing is stale until the
    /// clock has advanced at least `max_age + 1` times.
    pub fn stale_before(self, max_age: u64) -> Generation {
        Generation(self.0.saturating_sub(max_age).max(sentinel::FIRST_GENERATION))
    }
}

impl Default for Generation {
    fn default() -> Self {
        Self::FIRST
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Generation {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Dense index of a named pointer type within its shape's family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeTag(pub u16);

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for TypeTag {
    fn from(v: u16) -> Self {
        Self(v)
    }
}
