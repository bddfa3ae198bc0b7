//! The allocator context: every verb a binding layer calls.
//!
//! [`Pointers`] owns the slab and static tables for all three payload
//! shapes plus the cycle counter. Independent instances share nothing, so
//! tests construct their own; applications usually go through
//! [`global()`](crate::global).
//!
//! Verbs that can detect a contract violation come in pairs: `try_*`
//! returns the [`PointerError`], the plain form panics with its message.

use std::any::TypeId;

use log::{trace, warn};
use revslab_core::sentinel::REVISION_PINNED;
use revslab_core::{Generation, PointerError, Revision, TypeTag};
use revslab_table::{Recycled, Shape, SlotState, Table, TableSet};

use crate::config::{ConfigError, PointersConfig};
use crate::cycle::CycleCounter;
use crate::handle::{Encoding, Handle, Kind};
use crate::pointer::Pointer;

/// A managed pointer allocator.
pub struct Pointers {
    pub(crate) tables: TableSet,
    pub(crate) cycle: CycleCounter,
    pub(crate) config: PointersConfig,
}

// Compile-time assertion: one allocator serves every thread.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<Pointers>();
};

impl Default for Pointers {
    fn default() -> Self {
        Self::new(PointersConfig::default()).expect("default PointersConfig is valid")
    }
}

impl Pointers {
    /// Build an allocator from a validated configuration.
    pub fn new(config: PointersConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            tables: TableSet::new(&config.table),
            cycle: CycleCounter::new(),
            config,
        })
    }

    /// The configuration this allocator was built with.
    pub fn config(&self) -> &PointersConfig {
        &self.config
    }

    /// Register `T` in its shape's family and return its tag.
    ///
    /// Allocation registers implicitly; calling this up front only moves
    /// the one-time write lock out of the first `alloc`.
    pub fn register<T: Pointer>(&self) -> Result<TypeTag, PointerError> {
        self.table::<T>()
            .family()
            .register(TypeId::of::<T>(), T::NAME, T::free)
    }

    // ── New ────────────────────────────────────────────────────────

    /// Allocate a managed handle for `payload`.
    ///
    /// Reuses a released slot if one is queued, otherwise probes the ring
    /// for a vacant or (with `recycle_on_new`) stale slot, otherwise
    /// extends the table. A stale occupant displaced by the probe has its
    /// `Free` callback run before the new occupant is installed.
    pub fn try_alloc<T: Pointer>(&self, payload: T::Shape) -> Result<Handle<T>, PointerError> {
        let table = self.table::<T>();
        let tag = self.register::<T>()?;
        let now = self.cycle.current();
        let recycle_before = self
            .config
            .recycle_on_new
            .then(|| now.stale_before(self.config.max_generation_age));

        let claimed = table.claim(recycle_before)?;
        if let Some(recycled) = claimed.recycled() {
            run_free(table, recycled);
        }
        let (address, revision) = table.commit(claimed, tag, payload, now)?;
        Ok(Handle::managed(address, revision, payload))
    }

    /// Panicking form of [`try_alloc`](Self::try_alloc).
    ///
    /// # Panics
    ///
    /// On table exhaustion, a full family, or a bad free during recycling.
    pub fn alloc<T: Pointer>(&self, payload: T::Shape) -> Handle<T> {
        self.try_alloc(payload).unwrap_or_else(|err| panic!("{err}"))
    }

    // ── Get ────────────────────────────────────────────────────────

    /// Dereference a handle.
    ///
    /// Raw and lent handles return their payload verbatim. Static handles
    /// read the static table. Managed handles must still match their slot:
    /// same revision (or the slot is pinned) and identical payload words.
    pub fn try_get<T: Pointer>(&self, handle: Handle<T>) -> Result<T::Shape, PointerError> {
        match handle.encoding() {
            Encoding::Raw | Encoding::Lent => Ok(handle.cached()),
            Encoding::Static => self
                .tables
                .statics::<T::Shape>()
                .get(handle.address())
                .ok_or(PointerError::Expired {
                    address: handle.address(),
                    expected: handle.revision(),
                    found: handle.revision(),
                }),
            Encoding::Managed => {
                self.table::<T>()
                    .validate(handle.address(), handle.revision(), handle.cached())
            }
        }
    }

    /// Panicking form of [`try_get`](Self::try_get).
    ///
    /// # Panics
    ///
    /// With "expired pointer" if the handle was released, recycled or
    /// reclaimed.
    pub fn get<T: Pointer>(&self, handle: Handle<T>) -> T::Shape {
        self.try_get(handle).unwrap_or_else(|err| panic!("{err}"))
    }

    // ── End / Free ─────────────────────────────────────────────────

    /// Release a managed handle.
    ///
    /// Returns the payload and `true` on the first release of the
    /// occupant, and the cached payload with `false` on every later call.
    /// Never fails: releasing twice is a no-op. Raw, lent and static
    /// handles are never released.
    ///
    /// The type's `Free` callback does not run; the caller now owns the
    /// payload. Use [`free`](Self::free) to release and tear down.
    pub fn end<T: Pointer>(&self, handle: Handle<T>) -> (T::Shape, bool) {
        match handle.encoding() {
            Encoding::Managed => {
                match self
                    .table::<T>()
                    .release(handle.address(), handle.revision(), handle.cached())
                {
                    Some(payload) => (payload, true),
                    None => (handle.cached(), false),
                }
            }
            Encoding::Static => (
                self.tables
                    .statics::<T::Shape>()
                    .get(handle.address())
                    .unwrap_or(handle.cached()),
                false,
            ),
            Encoding::Raw | Encoding::Lent => (handle.cached(), false),
        }
    }

    /// Release a managed handle and run `T::free` on its payload.
    ///
    /// The callback runs only when this call performed the first release.
    pub fn free<T: Pointer>(&self, handle: Handle<T>) -> bool {
        let (payload, first) = self.end(handle);
        if first {
            trace!("freeing {} payload {:?}", T::NAME, payload);
            T::free(payload);
        }
        first
    }

    // ── Pin ────────────────────────────────────────────────────────

    /// Exempt a managed handle's slot from generational reclamation.
    ///
    /// Returns the handle to keep using: it carries the pinned sentinel
    /// revision and stays valid until released. Static handles are already
    /// permanent and are returned as is.
    pub fn try_pin<T: Pointer>(&self, handle: Handle<T>) -> Result<Handle<T>, PointerError> {
        match handle.encoding() {
            Encoding::Raw | Encoding::Lent => Err(PointerError::NilPin),
            Encoding::Static => Ok(handle),
            Encoding::Managed => {
                self.table::<T>()
                    .pin(handle.address(), handle.revision(), handle.cached())?;
                Ok(Handle::managed(
                    handle.address(),
                    Revision(REVISION_PINNED),
                    handle.cached(),
                ))
            }
        }
    }

    /// Panicking form of [`try_pin`](Self::try_pin).
    ///
    /// # Panics
    ///
    /// On raw or lent handles, and on expired handles.
    pub fn pin<T: Pointer>(&self, handle: Handle<T>) -> Handle<T> {
        self.try_pin(handle).unwrap_or_else(|err| panic!("{err}"))
    }

    // ── Add / Set ──────────────────────────────────────────────────

    /// Store `payload` in the static table and return a static handle.
    ///
    /// Static entries are never released or reclaimed.
    pub fn try_add<T: Pointer>(&self, payload: T::Shape) -> Result<Handle<T>, PointerError> {
        let address = self.tables.statics::<T::Shape>().add(payload)?;
        Ok(Handle::stored(address, payload))
    }

    /// Panicking form of [`try_add`](Self::try_add).
    ///
    /// # Panics
    ///
    /// When the static table for `T`'s shape is full.
    pub fn add<T: Pointer>(&self, payload: T::Shape) -> Handle<T> {
        self.try_add(payload).unwrap_or_else(|err| panic!("{err}"))
    }

    /// Overwrite a static entry in place.
    pub fn try_set<T: Pointer>(&self, handle: Handle<T>, payload: T::Shape) -> Result<(), PointerError> {
        let not_static = PointerError::NotStatic {
            address: handle.address(),
        };
        if handle.encoding() != Encoding::Static {
            return Err(not_static);
        }
        if self.tables.statics::<T::Shape>().set(handle.address(), payload) {
            Ok(())
        } else {
            Err(not_static)
        }
    }

    /// Panicking form of [`try_set`](Self::try_set).
    ///
    /// # Panics
    ///
    /// When `handle` is not a static handle from this allocator.
    pub fn set<T: Pointer>(&self, handle: Handle<T>, payload: T::Shape) {
        self.try_set(handle, payload)
            .unwrap_or_else(|err| panic!("{err}"));
    }

    // ── Raw / Lend / Ask / Cut ─────────────────────────────────────

    /// An unmanaged handle embedding `payload`. See [`Handle::raw`].
    pub fn raw<T: Pointer>(&self, payload: T::Shape) -> Handle<T> {
        Handle::raw(payload)
    }

    /// A borrowed handle embedding `payload`. See [`Handle::lent`].
    pub fn lend<T: Pointer>(&self, payload: T::Shape) -> Handle<T> {
        Handle::lent(payload)
    }

    /// Classify a handle without panicking.
    ///
    /// Returns the current payload for live and static handles, and the
    /// cached payload otherwise.
    pub fn ask<T: Pointer>(&self, handle: Handle<T>) -> (T::Shape, Kind) {
        let cached = handle.cached();
        match handle.encoding() {
            Encoding::Raw => (cached, Kind::Raw),
            Encoding::Lent => (cached, Kind::Lent),
            Encoding::Static => match self.tables.statics::<T::Shape>().get(handle.address()) {
                Some(payload) => (payload, Kind::Static),
                None => (cached, Kind::Expired),
            },
            Encoding::Managed => {
                let state = self
                    .table::<T>()
                    .state(handle.address(), handle.revision(), cached);
                let kind = match state {
                    SlotState::Live => Kind::Managed,
                    SlotState::Pinned => Kind::Pinned,
                    SlotState::Expired => Kind::Expired,
                };
                (cached, kind)
            }
        }
    }

    /// Read a handle's payload, optionally handing ownership to the caller.
    ///
    /// With `transfer`, a managed handle is released without running
    /// `T::free`: the resource now belongs to whoever received the payload.
    ///
    /// # Panics
    ///
    /// With "expired pointer" if the handle is no longer valid.
    pub fn cut<T: Pointer>(&self, handle: Handle<T>, transfer: bool) -> T::Shape {
        let payload = self.get(handle);
        if transfer && handle.encoding() == Encoding::Managed {
            let _ = self.end(handle);
        }
        payload
    }

    // ── Cycle ──────────────────────────────────────────────────────

    /// The current generation.
    pub fn cycle(&self) -> Generation {
        self.cycle.current()
    }

    /// Advance the generation by one and return the new value.
    pub fn advance_cycle(&self) -> Generation {
        self.cycle.advance()
    }

    /// Oldest generation stamp that is not yet stale.
    pub fn stale_before(&self) -> Generation {
        self.cycle.current().stale_before(self.config.max_generation_age)
    }

    pub(crate) fn table<T: Pointer>(&self) -> &Table<T::Shape> {
        self.tables.table::<T::Shape>()
    }
}

/// Run the `Free` callback of a displaced occupant.
pub(crate) fn run_free<S: Shape>(table: &Table<S>, recycled: Recycled<S>) {
    match table.family().member(recycled.tag) {
        Some(member) => {
            trace!("freeing {} payload {:?}", member.name, recycled.payload);
            (member.free)(recycled.payload);
        }
        None => warn!(
            "no pointer type registered for tag {} in the {}-word table; payload {:?} not freed",
            recycled.tag,
            S::WORDS,
            recycled.payload
        ),
    }
}
