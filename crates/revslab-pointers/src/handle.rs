//! Typed handles and their encodings.
//!
//! A [`Handle`] is a plain `Copy` value: an address, a revision and a copy
//! of the payload taken when it was issued. It owns nothing. Every
//! dereference re-validates it against the allocator's tables.
//!
//! | encoding  | address | revision   | storage                  |
//! |-----------|---------|------------|--------------------------|
//! | `Raw`     | 0       | 0          | payload embedded         |
//! | `Lent`    | 0       | 1          | payload embedded, borrowed |
//! | `Static`  | n > 0   | 0          | static table, never freed |
//! | `Managed` | n > 0   | r >= 2     | slab slot, revision-checked |

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use revslab_core::sentinel::{REVISION_FREE, REVISION_LOCKED};
use revslab_core::{Address, Revision};
use revslab_table::Shape;

use crate::pointer::Pointer;

/// How a handle is backed, derived from its address and revision alone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// Unmanaged payload embedded in the handle.
    Raw,
    /// Borrowed payload embedded in the handle; never released.
    Lent,
    /// Entry in the never-freed static table.
    Static,
    /// Slot in the slab table.
    Managed,
}

/// What [`Pointers::ask`](crate::Pointers::ask) found out about a handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Unmanaged payload.
    Raw,
    /// Borrowed payload the caller must not free.
    Lent,
    /// Static entry.
    Static,
    /// Live managed pointer.
    Managed,
    /// Live managed pointer exempt from reclamation.
    Pinned,
    /// Managed pointer that was released, recycled or reclaimed.
    Expired,
}

/// A handle to a pointer of type `T`.
#[must_use]
pub struct Handle<T: Pointer> {
    address: Address,
    revision: Revision,
    payload: T::Shape,
    _type: PhantomData<fn() -> T>,
}

impl<T: Pointer> Handle<T> {
    /// An unmanaged handle embedding `payload`.
    ///
    /// `get` returns the payload verbatim; `end`, `free` and `pin` have
    /// nothing to act on. The all-zero raw handle is the nil handle.
    pub fn raw(payload: T::Shape) -> Self {
        Self::from_parts(Address::NONE, Revision(REVISION_FREE), payload)
    }

    /// A borrowed handle embedding `payload`.
    ///
    /// Behaves like [`Handle::raw`] except that it reports
    /// [`Kind::Lent`], telling the holder it does not own the resource.
    pub fn lent(payload: T::Shape) -> Self {
        Self::from_parts(Address::NONE, Revision(REVISION_LOCKED), payload)
    }

    /// The nil handle.
    pub fn nil() -> Self {
        Self::raw(T::Shape::zeroed())
    }

    pub(crate) fn managed(address: Address, revision: Revision, payload: T::Shape) -> Self {
        debug_assert!(!address.is_none());
        Self::from_parts(address, revision, payload)
    }

    pub(crate) fn stored(address: Address, payload: T::Shape) -> Self {
        debug_assert!(!address.is_none());
        Self::from_parts(address, Revision(REVISION_FREE), payload)
    }

    fn from_parts(address: Address, revision: Revision, payload: T::Shape) -> Self {
        Self {
            address,
            revision,
            payload,
            _type: PhantomData,
        }
    }

    /// How this handle is backed.
    pub fn encoding(&self) -> Encoding {
        match (self.address.is_none(), self.revision.0) {
            (true, REVISION_LOCKED) => Encoding::Lent,
            (true, _) => Encoding::Raw,
            (false, REVISION_FREE) => Encoding::Static,
            (false, _) => Encoding::Managed,
        }
    }

    /// Slot or static-entry address (zero for raw and lent handles).
    pub fn address(&self) -> Address {
        self.address
    }

    /// Revision cached when the handle was issued.
    pub fn revision(&self) -> Revision {
        self.revision
    }

    /// Payload cached when the handle was issued.
    ///
    /// Unvalidated: use [`Pointers::get`](crate::Pointers::get) to
    /// dereference.
    pub fn cached(&self) -> T::Shape {
        self.payload
    }

    /// Whether this is the nil handle.
    pub fn is_nil(&self) -> bool {
        self.encoding() == Encoding::Raw && self.payload == T::Shape::zeroed()
    }
}

impl<T: Pointer> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: Pointer> Copy for Handle<T> {}

impl<T: Pointer> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
            && self.revision == other.revision
            && self.payload == other.payload
    }
}

impl<T: Pointer> Eq for Handle<T> {}

impl<T: Pointer> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state);
        self.revision.hash(state);
        self.payload.words().hash(state);
    }
}

impl<T: Pointer> Default for Handle<T> {
    fn default() -> Self {
        Self::nil()
    }
}

impl<T: Pointer> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("type", &T::NAME)
            .field("address", &self.address)
            .field("revision", &self.revision)
            .field("payload", &self.payload)
            .finish()
    }
}

impl<T: Pointer> fmt::Display for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}(addr={}, rev={}, {:?})",
            T::NAME,
            self.address,
            self.revision,
            self.encoding()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use revslab_core::sentinel::REVISION_PINNED;

    struct Probe;

    impl Pointer for Probe {
        type Shape = [u64; 2];
        const NAME: &'static str = "Probe";
        fn free(_: [u64; 2]) {}
    }

    #[test]
    fn encodings_follow_address_and_revision() {
        assert_eq!(Handle::<Probe>::raw([1, 2]).encoding(), Encoding::Raw);
        assert_eq!(Handle::<Probe>::lent([1, 2]).encoding(), Encoding::Lent);
        assert_eq!(
            Handle::<Probe>::stored(Address(4), [1, 2]).encoding(),
            Encoding::Static
        );
        assert_eq!(
            Handle::<Probe>::managed(Address(4), Revision(9), [1, 2]).encoding(),
            Encoding::Managed
        );
        assert_eq!(
            Handle::<Probe>::managed(Address(4), Revision(REVISION_PINNED), [1, 2]).encoding(),
            Encoding::Managed
        );
    }

    #[test]
    fn default_is_nil() {
        let h = Handle::<Probe>::default();
        assert!(h.is_nil());
        assert!(!Handle::<Probe>::raw([0, 1]).is_nil());
        assert!(!Handle::<Probe>::lent([0, 0]).is_nil());
    }

    #[test]
    fn handles_are_copy_values() {
        let a = Handle::<Probe>::managed(Address(1), Revision(3), [7, 8]);
        let b = a;
        assert_eq!(a, b);
        assert_eq!(b.cached(), [7, 8]);
    }

    #[test]
    fn display_names_type() {
        let h = Handle::<Probe>::managed(Address(2), Revision(5), [0, 0]);
        assert_eq!(h.to_string(), "Probe(addr=2, rev=5, Managed)");
    }
}
