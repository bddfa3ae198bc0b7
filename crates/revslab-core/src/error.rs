//! Error taxonomy for managed pointer operations.
//!
//! Every variant except [`PointerError::CapacityExceeded`] and
//! [`PointerError::FamilyFull`] describes a contract violation by the
//! caller. The panicking allocator verbs turn these into panics carrying
//! the `Display` text; the `try_*` verbs hand them back unchanged.

use std::error::Error;
use std::fmt;

use crate::id::{Address, Revision};

/// Errors that can occur during pointer operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PointerError {
    /// The handle's cached revision or payload no longer matches its slot:
    /// the pointer was released, recycled, or reclaimed.
    Expired {
        /// Address carried by the handle.
        address: Address,
        /// Revision cached in the handle.
        expected: Revision,
        /// Revision found in the slot.
        found: Revision,
    },
    /// A slot being recycled left the locked state while its `Free`
    /// callback ran, so some other path freed it concurrently.
    BadFree {
        /// Address of the slot being recycled.
        address: Address,
        /// Revision found in the slot after the callback returned.
        found: Revision,
    },
    /// `Pin` on a raw or lent handle; only managed handles can be pinned.
    NilPin,
    /// `Set` on a handle that does not live in static storage.
    NotStatic {
        /// Address carried by the handle.
        address: Address,
    },
    /// A table (or static table) has used every page it may allocate.
    CapacityExceeded {
        /// Payload width of the table, in words.
        shape_words: usize,
        /// Total slot capacity of the table.
        capacity: usize,
    },
    /// Too many named pointer types share one shape table.
    FamilyFull {
        /// Name of the pointer type that could not be registered.
        name: &'static str,
        /// Maximum number of types per family.
        capacity: usize,
    },
}

impl fmt::Display for PointerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expired {
                address,
                expected,
                found,
            } => {
                write!(
                    f,
                    "expired pointer: address {address}, revision {expected}, slot holds {found}"
                )
            }
            Self::BadFree { address, found } => {
                write!(
                    f,
                    "bad free: slot {address} left the locked state (revision {found}) during recycling"
                )
            }
            Self::NilPin => write!(f, "cannot pin a raw or lent pointer"),
            Self::NotStatic { address } => {
                write!(f, "pointer at address {address} is not static")
            }
            Self::CapacityExceeded {
                shape_words,
                capacity,
            } => {
                write!(
                    f,
                    "pointer table capacity exceeded: {shape_words}-word table holds {capacity} slots"
                )
            }
            Self::FamilyFull { name, capacity } => {
                write!(
                    f,
                    "cannot register pointer type '{name}': family holds at most {capacity} types"
                )
            }
        }
    }
}

impl Error for PointerError {}
