//! Named pointer types sharing one shape table.
//!
//! A [`Family`] maps each registered pointer type to a dense [`TypeTag`]
//! and remembers its `Free` callback. The tag is stored in every slot the
//! type occupies, so code that only sees slots (the sweep, the recycle
//! path of allocation) can still release the foreign resource correctly.

use std::any::TypeId;
use std::sync::{PoisonError, RwLock};

use indexmap::IndexMap;
use revslab_core::{PointerError, TypeTag};

/// A registered pointer type.
#[derive(Clone, Copy, Debug)]
pub struct Member<S> {
    /// Human-readable type name, used in logs and errors.
    pub name: &'static str,
    /// Releases the foreign resource behind a payload.
    pub free: fn(S),
}

/// Registry of the pointer types sharing one table.
///
/// Tags are insertion indices and are never reused or removed, so a tag
/// read from a slot always resolves to the type that wrote it.
pub struct Family<S> {
    members: RwLock<IndexMap<TypeId, Member<S>>>,
    capacity: u16,
}

impl<S: Copy> Family<S> {
    /// Create an empty family admitting at most `capacity` types.
    pub fn new(capacity: u16) -> Self {
        Self {
            members: RwLock::new(IndexMap::new()),
            capacity,
        }
    }

    /// Return the tag for `id`, registering it with `name` and `free` on
    /// first sight.
    ///
    /// Returns `Err(PointerError::FamilyFull)` once `capacity` distinct
    /// types are registered.
    pub fn register(&self, id: TypeId, name: &'static str, free: fn(S)) -> Result<TypeTag, PointerError> {
        {
            let members = self.members.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(index) = members.get_index_of(&id) {
                return Ok(TypeTag(index as u16));
            }
        }
        let mut members = self.members.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(index) = members.get_index_of(&id) {
            return Ok(TypeTag(index as u16));
        }
        if members.len() >= self.capacity as usize {
            return Err(PointerError::FamilyFull {
                name,
                capacity: self.capacity as usize,
            });
        }
        let (index, _) = members.insert_full(id, Member { name, free });
        Ok(TypeTag(index as u16))
    }

    /// Look up the member registered under `tag`.
    pub fn member(&self, tag: TypeTag) -> Option<Member<S>> {
        let members = self.members.read().unwrap_or_else(PoisonError::into_inner);
        members.get_index(tag.0 as usize).map(|(_, member)| *member)
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.members.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no type has registered yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of types.
    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }
}
