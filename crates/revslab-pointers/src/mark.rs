//! The mark phase: a trait-driven walk over a caller's object graph.
//!
//! Anything reachable from the root passed to
//! [`Pointers::mark_and_sweep`](crate::Pointers::mark_and_sweep) that
//! implements [`Markable`] is visited. Every managed [`Handle`] found has
//! its slot's age stamped with the pass's generation, which keeps it out of
//! the sweep that follows.
//!
//! Containers recurse into their elements; maps visit every value before
//! every key. `Mutex` and `RwLock` are locked for the duration of their
//! subtree. `Rc` and `Arc` nodes are visited once per pass, so shared and
//! cyclic structures terminate. A `RefCell` that is mutably borrowed
//! elsewhere cannot be walked; the pass is then marked incomplete and the
//! sweep reclaims nothing.
//!
//! Types that hold no handles implement `Markable` with an empty body; the
//! [`unmarked!`](crate::unmarked) macro writes it for you.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, LinkedList, VecDeque};
use std::rc::Rc;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use indexmap::{IndexMap, IndexSet};
use revslab_core::Generation;

use crate::handle::{Encoding, Handle};
use crate::pointer::Pointer;
use crate::pointers::Pointers;

/// Walk state for one mark pass.
pub struct Marker<'a> {
    pointers: &'a Pointers,
    generation: Generation,
    marked: usize,
    visited: HashSet<usize>,
    incomplete: bool,
}

impl<'a> Marker<'a> {
    pub(crate) fn new(pointers: &'a Pointers, generation: Generation) -> Self {
        Self {
            pointers,
            generation,
            marked: 0,
            visited: HashSet::new(),
            incomplete: false,
        }
    }

    /// Stamp the slot behind `handle` with this pass's generation.
    ///
    /// Returns `false` for raw, lent, static, pinned and expired handles,
    /// none of which take part in reclamation.
    pub fn mark_handle<T: Pointer>(&mut self, handle: &Handle<T>) -> bool {
        if handle.encoding() != Encoding::Managed || handle.revision().is_pinned() {
            return false;
        }
        let marked = self.pointers.table::<T>().mark(
            handle.address(),
            handle.revision(),
            handle.cached(),
            self.generation,
        );
        if marked {
            self.marked += 1;
        }
        marked
    }

    /// Record a visit to the shared node at `ptr`.
    ///
    /// Returns `true` the first time a given address is seen in this pass.
    pub fn first_visit<T: ?Sized>(&mut self, ptr: *const T) -> bool {
        self.visited.insert(ptr.cast::<()>() as usize)
    }

    /// Generation stamped by this pass.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Handles marked so far.
    pub fn marked(&self) -> usize {
        self.marked
    }

    /// Record that part of the graph could not be walked.
    ///
    /// Handles under the skipped part keep their old stamps, so the sweep
    /// following an incomplete pass reclaims nothing.
    pub fn mark_incomplete(&mut self) {
        self.incomplete = true;
    }

    /// Whether every reachable part of the graph was walked.
    pub fn is_complete(&self) -> bool {
        !self.incomplete
    }
}

/// A value that may (transitively) hold handles.
pub trait Markable {
    /// Mark every handle reachable from `self`.
    fn mark(&self, marker: &mut Marker<'_>);
}

/// Implement [`Markable`] as a leaf for types that hold no handles.
///
/// ```
/// use revslab_pointers::unmarked;
///
/// struct Settings {
///     volume: f32,
/// }
///
/// unmarked!(Settings);
/// ```
#[macro_export]
macro_rules! unmarked {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::Markable for $ty {
                fn mark(&self, _marker: &mut $crate::Marker<'_>) {}
            }
        )+
    };
}

unmarked!(
    (), bool, char, u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64,
    str, String,
);

impl<T: Pointer> Markable for Handle<T> {
    fn mark(&self, marker: &mut Marker<'_>) {
        marker.mark_handle(self);
    }
}

impl<T: Markable + ?Sized> Markable for &T {
    fn mark(&self, marker: &mut Marker<'_>) {
        (**self).mark(marker);
    }
}

impl<T: Markable + ?Sized> Markable for Box<T> {
    fn mark(&self, marker: &mut Marker<'_>) {
        (**self).mark(marker);
    }
}

impl<T: Markable + ?Sized> Markable for Rc<T> {
    fn mark(&self, marker: &mut Marker<'_>) {
        if marker.first_visit(Rc::as_ptr(self)) {
            (**self).mark(marker);
        }
    }
}

impl<T: Markable + ?Sized> Markable for Arc<T> {
    fn mark(&self, marker: &mut Marker<'_>) {
        if marker.first_visit(Arc::as_ptr(self)) {
            (**self).mark(marker);
        }
    }
}

// Weak edges do not keep anything alive.
impl<T: ?Sized> Markable for std::rc::Weak<T> {
    fn mark(&self, _marker: &mut Marker<'_>) {}
}

impl<T: ?Sized> Markable for std::sync::Weak<T> {
    fn mark(&self, _marker: &mut Marker<'_>) {}
}

impl<T: Markable + Copy> Markable for Cell<T> {
    fn mark(&self, marker: &mut Marker<'_>) {
        self.get().mark(marker);
    }
}

impl<T: Markable + ?Sized> Markable for RefCell<T> {
    fn mark(&self, marker: &mut Marker<'_>) {
        match self.try_borrow() {
            Ok(inner) => inner.mark(marker),
            Err(_) => marker.mark_incomplete(),
        }
    }
}

impl<T: Markable + ?Sized> Markable for Mutex<T> {
    fn mark(&self, marker: &mut Marker<'_>) {
        let guard = self.lock().unwrap_or_else(PoisonError::into_inner);
        guard.mark(marker);
    }
}

impl<T: Markable + ?Sized> Markable for RwLock<T> {
    fn mark(&self, marker: &mut Marker<'_>) {
        let guard = self.read().unwrap_or_else(PoisonError::into_inner);
        guard.mark(marker);
    }
}

impl<T: Markable> Markable for Option<T> {
    fn mark(&self, marker: &mut Marker<'_>) {
        if let Some(inner) = self {
            inner.mark(marker);
        }
    }
}

impl<T: Markable, E: Markable> Markable for Result<T, E> {
    fn mark(&self, marker: &mut Marker<'_>) {
        match self {
            Ok(value) => value.mark(marker),
            Err(err) => err.mark(marker),
        }
    }
}

impl<T: Markable> Markable for [T] {
    fn mark(&self, marker: &mut Marker<'_>) {
        for item in self {
            item.mark(marker);
        }
    }
}

impl<T: Markable, const N: usize> Markable for [T; N] {
    fn mark(&self, marker: &mut Marker<'_>) {
        self.as_slice().mark(marker);
    }
}

macro_rules! impl_sequence {
    ($($seq:ident),+) => {
        $(
            impl<T: Markable> Markable for $seq<T> {
                fn mark(&self, marker: &mut Marker<'_>) {
                    for item in self {
                        item.mark(marker);
                    }
                }
            }
        )+
    };
}

impl_sequence!(Vec, VecDeque, LinkedList, BTreeSet);

impl<T: Markable, H> Markable for HashSet<T, H> {
    fn mark(&self, marker: &mut Marker<'_>) {
        for item in self {
            item.mark(marker);
        }
    }
}

impl<T: Markable, H> Markable for IndexSet<T, H> {
    fn mark(&self, marker: &mut Marker<'_>) {
        for item in self {
            item.mark(marker);
        }
    }
}

/// Values first, then keys.
fn mark_entries<'m, K, V, I>(entries: I, marker: &mut Marker<'_>)
where
    K: Markable + 'm,
    V: Markable + 'm,
    I: Iterator<Item = (&'m K, &'m V)> + Clone,
{
    for (_, value) in entries.clone() {
        value.mark(marker);
    }
    for (key, _) in entries {
        key.mark(marker);
    }
}

impl<K: Markable, V: Markable, H> Markable for HashMap<K, V, H> {
    fn mark(&self, marker: &mut Marker<'_>) {
        mark_entries(self.iter(), marker);
    }
}

impl<K: Markable, V: Markable> Markable for BTreeMap<K, V> {
    fn mark(&self, marker: &mut Marker<'_>) {
        mark_entries(self.iter(), marker);
    }
}

impl<K: Markable, V: Markable, H> Markable for IndexMap<K, V, H> {
    fn mark(&self, marker: &mut Marker<'_>) {
        mark_entries(self.iter(), marker);
    }
}

macro_rules! impl_tuple {
    ($($name:ident),+) => {
        impl<$($name: Markable),+> Markable for ($($name,)+) {
            #[allow(non_snake_case)]
            fn mark(&self, marker: &mut Marker<'_>) {
                let ($($name,)+) = self;
                $($name.mark(marker);)+
            }
        }
    };
}

impl_tuple!(A);
impl_tuple!(A, B);
impl_tuple!(A, B, C);
impl_tuple!(A, B, C, D);
impl_tuple!(A, B, C, D, E);
impl_tuple!(A, B, C, D, E, F);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PointersConfig;
    use revslab_core::sentinel::AGE_QUEUED;

    struct Leaf;

    impl Pointer for Leaf {
        type Shape = [u64; 1];
        const NAME: &'static str = "Leaf";
        fn free(_: [u64; 1]) {}
    }

    fn age_of(p: &Pointers, h: Handle<Leaf>) -> u64 {
        let index = h.address().index().unwrap();
        p.table::<Leaf>().get(index).unwrap().age()
    }

    fn walk<R: Markable + ?Sized>(p: &Pointers, root: &R) -> usize {
        let mut marker = Marker::new(p, p.advance_cycle());
        root.mark(&mut marker);
        marker.marked()
    }

    #[test]
    fn marking_stamps_current_generation() {
        let p = Pointers::new(PointersConfig::default()).unwrap();
        let h = p.alloc::<Leaf>([1]);
        assert_eq!(walk(&p, &h), 1);
        assert_eq!(age_of(&p, h), p.cycle().0);
    }

    #[test]
    fn containers_are_walked() {
        let p = Pointers::default();
        let a = p.alloc::<Leaf>([1]);
        let b = p.alloc::<Leaf>([2]);
        let c = p.alloc::<Leaf>([3]);
        let d = p.alloc::<Leaf>([4]);
        let mut map = HashMap::new();
        map.insert(a, vec![Some(b), None]);
        let root = (map, Box::new([c]), Mutex::new(VecDeque::from([d])), 7u32);
        assert_eq!(walk(&p, &root), 4);
    }

    #[test]
    fn map_values_are_marked_before_keys() {
        let p = Pointers::default();
        let key = p.alloc::<Leaf>([1]);
        let value = p.alloc::<Leaf>([2]);
        let map = IndexMap::from([(key, value)]);
        // Both reachable; the order only shows in which one is stamped first.
        assert_eq!(walk(&p, &map), 2);
        assert_eq!(age_of(&p, key), age_of(&p, value));
    }

    #[test]
    fn shared_nodes_are_visited_once() {
        let p = Pointers::default();
        let node = Rc::new(vec![p.alloc::<Leaf>([1]), p.alloc::<Leaf>([2])]);
        let root = vec![node.clone(), node.clone(), node];
        assert_eq!(walk(&p, &root), 2);
    }

    #[test]
    fn cycles_terminate() {
        struct Link {
            handle: Handle<Leaf>,
            next: RefCell<Option<Rc<Link>>>,
        }

        impl Markable for Link {
            fn mark(&self, marker: &mut Marker<'_>) {
                self.handle.mark(marker);
                self.next.mark(marker);
            }
        }

        let p = Pointers::default();
        let first = Rc::new(Link {
            handle: p.alloc::<Leaf>([1]),
            next: RefCell::new(None),
        });
        let second = Rc::new(Link {
            handle: p.alloc::<Leaf>([2]),
            next: RefCell::new(Some(first.clone())),
        });
        *first.next.borrow_mut() = Some(second.clone());
        assert_eq!(walk(&p, &first), 2);
        first.next.borrow_mut().take();
    }

    #[test]
    fn borrowed_refcell_makes_the_walk_incomplete() {
        let p = Pointers::default();
        let h = p.alloc::<Leaf>([1]);
        let root = RefCell::new(vec![h]);

        let mut marker = Marker::new(&p, p.advance_cycle());
        let guard = root.borrow_mut();
        root.mark(&mut marker);
        drop(guard);
        assert!(!marker.is_complete());
        assert_eq!(marker.marked(), 0);

        let mut marker = Marker::new(&p, p.advance_cycle());
        root.mark(&mut marker);
        assert!(marker.is_complete());
        assert_eq!(marker.marked(), 1);
    }

    #[test]
    fn non_managed_and_expired_handles_are_skipped() {
        let p = Pointers::default();
        let gone = p.alloc::<Leaf>([1]);
        p.end(gone);
        let root = (
            p.raw::<Leaf>([2]),
            p.lend::<Leaf>([3]),
            p.add::<Leaf>([4]),
            gone,
        );
        assert_eq!(walk(&p, &root), 0);
        assert_eq!(age_of(&p, gone), AGE_QUEUED);
    }

    #[test]
    fn pinned_handles_are_not_counted() {
        let p = Pointers::default();
        let pinned = p.pin(p.alloc::<Leaf>([1]));
        assert_eq!(walk(&p, &pinned), 0);
    }

    #[test]
    fn unmarked_types_are_leaves() {
        struct Plain;
        unmarked!(Plain);

        let p = Pointers::default();
        assert_eq!(walk(&p, &(Plain, "text".to_string(), 1.5f64)), 0);
    }
}
