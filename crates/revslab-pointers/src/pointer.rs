//! The [`Pointer`] trait implemented by every named pointer type.

use revslab_table::Shape;

/// A named type of foreign pointer managed by the allocator.
///
/// Implementors are usually zero-sized marker types generated by a binding
/// layer, one per foreign class. The shape fixes the payload width; the
/// `free` hook releases the foreign resource when the allocator itself
/// reclaims a slot (recycling in `alloc`, or the sweep), and when a caller
/// uses [`Pointers::free`](crate::Pointers::free).
pub trait Pointer: 'static {
    /// Payload width: `[u64; 1]`, `[u64; 2]` or `[u64; 3]`.
    type Shape: Shape;

    /// Name used in logs and errors.
    const NAME: &'static str;

    /// Release the foreign resource behind `payload`.
    ///
    /// Runs at most once per allocation. It may run on any thread, with the
    /// slot it came from still locked, so it must not assume anything about
    /// the calling thread and must not touch the handle it belongs to.
    fn free(payload: Self::Shape);
}
