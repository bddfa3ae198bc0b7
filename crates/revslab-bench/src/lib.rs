//! Workload builders for revslab benchmarks.
//!
//! Workloads are deterministic: each one is driven by a seeded
//! [`ChaCha8Rng`], so two runs with the same seed issue the same sequence
//! of allocator calls.
//!
//! - [`churn`]: mixed alloc / get / end traffic against a live set.
//! - [`populate`]: fill an allocator with live handles across generations.

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use revslab_pointers::{Handle, Pointers};
use revslab_test_utils::Texture;

/// What one [`churn`] run did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChurnStats {
    pub allocs: usize,
    pub gets: usize,
    pub ends: usize,
}

/// Run `steps` random operations against `pointers`.
///
/// Half the steps dereference a random live handle, a quarter allocate
/// and a quarter release one. The live set is capped at `max_live`
/// handles; the caller keeps it between runs.
pub fn churn(
    pointers: &Pointers,
    live: &mut Vec<Handle<Texture>>,
    max_live: usize,
    steps: usize,
    seed: u64,
) -> ChurnStats {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut stats = ChurnStats::default();

    for _ in 0..steps {
        let roll = rng.next_u64();
        match roll % 4 {
            0 if live.len() < max_live => {
                live.push(pointers.alloc::<Texture>([roll]));
                stats.allocs += 1;
            }
            1 if !live.is_empty() => {
                let i = (rng.next_u64() as usize) % live.len();
                pointers.end(live.swap_remove(i));
                stats.ends += 1;
            }
            _ if !live.is_empty() => {
                let i = (rng.next_u64() as usize) % live.len();
                std::hint::black_box(pointers.get(live[i]));
                stats.gets += 1;
            }
            _ => {
                live.push(pointers.alloc::<Texture>([roll]));
                stats.allocs += 1;
            }
        }
    }
    stats
}

/// Allocate `count` handles spread over `generations` generations.
///
/// Returns the handles in allocation order. With `keep_every = n`, every
/// n-th handle is also returned in the second vector, as a root set for
/// marking.
pub fn populate(
    pointers: &Pointers,
    count: usize,
    generations: usize,
    keep_every: usize,
    seed: u64,
) -> (Vec<Handle<Texture>>, Vec<Handle<Texture>>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let per_generation = count.div_ceil(generations.max(1));
    let mut all = Vec::with_capacity(count);
    let mut kept = Vec::new();

    for i in 0..count {
        if i > 0 && i % per_generation == 0 {
            pointers.advance_cycle();
        }
        let h = pointers.alloc::<Texture>([rng.next_u64()]);
        if keep_every > 0 && i % keep_every == 0 {
            kept.push(h);
        }
        all.push(h);
    }
    (all, kept)
}
