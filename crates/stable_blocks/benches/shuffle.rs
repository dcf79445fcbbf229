//! ## Random access cost of stable blocks
//! Shuffles ~1M `usize` values held in a [`StableVec`], a [`BlockIndexMap`],
//! a [`VecDeque`] and a [`Vec`].
//!
//! Every container is shuffled by the same Fisher-Yates loop over indices, so
//! the difference is the cost of each container's index to address lookup.

use divan::{counter::ItemsCount, Bencher};
use rand::{rngs::StdRng, Rng, SeedableRng};
use stable_blocks::{BlockIndexMap, StableVec};
use std::{cell::RefCell, collections::VecDeque};

/// 21 growths of the stable vector
const ELEMENTS: usize = 1 << 20;
const SEED: u64 = 123;

fn shuffle(len: usize, rng: &mut StdRng, mut swap: impl FnMut(usize, usize)) {
    for i in (1..len).rev() {
        swap(i, rng.random_range(0..=i));
    }
}

/// Shuffle a container kept across iterations, each iteration with a freshly seeded rng.
fn bench_shuffle<C>(bencher: Bencher, container: C, swap: impl Fn(&mut C, usize, usize)) {
    let container = RefCell::new(container);
    bencher
        .counter(ItemsCount::new(ELEMENTS))
        .with_inputs(|| StdRng::seed_from_u64(SEED))
        .bench_local_refs(|rng| {
            let mut container = container.borrow_mut();
            shuffle(ELEMENTS, rng, |a, b| swap(&mut *container, a, b))
        });
}

#[divan::bench(name = "shuffle StableVec")]
fn stable_vec(bencher: Bencher) {
    let mut sv = StableVec::<usize, { u32::MAX as usize }>::new();
    assert_eq!(sv.grow_to(ELEMENTS), 21);
    for i in 0..sv.size() {
        sv[i].write(i);
    }
    bench_shuffle(bencher, sv, |sv, a, b| sv.swap(a, b));
}

#[divan::bench(name = "shuffle BlockIndexMap")]
fn block_map(bencher: Bencher) {
    let mut map: BlockIndexMap<usize> = BlockIndexMap::new();
    map.grow_to(ELEMENTS);
    for i in 0..map.size() {
        map[i].write(i);
    }
    bench_shuffle(bencher, map, |map, a, b| {
        let first = unsafe { map[a].assume_init_read() };
        let second = unsafe { map[b].assume_init_read() };
        map[a].write(second);
        map[b].write(first);
    });
}

#[divan::bench(name = "shuffle VecDeque")]
fn vec_deque(bencher: Bencher) {
    let deque: VecDeque<usize> = (0..ELEMENTS).collect();
    bench_shuffle(bencher, deque, |deque, a, b| deque.swap(a, b));
}

#[divan::bench(name = "shuffle Vec")]
fn vec(bencher: Bencher) {
    let vec: Vec<usize> = (0..ELEMENTS).collect();
    bench_shuffle(bencher, vec, |vec, a, b| vec.swap(a, b));
}

fn main() {
    divan::main();
}
