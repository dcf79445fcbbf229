//! Block ownership checked through a recording allocator.
//! - Every block is returned exactly once, with the layout it was allocated with.
//! - A refused allocation leaves the container unchanged.

use stable_blocks::{AllocError, Allocator, BlockIndexMap, Global, GrowError, StableVec};
use std::{
    alloc::Layout,
    cell::{Cell, RefCell},
    collections::HashMap,
    ptr::NonNull,
};

#[derive(Default)]
struct Recorder {
    live: RefCell<HashMap<usize, Layout>>,
    allocations: Cell<usize>,
    deallocations: Cell<usize>,
    /// Allocations allowed before refusing, unlimited if `None`.
    budget: Cell<Option<usize>>,
}

impl Recorder {
    fn limited(budget: usize) -> Self {
        let recorder = Self::default();
        recorder.budget.set(Some(budget));
        recorder
    }

    fn live_layouts(&self) -> Vec<Layout> {
        let mut layouts: Vec<Layout> = self.live.borrow().values().copied().collect();
        layouts.sort_by_key(|layout| layout.size());
        layouts
    }
}

unsafe impl Allocator for Recorder {
    fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
        if let Some(remaining) = self.budget.get() {
            if remaining == 0 {
                return Err(AllocError);
            }
            self.budget.set(Some(remaining - 1));
        }
        let ptr = Global.allocate(layout)?;
        self.allocations.set(self.allocations.get() + 1);
        self.live
            .borrow_mut()
            .insert(ptr.cast::<u8>().as_ptr() as usize, layout);
        Ok(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        let recorded = self.live.borrow_mut().remove(&(ptr.as_ptr() as usize));
        assert_eq!(
            recorded,
            Some(layout),
            "block deallocated twice, or with a different layout"
        );
        self.deallocations.set(self.deallocations.get() + 1);
        unsafe { Global.deallocate(ptr, layout) }
    }
}

#[test]
fn empty_containers_never_allocate() {
    let recorder = Recorder::default();
    drop(StableVec::<u64, 1024, _>::new_in(&recorder));
    drop(BlockIndexMap::<u64, 4096, _>::new_in(&recorder));
    assert_eq!(recorder.allocations.get(), 0);
    assert_eq!(recorder.deallocations.get(), 0);
}

#[test]
fn stable_vec_blocks_double() {
    let recorder = Recorder::default();
    let mut sv = StableVec::<u64, 1024, _>::new_in(&recorder);
    for _ in 0..6 {
        sv.grow();
    }
    assert_eq!(sv.size(), 32);

    let expected: Vec<Layout> = [1, 1, 2, 4, 8, 16]
        .into_iter()
        .map(|slots| Layout::array::<u64>(slots).unwrap())
        .collect();
    assert_eq!(sv.allocator().live_layouts(), expected);
    assert!(std::ptr::eq(*sv.allocator(), &recorder));

    drop(sv);
    assert_eq!(recorder.allocations.get(), 6);
    assert_eq!(recorder.deallocations.get(), 6);
    assert!(recorder.live.borrow().is_empty());
}

#[test]
fn block_map_blocks_are_uniform() {
    let recorder = Recorder::default();
    let mut map = BlockIndexMap::<u32, 64, _>::new_in(&recorder);
    map.grow_to(100);
    assert_eq!(map.block_count(), 7);

    let block = Layout::array::<u32>(16).unwrap();
    assert_eq!(map.allocator().live_layouts(), vec![block; 7]);
    assert_eq!(map.allocator().allocations.get(), 7);

    drop(map);
    assert_eq!(recorder.deallocations.get(), 7);
    assert!(recorder.live.borrow().is_empty());
}

#[test]
fn values_are_not_dropped_with_the_container() {
    use std::rc::Rc;

    let shared = Rc::new(());
    let recorder = Recorder::default();
    let mut sv = StableVec::<Rc<()>, 16, _>::new_in(&recorder);
    sv.grow_to(2);
    sv[0].write(Rc::clone(&shared));
    sv[1].write(Rc::clone(&shared));
    let first = unsafe { sv[0].assume_init_read() };
    drop(sv);

    // The value in slot 1 was leaked with the container.
    assert_eq!(Rc::strong_count(&shared), 3);
    drop(first);
    assert_eq!(Rc::strong_count(&shared), 2);
}

#[test]
fn refused_growth_leaves_stable_vec_unchanged() {
    let recorder = Recorder::limited(3);
    let mut sv = StableVec::<u64, 1024, _>::new_in(&recorder);
    for _ in 0..3 {
        sv.try_grow().unwrap();
    }
    assert_eq!(sv.size(), 4);
    sv[3].write(33);

    assert_eq!(
        sv.try_grow(),
        Err(GrowError::AllocFailed {
            layout: Layout::array::<u64>(4).unwrap()
        })
    );
    assert_eq!(sv.size(), 4);
    assert_eq!(sv.block_count(), 3);
    assert_eq!(unsafe { sv[3].assume_init_read() }, 33);

    recorder.budget.set(None);
    sv.grow();
    assert_eq!(sv.size(), 8);
    drop(sv);
    assert!(recorder.live.borrow().is_empty());
}

#[test]
fn refused_growth_leaves_block_map_unchanged() {
    let recorder = Recorder::limited(2);
    let mut map = BlockIndexMap::<u64, 32, _>::new_in(&recorder);
    map.try_grow().unwrap();
    map.try_grow().unwrap();
    assert!(matches!(map.try_grow(), Err(GrowError::AllocFailed { .. })));
    assert_eq!(map.size(), 8);
    assert_eq!(map.block_count(), 2);
    drop(map);
    assert_eq!(recorder.deallocations.get(), 2);
}
