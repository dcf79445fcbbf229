//! ## Fixed Block Index Map
//! Allocating slots in blocks.
//!  - No reallocation on extension.
//!  - Each block is the same size, a power of two number of slots chosen to
//!    fit a byte budget.
//!
//! Intended as the storage under a slot map: free lists, occupancy and
//! generations are kept by the caller, indexed by the stable indices here.

use crate::{
    bits::most_significant_active_bit_const,
    error::{GrowError, IndexError},
    raw::{allocate_block, deallocate_block, expect_growth, Block},
};
use allocator_api2::alloc::{Allocator, Global};
use smallvec::{CollectionAllocErr, SmallVec};
use std::{
    fmt,
    marker::PhantomData,
    mem::{size_of, MaybeUninit},
    ops::{Index, IndexMut},
    ptr::NonNull,
};

/// Default byte budget of a block, a common page size.
pub const DEFAULT_BLOCK_BYTES: usize = 4096;

/// `k` for the largest `2^k` elements of `elem_bytes` fitting in `budget` bytes.
/// - Elements larger than the budget get a block of one slot (`k = 0`).
/// - Zero sized elements are counted as one byte.
const fn block_shift(elem_bytes: usize, budget: usize) -> u32 {
    let elem_bytes = if elem_bytes == 0 { 1 } else { elem_bytes };
    let fits = budget / elem_bytes;
    if fits == 0 {
        0
    } else {
        most_significant_active_bit_const(fits) as u32
    }
}

/// A growth-only map from dense indices to uninitialised slots, stored in
/// equally sized blocks whose addresses never change.
///
/// As with [`crate::StableVec`] only memory is owned, values placed in slots
/// are never dropped by the map.
///
/// ```
/// use stable_blocks::BlockIndexMap;
///
/// // 4 slots of `u32` per 16 byte block
/// let mut map = BlockIndexMap::<u32, 16>::new();
/// assert_eq!(<BlockIndexMap<u32, 16>>::BLOCK_LEN, 4);
///
/// map.grow();
/// map.grow();
/// assert_eq!(map.size(), 8);
/// assert_eq!(<BlockIndexMap<u32, 16>>::locate(5), (1, 1));
///
/// for i in 0..map.size() {
///     map[i].write(i as u32);
/// }
/// let read: Vec<u32> = (0..8).map(|i| unsafe { map[i].assume_init_read() }).collect();
/// assert_eq!(read, (0..8).collect::<Vec<u32>>());
/// ```
///
/// The map cannot be duplicated:
/// ```compile_fail
/// use stable_blocks::BlockIndexMap;
/// let map: BlockIndexMap<u32> = BlockIndexMap::new();
/// let copy = map.clone();
/// ```
pub struct BlockIndexMap<T, const BLOCK_BYTES: usize = DEFAULT_BLOCK_BYTES, A: Allocator = Global> {
    blocks: SmallVec<[Block<T>; 4]>,
    alloc: A,
    _phantom: PhantomData<T>,
}

// JUSTIFY: The map uniquely owns its blocks, see the same impls on `StableVec`.
unsafe impl<T: Send, const BLOCK_BYTES: usize, A: Allocator + Send> Send
    for BlockIndexMap<T, BLOCK_BYTES, A>
{
}
unsafe impl<T: Sync, const BLOCK_BYTES: usize, A: Allocator + Sync> Sync
    for BlockIndexMap<T, BLOCK_BYTES, A>
{
}

impl<T, const BLOCK_BYTES: usize> BlockIndexMap<T, BLOCK_BYTES, Global> {
    pub fn new() -> Self {
        Self::new_in(Global)
    }
}

impl<T, const BLOCK_BYTES: usize> Default for BlockIndexMap<T, BLOCK_BYTES, Global> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const BLOCK_BYTES: usize, A: Allocator> BlockIndexMap<T, BLOCK_BYTES, A> {
    /// `log2` of the number of slots per block.
    pub const BLOCK_SHIFT: u32 = block_shift(size_of::<T>(), BLOCK_BYTES);

    /// The number of slots per block.
    pub const BLOCK_LEN: usize = 1 << Self::BLOCK_SHIFT;

    const MASK: usize = Self::BLOCK_LEN - 1;

    /// The largest size reachable by growing.
    pub const MAX_SIZE: usize = usize::MAX & !Self::MASK;

    pub fn new_in(alloc: A) -> Self {
        Self {
            blocks: SmallVec::new(),
            alloc,
            _phantom: PhantomData,
        }
    }

    /// The number of addressable slots (not the number of values placed in them).
    #[inline(always)]
    pub fn size(&self) -> usize {
        self.blocks.len() << Self::BLOCK_SHIFT
    }

    /// True until the first block is allocated.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// The allocator every block is taken from and returned to.
    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    /// The block, and offset within it, of a slot.
    #[inline(always)]
    pub const fn locate(index: usize) -> (usize, usize) {
        (index >> Self::BLOCK_SHIFT, index & Self::MASK)
    }

    /// Allocate one more block of [`Self::BLOCK_LEN`] slots.
    /// - On error the map is unchanged.
    pub fn try_grow(&mut self) -> Result<(), GrowError> {
        if self.size() == Self::MAX_SIZE {
            return Err(GrowError::CapacityExceeded {
                limit: Self::MAX_SIZE,
            });
        }
        // Reserve the list entry first, so the push below cannot fail after
        // the block is allocated.
        self.blocks.try_reserve(1).map_err(|err| match err {
            CollectionAllocErr::CapacityOverflow => GrowError::CapacityExceeded {
                limit: Self::MAX_SIZE,
            },
            CollectionAllocErr::AllocErr { layout } => GrowError::AllocFailed { layout },
        })?;
        let block = allocate_block(&self.alloc, Self::BLOCK_LEN)?;
        self.blocks.push(block);
        Ok(())
    }

    /// Allocate one more block of [`Self::BLOCK_LEN`] slots.
    ///
    /// # Panics
    /// If the size would exceed [`Self::MAX_SIZE`]. Allocation failure aborts
    /// through [`std::alloc::handle_alloc_error`].
    #[track_caller]
    pub fn grow(&mut self) {
        expect_growth(self.try_grow())
    }

    /// Grow until at least `min_size` slots are addressable, returning the
    /// number of blocks added.
    #[track_caller]
    pub fn grow_to(&mut self, min_size: usize) -> usize {
        let mut added = 0;
        while self.size() < min_size {
            self.grow();
            added += 1;
        }
        added
    }

    /// # Safety
    /// `index < self.size()`
    #[inline(always)]
    unsafe fn slot_ptr_unchecked(&self, index: usize) -> *mut MaybeUninit<T> {
        debug_assert!(index < self.size(), "index {index} out of bounds for size {}", self.size());
        let (block, offset) = Self::locate(index);
        unsafe { self.blocks.get_unchecked(block).as_ptr().add(offset) }
    }

    /// # Safety
    /// `index < self.size()`, otherwise the behaviour is undefined.
    #[inline(always)]
    pub unsafe fn get_unchecked(&self, index: usize) -> &MaybeUninit<T> {
        unsafe { &*self.slot_ptr_unchecked(index) }
    }

    /// # Safety
    /// `index < self.size()`, otherwise the behaviour is undefined.
    #[inline(always)]
    pub unsafe fn get_unchecked_mut(&mut self, index: usize) -> &mut MaybeUninit<T> {
        unsafe { &mut *self.slot_ptr_unchecked(index) }
    }

    #[inline]
    fn check(&self, index: usize) -> Result<(), IndexError> {
        let size = self.size();
        if index < size {
            Ok(())
        } else {
            Err(IndexError { index, size })
        }
    }

    pub fn get(&self, index: usize) -> Result<&MaybeUninit<T>, IndexError> {
        self.check(index)?;
        Ok(unsafe { self.get_unchecked(index) })
    }

    pub fn get_mut(&mut self, index: usize) -> Result<&mut MaybeUninit<T>, IndexError> {
        self.check(index)?;
        Ok(unsafe { self.get_unchecked_mut(index) })
    }

    /// The address of a slot, valid until the map is dropped.
    pub fn slot_ptr(&self, index: usize) -> Result<NonNull<T>, IndexError> {
        self.check(index)?;
        // JUSTIFY: Pointers into allocated blocks are never null.
        Ok(unsafe { NonNull::new_unchecked(self.slot_ptr_unchecked(index).cast()) })
    }
}

impl<T, const BLOCK_BYTES: usize, A: Allocator> Index<usize> for BlockIndexMap<T, BLOCK_BYTES, A> {
    type Output = MaybeUninit<T>;

    #[track_caller]
    fn index(&self, index: usize) -> &Self::Output {
        match self.get(index) {
            Ok(slot) => slot,
            Err(err) => panic!("{err}"),
        }
    }
}

impl<T, const BLOCK_BYTES: usize, A: Allocator> IndexMut<usize> for BlockIndexMap<T, BLOCK_BYTES, A> {
    #[track_caller]
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        match self.get_mut(index) {
            Ok(slot) => slot,
            Err(err) => panic!("{err}"),
        }
    }
}

impl<T, const BLOCK_BYTES: usize, A: Allocator> fmt::Debug for BlockIndexMap<T, BLOCK_BYTES, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockIndexMap")
            .field("size", &self.size())
            .field("block_len", &Self::BLOCK_LEN)
            .field("blocks", &self.blocks.len())
            .finish_non_exhaustive()
    }
}

impl<T, const BLOCK_BYTES: usize, A: Allocator> Drop for BlockIndexMap<T, BLOCK_BYTES, A> {
    fn drop(&mut self) {
        for block in self.blocks.drain(..) {
            // JUSTIFY: Every block was allocated with `BLOCK_LEN` slots, and is drained exactly once.
            unsafe { deallocate_block(&self.alloc, block, Self::BLOCK_LEN) }
        }
    }
}


#[cfg(kani)]
mod kani_verif {
    use super::*;

    #[kani::proof]
    fn check_locate() {
        type Map = BlockIndexMap<u32, 64>;
        let index: usize = kani::any();
        let (block, offset) = Map::locate(index);
        assert!(offset < Map::BLOCK_LEN);
        assert_eq!(block * Map::BLOCK_LEN + offset, index);
    }
}
