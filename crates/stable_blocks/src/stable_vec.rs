//! ## Geometric Stable Vector
//! Allocates in stable blocks, doubling the size of each consecutive block.
//!  - The first block holds a single slot (index `0`).
//!  - Directory block `b` holds `2^b` slots, the indices `2^b..2^(b+1)`.
//!  - Hence the block of index `i > 0` is just its most significant bit.
//!
//! ```text
//! index:      0 | 1 | 2 3 | 4 5 6 7 | 8 ..  15 | ...
//! block:  first | 0 |  1  |    2    |    3     | ...
//! ```

use crate::{
    bits::{ceil_log2, most_significant_active_bit},
    error::{GrowError, IndexError},
    raw::{allocate_block, deallocate_block, expect_growth, Block},
};
use allocator_api2::alloc::{Allocator, Global};
use assume::assume;
use std::{
    fmt,
    marker::PhantomData,
    mem::MaybeUninit,
    ops::{Index, IndexMut},
    ptr::{self, NonNull},
};

/// Sizes above `2^63` (on 64 bit targets) cannot be counted in a `usize`.
const DIRECTORY_SLOTS: usize = usize::BITS as usize - 1;

/// A growth-only vector of uninitialised slots whose addresses never change.
///
/// The vector owns the *memory* of its slots, never the values in them:
/// - Slots are [`MaybeUninit<T>`], values are placed with [`MaybeUninit::write`].
/// - Dropping the vector deallocates every block without dropping any values,
///   callers must drop live values themselves beforehand (or leak them).
///
/// `MAX_CAPACITY` bounds growth: the vector can grow to [`StableVec::max_size`]
/// (the next power of two at or above `MAX_CAPACITY`), using the first
/// [`StableVec::DIRECTORY_LEN`] directory entries. The directory array itself
/// always has `usize::BITS - 1` entries, as its length cannot be computed from
/// `MAX_CAPACITY` on stable Rust.
///
/// ```
/// use stable_blocks::StableVec;
///
/// let mut sv = StableVec::<usize, 1024>::new();
/// for _ in 0..4 {
///     sv.grow();
/// }
/// assert_eq!(sv.size(), 4);
///
/// for i in 0..sv.size() {
///     sv[i].write(i);
/// }
/// let first: *const usize = sv[0].as_ptr();
///
/// sv.grow();
/// assert_eq!(sv.size(), 8);
/// assert_eq!(sv[0].as_ptr(), first);
/// for i in 0..4 {
///     assert_eq!(unsafe { sv[i].assume_init_read() }, i);
/// }
/// ```
///
/// The vector cannot be duplicated:
/// ```compile_fail
/// use stable_blocks::StableVec;
/// let sv = StableVec::<u32, 64>::new();
/// let copy = sv.clone();
/// ```
pub struct StableVec<T, const MAX_CAPACITY: usize, A: Allocator = Global> {
    first: Block<T>,
    blocks: [Block<T>; DIRECTORY_SLOTS],
    size: usize,
    alloc: A,
    _phantom: PhantomData<T>,
}

// JUSTIFY: The vector uniquely owns its blocks, exactly as a `Vec<T, A>` does.
//           - Shared access only hands out shared references to slots.
//           - Growth requires `&mut self`.
unsafe impl<T: Send, const MAX_CAPACITY: usize, A: Allocator + Send> Send
    for StableVec<T, MAX_CAPACITY, A>
{
}
unsafe impl<T: Sync, const MAX_CAPACITY: usize, A: Allocator + Sync> Sync
    for StableVec<T, MAX_CAPACITY, A>
{
}

impl<T, const MAX_CAPACITY: usize> StableVec<T, MAX_CAPACITY, Global> {
    /// An empty vector, no memory is allocated until [`StableVec::grow`].
    pub const fn new() -> Self {
        Self::new_in(Global)
    }
}

impl<T, const MAX_CAPACITY: usize> Default for StableVec<T, MAX_CAPACITY, Global> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const MAX_CAPACITY: usize, A: Allocator> StableVec<T, MAX_CAPACITY, A> {
    /// Number of directory blocks usable, enough for at least `MAX_CAPACITY` slots.
    pub const DIRECTORY_LEN: usize = {
        let len = ceil_log2(MAX_CAPACITY);
        if len > DIRECTORY_SLOTS {
            DIRECTORY_SLOTS
        } else {
            len
        }
    };

    pub const fn new_in(alloc: A) -> Self {
        const { assert!(MAX_CAPACITY > 0, "a stable vector must be able to hold a slot") };
        Self {
            first: NonNull::dangling(),
            blocks: [NonNull::dangling(); DIRECTORY_SLOTS],
            size: 0,
            alloc,
            _phantom: PhantomData,
        }
    }

    /// The number of addressable slots (not the number of values placed in them).
    #[inline(always)]
    pub fn size(&self) -> usize {
        self.size
    }

    /// True until the first [`StableVec::grow`].
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// The largest size reachable by growing.
    pub const fn max_size() -> usize {
        1 << Self::DIRECTORY_LEN
    }

    /// The number of blocks allocated, including the first single slot block.
    pub fn block_count(&self) -> usize {
        if self.size == 0 {
            0
        } else {
            most_significant_active_bit(self.size) + 1
        }
    }

    /// The allocator every block is taken from and returned to.
    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    /// Allocate one more block, doubling the size (or taking it from `0` to `1`).
    /// - On error the vector is unchanged.
    pub fn try_grow(&mut self) -> Result<(), GrowError> {
        if self.size == 0 {
            self.first = allocate_block(&self.alloc, 1)?;
            self.size = 1;
        } else {
            let block = most_significant_active_bit(self.size);
            if block >= Self::DIRECTORY_LEN {
                return Err(GrowError::CapacityExceeded {
                    limit: Self::max_size(),
                });
            }
            self.blocks[block] = allocate_block(&self.alloc, self.size)?;
            self.size *= 2;
        }
        Ok(())
    }

    /// Allocate one more block, doubling the size (or taking it from `0` to `1`).
    ///
    /// # Panics
    /// If the vector is already at [`StableVec::max_size`]. Allocation failure
    /// aborts through [`std::alloc::handle_alloc_error`].
    #[track_caller]
    pub fn grow(&mut self) {
        expect_growth(self.try_grow())
    }

    /// Grow until at least `min_size` slots are addressable, returning the
    /// number of blocks added.
    #[track_caller]
    pub fn grow_to(&mut self, min_size: usize) -> usize {
        let mut added = 0;
        while self.size < min_size {
            self.grow();
            added += 1;
        }
        added
    }

    /// # Safety
    /// `index < self.size()`
    #[inline(always)]
    unsafe fn slot_ptr_unchecked(&self, index: usize) -> *mut MaybeUninit<T> {
        debug_assert!(index < self.size, "index {index} out of bounds for size {}", self.size);
        if index == 0 {
            return self.first.as_ptr();
        }
        let block = most_significant_active_bit(index);
        assume!(unsafe: block < DIRECTORY_SLOTS, "block beyond the directory");
        let mask = (1 << block) - 1;
        unsafe { self.blocks.get_unchecked(block).as_ptr().add(index & mask) }
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
        if index < self.size {
            Ok(())
        } else {
            Err(IndexError {
                index,
                size: self.size,
            })
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

    /// The address of a slot, valid until the vector is dropped.
    /// - Suitable for structures that keep raw addresses across growth.
    pub fn slot_ptr(&self, index: usize) -> Result<NonNull<T>, IndexError> {
        self.check(index)?;
        // JUSTIFY: Pointers into allocated blocks are never null.
        Ok(unsafe { NonNull::new_unchecked(self.slot_ptr_unchecked(index).cast()) })
    }

    /// Swap the contents of two slots, initialised or not.
    ///
    /// # Panics
    /// If either index is out of bounds.
    #[track_caller]
    pub fn swap(&mut self, a: usize, b: usize) {
        if let Err(err) = self.check(a).and(self.check(b)) {
            panic!("{err}");
        }
        // JUSTIFY: `ptr::swap` allows `a == b`, and moves bytes without reading them as `T`.
        unsafe { ptr::swap(self.slot_ptr_unchecked(a), self.slot_ptr_unchecked(b)) }
    }
}

impl<T, const MAX_CAPACITY: usize, A: Allocator> Index<usize> for StableVec<T, MAX_CAPACITY, A> {
    type Output = MaybeUninit<T>;

    #[track_caller]
    fn index(&self, index: usize) -> &Self::Output {
        match self.get(index) {
            Ok(slot) => slot,
            Err(err) => panic!("{err}"),
        }
    }
}

impl<T, const MAX_CAPACITY: usize, A: Allocator> IndexMut<usize> for StableVec<T, MAX_CAPACITY, A> {
    #[track_caller]
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        match self.get_mut(index) {
            Ok(slot) => slot,
            Err(err) => panic!("{err}"),
        }
    }
}

impl<T, const MAX_CAPACITY: usize, A: Allocator> fmt::Debug for StableVec<T, MAX_CAPACITY, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StableVec")
            .field("size", &self.size)
            .field("blocks", &self.block_count())
            .finish_non_exhaustive()
    }
}

impl<T, const MAX_CAPACITY: usize, A: Allocator> Drop for StableVec<T, MAX_CAPACITY, A> {
    fn drop(&mut self) {
        if self.size == 0 {
            return;
        }
        // JUSTIFY: Each block is deallocated once, with the size it was allocated with.
        //           - The first block always has 1 slot.
        //           - Directory block `b` was allocated when the size was `2^b`.
        unsafe {
            deallocate_block(&self.alloc, self.first, 1);
            let used = most_significant_active_bit(self.size);
            for (block, ptr) in self.blocks[..used].iter().enumerate() {
                deallocate_block(&self.alloc, *ptr, 1 << block);
            }
        }
    }
}


#[cfg(kani)]
mod kani_verif {
    use super::*;

    #[kani::proof]
    #[kani::unwind(10)]
    fn check_index_within_block() {
        let index: usize = kani::any();
        kani::assume(index > 0);
        let block = most_significant_active_bit(index);
        let offset = index & ((1 << block) - 1);
        assert!(offset < 1 << block);
        assert_eq!((1 << block) + offset, index);
    }

    #[kani::proof]
    #[kani::unwind(10)]
    fn check_round_trip() {
        let mut sv = StableVec::<u8, 16>::new();
        sv.grow_to(8);
        let index: usize = kani::any();
        kani::assume(index < 8);
        let value: u8 = kani::any();
        sv[index].write(value);
        assert_eq!(unsafe { sv[index].assume_init_read() }, value);
    }
}
