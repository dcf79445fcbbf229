//! Raw blocks of uninitialised slots, obtained from an [`Allocator`].
//!
//! Blocks are never reallocated, so a slot keeps its address until the block
//! is returned with [`deallocate_block`].

use crate::error::GrowError;
use allocator_api2::alloc::Allocator;
use std::{
    alloc::{handle_alloc_error, Layout},
    mem::MaybeUninit,
    ptr::NonNull,
};

pub(crate) type Block<T> = NonNull<MaybeUninit<T>>;

fn block_layout<T>(slots: usize) -> Result<Layout, GrowError> {
    Layout::array::<T>(slots).map_err(|_| GrowError::LayoutOverflow { slots })
}

/// Allocate a block of `slots` uninitialised slots.
pub(crate) fn allocate_block<T, A: Allocator>(alloc: &A, slots: usize) -> Result<Block<T>, GrowError> {
    let layout = block_layout::<T>(slots)?;
    alloc
        .allocate(layout)
        .map(NonNull::cast)
        .map_err(|_| GrowError::AllocFailed { layout })
}

/// Return a block to the allocator. No destructors are run on its slots.
///
/// # Safety
/// `block` must have come from [`allocate_block`] with the same allocator and
/// `slots`, and must not be used afterwards.
pub(crate) unsafe fn deallocate_block<T, A: Allocator>(alloc: &A, block: Block<T>, slots: usize) {
    // JUSTIFY: The layout was already computed successfully when the block was allocated.
    let layout = unsafe { Layout::array::<T>(slots).unwrap_unchecked() };
    unsafe { alloc.deallocate(block.cast(), layout) }
}

/// The infallible face of `try_grow`.
/// - Allocation failure is fatal, reported through [`handle_alloc_error`].
/// - Running out of addressable blocks panics, as [`Vec`] does on capacity overflow.
#[track_caller]
pub(crate) fn expect_growth(res: Result<(), GrowError>) {
    match res {
        Ok(()) => (),
        Err(GrowError::AllocFailed { layout }) => handle_alloc_error(layout),
        Err(err) => panic!("{err}"),
    }
}
