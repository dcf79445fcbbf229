//! # Stable Blocks
//! Growth-only, randomly addressable containers of uninitialised slots whose
//! addresses never change once allocated.
//!
//! Growing a [`Vec`] reallocates and moves every element, invalidating any
//! pointer into it. The containers here instead allocate new *blocks* on
//! growth, and never move existing ones. This lets higher level structures
//! (hash table overflow storage, object pools, slot maps) keep raw addresses or
//! indices into the container across growth.
//!
//! ## Containers
//! - [`StableVec`] grows by doubling, each new block is as large as all
//!   previous blocks combined. The block of an index is its most significant
//!   bit (see [`bits`]).
//! - [`BlockIndexMap`] grows by a fixed size block, chosen to fit a byte budget.
//!   Intended as the storage of a slot map (with free lists and generations
//!   layered on top by the user).
//!
//! ## Memory, not values
//! Both containers own the memory of their slots, but never the values placed
//! in them:
//! - Slots are [`MaybeUninit<T>`](std::mem::MaybeUninit), the user places and
//!   reads values.
//! - Dropping a container deallocates its blocks without dropping values, any
//!   live values must be dropped by the user beforehand, or are leaked.
//!
//! ## Growth and access
//! Capacity only increases through explicit `grow` calls, indexing never grows
//! a container.
//! - `grow`/`try_grow` allocate exactly one block.
//! - Indexing (`[]`), `get` and `get_mut` are bounds checked.
//! - `get_unchecked` and `get_unchecked_mut` are the zero overhead path for
//!   callers who track their own bounds.
//!
//! ```
//! use stable_blocks::StableVec;
//!
//! let mut sv = StableVec::<String, 1024>::new();
//! sv.grow_to(3);
//! let name = sv[2].write("stable".to_owned());
//! let addr: *const String = name;
//!
//! sv.grow_to(1000);
//! assert_eq!(sv.slot_ptr(2).unwrap().as_ptr() as *const String, addr);
//! unsafe { sv[2].assume_init_drop() };
//! ```

pub mod bits;
pub mod block_map;
pub mod error;
mod raw;
pub mod stable_vec;

pub use block_map::{BlockIndexMap, DEFAULT_BLOCK_BYTES};
pub use error::{GrowError, IndexError};
pub use stable_vec::StableVec;

/// The allocator interface used for blocks.
pub use allocator_api2::alloc::{AllocError, Allocator, Global};
