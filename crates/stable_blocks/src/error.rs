//! Errors returned by the checked operations of the containers.

use std::{alloc::Layout, error::Error, fmt};

/// Failure to add a block to a container.
/// - The container is unchanged when this is returned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GrowError {
    /// No more blocks can be addressed.
    CapacityExceeded {
        /// The largest size the container can reach.
        limit: usize,
    },
    /// A block of this many slots is too large to describe with a [`Layout`].
    LayoutOverflow {
        /// Number of slots in the requested block.
        slots: usize,
    },
    /// The allocator could not provide memory for the block.
    AllocFailed {
        /// The layout that was requested.
        layout: Layout,
    },
}

impl fmt::Display for GrowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapacityExceeded { limit } => {
                write!(f, "capacity exceeded: cannot grow beyond {limit} slots")
            }
            Self::LayoutOverflow { slots } => {
                write!(f, "a block of {slots} slots exceeds the maximum allocation size")
            }
            Self::AllocFailed { layout } => write!(
                f,
                "allocation of {} bytes (align {}) failed",
                layout.size(),
                layout.align()
            ),
        }
    }
}

impl Error for GrowError {}

/// An index at or beyond the current size of a container.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexError {
    /// The index that was requested.
    pub index: usize,
    /// The size of the container at the time of the request.
    pub size: usize,
}

impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "index out of bounds: the size is {} but the index is {}",
            self.size, self.index
        )
    }
}

impl Error for IndexError {}
