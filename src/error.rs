//! Error types for the memory core.
//!
//! Only caller bugs and contract violations surface as errors. Allocation
//! shortfalls are a normal branch every caller must handle, so they are
//! reported through failed `AllocationResult`s and `PagingAllocation`s
//! instead.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// Physical address outside `[0, size)`.
    #[error("physical address {address} out of bounds (memory size {size})")]
    AddressOutOfBounds { address: usize, size: usize },

    /// Virtual address outside `[0, address_space_size)`.
    #[error("virtual address {address} out of range (address space size {space})")]
    AddressOutOfRange { address: usize, space: usize },

    #[error("frame number {frame} out of bounds ({num_frames} frames)")]
    FrameOutOfBounds { frame: usize, num_frames: usize },

    #[error("page number {page} out of bounds ({num_pages} pages)")]
    PageOutOfBounds { page: usize, num_pages: usize },

    /// Bulk frame write whose data length differs from the frame size.
    #[error("data size {actual} does not match frame size {expected}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("page {page} is not present in physical memory")]
    PageNotPresent { page: usize },

    #[error("page {page} is not allocated")]
    PageNotAllocated { page: usize },

    #[error("cannot write to read-only page {page}")]
    ReadOnlyViolation { page: usize },

    /// Double deallocation of a frame.
    #[error("frame {frame} is already free")]
    AlreadyFree { frame: usize },

    /// Claiming a specific frame that some page already occupies.
    #[error("frame {frame} is already in use")]
    FrameInUse { frame: usize },

    /// Installing a mapping over an entry that is already present.
    #[error("page {page} is already mapped")]
    PageAlreadyMapped { page: usize },

    #[error("invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MemoryError>;
