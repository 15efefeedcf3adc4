pub const DEFAULT_RAM_SIZE: usize = 1024 * 1024;
pub const DEFAULT_FRAME_SIZE: usize = 4096;

pub const DEFAULT_ADDRESS_SPACE_SIZE: usize = 16 * 1024 * 1024;
pub const DEFAULT_PAGE_SIZE: usize = DEFAULT_FRAME_SIZE;

/// Canonical block sizes (in pages) indexed by the Quick Fit allocator.
pub const QUICK_FIT_SIZES: [usize; 5] = [1, 2, 4, 8, 16];
