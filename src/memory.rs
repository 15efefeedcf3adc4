use serde::Serialize;

use crate::constants::{DEFAULT_FRAME_SIZE, DEFAULT_RAM_SIZE};
use crate::error::{MemoryError, Result};

/// Simulated physical memory: a flat byte array divided into fixed-size
/// frames, plus an occupancy table tracking which frames are allocated.
pub struct PhysicalMemory {
    size: usize,
    frame_size: usize,
    num_frames: usize,
    bytes: Vec<u8>,
    frame_table: Vec<bool>,
}

/// Frame-level usage snapshot, consumable by external reporting layers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MemoryUsage {
    pub total_size: usize,
    pub frame_size: usize,
    pub total_frames: usize,
    pub used_frames: usize,
    pub free_frames: usize,
    pub usage_percentage: f64,
}

impl PhysicalMemory {
    /// Create a new physical memory of `size` bytes, zero-initialized,
    /// divided into frames of `frame_size` bytes.
    pub fn new(size: usize, frame_size: usize) -> Self {
        assert!(frame_size > 0, "frame size must be non-zero");
        let num_frames = size / frame_size;
        PhysicalMemory {
            size,
            frame_size,
            num_frames,
            bytes: vec![0u8; size],
            frame_table: vec![false; num_frames],
        }
    }

    /// 1 MiB of memory in 4 KiB frames.
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_RAM_SIZE, DEFAULT_FRAME_SIZE)
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    #[inline]
    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    /// Read a byte from an absolute physical address.
    #[inline]
    pub fn read_byte(&self, address: usize) -> Result<u8> {
        self.check_address(address)?;
        Ok(self.bytes[address])
    }

    /// Write a byte to an absolute physical address.
    #[inline]
    pub fn write_byte(&mut self, address: usize, value: u8) -> Result<()> {
        self.check_address(address)?;
        self.bytes[address] = value;
        Ok(())
    }

    /// Read the contents of an entire frame (exactly `frame_size` bytes).
    pub fn read_frame(&self, frame: usize) -> Result<&[u8]> {
        self.check_frame(frame)?;
        let start = frame * self.frame_size;
        Ok(&self.bytes[start..start + self.frame_size])
    }

    /// Overwrite an entire frame. `data` must be exactly `frame_size` bytes.
    pub fn write_frame(&mut self, frame: usize, data: &[u8]) -> Result<()> {
        self.check_frame(frame)?;
        if data.len() != self.frame_size {
            return Err(MemoryError::SizeMismatch {
                expected: self.frame_size,
                actual: data.len(),
            });
        }
        let start = frame * self.frame_size;
        self.bytes[start..start + self.frame_size].copy_from_slice(data);
        Ok(())
    }

    /// Mark the first free frame (ascending scan) occupied and return its
    /// index, or `None` when memory is full. Callers needing contiguity
    /// must coordinate through the contiguous allocators instead.
    pub fn allocate_frame(&mut self) -> Option<usize> {
        let frame = self.frame_table.iter().position(|occupied| !occupied)?;
        self.frame_table[frame] = true;
        Some(frame)
    }

    /// Mark a specific frame occupied, on behalf of an allocator that has
    /// already chosen it.
    pub fn claim_frame(&mut self, frame: usize) -> Result<()> {
        self.check_frame(frame)?;
        if self.frame_table[frame] {
            return Err(MemoryError::FrameInUse { frame });
        }
        self.frame_table[frame] = true;
        Ok(())
    }

    /// Release a frame. Its bytes are zeroed so no data survives into the
    /// next allocation.
    pub fn deallocate_frame(&mut self, frame: usize) -> Result<()> {
        self.check_frame(frame)?;
        if !self.frame_table[frame] {
            return Err(MemoryError::AlreadyFree { frame });
        }
        self.frame_table[frame] = false;
        let start = frame * self.frame_size;
        self.bytes[start..start + self.frame_size].fill(0);
        Ok(())
    }

    /// Whether a frame is currently occupied. Frames outside the table
    /// report as occupied, so scans never treat them as allocatable.
    #[inline]
    pub fn frame_is_occupied(&self, frame: usize) -> bool {
        self.frame_table.get(frame).copied().unwrap_or(true)
    }

    pub fn free_frame_count(&self) -> usize {
        self.frame_table.iter().filter(|&&occupied| !occupied).count()
    }

    pub fn usage_statistics(&self) -> MemoryUsage {
        let used = self.frame_table.iter().filter(|&&occupied| occupied).count();
        MemoryUsage {
            total_size: self.size,
            frame_size: self.frame_size,
            total_frames: self.num_frames,
            used_frames: used,
            free_frames: self.num_frames - used,
            usage_percentage: if self.num_frames > 0 {
                used as f64 / self.num_frames as f64 * 100.0
            } else {
                0.0
            },
        }
    }

    /// Current occupancy table, for snapshotting.
    pub fn frame_table(&self) -> &[bool] {
        &self.frame_table
    }

    /// Restore a previously captured occupancy table.
    ///
    /// # Panics
    ///
    /// Panics if `saved` was not captured from this memory (length differs).
    pub fn restore_frame_table(&mut self, saved: &[bool]) {
        self.frame_table.copy_from_slice(saved);
    }

    #[inline]
    fn check_address(&self, address: usize) -> Result<()> {
        if address >= self.size {
            return Err(MemoryError::AddressOutOfBounds {
                address,
                size: self.size,
            });
        }
        Ok(())
    }

    #[inline]
    fn check_frame(&self, frame: usize) -> Result<()> {
        if frame >= self.num_frames {
            return Err(MemoryError::FrameOutOfBounds {
                frame,
                num_frames: self.num_frames,
            });
        }
        Ok(())
    }
}

impl Default for PhysicalMemory {
    fn default() -> Self {
        Self::with_defaults()
    }
}
