use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_ADDRESS_SPACE_SIZE, DEFAULT_FRAME_SIZE, DEFAULT_PAGE_SIZE, DEFAULT_RAM_SIZE,
};
use crate::error::{MemoryError, Result};
use crate::memory::{MemoryUsage, PhysicalMemory};
use crate::page_table::{
    EvictionPolicy, PageFaultResult, PageInfo, PageTable, TableStatistics,
};

/// Geometry for a memory system, in bytes. Frame size and page size are
/// equal in any given instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryConfig {
    pub ram_size: usize,
    pub frame_size: usize,
    pub address_space_size: usize,
    pub page_size: usize,
}

impl Default for MemoryConfig {
    /// 1 MiB of RAM in 4 KiB frames, 16 MiB of address space in 4 KiB pages.
    fn default() -> Self {
        MemoryConfig {
            ram_size: DEFAULT_RAM_SIZE,
            frame_size: DEFAULT_FRAME_SIZE,
            address_space_size: DEFAULT_ADDRESS_SPACE_SIZE,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl MemoryConfig {
    fn validate(&self) -> Result<()> {
        let fail = |reason: &str| {
            Err(MemoryError::InvalidConfiguration {
                reason: reason.to_string(),
            })
        };
        if self.frame_size == 0 || self.page_size == 0 {
            return fail("frame and page size must be non-zero");
        }
        if self.frame_size != self.page_size {
            return fail("frame size and page size must be equal");
        }
        if self.ram_size == 0 || self.ram_size % self.frame_size != 0 {
            return fail("RAM size must be a non-zero multiple of the frame size");
        }
        if self.address_space_size == 0 || self.address_space_size % self.page_size != 0 {
            return fail("address space size must be a non-zero multiple of the page size");
        }
        Ok(())
    }
}

/// Top-level owner of the simulated hardware: the physical memory and the
/// page table that maps into it.
///
/// Allocators and the comparator borrow both halves at once through
/// [`parts_mut`](MemorySystem::parts_mut); byte-level and introspection
/// calls go through the delegations below.
pub struct MemorySystem {
    ram: PhysicalMemory,
    page_table: PageTable,
}

impl MemorySystem {
    pub fn new(config: MemoryConfig) -> Result<Self> {
        config.validate()?;
        Ok(MemorySystem {
            ram: PhysicalMemory::new(config.ram_size, config.frame_size),
            page_table: PageTable::new(config.address_space_size, config.page_size),
        })
    }

    pub fn with_defaults() -> Self {
        MemorySystem {
            ram: PhysicalMemory::with_defaults(),
            page_table: PageTable::with_defaults(),
        }
    }

    #[inline]
    pub fn ram(&self) -> &PhysicalMemory {
        &self.ram
    }

    #[inline]
    pub fn ram_mut(&mut self) -> &mut PhysicalMemory {
        &mut self.ram
    }

    #[inline]
    pub fn page_table(&self) -> &PageTable {
        &self.page_table
    }

    #[inline]
    pub fn page_table_mut(&mut self) -> &mut PageTable {
        &mut self.page_table
    }

    /// Split borrow for callers that drive both halves, such as the
    /// contiguous allocators and the comparator.
    #[inline]
    pub fn parts_mut(&mut self) -> (&mut PhysicalMemory, &mut PageTable) {
        (&mut self.ram, &mut self.page_table)
    }

    /// Read a byte at a virtual address.
    pub fn read_byte(&mut self, address: usize) -> Result<u8> {
        self.page_table.read_byte(&self.ram, address)
    }

    /// Write a byte at a virtual address.
    pub fn write_byte(&mut self, address: usize, value: u8) -> Result<()> {
        self.page_table.write_byte(&mut self.ram, address, value)
    }

    pub fn allocate_page(&mut self, page: usize, read_only: bool) -> Result<bool> {
        self.page_table.allocate_page(&mut self.ram, page, read_only)
    }

    pub fn deallocate_page(&mut self, page: usize) -> Result<()> {
        self.page_table.deallocate_page(&mut self.ram, page)
    }

    pub fn handle_page_fault(
        &mut self,
        page: usize,
        policy: Option<&mut dyn EvictionPolicy>,
    ) -> Result<PageFaultResult> {
        self.page_table.handle_page_fault(&mut self.ram, page, policy)
    }

    pub fn access_page(
        &mut self,
        page: usize,
        is_write: bool,
        policy: Option<&mut dyn EvictionPolicy>,
    ) -> Result<PageFaultResult> {
        self.page_table
            .access_page(&mut self.ram, page, is_write, policy)
    }

    pub fn usage_statistics(&self) -> MemoryUsage {
        self.ram.usage_statistics()
    }

    pub fn table_statistics(&self) -> TableStatistics {
        self.page_table.table_statistics()
    }

    pub fn pages_in_memory(&self) -> Vec<usize> {
        self.page_table.pages_in_memory()
    }

    pub fn memory_layout(&self) -> BTreeMap<usize, usize> {
        self.page_table.memory_layout()
    }

    pub fn page_info(&self, page: usize) -> Result<PageInfo> {
        self.page_table.page_info(page)
    }
}

impl Default for MemorySystem {
    fn default() -> Self {
        Self::with_defaults()
    }
}
