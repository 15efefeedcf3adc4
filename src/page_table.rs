use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::constants::{DEFAULT_ADDRESS_SPACE_SIZE, DEFAULT_PAGE_SIZE};
use crate::error::{MemoryError, Result};
use crate::memory::PhysicalMemory;

/// A single page table entry mapping a virtual page to a physical frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PageTableEntry {
    pub frame_number: Option<usize>,
    pub present: bool,
    pub referenced: bool,
    pub modified: bool,
    pub read_only: bool,
}

impl PageTableEntry {
    /// Fresh mapping to `frame`: present, with clean reference and dirty bits.
    fn mapped(frame: usize, read_only: bool) -> Self {
        PageTableEntry {
            frame_number: Some(frame),
            present: true,
            referenced: false,
            modified: false,
            read_only,
        }
    }
}

impl fmt::Display for PageTableEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut status = Vec::new();
        if self.present {
            status.push("Present");
        }
        if self.referenced {
            status.push("Referenced");
        }
        if self.modified {
            status.push("Modified");
        }
        if self.read_only {
            status.push("ReadOnly");
        }
        let status = if status.is_empty() {
            "Not Present".to_string()
        } else {
            status.join(", ")
        };
        match self.frame_number {
            Some(frame) => write!(f, "Frame: {frame}, Status: {status}"),
            None => write!(f, "Frame: None, Status: {status}"),
        }
    }
}

/// Victim-selection capability supplied by the embedding layer. Given the
/// resident page set and the total frame count, name a page to evict (or
/// decline). No policy ships with this crate.
pub trait EvictionPolicy {
    fn select_victim(&mut self, resident_pages: &[usize], frame_count: usize) -> Option<usize>;
}

/// Outcome of a page fault or page access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageFaultResult {
    pub page_number: usize,
    pub page_fault: bool,
    pub evicted_page: Option<usize>,
    pub frame_number: Option<usize>,
    pub success: bool,
}

/// Page table occupancy counters, consumable by external reporting layers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TableStatistics {
    pub total_pages: usize,
    pub present_pages: usize,
    pub modified_pages: usize,
    pub referenced_pages: usize,
    pub read_only_pages: usize,
    pub usage_percentage: f64,
}

/// Per-page view returned by [`PageTable::page_info`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub page_number: usize,
    pub frame_number: Option<usize>,
    pub present: bool,
    pub referenced: bool,
    pub modified: bool,
    pub read_only: bool,
}

/// Maps virtual page numbers to physical frame numbers and performs
/// virtual-to-physical address translation.
///
/// The table holds no reference to the physical memory it maps into:
/// operations that touch memory take it as a parameter, and
/// [`MemorySystem`](crate::system::MemorySystem) wires the two together
/// for callers.
pub struct PageTable {
    page_size: usize,
    address_space_size: usize,
    num_pages: usize,
    entries: Vec<PageTableEntry>,
}

impl PageTable {
    /// Create an empty page table over `address_space_size` bytes of
    /// virtual address space in pages of `page_size` bytes.
    pub fn new(address_space_size: usize, page_size: usize) -> Self {
        assert!(page_size > 0, "page size must be non-zero");
        let num_pages = address_space_size / page_size;
        PageTable {
            page_size,
            address_space_size,
            num_pages,
            entries: vec![PageTableEntry::default(); num_pages],
        }
    }

    /// 16 MiB address space in 4 KiB pages.
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_ADDRESS_SPACE_SIZE, DEFAULT_PAGE_SIZE)
    }

    #[inline]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    #[inline]
    pub fn address_space_size(&self) -> usize {
        self.address_space_size
    }

    #[inline]
    pub fn num_pages(&self) -> usize {
        self.num_pages
    }

    /// Virtual page number of an address.
    #[inline]
    pub fn page_number(&self, address: usize) -> Result<usize> {
        self.check_address(address)?;
        Ok(address / self.page_size)
    }

    /// Offset of an address within its page.
    #[inline]
    pub fn page_offset(&self, address: usize) -> Result<usize> {
        self.check_address(address)?;
        Ok(address % self.page_size)
    }

    /// Translate a virtual address to a physical address.
    ///
    /// Sets the entry's reference bit on every successful translation,
    /// reads included, the way the hardware would.
    pub fn translate(&mut self, address: usize) -> Result<usize> {
        let page = self.page_number(address)?;
        let offset = address % self.page_size;

        let entry = &mut self.entries[page];
        if !entry.present {
            return Err(MemoryError::PageNotPresent { page });
        }
        let frame = entry
            .frame_number
            .ok_or(MemoryError::PageNotPresent { page })?;
        entry.referenced = true;

        Ok(frame * self.page_size + offset)
    }

    /// Read a byte through address translation.
    pub fn read_byte(&mut self, ram: &PhysicalMemory, address: usize) -> Result<u8> {
        let physical = self.translate(address)?;
        ram.read_byte(physical)
    }

    /// Write a byte through address translation. Sets the dirty bit once
    /// the write has landed.
    pub fn write_byte(&mut self, ram: &mut PhysicalMemory, address: usize, value: u8) -> Result<()> {
        let page = self.page_number(address)?;
        if self.entries[page].read_only {
            return Err(MemoryError::ReadOnlyViolation { page });
        }

        let physical = self.translate(address)?;
        ram.write_byte(physical, value)?;
        self.entries[page].modified = true;
        Ok(())
    }

    /// Back a virtual page with the first free frame.
    ///
    /// Returns `Ok(true)` if the page was (or already is) present and
    /// `Ok(false)` when no frame is free; frame exhaustion is an expected
    /// outcome, not an error.
    pub fn allocate_page(
        &mut self,
        ram: &mut PhysicalMemory,
        page: usize,
        read_only: bool,
    ) -> Result<bool> {
        self.check_page(page)?;
        if self.entries[page].present {
            return Ok(true);
        }
        let Some(frame) = ram.allocate_frame() else {
            return Ok(false);
        };
        self.entries[page] = PageTableEntry::mapped(frame, read_only);
        Ok(true)
    }

    /// Unmap a page and release its frame.
    pub fn deallocate_page(&mut self, ram: &mut PhysicalMemory, page: usize) -> Result<()> {
        self.check_page(page)?;
        let entry = self.entries[page];
        let frame = match (entry.present, entry.frame_number) {
            (true, Some(frame)) => frame,
            _ => return Err(MemoryError::PageNotAllocated { page }),
        };
        ram.deallocate_frame(frame)?;
        self.entries[page] = PageTableEntry::default();
        Ok(())
    }

    /// Install `page -> frame` for a caller-chosen frame. Commit primitive
    /// for the contiguous allocators, which pick frame runs themselves.
    pub fn map_to_frame(
        &mut self,
        ram: &mut PhysicalMemory,
        page: usize,
        frame: usize,
    ) -> Result<()> {
        self.check_page(page)?;
        if self.entries[page].present {
            return Err(MemoryError::PageAlreadyMapped { page });
        }
        ram.claim_frame(frame)?;
        self.entries[page] = PageTableEntry::mapped(frame, false);
        Ok(())
    }

    /// Bring a page into memory, evicting a victim through the supplied
    /// policy when physical memory is exhausted.
    ///
    /// A present page is not a fault: its reference bit is set and the
    /// result reports `page_fault: false`. With no policy and no free
    /// frame, the result reports `success: false`; that is an expected
    /// outcome, not an error.
    pub fn handle_page_fault(
        &mut self,
        ram: &mut PhysicalMemory,
        page: usize,
        mut policy: Option<&mut dyn EvictionPolicy>,
    ) -> Result<PageFaultResult> {
        self.check_page(page)?;

        if self.entries[page].present {
            self.entries[page].referenced = true;
            return Ok(PageFaultResult {
                page_number: page,
                page_fault: false,
                evicted_page: None,
                frame_number: self.entries[page].frame_number,
                success: true,
            });
        }

        let mut evicted = None;
        let mut frame = ram.allocate_frame();
        if frame.is_none() {
            if let Some(policy) = policy.as_deref_mut() {
                let resident = self.pages_in_memory();
                if let Some(victim) = policy.select_victim(&resident, ram.num_frames()) {
                    self.deallocate_page(ram, victim)?;
                    evicted = Some(victim);
                    frame = ram.allocate_frame();
                }
            }
        }

        let Some(frame) = frame else {
            return Ok(PageFaultResult {
                page_number: page,
                page_fault: true,
                evicted_page: evicted,
                frame_number: None,
                success: false,
            });
        };

        // A faulted-in page starts referenced: the access that faulted it
        // in counts.
        self.entries[page] = PageTableEntry {
            frame_number: Some(frame),
            present: true,
            referenced: true,
            modified: false,
            read_only: false,
        };

        Ok(PageFaultResult {
            page_number: page,
            page_fault: true,
            evicted_page: evicted,
            frame_number: Some(frame),
            success: true,
        })
    }

    /// Access a page, faulting it in if needed. Sets the reference bit on
    /// any resident page; a write sets the dirty bit and is refused on a
    /// read-only page.
    pub fn access_page(
        &mut self,
        ram: &mut PhysicalMemory,
        page: usize,
        is_write: bool,
        policy: Option<&mut dyn EvictionPolicy>,
    ) -> Result<PageFaultResult> {
        self.check_page(page)?;

        let mut page_fault = false;
        let mut evicted_page = None;
        if !self.entries[page].present {
            let fault = self.handle_page_fault(ram, page, policy)?;
            if !fault.success {
                return Ok(fault);
            }
            page_fault = true;
            evicted_page = fault.evicted_page;
        }

        let entry = &mut self.entries[page];
        entry.referenced = true;
        if is_write {
            if entry.read_only {
                return Err(MemoryError::ReadOnlyViolation { page });
            }
            entry.modified = true;
        }

        Ok(PageFaultResult {
            page_number: page,
            page_fault,
            evicted_page,
            frame_number: entry.frame_number,
            success: true,
        })
    }

    pub fn table_statistics(&self) -> TableStatistics {
        let present = self.entries.iter().filter(|e| e.present).count();
        TableStatistics {
            total_pages: self.num_pages,
            present_pages: present,
            modified_pages: self.entries.iter().filter(|e| e.modified).count(),
            referenced_pages: self.entries.iter().filter(|e| e.referenced).count(),
            read_only_pages: self.entries.iter().filter(|e| e.read_only).count(),
            usage_percentage: if self.num_pages > 0 {
                present as f64 / self.num_pages as f64 * 100.0
            } else {
                0.0
            },
        }
    }

    /// Clear every entry's reference bit. Support hook for external clock
    /// and second-chance eviction policies.
    pub fn clear_reference_bits(&mut self) {
        for entry in &mut self.entries {
            entry.referenced = false;
        }
    }

    /// Page numbers currently backed by a frame, ascending.
    pub fn pages_in_memory(&self) -> Vec<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.present)
            .map(|(page, _)| page)
            .collect()
    }

    /// Inverse map: which frame holds which page.
    pub fn memory_layout(&self) -> BTreeMap<usize, usize> {
        let mut layout = BTreeMap::new();
        for (page, entry) in self.entries.iter().enumerate() {
            if entry.present {
                if let Some(frame) = entry.frame_number {
                    layout.insert(frame, page);
                }
            }
        }
        layout
    }

    pub fn page_info(&self, page: usize) -> Result<PageInfo> {
        self.check_page(page)?;
        let entry = self.entries[page];
        Ok(PageInfo {
            page_number: page,
            frame_number: entry.frame_number,
            present: entry.present,
            referenced: entry.referenced,
            modified: entry.modified,
            read_only: entry.read_only,
        })
    }

    pub fn entry(&self, page: usize) -> Result<&PageTableEntry> {
        self.check_page(page)?;
        Ok(&self.entries[page])
    }

    /// Whether a page is present. Out-of-range pages report absent.
    #[inline]
    pub fn is_present(&self, page: usize) -> bool {
        self.entries.get(page).is_some_and(|e| e.present)
    }

    /// The full entry array, for snapshotting.
    pub fn entries(&self) -> &[PageTableEntry] {
        &self.entries
    }

    /// Restore a previously captured entry array.
    ///
    /// # Panics
    ///
    /// Panics if `saved` was not captured from this table (length differs).
    pub fn restore_entries(&mut self, saved: &[PageTableEntry]) {
        self.entries.copy_from_slice(saved);
    }

    #[inline]
    fn check_address(&self, address: usize) -> Result<()> {
        if address >= self.address_space_size {
            return Err(MemoryError::AddressOutOfRange {
                address,
                space: self.address_space_size,
            });
        }
        Ok(())
    }

    #[inline]
    fn check_page(&self, page: usize) -> Result<()> {
        if page >= self.num_pages {
            return Err(MemoryError::PageOutOfBounds {
                page,
                num_pages: self.num_pages,
            });
        }
        Ok(())
    }
}
