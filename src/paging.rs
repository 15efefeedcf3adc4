use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::Serialize;

use crate::memory::PhysicalMemory;
use crate::page_table::PageTable;

/// Outcome of a non-contiguous allocation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PagingAllocation {
    pub success: bool,
    pub first_page: Option<usize>,
    pub pages: Vec<usize>,
}

impl PagingAllocation {
    fn failed() -> Self {
        PagingAllocation {
            success: false,
            first_page: None,
            pages: Vec::new(),
        }
    }
}

/// Non-contiguous allocator: backs a request with whatever free virtual
/// pages are available, no adjacency required.
pub struct PagingAllocator {
    rng: StdRng,
}

impl PagingAllocator {
    pub fn new() -> Self {
        PagingAllocator {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic page selection for reproducible runs.
    pub fn with_seed(seed: u64) -> Self {
        PagingAllocator {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Allocate enough pages to hold `size_bytes`, scattered across the
    /// free page pool.
    ///
    /// Fails fast when free frames or free pages fall short, and never
    /// leaves a partial allocation behind: if a page commit fails midway,
    /// everything committed in this call is unwound first.
    pub fn allocate(
        &mut self,
        ram: &mut PhysicalMemory,
        table: &mut PageTable,
        size_bytes: usize,
    ) -> PagingAllocation {
        let pages_needed = size_bytes.div_ceil(table.page_size());
        if pages_needed == 0 {
            return PagingAllocation {
                success: true,
                first_page: None,
                pages: Vec::new(),
            };
        }

        if ram.free_frame_count() < pages_needed {
            return PagingAllocation::failed();
        }
        let free_pages: Vec<usize> = (0..table.num_pages())
            .filter(|&page| !table.is_present(page))
            .collect();
        if free_pages.len() < pages_needed {
            return PagingAllocation::failed();
        }

        // With a loose pool, draw from every other free page so the chosen
        // set lands with visible gaps.
        let mut pages: Vec<usize> = if free_pages.len() > pages_needed * 2 {
            let spaced: Vec<usize> = free_pages.iter().copied().step_by(2).collect();
            if spaced.len() >= pages_needed {
                spaced
                    .choose_multiple(&mut self.rng, pages_needed)
                    .copied()
                    .collect()
            } else {
                free_pages
                    .choose_multiple(&mut self.rng, pages_needed)
                    .copied()
                    .collect()
            }
        } else {
            free_pages
                .choose_multiple(&mut self.rng, pages_needed)
                .copied()
                .collect()
        };
        pages.sort_unstable();

        let mut committed: Vec<usize> = Vec::with_capacity(pages.len());
        for &page in &pages {
            match table.allocate_page(ram, page, false) {
                Ok(true) => committed.push(page),
                _ => {
                    for &done in &committed {
                        let _ = table.deallocate_page(ram, done);
                    }
                    return PagingAllocation::failed();
                }
            }
        }

        PagingAllocation {
            success: true,
            first_page: pages.first().copied(),
            pages,
        }
    }

    /// Best-effort release of a page set. Individual failures (double
    /// frees, stale page numbers) are skipped; always reports success.
    pub fn deallocate(
        &mut self,
        ram: &mut PhysicalMemory,
        table: &mut PageTable,
        pages: &[usize],
    ) -> bool {
        for &page in pages {
            let _ = table.deallocate_page(ram, page);
        }
        true
    }
}

impl Default for PagingAllocator {
    fn default() -> Self {
        Self::new()
    }
}
