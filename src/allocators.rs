//! Contiguous allocation strategies.
//!
//! Each algorithm must find a run of consecutive free frames *and* a run of
//! consecutive free virtual pages of the same length, then commit page
//! `p+i -> frame f+i` for the whole run. Shortfalls come back as failed
//! [`AllocationResult`]s, never as errors.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::constants::QUICK_FIT_SIZES;
use crate::memory::PhysicalMemory;
use crate::page_table::PageTable;

/// A maximal run of consecutive free frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FreeBlock {
    pub start: usize,
    pub len: usize,
}

/// Outcome of a contiguous allocation attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationResult {
    pub success: bool,
    pub pages: Vec<usize>,
    pub algorithm: String,
    pub elapsed: Duration,
    pub fragmentation: f64,
    pub reason: String,
    pub efficiency_score: f64,
}

impl AllocationResult {
    fn succeeded(
        algorithm: &str,
        pages: Vec<usize>,
        elapsed: Duration,
        fragmentation: f64,
        reason: &str,
    ) -> Self {
        AllocationResult {
            success: true,
            pages,
            algorithm: algorithm.to_string(),
            elapsed,
            fragmentation,
            reason: reason.to_string(),
            efficiency_score: efficiency_score(fragmentation, elapsed),
        }
    }

    fn failed(algorithm: &str, elapsed: Duration, reason: &str) -> Self {
        AllocationResult {
            success: false,
            pages: Vec::new(),
            algorithm: algorithm.to_string(),
            elapsed,
            fragmentation: 0.0,
            reason: reason.to_string(),
            efficiency_score: 0.0,
        }
    }
}

/// `max(0, 1 - 0.6 * fragmentation - min(elapsed_ms, 0.4))`: fragmentation
/// dominates, search time contributes a capped penalty.
fn efficiency_score(fragmentation: f64, elapsed: Duration) -> f64 {
    let time_penalty = (elapsed.as_secs_f64() * 1000.0).min(0.4);
    (1.0 - 0.6 * fragmentation - time_penalty).max(0.0)
}

/// Maximal runs of consecutive free frames, ascending by start frame.
pub fn free_frame_blocks(ram: &PhysicalMemory) -> Vec<FreeBlock> {
    let mut blocks = Vec::new();
    let mut run: Option<FreeBlock> = None;
    for frame in 0..ram.num_frames() {
        if ram.frame_is_occupied(frame) {
            if let Some(block) = run.take() {
                blocks.push(block);
            }
        } else {
            match &mut run {
                Some(block) => block.len += 1,
                None => run = Some(FreeBlock { start: frame, len: 1 }),
            }
        }
    }
    if let Some(block) = run {
        blocks.push(block);
    }
    blocks
}

/// Lowest run of `pages_needed` consecutive free virtual pages.
fn find_contiguous_free_pages(table: &PageTable, pages_needed: usize) -> Option<Vec<usize>> {
    if pages_needed == 0 || pages_needed > table.num_pages() {
        return None;
    }
    'candidates: for start in 0..=(table.num_pages() - pages_needed) {
        for i in 0..pages_needed {
            if table.is_present(start + i) {
                continue 'candidates;
            }
        }
        return Some((start..start + pages_needed).collect());
    }
    None
}

/// Fraction of remaining free space stuck in blocks too small to satisfy a
/// request of `pages_needed`, over the post-allocation layout. 1.0 when
/// nothing is free.
fn fragmentation_after(ram: &PhysicalMemory, pages_needed: usize) -> f64 {
    let blocks = free_frame_blocks(ram);
    let total_free: usize = blocks.iter().map(|b| b.len).sum();
    if total_free == 0 {
        return 1.0;
    }
    let unusable: usize = blocks
        .iter()
        .filter(|b| b.len < pages_needed)
        .map(|b| b.len)
        .sum();
    unusable as f64 / total_free as f64
}

/// Map `pages[i] -> start_frame + i` for the whole run. Any mid-loop
/// failure unwinds every mapping already installed before reporting it.
fn commit_block(
    ram: &mut PhysicalMemory,
    table: &mut PageTable,
    start_frame: usize,
    pages: &[usize],
) -> crate::error::Result<()> {
    for (i, &page) in pages.iter().enumerate() {
        if let Err(err) = table.map_to_frame(ram, page, start_frame + i) {
            for &committed in &pages[..i] {
                let _ = table.deallocate_page(ram, committed);
            }
            return Err(err);
        }
    }
    Ok(())
}

const REASON_NO_BLOCK: &str = "No contiguous block large enough found";
const REASON_NO_PAGES: &str = "No contiguous pages available";

/// A contiguous allocation strategy.
pub trait ContiguousAllocator {
    fn name(&self) -> &'static str;

    fn allocate(
        &mut self,
        ram: &mut PhysicalMemory,
        table: &mut PageTable,
        pages_needed: usize,
    ) -> AllocationResult;
}

/// First Fit: the first free-frame block big enough wins.
pub struct FirstFit;

impl ContiguousAllocator for FirstFit {
    fn name(&self) -> &'static str {
        "First Fit"
    }

    fn allocate(
        &mut self,
        ram: &mut PhysicalMemory,
        table: &mut PageTable,
        pages_needed: usize,
    ) -> AllocationResult {
        let start = Instant::now();
        if pages_needed == 0 {
            return AllocationResult::failed(
                self.name(),
                start.elapsed(),
                "Request must be at least one page",
            );
        }

        let mut saw_fitting_block = false;
        for block in free_frame_blocks(ram) {
            if block.len < pages_needed {
                continue;
            }
            saw_fitting_block = true;
            let Some(pages) = find_contiguous_free_pages(table, pages_needed) else {
                continue;
            };
            if commit_block(ram, table, block.start, &pages).is_err() {
                continue;
            }
            let fragmentation = fragmentation_after(ram, pages_needed);
            return AllocationResult::succeeded(
                self.name(),
                pages,
                start.elapsed(),
                fragmentation,
                "Fast allocation, may cause external fragmentation",
            );
        }

        let reason = if saw_fitting_block {
            REASON_NO_PAGES
        } else {
            REASON_NO_BLOCK
        };
        AllocationResult::failed(self.name(), start.elapsed(), reason)
    }
}

/// Best Fit: the smallest qualifying block wins, ties going to the lowest
/// start frame.
pub struct BestFit;

impl ContiguousAllocator for BestFit {
    fn name(&self) -> &'static str {
        "Best Fit"
    }

    fn allocate(
        &mut self,
        ram: &mut PhysicalMemory,
        table: &mut PageTable,
        pages_needed: usize,
    ) -> AllocationResult {
        let start = Instant::now();
        if pages_needed == 0 {
            return AllocationResult::failed(
                self.name(),
                start.elapsed(),
                "Request must be at least one page",
            );
        }

        let mut suitable: Vec<FreeBlock> = free_frame_blocks(ram)
            .into_iter()
            .filter(|b| b.len >= pages_needed)
            .collect();
        if suitable.is_empty() {
            return AllocationResult::failed(self.name(), start.elapsed(), "No block large enough found");
        }
        // Stable sort keeps ties in ascending start order
        suitable.sort_by_key(|b| b.len);
        let block = suitable[0];

        let Some(pages) = find_contiguous_free_pages(table, pages_needed) else {
            return AllocationResult::failed(self.name(), start.elapsed(), REASON_NO_PAGES);
        };
        if let Err(err) = commit_block(ram, table, block.start, &pages) {
            return AllocationResult::failed(self.name(), start.elapsed(), &err.to_string());
        }

        let fragmentation = fragmentation_after(ram, pages_needed);
        AllocationResult::succeeded(
            self.name(),
            pages,
            start.elapsed(),
            fragmentation,
            "Minimizes wasted space, reduces external fragmentation",
        )
    }
}

/// Quick Fit: free blocks indexed under canonical page-count buckets for
/// fast lookup of common request sizes, with a First Fit fallback.
pub struct QuickFit {
    buckets: BTreeMap<usize, Vec<usize>>,
}

impl QuickFit {
    pub fn new() -> Self {
        QuickFit {
            buckets: BTreeMap::new(),
        }
    }

    /// Rebuild the buckets from the live free-block layout. Rebuilt on
    /// every allocation call, never maintained incrementally: the buckets
    /// can never desync from the true layout.
    fn rebuild_buckets(&mut self, ram: &PhysicalMemory) {
        self.buckets = QUICK_FIT_SIZES
            .iter()
            .map(|&size| (size, Vec::new()))
            .collect();
        for block in free_frame_blocks(ram) {
            // A block of size s serves every canonical size <= s
            for (&size, starts) in self.buckets.iter_mut() {
                if size <= block.len {
                    starts.push(block.start);
                }
            }
        }
    }

    /// Exact-size bucket first, then the smallest canonical size that can
    /// serve the request.
    fn bucket_lookup(&self, pages_needed: usize) -> Option<usize> {
        if let Some(&start) = self.buckets.get(&pages_needed).and_then(|s| s.first()) {
            return Some(start);
        }
        for (&size, starts) in &self.buckets {
            if size >= pages_needed {
                if let Some(&start) = starts.first() {
                    return Some(start);
                }
            }
        }
        None
    }
}

impl Default for QuickFit {
    fn default() -> Self {
        Self::new()
    }
}

impl ContiguousAllocator for QuickFit {
    fn name(&self) -> &'static str {
        "Quick Fit"
    }

    fn allocate(
        &mut self,
        ram: &mut PhysicalMemory,
        table: &mut PageTable,
        pages_needed: usize,
    ) -> AllocationResult {
        let start = Instant::now();
        if pages_needed == 0 {
            return AllocationResult::failed(
                self.name(),
                start.elapsed(),
                "Request must be at least one page",
            );
        }

        self.rebuild_buckets(ram);
        let start_frame = self.bucket_lookup(pages_needed).or_else(|| {
            // Odd sizes beyond the canonical buckets: plain First Fit scan
            free_frame_blocks(ram)
                .into_iter()
                .find(|b| b.len >= pages_needed)
                .map(|b| b.start)
        });
        let Some(start_frame) = start_frame else {
            return AllocationResult::failed(self.name(), start.elapsed(), "No suitable block found");
        };

        let Some(pages) = find_contiguous_free_pages(table, pages_needed) else {
            return AllocationResult::failed(self.name(), start.elapsed(), REASON_NO_PAGES);
        };
        if let Err(err) = commit_block(ram, table, start_frame, &pages) {
            return AllocationResult::failed(self.name(), start.elapsed(), &err.to_string());
        }

        let fragmentation = fragmentation_after(ram, pages_needed);
        AllocationResult::succeeded(
            self.name(),
            pages,
            start.elapsed(),
            fragmentation,
            "Fast allocation for common sizes, good for frequent allocations",
        )
    }
}
