use std::collections::BTreeMap;

use crate::allocators::{AllocationResult, BestFit, ContiguousAllocator, FirstFit, QuickFit};
use crate::memory::PhysicalMemory;
use crate::page_table::PageTable;

/// Runs every contiguous allocator against an identical snapshot of system
/// state and ranks the outcomes.
pub struct AllocationComparator {
    allocators: Vec<Box<dyn ContiguousAllocator>>,
}

impl AllocationComparator {
    pub fn new() -> Self {
        AllocationComparator {
            allocators: vec![
                Box::new(FirstFit),
                Box::new(BestFit),
                Box::new(QuickFit::new()),
            ],
        }
    }

    /// Trial-run each algorithm against the live state, restoring the
    /// pre-trial frame table and page table after every run. Trials cannot
    /// interfere with each other, and the system ends in its pre-compare
    /// state.
    pub fn compare(
        &mut self,
        ram: &mut PhysicalMemory,
        table: &mut PageTable,
        pages_needed: usize,
    ) -> BTreeMap<String, AllocationResult> {
        let saved_frames = ram.frame_table().to_vec();
        let saved_entries = table.entries().to_vec();

        let mut results = BTreeMap::new();
        for allocator in &mut self.allocators {
            let result = allocator.allocate(ram, table, pages_needed);
            results.insert(allocator.name().to_string(), result);

            ram.restore_frame_table(&saved_frames);
            table.restore_entries(&saved_entries);
        }
        results
    }

    /// The successful result with the strictly highest efficiency score
    /// (ties go to the first algorithm in map order), as
    /// `(algorithm, reason)`. `("None", ...)` when every algorithm failed.
    pub fn recommendation(results: &BTreeMap<String, AllocationResult>) -> (String, String) {
        let mut best: Option<(&String, &AllocationResult)> = None;
        for (name, result) in results {
            if !result.success {
                continue;
            }
            match best {
                Some((_, leader)) if result.efficiency_score <= leader.efficiency_score => {}
                _ => best = Some((name, result)),
            }
        }

        match best {
            Some((name, result)) => (name.clone(), result.reason.clone()),
            None => (
                "None".to_string(),
                "no algorithm can allocate the requested memory".to_string(),
            ),
        }
    }
}

impl Default for AllocationComparator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 8 frames and 8 pages of 16 bytes each
    fn small_system() -> (PhysicalMemory, PageTable) {
        (PhysicalMemory::new(128, 16), PageTable::new(128, 16))
    }

    #[test]
    fn test_compare_covers_all_algorithms() {
        let (mut ram, mut table) = small_system();
        let mut comparator = AllocationComparator::new();

        let results = comparator.compare(&mut ram, &mut table, 2);
        let names: Vec<&str> = results.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["Best Fit", "First Fit", "Quick Fit"]);
        assert!(results.values().all(|r| r.success));
    }

    #[test]
    fn test_compare_leaves_state_untouched() {
        let (mut ram, mut table) = small_system();
        table.map_to_frame(&mut ram, 3, 5).unwrap();
        let frames_before = ram.frame_table().to_vec();
        let entries_before = table.entries().to_vec();

        let mut comparator = AllocationComparator::new();
        comparator.compare(&mut ram, &mut table, 2);

        assert_eq!(ram.frame_table(), frames_before.as_slice());
        assert_eq!(table.entries(), entries_before.as_slice());
    }

    #[test]
    fn test_compare_is_repeatable() {
        let (mut ram, mut table) = small_system();
        table.map_to_frame(&mut ram, 7, 2).unwrap();

        let mut comparator = AllocationComparator::new();
        let first = comparator.compare(&mut ram, &mut table, 2);
        let second = comparator.compare(&mut ram, &mut table, 2);

        for (name, result) in &first {
            let again = &second[name];
            assert_eq!(result.success, again.success, "{name} verdict changed");
            assert_eq!(result.pages, again.pages, "{name} pages changed");
        }
    }

    #[test]
    fn test_recommendation_picks_a_winner() {
        let (mut ram, mut table) = small_system();
        let mut comparator = AllocationComparator::new();

        let results = comparator.compare(&mut ram, &mut table, 3);
        let (algorithm, reason) = AllocationComparator::recommendation(&results);

        assert_ne!(algorithm, "None");
        assert!(results[&algorithm].success);
        assert_eq!(reason, results[&algorithm].reason);
    }

    #[test]
    fn test_recommendation_none_when_impossible() {
        let (mut ram, mut table) = small_system();
        FirstFit.allocate(&mut ram, &mut table, 3);

        let mut comparator = AllocationComparator::new();
        let results = comparator.compare(&mut ram, &mut table, 10);
        assert!(results.values().all(|r| !r.success));

        let (algorithm, reason) = AllocationComparator::recommendation(&results);
        assert_eq!(algorithm, "None");
        assert_eq!(reason, "no algorithm can allocate the requested memory");
    }
}
