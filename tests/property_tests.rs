//! Property-based tests using proptest.
//!
//! These exercise the invariants that hold across arbitrary operation
//! sequences and occupancy layouts.

use proptest::prelude::*;

use memsim::{
    AllocationComparator, BestFit, ContiguousAllocator, FirstFit, PageTable, PagingAllocator,
    PhysicalMemory, QuickFit,
};

/// Frame occupancy and page-table mappings describe the same set: every
/// occupied frame is referenced by exactly one present entry.
fn occupancy_matches(ram: &PhysicalMemory, table: &PageTable) -> bool {
    let layout = table.memory_layout();
    (0..ram.num_frames()).all(|frame| ram.frame_is_occupied(frame) == layout.contains_key(&frame))
}

// 16 frames and 16 pages of 16 bytes, pages mapped straight onto frames
// wherever the mask is set
fn system_from_mask(mask: &[bool]) -> (PhysicalMemory, PageTable) {
    let mut ram = PhysicalMemory::new(256, 16);
    let mut table = PageTable::new(256, 16);
    for (page, &occupied) in mask.iter().enumerate() {
        if occupied {
            table.map_to_frame(&mut ram, page, page).unwrap();
        }
    }
    (ram, table)
}

fn occupancy_strategy() -> impl Strategy<Value = Vec<bool>> {
    proptest::collection::vec(any::<bool>(), 16)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn frame_and_page_occupancy_stay_in_lockstep(
        ops in proptest::collection::vec((0..3u8, 0..16usize), 1..40)
    ) {
        let mut ram = PhysicalMemory::new(256, 16);
        let mut table = PageTable::new(256, 16);
        for (op, page) in ops {
            match op {
                0 => {
                    let _ = table.allocate_page(&mut ram, page, false);
                }
                1 => {
                    let _ = table.deallocate_page(&mut ram, page);
                }
                _ => {
                    let _ = table.access_page(&mut ram, page, page % 2 == 0, None);
                }
            }
            prop_assert!(occupancy_matches(&ram, &table));
        }
    }

    #[test]
    fn byte_round_trip(page in 0..16usize, offset in 0..16usize, value in any::<u8>()) {
        let mut ram = PhysicalMemory::new(256, 16);
        let mut table = PageTable::new(256, 16);
        prop_assert!(table.allocate_page(&mut ram, page, false).unwrap());

        let address = page * 16 + offset;
        table.write_byte(&mut ram, address, value).unwrap();
        prop_assert_eq!(table.read_byte(&ram, address).unwrap(), value);
    }

    #[test]
    fn contiguous_results_stay_bounded(
        mask in occupancy_strategy(),
        pages_needed in 1..8usize
    ) {
        for mut allocator in [
            Box::new(FirstFit) as Box<dyn ContiguousAllocator>,
            Box::new(BestFit),
            Box::new(QuickFit::new()),
        ] {
            let (mut ram, mut table) = system_from_mask(&mask);
            let free_before = ram.free_frame_count();

            let result = allocator.allocate(&mut ram, &mut table, pages_needed);

            prop_assert!((0.0..=1.0).contains(&result.fragmentation));
            prop_assert!((0.0..=1.0).contains(&result.efficiency_score));
            if result.success {
                prop_assert_eq!(result.pages.len(), pages_needed);
                prop_assert_eq!(ram.free_frame_count(), free_before - pages_needed);

                // Pages and frames correspond 1:1 at matching offsets
                let first_frame = table.entry(result.pages[0]).unwrap().frame_number.unwrap();
                for (i, &page) in result.pages.iter().enumerate() {
                    prop_assert_eq!(
                        table.entry(page).unwrap().frame_number,
                        Some(first_frame + i)
                    );
                }
            } else {
                // A failed attempt must not leak frames or pages
                prop_assert_eq!(ram.free_frame_count(), free_before);
            }
            prop_assert!(occupancy_matches(&ram, &table));
        }
    }

    #[test]
    fn comparator_never_disturbs_state(
        mask in occupancy_strategy(),
        pages_needed in 1..10usize
    ) {
        let (mut ram, mut table) = system_from_mask(&mask);
        let frames_before = ram.frame_table().to_vec();
        let entries_before = table.entries().to_vec();

        let mut comparator = AllocationComparator::new();
        let results = comparator.compare(&mut ram, &mut table, pages_needed);

        prop_assert_eq!(results.len(), 3);
        prop_assert_eq!(ram.frame_table(), frames_before.as_slice());
        prop_assert_eq!(table.entries(), entries_before.as_slice());
    }

    #[test]
    fn paging_allocations_are_sorted_and_reversible(
        seed in any::<u64>(),
        size in 0..200usize
    ) {
        let mut ram = PhysicalMemory::new(512, 16); // 32 frames
        let mut table = PageTable::new(512, 16); // 32 pages
        let mut allocator = PagingAllocator::with_seed(seed);
        let free_before = ram.free_frame_count();

        let allocation = allocator.allocate(&mut ram, &mut table, size);

        if allocation.success {
            prop_assert_eq!(allocation.pages.len(), size.div_ceil(16));
            prop_assert!(allocation.pages.windows(2).all(|w| w[0] < w[1]));
            allocator.deallocate(&mut ram, &mut table, &allocation.pages);
        }
        prop_assert_eq!(ram.free_frame_count(), free_before);
        prop_assert!(occupancy_matches(&ram, &table));
    }
}
