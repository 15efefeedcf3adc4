//! End-to-end flows through the public API.

use memsim::{
    AllocationComparator, ContiguousAllocator, EvictionPolicy, FirstFit, MemoryConfig,
    MemorySystem, PagingAllocator,
};

fn eight_frame_system() -> MemorySystem {
    MemorySystem::new(MemoryConfig {
        ram_size: 128,
        frame_size: 16,
        address_space_size: 128,
        page_size: 16,
    })
    .unwrap()
}

#[test]
fn contiguous_allocation_lifecycle() {
    let mut system = eight_frame_system();

    // On an empty system, First Fit takes the lowest run
    let (ram, table) = system.parts_mut();
    let result = FirstFit.allocate(ram, table, 3);
    assert!(result.success);
    assert_eq!(result.pages, vec![0, 1, 2]);
    for (i, &page) in result.pages.iter().enumerate() {
        assert_eq!(table.entry(page).unwrap().frame_number, Some(i));
    }

    // A request beyond the remaining space fails across the board
    let mut comparator = AllocationComparator::new();
    let (ram, table) = system.parts_mut();
    let results = comparator.compare(ram, table, 10);
    assert!(results.values().all(|r| !r.success));

    let (algorithm, reason) = AllocationComparator::recommendation(&results);
    assert_eq!(algorithm, "None");
    assert!(reason.contains("no algorithm"));

    // The failed comparison left the original allocation intact
    assert_eq!(system.pages_in_memory(), vec![0, 1, 2]);
    assert_eq!(system.usage_statistics().used_frames, 3);
}

#[test]
fn comparator_recommends_a_live_winner() {
    let mut system = eight_frame_system();
    system.allocate_page(7, false).unwrap();

    let mut comparator = AllocationComparator::new();
    let (ram, table) = system.parts_mut();
    let results = comparator.compare(ram, table, 2);

    let (algorithm, _) = AllocationComparator::recommendation(&results);
    assert_ne!(algorithm, "None");
    assert!(results[&algorithm].success);

    // Comparison is a dry run: only the page allocated up front is resident
    assert_eq!(system.pages_in_memory(), vec![7]);
}

#[test]
fn stream_bytes_through_scattered_pages() {
    // 32 frames backing 20 virtual pages of 16 bytes
    let mut system = MemorySystem::new(MemoryConfig {
        ram_size: 512,
        frame_size: 16,
        address_space_size: 320,
        page_size: 16,
    })
    .unwrap();
    let page_size = 16;

    let payload: Vec<u8> = (0..50u32).map(|i| (i * 3 % 251) as u8).collect();
    let mut paging = PagingAllocator::with_seed(42);

    let (ram, table) = system.parts_mut();
    let allocation = paging.allocate(ram, table, payload.len());
    assert!(allocation.success);
    assert_eq!(allocation.pages.len(), 4); // ceil(50 / 16)

    // Write the payload through the byte API, one page-sized chunk per
    // allocated page, then read it back the same way.
    for (chunk, &page) in payload.chunks(page_size).zip(&allocation.pages) {
        for (offset, &byte) in chunk.iter().enumerate() {
            system.write_byte(page * page_size + offset, byte).unwrap();
        }
    }
    let mut read_back = Vec::with_capacity(payload.len());
    for (chunk, &page) in payload.chunks(page_size).zip(&allocation.pages) {
        for offset in 0..chunk.len() {
            read_back.push(system.read_byte(page * page_size + offset).unwrap());
        }
    }
    assert_eq!(read_back, payload);

    // Release: exactly the four frames and pages come back
    let (ram, table) = system.parts_mut();
    paging.deallocate(ram, table, &allocation.pages);
    assert_eq!(system.usage_statistics().used_frames, 0);
    assert!(system.pages_in_memory().is_empty());
}

/// Evicts the lowest resident page, oldest-first under sequential access.
struct EvictLowest;

impl EvictionPolicy for EvictLowest {
    fn select_victim(&mut self, resident_pages: &[usize], _frame_count: usize) -> Option<usize> {
        resident_pages.first().copied()
    }
}

#[test]
fn eviction_keeps_the_system_within_frame_budget() {
    // 4 frames backing 8 virtual pages
    let mut system = MemorySystem::new(MemoryConfig {
        ram_size: 64,
        frame_size: 16,
        address_space_size: 128,
        page_size: 16,
    })
    .unwrap();

    let mut policy = EvictLowest;
    for page in 0..8 {
        let result = system.access_page(page, false, Some(&mut policy)).unwrap();
        assert!(result.success, "access to page {page} failed");
    }

    assert_eq!(system.usage_statistics().used_frames, 4);
    assert_eq!(system.pages_in_memory(), vec![4, 5, 6, 7]);

    // Every resident page is backed by exactly one frame
    let layout = system.memory_layout();
    assert_eq!(layout.len(), 4);
}

#[test]
fn statistics_serialize_for_external_consumers() {
    let mut system = eight_frame_system();
    system.allocate_page(0, false).unwrap();

    let usage = serde_json::to_value(system.usage_statistics()).unwrap();
    assert_eq!(usage["used_frames"], 1);
    assert_eq!(usage["total_frames"], 8);

    let stats = serde_json::to_value(system.table_statistics()).unwrap();
    assert_eq!(stats["present_pages"], 1);
}
