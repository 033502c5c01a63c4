//! End-to-end scenarios for the buddy heap
//!
//! Each test exercises the engine the way a caller would: through the
//! `Allocator` trait, with concrete byte sizes chosen to land on exact
//! power-of-two boundaries so outcomes are unambiguous.

use buddy_heap::allocator::traits::{Allocator, MemoryUsage, Resettable};
use buddy_heap::engine::BuddyAllocator;
use std::alloc::Layout;
use std::ptr::NonNull;

fn layout(size: usize) -> Layout {
    Layout::from_size_align(size, 8).unwrap()
}

fn as_data_ptr(slice_ptr: NonNull<[u8]>) -> NonNull<u8> {
    NonNull::new(slice_ptr.as_ptr() as *mut u8).unwrap()
}

#[test]
fn packs_many_small_allocations_into_capacity() {
    let mut pool = vec![0u8; 16 * 1024];
    let heap = BuddyAllocator::init(&mut pool).unwrap();
    let small = layout(16);

    let mut ptrs = Vec::new();
    loop {
        match unsafe { heap.allocate(small) } {
            Ok(p) => ptrs.push(p),
            Err(e) => {
                assert!(e.is_exhausted());
                break;
            }
        }
    }
    assert!(ptrs.len() > 50, "expected the pool to pack dozens of small blocks, got {}", ptrs.len());

    for p in ptrs {
        unsafe { heap.deallocate(as_data_ptr(p), small) };
    }
    assert_eq!(heap.allocated_count(), 0);
}

#[test]
fn freeing_both_buddies_coalesces_back_to_full_capacity() {
    let mut pool = vec![0u8; 8192];
    let heap = BuddyAllocator::init(&mut pool).unwrap();
    let total = heap.available_memory().unwrap();

    let mid = layout(256);
    let a = unsafe { heap.allocate(mid) }.unwrap();
    let b = unsafe { heap.allocate(mid) }.unwrap();
    assert!(heap.available_memory().unwrap() < total);

    unsafe {
        heap.deallocate(as_data_ptr(a), mid);
        heap.deallocate(as_data_ptr(b), mid);
    }

    assert_eq!(heap.allocated_count(), 0);
    assert_eq!(heap.used_memory(), 0);
    assert_eq!(heap.available_memory(), Some(total));
}

#[test]
fn exhaustion_is_reported_without_corrupting_state() {
    let mut pool = vec![0u8; 4096];
    let heap = BuddyAllocator::init(&mut pool).unwrap();
    let huge = layout(1 << 20);

    let err = unsafe { heap.allocate(huge) }.unwrap_err();
    assert!(err.is_exhausted());
    assert_eq!(heap.allocated_count(), 0);

    // the heap must still be usable after an exhaustion error
    let small = layout(32);
    assert!(unsafe { heap.allocate(small) }.is_ok());
}

#[test]
fn freeing_a_pointer_the_heap_never_handed_out_is_rejected() {
    let mut pool = vec![0u8; 4096];
    let heap = BuddyAllocator::init(&mut pool).unwrap();

    let mut stray = [0u8; 64];
    let stray_ptr = NonNull::new(stray.as_mut_ptr()).unwrap();
    unsafe { heap.deallocate(stray_ptr, layout(32)) };
    assert_eq!(heap.allocated_count(), 0);
}

#[test]
fn double_free_of_the_same_pointer_is_rejected() {
    let mut pool = vec![0u8; 8192];
    let heap = BuddyAllocator::init(&mut pool).unwrap();
    let small = layout(64);

    let ptr = unsafe { heap.allocate(small) }.unwrap();
    let data_ptr = as_data_ptr(ptr);
    unsafe { heap.deallocate(data_ptr, small) };
    assert_eq!(heap.allocated_count(), 0);

    // A second deallocate of the same pointer must not panic or double-decrement.
    unsafe { heap.deallocate(data_ptr, small) };
    assert_eq!(heap.allocated_count(), 0);
}

#[test]
fn reset_wipes_all_outstanding_allocations() {
    let mut pool = vec![0u8; 8192];
    let heap = BuddyAllocator::init(&mut pool).unwrap();
    let small = layout(64);

    let _a = unsafe { heap.allocate(small) }.unwrap();
    let _b = unsafe { heap.allocate(small) }.unwrap();
    assert_eq!(heap.allocated_count(), 2);

    unsafe { heap.reset() };
    assert_eq!(heap.allocated_count(), 0);
    assert_eq!(heap.used_memory(), 0);

    // the reset heap must still hand out allocations normally
    assert!(unsafe { heap.allocate(small) }.is_ok());
}

#[test]
fn zero_size_requests_are_rejected() {
    let mut pool = vec![0u8; 4096];
    let heap = BuddyAllocator::init(&mut pool).unwrap();
    let err = unsafe { heap.allocate(layout(0)) }.unwrap_err();
    assert!(!err.is_exhausted());
}

#[test]
fn pool_too_small_to_host_one_quantum_is_rejected_at_init() {
    let mut pool = vec![0u8; 8];
    assert!(BuddyAllocator::init(&mut pool).is_err());
}
