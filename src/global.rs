//! Process-wide heap facade (§6.1)
//!
//! Wraps a single [`BuddyAllocator`] behind a [`parking_lot::Mutex`] so it
//! can be reached from anywhere in a process without threading a reference
//! through every call site — the buddy-system equivalent of a C `malloc`
//! global heap. Only one heap may live behind this facade at a time; for
//! more than one, build [`BuddyAllocator`]s directly.

use core::alloc::Layout;
use core::ptr::NonNull;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::allocator::traits::{Allocator, Resettable};
use crate::config::HeapConfig;
use crate::engine::BuddyAllocator;
use crate::error::{AllocError, AllocErrorKind, AllocResult};
use crate::stats::EngineStats;

static HEAP: OnceCell<Mutex<BuddyAllocator<'static>>> = OnceCell::new();

fn not_initialized() -> AllocError {
    AllocError::new(AllocErrorKind::InvalidLayout).with_message("process heap not initialized")
}

/// Initializes the process-wide heap over a freshly allocated, leaked
/// buffer of `size` bytes. Fails if a heap was already initialized; call
/// [`heap_done`] first to reuse the slot in tests.
///
/// The backing buffer is intentionally leaked: the facade has no caller to
/// hand it back to, and it is expected to live for the rest of the process.
pub fn heap_init(size: usize, config: HeapConfig) -> AllocResult<()> {
    let buffer: &'static mut [u8] = vec![0u8; size].leak();
    let allocator = BuddyAllocator::init_with_config(buffer, config)?;
    HEAP.set(Mutex::new(allocator))
        .map_err(|_| AllocError::new(AllocErrorKind::InvalidLayout).with_message("heap already initialized"))
}

/// Initializes the process-wide heap with [`HeapConfig::production`].
pub fn heap_init_default(size: usize) -> AllocResult<()> {
    heap_init(size, HeapConfig::production())
}

/// Allocates `layout` from the process-wide heap.
///
/// # Safety
/// Same contract as [`Allocator::allocate`].
pub unsafe fn heap_alloc(layout: Layout) -> AllocResult<NonNull<[u8]>> {
    let heap = HEAP.get().ok_or_else(not_initialized)?;
    let guard = heap.lock();
    unsafe { guard.allocate(layout) }
}

/// Frees a pointer previously returned by [`heap_alloc`].
///
/// # Safety
/// Same contract as [`Allocator::deallocate`].
pub unsafe fn heap_free(ptr: NonNull<u8>, layout: Layout) -> AllocResult<()> {
    let heap = HEAP.get().ok_or_else(not_initialized)?;
    let guard = heap.lock();
    unsafe { guard.deallocate(ptr, layout) };
    Ok(())
}

/// Wipes every outstanding allocation from the process-wide heap, as if it
/// had just been initialized. Does not release the backing buffer: the
/// facade has no way to reclaim memory it leaked at [`heap_init`] time.
///
/// # Safety
/// Invalidates every pointer previously returned by [`heap_alloc`]; callers
/// must ensure none are still in use.
pub unsafe fn heap_done() -> AllocResult<()> {
    let heap = HEAP.get().ok_or_else(not_initialized)?;
    let guard = heap.lock();
    unsafe { guard.reset() };
    Ok(())
}

/// A usage snapshot of the process-wide heap.
pub fn heap_stats() -> AllocResult<EngineStats> {
    let heap = HEAP.get().ok_or_else(not_initialized)?;
    Ok(heap.lock().stats())
}

/// Whether [`heap_init`] has been called successfully.
pub fn is_initialized() -> bool {
    HEAP.get().is_some()
}
