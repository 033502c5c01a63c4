//! Allocator traits shared by every engine in this crate
//!
//! Defines the `Allocator` capability trait plus the `MemoryUsage` and
//! `Resettable` companion traits. Implementors deal in raw pointers and are
//! unsafe by nature; the traits document the contracts an implementor must
//! uphold.

use core::alloc::Layout;
use core::ptr::NonNull;

use crate::error::AllocResult;

/// Allocator trait with resize operations expressed in terms of allocate/deallocate
///
/// # Safety Requirements
///
/// Implementors must ensure that:
/// - Returned pointers are valid for the requested lifetime
/// - Memory is properly aligned according to the layout
/// - Deallocation only occurs for previously allocated pointers
/// - Layout information matches between allocation and deallocation
pub unsafe trait Allocator {
    /// Allocates memory with the given layout
    ///
    /// # Safety
    /// - Returned pointer must be valid for reads and writes
    /// - Memory content is uninitialized and must be initialized before use
    #[track_caller]
    unsafe fn allocate(&self, layout: Layout) -> AllocResult<NonNull<[u8]>>;

    /// Deallocates memory at the given pointer with the specified layout
    ///
    /// # Safety
    /// - `ptr` must have been allocated by this allocator
    /// - `layout` must match the original allocation layout exactly
    /// - After this call, `ptr` becomes invalid and must not be used
    #[track_caller]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);

    /// Extends or shrinks an existing allocation by reallocating through
    /// `allocate` + copy + `deallocate`. There is no in-place path: splitting
    /// and coalescing always move a block to a differently sized home.
    ///
    /// # Safety
    /// Same requirements as `allocate`/`deallocate`; `old_layout` must match
    /// the allocation's original layout.
    unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_layout: Layout,
    ) -> AllocResult<NonNull<[u8]>> {
        if new_layout.size() == 0 {
            unsafe { self.deallocate(ptr, old_layout) };
            return Ok(NonNull::slice_from_raw_parts(NonNull::dangling(), 0));
        }

        if old_layout.size() == new_layout.size() {
            return Ok(NonNull::slice_from_raw_parts(ptr, new_layout.size()));
        }

        let new_ptr = unsafe { self.allocate(new_layout)? };
        let copy_size = old_layout.size().min(new_layout.size());
        unsafe {
            core::ptr::copy_nonoverlapping(ptr.as_ptr(), new_ptr.as_ptr().cast::<u8>(), copy_size);
            self.deallocate(ptr, old_layout);
        }
        Ok(new_ptr)
    }

    /// Returns the maximum single allocation this allocator can service.
    fn max_allocation_size() -> usize {
        isize::MAX as usize
    }

    /// Whether zero-sized allocation requests are accepted.
    fn supports_zero_sized_allocs() -> bool {
        false
    }
}

/// Memory usage reporting trait
///
/// Allows allocators to report their current memory usage statistics, for
/// monitoring and for implementing memory-pressure checks.
pub trait MemoryUsage {
    /// Returns currently allocated memory in bytes.
    fn used_memory(&self) -> usize;

    /// Returns available (free) memory in bytes, or `None` if unbounded.
    fn available_memory(&self) -> Option<usize>;

    /// Total capacity in bytes, or `None` if unbounded.
    fn total_memory(&self) -> Option<usize> {
        self.available_memory().map(|avail| self.used_memory() + avail)
    }

    /// Usage as a percentage of total capacity, or `None` if unknown.
    fn memory_usage_percent(&self) -> Option<f32> {
        self.total_memory().and_then(|total| {
            if total == 0 {
                Some(0.0)
            } else {
                Some((self.used_memory() as f32 / total as f32) * 100.0)
            }
        })
    }

    /// Whether usage is at or above `threshold_percent`.
    fn is_memory_pressure(&self, threshold_percent: f32) -> Option<bool> {
        self.memory_usage_percent().map(|usage| usage >= threshold_percent)
    }

    /// A snapshot view combining the above into one value.
    fn memory_usage(&self) -> BasicMemoryUsage {
        BasicMemoryUsage {
            used: self.used_memory(),
            available: self.available_memory(),
            total: self.total_memory(),
            usage_percent: self.memory_usage_percent(),
        }
    }
}

/// Point-in-time memory usage snapshot.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct BasicMemoryUsage {
    /// Currently used memory in bytes.
    pub used: usize,
    /// Available memory in bytes (`None` if unlimited).
    pub available: Option<usize>,
    /// Total memory capacity in bytes (`None` if unlimited).
    pub total: Option<usize>,
    /// Memory usage as a percentage (`None` if it cannot be computed).
    pub usage_percent: Option<f32>,
}

impl core::fmt::Display for BasicMemoryUsage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "used: {} bytes", self.used)?;
        if let Some(total) = self.total {
            write!(f, ", total: {total} bytes")?;
        }
        if let Some(percent) = self.usage_percent {
            write!(f, " ({percent:.1}%)")?;
        }
        Ok(())
    }
}

/// Resettable allocator trait
///
/// Allocators implementing this trait can be wiped back to their
/// just-initialized state, invalidating all outstanding allocations.
pub trait Resettable {
    /// Resets the allocator, invalidating all previous allocations.
    ///
    /// # Safety
    /// - All pointers from previous allocations become invalid immediately.
    /// - Caller must ensure no live references exist before calling this.
    unsafe fn reset(&self);

    /// Whether `reset` can currently be called. Default: always.
    fn can_reset(&self) -> bool {
        true
    }

    /// Resets only if `can_reset` holds; returns whether it did.
    ///
    /// # Safety
    /// Same requirements as `reset`, conditioned on it actually running.
    unsafe fn try_reset(&self) -> bool {
        if self.can_reset() {
            unsafe { self.reset() };
            true
        } else {
            false
        }
    }
}

/// RAII guard that resets a [`Resettable`] allocator on drop unless disabled.
pub struct ResetGuard<'a, A: Resettable + ?Sized> {
    allocator: &'a A,
    should_reset: bool,
}

impl<'a, A: Resettable + ?Sized> ResetGuard<'a, A> {
    /// Creates a guard that resets `allocator` when dropped.
    pub fn new(allocator: &'a A) -> Self {
        Self { allocator, should_reset: true }
    }

    /// Disables the automatic reset on drop.
    pub fn disable_reset(&mut self) {
        self.should_reset = false;
    }

    /// Borrows the guarded allocator.
    pub fn allocator(&self) -> &A {
        self.allocator
    }
}

impl<'a, A: Resettable + ?Sized> Drop for ResetGuard<'a, A> {
    fn drop(&mut self) {
        if self.should_reset {
            unsafe { self.allocator.try_reset(); }
        }
    }
}

impl<'a, A: Resettable + ?Sized> core::ops::Deref for ResetGuard<'a, A> {
    type Target = A;

    fn deref(&self) -> &Self::Target {
        self.allocator
    }
}
