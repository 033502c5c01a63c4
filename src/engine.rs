//! Core buddy allocator engine (§4.3–§4.8)
//!
//! [`BuddyAllocator`] turns a caller-supplied byte slice into a heap: it
//! carves the slice into power-of-two blocks, hands them out on request,
//! and coalesces neighbors back together on free. It owns no memory of its
//! own and is single-threaded (`!Sync`); [`crate::global`] is the
//! thread-safe facade built on top of it.

use core::alloc::Layout;
use core::cell::RefCell;
use core::marker::PhantomData;
use core::ptr::NonNull;

use crate::allocator::traits::{Allocator, MemoryUsage, Resettable};
use crate::bitmap::{Bitmap, QUANTUM};
use crate::block::{buddy_order, RawBlock, WORD};
use crate::config::HeapConfig;
use crate::error::{AllocError, AllocErrorKind, AllocResult};
use crate::freelist::FreeListTable;
use crate::stats::EngineStats;
use crate::utils::{align_down, log2_floor, next_power_of_two};

#[cfg(feature = "logging")]
use tracing::debug;

/// Per-block bookkeeping overhead: one header word and one footer word.
const BLOCK_OVERHEAD: usize = 2 * WORD;

/// Denominator from the bitmap-sizing identity: one bitmap byte covers
/// `8 * QUANTUM` managed bytes, plus itself, i.e. `8 * 32 + 1 = 257`.
const BITMAP_RATIO: usize = 8 * QUANTUM + 1;

/// Bytes of bitmap prefix a pool of `total` bytes needs: one bit per
/// quantum, so each bitmap byte covers 256 managed bytes plus itself (257).
const fn bitmap_words_for(total: usize) -> usize {
    total / BITMAP_RATIO
}

struct Inner {
    base: NonNull<u8>,
    usable_start: usize,
    usable_len: usize,
    bitmap: Bitmap,
    table: FreeListTable,
    allocated_blocks: usize,
    used_bytes: usize,
    config: HeapConfig,
}

impl Inner {
    /// Carves `usable_len` bytes starting at `usable_start` into maximal
    /// power-of-two blocks via repeated binary expansion, pushing each onto
    /// its free list. Used both by `init` and by `reset`.
    fn populate_free_lists(&mut self) {
        let mut offset = self.usable_start;
        let mut remaining = align_down(self.usable_len, QUANTUM);
        while remaining >= QUANTUM {
            let order = log2_floor(remaining).min((usize::BITS - 1) as u32) as usize;
            let size = 1usize << order;
            let size = size.min(remaining);
            unsafe {
                RawBlock::at(self.base, offset).write_header_footer(size, false);
                self.table.push(self.base, offset, order);
            }
            offset += size;
            remaining -= size;
        }
    }

    fn quantum_index(&self, offset: usize) -> usize {
        (offset - self.usable_start) / QUANTUM
    }

    /// Finds the smallest non-empty free list at or above `min_order`,
    /// pops its head, and splits it down to exactly `target_order` (§4.4).
    fn find_and_split(&mut self, target_order: usize) -> Option<usize> {
        let Some(source_order) = self.table.find_next(target_order) else {
            #[cfg(feature = "logging")]
            debug!(target_order, "heap exhausted: no free list at or above target order");
            return None;
        };
        let offset = unsafe { self.table.pop(self.base, source_order) }?;
        let offset = offset.as_ptr() as usize - self.base.as_ptr() as usize;

        #[cfg(feature = "logging")]
        debug!(source_order, target_order, offset, "popped block for split");

        let mut order = source_order;
        let mut block_offset = offset;
        while order > target_order {
            let half = 1usize << (order - 1);
            let buddy_offset = block_offset + half;
            unsafe {
                RawBlock::at(self.base, block_offset).write_header_footer(half, false);
                RawBlock::at(self.base, buddy_offset).write_header_footer(half, false);
                self.table.push(self.base, buddy_offset, order - 1);
            }
            #[cfg(feature = "logging")]
            debug!(from_order = order, to_order = order - 1, buddy_offset, "split block");
            order -= 1;
        }
        Some(block_offset)
    }

    /// Repeatedly merges `offset` (size `2^order`) with its buddy while the
    /// buddy is free and the same size, returning the final merged extent.
    fn coalesce(&mut self, mut offset: usize, mut order: usize) -> (usize, usize) {
        loop {
            if order + 1 >= crate::freelist::TABLE_LEN {
                break;
            }
            let size = 1usize << order;
            let rel = offset - self.usable_start;
            let is_right_half = buddy_order(rel, size) % 2 == 1;

            let buddy_offset = if is_right_half {
                offset - size
            } else {
                offset + size
            };

            let in_bounds = if is_right_half {
                buddy_offset >= self.usable_start
            } else {
                buddy_offset + size <= self.usable_start + align_down(self.usable_len, QUANTUM)
            };
            if !in_bounds {
                break;
            }

            let buddy = RawBlock::at(self.base, buddy_offset);
            if buddy.is_allocated() || buddy.size() != size {
                break;
            }

            unsafe {
                self.table.remove(self.base, buddy.as_handle(), order);
            }
            let merged_offset = offset.min(buddy_offset);
            let merged_size = size * 2;
            unsafe {
                RawBlock::at(self.base, merged_offset).write_header_footer(merged_size, false);
            }
            #[cfg(feature = "logging")]
            debug!(order, merged_offset, new_order = order + 1, "coalesced with buddy");
            offset = merged_offset;
            order += 1;
        }
        (offset, order)
    }
}

/// A buddy-system heap over a borrowed byte slice.
///
/// Not `Sync`: all mutable state lives behind a [`RefCell`], so concurrent
/// access from multiple threads must go through an external lock (see
/// [`crate::global`]).
pub struct BuddyAllocator<'a> {
    inner: RefCell<Inner>,
    _region: PhantomData<&'a mut [u8]>,
}

impl<'a> BuddyAllocator<'a> {
    /// Equivalent to [`Self::init_with_config`] with [`HeapConfig::production`].
    pub fn init(pool: &'a mut [u8]) -> AllocResult<Self> {
        Self::init_with_config(pool, HeapConfig::production())
    }

    /// Carves `pool` into a fresh buddy heap: a bitmap prefix sized by the
    /// `memSize / 257` identity, followed by the largest run of power-of-two
    /// blocks that fit in what remains.
    ///
    /// Reproduces the original's truncation arithmetic bit-for-bit: with
    /// `b = total / 257`, the bitmap needs exactly `b` bytes (`256 * b`
    /// managed bytes at one bit per quantum), the managed region starts one
    /// word past the word-rounded bitmap (`(b / WORD + 1) * WORD`), and the
    /// `total % 257` remainder bytes go unused as padding. For pool sizes so
    /// small that `b` isn't itself word-aligned, that word of padding can
    /// overrun `total`; in that degenerate case the managed region is
    /// clamped down to what actually fits rather than reading past the pool.
    pub fn init_with_config(pool: &'a mut [u8], config: HeapConfig) -> AllocResult<Self> {
        let total = pool.len();
        if total < BITMAP_RATIO {
            return Err(AllocError::invalid_layout(total, 1));
        }
        let base = NonNull::new(pool.as_mut_ptr())
            .ok_or_else(|| AllocError::invalid_layout(total, 1))?;

        let bitmap_bytes = bitmap_words_for(total);
        let usable_start = (bitmap_bytes / WORD + 1) * WORD;
        let mut usable_len = 256 * bitmap_bytes;
        if usable_start >= total {
            usable_len = 0;
        } else if usable_start + usable_len > total {
            usable_len = align_down(total - usable_start, QUANTUM);
        }
        if usable_len < QUANTUM {
            return Err(AllocError::invalid_layout(total, 1));
        }

        let quanta = usable_len / QUANTUM;
        let bitmap = unsafe { Bitmap::new(base, quanta) };

        let mut inner = Inner {
            base,
            usable_start,
            usable_len,
            bitmap,
            table: FreeListTable::new(),
            allocated_blocks: 0,
            used_bytes: 0,
            config,
        };
        inner.populate_free_lists();

        Ok(Self { inner: RefCell::new(inner), _region: PhantomData })
    }

    /// Rounds a requested payload size up to the smallest block size that
    /// can host it (payload plus header/footer overhead), never below one
    /// quantum (§4.8).
    fn round_up_size(requested: usize) -> usize {
        let needed = requested.saturating_add(BLOCK_OVERHEAD).max(QUANTUM);
        next_power_of_two(needed)
    }

    /// Number of blocks currently allocated.
    pub fn allocated_count(&self) -> usize {
        self.inner.borrow().allocated_blocks
    }

    /// A point-in-time snapshot of usage counters.
    pub fn stats(&self) -> EngineStats {
        let inner = self.inner.borrow();
        EngineStats {
            used_bytes: inner.used_bytes,
            total_bytes: inner.usable_len,
            allocated_blocks: inner.allocated_blocks,
        }
    }

    /// Number of free blocks currently queued at each size exponent, indexed
    /// by order (`result[k]` is the count of free `2^k`-byte blocks).
    ///
    /// Walks all 64 free lists (§4.7), so it is gated behind [`HeapConfig::track_stats`]:
    /// when that flag is off the lists are not walked and every entry is zero.
    #[cfg(feature = "stats")]
    pub fn free_list_occupancy(&self) -> [usize; crate::freelist::TABLE_LEN] {
        let inner = self.inner.borrow();
        let mut occupancy = [0usize; crate::freelist::TABLE_LEN];
        if inner.config.track_stats {
            for (order, slot) in occupancy.iter_mut().enumerate() {
                *slot = inner.table.len_at(inner.base, order);
            }
        }
        occupancy
    }

    fn alloc_inner(&self, layout: Layout) -> AllocResult<NonNull<[u8]>> {
        let size = layout.size();
        if size == 0 {
            return Err(AllocError::new(AllocErrorKind::ZeroSizeRequest));
        }
        if layout.align() > QUANTUM {
            return Err(AllocError::with_layout(AllocErrorKind::InvalidLayout, layout));
        }

        let target_size = Self::round_up_size(size);
        let target_order = log2_floor(target_size) as usize;

        let mut inner = self.inner.borrow_mut();
        let offset = inner
            .find_and_split(target_order)
            .ok_or_else(|| AllocError::exhausted(size))?;

        let block = RawBlock::at(inner.base, offset);
        block.write_header_footer(target_size, true);
        let index = inner.quantum_index(offset);
        inner.bitmap.mark(index);
        inner.allocated_blocks += 1;
        inner.used_bytes += target_size;

        let user_ptr = block.user_ptr();
        let usable = target_size - BLOCK_OVERHEAD;
        if let Some(pattern) = inner.config.alloc_fill {
            unsafe { core::ptr::write_bytes(user_ptr.as_ptr(), pattern, usable) };
        }
        Ok(NonNull::slice_from_raw_parts(user_ptr, usable))
    }

    fn free_inner(&self, ptr: NonNull<u8>) -> AllocResult<()> {
        let mut inner = self.inner.borrow_mut();
        let block = RawBlock::from_user_ptr(inner.base, ptr)
            .filter(|b| {
                b.offset() >= inner.usable_start
                    && b.offset() < inner.usable_start + inner.usable_len
                    && (b.offset() - inner.usable_start) % QUANTUM == 0
            })
            .ok_or_else(|| AllocError::new(AllocErrorKind::InvalidPointer))?;

        let index = inner.quantum_index(block.offset());
        if !inner.bitmap.test(index) || !block.is_allocated() {
            return Err(AllocError::new(AllocErrorKind::DoubleFree));
        }

        let size = block.size();
        if let Some(pattern) = inner.config.free_fill {
            unsafe { core::ptr::write_bytes(block.user_ptr().as_ptr(), pattern, size - BLOCK_OVERHEAD) };
        }
        inner.bitmap.unmark(index);
        block.write_header_footer(size, false);
        inner.allocated_blocks -= 1;
        inner.used_bytes -= size;

        let order = log2_floor(size) as usize;
        let (final_offset, final_order) = inner.coalesce(block.offset(), order);
        unsafe {
            inner.table.push(inner.base, final_offset, final_order);
        }
        Ok(())
    }
}

unsafe impl<'a> Allocator for BuddyAllocator<'a> {
    #[track_caller]
    unsafe fn allocate(&self, layout: Layout) -> AllocResult<NonNull<[u8]>> {
        self.alloc_inner(layout)
    }

    #[track_caller]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, _layout: Layout) {
        let _ = self.free_inner(ptr);
    }

    fn max_allocation_size() -> usize {
        1usize << 62
    }

    fn supports_zero_sized_allocs() -> bool {
        false
    }
}

impl<'a> MemoryUsage for BuddyAllocator<'a> {
    fn used_memory(&self) -> usize {
        self.inner.borrow().used_bytes
    }

    fn available_memory(&self) -> Option<usize> {
        let inner = self.inner.borrow();
        Some(inner.usable_len.saturating_sub(inner.used_bytes))
    }
}

impl<'a> Resettable for BuddyAllocator<'a> {
    unsafe fn reset(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.table = FreeListTable::new();
        inner.allocated_blocks = 0;
        inner.used_bytes = 0;
        inner.populate_free_lists();
    }
}
