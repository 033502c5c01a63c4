//! Block header/footer protocol (§3, §9)
//!
//! Every block — free or allocated — carries its size and allocated-flag
//! twice: once in the first machine word (the header) and once in the last
//! (the footer). A block is represented here as a byte offset into the
//! managed region plus a shared raw base pointer, not as a Rust reference:
//! the same bytes are alternately a header, a pair of free-list links, and
//! user payload, which `&mut` aliasing rules cannot express.

use core::mem::size_of;
use core::ptr::NonNull;

/// Size of one machine word; headers, footers, and free-list links are all
/// one word wide.
pub const WORD: usize = size_of::<usize>();

/// Minimum block size in bytes (see [`crate::bitmap::QUANTUM`]).
pub const MIN_BLOCK_SIZE: usize = crate::bitmap::QUANTUM;

const ALLOCATED_FLAG: usize = 1;

/// Raw accessor for the block whose header starts at `base + offset`.
///
/// All methods are `unsafe` because they trust `offset` and `size` to
/// describe a block that actually lives within the caller's region; the
/// engine is the only code that constructs `RawBlock`s and it validates
/// offsets before doing so.
#[derive(Clone, Copy)]
pub struct RawBlock {
    base: NonNull<u8>,
    offset: usize,
}

impl RawBlock {
    /// Wraps the block at `offset` bytes from `base`. Does not read memory.
    pub fn at(base: NonNull<u8>, offset: usize) -> Self {
        Self { base, offset }
    }

    #[inline]
    fn word_ptr(&self, word_offset: usize) -> *mut usize {
        unsafe { self.base.as_ptr().add(self.offset + word_offset * WORD).cast::<usize>() }
    }

    /// Byte offset of this block's header from the managed region's base.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Reads the clean (flag-masked) size from the header word.
    pub fn size(&self) -> usize {
        unsafe { self.word_ptr(0).read() & !ALLOCATED_FLAG }
    }

    /// Whether the allocated flag is set in the header.
    pub fn is_allocated(&self) -> bool {
        unsafe { self.word_ptr(0).read() & ALLOCATED_FLAG != 0 }
    }

    /// Writes header and footer for a block of `size` bytes, with the given
    /// allocated flag. `size` must already account for header+footer
    /// overhead and be a power of two.
    pub fn write_header_footer(&self, size: usize, allocated: bool) {
        let word = if allocated { size | ALLOCATED_FLAG } else { size };
        unsafe {
            self.word_ptr(0).write(word);
            self.footer_ptr(size).write(word);
        }
    }

    #[inline]
    fn footer_ptr(&self, size: usize) -> *mut usize {
        unsafe {
            self.base
                .as_ptr()
                .add(self.offset + size - WORD)
                .cast::<usize>()
        }
    }

    /// Marks this block allocated in place (header and footer both).
    pub fn set_allocated(&self, allocated: bool) {
        let size = self.size();
        self.write_header_footer(size, allocated);
    }

    /// Reads the free-list `prev` link (payload word 1). Only meaningful on
    /// a free block.
    pub fn prev_link(&self) -> Option<NonNull<u8>> {
        let raw = unsafe { self.word_ptr(1).read() };
        NonNull::new(raw as *mut u8)
    }

    /// Reads the free-list `next` link (payload word 2). Only meaningful on
    /// a free block.
    pub fn next_link(&self) -> Option<NonNull<u8>> {
        let raw = unsafe { self.word_ptr(2).read() };
        NonNull::new(raw as *mut u8)
    }

    /// Sets the free-list `prev` link.
    pub fn set_prev_link(&self, prev: Option<NonNull<u8>>) {
        let raw = prev.map_or(0, |p| p.as_ptr() as usize);
        unsafe { self.word_ptr(1).write(raw) };
    }

    /// Sets the free-list `next` link.
    pub fn set_next_link(&self, next: Option<NonNull<u8>>) {
        let raw = next.map_or(0, |p| p.as_ptr() as usize);
        unsafe { self.word_ptr(2).write(raw) };
    }

    /// A stable identity for this block, usable as a free-list node handle.
    pub fn as_handle(&self) -> NonNull<u8> {
        unsafe { NonNull::new_unchecked(self.base.as_ptr().add(self.offset)) }
    }

    /// Pointer to the user payload, i.e. one word past the header.
    pub fn user_ptr(&self) -> NonNull<u8> {
        unsafe { NonNull::new_unchecked(self.base.as_ptr().add(self.offset + WORD)) }
    }

    /// Reconstructs the block whose payload starts at `user_ptr`.
    pub fn from_user_ptr(base: NonNull<u8>, user_ptr: NonNull<u8>) -> Option<Self> {
        let delta = (user_ptr.as_ptr() as usize).checked_sub(base.as_ptr() as usize)?;
        let offset = delta.checked_sub(WORD)?;
        Some(Self::at(base, offset))
    }

    /// Reads the footer word of the block immediately preceding this one,
    /// i.e. the word at `base + offset - WORD`. Used for O(1) left-buddy
    /// lookup; returns `None` at the start of the managed region.
    pub fn preceding_footer(&self, base: NonNull<u8>) -> Option<usize> {
        if self.offset == 0 {
            return None;
        }
        Some(unsafe { base.as_ptr().add(self.offset - WORD).cast::<usize>().read() })
    }
}

/// Buddy order of a block at `offset` with `size`: odd means its buddy lies
/// to the left, even means to the right (§4.6).
pub fn buddy_order(offset: usize, size: usize) -> usize {
    offset / size
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_footer_round_trip() {
        let mut mem = vec![0u8; 128];
        let base = NonNull::new(mem.as_mut_ptr()).unwrap();
        let block = RawBlock::at(base, 0);
        block.write_header_footer(64, false);
        assert_eq!(block.size(), 64);
        assert!(!block.is_allocated());

        block.set_allocated(true);
        assert!(block.is_allocated());
        assert_eq!(block.size(), 64);
    }

    #[test]
    fn links_round_trip() {
        let mut mem = vec![0u8; 128];
        let base = NonNull::new(mem.as_mut_ptr()).unwrap();
        let block = RawBlock::at(base, 0);
        block.write_header_footer(64, false);
        assert!(block.prev_link().is_none());

        let fake = NonNull::new(0x1000 as *mut u8).unwrap();
        block.set_next_link(Some(fake));
        assert_eq!(block.next_link(), Some(fake));
    }

    #[test]
    fn user_ptr_and_back() {
        let mut mem = vec![0u8; 128];
        let base = NonNull::new(mem.as_mut_ptr()).unwrap();
        let block = RawBlock::at(base, 32);
        block.write_header_footer(64, true);
        let user = block.user_ptr();
        let recovered = RawBlock::from_user_ptr(base, user).unwrap();
        assert_eq!(recovered.offset(), 32);
        assert_eq!(recovered.size(), 64);
    }

    #[test]
    fn buddy_order_parity() {
        assert_eq!(buddy_order(0, 64) % 2, 0);
        assert_eq!(buddy_order(64, 64) % 2, 1);
        assert_eq!(buddy_order(128, 64) % 2, 0);
    }
}
