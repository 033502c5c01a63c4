//! Heap configuration presets (§9)

/// Behavioral knobs for a heap, independent of the core split/coalesce
/// algorithm, which never varies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapConfig {
    /// Byte pattern written over freshly allocated payloads before handing
    /// them to the caller; `None` leaves memory as the pool left it.
    pub alloc_fill: Option<u8>,
    /// Byte pattern written over a block's payload the instant it is freed,
    /// to turn use-after-free into an obvious garbage read.
    pub free_fill: Option<u8>,
    /// Whether [`crate::engine::BuddyAllocator::free_list_occupancy`] (under
    /// the `stats` feature) actually walks the free lists to report
    /// per-exponent counts, or skips the work and reports all zeros.
    /// `used_bytes`/`allocated_blocks` are tracked unconditionally either
    /// way — they're a few integer additions, not worth gating.
    pub track_stats: bool,
}

impl HeapConfig {
    /// No fill patterns, counters on: lowest per-call overhead.
    pub const fn production() -> Self {
        Self { alloc_fill: None, free_fill: None, track_stats: true }
    }

    /// `0xAA` on alloc, `0xDD` on free, to surface uninitialized reads and
    /// use-after-free in testing.
    pub const fn debug() -> Self {
        Self { alloc_fill: Some(0xAA), free_fill: Some(0xDD), track_stats: true }
    }
}

impl Default for HeapConfig {
    #[cfg(debug_assertions)]
    fn default() -> Self {
        Self::debug()
    }

    #[cfg(not(debug_assertions))]
    fn default() -> Self {
        Self::production()
    }
}
