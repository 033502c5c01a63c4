//! Usage statistics (§4.7)

/// Point-in-time usage snapshot for a [`crate::engine::BuddyAllocator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineStats {
    /// Bytes currently handed out to callers, including header/footer overhead.
    pub used_bytes: usize,
    /// Total bytes available for allocation (excludes the bitmap prefix).
    pub total_bytes: usize,
    /// Number of live (unfreed) allocations.
    pub allocated_blocks: usize,
}

impl EngineStats {
    /// Bytes not currently allocated.
    pub fn free_bytes(&self) -> usize {
        self.total_bytes.saturating_sub(self.used_bytes)
    }

    /// Fraction of `total_bytes` currently in use, in `0.0..=100.0`.
    pub fn usage_percent(&self) -> f32 {
        if self.total_bytes == 0 {
            0.0
        } else {
            (self.used_bytes as f32 / self.total_bytes as f32) * 100.0
        }
    }
}

impl core::fmt::Display for EngineStats {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{} / {} bytes used ({:.1}%), {} live allocations",
            self.used_bytes,
            self.total_bytes,
            self.usage_percent(),
            self.allocated_blocks
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_percent_of_empty_is_zero() {
        let stats = EngineStats::default();
        assert_eq!(stats.usage_percent(), 0.0);
    }

    #[test]
    fn free_bytes_is_total_minus_used() {
        let stats = EngineStats { used_bytes: 64, total_bytes: 256, allocated_blocks: 1 };
        assert_eq!(stats.free_bytes(), 192);
        assert!((stats.usage_percent() - 25.0).abs() < 0.01);
    }
}
