//! # buddy-heap
//!
//! A buddy-system memory allocator: segregated free lists keyed by
//! power-of-two size, in-band block headers/footers, and a side-band
//! allocation bitmap for validating pointers passed to `free`.
//!
//! [`engine::BuddyAllocator`] borrows a caller-supplied byte slice and turns
//! it into a heap. [`global`] wraps one such heap in a lock for process-wide
//! use, when a single pointer-free API is more convenient than threading a
//! `BuddyAllocator` through the call graph.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod allocator;
pub mod bitmap;
pub mod block;
pub mod config;
pub mod engine;
pub mod error;
pub mod freelist;
pub mod stats;
pub mod utils;

#[cfg(feature = "std")]
pub mod global;

pub use allocator::traits::{Allocator, BasicMemoryUsage, MemoryUsage, ResetGuard, Resettable};
pub use config::HeapConfig;
pub use engine::BuddyAllocator;
pub use error::{AllocError, AllocErrorKind, AllocResult};
pub use stats::EngineStats;
