//! Allocator capability traits
//!
//! [`traits::Allocator`] and its companions (`MemoryUsage`, `Resettable`)
//! are the contracts [`crate::engine::BuddyAllocator`] implements.

pub mod traits;

pub use crate::error::{AllocError, AllocResult};
pub use traits::{Allocator, BasicMemoryUsage, MemoryUsage, ResetGuard, Resettable};
