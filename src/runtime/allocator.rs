//! Memory allocator trait and shared allocation constants
//!
//! The `Allocator` trait is the memory-management façade every backend
//! provides: device, host-pageable and host-pinned allocation, release,
//! memset and capacity queries.

use crate::dtype::DType;
use crate::error::Result;
use std::fmt;

/// Alignment of every allocation (one cache line, AVX-512 friendly)
pub const ALLOCATION_ALIGN: usize = 64;

/// Smallest allocation handed out; zero-byte requests are rounded up to it
pub const MIN_ALLOCATION_BYTES: usize = DType::LARGEST.size_in_bytes();

/// Memory pool an allocation belongs to
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MemoryKind {
    /// Accelerator global memory
    Device,
    /// Pageable host memory
    Host,
    /// Page-locked host memory for fast transfers
    Pinned,
}

impl MemoryKind {
    /// All memory kinds, in index order
    pub const ALL: [MemoryKind; 3] = [MemoryKind::Device, MemoryKind::Host, MemoryKind::Pinned];

    /// Dense index for per-kind bookkeeping tables
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Self::Device => 0,
            Self::Host => 1,
            Self::Pinned => 2,
        }
    }
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Device => "device",
            Self::Host => "host",
            Self::Pinned => "pinned",
        };
        write!(f, "{}", name)
    }
}

/// Free and total device memory in bytes
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MemInfo {
    /// Bytes still available for device allocations
    pub free: usize,
    /// Device memory capacity
    pub total: usize,
}

/// Round an allocation request up to the minimal non-zero size
#[inline]
pub const fn round_up_request(size_bytes: usize) -> usize {
    if size_bytes == 0 {
        MIN_ALLOCATION_BYTES
    } else {
        size_bytes
    }
}

/// Memory allocator trait for runtime backends
///
/// Pointers are device addresses carried as `u64` (for the CPU runtime, a
/// host address). Allocation failures are reported as
/// `Error::OutOfMemory` and never retried.
pub trait Allocator: Clone + Send + Sync {
    /// Allocate `size_bytes` from the given pool
    ///
    /// Zero-size requests are rounded up to [`MIN_ALLOCATION_BYTES`], so the
    /// returned pointer is always non-null and usable.
    fn allocate(&self, size_bytes: usize, kind: MemoryKind) -> Result<u64>;

    /// Release memory obtained from [`Allocator::allocate`]
    ///
    /// Freeing a null pointer is a no-op.
    ///
    /// # Safety
    ///
    /// Unless allocation tracking is enabled, `ptr` must have been returned by
    /// `allocate` on this allocator with the same `kind` and not freed since.
    /// With tracking enabled, foreign pointers are reported and rejected with
    /// `Error::InvalidPointer`.
    unsafe fn free(&self, ptr: u64, kind: MemoryKind) -> Result<()>;

    /// Fill `count` bytes starting at `ptr` with `value`
    ///
    /// # Safety
    ///
    /// `ptr..ptr + count` must lie inside a live allocation.
    unsafe fn memset(&self, ptr: u64, value: u8, count: usize) -> Result<()>;

    /// Free and total device memory
    fn mem_info(&self) -> MemInfo;

    /// Bytes currently allocated from the given pool
    fn allocated_bytes(&self, kind: MemoryKind) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_up_request() {
        assert_eq!(round_up_request(0), 16);
        assert_eq!(round_up_request(1), 1);
        assert_eq!(round_up_request(4096), 4096);
    }

    #[test]
    fn test_kind_index_is_dense() {
        for (i, kind) in MemoryKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
        assert_eq!(MemoryKind::Pinned.to_string(), "pinned");
    }
}
