//! CPU allocator emulating device, host and pinned memory pools

use crate::error::{Error, Result};
use crate::runtime::{
    ALLOCATION_ALIGN, AllocationTracker, Allocator, MemInfo, MemoryKind, round_up_request,
};
use std::alloc::{Layout, alloc_zeroed, dealloc};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{trace, warn};

/// Bytes reserved in front of every allocation for its header
const HEADER_BYTES: usize = ALLOCATION_ALIGN;

const HEADER_MAGIC: u64 = 0x626c_6b74_7269_a110;

/// Header written in front of every allocation
#[repr(C)]
#[derive(Copy, Clone, Debug)]
struct AllocationHeader {
    magic: u64,
    kind: u64,
    size: u64,
}

#[derive(Debug)]
struct PoolState {
    capacity: usize,
    in_use: [AtomicUsize; 3],
    tracker: Option<Arc<dyn AllocationTracker>>,
}

/// Allocator backing the CPU runtime
///
/// Device memory is bounded by the configured capacity; host and pinned
/// memory are only bounded by the system allocator. Every block carries a
/// header recording its pool and size, so frees never need the size from
/// the caller and a pointer returned to the wrong pool is detected.
#[derive(Clone, Debug)]
pub struct CpuAllocator {
    state: Arc<PoolState>,
}

impl CpuAllocator {
    /// Create an allocator with `capacity` bytes of device memory
    pub fn new(capacity: usize) -> Self {
        Self::build(capacity, None)
    }

    /// Create an allocator reporting to `tracker`
    pub fn with_tracker(capacity: usize, tracker: Arc<dyn AllocationTracker>) -> Self {
        Self::build(capacity, Some(tracker))
    }

    fn build(capacity: usize, tracker: Option<Arc<dyn AllocationTracker>>) -> Self {
        Self {
            state: Arc::new(PoolState {
                capacity,
                in_use: Default::default(),
                tracker,
            }),
        }
    }

    /// Installed allocation tracker, if any
    pub fn tracker(&self) -> Option<&Arc<dyn AllocationTracker>> {
        self.state.tracker.as_ref()
    }

    /// Device memory capacity in bytes
    pub fn capacity(&self) -> usize {
        self.state.capacity
    }

    fn reserve(&self, size: usize, kind: MemoryKind) -> Result<()> {
        let counter = &self.state.in_use[kind.index()];
        if kind != MemoryKind::Device {
            counter.fetch_add(size, Ordering::Relaxed);
            return Ok(());
        }

        let mut current = counter.load(Ordering::Relaxed);
        loop {
            let next = match current.checked_add(size) {
                Some(next) if next <= self.state.capacity => next,
                _ => return Err(Error::OutOfMemory { size, kind }),
            };
            match counter.compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return Ok(()),
                Err(observed) => current = observed,
            }
        }
    }

    fn release(&self, size: usize, kind: MemoryKind) {
        self.state.in_use[kind.index()].fetch_sub(size, Ordering::AcqRel);
    }
}

impl Allocator for CpuAllocator {
    fn allocate(&self, size_bytes: usize, kind: MemoryKind) -> Result<u64> {
        let size = round_up_request(size_bytes);
        let layout = size
            .checked_add(HEADER_BYTES)
            .and_then(|total| Layout::from_size_align(total, ALLOCATION_ALIGN).ok())
            .ok_or(Error::OutOfMemory { size, kind })?;

        self.reserve(size, kind)?;

        // SAFETY: layout has a non-zero size
        let base = unsafe { alloc_zeroed(layout) };
        if base.is_null() {
            self.release(size, kind);
            return Err(Error::OutOfMemory { size, kind });
        }

        let header = AllocationHeader {
            magic: HEADER_MAGIC,
            kind: kind.index() as u64,
            size: size as u64,
        };
        // SAFETY: base is aligned to 64 and the header fits in HEADER_BYTES
        unsafe { (base as *mut AllocationHeader).write(header) };

        let ptr = base as u64 + HEADER_BYTES as u64;
        if let Some(tracker) = &self.state.tracker {
            tracker.on_allocate(ptr, size, kind);
        }
        trace!(ptr = format_args!("{:#x}", ptr), size, %kind, "allocate");
        Ok(ptr)
    }

    unsafe fn free(&self, ptr: u64, kind: MemoryKind) -> Result<()> {
        if ptr == 0 {
            return Ok(());
        }

        if let Some(tracker) = &self.state.tracker {
            if !tracker.on_free(ptr, kind) {
                warn!(
                    ptr = format_args!("{:#x}", ptr),
                    %kind,
                    "free of a pointer that is not a live allocation of this pool"
                );
                return Err(Error::InvalidPointer { ptr, kind });
            }
        }

        if ptr < HEADER_BYTES as u64 || ptr % ALLOCATION_ALIGN as u64 != 0 {
            return Err(Error::InvalidPointer { ptr, kind });
        }
        let base = (ptr - HEADER_BYTES as u64) as *mut u8;
        // SAFETY: the caller guarantees ptr came from this allocator
        let header = unsafe { (base as *const AllocationHeader).read() };
        if header.magic != HEADER_MAGIC || header.kind != kind.index() as u64 {
            warn!(
                ptr = format_args!("{:#x}", ptr),
                %kind,
                "allocation header does not match the pool it is freed to"
            );
            return Err(Error::InvalidPointer { ptr, kind });
        }

        let size = header.size as usize;
        let layout = Layout::from_size_align(size + HEADER_BYTES, ALLOCATION_ALIGN)
            .map_err(|e| Error::Internal(format!("corrupt allocation header: {}", e)))?;
        // SAFETY: header was valid, so base/layout match the original allocation
        unsafe {
            (base as *mut AllocationHeader).write(AllocationHeader {
                magic: 0,
                kind: 0,
                size: 0,
            });
            dealloc(base, layout);
        }
        self.release(size, kind);
        trace!(ptr = format_args!("{:#x}", ptr), size, %kind, "free");
        Ok(())
    }

    unsafe fn memset(&self, ptr: u64, value: u8, count: usize) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        if ptr == 0 {
            return Err(Error::InvalidPointer {
                ptr,
                kind: MemoryKind::Device,
            });
        }
        // SAFETY: the caller guarantees the range lies inside a live allocation
        unsafe { std::ptr::write_bytes(ptr as *mut u8, value, count) };
        Ok(())
    }

    fn mem_info(&self) -> MemInfo {
        let used = self.allocated_bytes(MemoryKind::Device);
        MemInfo {
            free: self.state.capacity.saturating_sub(used),
            total: self.state.capacity,
        }
    }

    fn allocated_bytes(&self, kind: MemoryKind) -> usize {
        self.state.in_use[kind.index()].load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::PointerRegistry;

    #[test]
    fn test_allocation_is_aligned_and_zeroed() {
        let alloc = CpuAllocator::new(1 << 20);
        let ptr = alloc.allocate(100, MemoryKind::Device).unwrap();
        assert_eq!(ptr % ALLOCATION_ALIGN as u64, 0);
        let bytes = unsafe { std::slice::from_raw_parts(ptr as *const u8, 100) };
        assert!(bytes.iter().all(|&b| b == 0));
        assert_eq!(alloc.allocated_bytes(MemoryKind::Device), 100);
        unsafe { alloc.free(ptr, MemoryKind::Device).unwrap() };
        assert_eq!(alloc.allocated_bytes(MemoryKind::Device), 0);
    }

    #[test]
    fn test_zero_size_request_is_usable() {
        let alloc = CpuAllocator::new(1 << 20);
        let ptr = alloc.allocate(0, MemoryKind::Host).unwrap();
        assert_ne!(ptr, 0);
        unsafe { alloc.memset(ptr, 0xff, 16).unwrap() };
        assert_eq!(alloc.allocated_bytes(MemoryKind::Host), 16);
        unsafe { alloc.free(ptr, MemoryKind::Host).unwrap() };
    }

    #[test]
    fn test_device_capacity_is_enforced() {
        let alloc = CpuAllocator::new(1024);
        let a = alloc.allocate(1000, MemoryKind::Device).unwrap();
        let err = alloc.allocate(100, MemoryKind::Device).unwrap_err();
        assert!(matches!(
            err,
            Error::OutOfMemory {
                size: 100,
                kind: MemoryKind::Device
            }
        ));
        assert_eq!(alloc.mem_info().free, 24);

        // Host memory is not bounded by the device capacity
        let h = alloc.allocate(4096, MemoryKind::Host).unwrap();
        unsafe {
            alloc.free(h, MemoryKind::Host).unwrap();
            alloc.free(a, MemoryKind::Device).unwrap();
        }
        assert_eq!(alloc.mem_info().free, 1024);
    }

    #[test]
    fn test_free_null_is_noop() {
        let alloc = CpuAllocator::new(1024);
        unsafe { alloc.free(0, MemoryKind::Pinned).unwrap() };
    }

    #[test]
    fn test_kind_mismatch_is_rejected() {
        let alloc = CpuAllocator::new(1 << 20);
        let ptr = alloc.allocate(64, MemoryKind::Pinned).unwrap();
        let err = unsafe { alloc.free(ptr, MemoryKind::Host) }.unwrap_err();
        assert!(matches!(err, Error::InvalidPointer { .. }));
        unsafe { alloc.free(ptr, MemoryKind::Pinned).unwrap() };
    }

    #[test]
    fn test_tracker_rejects_unknown_pointer() {
        let registry = Arc::new(PointerRegistry::new());
        let alloc = CpuAllocator::with_tracker(1 << 20, registry.clone());

        let ptr = alloc.allocate(32, MemoryKind::Device).unwrap();
        assert_eq!(registry.live_count(MemoryKind::Device), 1);

        let bogus = 0xdead_0000u64;
        let err = unsafe { alloc.free(bogus, MemoryKind::Device) }.unwrap_err();
        assert!(matches!(err, Error::InvalidPointer { ptr, .. } if ptr == bogus));
        assert_eq!(registry.rejected_frees(), 1);

        unsafe { alloc.free(ptr, MemoryKind::Device).unwrap() };
        assert_eq!(registry.live_count(MemoryKind::Device), 0);
    }
}
