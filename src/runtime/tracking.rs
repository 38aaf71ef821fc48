//! Allocation tracking for diagnosing mismatched allocate/free pairs
//!
//! Tracking is an injectable collaborator: allocators call into an
//! [`AllocationTracker`] only when one is installed, so the untracked path
//! pays nothing. [`PointerRegistry`] is the standard implementation, keeping
//! one live-pointer map per memory kind.

use super::MemoryKind;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt::Debug;

/// Observer of allocator activity
pub trait AllocationTracker: Send + Sync + Debug {
    /// Record a successful allocation
    fn on_allocate(&self, ptr: u64, size_bytes: usize, kind: MemoryKind);

    /// Record a free; returns `false` if `ptr` is not a live allocation of `kind`
    fn on_free(&self, ptr: u64, kind: MemoryKind) -> bool;
}

#[derive(Debug, Default)]
struct RegistryState {
    live: [HashMap<u64, usize>; 3],
    total_allocations: usize,
    rejected_frees: usize,
}

/// Live-pointer maps per memory kind
#[derive(Debug, Default)]
pub struct PointerRegistry {
    state: Mutex<RegistryState>,
}

impl PointerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live allocations of a kind
    pub fn live_count(&self, kind: MemoryKind) -> usize {
        self.state.lock().live[kind.index()].len()
    }

    /// Bytes held by live allocations of a kind
    pub fn live_bytes(&self, kind: MemoryKind) -> usize {
        self.state.lock().live[kind.index()].values().sum()
    }

    /// Allocations recorded since creation, across all kinds
    pub fn total_allocations(&self) -> usize {
        self.state.lock().total_allocations
    }

    /// Frees rejected because the pointer was unknown
    pub fn rejected_frees(&self) -> usize {
        self.state.lock().rejected_frees
    }
}

impl AllocationTracker for PointerRegistry {
    fn on_allocate(&self, ptr: u64, size_bytes: usize, kind: MemoryKind) {
        let mut state = self.state.lock();
        state.live[kind.index()].insert(ptr, size_bytes);
        state.total_allocations += 1;
    }

    fn on_free(&self, ptr: u64, kind: MemoryKind) -> bool {
        let mut state = self.state.lock();
        if state.live[kind.index()].remove(&ptr).is_some() {
            true
        } else {
            state.rejected_frees += 1;
            false
        }
    }
}
