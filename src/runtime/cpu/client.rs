//! CPU client implementation

use super::device::CpuDevice;
use super::memory::CpuAllocator;
use super::runtime::CpuRuntime;
use crate::error::Result;
use crate::runtime::RuntimeClient;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters of work dispatched through a client
#[derive(Debug, Default)]
pub struct LaunchStats {
    launches: AtomicU64,
    barriers: AtomicU64,
}

impl LaunchStats {
    /// Kernel launches accepted so far
    pub fn launches(&self) -> u64 {
        self.launches.load(Ordering::Acquire)
    }

    /// Device-wide barriers executed so far
    pub fn barriers(&self) -> u64 {
        self.barriers.load(Ordering::Acquire)
    }

    pub(crate) fn record_launch(&self) {
        self.launches.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn record_barrier(&self) {
        self.barriers.fetch_add(1, Ordering::AcqRel);
    }
}

/// CPU client for operation dispatch
#[derive(Clone, Debug)]
pub struct CpuClient {
    pub(crate) device: CpuDevice,
    stats: Arc<LaunchStats>,
}

impl CpuClient {
    /// Create a new CPU client
    pub fn new(device: CpuDevice) -> Self {
        Self {
            device,
            stats: Arc::new(LaunchStats::default()),
        }
    }

    /// Launch counters shared by every clone of this client
    pub fn stats(&self) -> &LaunchStats {
        &self.stats
    }
}

impl RuntimeClient<CpuRuntime> for CpuClient {
    fn device(&self) -> &CpuDevice {
        &self.device
    }

    fn synchronize(&self) -> Result<()> {
        // Launches complete at the barrier that ends each synchronous call
        Ok(())
    }

    fn allocator(&self) -> &CpuAllocator {
        self.device.allocator()
    }
}
