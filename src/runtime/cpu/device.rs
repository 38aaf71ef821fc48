//! CPU device implementation

use super::memory::CpuAllocator;
use crate::config::DeviceConfig;
use crate::error::Result;
use crate::runtime::{AllocationTracker, Device, PointerRegistry};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[cfg(feature = "rayon")]
use crate::error::Error;

static NEXT_DEVICE_ID: AtomicUsize = AtomicUsize::new(0);

/// Emulated device backed by host memory and a worker pool
///
/// Cloning a device shares its memory pool and workers.
#[derive(Clone, Debug)]
pub struct CpuDevice {
    id: usize,
    allocator: CpuAllocator,
    config: Arc<DeviceConfig>,
    #[cfg(feature = "rayon")]
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl Default for CpuDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuDevice {
    /// Create a device with the default configuration
    ///
    /// Teams execute on the global rayon pool.
    pub fn new() -> Self {
        let config = DeviceConfig::default();
        let allocator = make_allocator(&config, None);
        Self {
            id: NEXT_DEVICE_ID.fetch_add(1, Ordering::Relaxed),
            allocator,
            config: Arc::new(config),
            #[cfg(feature = "rayon")]
            pool: None,
        }
    }

    /// Create a device with an explicit configuration
    pub fn with_config(config: DeviceConfig) -> Result<Self> {
        Self::build(config, None)
    }

    /// Create a device whose allocator reports to `tracker`
    pub fn with_tracker(config: DeviceConfig, tracker: Arc<dyn AllocationTracker>) -> Result<Self> {
        Self::build(config, Some(tracker))
    }

    fn build(config: DeviceConfig, tracker: Option<Arc<dyn AllocationTracker>>) -> Result<Self> {
        let id = NEXT_DEVICE_ID.fetch_add(1, Ordering::Relaxed);
        let allocator = make_allocator(&config, tracker);

        #[cfg(feature = "rayon")]
        let pool = match config.num_threads {
            Some(threads) => Some(Arc::new(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(move |i| format!("blocktri-dev{}-{}", id, i))
                    .build()
                    .map_err(|e| Error::Internal(format!("failed to start device workers: {}", e)))?,
            )),
            None => None,
        };

        tracing::debug!(
            device = id,
            memory_limit = config.memory_limit,
            shared_memory_per_team = config.shared_memory_per_team,
            track_allocations = config.track_allocations,
            "created cpu device"
        );

        Ok(Self {
            id,
            allocator,
            config: Arc::new(config),
            #[cfg(feature = "rayon")]
            pool,
        })
    }

    /// Device configuration
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Allocator of this device
    pub fn allocator(&self) -> &CpuAllocator {
        &self.allocator
    }

    /// Run `f` on this device's workers, or the global pool without a dedicated one
    #[cfg(feature = "rayon")]
    pub(crate) fn install<R: Send>(&self, f: impl FnOnce() -> R + Send) -> R {
        match &self.pool {
            Some(pool) => pool.install(f),
            None => f(),
        }
    }
}

fn make_allocator(
    config: &DeviceConfig,
    tracker: Option<Arc<dyn AllocationTracker>>,
) -> CpuAllocator {
    match tracker {
        Some(tracker) => CpuAllocator::with_tracker(config.memory_limit, tracker),
        None if config.track_allocations => {
            CpuAllocator::with_tracker(config.memory_limit, Arc::new(PointerRegistry::new()))
        }
        None => CpuAllocator::new(config.memory_limit),
    }
}

impl Device for CpuDevice {
    fn id(&self) -> usize {
        self.id
    }

    fn name(&self) -> String {
        format!("cpu:{}", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{Allocator, MemoryKind};

    #[test]
    fn test_devices_are_distinct() {
        let a = CpuDevice::new();
        let b = CpuDevice::new();
        assert!(!a.is_same(&b));
        assert!(a.is_same(&a.clone()));
    }

    #[test]
    fn test_config_reaches_allocator() {
        let device = CpuDevice::with_config(
            DeviceConfig::default()
                .with_memory_limit(4096)
                .with_num_threads(2)
                .with_allocation_tracking(true),
        )
        .unwrap();
        assert_eq!(device.allocator().mem_info().total, 4096);
        assert!(device.allocator().tracker().is_some());
        assert!(device.allocator().allocate(8192, MemoryKind::Device).is_err());
    }
}
