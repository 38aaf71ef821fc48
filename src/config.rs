//! Device configuration
//!
//! A [`DeviceConfig`] fixes the resources of a device when it is created:
//! the device memory capacity, the worker threads executing teams, the scratch
//! capacity of a single team, and whether allocations are tracked.
//!
//! # Environment Variables
//!
//! - `BLOCKTRI_DEVICE_MEMORY`: device memory capacity in bytes
//! - `BLOCKTRI_NUM_THREADS`: worker threads (0 = one per core)
//! - `BLOCKTRI_SHARED_MEMORY`: scratch bytes available to one team
//! - `BLOCKTRI_DEBUG_MEMORY`: `1`/`true` to track every allocation

use crate::error::{Error, Result};

/// Default device memory capacity (8 GiB)
pub const DEFAULT_DEVICE_MEMORY: usize = 8 << 30;

/// Default scratch capacity of one team (48 KiB)
pub const DEFAULT_SHARED_MEMORY: usize = 48 << 10;

const ENV_DEVICE_MEMORY: &str = "BLOCKTRI_DEVICE_MEMORY";
const ENV_NUM_THREADS: &str = "BLOCKTRI_NUM_THREADS";
const ENV_SHARED_MEMORY: &str = "BLOCKTRI_SHARED_MEMORY";
const ENV_DEBUG_MEMORY: &str = "BLOCKTRI_DEBUG_MEMORY";

/// Resources of an emulated device
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Device memory capacity in bytes
    pub memory_limit: usize,
    /// Worker threads executing teams; `None` uses one per core
    pub num_threads: Option<usize>,
    /// Scratch bytes available to one team
    pub shared_memory_per_team: usize,
    /// Track every allocation and reject mismatched frees
    pub track_allocations: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            memory_limit: DEFAULT_DEVICE_MEMORY,
            num_threads: None,
            shared_memory_per_team: DEFAULT_SHARED_MEMORY,
            track_allocations: cfg!(feature = "debug-memory"),
        }
    }
}

impl DeviceConfig {
    /// Default configuration overridden by `BLOCKTRI_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Default configuration overridden by values from `lookup`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(v) = lookup(ENV_DEVICE_MEMORY) {
            config.memory_limit = parse_usize(ENV_DEVICE_MEMORY, &v)?;
        }
        if let Some(v) = lookup(ENV_NUM_THREADS) {
            let threads = parse_usize(ENV_NUM_THREADS, &v)?;
            config.num_threads = (threads > 0).then_some(threads);
        }
        if let Some(v) = lookup(ENV_SHARED_MEMORY) {
            config.shared_memory_per_team = parse_usize(ENV_SHARED_MEMORY, &v)?;
        }
        if let Some(v) = lookup(ENV_DEBUG_MEMORY) {
            config.track_allocations = match v.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "on" | "yes" => true,
                "0" | "false" | "off" | "no" => false,
                other => {
                    return Err(Error::InvalidConfig {
                        key: ENV_DEBUG_MEMORY,
                        reason: format!("expected a boolean, got '{}'", other),
                    });
                }
            };
        }

        Ok(config)
    }

    /// Set the device memory capacity
    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.memory_limit = bytes;
        self
    }

    /// Set the number of worker threads
    pub fn with_num_threads(mut self, threads: usize) -> Self {
        self.num_threads = Some(threads);
        self
    }

    /// Set the scratch capacity of one team
    pub fn with_shared_memory_per_team(mut self, bytes: usize) -> Self {
        self.shared_memory_per_team = bytes;
        self
    }

    /// Enable or disable allocation tracking
    pub fn with_allocation_tracking(mut self, enabled: bool) -> Self {
        self.track_allocations = enabled;
        self
    }
}

fn parse_usize(key: &'static str, value: &str) -> Result<usize> {
    value.trim().parse::<usize>().map_err(|e| Error::InvalidConfig {
        key,
        reason: format!("'{}' is not a byte count: {}", value, e),
    })
}
