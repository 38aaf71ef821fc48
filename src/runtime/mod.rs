//! Runtime backends for kernel execution
//!
//! This module defines the `Runtime` trait and the CPU backend, which
//! emulates the accelerator execution model on a thread pool.
//!
//! # Architecture
//!
//! ```text
//! Runtime (backend identity)
//! ├── Device (memory pool + execution resources)
//! ├── Client (dispatches kernel launches, owns launch statistics)
//! ├── Allocator (device / host / pinned memory)
//! └── TeamKernel (team-tiled kernels launched by a client)
//! ```

mod allocator;
pub mod cpu;
mod launch;
mod tracking;

pub use allocator::{
    ALLOCATION_ALIGN, Allocator, MIN_ALLOCATION_BYTES, MemInfo, MemoryKind, round_up_request,
};
pub use launch::{DevicePtr, LaunchConfig, Team, TeamKernel};
pub use tracking::{AllocationTracker, PointerRegistry};

use crate::error::Result;

/// Core trait for compute backends
///
/// `Runtime` abstracts over compute devices. It uses static dispatch via
/// generics, so buffers and algorithms carry no dynamic backend cost.
pub trait Runtime: Clone + Send + Sync + 'static {
    /// Device identifier type
    type Device: Device;

    /// Client for dispatching operations
    type Client: RuntimeClient<Self>;

    /// Memory allocator type
    type Allocator: Allocator;

    /// Human-readable name of this runtime
    fn name() -> &'static str;

    /// Allocate memory of the given kind on a device
    ///
    /// Returns `Err(OutOfMemory)` if allocation fails.
    fn allocate(size_bytes: usize, kind: MemoryKind, device: &Self::Device) -> Result<u64>;

    /// Release memory obtained from [`Runtime::allocate`]
    ///
    /// # Safety
    ///
    /// See [`Allocator::free`].
    unsafe fn deallocate(ptr: u64, kind: MemoryKind, device: &Self::Device) -> Result<()>;

    /// Fill `count` bytes at `ptr` with `value`
    ///
    /// # Safety
    ///
    /// See [`Allocator::memset`].
    unsafe fn memset(ptr: u64, value: u8, count: usize, device: &Self::Device) -> Result<()>;

    /// Copy data from host to device
    fn copy_to_device(src: &[u8], dst: u64, device: &Self::Device) -> Result<()>;

    /// Copy data from device to host
    fn copy_from_device(src: u64, dst: &mut [u8], device: &Self::Device) -> Result<()>;

    /// Get the default device
    fn default_device() -> Self::Device;

    /// Get the default client for a device
    fn default_client(device: &Self::Device) -> Self::Client;
}

/// Trait for device identification
pub trait Device: Clone + Send + Sync + 'static {
    /// Unique identifier for this device
    fn id(&self) -> usize;

    /// Check if two devices are the same
    fn is_same(&self, other: &Self) -> bool {
        self.id() == other.id()
    }

    /// Human-readable name
    fn name(&self) -> String {
        format!("Device({})", self.id())
    }
}

/// Trait for runtime clients that handle operation dispatch
pub trait RuntimeClient<R: Runtime>: Clone + Send + Sync {
    /// Get the device this client operates on
    fn device(&self) -> &R::Device;

    /// Synchronize: wait for all pending operations to complete
    fn synchronize(&self) -> Result<()>;

    /// Get the allocator for this client
    fn allocator(&self) -> &R::Allocator;
}
