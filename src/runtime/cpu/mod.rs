//! CPU runtime implementation
//!
//! The CPU runtime emulates an accelerator on the host. Device memory is
//! heap memory bounded by [`DeviceConfig::memory_limit`], kernels run as
//! grids of teams on a rayon pool, and each team gets a private scratch tile
//! no larger than [`DeviceConfig::shared_memory_per_team`].
//!
//! Launches are only ordered by device-wide barriers. Work that must follow
//! other work is separated from it by a barrier in the issuing code, never
//! by launch order.
//!
//! [`DeviceConfig::memory_limit`]: crate::config::DeviceConfig::memory_limit
//! [`DeviceConfig::shared_memory_per_team`]: crate::config::DeviceConfig::shared_memory_per_team

mod client;
mod device;
pub(crate) mod kernels;
pub(crate) mod launch;
mod memory;
mod potrf;
mod queue;
mod runtime;
mod trtri;

pub use client::{CpuClient, LaunchStats};
pub use device::CpuDevice;
pub use memory::CpuAllocator;
pub use queue::Queue;
pub use runtime::CpuRuntime;

use crate::error::Result;
use crate::runtime::Allocator;

impl CpuClient {
    /// Enqueue a memset of `count` bytes at `ptr` on `queue`
    ///
    /// # Safety
    ///
    /// `ptr..ptr + count` must stay inside a live allocation of this client's
    /// device until the queue has executed the job.
    pub unsafe fn memset_async(&self, ptr: u64, value: u8, count: usize, queue: &Queue) -> Result<()> {
        let allocator = self.device.allocator().clone();
        queue.submit(move || {
            // SAFETY: guaranteed by the caller
            unsafe { allocator.memset(ptr, value, count) }
        })
    }
}
