//! CPU runtime implementation

use super::client::CpuClient;
use super::device::CpuDevice;
use super::memory::CpuAllocator;
use crate::error::{Error, Result};
use crate::runtime::{Allocator, MemoryKind, Runtime};

/// CPU compute runtime
///
/// Emulates an accelerator on the host: device memory is heap memory with
/// a configured capacity, and kernels run as teams on a worker pool.
#[derive(Clone, Debug, Default)]
pub struct CpuRuntime;

impl Runtime for CpuRuntime {
    type Device = CpuDevice;
    type Client = CpuClient;
    type Allocator = CpuAllocator;

    fn name() -> &'static str {
        "cpu"
    }

    fn allocate(size_bytes: usize, kind: MemoryKind, device: &Self::Device) -> Result<u64> {
        device.allocator().allocate(size_bytes, kind)
    }

    unsafe fn deallocate(ptr: u64, kind: MemoryKind, device: &Self::Device) -> Result<()> {
        unsafe { device.allocator().free(ptr, kind) }
    }

    unsafe fn memset(ptr: u64, value: u8, count: usize, device: &Self::Device) -> Result<()> {
        unsafe { device.allocator().memset(ptr, value, count) }
    }

    fn copy_to_device(src: &[u8], dst: u64, _device: &Self::Device) -> Result<()> {
        if src.is_empty() {
            return Ok(());
        }
        if dst == 0 {
            return Err(Error::InvalidPointer {
                ptr: dst,
                kind: MemoryKind::Device,
            });
        }

        unsafe {
            std::ptr::copy_nonoverlapping(src.as_ptr(), dst as *mut u8, src.len());
        }
        Ok(())
    }

    fn copy_from_device(src: u64, dst: &mut [u8], _device: &Self::Device) -> Result<()> {
        if dst.is_empty() {
            return Ok(());
        }
        if src == 0 {
            return Err(Error::InvalidPointer {
                ptr: src,
                kind: MemoryKind::Device,
            });
        }

        unsafe {
            std::ptr::copy_nonoverlapping(src as *const u8, dst.as_mut_ptr(), dst.len());
        }
        Ok(())
    }

    fn default_device() -> Self::Device {
        CpuDevice::new()
    }

    fn default_client(device: &Self::Device) -> Self::Client {
        CpuClient::new(device.clone())
    }
}
