//! Typed device buffers with Arc-based sharing

use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::runtime::{DevicePtr, MemoryKind, Runtime};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Typed allocation in one of a device's memory pools
///
/// Cloning a buffer shares the allocation; the memory is released when the
/// last clone is dropped.
pub struct Buffer<R: Runtime, T: Element> {
    inner: Arc<BufferInner<R>>,
    _marker: PhantomData<T>,
}

struct BufferInner<R: Runtime> {
    ptr: u64,
    len: usize,
    size_bytes: usize,
    kind: MemoryKind,
    device: R::Device,
}

impl<R: Runtime, T: Element> Buffer<R, T> {
    /// Allocate `len` zeroed elements of device memory
    pub fn zeros(len: usize, device: &R::Device) -> Result<Self> {
        Self::zeros_in(len, MemoryKind::Device, device)
    }

    /// Allocate `len` zeroed elements from the given pool
    pub fn zeros_in(len: usize, kind: MemoryKind, device: &R::Device) -> Result<Self> {
        let size_bytes = byte_len::<T>(len, kind)?;
        let ptr = R::allocate(size_bytes, kind, device)?;
        let buffer = Self::wrap(ptr, len, size_bytes, kind, device);
        // SAFETY: the range is the allocation just made
        unsafe { R::memset(ptr, 0, size_bytes, device)? };
        Ok(buffer)
    }

    /// Copy `data` into a new device buffer
    pub fn from_slice(data: &[T], device: &R::Device) -> Result<Self> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let ptr = R::allocate(bytes.len(), MemoryKind::Device, device)?;
        let buffer = Self::wrap(ptr, data.len(), bytes.len(), MemoryKind::Device, device);
        R::copy_to_device(bytes, ptr, device)?;
        Ok(buffer)
    }

    fn wrap(ptr: u64, len: usize, size_bytes: usize, kind: MemoryKind, device: &R::Device) -> Self {
        Self {
            inner: Arc::new(BufferInner {
                ptr,
                len,
                size_bytes,
                kind,
                device: device.clone(),
            }),
            _marker: PhantomData,
        }
    }

    /// Raw device address
    #[inline]
    pub fn ptr(&self) -> u64 {
        self.inner.ptr
    }

    /// Number of elements
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len
    }

    /// True when the buffer holds no elements
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.len == 0
    }

    /// Memory pool of the allocation
    #[inline]
    pub fn kind(&self) -> MemoryKind {
        self.inner.kind
    }

    /// Device owning the allocation
    #[inline]
    pub fn device(&self) -> &R::Device {
        &self.inner.device
    }

    /// Size of the elements in bytes
    #[inline]
    pub fn size_in_bytes(&self) -> usize {
        self.inner.size_bytes
    }

    /// Copy the contents back to the host
    pub fn to_vec(&self) -> Result<Vec<T>> {
        let mut result = vec![T::zero(); self.inner.len];
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut result);
        R::copy_from_device(self.inner.ptr, bytes, &self.inner.device)?;
        Ok(result)
    }

    /// Overwrite the contents with `data`, which must have the same length
    pub fn copy_from_slice(&mut self, data: &[T]) -> Result<()> {
        if data.len() != self.inner.len {
            return Err(Error::ShapeMismatch {
                expected: vec![self.inner.len],
                got: vec![data.len()],
            });
        }
        R::copy_to_device(bytemuck::cast_slice(data), self.inner.ptr, &self.inner.device)
    }

    /// Fill every byte with zero
    pub fn fill_zero(&mut self) -> Result<()> {
        // SAFETY: the range is exactly this allocation
        unsafe { R::memset(self.inner.ptr, 0, self.inner.size_bytes, &self.inner.device) }
    }

    /// Kernel view of the elements
    ///
    /// # Safety
    ///
    /// The runtime must expose device memory as host-addressable memory, and
    /// the view must not outlive the buffer.
    #[inline]
    pub(crate) unsafe fn device_ptr(&self) -> DevicePtr<T> {
        unsafe { DevicePtr::from_raw(self.inner.ptr, self.inner.len) }
    }
}

fn byte_len<T: Element>(len: usize, kind: MemoryKind) -> Result<usize> {
    len.checked_mul(T::DTYPE.size_in_bytes())
        .ok_or(Error::OutOfMemory { size: usize::MAX, kind })
}

impl<R: Runtime, T: Element> Clone for Buffer<R, T> {
    /// Clone shares the allocation
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _marker: PhantomData,
        }
    }
}

impl<R: Runtime, T: Element> fmt::Debug for Buffer<R, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("ptr", &format_args!("{:#x}", self.inner.ptr))
            .field("len", &self.inner.len)
            .field("dtype", &T::DTYPE)
            .field("kind", &self.inner.kind)
            .finish()
    }
}

impl<R: Runtime> Drop for BufferInner<R> {
    fn drop(&mut self) {
        // SAFETY: ptr was allocated from this kind on this device and is
        // released exactly once
        if let Err(e) = unsafe { R::deallocate(self.ptr, self.kind, &self.device) } {
            tracing::error!(error = %e, "failed to release buffer");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::cpu::{CpuDevice, CpuRuntime};
    use crate::runtime::{Allocator, Device};

    #[test]
    fn test_from_slice_round_trip() {
        let device = CpuDevice::new();
        let buf = Buffer::<CpuRuntime, f64>::from_slice(&[1.0, 2.0, 3.0], &device).unwrap();
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.to_vec().unwrap(), vec![1.0, 2.0, 3.0]);
        assert!(buf.device().is_same(&device));
    }

    #[test]
    fn test_drop_releases_memory() {
        let device = CpuDevice::new();
        {
            let a = Buffer::<CpuRuntime, f32>::zeros(256, &device).unwrap();
            let b = a.clone();
            drop(a);
            assert_eq!(device.allocator().allocated_bytes(MemoryKind::Device), 1024);
            assert_eq!(b.to_vec().unwrap(), vec![0.0; 256]);
        }
        assert_eq!(device.allocator().allocated_bytes(MemoryKind::Device), 0);
    }

    #[test]
    fn test_copy_from_slice_checks_length() {
        let device = CpuDevice::new();
        let mut buf = Buffer::<CpuRuntime, f64>::zeros_in(2, MemoryKind::Pinned, &device).unwrap();
        assert!(matches!(
            buf.copy_from_slice(&[1.0]),
            Err(Error::ShapeMismatch { .. })
        ));
        buf.copy_from_slice(&[4.0, 5.0]).unwrap();
        buf.fill_zero().unwrap();
        assert_eq!(buf.to_vec().unwrap(), vec![0.0, 0.0]);
    }
}
