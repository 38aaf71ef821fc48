//! Team-tiled kernel execution model
//!
//! Kernels are written against an accelerator model: a launch is a grid of
//! independent teams, each a fixed number of workers sharing a private
//! scratch tile. Teams communicate only through global memory, and global
//! writes of one launch become visible to the next launch only after a
//! device-wide barrier.
//!
//! ```text
//! launch(kernel)
//! ├── team 0   workers 0..size   scratch[0]
//! ├── team 1   workers 0..size   scratch[1]
//! └── ...
//! barrier()    every team of every pending launch has finished
//! ```
//!
//! A backend executes the workers of a team as sequential sweeps, so the
//! boundary between two sweeps is an intra-team barrier. Kernels mark those
//! boundaries with [`Team::barrier`].

use crate::dtype::Element;
use std::marker::PhantomData;
use std::ops::Range;

/// Launch geometry of a team kernel
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LaunchConfig {
    /// Number of teams in the grid
    pub teams: usize,
    /// Workers per team
    pub team_size: usize,
    /// Scratch elements per team
    pub scratch_elems: usize,
}

impl LaunchConfig {
    /// Create a launch configuration
    pub const fn new(teams: usize, team_size: usize, scratch_elems: usize) -> Self {
        Self {
            teams,
            team_size,
            scratch_elems,
        }
    }

    /// Scratch bytes requested per team for element type `T`
    pub fn scratch_bytes<T: Element>(&self) -> usize {
        self.scratch_elems * T::DTYPE.size_in_bytes()
    }

    /// Scratch elements required by the whole grid
    pub fn arena_elems(&self) -> usize {
        self.teams * self.scratch_elems
    }
}

/// Identity of one team inside a launch
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Team {
    id: usize,
    size: usize,
}

impl Team {
    /// Create a team handle
    #[inline]
    pub const fn new(id: usize, size: usize) -> Self {
        Self { id, size }
    }

    /// Team index in the grid
    #[inline]
    pub const fn id(&self) -> usize {
        self.id
    }

    /// Number of workers
    #[inline]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Worker indices of this team
    #[inline]
    pub fn workers(&self) -> Range<usize> {
        0..self.size
    }

    /// Intra-team barrier
    ///
    /// Workers run as sequential sweeps, so returning from one sweep already
    /// orders its scratch writes before the next sweep's reads.
    #[inline(always)]
    pub fn barrier(&self) {}
}

/// A kernel executed by a grid of teams
pub trait TeamKernel<T: Element>: Sync {
    /// Kernel name used in logs and launch errors
    fn name(&self) -> &'static str;

    /// Grid and team geometry
    fn config(&self) -> LaunchConfig;

    /// Body of one team; `scratch` has `config().scratch_elems` elements
    fn run(&self, team: &Team, scratch: &mut [T]);
}

/// Raw view of a region of global memory shared by every team
///
/// Teams of one launch write disjoint regions, so the pointer is handed to
/// all of them. Accesses are bounds-checked in debug builds only.
#[derive(Debug)]
pub struct DevicePtr<T> {
    ptr: *mut T,
    len: usize,
    _marker: PhantomData<T>,
}

impl<T> Clone for DevicePtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for DevicePtr<T> {}

// SAFETY: a DevicePtr is a plain address; the kernels that dereference it
// guarantee that concurrent teams touch disjoint elements.
unsafe impl<T: Send> Send for DevicePtr<T> {}
unsafe impl<T: Send> Sync for DevicePtr<T> {}

impl<T: Copy> DevicePtr<T> {
    /// Wrap a device address holding `len` elements
    ///
    /// # Safety
    ///
    /// `addr` must point to `len` valid, properly aligned elements that stay
    /// alive while the pointer is in use.
    #[inline]
    pub unsafe fn from_raw(addr: u64, len: usize) -> Self {
        Self {
            ptr: addr as *mut T,
            len,
            _marker: PhantomData,
        }
    }

    /// Device address of the first element
    #[inline]
    pub fn addr(&self) -> u64 {
        self.ptr as u64
    }

    /// Number of addressable elements
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when no element is addressable
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Pointer advanced by `elems` elements
    ///
    /// # Safety
    ///
    /// `elems <= len`.
    #[inline]
    pub unsafe fn offset(self, elems: usize) -> Self {
        debug_assert!(elems <= self.len);
        Self {
            ptr: unsafe { self.ptr.add(elems) },
            len: self.len - elems,
            _marker: PhantomData,
        }
    }

    /// Read element `idx`
    ///
    /// # Safety
    ///
    /// `idx < len`, and no other team writes `idx` in the same launch.
    #[inline]
    pub unsafe fn read(self, idx: usize) -> T {
        debug_assert!(idx < self.len, "read {} out of {}", idx, self.len);
        unsafe { self.ptr.add(idx).read() }
    }

    /// Write element `idx`
    ///
    /// # Safety
    ///
    /// `idx < len`, and no other team accesses `idx` in the same launch.
    #[inline]
    pub unsafe fn write(self, idx: usize, value: T) {
        debug_assert!(idx < self.len, "write {} out of {}", idx, self.len);
        unsafe { self.ptr.add(idx).write(value) }
    }
}
