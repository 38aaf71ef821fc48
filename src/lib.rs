//! # blocktri
//!
//! **Blocked triangular inversion and Cholesky kernels for team-tiled accelerators.**
//!
//! blocktri inverts n×n triangular matrices with a tiered, recursive-doubling
//! pipeline: the 16×16 diagonal blocks are inverted first, then each tier
//! doubles the inverted block size by fusing the off-diagonal coupling into
//! a triple matrix product. The same pipeline drives a blocked Cholesky
//! factorization.
//!
//! ## Features
//!
//! - **TRTRI**: full inversion and diagonal-block inversion, upper/lower,
//!   unit/non-unit, in single, double, single-complex and double-complex precision
//! - **POTRF**: right-looking blocked Cholesky built on the inversion pipeline
//! - **Runtime**: a CPU backend that emulates grids of teams with bounded
//!   per-team scratch memory, device-wide barriers and asynchronous queues
//! - **Memory**: a capacity-bounded allocator with optional pointer tracking
//! - **Sparse**: CSR storage and a Frobenius difference norm
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use blocktri::prelude::*;
//!
//! let device = CpuDevice::new();
//! let client = CpuRuntime::default_client(&device);
//!
//! // 2×2 upper triangle, column-major
//! let a = Buffer::<CpuRuntime, f64>::from_slice(&[2.0, 0.0, 1.0, 4.0], &device)?;
//! let nb = full_inverse_nb(2);
//! let mut dinv = Buffer::zeros(inverse_buffer_len(2, nb), &device)?;
//! client.trtri(Uplo::Upper, Diag::NonUnit, 2, &a, 2, &mut dinv)?;
//! let inv = InverseLayout::full(2).to_dense(&dinv.to_vec()?)?;
//! ```
//!
//! ## Feature Flags
//!
//! - `rayon` (default): run kernel teams on a work-stealing pool
//! - `debug-memory`: track every allocation and reject unknown frees

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod algorithm;
pub mod buffer;
pub mod config;
pub mod dtype;
pub mod error;
pub mod runtime;
pub mod sparse;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::algorithm::{
        CholeskyFactorization, Diag, InverseLayout, TriangularInverse, Uplo, full_inverse_nb,
        inverse_buffer_len,
    };
    pub use crate::buffer::Buffer;
    pub use crate::config::DeviceConfig;
    pub use crate::dtype::{Complex64, Complex128, DType, Element, LinalgElement};
    pub use crate::error::{Error, Result};
    pub use crate::runtime::cpu::{CpuClient, CpuDevice, CpuRuntime, Queue};
    pub use crate::runtime::{Device, MemoryKind, Runtime, RuntimeClient};
    pub use crate::sparse::CsrData;
}
