//! Sparse matrix utilities
//!
//! Compressed sparse row storage on a device and the comparison helpers the
//! sparse solvers use to check their results.

mod csr;
mod norm;

pub use csr::CsrData;
pub use norm::frobenius_diff;
