//! Algorithm contracts for runtime backends
//!
//! Every algorithm is defined as a trait first, then implemented per backend.
//! The trait documents the exact blocking so that every backend produces the
//! same results up to floating-point reassociation.
//!
//! # Available Algorithm Contracts
//!
//! - [`TriangularInverse`] - blocked triangular inversion (TRTRI)
//! - [`CholeskyFactorization`] - blocked Cholesky factorization (POTRF)
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Algorithm trait (block sizes, tiers, phases) │
//! └──────────────────────┬───────────────────────┘
//!                        │
//!        ┌───────────────┴───────────────┐
//!        ▼                               ▼
//!  shared orchestration            backend kernels
//!  (tier table, barriers)          (diag, triple product)
//! ```

pub mod cholesky;
pub mod trtri;

pub use cholesky::{CholeskyFactorization, POTRF_NB, cholesky_residual};
pub use trtri::{
    DIAG_BLOCK, Diag, InverseLayout, TRTRI_NB, TriangularInverse, Uplo, full_inverse_nb,
    inverse_buffer_len,
};
