//! Blocked Cholesky factorization
//!
//! Right-looking factorization with block size [`POTRF_NB`]. Each step
//! factors the diagonal block in place, inverts it with the triangular
//! inversion pipeline, solves the panel by multiplying with that inverse and
//! applies a Hermitian rank-`nb` update to the trailing matrix.

use super::Uplo;
use super::trtri::required_matrix_len;
use crate::buffer::Buffer;
use crate::dtype::LinalgElement;
use crate::error::{Error, Result};
use crate::runtime::Runtime;

/// Block size of the factorization
pub const POTRF_NB: usize = 64;

/// Cholesky factorization on a runtime
pub trait CholeskyFactorization<R: Runtime> {
    /// Factor the Hermitian positive definite matrix `a` in place
    ///
    /// Lower: `A = L·Lᴴ`, L overwrites the lower triangle. Upper:
    /// `A = Uᴴ·U`, U overwrites the upper triangle. The other triangle is
    /// neither read nor written.
    ///
    /// Returns `info`: `0` on success, or `k > 0` when the leading minor of
    /// order `k` is not positive definite; the factorization stops there.
    /// Argument errors carry the position (1 `uplo`, 2 `n`, 3 `a`, 4 `lda`).
    fn potrf<T: LinalgElement>(
        &self,
        uplo: Uplo,
        n: i64,
        a: &mut Buffer<R, T>,
        lda: i64,
    ) -> Result<usize>;
}

/// Validated arguments of a factorization
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct PotrfArgs {
    pub uplo: Uplo,
    pub n: usize,
    pub lda: usize,
}

/// Check the arguments of a factorization; `Ok(None)` for `n = 0`
pub(crate) fn validate_potrf_args(
    uplo: Uplo,
    n: i64,
    a_len: usize,
    lda: i64,
) -> Result<Option<PotrfArgs>> {
    if n < 0 {
        return Err(Error::invalid_argument(2, "n", format!("n = {} is negative", n)));
    }
    let n = n as usize;
    if lda < (n as i64).max(1) {
        return Err(Error::invalid_argument(
            4,
            "lda",
            format!("lda = {} is less than max(1, n = {})", lda, n),
        ));
    }
    let lda = lda as usize;
    let required = required_matrix_len(n, lda).ok_or_else(|| {
        Error::invalid_argument(
            3,
            "a",
            format!("n = {} with lda = {} overflows the address space", n, lda),
        )
    })?;
    if a_len < required {
        return Err(Error::invalid_argument(
            3,
            "a",
            format!("holds {} elements, {} required", a_len, required),
        ));
    }
    Ok((n > 0).then_some(PotrfArgs { uplo, n, lda }))
}

/// Relative residual `‖A − L·Lᴴ‖_F / ‖A‖_F` of a factorization
///
/// `original` is the full Hermitian matrix, `factor` the output of
/// [`CholeskyFactorization::potrf`]; both column-major with leading dimension
/// `lda`. Only the factored triangle of `factor` is read.
pub fn cholesky_residual<T: LinalgElement>(
    uplo: Uplo,
    n: usize,
    original: &[T],
    factor: &[T],
    lda: usize,
) -> f64 {
    // Entry (i, k) of the triangular factor F with A = F·Fᴴ
    let f = |i: usize, k: usize| -> T {
        match uplo {
            Uplo::Lower if i >= k => factor[k * lda + i],
            Uplo::Upper if i >= k => factor[i * lda + k].conj_val(),
            _ => T::zero(),
        }
    };

    let mut diff = 0.0f64;
    let mut norm = 0.0f64;
    for j in 0..n {
        for i in 0..n {
            let mut s = T::zero();
            for k in 0..=i.min(j) {
                s = s + f(i, k) * f(j, k).conj_val();
            }
            let a = original[j * lda + i];
            let d = (a - s).abs_val();
            diff += d * d;
            let m = a.abs_val();
            norm += m * m;
        }
    }
    if norm == 0.0 {
        diff.sqrt()
    } else {
        (diff / norm).sqrt()
    }
}
