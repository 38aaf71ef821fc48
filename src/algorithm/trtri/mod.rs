//! Blocked triangular matrix inversion
//!
//! The inverse of an n×n triangular matrix is built bottom-up:
//!
//! 1. every 16×16 diagonal block is inverted directly;
//! 2. for `jb = 16, 32, 64, …` each `2jb×2jb` diagonal block (a *page*) is
//!    completed from its two `jb×jb` diagonal inverses and the coupling block
//!    of `A` with a triple product:
//!
//! ```text
//! upper:  inv(A)[s.., s+jb..] = -inv(A11) · A12 · inv(A22)
//! lower:  inv(A)[s+jb.., s..] = -inv(A22) · A21 · inv(A11)
//! ```
//!
//! Each tier runs as two or three device-wide phases; a phase
//! reads what the previous one wrote, so a device-wide barrier separates
//! every pair of phases.
//!
//! # Inverse buffer layout
//!
//! `d_dinv` is a sequence of `nb×nb` column-major tiles. Tile `t` holds the
//! inverse of the diagonal block covering rows and columns `[t·nb, t·nb + nb)`.
//! Entries whose global row or column is `≥ n` are never written and stay
//! zero. [`InverseLayout`] maps global indices into the buffer.

mod layout;
pub(crate) mod pipeline;
pub(crate) mod tier;

pub use layout::InverseLayout;

use crate::buffer::Buffer;
use crate::dtype::LinalgElement;
use crate::error::{Error, Result};
use crate::runtime::Runtime;

/// Side of the directly inverted diagonal blocks
pub const DIAG_BLOCK: usize = 16;

/// Diagonal block size used by blocked factorizations that consume `trtri_diag`
pub const TRTRI_NB: usize = 128;

/// Populated triangle of a triangular matrix
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Uplo {
    /// Entries on and above the diagonal
    Upper,
    /// Entries on and below the diagonal
    Lower,
}

impl Uplo {
    /// True when `(i, j)` lies strictly inside the populated triangle
    #[inline]
    pub fn contains_strict(self, i: usize, j: usize) -> bool {
        match self {
            Self::Upper => i < j,
            Self::Lower => i > j,
        }
    }
}

/// Diagonal of a triangular matrix
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Diag {
    /// Diagonal entries are implicitly one and never read
    Unit,
    /// Diagonal entries are stored in the matrix
    NonUnit,
}

/// Triangular inversion on a runtime
///
/// Both entry points validate every argument before touching memory or
/// launching work; a violation is reported as
/// [`Error::InvalidArgument`] carrying the argument position:
///
/// | position | argument |
/// |----------|----------|
/// | 1 | `uplo` |
/// | 2 | `diag` |
/// | 3 | `n` |
/// | 4 | `a` |
/// | 5 | `lda` |
/// | 6 | `d_dinv` |
/// | 7 | `nb` |
///
/// A zero pivot on a non-unit diagonal is not an error: the inverse simply
/// contains non-finite values.
pub trait TriangularInverse<R: Runtime> {
    /// Invert the whole n×n triangle of `a` into `d_dinv`
    ///
    /// `d_dinv` is one tile of side [`full_inverse_nb`]`(n)` and must hold
    /// [`inverse_buffer_len`]`(n, full_inverse_nb(n))` elements.
    fn trtri<T: LinalgElement>(
        &self,
        uplo: Uplo,
        diag: Diag,
        n: i64,
        a: &Buffer<R, T>,
        lda: i64,
        d_dinv: &mut Buffer<R, T>,
    ) -> Result<()>;

    /// Invert the `nb×nb` diagonal blocks of `a` into consecutive tiles of `d_dinv`
    ///
    /// `nb` must be a power of two no smaller than [`DIAG_BLOCK`]; the last
    /// block is partial when `nb` does not divide `n`.
    #[allow(clippy::too_many_arguments)]
    fn trtri_diag<T: LinalgElement>(
        &self,
        uplo: Uplo,
        diag: Diag,
        n: i64,
        a: &Buffer<R, T>,
        lda: i64,
        d_dinv: &mut Buffer<R, T>,
        nb: i64,
    ) -> Result<()>;
}

/// Tile side used by [`TriangularInverse::trtri`] for an n×n matrix
pub fn full_inverse_nb(n: usize) -> usize {
    n.next_power_of_two().max(DIAG_BLOCK)
}

/// Elements `d_dinv` needs for tiles of side `nb` covering an n×n matrix
pub fn inverse_buffer_len(n: usize, nb: usize) -> usize {
    n.div_ceil(nb) * nb * nb
}

/// Elements spanned by an n×n column-major matrix with leading dimension `lda`
///
/// The last column only needs `n` entries. `None` when the span overflows.
pub(crate) fn required_matrix_len(n: usize, lda: usize) -> Option<usize> {
    match n {
        0 => Some(0),
        _ => lda.checked_mul(n - 1)?.checked_add(n),
    }
}

/// Validated arguments of one inversion call
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct TrtriArgs {
    pub uplo: Uplo,
    pub diag: Diag,
    pub n: usize,
    pub lda: usize,
    pub nb: usize,
}

/// Check the arguments of an inversion call
///
/// `nb = None` selects the full inverse. Returns `Ok(None)` when there is
/// nothing to do (`n = 0`). Checks run in the order n, lda, a, nb, d_dinv so
/// that size checks only rely on already-validated values.
pub(crate) fn validate_args(
    uplo: Uplo,
    diag: Diag,
    n: i64,
    a_len: usize,
    lda: i64,
    dinv_len: usize,
    nb: Option<i64>,
) -> Result<Option<TrtriArgs>> {
    if n < 0 {
        return Err(Error::invalid_argument(3, "n", format!("n = {} is negative", n)));
    }
    let n = n as usize;

    if lda < (n as i64).max(1) {
        return Err(Error::invalid_argument(
            5,
            "lda",
            format!("lda = {} is less than max(1, n = {})", lda, n),
        ));
    }
    let lda = lda as usize;

    let required_a = match required_matrix_len(n, lda) {
        Some(len) => len,
        None => {
            return Err(Error::invalid_argument(
                4,
                "a",
                format!("n = {} with lda = {} overflows the address space", n, lda),
            ));
        }
    };
    if a_len < required_a {
        return Err(Error::invalid_argument(
            4,
            "a",
            format!("holds {} elements, {} required", a_len, required_a),
        ));
    }

    let nb = match nb {
        None => full_inverse_nb(n),
        Some(nb) => {
            if nb < DIAG_BLOCK as i64 || !(nb as u64).is_power_of_two() {
                return Err(Error::invalid_argument(
                    7,
                    "nb",
                    format!("nb = {} is not a power of two >= {}", nb, DIAG_BLOCK),
                ));
            }
            nb as usize
        }
    };

    let required_dinv = n
        .div_ceil(nb)
        .checked_mul(nb)
        .and_then(|len| len.checked_mul(nb))
        .unwrap_or(usize::MAX);
    if dinv_len < required_dinv {
        return Err(Error::invalid_argument(
            6,
            "d_dinv",
            format!("holds {} elements, {} required", dinv_len, required_dinv),
        ));
    }

    if n == 0 {
        return Ok(None);
    }
    Ok(Some(TrtriArgs {
        uplo,
        diag,
        n,
        lda,
        nb,
    }))
}
