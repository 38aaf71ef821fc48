//! Tier descriptor table and page geometry
//!
//! A tier of block size `jb` completes every `2jb×2jb` page from its two
//! `jb×jb` diagonal inverses. The fixed tiers (16, 32, 64) keep the whole
//! coupling column of a page in team scratch and finish in two phases. The
//! large tier (jb > 64) cannot, so its correction stages the result in the
//! unused opposite-triangle block of the page and a third phase writes it
//! back.

use super::{DIAG_BLOCK, Diag, TrtriArgs, Uplo};

/// Largest block size whose correction fits team scratch
pub(crate) const MAX_FIXED_TIER: usize = 64;

/// Side of the output tiles owned by one team
pub(crate) const TILE: usize = DIAG_BLOCK;

/// Rows of a streamed operand staged in scratch at once
pub(crate) const CHUNK_ROWS: usize = 64;

/// One phase of a tier
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum PhaseKind {
    /// `W = C · R` into the target block
    CouplingProduct,
    /// `target = -L · W` with W columns staged in scratch
    InPlaceCorrection,
    /// `staging = (-L · W)ᵀ` with W streamed from global memory
    StagedCorrection,
    /// `target = stagingᵀ`, staging zeroed
    StagedWriteback,
}

impl PhaseKind {
    /// Kernel name of the phase
    pub(crate) fn name(self) -> &'static str {
        match self {
            Self::CouplingProduct => "trtri_coupling_product",
            Self::InPlaceCorrection => "trtri_in_place_correction",
            Self::StagedCorrection => "trtri_staged_correction",
            Self::StagedWriteback => "trtri_staged_writeback",
        }
    }
}

const FIXED_PHASES: &[PhaseKind] = &[PhaseKind::CouplingProduct, PhaseKind::InPlaceCorrection];

const LARGE_PHASES: &[PhaseKind] = &[
    PhaseKind::CouplingProduct,
    PhaseKind::StagedCorrection,
    PhaseKind::StagedWriteback,
];

/// Block size of a tier and the phases that complete it
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct TierDescriptor {
    pub block_size: usize,
    pub phases: &'static [PhaseKind],
}

impl TierDescriptor {
    pub(crate) fn for_block_size(block_size: usize) -> Self {
        let phases = if block_size <= MAX_FIXED_TIER {
            FIXED_PHASES
        } else {
            LARGE_PHASES
        };
        Self { block_size, phases }
    }
}

/// Tiers needed to grow 16×16 inverses into `nb×nb` inverses of an n×n matrix
pub(crate) fn tier_schedule(n: usize, nb: usize) -> Vec<TierDescriptor> {
    let mut tiers = Vec::new();
    let mut jb = DIAG_BLOCK;
    while jb < nb && jb < n {
        tiers.push(TierDescriptor::for_block_size(jb));
        jb *= 2;
    }
    tiers
}

/// Geometry shared by every kernel of a call
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct InverseGeometry {
    pub uplo: Uplo,
    pub diag: Diag,
    pub n: usize,
    pub lda: usize,
    pub nb: usize,
}

impl From<&TrtriArgs> for InverseGeometry {
    fn from(args: &TrtriArgs) -> Self {
        Self {
            uplo: args.uplo,
            diag: args.diag,
            n: args.n,
            lda: args.lda,
            nb: args.nb,
        }
    }
}

impl InverseGeometry {
    /// Index of global `(i, j)` in column-major `A`
    #[inline(always)]
    pub(crate) fn a_index(&self, i: usize, j: usize) -> usize {
        j * self.lda + i
    }

    /// Index of global `(i, j)` in `d_dinv`; both must lie in the same tile
    #[inline(always)]
    pub(crate) fn inv_index(&self, i: usize, j: usize) -> usize {
        debug_assert_eq!(i / self.nb, j / self.nb);
        let tile = i / self.nb;
        tile * self.nb * self.nb + (j % self.nb) * self.nb + (i % self.nb)
    }

    /// Number of 16×16 diagonal blocks
    pub(crate) fn diag_blocks(&self) -> usize {
        self.n.div_ceil(DIAG_BLOCK)
    }
}

/// Page layout of one tier
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct TierGeometry {
    pub inv: InverseGeometry,
    pub jb: usize,
    pub npages: usize,
}

/// Blocks of one page, as global `(row, col)` origins
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct PageBlocks {
    /// Origin of the off-diagonal block being computed
    pub target: (usize, usize),
    /// Origin of the diagonal inverse multiplied from the right in phase 1
    pub right: usize,
    /// Origin of the diagonal inverse multiplied from the left in phase 2
    pub left: usize,
}

impl TierGeometry {
    pub(crate) fn new(inv: InverseGeometry, jb: usize) -> Self {
        Self {
            inv,
            jb,
            npages: inv.n.div_ceil(2 * jb),
        }
    }

    /// 16×16 tiles per side of a `jb×jb` block
    #[inline]
    pub(crate) fn tiles_per_side(&self) -> usize {
        self.jb / TILE
    }

    /// Blocks of page `p`, or `None` when the page has no second half
    pub(crate) fn page(&self, p: usize) -> Option<PageBlocks> {
        let s = p * 2 * self.jb;
        if s + self.jb >= self.inv.n {
            return None;
        }
        let (top, bottom) = (s, s + self.jb);
        Some(match self.inv.uplo {
            Uplo::Upper => PageBlocks {
                target: (top, bottom),
                right: bottom,
                left: top,
            },
            Uplo::Lower => PageBlocks {
                target: (bottom, top),
                right: top,
                left: bottom,
            },
        })
    }

    /// Range of `k` for which the left inverse `L(i, k)` may be non-zero
    ///
    /// `i` is local to the `jb×jb` block.
    #[inline]
    pub(crate) fn left_k_range(&self, i: usize) -> (usize, usize) {
        match self.inv.uplo {
            Uplo::Upper => (i, self.jb),
            Uplo::Lower => (0, i + 1),
        }
    }

    /// Range of `k` for which the right inverse `R(k, j)` may be non-zero
    #[inline]
    pub(crate) fn right_k_range(&self, j: usize) -> (usize, usize) {
        match self.inv.uplo {
            Uplo::Upper => (0, j + 1),
            Uplo::Lower => (j, self.jb),
        }
    }
}
