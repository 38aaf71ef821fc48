//! Triple-product phases of a trtri tier
//!
//! Index conventions for a page with target origin `(tr, tc)`:
//!
//! ```text
//! C(i, k) = A(tr + i, tc + k)        coupling block of A
//! R(k, j) = inv(tc + k, tc + j)      right diagonal inverse
//! L(i, k) = inv(tr + i, tr + k)      left diagonal inverse
//! W       = C · R                    phase 1, stored in the target block
//! X       = -L · W                   phase 2
//! ```
//!
//! Local indices run over `[0, jb)`; only entries whose global row and
//! column are `< n` are read from `A` or written to `d_dinv`.

use crate::algorithm::trtri::tier::{CHUNK_ROWS, PageBlocks, PhaseKind, TILE, TierGeometry};
use crate::algorithm::Uplo;
use crate::dtype::LinalgElement;
use crate::runtime::{DevicePtr, LaunchConfig, Team, TeamKernel};

/// Output tile of one team inside a page
#[derive(Copy, Clone, Debug)]
struct TileTask {
    page: PageBlocks,
    /// Local origin of the tile inside the `jb×jb` target block
    row0: usize,
    col0: usize,
    /// In-range extent of the tile
    rows: usize,
    cols: usize,
    /// In-range extent of `k` in `C · R`
    right_extent: usize,
    /// In-range extent of `k` in `L · W`
    left_extent: usize,
}

impl TileTask {
    /// Task of team `id` when every page is split into 16×16 tiles
    fn for_team(tier: &TierGeometry, id: usize) -> Option<Self> {
        let tps = tier.tiles_per_side();
        let (p, r) = (id / (tps * tps), id % (tps * tps));
        let page = tier.page(p)?;
        let (row0, col0) = ((r % tps) * TILE, (r / tps) * TILE);
        Self::new(tier, page, row0, col0, TILE)
    }

    fn new(
        tier: &TierGeometry,
        page: PageBlocks,
        row0: usize,
        col0: usize,
        height: usize,
    ) -> Option<Self> {
        let n = tier.inv.n;
        let (tr, tc) = page.target;
        let rows = height.min(n.saturating_sub(tr + row0));
        let cols = TILE.min(n.saturating_sub(tc + col0));
        if rows == 0 || cols == 0 {
            return None;
        }
        Some(Self {
            page,
            row0,
            col0,
            rows,
            cols,
            right_extent: tier.jb.min(n - tc),
            left_extent: tier.jb.min(n - tr),
        })
    }
}

/// Phase 1: `W = C · R` into the target block
pub(crate) struct CouplingProductKernel<T> {
    a: DevicePtr<T>,
    dinv: DevicePtr<T>,
    tier: TierGeometry,
}

impl<T: LinalgElement> CouplingProductKernel<T> {
    pub(crate) fn new(a: DevicePtr<T>, dinv: DevicePtr<T>, tier: TierGeometry) -> Self {
        Self { a, dinv, tier }
    }

    fn chunk(&self) -> usize {
        self.tier.jb.min(CHUNK_ROWS)
    }
}

/// Launch geometry of a phase
pub(crate) fn phase_config(phase: PhaseKind, tier: &TierGeometry) -> LaunchConfig {
    let tps = tier.tiles_per_side();
    let tiles = tier.npages * tps * tps;
    match phase {
        PhaseKind::CouplingProduct => {
            LaunchConfig::new(tiles, TILE, tier.jb.min(CHUNK_ROWS) * TILE)
        }
        PhaseKind::InPlaceCorrection => {
            LaunchConfig::new(tier.npages * tps, tier.jb, tier.jb * TILE)
        }
        PhaseKind::StagedCorrection => LaunchConfig::new(tiles, TILE, CHUNK_ROWS * TILE),
        PhaseKind::StagedWriteback => LaunchConfig::new(tiles, TILE, 0),
    }
}

impl<T: LinalgElement> TeamKernel<T> for CouplingProductKernel<T> {
    fn name(&self) -> &'static str {
        PhaseKind::CouplingProduct.name()
    }

    fn config(&self) -> LaunchConfig {
        phase_config(PhaseKind::CouplingProduct, &self.tier)
    }

    fn run(&self, team: &Team, scratch: &mut [T]) {
        let Some(task) = TileTask::for_team(&self.tier, team.id()) else {
            return;
        };
        let g = &self.tier.inv;
        let (tr, tc) = task.page.target;
        let kc = self.chunk();

        // Columns of C that exist and rows of R that can be non-zero
        // for some column of this tile
        let (k_lo, k_hi) = match g.uplo {
            Uplo::Upper => (0, (task.col0 + TILE).min(task.right_extent)),
            Uplo::Lower => (task.col0, task.right_extent),
        };

        let mut acc = [[T::zero(); TILE]; TILE];
        let mut k0 = k_lo;
        while k0 < k_hi {
            let k1 = (k0 + kc).min(k_hi);

            // Stage R(k0..k1, col0..col0+16), masked to its triangle
            for j in team.workers() {
                let (r_lo, r_hi) = self.tier.right_k_range(task.col0 + j);
                for k in k0..k1 {
                    scratch[j * kc + (k - k0)] = if j < task.cols && k >= r_lo && k < r_hi {
                        // SAFETY: tc + k and tc + col0 + j are < n and in the page's tile
                        unsafe { self.dinv.read(g.inv_index(tc + k, tc + task.col0 + j)) }
                    } else {
                        T::zero()
                    };
                }
            }
            team.barrier();

            for i in team.workers().take(task.rows) {
                let gi = tr + task.row0 + i;
                for k in k0..k1 {
                    // SAFETY: gi, tc + k < n and strictly inside the triangle
                    let c = unsafe { self.a.read(g.a_index(gi, tc + k)) };
                    for j in 0..task.cols {
                        acc[i][j] = acc[i][j] + c * scratch[j * kc + (k - k0)];
                    }
                }
            }
            team.barrier();
            k0 = k1;
        }

        for i in 0..task.rows {
            for j in 0..task.cols {
                let (gi, gj) = (tr + task.row0 + i, tc + task.col0 + j);
                // SAFETY: in range; this team owns the tile
                unsafe { self.dinv.write(g.inv_index(gi, gj), acc[i][j]) };
            }
        }
    }
}

/// Phase 2 of the fixed tiers: `target = -L · W`, in place
///
/// A team owns a 16-column slab of the target block and keeps the whole
/// slab of W in scratch, so it can overwrite W without a second buffer.
pub(crate) struct InPlaceCorrectionKernel<T> {
    dinv: DevicePtr<T>,
    tier: TierGeometry,
}

impl<T: LinalgElement> InPlaceCorrectionKernel<T> {
    pub(crate) fn new(dinv: DevicePtr<T>, tier: TierGeometry) -> Self {
        Self { dinv, tier }
    }
}

impl<T: LinalgElement> TeamKernel<T> for InPlaceCorrectionKernel<T> {
    fn name(&self) -> &'static str {
        PhaseKind::InPlaceCorrection.name()
    }

    fn config(&self) -> LaunchConfig {
        phase_config(PhaseKind::InPlaceCorrection, &self.tier)
    }

    fn run(&self, team: &Team, scratch: &mut [T]) {
        let jb = self.tier.jb;
        let tps = self.tier.tiles_per_side();
        let Some(page) = self.tier.page(team.id() / tps) else {
            return;
        };
        let col0 = (team.id() % tps) * TILE;
        let Some(task) = TileTask::new(&self.tier, page, 0, col0, jb) else {
            return;
        };
        let g = &self.tier.inv;
        let (tr, tc) = page.target;

        // Stage W(0..jb, col0..col0+16); worker k loads row k
        for k in team.workers() {
            for j in 0..TILE {
                scratch[j * jb + k] = if k < task.left_extent && j < task.cols {
                    // SAFETY: tr + k and tc + col0 + j are < n
                    unsafe { self.dinv.read(g.inv_index(tr + k, tc + col0 + j)) }
                } else {
                    T::zero()
                };
            }
        }
        team.barrier();

        for i in team.workers().take(task.rows) {
            let (lo, hi) = self.tier.left_k_range(i);
            let hi = hi.min(task.left_extent);
            for j in 0..task.cols {
                let mut sum = T::zero();
                for k in lo..hi {
                    // SAFETY: the left inverse block is complete and read-only here
                    let l = unsafe { self.dinv.read(g.inv_index(tr + i, page.left + k)) };
                    sum = sum + l * scratch[j * jb + k];
                }
                // SAFETY: this team owns the slab
                unsafe { self.dinv.write(g.inv_index(tr + i, tc + col0 + j), -sum) };
            }
        }
    }
}

/// Phase 2 of the large tier: `staging = (-L · W)ᵀ`
///
/// W is streamed from the target block in 64-row chunks. The result goes,
/// transposed, into the opposite-triangle block of the page, which is
/// zero and unused; transposing keeps every staged entry inside `[0, n)`.
pub(crate) struct StagedCorrectionKernel<T> {
    dinv: DevicePtr<T>,
    tier: TierGeometry,
}

impl<T: LinalgElement> StagedCorrectionKernel<T> {
    pub(crate) fn new(dinv: DevicePtr<T>, tier: TierGeometry) -> Self {
        Self { dinv, tier }
    }
}

impl<T: LinalgElement> TeamKernel<T> for StagedCorrectionKernel<T> {
    fn name(&self) -> &'static str {
        PhaseKind::StagedCorrection.name()
    }

    fn config(&self) -> LaunchConfig {
        phase_config(PhaseKind::StagedCorrection, &self.tier)
    }

    fn run(&self, team: &Team, scratch: &mut [T]) {
        let Some(task) = TileTask::for_team(&self.tier, team.id()) else {
            return;
        };
        let g = &self.tier.inv;
        let (tr, tc) = task.page.target;

        // Rows of W that can meet a non-zero L(i, k) for some row of this tile
        let (k_lo, k_hi) = match g.uplo {
            Uplo::Upper => (task.row0, task.left_extent),
            Uplo::Lower => (0, (task.row0 + TILE).min(task.left_extent)),
        };

        let mut acc = [[T::zero(); TILE]; TILE];
        let mut k0 = k_lo;
        while k0 < k_hi {
            let k1 = (k0 + CHUNK_ROWS).min(k_hi);

            for j in team.workers() {
                for k in k0..k1 {
                    scratch[j * CHUNK_ROWS + (k - k0)] = if j < task.cols {
                        // SAFETY: tr + k and tc + col0 + j are < n
                        unsafe { self.dinv.read(g.inv_index(tr + k, tc + task.col0 + j)) }
                    } else {
                        T::zero()
                    };
                }
            }
            team.barrier();

            for i in team.workers().take(task.rows) {
                let (l_lo, l_hi) = self.tier.left_k_range(task.row0 + i);
                for k in k0.max(l_lo)..k1.min(l_hi) {
                    // SAFETY: the left inverse block is complete and read-only here
                    let l = unsafe {
                        self.dinv
                            .read(g.inv_index(tr + task.row0 + i, task.page.left + k))
                    };
                    for j in 0..task.cols {
                        acc[i][j] = acc[i][j] + l * scratch[j * CHUNK_ROWS + (k - k0)];
                    }
                }
            }
            team.barrier();
            k0 = k1;
        }

        for i in 0..task.rows {
            for j in 0..task.cols {
                let (gi, gj) = (tr + task.row0 + i, tc + task.col0 + j);
                // SAFETY: (gj, gi) is in range and only this team stages it
                unsafe { self.dinv.write(g.inv_index(gj, gi), -acc[i][j]) };
            }
        }
    }
}

/// Phase 3 of the large tier: move staged tiles into the target block
pub(crate) struct StagedWritebackKernel<T> {
    dinv: DevicePtr<T>,
    tier: TierGeometry,
}

impl<T: LinalgElement> StagedWritebackKernel<T> {
    pub(crate) fn new(dinv: DevicePtr<T>, tier: TierGeometry) -> Self {
        Self { dinv, tier }
    }
}

impl<T: LinalgElement> TeamKernel<T> for StagedWritebackKernel<T> {
    fn name(&self) -> &'static str {
        PhaseKind::StagedWriteback.name()
    }

    fn config(&self) -> LaunchConfig {
        phase_config(PhaseKind::StagedWriteback, &self.tier)
    }

    fn run(&self, team: &Team, _scratch: &mut [T]) {
        let Some(task) = TileTask::for_team(&self.tier, team.id()) else {
            return;
        };
        let g = &self.tier.inv;
        let (tr, tc) = task.page.target;

        for j in team.workers().take(task.cols) {
            for i in 0..task.rows {
                let (gi, gj) = (tr + task.row0 + i, tc + task.col0 + j);
                // SAFETY: both entries are in range and owned by this team
                unsafe {
                    let v = self.dinv.read(g.inv_index(gj, gi));
                    self.dinv.write(g.inv_index(gi, gj), v);
                    self.dinv.write(g.inv_index(gj, gi), T::zero());
                }
            }
        }
    }
}
