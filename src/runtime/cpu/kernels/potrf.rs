//! Kernels of the blocked Cholesky factorization
//!
//! For a lower factorization, step `j` with block `jb` works on
//!
//! ```text
//! [ A11      ]    A11 = L11·L11ᴴ          (potf2)
//! [ A21  A22 ]    L21 = A21·inv(L11)ᴴ     (panel solve)
//!                 A22 -= L21·L21ᴴ         (trailing update)
//! ```
//!
//! The upper factorization is the conjugate transpose of the same steps.

use crate::algorithm::Uplo;
use crate::dtype::LinalgElement;
use crate::runtime::{DevicePtr, LaunchConfig, Team, TeamKernel};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

const TILE: usize = 16;

/// Position of one block step of the factorization
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct PotrfStep {
    pub uplo: Uplo,
    pub n: usize,
    pub lda: usize,
    /// First row/column of the diagonal block
    pub j: usize,
    /// Side of the diagonal block
    pub jb: usize,
}

impl PotrfStep {
    #[inline(always)]
    fn idx(&self, i: usize, j: usize) -> usize {
        j * self.lda + i
    }

    /// Order of the trailing matrix
    pub(crate) fn trailing(&self) -> usize {
        self.n - self.j - self.jb
    }
}

/// Unblocked factorization of the diagonal block by a single team
///
/// A non-positive pivot stops the team and records its 1-based local index
/// in `info` (minimum over all recordings).
pub(crate) struct Potf2Kernel<T> {
    a: DevicePtr<T>,
    step: PotrfStep,
    info: Arc<AtomicUsize>,
}

impl<T: LinalgElement> Potf2Kernel<T> {
    pub(crate) fn new(a: DevicePtr<T>, step: PotrfStep, info: Arc<AtomicUsize>) -> Self {
        Self { a, step, info }
    }

    #[inline]
    fn get(&self, i: usize, j: usize) -> T {
        // SAFETY: all indices lie inside the validated n×n matrix
        unsafe { self.a.read(self.step.idx(i, j)) }
    }

    #[inline]
    fn set(&self, i: usize, j: usize, v: T) {
        // SAFETY: as above; the single team owns the diagonal block
        unsafe { self.a.write(self.step.idx(i, j), v) }
    }
}

impl<T: LinalgElement> TeamKernel<T> for Potf2Kernel<T> {
    fn name(&self) -> &'static str {
        "potf2"
    }

    fn config(&self) -> LaunchConfig {
        LaunchConfig::new(1, self.step.jb, 0)
    }

    fn run(&self, team: &Team, _scratch: &mut [T]) {
        let PotrfStep { uplo, j, jb, .. } = self.step;

        for k in 0..jb {
            let kk = j + k;
            let mut d = self.get(kk, kk).real_val();
            for p in j..kk {
                let v = match uplo {
                    Uplo::Lower => self.get(kk, p),
                    Uplo::Upper => self.get(p, kk),
                };
                let m = v.abs_val();
                d -= m * m;
            }
            if !(d > 0.0) {
                self.set(kk, kk, T::from_real(d));
                self.info.fetch_min(k + 1, Ordering::AcqRel);
                return;
            }
            let dkk = d.sqrt();
            self.set(kk, kk, T::from_real(dkk));
            let scale = T::from_real(1.0 / dkk);
            team.barrier();

            for w in team.workers().filter(|&w| w > k) {
                let i = j + w;
                match uplo {
                    Uplo::Lower => {
                        let mut s = self.get(i, kk);
                        for p in j..kk {
                            s = s - self.get(i, p) * self.get(kk, p).conj_val();
                        }
                        self.set(i, kk, s * scale);
                    }
                    Uplo::Upper => {
                        let mut s = self.get(kk, i);
                        for p in j..kk {
                            s = s - self.get(p, kk).conj_val() * self.get(p, i);
                        }
                        self.set(kk, i, s * scale);
                    }
                }
            }
            team.barrier();
        }
    }
}

/// Panel solve against the inverted diagonal block
///
/// Lower: each team owns 16 rows of `A21` and computes `A21·inv(L11)ᴴ`.
/// Upper: each team owns 16 columns of `A12` and computes `inv(U11)ᴴ·A12`.
/// The team's rows (columns) are staged in scratch, so the product is
/// written back in place.
pub(crate) struct PanelSolveKernel<T> {
    a: DevicePtr<T>,
    dinv: DevicePtr<T>,
    dinv_ld: usize,
    step: PotrfStep,
}

impl<T: LinalgElement> PanelSolveKernel<T> {
    pub(crate) fn new(a: DevicePtr<T>, dinv: DevicePtr<T>, dinv_ld: usize, step: PotrfStep) -> Self {
        Self {
            a,
            dinv,
            dinv_ld,
            step,
        }
    }

    #[inline]
    fn inv(&self, i: usize, j: usize) -> T {
        // SAFETY: i, j < jb <= dinv_ld
        unsafe { self.dinv.read(j * self.dinv_ld + i) }
    }
}

/// Launch geometry of the panel solve
pub(crate) fn panel_config(step: &PotrfStep) -> LaunchConfig {
    LaunchConfig::new(step.trailing().div_ceil(TILE), TILE, TILE * step.jb)
}

impl<T: LinalgElement> TeamKernel<T> for PanelSolveKernel<T> {
    fn name(&self) -> &'static str {
        "potrf_panel_solve"
    }

    fn config(&self) -> LaunchConfig {
        panel_config(&self.step)
    }

    fn run(&self, team: &Team, scratch: &mut [T]) {
        let s = &self.step;
        let first = s.j + s.jb + team.id() * TILE;
        let count = TILE.min(s.n - first);

        // Row w of the lower panel, or column w of the upper panel
        let at = |w: usize, k: usize| match s.uplo {
            Uplo::Lower => s.idx(first + w, s.j + k),
            Uplo::Upper => s.idx(s.j + k, first + w),
        };

        for w in team.workers().take(count) {
            for k in 0..s.jb {
                // SAFETY: inside the panel owned by this team
                scratch[w * s.jb + k] = unsafe { self.a.read(at(w, k)) };
            }
        }
        team.barrier();

        for w in team.workers().take(count) {
            for c in 0..s.jb {
                let mut sum = T::zero();
                for k in 0..=c {
                    let x = scratch[w * s.jb + k];
                    sum = sum
                        + match s.uplo {
                            Uplo::Lower => x * self.inv(c, k).conj_val(),
                            Uplo::Upper => self.inv(k, c).conj_val() * x,
                        };
                }
                // SAFETY: as above
                unsafe { self.a.write(at(w, c), sum) };
            }
        }
    }
}

/// Hermitian rank-`jb` update of the trailing matrix, one triangle only
pub(crate) struct TrailingUpdateKernel<T> {
    a: DevicePtr<T>,
    step: PotrfStep,
}

impl<T: LinalgElement> TrailingUpdateKernel<T> {
    pub(crate) fn new(a: DevicePtr<T>, step: PotrfStep) -> Self {
        Self { a, step }
    }
}

impl<T: LinalgElement> TeamKernel<T> for TrailingUpdateKernel<T> {
    fn name(&self) -> &'static str {
        "potrf_trailing_update"
    }

    fn config(&self) -> LaunchConfig {
        let tiles = self.step.trailing().div_ceil(TILE);
        LaunchConfig::new(tiles * tiles, TILE, 0)
    }

    fn run(&self, team: &Team, _scratch: &mut [T]) {
        let s = &self.step;
        let tiles = s.trailing().div_ceil(TILE);
        let (ti, tj) = (team.id() % tiles, team.id() / tiles);
        let outside = match s.uplo {
            Uplo::Lower => ti < tj,
            Uplo::Upper => ti > tj,
        };
        if outside {
            return;
        }

        let origin = s.j + s.jb;
        for c in team.workers() {
            let gc = origin + tj * TILE + c;
            if gc >= s.n {
                continue;
            }
            for r in 0..TILE {
                let gr = origin + ti * TILE + r;
                let in_triangle = match s.uplo {
                    Uplo::Lower => gr >= gc,
                    Uplo::Upper => gr <= gc,
                };
                if gr >= s.n || !in_triangle {
                    continue;
                }
                // SAFETY: the panel is read-only here and this team owns the tile
                unsafe {
                    let mut sum = T::zero();
                    for k in s.j..origin {
                        sum = sum
                            + match s.uplo {
                                Uplo::Lower => {
                                    self.a.read(s.idx(gr, k)) * self.a.read(s.idx(gc, k)).conj_val()
                                }
                                Uplo::Upper => {
                                    self.a.read(s.idx(k, gr)).conj_val() * self.a.read(s.idx(k, gc))
                                }
                            };
                    }
                    let idx = s.idx(gr, gc);
                    self.a.write(idx, self.a.read(idx) - sum);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_potf2_lower_2x2() {
        // [4 2; 2 5] = [2 0; 1 2]·[2 1; 0 2]
        let mut a = vec![4.0f64, 2.0, 2.0, 5.0];
        let info = Arc::new(AtomicUsize::new(usize::MAX));
        let kernel = Potf2Kernel::<f64>::new(
            unsafe { DevicePtr::from_raw(a.as_mut_ptr() as u64, a.len()) },
            PotrfStep {
                uplo: Uplo::Lower,
                n: 2,
                lda: 2,
                j: 0,
                jb: 2,
            },
            Arc::clone(&info),
        );
        kernel.run(&Team::new(0, 2), &mut []);
        assert_eq!(info.load(Ordering::Acquire), usize::MAX);
        assert_eq!(a[0], 2.0);
        assert_eq!(a[1], 1.0);
        assert_eq!(a[3], 2.0);
    }

    #[test]
    fn test_potf2_reports_indefinite_pivot() {
        // Second leading minor is 1·1 - 2·2 < 0
        let mut a = vec![1.0f64, 0.0, 2.0, 1.0];
        let info = Arc::new(AtomicUsize::new(usize::MAX));
        let kernel = Potf2Kernel::<f64>::new(
            unsafe { DevicePtr::from_raw(a.as_mut_ptr() as u64, a.len()) },
            PotrfStep {
                uplo: Uplo::Upper,
                n: 2,
                lda: 2,
                j: 0,
                jb: 2,
            },
            Arc::clone(&info),
        );
        kernel.run(&Team::new(0, 2), &mut []);
        assert_eq!(info.load(Ordering::Acquire), 2);
    }
}
