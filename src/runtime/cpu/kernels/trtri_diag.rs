//! Direct inversion of 16×16 diagonal blocks

use crate::algorithm::trtri::tier::InverseGeometry;
use crate::algorithm::{DIAG_BLOCK, Diag, Uplo};
use crate::dtype::LinalgElement;
use crate::runtime::{DevicePtr, LaunchConfig, Team, TeamKernel};

const B: usize = DIAG_BLOCK;

/// One team per diagonal block; the block is inverted in team scratch
pub(crate) struct DiagInverseKernel<T> {
    a: DevicePtr<T>,
    dinv: DevicePtr<T>,
    geometry: InverseGeometry,
}

impl<T: LinalgElement> DiagInverseKernel<T> {
    pub(crate) fn new(a: DevicePtr<T>, dinv: DevicePtr<T>, geometry: InverseGeometry) -> Self {
        Self { a, dinv, geometry }
    }

    /// Scratch value of block entry `(i, j)`
    ///
    /// Rows and columns beyond n pad the block with the identity; the
    /// opposite triangle is zero and a unit diagonal is never read.
    #[inline]
    fn load(&self, base: usize, i: usize, j: usize) -> T {
        let g = &self.geometry;
        let (gi, gj) = (base + i, base + j);
        if gi >= g.n || gj >= g.n || (i != j && !g.uplo.contains_strict(i, j)) {
            return if i == j { T::one() } else { T::zero() };
        }
        if i == j && g.diag == Diag::Unit {
            return T::one();
        }
        // SAFETY: gi, gj < n and validation guarantees A covers n columns of lda
        unsafe { self.a.read(g.a_index(gi, gj)) }
    }

    /// Replace column `j` of the block by column `j` of its inverse
    ///
    /// Columns already inverted are the ones `j` depends on: left of `j` for
    /// upper, right of `j` for lower.
    fn invert_column(&self, team: &Team, tile: &mut [T], j: usize) {
        let djj = match self.geometry.diag {
            Diag::Unit => T::one(),
            Diag::NonUnit => tile[j * B + j].recip_val(),
        };

        let mut column = [T::zero(); B];
        for i in team.workers() {
            column[i] = if i == j {
                djj
            } else if self.geometry.uplo.contains_strict(i, j) {
                let ks = match self.geometry.uplo {
                    Uplo::Upper => i..j,
                    Uplo::Lower => j + 1..i + 1,
                };
                let mut sum = T::zero();
                for k in ks {
                    sum = sum + tile[k * B + i] * tile[j * B + k];
                }
                -(sum * djj)
            } else {
                T::zero()
            };
        }
        team.barrier();
        tile[j * B..(j + 1) * B].copy_from_slice(&column);
        team.barrier();
    }
}

impl<T: LinalgElement> TeamKernel<T> for DiagInverseKernel<T> {
    fn name(&self) -> &'static str {
        "trtri_diag_blocks"
    }

    fn config(&self) -> LaunchConfig {
        LaunchConfig::new(self.geometry.diag_blocks(), B, B * B)
    }

    fn run(&self, team: &Team, tile: &mut [T]) {
        let g = &self.geometry;
        let base = team.id() * B;

        for j in team.workers() {
            for i in 0..B {
                tile[j * B + i] = self.load(base, i, j);
            }
        }
        team.barrier();

        match g.uplo {
            Uplo::Upper => (0..B).for_each(|j| self.invert_column(team, tile, j)),
            Uplo::Lower => (0..B).rev().for_each(|j| self.invert_column(team, tile, j)),
        }

        for j in team.workers() {
            let gj = base + j;
            if gj >= g.n {
                continue;
            }
            for i in 0..B.min(g.n - base) {
                // SAFETY: the block lies in one tile and both indices are < n
                unsafe { self.dinv.write(g.inv_index(base + i, gj), tile[j * B + i]) };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invert(uplo: Uplo, diag: Diag, a: &mut [f64], n: usize) -> Vec<f64> {
        let geometry = InverseGeometry {
            uplo,
            diag,
            n,
            lda: n,
            nb: 16,
        };
        let mut dinv = vec![0.0f64; 256];
        let kernel = DiagInverseKernel::new(
            unsafe { DevicePtr::from_raw(a.as_mut_ptr() as u64, a.len()) },
            unsafe { DevicePtr::from_raw(dinv.as_mut_ptr() as u64, dinv.len()) },
            geometry,
        );
        let mut tile = vec![0.0f64; 256];
        kernel.run(&Team::new(0, 16), &mut tile);
        dinv
    }

    #[test]
    fn test_upper_3x3() {
        // [2 1 0; 0 4 2; 0 0 8]
        let mut a = vec![2.0, 0.0, 0.0, 1.0, 4.0, 0.0, 0.0, 2.0, 8.0];
        let dinv = invert(Uplo::Upper, Diag::NonUnit, &mut a, 3);
        let at = |i: usize, j: usize| dinv[j * 16 + i];
        assert_eq!(at(0, 0), 0.5);
        assert_eq!(at(0, 1), -0.125);
        assert_eq!(at(1, 1), 0.25);
        assert_eq!(at(0, 2), 0.03125);
        assert_eq!(at(1, 2), -0.0625);
        assert_eq!(at(2, 2), 0.125);
        assert_eq!(at(1, 0), 0.0);
        // Padding beyond n is never written
        assert_eq!(at(3, 3), 0.0);
    }

    #[test]
    fn test_lower_unit_ignores_diagonal() {
        // [x 0; 3 x] with NaN on the diagonal
        let mut a = vec![f64::NAN, 3.0, 0.0, f64::NAN];
        let dinv = invert(Uplo::Lower, Diag::Unit, &mut a, 2);
        assert_eq!(dinv[0], 1.0);
        assert_eq!(dinv[1], -3.0);
        assert_eq!(dinv[16], 0.0);
        assert_eq!(dinv[17], 1.0);
    }

    #[test]
    fn test_zero_pivot_propagates() {
        let mut a = vec![0.0, 0.0, 1.0, 1.0];
        let dinv = invert(Uplo::Upper, Diag::NonUnit, &mut a, 2);
        assert!(!dinv[0].is_finite());
    }
}
