//! Norms comparing sparse matrices

use super::CsrData;
use crate::dtype::LinalgElement;
use crate::error::{Error, Result};
use crate::runtime::Runtime;

/// Frobenius norm of the real part of `a - b`
///
/// Both matrices must share a sparsity pattern: every stored entry of `a` is
/// compared with the entries of `b` stored at the same (row, col), and
/// entries present in only one matrix are ignored.
pub fn frobenius_diff<R: Runtime, T: LinalgElement>(
    a: &CsrData<R, T>,
    b: &CsrData<R, T>,
) -> Result<f64> {
    if a.shape() != b.shape() {
        return Err(Error::ShapeMismatch {
            expected: a.shape().to_vec(),
            got: b.shape().to_vec(),
        });
    }

    let (a_ptrs, a_cols, a_vals) = a.to_host()?;
    let (b_ptrs, b_cols, b_vals) = b.to_host()?;

    let mut sum = 0.0f64;
    for row in 0..a.nrows() {
        let b_row = b_ptrs[row] as usize..b_ptrs[row + 1] as usize;
        for j in a_ptrs[row] as usize..a_ptrs[row + 1] as usize {
            for k in b_row.clone() {
                if b_cols[k] == a_cols[j] {
                    let d = a_vals[j].real_val() - b_vals[k].real_val();
                    sum += d * d;
                }
            }
        }
    }
    Ok(sum.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::Complex64;
    use crate::runtime::cpu::{CpuDevice, CpuRuntime};

    #[test]
    fn test_matching_entries_only() {
        let device = CpuDevice::new();
        let a = CsrData::<CpuRuntime, f64>::from_host(&[0, 2, 3], &[0, 1, 1], &[1.0, 2.0, 3.0], [2, 2], &device)
            .unwrap();
        // (1, 0) is only in b and is ignored
        let b = CsrData::<CpuRuntime, f64>::from_host(
            &[0, 2, 4],
            &[0, 1, 0, 1],
            &[1.0, 5.0, 9.0, 7.0],
            [2, 2],
            &device,
        )
        .unwrap();
        let d = frobenius_diff(&a, &b).unwrap();
        assert!((d - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_imaginary_part_is_ignored() {
        let device = CpuDevice::new();
        let a = CsrData::<CpuRuntime, Complex64>::from_host(
            &[0, 1],
            &[0],
            &[Complex64::new(1.0, 3.0)],
            [1, 1],
            &device,
        )
        .unwrap();
        let b = CsrData::<CpuRuntime, Complex64>::from_host(
            &[0, 1],
            &[0],
            &[Complex64::new(1.0, -8.0)],
            [1, 1],
            &device,
        )
        .unwrap();
        assert_eq!(frobenius_diff(&a, &b).unwrap(), 0.0);
    }

    #[test]
    fn test_shape_mismatch() {
        let device = CpuDevice::new();
        let a = CsrData::<CpuRuntime, f32>::from_host(&[0, 0], &[], &[], [1, 2], &device).unwrap();
        let b = CsrData::<CpuRuntime, f32>::from_host(&[0, 0], &[], &[], [1, 3], &device).unwrap();
        assert!(frobenius_diff(&a, &b).is_err());
    }
}
