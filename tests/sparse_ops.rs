//! Integration tests for CSR storage and sparse norms

mod common;

use blocktri::error::Error;
use blocktri::runtime::cpu::CpuRuntime;
use blocktri::sparse::{CsrData, frobenius_diff};
use common::create_cpu_client;

/// Tridiagonal n×n matrix with `diag` on the diagonal and -1 beside it
fn tridiagonal(n: usize, diag: f64) -> (Vec<i64>, Vec<i64>, Vec<f64>) {
    let mut ptrs = vec![0i64];
    let mut cols = Vec::new();
    let mut vals = Vec::new();
    for i in 0..n {
        for j in i.saturating_sub(1)..(i + 2).min(n) {
            cols.push(j as i64);
            vals.push(if i == j { diag } else { -1.0 });
        }
        ptrs.push(cols.len() as i64);
    }
    (ptrs, cols, vals)
}

#[test]
fn test_frobenius_diff_of_shifted_diagonal() {
    let (_client, device) = create_cpu_client();
    let n = 50;
    let (p, c, v) = tridiagonal(n, 2.0);
    let a = CsrData::<CpuRuntime, f64>::from_host(&p, &c, &v, [n, n], &device).unwrap();
    let (p, c, v) = tridiagonal(n, 2.5);
    let b = CsrData::<CpuRuntime, f64>::from_host(&p, &c, &v, [n, n], &device).unwrap();

    let d = frobenius_diff(&a, &b).unwrap();
    assert!((d - 0.5 * (n as f64).sqrt()).abs() < 1e-12);
    assert_eq!(frobenius_diff(&a, &a).unwrap(), 0.0);
}

#[test]
fn test_frobenius_diff_rejects_shape_mismatch() {
    let (_client, device) = create_cpu_client();
    let (p, c, v) = tridiagonal(4, 2.0);
    let a = CsrData::<CpuRuntime, f64>::from_host(&p, &c, &v, [4, 4], &device).unwrap();
    let b = CsrData::<CpuRuntime, f64>::from_host(&p, &c, &v, [4, 5], &device).unwrap();
    assert!(matches!(
        frobenius_diff(&a, &b),
        Err(Error::ShapeMismatch { .. })
    ));
}

#[test]
fn test_empty_rows() {
    let (_client, device) = create_cpu_client();
    let a = CsrData::<CpuRuntime, f32>::from_host(&[0, 0, 1, 1], &[2], &[3.0], [3, 3], &device).unwrap();
    let b = CsrData::<CpuRuntime, f32>::from_host(&[0, 0, 0, 1], &[2], &[9.0], [3, 3], &device).unwrap();
    assert_eq!(a.nnz(), 1);
    // No (row, col) pair is stored in both
    assert_eq!(frobenius_diff(&a, &b).unwrap(), 0.0);
}
