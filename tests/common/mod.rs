//! Common test utilities
#![allow(dead_code)]

use blocktri::algorithm::{Diag, Uplo};
use blocktri::config::DeviceConfig;
use blocktri::dtype::{Complex64, Complex128, LinalgElement};
use blocktri::runtime::cpu::{CpuClient, CpuDevice, CpuRuntime};
use blocktri::runtime::{PointerRegistry, Runtime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

/// Install a subscriber honoring `RUST_LOG`; later calls are ignored
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Create a CPU client and device for testing
pub fn create_cpu_client() -> (CpuClient, CpuDevice) {
    let device = CpuDevice::new();
    let client = CpuRuntime::default_client(&device);
    (client, device)
}

/// Create a CPU client whose device records every allocation
pub fn create_tracked_client(config: DeviceConfig) -> (CpuClient, CpuDevice, Arc<PointerRegistry>) {
    let registry = Arc::new(PointerRegistry::new());
    let device = CpuDevice::with_tracker(config, registry.clone()).unwrap();
    let client = CpuRuntime::default_client(&device);
    (client, device, registry)
}

/// Element types the tests draw random matrices for
pub trait Sample: LinalgElement {
    /// Tolerance for comparisons relative to magnitude
    const TOL: f64;

    /// Random value with real (and imaginary) part in `[lo, hi)`
    fn sample(rng: &mut StdRng, lo: f64, hi: f64) -> Self;
}

impl Sample for f32 {
    const TOL: f64 = 5e-4;

    fn sample(rng: &mut StdRng, lo: f64, hi: f64) -> Self {
        rng.random_range(lo..hi) as f32
    }
}

impl Sample for f64 {
    const TOL: f64 = 1e-11;

    fn sample(rng: &mut StdRng, lo: f64, hi: f64) -> Self {
        rng.random_range(lo..hi)
    }
}

impl Sample for Complex64 {
    const TOL: f64 = 5e-4;

    fn sample(rng: &mut StdRng, lo: f64, hi: f64) -> Self {
        Complex64::new(rng.random_range(lo..hi) as f32, rng.random_range(lo..hi) as f32)
    }
}

impl Sample for Complex128 {
    const TOL: f64 = 1e-11;

    fn sample(rng: &mut StdRng, lo: f64, hi: f64) -> Self {
        Complex128::new(rng.random_range(lo..hi), rng.random_range(lo..hi))
    }
}

/// NaN sentinel for entries a routine must not read
pub fn sentinel<T: LinalgElement>() -> T {
    T::from_real(f64::NAN)
}

/// Random well-conditioned triangular matrix, column-major with leading dimension `lda`
///
/// Entries outside the triangle (and rows `n..lda`) hold `fill`. The
/// off-diagonal is scaled by `1/n` so the inverse stays well conditioned.
pub fn random_triangular<T: Sample>(uplo: Uplo, n: usize, lda: usize, seed: u64, fill: T) -> Vec<T> {
    let mut rng = StdRng::seed_from_u64(seed);
    let scale = 1.0 / n.max(1) as f64;
    let mut a = vec![fill; lda * n];
    for j in 0..n {
        for i in 0..n {
            let in_triangle = match uplo {
                Uplo::Upper => i < j,
                Uplo::Lower => i > j,
            };
            if i == j {
                a[j * lda + i] = T::from_real(rng.random_range(1.0..2.0));
            } else if in_triangle {
                a[j * lda + i] = T::sample(&mut rng, -scale, scale);
            }
        }
    }
    a
}

/// Dense n×n inverse of a triangular matrix by column substitution
pub fn reference_inverse<T: LinalgElement>(
    uplo: Uplo,
    diag: Diag,
    n: usize,
    a: &[T],
    lda: usize,
) -> Vec<T> {
    let at = |i: usize, j: usize| a[j * lda + i];
    let pivot = |i: usize| match diag {
        Diag::Unit => T::one(),
        Diag::NonUnit => at(i, i),
    };
    let mut x = vec![T::zero(); n * n];
    for j in 0..n {
        x[j * n + j] = pivot(j).recip_val();
        match uplo {
            Uplo::Upper => {
                for i in (0..j).rev() {
                    let mut s = T::zero();
                    for k in i + 1..=j {
                        s = s + at(i, k) * x[j * n + k];
                    }
                    x[j * n + i] = -s / pivot(i);
                }
            }
            Uplo::Lower => {
                for i in j + 1..n {
                    let mut s = T::zero();
                    for k in j..i {
                        s = s + at(i, k) * x[j * n + k];
                    }
                    x[j * n + i] = -s / pivot(i);
                }
            }
        }
    }
    x
}

/// Random Hermitian positive definite matrix, full storage with leading dimension `lda`
pub fn hpd_matrix<T: Sample>(n: usize, lda: usize, seed: u64) -> Vec<T> {
    let mut rng = StdRng::seed_from_u64(seed);
    let b: Vec<T> = (0..n * n).map(|_| T::sample(&mut rng, -1.0, 1.0)).collect();
    let mut a = vec![T::zero(); lda * n];
    for j in 0..n {
        for i in 0..n {
            let mut s = T::zero();
            for k in 0..n {
                s = s + b[k * n + i] * b[k * n + j].conj_val();
            }
            if i == j {
                s = T::from_real(s.real_val() + n as f64);
            }
            a[j * lda + i] = s;
        }
    }
    a
}

/// Assert every element of `got` is within `tol·(1 + |expected|)` of `expected`
pub fn assert_close<T: LinalgElement>(got: &[T], expected: &[T], tol: f64, msg: &str) {
    assert_eq!(got.len(), expected.len(), "{}: length mismatch", msg);
    for (i, (&x, &y)) in got.iter().zip(expected.iter()).enumerate() {
        let diff = (x - y).abs_val();
        let bound = tol * (1.0 + y.abs_val());
        assert!(
            diff <= bound,
            "{}: element {} differs: {:?} vs {:?} (diff={}, tol={})",
            msg,
            i,
            x,
            y,
            diff,
            bound
        );
    }
}

/// Assert two f64 slices are close within tolerance
///
/// Uses the formula: |a - b| <= atol + rtol * |b|
pub fn assert_allclose_f64(a: &[f64], b: &[f64], rtol: f64, atol: f64, msg: &str) {
    assert_eq!(a.len(), b.len(), "{}: length mismatch", msg);
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let diff = (x - y).abs();
        let tol = atol + rtol * y.abs();
        assert!(
            diff <= tol,
            "{}: element {} differs: {} vs {} (diff={}, tol={})",
            msg,
            i,
            x,
            y,
            diff,
            tol
        );
    }
}
