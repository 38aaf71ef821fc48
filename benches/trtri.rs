#![allow(dead_code)]

use fluxbench::{Bencher, flux};
use std::hint::black_box;

use blocktri::algorithm::TRTRI_NB;
use blocktri::prelude::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Deterministic upper triangle with a dominant diagonal
fn upper_triangle(n: usize) -> Vec<f64> {
    let mut a = vec![0.0; n * n];
    for j in 0..n {
        for i in 0..j {
            a[j * n + i] = ((i * 17 + j * 5 + 3) % 1000) as f64 / (1000.0 * n as f64);
        }
        a[j * n + j] = 1.0 + (j % 7) as f64 / 7.0;
    }
    a
}

fn setup(n: usize) -> (CpuClient, Buffer<CpuRuntime, f64>, Buffer<CpuRuntime, f64>) {
    let device = CpuDevice::new();
    let client = CpuRuntime::default_client(&device);
    let a = Buffer::from_slice(&upper_triangle(n), &device).unwrap();
    let dinv = Buffer::zeros(inverse_buffer_len(n, full_inverse_nb(n)), &device).unwrap();
    (client, a, dinv)
}

// ---------------------------------------------------------------------------
// Full inverse (parameterized)
// ---------------------------------------------------------------------------

#[flux::bench(group = "trtri_f64", args = [64, 128, 256, 512])]
fn trtri_full(b: &mut Bencher, n: usize) {
    let (client, a, mut dinv) = setup(n);
    b.iter(|| {
        client
            .trtri(Uplo::Upper, Diag::NonUnit, n as i64, &a, n as i64, &mut dinv)
            .unwrap();
        black_box(&dinv);
    });
}

// ---------------------------------------------------------------------------
// Diagonal blocks only
// ---------------------------------------------------------------------------

#[flux::bench(group = "trtri_diag_f64", args = [256, 1024])]
fn trtri_diag_nb(b: &mut Bencher, n: usize) {
    let (client, a, _) = setup(n);
    let mut dinv = Buffer::zeros(inverse_buffer_len(n, TRTRI_NB), a.device()).unwrap();
    b.iter(|| {
        client
            .trtri_diag(Uplo::Upper, Diag::NonUnit, n as i64, &a, n as i64, &mut dinv, TRTRI_NB as i64)
            .unwrap();
        black_box(&dinv);
    });
}

#[flux::compare(id = "tscale_128", title = "TRTRI Scaling", benchmarks = ["trtri_full@128"], group = "trtri_scaling", x = "128")]
struct TScale128;

#[flux::compare(id = "tscale_256", title = "TRTRI Scaling", benchmarks = ["trtri_full@256"], group = "trtri_scaling", x = "256")]
struct TScale256;

#[flux::compare(id = "tscale_512", title = "TRTRI Scaling", benchmarks = ["trtri_full@512"], group = "trtri_scaling", x = "512")]
struct TScale512;

fn main() {
    fluxbench_cli::run().unwrap();
}
