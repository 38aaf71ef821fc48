//! CPU implementation of triangular inversion

use super::client::CpuClient;
use super::kernels::{
    CouplingProductKernel, DiagInverseKernel, InPlaceCorrectionKernel, StagedCorrectionKernel,
    StagedWritebackKernel, phase_config,
};
use super::launch::CpuLauncher;
use super::queue::Queue;
use super::runtime::CpuRuntime;
use crate::algorithm::trtri::pipeline::{BarrierMode, PipelineState, TrtriBackend, run_pipeline};
use crate::algorithm::trtri::tier::{InverseGeometry, PhaseKind, TierGeometry, tier_schedule};
use crate::algorithm::trtri::{TrtriArgs, validate_args};
use crate::algorithm::{DIAG_BLOCK, Diag, TriangularInverse, Uplo, inverse_buffer_len};
use crate::buffer::Buffer;
use crate::dtype::LinalgElement;
use crate::error::Result;
use crate::runtime::{Allocator, DevicePtr, LaunchConfig, RuntimeClient};
use tracing::error;

/// Launches the trtri kernels of one call on a CPU launcher
pub(crate) struct CpuTrtriBackend<'l, 'c, T: LinalgElement> {
    launcher: &'l mut CpuLauncher<'c, T>,
    client: &'c CpuClient,
    a: DevicePtr<T>,
    dinv: DevicePtr<T>,
    dinv_elems: usize,
}

impl<'l, 'c, T: LinalgElement> CpuTrtriBackend<'l, 'c, T> {
    pub(crate) fn new(
        launcher: &'l mut CpuLauncher<'c, T>,
        client: &'c CpuClient,
        a: DevicePtr<T>,
        dinv: DevicePtr<T>,
        args: &TrtriArgs,
    ) -> Self {
        Self {
            launcher,
            client,
            a,
            dinv,
            dinv_elems: inverse_buffer_len(args.n, args.nb),
        }
    }
}

impl<T: LinalgElement> TrtriBackend for CpuTrtriBackend<'_, '_, T> {
    fn zero_inverse(&mut self) -> Result<()> {
        let bytes = self.dinv_elems * T::DTYPE.size_in_bytes();
        // SAFETY: validation guarantees d_dinv holds dinv_elems elements
        unsafe { self.client.allocator().memset(self.dinv.addr(), 0, bytes) }
    }

    fn launch_diag(&mut self, geometry: &InverseGeometry) -> Result<()> {
        self.launcher
            .launch(DiagInverseKernel::new(self.a, self.dinv, *geometry))
    }

    fn launch_phase(&mut self, phase: PhaseKind, tier: &TierGeometry) -> Result<()> {
        let tier = *tier;
        match phase {
            PhaseKind::CouplingProduct => self
                .launcher
                .launch(CouplingProductKernel::new(self.a, self.dinv, tier)),
            PhaseKind::InPlaceCorrection => self
                .launcher
                .launch(InPlaceCorrectionKernel::new(self.dinv, tier)),
            PhaseKind::StagedCorrection => self
                .launcher
                .launch(StagedCorrectionKernel::new(self.dinv, tier)),
            PhaseKind::StagedWriteback => self
                .launcher
                .launch(StagedWritebackKernel::new(self.dinv, tier)),
        }
    }

    fn barrier(&mut self) -> Result<()> {
        self.launcher.barrier();
        Ok(())
    }
}

/// Scratch elements needed by the largest launch of an inversion
pub(crate) fn scratch_requirement(args: &TrtriArgs) -> usize {
    let geometry = InverseGeometry::from(args);
    let diag = LaunchConfig::new(geometry.diag_blocks(), DIAG_BLOCK, DIAG_BLOCK * DIAG_BLOCK);
    tier_schedule(args.n, args.nb)
        .iter()
        .flat_map(|tier| {
            let tier_geometry = TierGeometry::new(geometry, tier.block_size);
            tier.phases
                .iter()
                .map(move |&phase| phase_config(phase, &tier_geometry).arena_elems())
        })
        .fold(diag.arena_elems(), usize::max)
}

impl CpuClient {
    /// Run the inversion pipeline on raw device views
    pub(crate) fn run_trtri<T: LinalgElement>(
        &self,
        args: &TrtriArgs,
        a: DevicePtr<T>,
        dinv: DevicePtr<T>,
        mode: BarrierMode,
    ) -> Result<Vec<PipelineState>> {
        let mut launcher = CpuLauncher::new(self, scratch_requirement(args));
        self.run_trtri_on(&mut launcher, args, a, dinv, mode)
    }

    /// Run the inversion pipeline on an existing launcher
    pub(crate) fn run_trtri_on<'c, T: LinalgElement>(
        &'c self,
        launcher: &mut CpuLauncher<'c, T>,
        args: &TrtriArgs,
        a: DevicePtr<T>,
        dinv: DevicePtr<T>,
        mode: BarrierMode,
    ) -> Result<Vec<PipelineState>> {
        let mut backend = CpuTrtriBackend::new(launcher, self, a, dinv, args);
        run_pipeline(&mut backend, args, mode).inspect_err(|e| {
            error!(error = %e, n = args.n, nb = args.nb, "trtri aborted");
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn trtri_sync<T: LinalgElement>(
        &self,
        uplo: Uplo,
        diag: Diag,
        n: i64,
        a: &Buffer<CpuRuntime, T>,
        lda: i64,
        d_dinv: &mut Buffer<CpuRuntime, T>,
        nb: Option<i64>,
    ) -> Result<()> {
        let Some(args) = validate_args(uplo, diag, n, a.len(), lda, d_dinv.len(), nb)? else {
            return Ok(());
        };
        // SAFETY: both buffers outlive the call, which completes every launch
        let (a_ptr, dinv_ptr) = unsafe { (a.device_ptr(), d_dinv.device_ptr()) };
        self.run_trtri(&args, a_ptr, dinv_ptr, BarrierMode::Full)?;
        Ok(())
    }

    /// Enqueue a full inversion on `queue`
    ///
    /// Arguments are validated before anything is enqueued; execution
    /// errors surface from [`Queue::synchronize`]. The buffers are kept
    /// alive until the job has run.
    ///
    /// # Safety
    ///
    /// The job writes `d_dinv` and reads `a` on the queue's worker after this
    /// call returns. Neither buffer, nor any clone of it, may be read or
    /// written until `queue.synchronize()` has returned.
    #[allow(clippy::too_many_arguments)]
    pub unsafe fn trtri_async<T: LinalgElement>(
        &self,
        uplo: Uplo,
        diag: Diag,
        n: i64,
        a: &Buffer<CpuRuntime, T>,
        lda: i64,
        d_dinv: &mut Buffer<CpuRuntime, T>,
        queue: &Queue,
    ) -> Result<()> {
        let Some(args) = validate_args(uplo, diag, n, a.len(), lda, d_dinv.len(), None)? else {
            return Ok(());
        };
        let client = self.clone();
        let a = a.clone();
        let dinv = d_dinv.clone();
        queue.submit(move || {
            // SAFETY: the clones keep both allocations alive and the caller
            // keeps every other access out until the queue drains
            let (a_ptr, dinv_ptr) = unsafe { (a.device_ptr(), dinv.device_ptr()) };
            client
                .run_trtri(&args, a_ptr, dinv_ptr, BarrierMode::Full)
                .map(|_| ())
        })
    }
}

impl TriangularInverse<CpuRuntime> for CpuClient {
    fn trtri<T: LinalgElement>(
        &self,
        uplo: Uplo,
        diag: Diag,
        n: i64,
        a: &Buffer<CpuRuntime, T>,
        lda: i64,
        d_dinv: &mut Buffer<CpuRuntime, T>,
    ) -> Result<()> {
        self.trtri_sync(uplo, diag, n, a, lda, d_dinv, None)
    }

    fn trtri_diag<T: LinalgElement>(
        &self,
        uplo: Uplo,
        diag: Diag,
        n: i64,
        a: &Buffer<CpuRuntime, T>,
        lda: i64,
        d_dinv: &mut Buffer<CpuRuntime, T>,
        nb: i64,
    ) -> Result<()> {
        self.trtri_sync(uplo, diag, n, a, lda, d_dinv, Some(nb))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::{InverseLayout, full_inverse_nb};
    use crate::runtime::cpu::CpuDevice;

    /// Upper triangular test matrix with a dominant diagonal
    fn upper_matrix(n: usize) -> Vec<f64> {
        let mut a = vec![0.0; n * n];
        for j in 0..n {
            for i in 0..=j {
                a[j * n + i] = if i == j {
                    2.0 + (i % 3) as f64
                } else {
                    ((i * 7 + j * 3) % 5) as f64 * 0.1 - 0.2
                };
            }
        }
        a
    }

    fn residual(a: &[f64], inv: &[f64], n: usize) -> f64 {
        let mut worst = 0.0f64;
        for j in 0..n {
            for i in 0..n {
                let mut s = 0.0;
                for k in 0..n {
                    s += a[k * n + i] * inv[j * n + k];
                }
                let expected = if i == j { 1.0 } else { 0.0 };
                worst = worst.max((s - expected).abs());
            }
        }
        worst
    }

    fn invert(client: &CpuClient, n: usize, mode: BarrierMode) -> Vec<f64> {
        let device = client.device();
        let a_host = upper_matrix(n);
        let a = Buffer::<CpuRuntime, f64>::from_slice(&a_host, device).unwrap();
        let nb = full_inverse_nb(n);
        let dinv = Buffer::<CpuRuntime, f64>::zeros(inverse_buffer_len(n, nb), device).unwrap();
        let args = validate_args(
            Uplo::Upper,
            Diag::NonUnit,
            n as i64,
            a.len(),
            n as i64,
            dinv.len(),
            None,
        )
        .unwrap()
        .unwrap();
        let (a_ptr, dinv_ptr) = unsafe { (a.device_ptr(), dinv.device_ptr()) };
        client.run_trtri(&args, a_ptr, dinv_ptr, mode).unwrap();
        InverseLayout::full(n)
            .to_dense(&dinv.to_vec().unwrap())
            .unwrap()
    }

    #[test]
    fn test_full_barriers_invert() {
        let client = CpuClient::new(CpuDevice::new());
        let n = 150;
        let inv = invert(&client, n, BarrierMode::Full);
        assert!(residual(&upper_matrix(n), &inv, n) < 1e-10);
    }

    #[test]
    fn test_elided_barriers_corrupt_result() {
        let client = CpuClient::new(CpuDevice::new());
        let n = 150;
        let inv = invert(&client, n, BarrierMode::ElideWithinTier);
        assert!(residual(&upper_matrix(n), &inv, n) > 1e-3);
    }

    #[test]
    fn test_scratch_requirement_covers_every_launch() {
        let args = TrtriArgs {
            uplo: Uplo::Lower,
            diag: Diag::Unit,
            n: 200,
            lda: 200,
            nb: 256,
        };
        // Staged correction at jb = 128: 1 page × 64 tiles × 64×16 scratch
        assert_eq!(scratch_requirement(&args), 64 * 64 * 16);
    }
}
