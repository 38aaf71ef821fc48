//! CPU implementation of the blocked Cholesky factorization

use super::client::CpuClient;
use super::kernels::{PanelSolveKernel, Potf2Kernel, PotrfStep, TrailingUpdateKernel, panel_config};
use super::launch::CpuLauncher;
use super::runtime::CpuRuntime;
use super::trtri::scratch_requirement;
use crate::algorithm::cholesky::validate_potrf_args;
use crate::algorithm::trtri::TrtriArgs;
use crate::algorithm::trtri::pipeline::BarrierMode;
use crate::algorithm::{CholeskyFactorization, Diag, POTRF_NB, Uplo};
use crate::buffer::Buffer;
use crate::dtype::LinalgElement;
use crate::error::Result;
use crate::runtime::RuntimeClient;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, error};

const NO_INFO: usize = usize::MAX;

impl CholeskyFactorization<CpuRuntime> for CpuClient {
    fn potrf<T: LinalgElement>(
        &self,
        uplo: Uplo,
        n: i64,
        a: &mut Buffer<CpuRuntime, T>,
        lda: i64,
    ) -> Result<usize> {
        let Some(args) = validate_potrf_args(uplo, n, a.len(), lda)? else {
            return Ok(0);
        };
        let (n, lda) = (args.n, args.lda);
        debug!(n, lda, ?uplo, nb = POTRF_NB, "potrf");

        // Inverse of the current diagonal block, one nb×nb tile
        let dinv = Buffer::<CpuRuntime, T>::zeros(POTRF_NB * POTRF_NB, self.device())?;
        let diag_args = TrtriArgs {
            uplo,
            diag: Diag::NonUnit,
            n: POTRF_NB,
            lda,
            nb: POTRF_NB,
        };
        let first = PotrfStep {
            uplo,
            n,
            lda,
            j: 0,
            jb: POTRF_NB.min(n),
        };
        let arena = scratch_requirement(&diag_args).max(panel_config(&first).arena_elems());
        let mut launcher = CpuLauncher::new(self, arena);

        // SAFETY: a and dinv outlive the launcher, which drains on drop
        let (a_ptr, dinv_ptr) = unsafe { (a.device_ptr(), dinv.device_ptr()) };
        let info = Arc::new(AtomicUsize::new(NO_INFO));

        for j in (0..n).step_by(POTRF_NB) {
            let step = PotrfStep {
                jb: POTRF_NB.min(n - j),
                j,
                ..first
            };

            launcher.launch(Potf2Kernel::new(a_ptr, step, Arc::clone(&info)))?;
            launcher.barrier();
            let local = info.load(Ordering::Acquire);
            if local != NO_INFO {
                debug!(info = j + local, "matrix is not positive definite");
                return Ok(j + local);
            }

            if step.trailing() == 0 {
                break;
            }

            // Full blocks only reach this point, so jb == POTRF_NB
            // SAFETY: (j, j) lies inside the validated matrix
            let block = unsafe { a_ptr.offset(j * lda + j) };
            self.run_trtri_on(&mut launcher, &diag_args, block, dinv_ptr, BarrierMode::Full)?;

            launcher
                .launch(PanelSolveKernel::new(a_ptr, dinv_ptr, POTRF_NB, step))
                .inspect_err(|e| error!(error = %e, "potrf panel solve rejected"))?;
            launcher.barrier();

            launcher
                .launch(TrailingUpdateKernel::new(a_ptr, step))
                .inspect_err(|e| error!(error = %e, "potrf trailing update rejected"))?;
            launcher.barrier();
        }

        Ok(0)
    }
}
