//! Team kernels of the CPU runtime

mod potrf;
mod trtri_diag;
mod triple_gemm;

pub(crate) use potrf::{
    PanelSolveKernel, Potf2Kernel, PotrfStep, TrailingUpdateKernel, panel_config,
};
pub(crate) use trtri_diag::DiagInverseKernel;
pub(crate) use triple_gemm::{
    CouplingProductKernel, InPlaceCorrectionKernel, StagedCorrectionKernel,
    StagedWritebackKernel, phase_config,
};
