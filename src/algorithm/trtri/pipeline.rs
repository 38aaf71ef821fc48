//! Tier orchestration shared by every backend
//!
//! The orchestrator owns the launch order and the device-wide barriers; a
//! backend only knows how to launch one kernel of a given kind. Progress is
//! tracked by a [`PipelineState`] machine that rejects any out-of-order
//! transition.

use super::TrtriArgs;
use super::tier::{InverseGeometry, PhaseKind, TierDescriptor, TierGeometry, tier_schedule};
use crate::error::{Error, Result};
use tracing::{debug, trace};

/// Kernel launches a backend provides to the orchestrator
pub(crate) trait TrtriBackend {
    /// Zero the whole inverse buffer
    fn zero_inverse(&mut self) -> Result<()>;

    /// Launch the 16×16 diagonal block inversion
    fn launch_diag(&mut self, geometry: &InverseGeometry) -> Result<()>;

    /// Launch one phase of a tier
    fn launch_phase(&mut self, phase: PhaseKind, tier: &TierGeometry) -> Result<()>;

    /// Wait until every launched kernel has completed
    fn barrier(&mut self) -> Result<()>;
}

/// Progress of one inversion
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum PipelineState {
    Idle,
    DiagonalsReady,
    /// `phase` (1-based) of the tier of `block_size` has completed
    PhaseDone { block_size: usize, phase: usize },
    Complete,
}

impl PipelineState {
    /// Whether `next` may directly follow `self`
    fn allows(self, next: PipelineState) -> bool {
        use PipelineState::*;
        match (self, next) {
            (Idle, DiagonalsReady) => true,
            (DiagonalsReady, Complete) => true,
            (DiagonalsReady, PhaseDone { block_size, phase }) => {
                block_size == super::DIAG_BLOCK && phase == 1
            }
            (
                PhaseDone { block_size, phase },
                PhaseDone {
                    block_size: next_size,
                    phase: next_phase,
                },
            ) => {
                let phases = TierDescriptor::for_block_size(block_size).phases.len();
                if phase < phases {
                    next_size == block_size && next_phase == phase + 1
                } else {
                    next_size == 2 * block_size && next_phase == 1
                }
            }
            (PhaseDone { block_size, phase }, Complete) => {
                phase == TierDescriptor::for_block_size(block_size).phases.len()
            }
            _ => false,
        }
    }
}

/// Barrier placement between the phases of a tier
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum BarrierMode {
    /// Barrier after every phase
    Full,
    /// Barrier only at the end of each tier; produces wrong results
    #[cfg_attr(not(test), allow(dead_code))]
    ElideWithinTier,
}

#[derive(Debug)]
struct StateMachine {
    state: PipelineState,
    trace: Vec<PipelineState>,
}

impl StateMachine {
    fn new() -> Self {
        Self {
            state: PipelineState::Idle,
            trace: vec![PipelineState::Idle],
        }
    }

    fn advance(&mut self, next: PipelineState) -> Result<()> {
        if !self.state.allows(next) {
            tracing::error!(from = ?self.state, to = ?next, "invalid pipeline transition");
            return Err(Error::Internal(format!(
                "invalid pipeline transition {:?} -> {:?}",
                self.state, next
            )));
        }
        trace!(from = ?self.state, to = ?next, "pipeline transition");
        self.state = next;
        self.trace.push(next);
        Ok(())
    }
}

/// Run the whole inversion pipeline on `backend`
///
/// Returns the sequence of states visited, starting with `Idle`.
pub(crate) fn run_pipeline<B: TrtriBackend>(
    backend: &mut B,
    args: &TrtriArgs,
    mode: BarrierMode,
) -> Result<Vec<PipelineState>> {
    let geometry = InverseGeometry::from(args);
    let tiers = tier_schedule(args.n, args.nb);
    debug!(
        n = args.n,
        nb = args.nb,
        uplo = ?args.uplo,
        diag = ?args.diag,
        tiers = tiers.len(),
        "trtri"
    );

    let mut machine = StateMachine::new();

    backend.zero_inverse()?;
    backend.launch_diag(&geometry)?;
    backend.barrier()?;
    machine.advance(PipelineState::DiagonalsReady)?;

    for tier in &tiers {
        let tier_geometry = TierGeometry::new(geometry, tier.block_size);
        for (i, &phase) in tier.phases.iter().enumerate() {
            backend.launch_phase(phase, &tier_geometry)?;
            let last = i + 1 == tier.phases.len();
            if mode == BarrierMode::Full || last {
                backend.barrier()?;
            }
            machine.advance(PipelineState::PhaseDone {
                block_size: tier.block_size,
                phase: i + 1,
            })?;
        }
    }

    machine.advance(PipelineState::Complete)?;
    Ok(machine.trace)
}
