//! Team-kernel launcher for the CPU runtime
//!
//! Launches are queued, not executed: a launch only runs when the next
//! [`CpuLauncher::barrier`] drains the queue. Pending launches are executed
//! latest-first, which models a device that gives no ordering guarantee
//! between launches not separated by a barrier. A caller that forgets a
//! barrier between dependent launches therefore sees the dependency
//! violated every time rather than only under a lucky schedule.

use super::client::CpuClient;
use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::runtime::{LaunchConfig, Team, TeamKernel};
use tracing::trace;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Per-team scratch tiles for a whole grid
///
/// Sized once up front for the largest launch of a call and reused by every
/// launch. Contents are undefined at the start of a team.
#[derive(Debug)]
pub(crate) struct ScratchArena<T> {
    data: Vec<T>,
}

impl<T: Element> ScratchArena<T> {
    pub(crate) fn with_capacity(elems: usize) -> Self {
        Self {
            data: vec![T::zero(); elems],
        }
    }

    fn tiles(&mut self, elems: usize) -> &mut [T] {
        if self.data.len() < elems {
            trace!(from = self.data.len(), to = elems, "growing scratch arena");
            self.data.resize(elems, T::zero());
        }
        &mut self.data[..elems]
    }
}

/// Queues team-kernel launches against a client and runs them at barriers
pub(crate) struct CpuLauncher<'c, T: Element> {
    client: &'c CpuClient,
    pending: Vec<Box<dyn TeamKernel<T> + Send>>,
    arena: ScratchArena<T>,
}

impl<'c, T: Element> CpuLauncher<'c, T> {
    /// Create a launcher with `arena_elems` scratch elements preallocated
    pub(crate) fn new(client: &'c CpuClient, arena_elems: usize) -> Self {
        Self {
            client,
            pending: Vec::new(),
            arena: ScratchArena::with_capacity(arena_elems),
        }
    }

    /// Validate and enqueue a launch
    pub(crate) fn launch<K>(&mut self, kernel: K) -> Result<()>
    where
        K: TeamKernel<T> + Send + 'static,
    {
        let cfg = kernel.config();
        self.check(kernel.name(), &cfg)?;
        self.client.stats().record_launch();
        trace!(
            kernel = kernel.name(),
            teams = cfg.teams,
            team_size = cfg.team_size,
            scratch_bytes = cfg.scratch_bytes::<T>(),
            "launch"
        );
        if cfg.teams > 0 {
            self.pending.push(Box::new(kernel));
        }
        Ok(())
    }

    fn check(&self, name: &'static str, cfg: &LaunchConfig) -> Result<()> {
        if cfg.team_size == 0 {
            return Err(Error::kernel_launch(name, "team size must be positive"));
        }
        let limit = self.client.device.config().shared_memory_per_team;
        let requested = cfg.scratch_bytes::<T>();
        if requested > limit {
            return Err(Error::kernel_launch(
                name,
                format!(
                    "requests {} scratch bytes per team, device provides {}",
                    requested, limit
                ),
            ));
        }
        Ok(())
    }

    /// Device-wide barrier: run every pending launch to completion
    pub(crate) fn barrier(&mut self) {
        self.client.stats().record_barrier();
        trace!(pending = self.pending.len(), "barrier");
        while let Some(kernel) = self.pending.pop() {
            let cfg = kernel.config();
            let scratch = self.arena.tiles(cfg.arena_elems());
            run_grid(self.client, kernel.as_ref(), &cfg, scratch);
        }
    }

    #[cfg(test)]
    fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl<T: Element> Drop for CpuLauncher<'_, T> {
    fn drop(&mut self) {
        // Nothing is left in flight once the launcher goes away
        if !self.pending.is_empty() {
            self.barrier();
        }
    }
}

#[cfg(feature = "rayon")]
fn run_grid<T: Element>(
    client: &CpuClient,
    kernel: &(dyn TeamKernel<T> + Send),
    cfg: &LaunchConfig,
    scratch: &mut [T],
) {
    client.device.install(|| {
        if cfg.scratch_elems == 0 {
            (0..cfg.teams).into_par_iter().for_each(|id| {
                kernel.run(&Team::new(id, cfg.team_size), &mut []);
            });
        } else {
            scratch
                .par_chunks_mut(cfg.scratch_elems)
                .enumerate()
                .for_each(|(id, tile)| kernel.run(&Team::new(id, cfg.team_size), tile));
        }
    });
}

#[cfg(not(feature = "rayon"))]
fn run_grid<T: Element>(
    _client: &CpuClient,
    kernel: &(dyn TeamKernel<T> + Send),
    cfg: &LaunchConfig,
    scratch: &mut [T],
) {
    if cfg.scratch_elems == 0 {
        for id in 0..cfg.teams {
            kernel.run(&Team::new(id, cfg.team_size), &mut []);
        }
    } else {
        for (id, tile) in scratch.chunks_mut(cfg.scratch_elems).enumerate() {
            kernel.run(&Team::new(id, cfg.team_size), tile);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceConfig;
    use crate::runtime::DevicePtr;
    use crate::runtime::cpu::CpuDevice;

    struct Fill {
        out: DevicePtr<f64>,
        value: f64,
        teams: usize,
    }

    impl TeamKernel<f64> for Fill {
        fn name(&self) -> &'static str {
            "fill"
        }

        fn config(&self) -> LaunchConfig {
            LaunchConfig::new(self.teams, 4, 4)
        }

        fn run(&self, team: &Team, scratch: &mut [f64]) {
            for w in team.workers() {
                scratch[w] = self.value + w as f64;
            }
            team.barrier();
            for w in team.workers() {
                unsafe { self.out.write(team.id() * 4 + w, scratch[w]) };
            }
        }
    }

    #[test]
    fn test_launch_runs_at_barrier() {
        let client = CpuClient::new(CpuDevice::new());
        let mut out = vec![0.0f64; 12];
        let ptr = unsafe { DevicePtr::from_raw(out.as_mut_ptr() as u64, out.len()) };

        let mut launcher = CpuLauncher::<f64>::new(&client, 12);
        launcher
            .launch(Fill {
                out: ptr,
                value: 1.0,
                teams: 3,
            })
            .unwrap();
        assert_eq!(launcher.pending(), 1);
        launcher.barrier();
        drop(launcher);

        assert_eq!(out, vec![1.0, 2.0, 3.0, 4.0, 1.0, 2.0, 3.0, 4.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(client.stats().launches(), 1);
    }

    #[test]
    fn test_unordered_launches_run_latest_first() {
        let client = CpuClient::new(CpuDevice::new());
        let mut out = vec![0.0f64; 4];
        let ptr = unsafe { DevicePtr::from_raw(out.as_mut_ptr() as u64, out.len()) };

        let mut launcher = CpuLauncher::<f64>::new(&client, 4);
        for value in [10.0, 20.0] {
            launcher
                .launch(Fill {
                    out: ptr,
                    value,
                    teams: 1,
                })
                .unwrap();
        }
        launcher.barrier();
        drop(launcher);

        // The earlier launch executes last and wins
        assert_eq!(out, vec![10.0, 11.0, 12.0, 13.0]);
    }

    #[test]
    fn test_scratch_limit_rejects_launch() {
        let device =
            CpuDevice::with_config(DeviceConfig::default().with_shared_memory_per_team(16))
                .unwrap();
        let client = CpuClient::new(device);
        let mut launcher = CpuLauncher::<f64>::new(&client, 0);
        let err = launcher
            .launch(Fill {
                out: unsafe { DevicePtr::from_raw(0, 0) },
                value: 0.0,
                teams: 1,
            })
            .unwrap_err();
        assert!(matches!(err, Error::KernelLaunch { kernel: "fill", .. }));
        assert_eq!(client.stats().launches(), 0);
    }
}
