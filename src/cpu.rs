//! Host execution unit — the reference implementation of the
//! run-to-completion loop.
//!
//! [`CpuUnit`] drives a block through the same timeline as the GPU unit
//! (initial sample, fixed outer iterations of `steps_per_call` sub-steps,
//! early exit once every flag is set, unconditional final state) but runs
//! the stepping rule on the host. It doubles as the reference the GPU
//! results are tested against and as the way to exercise the dispatcher and
//! worker pool without any accelerator present.

use crate::dispatcher::Block;
use crate::store::DIM;
use crate::unit::{ExecError, ExecutionUnit, RunParams};

/// A per-ray sub-step rule: the host-side stand-in for the device-resident
/// integrator.
pub trait RayStepper: Send {
    /// Advance one ray in place by a single sub-step of size `h`.
    ///
    /// `pos` and `dir` hold [`DIM`] components each; `args` are the shared
    /// read-only scalar constants. Returns `true` once the ray has reached
    /// its stopping condition; after that the unit never calls `step` for
    /// the ray again.
    fn step(&self, pos: &mut [f32], dir: &mut [f32], h: f32, args: &[f32]) -> bool;
}

impl<F> RayStepper for F
where
    F: Fn(&mut [f32], &mut [f32], f32, &[f32]) -> bool + Send,
{
    fn step(&self, pos: &mut [f32], dir: &mut [f32], h: f32, args: &[f32]) -> bool {
        self(pos, dir, h, args)
    }
}

/// Host execution unit over a [`RayStepper`].
pub struct CpuUnit<S: RayStepper> {
    stepper: S,
    name: String,
    block_size: usize,
}

impl<S: RayStepper> CpuUnit<S> {
    /// Create a host unit with the default preferred block size.
    pub fn new(stepper: S) -> Self {
        Self {
            stepper,
            name: "cpu".to_owned(),
            block_size: 256,
        }
    }

    /// Override the unit's name (useful when running several host units).
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Override the block size this unit requests from the dispatcher.
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }
}

impl<S: RayStepper> ExecutionUnit for CpuUnit<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn preferred_block_size(&self) -> usize {
        self.block_size
    }

    fn run_block(
        &mut self,
        block: &mut Block<'_>,
        params: &RunParams,
        args: &[f32],
    ) -> Result<(), ExecError> {
        let stride = params.stride();
        if stride <= 0.0 {
            return Err(ExecError::InvalidParams {
                message: format!("non-positive time stride {}", stride),
            });
        }
        let h = params.h as f32;

        block.write_samples(0.0)?;

        let mut t = 0.0;
        while t < params.t_final {
            for i in 0..block.count {
                if block.finished[i] != 0 {
                    continue;
                }
                let pos = &mut block.pos[i * DIM..(i + 1) * DIM];
                let dir = &mut block.dir[i * DIM..(i + 1) * DIM];
                for _ in 0..params.steps_per_call {
                    if self.stepper.step(pos, dir, h, args) {
                        block.finished[i] = 1;
                        break;
                    }
                }
            }

            block.write_samples(t)?;
            log::debug!("{}: {} / {}", self.name, t, params.t_final);

            if block.all_finished() {
                log::debug!("{}: all rays finished at t = {}", self.name, t);
                break;
            }
            t += stride;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::BlockDispatcher;
    use crate::store::RayStore;

    /// Straight rays in flat space: pos += h * dir, never finishing.
    fn free_streaming(pos: &mut [f32], dir: &mut [f32], h: f32, _args: &[f32]) -> bool {
        for (p, d) in pos.iter_mut().zip(dir.iter()) {
            *p += h * d;
        }
        false
    }

    fn params(t_final: f64) -> RunParams {
        RunParams {
            t_final,
            h: 0.1,
            steps_per_call: 10,
        }
    }

    #[test]
    fn test_zero_duration_runs_zero_iterations() {
        let mut store = RayStore::from_rays([([1.0; DIM], [1.0; DIM])]);
        let dispatcher = BlockDispatcher::new(&mut store, None);
        let mut block = dispatcher.next_block(0).unwrap();

        let mut unit = CpuUnit::new(free_streaming);
        unit.run_block(&mut block, &params(0.0), &[]).unwrap();

        assert_eq!(block.pos, &[1.0; DIM]);
        assert_eq!(block.finished, &[0]);
    }

    #[test]
    fn test_advances_by_full_duration() {
        let mut store = RayStore::from_rays([([0.0; DIM], [1.0, 0.0, 0.0, 0.0])]);
        let dispatcher = BlockDispatcher::new(&mut store, None);
        let mut block = dispatcher.next_block(0).unwrap();

        // t_final = 3.0, stride = 1.0: iterations at t = 0, 1, 2 — three
        // invocations of 10 sub-steps of 0.1 each.
        let mut unit = CpuUnit::new(free_streaming);
        unit.run_block(&mut block, &params(3.0), &[]).unwrap();

        assert!((block.pos[0] - 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_early_exit_when_all_finish() {
        // Finish as soon as pos[0] crosses 0.5: first invocation already
        // carries every ray past it.
        let stepper = |pos: &mut [f32], _dir: &mut [f32], h: f32, _args: &[f32]| {
            pos[0] += h;
            pos[0] > 0.5
        };
        let mut store = RayStore::from_rays([([0.0; DIM], [0.0; DIM]); 3]);
        let dispatcher = BlockDispatcher::new(&mut store, None);
        let mut block = dispatcher.next_block(0).unwrap();

        let mut unit = CpuUnit::new(stepper);
        unit.run_block(&mut block, &params(1000.0), &[]).unwrap();

        assert!(block.all_finished());
        // Stopped within the first invocation, not at t_final.
        assert!(block.pos[0] < 1.0);
    }

    #[test]
    fn test_finished_rays_are_left_untouched() {
        let mut store = RayStore::from_rays([([0.0; DIM], [1.0; DIM]); 2]);
        store.finished[0] = 1;
        let frozen = store.pos_of(0).to_vec();

        let dispatcher = BlockDispatcher::new(&mut store, None);
        let mut block = dispatcher.next_block(0).unwrap();
        let mut unit = CpuUnit::new(free_streaming);
        unit.run_block(&mut block, &params(2.0), &[]).unwrap();

        assert_eq!(block.pos_of(0), &frozen[..]);
        assert!(block.pos[DIM] > 0.0);
    }

    #[test]
    fn test_rejects_degenerate_stride() {
        let mut store = RayStore::new(1);
        let dispatcher = BlockDispatcher::new(&mut store, None);
        let mut block = dispatcher.next_block(0).unwrap();

        let mut unit = CpuUnit::new(free_streaming);
        let bad = RunParams {
            t_final: 1.0,
            h: 0.0,
            steps_per_call: 10,
        };
        assert!(unit.run_block(&mut block, &bad, &[]).is_err());
    }
}
