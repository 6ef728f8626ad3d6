//! Worker pool: one thread per execution unit, draining the dispatcher.
//!
//! Each worker repeatedly pulls the next block and runs it to completion on
//! its own unit. Block assignment order across units is unspecified; a slow
//! unit simply processes fewer blocks. Once a block is granted it runs to
//! completion on that unit — there is no work stealing. Joining the workers
//! is the only synchronization barrier: afterwards the store holds the final
//! state of every ray and all trajectory sinks are flushed.

use std::thread;

use crate::dispatcher::BlockDispatcher;
use crate::unit::{ExecError, ExecutionUnit, RunParams};

/// Distribute every block of `dispatcher` across `units` and wait for all
/// workers to finish.
///
/// A unit failure is fatal for that worker only: it stops pulling blocks
/// while the remaining workers keep draining the dispatcher. After joining,
/// the first error observed is returned; `Ok` means every block ran to
/// completion.
pub fn run_blocks(
    dispatcher: &BlockDispatcher<'_>,
    units: Vec<Box<dyn ExecutionUnit>>,
    params: RunParams,
    args: &[f32],
) -> Result<(), ExecError> {
    thread::scope(|scope| {
        let workers: Vec<_> = units
            .into_iter()
            .map(|mut unit| {
                scope.spawn(move || -> Result<(), ExecError> {
                    while let Some(mut block) = dispatcher.next_block(unit.preferred_block_size()) {
                        log::info!(
                            "{}: running block [{}..{})",
                            unit.name(),
                            block.offset,
                            block.offset + block.count
                        );
                        unit.run_block(&mut block, &params, args)?;
                    }
                    Ok(())
                })
            })
            .collect();

        let mut first_error = None;
        for worker in workers {
            match worker.join() {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    log::error!("worker failed: {}", err);
                    first_error.get_or_insert(err);
                }
                Err(_) => {
                    first_error.get_or_insert(ExecError::Device {
                        message: "worker thread panicked".to_owned(),
                    });
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::CpuUnit;
    use crate::dispatcher::BlockDispatcher;
    use crate::store::{RayStore, DIM};

    fn free_streaming(pos: &mut [f32], dir: &mut [f32], h: f32, _args: &[f32]) -> bool {
        for (p, d) in pos.iter_mut().zip(dir.iter()) {
            *p += h * d;
        }
        false
    }

    #[test]
    fn test_single_unit_drains_everything() {
        let mut store = RayStore::from_rays((0..10).map(|i| ([0.0; DIM], [i as f32; DIM])));
        let dispatcher = BlockDispatcher::new(&mut store, None).with_max_per_block(3);

        let units: Vec<Box<dyn ExecutionUnit>> = vec![Box::new(CpuUnit::new(free_streaming))];
        let params = RunParams {
            t_final: 1.0,
            h: 0.1,
            steps_per_call: 10,
        };
        run_blocks(&dispatcher, units, params, &[]).unwrap();

        assert!(!dispatcher.has_remaining());
        drop(dispatcher);
        for i in 0..10 {
            assert!((store.pos[i * DIM] - i as f32).abs() < 1e-5);
        }
    }

    #[test]
    fn test_failed_worker_does_not_stop_the_others() {
        struct FailingUnit;

        impl ExecutionUnit for FailingUnit {
            fn name(&self) -> &str {
                "broken"
            }
            fn preferred_block_size(&self) -> usize {
                1
            }
            fn run_block(
                &mut self,
                _block: &mut crate::dispatcher::Block<'_>,
                _params: &RunParams,
                _args: &[f32],
            ) -> Result<(), ExecError> {
                Err(ExecError::Device {
                    message: "simulated allocation failure".to_owned(),
                })
            }
        }

        let mut store = RayStore::from_rays((0..20).map(|_| ([0.0; DIM], [1.0; DIM])));
        let dispatcher = BlockDispatcher::new(&mut store, None).with_max_per_block(2);

        let units: Vec<Box<dyn ExecutionUnit>> = vec![
            Box::new(FailingUnit),
            Box::new(CpuUnit::new(free_streaming).with_block_size(2)),
        ];
        let params = RunParams {
            t_final: 1.0,
            h: 0.1,
            steps_per_call: 10,
        };

        let result = run_blocks(&dispatcher, units, params, &[]);
        assert!(matches!(result, Err(ExecError::Device { .. })));
        // The healthy worker drained the dispatcher regardless.
        assert!(!dispatcher.has_remaining());
    }
}
