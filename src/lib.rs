//! # geodesic-rt: multi-device batch integration of light rays
//!
//! Traces large sets of independent light rays through a curved spacetime by
//! partitioning them across one or more compute devices and driving each
//! device through a fixed-step integration loop.
//!
//! ## Architecture
//!
//! - [`store::RayStore`] — flat per-ray position/direction/flag arrays,
//!   owned by the caller and mutated in place.
//! - [`dispatcher::BlockDispatcher`] — thread-safe cursor handing out
//!   disjoint contiguous [`dispatcher::Block`]s of the store, each issued
//!   exactly once.
//! - [`unit::ExecutionUnit`] — one device bound to one worker thread; a
//!   single blocking operation runs a block from `t = 0` until the total
//!   duration elapses or every ray in the block has finished.
//! - [`pool::run_blocks`] — spawns one worker per unit and joins them; after
//!   the join the store holds every ray's final state.
//! - [`trajectory::TrajectorySink`] — optional per-ray CSV stream, flushed
//!   at every sampled step.
//!
//! Units come in two flavors: [`cpu::CpuUnit`] runs a user-supplied stepping
//! rule on the host, and (with the `gpu` feature) `gpu::GpuUnit` runs a
//! user-supplied WGSL metric on a wgpu adapter. Both obey the same timeline
//! contract, so host runs serve as the reference for device runs.
//!
//! ## Basic usage
//!
//! ```rust
//! use geodesic_rt::{BlockDispatcher, CpuUnit, ExecutionUnit, RayStore, RunParams};
//! use geodesic_rt::pool::run_blocks;
//!
//! // 100 rays streaming outward in flat space.
//! let mut store = RayStore::from_rays(
//!     (0..100).map(|i| ([0.0, 10.0 + i as f32, 0.0, 0.0], [1.0, 1.0, 0.0, 0.0])),
//! );
//!
//! // Stepping rule: straight lines, finished beyond r = 100.
//! let stepper = |pos: &mut [f32], dir: &mut [f32], h: f32, _args: &[f32]| {
//!     for (p, d) in pos.iter_mut().zip(dir.iter()) {
//!         *p += h * d;
//!     }
//!     pos[1] > 100.0
//! };
//!
//! let dispatcher = BlockDispatcher::new(&mut store, None);
//! let units: Vec<Box<dyn ExecutionUnit>> = vec![Box::new(CpuUnit::new(stepper))];
//! let params = RunParams { t_final: 200.0, h: 0.1, steps_per_call: 100 };
//! run_blocks(&dispatcher, units, params, &[]).unwrap();
//!
//! drop(dispatcher);
//! assert!(store.finished.iter().all(|&f| f != 0));
//! ```
//!
//! ## Concurrency model
//!
//! One OS thread per device; the dispatcher's lock is held only for O(1)
//! bookkeeping, never across a device call. A granted block's slices are
//! exclusively owned by its worker (`&mut` borrows split off under the
//! lock), so range ownership is checked at compile time. Device failures are
//! fatal to the owning worker; the remaining workers keep draining blocks.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod cpu;
pub mod dispatcher;
pub mod pool;
pub mod store;
pub mod trajectory;
pub mod unit;

#[cfg(feature = "gpu")]
pub mod gpu;

pub use cpu::{CpuUnit, RayStepper};
pub use dispatcher::{Block, BlockDispatcher, DEFAULT_MAX_PER_BLOCK};
pub use store::{RayStore, DIM};
pub use trajectory::{open_ray_sinks, write_final_state, TrajectorySink};
pub use unit::{ExecError, ExecutionUnit, RunParams};
