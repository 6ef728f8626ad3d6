//! GPU execution units for parallel geodesic integration.
//!
//! This module provides wgpu-backed [`ExecutionUnit`]s using compute
//! shaders. Ray state uses f32 (~7 significant digits) for GPU portability —
//! use [`CpuUnit`](crate::cpu::CpuUnit) as the precision reference.
//!
//! The spacetime metric is user-supplied as a WGSL string. You must provide
//! two functions:
//!
//! ```wgsl
//! fn geodesic_accel(pos: vec4<f32>, dir: vec4<f32>) -> vec4<f32>
//! fn ray_finished(pos: vec4<f32>, dir: vec4<f32>) -> bool
//! ```
//!
//! `geodesic_accel` returns the geodesic-equation acceleration for the
//! metric; `ray_finished` defines the stopping condition (e.g. crossing the
//! horizon). Metric constants are read from the `args` storage binding.
//!
//! Enable with `cargo build --features gpu`.

pub mod buffers;
pub mod pipeline;
pub mod types;

pub use types::KernelParams;

use wgpu::util::DeviceExt;

use crate::dispatcher::Block;
use crate::store::DIM;
use crate::unit::{ExecError, ExecutionUnit, RunParams};
use pipeline::GeodesicPipeline;

/// GPU initialization or transfer failure. Fatal for the owning unit.
#[derive(Debug)]
pub enum GpuError {
    /// Adapter, device, or pipeline creation failed.
    Init(String),
    /// The kernel invocation was rejected by the device.
    Invoke(String),
    /// A buffer could not be read back from the device.
    Readback(String),
}

impl std::fmt::Display for GpuError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GpuError::Init(message) => write!(f, "GPU initialization failed: {}", message),
            GpuError::Invoke(message) => write!(f, "Kernel invocation failed: {}", message),
            GpuError::Readback(message) => write!(f, "Buffer readback failed: {}", message),
        }
    }
}

impl std::error::Error for GpuError {}

impl From<GpuError> for ExecError {
    fn from(err: GpuError) -> Self {
        ExecError::Device {
            message: err.to_string(),
        }
    }
}

/// One accelerator: device, queue, and compiled geodesic pipeline.
///
/// Created once per device at startup and bound to one worker thread for
/// the whole run; only the per-block buffers inside
/// [`run_block`](ExecutionUnit::run_block) are transient.
pub struct GpuUnit {
    pipeline: GeodesicPipeline,
    name: String,
    block_size: usize,
}

impl GpuUnit {
    /// Create a unit on the highest-performance adapter.
    pub fn new(metric_wgsl: &str) -> Result<Self, GpuError> {
        Ok(Self::from_pipeline(GeodesicPipeline::new(metric_wgsl)?))
    }

    /// Create one unit per usable adapter on this machine.
    ///
    /// A build failure on any adapter is fatal, matching the run-level
    /// policy that a broken device cannot be silently skipped.
    pub fn enumerate(metric_wgsl: &str) -> Result<Vec<Self>, GpuError> {
        let instance = wgpu::Instance::default();
        let adapters = instance.enumerate_adapters(wgpu::Backends::all());
        log::info!("found {} adapter(s)", adapters.len());

        let mut units = Vec::with_capacity(adapters.len());
        for adapter in &adapters {
            let info = adapter.get_info();
            log::info!("adapter: {} ({:?})", info.name, info.backend);
            let pipeline = pollster::block_on(GeodesicPipeline::from_adapter(adapter, metric_wgsl))?;
            units.push(Self::from_pipeline(pipeline));
        }
        Ok(units)
    }

    fn from_pipeline(pipeline: GeodesicPipeline) -> Self {
        let name = format!("gpu:{}", pipeline.adapter_name);
        Self {
            pipeline,
            name,
            block_size: 1024,
        }
    }

    /// Override the block size this unit requests from the dispatcher.
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }
}

impl ExecutionUnit for GpuUnit {
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

        let device = &self.pipeline.device;
        let queue = &self.pipeline.queue;
        let count = block.count;

        // Block-scoped device buffers, uploaded once and released on return.
        let pos_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Ray Positions"),
            contents: bytemuck::cast_slice(block.pos),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
        });
        let dir_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Ray Directions"),
            contents: bytemuck::cast_slice(block.dir),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
        });
        let finished_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Finished Flags"),
            contents: bytemuck::cast_slice(block.finished),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
        });
        // wgpu rejects zero-sized bindings; pad an empty args array.
        let padded_args = [0.0f32];
        let args = if args.is_empty() { &padded_args[..] } else { args };
        let args_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Metric Args"),
            contents: bytemuck::cast_slice(args),
            usage: wgpu::BufferUsages::STORAGE,
        });
        let kernel_params = KernelParams {
            num_steps: params.steps_per_call,
            num_rays: count as u32,
            h: params.h as f32,
            _pad: 0,
        };
        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Kernel Params"),
            contents: bytemuck::bytes_of(&kernel_params),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Geodesic Bind Group"),
            layout: &self.pipeline.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: pos_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: dir_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: finished_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: args_buffer.as_entire_binding(),
                },
            ],
        });

        let workgroup_size = 64usize;
        let num_workgroups = count.div_ceil(workgroup_size) as u32;

        block.write_samples(0.0)?;

        let mut t = 0.0;
        while t < params.t_final {
            device.push_error_scope(wgpu::ErrorFilter::Validation);
            let mut encoder =
                device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
            {
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("Geodesic Pass"),
                    timestamp_writes: None,
                });
                pass.set_pipeline(&self.pipeline.pipeline);
                pass.set_bind_group(0, &bind_group, &[]);
                pass.dispatch_workgroups(num_workgroups, 1, 1);
            }
            queue.submit(Some(encoder.finish()));
            if let Some(err) = pollster::block_on(device.pop_error_scope()) {
                return Err(GpuError::Invoke(err.to_string()).into());
            }

            // Intermediate state is only transferred when someone is
            // listening; flags are always polled.
            if block.sinks.is_some() {
                let pos: Vec<f32> = buffers::read_buffer(device, queue, &pos_buffer, count * DIM)?;
                block.pos.copy_from_slice(&pos);
                let dir: Vec<f32> = buffers::read_buffer(device, queue, &dir_buffer, count * DIM)?;
                block.dir.copy_from_slice(&dir);
            }
            let flags: Vec<u32> = buffers::read_buffer(device, queue, &finished_buffer, count)?;
            block.finished.copy_from_slice(&flags);

            block.write_samples(t)?;
            log::debug!("{}: {} / {}", self.name, t, params.t_final);

            if block.all_finished() {
                log::info!("{}: all rays finished at t = {}", self.name, t);
                break;
            }
            t += stride;
        }

        // Unconditional final readback: the caller's slices must reflect
        // true device state even when no sink forced transfers above.
        let pos: Vec<f32> = buffers::read_buffer(device, queue, &pos_buffer, count * DIM)?;
        block.pos.copy_from_slice(&pos);
        let dir: Vec<f32> = buffers::read_buffer(device, queue, &dir_buffer, count * DIM)?;
        block.dir.copy_from_slice(&dir);
        let flags: Vec<u32> = buffers::read_buffer(device, queue, &finished_buffer, count)?;
        block.finished.copy_from_slice(&flags);

        Ok(())
    }
}
