//! wgpu compute pipeline setup for geodesic integration.

use std::borrow::Cow;

use super::GpuError;

/// Holds the wgpu device, queue, compute pipeline, and bind group layout for
/// one accelerator. Created once per device; per-block buffers are transient
/// and live in the execution loop.
pub struct GeodesicPipeline {
    /// The wgpu device.
    pub device: wgpu::Device,
    /// The wgpu command queue.
    pub queue: wgpu::Queue,
    /// The compiled compute pipeline.
    pub pipeline: wgpu::ComputePipeline,
    /// The bind group layout for buffer bindings.
    pub bind_group_layout: wgpu::BindGroupLayout,
    /// Adapter name, for logging and unit naming.
    pub adapter_name: String,
}

impl GeodesicPipeline {
    /// Create the pipeline on the highest-performance adapter, with a
    /// user-supplied WGSL spacetime metric.
    ///
    /// The `metric_wgsl` fragment must define:
    /// ```wgsl
    /// fn geodesic_accel(pos: vec4<f32>, dir: vec4<f32>) -> vec4<f32>
    /// fn ray_finished(pos: vec4<f32>, dir: vec4<f32>) -> bool
    /// ```
    /// It is prepended to the integration engine shader at pipeline creation
    /// time; metric constants are read from the `args` binding.
    ///
    /// Uses `pollster::block_on` for synchronous initialization.
    pub fn new(metric_wgsl: &str) -> Result<Self, GpuError> {
        pollster::block_on(Self::new_async(metric_wgsl.to_owned()))
    }

    async fn new_async(metric_wgsl: String) -> Result<Self, GpuError> {
        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                ..Default::default()
            })
            .await
            .ok_or_else(|| GpuError::Init("no suitable GPU adapter found".to_owned()))?;

        Self::from_adapter(&adapter, &metric_wgsl).await
    }

    /// Create the pipeline on a specific adapter.
    pub(crate) async fn from_adapter(
        adapter: &wgpu::Adapter,
        metric_wgsl: &str,
    ) -> Result<Self, GpuError> {
        let adapter_name = adapter.get_info().name;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Geodesic Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await
            .map_err(|e| GpuError::Init(format!("device request failed: {}", e)))?;

        let engine = include_str!("shader.wgsl");
        let full_shader = format!("{}\n{}", metric_wgsl, engine);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Geodesic Shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Owned(full_shader)),
        });

        let storage_entry = |binding, read_only| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Geodesic Bind Group Layout"),
            entries: &[
                // binding 0: positions (read-write storage)
                storage_entry(0, false),
                // binding 1: directions (read-write storage)
                storage_entry(1, false),
                // binding 2: finished flags (read-write storage)
                storage_entry(2, false),
                // binding 3: kernel params (uniform)
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // binding 4: metric args (read-only storage)
                storage_entry(4, true),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Geodesic Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Geodesic Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("advance"),
            compilation_options: Default::default(),
            cache: None,
        });

        Ok(Self {
            device,
            queue,
            pipeline,
            bind_group_layout,
            adapter_name,
        })
    }
}
