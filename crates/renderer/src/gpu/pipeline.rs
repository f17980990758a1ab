use bytemuck::{Pod, Zeroable};
use engine::{CaptureProgress, CaptureState, CompileError};

use crate::compile::{compile_present_shader, compile_vertex_shader};

/// Mirrors the `PresentParams` block in the present shader (std140).
#[repr(C, align(16))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct PresentUniforms {
    /// Surface width and height, then frame width and height.
    pub surface: [f32; 4],
    /// Active flag, progress in `[0, 1]`, rendering flag, unused.
    pub capture: [f32; 4],
}

unsafe impl Zeroable for PresentUniforms {}
unsafe impl Pod for PresentUniforms {}

impl PresentUniforms {
    pub fn new(surface: (u32, u32), frame: (u32, u32)) -> Self {
        Self {
            surface: [
                surface.0 as f32,
                surface.1 as f32,
                frame.0 as f32,
                frame.1 as f32,
            ],
            capture: [0.0; 4],
        }
    }

    pub fn set_capture(&mut self, state: CaptureState, progress: Option<CaptureProgress>) {
        self.capture = match (state, progress) {
            (CaptureState::Idle, _) | (_, None) => [0.0; 4],
            (state, Some(progress)) => {
                let total = (progress.frames.max(1) * progress.samples.max(1)) as f32;
                let done = (progress.frame * progress.samples.max(1) + progress.sample) as f32;
                let rendering = if state == CaptureState::Rendering { 1.0 } else { 0.0 };
                [1.0, (done / total).clamp(0.0, 1.0), rendering, 0.0]
            }
        };
    }
}

/// Tracks the uniform values last written to the GPU buffer.
///
/// Starts empty, so the first staged value is always uploaded.
#[derive(Debug, Default)]
pub(crate) struct UniformUploads {
    written: Option<PresentUniforms>,
}

impl UniformUploads {
    /// Returns `next` when it differs from what the buffer holds, recording
    /// it as written.
    pub fn stage(&mut self, next: PresentUniforms) -> Option<PresentUniforms> {
        if self.written == Some(next) {
            return None;
        }
        self.written = Some(next);
        Some(next)
    }
}

pub(crate) struct PresentPipeline {
    pub pipeline: wgpu::RenderPipeline,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

impl PresentPipeline {
    pub fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
    ) -> Result<Self, CompileError> {
        let vertex_module = compile_vertex_shader(device)?;
        let fragment_module = compile_present_shader(device)?;

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("present layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("present pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("present pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vertex_module,
                entry_point: Some("main"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &fragment_module,
                entry_point: Some("main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
            cache: None,
        });

        Ok(Self {
            pipeline,
            bind_group_layout,
        })
    }
}
