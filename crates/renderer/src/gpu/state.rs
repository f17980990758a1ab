use std::time::{Duration, Instant};

use anyhow::Result;
use engine::{CaptureProgress, CaptureState, FrameOutput};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::debug;
use winit::dpi::PhysicalSize;

use crate::types::GpuPowerPreference;

use super::context::GpuContext;
use super::pipeline::{PresentPipeline, PresentUniforms, UniformUploads};

/// Texture holding the most recent evaluated frame.
struct FrameTexture {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    width: u32,
    height: u32,
}

/// Uploads device frames and draws them onto the window surface.
pub(crate) struct GpuState {
    context: GpuContext,
    pipeline: PresentPipeline,
    uniform_buffer: wgpu::Buffer,
    uniforms: UniformUploads,
    sampler: wgpu::Sampler,
    frame: Option<FrameTexture>,
    last_stats: Instant,
    frames_since_stats: u32,
}

impl GpuState {
    pub(crate) fn new<T>(
        target: &T,
        initial_size: PhysicalSize<u32>,
        gpu_power: GpuPowerPreference,
    ) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let context = GpuContext::new(target, initial_size, gpu_power)?;
        // A kernel that fails to build is fatal; there is nothing to fall back to.
        let pipeline = PresentPipeline::new(&context.device, context.surface_format)?;

        let uniform_buffer = context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("present uniforms"),
            size: std::mem::size_of::<PresentUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let sampler = context.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("frame sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let mut uniforms = UniformUploads::default();
        let initial = PresentUniforms::new((context.size.width, context.size.height), (1, 1));
        if let Some(initial) = uniforms.stage(initial) {
            context
                .queue
                .write_buffer(&uniform_buffer, 0, bytemuck::bytes_of(&initial));
        }
        tracing::info!(adapter = %context.adapter_name, "presenter ready");

        Ok(Self {
            context,
            pipeline,
            uniform_buffer,
            uniforms,
            sampler,
            frame: None,
            last_stats: Instant::now(),
            frames_since_stats: 0,
        })
    }

    pub(crate) fn size(&self) -> PhysicalSize<u32> {
        self.context.size
    }

    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) {
        self.context.resize(new_size);
    }

    /// Copies a completed frame into the presentation texture, reallocating
    /// it when the resolution changed.
    pub(crate) fn upload(&mut self, output: &FrameOutput) {
        let needs_texture = self
            .frame
            .as_ref()
            .map_or(true, |frame| frame.width != output.width || frame.height != output.height);
        if needs_texture {
            self.frame = Some(self.create_frame_texture(output.width, output.height));
        }
        let Some(frame) = self.frame.as_ref() else {
            return;
        };

        self.context.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &frame.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &output.pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * output.width),
                rows_per_image: Some(output.height),
            },
            wgpu::Extent3d {
                width: output.width,
                height: output.height,
                depth_or_array_layers: 1,
            },
        );
    }

    fn create_frame_texture(&self, width: u32, height: u32) -> FrameTexture {
        let device = &self.context.device;
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("frame texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("present bind group"),
            layout: &self.pipeline.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });
        debug!(width, height, "allocated frame texture");

        FrameTexture {
            texture,
            bind_group,
            width,
            height,
        }
    }

    pub(crate) fn render(
        &mut self,
        capture: CaptureState,
        progress: Option<CaptureProgress>,
    ) -> Result<(), wgpu::SurfaceError> {
        let surface_texture = self.context.surface.get_current_texture()?;
        let (frame_width, frame_height) = self
            .frame
            .as_ref()
            .map_or((1, 1), |frame| (frame.width, frame.height));
        let mut uniforms = PresentUniforms::new(
            (self.context.size.width, self.context.size.height),
            (frame_width, frame_height),
        );
        uniforms.set_capture(capture, progress);
        if let Some(uniforms) = self.uniforms.stage(uniforms) {
            self.context
                .queue
                .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
        }

        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("present encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("present pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            if let Some(frame) = self.frame.as_ref() {
                render_pass.set_pipeline(&self.pipeline.pipeline);
                render_pass.set_bind_group(0, &frame.bind_group, &[]);
                render_pass.draw(0..3, 0..1);
            }
        }
        self.context.queue.submit(std::iter::once(encoder.finish()));
        surface_texture.present();
        self.record_stats();
        Ok(())
    }

    fn record_stats(&mut self) {
        self.frames_since_stats += 1;
        let elapsed = self.last_stats.elapsed();
        if elapsed >= Duration::from_secs(1) {
            let fps = self.frames_since_stats as f32 / elapsed.as_secs_f32();
            debug!(fps = fps.round(), "present stats");
            self.frames_since_stats = 0;
            self.last_stats = Instant::now();
        }
    }
}
