//! Offscreen surfaces that hold the accumulated trail.

use glam::UVec2;

use crate::error::{TrailError, TrailResult};
use crate::gpu::GpuContext;

/// An off-screen half-float color target used as trail history.
///
/// The texture is both a color attachment (the blend pass writes it) and a
/// texture binding (the next blend pass and the host compositor sample it).
/// Two of these form the accumulator's ping-pong pair.
pub struct AccumulationBuffer {
    /// The underlying GPU texture that stores pixel data.
    pub texture: wgpu::Texture,
    /// A view into the texture, used for render pass attachments and shader sampling.
    pub view: wgpu::TextureView,
    width: u32,
    height: u32,
}

impl AccumulationBuffer {
    /// Pixel format of every accumulation buffer. Half floats keep values
    /// above 1.0 for HDR scenes.
    pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

    /// Baseline color buffers are cleared to.
    pub const CLEAR_COLOR: wgpu::Color = wgpu::Color::TRANSPARENT;

    /// Allocates a buffer of `extent` pixels (each axis at least 1).
    ///
    /// Contents are undefined until [`clear`](Self::clear) runs. Allocation
    /// failure is reported instead of panicking.
    pub fn new(gpu: &GpuContext, label: &str, extent: UVec2) -> TrailResult<Self> {
        let extent = extent.max(UVec2::ONE);
        let texture = gpu.scoped(|device| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width: extent.x,
                    height: extent.y,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: Self::FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::COPY_SRC,
                view_formats: &[],
            })
        })?;
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(Self {
            texture,
            view,
            width: extent.x,
            height: extent.y,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn extent(&self) -> UVec2 {
        UVec2::new(self.width, self.height)
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        Self::FORMAT
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    /// Records a pass that clears the buffer to [`CLEAR_COLOR`](Self::CLEAR_COLOR).
    pub fn clear(&self, encoder: &mut wgpu::CommandEncoder) {
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Trail Clear Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(Self::CLEAR_COLOR),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
    }

    /// Copies the buffer back to the CPU as row-major RGBA.
    ///
    /// Blocks until the GPU has finished all submitted work. Meant for tests
    /// and tooling, not per-frame use.
    pub fn read_pixels(&self, gpu: &GpuContext) -> TrailResult<Vec<[f32; 4]>> {
        const BYTES_PER_PIXEL: u32 = 8;
        let tight_bpr = self.width * BYTES_PER_PIXEL;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_bpr = tight_bpr.div_ceil(align) * align;

        let staging = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Trail Readback Staging"),
            size: padded_bpr as u64 * self.height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Trail Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bpr),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        gpu.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        gpu.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| TrailError::Readback(e.to_string()))?;
        rx.recv()
            .map_err(|_| TrailError::Readback("map_async channel closed".into()))?
            .map_err(|e| TrailError::Readback(e.to_string()))?;

        let data = slice.get_mapped_range();
        let mut pixels = Vec::with_capacity(self.width as usize * self.height as usize);
        for row in data.chunks_exact(padded_bpr as usize) {
            for texel in row[..tight_bpr as usize].chunks_exact(BYTES_PER_PIXEL as usize) {
                let channel = |i: usize| {
                    half::f16::from_le_bytes([texel[2 * i], texel[2 * i + 1]]).to_f32()
                };
                pixels.push([channel(0), channel(1), channel(2), channel(3)]);
            }
        }
        drop(data);
        staging.unmap();
        Ok(pixels)
    }

    /// Frees the GPU memory now rather than when the last handle drops.
    pub fn destroy(&self) {
        self.texture.destroy();
    }
}
