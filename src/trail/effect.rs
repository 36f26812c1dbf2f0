//! The narrow interface a host render pipeline drives the trail through.

use glam::UVec2;

use crate::blend_mode::BlendMode;
use crate::error::TrailResult;
use crate::gpu::GpuContext;

/// Per-frame context handed to [`PostEffect::step`].
///
/// Borrowed for the duration of one step. The effect appends its passes to
/// `encoder`; the host submits it.
pub struct StepContext<'a> {
    /// GPU context providing access to device, queue, and configuration.
    pub gpu: &'a GpuContext,
    /// Command encoder for recording render pass commands.
    pub encoder: &'a mut wgpu::CommandEncoder,
}

impl<'a> StepContext<'a> {
    pub fn new(gpu: &'a GpuContext, encoder: &'a mut wgpu::CommandEncoder) -> Self {
        Self { gpu, encoder }
    }
}

/// Lifecycle hooks a host pipeline needs from a frame effect.
///
/// The host calls [`initialize`](Self::initialize) once the viewport is
/// known, [`step`](Self::step) once per frame, [`set_size`](Self::set_size)
/// on resize and [`dispose`](Self::dispose) on teardown. The returned view is
/// composited with [`blend_mode`](Self::blend_mode).
///
/// # Example
///
/// ```ignore
/// fn frame(effect: &mut dyn PostEffect, gpu: &GpuContext, scene: &wgpu::TextureView, dt: f32) {
///     let mut encoder = gpu.device.create_command_encoder(&Default::default());
///     let mut ctx = StepContext::new(gpu, &mut encoder);
///     let output = effect.step(&mut ctx, scene, dt)?;
///     compositor.render(gpu, ctx.encoder, screen, scene, output, effect.blend_mode());
///     gpu.queue.submit(std::iter::once(encoder.finish()));
/// }
/// ```
pub trait PostEffect {
    /// Sizes internal buffers for `viewport` and clears them.
    fn initialize(&mut self, gpu: &GpuContext, viewport: UVec2) -> TrailResult<()>;

    /// Processes one frame and returns the effect's output.
    ///
    /// The output is either an internal buffer or `input` itself when the
    /// effect is bypassed. It stays valid until the next call to `step`.
    fn step<'a>(
        &'a mut self,
        ctx: &mut StepContext<'_>,
        input: &'a wgpu::TextureView,
        delta_time: f32,
    ) -> TrailResult<&'a wgpu::TextureView>;

    /// Reacts to a viewport resize.
    fn set_size(&mut self, gpu: &GpuContext, width: u32, height: u32) -> TrailResult<()>;

    /// Releases GPU resources. Further calls do nothing.
    fn dispose(&mut self);

    /// Mode the host should composite the output with.
    fn blend_mode(&self) -> BlendMode;
}
