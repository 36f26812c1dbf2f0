//! The GPU trail accumulator.

use glam::UVec2;
use log::debug;

use crate::blend_mode::BlendMode;
use crate::error::{TrailError, TrailResult};
use crate::gpu::GpuContext;
use crate::lifecycle::{Lifecycle, TrailCore};
use crate::options::{TrailOptions, TrailState, TrailUpdate};
use crate::ping_pong::{PingPong, Slot};
use crate::trail::{AccumulationBuffer, PostEffect, StepContext, TrailBlendPass};

const LABEL_A: &str = "Trail Accumulation A";
const LABEL_B: &str = "Trail Accumulation B";

/// Blends each frame with an exponentially decaying history of earlier frames.
///
/// Owns two [`AccumulationBuffer`]s that swap write/history roles every step,
/// plus the full-screen blend pipelines. Buffers are allocated by
/// [`initialize`](Self::initialize); until then the accumulator holds none.
///
/// # Example
///
/// ```ignore
/// let mut trail = TrailAccumulator::new(&gpu, TrailOptions::default())?;
/// trail.initialize(&gpu, gpu.viewport())?;
///
/// // Each frame:
/// let mut ctx = StepContext::new(&gpu, &mut encoder);
/// let output = trail.step(&mut ctx, &scene.view, dt)?;
///
/// // On resize:
/// trail.set_size(&gpu, width, height)?;
/// ```
///
/// Resizing allocates fresh buffers and clears them with an immediate queue
/// submission. The old buffers are released when the last recorded command
/// using them completes, so a resize between `step` and the host's submit is
/// safe.
pub struct TrailAccumulator {
    core: TrailCore,
    pass: Option<TrailBlendPass>,
    buffers: Option<PingPong<AccumulationBuffer>>,
}

impl TrailAccumulator {
    /// Builds the blend pipelines. Buffers stay unallocated until `initialize`.
    pub fn new(gpu: &GpuContext, options: TrailOptions) -> TrailResult<Self> {
        Ok(Self {
            core: TrailCore::new(&options),
            pass: Some(TrailBlendPass::new(gpu)?),
            buffers: None,
        })
    }

    /// Sizes both buffers to `floor(viewport * resolution_scale)` and clears them.
    ///
    /// Calling it again reallocates and clears; the role assignment is kept.
    pub fn initialize(&mut self, gpu: &GpuContext, viewport: UVec2) -> TrailResult<()> {
        let buffers = &mut self.buffers;
        self.core
            .initialize(viewport, |extent| allocate(gpu, buffers, extent))
    }

    /// Renders one trail frame and returns the frame to composite.
    ///
    /// When enabled, blends `input` (the current frame) with the history
    /// buffer into the write target, swaps roles and returns the buffer just
    /// written. The returned view is valid until the next `step`.
    ///
    /// When disabled, copies `input` into the write target so history resumes
    /// from it later, swaps roles and returns `input` itself.
    ///
    /// `_delta_time` is part of the host interface; decay does not depend on it.
    pub fn step<'a>(
        &'a mut self,
        ctx: &mut StepContext<'_>,
        input: &'a wgpu::TextureView,
        _delta_time: f32,
    ) -> TrailResult<&'a wgpu::TextureView> {
        self.core.begin_step()?;
        let state = *self.core.state();
        let (Some(pass), Some(buffers)) = (self.pass.as_ref(), self.buffers.as_mut()) else {
            return Err(TrailError::NotInitialized);
        };

        let target = buffers.write();
        if state.enabled() {
            let history = buffers.history();
            pass.render_blend(
                ctx.gpu,
                ctx.encoder,
                target,
                input,
                &history.view,
                state.decay(),
            );
        } else {
            pass.render_copy(ctx.gpu, ctx.encoder, target, input);
        }

        buffers.swap();
        if state.enabled() {
            Ok(&buffers.history().view)
        } else {
            Ok(input)
        }
    }

    /// Resizes both buffers for a new viewport and clears them.
    pub fn set_size(&mut self, gpu: &GpuContext, width: u32, height: u32) -> TrailResult<()> {
        let buffers = &mut self.buffers;
        self.core
            .resize(UVec2::new(width, height), |extent| allocate(gpu, buffers, extent))
    }

    /// Clears both buffers without resizing, dropping all trail history.
    ///
    /// The clear is recorded into `ctx.encoder`, so it is ordered after any
    /// step already recorded there and before any recorded later.
    pub fn reset_buffers(&mut self, ctx: &mut StepContext<'_>) -> TrailResult<()> {
        self.core.require_live()?;
        if let Some(buffers) = &self.buffers {
            buffers.write().clear(ctx.encoder);
            buffers.history().clear(ctx.encoder);
            debug!("trail buffers reset");
        }
        Ok(())
    }

    /// Applies a partial parameter update, effective from the next step.
    ///
    /// A changed resolution scale resizes and clears the buffers using the
    /// last known viewport.
    pub fn update_options(&mut self, gpu: &GpuContext, update: &TrailUpdate) -> TrailResult<()> {
        let buffers = &mut self.buffers;
        self.core
            .update(update, |extent| allocate(gpu, buffers, extent))
    }

    pub fn set_decay_amount(&mut self, gpu: &GpuContext, decay_amount: f32) -> TrailResult<()> {
        self.update_options(gpu, &TrailUpdate::new().decay_amount(decay_amount))
    }

    pub fn set_enabled(&mut self, gpu: &GpuContext, enabled: bool) -> TrailResult<()> {
        self.update_options(gpu, &TrailUpdate::new().enabled(enabled))
    }

    pub fn set_resolution_scale(&mut self, gpu: &GpuContext, scale: f32) -> TrailResult<()> {
        self.update_options(gpu, &TrailUpdate::new().resolution_scale(scale))
    }

    pub fn set_blend_mode(&mut self, gpu: &GpuContext, blend_mode: BlendMode) -> TrailResult<()> {
        self.update_options(gpu, &TrailUpdate::new().blend_mode(blend_mode))
    }

    /// Releases both buffers and the blend pipelines. A second call does nothing.
    pub fn dispose(&mut self) {
        if !self.core.dispose() {
            return;
        }
        if let Some(buffers) = self.buffers.take() {
            let (a, b) = buffers.into_inner();
            a.destroy();
            b.destroy();
        }
        self.pass = None;
    }

    /// The latest output buffer (the current history source).
    pub fn output(&self) -> Option<&AccumulationBuffer> {
        self.buffers.as_ref().map(PingPong::history)
    }

    pub fn output_view(&self) -> Option<&wgpu::TextureView> {
        self.output().map(AccumulationBuffer::view)
    }

    /// Buffer in the given slot.
    pub fn buffer(&self, slot: Slot) -> Option<&AccumulationBuffer> {
        self.buffers.as_ref().map(|b| b.get(slot))
    }

    /// Slot the next step will write into.
    pub fn write_slot(&self) -> Option<Slot> {
        self.buffers.as_ref().map(PingPong::write_slot)
    }

    /// Current buffer size, once initialized.
    pub fn extent(&self) -> Option<UVec2> {
        self.buffers.as_ref().map(|b| b.write().extent())
    }

    pub fn viewport(&self) -> Option<UVec2> {
        self.core.viewport()
    }

    pub fn state(&self) -> &TrailState {
        self.core.state()
    }

    /// History weight used by the next blend.
    pub fn decay(&self) -> f32 {
        self.core.state().decay()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.core.lifecycle()
    }

    pub fn blend_mode(&self) -> BlendMode {
        self.core.state().blend_mode()
    }
}

/// Replaces both buffers with cleared ones of `extent`, keeping roles.
///
/// The current buffers stay in place if either allocation fails.
fn allocate(
    gpu: &GpuContext,
    buffers: &mut Option<PingPong<AccumulationBuffer>>,
    extent: UVec2,
) -> TrailResult<()> {
    let a = AccumulationBuffer::new(gpu, LABEL_A, extent)?;
    let b = AccumulationBuffer::new(gpu, LABEL_B, extent)?;

    let mut encoder = gpu
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Trail Clear Encoder"),
        });
    a.clear(&mut encoder);
    b.clear(&mut encoder);
    gpu.queue.submit(std::iter::once(encoder.finish()));

    match buffers.as_mut() {
        Some(pair) => pair.replace_both(a, b),
        None => *buffers = Some(PingPong::new(a, b)),
    }
    debug!("trail buffers sized to {}x{}", extent.x, extent.y);
    Ok(())
}

impl PostEffect for TrailAccumulator {
    fn initialize(&mut self, gpu: &GpuContext, viewport: UVec2) -> TrailResult<()> {
        TrailAccumulator::initialize(self, gpu, viewport)
    }

    fn step<'a>(
        &'a mut self,
        ctx: &mut StepContext<'_>,
        input: &'a wgpu::TextureView,
        delta_time: f32,
    ) -> TrailResult<&'a wgpu::TextureView> {
        TrailAccumulator::step(self, ctx, input, delta_time)
    }

    fn set_size(&mut self, gpu: &GpuContext, width: u32, height: u32) -> TrailResult<()> {
        TrailAccumulator::set_size(self, gpu, width, height)
    }

    fn dispose(&mut self) {
        TrailAccumulator::dispose(self);
    }

    fn blend_mode(&self) -> BlendMode {
        TrailAccumulator::blend_mode(self)
    }
}

impl Drop for TrailAccumulator {
    fn drop(&mut self) {
        self.dispose();
    }
}
