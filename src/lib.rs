//! # trailfx
//!
//! **Light trails for wgpu renderers.**
//!
//! Blends every rendered frame with an exponentially decaying history of the
//! frames before it, giving light-trail and motion-smear looks. The effect
//! owns two half-float accumulation buffers, swaps them each frame and hands
//! the host a texture to composite.
//!
//! ## Quick Start
//!
//! ```no_run
//! use trailfx::*;
//!
//! # fn main() -> Result<(), TrailError> {
//! let gpu = GpuContext::headless(800, 600)?;
//! let scene = AccumulationBuffer::new(&gpu, "Scene", gpu.viewport())?;
//!
//! let mut trail = TrailAccumulator::new(&gpu, TrailOptions::new().decay_amount(60.0))?;
//! trail.initialize(&gpu, gpu.viewport())?;
//!
//! let mut encoder = gpu
//!     .device
//!     .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
//! {
//!     let mut ctx = StepContext::new(&gpu, &mut encoder);
//!     let _output = trail.step(&mut ctx, &scene.view, 1.0 / 60.0)?;
//! }
//! gpu.queue.submit(std::iter::once(encoder.finish()));
//!
//! trail.update_options(&gpu, &TrailUpdate::new().resolution_scale(0.25))?;
//! trail.dispose();
//! # Ok(())
//! # }
//! ```
//!
//! ## Parameters
//!
//! - `decay_amount` (0-199.9, default 95): higher fades to the current frame
//!   faster. 0 freezes the history.
//! - `enabled` (default true): false copies the input through.
//! - `resolution_scale` (0.01-1, default 0.5): buffer size relative to the viewport.
//! - `blend_mode` (default lighten): passed to the host compositor.
//!
//! [`CpuTrail`] runs the same algorithm on the CPU for headless use and checks.

mod blend_mode;
mod composite;
mod cpu;
mod error;
mod gpu;
mod lifecycle;
mod options;
mod ping_pong;
mod trail;

pub use blend_mode::BlendMode;
pub use composite::CompositePass;
pub use cpu::{CLEAR_PIXEL, CpuImage, CpuTrail, blend_pixel};
pub use error::{TrailError, TrailResult};
pub use gpu::GpuContext;
pub use lifecycle::{Lifecycle, TrailCore};
pub use options::{
    DEFAULT_DECAY_AMOUNT, DEFAULT_RESOLUTION_SCALE, MAX_DECAY_AMOUNT, MIN_RESOLUTION_SCALE,
    StateChange, TrailOptions, TrailState, TrailUpdate, decay_factor, scaled_extent,
};
pub use ping_pong::{PingPong, Slot};
pub use trail::{AccumulationBuffer, PostEffect, StepContext, TrailAccumulator, TrailBlendPass};

// Re-export glam vector types used in the public API
pub use glam::{UVec2, Vec2};
