//! GPU light-trail accumulation.
//!
//! Each frame the accumulator blends the host's current frame with the
//! previous result and keeps the blend as the next frame's history:
//!
//! ```text
//!             ┌──────────────┐
//! current ───▶│  blend pass  │───▶ write target ──(swap)──▶ history ───▶ output
//!             └──────────────┘                                  │
//!                    ▲                                          │
//!                    └────────────── previous frame ◀───────────┘
//! ```
//!
//! `output.rgb = mix(current.rgb, previous.rgb, exp(-decay_amount / 100 * 0.2))`,
//! alpha forced to 1. With the effect disabled the pass copies the current
//! frame instead and never samples history.
//!
//! # Pieces
//!
//! - [`AccumulationBuffer`]: one half-float history surface.
//! - [`TrailBlendPass`]: the full-screen blend and copy pipelines.
//! - [`TrailAccumulator`]: owns two buffers, the pass and the parameters.
//! - [`PostEffect`] / [`StepContext`]: the interface a host pipeline calls.

mod accumulation_buffer;
mod accumulator;
mod blend_pass;
mod effect;

pub use accumulation_buffer::AccumulationBuffer;
pub use accumulator::TrailAccumulator;
pub use blend_pass::TrailBlendPass;
pub(crate) use blend_pass::{sampler_entry, texture_entry, uniform_entry};
pub use effect::{PostEffect, StepContext};
