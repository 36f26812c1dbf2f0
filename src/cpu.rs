//! Software reference implementation of the trail accumulator.
//!
//! [`CpuTrail`] runs the same lifecycle, ping-pong roles and per-pixel
//! formula as the GPU [`TrailAccumulator`](crate::TrailAccumulator), on plain
//! `f32` RGBA images. It is useful for headless hosts and for checking the
//! GPU path against known values. Input frames are sampled bilinearly with
//! clamped edges, like the GPU pass's linear sampler. Pixels are full `f32`
//! here, the GPU stores half floats, so results agree to roughly three
//! decimal places.

use glam::{IVec2, UVec2, Vec2};
use log::debug;

use crate::blend_mode::BlendMode;
use crate::error::{TrailError, TrailResult};
use crate::lifecycle::{Lifecycle, TrailCore};
use crate::options::{TrailOptions, TrailState, TrailUpdate};
use crate::ping_pong::{PingPong, Slot};

/// Transparent black, the baseline buffers are cleared to.
pub const CLEAR_PIXEL: [f32; 4] = [0.0, 0.0, 0.0, 0.0];

/// Blends one pixel: `mix(current, previous, decay)` on RGB, alpha forced to 1.
pub fn blend_pixel(current: [f32; 4], previous: [f32; 4], decay: f32) -> [f32; 4] {
    let mix = |c: f32, p: f32| c * (1.0 - decay) + p * decay;
    [
        mix(current[0], previous[0]),
        mix(current[1], previous[1]),
        mix(current[2], previous[2]),
        1.0,
    ]
}

/// A row-major RGBA image with linear `f32` channels.
#[derive(Debug, Clone, PartialEq)]
pub struct CpuImage {
    width: u32,
    height: u32,
    pixels: Vec<[f32; 4]>,
}

impl CpuImage {
    /// Creates an image cleared to [`CLEAR_PIXEL`].
    pub fn new(width: u32, height: u32) -> Self {
        Self::solid(width, height, CLEAR_PIXEL)
    }

    pub fn solid(width: u32, height: u32, color: [f32; 4]) -> Self {
        Self {
            width,
            height,
            pixels: vec![color; width as usize * height as usize],
        }
    }

    /// Builds an image by evaluating `f(x, y)` for every pixel.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> [f32; 4]) -> Self {
        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            pixels,
        }
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

    pub fn pixels(&self) -> &[[f32; 4]] {
        &self.pixels
    }

    /// Pixel at `(x, y)`, or `None` outside the image.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[f32; 4]> {
        (x < self.width && y < self.height).then(|| self.pixels[self.index(x, y)])
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, color: [f32; 4]) {
        if x < self.width && y < self.height {
            let idx = self.index(x, y);
            self.pixels[idx] = color;
        }
    }

    /// Bilinear lookup at normalized coordinates with clamp-to-edge
    /// addressing. Texel centers sit at `(i + 0.5) / size`.
    ///
    /// An empty image samples as [`CLEAR_PIXEL`].
    pub fn sample_bilinear(&self, uv: Vec2) -> [f32; 4] {
        if self.pixels.is_empty() {
            return CLEAR_PIXEL;
        }
        let pos = uv * self.extent().as_vec2() - 0.5;
        let base = pos.floor();
        let t = pos - base;
        let max = self.extent().as_ivec2() - 1;
        let fetch = |offset: IVec2| {
            let p = (base.as_ivec2() + offset).clamp(IVec2::ZERO, max);
            self.pixels[self.index(p.x as u32, p.y as u32)]
        };
        let lerp = |a: [f32; 4], b: [f32; 4], t: f32| -> [f32; 4] {
            std::array::from_fn(|i| a[i] + (b[i] - a[i]) * t)
        };
        let top = lerp(fetch(IVec2::new(0, 0)), fetch(IVec2::new(1, 0)), t.x);
        let bottom = lerp(fetch(IVec2::new(0, 1)), fetch(IVec2::new(1, 1)), t.x);
        lerp(top, bottom, t.y)
    }

    /// Resets every pixel to [`CLEAR_PIXEL`].
    pub fn clear(&mut self) {
        self.pixels.fill(CLEAR_PIXEL);
    }

    /// True if every pixel equals [`CLEAR_PIXEL`].
    pub fn is_clear(&self) -> bool {
        self.pixels.iter().all(|p| *p == CLEAR_PIXEL)
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}

/// CPU trail accumulator with the same contract as the GPU one.
#[derive(Debug, Clone)]
pub struct CpuTrail {
    core: TrailCore,
    buffers: Option<PingPong<CpuImage>>,
}

impl CpuTrail {
    /// Creates an uninitialized accumulator; buffers are sized by [`initialize`](Self::initialize).
    pub fn new(options: TrailOptions) -> Self {
        Self {
            core: TrailCore::new(&options),
            buffers: None,
        }
    }

    /// Sizes both buffers for `viewport` and clears them. Safe to call again.
    pub fn initialize(&mut self, viewport: UVec2) -> TrailResult<()> {
        let buffers = &mut self.buffers;
        self.core.initialize(viewport, |extent| {
            allocate(buffers, extent);
            Ok(())
        })
    }

    /// Blends `input` with the history into the write target, swaps roles and
    /// returns the freshly written buffer.
    ///
    /// When disabled, `input` is resampled into the write target instead and
    /// returned itself, unmodified.
    ///
    /// `_delta_time` is accepted for host symmetry; decay is not time-based.
    pub fn step<'a>(
        &'a mut self,
        input: &'a CpuImage,
        _delta_time: f32,
    ) -> TrailResult<&'a CpuImage> {
        self.core.begin_step()?;
        let state = *self.core.state();
        let buffers = self.buffers.as_mut().ok_or(TrailError::NotInitialized)?;

        let (target, history) = buffers.split_mut();
        let size = target.extent().as_vec2();
        let decay = state.decay();
        for y in 0..target.height {
            for x in 0..target.width {
                let uv = (Vec2::new(x as f32, y as f32) + 0.5) / size;
                let current = input.sample_bilinear(uv);
                let out = if state.enabled() {
                    blend_pixel(current, history.pixels[history.index(x, y)], decay)
                } else {
                    current
                };
                let idx = target.index(x, y);
                target.pixels[idx] = out;
            }
        }

        buffers.swap();
        if state.enabled() {
            Ok(buffers.history())
        } else {
            Ok(input)
        }
    }

    /// Resizes and clears both buffers for a new viewport. Roles are kept.
    pub fn set_size(&mut self, width: u32, height: u32) -> TrailResult<()> {
        let buffers = &mut self.buffers;
        self.core.resize(UVec2::new(width, height), |extent| {
            allocate(buffers, extent);
            Ok(())
        })
    }

    /// Clears both buffers without resizing.
    pub fn reset_buffers(&mut self) -> TrailResult<()> {
        self.core.require_live()?;
        if let Some(buffers) = self.buffers.as_mut() {
            buffers.iter_mut().for_each(CpuImage::clear);
        }
        debug!("cpu trail buffers reset");
        Ok(())
    }

    /// Applies a partial parameter update, resizing if the scale changed.
    pub fn update_options(&mut self, update: &TrailUpdate) -> TrailResult<()> {
        let buffers = &mut self.buffers;
        self.core.update(update, |extent| {
            allocate(buffers, extent);
            Ok(())
        })
    }

    /// Releases both buffers. A second call does nothing.
    pub fn dispose(&mut self) {
        if self.core.dispose() {
            self.buffers = None;
        }
    }

    /// The most recent output (the history source).
    pub fn output(&self) -> Option<&CpuImage> {
        self.buffers.as_ref().map(PingPong::history)
    }

    /// Buffer in the given slot.
    pub fn buffer(&self, slot: Slot) -> Option<&CpuImage> {
        self.buffers.as_ref().map(|b| b.get(slot))
    }

    /// Slot that the next step writes into.
    pub fn write_slot(&self) -> Option<Slot> {
        self.buffers.as_ref().map(PingPong::write_slot)
    }

    pub fn extent(&self) -> Option<UVec2> {
        self.buffers.as_ref().map(|b| b.write().extent())
    }

    pub fn state(&self) -> &TrailState {
        self.core.state()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.core.lifecycle()
    }

    pub fn blend_mode(&self) -> BlendMode {
        self.core.state().blend_mode()
    }
}

fn allocate(buffers: &mut Option<PingPong<CpuImage>>, extent: UVec2) {
    debug!("cpu trail buffers sized to {}x{}", extent.x, extent.y);
    let a = CpuImage::new(extent.x, extent.y);
    let b = CpuImage::new(extent.x, extent.y);
    match buffers.as_mut() {
        Some(pair) => pair.replace_both(a, b),
        None => *buffers = Some(PingPong::new(a, b)),
    }
}
