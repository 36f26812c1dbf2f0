//! Trail parameters: construction options, partial updates and live state.
//!
//! The caller expresses `decay_amount` on a 0-199.9 scale. [`TrailState`]
//! stores it divided by 100 and feeds that into
//!
//! ```text
//! decay = exp(-decay_amount_normalized * 0.2)
//! ```
//!
//! `decay` is the interpolation weight toward the previous frame, so a decay
//! amount of 0 keeps the history forever while large amounts converge on the
//! current frame.

use glam::UVec2;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::blend_mode::BlendMode;

/// Default caller-facing decay amount.
pub const DEFAULT_DECAY_AMOUNT: f32 = 95.0;
/// Default accumulation resolution relative to the viewport.
pub const DEFAULT_RESOLUTION_SCALE: f32 = 0.5;
/// Lowest resolution scale accepted; smaller or non-positive values clamp here.
pub const MIN_RESOLUTION_SCALE: f32 = 0.01;
/// Upper end of the documented decay range. Not enforced.
pub const MAX_DECAY_AMOUNT: f32 = 199.9;

const DECAY_RATE: f32 = 0.2;

/// Computes the history weight for a normalized decay amount.
pub fn decay_factor(decay_amount_normalized: f32) -> f32 {
    (-decay_amount_normalized * DECAY_RATE).exp()
}

/// Buffer size for a viewport at the given resolution scale.
///
/// Each axis is `floor(dim * scale)`, never smaller than 1.
pub fn scaled_extent(viewport: UVec2, resolution_scale: f32) -> UVec2 {
    let scale = |dim: u32| ((dim as f32 * resolution_scale).floor() as u32).max(1);
    UVec2::new(scale(viewport.x), scale(viewport.y))
}

/// Clamps a resolution scale into `(0, 1]`. Returns `None` for NaN.
pub fn sanitize_resolution_scale(value: f32) -> Option<f32> {
    if value.is_nan() {
        None
    } else if value <= 0.0 {
        Some(MIN_RESOLUTION_SCALE)
    } else {
        Some(value.min(1.0))
    }
}

/// Passes any finite decay amount through; rejects NaN and infinities.
pub fn sanitize_decay_amount(value: f32) -> Option<f32> {
    value.is_finite().then_some(value)
}

/// Options recognised when constructing a trail effect.
///
/// Every field has a default, so hosts can deserialize a partial object:
///
/// ```
/// use trailfx::{BlendMode, TrailOptions};
///
/// let options = TrailOptions::new()
///     .decay_amount(60.0)
///     .resolution_scale(0.25)
///     .blend_mode(BlendMode::Screen);
/// assert!(options.enabled);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrailOptions {
    /// Persistence control on the caller's 0-199.9 scale.
    pub decay_amount: f32,
    /// When false the effect copies its input through untouched.
    pub enabled: bool,
    /// Accumulation buffer size relative to the viewport, in `(0, 1]`.
    pub resolution_scale: f32,
    /// Compositing mode handed to the host.
    pub blend_mode: BlendMode,
}

impl Default for TrailOptions {
    fn default() -> Self {
        Self {
            decay_amount: DEFAULT_DECAY_AMOUNT,
            enabled: true,
            resolution_scale: DEFAULT_RESOLUTION_SCALE,
            blend_mode: BlendMode::Lighten,
        }
    }
}

impl TrailOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decay_amount(mut self, decay_amount: f32) -> Self {
        self.decay_amount = decay_amount;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn resolution_scale(mut self, resolution_scale: f32) -> Self {
        self.resolution_scale = resolution_scale;
        self
    }

    pub fn blend_mode(mut self, blend_mode: BlendMode) -> Self {
        self.blend_mode = blend_mode;
        self
    }
}

/// A partial parameter change. `None` fields keep their current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrailUpdate {
    pub decay_amount: Option<f32>,
    pub enabled: Option<bool>,
    pub resolution_scale: Option<f32>,
    pub blend_mode: Option<BlendMode>,
}

impl TrailUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decay_amount(mut self, decay_amount: f32) -> Self {
        self.decay_amount = Some(decay_amount);
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn resolution_scale(mut self, resolution_scale: f32) -> Self {
        self.resolution_scale = Some(resolution_scale);
        self
    }

    pub fn blend_mode(mut self, blend_mode: BlendMode) -> Self {
        self.blend_mode = Some(blend_mode);
        self
    }

    /// True if no field is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// What an applied [`TrailUpdate`] changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateChange {
    /// The resolution scale moved, so buffers must be resized and cleared.
    pub resolution_changed: bool,
    /// The blend mode tag changed.
    pub blend_mode_changed: bool,
}

/// Live trail parameters.
///
/// `decay_amount` is stored normalized (caller value / 100).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailState {
    decay_amount: f32,
    enabled: bool,
    resolution_scale: f32,
    blend_mode: BlendMode,
}

impl Default for TrailState {
    fn default() -> Self {
        Self::from_options(&TrailOptions::default())
    }
}

impl TrailState {
    /// Builds the state from construction options, sanitising out-of-range values.
    pub fn from_options(options: &TrailOptions) -> Self {
        let mut state = Self {
            decay_amount: DEFAULT_DECAY_AMOUNT / 100.0,
            enabled: options.enabled,
            resolution_scale: DEFAULT_RESOLUTION_SCALE,
            blend_mode: options.blend_mode,
        };
        state.apply(&TrailUpdate {
            decay_amount: Some(options.decay_amount),
            resolution_scale: Some(options.resolution_scale),
            ..TrailUpdate::default()
        });
        state
    }

    /// Applies a partial update and reports what changed.
    ///
    /// NaN resolution scales and non-finite decay amounts are ignored with a
    /// warning; the previous value is kept.
    pub fn apply(&mut self, update: &TrailUpdate) -> StateChange {
        let mut change = StateChange::default();

        if let Some(amount) = update.decay_amount {
            match sanitize_decay_amount(amount) {
                Some(amount) => self.decay_amount = amount / 100.0,
                None => warn!("ignoring non-finite trail decay amount {amount}"),
            }
        }

        if let Some(enabled) = update.enabled {
            self.enabled = enabled;
        }

        if let Some(scale) = update.resolution_scale {
            match sanitize_resolution_scale(scale) {
                Some(scale) => {
                    change.resolution_changed = scale != self.resolution_scale;
                    self.resolution_scale = scale;
                }
                None => warn!("ignoring NaN trail resolution scale"),
            }
        }

        if let Some(mode) = update.blend_mode {
            change.blend_mode_changed = mode != self.blend_mode;
            self.blend_mode = mode;
        }

        change
    }

    /// Decay amount on the caller's scale (0-199.9).
    pub fn decay_amount(&self) -> f32 {
        self.decay_amount * 100.0
    }

    /// Decay amount divided by 100, as used by the decay formula.
    pub fn decay_amount_normalized(&self) -> f32 {
        self.decay_amount
    }

    /// History weight for the next blend pass.
    pub fn decay(&self) -> f32 {
        decay_factor(self.decay_amount)
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn resolution_scale(&self) -> f32 {
        self.resolution_scale
    }

    pub fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    /// Accumulation buffer size for `viewport` at the current scale.
    pub fn extent_for(&self, viewport: UVec2) -> UVec2 {
        scaled_extent(viewport, self.resolution_scale)
    }

    /// Snapshot of the state as construction options.
    pub fn to_options(&self) -> TrailOptions {
        TrailOptions {
            decay_amount: self.decay_amount(),
            enabled: self.enabled,
            resolution_scale: self.resolution_scale,
            blend_mode: self.blend_mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn defaults() {
        let state = TrailState::default();
        assert!(approx(state.decay_amount(), 95.0));
        assert!(approx(state.decay_amount_normalized(), 0.95));
        assert!(state.enabled());
        assert_eq!(state.resolution_scale(), 0.5);
        assert_eq!(state.blend_mode(), BlendMode::Lighten);
    }

    #[test]
    fn default_decay_is_about_point_eight_three() {
        let decay = TrailState::default().decay();
        assert!(approx(decay, (-0.19f32).exp()));
        assert!((decay - 0.827).abs() < 0.005);
    }

    #[test]
    fn decay_bounds() {
        assert_eq!(decay_factor(0.0), 1.0);
        let mut previous = 1.0;
        for step in 1..=2000 {
            let d = decay_factor(step as f32 / 100.0);
            assert!(d > 0.0 && d <= 1.0);
            assert!(d < previous);
            previous = d;
        }
        assert!(decay_factor(1000.0) < 1e-30);
        assert_eq!(decay_factor(f32::INFINITY), 0.0);
    }

    #[test]
    fn scaled_extent_floors() {
        assert_eq!(scaled_extent(UVec2::new(800, 600), 0.5), UVec2::new(400, 300));
        assert_eq!(scaled_extent(UVec2::new(801, 601), 0.5), UVec2::new(400, 300));
        assert_eq!(scaled_extent(UVec2::new(800, 600), 0.25), UVec2::new(200, 150));
        assert_eq!(scaled_extent(UVec2::new(333, 333), 1.0), UVec2::new(333, 333));
    }

    #[test]
    fn scaled_extent_is_at_least_one_pixel() {
        assert_eq!(scaled_extent(UVec2::new(1, 1), 0.01), UVec2::ONE);
        assert_eq!(scaled_extent(UVec2::ZERO, 0.5), UVec2::ONE);
    }

    #[test]
    fn resolution_scale_is_clamped() {
        assert_eq!(sanitize_resolution_scale(0.0), Some(MIN_RESOLUTION_SCALE));
        assert_eq!(sanitize_resolution_scale(-3.0), Some(MIN_RESOLUTION_SCALE));
        assert_eq!(sanitize_resolution_scale(2.0), Some(1.0));
        assert_eq!(sanitize_resolution_scale(f32::INFINITY), Some(1.0));
        assert_eq!(sanitize_resolution_scale(0.3), Some(0.3));
        assert_eq!(sanitize_resolution_scale(f32::NAN), None);
    }

    #[test]
    fn decay_amount_passes_through_unclamped() {
        let mut state = TrailState::default();
        state.apply(&TrailUpdate::new().decay_amount(500.0));
        assert!(approx(state.decay_amount_normalized(), 5.0));
        state.apply(&TrailUpdate::new().decay_amount(-20.0));
        assert!(approx(state.decay_amount_normalized(), -0.2));
        assert!(state.decay() > 1.0);
    }

    #[test]
    fn non_finite_values_are_ignored() {
        let mut state = TrailState::default();
        state.apply(&TrailUpdate::new().decay_amount(f32::NAN));
        state.apply(&TrailUpdate::new().decay_amount(f32::NEG_INFINITY));
        let change = state.apply(&TrailUpdate::new().resolution_scale(f32::NAN));
        assert!(approx(state.decay_amount(), 95.0));
        assert_eq!(state.resolution_scale(), 0.5);
        assert!(!change.resolution_changed);
    }

    #[test]
    fn apply_reports_changes() {
        let mut state = TrailState::default();
        let change = state.apply(&TrailUpdate::new().resolution_scale(0.25));
        assert!(change.resolution_changed);
        assert!(!change.blend_mode_changed);

        let change = state.apply(&TrailUpdate::new().resolution_scale(0.25));
        assert!(!change.resolution_changed);

        let change = state.apply(&TrailUpdate::new().blend_mode(BlendMode::Screen));
        assert!(change.blend_mode_changed);
        assert_eq!(state.blend_mode(), BlendMode::Screen);
    }

    #[test]
    fn empty_update_changes_nothing() {
        let mut state = TrailState::default();
        let before = state;
        assert!(TrailUpdate::new().is_empty());
        assert_eq!(state.apply(&TrailUpdate::new()), StateChange::default());
        assert_eq!(state, before);
    }

    #[test]
    fn construction_sanitises_options() {
        let state = TrailState::from_options(&TrailOptions::new().resolution_scale(0.0));
        assert_eq!(state.resolution_scale(), MIN_RESOLUTION_SCALE);
    }

    #[test]
    fn options_round_trip_through_state() {
        let options = TrailOptions::new()
            .decay_amount(42.0)
            .enabled(false)
            .resolution_scale(0.75)
            .blend_mode(BlendMode::Add);
        let back = TrailState::from_options(&options).to_options();
        assert!(approx(back.decay_amount, 42.0));
        assert!(!back.enabled);
        assert_eq!(back.resolution_scale, 0.75);
        assert_eq!(back.blend_mode, BlendMode::Add);
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: TrailOptions =
            serde_json::from_str(r#"{ "decayAmount": 120.5, "blendMode": "screen" }"#).unwrap();
        assert_eq!(options.decay_amount, 120.5);
        assert!(options.enabled);
        assert_eq!(options.resolution_scale, 0.5);
        assert_eq!(options.blend_mode, BlendMode::Screen);
    }

    #[test]
    fn update_deserializes_partially() {
        let update: TrailUpdate = serde_json::from_str(r#"{ "resolutionScale": 0.25 }"#).unwrap();
        assert_eq!(update, TrailUpdate::new().resolution_scale(0.25));
    }
}
