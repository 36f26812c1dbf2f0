//! Host-facing compositing modes.
//!
//! The trail accumulator stores a [`BlendMode`] and hands it to the host
//! untouched. Only the host's compositor (for example [`CompositePass`]) decides
//! what each mode means.
//!
//! [`CompositePass`]: crate::CompositePass

use serde::{Deserialize, Serialize};
use strum::{Display, EnumCount, EnumIter, EnumString, IntoStaticStr};

/// How the trail output is merged with the underlying scene.
///
/// Names parse and print in kebab-case (`"color-dodge"`, `"lighten"`).
/// The discriminant is the shader-side mode index used by [`CompositePass`].
///
/// [`CompositePass`]: crate::CompositePass
#[repr(u32)]
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    EnumCount,
    IntoStaticStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum BlendMode {
    /// Ignore the trail, show the scene only.
    Skip = 0,
    /// Replace the scene with the trail.
    Set = 1,
    Add = 2,
    Alpha = 3,
    Average = 4,
    Color = 5,
    ColorBurn = 6,
    ColorDodge = 7,
    Darken = 8,
    Difference = 9,
    Divide = 10,
    Exclusion = 11,
    HardLight = 12,
    HardMix = 13,
    Hue = 14,
    Invert = 15,
    InvertRgb = 16,
    #[default]
    Lighten = 17,
    LinearBurn = 18,
    LinearDodge = 19,
    LinearLight = 20,
    Luminosity = 21,
    Multiply = 22,
    Negation = 23,
    Normal = 24,
    Overlay = 25,
    PinLight = 26,
    Reflect = 27,
    Saturation = 28,
    Screen = 29,
    SoftLight = 30,
    Subtract = 31,
    VividLight = 32,
}

impl BlendMode {
    /// Index passed to the composite shader.
    pub fn shader_index(self) -> u32 {
        self as u32
    }

    /// The kebab-case name of this mode.
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// The mode after `self` in declaration order, wrapping around.
    ///
    /// Handy for cycling through modes from a key binding.
    pub fn next(self) -> Self {
        use strum::IntoEnumIterator;
        let index = (self.shader_index() as usize + 1) % Self::COUNT;
        Self::iter().nth(index).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn default_is_lighten() {
        assert_eq!(BlendMode::default(), BlendMode::Lighten);
    }

    #[test]
    fn thirty_three_modes_ending_at_vivid_light() {
        assert_eq!(BlendMode::COUNT, 33);
        assert_eq!(BlendMode::VividLight.shader_index(), 32);
    }

    #[test]
    fn shader_indices_follow_declaration_order() {
        for (i, mode) in BlendMode::iter().enumerate() {
            assert_eq!(mode.shader_index() as usize, i, "{mode}");
        }
    }

    #[test]
    fn parses_kebab_case_names() {
        assert_eq!(BlendMode::from_str("screen").unwrap(), BlendMode::Screen);
        assert_eq!(
            BlendMode::from_str("color-dodge").unwrap(),
            BlendMode::ColorDodge
        );
        assert_eq!(BlendMode::from_str("LIGHTEN").unwrap(), BlendMode::Lighten);
        assert!(BlendMode::from_str("sparkle").is_err());
    }

    #[test]
    fn display_matches_name() {
        assert_eq!(BlendMode::SoftLight.to_string(), "soft-light");
        assert_eq!(BlendMode::SoftLight.name(), "soft-light");
    }

    #[test]
    fn next_wraps_around() {
        assert_eq!(BlendMode::Skip.next(), BlendMode::Set);
        assert_eq!(BlendMode::VividLight.next(), BlendMode::Skip);
    }

    #[test]
    fn serde_uses_kebab_case() {
        let json = serde_json::to_string(&BlendMode::HardLight).unwrap();
        assert_eq!(json, "\"hard-light\"");
        let mode: BlendMode = serde_json::from_str("\"linear-dodge\"").unwrap();
        assert_eq!(mode, BlendMode::LinearDodge);
    }
}
