use serde::{Deserialize, Serialize};

pub const MIN_OPACITY: f32 = 0.4;
pub const MAX_OPACITY: f32 = 1.0;
pub const DEFAULT_OPACITY: f32 = 0.9;
pub const DEFAULT_VOLUME_PERCENT: u8 = 70;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Grey,
    Transparent,
}

impl Theme {
    pub fn label(self) -> &'static str {
        match self {
            Self::Grey => "Soft Dark",
            Self::Transparent => "Transparent",
        }
    }
}

/// Clamps an opacity into the range the opacity dialog allows.
///
/// Non-finite input is treated as corrupt and replaced by the default.
pub fn clamp_opacity(value: f32) -> f32 {
    if !value.is_finite() {
        return DEFAULT_OPACITY;
    }
    value.clamp(MIN_OPACITY, MAX_OPACITY)
}

/// Opacity for a slider position in percent (40..=100).
pub fn opacity_from_percent(percent: u8) -> f32 {
    clamp_opacity(f32::from(percent) / 100.0)
}

pub fn opacity_percent(opacity: f32) -> u8 {
    (clamp_opacity(opacity) * 100.0).round() as u8
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    pub theme: Theme,
    pub opacity: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            opacity: DEFAULT_OPACITY,
        }
    }
}
