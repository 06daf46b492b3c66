use std::path::Path;

use anyhow::Context as _;

use crate::foundation::core::Rgb8;
use crate::foundation::error::{TrailError, TrailResult};
use crate::recolor::transform::TransformParams;

/// Width/height of one spawnable slot size, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SizeVariant {
    /// Width in pixels.
    pub width: f64,
    /// Height in pixels.
    pub height: f64,
}

impl SizeVariant {
    /// Construct a variant.
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Trail configuration. Every numeric default is a tuning value, not a contract.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrailConfig {
    /// Maximum number of simultaneously non-idle slots (clamped to `pool_len - 1`).
    pub visible_capacity: usize,
    /// Pointer travel since the last spawn required before the next spawn.
    pub spawn_threshold_px: f64,
    /// Minimum time between spawns.
    pub spawn_cooldown_ms: u64,
    /// Minimum time between recolor initiations.
    pub recolor_debounce_ms: u64,
    /// Length of the duotone cross-fade.
    pub recolor_duration_secs: f64,
    /// Duotone color for dark tones.
    pub color_a: Rgb8,
    /// Duotone color for light tones.
    pub color_b: Rgb8,
    /// Duotone dither amplitude in `[0, 1)`.
    pub noise_amount: f64,
    /// Duotone curve intensity (> 0).
    pub intensity: f64,
    /// When `false` no slot is ever recolored.
    pub enabled: bool,

    /// Fraction of the remaining distance the smoothed pointer covers per frame.
    pub smoothing: f64,
    /// Spawn motion duration.
    pub intro_duration_ms: u64,
    /// Scale a slot spawns at before easing to 1.
    pub intro_start_scale: f64,
    /// Spawned slots settle at a random rotation in `±max_rotation_deg`.
    pub max_rotation_deg: f64,
    /// Fade-out duration of a retiring slot.
    pub retire_duration_ms: u64,
    /// Sizes a spawn picks from.
    pub size_variants: Vec<SizeVariant>,
    /// Seed for variant and rotation picks.
    pub seed: u64,
}

impl Default for TrailConfig {
    fn default() -> Self {
        let recolor = TransformParams::default();
        Self {
            visible_capacity: 3,
            spawn_threshold_px: 200.0,
            spawn_cooldown_ms: 300,
            recolor_debounce_ms: 200,
            recolor_duration_secs: recolor.duration_secs,
            color_a: recolor.color_a,
            color_b: recolor.color_b,
            noise_amount: recolor.noise_amount,
            intensity: recolor.intensity,
            enabled: true,
            smoothing: 0.3,
            intro_duration_ms: 800,
            intro_start_scale: 0.8,
            max_rotation_deg: 2.0,
            retire_duration_ms: 800,
            size_variants: vec![SizeVariant::new(360.0, 400.0), SizeVariant::new(270.0, 380.0)],
            seed: 0x5EED_7A11,
        }
    }
}

impl TrailConfig {
    /// Read and validate a JSON configuration file.
    pub fn from_json_file(path: &Path) -> TrailResult<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read trail config '{}'", path.display()))?;
        Self::from_json_str(&text)
    }

    /// Parse and validate JSON configuration. Missing fields take their defaults.
    pub fn from_json_str(text: &str) -> TrailResult<Self> {
        let cfg: Self = serde_json::from_str(text)
            .map_err(|e| TrailError::validation(format!("parse trail config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check every option against its documented range.
    pub fn validate(&self) -> TrailResult<()> {
        if self.visible_capacity == 0 {
            return Err(TrailError::validation("visible_capacity must be >= 1"));
        }
        if !self.spawn_threshold_px.is_finite() || self.spawn_threshold_px <= 0.0 {
            return Err(TrailError::validation(
                "spawn_threshold_px must be finite and > 0",
            ));
        }
        if !(self.smoothing > 0.0 && self.smoothing <= 1.0) {
            return Err(TrailError::validation("smoothing must be in (0, 1]"));
        }
        if !self.intro_start_scale.is_finite() || self.intro_start_scale <= 0.0 {
            return Err(TrailError::validation(
                "intro_start_scale must be finite and > 0",
            ));
        }
        if !self.max_rotation_deg.is_finite() || self.max_rotation_deg < 0.0 {
            return Err(TrailError::validation(
                "max_rotation_deg must be finite and >= 0",
            ));
        }
        if self.size_variants.is_empty() {
            return Err(TrailError::validation("size_variants must not be empty"));
        }
        if self.size_variants.iter().any(|v| {
            !(v.width.is_finite() && v.height.is_finite() && v.width > 0.0 && v.height > 0.0)
        }) {
            return Err(TrailError::validation(
                "size_variants entries must have finite, positive width and height",
            ));
        }
        self.recolor_params().validate()
    }

    /// Duotone parameters derived from this configuration.
    pub fn recolor_params(&self) -> TransformParams {
        TransformParams {
            color_a: self.color_a,
            color_b: self.color_b,
            intensity: self.intensity,
            noise_amount: self.noise_amount,
            duration_secs: self.recolor_duration_secs,
        }
    }

    /// Visible capacity for a pool of `pool_len` images: never more than `pool_len - 1`, never 0.
    pub fn effective_capacity(&self, pool_len: usize) -> usize {
        self.visible_capacity.min(pool_len.saturating_sub(1)).max(1)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/trail/config.rs"]
mod tests;
