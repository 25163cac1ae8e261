use serde::{Deserialize, Serialize};

use crate::error::{MorphError, MorphResult};

pub const CONTROL_MIN: i32 = 0;
pub const CONTROL_MAX: i32 = 127;

/// Deepest subdivision level the geometry cache will build.
pub const MAX_SUBDIVISION_LEVEL: usize = 8;

/// Runtime configuration for a [`MorphEngine`](crate::engine::MorphEngine).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Reference pitch for every TET computation, in Hz.
    pub base_frequency: f64,
    /// Highest level precomputed by the subdivision cache.
    pub max_subdivision_level: usize,
    /// Nominal half-extent of each cube face.
    pub panel_half_extent: f32,
    /// Grid cells along one edge of a panel's geometry buffer.
    pub panel_segments: usize,
    /// Events kept per diagnostic category.
    pub diagnostics_capacity: usize,
    /// Last raw value (inclusive) of the left zone.
    pub left_zone_max: i32,
    /// First raw value (inclusive) of the right zone.
    pub right_zone_min: i32,
    /// Snap raw 0 / 127 straight to the domain extremes.
    pub snap_extremes: bool,
    /// Rotation channel speed at full deflection, rad/s.
    pub rotation_rate: f32,
    /// TET system active after start-up and reset.
    pub default_system: String,
    /// Build the subdivision cache at start-up. Off forces the fallback morph.
    pub precompute_cache: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_frequency: 440.0,
            max_subdivision_level: MAX_SUBDIVISION_LEVEL,
            panel_half_extent: 1.0,
            panel_segments: 8,
            diagnostics_capacity: 100,
            left_zone_max: 52,
            right_zone_min: 74,
            snap_extremes: false,
            rotation_rate: std::f32::consts::PI,
            default_system: "12-TONE".to_string(),
            precompute_cache: true,
        }
    }
}

impl EngineConfig {
    pub fn from_json(text: &str) -> MorphResult<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> MorphResult<()> {
        if !(self.base_frequency > 0.0) {
            return Err(MorphError::Config(format!(
                "base_frequency must be positive, got {}",
                self.base_frequency
            )));
        }
        if self.left_zone_max >= self.right_zone_min {
            return Err(MorphError::Config(format!(
                "left zone ({}) must end before right zone ({}) starts",
                self.left_zone_max, self.right_zone_min
            )));
        }
        if self.left_zone_max <= CONTROL_MIN || self.right_zone_min >= CONTROL_MAX {
            return Err(MorphError::Config(format!(
                "zone bounds must lie strictly inside {CONTROL_MIN}..={CONTROL_MAX}"
            )));
        }
        if self.panel_segments == 0 {
            return Err(MorphError::Config("panel_segments must be at least 1".into()));
        }
        if self.max_subdivision_level > MAX_SUBDIVISION_LEVEL {
            return Err(MorphError::Config(format!(
                "max_subdivision_level {} exceeds {MAX_SUBDIVISION_LEVEL}",
                self.max_subdivision_level
            )));
        }
        if self.diagnostics_capacity == 0 {
            return Err(MorphError::Config(
                "diagnostics_capacity must be at least 1".into(),
            ));
        }
        if !(self.panel_half_extent > 0.0) {
            return Err(MorphError::Config(
                "panel_half_extent must be positive".into(),
            ));
        }
        Ok(())
    }
}
