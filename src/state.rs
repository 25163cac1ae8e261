use serde::{Deserialize, Serialize};

use crate::subdivision::CellularPhase;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryMode {
    Cube,
    Morphing,
    Sphere,
}

impl GeometryMode {
    pub fn from_progress(progress: f32) -> Self {
        if progress <= 0.0 {
            GeometryMode::Cube
        } else if progress >= 1.0 {
            GeometryMode::Sphere
        } else {
            GeometryMode::Morphing
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            GeometryMode::Cube => "CUBE",
            GeometryMode::Morphing => "MORPHING",
            GeometryMode::Sphere => "SPHERE",
        }
    }
}

/// The one owned record of global morph progress. Everything else
/// (mode, level, phase) is derived on read so it cannot drift.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MorphState {
    progress: f32,
}

impl MorphState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    /// Clamps into `[0, 1]`; non-finite input resets to 0.
    /// Returns whether the stored value changed.
    pub fn set_progress(&mut self, progress: f32) -> bool {
        let progress = if progress.is_finite() {
            progress.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let changed = progress.to_bits() != self.progress.to_bits();
        self.progress = progress;
        changed
    }

    pub fn geometry_mode(&self) -> GeometryMode {
        GeometryMode::from_progress(self.progress)
    }

    /// Continuous level position, `progress * max_levels`.
    pub fn level_position(&self, max_levels: usize) -> f32 {
        self.progress * max_levels as f32
    }

    pub fn current_level(&self, max_levels: usize) -> usize {
        (self.level_position(max_levels).floor() as usize).min(max_levels)
    }

    pub fn level_fraction(&self, max_levels: usize) -> f32 {
        let position = self.level_position(max_levels);
        let fraction = position - position.floor();
        if self.current_level(max_levels) >= max_levels {
            0.0
        } else {
            fraction
        }
    }

    pub fn cellular_phase(&self, max_levels: usize) -> CellularPhase {
        CellularPhase::for_level(self.current_level(max_levels))
    }
}
