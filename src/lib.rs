//! Cube↔sphere panel morphing with microtonal frequency mapping.
//!
//! A single bounded control value (a mod wheel, say) drives a dead-zone
//! motion loop; the resulting progress deforms six cube panels through a
//! precomputed subdivision ladder and picks an equal-temperament pitch
//! for every panel and sub-panel.

pub mod config;
pub mod controllers;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod frequency;
pub mod geometry;
pub mod morph;
pub mod panel;
pub mod state;
pub mod subdivision;

pub use config::EngineConfig;
pub use controllers::{ControlChannel, ControlZone, MorphProgressController, ZoneMap};
pub use diagnostics::{DiagnosticEvent, DiagnosticsHandle, MorphDiagnostics};
pub use engine::{EngineSnapshot, MorphEngine};
pub use error::{MorphError, MorphResult};
pub use frequency::{FrequencyData, MicrotonalFrequencyCalculator, TetRegistry, TetSystem};
pub use morph::PanelMorphApplier;
pub use panel::{PanelId, PanelSet};
pub use state::{GeometryMode, MorphState};
pub use subdivision::{CellularPhase, SubdivisionGeometryCache, SubdivisionLevel};
