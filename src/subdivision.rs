use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::diagnostics::{self, DiagnosticEvent, DiagnosticsHandle, MorphEvent};
use crate::geometry::QuadMesh;
use crate::state::GeometryMode;

/// Mitosis-stage label attached to a subdivision level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellularPhase {
    Interphase,
    Prophase,
    Metaphase,
    Anaphase,
    Telophase,
    Cytokinesis,
}

impl CellularPhase {
    pub const VALUES: [CellularPhase; 6] = [
        CellularPhase::Interphase,
        CellularPhase::Prophase,
        CellularPhase::Metaphase,
        CellularPhase::Anaphase,
        CellularPhase::Telophase,
        CellularPhase::Cytokinesis,
    ];

    /// Levels past the fifth all saturate at `Cytokinesis`.
    pub fn for_level(level: usize) -> Self {
        Self::VALUES[level.min(Self::VALUES.len() - 1)]
    }

    pub fn label(&self) -> &'static str {
        match self {
            CellularPhase::Interphase => "INTERPHASE",
            CellularPhase::Prophase => "PROPHASE",
            CellularPhase::Metaphase => "METAPHASE",
            CellularPhase::Anaphase => "ANAPHASE",
            CellularPhase::Telophase => "TELOPHASE",
            CellularPhase::Cytokinesis => "CYTOKINESIS",
        }
    }
}

#[derive(Clone, Debug)]
pub struct SubdivisionLevel {
    pub level: usize,
    pub face_count: usize,
    pub sphere_progress: f32,
    pub phase: CellularPhase,
    pub geometry: QuadMesh,
}

impl SubdivisionLevel {
    /// Whether this level stores the round approximation.
    pub fn is_spherical(&self) -> bool {
        self.sphere_progress >= 0.5
    }
}

/// Immutable ladder of cube→sphere detail levels built once at start-up.
#[derive(Debug)]
pub struct SubdivisionGeometryCache {
    levels: Vec<SubdivisionLevel>,
    half_extent: f32,
    diagnostics: Option<DiagnosticsHandle>,
}

impl SubdivisionGeometryCache {
    /// Builds levels `0..=max_level`. Each level refines the previous
    /// faceted topology; from the midpoint on, the stored geometry is
    /// that topology projected onto a sphere (a hard switch, not a blend).
    pub fn precompute(max_level: usize, half_extent: f32) -> Self {
        let mut faceted = QuadMesh::cube(half_extent);
        let mut levels = Vec::with_capacity(max_level + 1);
        let radius = half_extent * 3f32.sqrt();

        for level in 0..=max_level {
            if level > 0 {
                faceted = faceted.subdivide();
            }
            let sphere_progress = if max_level == 0 {
                0.0
            } else {
                level as f32 / max_level as f32
            };
            let geometry = if level > 0 && sphere_progress >= 0.5 {
                faceted.spherified(radius)
            } else {
                faceted.clone()
            };
            levels.push(SubdivisionLevel {
                level,
                face_count: geometry.face_count(),
                sphere_progress,
                phase: CellularPhase::for_level(level),
                geometry,
            });
        }

        let total_faces: usize = levels.iter().map(|l| l.face_count).sum();
        info!(levels = levels.len(), total_faces, "subdivision cache ready");
        Self {
            levels,
            half_extent,
            diagnostics: None,
        }
    }

    /// Routes clamped lookups into the shared diagnostics sink.
    pub fn with_diagnostics(mut self, diagnostics: DiagnosticsHandle) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    pub fn max_level(&self) -> usize {
        self.levels.len().saturating_sub(1)
    }

    pub fn half_extent(&self) -> f32 {
        self.half_extent
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Exact lookup; `None` when the level was never built.
    pub fn try_get(&self, level: usize) -> Option<&SubdivisionLevel> {
        self.levels.get(level)
    }

    /// Clamped lookup. Out-of-range requests resolve to the nearest
    /// built level, are logged, and are recorded as a morph event.
    pub fn get(&self, level: i64) -> &SubdivisionLevel {
        let max = self.max_level() as i64;
        let clamped = level.clamp(0, max);
        let entry = &self.levels[clamped as usize];
        if clamped != level {
            warn!(requested = level, resolved = clamped, "subdivision level clamped");
            if let Some(handle) = &self.diagnostics {
                // the cache has no global progress; report the level's own
                diagnostics::record(
                    handle,
                    DiagnosticEvent::Morph(MorphEvent {
                        source: "cache".to_string(),
                        progress: entry.sphere_progress,
                        level: entry.level,
                        geometry_mode: GeometryMode::from_progress(entry.sphere_progress),
                        detail: format!("level {level} clamped to {clamped}"),
                    }),
                );
            }
        }
        entry
    }

    pub fn levels(&self) -> &[SubdivisionLevel] {
        &self.levels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_saturate() {
        assert_eq!(CellularPhase::for_level(0), CellularPhase::Interphase);
        assert_eq!(CellularPhase::for_level(4), CellularPhase::Telophase);
        assert_eq!(CellularPhase::for_level(5), CellularPhase::Cytokinesis);
        assert_eq!(CellularPhase::for_level(8), CellularPhase::Cytokinesis);
    }

    #[test]
    fn hard_switch_at_midpoint() {
        let cache = SubdivisionGeometryCache::precompute(4, 1.0);
        assert!(!cache.get(1).is_spherical());
        assert!(cache.get(2).is_spherical());
        let radius = 3f32.sqrt();
        for p in &cache.get(2).geometry.positions {
            assert!((p.length() - radius).abs() < 1e-4);
        }
        // faceted level still has vertices on the cube faces
        let faceted = &cache.get(1).geometry;
        assert!(faceted.positions.iter().any(|p| (p.length() - 1.0).abs() < 1e-6));
    }

    #[test]
    fn out_of_range_levels_clamp() {
        let cache = SubdivisionGeometryCache::precompute(3, 1.0);
        assert_eq!(cache.get(-4).level, 0);
        assert_eq!(cache.get(99).level, 3);
        assert!(cache.try_get(4).is_none());
    }

    #[test]
    fn clamped_lookup_reaches_diagnostics() {
        let sink = crate::diagnostics::MorphDiagnostics::shared(10);
        let cache = SubdivisionGeometryCache::precompute(2, 1.0).with_diagnostics(sink.clone());
        cache.get(1);
        assert!(diagnostics::snapshot(&sink).is_empty());

        cache.get(7);
        let events = sink.lock().unwrap().morph_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].source, "cache");
        assert_eq!(events[0].level, 2);
        assert_eq!(events[0].detail, "level 7 clamped to 2");
    }

    #[test]
    fn single_level_cache_is_the_cube() {
        let cache = SubdivisionGeometryCache::precompute(0, 1.0);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(0).face_count, 6);
        assert_eq!(cache.get(0).sphere_progress, 0.0);
    }
}
