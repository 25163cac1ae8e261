use macroquad::math::{Vec2, Vec3};
use tracing::warn;

use crate::diagnostics::{self, DiagnosticEvent, DiagnosticsHandle, MorphEvent};
use crate::geometry::{QuadMesh, ease_in_out_cubic, square_to_circle};
use crate::panel::{Panel, PanelTransform};
use crate::state::GeometryMode;
use crate::subdivision::{CellularPhase, SubdivisionGeometryCache};

/// Radial bulge of the spherical target at full sphere progress.
const SPHERE_BULGE: f32 = 0.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MorphPath {
    /// Progress 0: buffer restored from the stored original.
    Reset,
    /// Cached level interpolation.
    Cached,
    /// Progress 1: terminal cached level written directly.
    Terminal,
    /// Flat square→circle remap, used only when the cache lookup fails.
    Fallback,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MorphOutcome {
    pub path: MorphPath,
    pub level: usize,
    pub fraction: f32,
    pub sphere_progress: f32,
    pub phase: Option<CellularPhase>,
}

/// Splits `progress * max_level` into a discrete level and its fraction.
/// Full progress resolves to the terminal level with zero fraction.
pub fn resolve_level(progress: f32, max_level: usize) -> (usize, f32) {
    let progress = progress.clamp(0.0, 1.0);
    if progress >= 1.0 {
        return (max_level, 0.0);
    }
    let scaled = progress * max_level as f32;
    let level = (scaled.floor() as usize).min(max_level);
    (level, scaled - scaled.floor())
}

/// Writes deformed vertex positions into a panel's geometry buffer.
#[derive(Clone, Debug, Default)]
pub struct PanelMorphApplier {
    diagnostics: Option<DiagnosticsHandle>,
}

impl PanelMorphApplier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_diagnostics(diagnostics: DiagnosticsHandle) -> Self {
        Self {
            diagnostics: Some(diagnostics),
        }
    }

    pub fn apply_morph(
        &self,
        panel: &mut Panel,
        progress: f32,
        cache: Option<&SubdivisionGeometryCache>,
    ) -> MorphOutcome {
        let progress = if progress.is_finite() {
            progress.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let id = panel.id();
        let transform = *panel.transform();
        let half_extent = panel.half_extent();
        let (original, live) = panel.geometry_pair();

        let outcome = if progress == 0.0 {
            live.positions.clone_from(&original.positions);
            live.normals.clone_from(&original.normals);
            MorphOutcome {
                path: MorphPath::Reset,
                level: 0,
                fraction: 0.0,
                sphere_progress: 0.0,
                phase: Some(CellularPhase::Interphase),
            }
        } else {
            match cache.and_then(|cache| Self::cached_progress(cache, progress)) {
                Some((level, fraction, sphere_progress, phase)) => {
                    write_spherical(original, live, half_extent, sphere_progress);
                    MorphOutcome {
                        path: if progress >= 1.0 {
                            MorphPath::Terminal
                        } else {
                            MorphPath::Cached
                        },
                        level,
                        fraction,
                        sphere_progress,
                        phase: Some(phase),
                    }
                }
                None => {
                    warn!(
                        panel = id.label(),
                        progress,
                        "subdivision cache miss, using flat fallback"
                    );
                    let eased = ease_in_out_cubic(progress);
                    write_square_to_circle(original, live, &transform, eased);
                    MorphOutcome {
                        path: MorphPath::Fallback,
                        level: 0,
                        fraction: progress,
                        sphere_progress: eased,
                        phase: None,
                    }
                }
            }
        };

        if let Some(handle) = &self.diagnostics {
            diagnostics::record(
                handle,
                DiagnosticEvent::Morph(MorphEvent {
                    source: format!("panel:{}", id.label()),
                    progress,
                    level: outcome.level,
                    geometry_mode: GeometryMode::from_progress(progress),
                    detail: format!(
                        "{:?} t={:.3} sphere={:.3}",
                        outcome.path, outcome.fraction, outcome.sphere_progress
                    ),
                }),
            );
        }
        outcome
    }

    /// Sphere progress read off the cache: the level's own value blended
    /// towards the next level by the fractional part.
    fn cached_progress(
        cache: &SubdivisionGeometryCache,
        progress: f32,
    ) -> Option<(usize, f32, f32, CellularPhase)> {
        let (level, fraction) = resolve_level(progress, cache.max_level());
        let entry = cache.try_get(level)?;
        let next = cache.try_get(level + 1).unwrap_or(entry);
        let sphere_progress =
            entry.sphere_progress + (next.sphere_progress - entry.sphere_progress) * fraction;
        Some((level, fraction, sphere_progress, entry.phase))
    }
}

fn write_spherical(original: &QuadMesh, live: &mut QuadMesh, radius: f32, sphere_progress: f32) {
    let target_radius = radius * (1.0 + sphere_progress * SPHERE_BULGE);
    for (out, vertex) in live.positions.iter_mut().zip(&original.positions) {
        let spherical = vertex.normalize_or_zero() * target_radius;
        *out = vertex.lerp(spherical, sphere_progress);
    }
    live.recompute_normals();
}

fn write_square_to_circle(
    original: &QuadMesh,
    live: &mut QuadMesh,
    transform: &PanelTransform,
    blend: f32,
) {
    for (out, vertex) in live.positions.iter_mut().zip(&original.positions) {
        let local = *vertex - transform.position;
        let flat = Vec2::new(local.dot(transform.axis_u), local.dot(transform.axis_v));
        let remapped = flat.lerp(square_to_circle(flat), blend);
        let depth = local.dot(transform.normal);
        *out = transform.position
            + transform.axis_u * remapped.x
            + transform.axis_v * remapped.y
            + transform.normal * depth;
    }
    live.recompute_normals();
}

/// Distance from the panel centre to its farthest vertex.
pub fn panel_reach(panel: &Panel) -> f32 {
    let centre: Vec3 = panel.transform().position;
    panel
        .geometry()
        .positions
        .iter()
        .map(|p| (*p - centre).length())
        .fold(0.0, f32::max)
}
