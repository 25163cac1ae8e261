use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::controllers::{
    ChannelMap, ControlChannel, ControlMessage, ControlResponse, MorphProgressController,
};
use crate::diagnostics::{
    self, DiagnosticEvent, DiagnosticsHandle, FrequencyEvent, MorphDiagnostics, MorphEvent,
};
use crate::error::{MorphError, MorphResult};
use crate::frequency::{FrequencyData, MicrotonalFrequencyCalculator, TetRegistry, TetSystem};
use crate::morph::{PanelMorphApplier, resolve_level};
use crate::panel::{PANEL_COUNT, PanelId, PanelSet, PitchClass, TextureHandle};
use crate::state::{GeometryMode, MorphState};
use crate::subdivision::{CellularPhase, SubdivisionGeometryCache, SubdivisionLevel};

const ROTATION_AXES: usize = 3;

/// Camera-side state carried alongside the morph in a snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NavigationState {
    pub rotation: [f32; ROTATION_AXES],
    pub active_system: String,
    pub fractal_mode: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PanelSnapshot {
    pub visible: bool,
    pub color: [f32; 4],
    pub has_texture: bool,
    pub texture: Option<TextureHandle>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub progress: f32,
    pub geometry_mode: GeometryMode,
    pub cellular_phase: CellularPhase,
    pub per_panel: Vec<PanelSnapshot>,
    pub navigation: NavigationState,
}

/// Frequency of one sub-panel: its pitch-class reference scaled by the
/// parent panel's harmonic ratio.
#[derive(Clone, Debug, PartialEq)]
pub struct SubPanelFrequency {
    pub parent: PanelId,
    pub pitch: PitchClass,
    pub data: FrequencyData,
}

/// Owns the morph state and every component that reads or writes it.
pub struct MorphEngine {
    config: EngineConfig,
    state: MorphState,
    cache: Option<SubdivisionGeometryCache>,
    panels: PanelSet,
    applier: PanelMorphApplier,
    calculator: MicrotonalFrequencyCalculator,
    registry: TetRegistry,
    active_system: TetSystem,
    controllers: Vec<MorphProgressController>,
    rotation: [f32; ROTATION_AXES],
    channel_map: ChannelMap,
    diagnostics: DiagnosticsHandle,
}

impl MorphEngine {
    pub fn new(config: EngineConfig) -> MorphResult<Self> {
        Self::with_registry(config, TetRegistry::standard())
    }

    pub fn with_registry(config: EngineConfig, registry: TetRegistry) -> MorphResult<Self> {
        config.validate()?;
        let active_system = registry.get(&config.default_system)?.clone();
        let diagnostics = MorphDiagnostics::shared(config.diagnostics_capacity);
        let cache = config.precompute_cache.then(|| {
            SubdivisionGeometryCache::precompute(
                config.max_subdivision_level,
                config.panel_half_extent,
            )
            .with_diagnostics(diagnostics.clone())
        });
        let controllers = ControlChannel::VALUES
            .iter()
            .map(|channel| MorphProgressController::for_channel(*channel, &config))
            .collect();
        info!(
            system = %active_system.name,
            cached = cache.is_some(),
            "morph engine ready"
        );
        Ok(Self {
            state: MorphState::new(),
            cache,
            panels: PanelSet::new(config.panel_half_extent, config.panel_segments),
            applier: PanelMorphApplier::with_diagnostics(diagnostics.clone()),
            calculator: MicrotonalFrequencyCalculator::new(config.base_frequency),
            registry,
            active_system,
            controllers,
            rotation: [0.0; ROTATION_AXES],
            channel_map: ChannelMap::default(),
            diagnostics,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &MorphState {
        &self.state
    }

    pub fn progress(&self) -> f32 {
        self.state.progress()
    }

    pub fn geometry_mode(&self) -> GeometryMode {
        self.state.geometry_mode()
    }

    pub fn current_level(&self) -> usize {
        self.state
            .current_level(self.active_system.max_levels as usize)
    }

    pub fn level_fraction(&self) -> f32 {
        self.state
            .level_fraction(self.active_system.max_levels as usize)
    }

    pub fn cellular_phase(&self) -> CellularPhase {
        self.state
            .cellular_phase(self.active_system.max_levels as usize)
    }

    pub fn cache(&self) -> Option<&SubdivisionGeometryCache> {
        self.cache.as_ref()
    }

    /// Cached rung by number; out-of-range numbers clamp and are recorded.
    pub fn subdivision_level(&self, level: i64) -> Option<&SubdivisionLevel> {
        self.cache.as_ref().map(|cache| cache.get(level))
    }

    /// The cached rung the current progress sits on.
    pub fn geometry_level(&self) -> Option<&SubdivisionLevel> {
        let cache = self.cache.as_ref()?;
        let (level, _) = resolve_level(self.state.progress(), cache.max_level());
        Some(cache.get(level as i64))
    }

    pub fn panels(&self) -> &PanelSet {
        &self.panels
    }

    pub fn rotation(&self) -> [f32; ROTATION_AXES] {
        self.rotation
    }

    pub fn controller(&self, channel: ControlChannel) -> &MorphProgressController {
        &self.controllers[channel.index()]
    }

    pub fn channel_map_mut(&mut self) -> &mut ChannelMap {
        &mut self.channel_map
    }

    pub fn diagnostics(&self) -> DiagnosticsHandle {
        self.diagnostics.clone()
    }

    pub fn active_system(&self) -> &TetSystem {
        &self.active_system
    }

    pub fn registry(&self) -> &TetRegistry {
        &self.registry
    }

    /// Feeds an already-arbitrated control value into one channel.
    pub fn on_control_value(&mut self, channel: ControlChannel, raw: i32) -> ControlResponse {
        let response = self.controllers[channel.index()].on_control_value(raw);
        if let Some(target) = response.snap_to {
            match channel {
                ControlChannel::Morph => {
                    if self.state.set_progress(target) {
                        self.apply_geometry("snap");
                    }
                }
                _ => self.rotation[rotation_axis(channel)] = target,
            }
        }
        response
    }

    /// Decodes a raw MIDI message and routes it if its CC is bound.
    pub fn on_midi(&mut self, bytes: &[u8]) -> Option<ControlResponse> {
        let message = ControlMessage::from_midi(bytes)?;
        let (channel, raw) = self.channel_map.route(&message)?;
        Some(self.on_control_value(channel, raw))
    }

    /// Advances every running motion loop by `dt` seconds of elapsed time.
    /// Returns whether the morph geometry was rewritten.
    pub fn tick(&mut self, dt: f32) -> bool {
        let mut progress = self.state.progress();
        let morph_running = self.controllers[ControlChannel::Morph.index()].tick(&mut progress, dt);
        let morphed = morph_running && self.state.set_progress(progress);
        if morphed {
            self.apply_geometry("controller");
        }

        for channel in &ControlChannel::VALUES[1..] {
            let axis = rotation_axis(*channel);
            self.controllers[channel.index()].tick(&mut self.rotation[axis], dt);
        }
        morphed
    }

    /// Direct progress write, bypassing the controller.
    pub fn set_progress(&mut self, progress: f32) {
        self.state.set_progress(progress);
        self.apply_geometry("direct");
    }

    /// Halts every loop on this call and returns to the start-up shape.
    pub fn reset(&mut self) {
        for controller in &mut self.controllers {
            controller.stop();
        }
        self.rotation = [0.0; ROTATION_AXES];
        self.panels.set_fractal_mode(false);
        for panel in self.panels.iter_mut() {
            panel.reset_appearance();
        }
        if let Ok(system) = self.registry.get(&self.config.default_system) {
            self.active_system = system.clone();
        }
        self.state.set_progress(0.0);
        self.apply_geometry("reset");
    }

    pub fn set_fractal_mode(&mut self, enabled: bool) {
        self.panels.set_fractal_mode(enabled);
    }

    pub fn set_panel_texture(&mut self, panel: PanelId, texture: Option<TextureHandle>) {
        self.panels.get_mut(panel).set_texture(texture);
    }

    pub fn set_panel_color(&mut self, panel: PanelId, color: [f32; 4]) {
        self.panels.get_mut(panel).color = color;
    }

    pub fn set_panel_visible(&mut self, panel: PanelId, visible: bool) {
        self.panels.get_mut(panel).visible = visible;
    }

    pub fn select_system(&mut self, name: &str) -> MorphResult<()> {
        self.active_system = self.registry.get(name)?.clone();
        debug!(system = name, "TET system selected");
        Ok(())
    }

    pub fn retune(&mut self, base_frequency: f64) {
        self.calculator.set_base_frequency(base_frequency);
    }

    pub fn base_frequency(&self) -> f64 {
        self.calculator.base_frequency()
    }

    /// `progress * max_levels` of the active system.
    pub fn frequency_level(&self) -> f64 {
        self.state.progress() as f64 * self.active_system.max_levels as f64
    }

    pub fn frequency_for(&self, panel: PanelId) -> FrequencyData {
        let level = self.frequency_level();
        let data = self
            .calculator
            .frequency_data(level, &self.active_system, panel.index());
        self.record_frequency(&self.active_system.name, level, panel.index(), &data);
        data
    }

    /// Frequency data through a system chosen by name; an unknown name is
    /// returned to the caller.
    pub fn frequency_data(&self, system: &str, panel_index: usize) -> MorphResult<FrequencyData> {
        let level = self.frequency_level();
        let data = self
            .calculator
            .get_frequency_data(level, &self.registry, system, panel_index)?;
        self.record_frequency(system, level, panel_index.min(PANEL_COUNT - 1), &data);
        Ok(data)
    }

    pub fn panel_frequencies(&self) -> Vec<FrequencyData> {
        PanelId::VALUES
            .iter()
            .map(|panel| self.frequency_for(*panel))
            .collect()
    }

    pub fn sub_panel_frequencies(&self) -> Vec<SubPanelFrequency> {
        let parents = self.panel_frequencies();
        self.panels
            .sub_panels()
            .iter()
            .map(|sub| {
                let parent = &parents[sub.parent.index()];
                let frequency = sub.pitch.reference_frequency() * parent.harmonic_ratio;
                SubPanelFrequency {
                    parent: sub.parent,
                    pitch: sub.pitch,
                    data: FrequencyData {
                        frequency,
                        cents: self.calculator.cents_from_frequency(frequency),
                        harmonic_ratio: frequency / self.calculator.base_frequency(),
                        classification_code: format!(
                            "{}-{}",
                            parent.classification_code,
                            sub.pitch.name()
                        ),
                        ..parent.clone()
                    },
                }
            })
            .collect()
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            progress: self.state.progress(),
            geometry_mode: self.geometry_mode(),
            cellular_phase: self.cellular_phase(),
            per_panel: self
                .panels
                .iter()
                .map(|panel| PanelSnapshot {
                    visible: panel.visible,
                    color: panel.color,
                    has_texture: panel.has_texture(),
                    texture: panel.texture(),
                })
                .collect(),
            navigation: NavigationState {
                rotation: self.rotation,
                active_system: self.active_system.name.clone(),
                fractal_mode: self.panels.fractal_mode(),
            },
        }
    }

    /// Applies a snapshot. Motion loops are stopped first. An unknown
    /// system name, a wrong panel count or a texture flag that contradicts
    /// its handle leaves the engine untouched.
    pub fn restore(&mut self, snapshot: &EngineSnapshot) -> MorphResult<()> {
        let system = self.registry.get(&snapshot.navigation.active_system)?.clone();
        if snapshot.per_panel.len() != PANEL_COUNT {
            return Err(MorphError::Config(format!(
                "snapshot carries {} panels, expected {PANEL_COUNT}",
                snapshot.per_panel.len()
            )));
        }
        if let Some(index) = snapshot
            .per_panel
            .iter()
            .position(|saved| saved.has_texture != saved.texture.is_some())
        {
            return Err(MorphError::Config(format!(
                "panel {} has_texture disagrees with its texture handle",
                PanelId::from_index(index).label()
            )));
        }
        for controller in &mut self.controllers {
            controller.stop();
        }
        self.active_system = system;
        self.rotation = snapshot.navigation.rotation;
        self.panels.set_fractal_mode(snapshot.navigation.fractal_mode);
        for (panel, saved) in self.panels.iter_mut().zip(&snapshot.per_panel) {
            panel.visible = saved.visible;
            panel.color = saved.color;
            panel.set_texture(saved.texture);
        }
        self.state.set_progress(snapshot.progress);
        self.apply_geometry("restore");
        Ok(())
    }

    pub fn export_json(&self) -> MorphResult<String> {
        Ok(serde_json::to_string_pretty(&self.snapshot())?)
    }

    pub fn import_json(&mut self, text: &str) -> MorphResult<()> {
        let snapshot: EngineSnapshot = serde_json::from_str(text)?;
        self.restore(&snapshot)
    }

    fn apply_geometry(&mut self, source: &str) {
        let progress = self.state.progress();
        for panel in self.panels.iter_mut() {
            self.applier
                .apply_morph(panel, progress, self.cache.as_ref());
        }
        diagnostics::record(
            &self.diagnostics,
            DiagnosticEvent::Morph(MorphEvent {
                source: source.to_string(),
                progress,
                level: self.current_level(),
                geometry_mode: self.geometry_mode(),
                detail: self.cellular_phase().label().to_string(),
            }),
        );
    }

    fn record_frequency(&self, mode: &str, level: f64, panel_index: usize, data: &FrequencyData) {
        diagnostics::record(
            &self.diagnostics,
            DiagnosticEvent::Frequency(FrequencyEvent {
                mode: mode.to_string(),
                subdivision_level: level,
                panel_index,
                tet_division: data.tet_division,
                tet_size: data.tet_size,
                cents: data.cents,
                discrete_level: data.discrete_level,
                fractional_level: data.fractional_level,
            }),
        );
    }
}

fn rotation_axis(channel: ControlChannel) -> usize {
    channel.index().saturating_sub(1).min(ROTATION_AXES - 1)
}
