use macroquad::math::Vec3;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::geometry::QuadMesh;

pub const PANEL_COUNT: usize = 6;
pub const SUB_PANELS_PER_PANEL: usize = 2;
pub const SUB_PANEL_COUNT: usize = PANEL_COUNT * SUB_PANELS_PER_PANEL;

/// The six faces of the cube, in index order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PanelId {
    Floor,
    Ceiling,
    North,
    South,
    East,
    West,
}

impl PanelId {
    pub const VALUES: [PanelId; PANEL_COUNT] = [
        PanelId::Floor,
        PanelId::Ceiling,
        PanelId::North,
        PanelId::South,
        PanelId::East,
        PanelId::West,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Out-of-range indices clamp onto the last panel.
    pub fn from_index(index: usize) -> Self {
        if index >= PANEL_COUNT {
            warn!(index, "panel index clamped");
        }
        Self::VALUES[index.min(PANEL_COUNT - 1)]
    }

    pub fn label(&self) -> &'static str {
        match self {
            PanelId::Floor => "FLOOR",
            PanelId::Ceiling => "CEILING",
            PanelId::North => "NORTH",
            PanelId::South => "SOUTH",
            PanelId::East => "EAST",
            PanelId::West => "WEST",
        }
    }

    pub fn base_color(&self) -> [f32; 4] {
        match self {
            PanelId::Floor => [0.55, 0.27, 0.07, 1.0],
            PanelId::Ceiling => [0.53, 0.81, 0.92, 1.0],
            PanelId::North => [0.86, 0.08, 0.24, 1.0],
            PanelId::South => [0.13, 0.55, 0.13, 1.0],
            PanelId::East => [1.0, 0.84, 0.0, 1.0],
            PanelId::West => [0.29, 0.0, 0.51, 1.0],
        }
    }

    /// Outward face normal; `axis_u × axis_v` equals it.
    fn frame(&self) -> (Vec3, Vec3, Vec3) {
        match self {
            PanelId::Floor => (Vec3::NEG_Y, Vec3::X, Vec3::Z),
            PanelId::Ceiling => (Vec3::Y, Vec3::X, Vec3::NEG_Z),
            PanelId::North => (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
            PanelId::South => (Vec3::Z, Vec3::X, Vec3::Y),
            PanelId::East => (Vec3::X, Vec3::NEG_Z, Vec3::Y),
            PanelId::West => (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        }
    }
}

/// Position and orientation of an undeformed panel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PanelTransform {
    pub position: Vec3,
    pub normal: Vec3,
    pub axis_u: Vec3,
    pub axis_v: Vec3,
}

impl PanelTransform {
    fn for_panel(id: PanelId, half_extent: f32) -> Self {
        let (normal, axis_u, axis_v) = id.frame();
        Self {
            position: normal * half_extent,
            normal,
            axis_u,
            axis_v,
        }
    }
}

/// Opaque texture reference; pixel data lives with the renderer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextureHandle(pub u64);

/// The twelve chromatic pitch classes bound to sub-panels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PitchClass {
    C,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    ASharp,
    B,
}

impl PitchClass {
    pub const VALUES: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::DSharp,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
        PitchClass::A,
        PitchClass::ASharp,
        PitchClass::B,
    ];

    pub fn semitone(self) -> usize {
        self as usize
    }

    pub fn name(&self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::CSharp => "C#",
            PitchClass::D => "D",
            PitchClass::DSharp => "D#",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::FSharp => "F#",
            PitchClass::G => "G",
            PitchClass::GSharp => "G#",
            PitchClass::A => "A",
            PitchClass::ASharp => "A#",
            PitchClass::B => "B",
        }
    }

    /// Fourth-octave frequency against A4 = 440 Hz.
    pub fn reference_frequency(self) -> f64 {
        440.0 * 2f64.powf((self.semitone() as f64 - 9.0) / 12.0)
    }

    /// Hue in degrees, one twelfth of the wheel per semitone.
    pub fn hue(self) -> f32 {
        self.semitone() as f32 * 30.0
    }
}

#[derive(Clone, Debug)]
pub struct SubPanel {
    pub parent: PanelId,
    pub pitch: PitchClass,
    pub visible: bool,
}

#[derive(Clone, Debug)]
pub struct Panel {
    id: PanelId,
    pub color: [f32; 4],
    pub visible: bool,
    texture: Option<TextureHandle>,
    transform: PanelTransform,
    half_extent: f32,
    geometry: QuadMesh,
    original: Option<QuadMesh>,
}

impl Panel {
    pub fn new(id: PanelId, half_extent: f32, segments: usize) -> Self {
        let transform = PanelTransform::for_panel(id, half_extent);
        let geometry = QuadMesh::grid(
            transform.position,
            transform.axis_u,
            transform.axis_v,
            half_extent,
            segments,
        );
        Self {
            id,
            color: id.base_color(),
            visible: true,
            texture: None,
            transform,
            half_extent,
            geometry,
            original: None,
        }
    }

    pub fn id(&self) -> PanelId {
        self.id
    }

    pub fn index(&self) -> usize {
        self.id.index()
    }

    pub fn transform(&self) -> &PanelTransform {
        &self.transform
    }

    pub fn half_extent(&self) -> f32 {
        self.half_extent
    }

    pub fn geometry(&self) -> &QuadMesh {
        &self.geometry
    }

    pub fn texture(&self) -> Option<TextureHandle> {
        self.texture
    }

    pub fn has_texture(&self) -> bool {
        self.texture.is_some()
    }

    pub fn set_texture(&mut self, texture: Option<TextureHandle>) {
        self.texture = texture;
    }

    /// Split borrow for morph writers: the pristine copy, captured before
    /// the first write, and the live buffer.
    pub(crate) fn geometry_pair(&mut self) -> (&QuadMesh, &mut QuadMesh) {
        let original = self.original.get_or_insert_with(|| self.geometry.clone());
        (&*original, &mut self.geometry)
    }

    pub fn reset_appearance(&mut self) {
        self.color = self.id.base_color();
        self.visible = true;
    }
}

/// The six panels plus their twelve chromatic children.
#[derive(Clone, Debug)]
pub struct PanelSet {
    panels: Vec<Panel>,
    sub_panels: Vec<SubPanel>,
    fractal_mode: bool,
}

impl PanelSet {
    pub fn new(half_extent: f32, segments: usize) -> Self {
        let panels = PanelId::VALUES
            .iter()
            .map(|id| Panel::new(*id, half_extent, segments))
            .collect();
        let sub_panels = PitchClass::VALUES
            .iter()
            .enumerate()
            .map(|(index, pitch)| SubPanel {
                parent: PanelId::VALUES[index / SUB_PANELS_PER_PANEL],
                pitch: *pitch,
                visible: false,
            })
            .collect();
        Self {
            panels,
            sub_panels,
            fractal_mode: false,
        }
    }

    pub fn get(&self, id: PanelId) -> &Panel {
        &self.panels[id.index()]
    }

    pub fn get_mut(&mut self, id: PanelId) -> &mut Panel {
        &mut self.panels[id.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Panel> {
        self.panels.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Panel> {
        self.panels.iter_mut()
    }

    pub fn sub_panels(&self) -> &[SubPanel] {
        &self.sub_panels
    }

    pub fn sub_panels_of(&self, id: PanelId) -> &[SubPanel] {
        let start = id.index() * SUB_PANELS_PER_PANEL;
        &self.sub_panels[start..start + SUB_PANELS_PER_PANEL]
    }

    pub fn fractal_mode(&self) -> bool {
        self.fractal_mode
    }

    pub fn set_fractal_mode(&mut self, enabled: bool) {
        self.fractal_mode = enabled;
        for sub in &mut self.sub_panels {
            sub.visible = enabled;
        }
    }
}
