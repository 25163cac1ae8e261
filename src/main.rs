#[cfg(feature = "audio-preview")]
mod preview;

use macroquad::color::hsl_to_rgb;
use macroquad::math::{EulerRot, Quat};
use macroquad::prelude::*;
use panelmorph::{
    ControlChannel, EngineConfig, FrequencyData, MorphEngine, panel::Panel,
    panel::SUB_PANELS_PER_PANEL,
};
use tracing_subscriber::EnvFilter;

const SCREEN_WIDTH: f32 = 1280.0;
const SCREEN_HEIGHT: f32 = 720.0;
const WHEEL_STEP: i32 = 4;
const WHEEL_CENTER: i32 = 64;
const WHEEL_MAX: i32 = 127;
const SUB_PANEL_SIZE: f32 = 0.12;
const LINE_HEIGHT: f32 = 22.0;
const SYSTEM_KEYS: [(KeyCode, &str); 4] = [
    (KeyCode::Key1, "6-PANEL"),
    (KeyCode::Key2, "12-TONE"),
    (KeyCode::Key3, "24-TET"),
    (KeyCode::Key4, "HYPERMICRO"),
];

const AMBER: Color = Color {
    r: 0.98,
    g: 0.66,
    b: 0.12,
    a: 1.0,
};
const BACKGROUND: Color = Color {
    r: 0.02,
    g: 0.02,
    b: 0.02,
    a: 1.0,
};

/// Stand-in for the external input router: one resolved value per channel.
struct WheelState {
    morph: i32,
    spin: i32,
}

impl WheelState {
    fn new() -> Self {
        Self {
            morph: WHEEL_CENTER,
            spin: WHEEL_CENTER,
        }
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    init_tracing();
    let mut engine = match MorphEngine::new(EngineConfig::default()) {
        Ok(engine) => engine,
        Err(err) => {
            tracing::error!(%err, "morph engine failed to start");
            return;
        }
    };
    let mut wheel = WheelState::new();

    #[cfg(feature = "audio-preview")]
    let audio = match preview::AudioPreview::start(panelmorph::panel::PANEL_COUNT) {
        Ok(audio) => Some(audio),
        Err(err) => {
            tracing::warn!(%err, "audio preview unavailable");
            None
        }
    };

    loop {
        let dt = get_frame_time();
        handle_input(&mut engine, &mut wheel);
        engine.tick(dt);
        let frequencies = engine.panel_frequencies();

        #[cfg(feature = "audio-preview")]
        if let Some(audio) = &audio {
            let levels: Vec<f32> = engine
                .panels()
                .iter()
                .map(|panel| if panel.visible { 0.12 } else { 0.0 })
                .collect();
            audio.set_levels(&levels);
            audio.set_frequencies(&frequencies);
            audio.set_gate(engine.progress() > 0.0);
        }

        draw_scene(&engine, &wheel, &frequencies);
        next_frame().await;
    }
}

fn window_conf() -> Conf {
    Conf {
        window_title: "Panel Morph".into(),
        fullscreen: false,
        sample_count: 4,
        window_width: SCREEN_WIDTH as i32,
        window_height: SCREEN_HEIGHT as i32,
        high_dpi: false,
        ..Default::default()
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("panelmorph=info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn handle_input(engine: &mut MorphEngine, wheel: &mut WheelState) {
    let previous = wheel.morph;
    if is_key_pressed(KeyCode::Up) {
        wheel.morph = (wheel.morph + WHEEL_STEP).min(WHEEL_MAX);
    }
    if is_key_pressed(KeyCode::Down) {
        wheel.morph = (wheel.morph - WHEEL_STEP).max(0);
    }
    if is_key_pressed(KeyCode::Right) {
        wheel.morph = WHEEL_MAX;
    }
    if is_key_pressed(KeyCode::Left) {
        wheel.morph = 0;
    }
    if is_key_pressed(KeyCode::Space) {
        wheel.morph = WHEEL_CENTER;
    }
    if wheel.morph != previous {
        engine.on_control_value(ControlChannel::Morph, wheel.morph);
    }

    let spin = if is_key_down(KeyCode::W) {
        WHEEL_MAX
    } else if is_key_down(KeyCode::S) {
        0
    } else {
        WHEEL_CENTER
    };
    if spin != wheel.spin {
        wheel.spin = spin;
        engine.on_control_value(ControlChannel::RotateY, spin);
    }

    if is_key_pressed(KeyCode::F) {
        let enabled = !engine.panels().fractal_mode();
        engine.set_fractal_mode(enabled);
    }
    if is_key_pressed(KeyCode::R) {
        engine.reset();
        *wheel = WheelState::new();
    }
    for (key, system) in SYSTEM_KEYS {
        if is_key_pressed(key) {
            if let Err(err) = engine.select_system(system) {
                tracing::error!(%err, "system selection failed");
            }
        }
    }
}

fn draw_scene(engine: &MorphEngine, wheel: &WheelState, frequencies: &[FrequencyData]) {
    clear_background(BACKGROUND);

    set_camera(&Camera3D {
        position: vec3(3.2, 2.4, 4.2),
        up: vec3(0.0, 1.0, 0.0),
        target: vec3(0.0, 0.0, 0.0),
        ..Default::default()
    });
    let [rx, ry, rz] = engine.rotation();
    let orientation = Quat::from_euler(EulerRot::XYZ, rx, ry, rz);
    for panel in engine.panels().iter().filter(|panel| panel.visible) {
        draw_panel_wireframe(panel, orientation);
    }
    if engine.panels().fractal_mode() {
        draw_sub_panels(engine, orientation);
    }

    set_default_camera();
    draw_status(engine, wheel);
    draw_frequencies(engine, frequencies);
}

fn draw_panel_wireframe(panel: &Panel, orientation: Quat) {
    let [r, g, b, a] = panel.color;
    let color = Color::new(r, g, b, a);
    let mesh = panel.geometry();
    for quad in &mesh.quads {
        for edge in 0..4 {
            let start = mesh.positions[quad[edge] as usize];
            let end = mesh.positions[quad[(edge + 1) % 4] as usize];
            draw_line_3d(orientation * start, orientation * end, color);
        }
    }
}

fn draw_sub_panels(engine: &MorphEngine, orientation: Quat) {
    for sub in engine.panels().sub_panels().iter().filter(|sub| sub.visible) {
        let panel = engine.panels().get(sub.parent);
        let transform = panel.transform();
        let side = if sub.pitch.semitone() % SUB_PANELS_PER_PANEL == 0 {
            -0.5
        } else {
            0.5
        };
        let anchor = transform.position * 1.15 + transform.axis_u * side * panel.half_extent();
        let color = hsl_to_rgb(sub.pitch.hue() / 360.0, 0.8, 0.55);
        draw_cube(
            orientation * anchor,
            Vec3::splat(SUB_PANEL_SIZE),
            None,
            color,
        );
    }
}

fn draw_status(engine: &MorphEngine, wheel: &WheelState) {
    let controller = engine.controller(ControlChannel::Morph);
    draw_text_block(
        24.0,
        36.0,
        &format!(
            "MODE {}\nPROGRESS {:.3}\nFACES {}\nLEVEL {} + {:.2}\nPHASE {}\nSYSTEM {}\nWHEEL {} SPEED {:+.3}\nFRACTAL {}",
            engine.geometry_mode().label(),
            engine.progress(),
            engine
                .geometry_level()
                .map_or_else(|| "-".to_string(), |level| level.face_count.to_string()),
            engine.current_level(),
            engine.level_fraction(),
            engine.cellular_phase().label(),
            engine.active_system().name,
            wheel.morph,
            controller.speed(),
            if engine.panels().fractal_mode() {
                "ON"
            } else {
                "OFF"
            },
        ),
    );
    draw_text_block(
        24.0,
        SCREEN_HEIGHT - 40.0,
        "UP/DOWN WHEEL  LEFT/RIGHT EXTREMES  SPACE CENTRE  W/S SPIN  F FRACTAL  R RESET  1-4 SYSTEM",
    );
}

fn draw_frequencies(engine: &MorphEngine, frequencies: &[FrequencyData]) {
    let scheme = engine.active_system().color_scheme;
    let x = SCREEN_WIDTH - 520.0;
    let mut y = 36.0;
    for (data, panel) in frequencies.iter().zip(panelmorph::PanelId::VALUES) {
        let hue = scheme.hue_for(data.tet_division, data.tet_size);
        let color = hsl_to_rgb(hue / 360.0, scheme.saturation, 0.6);
        let line = format!(
            "{:<8}{:>9.2} Hz {:>8.1} c  {}/{}  {}",
            panel.label(),
            data.frequency,
            data.cents,
            data.tet_division,
            data.tet_size,
            data.classification_code
        );
        draw_line_text(&line, x, y, color);
        y += LINE_HEIGHT;
    }
}

fn draw_text_block(x: f32, mut y: f32, text: &str) {
    for line in text.lines() {
        draw_line_text(line, x, y, AMBER);
        y += LINE_HEIGHT;
    }
}

fn draw_line_text(line: &str, x: f32, y: f32, color: Color) {
    draw_text_ex(
        line,
        x,
        y,
        TextParams {
            font_size: 18,
            color,
            ..Default::default()
        },
    );
}
