//! Whole-engine flows: morphing, diagnostics, snapshots.

use panelmorph::diagnostics::{self, MorphEvent};
use panelmorph::frequency::ColorScheme;
use panelmorph::panel::TextureHandle;
use panelmorph::{
    DiagnosticEvent, EngineConfig, GeometryMode, MorphDiagnostics, MorphEngine, MorphError,
    PanelId, TetRegistry, TetSystem,
};

fn small_engine() -> MorphEngine {
    MorphEngine::new(EngineConfig {
        max_subdivision_level: 3,
        panel_segments: 3,
        ..EngineConfig::default()
    })
    .unwrap()
}

fn morph_event(progress: f32) -> DiagnosticEvent {
    DiagnosticEvent::Morph(MorphEvent {
        source: "test".into(),
        progress,
        level: 0,
        geometry_mode: GeometryMode::from_progress(progress),
        detail: String::new(),
    })
}

#[test]
fn zero_progress_restores_every_panel_exactly() {
    let mut engine = small_engine();
    let pristine: Vec<_> = engine.panels().iter().map(|p| p.geometry().clone()).collect();

    for progress in [0.1, 0.45, 1.0, 0.62, 0.99] {
        engine.set_progress(progress);
    }
    assert_ne!(engine.panels().get(PanelId::Floor).geometry(), &pristine[0]);

    engine.set_progress(0.0);
    for (panel, original) in engine.panels().iter().zip(&pristine) {
        let restored: Vec<[u32; 3]> = panel
            .geometry()
            .positions
            .iter()
            .map(|p| [p.x.to_bits(), p.y.to_bits(), p.z.to_bits()])
            .collect();
        let expected: Vec<[u32; 3]> = original
            .positions
            .iter()
            .map(|p| [p.x.to_bits(), p.y.to_bits(), p.z.to_bits()])
            .collect();
        assert_eq!(restored, expected, "{}", panel.id().label());
    }
}

#[test]
fn morph_without_cache_uses_flat_fallback() {
    let mut engine = MorphEngine::new(EngineConfig {
        precompute_cache: false,
        panel_segments: 2,
        ..EngineConfig::default()
    })
    .unwrap();
    assert!(engine.cache().is_none());

    engine.set_progress(1.0);
    assert_eq!(engine.geometry_mode(), GeometryMode::Sphere);
    let floor = engine.panels().get(PanelId::Floor);
    assert!(floor.geometry().positions.iter().all(|p| (p.y + 1.0).abs() < 1e-6));
}

#[test]
fn derived_state_follows_the_active_system() {
    let mut engine = small_engine();
    engine.set_progress(0.5);
    // 12-TONE has four levels
    assert_eq!(engine.current_level(), 2);
    assert_eq!(engine.geometry_mode(), GeometryMode::Morphing);

    engine.select_system("HYPERMICRO").unwrap();
    assert_eq!(engine.current_level(), 1);
    assert!((engine.frequency_level() - 1.0).abs() < 1e-9);
}

#[test]
fn diagnostics_keep_the_most_recent_hundred() {
    let mut sink = MorphDiagnostics::new(100);
    for i in 0..150 {
        sink.record(morph_event(i as f32 / 150.0));
    }
    let events = sink.morph_events();
    assert_eq!(events.len(), 100);
    assert_eq!(events[0].progress, 50.0 / 150.0);
    assert_eq!(events[99].progress, 149.0 / 150.0);
}

#[test]
fn shared_handle_merges_categories_in_order() {
    let mut engine = small_engine();
    let handle = engine.diagnostics();
    handle.lock().unwrap().clear();

    engine.set_progress(0.25);
    let _ = engine.frequency_for(PanelId::North);
    engine.set_progress(0.5);

    let events = diagnostics::snapshot(&handle);
    let last_frequency = events
        .iter()
        .rposition(|e| matches!(e, DiagnosticEvent::Frequency(_)))
        .unwrap();
    let last_morph = events
        .iter()
        .rposition(|e| matches!(e, DiagnosticEvent::Morph(_)))
        .unwrap();
    assert!(last_morph > last_frequency);
    match &events[last_frequency] {
        DiagnosticEvent::Frequency(event) => {
            assert_eq!(event.panel_index, PanelId::North.index());
            assert_eq!(event.mode, "12-TONE");
        }
        other => panic!("unexpected event {other:?}"),
    }

    let frequency_events = handle.lock().unwrap().frequency_events();
    assert_eq!(frequency_events.len(), 1);
    // progress 0.25 of four levels is level 1
    assert_eq!(frequency_events[0].tet_size, 24);
}

#[test]
fn clamped_cache_lookup_is_recorded() {
    let engine = small_engine();
    let handle = engine.diagnostics();
    handle.lock().unwrap().clear();

    assert_eq!(engine.geometry_level().map(|l| l.level), Some(0));
    assert!(diagnostics::snapshot(&handle).is_empty());

    let level = engine.subdivision_level(42).unwrap();
    assert_eq!(level.level, 3);
    assert_eq!(level.face_count, 6 * 64);
    let events = handle.lock().unwrap().morph_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].source, "cache");
    assert_eq!(events[0].level, 3);
}

#[test]
fn registered_deep_system_stays_finite() {
    let mut registry = TetRegistry::standard();
    registry.register(TetSystem::new(
        "DEEP",
        "DEP",
        12,
        64,
        ColorScheme {
            hue_start: 0.0,
            hue_span: 360.0,
            saturation: 1.0,
        },
    ));
    let mut engine = MorphEngine::with_registry(
        EngineConfig {
            max_subdivision_level: 1,
            panel_segments: 1,
            ..EngineConfig::default()
        },
        registry,
    )
    .unwrap();
    engine.select_system("DEEP").unwrap();
    engine.set_progress(1.0);

    let frequencies = engine.panel_frequencies();
    let top = &frequencies[PanelId::West.index()];
    assert_eq!(top.tet_division, top.tet_size - 1);
    assert!(frequencies.iter().all(|data| data.frequency.is_finite()));
    assert!(engine.frequency_data("DEEP", 0).is_ok());
}

#[test]
fn unknown_system_surfaces_to_the_caller() {
    let engine = small_engine();
    let err = engine.frequency_data("13-TONE", 0).unwrap_err();
    assert!(matches!(err, MorphError::UnknownSystem(ref name) if name == "13-TONE"));
    assert_eq!(err.to_string(), "unknown TET system '13-TONE'");
    assert!(engine.frequency_data("24-TET", 0).is_ok());
}

#[test]
fn snapshot_survives_json() {
    let mut engine = small_engine();
    engine.set_progress(0.4);
    engine.set_fractal_mode(true);
    engine.select_system("24-TET").unwrap();
    engine.set_panel_visible(PanelId::East, false);
    engine.set_panel_color(PanelId::West, [0.1, 0.2, 0.3, 1.0]);
    engine.set_panel_texture(PanelId::Ceiling, Some(TextureHandle(7)));
    let json = engine.export_json().unwrap();

    let mut restored = small_engine();
    restored.import_json(&json).unwrap();
    assert_eq!(restored.snapshot(), engine.snapshot());
    assert_eq!(restored.active_system().name, "24-TET");
    assert!(restored.panels().fractal_mode());
    assert!(restored.panels().get(PanelId::Ceiling).has_texture());
    assert_eq!(
        restored.panels().get(PanelId::West).geometry(),
        engine.panels().get(PanelId::West).geometry()
    );
}

#[test]
fn bad_snapshots_leave_the_engine_alone() {
    let mut engine = small_engine();
    engine.set_progress(0.3);
    let before = engine.snapshot();

    assert!(matches!(
        engine.import_json("{ not json"),
        Err(MorphError::Serialization(_))
    ));

    let mut foreign = before.clone();
    foreign.navigation.active_system = "GAMELAN".into();
    assert!(matches!(
        engine.restore(&foreign),
        Err(MorphError::UnknownSystem(_))
    ));

    let mut short = before.clone();
    short.per_panel.pop();
    assert!(matches!(engine.restore(&short), Err(MorphError::Config(_))));

    assert_eq!(engine.snapshot(), before);
}

#[test]
fn texture_flag_must_match_its_handle() {
    let mut engine = small_engine();
    let before = engine.snapshot();

    let mut missing = before.clone();
    missing.per_panel[PanelId::Ceiling.index()].has_texture = true;
    assert!(matches!(engine.restore(&missing), Err(MorphError::Config(_))));

    let mut stray = before.clone();
    stray.per_panel[PanelId::Floor.index()].texture = Some(TextureHandle(3));
    assert!(matches!(engine.restore(&stray), Err(MorphError::Config(_))));

    assert_eq!(engine.snapshot(), before);
}

#[test]
fn config_from_json_drives_the_engine() {
    let config = EngineConfig::from_json(
        r#"{ "base_frequency": 432.0, "default_system": "6-PANEL", "max_subdivision_level": 2 }"#,
    )
    .unwrap();
    let mut engine = MorphEngine::new(config).unwrap();
    assert_eq!(engine.base_frequency(), 432.0);
    assert_eq!(engine.active_system().name, "6-PANEL");
    assert_eq!(engine.cache().map(|c| c.max_level()), Some(2));

    let root = engine.frequency_for(PanelId::Floor);
    assert!((root.frequency - 432.0).abs() < 1e-9);
    engine.retune(0.0);
    assert_eq!(engine.base_frequency(), 432.0);
}

#[test]
fn reset_restores_start_up_appearance() {
    let mut engine = small_engine();
    engine.set_fractal_mode(true);
    engine.set_panel_visible(PanelId::South, false);
    engine.select_system("HYPERMICRO").unwrap();
    engine.set_progress(0.8);

    engine.reset();
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.progress, 0.0);
    assert_eq!(snapshot.geometry_mode, GeometryMode::Cube);
    assert!(!snapshot.navigation.fractal_mode);
    assert_eq!(snapshot.navigation.active_system, "12-TONE");
    assert!(snapshot.per_panel.iter().all(|p| p.visible));
}
