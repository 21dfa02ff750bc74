use glam::Vec3;
use planet_backdrop::config::{BackdropConfig, PaletteConfig, ThemeTargets};
use planet_backdrop::core::controller::IdleController;
use planet_backdrop::core::scene_state::SceneState;
use planet_backdrop::core::transition::{ease_in_out_cubic, GroupTarget, ParamGroup, TransitionEngine};
use planet_backdrop::core::{ExternalSignals, FrameDriver, Viewport};

fn light_state() -> SceneState {
    SceneState::initial(Vec3::new(0.0, 0.6, 7.2), 3.0, PaletteConfig::default().light)
}

fn signals(dark: bool) -> ExternalSignals {
    ExternalSignals {
        dark,
        explore: false,
        scroll_offset: 0.0,
        viewport: Viewport::new(1920, 1080),
        document_height: 6000.0,
        page_viewport_height: 1080.0,
        anchor_offset: Some(4200.0),
    }
}

// ============================================================================
// Interpolation
// ============================================================================

#[test]
fn test_value_follows_eased_curve_for_any_duration() {
    for &duration in &[0.25_f32, 1.0, 5.0, 12.5] {
        for step in 0..=10 {
            let elapsed = duration * step as f32 / 10.0;
            let mut state = light_state();
            let mut engine = TransitionEngine::new(&state, duration, duration);
            engine.retarget(&state, GroupTarget::SurfaceFade(0.0), 2.0);
            engine.advance(&mut state, 2.0 + elapsed);

            let expected = 1.0 - ease_in_out_cubic(elapsed / duration);
            assert!(
                (state.surface_opacity - expected).abs() < 1e-5,
                "duration {} elapsed {}: {} vs {}",
                duration,
                elapsed,
                state.surface_opacity,
                expected
            );
        }
    }
}

#[test]
fn test_value_is_exact_after_duration() {
    let mut state = light_state();
    let mut engine = TransitionEngine::new(&state, 5.0, 0.5);
    let dark = PaletteConfig::default().dark;
    engine.retarget(&state, GroupTarget::DayNight(dark.into()), 0.0);

    engine.advance(&mut state, 5.0);
    assert_eq!(state.blend, 1.0);
    assert_eq!(state.cloud_opacity, 0.15);
    assert!(!engine.is_active(ParamGroup::DayNight));

    engine.advance(&mut state, 9.0);
    assert_eq!(state.blend, 1.0);
}

#[test]
fn test_retarget_mid_flight_is_continuous() {
    let palette = PaletteConfig::default();
    let mut state = light_state();
    let mut engine = TransitionEngine::new(&state, 5.0, 0.5);

    engine.retarget(&state, GroupTarget::DayNight(palette.dark.into()), 0.0);
    engine.retarget(&state, GroupTarget::Bloom(palette.dark.into()), 0.0);
    engine.advance(&mut state, 2.0);
    let before = state;

    // Flip back at the same instant: the first sample must not jump
    engine.retarget(&state, GroupTarget::DayNight(palette.light.into()), 2.0);
    engine.retarget(&state, GroupTarget::Bloom(palette.light.into()), 2.0);
    engine.advance(&mut state, 2.0);

    assert!((state.blend - before.blend).abs() < 1e-6);
    assert!((state.cloud_opacity - before.cloud_opacity).abs() < 1e-6);
    assert!((state.bloom.strength - before.bloom.strength).abs() < 1e-6);
    assert!((state.bloom.threshold - before.bloom.threshold).abs() < 1e-6);

    engine.advance(&mut state, 7.0);
    assert_eq!(state.blend, 0.0);
    assert_eq!(state.bloom.strength, 0.35);
}

#[test]
fn test_groups_are_independent() {
    let palette = PaletteConfig::default();
    let mut state = light_state();
    let mut engine = TransitionEngine::new(&state, 5.0, 0.5);

    engine.retarget(&state, GroupTarget::DayNight(palette.dark.into()), 0.0);
    engine.retarget(&state, GroupTarget::SurfaceFade(0.0), 1.0);
    engine.advance(&mut state, 1.5);

    assert_eq!(state.surface_opacity, 0.0);
    assert!(!engine.is_active(ParamGroup::SurfaceFade));
    assert!(engine.is_active(ParamGroup::DayNight));
    assert!(!engine.is_active(ParamGroup::Bloom));
}

// ============================================================================
// Theme scenario through the frame driver
// ============================================================================

fn run_light_to_dark(config: BackdropConfig) -> SceneState {
    let mut driver = FrameDriver::new(config, &signals(false));
    driver.tick(0.0, &IdleController, None).unwrap();

    let changes = driver.observe(&signals(true), 1.0, None);
    assert_eq!(changes.len(), 1);

    let mut now = 1.0;
    while now < 6.5 {
        driver.tick(now, &IdleController, None).unwrap();
        now += 1.0 / 60.0;
    }
    *driver.scene()
}

#[test]
fn test_light_to_dark_reaches_dark_targets() {
    let scene = run_light_to_dark(BackdropConfig::default());
    assert_eq!(scene.blend, 1.0);
    assert_eq!(scene.cloud_opacity, 0.15);
    assert_eq!(scene.bloom.strength, 0.9);
    assert_eq!(scene.bloom.threshold, 0.15);
}

#[test]
fn test_dark_targets_do_not_depend_on_light_values() {
    let mut config = BackdropConfig::default();
    config.palette.light = ThemeTargets {
        blend: 0.3,
        cloud_opacity: 1.0,
        bloom_threshold: 0.5,
        bloom_strength: 0.0,
        bloom_radius: 0.1,
    };
    let scene = run_light_to_dark(config);
    assert_eq!(scene.blend, 1.0);
    assert_eq!(scene.cloud_opacity, 0.15);
    assert_eq!(scene.bloom.strength, 0.9);
    assert_eq!(scene.bloom.threshold, 0.15);
}

#[test]
fn test_repeated_theme_signal_triggers_one_retarget() {
    let mut driver = FrameDriver::new(BackdropConfig::default(), &signals(false));
    assert_eq!(driver.observe(&signals(true), 0.0, None).len(), 1);
    let job = *driver.transitions().day_night_job().unwrap();

    assert!(driver.observe(&signals(true), 1.0, None).is_empty());
    assert_eq!(*driver.transitions().day_night_job().unwrap(), job);
}
