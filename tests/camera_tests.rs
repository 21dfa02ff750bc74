use std::cell::RefCell;

use glam::Vec3;
use planet_backdrop::config::BackdropConfig;
use planet_backdrop::core::controller::IdleController;
use planet_backdrop::core::signals::scroll_progress;
use planet_backdrop::core::{
    CameraState, ExternalSignals, FrameDriver, FrameParams, FrameSink, Viewport,
};
use planet_backdrop::render::bloom::mip_chain_extents;
use planet_backdrop::render::renderer::target_extents;
use planet_backdrop::render::RenderError;

/// Mock sink recording what reaches the GPU side
#[derive(Default)]
struct RecordingSink {
    frames: RefCell<usize>,
    viewport: RefCell<Option<Viewport>>,
}

impl FrameSink for RecordingSink {
    fn submit(&mut self, _frame: &FrameParams) -> Result<(), RenderError> {
        *self.frames.borrow_mut() += 1;
        Ok(())
    }

    fn resize(&mut self, viewport: Viewport) {
        *self.viewport.borrow_mut() = Some(viewport);
    }
}

fn signals() -> ExternalSignals {
    ExternalSignals {
        dark: false,
        explore: false,
        scroll_offset: 0.0,
        viewport: Viewport::new(1920, 1080),
        document_height: 6000.0,
        page_viewport_height: 1080.0,
        anchor_offset: Some(4200.0),
    }
}

// ============================================================================
// Scroll progress
// ============================================================================

#[test]
fn test_scroll_progress_is_clamped() {
    assert_eq!(scroll_progress(0.0, Some(4200.0), 6000.0, 1080.0), 0.0);
    assert_eq!(scroll_progress(4200.0, Some(4200.0), 6000.0, 1080.0), 1.0);
    assert_eq!(scroll_progress(5900.0, Some(4200.0), 6000.0, 1080.0), 1.0);
    for offset in [0.0_f32, 700.0, 2500.0, 4199.0, 8000.0] {
        let p = scroll_progress(offset, Some(4200.0), 6000.0, 1080.0);
        assert!((0.0..=1.0).contains(&p));
    }
}

#[test]
fn test_scroll_moves_camera_toward_planet() {
    let mut driver = FrameDriver::new(BackdropConfig::default(), &signals());
    let start = driver.scene().camera_position;
    assert_eq!(start, Vec3::new(0.0, 0.6, 7.2));

    let mut scrolled = signals();
    scrolled.scroll_offset = 4200.0;
    driver.observe(&scrolled, 0.0, None);
    for i in 0..600 {
        driver.tick(i as f32 / 60.0, &IdleController, None).unwrap();
    }
    let end = driver.scene().camera_position;
    assert!((end.z - 3.6).abs() < 1e-3);
    assert!((end.y - 0.2).abs() < 1e-3);
    assert!((driver.scene().sun_offset - 5.2).abs() < 1e-3);
}

// ============================================================================
// Mode switching
// ============================================================================

#[test]
fn test_explore_round_trip_converges_without_overshoot() {
    let mut driver = FrameDriver::new(BackdropConfig::default(), &signals());
    let home = driver.scene().camera_position;

    let mut explore = signals();
    explore.explore = true;
    driver.observe(&explore, 0.0, None);
    let mut now = 0.0;
    for _ in 0..20 {
        driver.tick(now, &IdleController, None).unwrap();
        now += 1.0 / 60.0;
    }
    assert!(matches!(
        driver.camera().state(),
        CameraState::ModeTransitioning { .. }
    ));

    // Back to text before the explore position is reached
    driver.observe(&signals(), now, None);
    let mut frames = 0;
    while driver.camera().state() != CameraState::ScrollDriven {
        driver.tick(now, &IdleController, None).unwrap();
        now += 1.0 / 60.0;
        frames += 1;
        assert!(frames < 2000, "camera never settled");

        let position = driver.scene().camera_position;
        assert!(position.z >= home.z - 0.01, "overshot in z: {}", position.z);
        assert!(position.y <= home.y + 0.01, "overshot in y: {}", position.y);
    }

    assert_eq!(driver.scene().camera_position, home);
    assert_eq!(driver.camera().up(), Vec3::Y);
    assert!(!driver.camera().orbit().is_enabled());
}

#[test]
fn test_explore_enables_orbit_on_arrival() {
    let mut driver = FrameDriver::new(BackdropConfig::default(), &signals());
    let mut explore = signals();
    explore.explore = true;
    driver.observe(&explore, 0.0, None);

    let mut frames = 0;
    while driver.camera().state() != CameraState::OrbitInteractive {
        driver.tick(frames as f32 / 60.0, &IdleController, None).unwrap();
        frames += 1;
        assert!(frames < 2000);
    }
    assert_eq!(driver.scene().camera_position, Vec3::new(0.0, 0.0, 9.0));
    assert!(driver.camera().orbit().is_enabled());
}

#[test]
fn test_scroll_ignored_while_exploring() {
    let mut initial = signals();
    initial.explore = true;
    let mut driver = FrameDriver::new(BackdropConfig::default(), &initial);
    assert_eq!(driver.camera().state(), CameraState::OrbitInteractive);

    let mut scrolled = initial;
    scrolled.scroll_offset = 2100.0;
    assert!(driver.observe(&scrolled, 0.0, None).is_empty());
    assert_eq!(driver.camera().progress(), 0.0);
}

// ============================================================================
// Resize
// ============================================================================

#[test]
fn test_resize_updates_aspect_and_targets() {
    let mut driver = FrameDriver::new(BackdropConfig::default(), &signals());
    let mut sink = RecordingSink::default();
    assert!((driver.camera().aspect() - 1920.0 / 1080.0).abs() < 1e-6);

    let mut resized = signals();
    resized.viewport = Viewport::new(800, 600);
    driver.observe(&resized, 0.0, Some(&mut sink));
    driver.tick(0.0, &IdleController, Some(&mut sink)).unwrap();

    assert!((driver.camera().aspect() - 800.0 / 600.0).abs() < 1e-6);
    assert_eq!(*sink.viewport.borrow(), Some(Viewport::new(800, 600)));
    assert_eq!(*sink.frames.borrow(), 1);
    assert_eq!(mip_chain_extents(800, 600)[0], (400, 300));

    let extents = target_extents(Viewport::new(800, 600)).unwrap();
    assert_eq!(extents.surface, (800, 600));
    assert_eq!(extents.post, (800, 600));
    assert_eq!(extents.bloom[0], (400, 300));
    assert_eq!(extents.bloom, mip_chain_extents(800, 600));

    let projection = driver.frame_params().projection;
    assert!((projection.y_axis.y / projection.x_axis.x - 800.0 / 600.0).abs() < 1e-4);
}

#[test]
fn test_empty_viewport_keeps_aspect() {
    let mut driver = FrameDriver::new(BackdropConfig::default(), &signals());
    let mut minimized = signals();
    minimized.viewport = Viewport::new(0, 0);
    driver.observe(&minimized, 0.0, None);
    assert!((driver.camera().aspect() - 1920.0 / 1080.0).abs() < 1e-6);
}
