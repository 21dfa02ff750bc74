//! Per-tick orchestration of the backdrop.
//!
//! [`FrameDriver`] owns the one [`SceneState`] of a session together with the
//! transition engine, camera controller and input adapter that are allowed to
//! write it. Listener callbacks only feed [`ExternalSignals`] in through
//! [`FrameDriver::observe`], which sets targets; interpolated values are only
//! written inside [`FrameDriver::tick`].

use glam::{Mat4, Quat, Vec3};

use super::camera::{CameraController, CameraState};
use super::controller::Controller;
use super::geometry::{facing_rotation, sun_direction};
use super::scene_state::{Bloom, Mode, SceneState, Theme};
use super::signals::{fade_target, ExternalSignals, InputAdapter, SignalChange, Viewport};
use super::timer::FpsCounter;
use super::transition::{GroupTarget, TransitionEngine};
use crate::config::BackdropConfig;
use crate::render::RenderError;

/// Everything the GPU side needs for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameParams {
    pub view: Mat4,
    pub projection: Mat4,
    pub camera_position: Vec3,
    /// Idle spin of the planet about its axis, radians
    pub planet_rotation: f32,
    pub cloud_rotation: f32,
    pub atmosphere_rotation: Quat,
    /// Unit vector toward the sun
    pub sun_direction: Vec3,
    pub sun_intensity: f32,
    pub ambient_intensity: f32,
    pub blend: f32,
    pub cloud_opacity: f32,
    pub bloom: Bloom,
    pub surface_opacity: f32,
    pub textures_ready: bool,
}

/// Consumer of composited frames
pub trait FrameSink {
    /// Render and present one frame
    fn submit(&mut self, frame: &FrameParams) -> Result<(), RenderError>;

    /// Resize every render target to the new drawable size
    fn resize(&mut self, viewport: Viewport);
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Spin {
    planet: f32,
    clouds: f32,
}

pub struct FrameDriver {
    config: BackdropConfig,
    scene: SceneState,
    transitions: TransitionEngine,
    camera: CameraController,
    input: InputAdapter,
    spin: Spin,
    atmosphere_rotation: Quat,
    textures_ready: bool,
    last_tick: Option<f32>,
    fps: FpsCounter,
}

impl FrameDriver {
    /// Driver for a freshly mounted backdrop. The initial signals are applied
    /// directly, without transitions.
    pub fn new(config: BackdropConfig, initial: &ExternalSignals) -> Self {
        let progress = initial.progress();
        let camera = CameraController::new(
            &config.camera,
            &config.motion,
            initial.mode(),
            progress,
            initial.viewport,
        );
        let theme = initial.theme().targets(&config.palette);
        let mut scene = SceneState::initial(
            camera.initial_position(),
            camera.sun_target(progress),
            theme,
        );
        scene.surface_opacity = fade_target(progress);
        let transitions = TransitionEngine::new(
            &scene,
            config.motion.theme_duration,
            config.motion.fade_duration,
        );
        let atmosphere_rotation = facing_rotation(scene.camera_position);

        log::info!(
            "backdrop mounted: theme {:?}, mode {:?}, progress {:.2}",
            initial.theme(),
            initial.mode(),
            progress
        );

        Self {
            config,
            scene,
            transitions,
            camera,
            input: InputAdapter::new(initial),
            spin: Spin::default(),
            atmosphere_rotation,
            textures_ready: false,
            last_tick: None,
            fps: FpsCounter::new(1.0),
        }
    }

    pub fn scene(&self) -> &SceneState {
        &self.scene
    }

    pub fn camera(&self) -> &CameraController {
        &self.camera
    }

    pub fn transitions(&self) -> &TransitionEngine {
        &self.transitions
    }

    pub fn theme(&self) -> Theme {
        self.input.theme()
    }

    pub fn mode(&self) -> Mode {
        self.input.mode()
    }

    pub fn viewport(&self) -> Viewport {
        self.input.viewport()
    }

    pub fn fps(&self) -> f32 {
        self.fps.fps()
    }

    pub fn textures_ready(&self) -> bool {
        self.textures_ready
    }

    /// Enables the texture-dependent sub-steps
    pub fn mark_textures_ready(&mut self) {
        self.textures_ready = true;
    }

    /// The surface stops taking input once it is fading or faded out
    pub fn is_input_transparent(&self) -> bool {
        self.transitions.fade_target() <= 0.0
    }

    /// Compare `signals` against the last observation and retarget whatever changed
    pub fn observe(
        &mut self,
        signals: &ExternalSignals,
        now: f32,
        mut sink: Option<&mut dyn FrameSink>,
    ) -> Vec<SignalChange> {
        let changes = self.input.observe(signals);
        for change in &changes {
            let sink = match sink.as_mut() {
                Some(sink) => Some(&mut **sink as &mut dyn FrameSink),
                None => None,
            };
            self.apply(*change, now, sink);
        }
        changes
    }

    fn apply(&mut self, change: SignalChange, now: f32, sink: Option<&mut dyn FrameSink>) {
        match change {
            SignalChange::Theme(theme) => {
                log::info!("theme -> {:?}", theme);
                let targets = theme.targets(&self.config.palette);
                self.transitions
                    .retarget(&self.scene, GroupTarget::DayNight(targets.into()), now);
                self.transitions
                    .retarget(&self.scene, GroupTarget::Bloom(targets.into()), now);
            }
            SignalChange::Mode(mode) => {
                log::info!("mode -> {:?}", mode);
                self.camera.set_mode(mode);
            }
            SignalChange::ScrollProgress(progress) => {
                self.camera.set_scroll_progress(progress);
                self.transitions.retarget(
                    &self.scene,
                    GroupTarget::SurfaceFade(fade_target(progress)),
                    now,
                );
            }
            SignalChange::Viewport(viewport) => {
                log::info!("resize {}x{}", viewport.width, viewport.height);
                self.camera.set_viewport(viewport);
                if let Some(sink) = sink {
                    sink.resize(viewport);
                }
            }
        }
    }

    /// Advance one frame and submit it to `sink`, if there is one
    pub fn tick(
        &mut self,
        now: f32,
        input: &dyn Controller,
        sink: Option<&mut dyn FrameSink>,
    ) -> Result<(), RenderError> {
        let delta = self.last_tick.map_or(0.0, |last| (now - last).max(0.0));
        self.last_tick = Some(now);
        if let Some(fps) = self.fps.tick(delta) {
            log::debug!("fps {:.1}", fps);
        }

        // 1. idle spin
        if self.textures_ready {
            self.spin.planet += self.config.motion.planet_spin;
            self.spin.clouds += self.config.motion.cloud_spin;
        }

        // 2. timed transitions
        self.transitions.advance(&mut self.scene, now);

        // 3-4. camera and sun
        self.camera.update(&mut self.scene);
        self.camera.update_sun(&mut self.scene);

        // 5. atmosphere faces the camera
        self.atmosphere_rotation = facing_rotation(self.scene.camera_position);

        // 6. orbit damping
        if self.camera.state() == CameraState::OrbitInteractive {
            self.camera.apply_orbit(&mut self.scene, input);
        }

        // 7. submit
        match sink {
            Some(sink) => sink.submit(&self.frame_params()),
            None => Ok(()),
        }
    }

    pub fn frame_params(&self) -> FrameParams {
        let position = self.scene.camera_position;
        let camera = &self.config.camera;
        FrameParams {
            view: self.camera.view(position),
            projection: self.camera.projection(),
            camera_position: position,
            planet_rotation: self.spin.planet,
            cloud_rotation: self.spin.clouds,
            atmosphere_rotation: self.atmosphere_rotation,
            sun_direction: sun_direction(camera.sun_x, self.scene.sun_offset, camera.sun_z),
            sun_intensity: self.config.scene.sun_intensity,
            ambient_intensity: self.config.scene.ambient_intensity,
            blend: self.scene.blend,
            cloud_opacity: self.scene.cloud_opacity,
            bloom: self.scene.bloom,
            surface_opacity: self.scene.surface_opacity,
            textures_ready: self.textures_ready,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::controller::IdleController;
    use std::cell::RefCell;

    #[derive(Default)]
    struct CountingSink {
        frames: RefCell<Vec<FrameParams>>,
        resizes: RefCell<Vec<Viewport>>,
    }

    impl FrameSink for CountingSink {
        fn submit(&mut self, frame: &FrameParams) -> Result<(), RenderError> {
            self.frames.borrow_mut().push(*frame);
            Ok(())
        }

        fn resize(&mut self, viewport: Viewport) {
            self.resizes.borrow_mut().push(viewport);
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

    #[test]
    fn test_tick_without_sink_is_noop_submit() {
        let mut driver = FrameDriver::new(BackdropConfig::default(), &signals());
        assert!(driver.tick(0.0, &IdleController, None).is_ok());
    }

    #[test]
    fn test_spin_waits_for_textures() {
        let mut driver = FrameDriver::new(BackdropConfig::default(), &signals());
        let mut sink = CountingSink::default();

        driver.tick(0.0, &IdleController, Some(&mut sink)).unwrap();
        assert_eq!(sink.frames.borrow()[0].planet_rotation, 0.0);

        driver.mark_textures_ready();
        driver.tick(0.016, &IdleController, Some(&mut sink)).unwrap();
        let frame = sink.frames.borrow()[1];
        assert!((frame.planet_rotation - 0.0009).abs() < 1e-7);
        assert!((frame.cloud_rotation - 0.00105).abs() < 1e-7);
    }

    #[test]
    fn test_initial_dark_theme_is_applied_directly() {
        let mut initial = signals();
        initial.dark = true;
        let driver = FrameDriver::new(BackdropConfig::default(), &initial);
        assert_eq!(driver.scene().blend, 1.0);
        assert!(!driver.transitions().any_active());
    }

    #[test]
    fn test_scroll_past_anchor_fades_surface() {
        let mut driver = FrameDriver::new(BackdropConfig::default(), &signals());
        let mut scrolled = signals();
        scrolled.scroll_offset = 4200.0;

        driver.observe(&scrolled, 0.0, None);
        assert!(driver.is_input_transparent());
        driver.tick(0.0, &IdleController, None).unwrap();
        driver.tick(0.6, &IdleController, None).unwrap();
        assert_eq!(driver.scene().surface_opacity, 0.0);

        driver.observe(&signals(), 1.0, None);
        assert!(!driver.is_input_transparent());
        driver.tick(1.6, &IdleController, None).unwrap();
        assert_eq!(driver.scene().surface_opacity, 1.0);
    }

    #[test]
    fn test_resize_reaches_sink() {
        let mut driver = FrameDriver::new(BackdropConfig::default(), &signals());
        let mut sink = CountingSink::default();
        let mut resized = signals();
        resized.viewport = Viewport::new(800, 600);

        driver.observe(&resized, 0.0, Some(&mut sink));
        assert_eq!(*sink.resizes.borrow(), vec![Viewport::new(800, 600)]);
        assert!((driver.camera().aspect() - 800.0 / 600.0).abs() < 1e-6);
    }
}
