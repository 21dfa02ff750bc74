use glam::{Mat4, Vec3};

use super::controller::Controller;
use super::orbit::OrbitControls;
use super::scene_state::{Mode, SceneState};
use super::signals::Viewport;
use crate::config::{CameraConfig, MotionConfig};

/// What is moving the camera this frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraState {
    /// Distance, height and sun follow the page scroll
    ScrollDriven,
    /// Smoothing toward the resting position of `toward`
    ModeTransitioning { toward: Mode },
    /// The user rotates and zooms
    OrbitInteractive,
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Camera state machine plus projection parameters
#[derive(Debug, Clone)]
pub struct CameraController {
    state: CameraState,
    progress: f32,
    up: Vec3,
    aspect: f32,
    fov_y: f32,
    near: f32,
    far: f32,
    distance_range: [f32; 2],
    height_range: [f32; 2],
    sun_height_range: [f32; 2],
    explore_position: Vec3,
    scroll_smoothing: f32,
    mode_smoothing: f32,
    sun_smoothing: f32,
    epsilon: f32,
    orbit: OrbitControls,
}

impl CameraController {
    /// Controller resting in `mode`; there is no transition on first mount
    pub fn new(
        camera: &CameraConfig,
        motion: &MotionConfig,
        mode: Mode,
        progress: f32,
        viewport: Viewport,
    ) -> Self {
        let mut controller = Self {
            state: CameraState::ScrollDriven,
            progress: progress.clamp(0.0, 1.0),
            up: Vec3::Y,
            aspect: viewport.aspect(),
            fov_y: camera.fov_degrees.to_radians(),
            near: camera.near,
            far: camera.far,
            distance_range: camera.distance_range,
            height_range: camera.height_range,
            sun_height_range: camera.sun_height_range,
            explore_position: Vec3::from_array(camera.explore_position),
            scroll_smoothing: motion.scroll_smoothing,
            mode_smoothing: motion.mode_smoothing,
            sun_smoothing: motion.sun_smoothing,
            epsilon: motion.mode_epsilon,
            orbit: OrbitControls::new(&camera.orbit),
        };
        if mode == Mode::ExploreOrbit {
            controller.state = CameraState::OrbitInteractive;
            controller.orbit.enable();
        }
        controller
    }

    pub fn state(&self) -> CameraState {
        self.state
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn orbit(&self) -> &OrbitControls {
        &self.orbit
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    /// Where the camera should start given the mode it starts in
    pub fn initial_position(&self) -> Vec3 {
        match self.state {
            CameraState::OrbitInteractive => self.explore_position,
            _ => self.scroll_target(self.progress),
        }
    }

    /// Scroll-driven resting position for a progress in [0, 1]
    pub fn scroll_target(&self, progress: f32) -> Vec3 {
        let p = progress.clamp(0.0, 1.0);
        Vec3::new(
            0.0,
            lerp(self.height_range[0], self.height_range[1], p),
            lerp(self.distance_range[0], self.distance_range[1], p),
        )
    }

    /// Sun height target for a progress in [0, 1]
    pub fn sun_target(&self, progress: f32) -> f32 {
        lerp(
            self.sun_height_range[0],
            self.sun_height_range[1],
            progress.clamp(0.0, 1.0),
        )
    }

    fn resting_position(&self, mode: Mode) -> Vec3 {
        match mode {
            Mode::ExploreOrbit => self.explore_position,
            Mode::TextPresentation => self.scroll_target(self.progress),
        }
    }

    /// React to the mode signal flipping
    pub fn set_mode(&mut self, mode: Mode) {
        let next = CameraState::ModeTransitioning { toward: mode };
        if self.state == next {
            return;
        }
        // Orbit input is only live once the explore position is reached
        self.orbit.disable();
        log::info!("camera {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Scroll progress is frozen outside the scroll-driven paths
    pub fn set_scroll_progress(&mut self, progress: f32) {
        match self.state {
            CameraState::ScrollDriven
            | CameraState::ModeTransitioning {
                toward: Mode::TextPresentation,
            } => self.progress = progress.clamp(0.0, 1.0),
            _ => {}
        }
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        if viewport.is_empty() {
            return;
        }
        self.aspect = viewport.aspect();
    }

    /// Advance the camera position by one frame of smoothing
    pub fn update(&mut self, scene: &mut SceneState) {
        match self.state {
            CameraState::ScrollDriven => {
                // Height follows scroll directly, only the zoom is smoothed
                let target = self.scroll_target(self.progress);
                let smoothed = scene.camera_position.lerp(target, self.scroll_smoothing);
                scene.camera_position = Vec3::new(smoothed.x, target.y, smoothed.z);
            }
            CameraState::ModeTransitioning { toward } => {
                let target = self.resting_position(toward);
                scene.camera_position = scene.camera_position.lerp(target, self.mode_smoothing);
                if toward == Mode::TextPresentation {
                    self.up = self
                        .up
                        .lerp(Vec3::Y, self.mode_smoothing)
                        .normalize_or(Vec3::Y);
                }

                let arrived = (scene.camera_position - target)
                    .abs()
                    .cmple(Vec3::splat(self.epsilon))
                    .all();
                if arrived {
                    scene.camera_position = target;
                    self.state = match toward {
                        Mode::ExploreOrbit => {
                            self.orbit.enable();
                            CameraState::OrbitInteractive
                        }
                        Mode::TextPresentation => {
                            self.up = Vec3::Y;
                            CameraState::ScrollDriven
                        }
                    };
                    log::info!("camera settled: {:?}", self.state);
                }
            }
            CameraState::OrbitInteractive => {}
        }
    }

    /// Smooth the sun height toward the scroll target
    pub fn update_sun(&self, scene: &mut SceneState) {
        let target = self.sun_target(self.progress);
        scene.sun_offset = lerp(scene.sun_offset, target, self.sun_smoothing);
    }

    /// Feed user input into the orbit controls and run their damping step
    pub fn apply_orbit(&mut self, scene: &mut SceneState, input: &dyn Controller) {
        if !self.orbit.is_enabled() {
            return;
        }
        self.orbit.accumulate(input);
        self.orbit.update(&mut scene.camera_position, &mut self.up);
    }

    /// View matrix: always looking at the planet's center
    pub fn view(&self, position: Vec3) -> Mat4 {
        let forward = (-position).normalize_or_zero();
        let up = if forward.cross(self.up).length_squared() < 1e-6 {
            forward.any_orthonormal_vector()
        } else {
            self.up
        };
        Mat4::look_at_rh(position, Vec3::ZERO, up)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }
}
