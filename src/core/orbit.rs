use glam::{Quat, Vec2, Vec3};

use super::controller::{Button, Controller};
use crate::config::OrbitConfig;

/// Below this, pending rotation/zoom is dropped
const REST_EPSILON: f32 = 1e-6;

/// User-driven rotation and zoom around the origin.
///
/// Rotation is unrestricted on both axes (the camera's up vector rotates with
/// it, so there is no pole lock). Input accumulates into pending deltas that are
/// applied a damped fraction per frame, which gives inertia after release.
/// There is no pan input: the look-at point stays at the planet's center.
#[derive(Debug, Clone)]
pub struct OrbitControls {
    enabled: bool,
    min_distance: f32,
    max_distance: f32,
    damping: f32,
    rotate_speed: f32,
    zoom_speed: f32,
    /// Pending (yaw, pitch) in radians
    pending_rotation: Vec2,
    /// Pending log-scale distance change
    pending_zoom: f32,
}

impl OrbitControls {
    pub fn new(config: &OrbitConfig) -> Self {
        Self {
            enabled: false,
            min_distance: config.min_distance,
            max_distance: config.max_distance,
            damping: config.damping.clamp(0.0, 1.0),
            rotate_speed: config.rotate_speed,
            zoom_speed: config.zoom_speed,
            pending_rotation: Vec2::ZERO,
            pending_zoom: 0.0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Disable and drop any remaining inertia
    pub fn disable(&mut self) {
        self.enabled = false;
        self.pending_rotation = Vec2::ZERO;
        self.pending_zoom = 0.0;
    }

    pub fn distance_range(&self) -> (f32, f32) {
        (self.min_distance, self.max_distance)
    }

    /// Feed one frame of input
    pub fn accumulate(&mut self, input: &dyn Controller) {
        if !self.enabled {
            return;
        }
        if input.is_down(Button::MouseLeft) {
            let (dx, dy) = input.pointer_delta();
            self.pending_rotation -= Vec2::new(dx, dy) * self.rotate_speed;
        }
        self.pending_zoom -= input.zoom_delta() * self.zoom_speed;
    }

    /// Damping step: apply a fraction of the pending motion, then decay it
    pub fn update(&mut self, position: &mut Vec3, up: &mut Vec3) {
        if !self.enabled {
            return;
        }

        let step = self.pending_rotation * self.damping;
        if step.length_squared() > 0.0 {
            let forward = (-*position).normalize_or_zero();
            let right = forward.cross(*up).normalize_or_zero();
            let rotation = Quat::from_axis_angle(*up, step.x) * Quat::from_axis_angle(right, step.y);
            *position = rotation * *position;
            *up = (rotation * *up).normalize();
        }

        let zoom_step = self.pending_zoom * self.damping;
        let distance = position.length();
        if zoom_step != 0.0 && distance > 0.0 {
            let scaled = (distance * zoom_step.exp()).clamp(self.min_distance, self.max_distance);
            *position *= scaled / distance;
        }

        self.pending_rotation *= 1.0 - self.damping;
        self.pending_zoom *= 1.0 - self.damping;
        if self.pending_rotation.length_squared() < REST_EPSILON * REST_EPSILON {
            self.pending_rotation = Vec2::ZERO;
        }
        if self.pending_zoom.abs() < REST_EPSILON {
            self.pending_zoom = 0.0;
        }
    }

    pub fn is_moving(&self) -> bool {
        self.pending_rotation != Vec2::ZERO || self.pending_zoom != 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Drag {
        delta: (f32, f32),
        wheel: f32,
        down: Vec<Button>,
    }

    impl Controller for Drag {
        fn is_down(&self, button: Button) -> bool {
            self.down.contains(&button)
        }

        fn get_down_keys(&self) -> &[Button] {
            &self.down
        }

        fn pointer_delta(&self) -> (f32, f32) {
            self.delta
        }

        fn zoom_delta(&self) -> f32 {
            self.wheel
        }
    }

    fn drag(dx: f32, dy: f32) -> Drag {
        Drag {
            delta: (dx, dy),
            wheel: 0.0,
            down: vec![Button::MouseLeft],
        }
    }

    #[test]
    fn test_disabled_controls_ignore_input() {
        let mut controls = OrbitControls::new(&OrbitConfig::default());
        let mut position = Vec3::new(0.0, 0.0, 9.0);
        let mut up = Vec3::Y;

        controls.accumulate(&drag(100.0, 0.0));
        controls.update(&mut position, &mut up);

        assert_eq!(position, Vec3::new(0.0, 0.0, 9.0));
        assert!(!controls.is_moving());
    }

    #[test]
    fn test_rotation_keeps_distance_and_has_inertia() {
        let mut controls = OrbitControls::new(&OrbitConfig::default());
        controls.enable();
        let mut position = Vec3::new(0.0, 0.0, 9.0);
        let mut up = Vec3::Y;

        controls.accumulate(&drag(200.0, 0.0));
        controls.update(&mut position, &mut up);
        let after_first = position;
        assert!((position.length() - 9.0).abs() < 1e-3);
        assert!(position.x.abs() > 0.0);

        // Released: keeps drifting, by less each frame
        controls.update(&mut position, &mut up);
        let second_step = (position - after_first).length();
        assert!(second_step > 0.0);
        assert!(controls.is_moving());
    }

    #[test]
    fn test_vertical_rotation_passes_over_the_pole() {
        let config = OrbitConfig {
            damping: 1.0,
            ..OrbitConfig::default()
        };
        let mut controls = OrbitControls::new(&config);
        controls.enable();
        let mut position = Vec3::new(0.0, 0.0, 9.0);
        let mut up = Vec3::Y;

        // Pitch by pi radians
        let pixels = std::f32::consts::PI / config.rotate_speed;
        controls.accumulate(&drag(0.0, pixels));
        controls.update(&mut position, &mut up);

        assert!((position - Vec3::new(0.0, 0.0, -9.0)).length() < 1e-2);
        assert!((up - Vec3::NEG_Y).length() < 1e-2);
    }

    #[test]
    fn test_zoom_is_clamped() {
        let config = OrbitConfig::default();
        let mut controls = OrbitControls::new(&config);
        controls.enable();
        let mut position = Vec3::new(0.0, 0.0, 9.0);
        let mut up = Vec3::Y;

        let zoom_in = Drag {
            delta: (0.0, 0.0),
            wheel: 1000.0,
            down: vec![],
        };
        for _ in 0..200 {
            controls.accumulate(&zoom_in);
            controls.update(&mut position, &mut up);
        }
        assert!((position.length() - config.min_distance).abs() < 1e-3);

        let zoom_out = Drag {
            wheel: -1000.0,
            ..zoom_in
        };
        for _ in 0..200 {
            controls.accumulate(&zoom_out);
            controls.update(&mut position, &mut up);
        }
        assert!((position.length() - config.max_distance).abs() < 1e-3);
    }

    #[test]
    fn test_disable_drops_inertia() {
        let mut controls = OrbitControls::new(&OrbitConfig::default());
        controls.enable();
        controls.accumulate(&drag(50.0, 20.0));
        assert!(controls.is_moving());
        controls.disable();
        assert!(!controls.is_moving());
    }
}
