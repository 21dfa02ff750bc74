//! GPU-independent backdrop logic: signals, transitions, camera, loading and
//! the per-frame driver that ties them together.

pub mod camera;
pub mod clock;
pub mod controller;
pub mod geometry;
pub mod input_adapter;
pub mod loader;
pub mod orbit;
pub mod render_loop;
pub mod scene_state;
pub mod signals;
pub mod timer;
pub mod transition;

pub use camera::{CameraController, CameraState};
pub use controller::{Button, Controller};
pub use render_loop::{FrameDriver, FrameParams, FrameSink};
pub use scene_state::{Mode, SceneState, Theme};
pub use signals::{ExternalSignals, Viewport};
