// config.rs - Runtime configuration, loadable from JSON
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Top-level configuration. Every field has a default, so a partial JSON
/// file only overrides what it names.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackdropConfig {
    pub textures: TextureConfig,
    pub page: PageConfig,
    pub palette: PaletteConfig,
    pub motion: MotionConfig,
    pub camera: CameraConfig,
    pub scene: SceneConfig,
}

impl BackdropConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Where the three surface textures live
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureConfig {
    pub base_path: PathBuf,
    pub day: String,
    pub night: String,
    pub clouds: String,
}

impl Default for TextureConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("textures"),
            day: "8k_earth_daymap.jpg".to_string(),
            night: "8k_earth_nightmap.jpg".to_string(),
            clouds: "8k_earth_clouds.jpg".to_string(),
        }
    }
}

/// Simulated page the backdrop sits behind. Offsets are in logical pixels.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PageConfig {
    pub document_height: f32,
    /// Top offset of the downstream anchor section; `None` when the page has no anchor.
    pub anchor_offset: Option<f32>,
    /// Pixels scrolled per wheel line
    pub line_height: f32,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            document_height: 6000.0,
            anchor_offset: Some(4200.0),
            line_height: 48.0,
        }
    }
}

/// Visual targets a theme resolves to
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThemeTargets {
    pub blend: f32,
    pub cloud_opacity: f32,
    pub bloom_threshold: f32,
    pub bloom_strength: f32,
    pub bloom_radius: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaletteConfig {
    pub light: ThemeTargets,
    pub dark: ThemeTargets,
}

impl Default for PaletteConfig {
    fn default() -> Self {
        Self {
            light: ThemeTargets {
                blend: 0.0,
                cloud_opacity: 0.7,
                bloom_threshold: 0.85,
                bloom_strength: 0.35,
                bloom_radius: 0.4,
            },
            dark: ThemeTargets {
                blend: 1.0,
                cloud_opacity: 0.15,
                bloom_threshold: 0.15,
                bloom_strength: 0.9,
                bloom_radius: 0.6,
            },
        }
    }
}

/// Timing and smoothing constants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Seconds for theme-driven visual changes
    pub theme_duration: f32,
    /// Seconds for the surface fade in/out
    pub fade_duration: f32,
    /// Per-frame smoothing while scroll-driven
    pub scroll_smoothing: f32,
    /// Per-frame smoothing while switching modes
    pub mode_smoothing: f32,
    /// Per-frame smoothing of the sun height
    pub sun_smoothing: f32,
    /// Per-axis distance at which a mode switch snaps to its target
    pub mode_epsilon: f32,
    /// Radians per frame
    pub planet_spin: f32,
    /// Radians per frame
    pub cloud_spin: f32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            theme_duration: 5.0,
            fade_duration: 0.5,
            scroll_smoothing: 0.06,
            mode_smoothing: 0.04,
            sun_smoothing: 0.06,
            mode_epsilon: 0.01,
            planet_spin: 0.0009,
            cloud_spin: 0.00105,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    /// Camera distance at scroll progress 0 and 1
    pub distance_range: [f32; 2],
    /// Camera height at scroll progress 0 and 1
    pub height_range: [f32; 2],
    /// Sun height at scroll progress 0 and 1
    pub sun_height_range: [f32; 2],
    /// Sun position on the x/z axes
    pub sun_x: f32,
    pub sun_z: f32,
    pub explore_position: [f32; 3],
    pub orbit: OrbitConfig,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_degrees: 45.0,
            near: 0.1,
            far: 2000.0,
            distance_range: [7.2, 3.6],
            height_range: [0.6, 0.2],
            sun_height_range: [3.0, 5.2],
            sun_x: 0.0,
            sun_z: 6.0,
            explore_position: [0.0, 0.0, 9.0],
            orbit: OrbitConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitConfig {
    pub min_distance: f32,
    pub max_distance: f32,
    pub damping: f32,
    /// Radians per pixel of drag
    pub rotate_speed: f32,
    /// Fractional distance change per wheel line
    pub zoom_speed: f32,
}

impl Default for OrbitConfig {
    fn default() -> Self {
        Self {
            min_distance: 4.5,
            max_distance: 16.0,
            damping: 0.05,
            rotate_speed: 0.005,
            zoom_speed: 0.05,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub planet_radius: f32,
    pub cloud_scale: f32,
    pub atmosphere_scale: f32,
    pub planet_segments: u32,
    pub atmosphere_segments: u32,
    pub star_count: u32,
    pub star_radius: f32,
    pub star_size: f32,
    pub star_opacity: f32,
    pub star_seed: u64,
    pub sun_intensity: f32,
    pub ambient_intensity: f32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            planet_radius: 2.9,
            cloud_scale: 1.01,
            atmosphere_scale: 1.06,
            planet_segments: 160,
            atmosphere_segments: 128,
            star_count: 12_000,
            star_radius: 450.0,
            star_size: 0.6,
            star_opacity: 0.9,
            star_seed: 0x5eed_5a75,
            sun_intensity: 2.4,
            ambient_intensity: 0.18,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_scene() {
        let config = BackdropConfig::default();
        assert_eq!(config.scene.planet_radius, 2.9);
        assert_eq!(config.scene.star_count, 12_000);
        assert_eq!(config.camera.distance_range, [7.2, 3.6]);
        assert_eq!(config.motion.scroll_smoothing, 0.06);
        assert_eq!(config.palette.dark.cloud_opacity, 0.15);
    }

    #[test]
    fn test_partial_json_keeps_other_defaults() {
        let config = BackdropConfig::from_json(
            r#"{ "motion": { "theme_duration": 1.5 }, "page": { "anchor_offset": null } }"#,
        )
        .unwrap();

        assert_eq!(config.motion.theme_duration, 1.5);
        assert_eq!(config.motion.fade_duration, 0.5);
        assert_eq!(config.page.anchor_offset, None);
        assert_eq!(config.page.document_height, 6000.0);
        assert_eq!(config.textures.day, "8k_earth_daymap.jpg");
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(BackdropConfig::from_json("{ not json").is_err());
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = BackdropConfig::load(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.json"));
    }
}
