use glam::Vec3;

use crate::config::{PaletteConfig, ThemeTargets};

/// Whether the camera follows the page or the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    TextPresentation,
    ExploreOrbit,
}

impl Mode {
    pub fn from_explore_flag(explore: bool) -> Self {
        if explore {
            Mode::ExploreOrbit
        } else {
            Mode::TextPresentation
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    pub fn from_dark_flag(dark: bool) -> Self {
        if dark {
            Theme::Dark
        } else {
            Theme::Light
        }
    }

    pub fn targets(self, palette: &PaletteConfig) -> ThemeTargets {
        match self {
            Theme::Light => palette.light,
            Theme::Dark => palette.dark,
        }
    }
}

/// Post-process bloom parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bloom {
    pub threshold: f32,
    pub strength: f32,
    pub radius: f32,
}

/// The day/night parameter group: surface blend and cloud opacity move together
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DayNight {
    pub blend: f32,
    pub cloud_opacity: f32,
}

impl From<ThemeTargets> for DayNight {
    fn from(targets: ThemeTargets) -> Self {
        Self {
            blend: targets.blend,
            cloud_opacity: targets.cloud_opacity,
        }
    }
}

impl From<ThemeTargets> for Bloom {
    fn from(targets: ThemeTargets) -> Self {
        Self {
            threshold: targets.bloom_threshold,
            strength: targets.bloom_strength,
            radius: targets.bloom_radius,
        }
    }
}

/// The single mutable record driving a frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneState {
    pub camera_position: Vec3,
    /// Vertical offset of the sun light
    pub sun_offset: f32,
    /// 0 = day texture, 1 = night texture
    pub blend: f32,
    pub cloud_opacity: f32,
    pub bloom: Bloom,
    /// Opacity of the whole visual surface
    pub surface_opacity: f32,
}

impl SceneState {
    /// First-mount state: theme values are set directly, no transition
    pub fn initial(camera_position: Vec3, sun_offset: f32, theme: ThemeTargets) -> Self {
        Self {
            camera_position,
            sun_offset,
            blend: theme.blend,
            cloud_opacity: theme.cloud_opacity,
            bloom: theme.into(),
            surface_opacity: 1.0,
        }
    }

    pub fn day_night(&self) -> DayNight {
        DayNight {
            blend: self.blend,
            cloud_opacity: self.cloud_opacity,
        }
    }

    pub fn set_day_night(&mut self, value: DayNight) {
        self.blend = value.blend.clamp(0.0, 1.0);
        self.cloud_opacity = value.cloud_opacity.clamp(0.0, 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_theme_selects_palette_entry() {
        let palette = PaletteConfig::default();
        assert_eq!(Theme::Dark.targets(&palette), palette.dark);
        assert_eq!(Theme::Light.targets(&palette), palette.light);
        assert_eq!(Theme::from_dark_flag(true), Theme::Dark);
    }

    #[test]
    fn test_mode_from_flag() {
        assert_eq!(Mode::from_explore_flag(false), Mode::TextPresentation);
        assert_eq!(Mode::from_explore_flag(true), Mode::ExploreOrbit);
    }

    #[test]
    fn test_initial_state_uses_theme_directly() {
        let palette = PaletteConfig::default();
        let state = SceneState::initial(Vec3::new(0.0, 0.6, 7.2), 3.0, palette.dark);

        assert_eq!(state.blend, 1.0);
        assert_eq!(state.cloud_opacity, 0.15);
        assert_eq!(state.bloom.strength, 0.9);
        assert_eq!(state.bloom.threshold, 0.15);
        assert_eq!(state.surface_opacity, 1.0);
    }

    #[test]
    fn test_snapshot_is_independent_of_live_state() {
        let palette = PaletteConfig::default();
        let mut state = SceneState::initial(Vec3::new(0.0, 0.6, 7.2), 3.0, palette.light);
        let snapshot = state;
        state.blend = 0.5;
        state.bloom.strength = 0.6;

        assert_eq!(snapshot.blend, 0.0);
        assert_eq!(snapshot.bloom.strength, 0.85);
        assert_ne!(snapshot, state);
    }

    #[test]
    fn test_day_night_is_clamped() {
        let palette = PaletteConfig::default();
        let mut state = SceneState::initial(Vec3::ZERO, 0.0, palette.light);
        state.set_day_night(DayNight {
            blend: 1.2,
            cloud_opacity: -0.1,
        });
        assert_eq!(state.blend, 1.0);
        assert_eq!(state.cloud_opacity, 0.0);
    }
}
