// cli.rs - Command-line interface configuration
use clap::Parser;
use std::path::PathBuf;

use crate::config::{BackdropConfig, ConfigError};

#[derive(Parser, Debug, Clone)]
#[command(name = "planet-backdrop")]
#[command(about = "Animated planet backdrop driven by scroll, theme and explore mode", long_about = None)]
pub struct Cli {
    /// JSON configuration file; flags below override it
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory holding the day, night and cloud textures
    #[arg(long)]
    pub textures: Option<PathBuf>,

    /// Start in the dark theme
    #[arg(long)]
    pub dark: bool,

    /// Start in explore mode
    #[arg(long)]
    pub explore: bool,

    /// Hide the HUD overlay
    #[arg(long = "no-ui", default_value = "false")]
    pub no_ui: bool,

    /// Log filter, e.g. `debug` or `planet_backdrop=trace`
    #[arg(long)]
    pub log_level: Option<String>,

    #[arg(long, default_value_t = 1280)]
    pub width: u32,

    #[arg(long, default_value_t = 720)]
    pub height: u32,
}

impl Cli {
    /// Configuration file (or defaults) with command-line overrides applied
    pub fn resolve_config(&self) -> Result<BackdropConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => BackdropConfig::load(path)?,
            None => BackdropConfig::default(),
        };
        if let Some(dir) = &self.textures {
            config.textures.base_path = dir.clone();
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["planet-backdrop"]);
        assert!(!cli.dark && !cli.explore && !cli.no_ui);
        assert_eq!((cli.width, cli.height), (1280, 720));
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_texture_dir_override() {
        let cli = Cli::parse_from(["planet-backdrop", "--textures", "/srv/maps", "--dark"]);
        let config = cli.resolve_config().unwrap();
        assert_eq!(config.textures.base_path, PathBuf::from("/srv/maps"));
        assert!(cli.dark);
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let cli = Cli::parse_from(["planet-backdrop", "--config", "/nonexistent/backdrop.json"]);
        assert!(matches!(cli.resolve_config(), Err(ConfigError::Io { .. })));
    }
}
