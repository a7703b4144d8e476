use crate::config::{self, ConfigPaths};
use crate::model::{DEFAULT_OPACITY, Settings, Theme, clamp_opacity};
use anyhow::Result;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Theme and opacity, each persisted to its own flat file.
#[derive(Debug)]
pub struct SettingsStore {
    theme_file: PathBuf,
    opacity_file: PathBuf,
    settings: Settings,
}

impl SettingsStore {
    pub fn new(paths: &ConfigPaths) -> Self {
        Self {
            theme_file: paths.theme_file(),
            opacity_file: paths.opacity_file(),
            settings: Settings::default(),
        }
    }

    /// Builds a store and loads both values, falling back to defaults.
    pub fn open(paths: &ConfigPaths) -> Self {
        let mut store = Self::new(paths);
        store.load();
        store
    }

    pub fn load(&mut self) {
        self.settings.theme = self.load_theme();
        self.settings.opacity = self.load_opacity();
    }

    pub fn settings(&self) -> Settings {
        self.settings
    }

    pub fn theme(&self) -> Theme {
        self.settings.theme
    }

    pub fn opacity(&self) -> f32 {
        self.settings.opacity
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.settings.theme = theme;
    }

    /// Returns the value actually stored after clamping.
    pub fn set_opacity(&mut self, value: f32) -> f32 {
        self.settings.opacity = clamp_opacity(value);
        self.settings.opacity
    }

    pub fn save_theme(&self) -> Result<()> {
        config::write_json(&self.theme_file, &self.settings.theme)
    }

    pub fn save_opacity(&self) -> Result<()> {
        config::write_json(&self.opacity_file, &self.settings.opacity)
    }

    fn load_theme(&self) -> Theme {
        match config::read_json::<Theme>(&self.theme_file) {
            Ok(Some(theme)) => theme,
            Ok(None) => {
                debug!(path = %self.theme_file.display(), "no saved theme, using default");
                Theme::default()
            }
            Err(err) => {
                warn!("error loading theme: {err:#}");
                Theme::default()
            }
        }
    }

    fn load_opacity(&self) -> f32 {
        match config::read_json::<f32>(&self.opacity_file) {
            Ok(Some(value)) => clamp_opacity(value),
            Ok(None) => DEFAULT_OPACITY,
            Err(err) => {
                warn!("error loading opacity: {err:#}");
                DEFAULT_OPACITY
            }
        }
    }
}
