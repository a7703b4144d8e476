use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "gabutaudioplayer";
const CONFIG_DIR_ENV: &str = "GAP_CONFIG_DIR";
const PLAYLIST_FILE: &str = "playlist.json";
const THEME_FILE: &str = "theme.json";
const OPACITY_FILE: &str = "opacity.json";
const LOG_DIR: &str = "logs";

/// File locations under the per-user configuration directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    root: PathBuf,
}

impl ConfigPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolves the root from an explicit override, then `GAP_CONFIG_DIR`,
    /// then the platform config directory.
    pub fn resolve(override_dir: Option<&Path>) -> Result<Self> {
        if let Some(dir) = override_dir {
            return Ok(Self::new(dir));
        }

        if let Ok(dir) = env::var(CONFIG_DIR_ENV)
            && !dir.trim().is_empty()
        {
            return Ok(Self::new(dir));
        }

        if let Some(base) = dirs::config_dir() {
            return Ok(Self::new(base.join(APP_DIR)));
        }

        let home = env::var("HOME").context("HOME is not set")?;
        Ok(Self::new(PathBuf::from(home).join(".config").join(APP_DIR)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn playlist_file(&self) -> PathBuf {
        self.root.join(PLAYLIST_FILE)
    }

    pub fn theme_file(&self) -> PathBuf {
        self.root.join(THEME_FILE)
    }

    pub fn opacity_file(&self) -> PathBuf {
        self.root.join(OPACITY_FILE)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.root.join(LOG_DIR)
    }

    pub fn ensure_dir(&self) -> Result<&Path> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("failed to create {}", self.root.display()))?;
        Ok(&self.root)
    }
}

/// Reads a JSON value. `Ok(None)` means the file does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let value = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(Some(value))
}

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
