//! Read-only settings snapshot plus the one write the bridge ever makes:
//! persisting the `enabled` intent.
//!
//! Keys use the host's dotted settings names (`status.idle.timeout`, ...).
//! Settings are re-read at every decision point, never cached by the session.

use std::{
    io::Write,
    path::{Path, PathBuf},
    sync::{PoisonError, RwLock},
    time::Duration,
};

use serde::{Deserialize, Serialize};

pub const DEFAULT_APPLICATION_ID: &str = "782685898163617802";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Failed to access settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Settings file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to replace settings file: {0}")]
    Persist(#[from] tempfile::PersistError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(rename = "enabled")]
    pub enabled: bool,
    #[serde(rename = "app.id")]
    pub app_id: Option<String>,
    #[serde(rename = "status.idle.check")]
    pub idle_check: bool,
    #[serde(rename = "status.idle.disconnectOnIdle")]
    pub disconnect_on_idle: bool,
    #[serde(rename = "status.idle.resetElapsedTime")]
    pub reset_elapsed_time: bool,
    /// Seconds without focus before the session counts as idle. Zero turns idle detection off.
    #[serde(rename = "status.idle.timeout")]
    pub idle_timeout_secs: u64,
    #[serde(rename = "status.problems.enabled")]
    pub problems_enabled: bool,
    #[serde(rename = "behaviour.suppressNotifications")]
    pub suppress_notifications: bool,
    #[serde(rename = "behaviour.debug")]
    pub debug: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            app_id: None,
            idle_check: true,
            disconnect_on_idle: false,
            reset_elapsed_time: false,
            idle_timeout_secs: 300,
            problems_enabled: true,
            suppress_notifications: false,
            debug: false,
        }
    }
}

impl Settings {
    pub fn application_id(&self) -> &str {
        match self.app_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id,
            _ => DEFAULT_APPLICATION_ID,
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

pub trait ConfigSource: Send + Sync {
    fn settings(&self) -> Settings;

    fn set_enabled(&self, enabled: bool) -> Result<(), ConfigError>;
}

/// Settings held in memory only.
#[derive(Debug, Default)]
pub struct InMemoryConfig {
    settings: RwLock<Settings>,
}

impl InMemoryConfig {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: RwLock::new(settings),
        }
    }

    pub fn update(&self, apply: impl FnOnce(&mut Settings)) {
        apply(&mut self.settings.write().unwrap_or_else(PoisonError::into_inner));
    }
}

impl ConfigSource for InMemoryConfig {
    fn settings(&self) -> Settings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_enabled(&self, enabled: bool) -> Result<(), ConfigError> {
        self.update(|settings| settings.enabled = enabled);
        Ok(())
    }
}

/// Settings backed by a JSON file, re-read on every access.
#[derive(Debug, Clone)]
pub struct JsonConfig {
    path: PathBuf,
}

impl JsonConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ConfigSource for JsonConfig {
    /// Missing or invalid files fall back to defaults.
    fn settings(&self) -> Settings {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!(path = %self.path.display(), error = %e, "Ignoring invalid settings file");
                Settings::default()
            }),
            Err(_) => Settings::default(),
        }
    }

    /// Rewrites only the `enabled` key, leaving unknown keys untouched.
    fn set_enabled(&self, enabled: bool) -> Result<(), ConfigError> {
        let mut document = match std::fs::read_to_string(&self.path) {
            Ok(contents) => serde_json::from_str::<serde_json::Value>(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => serde_json::json!({}),
            Err(e) => return Err(e.into()),
        };
        let Some(object) = document.as_object_mut() else {
            return Err(ConfigError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "settings root is not an object",
            )));
        };
        object.insert("enabled".to_string(), serde_json::Value::Bool(enabled));

        let json = serde_json::to_string_pretty(&document)?;
        atomic_write(&self.path, json.as_bytes())
    }
}

/// Write to a temp file in the same directory, then rename over the target.
fn atomic_write(path: &Path, data: &[u8]) -> Result<(), ConfigError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(data)?;
    tmp.persist(path)?;
    Ok(())
}
