//! Persisted display preferences.
//!
//! Stored as a small TOML file:
//!
//! ```toml
//! sound_enabled = true
//! volume = 0.5
//! theme = "light"
//! ```
//!
//! Each field is parsed on its own, so one bad value only resets that field.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

const KEY_SOUND: &str = "sound_enabled";
const KEY_VOLUME: &str = "volume";
const KEY_THEME: &str = "theme";

const DEFAULT_VOLUME: f32 = 0.5;
const VOLUME_STEP_GRID: f32 = 20.0;

#[derive(Debug, Error)]
pub enum PrefsError {
    #[error("could not determine a config directory")]
    NoConfigDir,

    #[error("I/O error on preferences file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize preferences: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Preferences {
    pub sound_enabled: bool,
    pub volume: f32,
    pub theme: Theme,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            volume: DEFAULT_VOLUME,
            theme: Theme::Light,
        }
    }
}

impl Preferences {
    /// Parse a preferences document, falling back to the default for every
    /// field that is missing or malformed.
    pub fn from_toml(text: &str) -> Self {
        let table = match text.parse::<toml::Table>() {
            Ok(table) => table,
            Err(e) => {
                debug!(error = %e, "preferences file is not valid TOML, using defaults");
                return Self::default();
            }
        };
        let defaults = Self::default();

        Self {
            sound_enabled: table
                .get(KEY_SOUND)
                .and_then(parse_bool)
                .unwrap_or(defaults.sound_enabled),
            volume: table
                .get(KEY_VOLUME)
                .and_then(parse_volume)
                .unwrap_or(defaults.volume),
            theme: table
                .get(KEY_THEME)
                .and_then(toml::Value::as_str)
                .and_then(Theme::parse)
                .unwrap_or(defaults.theme),
        }
    }

    pub fn to_toml(&self) -> Result<String, PrefsError> {
        Ok(toml::to_string(self)?)
    }

    pub fn toggle_sound(&mut self) {
        self.sound_enabled = !self.sound_enabled;
    }

    pub fn toggle_theme(&mut self) {
        self.theme = self.theme.toggled();
    }

    pub fn set_volume(&mut self, volume: f32) {
        if !volume.is_nan() {
            self.volume = volume.clamp(0.0, 1.0);
        }
    }

    /// Move the volume by `delta`, snapped to 5% steps.
    pub fn step_volume(&mut self, delta: f32) {
        let stepped = ((self.volume + delta) * VOLUME_STEP_GRID).round() / VOLUME_STEP_GRID;
        self.set_volume(stepped);
    }

    pub fn volume_percent(&self) -> u8 {
        (self.volume * 100.0).round() as u8
    }
}

fn parse_bool(value: &toml::Value) -> Option<bool> {
    match value {
        toml::Value::Boolean(b) => Some(*b),
        toml::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_volume(value: &toml::Value) -> Option<f32> {
    let raw = match value {
        toml::Value::Float(f) => *f as f32,
        toml::Value::Integer(i) => *i as f32,
        toml::Value::String(s) => s.trim().parse::<f32>().ok()?,
        _ => return None,
    };
    if raw.is_nan() {
        return None;
    }
    Some(raw.clamp(0.0, 1.0))
}

/// Where preferences are read from and written back to.
pub trait PreferencesStore {
    /// Load stored preferences. Never fails: absent or unreadable data
    /// yields defaults.
    fn load(&self) -> Preferences;

    fn save(&mut self, prefs: &Preferences) -> Result<(), PrefsError>;

    /// Human-readable location, for status output.
    fn describe(&self) -> String;
}

/// Preferences kept in a TOML file on disk.
#[derive(Debug, Clone)]
pub struct TomlFileStore {
    path: PathBuf,
}

impl TomlFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the platform config location.
    pub fn at_default_location() -> Result<Self, PrefsError> {
        Ok(Self::new(Self::default_path()?))
    }

    pub fn default_path() -> Result<PathBuf, PrefsError> {
        dirs::config_dir()
            .map(|dir| dir.join("keytest").join("preferences.toml"))
            .ok_or(PrefsError::NoConfigDir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> PrefsError {
        PrefsError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl PreferencesStore for TomlFileStore {
    fn load(&self) -> Preferences {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no preferences file, using defaults");
            return Preferences::default();
        }

        match fs::read_to_string(&self.path) {
            Ok(content) => Preferences::from_toml(&content),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "could not read preferences");
                Preferences::default()
            }
        }
    }

    fn save(&mut self, prefs: &Preferences) -> Result<(), PrefsError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let text = prefs.to_toml()?;
        fs::write(&self.path, text).map_err(|e| self.io_error(e))?;
        debug!(path = %self.path.display(), ?prefs, "saved preferences");
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Preferences held only in memory; nothing survives the process.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    saved: Option<Preferences>,
    saves: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(prefs: Preferences) -> Self {
        Self {
            saved: Some(prefs),
            saves: 0,
        }
    }

    /// Number of times `save` was called.
    pub fn save_count(&self) -> usize {
        self.saves
    }
}

impl PreferencesStore for MemoryStore {
    fn load(&self) -> Preferences {
        self.saved.unwrap_or_default()
    }

    fn save(&mut self, prefs: &Preferences) -> Result<(), PrefsError> {
        self.saved = Some(*prefs);
        self.saves += 1;
        Ok(())
    }

    fn describe(&self) -> String {
        "memory (not persisted)".to_string()
    }
}
