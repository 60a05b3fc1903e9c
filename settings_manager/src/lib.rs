//! Configuration management for soundstage
//!
//! This crate handles loading, saving and validating the engine's
//! listener settings and insulation zones.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use spatial::{validate_coefficient, Zone, ZoneSet, DEFAULT_ATTENUATION};
use stage_core::Error;
use std::fs;
use std::path::{Path, PathBuf};

/// Prefix for environment overrides, e.g. `SOUNDSTAGE_AUDIO_RECV_RANGE=30`
pub const ENV_PREFIX: &str = "SOUNDSTAGE";

/// Engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Most remote-user streams received at once
    pub max_audio_recv_count: u32,

    /// Receive range in meters
    pub audio_recv_range: f32,

    /// Meters per game engine distance unit
    pub distance_unit: f32,

    /// Coefficient for entities without an explicit attenuation
    pub default_attenuation: f32,

    /// Sound insulation zones applied at startup
    pub zones: Vec<Zone>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_audio_recv_count: 10,
            audio_recv_range: 50.0,
            distance_unit: 1.0,
            default_attenuation: DEFAULT_ATTENUATION,
            zones: Vec::new(),
        }
    }
}

impl EngineSettings {
    /// Check every value the engine would reject.
    pub fn validate(&self) -> Result<(), Error> {
        if self.max_audio_recv_count == 0 {
            return Err(Error::InvalidParameter(
                "max_audio_recv_count must be > 0".to_string(),
            ));
        }
        for (name, value) in [
            ("audio_recv_range", self.audio_recv_range),
            ("distance_unit", self.distance_unit),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::InvalidParameter(format!(
                    "{} must be > 0, got {}",
                    name, value
                )));
            }
        }
        validate_coefficient(self.default_attenuation)?;
        ZoneSet::new(&self.zones)?;
        Ok(())
    }
}

/// Settings manager
pub struct SettingsManager {
    settings: EngineSettings,
    settings_file: PathBuf,
}

impl SettingsManager {
    /// Load settings from the user's config directory
    pub fn new() -> Result<Self, Error> {
        let mut config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Failed to determine config directory".to_string()))?;
        config_dir.push("soundstage");

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .map_err(|e| Error::Config(format!("Failed to create config directory: {}", e)))?;
        }

        Self::with_file(config_dir.join("settings.toml"))
    }

    /// Create a new SettingsManager with a custom file path
    pub fn with_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        Self::with_file_and_prefix(path, ENV_PREFIX)
    }

    /// Like [`SettingsManager::with_file`], reading overrides from `<prefix>_*`
    pub fn with_file_and_prefix<P: AsRef<Path>>(path: P, prefix: &str) -> Result<Self, Error> {
        let settings_file = path.as_ref().to_path_buf();
        if !settings_file.exists() {
            debug!("Settings file {:?} not found, using defaults", settings_file);
        }
        let settings = Self::load(&settings_file, prefix)?;
        settings.validate()?;

        Ok(Self {
            settings,
            settings_file,
        })
    }

    /// Layer the TOML file (if any) under environment overrides
    fn load(path: &Path, prefix: &str) -> Result<EngineSettings, Error> {
        let layered = config::Config::builder()
            .add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(config::Environment::with_prefix(prefix).try_parsing(true))
            .build()
            .map_err(|e| Error::Config(format!("Failed to read settings: {}", e)))?;

        layered
            .try_deserialize()
            .map_err(|e| Error::Config(format!("Failed to parse settings: {}", e)))
    }

    /// Save settings to the settings file
    pub fn save(&self) -> Result<(), Error> {
        let toml = toml::to_string_pretty(&self.settings)
            .map_err(|e| Error::Serialization(format!("Failed to serialize settings: {}", e)))?;

        if let Some(parent) = self.settings_file.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    Error::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        fs::write(&self.settings_file, toml)?;

        info!("Saved settings to {:?}", self.settings_file);
        Ok(())
    }

    /// Get the current settings
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Replace the settings after validating them
    pub fn update_settings(&mut self, new_settings: EngineSettings) -> Result<(), Error> {
        new_settings.validate()?;
        self.settings = new_settings;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.settings_file
    }
}
