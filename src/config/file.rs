//! TOML configuration file loading
//!
//! Supports `~/.config/pivizion/config.toml` as a persistent config source.
//! Settings live in a `[pivizion]` table; every key is optional and the
//! table is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{Error, Result};

/// What to do with a config file that exists but cannot be read or parsed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigPolicy {
    /// Report the failure to the caller
    #[default]
    Strict,
    /// Warn and continue with defaults
    Lenient,
}

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct PivizionConfigFile {
    /// The `[pivizion]` table; absent means "all defaults"
    #[serde(default)]
    pub pivizion: Option<SettingsSection>,
}

/// Keys recognized in the `[pivizion]` table
///
/// Unknown keys are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct SettingsSection {
    /// Run text detection on the captured image
    pub text_recognition: Option<Flag>,

    /// Run label detection on the captured image
    pub label_recognition: Option<Flag>,

    /// `FEMALE`, `MALE` or `NEUTRAL` (any case)
    pub voice_gender: Option<Choice>,

    /// Speech language code (e.g. "en-US")
    pub voice_lang: Option<Choice>,

    /// Stop after capture
    pub is_test: Option<Flag>,

    /// `auto`, `module` or `device`
    pub camera: Option<Choice>,

    /// Index of the generic camera device
    pub camera_device: Option<u32>,

    /// Camera module capture width
    pub image_width: Option<u32>,

    /// Camera module capture height
    pub image_height: Option<u32>,

    /// Directory captures are written to
    pub image_dir: Option<String>,

    /// Keep the synthesized audio file after playback
    pub keep_audio: Option<Flag>,

    /// Key for the vision and speech services
    pub api_key: Option<String>,

    /// Override for the image annotation endpoint
    pub vision_url: Option<String>,

    /// Override for the speech synthesis endpoint
    pub tts_url: Option<String>,
}

/// A boolean as written by hand in a config file
///
/// Accepts TOML booleans, `0`/`1`, and the strings
/// `true/false/yes/no/on/off/1/0` in any case.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Flag {
    Bool(bool),
    Int(i64),
    Text(String),
}

/// A value picked from a fixed set of names
///
/// Any TOML type is accepted so that a value of the wrong type falls back to
/// the default instead of failing the whole table.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Choice {
    Text(String),
    Other(toml::Value),
}

impl Choice {
    /// The value as written, if it is a string
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            Self::Other(_) => None,
        }
    }
}

impl std::fmt::Display for Choice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Other(v) => write!(f, "{v}"),
        }
    }
}

impl Flag {
    /// Resolve to a boolean
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the value is not a recognized boolean
    pub fn resolve(&self, key: &str) -> Result<bool> {
        match self {
            Self::Bool(b) => Ok(*b),
            Self::Int(0) => Ok(false),
            Self::Int(1) => Ok(true),
            Self::Int(n) => Err(Error::Config(format!(
                "{key}: expected a boolean, got {n}"
            ))),
            Self::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(true),
                "false" | "no" | "off" | "0" => Ok(false),
                _ => Err(Error::Config(format!(
                    "{key}: expected a boolean, got \"{s}\""
                ))),
            },
        }
    }
}

/// Load a TOML config file
///
/// A missing file is not an error and yields `PivizionConfigFile::default()`.
/// Read and parse failures follow `policy`.
///
/// # Errors
///
/// Returns error under `ConfigPolicy::Strict` if the file exists but cannot be
/// read or parsed
pub fn load_config_file(path: &Path, policy: ConfigPolicy) -> Result<PivizionConfigFile> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(PivizionConfigFile::default());
    }

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            return fallback(
                policy,
                path,
                Error::Config(format!("failed to read {}: {e}", path.display())),
            );
        }
    };

    match toml::from_str(&content) {
        Ok(config) => {
            tracing::info!(path = %path.display(), "loaded config file");
            Ok(config)
        }
        Err(e) => fallback(policy, path, Error::Toml(e)),
    }
}

fn fallback(policy: ConfigPolicy, path: &Path, error: Error) -> Result<PivizionConfigFile> {
    match policy {
        ConfigPolicy::Strict => Err(error),
        ConfigPolicy::Lenient => {
            tracing::warn!(
                path = %path.display(),
                error = %error,
                "failed to load config file, using defaults"
            );
            Ok(PivizionConfigFile::default())
        }
    }
}

/// Return the config file path: `~/.config/pivizion/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("pivizion").join("config.toml"))
}

/// Return the data directory: `~/.local/share/pivizion`
#[must_use]
pub fn data_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.data_local_dir().join("pivizion"))
}
