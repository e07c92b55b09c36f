//! Configuration management for Pivizion
//!
//! The configuration is built once per process: defaults, overlaid by the
//! `[pivizion]` table of the config file, overlaid by command-line flags.
//! It is not mutated after the run starts.

pub mod file;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use secrecy::SecretString;
use serde::Serialize;

pub use file::{Choice, ConfigPolicy, Flag, PivizionConfigFile, SettingsSection};

use crate::{Error, Result};

/// Speech languages accepted by `voice_lang`
pub const ALLOWED_LANGUAGES: &[&str] = &["en-US", "en-UK", "en-GB", "en-AU"];

/// Language used when `voice_lang` is missing or not allowed
pub const DEFAULT_LANGUAGE: &str = "en-US";

/// Default Cloud Vision annotate endpoint
pub const DEFAULT_VISION_URL: &str = "https://vision.googleapis.com/v1/images:annotate";

/// Default Cloud Text-to-Speech synthesize endpoint
pub const DEFAULT_TTS_URL: &str = "https://texttospeech.googleapis.com/v1/text:synthesize";

/// Pivizion configuration
#[derive(Debug)]
pub struct Config {
    /// Run text detection
    pub text_recognition: bool,

    /// Run label detection
    pub label_recognition: bool,

    /// Synthesized voice gender
    pub voice_gender: VoiceGender,

    /// Synthesized voice language, always one of `ALLOWED_LANGUAGES`
    pub voice_language: String,

    /// Stop each run after capture
    pub test_mode: bool,

    /// Keep synthesized audio files after playback
    pub keep_audio: bool,

    /// Camera selection and capture settings
    pub camera: CameraConfig,

    /// Remote service settings
    pub api: ApiConfig,
}

/// Camera configuration
#[derive(Debug, Clone)]
pub struct CameraConfig {
    /// Which camera implementation to use
    pub kind: CameraKind,

    /// Generic camera device index
    pub device_index: u32,

    /// Camera module capture width
    pub width: u32,

    /// Camera module capture height
    pub height: u32,

    /// Directory captures are written to
    pub image_dir: PathBuf,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            kind: CameraKind::Auto,
            device_index: 0,
            width: 1024,
            height: 768,
            image_dir: std::env::temp_dir(),
        }
    }
}

/// Remote service configuration
#[derive(Debug)]
pub struct ApiConfig {
    /// Service key (from file, `GOOGLE_API_KEY`, or `--api-key`)
    pub key: Option<SecretString>,

    /// Image annotation endpoint
    pub vision_url: String,

    /// Speech synthesis endpoint
    pub tts_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            key: None,
            vision_url: DEFAULT_VISION_URL.to_string(),
            tts_url: DEFAULT_TTS_URL.to_string(),
        }
    }
}

/// Synthesized voice gender
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VoiceGender {
    #[default]
    Female,
    Male,
    Neutral,
}

impl VoiceGender {
    /// Upper-case name as used by the speech service
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Female => "FEMALE",
            Self::Male => "MALE",
            Self::Neutral => "NEUTRAL",
        }
    }
}

impl fmt::Display for VoiceGender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoiceGender {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FEMALE" => Ok(Self::Female),
            "MALE" => Ok(Self::Male),
            "NEUTRAL" => Ok(Self::Neutral),
            _ => Err(Error::Config(format!("unknown voice gender: {s}"))),
        }
    }
}

/// Camera implementation selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CameraKind {
    /// Camera module on a Raspberry Pi, generic device elsewhere
    #[default]
    Auto,
    /// Dedicated camera module
    Module,
    /// Generic camera device
    Device,
}

impl FromStr for CameraKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "module" | "picamera" => Ok(Self::Module),
            "device" | "webcam" => Ok(Self::Device),
            _ => Err(Error::Config(format!("unknown camera: {s}"))),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            text_recognition: true,
            label_recognition: true,
            voice_gender: VoiceGender::Female,
            voice_language: DEFAULT_LANGUAGE.to_string(),
            test_mode: false,
            keep_audio: false,
            camera: CameraConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, or the default location when `None`
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be parsed or holds a bad boolean
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_options(path, false, ConfigPolicy::Strict)
    }

    /// Load configuration with command-line overrides
    ///
    /// `test_override` forces `test_mode` on regardless of the file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be parsed (under `ConfigPolicy::Strict`)
    /// or holds a value that is not a boolean where one is expected
    pub fn load_with_options(
        path: Option<&Path>,
        test_override: bool,
        policy: ConfigPolicy,
    ) -> Result<Self> {
        let file = match path.map(Path::to_path_buf).or_else(file::config_file_path) {
            Some(path) => file::load_config_file(&path, policy)?,
            None => {
                tracing::warn!("no config directory available, using defaults");
                PivizionConfigFile::default()
            }
        };

        let mut config = Self::from_file(file)?;
        if test_override {
            config.test_mode = true;
        }
        Ok(config)
    }

    /// Build a configuration from a parsed config file
    ///
    /// # Errors
    ///
    /// Returns error if a boolean key holds an unrecognized value
    pub fn from_file(file: PivizionConfigFile) -> Result<Self> {
        let mut config = Self::default();
        let Some(section) = file.pivizion else {
            tracing::debug!("no [pivizion] table, using defaults");
            return Ok(config);
        };

        let flag = |value: &Option<Flag>, key: &str, default: bool| {
            value.as_ref().map_or(Ok(default), |f| f.resolve(key))
        };

        config.text_recognition = flag(&section.text_recognition, "text_recognition", true)?;
        config.label_recognition = flag(&section.label_recognition, "label_recognition", true)?;
        config.test_mode = flag(&section.is_test, "is_test", false)?;
        config.keep_audio = flag(&section.keep_audio, "keep_audio", false)?;

        if let Some(gender) = section.voice_gender {
            config.voice_gender = gender
                .as_text()
                .and_then(|g| g.parse().ok())
                .unwrap_or_else(|| {
                    tracing::warn!(
                        value = %gender,
                        default = %VoiceGender::default(),
                        "invalid voice_gender, using default"
                    );
                    VoiceGender::default()
                });
        }

        if let Some(lang) = section.voice_lang {
            config.voice_language = validate_language(&lang);
        }

        if let Some(camera) = section.camera {
            config.camera.kind = camera
                .as_text()
                .and_then(|c| c.parse().ok())
                .unwrap_or_else(|| {
                    tracing::warn!(value = %camera, "invalid camera, using auto");
                    CameraKind::Auto
                });
        }
        if let Some(index) = section.camera_device {
            config.camera.device_index = index;
        }
        if let Some(width) = section.image_width {
            config.camera.width = width;
        }
        if let Some(height) = section.image_height {
            config.camera.height = height;
        }
        if let Some(dir) = section.image_dir {
            config.camera.image_dir = PathBuf::from(dir);
        }

        if let Some(key) = section.api_key.filter(|k| !k.is_empty()) {
            config.api.key = Some(SecretString::from(key));
        }
        if let Some(url) = section.vision_url {
            config.api.vision_url = url;
        }
        if let Some(url) = section.tts_url {
            config.api.tts_url = url;
        }

        Ok(config)
    }

    /// Override the service key (command line or environment)
    #[must_use]
    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        if let Some(key) = key.filter(|k| !k.is_empty()) {
            self.api.key = Some(SecretString::from(key));
        }
        self
    }
}

/// Return `lang` if allowed, else the default language
fn validate_language(lang: &Choice) -> String {
    match lang.as_text().map(str::trim) {
        Some(code) if ALLOWED_LANGUAGES.contains(&code) => code.to_string(),
        _ => {
            tracing::warn!(
                value = %lang,
                default = DEFAULT_LANGUAGE,
                "invalid voice_lang, using default"
            );
            DEFAULT_LANGUAGE.to_string()
        }
    }
}
