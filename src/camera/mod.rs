//! Image capture
//!
//! Two camera implementations sit behind [`ImageSource`]: the dedicated
//! Raspberry Pi camera module and a generic camera device. The choice is made
//! once at startup from [`CameraKind`] and the detected [`Platform`].

mod device;
mod module;

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

pub use device::CameraDevice;
pub use module::CameraModule;

use crate::config::{CameraConfig, CameraKind};
use crate::{Error, Result};

/// Host platform, as far as camera selection is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    RaspberryPi,
    Other,
}

impl Platform {
    /// Probe the host
    #[must_use]
    pub fn detect() -> Self {
        let model = std::fs::read_to_string("/proc/device-tree/model").ok();
        let hostname = hostname::get()
            .ok()
            .map(|h| h.to_string_lossy().to_string());

        let platform = Self::from_hints(model.as_deref(), hostname.as_deref());
        tracing::debug!(?platform, ?hostname, "detected platform");
        platform
    }

    /// Classify from a device-tree model string and a hostname
    #[must_use]
    pub fn from_hints(model: Option<&str>, hostname: Option<&str>) -> Self {
        let model_says_pi = model.is_some_and(|m| m.contains("Raspberry Pi"));
        let hostname_says_pi = hostname.is_some_and(|h| h.eq_ignore_ascii_case("raspberrypi"));

        if model_says_pi || hostname_says_pi {
            Self::RaspberryPi
        } else {
            Self::Other
        }
    }
}

/// Resolve `Auto` against the platform
#[must_use]
pub const fn resolve_kind(kind: CameraKind, platform: Platform) -> CameraKind {
    match (kind, platform) {
        (CameraKind::Auto, Platform::RaspberryPi) => CameraKind::Module,
        (CameraKind::Auto, Platform::Other) => CameraKind::Device,
        (kind, _) => kind,
    }
}

/// A captured image file
///
/// The file is removed when this value is dropped unless [`persist`] was
/// called, so abandoned runs do not leave captures behind.
///
/// [`persist`]: CapturedImage::persist
#[derive(Debug)]
pub struct CapturedImage {
    path: PathBuf,
    keep: bool,
}

impl CapturedImage {
    /// Take ownership of an image file
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            keep: false,
        }
    }

    /// Path to the image file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the full image into memory
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read
    pub async fn read(&self) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(&self.path).await?)
    }

    /// Keep the file on disk and return its path
    #[must_use]
    pub fn persist(mut self) -> PathBuf {
        self.keep = true;
        self.path.clone()
    }
}

impl Drop for CapturedImage {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove capture");
            }
        }
    }
}

/// Something that can produce a photo
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Capture a single image
    ///
    /// # Errors
    ///
    /// Returns `Error::Capture` if the camera cannot be opened or no frame is
    /// produced
    async fn capture(&self) -> Result<CapturedImage>;

    /// Source name for logging
    fn name(&self) -> &'static str;
}

/// Build the camera selected by `config` for `platform`
///
/// # Errors
///
/// Returns `Error::Capture` if the capture tool for the selected camera is
/// not installed
pub fn from_config(config: &CameraConfig, platform: Platform) -> Result<Box<dyn ImageSource>> {
    let kind = resolve_kind(config.kind, platform);
    tracing::debug!(?kind, ?platform, "selecting camera");

    match kind {
        CameraKind::Module => Ok(Box::new(CameraModule::new(
            config.width,
            config.height,
            config.image_dir.clone(),
        )?)),
        _ => Ok(Box::new(CameraDevice::new(
            config.device_index,
            config.image_dir.clone(),
        )?)),
    }
}

/// Unique capture path inside `dir`
fn capture_path(dir: &Path) -> PathBuf {
    dir.join(format!("pivizion-{}.jpg", uuid::Uuid::new_v4()))
}

/// Run an external capture tool that writes a single image to `output`
///
/// The capture only counts if the tool exits successfully and leaves a
/// non-empty file behind.
async fn run_capture_tool(program: &Path, args: &[String], output: PathBuf) -> Result<CapturedImage> {
    if let Some(dir) = output.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }

    // Owning the path up front removes partial files on every error below
    let image = CapturedImage::new(output);

    let result = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| Error::Capture(format!("failed to run {}: {e}", program.display())))?;

    if !result.status.success() {
        let code = result.status.code().unwrap_or(-1);
        let stderr = String::from_utf8_lossy(&result.stderr);
        return Err(Error::Capture(format!(
            "{} exited with code {code}: {}",
            program.display(),
            stderr.trim()
        )));
    }

    match tokio::fs::metadata(image.path()).await {
        Ok(meta) if meta.len() > 0 => {
            tracing::debug!(path = %image.path().display(), bytes = meta.len(), "image written");
            Ok(image)
        }
        _ => Err(Error::Capture("camera produced no frame".to_string())),
    }
}
