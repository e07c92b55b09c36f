//! Raspberry Pi camera module capture

use std::path::PathBuf;

use async_trait::async_trait;

use super::{CapturedImage, ImageSource, capture_path, run_capture_tool};
use crate::{Error, Result};

/// Still-capture tools, newest first
const TOOLS: &[&str] = &["rpicam-still", "libcamera-still", "raspistill"];

/// Camera warm-up before the shot, in milliseconds
const WARMUP_MS: u32 = 1000;

/// Single-shot capture from the dedicated camera module at a fixed resolution
pub struct CameraModule {
    tool: PathBuf,
    legacy: bool,
    width: u32,
    height: u32,
    image_dir: PathBuf,
}

impl CameraModule {
    /// Create a camera module source
    ///
    /// # Errors
    ///
    /// Returns error if no still-capture tool is installed
    pub fn new(width: u32, height: u32, image_dir: PathBuf) -> Result<Self> {
        let (name, tool) = TOOLS
            .iter()
            .find_map(|name| which::which(name).ok().map(|path| (*name, path)))
            .ok_or_else(|| {
                Error::Capture(format!(
                    "camera module tool not found (tried {})",
                    TOOLS.join(", ")
                ))
            })?;

        tracing::debug!(tool = %tool.display(), width, height, "camera module initialized");

        Ok(Self {
            tool,
            legacy: name == "raspistill",
            width,
            height,
            image_dir,
        })
    }

    fn args(&self, output: &std::path::Path) -> Vec<String> {
        // raspistill spells the resolution flags differently
        let (w, h) = if self.legacy {
            ("-w", "-h")
        } else {
            ("--width", "--height")
        };

        vec![
            "-n".to_string(),
            "-t".to_string(),
            WARMUP_MS.to_string(),
            w.to_string(),
            self.width.to_string(),
            h.to_string(),
            self.height.to_string(),
            "-o".to_string(),
            output.display().to_string(),
        ]
    }
}

#[async_trait]
impl ImageSource for CameraModule {
    async fn capture(&self) -> Result<CapturedImage> {
        let output = capture_path(&self.image_dir);
        let args = self.args(&output);
        run_capture_tool(&self.tool, &args, output).await
    }

    fn name(&self) -> &'static str {
        "camera-module"
    }
}
