//! Generic camera device capture (webcams)

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{CapturedImage, ImageSource, capture_path, run_capture_tool};
use crate::{Error, Result};

/// Reads exactly one frame from a camera device by index
pub struct CameraDevice {
    ffmpeg: PathBuf,
    index: u32,
    image_dir: PathBuf,
}

impl CameraDevice {
    /// Create a camera device source
    ///
    /// # Errors
    ///
    /// Returns error if `ffmpeg` is not installed or the platform has no
    /// supported camera input
    pub fn new(index: u32, image_dir: PathBuf) -> Result<Self> {
        input_args(index)?;

        let ffmpeg = which::which("ffmpeg")
            .map_err(|_| Error::Capture("ffmpeg not found, cannot open camera device".to_string()))?;

        tracing::debug!(ffmpeg = %ffmpeg.display(), index, "camera device initialized");

        Ok(Self {
            ffmpeg,
            index,
            image_dir,
        })
    }

    fn args(&self, output: &Path) -> Result<Vec<String>> {
        let mut args = vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
        ];
        args.extend(input_args(self.index)?);
        args.extend([
            "-frames:v".to_string(),
            "1".to_string(),
            "-y".to_string(),
            output.display().to_string(),
        ]);
        Ok(args)
    }
}

/// Platform input selection for device `index`
fn input_args(index: u32) -> Result<Vec<String>> {
    if cfg!(target_os = "linux") {
        Ok(vec![
            "-f".to_string(),
            "v4l2".to_string(),
            "-i".to_string(),
            format!("/dev/video{index}"),
        ])
    } else if cfg!(target_os = "macos") {
        Ok(vec![
            "-f".to_string(),
            "avfoundation".to_string(),
            "-framerate".to_string(),
            "30".to_string(),
            "-i".to_string(),
            index.to_string(),
        ])
    } else {
        Err(Error::Capture(format!(
            "camera devices are not supported on {}",
            std::env::consts::OS
        )))
    }
}

#[async_trait]
impl ImageSource for CameraDevice {
    async fn capture(&self) -> Result<CapturedImage> {
        let output = capture_path(&self.image_dir);
        let args = self.args(&output)?;
        run_capture_tool(&self.ffmpeg, &args, output).await
    }

    fn name(&self) -> &'static str {
        "camera-device"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(target_os = "linux")]
    #[test]
    fn test_reads_one_frame_from_index() {
        let device = CameraDevice {
            ffmpeg: PathBuf::from("ffmpeg"),
            index: 0,
            image_dir: PathBuf::from("/tmp"),
        };

        let args = device.args(Path::new("/tmp/a.jpg")).unwrap();
        let joined = args.join(" ");
        assert!(joined.contains("-f v4l2 -i /dev/video0"));
        assert!(joined.ends_with("-frames:v 1 -y /tmp/a.jpg"));
    }
}
