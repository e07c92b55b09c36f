//! The visualize run
//!
//! One run moves through a fixed sequence of stages:
//!
//! ```text
//! Start -> Captured -> [test mode: End] -> Analyzed -> Synthesized -> Played -> End
//! ```
//!
//! A failing stage aborts the run and its error is returned unchanged. Files
//! owned by the run (capture, synthesized audio) are removed on every exit
//! path unless the run asks to keep them.

use std::fmt;
use std::path::PathBuf;

use tracing::Instrument;

use crate::camera::ImageSource;
use crate::config::{Config, VoiceGender};
use crate::vision::ImageAnalyzer;
use crate::voice::{AudioSink, SpeechSynthesizer};
use crate::{Error, Result};

/// Stage of a visualize run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    Captured,
    Analyzed,
    Synthesized,
    Played,
    End,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::Captured => "captured",
            Self::Analyzed => "analyzed",
            Self::Synthesized => "synthesized",
            Self::Played => "played",
            Self::End => "end",
        };
        f.write_str(name)
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Test mode: stopped after capture, image kept at `image`
    Captured { image: PathBuf },
    /// Full run: `text` was spoken; `audio` is set when the file was kept
    Spoken { text: String, audio: Option<PathBuf> },
}

/// Per-run settings taken from the configuration
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Ask the analyzer for labels
    pub want_labels: bool,
    /// Ask the analyzer for text spans
    pub want_text: bool,
    /// Stop after capture and keep the image
    pub test_mode: bool,
    /// Speech language code
    pub language: String,
    /// Speech voice gender
    pub gender: VoiceGender,
    /// Keep the audio file after playback
    pub keep_audio: bool,
}

impl From<&Config> for RunOptions {
    fn from(config: &Config) -> Self {
        Self {
            want_labels: config.label_recognition,
            want_text: config.text_recognition,
            test_mode: config.test_mode,
            language: config.voice_language.clone(),
            gender: config.voice_gender,
            keep_audio: config.keep_audio,
        }
    }
}

/// Remote and output components, not needed in test mode
pub struct Voice {
    pub analyzer: Box<dyn ImageAnalyzer>,
    pub synthesizer: Box<dyn SpeechSynthesizer>,
    pub sink: Box<dyn AudioSink>,
}

impl Voice {
    /// Synthesize `text` and play it
    ///
    /// Returns the audio path when `options.keep_audio` is set.
    ///
    /// # Errors
    ///
    /// Returns error if synthesis or playback fails
    pub async fn speak(&self, text: &str, options: &RunOptions) -> Result<Option<PathBuf>> {
        let audio = self
            .synthesizer
            .synthesize(text, &options.language, options.gender)
            .await?;
        tracing::debug!(
            synthesizer = self.synthesizer.name(),
            bytes = audio.bytes().len(),
            "speech synthesized"
        );
        enter(Stage::Synthesized);

        self.sink.play(&audio).await?;
        tracing::debug!(sink = self.sink.name(), "speech played");
        enter(Stage::Played);

        let kept = audio.finish(options.keep_audio);
        if let Some(path) = &kept {
            tracing::info!(path = %path.display(), "audio kept");
        }
        Ok(kept)
    }
}

/// Runs capture, analysis, synthesis and playback in order
pub struct Visualizer {
    camera: Box<dyn ImageSource>,
    voice: Option<Voice>,
    options: RunOptions,
}

impl Visualizer {
    /// Create a visualizer that can only capture
    #[must_use]
    pub fn new(camera: Box<dyn ImageSource>, options: RunOptions) -> Self {
        Self {
            camera,
            voice: None,
            options,
        }
    }

    /// Attach the analysis and speech components
    #[must_use]
    pub fn with_voice(mut self, voice: Voice) -> Self {
        self.voice = Some(voice);
        self
    }

    /// Execute one visualize run
    ///
    /// # Errors
    ///
    /// Returns the error of the first stage that fails; later stages are not
    /// attempted
    pub async fn visualize(&self) -> Result<RunOutcome> {
        let span = tracing::info_span!("visualize", run = %uuid::Uuid::new_v4());

        let result = self.run().instrument(span.clone()).await;
        if let Err(e) = &result {
            span.in_scope(|| {
                tracing::warn!(stage = e.stage(), error = %e, "visualize run aborted");
            });
        }
        result
    }

    async fn run(&self) -> Result<RunOutcome> {
        enter(Stage::Start);

        let image = self.camera.capture().await?;
        tracing::info!(camera = self.camera.name(), path = %image.path().display(), "image captured");
        enter(Stage::Captured);

        if self.options.test_mode {
            let image = image.persist();
            tracing::info!(path = %image.display(), "test mode, skipping analysis and speech");
            enter(Stage::End);
            return Ok(RunOutcome::Captured { image });
        }

        let voice = self.voice()?;

        let result = voice
            .analyzer
            .analyze(&image, self.options.want_labels, self.options.want_text)
            .await?;
        drop(image);
        enter(Stage::Analyzed);

        let text = result.spoken_text();
        tracing::info!(%text, "composed description");

        let audio = voice.speak(&text, &self.options).await?;
        enter(Stage::End);

        Ok(RunOutcome::Spoken { text, audio })
    }

    fn voice(&self) -> Result<&Voice> {
        self.voice
            .as_ref()
            .ok_or_else(|| Error::Config("analysis and speech are not configured".to_string()))
    }
}

fn enter(stage: Stage) {
    tracing::debug!(%stage, "stage");
}
