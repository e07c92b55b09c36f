//! Pivizion - describe what the camera sees, out loud
//!
//! One visualize run captures a photo, asks an image annotation service for
//! labels and text, turns the best of each into speech and plays it:
//!
//! ```text
//! ┌─────────┐   ┌──────────┐   ┌────────────┐   ┌──────────┐
//! │ camera  │──▶│  vision  │──▶│    TTS     │──▶│ playback │
//! └─────────┘   └──────────┘   └────────────┘   └──────────┘
//!  module or     labels and     language and     default
//!  device        text           gender           output
//! ```
//!
//! Each step sits behind a trait ([`ImageSource`], [`ImageAnalyzer`],
//! [`SpeechSynthesizer`], [`AudioSink`]) and [`Visualizer`] sequences them.

pub mod camera;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod vision;
pub mod voice;

pub use camera::{CapturedImage, ImageSource, Platform};
pub use config::{CameraKind, Config, ConfigPolicy, VoiceGender};
pub use error::{Error, Result};
pub use pipeline::{RunOptions, RunOutcome, Stage, Visualizer, Voice};
pub use vision::{AnalysisResult, ImageAnalyzer, LabelAnnotation, TextAnnotation};
pub use voice::{AudioSink, SpeechSynthesizer, SynthesizedAudio};
