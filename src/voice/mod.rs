//! Voice output
//!
//! Speech synthesis through a remote service and playback of the result.

mod playback;
mod tts;

pub use playback::{AudioPlayback, AudioSink};
pub use tts::{SpeechSynthesizer, SynthesizedAudio, TextToSpeech};
