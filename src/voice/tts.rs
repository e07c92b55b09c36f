//! Text-to-speech (TTS) processing

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::Engine;
use secrecy::{ExposeSecret, SecretString};
use tempfile::TempPath;

use crate::config::{ApiConfig, VoiceGender};
use crate::{Error, Result};

/// Synthesized speech, written to a temporary MP3 file
///
/// The file is closed before this value is handed out and is removed on drop
/// unless [`finish`](SynthesizedAudio::finish) is asked to keep it.
#[derive(Debug)]
pub struct SynthesizedAudio {
    data: Vec<u8>,
    path: TempPath,
}

impl SynthesizedAudio {
    /// Write encoded audio to a new temporary file in `dir`
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be created or written
    pub fn write(data: Vec<u8>, dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;

        let mut file = tempfile::Builder::new()
            .prefix("pivizion-")
            .suffix(".mp3")
            .tempfile_in(dir)?;
        file.write_all(&data)?;
        file.flush()?;

        // Closes the handle, the path stays owned
        let path = file.into_temp_path();
        tracing::debug!(path = %path.display(), bytes = data.len(), "audio written to file");

        Ok(Self { data, path })
    }

    /// Encoded audio bytes
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Path to the audio file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Dispose of the file after playback
    ///
    /// With `keep` the file is left on disk and its path returned. Otherwise
    /// it is deleted; a failed delete is logged and otherwise ignored.
    pub fn finish(self, keep: bool) -> Option<PathBuf> {
        if keep {
            return match self.path.keep() {
                Ok(path) => Some(path),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to keep audio file");
                    None
                }
            };
        }

        let shown = self.path.display().to_string();
        if let Err(e) = self.path.close() {
            tracing::warn!(path = %shown, error = %e, "failed to delete audio file");
        }
        None
    }
}

/// Synthesizes speech from text
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` with the given voice
    ///
    /// # Errors
    ///
    /// Returns `Error::Synthesis` on transport or authentication failure, or
    /// when the service rejects the text or voice parameters
    async fn synthesize(
        &self,
        text: &str,
        language: &str,
        gender: VoiceGender,
    ) -> Result<SynthesizedAudio>;

    /// Synthesizer name for logging
    fn name(&self) -> &'static str;
}

/// Google Cloud Text-to-Speech client (`text:synthesize`)
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: SecretString,
    endpoint: String,
    audio_dir: PathBuf,
}

impl TextToSpeech {
    /// Create a new TTS client writing audio files into `audio_dir`
    #[must_use]
    pub fn new(api_key: SecretString, endpoint: impl Into<String>, audio_dir: PathBuf) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            endpoint: endpoint.into(),
            audio_dir,
        }
    }

    /// Create a client from the API configuration
    ///
    /// # Errors
    ///
    /// Returns error if no API key is configured
    pub fn from_config(api: &ApiConfig, audio_dir: PathBuf) -> Result<Self> {
        let key = api
            .key
            .as_ref()
            .ok_or_else(|| Error::Config("API key required for TTS".to_string()))?;

        Ok(Self::new(
            SecretString::from(key.expose_secret().to_owned()),
            api.tts_url.clone(),
            audio_dir,
        ))
    }
}

#[async_trait]
impl SpeechSynthesizer for TextToSpeech {
    async fn synthesize(
        &self,
        text: &str,
        language: &str,
        gender: VoiceGender,
    ) -> Result<SynthesizedAudio> {
        let request = SynthesizeRequest::new(text, language, gender);

        tracing::debug!(language, %gender, chars = text.len(), "synthesizing speech");

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.expose_secret())])
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Synthesis(format!("TTS request failed: {}", e.without_url())))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Synthesis(format!("TTS API error {status}: {body}")));
        }

        let body: SynthesizeResponse = response
            .json()
            .await
            .map_err(|e| Error::Synthesis(format!("malformed TTS response: {}", e.without_url())))?;

        let audio = body.decode()?;
        SynthesizedAudio::write(audio, &self.audio_dir)
    }

    fn name(&self) -> &'static str {
        "google-tts"
    }
}

#[derive(serde::Serialize)]
struct SynthesizeRequest<'a> {
    input: SynthesisInput<'a>,
    voice: VoiceSelection<'a>,
    #[serde(rename = "audioConfig")]
    audio_config: AudioConfig,
}

impl<'a> SynthesizeRequest<'a> {
    const fn new(text: &'a str, language: &'a str, gender: VoiceGender) -> Self {
        Self {
            input: SynthesisInput { text },
            voice: VoiceSelection {
                language_code: language,
                ssml_gender: gender,
            },
            audio_config: AudioConfig {
                audio_encoding: "MP3",
            },
        }
    }
}

#[derive(serde::Serialize)]
struct SynthesisInput<'a> {
    text: &'a str,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSelection<'a> {
    language_code: &'a str,
    ssml_gender: VoiceGender,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfig {
    audio_encoding: &'static str,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    #[serde(default)]
    audio_content: String,
}

impl SynthesizeResponse {
    fn decode(&self) -> Result<Vec<u8>> {
        if self.audio_content.is_empty() {
            return Err(Error::Synthesis("TTS response contained no audio".to_string()));
        }
        base64::engine::general_purpose::STANDARD
            .decode(&self.audio_content)
            .map_err(|e| Error::Synthesis(format!("invalid audio encoding: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let request = SynthesizeRequest::new("cat\nSTOP", "en-US", VoiceGender::Female);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "input": { "text": "cat\nSTOP" },
                "voice": { "languageCode": "en-US", "ssmlGender": "FEMALE" },
                "audioConfig": { "audioEncoding": "MP3" }
            })
        );
    }

    #[test]
    fn test_decode_audio_content() {
        let response: SynthesizeResponse =
            serde_json::from_str(r#"{"audioContent": "SUQzBA=="}"#).unwrap();
        assert_eq!(response.decode().unwrap(), b"ID3\x04");
    }

    #[test]
    fn test_missing_audio_is_error() {
        let response: SynthesizeResponse = serde_json::from_str("{}").unwrap();
        assert!(matches!(response.decode(), Err(Error::Synthesis(_))));

        let response: SynthesizeResponse =
            serde_json::from_str(r#"{"audioContent": "not base64!"}"#).unwrap();
        assert!(matches!(response.decode(), Err(Error::Synthesis(_))));
    }

    #[test]
    fn test_audio_file_written_and_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let audio = SynthesizedAudio::write(b"mp3 bytes".to_vec(), dir.path()).unwrap();
        let path = audio.path().to_path_buf();

        assert_eq!(std::fs::read(&path).unwrap(), b"mp3 bytes");
        assert_eq!(audio.bytes(), b"mp3 bytes");
        assert!(path.extension().is_some_and(|e| e == "mp3"));

        assert!(audio.finish(false).is_none());
        assert!(!path.exists());
    }

    #[test]
    fn test_audio_file_kept() {
        let dir = tempfile::tempdir().unwrap();
        let audio = SynthesizedAudio::write(b"mp3".to_vec(), dir.path()).unwrap();

        let kept = audio.finish(true).unwrap();
        assert!(kept.exists());
    }

    #[test]
    fn test_finish_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let audio = SynthesizedAudio::write(b"mp3".to_vec(), dir.path()).unwrap();
        std::fs::remove_file(audio.path()).unwrap();

        assert!(audio.finish(false).is_none());
    }

    #[test]
    fn test_audio_file_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let audio = SynthesizedAudio::write(b"mp3".to_vec(), dir.path()).unwrap();
        let path = audio.path().to_path_buf();

        drop(audio);
        assert!(!path.exists());
    }

    #[test]
    fn test_from_config_requires_key() {
        let result = TextToSpeech::from_config(&ApiConfig::default(), std::env::temp_dir());
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
