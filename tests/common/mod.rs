//! Shared test utilities

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use pivizion::voice::SynthesizedAudio;
use pivizion::{
    AnalysisResult, AudioSink, CapturedImage, Error, ImageAnalyzer, ImageSource, Result,
    SpeechSynthesizer, VoiceGender,
};

/// Counts calls made into each test double
#[derive(Debug, Default)]
pub struct Calls {
    pub capture: AtomicUsize,
    pub analyze: AtomicUsize,
    pub synthesize: AtomicUsize,
    pub play: AtomicUsize,
}

impl Calls {
    pub fn counts(&self) -> [usize; 4] {
        [
            self.capture.load(Ordering::SeqCst),
            self.analyze.load(Ordering::SeqCst),
            self.synthesize.load(Ordering::SeqCst),
            self.play.load(Ordering::SeqCst),
        ]
    }
}

/// Writes a small fake JPEG into `dir` for each capture
pub struct FakeCamera {
    pub calls: Arc<Calls>,
    pub dir: PathBuf,
    pub fail: bool,
}

#[async_trait]
impl ImageSource for FakeCamera {
    async fn capture(&self) -> Result<CapturedImage> {
        let n = self.calls.capture.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::Capture("no camera".to_string()));
        }
        let path = self.dir.join(format!("capture-{n}.jpg"));
        std::fs::write(&path, b"\xFF\xD8\xFF\xE0fake")?;
        Ok(CapturedImage::new(path))
    }

    fn name(&self) -> &'static str {
        "fake-camera"
    }
}

/// Returns a canned result, or an analysis error
pub struct FakeAnalyzer {
    pub calls: Arc<Calls>,
    pub result: Option<AnalysisResult>,
    pub seen_flags: Mutex<Vec<(bool, bool)>>,
    pub seen_paths: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl ImageAnalyzer for FakeAnalyzer {
    async fn analyze(
        &self,
        image: &CapturedImage,
        want_labels: bool,
        want_text: bool,
    ) -> Result<AnalysisResult> {
        self.calls.analyze.fetch_add(1, Ordering::SeqCst);
        self.seen_flags.lock().unwrap().push((want_labels, want_text));
        self.seen_paths.lock().unwrap().push(image.path().to_path_buf());
        self.result
            .clone()
            .ok_or_else(|| Error::Analysis("403 Forbidden: API key not valid".to_string()))
    }

    fn name(&self) -> &'static str {
        "fake-analyzer"
    }
}

/// Records spoken text and writes it as the "audio"
pub struct FakeSynthesizer {
    pub calls: Arc<Calls>,
    pub dir: PathBuf,
    pub fail: bool,
    pub requests: Mutex<Vec<(String, String, VoiceGender)>>,
}

#[async_trait]
impl SpeechSynthesizer for FakeSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        language: &str,
        gender: VoiceGender,
    ) -> Result<SynthesizedAudio> {
        self.calls.synthesize.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap()
            .push((text.to_string(), language.to_string(), gender));
        if self.fail {
            return Err(Error::Synthesis("voice not available".to_string()));
        }
        SynthesizedAudio::write(text.as_bytes().to_vec(), &self.dir)
    }

    fn name(&self) -> &'static str {
        "fake-synthesizer"
    }
}

/// Checks the audio file exists while "playing" it
pub struct FakeSink {
    pub calls: Arc<Calls>,
    pub fail: bool,
    pub played: Mutex<Vec<Vec<u8>>>,
}

#[async_trait]
impl AudioSink for FakeSink {
    async fn play(&self, audio: &SynthesizedAudio) -> Result<()> {
        self.calls.play.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::Playback("no output device available".to_string()));
        }
        let data = std::fs::read(audio.path())?;
        self.played.lock().unwrap().push(data);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "fake-sink"
    }
}

/// A captured request as seen by [`serve_once`]
#[derive(Debug)]
pub struct RecordedRequest {
    pub request_line: String,
    pub body: String,
}

/// Serve a single HTTP response on a local port
///
/// Returns the base URL and a handle resolving to the request that was
/// received.
pub async fn serve_once(
    status: u16,
    body: String,
) -> (String, tokio::task::JoinHandle<RecordedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();

        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let header_end = loop {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before headers");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let headers = String::from_utf8_lossy(&buf[..header_end]).to_string();
        let content_length = headers
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);

        while buf.len() < header_end + content_length {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before body");
            buf.extend_from_slice(&chunk[..n]);
        }

        let response = format!(
            "HTTP/1.1 {status} Status\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();

        RecordedRequest {
            request_line: headers.lines().next().unwrap_or_default().to_string(),
            body: String::from_utf8_lossy(&buf[header_end..header_end + content_length])
                .to_string(),
        }
    });

    (format!("http://{addr}"), handle)
}
