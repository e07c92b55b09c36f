//! Audio playback to speakers

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    FromSample, SampleFormat, SampleRate, SizedSample, StreamConfig, SupportedStreamConfigRange,
};

use super::SynthesizedAudio;
use crate::{Error, Result};

/// Plays synthesized speech
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Play the audio file, returning once playback has finished
    ///
    /// # Errors
    ///
    /// Returns `Error::Playback` if no output device is available or the
    /// audio cannot be decoded
    async fn play(&self, audio: &SynthesizedAudio) -> Result<()>;

    /// Sink name for logging
    fn name(&self) -> &'static str;
}

/// Plays audio to the default output device
pub struct AudioPlayback {
    device_name: String,
}

impl AudioPlayback {
    /// Create a new audio playback instance
    ///
    /// # Errors
    ///
    /// Returns error if no output device is available
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Playback("no output device available".to_string()))?;
        let device_name = device.name().unwrap_or_default();

        tracing::debug!(device = %device_name, "audio playback initialized");

        Ok(Self { device_name })
    }

    /// Output device name
    #[must_use]
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Play mono f32 samples, blocking until done
    ///
    /// # Errors
    ///
    /// Returns error if the device rejects the stream
    pub fn play_samples(&self, samples: Vec<f32>, sample_rate: u32) -> Result<()> {
        play_samples_blocking(samples, sample_rate)
    }
}

#[async_trait]
impl AudioSink for AudioPlayback {
    async fn play(&self, audio: &SynthesizedAudio) -> Result<()> {
        let mp3_data = tokio::fs::read(audio.path()).await.map_err(|e| {
            Error::Playback(format!("failed to read {}: {e}", audio.path().display()))
        })?;

        // cpal streams are not Send, so the whole stream lives on a blocking thread
        tokio::task::spawn_blocking(move || {
            let (samples, sample_rate) = decode_mp3(&mp3_data)?;
            play_samples_blocking(samples, sample_rate)
        })
        .await
        .map_err(|e| Error::Playback(format!("playback task failed: {e}")))?
    }

    fn name(&self) -> &'static str {
        "cpal"
    }
}

/// Pick an output config supporting `sample_rate`
///
/// Only `f32` and `i16` outputs are considered; `f32` wins, then fewer channels.
fn pick_config(
    configs: impl Iterator<Item = SupportedStreamConfigRange>,
    sample_rate: u32,
) -> Option<(StreamConfig, SampleFormat)> {
    let rate = SampleRate(sample_rate);
    configs
        .filter(|c| matches!(c.sample_format(), SampleFormat::F32 | SampleFormat::I16))
        .filter(|c| c.min_sample_rate() <= rate && c.max_sample_rate() >= rate)
        .min_by_key(|c| (c.sample_format() != SampleFormat::F32, c.channels()))
        .map(|c| (c.with_sample_rate(rate).config(), c.sample_format()))
}

/// Play samples in a blocking manner
fn play_samples_blocking(samples: Vec<f32>, sample_rate: u32) -> Result<()> {
    if samples.is_empty() {
        return Ok(());
    }

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Playback("no output device".to_string()))?;

    let configs = device
        .supported_output_configs()
        .map_err(|e| Error::Playback(e.to_string()))?;
    let (config, format) = pick_config(configs, sample_rate).ok_or_else(|| {
        Error::Playback(format!("no f32 or i16 output config supports {sample_rate} Hz"))
    })?;

    let sample_count = samples.len();
    let samples = Arc::new(samples);
    let position = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicBool::new(false));

    let stream = match format {
        SampleFormat::I16 => build_stream::<i16>(&device, &config, &samples, &position, &finished),
        _ => build_stream::<f32>(&device, &config, &samples, &position, &finished),
    }?;

    stream.play().map_err(|e| Error::Playback(e.to_string()))?;

    let duration_ms = (sample_count as u64 * 1000) / u64::from(sample_rate);

    // Poll for completion with timeout
    let start = Instant::now();
    let timeout = Duration::from_millis(duration_ms + 500);

    while !finished.load(Ordering::Relaxed) {
        if start.elapsed() > timeout {
            break;
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    // Let the device drain its last buffer
    std::thread::sleep(Duration::from_millis(100));

    drop(stream);
    tracing::debug!(samples = sample_count, sample_rate, ?format, "playback complete");

    Ok(())
}

/// Build an output stream that copies mono samples to every channel
fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    samples: &Arc<Vec<f32>>,
    position: &Arc<AtomicUsize>,
    finished: &Arc<AtomicBool>,
) -> Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;
    let samples = Arc::clone(samples);
    let position = Arc::clone(position);
    let finished = Arc::clone(finished);

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let mut pos = position.load(Ordering::Relaxed);

                for frame in data.chunks_mut(channels) {
                    let sample = samples.get(pos).copied().unwrap_or_else(|| {
                        finished.store(true, Ordering::Relaxed);
                        0.0
                    });

                    for out in frame.iter_mut() {
                        *out = T::from_sample(sample);
                    }

                    if pos < samples.len() {
                        pos += 1;
                    }
                }

                position.store(pos, Ordering::Relaxed);
            },
            |err| {
                tracing::error!(error = %err, "audio playback error");
            },
            None,
        )
        .map_err(|e| Error::Playback(e.to_string()))
}

/// Decode MP3 bytes to mono f32 samples and their sample rate
fn decode_mp3(mp3_data: &[u8]) -> Result<(Vec<f32>, u32)> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = 0;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                sample_rate = u32::try_from(frame.sample_rate).unwrap_or(0);

                if frame.channels == 2 {
                    // Stereo: average channels
                    samples.extend(frame.data.chunks(2).map(|chunk| {
                        let left = f32::from(chunk[0]) / 32768.0;
                        let right = f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                        f32::midpoint(left, right)
                    }));
                } else {
                    samples.extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
                }
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Playback(format!("MP3 decode error: {e}"))),
        }
    }

    if samples.is_empty() {
        return Ok((samples, 0));
    }
    if sample_rate == 0 {
        return Err(Error::Playback("MP3 stream has no sample rate".to_string()));
    }

    Ok((samples, sample_rate))
}
