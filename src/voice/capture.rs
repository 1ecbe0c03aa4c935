//! Audio capture from microphone

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};

use super::utterance::{EndpointConfig, UtteranceRecorder};
use crate::{Error, Result};

/// Sample rate for audio capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// Samples handed out per frame (100ms at 16kHz)
pub const FRAME_SAMPLES: usize = 1600;

/// How long to sleep while waiting for the capture callback to fill a frame
const FRAME_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Longest wait for one frame before the input device is treated as dead
pub const FRAME_TIMEOUT: Duration = Duration::from_secs(2);

/// Source of microphone audio for the wake gate
#[async_trait(?Send)]
pub trait Microphone {
    /// Block until the next frame of audio is available
    ///
    /// # Errors
    ///
    /// Returns error if the capture device fails
    async fn read_frame(&mut self) -> Result<Vec<f32>>;

    /// Capture one bounded utterance
    ///
    /// # Errors
    ///
    /// Returns error if the device fails or no speech is heard before the
    /// capture limit
    async fn listen(&mut self) -> Result<Vec<f32>>;

    /// Discard audio captured so far (e.g. the assistant's own voice)
    fn clear(&mut self);

    /// Sample rate of the returned audio
    fn sample_rate(&self) -> u32;
}

/// Captures audio from the default input device
pub struct AudioCapture {
    device: Device,
    config: StreamConfig,
    buffer: Arc<Mutex<Vec<f32>>>,
    stream: Option<Stream>,
    failed: Arc<AtomicBool>,
}

impl AudioCapture {
    /// Create a new audio capture instance
    ///
    /// # Errors
    ///
    /// Returns error if audio device cannot be opened
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

        let supported_config = device
            .supported_input_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
            })
            .ok_or_else(|| Error::Audio("no suitable audio config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = SAMPLE_RATE,
            channels = config.channels,
            "audio capture initialized"
        );

        Ok(Self {
            device,
            config,
            buffer: Arc::new(Mutex::new(Vec::new())),
            stream: None,
            failed: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Start capturing audio
    ///
    /// # Errors
    ///
    /// Returns error if capture fails
    pub fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let buffer = Arc::clone(&self.buffer);
        let failed = Arc::clone(&self.failed);
        self.failed.store(false, Ordering::Relaxed);

        let stream = self
            .device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = buffer.lock() {
                        buf.extend_from_slice(data);
                    }
                },
                move |err| {
                    tracing::error!(error = %err, "audio capture error");
                    failed.store(true, Ordering::Relaxed);
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        self.stream = Some(stream);

        tracing::debug!("audio capture started");
        Ok(())
    }

    /// Stop capturing audio
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!("audio capture stopped");
        }
    }

    /// Take up to `count` samples from the front of the buffer
    ///
    /// Returns `None` until at least `count` samples have been captured
    #[must_use]
    pub fn take_samples(&self, count: usize) -> Option<Vec<f32>> {
        let mut buf = self.buffer.lock().ok()?;
        if buf.len() < count {
            return None;
        }
        Some(buf.drain(..count).collect())
    }

    /// Clear the audio buffer
    pub fn clear_buffer(&self) {
        if let Ok(mut buf) = self.buffer.lock() {
            buf.clear();
        }
    }

    /// Check if the stream is running and has not reported an error
    #[must_use]
    pub fn is_capturing(&self) -> bool {
        self.stream.is_some() && !self.failed.load(Ordering::Relaxed)
    }

    /// Get the sample rate
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }
}

/// [`Microphone`] backed by the default cpal input device
pub struct CpalMicrophone {
    capture: AudioCapture,
    endpoint: EndpointConfig,
}

impl CpalMicrophone {
    /// Open the default input device and start capturing
    ///
    /// # Errors
    ///
    /// Returns error if the device cannot be opened or started
    pub fn open(endpoint: EndpointConfig) -> Result<Self> {
        let mut capture = AudioCapture::new()?;
        capture.start()?;
        Ok(Self { capture, endpoint })
    }
}

#[async_trait(?Send)]
impl Microphone for CpalMicrophone {
    async fn read_frame(&mut self) -> Result<Vec<f32>> {
        if !self.capture.is_capturing() {
            return Err(Error::Audio("capture stream is not running or has failed".to_string()));
        }

        let capture = &self.capture;
        next_frame(|| capture.take_samples(FRAME_SAMPLES), FRAME_TIMEOUT).await
    }

    async fn listen(&mut self) -> Result<Vec<f32>> {
        let mut recorder = UtteranceRecorder::new(self.endpoint, SAMPLE_RATE);

        loop {
            let frame = self.read_frame().await?;
            if recorder.push(&frame) {
                break;
            }
        }

        recorder.finish()
    }

    fn clear(&mut self) {
        self.capture.clear_buffer();
    }

    fn sample_rate(&self) -> u32 {
        self.capture.sample_rate()
    }
}

impl Drop for CpalMicrophone {
    fn drop(&mut self) {
        self.capture.stop();
    }
}

/// Poll `take` until it yields a frame or `deadline` passes
async fn next_frame(
    mut take: impl FnMut() -> Option<Vec<f32>>,
    deadline: Duration,
) -> Result<Vec<f32>> {
    let wait = async {
        loop {
            if let Some(frame) = take() {
                return frame;
            }
            tokio::time::sleep(FRAME_POLL_INTERVAL).await;
        }
    };

    tokio::time::timeout(deadline, wait).await.map_err(|_| {
        Error::Audio(format!(
            "no audio from input device for {}ms",
            deadline.as_millis()
        ))
    })
}

/// Convert f32 samples to WAV bytes for STT APIs
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            // Convert f32 [-1.0, 1.0] to i16
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}
