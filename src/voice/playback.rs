//! Audio playback to speakers

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};

use crate::{Error, Result};

/// Sample rate for playback (matches common TTS output)
pub const PLAYBACK_SAMPLE_RATE: u32 = 24000;

/// Plays audio to the default output device
///
/// Foreground playback blocks until the samples have been played. A single
/// background loop (the "working" sound) can run alongside and is stopped
/// explicitly.
pub struct AudioPlayback {
    device: Device,
    config: StreamConfig,
    background: Option<Stream>,
}

impl AudioPlayback {
    /// Create a new audio playback instance
    ///
    /// # Errors
    ///
    /// Returns error if audio device cannot be opened
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        let supported_config = device
            .supported_output_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
            })
            .or_else(|| {
                // Fallback: try stereo
                device.supported_output_configs().ok()?.find(|c| {
                    c.channels() == 2
                        && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                        && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
                })
            })
            .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(PLAYBACK_SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = PLAYBACK_SAMPLE_RATE,
            channels = config.channels,
            "audio playback initialized"
        );

        Ok(Self {
            device,
            config,
            background: None,
        })
    }

    /// Play MP3 bytes to completion
    ///
    /// # Errors
    ///
    /// Returns error if decoding or playback fails
    pub fn play_mp3(&mut self, mp3_data: &[u8]) -> Result<()> {
        let (samples, sample_rate) = decode_mp3(mp3_data)?;
        let samples = resample(&samples, sample_rate, PLAYBACK_SAMPLE_RATE)?;
        self.play_blocking(samples)
    }

    /// Play samples at [`PLAYBACK_SAMPLE_RATE`] to completion
    ///
    /// # Errors
    ///
    /// Returns error if playback fails
    pub fn play_blocking(&mut self, samples: Vec<f32>) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let sample_count = samples.len();
        let finished = Arc::new(AtomicBool::new(false));
        let stream = self.build_stream(samples, false, Arc::clone(&finished))?;
        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        let duration_ms = (sample_count as u64 * 1000) / u64::from(PLAYBACK_SAMPLE_RATE);

        // Poll for completion with timeout
        let start = Instant::now();
        let timeout = Duration::from_millis(duration_ms + 500);

        while !finished.load(Ordering::Acquire) {
            if start.elapsed() > timeout {
                break;
            }
            std::thread::sleep(Duration::from_millis(50));
        }

        // Small delay to ensure audio finishes
        std::thread::sleep(Duration::from_millis(100));

        drop(stream);
        tracing::debug!(samples = sample_count, "playback complete");

        Ok(())
    }

    /// Loop samples in the background until [`Self::stop_background`]
    ///
    /// Replaces any loop already running.
    ///
    /// # Errors
    ///
    /// Returns error if the output stream cannot be started
    pub fn start_loop(&mut self, samples: Vec<f32>) -> Result<()> {
        self.stop_background();
        if samples.is_empty() {
            return Ok(());
        }

        let stream = self.build_stream(samples, true, Arc::new(AtomicBool::new(false)))?;
        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        self.background = Some(stream);

        tracing::trace!("background loop started");
        Ok(())
    }

    /// Stop the background loop, if any
    pub fn stop_background(&mut self) {
        if let Some(stream) = self.background.take() {
            drop(stream);
            tracing::trace!("background loop stopped");
        }
    }

    /// Whether a background loop is playing
    #[must_use]
    pub const fn is_looping(&self) -> bool {
        self.background.is_some()
    }

    fn build_stream(
        &self,
        samples: Vec<f32>,
        looping: bool,
        finished: Arc<AtomicBool>,
    ) -> Result<Stream> {
        let channels = self.config.channels as usize;
        let samples = Arc::new(samples);
        let position = Arc::new(AtomicUsize::new(0));

        self.device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut pos = position.load(Ordering::Relaxed);

                    for frame in data.chunks_mut(channels) {
                        if looping && pos >= samples.len() {
                            pos = 0;
                        }

                        let sample = if let Some(&s) = samples.get(pos) {
                            pos += 1;
                            s
                        } else {
                            finished.store(true, Ordering::Release);
                            0.0
                        };

                        for out in frame.iter_mut() {
                            *out = sample;
                        }
                    }

                    position.store(pos, Ordering::Relaxed);
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))
    }
}

/// Decode MP3 bytes to mono f32 samples and their sample rate
///
/// # Errors
///
/// Returns error if the data is not valid MP3
pub fn decode_mp3(mp3_data: &[u8]) -> Result<(Vec<f32>, u32)> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = PLAYBACK_SAMPLE_RATE;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                #[allow(clippy::cast_sign_loss)]
                let frame_rate = frame.sample_rate as u32;
                sample_rate = frame_rate;

                // Convert i16 samples to f32 and handle stereo to mono
                if frame.channels == 2 {
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
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    Ok((samples, sample_rate))
}

/// Resample mono audio using rubato
///
/// # Errors
///
/// Returns error if the resampler cannot be built or fails
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    use rubato::{FftFixedIn, Resampler};

    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let mut resampler =
        FftFixedIn::<f64>::new(from_rate as usize, to_rate as usize, 1024, 2, 1)
            .map_err(|e| Error::Audio(format!("resampler init failed: {e}")))?;

    // The resampler may round the requested chunk size
    let chunk_size = resampler.input_frames_next();

    let input: Vec<f64> = samples.iter().map(|&s| f64::from(s)).collect();
    let mut output = Vec::new();

    for chunk in input.chunks(chunk_size) {
        // Zero-pad the tail so no audio is dropped
        let mut block = chunk.to_vec();
        block.resize(chunk_size, 0.0);

        let result = resampler
            .process(&[block], None)
            .map_err(|e| Error::Audio(format!("resample failed: {e}")))?;
        output.extend_from_slice(&result[0]);
    }

    let expected = (samples.len() as f64 * f64::from(to_rate) / f64::from(from_rate)) as usize;
    output.truncate(expected);

    Ok(output.iter().map(|&s| s as f32).collect())
}
