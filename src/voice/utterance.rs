//! Energy-based utterance endpointing
//!
//! Decides when a spoken utterance has started and finished from raw frame
//! energy. Used by the microphone to bound a single `listen` call and by the
//! energy wake detector to spot speech bursts.

use crate::{Error, Result};

/// Default RMS energy above which a frame counts as speech
pub const DEFAULT_ENERGY_THRESHOLD: f32 = 0.03;

/// Minimum speech before an utterance may end (0.3s at 16kHz)
const MIN_SPEECH_SECS: f32 = 0.3;

/// Silence that ends an utterance (0.5s at 16kHz)
const TRAILING_SILENCE_SECS: f32 = 0.5;

/// Default upper bound on one utterance
pub const DEFAULT_MAX_UTTERANCE_SECS: f32 = 15.0;

/// Endpointing thresholds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EndpointConfig {
    /// RMS energy above which a frame counts as speech
    pub energy_threshold: f32,

    /// Capture stops after this many seconds regardless of speech
    pub max_utterance_secs: f32,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            energy_threshold: DEFAULT_ENERGY_THRESHOLD,
            max_utterance_secs: DEFAULT_MAX_UTTERANCE_SECS,
        }
    }
}

/// Accumulates frames until speech followed by silence is seen
pub struct UtteranceRecorder {
    config: EndpointConfig,
    samples: Vec<f32>,
    speech_started: bool,
    speech_samples: usize,
    silence_samples: usize,
    total_samples: usize,
    min_speech: usize,
    trailing_silence: usize,
    max_samples: usize,
}

impl UtteranceRecorder {
    /// Create a recorder for audio at `sample_rate`
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn new(config: EndpointConfig, sample_rate: u32) -> Self {
        let rate = sample_rate as f32;
        Self {
            config,
            samples: Vec::new(),
            speech_started: false,
            speech_samples: 0,
            silence_samples: 0,
            total_samples: 0,
            min_speech: (rate * MIN_SPEECH_SECS) as usize,
            trailing_silence: (rate * TRAILING_SILENCE_SECS) as usize,
            max_samples: (rate * config.max_utterance_secs.max(0.0)) as usize,
        }
    }

    /// Feed one frame; returns true once capture should stop
    pub fn push(&mut self, frame: &[f32]) -> bool {
        let is_speech = rms_energy(frame) > self.config.energy_threshold;
        self.total_samples += frame.len();

        if is_speech {
            if !self.speech_started {
                tracing::trace!("speech onset");
            }
            self.speech_started = true;
            self.speech_samples += frame.len();
            self.silence_samples = 0;
        } else if self.speech_started {
            self.silence_samples += frame.len();
        }

        // Leading silence is not kept
        if self.speech_started {
            self.samples.extend_from_slice(frame);
        }

        // Leading silence counts toward the cap too
        self.is_complete() || self.total_samples >= self.max_samples
    }

    fn is_complete(&self) -> bool {
        self.speech_samples > self.min_speech && self.silence_samples > self.trailing_silence
    }

    /// Whether any speech has been heard
    #[must_use]
    pub const fn heard_speech(&self) -> bool {
        self.speech_started
    }

    /// Finish capture and return the utterance
    ///
    /// # Errors
    ///
    /// Returns error if no speech was heard
    pub fn finish(self) -> Result<Vec<f32>> {
        if self.speech_samples == 0 {
            return Err(Error::Audio("no speech detected".to_string()));
        }
        tracing::debug!(samples = self.samples.len(), "utterance captured");
        Ok(self.samples)
    }
}

/// Calculate RMS energy of audio samples
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn rms_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}
