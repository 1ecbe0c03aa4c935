//! Local wake word detection
//!
//! Detectors only ever see audio frames in-process; nothing is sent to a
//! remote service until the gate has been woken.

use super::utterance::{DEFAULT_ENERGY_THRESHOLD, rms_energy};
use crate::Result;

/// Minimum duration of speech to trigger (in samples at 16kHz)
const MIN_SPEECH_SAMPLES: usize = 4800; // 0.3 seconds

/// Silence duration to consider end of a speech burst (in samples)
const SILENCE_SAMPLES: usize = 8000; // 0.5 seconds

/// Decides from local audio whether the user has woken the assistant
pub trait WakeWordDetector {
    /// Feed one frame; returns true when the wake word is detected
    ///
    /// # Errors
    ///
    /// Returns error if the detector fails
    fn poll(&mut self, frame: &[f32]) -> Result<bool>;

    /// Forget partially heard audio
    fn reset(&mut self) {}
}

/// State of the energy detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    /// Waiting for speech
    Idle,
    /// Detected potential speech, accumulating
    Listening,
}

/// Wakes on any complete speech burst
///
/// A speech-activity trigger with no phrase matching, for when no wake word
/// model is configured. A burst is at least 0.3s of speech followed by 0.5s
/// of silence.
pub struct EnergyWakeDetector {
    threshold: f32,
    state: DetectorState,
    speech_samples: usize,
    silence_counter: usize,
}

impl Default for EnergyWakeDetector {
    fn default() -> Self {
        Self::new(DEFAULT_ENERGY_THRESHOLD)
    }
}

impl EnergyWakeDetector {
    /// Create a detector with the given RMS speech threshold
    #[must_use]
    pub fn new(threshold: f32) -> Self {
        tracing::debug!(threshold, "energy wake detector initialized");
        Self {
            threshold,
            state: DetectorState::Idle,
            speech_samples: 0,
            silence_counter: 0,
        }
    }

    /// Get current state
    #[must_use]
    pub const fn state(&self) -> DetectorState {
        self.state
    }
}

impl WakeWordDetector for EnergyWakeDetector {
    fn poll(&mut self, frame: &[f32]) -> Result<bool> {
        let energy = rms_energy(frame);
        let is_speech = energy > self.threshold;

        match self.state {
            DetectorState::Idle => {
                if is_speech {
                    self.state = DetectorState::Listening;
                    self.speech_samples = frame.len();
                    self.silence_counter = 0;
                    tracing::trace!(energy, "speech detected, listening");
                }
            }
            DetectorState::Listening => {
                if is_speech {
                    self.speech_samples += frame.len();
                    self.silence_counter = 0;
                } else {
                    self.silence_counter += frame.len();
                }

                if self.silence_counter > SILENCE_SAMPLES
                    && self.speech_samples > MIN_SPEECH_SAMPLES
                {
                    tracing::debug!(samples = self.speech_samples, "speech burst complete");
                    self.reset();
                    return Ok(true);
                }

                // Too much silence without enough speech
                if self.silence_counter > SILENCE_SAMPLES {
                    tracing::trace!("timeout - resetting");
                    self.reset();
                }
            }
        }

        Ok(false)
    }

    fn reset(&mut self) {
        self.state = DetectorState::Idle;
        self.speech_samples = 0;
        self.silence_counter = 0;
    }
}

#[cfg(feature = "wake-word")]
mod model {
    use rustpotter::{Rustpotter, RustpotterConfig, SampleFormat};

    use super::WakeWordDetector;
    use crate::{Error, Result};

    /// Default detection score threshold
    pub const DEFAULT_MODEL_THRESHOLD: f32 = 0.4;

    /// Wake word detector backed by a rustpotter model file
    pub struct RustpotterWakeDetector {
        detector: Rustpotter,
        pending: Vec<f32>,
    }

    impl RustpotterWakeDetector {
        /// Load a `.rpw` wake word model
        ///
        /// # Errors
        ///
        /// Returns error if the detector or model cannot be loaded
        pub fn new(model_path: &str, sample_rate: u32, threshold: f32) -> Result<Self> {
            let mut config = RustpotterConfig::default();
            config.fmt.sample_rate = sample_rate as usize;
            config.fmt.channels = 1;
            config.fmt.sample_format = SampleFormat::F32;
            config.detector.threshold = threshold;

            let mut detector =
                Rustpotter::new(&config).map_err(|e| Error::WakeWord(e.to_string()))?;
            detector
                .add_wakeword_from_file("iris", model_path)
                .map_err(|e| Error::WakeWord(format!("failed to load {model_path}: {e}")))?;

            tracing::info!(model_path, threshold, "wake word model loaded");
            Ok(Self {
                detector,
                pending: Vec::new(),
            })
        }
    }

    impl WakeWordDetector for RustpotterWakeDetector {
        fn poll(&mut self, frame: &[f32]) -> Result<bool> {
            self.pending.extend_from_slice(frame);
            let frame_len = self.detector.get_samples_per_frame();

            let mut detected = false;
            while self.pending.len() >= frame_len {
                let chunk: Vec<f32> = self.pending.drain(..frame_len).collect();
                if let Some(detection) = self.detector.process_f32(&chunk) {
                    tracing::info!(score = detection.score, "wake word detected");
                    detected = true;
                }
            }

            if detected {
                self.pending.clear();
            }
            Ok(detected)
        }

        fn reset(&mut self) {
            self.pending.clear();
        }
    }
}

#[cfg(feature = "wake-word")]
pub use model::{DEFAULT_MODEL_THRESHOLD, RustpotterWakeDetector};
