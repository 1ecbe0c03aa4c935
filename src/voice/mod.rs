//! Voice processing module
//!
//! Handles audio capture, local wake word detection, remote STT/TTS,
//! status cues, and playback. Each external collaborator sits behind a
//! trait so the gate and the interaction loop can run without hardware.

mod capture;
mod cues;
mod gate;
mod output;
mod playback;
mod stt;
mod tts;
mod utterance;
mod wake_word;

pub use capture::{
    AudioCapture, CpalMicrophone, FRAME_SAMPLES, FRAME_TIMEOUT, Microphone, SAMPLE_RATE,
    samples_to_wav,
};
pub use cues::{Cue, CueSet};
pub use gate::{
    DEFAULT_FRAME_TIMEOUT, EXIT_KEYWORD, GateOutcome, LISTEN_GRACE, WakeGate, is_exit_utterance,
    is_loose_exit_utterance,
};
pub use output::{AudioOutput, Speakers};
pub use playback::{AudioPlayback, PLAYBACK_SAMPLE_RATE, decode_mp3, resample};
pub use stt::{SpeechToText, SttProvider, Transcriber};
pub use tts::{Synthesizer, TextToSpeech, TtsProvider, chunk_text};
pub use utterance::{
    DEFAULT_ENERGY_THRESHOLD, DEFAULT_MAX_UTTERANCE_SECS, EndpointConfig, UtteranceRecorder,
    rms_energy,
};
#[cfg(feature = "wake-word")]
pub use wake_word::{DEFAULT_MODEL_THRESHOLD, RustpotterWakeDetector};
pub use wake_word::{DetectorState, EnergyWakeDetector, WakeWordDetector};
