//! Status sound cues
//!
//! Short sounds that tell the user what the assistant is doing without
//! looking at the console. Cues are MP3 files in a configurable directory;
//! any cue without a usable file falls back to a generated tone.

use std::collections::HashMap;
use std::path::Path;

use super::playback::{PLAYBACK_SAMPLE_RATE, decode_mp3, resample};

/// A status sound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cue {
    /// Startup in progress
    Loading,
    /// Busy waiting on a remote service (looped in the background)
    Working,
    /// Ready to listen for the user
    Ready,
    /// Recording has started
    Listening,
    /// Recording has finished
    Captured,
}

impl Cue {
    /// Every cue
    pub const ALL: [Self; 5] = [
        Self::Loading,
        Self::Working,
        Self::Ready,
        Self::Listening,
        Self::Captured,
    ];

    /// File name looked up in the cue directory
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Loading => "loading.mp3",
            Self::Working => "workinglongquiet.mp3",
            Self::Ready | Self::Captured => "chirp.mp3",
            Self::Listening => "bleep.mp3",
        }
    }

    /// (frequency Hz, tone ms, trailing silence ms, amplitude)
    const fn tone(self) -> (f32, u32, u32, f32) {
        match self {
            Self::Loading => (440.0, 400, 0, 0.3),
            Self::Working => (330.0, 120, 880, 0.08),
            Self::Ready => (880.0, 120, 0, 0.3),
            Self::Listening => (660.0, 200, 0, 0.3),
            Self::Captured => (990.0, 80, 0, 0.3),
        }
    }
}

/// Decoded samples for every cue at [`PLAYBACK_SAMPLE_RATE`]
#[derive(Debug, Clone)]
pub struct CueSet {
    samples: HashMap<Cue, Vec<f32>>,
}

impl CueSet {
    /// Generated tones for every cue
    #[must_use]
    pub fn tones() -> Self {
        let samples = Cue::ALL.iter().map(|&cue| (cue, generate_tone(cue))).collect();
        Self { samples }
    }

    /// Load cue files from `dir`, falling back to tones per cue
    #[must_use]
    pub fn load(dir: Option<&Path>) -> Self {
        let Some(dir) = dir else {
            tracing::debug!("no cue directory configured, using generated tones");
            return Self::tones();
        };

        let samples = Cue::ALL
            .iter()
            .map(|&cue| {
                let samples = load_cue_file(&dir.join(cue.file_name())).unwrap_or_else(|| {
                    tracing::debug!(?cue, "using generated tone");
                    generate_tone(cue)
                });
                (cue, samples)
            })
            .collect();

        Self { samples }
    }

    /// Samples for `cue`
    #[must_use]
    pub fn get(&self, cue: Cue) -> &[f32] {
        self.samples.get(&cue).map(Vec::as_slice).unwrap_or_default()
    }
}

fn load_cue_file(path: &Path) -> Option<Vec<f32>> {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "cue file not readable");
            return None;
        }
    };

    let decoded = decode_mp3(&data)
        .and_then(|(samples, rate)| resample(&samples, rate, PLAYBACK_SAMPLE_RATE));
    match decoded {
        Ok(samples) if !samples.is_empty() => {
            tracing::debug!(path = %path.display(), samples = samples.len(), "loaded cue");
            Some(samples)
        }
        Ok(_) => {
            tracing::warn!(path = %path.display(), "cue file has no audio");
            None
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to decode cue");
            None
        }
    }
}

/// Sine tone with short fades so it doesn't click
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn generate_tone(cue: Cue) -> Vec<f32> {
    let (frequency, tone_ms, silence_ms, amplitude) = cue.tone();
    let rate = PLAYBACK_SAMPLE_RATE as f32;
    let tone_len = (rate * tone_ms as f32 / 1000.0) as usize;
    let silence_len = (rate * silence_ms as f32 / 1000.0) as usize;
    let fade = (tone_len / 10).max(1);

    let mut samples: Vec<f32> = (0..tone_len)
        .map(|i| {
            let t = i as f32 / rate;
            let envelope = (i.min(tone_len - i) as f32 / fade as f32).min(1.0);
            (2.0 * std::f32::consts::PI * frequency * t).sin() * amplitude * envelope
        })
        .collect();
    samples.resize(tone_len + silence_len, 0.0);
    samples
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_cue_has_a_tone() {
        let cues = CueSet::tones();
        for cue in Cue::ALL {
            assert!(!cues.get(cue).is_empty(), "{cue:?} is silent");
            assert!(cues.get(cue).iter().all(|s| s.abs() <= 1.0));
        }
    }

    #[test]
    fn test_working_tone_has_gap_for_looping() {
        let samples = generate_tone(Cue::Working);
        // 120ms tone + 880ms silence at 24kHz
        assert_eq!(samples.len(), 24000);
        assert!(samples[23999].abs() < f32::EPSILON);
    }

    #[test]
    fn test_missing_directory_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let cues = CueSet::load(Some(dir.path().join("nope").as_path()));
        assert_eq!(cues.get(Cue::Ready), CueSet::tones().get(Cue::Ready));
    }

    #[test]
    fn test_unreadable_cue_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bleep.mp3"), b"not audio").unwrap();

        let cues = CueSet::load(Some(dir.path()));
        assert_eq!(cues.get(Cue::Listening), generate_tone(Cue::Listening).as_slice());
    }

    #[test]
    fn test_ready_and_captured_share_file() {
        assert_eq!(Cue::Ready.file_name(), Cue::Captured.file_name());
    }
}
