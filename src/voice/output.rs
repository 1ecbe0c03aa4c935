//! Speaker output: cues, the background working loop, and synthesized speech

use async_trait::async_trait;

use super::cues::{Cue, CueSet};
use super::playback::AudioPlayback;
use crate::Result;

/// Everything the assistant plays through the speakers
#[async_trait(?Send)]
pub trait AudioOutput {
    /// Play a cue to completion
    ///
    /// # Errors
    ///
    /// Returns error if playback fails
    async fn play_cue(&mut self, cue: Cue) -> Result<()>;

    /// Start looping the working cue in the background
    ///
    /// # Errors
    ///
    /// Returns error if the background stream cannot start
    fn start_working(&mut self) -> Result<()>;

    /// Stop any background sound
    fn stop(&mut self);

    /// Play synthesized MP3 speech to completion
    ///
    /// # Errors
    ///
    /// Returns error if decoding or playback fails
    async fn play_speech(&mut self, mp3: &[u8]) -> Result<()>;
}

/// [`AudioOutput`] on the default output device
pub struct Speakers {
    playback: AudioPlayback,
    cues: CueSet,
}

impl Speakers {
    /// Open the default output device
    ///
    /// # Errors
    ///
    /// Returns error if the device cannot be opened
    pub fn open(cues: CueSet) -> Result<Self> {
        Ok(Self {
            playback: AudioPlayback::new()?,
            cues,
        })
    }
}

#[async_trait(?Send)]
impl AudioOutput for Speakers {
    async fn play_cue(&mut self, cue: Cue) -> Result<()> {
        tracing::trace!(?cue, "playing cue");
        self.playback.play_blocking(self.cues.get(cue).to_vec())
    }

    fn start_working(&mut self) -> Result<()> {
        self.playback.start_loop(self.cues.get(Cue::Working).to_vec())
    }

    fn stop(&mut self) {
        self.playback.stop_background();
    }

    async fn play_speech(&mut self, mp3: &[u8]) -> Result<()> {
        self.playback.stop_background();
        self.playback.play_mp3(mp3)
    }
}
