//! Wake gate: local wake word, then one remotely transcribed utterance
//!
//! Until the wake word fires, audio only ever reaches the local detector.
//! Capture or transcription failures never escape the gate; they come back
//! as [`GateOutcome::Missed`] so the caller can listen again without asking
//! for the wake word a second time.

use std::future::Future;
use std::io::Write;
use std::time::Duration;

use super::capture::{FRAME_TIMEOUT, Microphone};
use super::cues::Cue;
use super::output::AudioOutput;
use super::stt::Transcriber;
use super::wake_word::WakeWordDetector;
use super::utterance::DEFAULT_MAX_UTTERANCE_SECS;
use crate::{Error, Result};

/// Utterance that shuts the assistant down
pub const EXIT_KEYWORD: &str = "exit";

/// Longest wait for one wake-phase frame from the microphone
pub const DEFAULT_FRAME_TIMEOUT: Duration = FRAME_TIMEOUT.saturating_mul(2);

/// Slack on top of the utterance limit before `listen` is abandoned
pub const LISTEN_GRACE: Duration = Duration::from_secs(5);

/// Result of one pass through the gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// The user said something
    Heard(String),
    /// Capture or transcription failed; listen again
    Missed,
    /// The user asked to exit
    Exit,
}

/// Two-phase gate in front of the transcription service
pub struct WakeGate {
    microphone: Box<dyn Microphone>,
    detector: Box<dyn WakeWordDetector>,
    transcriber: Box<dyn Transcriber>,
    frame_timeout: Duration,
    listen_timeout: Duration,
    lenient_exit: bool,
}

impl WakeGate {
    /// Create a gate over the given collaborators
    #[must_use]
    pub fn new(
        microphone: Box<dyn Microphone>,
        detector: Box<dyn WakeWordDetector>,
        transcriber: Box<dyn Transcriber>,
    ) -> Self {
        Self {
            microphone,
            detector,
            transcriber,
            frame_timeout: DEFAULT_FRAME_TIMEOUT,
            listen_timeout: Duration::from_secs_f32(DEFAULT_MAX_UTTERANCE_SECS) + LISTEN_GRACE,
            lenient_exit: false,
        }
    }

    /// Bound the wait for one wake-phase frame and for one utterance
    ///
    /// A microphone that stops delivering audio turns into a
    /// [`GateOutcome::Missed`] once the bound passes.
    #[must_use]
    pub fn with_timeouts(mut self, frame: Duration, listen: Duration) -> Self {
        self.frame_timeout = frame;
        self.listen_timeout = listen;
        self
    }

    /// Also accept "Exit.", " EXIT! " and similar as the exit keyword
    #[must_use]
    pub fn with_lenient_exit(mut self, lenient: bool) -> Self {
        self.lenient_exit = lenient;
        self
    }

    /// Wait for (optionally) the wake word and one utterance
    ///
    /// With `require_wakeword` the detector is polled until it fires, with
    /// no upper bound.
    pub async fn await_utterance(
        &mut self,
        require_wakeword: bool,
        audio: &mut dyn AudioOutput,
    ) -> GateOutcome {
        console(format_args!("You: "));

        match self.capture(require_wakeword, audio).await {
            Ok(text) if text.trim().is_empty() => {
                audio.stop();
                println!();
                tracing::debug!("empty transcript");
                GateOutcome::Missed
            }
            Ok(text) => {
                println!("{text}");
                let exit = if self.lenient_exit {
                    is_loose_exit_utterance(&text)
                } else {
                    is_exit_utterance(&text)
                };
                if exit {
                    GateOutcome::Exit
                } else {
                    GateOutcome::Heard(text)
                }
            }
            Err(e) => {
                audio.stop();
                println!();
                tracing::warn!(error = %e, "capture failed, listening again");
                GateOutcome::Missed
            }
        }
    }

    async fn capture(
        &mut self,
        require_wakeword: bool,
        audio: &mut dyn AudioOutput,
    ) -> Result<String> {
        audio.play_cue(Cue::Ready).await?;

        if require_wakeword {
            let polls = self.wait_for_wake_word().await?;
            tracing::debug!(polls, "woken");
        }

        audio.play_cue(Cue::Listening).await?;
        // Drop anything recorded while the cue was playing
        self.microphone.clear();

        console(format_args!("(listening...) "));
        let samples = deadline(self.listen_timeout, "utterance", self.microphone.listen()).await?;
        console(format_args!("(heard...) "));
        audio.play_cue(Cue::Captured).await?;

        audio.start_working()?;
        let sample_rate = self.microphone.sample_rate();
        self.transcriber.transcribe(&samples, sample_rate).await
    }

    async fn wait_for_wake_word(&mut self) -> Result<u64> {
        self.detector.reset();
        self.microphone.clear();

        let mut polls = 0_u64;
        loop {
            let frame = deadline(self.frame_timeout, "frame", self.microphone.read_frame()).await?;
            polls += 1;
            if self.detector.poll(&frame)? {
                return Ok(polls);
            }
        }
    }
}

/// Whether `text` is exactly the exit keyword
#[must_use]
pub fn is_exit_utterance(text: &str) -> bool {
    text == EXIT_KEYWORD
}

/// Whether `text` is the exit keyword once whitespace, trailing sentence
/// punctuation and case are ignored
#[must_use]
pub fn is_loose_exit_utterance(text: &str) -> bool {
    text.trim()
        .trim_end_matches(['.', '!', '?'])
        .eq_ignore_ascii_case(EXIT_KEYWORD)
}

/// Fail with [`Error::Audio`] if the microphone does not answer in time
async fn deadline<T>(
    limit: Duration,
    what: &str,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(limit, fut).await.map_err(|_| {
        Error::Audio(format!(
            "microphone produced no {what} within {}ms",
            limit.as_millis()
        ))
    })?
}

/// Print an unterminated progress marker
fn console(args: std::fmt::Arguments<'_>) {
    let mut stdout = std::io::stdout().lock();
    let _ = stdout.write_fmt(args);
    let _ = stdout.flush();
}
