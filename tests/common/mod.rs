//! Shared test utilities
//!
//! Stub collaborators for the wake gate and the assistant. Every stub
//! records what it was asked to do in a shared [`Tally`].

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use async_trait::async_trait;

use iris_assistant::completion::Completer;
use iris_assistant::config::AssistantConfig;
use iris_assistant::conversation::{DEFAULT_CAPACITY, PromptTemplate, Session};
use iris_assistant::voice::{
    AudioOutput, Cue, FRAME_SAMPLES, Microphone, SAMPLE_RATE, Synthesizer, Transcriber, WakeGate,
    WakeWordDetector,
};
use iris_assistant::{Assistant, Error, Result};

/// Something played through the stub speakers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioEvent {
    Cue(Cue),
    Working,
    Stop,
    Speech(String),
}

/// Shared record of everything the stubs saw
#[derive(Clone, Default)]
pub struct Tally {
    pub polls: Rc<Cell<u64>>,
    pub listens: Rc<Cell<u32>>,
    pub transcriptions: Rc<Cell<u32>>,
    pub prompts: Rc<RefCell<Vec<String>>>,
    pub spoken: Rc<RefCell<Vec<String>>>,
    pub audio: Rc<RefCell<Vec<AudioEvent>>>,
}

impl Tally {
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.borrow().clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }

    pub fn audio(&self) -> Vec<AudioEvent> {
        self.audio.borrow().clone()
    }
}

/// Microphone producing silent frames and a fixed utterance
///
/// The first `failing_listens` calls to `listen` fail.
pub struct StubMicrophone {
    tally: Tally,
    failing_listens: u32,
}

impl StubMicrophone {
    pub fn new(tally: &Tally) -> Self {
        Self {
            tally: tally.clone(),
            failing_listens: 0,
        }
    }

    pub fn failing(tally: &Tally, failing_listens: u32) -> Self {
        Self {
            tally: tally.clone(),
            failing_listens,
        }
    }
}

#[async_trait(?Send)]
impl Microphone for StubMicrophone {
    async fn read_frame(&mut self) -> Result<Vec<f32>> {
        Ok(vec![0.0; FRAME_SAMPLES])
    }

    async fn listen(&mut self) -> Result<Vec<f32>> {
        let n = self.tally.listens.get() + 1;
        self.tally.listens.set(n);
        if n <= self.failing_listens {
            return Err(Error::Audio("no speech detected".to_string()));
        }
        Ok(vec![0.1; FRAME_SAMPLES * 5])
    }

    fn clear(&mut self) {}

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }
}

/// Microphone whose device stopped delivering audio
///
/// With `frames_flow` the wake phase still gets silent frames and only
/// `listen` never returns.
pub struct StalledMicrophone {
    tally: Tally,
    frames_flow: bool,
}

impl StalledMicrophone {
    pub fn new(tally: &Tally) -> Self {
        Self {
            tally: tally.clone(),
            frames_flow: false,
        }
    }

    pub fn mid_utterance(tally: &Tally) -> Self {
        Self {
            tally: tally.clone(),
            frames_flow: true,
        }
    }
}

#[async_trait(?Send)]
impl Microphone for StalledMicrophone {
    async fn read_frame(&mut self) -> Result<Vec<f32>> {
        if self.frames_flow {
            return Ok(vec![0.0; FRAME_SAMPLES]);
        }
        std::future::pending().await
    }

    async fn listen(&mut self) -> Result<Vec<f32>> {
        self.tally.listens.set(self.tally.listens.get() + 1);
        std::future::pending().await
    }

    fn clear(&mut self) {}

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }
}

/// Detector that fires on every `fire_after`-th poll since the last reset
pub struct CountingDetector {
    tally: Tally,
    fire_after: u64,
    since_reset: u64,
}

impl CountingDetector {
    pub fn new(tally: &Tally, fire_after: u64) -> Self {
        Self {
            tally: tally.clone(),
            fire_after,
            since_reset: 0,
        }
    }
}

impl WakeWordDetector for CountingDetector {
    fn poll(&mut self, _frame: &[f32]) -> Result<bool> {
        self.tally.polls.set(self.tally.polls.get() + 1);
        self.since_reset += 1;
        Ok(self.since_reset >= self.fire_after)
    }

    fn reset(&mut self) {
        self.since_reset = 0;
    }
}

/// Transcriber returning scripted results, then "exit" forever
pub struct ScriptedTranscriber {
    tally: Tally,
    script: RefCell<VecDeque<Result<String>>>,
}

impl ScriptedTranscriber {
    pub fn new(tally: &Tally, script: Vec<Result<String>>) -> Self {
        Self {
            tally: tally.clone(),
            script: RefCell::new(script.into()),
        }
    }
}

#[async_trait(?Send)]
impl Transcriber for ScriptedTranscriber {
    async fn transcribe(&self, samples: &[f32], sample_rate: u32) -> Result<String> {
        assert!(!samples.is_empty());
        assert_eq!(sample_rate, SAMPLE_RATE);

        self.tally
            .transcriptions
            .set(self.tally.transcriptions.get() + 1);
        self.script
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Ok("exit".to_string()))
    }
}

/// Completer returning scripted replies, then "Okay." forever
pub struct ScriptedCompleter {
    tally: Tally,
    script: RefCell<VecDeque<Result<String>>>,
}

impl ScriptedCompleter {
    pub fn new(tally: &Tally, script: Vec<Result<String>>) -> Self {
        Self {
            tally: tally.clone(),
            script: RefCell::new(script.into()),
        }
    }
}

#[async_trait(?Send)]
impl Completer for ScriptedCompleter {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.tally.prompts.borrow_mut().push(prompt.to_string());
        self.script
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Ok("Okay.".to_string()))
    }
}

/// Synthesizer that "encodes" text as its UTF-8 bytes
pub struct EchoSynthesizer {
    tally: Tally,
}

impl EchoSynthesizer {
    pub fn new(tally: &Tally) -> Self {
        Self {
            tally: tally.clone(),
        }
    }
}

#[async_trait(?Send)]
impl Synthesizer for EchoSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        self.tally.spoken.borrow_mut().push(text.to_string());
        Ok(text.as_bytes().to_vec())
    }
}

/// Speakers that only record what they were asked to play
pub struct RecordingOutput {
    tally: Tally,
}

impl RecordingOutput {
    pub fn new(tally: &Tally) -> Self {
        Self {
            tally: tally.clone(),
        }
    }
}

#[async_trait(?Send)]
impl AudioOutput for RecordingOutput {
    async fn play_cue(&mut self, cue: Cue) -> Result<()> {
        self.tally.audio.borrow_mut().push(AudioEvent::Cue(cue));
        Ok(())
    }

    fn start_working(&mut self) -> Result<()> {
        self.tally.audio.borrow_mut().push(AudioEvent::Working);
        Ok(())
    }

    fn stop(&mut self) {
        self.tally.audio.borrow_mut().push(AudioEvent::Stop);
    }

    async fn play_speech(&mut self, mp3: &[u8]) -> Result<()> {
        let text = String::from_utf8_lossy(mp3).into_owned();
        self.tally.audio.borrow_mut().push(AudioEvent::Speech(text));
        Ok(())
    }
}

/// Gate over stubs; the detector fires after `wake_after` polls
pub fn gate(
    tally: &Tally,
    microphone: impl Microphone + 'static,
    wake_after: u64,
    transcripts: Vec<Result<String>>,
) -> WakeGate {
    WakeGate::new(
        Box::new(microphone),
        Box::new(CountingDetector::new(tally, wake_after)),
        Box::new(ScriptedTranscriber::new(tally, transcripts)),
    )
}

/// Assistant over stubs with a seeded default session
pub fn assistant(
    tally: &Tally,
    microphone: StubMicrophone,
    transcripts: Vec<Result<String>>,
    replies: Vec<Result<String>>,
) -> Assistant {
    let session = Session::new(DEFAULT_CAPACITY, PromptTemplate::default())
        .expect("default session");

    Assistant::new(
        session,
        gate(tally, microphone, 2, transcripts),
        Box::new(ScriptedCompleter::new(tally, replies)),
        Box::new(EchoSynthesizer::new(tally)),
        Box::new(RecordingOutput::new(tally)),
        AssistantConfig::default(),
    )
}

/// Shorthand for a scripted success
pub fn ok(text: &str) -> Result<String> {
    Ok(text.to_string())
}
