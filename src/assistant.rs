//! Assistant - the voice conversation loop
//!
//! Owns every collaborator and runs wake → transcribe → complete → speak
//! cycles until the user says "exit".

use std::future::Future;
use std::time::Duration;

use secrecy::ExposeSecret;

use crate::completion::{Completer, CompletionClient};
use crate::config::{AssistantConfig, Config};
use crate::conversation::{ConversationTurn, Session};
use crate::voice::{
    AudioOutput, CpalMicrophone, Cue, CueSet, DEFAULT_FRAME_TIMEOUT, EnergyWakeDetector,
    GateOutcome, LISTEN_GRACE, SAMPLE_RATE, Speakers, SpeechToText, SttProvider, Synthesizer, TextToSpeech, TtsProvider, WakeGate,
    WakeWordDetector,
};
use crate::{Error, Result};

/// How one cycle of the loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The user spoke and the assistant replied
    Completed(ConversationTurn),
    /// The user said "exit"; the farewell has been spoken
    Exit,
}

/// The voice assistant
pub struct Assistant {
    session: Session,
    gate: WakeGate,
    completer: Box<dyn Completer>,
    synthesizer: Box<dyn Synthesizer>,
    audio: Box<dyn AudioOutput>,
    persona: AssistantConfig,
}

impl Assistant {
    /// Assemble an assistant from its collaborators
    #[must_use]
    pub fn new(
        session: Session,
        gate: WakeGate,
        completer: Box<dyn Completer>,
        synthesizer: Box<dyn Synthesizer>,
        audio: Box<dyn AudioOutput>,
        persona: AssistantConfig,
    ) -> Self {
        Self {
            session,
            gate,
            completer,
            synthesizer,
            audio,
            persona,
        }
    }

    /// Build an assistant on the real devices and services
    ///
    /// Plays the loading cue and keeps the working cue looping until
    /// [`Assistant::greet`] stops it.
    ///
    /// # Errors
    ///
    /// Returns error if a device cannot be opened or a credential is missing
    #[allow(clippy::future_not_send)]
    pub async fn from_config(config: &Config) -> Result<Self> {
        let cues = CueSet::load(config.audio.cues_dir.as_deref());
        let mut speakers = Speakers::open(cues)?;
        speakers.play_cue(Cue::Loading).await?;
        speakers.start_working()?;

        let session = Session::new(
            config.conversation.history_capacity,
            config.conversation.template.clone(),
        )?;
        let completer = CompletionClient::with_base_url(
            config.openai_api_key.expose_secret().to_string(),
            config.completion.model.clone(),
            config.completion.base_url.clone(),
        )?;
        let transcriber = build_transcriber(config)?;
        let synthesizer = build_synthesizer(config)?;
        let detector = build_detector(config)?;
        let microphone = CpalMicrophone::open(config.audio.endpoint)?;
        let listen_timeout =
            Duration::try_from_secs_f32(config.audio.endpoint.max_utterance_secs)
                .unwrap_or_default()
                + LISTEN_GRACE;
        let gate = WakeGate::new(Box::new(microphone), detector, Box::new(transcriber))
            .with_timeouts(DEFAULT_FRAME_TIMEOUT, listen_timeout)
            .with_lenient_exit(config.assistant.lenient_exit);

        tracing::info!(
            model = %config.completion.model,
            stt = ?config.stt.provider,
            tts = ?config.tts.provider,
            history = config.conversation.history_capacity,
            "assistant initialized"
        );

        Ok(Self::new(
            session,
            gate,
            Box::new(completer),
            Box::new(synthesizer),
            Box::new(speakers),
            config.assistant.clone(),
        ))
    }

    /// Conversation state
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Print and speak the greeting
    ///
    /// # Errors
    ///
    /// Returns error if synthesis or playback fails
    pub async fn greet(&mut self) -> Result<()> {
        let greeting = self.persona.greeting.clone();
        println!("{}", self.persona.line(&greeting));
        self.speak(&greeting).await
    }

    /// Run one cycle: wait for an utterance, reply, and record the turn
    ///
    /// # Errors
    ///
    /// Returns error if completion, synthesis, or playback fails; the turn
    /// is not recorded in that case
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome> {
        // After a miss, listen again without asking for the wake word
        let mut require_wakeword = true;
        let utterance = loop {
            match self
                .gate
                .await_utterance(require_wakeword, self.audio.as_mut())
                .await
            {
                GateOutcome::Heard(text) => break text,
                GateOutcome::Missed => require_wakeword = false,
                GateOutcome::Exit => {
                    self.say_farewell().await;
                    return Ok(CycleOutcome::Exit);
                }
            }
        };

        let prompt = self.session.prompt_for(&utterance);
        tracing::debug!(prompt_chars = prompt.len(), "prompt assembled");

        self.audio.start_working()?;
        let reply = self.completer.complete(&prompt).await?;

        println!("{}", self.persona.line(&reply));
        self.speak(&reply).await?;

        let turn = ConversationTurn::new(utterance, reply);
        self.session.record(turn.clone());
        tracing::debug!(turns = self.session.history().len(), "turn recorded");

        Ok(CycleOutcome::Completed(turn))
    }

    /// Greet, then run cycles until the user exits or Ctrl-C is pressed
    #[allow(clippy::future_not_send)]
    pub async fn run(&mut self) {
        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "cannot listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        };
        self.run_until(shutdown).await;
    }

    /// Greet, then run cycles until the user exits or `shutdown` resolves
    ///
    /// Errors inside a cycle are logged and the next cycle starts; the
    /// failed turn is not retried.
    pub async fn run_until(&mut self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);

        if let Err(e) = self.greet().await {
            self.audio.stop();
            tracing::error!(error = %e, "greeting failed");
        }

        loop {
            tokio::select! {
                biased;

                () = &mut shutdown => {
                    self.audio.stop();
                    println!();
                    tracing::info!("shutdown requested");
                    break;
                }
                result = self.run_cycle() => match result {
                    Ok(CycleOutcome::Exit) => {
                        tracing::info!("exit requested");
                        break;
                    }
                    Ok(CycleOutcome::Completed(_)) => {}
                    Err(e) => {
                        self.audio.stop();
                        tracing::error!(error = %e, "cycle failed");
                    }
                },
            }
        }
    }

    async fn say_farewell(&mut self) {
        let farewell = self.persona.farewell.clone();
        println!("{}", self.persona.farewell_line());
        if let Err(e) = self.speak(&farewell).await {
            self.audio.stop();
            tracing::warn!(error = %e, "failed to speak farewell");
        }
    }

    async fn speak(&mut self, text: &str) -> Result<()> {
        tracing::debug!(text, "speaking");
        self.audio.stop();
        let mp3 = self.synthesizer.synthesize(text).await?;
        self.audio.play_speech(&mp3).await
    }
}

/// Speech-to-text client for the configured provider
///
/// # Errors
///
/// Returns error if the provider's API key is missing
pub fn build_transcriber(config: &Config) -> Result<SpeechToText> {
    let stt = &config.stt;
    let openai_key = config.openai_api_key.expose_secret();
    match stt.provider {
        SttProvider::Whisper => SpeechToText::new_whisper(
            openai_key.to_string(),
            stt.model.clone(),
            stt.language.clone(),
        ),
        SttProvider::Deepgram => {
            let key = stt
                .deepgram_api_key
                .as_ref()
                .ok_or_else(|| Error::Config("DEEPGRAM_API_KEY is not set".to_string()))?;
            SpeechToText::new_deepgram(
                key.expose_secret().to_string(),
                stt.model.clone(),
                stt.language.clone(),
            )
        }
    }
}

/// Text-to-speech client for the configured provider
///
/// # Errors
///
/// Returns error if the provider's API key is missing
pub fn build_synthesizer(config: &Config) -> Result<TextToSpeech> {
    let tts = &config.tts;
    let openai_key = config.openai_api_key.expose_secret();
    match tts.provider {
        TtsProvider::Google => Ok(TextToSpeech::new_google(
            tts.language.clone(),
            tts.tld.clone(),
        )),
        TtsProvider::OpenAI => TextToSpeech::new_openai(
            openai_key.to_string(),
            tts.voice.clone(),
            tts.speed,
            tts.model.clone(),
        ),
        TtsProvider::ElevenLabs => {
            let key = tts
                .elevenlabs_api_key
                .as_ref()
                .ok_or_else(|| Error::Config("ELEVENLABS_API_KEY is not set".to_string()))?;
            TextToSpeech::new_elevenlabs(
                key.expose_secret().to_string(),
                tts.voice.clone(),
                tts.model.clone(),
            )
        }
    }
}

#[cfg(feature = "wake-word")]
fn build_detector(config: &Config) -> Result<Box<dyn WakeWordDetector>> {
    if let Some(model) = &config.audio.wake_model {
        let detector = crate::voice::RustpotterWakeDetector::new(
            &model.to_string_lossy(),
            SAMPLE_RATE,
            config.audio.wake_threshold,
        )?;
        return Ok(Box::new(detector));
    }

    Ok(Box::new(EnergyWakeDetector::new(
        config.audio.endpoint.energy_threshold,
    )))
}

#[cfg(not(feature = "wake-word"))]
#[allow(clippy::unnecessary_wraps)]
fn build_detector(config: &Config) -> Result<Box<dyn WakeWordDetector>> {
    if let Some(model) = &config.audio.wake_model {
        tracing::warn!(
            model = %model.display(),
            sample_rate = SAMPLE_RATE,
            "built without the wake-word feature, waking on speech instead"
        );
    }

    Ok(Box::new(EnergyWakeDetector::new(
        config.audio.endpoint.energy_threshold,
    )))
}
