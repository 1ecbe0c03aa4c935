//! Text-to-speech (TTS) processing

use async_trait::async_trait;

use crate::{Error, Result};

/// Longest text Google Translate TTS accepts per request
const GOOGLE_MAX_CHARS: usize = 200;

/// Turns text into MP3 audio
#[async_trait(?Send)]
pub trait Synthesizer {
    /// Synthesize `text`, returning MP3 bytes
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}

/// TTS provider backend
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TtsProvider {
    Google,
    OpenAI,
    ElevenLabs,
}

impl std::str::FromStr for TtsProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "google" | "gtts" => Ok(Self::Google),
            "openai" => Ok(Self::OpenAI),
            "elevenlabs" => Ok(Self::ElevenLabs),
            other => Err(Error::Config(format!("unknown TTS provider: {other}"))),
        }
    }
}

/// Synthesizes speech from text
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: String,
    voice: String,
    speed: f32,
    model: String,
    language: String,
    tld: String,
    provider: TtsProvider,
}

impl TextToSpeech {
    /// Create a new TTS instance using Google Translate speech
    ///
    /// `language` is the spoken language (e.g. "en"), `tld` selects the
    /// regional accent through the Google host (e.g. "com.au").
    #[must_use]
    pub fn new_google(language: String, tld: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: String::new(),
            voice: String::new(),
            speed: 1.0,
            model: String::new(),
            language,
            tld,
            provider: TtsProvider::Google,
        }
    }

    /// Create a new TTS instance using `OpenAI`
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_openai(api_key: String, voice: String, speed: f32, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("OpenAI API key required for TTS".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            voice,
            speed,
            model,
            language: String::new(),
            tld: String::new(),
            provider: TtsProvider::OpenAI,
        })
    }

    /// Create a new TTS instance using ElevenLabs
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_elevenlabs(api_key: String, voice_id: String, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "ElevenLabs API key required for TTS".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            voice: voice_id,
            speed: 1.0, // ElevenLabs doesn't use speed in the same way
            model,
            language: String::new(),
            tld: String::new(),
            provider: TtsProvider::ElevenLabs,
        })
    }

    /// Provider this instance talks to
    #[must_use]
    pub const fn provider(&self) -> TtsProvider {
        self.provider
    }

    /// Synthesize using Google Translate speech, one request per chunk
    async fn synthesize_google(&self, text: &str) -> Result<Vec<u8>> {
        let mut audio = Vec::new();

        for chunk in chunk_text(text, GOOGLE_MAX_CHARS) {
            let url = format!(
                "https://translate.google.{}/translate_tts?ie=UTF-8&client=tw-ob&tl={}&q={}",
                self.tld,
                urlencoding::encode(&self.language),
                urlencoding::encode(&chunk)
            );

            let response = self
                .client
                .get(&url)
                .header("User-Agent", "Mozilla/5.0")
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(Error::Tts(format!("Google TTS error {status}: {body}")));
            }

            // MP3 frames concatenate cleanly
            audio.extend_from_slice(&response.bytes().await?);
        }

        Ok(audio)
    }

    /// Synthesize using OpenAI TTS
    async fn synthesize_openai(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f32,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            speed: self.speed,
        };

        let response = self
            .client
            .post("https://api.openai.com/v1/audio/speech")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("OpenAI TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }

    /// Synthesize using ElevenLabs TTS
    async fn synthesize_elevenlabs(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct ElevenLabsRequest<'a> {
            text: &'a str,
            model_id: &'a str,
        }

        let url = format!(
            "https://api.elevenlabs.io/v1/text-to-speech/{}",
            self.voice
        );

        let request = ElevenLabsRequest {
            text,
            model_id: &self.model,
        };

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("ElevenLabs TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }
}

#[async_trait(?Send)]
impl Synthesizer for TextToSpeech {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        if text.trim().is_empty() {
            return Err(Error::Tts("nothing to say".to_string()));
        }

        tracing::debug!(provider = ?self.provider, chars = text.len(), "synthesizing speech");
        match self.provider {
            TtsProvider::Google => self.synthesize_google(text).await,
            TtsProvider::OpenAI => self.synthesize_openai(text).await,
            TtsProvider::ElevenLabs => self.synthesize_elevenlabs(text).await,
        }
    }
}

/// Split text into pieces of at most `max_chars` characters
///
/// Splits on whitespace; a single word longer than the limit is cut.
#[must_use]
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word = word;
        while word.chars().count() > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            let split = word
                .char_indices()
                .nth(max_chars)
                .map_or(word.len(), |(i, _)| i);
            chunks.push(word[..split].to_string());
            word = &word[split..];
        }

        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > max_chars {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
