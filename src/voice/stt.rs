//! Speech-to-text (STT) processing

use async_trait::async_trait;

use super::samples_to_wav;
use crate::{Error, Result};

/// Turns captured speech into text
#[async_trait(?Send)]
pub trait Transcriber {
    /// Transcribe mono f32 samples at `sample_rate`
    ///
    /// # Errors
    ///
    /// Returns error if transcription fails
    async fn transcribe(&self, samples: &[f32], sample_rate: u32) -> Result<String>;
}

/// Response from OpenAI Whisper transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Response from Deepgram transcription API
#[derive(serde::Deserialize)]
struct DeepgramResponse {
    results: DeepgramResults,
}

#[derive(serde::Deserialize)]
struct DeepgramResults {
    channels: Vec<DeepgramChannel>,
}

#[derive(serde::Deserialize)]
struct DeepgramChannel {
    alternatives: Vec<DeepgramAlternative>,
}

#[derive(serde::Deserialize)]
struct DeepgramAlternative {
    transcript: String,
}

/// STT provider backend
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SttProvider {
    Whisper,
    Deepgram,
}

impl std::str::FromStr for SttProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "whisper" | "openai" => Ok(Self::Whisper),
            "deepgram" => Ok(Self::Deepgram),
            other => Err(Error::Config(format!("unknown STT provider: {other}"))),
        }
    }
}

/// Transcribes speech to text via a remote service
pub struct SpeechToText {
    client: reqwest::Client,
    api_key: String,
    model: String,
    language: Option<String>,
    provider: SttProvider,
}

impl SpeechToText {
    /// Create a new STT instance using `OpenAI` Whisper
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_whisper(api_key: String, model: String, language: Option<String>) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "OpenAI API key required for Whisper".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            language,
            provider: SttProvider::Whisper,
        })
    }

    /// Create a new STT instance using Deepgram
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_deepgram(api_key: String, model: String, language: Option<String>) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "Deepgram API key required".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            language,
            provider: SttProvider::Deepgram,
        })
    }

    /// Provider this instance talks to
    #[must_use]
    pub const fn provider(&self) -> SttProvider {
        self.provider
    }

    /// Transcribe using OpenAI Whisper
    async fn transcribe_whisper(&self, audio: Vec<u8>) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "starting Whisper transcription");

        let mut form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio)
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone());
        if let Some(language) = &self.language {
            form = form.text("language", language.clone());
        }

        let response = self
            .client
            .post("https://api.openai.com/v1/audio/transcriptions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Whisper request failed");
                e
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(Error::Stt(format!("Whisper API error {status}: {body}")));
        }

        let result: WhisperResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse response");
            e
        })?;

        Ok(result.text.trim().to_string())
    }

    /// Transcribe using Deepgram
    async fn transcribe_deepgram(&self, audio: Vec<u8>) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "starting Deepgram transcription");

        let mut url = format!(
            "https://api.deepgram.com/v1/listen?model={}&punctuate=true",
            urlencoding::encode(&self.model)
        );
        if let Some(language) = &self.language {
            url.push_str("&language=");
            url.push_str(&urlencoding::encode(language));
        }

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Token {}", self.api_key))
            .header("Content-Type", "audio/wav")
            .body(audio)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Deepgram request failed");
                e
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Deepgram API error");
            return Err(Error::Stt(format!("Deepgram API error {status}: {body}")));
        }

        let result: DeepgramResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse Deepgram response");
            e
        })?;

        Ok(deepgram_transcript(result))
    }
}

#[async_trait(?Send)]
impl Transcriber for SpeechToText {
    async fn transcribe(&self, samples: &[f32], sample_rate: u32) -> Result<String> {
        let wav = samples_to_wav(samples, sample_rate)?;

        let transcript = match self.provider {
            SttProvider::Whisper => self.transcribe_whisper(wav).await?,
            SttProvider::Deepgram => self.transcribe_deepgram(wav).await?,
        };

        tracing::info!(transcript = %transcript, "transcription complete");
        Ok(transcript)
    }
}

fn deepgram_transcript(response: DeepgramResponse) -> String {
    response
        .results
        .channels
        .into_iter()
        .next()
        .and_then(|c| c.alternatives.into_iter().next())
        .map(|a| a.transcript)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parsing() {
        assert_eq!("whisper".parse::<SttProvider>().unwrap(), SttProvider::Whisper);
        assert_eq!("OpenAI".parse::<SttProvider>().unwrap(), SttProvider::Whisper);
        assert_eq!(" deepgram ".parse::<SttProvider>().unwrap(), SttProvider::Deepgram);
        assert!("google".parse::<SttProvider>().is_err());
    }

    #[test]
    fn test_missing_key_rejected() {
        assert!(SpeechToText::new_whisper(String::new(), "whisper-1".into(), None).is_err());
        assert!(SpeechToText::new_deepgram(String::new(), "nova-2".into(), None).is_err());
    }

    #[test]
    fn test_deepgram_first_alternative() {
        let response: DeepgramResponse = serde_json::from_str(
            r#"{"results":{"channels":[{"alternatives":[{"transcript":"hello there"},{"transcript":"hollow bear"}]}]}}"#,
        )
        .unwrap();
        assert_eq!(deepgram_transcript(response), "hello there");

        let empty: DeepgramResponse =
            serde_json::from_str(r#"{"results":{"channels":[]}}"#).unwrap();
        assert_eq!(deepgram_transcript(empty), "");
    }
}
