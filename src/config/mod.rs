//! Configuration management for Iris
//!
//! Precedence: environment > `config.toml` > defaults. CLI flags are applied
//! on top by the binary.

pub mod file;

use std::path::{Path, PathBuf};

use secrecy::SecretString;

use crate::completion::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::conversation::{DEFAULT_CAPACITY, PromptTemplate};
use crate::voice::{EndpointConfig, SttProvider, TtsProvider};
use crate::{Error, Result};

use file::IrisConfigFile;

/// Environment variable holding the required `OpenAI` API key
pub const OPENAI_API_KEY_VAR: &str = "OPENAI_API_KEY";

/// Iris configuration
#[derive(Debug)]
pub struct Config {
    /// `OpenAI` API key (completions; Whisper and `OpenAI` TTS when selected)
    pub openai_api_key: SecretString,

    /// Assistant persona
    pub assistant: AssistantConfig,

    /// History and prompt layout
    pub conversation: ConversationConfig,

    /// Completion service
    pub completion: CompletionConfig,

    /// Speech-to-text service
    pub stt: SttConfig,

    /// Text-to-speech service
    pub tts: TtsConfig,

    /// Microphone, cues, and wake word
    pub audio: AudioConfig,
}

/// Assistant persona configuration
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// Name shown before replies
    pub name: String,

    /// Spoken on startup
    pub greeting: String,

    /// Spoken on exit
    pub farewell: String,

    /// Printed on exit
    pub farewell_banner: String,

    /// Accept "Exit.", " EXIT! " and similar as the exit keyword
    pub lenient_exit: bool,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            name: "Iris".to_string(),
            greeting: "Nice to see you again, how can I help?".to_string(),
            farewell: "shutting down".to_string(),
            farewell_banner: "Shutting down".to_string(),
            lenient_exit: false,
        }
    }
}

impl AssistantConfig {
    /// Console line announcing `text` as said by the assistant
    #[must_use]
    pub fn line(&self, text: &str) -> String {
        format!("{}: {text}", self.name)
    }

    /// Console line printed on exit
    #[must_use]
    pub fn farewell_line(&self) -> String {
        self.line(&self.farewell_banner)
    }
}

/// Conversation configuration
#[derive(Debug, Clone)]
pub struct ConversationConfig {
    /// Number of turns remembered
    pub history_capacity: usize,

    /// Preamble and role markers
    pub template: PromptTemplate,
}

/// Completion service configuration
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    /// Model identifier
    pub model: String,

    /// OpenAI-compatible API base URL
    pub base_url: String,
}

/// Speech-to-text configuration
#[derive(Debug)]
pub struct SttConfig {
    /// Which service transcribes
    pub provider: SttProvider,

    /// Model identifier (e.g. "whisper-1", "nova-2")
    pub model: String,

    /// Spoken language hint
    pub language: Option<String>,

    /// Deepgram API key (required when `provider` is Deepgram)
    pub deepgram_api_key: Option<SecretString>,
}

/// Text-to-speech configuration
#[derive(Debug)]
pub struct TtsConfig {
    /// Which service synthesizes
    pub provider: TtsProvider,

    /// Voice identifier (`OpenAI` and `ElevenLabs`)
    pub voice: String,

    /// Model identifier (`OpenAI` and `ElevenLabs`)
    pub model: String,

    /// Speed multiplier (`OpenAI`)
    pub speed: f32,

    /// Spoken language (Google)
    pub language: String,

    /// Regional Google domain selecting the accent (Google)
    pub tld: String,

    /// `ElevenLabs` API key (required when `provider` is `ElevenLabs`)
    pub elevenlabs_api_key: Option<SecretString>,
}

/// Audio configuration
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// Directory holding cue MP3 files; tones are generated when unset
    pub cues_dir: Option<PathBuf>,

    /// Rustpotter wake word model; speech-burst wake when unset
    pub wake_model: Option<PathBuf>,

    /// Wake word model score threshold
    pub wake_threshold: f32,

    /// Utterance endpointing
    pub endpoint: EndpointConfig,
}

/// Default wake word model score threshold
pub const DEFAULT_WAKE_THRESHOLD: f32 = 0.4;

impl ConversationConfig {
    /// Resolve the conversation section (env > file > defaults)
    ///
    /// Needs no credentials, so offline commands can assemble prompts.
    ///
    /// # Errors
    ///
    /// Returns error if the history capacity is zero or not a number
    pub fn resolve(
        fc: file::ConversationFileConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let history_capacity = match env("IRIS_HISTORY_CAPACITY") {
            Some(raw) => parse_value("IRIS_HISTORY_CAPACITY", &raw)?,
            None => fc.history_capacity.unwrap_or(DEFAULT_CAPACITY),
        };
        if history_capacity == 0 {
            return Err(Error::Config(
                "conversation history capacity must be at least 1".to_string(),
            ));
        }

        let defaults = PromptTemplate::default();
        Ok(Self {
            history_capacity,
            template: PromptTemplate {
                preamble: fc.preamble.unwrap_or(defaults.preamble),
                start_marker: fc.start_marker.unwrap_or(defaults.start_marker),
                restart_marker: fc.restart_marker.unwrap_or(defaults.restart_marker),
            },
        })
    }
}

impl AudioConfig {
    /// Resolve the audio section (env > file > defaults)
    #[must_use]
    pub fn resolve(fc: file::AudioFileConfig, env: impl Fn(&str) -> Option<String>) -> Self {
        let endpoint_defaults = EndpointConfig::default();
        Self {
            cues_dir: env("IRIS_CUES_DIR").map(PathBuf::from).or(fc.cues_dir),
            wake_model: env("IRIS_WAKE_MODEL").map(PathBuf::from).or(fc.wake_model),
            wake_threshold: fc.wake_threshold.unwrap_or(DEFAULT_WAKE_THRESHOLD),
            endpoint: EndpointConfig {
                energy_threshold: fc
                    .energy_threshold
                    .unwrap_or(endpoint_defaults.energy_threshold),
                max_utterance_secs: fc
                    .max_utterance_secs
                    .unwrap_or(endpoint_defaults.max_utterance_secs),
            },
        }
    }
}

impl Config {
    /// Load configuration from the config file and process environment
    ///
    /// # Errors
    ///
    /// Returns error if `OPENAI_API_KEY` is missing or a value is invalid
    pub fn load() -> Result<Self> {
        Self::load_with(None, |key| std::env::var(key).ok())
    }

    /// Load configuration from `path` (or the standard location) and `env`
    ///
    /// # Errors
    ///
    /// Returns error if the `OpenAI` API key is missing or a value is invalid
    pub fn load_with(path: Option<&Path>, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let fc = path.map_or_else(file::load_config_file, file::load_config_file_from);
        Self::from_sources(fc, env)
    }

    /// Build configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if the `OpenAI` API key is missing or a value is invalid
    #[allow(clippy::needless_pass_by_value)]
    pub fn from_sources(fc: IrisConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        // API keys (env > toml)
        let openai_api_key = env(OPENAI_API_KEY_VAR)
            .or(fc.api_keys.openai)
            .ok_or_else(|| Error::Config(format!("{OPENAI_API_KEY_VAR} is not set")))?;
        let deepgram_api_key = env("DEEPGRAM_API_KEY").or(fc.api_keys.deepgram);
        let elevenlabs_api_key = env("ELEVENLABS_API_KEY").or(fc.api_keys.elevenlabs);

        let defaults = AssistantConfig::default();
        let lenient_exit = match env("IRIS_LENIENT_EXIT") {
            Some(raw) => parse_value("IRIS_LENIENT_EXIT", &raw)?,
            None => fc.assistant.lenient_exit.unwrap_or(defaults.lenient_exit),
        };
        let assistant = AssistantConfig {
            name: fc.assistant.name.unwrap_or(defaults.name),
            greeting: fc.assistant.greeting.unwrap_or(defaults.greeting),
            farewell: fc.assistant.farewell.unwrap_or(defaults.farewell),
            farewell_banner: fc
                .assistant
                .farewell_banner
                .unwrap_or(defaults.farewell_banner),
            lenient_exit,
        };

        let conversation = ConversationConfig::resolve(fc.conversation, &env)?;

        let completion = CompletionConfig {
            model: env("IRIS_COMPLETION_MODEL")
                .or(fc.completion.model)
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: env("IRIS_COMPLETION_BASE_URL")
                .or(fc.completion.base_url)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        };

        let stt_provider: SttProvider = env("IRIS_STT_PROVIDER")
            .or(fc.stt.provider)
            .map_or(Ok(SttProvider::Whisper), |p| p.parse())?;
        let stt = SttConfig {
            provider: stt_provider,
            model: env("IRIS_STT_MODEL")
                .or(fc.stt.model)
                .unwrap_or_else(|| default_stt_model(stt_provider).to_string()),
            language: fc.stt.language.or_else(|| Some("en".to_string())),
            deepgram_api_key: deepgram_api_key.map(SecretString::from),
        };

        let tts_provider: TtsProvider = env("IRIS_TTS_PROVIDER")
            .or(fc.tts.provider)
            .map_or(Ok(TtsProvider::Google), |p| p.parse())?;
        let tts = TtsConfig {
            provider: tts_provider,
            voice: env("IRIS_TTS_VOICE")
                .or(fc.tts.voice)
                .unwrap_or_else(|| default_tts_voice(tts_provider).to_string()),
            model: fc
                .tts
                .model
                .unwrap_or_else(|| default_tts_model(tts_provider).to_string()),
            speed: fc.tts.speed.unwrap_or(1.0),
            language: fc.tts.language.unwrap_or_else(|| "en".to_string()),
            tld: fc.tts.tld.unwrap_or_else(|| "com.au".to_string()),
            elevenlabs_api_key: elevenlabs_api_key.map(SecretString::from),
        };

        let audio = AudioConfig::resolve(fc.audio, &env);

        Ok(Self {
            openai_api_key: SecretString::from(openai_api_key),
            assistant,
            conversation,
            completion,
            stt,
            tts,
            audio,
        })
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| Error::Config(format!("invalid value for {key}: {raw}")))
}

const fn default_stt_model(provider: SttProvider) -> &'static str {
    match provider {
        SttProvider::Whisper => "whisper-1",
        SttProvider::Deepgram => "nova-2",
    }
}

const fn default_tts_voice(provider: TtsProvider) -> &'static str {
    match provider {
        TtsProvider::Google => "",
        TtsProvider::OpenAI => "alloy",
        // "Rachel"
        TtsProvider::ElevenLabs => "21m00Tcm4TlvDq8ikWAM",
    }
}

const fn default_tts_model(provider: TtsProvider) -> &'static str {
    match provider {
        TtsProvider::Google => "",
        TtsProvider::OpenAI => "tts-1",
        TtsProvider::ElevenLabs => "eleven_monolingual_v1",
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_missing_key_is_fatal() {
        let result = Config::from_sources(IrisConfigFile::default(), env_from(&[]));
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("OPENAI_API_KEY")));
    }

    #[test]
    fn test_blank_key_counts_as_missing() {
        let result =
            Config::from_sources(IrisConfigFile::default(), env_from(&[("OPENAI_API_KEY", " ")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_sources(
            IrisConfigFile::default(),
            env_from(&[("OPENAI_API_KEY", "sk-test")]),
        )
        .unwrap();

        assert_eq!(config.openai_api_key.expose_secret(), "sk-test");
        assert_eq!(config.assistant.name, "Iris");
        assert!(!config.assistant.lenient_exit);
        assert_eq!(config.conversation.history_capacity, DEFAULT_CAPACITY);
        assert_eq!(config.conversation.template, PromptTemplate::default());
        assert_eq!(config.completion.model, DEFAULT_MODEL);
        assert_eq!(config.stt.provider, SttProvider::Whisper);
        assert_eq!(config.stt.model, "whisper-1");
        assert_eq!(config.tts.provider, TtsProvider::Google);
        assert_eq!(config.tts.tld, "com.au");
        assert!(config.audio.cues_dir.is_none());
        assert!(config.audio.wake_model.is_none());
    }

    #[test]
    fn test_farewell_printed_and_spoken_separately() {
        let persona = AssistantConfig::default();

        assert_eq!(persona.farewell, "shutting down");
        assert_eq!(persona.farewell_line(), "Iris: Shutting down");
        assert_eq!(persona.line("hello"), "Iris: hello");
    }

    #[test]
    fn test_lenient_exit_switch() {
        let fc: IrisConfigFile = toml::from_str(
            r"
            [assistant]
            lenient_exit = true
            ",
        )
        .unwrap();
        let config = Config::from_sources(fc, env_from(&[("OPENAI_API_KEY", "k")])).unwrap();
        assert!(config.assistant.lenient_exit);

        let config = Config::from_sources(
            IrisConfigFile::default(),
            env_from(&[("OPENAI_API_KEY", "k"), ("IRIS_LENIENT_EXIT", "true")]),
        )
        .unwrap();
        assert!(config.assistant.lenient_exit);

        let result = Config::from_sources(
            IrisConfigFile::default(),
            env_from(&[("OPENAI_API_KEY", "k"), ("IRIS_LENIENT_EXIT", "sometimes")]),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_env_overrides_file() {
        let fc: IrisConfigFile = toml::from_str(
            r#"
            [conversation]
            history_capacity = 4

            [completion]
            model = "from-file"

            [api_keys]
            openai = "sk-file"
            "#,
        )
        .unwrap();

        let config = Config::from_sources(
            fc,
            env_from(&[("IRIS_COMPLETION_MODEL", "from-env"), ("IRIS_HISTORY_CAPACITY", "6")]),
        )
        .unwrap();

        assert_eq!(config.openai_api_key.expose_secret(), "sk-file");
        assert_eq!(config.completion.model, "from-env");
        assert_eq!(config.conversation.history_capacity, 6);
    }

    #[test]
    fn test_provider_specific_defaults() {
        let config = Config::from_sources(
            IrisConfigFile::default(),
            env_from(&[
                ("OPENAI_API_KEY", "sk-test"),
                ("IRIS_TTS_PROVIDER", "elevenlabs"),
                ("IRIS_STT_PROVIDER", "deepgram"),
                ("DEEPGRAM_API_KEY", "dg"),
            ]),
        )
        .unwrap();

        assert_eq!(config.tts.model, "eleven_monolingual_v1");
        assert_eq!(config.stt.model, "nova-2");
        assert!(config.stt.deepgram_api_key.is_some());
        assert!(config.tts.elevenlabs_api_key.is_none());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let key = ("OPENAI_API_KEY", "sk-test");

        for env in [
            env_from(&[key, ("IRIS_HISTORY_CAPACITY", "0")]),
            env_from(&[key, ("IRIS_HISTORY_CAPACITY", "ten")]),
            env_from(&[key, ("IRIS_TTS_PROVIDER", "festival")]),
        ] {
            let result = Config::from_sources(IrisConfigFile::default(), env);
            assert!(matches!(result, Err(Error::Config(_))));
        }
    }

    #[test]
    fn test_custom_template_from_file() {
        let fc: IrisConfigFile = toml::from_str(
            r#"
            [conversation]
            preamble = "You are terse."
            start_marker = "\nBot: "
            "#,
        )
        .unwrap();

        let config = Config::from_sources(fc, env_from(&[("OPENAI_API_KEY", "k")])).unwrap();
        assert_eq!(config.conversation.template.preamble, "You are terse.");
        assert_eq!(config.conversation.template.start_marker, "\nBot: ");
        assert_eq!(config.conversation.template.restart_marker, "\nHuman: ");
    }
}
