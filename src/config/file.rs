//! TOML configuration file loading
//!
//! Supports `~/.config/iris/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct IrisConfigFile {
    /// Assistant persona
    #[serde(default)]
    pub assistant: AssistantFileConfig,

    /// History and prompt layout
    #[serde(default)]
    pub conversation: ConversationFileConfig,

    /// Completion service
    #[serde(default)]
    pub completion: CompletionFileConfig,

    /// Speech-to-text service
    #[serde(default)]
    pub stt: SttFileConfig,

    /// Text-to-speech service
    #[serde(default)]
    pub tts: TtsFileConfig,

    /// Microphone, cues, and wake word
    #[serde(default)]
    pub audio: AudioFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

/// Assistant persona configuration
#[derive(Debug, Default, Deserialize)]
pub struct AssistantFileConfig {
    /// Name shown before replies (e.g. "Iris")
    pub name: Option<String>,

    /// Spoken on startup
    pub greeting: Option<String>,

    /// Spoken on exit
    pub farewell: Option<String>,

    /// Printed on exit (e.g. "Shutting down")
    pub farewell_banner: Option<String>,

    /// Accept "Exit." and similar as well as the bare keyword
    pub lenient_exit: Option<bool>,
}

/// Conversation configuration
#[derive(Debug, Default, Deserialize)]
pub struct ConversationFileConfig {
    /// Number of turns remembered
    pub history_capacity: Option<usize>,

    /// Instruction text placed before the dialogue
    pub preamble: Option<String>,

    /// Marker placed before assistant replies
    pub start_marker: Option<String>,

    /// Marker placed before user utterances
    pub restart_marker: Option<String>,
}

/// Completion service configuration
#[derive(Debug, Default, Deserialize)]
pub struct CompletionFileConfig {
    /// Model identifier (e.g. "gpt-3.5-turbo-instruct")
    pub model: Option<String>,

    /// OpenAI-compatible API base URL
    pub base_url: Option<String>,
}

/// Speech-to-text configuration
#[derive(Debug, Default, Deserialize)]
pub struct SttFileConfig {
    /// "whisper" or "deepgram"
    pub provider: Option<String>,

    /// Model identifier (e.g. "whisper-1")
    pub model: Option<String>,

    /// Spoken language hint (e.g. "en")
    pub language: Option<String>,
}

/// Text-to-speech configuration
#[derive(Debug, Default, Deserialize)]
pub struct TtsFileConfig {
    /// "google", "openai", or "elevenlabs"
    pub provider: Option<String>,

    /// Voice identifier (`OpenAI` voice name or `ElevenLabs` voice ID)
    pub voice: Option<String>,

    /// Model identifier
    pub model: Option<String>,

    /// Speed multiplier (`OpenAI` only)
    pub speed: Option<f32>,

    /// Spoken language (Google only)
    pub language: Option<String>,

    /// Regional Google domain selecting the accent (e.g. "com.au")
    pub tld: Option<String>,
}

/// Audio configuration
#[derive(Debug, Default, Deserialize)]
pub struct AudioFileConfig {
    /// Directory holding cue MP3 files
    pub cues_dir: Option<PathBuf>,

    /// Rustpotter wake word model (`.rpw`)
    pub wake_model: Option<PathBuf>,

    /// Wake word model score threshold
    pub wake_threshold: Option<f32>,

    /// RMS energy above which audio counts as speech
    pub energy_threshold: Option<f32>,

    /// Upper bound on one utterance, in seconds
    pub max_utterance_secs: Option<f32>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
    pub deepgram: Option<String>,
    pub elevenlabs: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `IrisConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> IrisConfigFile {
    let Some(path) = config_file_path() else {
        return IrisConfigFile::default();
    };

    load_config_file_from(&path)
}

/// Load a TOML config file from `path`
///
/// Returns `IrisConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file_from(path: &Path) -> IrisConfigFile {
    if !path.exists() {
        return IrisConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                IrisConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            IrisConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/iris/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("iris").join("config.toml"))
}
