//! Iris - a wake-word gated voice assistant
//!
//! This library provides the pieces of the assistant:
//! - Voice processing (capture, local wake word, STT/TTS, cues, playback)
//! - Conversation state (rolling turn history, prompt assembly)
//! - Remote text completion
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                     Assistant                        │
//! │   greet  →  cycle (gate → prompt → complete → speak) │
//! └──────────┬──────────────────┬───────────────────────┘
//!            │                  │
//! ┌──────────▼─────────┐ ┌──────▼──────────────────────┐
//! │     Wake Gate      │ │        Conversation          │
//! │ mic │ wake │ STT   │ │  history  │  prompt template │
//! └────────────────────┘ └──────┬──────────────────────┘
//!                               │
//! ┌─────────────────────────────▼───────────────────────┐
//! │          Remote services (completion, TTS)           │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod assistant;
pub mod completion;
pub mod config;
pub mod conversation;
pub mod error;
pub mod voice;

pub use assistant::{Assistant, CycleOutcome};
pub use config::Config;
pub use error::{Error, Result};
