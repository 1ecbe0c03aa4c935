//! Prompt assembly for single-shot completion models
//!
//! The completion endpoint has no notion of chat roles, so the dialogue is
//! flattened into one text blob:
//!
//! ```text
//! <preamble>
//! Human: <turn 1 user>
//! AI: <turn 1 reply>
//! ...
//! Human: <latest utterance>
//! ```
//!
//! The final utterance gets no `AI:` marker; the reply is what the model is
//! asked to produce.

use super::ConversationHistory;

/// Instruction text placed before every prompt
pub const DEFAULT_PREAMBLE: &str = "The following is a conversation with an AI assistant.  \
The assistant is helpful, creative, clever, and very friendly.";

/// Marker introducing an assistant reply
pub const START_MARKER: &str = "\nAI: ";

/// Marker introducing a user utterance
pub const RESTART_MARKER: &str = "\nHuman: ";

/// Preamble and role markers used to flatten a conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    /// Instruction text placed before the dialogue
    pub preamble: String,

    /// Marker placed before each assistant reply
    pub start_marker: String,

    /// Marker placed before each user utterance
    pub restart_marker: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            preamble: DEFAULT_PREAMBLE.to_string(),
            start_marker: START_MARKER.to_string(),
            restart_marker: RESTART_MARKER.to_string(),
        }
    }
}

impl PromptTemplate {
    /// Serialize the history without the preamble or a pending utterance
    #[must_use]
    pub fn render_history(&self, history: &ConversationHistory) -> String {
        let mut out = String::new();
        for turn in history {
            out.push_str(&self.restart_marker);
            out.push_str(turn.user_utterance());
            out.push_str(&self.start_marker);
            out.push_str(turn.assistant_reply());
        }
        out
    }

    /// Build the full prompt for `latest_utterance`
    #[must_use]
    pub fn build(&self, history: &ConversationHistory, latest_utterance: &str) -> String {
        let history_text = self.render_history(history);

        let mut prompt = String::with_capacity(
            self.preamble.len()
                + history_text.len()
                + self.restart_marker.len()
                + latest_utterance.len(),
        );
        prompt.push_str(&self.preamble);
        prompt.push_str(&history_text);
        prompt.push_str(&self.restart_marker);
        prompt.push_str(latest_utterance);
        prompt
    }
}
