//! Conversation state
//!
//! Holds the rolling turn history and turns it into prompts for the
//! completion service.

mod history;
mod prompt;

pub use history::{
    ConversationHistory, ConversationTurn, DEFAULT_CAPACITY, SEED_ASSISTANT_REPLY,
    SEED_USER_UTTERANCE,
};
pub use prompt::{DEFAULT_PREAMBLE, PromptTemplate, RESTART_MARKER, START_MARKER};

use crate::Result;

/// Conversation state owned by the interaction loop
#[derive(Debug, Clone)]
pub struct Session {
    history: ConversationHistory,
    template: PromptTemplate,
}

impl Session {
    /// Create a session with a seeded history of `capacity` turns
    ///
    /// # Errors
    ///
    /// Returns error if `capacity` is zero
    pub fn new(capacity: usize, template: PromptTemplate) -> Result<Self> {
        Ok(Self {
            history: ConversationHistory::seeded(capacity)?,
            template,
        })
    }

    /// Create a session around an existing history
    #[must_use]
    pub const fn with_history(history: ConversationHistory, template: PromptTemplate) -> Self {
        Self { history, template }
    }

    /// Prompt for `utterance` given everything said so far
    #[must_use]
    pub fn prompt_for(&self, utterance: &str) -> String {
        self.template.build(&self.history, utterance)
    }

    /// Record a completed turn
    pub fn record(&mut self, turn: ConversationTurn) {
        self.history.append(turn);
    }

    /// Turn history
    #[must_use]
    pub const fn history(&self) -> &ConversationHistory {
        &self.history
    }

    /// Prompt template
    #[must_use]
    pub const fn template(&self) -> &PromptTemplate {
        &self.template
    }
}
