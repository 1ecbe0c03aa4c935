//! Rolling conversation history

use std::collections::VecDeque;

use crate::{Error, Result};

/// Default number of turns kept in the history
pub const DEFAULT_CAPACITY: usize = 10;

/// User half of the example turn the history is primed with
pub const SEED_USER_UTTERANCE: &str = "Hello, how are you?";

/// Assistant half of the example turn the history is primed with
pub const SEED_ASSISTANT_REPLY: &str = "I am an AI created by OpenAI.  How can I help you today?";

/// One user utterance and the reply it received
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    user_utterance: String,
    assistant_reply: String,
}

impl ConversationTurn {
    /// Create a new turn
    pub fn new(user_utterance: impl Into<String>, assistant_reply: impl Into<String>) -> Self {
        Self {
            user_utterance: user_utterance.into(),
            assistant_reply: assistant_reply.into(),
        }
    }

    /// The example turn used to prime a fresh history
    #[must_use]
    pub fn seed() -> Self {
        Self::new(SEED_USER_UTTERANCE, SEED_ASSISTANT_REPLY)
    }

    /// What the user said
    #[must_use]
    pub fn user_utterance(&self) -> &str {
        &self.user_utterance
    }

    /// What the assistant answered
    #[must_use]
    pub fn assistant_reply(&self) -> &str {
        &self.assistant_reply
    }
}

/// Fixed-capacity FIFO of conversation turns
///
/// Appending past capacity silently evicts the oldest turn. Iteration is
/// always oldest to newest.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    turns: VecDeque<ConversationTurn>,
    capacity: usize,
}

impl ConversationHistory {
    /// Create an empty history
    ///
    /// # Errors
    ///
    /// Returns error if `capacity` is zero
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::Config(
                "conversation history capacity must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            turns: VecDeque::with_capacity(capacity),
            capacity,
        })
    }

    /// Create a history primed with the given turns
    ///
    /// Seeds beyond `capacity` are evicted exactly as appends would be.
    ///
    /// # Errors
    ///
    /// Returns error if `capacity` is zero
    pub fn with_seed(
        capacity: usize,
        seed: impl IntoIterator<Item = ConversationTurn>,
    ) -> Result<Self> {
        let mut history = Self::new(capacity)?;
        for turn in seed {
            history.append(turn);
        }
        Ok(history)
    }

    /// Create a history primed with the default example turn
    ///
    /// # Errors
    ///
    /// Returns error if `capacity` is zero
    pub fn seeded(capacity: usize) -> Result<Self> {
        Self::with_seed(capacity, [ConversationTurn::seed()])
    }

    /// Append a turn, evicting the oldest if the history is full
    pub fn append(&mut self, turn: ConversationTurn) {
        self.turns.push_back(turn);
        while self.turns.len() > self.capacity {
            if let Some(evicted) = self.turns.pop_front() {
                tracing::trace!(user = evicted.user_utterance(), "evicted oldest turn");
            }
        }
    }

    /// Iterate turns oldest to newest
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &ConversationTurn> + ExactSizeIterator {
        self.turns.iter()
    }

    /// Copy of the turns, oldest to newest
    #[must_use]
    pub fn as_ordered_sequence(&self) -> Vec<ConversationTurn> {
        self.turns.iter().cloned().collect()
    }

    /// Most recent turn, if any
    #[must_use]
    pub fn latest(&self) -> Option<&ConversationTurn> {
        self.turns.back()
    }

    /// Number of turns held
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether the history holds no turns
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Maximum number of turns held
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every turn
    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

impl<'a> IntoIterator for &'a ConversationHistory {
    type Item = &'a ConversationTurn;
    type IntoIter = std::collections::vec_deque::Iter<'a, ConversationTurn>;

    fn into_iter(self) -> Self::IntoIter {
        self.turns.iter()
    }
}
