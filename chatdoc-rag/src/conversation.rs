//! Append-only conversation log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who produced a turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The person asking questions.
    User,
    /// The answering engine.
    Assistant,
}

/// One message of the conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    /// Who produced the message.
    pub role: Role,
    /// Message text.
    pub content: String,
    /// When the turn was appended.
    pub created_at: DateTime<Utc>,
}

impl Turn {
    /// A user turn stamped with the current time.
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into(), created_at: Utc::now() }
    }

    /// An assistant turn stamped with the current time.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into(), created_at: Utc::now() }
    }
}

/// A question together with the answer it received.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryPair {
    /// The user's text.
    pub user: String,
    /// The assistant's reply.
    pub assistant: String,
}

/// Turns in the order they were appended.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    /// Create an empty conversation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn at the end of the log.
    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// All turns, oldest first.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Number of turns.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether no turn has been appended yet.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Pair each user turn with the assistant turn directly after it.
    ///
    /// Turns that are not part of such an adjacent user → assistant pair are
    /// skipped: a trailing question, the first of two consecutive user turns,
    /// or an assistant turn without a preceding question.
    pub fn pairs(&self) -> Vec<HistoryPair> {
        let mut pairs = Vec::new();
        let mut i = 0;
        while i < self.turns.len() {
            match (self.turns[i].role, self.turns.get(i + 1).map(|t| t.role)) {
                (Role::User, Some(Role::Assistant)) => {
                    pairs.push(HistoryPair {
                        user: self.turns[i].content.clone(),
                        assistant: self.turns[i + 1].content.clone(),
                    });
                    i += 2;
                }
                _ => i += 1,
            }
        }
        pairs
    }
}
