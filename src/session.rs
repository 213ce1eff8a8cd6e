//! Conversation history shared across summarisation requests.
//!
//! The service keeps a single process-wide session. History is bounded:
//! once the cap is reached the oldest turn is evicted, so a long-running
//! process cannot grow without limit.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default maximum number of turns kept in memory.
pub const DEFAULT_MAX_TURNS: usize = 100;

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single entry in the conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

/// Ordered, bounded sequence of conversation turns.
#[derive(Debug)]
pub struct SessionHistory {
    turns: VecDeque<ConversationTurn>,
    max_turns: usize,
}

impl SessionHistory {
    pub fn new(max_turns: usize) -> Self {
        Self {
            turns: VecDeque::with_capacity(max_turns),
            max_turns,
        }
    }

    /// Append a user turn, evicting the oldest turn when at capacity
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(Role::User, content.into());
    }

    /// Append an assistant turn, evicting the oldest turn when at capacity
    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(Role::Assistant, content.into());
    }

    fn push(&mut self, role: Role, content: String) {
        if self.turns.len() >= self.max_turns {
            self.turns.pop_front();
        }
        self.turns.push_back(ConversationTurn { role, content });
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Snapshot of all turns, oldest first
    pub fn turns(&self) -> Vec<ConversationTurn> {
        self.turns.iter().cloned().collect()
    }

    /// Render the history as prompt lines, one `User:`/`Assistant:` line per turn
    pub fn render(&self) -> String {
        let mut out = String::new();
        for turn in &self.turns {
            let speaker = match turn.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
            };
            out.push_str(speaker);
            out.push_str(": ");
            out.push_str(&turn.content);
            out.push('\n');
        }
        out
    }
}

impl Default for SessionHistory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TURNS)
    }
}
