use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One turn of generator context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Most-recent-N conversation history kept per node. Lost on restart.
#[derive(Debug, Clone)]
pub struct History {
    turns: VecDeque<ConversationTurn>,
    limit: usize,
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self {
            turns: VecDeque::with_capacity(limit.min(64)),
            limit,
        }
    }

    pub fn push(&mut self, turn: ConversationTurn) {
        if self.limit == 0 {
            return;
        }
        while self.turns.len() >= self.limit {
            self.turns.pop_front();
        }
        self.turns.push_back(turn);
    }

    /// The last `n` turns, oldest first.
    pub fn recent(&self, n: usize) -> Vec<ConversationTurn> {
        let skip = self.turns.len().saturating_sub(n);
        self.turns.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}
