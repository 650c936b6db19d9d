//! The append-only record of one conversation.
//!
//! Turns are only ever appended. The sole way a turn leaves the transcript
//! is eviction under [`TranscriptLimits`], which always drops the oldest
//! turns first.

use parley_core::{ChatMessage, Role};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl From<TurnRole> for Role {
    fn from(role: TurnRole) -> Self {
        match role {
            TurnRole::User => Self::User,
            TurnRole::Assistant => Self::Assistant,
        }
    }
}

/// One user or assistant message. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Turn {
    role: TurnRole,
    content: String,
}

impl Turn {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
        }
    }

    #[must_use]
    pub const fn role(&self) -> TurnRole {
        self.role
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    fn char_count(&self) -> usize {
        self.content.chars().count()
    }

    fn to_message(&self) -> ChatMessage {
        match self.role {
            TurnRole::User => ChatMessage::user(self.content.clone()),
            TurnRole::Assistant => ChatMessage::assistant(self.content.clone()),
        }
    }
}

/// Bounds on what a transcript retains. `None` means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TranscriptLimits {
    pub max_turns: Option<usize>,
    /// Approximate context budget, counted in Unicode scalar values of turn
    /// content.
    pub max_chars: Option<usize>,
}

impl TranscriptLimits {
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            max_turns: None,
            max_chars: None,
        }
    }

    #[must_use]
    pub const fn with_max_turns(mut self, max: usize) -> Self {
        self.max_turns = Some(max);
        self
    }

    #[must_use]
    pub const fn with_max_chars(mut self, max: usize) -> Self {
        self.max_chars = Some(max);
        self
    }

    const fn exceeded(&self, turns: usize, chars: usize) -> bool {
        matches!(self.max_turns, Some(max) if turns > max)
            || matches!(self.max_chars, Some(max) if chars > max)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Transcript {
    turns: Vec<Turn>,
    limits: TranscriptLimits,
    chars: usize,
    evicted: usize,
}

impl Transcript {
    #[must_use]
    pub fn new(limits: TranscriptLimits) -> Self {
        Self {
            limits,
            ..Self::default()
        }
    }

    /// Append a turn, then evict from the front until the limits hold.
    ///
    /// The newest exchange always survives: the newest turn, plus the user
    /// turn it answers when the newest turn is an assistant turn. The
    /// transcript may exceed its limits by that exchange, and it never starts
    /// with an assistant turn after eviction.
    pub fn push(&mut self, turn: Turn) {
        self.chars += turn.char_count();
        self.turns.push(turn);

        if !self.limits.exceeded(self.turns.len(), self.chars) {
            return;
        }

        let last = self.turns.len() - 1;
        let keep_from = if last > 0
            && self.turns[last].role == TurnRole::Assistant
            && self.turns[last - 1].role == TurnRole::User
        {
            last - 1
        } else {
            last
        };

        let mut cut = 0;
        let mut chars = self.chars;
        while cut < keep_from && self.limits.exceeded(self.turns.len() - cut, chars) {
            chars -= self.turns[cut].char_count();
            cut += 1;
        }
        while cut < keep_from && self.turns[cut].role == TurnRole::Assistant {
            chars -= self.turns[cut].char_count();
            cut += 1;
        }

        if cut > 0 {
            self.turns.drain(..cut);
            self.chars = chars;
            self.evicted += cut;
            tracing::debug!("Evicted {cut} turns from transcript");
        }
    }

    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    #[must_use]
    pub const fn limits(&self) -> &TranscriptLimits {
        &self.limits
    }

    pub fn clear(&mut self) {
        self.turns.clear();
        self.chars = 0;
        self.evicted = 0;
    }

    /// The provider context: system prompt followed by every retained turn.
    #[must_use]
    pub fn to_messages(&self, system_prompt: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.turns.len() + 1);
        if !system_prompt.is_empty() {
            messages.push(ChatMessage::system(system_prompt));
        }
        messages.extend(self.turns.iter().map(Turn::to_message));
        messages
    }

    #[must_use]
    pub fn stats(&self) -> TranscriptStats {
        let user_turns = self
            .turns
            .iter()
            .filter(|t| t.role == TurnRole::User)
            .count();

        TranscriptStats {
            total_turns: self.turns.len(),
            user_turns,
            assistant_turns: self.turns.len() - user_turns,
            evicted_turns: self.evicted,
            total_characters: self.chars,
            estimated_tokens: self.chars / 4, // Rough estimate: 4 chars per token
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TranscriptStats {
    pub total_turns: usize,
    pub user_turns: usize,
    pub assistant_turns: usize,
    pub evicted_turns: usize,
    pub total_characters: usize,
    pub estimated_tokens: usize,
}
