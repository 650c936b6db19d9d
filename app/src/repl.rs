//! Line handling and rendering for the interactive chat loop.

use std::fmt::Write as _;

use parley_conversation::{TranscriptStats, Turn, TurnRole};

/// What one line typed at the prompt asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line<'a> {
    Empty,
    Exit,
    History,
    Reset,
    Stats,
    Message(&'a str),
}

impl<'a> Line<'a> {
    pub fn parse(input: &'a str) -> Self {
        match input.trim() {
            "" => Self::Empty,
            "exit" | "quit" | "q" => Self::Exit,
            "/history" => Self::History,
            "/reset" => Self::Reset,
            "/stats" => Self::Stats,
            text => Self::Message(text),
        }
    }
}

/// Transcript oldest to newest, one labelled entry per turn.
pub fn render_history(turns: &[Turn]) -> String {
    if turns.is_empty() {
        return "(no messages yet)\n".to_string();
    }

    let mut out = String::new();
    for (i, turn) in turns.iter().enumerate() {
        let label = match turn.role() {
            TurnRole::User => "You",
            TurnRole::Assistant => "AI",
        };
        let _ = writeln!(out, "[{}] {label}: {}", i + 1, turn.content());
    }
    out
}

pub fn render_stats(stats: &TranscriptStats) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Turns: {} ({} user, {} assistant)",
        stats.total_turns, stats.user_turns, stats.assistant_turns
    );
    let _ = writeln!(
        out,
        "Characters: {} (~{} tokens)",
        stats.total_characters, stats.estimated_tokens
    );
    if stats.evicted_turns > 0 {
        let _ = writeln!(out, "Evicted: {}", stats.evicted_turns);
    }
    out
}
