#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

//! Multi-turn chat sessions.
//!
//! A session keeps the transcript the model sees as its memory and routes
//! each new user message either straight to the chat provider or through
//! the tool agent.
//!
//! # Key Features
//! - Append-only transcript with optional FIFO eviction
//! - Routing fixed once per session
//! - Registry of concurrent sessions with per-session locking

mod manager;
mod registry;
mod transcript;

pub use manager::{Route, SessionConfig, SessionManager};
pub use registry::{SessionRegistry, SharedSession};
pub use transcript::{Transcript, TranscriptLimits, TranscriptStats, Turn, TurnRole};
