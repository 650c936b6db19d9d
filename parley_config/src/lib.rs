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

//! Configuration loading: defaults, `~/parley/config.json`, `.env`, and the
//! process environment, in increasing order of precedence.

mod error;
mod schema;

pub use error::ConfigError;
pub use schema::{
    AgentDefaults, AgentsConfig, Config, OpenAiSettings, ProvidersConfig, SerpApiSettings,
    ToolKind, ToolsConfig, env,
};
