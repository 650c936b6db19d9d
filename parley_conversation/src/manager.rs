//! Session manager for multi-turn dialogue.
//!
//! A `SessionManager` owns one transcript and decides once, at construction,
//! whether its turns are answered by a plain chat call or by the tool agent.

use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use parley_config::{Config, ToolKind};
use parley_core::{
    AgentConfig, ChatError, ChatProvider, DEFAULT_SYSTEM_PROMPT, ModelOptions, PlainChat, Reply,
    Responder, ToolAgent, ToolRegistry,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::transcript::{Transcript, TranscriptLimits, TranscriptStats, Turn};

/// Per-session settings, fixed for the lifetime of the session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub model: String,
    pub temperature: f32,
    pub streaming: bool,
    pub tools: BTreeSet<ToolKind>,
    pub system_prompt: String,
    pub max_tool_iterations: usize,
    pub limits: TranscriptLimits,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.7,
            streaming: false,
            tools: BTreeSet::new(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_tool_iterations: 8,
            limits: TranscriptLimits::unbounded(),
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let defaults = &config.agents.defaults;
        Self {
            model: defaults.model.clone(),
            temperature: defaults.temperature,
            streaming: defaults.streaming,
            tools: config.tools.enabled.clone(),
            system_prompt: defaults.system_prompt().to_string(),
            max_tool_iterations: defaults.max_tool_iterations,
            limits: TranscriptLimits {
                max_turns: defaults.history_limit,
                max_chars: None,
            },
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    #[must_use]
    pub const fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    #[must_use]
    pub fn with_tool(mut self, tool: ToolKind) -> Self {
        self.tools.insert(tool);
        self
    }

    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    #[must_use]
    pub const fn with_max_tool_iterations(mut self, max: usize) -> Self {
        self.max_tool_iterations = max;
        self
    }

    #[must_use]
    pub const fn with_limits(mut self, limits: TranscriptLimits) -> Self {
        self.limits = limits;
        self
    }

    fn model_options(&self) -> ModelOptions {
        ModelOptions {
            model: self.model.clone(),
            temperature: self.temperature,
            stream: self.streaming,
        }
    }
}

/// How a session's turns are answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Plain,
    ToolAugmented,
}

enum Backend {
    Plain(PlainChat),
    Agent {
        tools: Arc<ToolRegistry>,
        agent: OnceLock<ToolAgent>,
    },
}

pub struct SessionManager {
    id: Uuid,
    provider: Arc<dyn ChatProvider>,
    config: SessionConfig,
    backend: Backend,
    transcript: Transcript,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SessionManager {
    /// Create a session and fix its route.
    ///
    /// Tools are used only when `config.tools` is non-empty and a registry is
    /// supplied. Every enabled tool must be present in that registry. A blank
    /// model falls back to the provider's default model.
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        mut config: SessionConfig,
        tools: Option<ToolRegistry>,
    ) -> Result<Self, ChatError> {
        if config.model.trim().is_empty() {
            config.model = provider.default_model().to_string();
            debug!("No model configured, using {} default {}", provider.name(), config.model);
        }

        let backend = match tools {
            Some(registry) if !config.tools.is_empty() => {
                if let Some(missing) = config
                    .tools
                    .iter()
                    .find(|kind| !registry.contains(kind.as_str()))
                {
                    return Err(ChatError::Configuration(format!(
                        "Tool {missing} is enabled but not registered"
                    )));
                }
                let tools = registry.subset(config.tools.iter().map(|kind| kind.as_str()));
                Backend::Agent {
                    tools: Arc::new(tools),
                    agent: OnceLock::new(),
                }
            }
            None if !config.tools.is_empty() => {
                warn!("Tools are enabled but no tool registry was supplied; using plain chat");
                Backend::Plain(PlainChat::new(provider.clone(), config.model_options()))
            }
            _ => Backend::Plain(PlainChat::new(provider.clone(), config.model_options())),
        };

        let id = Uuid::now_v7();
        let now = Utc::now();
        let manager = Self {
            id,
            provider,
            transcript: Transcript::new(config.limits),
            config,
            backend,
            created_at: now,
            updated_at: now,
        };
        info!(
            "Created session {id} (model={}, route={:?})",
            manager.config.model,
            manager.route()
        );
        Ok(manager)
    }

    /// Record `user_text`, ask for an answer, and record the answer.
    ///
    /// On failure the user turn stays in the transcript and no assistant
    /// turn is added.
    pub async fn submit(&mut self, user_text: &str) -> Result<Reply, ChatError> {
        if user_text.trim().is_empty() {
            return Err(ChatError::EmptyInput);
        }

        self.transcript.push(Turn::user(user_text));
        self.updated_at = Utc::now();
        let context = self.transcript.to_messages(&self.config.system_prompt);
        debug!(
            "Session {} submitting turn with {} context messages",
            self.id,
            context.len()
        );

        let reply = self.responder().respond(&context).await?;

        self.transcript.push(Turn::assistant(reply.text.clone()));
        self.updated_at = Utc::now();
        if reply.tool_calls > 0 {
            info!(
                "Session {} answered after {} tool calls",
                self.id, reply.tool_calls
            );
        }
        Ok(reply)
    }

    fn responder(&self) -> &dyn Responder {
        match &self.backend {
            Backend::Plain(chat) => chat as &dyn Responder,
            Backend::Agent { tools, agent } => agent.get_or_init(|| {
                ToolAgent::new(
                    self.provider.clone(),
                    tools.clone(),
                    AgentConfig {
                        options: self.config.model_options(),
                        max_iterations: self.config.max_tool_iterations,
                    },
                )
            }),
        }
    }

    #[must_use]
    pub fn history(&self) -> &[Turn] {
        self.transcript.turns()
    }

    #[must_use]
    pub const fn route(&self) -> Route {
        match self.backend {
            Backend::Plain(_) => Route::Plain,
            Backend::Agent { .. } => Route::ToolAugmented,
        }
    }

    #[must_use]
    pub const fn session_id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[must_use]
    pub fn stats(&self) -> TranscriptStats {
        self.transcript.stats()
    }

    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Start over with an empty transcript. Route and settings are kept.
    pub fn clear(&mut self) {
        info!("Clearing session {}", self.id);
        self.transcript.clear();
        self.updated_at = Utc::now();
    }
}
