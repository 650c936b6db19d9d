//! The capability a session asks for its next answer.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::{ChatMessage, ChatProvider, CompletionRequest, ModelOptions, Result, Usage};

/// A successful answer to one user turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub usage: Option<Usage>,
    /// Tool invocations made while producing the answer.
    pub tool_calls: usize,
}

#[async_trait]
pub trait Responder: Send + Sync {
    /// Produce the next assistant message for `context`, which already ends
    /// with the new user message.
    async fn respond(&self, context: &[ChatMessage]) -> Result<Reply>;
}

/// One provider call per turn, no tools.
pub struct PlainChat {
    provider: Arc<dyn ChatProvider>,
    options: ModelOptions,
}

impl PlainChat {
    #[must_use]
    pub fn new(provider: Arc<dyn ChatProvider>, options: ModelOptions) -> Self {
        Self { provider, options }
    }
}

#[async_trait]
impl Responder for PlainChat {
    async fn respond(&self, context: &[ChatMessage]) -> Result<Reply> {
        debug!(
            "Sending {} messages to {} (model={})",
            context.len(),
            self.provider.name(),
            self.options.model
        );
        let completion = self
            .provider
            .complete(CompletionRequest::new(&self.options, context.to_vec()))
            .await?;
        let usage = completion.usage;
        let text = completion.into_answer(self.provider.name())?;
        Ok(Reply {
            text,
            usage,
            tool_calls: 0,
        })
    }
}
