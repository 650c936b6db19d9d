//! Tool-augmented agent: lets the model call tools before it answers.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::{
    ChatMessage, ChatProvider, CompletionRequest, ModelOptions, Reply, Responder, Result,
    ToolRegistry, Usage,
};

const FINAL_ANSWER_PROMPT: &str = "The tool budget for this question is exhausted. \
    Answer the user now with the information gathered so far.";

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub options: ModelOptions,
    /// Provider round-trips allowed to request tools before the agent forces
    /// a final answer.
    pub max_iterations: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            options: ModelOptions::default(),
            max_iterations: 8,
        }
    }
}

pub struct ToolAgent {
    provider: Arc<dyn ChatProvider>,
    tools: Arc<ToolRegistry>,
    config: AgentConfig,
}

impl ToolAgent {
    #[must_use]
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        tools: Arc<ToolRegistry>,
        config: AgentConfig,
    ) -> Self {
        info!(
            "Creating tool agent with tools: {:?} (max_iterations={})",
            tools.names(),
            config.max_iterations
        );
        Self {
            provider,
            tools,
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Answer the last user message in `context`, invoking tools as the
    /// model requests them.
    ///
    /// Only the final text is returned; the intermediate tool traffic stays
    /// local to this call.
    pub async fn run(&self, context: &[ChatMessage]) -> Result<Reply> {
        let definitions = self.tools.definitions();
        let mut messages = context.to_vec();
        let mut usage = None;
        let mut tool_calls = 0_usize;

        for iteration in 1..=self.config.max_iterations {
            let request = CompletionRequest::new(&self.config.options, messages.clone())
                .with_tools(definitions.clone());
            let completion = self.provider.complete(request).await?;
            usage = Usage::merge(usage, completion.usage);

            if completion.tool_calls.is_empty() {
                let text = completion.into_answer(self.provider.name())?;
                debug!("Agent answered after {iteration} iteration(s), {tool_calls} tool call(s)");
                return Ok(Reply {
                    text,
                    usage,
                    tool_calls,
                });
            }

            info!(
                "Iteration {iteration}: model requested {} tool call(s)",
                completion.tool_calls.len()
            );
            messages.push(ChatMessage::assistant_tool_calls(
                completion.text.unwrap_or_default(),
                completion.tool_calls.clone(),
            ));

            for call in completion.tool_calls {
                tool_calls += 1;
                let result = self.tools.execute(&call.name, &call.arguments).await?;
                info!(
                    "Tool {} finished: is_error={}, bytes={}, duration_ms={:?}",
                    call.name, result.is_error, result.bytes, result.duration_ms
                );
                messages.push(ChatMessage::tool_result(call.id, result.content));
            }
        }

        warn!(
            "Tool iteration limit ({}) reached, requesting a final answer",
            self.config.max_iterations
        );
        messages.push(ChatMessage::system(FINAL_ANSWER_PROMPT));
        let completion = self
            .provider
            .complete(CompletionRequest::new(&self.config.options, messages))
            .await?;
        usage = Usage::merge(usage, completion.usage);
        let text = completion.into_answer(self.provider.name())?;

        Ok(Reply {
            text,
            usage,
            tool_calls,
        })
    }
}

#[async_trait]
impl Responder for ToolAgent {
    async fn respond(&self, context: &[ChatMessage]) -> Result<Reply> {
        self.run(context).await
    }
}
