//! The chat client capability.

use async_trait::async_trait;

use crate::{ChatError, ChatMessage, Result, ToolCall, ToolDefinition, Usage};

/// Model parameters fixed for the lifetime of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOptions {
    pub model: String,
    pub temperature: f32,
    pub stream: bool,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.7,
            stream: false,
        }
    }
}

/// One request to the remote text-generation service.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub temperature: f32,
    pub stream: bool,
    pub messages: Vec<ChatMessage>,
    /// Tools offered to the model. Empty means plain chat.
    pub tools: Vec<ToolDefinition>,
}

impl CompletionRequest {
    #[must_use]
    pub fn new(options: &ModelOptions, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: options.model.clone(),
            temperature: options.temperature,
            stream: options.stream,
            messages,
            tools: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }
}

/// What the model answered: final text, tool calls, or both.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<Usage>,
}

impl Completion {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::default()
        }
    }

    /// The final answer text, or a malformed-response error when the model
    /// produced nothing usable.
    pub fn into_answer(self, service: &'static str) -> Result<String> {
        match self.text {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ if !self.tool_calls.is_empty() => Err(ChatError::malformed(
                service,
                "model requested tool calls but no tools were offered",
            )),
            _ => Err(ChatError::malformed(service, "empty response content")),
        }
    }
}

#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Short service name used when classifying errors.
    fn name(&self) -> &'static str;

    fn default_model(&self) -> &str;

    async fn complete(&self, request: CompletionRequest) -> Result<Completion>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn request_copies_model_options() {
        let options = ModelOptions {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.2,
            stream: true,
        };
        let request = CompletionRequest::new(&options, vec![ChatMessage::user("hi")]);
        assert_eq!(request.model, "gpt-4o-mini");
        assert!(request.stream);
        assert!(request.tools.is_empty());
    }

    #[test]
    fn blank_answer_is_malformed() {
        let err = Completion::text("   ").into_answer("openai");
        assert!(matches!(
            err.map_err(|e| e.kind()),
            Err(ErrorKind::UpstreamMalformedResponse)
        ));
    }

    #[test]
    fn answer_is_returned_verbatim() {
        let text = Completion::text("  Hi there\n").into_answer("openai");
        assert_eq!(text.ok().as_deref(), Some("  Hi there\n"));
    }
}
