use std::time::Duration;

use async_trait::async_trait;
use parley_core::{
    ChatError, ChatMessage, ChatProvider, Completion, CompletionRequest, Role, ToolCall, Usage,
};
use reqwest::{Client, Response};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::retry::{RetryPolicy, retry_with_backoff};
use crate::sse::StreamAssembler;

pub(crate) const SERVICE: &str = "openai";

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    retry: RetryPolicy,
}

impl OpenAiProvider {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openai.com/v1";

    /// Build a provider whose requests time out after `timeout`.
    pub fn new(api_key: String, timeout: Duration) -> Result<Self, ChatError> {
        info!("Creating OpenAiProvider");
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChatError::Configuration(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            retry: RetryPolicy::default(),
        })
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Helper method to send a single request
    async fn try_send(&self, body: &Value, stream: bool) -> Result<Completion, ChatError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ChatError::from_status(
                SERVICE,
                status.as_u16(),
                error_message(&text, status.canonical_reason()),
            ));
        }

        if stream {
            read_stream(response).await
        } else {
            let text = response.text().await.map_err(transport_error)?;
            parse_completion(&text)
        }
    }
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        SERVICE
    }

    fn default_model(&self) -> &'static str {
        "gpt-3.5-turbo"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ChatError> {
        let body = request_body(&request);

        info!(
            "Sending request to OpenAI API: model={}, messages={}, tools={}, stream={}",
            request.model,
            request.messages.len(),
            request.tools.len(),
            request.stream
        );

        let completion =
            retry_with_backoff(|| self.try_send(&body, request.stream), &self.retry).await?;

        debug!(
            "Received response from OpenAI API: text={}, tool_calls={}",
            completion.text.as_ref().map_or(0, String::len),
            completion.tool_calls.len()
        );
        Ok(completion)
    }
}

fn request_body(request: &CompletionRequest) -> Value {
    let messages: Vec<Value> = request.messages.iter().map(wire_message).collect();
    let mut body = json!({
        "model": request.model,
        "messages": messages,
        "temperature": round_temperature(request.temperature),
        "stream": request.stream,
    });

    if request.stream {
        body["stream_options"] = json!({ "include_usage": true });
    }

    if !request.tools.is_empty() {
        let tools: Vec<Value> = request
            .tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.input_schema,
                    }
                })
            })
            .collect();
        body["tools"] = Value::Array(tools);
        body["tool_choice"] = json!("auto");
    }

    body
}

/// `f32` widened naively prints as 0.699999988; keep two decimals.
fn round_temperature(temperature: f32) -> f64 {
    (f64::from(temperature) * 100.0).round() / 100.0
}

fn wire_message(message: &ChatMessage) -> Value {
    match message.role {
        Role::Tool => json!({
            "role": "tool",
            "tool_call_id": message.tool_call_id,
            "content": message.content,
        }),
        Role::Assistant if !message.tool_calls.is_empty() => {
            let calls: Vec<Value> = message
                .tool_calls
                .iter()
                .map(|c| {
                    json!({
                        "id": c.id,
                        "type": "function",
                        "function": { "name": c.name, "arguments": c.arguments },
                    })
                })
                .collect();
            let content = if message.content.is_empty() {
                Value::Null
            } else {
                Value::String(message.content.clone())
            };
            json!({ "role": "assistant", "content": content, "tool_calls": calls })
        }
        role => json!({ "role": role.as_str(), "content": message.content }),
    }
}

async fn read_stream(mut response: Response) -> Result<Completion, ChatError> {
    let mut assembler = StreamAssembler::new();
    while let Some(chunk) = response.chunk().await.map_err(transport_error)? {
        assembler.push_bytes(&chunk)?;
        if assembler.is_done() {
            break;
        }
    }
    assembler.finish()
}

fn parse_completion(text: &str) -> Result<Completion, ChatError> {
    let response: Value = serde_json::from_str(text)
        .map_err(|e| ChatError::malformed(SERVICE, format!("response is not JSON: {e}")))?;

    let message = &response["choices"][0]["message"];
    if !message.is_object() {
        return Err(ChatError::malformed(
            SERVICE,
            "Invalid response format: missing choices[0].message",
        ));
    }

    let text = message["content"].as_str().map(ToString::to_string);
    let tool_calls = message["tool_calls"]
        .as_array()
        .map(|calls| calls.iter().map(parse_tool_call).collect::<Result<Vec<_>, _>>())
        .transpose()?
        .unwrap_or_default();

    if text.is_none() && tool_calls.is_empty() {
        return Err(ChatError::malformed(
            SERVICE,
            "Invalid response format: missing content",
        ));
    }

    Ok(Completion {
        text,
        tool_calls,
        usage: parse_usage(&response["usage"]),
    })
}

fn parse_tool_call(call: &Value) -> Result<ToolCall, ChatError> {
    let field = |value: &Value, what: &str| {
        value
            .as_str()
            .map(ToString::to_string)
            .ok_or_else(|| ChatError::malformed(SERVICE, format!("tool call without {what}")))
    };
    Ok(ToolCall {
        id: field(&call["id"], "id")?,
        name: field(&call["function"]["name"], "name")?,
        arguments: call["function"]["arguments"]
            .as_str()
            .unwrap_or_default()
            .to_string(),
    })
}

pub(crate) fn parse_usage(usage: &Value) -> Option<Usage> {
    let u = usage.as_object()?;
    let count = |key: &str| {
        u.get(key)
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(0)
    };
    Some(Usage {
        prompt_tokens: count("prompt_tokens"),
        completion_tokens: count("completion_tokens"),
        total_tokens: count("total_tokens"),
    })
}

/// Pull the human-readable message out of an error body.
fn error_message(body: &str, reason: Option<&str>) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(ToString::to_string))
        .or_else(|| (!body.trim().is_empty()).then(|| body.trim().to_string()))
        .unwrap_or_else(|| reason.unwrap_or("unknown error").to_string())
}

fn transport_error(err: reqwest::Error) -> ChatError {
    if err.is_decode() {
        ChatError::malformed(SERVICE, err.to_string())
    } else {
        ChatError::transient(SERVICE, err.to_string())
    }
}
