//! Assembly of a streamed (server-sent events) chat completion.

use std::collections::BTreeMap;

use parley_core::{ChatError, Completion, ToolCall};
use serde_json::Value;

use crate::openai::{SERVICE, parse_usage};

#[derive(Debug, Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

/// Accumulates `chat.completion.chunk` events into one [`Completion`].
#[derive(Debug, Default)]
pub struct StreamAssembler {
    buffer: Vec<u8>,
    text: String,
    saw_text: bool,
    tool_calls: BTreeMap<u64, PartialToolCall>,
    usage: Option<parley_core::Usage>,
    done: bool,
}

impl StreamAssembler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.done
    }

    /// Feed raw bytes from the response body. Lines may be split across
    /// chunks; only complete lines are processed.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> Result<(), ChatError> {
        self.buffer.extend_from_slice(bytes);
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            tracing::trace!("chunk: {}", line.trim_end());
            self.push_line(&line)?;
        }
        Ok(())
    }

    /// Process one SSE line.
    pub fn push_line(&mut self, line: &str) -> Result<(), ChatError> {
        let line = line.trim_end_matches(['\r', '\n']);
        if self.done || line.is_empty() || line.starts_with(':') {
            return Ok(());
        }
        let Some(payload) = line.strip_prefix("data:") else {
            // event:, id:, retry: fields carry nothing we need
            return Ok(());
        };
        let payload = payload.trim();
        if payload == "[DONE]" {
            self.done = true;
            return Ok(());
        }

        let chunk: Value = serde_json::from_str(payload)
            .map_err(|e| ChatError::malformed(SERVICE, format!("invalid stream chunk: {e}")))?;

        if let Some(message) = chunk["error"]["message"].as_str() {
            return Err(ChatError::malformed(SERVICE, message.to_string()));
        }
        if let Some(usage) = parse_usage(&chunk["usage"]) {
            self.usage = Some(usage);
        }

        let delta = &chunk["choices"][0]["delta"];
        if let Some(content) = delta["content"].as_str() {
            self.saw_text = true;
            self.text.push_str(content);
        }
        if let Some(calls) = delta["tool_calls"].as_array() {
            for call in calls {
                let index = call["index"].as_u64().unwrap_or(0);
                let partial = self.tool_calls.entry(index).or_default();
                if let Some(id) = call["id"].as_str() {
                    partial.id.push_str(id);
                }
                if let Some(name) = call["function"]["name"].as_str() {
                    partial.name.push_str(name);
                }
                if let Some(arguments) = call["function"]["arguments"].as_str() {
                    partial.arguments.push_str(arguments);
                }
            }
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<Completion, ChatError> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let rest = String::from_utf8_lossy(&rest).into_owned();
            self.push_line(&rest)?;
        }

        let tool_calls: Vec<ToolCall> = self
            .tool_calls
            .into_values()
            .map(|partial| ToolCall {
                id: partial.id,
                name: partial.name,
                arguments: partial.arguments,
            })
            .collect();

        if !self.saw_text && tool_calls.is_empty() {
            return Err(ChatError::malformed(
                SERVICE,
                "stream ended without content or tool calls",
            ));
        }

        Ok(Completion {
            text: self.saw_text.then_some(self.text),
            tool_calls,
            usage: self.usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::ErrorKind;

    fn chunk(content: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"index": 0, "delta": {"content": content}}]})
        )
    }

    #[test]
    fn concatenates_deltas() {
        let mut assembler = StreamAssembler::new();
        for part in ["Hi", " there", "!"] {
            assert!(assembler.push_bytes(chunk(part).as_bytes()).is_ok());
        }
        assert!(assembler.push_bytes(b"data: [DONE]\n\n").is_ok());
        assert!(assembler.is_done());

        let completion = assembler.finish().unwrap_or_else(|e| panic!("finish failed: {e}"));
        assert_eq!(completion.text.as_deref(), Some("Hi there!"));
        assert!(completion.tool_calls.is_empty());
    }

    #[test]
    fn handles_lines_split_across_chunks() {
        let mut assembler = StreamAssembler::new();
        let event = chunk("split");
        let (a, b) = event.as_bytes().split_at(10);
        assert!(assembler.push_bytes(a).is_ok());
        assert!(assembler.push_bytes(b).is_ok());
        let completion = assembler.finish().unwrap_or_else(|e| panic!("finish failed: {e}"));
        assert_eq!(completion.text.as_deref(), Some("split"));
    }

    #[test]
    fn keeps_multibyte_text_split_across_chunks() {
        let mut assembler = StreamAssembler::new();
        let event = chunk("24°C");
        let bytes = event.as_bytes();
        let degree = event.find('°').unwrap_or_else(|| panic!("no degree sign"));
        let (a, b) = bytes.split_at(degree + 1);
        assert!(assembler.push_bytes(a).is_ok());
        assert!(assembler.push_bytes(b).is_ok());
        let completion = assembler.finish().unwrap_or_else(|e| panic!("finish failed: {e}"));
        assert_eq!(completion.text.as_deref(), Some("24°C"));
    }

    #[test]
    fn assembles_tool_call_fragments() {
        let mut assembler = StreamAssembler::new();
        let first = serde_json::json!({"choices": [{"delta": {"tool_calls": [
            {"index": 0, "id": "call_1", "function": {"name": "web_search", "arguments": "{\"que"}}
        ]}}]});
        let second = serde_json::json!({"choices": [{"delta": {"tool_calls": [
            {"index": 0, "function": {"arguments": "ry\":\"weather\"}"}}
        ]}}]});
        assert!(assembler.push_line(&format!("data: {first}")).is_ok());
        assert!(assembler.push_line(&format!("data: {second}")).is_ok());
        assert!(assembler.push_line("data: [DONE]").is_ok());

        let completion = assembler.finish().unwrap_or_else(|e| panic!("finish failed: {e}"));
        assert_eq!(completion.text, None);
        assert_eq!(completion.tool_calls.len(), 1);
        assert_eq!(completion.tool_calls[0].name, "web_search");
        assert_eq!(completion.tool_calls[0].arguments, r#"{"query":"weather"}"#);
    }

    #[test]
    fn ignores_comments_and_other_fields() {
        let mut assembler = StreamAssembler::new();
        assert!(assembler.push_line(": keep-alive").is_ok());
        assert!(assembler.push_line("event: message").is_ok());
        assert!(assembler.push_bytes(chunk("ok").as_bytes()).is_ok());
        let completion = assembler.finish().unwrap_or_else(|e| panic!("finish failed: {e}"));
        assert_eq!(completion.text.as_deref(), Some("ok"));
    }

    #[test]
    fn invalid_chunk_is_malformed() {
        let mut assembler = StreamAssembler::new();
        let err = assembler.push_line("data: {not json");
        assert!(matches!(
            err.map_err(|e| e.kind()),
            Err(ErrorKind::UpstreamMalformedResponse)
        ));
    }

    #[test]
    fn empty_stream_is_malformed() {
        let mut assembler = StreamAssembler::new();
        assert!(assembler.push_line("data: [DONE]").is_ok());
        assert!(assembler.finish().is_err());
    }
}
