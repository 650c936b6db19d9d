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

use async_trait::async_trait;
use parley_core::{ChatError, Tool, ToolDefinition, ToolResult, schema_object};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

const SERVICE: &str = "serpapi";

/// Web search tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchConfig {
    pub api_key: String,

    #[serde(default = "WebSearchConfig::default_base_url")]
    pub base_url: String,

    /// Request timeout (seconds)
    #[serde(default = "WebSearchConfig::default_timeout")]
    pub timeout: u64,

    /// Organic results kept in the summary handed to the model
    #[serde(default = "WebSearchConfig::default_max_results")]
    pub max_results: usize,

    #[serde(default = "WebSearchConfig::default_engine")]
    pub engine: String,
    #[serde(default = "WebSearchConfig::default_google_domain")]
    pub google_domain: String,
    /// Country (`gl`)
    #[serde(default = "WebSearchConfig::default_gl")]
    pub gl: String,
    /// Interface language (`hl`)
    #[serde(default = "WebSearchConfig::default_hl")]
    pub hl: String,
}

impl WebSearchConfig {
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: Self::default_base_url(),
            timeout: Self::default_timeout(),
            max_results: Self::default_max_results(),
            engine: Self::default_engine(),
            google_domain: Self::default_google_domain(),
            gl: Self::default_gl(),
            hl: Self::default_hl(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn default_base_url() -> String {
        "https://serpapi.com".to_string()
    }

    const fn default_timeout() -> u64 {
        20
    }

    const fn default_max_results() -> usize {
        5
    }

    fn default_engine() -> String {
        "google".to_string()
    }

    fn default_google_domain() -> String {
        "google.com".to_string()
    }

    fn default_gl() -> String {
        "us".to_string()
    }

    fn default_hl() -> String {
        "en".to_string()
    }
}

/// What the model sees from one search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    pub results: Vec<SearchHit>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

/// Live web search backed by SerpAPI.
pub struct WebSearchTool {
    client: Client,
    config: WebSearchConfig,
}

impl WebSearchTool {
    pub fn new(config: WebSearchConfig) -> Result<Self, ChatError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .build()
            .map_err(|e| ChatError::Configuration(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    async fn search(&self, query: &str) -> Result<Value, ChatError> {
        let response = self
            .client
            .get(format!("{}/search.json", self.config.base_url))
            .query(&[
                ("q", query),
                ("api_key", self.config.api_key.as_str()),
                ("engine", self.config.engine.as_str()),
                ("google_domain", self.config.google_domain.as_str()),
                ("gl", self.config.gl.as_str()),
                ("hl", self.config.hl.as_str()),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;
        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v["error"].as_str().map(ToString::to_string))
                .unwrap_or(text);
            return Err(ChatError::from_status(SERVICE, status.as_u16(), message));
        }

        serde_json::from_str(&text)
            .map_err(|e| ChatError::malformed(SERVICE, format!("response is not JSON: {e}")))
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &'static str {
        crate::WEB_SEARCH
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: "Search the web for current information. \
                Use for recent events, facts you are unsure about, or anything time-sensitive."
                .to_string(),
            input_schema: schema_object(
                serde_json::json!({
                    "query": {
                        "type": "string",
                        "description": "The search query"
                    }
                }),
                &["query"],
            ),
        }
    }

    async fn execute(&self, input: Value) -> Result<ToolResult, ChatError> {
        let Some(query) = input
            .get("query")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|q| !q.is_empty())
        else {
            return Ok(ToolResult::error("Missing required parameter: query")
                .with_error_type("invalid_arguments"));
        };

        info!("Searching the web: {query}");
        let body = self.search(query).await?;

        // SerpAPI reports "no results" and similar conditions in-band.
        if let Some(message) = body["error"].as_str() {
            debug!("Search returned an error message: {message}");
            return Ok(ToolResult::error(message.to_string()).with_error_type("search_error"));
        }

        let summary = summarize(&body, self.config.max_results);
        let content = serde_json::to_string(&summary)
            .map_err(|e| ChatError::malformed(SERVICE, e.to_string()))?;
        Ok(ToolResult::success(content))
    }
}

/// Reduce a SerpAPI payload to the answer box and the top organic results.
fn summarize(body: &Value, max_results: usize) -> SearchSummary {
    let text = |v: &Value| v.as_str().map(ToString::to_string);

    let answer = text(&body["answer_box"]["answer"])
        .or_else(|| text(&body["answer_box"]["snippet"]))
        .or_else(|| {
            body["answer_box"]["snippet_highlighted_words"]
                .as_array()
                .and_then(|words| words.first())
                .and_then(text)
        })
        .or_else(|| text(&body["knowledge_graph"]["description"]));

    let results = body["organic_results"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    Some(SearchHit {
                        title: text(&item["title"])?,
                        link: text(&item["link"]),
                        snippet: text(&item["snippet"]),
                    })
                })
                .take(max_results)
                .collect()
        })
        .unwrap_or_default();

    SearchSummary { answer, results }
}

fn transport_error(err: reqwest::Error) -> ChatError {
    if err.is_decode() {
        ChatError::malformed(SERVICE, err.to_string())
    } else {
        ChatError::transient(SERVICE, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::ErrorKind;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup_mock_server(template: ResponseTemplate) -> (MockServer, WebSearchTool) {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search.json"))
            .and(query_param("api_key", "test_key"))
            .and(query_param("engine", "google"))
            .and(query_param("gl", "us"))
            .and(query_param("hl", "en"))
            .respond_with(template)
            .mount(&mock_server)
            .await;

        let config = WebSearchConfig::new("test_key").with_base_url(mock_server.uri());
        let tool = WebSearchTool::new(config).unwrap_or_else(|e| panic!("tool: {e}"));
        (mock_server, tool)
    }

    #[test]
    fn test_web_search_config_default() {
        let config = WebSearchConfig::new("k");
        assert_eq!(config.timeout, 20);
        assert_eq!(config.max_results, 5);
        assert_eq!(config.google_domain, "google.com");
    }

    #[test]
    fn test_web_search_definition() {
        let Ok(tool) = WebSearchTool::new(WebSearchConfig::new("k")) else {
            panic!("Failed to create WebSearchTool");
        };
        let def = tool.definition();
        assert_eq!(def.name, "web_search");
        assert_eq!(def.input_schema["required"][0], "query");
    }

    #[tokio::test]
    async fn test_search_summarizes_results() {
        let body = json!({
            "search_metadata": {"status": "Success"},
            "answer_box": {"type": "weather_result", "snippet": "Sunny, 24°C"},
            "organic_results": [
                {"position": 1, "title": "Weather today", "link": "https://example.com/w", "snippet": "Clear skies"},
                {"position": 2, "link": "https://example.com/untitled"},
                {"position": 3, "title": "Forecast", "link": "https://example.com/f"}
            ]
        });
        let (_server, tool) =
            setup_mock_server(ResponseTemplate::new(200).set_body_json(body)).await;

        let result = tool
            .execute(json!({"query": "weather today"}))
            .await
            .unwrap_or_else(|e| panic!("search failed: {e}"));
        assert!(!result.is_error);

        let summary: SearchSummary =
            serde_json::from_str(&result.content).unwrap_or_else(|e| panic!("summary: {e}"));
        assert_eq!(summary.answer.as_deref(), Some("Sunny, 24°C"));
        assert_eq!(summary.results.len(), 2);
        assert_eq!(summary.results[0].title, "Weather today");
        assert_eq!(summary.results[1].snippet, None);
    }

    #[tokio::test]
    async fn test_missing_query_is_error_result() {
        let Ok(tool) = WebSearchTool::new(WebSearchConfig::new("k")) else {
            panic!("Failed to create WebSearchTool");
        };
        let result = tool.execute(json!({"query": "  "})).await;
        assert!(result.is_ok_and(|r| r.is_error));
    }

    #[tokio::test]
    async fn test_invalid_key_is_auth_error() {
        let (_server, tool) = setup_mock_server(
            ResponseTemplate::new(401).set_body_json(json!({"error": "Invalid API key."})),
        )
        .await;
        let err = tool.execute(json!({"query": "weather"})).await;
        let Err(err) = err else {
            panic!("expected an error");
        };
        assert_eq!(err.kind(), ErrorKind::UpstreamAuth);
        assert!(err.to_string().contains("Invalid API key."));
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let (_server, tool) = setup_mock_server(ResponseTemplate::new(502)).await;
        let err = tool.execute(json!({"query": "weather"})).await;
        assert!(matches!(
            err.map_err(|e| e.kind()),
            Err(ErrorKind::UpstreamTransient)
        ));
    }

    #[tokio::test]
    async fn test_in_band_error_goes_back_to_model() {
        let (_server, tool) = setup_mock_server(ResponseTemplate::new(200).set_body_json(
            json!({"error": "Google hasn't returned any results for this query."}),
        ))
        .await;
        let result = tool
            .execute(json!({"query": "zzzz"}))
            .await
            .unwrap_or_else(|e| panic!("search failed: {e}"));
        assert!(result.is_error);
        assert_eq!(result.error_type.as_deref(), Some("search_error"));
    }

    #[test]
    fn test_summarize_knowledge_graph_fallback() {
        let body = json!({"knowledge_graph": {"description": "A city in Japan"}});
        let summary = summarize(&body, 5);
        assert_eq!(summary.answer.as_deref(), Some("A city in Japan"));
        assert!(summary.results.is_empty());
    }
}
