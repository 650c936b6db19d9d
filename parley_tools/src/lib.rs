pub mod web_search;

// Re-export tool types for convenience
pub use web_search::{WebSearchConfig, WebSearchTool};

use std::sync::Arc;

use parley_core::{ChatError, ToolRegistry};

/// Name under which the web search tool registers itself.
pub const WEB_SEARCH: &str = "web_search";

/// Build a registry holding the tools enabled by name.
///
/// `web_search` needs `search` to be provided; any other name is a
/// configuration error.
pub fn registry_for<'a>(
    enabled: impl IntoIterator<Item = &'a str>,
    search: Option<WebSearchConfig>,
) -> Result<ToolRegistry, ChatError> {
    let mut registry = ToolRegistry::new();
    let mut search = search;
    for name in enabled {
        match name {
            WEB_SEARCH => {
                let config = search.take().ok_or_else(|| {
                    ChatError::Configuration(
                        "web_search is enabled but SERPAPI_API_KEY is not set".into(),
                    )
                })?;
                registry.register(Arc::new(WebSearchTool::new(config)?));
            }
            other => {
                return Err(ChatError::Configuration(format!("Unknown tool: {other}")));
            }
        }
    }
    Ok(registry)
}
