//! Static strategy pattern for CLI commands.
//!
//! Each command is a separate strategy type with its own input, dispatched
//! statically from `main`.

use std::sync::Arc;
use std::time::Duration;

use parley_config::{Config, ToolKind};
use parley_conversation::{SessionConfig, SessionManager};
use parley_providers::OpenAiProvider;
use parley_tools::{WebSearchConfig, registry_for};
use tracing::info;

mod chat;
mod info;
mod init;
mod version;

pub use chat::{ChatInput, ChatStrategy};
pub use info::InfoStrategy;
pub use init::InitStrategy;
pub use version::VersionStrategy;

/// Contract shared by all command strategies.
///
/// Each strategy defines its own input type, so parameters are passed
/// without runtime casting or boxing.
pub trait CommandStrategy: Send + Sync + 'static {
    type Input;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()>;
}

/// Command-line overrides applied on top of the loaded configuration.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub model: Option<String>,
    pub web_search: bool,
    pub history_limit: Option<usize>,
}

impl Overrides {
    fn apply(&self, config: &mut Config) {
        if let Some(model) = &self.model {
            config.agents.defaults.model.clone_from(model);
        }
        if self.web_search {
            config.tools.enabled.insert(ToolKind::WebSearch);
        }
        if let Some(limit) = self.history_limit {
            config.agents.defaults.history_limit = Some(limit);
        }
    }
}

/// Resolve configuration and build one session from it.
///
/// All validation happens before the HTTP clients are created.
pub fn build_session(overrides: &Overrides) -> anyhow::Result<SessionManager> {
    let mut config = Config::load()?;
    overrides.apply(&mut config);
    config.validate()?;

    let provider = OpenAiProvider::new(
        config.providers.openai.api_key.clone(),
        Duration::from_secs(config.agents.defaults.request_timeout_secs),
    )?
    .with_base_url(&config.providers.openai.base_url);
    info!("Using chat endpoint {}", provider.base_url());

    let tools = if config.tools.enabled.is_empty() {
        None
    } else {
        let search = config
            .web_search_enabled()
            .then(|| WebSearchConfig::new(config.providers.serpapi.api_key.clone()));
        Some(registry_for(
            config.tools.enabled.iter().map(|kind| kind.as_str()),
            search,
        )?)
    };

    Ok(SessionManager::new(
        Arc::new(provider),
        SessionConfig::from_config(&config),
        tools,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_apply() {
        let mut config = Config::default();
        Overrides {
            model: Some("gpt-4o-mini".to_string()),
            web_search: true,
            history_limit: Some(12),
        }
        .apply(&mut config);

        assert_eq!(config.agents.defaults.model, "gpt-4o-mini");
        assert!(config.web_search_enabled());
        assert_eq!(config.agents.defaults.history_limit, Some(12));
    }

    #[test]
    fn test_empty_overrides_keep_config() {
        let mut config = Config::default();
        Overrides::default().apply(&mut config);
        assert_eq!(config.agents.defaults.model, "gpt-3.5-turbo");
        assert!(!config.web_search_enabled());
    }
}
