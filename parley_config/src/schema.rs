use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

use parley_core::DEFAULT_SYSTEM_PROMPT;

use crate::ConfigError;

/// Environment variable names.
pub mod env {
    pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
    pub const SERPAPI_API_KEY: &str = "SERPAPI_API_KEY";
    pub const OPENAI_API_MODEL: &str = "OPENAI_API_MODEL";
    pub const OPENAI_API_TEMPERATURE: &str = "OPENAI_API_TEMPERATURE";
    pub const OPENAI_API_BASE: &str = "OPENAI_API_BASE";
    pub const OPENAI_API_STREAMING: &str = "OPENAI_API_STREAMING";
    pub const PARLEY_TOOLS: &str = "PARLEY_TOOLS";
    pub const PARLEY_HISTORY_LIMIT: &str = "PARLEY_HISTORY_LIMIT";
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub agents: AgentsConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AgentsConfig {
    #[serde(default)]
    pub defaults: AgentDefaults,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AgentDefaults {
    #[serde(default = "AgentDefaults::default_model")]
    pub model: String,
    #[serde(default = "AgentDefaults::default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub streaming: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Maximum turns kept in the transcript; unbounded when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_limit: Option<usize>,
    #[serde(default = "AgentDefaults::default_max_tool_iterations")]
    pub max_tool_iterations: usize,
    #[serde(default = "AgentDefaults::default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            model: Self::default_model(),
            temperature: Self::default_temperature(),
            streaming: false,
            system_prompt: None,
            history_limit: None,
            max_tool_iterations: Self::default_max_tool_iterations(),
            request_timeout_secs: Self::default_request_timeout_secs(),
        }
    }
}

impl AgentDefaults {
    fn default_model() -> String {
        "gpt-3.5-turbo".to_string()
    }

    const fn default_temperature() -> f32 {
        0.7
    }

    const fn default_max_tool_iterations() -> usize {
        8
    }

    const fn default_request_timeout_secs() -> u64 {
        60
    }

    #[must_use]
    pub fn system_prompt(&self) -> &str {
        self.system_prompt.as_deref().unwrap_or(DEFAULT_SYSTEM_PROMPT)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub openai: OpenAiSettings,
    #[serde(default)]
    pub serpapi: SerpApiSettings,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OpenAiSettings {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "OpenAiSettings::default_base_url")]
    pub base_url: String,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: Self::default_base_url(),
        }
    }
}

impl OpenAiSettings {
    fn default_base_url() -> String {
        "https://api.openai.com/v1".to_string()
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct SerpApiSettings {
    #[serde(default)]
    pub api_key: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ToolsConfig {
    #[serde(default)]
    pub enabled: BTreeSet<ToolKind>,
}

/// External tools a session may route through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    WebSearch,
}

impl ToolKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WebSearch => "web_search",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "web_search" | "web-search" | "serpapi" => Ok(Self::WebSearch),
            other => Err(ConfigError::invalid(
                env::PARLEY_TOOLS,
                other,
                "unknown tool (expected web_search)",
            )),
        }
    }
}

impl Config {
    /// Resolve configuration from the config file, `.env`, and the process
    /// environment, then validate it.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            info!("Loaded environment from {}", path.display());
        }

        let mut config = match Self::config_path() {
            Ok(path) => Self::from_file(&path)?.unwrap_or_default(),
            Err(e) => {
                warn!("{e}; skipping config file");
                Self::default()
            }
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve configuration from defaults and `lookup` alone.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.apply_env(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a config file, `Ok(None)` when it does not exist.
    pub fn from_file(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded config from {}", path.display());
        Ok(Some(config))
    }

    /// Overlay environment values on top of the current settings.
    ///
    /// Unset and blank variables leave the current value in place.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(key) = get(env::OPENAI_API_KEY) {
            self.providers.openai.api_key = key;
        }
        if let Some(key) = get(env::SERPAPI_API_KEY) {
            self.providers.serpapi.api_key = key;
        }
        if let Some(model) = get(env::OPENAI_API_MODEL) {
            self.agents.defaults.model = model;
        }
        if let Some(base_url) = get(env::OPENAI_API_BASE) {
            self.providers.openai.base_url = base_url;
        }
        if let Some(raw) = get(env::OPENAI_API_TEMPERATURE) {
            self.agents.defaults.temperature = raw.parse().map_err(|_| {
                ConfigError::invalid(env::OPENAI_API_TEMPERATURE, &raw, "expected a number")
            })?;
        }
        if let Some(raw) = get(env::OPENAI_API_STREAMING) {
            self.agents.defaults.streaming = parse_bool(&raw).ok_or_else(|| {
                ConfigError::invalid(env::OPENAI_API_STREAMING, &raw, "expected true or false")
            })?;
        }
        if let Some(raw) = get(env::PARLEY_TOOLS) {
            self.tools.enabled = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::parse::<ToolKind>)
                .collect::<Result<BTreeSet<_>, _>>()?;
        }
        if let Some(raw) = get(env::PARLEY_HISTORY_LIMIT) {
            let limit = raw.parse().map_err(|_| {
                ConfigError::invalid(env::PARLEY_HISTORY_LIMIT, &raw, "expected a whole number")
            })?;
            self.agents.defaults.history_limit = Some(limit);
        }
        Ok(())
    }

    /// Check credentials and parameter ranges. Runs before any client exists.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.providers.openai.api_key.trim().is_empty() {
            return Err(ConfigError::MissingCredential(env::OPENAI_API_KEY));
        }
        if self.web_search_enabled() && self.providers.serpapi.api_key.trim().is_empty() {
            return Err(ConfigError::MissingCredential(env::SERPAPI_API_KEY));
        }

        let defaults = &self.agents.defaults;
        if defaults.model.trim().is_empty() {
            return Err(ConfigError::invalid(
                env::OPENAI_API_MODEL,
                &defaults.model,
                "model must not be empty",
            ));
        }
        if !defaults.temperature.is_finite() || !(0.0..=2.0).contains(&defaults.temperature) {
            return Err(ConfigError::invalid(
                env::OPENAI_API_TEMPERATURE,
                defaults.temperature,
                "must be between 0 and 2",
            ));
        }
        if let Some(limit) = defaults.history_limit.filter(|&limit| limit < 2) {
            return Err(ConfigError::invalid(
                env::PARLEY_HISTORY_LIMIT,
                limit,
                "must keep at least 2 turns",
            ));
        }
        if defaults.request_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "request_timeout_secs",
                0,
                "must be positive",
            ));
        }
        let base_url = &self.providers.openai.base_url;
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::invalid(
                env::OPENAI_API_BASE,
                base_url,
                "must be an http(s) URL",
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn web_search_enabled(&self) -> bool {
        self.tools.enabled.contains(&ToolKind::WebSearch)
    }

    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        Ok(dirs::home_dir()
            .ok_or(ConfigError::NoHomeDir)?
            .join("parley"))
    }

    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Write the config template to `~/parley/config.json`.
    pub fn create_config() -> Result<PathBuf, ConfigError> {
        let config_dir = Self::config_dir()?;
        std::fs::create_dir_all(&config_dir).map_err(|source| ConfigError::Io {
            path: config_dir.clone(),
            source,
        })?;
        let config_path = config_dir.join("config.json");
        Self::write_template(&config_path)?;
        Ok(config_path)
    }

    pub fn write_template(config_path: &Path) -> Result<(), ConfigError> {
        if config_path.exists() {
            return Err(ConfigError::AlreadyExists(config_path.to_path_buf()));
        }
        std::fs::write(config_path, CONFIG_TEMPLATE).map_err(|source| ConfigError::Io {
            path: config_path.to_path_buf(),
            source,
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

const CONFIG_TEMPLATE: &str = r#"{
  "agents": {
    "defaults": {
      "model": "gpt-3.5-turbo",
      "temperature": 0.7,
      "streaming": false,
      "system_prompt": "You are a helpful AI assistant.",
      "history_limit": 100,
      "max_tool_iterations": 8,
      "request_timeout_secs": 60
    }
  },
  "providers": {
    "openai": {
      "api_key": "",
      "base_url": "https://api.openai.com/v1"
    },
    "serpapi": {
      "api_key": ""
    }
  },
  "tools": {
    "enabled": []
  }
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_api_key_is_rejected() {
        let err = Config::from_lookup(lookup(&[]));
        assert!(matches!(
            err,
            Err(ConfigError::MissingCredential(env::OPENAI_API_KEY))
        ));

        let blank = Config::from_lookup(lookup(&[(env::OPENAI_API_KEY, "   ")]));
        assert!(matches!(blank, Err(ConfigError::MissingCredential(_))));
    }

    #[test]
    fn defaults_apply() {
        let config = Config::from_lookup(lookup(&[(env::OPENAI_API_KEY, "sk-test")]))
            .unwrap_or_else(|e| panic!("config: {e}"));
        assert_eq!(config.agents.defaults.model, "gpt-3.5-turbo");
        assert!((config.agents.defaults.temperature - 0.7).abs() < f32::EPSILON);
        assert!(!config.agents.defaults.streaming);
        assert!(!config.web_search_enabled());
        assert_eq!(config.agents.defaults.history_limit, None);
        assert_eq!(config.agents.defaults.system_prompt(), DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn environment_overrides() {
        let config = Config::from_lookup(lookup(&[
            (env::OPENAI_API_KEY, "sk-test"),
            (env::OPENAI_API_MODEL, "gpt-4o-mini"),
            (env::OPENAI_API_TEMPERATURE, "0.2"),
            (env::OPENAI_API_STREAMING, "yes"),
            (env::PARLEY_TOOLS, "web_search"),
            (env::SERPAPI_API_KEY, "serp"),
            (env::PARLEY_HISTORY_LIMIT, "40"),
        ]))
        .unwrap_or_else(|e| panic!("config: {e}"));
        assert_eq!(config.agents.defaults.model, "gpt-4o-mini");
        assert!((config.agents.defaults.temperature - 0.2).abs() < f32::EPSILON);
        assert!(config.agents.defaults.streaming);
        assert!(config.web_search_enabled());
        assert_eq!(config.agents.defaults.history_limit, Some(40));
    }

    #[test]
    fn web_search_requires_serpapi_key() {
        let err = Config::from_lookup(lookup(&[
            (env::OPENAI_API_KEY, "sk-test"),
            (env::PARLEY_TOOLS, "web_search"),
        ]));
        assert!(matches!(
            err,
            Err(ConfigError::MissingCredential(env::SERPAPI_API_KEY))
        ));
    }

    #[test]
    fn serpapi_key_alone_does_not_enable_search() {
        let config = Config::from_lookup(lookup(&[
            (env::OPENAI_API_KEY, "sk-test"),
            (env::SERPAPI_API_KEY, "serp"),
        ]))
        .unwrap_or_else(|e| panic!("config: {e}"));
        assert!(!config.web_search_enabled());
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        for (key, value) in [
            (env::OPENAI_API_TEMPERATURE, "warm"),
            (env::OPENAI_API_TEMPERATURE, "2.5"),
            (env::OPENAI_API_TEMPERATURE, "-0.1"),
            (env::OPENAI_API_STREAMING, "maybe"),
            (env::PARLEY_TOOLS, "calculator"),
            (env::PARLEY_HISTORY_LIMIT, "1"),
            (env::PARLEY_HISTORY_LIMIT, "many"),
            (env::OPENAI_API_BASE, "ftp://example.com"),
        ] {
            let pairs = [(env::OPENAI_API_KEY, "sk-test"), (key, value)];
            let result = Config::from_lookup(lookup(&pairs));
            assert!(
                matches!(result, Err(ConfigError::InvalidParameter { .. })),
                "{key}={value} should be rejected"
            );
        }
    }

    #[test]
    fn template_parses_and_env_completes_it() {
        let mut config: Config =
            serde_json::from_str(CONFIG_TEMPLATE).unwrap_or_else(|e| panic!("template: {e}"));
        assert_eq!(config.agents.defaults.history_limit, Some(100));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingCredential(_))
        ));

        let applied = config.apply_env(lookup(&[(env::OPENAI_API_KEY, "sk-test")]));
        assert!(applied.is_ok());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn file_round_trip() {
        let path = std::env::temp_dir().join(format!(
            "parley-config-test-{}.json",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);

        assert!(matches!(Config::from_file(&path), Ok(None)));
        assert!(Config::write_template(&path).is_ok());
        assert!(matches!(
            Config::write_template(&path),
            Err(ConfigError::AlreadyExists(_))
        ));
        let loaded = Config::from_file(&path);
        assert!(matches!(loaded, Ok(Some(_))));

        let _ = std::fs::remove_file(&path);
    }
}
