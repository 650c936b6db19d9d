use parley_config::{Config, env};

/// Strategy for displaying the resolved configuration, keys masked.
#[derive(Debug, Clone, Copy)]
pub struct InfoStrategy;

impl super::CommandStrategy for InfoStrategy {
    type Input = ();

    async fn execute(&self, _input: Self::Input) -> anyhow::Result<()> {
        let config = Config::load()?;

        println!("=== parley Configuration ===\n");

        if let Ok(path) = Config::config_path() {
            println!("Config File: {}", path.display());
            println!();
        }

        println!("API Keys:");
        println!(
            "  {}: {}",
            env::OPENAI_API_KEY,
            mask_secret(&config.providers.openai.api_key)
        );
        println!(
            "  {}: {}",
            env::SERPAPI_API_KEY,
            mask_secret(&config.providers.serpapi.api_key)
        );
        println!();

        println!("Chat Endpoint:");
        println!("  Base URL: {}", config.providers.openai.base_url);
        println!("  Timeout: {}s", config.agents.defaults.request_timeout_secs);
        println!();

        let defaults = &config.agents.defaults;
        println!("Agent Defaults:");
        println!("  Model: {}", defaults.model);
        println!("  Temperature: {}", defaults.temperature);
        println!("  Streaming: {}", defaults.streaming);
        println!("  System Prompt: {}", truncate(defaults.system_prompt(), 60));
        match defaults.history_limit {
            Some(limit) => println!("  History Limit: {limit}"),
            None => println!("  History Limit: (unbounded)"),
        }
        println!("  Max Tool Iterations: {}", defaults.max_tool_iterations);
        println!();

        println!("Tools:");
        if config.tools.enabled.is_empty() {
            println!("  (none enabled)");
        } else {
            for tool in &config.tools.enabled {
                println!("  {tool}");
            }
        }

        Ok(())
    }
}

fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.is_empty() {
        "(not set)".to_string()
    } else if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    } else {
        "***".to_string()
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}
