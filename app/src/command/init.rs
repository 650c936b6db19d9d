use parley_config::Config;

/// Strategy for writing the configuration template to `~/parley/config.json`.
#[derive(Debug, Clone, Copy)]
pub struct InitStrategy;

impl super::CommandStrategy for InitStrategy {
    type Input = ();

    async fn execute(&self, _input: Self::Input) -> anyhow::Result<()> {
        let path = Config::create_config()?;
        println!("Config created at: {}", path.display());
        println!("Set OPENAI_API_KEY in the file, your environment, or a .env file.");
        Ok(())
    }
}
