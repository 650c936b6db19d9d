//! Multi-turn chat command.
//!
//! With `--message` a single turn is sent and the reply printed; otherwise
//! an interactive loop keeps one session open until the user exits.

use std::io::Write;

use parley_conversation::SessionManager;
use tracing::{debug, info};

use super::{Overrides, build_session};
use crate::repl::{Line, render_history, render_stats};

/// Input parameters for the Chat command strategy.
#[derive(Debug, Clone)]
pub struct ChatInput {
    /// Optional single message to send (non-interactive mode)
    pub message: Option<String>,
    /// Optional model override
    pub model: Option<String>,
    pub web_search: bool,
    /// Number of turns to keep in the transcript
    pub history_limit: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
pub struct ChatStrategy;

impl super::CommandStrategy for ChatStrategy {
    type Input = ChatInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let overrides = Overrides {
            model: input.model,
            web_search: input.web_search,
            history_limit: input.history_limit,
        };
        let mut session = build_session(&overrides)?;
        info!(
            "Starting chat session {} (route: {:?})",
            session.session_id(),
            session.route()
        );

        if let Some(msg) = input.message {
            let reply = session.submit(&msg).await?;
            println!("{}", reply.text);
            return Ok(());
        }

        run_interactive(&mut session).await?;
        info!("Chat session ended: {} turns", session.stats().total_turns);
        Ok(())
    }
}

async fn run_interactive(session: &mut SessionManager) -> anyhow::Result<()> {
    println!("=== parley ({}) ===", session.config().model);
    println!("Type 'exit' to quit; /history, /reset, /stats for the transcript.\n");

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut input = String::new();
        if std::io::stdin().read_line(&mut input)? == 0 {
            // EOF
            println!();
            break;
        }

        match Line::parse(&input) {
            Line::Empty => {}
            Line::Exit => break,
            Line::History => print!("{}", render_history(session.history())),
            Line::Reset => {
                session.clear();
                println!("Conversation cleared.");
            }
            Line::Stats => print!("{}", render_stats(&session.stats())),
            Line::Message(text) => {
                eprintln!("Thinking...");
                match session.submit(text).await {
                    Ok(reply) => {
                        println!("AI: {}\n", reply.text);
                        if let Some(usage) = reply.usage {
                            debug!(
                                "Tokens: {} prompt + {} completion = {} total",
                                usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
                            );
                        }
                    }
                    Err(e) => eprintln!("Error: {e}\n"),
                }
            }
        }
    }

    Ok(())
}
