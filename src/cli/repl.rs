//! Interactive chat loop

use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::spinner;
use crate::core::{AppState, Request};

const EXIT_WORDS: &[&str] = &["exit", "quit", "bye"];

pub fn is_exit(input: &str) -> bool {
    EXIT_WORDS
        .iter()
        .any(|word| input.trim().eq_ignore_ascii_case(word))
}

pub async fn run(state: Arc<AppState>) -> Result<()> {
    let bot = state.bot_name().to_string();

    state.lifecycle.start_initialization();
    if let Err(e) = spinner::follow_setup(&state.lifecycle, state.config.ready_timeout()).await {
        println!("{}: Error: {}", bot, e);
        return Err(e.into());
    }
    if let Some(setup) = state.lifecycle.setup_time() {
        println!(
            "Chatbot setup completed in {:.2} seconds.",
            setup.as_secs_f64()
        );
    }

    println!("{}: Hi! How can I assist you today?", bot);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("You: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };

        if is_exit(&line) {
            println!("{}: Goodbye! Have a great day.", bot);
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        let response = state
            .coordinator
            .handle(Request::Chat { message: line })
            .await;
        if response.is_error() {
            println!("{}: Error: {}", bot, response.text());
        } else {
            println!("{}: {}", bot, response.text());
        }
    }

    Ok(())
}
