//! CLI commands

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::core::AppState;
use crate::db::{Database, TranscriptRepository};
use crate::offload::{ingest, DEFAULT_MAX_TOKENS};

#[derive(Parser)]
#[command(name = "glitch")]
#[command(about = "Chat backend that runs model calls, file extraction and transcription on a worker pool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config path (default: ~/.glitch/config.yml)
    #[arg(long, global = true)]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Bind address (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port number (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Chat interactively in the terminal
    Chat,

    /// Extract every supported file in a directory into a JSONL file
    Ingest {
        /// Directory to walk
        dir: PathBuf,

        /// Output file
        #[arg(long, default_value = "processed/scraped.jsonl")]
        out: PathBuf,

        /// Texts above this many tokens are split into sentence chunks
        #[arg(long, default_value_t = DEFAULT_MAX_TOKENS)]
        max_tokens: usize,
    },

    /// Show recent chat turns
    History {
        /// Number of turns to show
        #[arg(long, default_value = "10")]
        limit: usize,
    },
}

fn open_database(config: &Config) -> Result<Database> {
    Database::new(config.resolve_db_path()?)
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    // Multi-threaded runtime; worker slots are its blocking threads
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    rt.block_on(async {
        match cli.command {
            Commands::Serve { host, port } => {
                let host = host.unwrap_or_else(|| config.server.host.clone());
                let port = port.unwrap_or(config.server.port);
                let addr: SocketAddr = format!("{}:{}", host, port)
                    .parse()
                    .with_context(|| format!("Invalid bind address {}:{}", host, port))?;

                let db = open_database(&config)?;
                let state = Arc::new(AppState::from_config(config, Some(db))?);
                tracing::info!(
                    "Starting {} with {} worker slots",
                    state.bot_name(),
                    state.pool.size()
                );

                crate::http::serve(state, addr).await
            }

            Commands::Chat => {
                let db = open_database(&config)?;
                let state = Arc::new(AppState::from_config(config, Some(db))?);

                let result = crate::cli::repl::run(state.clone()).await;
                state.shutdown().await;
                result
            }

            Commands::Ingest {
                dir,
                out,
                max_tokens,
            } => {
                let state = AppState::from_config(config, None)?;

                let result =
                    ingest::ingest_directory(state.coordinator.adapter(), &dir, max_tokens).await;
                state.shutdown().await;

                let files = result?;
                ingest::write_jsonl(&files, &out).await?;
                println!("Wrote {} rows to {}", files.len(), out.display());
                Ok(())
            }

            Commands::History { limit } => {
                let repo = TranscriptRepository::new(open_database(&config)?);
                let entries = repo.recent(limit).await?;

                if entries.is_empty() {
                    println!("No chat history found");
                } else {
                    for entry in entries.into_iter().rev() {
                        println!("[{}]", entry.created_at.format("%Y-%m-%d %H:%M:%S"));
                        println!("User: {}", entry.user_input);
                        println!("{}: {}", entry.bot_name, entry.reply);
                        println!();
                    }
                }
                Ok(())
            }
        }
    })
}
