//! Glitch - chat backend with a bounded worker pool

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "glitch=debug,info".into()),
        )
        // stdout belongs to the chat REPL
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting Glitch v{}", env!("CARGO_PKG_VERSION"));

    glitch::cli::run()
}
