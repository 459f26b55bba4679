//! Setup progress spinner

use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::core::CoreError;
use crate::session::{ChatSession, SessionLifecycle};

const FRAMES: &[&str] = &["|", "/", "-", "\\", " "];

fn setup_bar() -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{msg}{spinner}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(FRAMES);
    bar.set_style(style);
    bar.set_message(" Processing documents: ");
    bar
}

/// Wait for the session, advancing the spinner on every lifecycle progress tick
pub async fn follow_setup(
    lifecycle: &SessionLifecycle,
    timeout: Duration,
) -> Result<Arc<dyn ChatSession>, CoreError> {
    let bar = setup_bar();
    let mut progress = lifecycle.progress();

    let ready = lifecycle.await_ready(timeout);
    tokio::pin!(ready);

    let outcome = loop {
        tokio::select! {
            outcome = &mut ready => break outcome,
            changed = progress.changed() => match changed {
                Ok(()) => bar.tick(),
                Err(_) => break (&mut ready).await,
            },
        }
    };

    bar.finish_and_clear();
    if outcome.is_ok() {
        println!(" Processing documents: Done!");
    }
    outcome
}
