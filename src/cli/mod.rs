//! CLI module

pub mod commands;
pub mod repl;
pub mod spinner;

pub fn run() -> anyhow::Result<()> {
    commands::run()
}
