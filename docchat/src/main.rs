//! Docchat - chat with your documents from the terminal.
//!
//! Thin CLI over the `docchat` library: REST commands for sessions and
//! documents, uploads over REST or the real-time channel, and an interactive
//! chat that prints answers as they stream in.

mod cli;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{execute, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docchat=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    execute(cli).await
}
