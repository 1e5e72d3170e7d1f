//! campaignsmith CLI: drafts a scored marketing campaign with LLMs.
//!
//! Generates campaign ideas, picks the best one, then drafts and scores a
//! blog post, a launch email and a batch of social posts for it.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
