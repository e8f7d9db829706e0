mod auth;
mod cli;
mod config;
mod delivery;
mod error;
mod models;
mod pipeline;
mod render;
mod sources;
mod summary;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    info!("Starting stale-digest");
    cli.execute().await?;

    Ok(())
}
