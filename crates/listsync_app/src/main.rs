mod app;
mod cli;
mod config;
mod progress;
mod report;

use std::path::Path;

use clap::Parser;

const LOG_FILE: &str = "./listsync.log";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    sync_logging::initialize(cli.log.into(), cli.level(), Path::new(LOG_FILE));
    app::run(cli).await
}
