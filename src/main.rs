mod cli;
mod commands;
mod engine;
mod error;
mod llm;
mod model;
mod store;
mod util;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};

fn main() {
    init_tracing();

    if let Err(err) = run() {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(async move {
        match cli.command {
            Commands::Import(args) => commands::import::run(args),
            Commands::Search(args) => commands::search::run(args).await,
            Commands::MapProducts(args) => commands::map::run_products(args).await,
            Commands::MapCategory(args) => commands::map::run_category(args).await,
            Commands::Learn(args) => commands::learn::run(args).await,
            Commands::Status(args) => commands::status::run(args),
        }
    })
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
