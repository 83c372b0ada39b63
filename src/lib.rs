pub mod app;
pub mod capture;
pub mod cli;
pub mod db;
pub mod errors;
pub mod models;
pub mod recognition;
pub mod settings;
pub mod utils;

use anyhow::{Context, Result};
use clap::Parser;

use cli::Cli;

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG overrides; SIGSCAN_DEBUG only lowers the default.
    let default_level = if std::env::var_os("SIGSCAN_DEBUG").is_some() {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(default_level)
        .parse_default_env()
        .init();

    log::debug!("sigscan {} starting", env!("CARGO_PKG_VERSION"));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(cli::dispatch(cli))
}
