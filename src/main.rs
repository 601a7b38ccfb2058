mod checkpoint;
mod cli;
mod lifecycle;
mod render;
mod seeds;
mod worker;

use anyhow::Result;
use clap::Parser;
use tracing::warn;
use tracing_subscriber::prelude::*;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use govsi_crawler_core::config::AppConfig;

use crate::cli::{Cli, Commands};
use crate::lifecycle::CrawlArgs;

fn main() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(32)
        .thread_stack_size(8 * 1024 * 1024)
        .max_blocking_threads(512)
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    let cli = Cli::parse();

    let config_str = std::fs::read_to_string(&cli.config).unwrap_or_else(|_| {
        eprintln!("config file {} not found, using defaults", cli.config);
        include_str!("../config/default.toml").to_string()
    });
    let config: AppConfig = toml::from_str(&config_str)?;

    init_logging(&config);

    match cli.command {
        Commands::Crawl {
            seeds,
            workers,
            run_time_budget_secs,
            fresh,
        } => {
            lifecycle::run(
                config,
                CrawlArgs {
                    seeds,
                    workers,
                    run_time_budget_secs,
                    fresh,
                },
            )
            .await?;
        }
    }

    Ok(())
}

/// Three log sinks: a debug-level console stream, a warn-or-worse file,
/// and an error-or-worse file.
fn init_logging(config: &AppConfig) {
    let console_layer = tracing_subscriber::fmt::layer().with_target(true).with_filter(
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
    );

    let warn_file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.logging.warn_log_path)
    {
        Ok(f) => Some(f),
        Err(err) => {
            eprintln!("could not open {}: {err}", config.logging.warn_log_path);
            None
        }
    };
    let error_file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.logging.error_log_path)
    {
        Ok(f) => Some(f),
        Err(err) => {
            eprintln!("could not open {}: {err}", config.logging.error_log_path);
            None
        }
    };

    let warn_layer = warn_file.map(|f| {
        tracing_subscriber::fmt::layer()
            .with_writer(f)
            .with_ansi(false)
            .with_filter(tracing_subscriber::filter::LevelFilter::WARN)
    });
    let error_layer = error_file.map(|f| {
        tracing_subscriber::fmt::layer()
            .with_writer(f)
            .with_ansi(false)
            .with_filter(tracing_subscriber::filter::LevelFilter::ERROR)
    });

    let registry = tracing_subscriber::registry()
        .with(console_layer)
        .with(warn_layer)
        .with(error_layer);

    if registry.try_init().is_err() {
        warn!("tracing already initialized");
    }
}
