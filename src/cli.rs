use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "govsi-crawler", about = "Polite crawler for gov.si web properties")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start (or resume) a crawl from the checkpoint or seed list
    Crawl {
        /// Seed URLs, comma-separated, or a path to a file with one per line
        #[arg(short, long)]
        seeds: Option<String>,

        /// Number of concurrent workers
        #[arg(short, long)]
        workers: Option<usize>,

        /// Wall-clock run-time budget in seconds
        #[arg(long)]
        run_time_budget_secs: Option<u64>,

        /// Ignore any existing checkpoint and seed fresh
        #[arg(long)]
        fresh: bool,
    },
}
