use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{Event, KeyCode};
use tokio::sync::broadcast;
use tracing::{info, warn};

use govsi_crawler_core::config::AppConfig;
use govsi_crawler_fetcher::Fetcher;
use govsi_crawler_frontier::Frontier;
use govsi_crawler_storage::PgStore;

use crate::checkpoint::Checkpointer;
use crate::render::HeadlessChromeRenderer;
use crate::seeds::DEFAULT_SEEDS;
use crate::worker::Worker;

pub struct CrawlArgs {
    pub seeds: Option<String>,
    pub workers: Option<usize>,
    pub run_time_budget_secs: Option<u64>,
    pub fresh: bool,
}

/// Loads or seeds the frontier, opens storage, spawns the worker pool,
/// and waits for whichever shutdown trigger fires first: the run-time
/// budget, Ctrl-C, an Esc keypress on the controlling terminal, or
/// every worker exiting on its own. Always checkpoints once, after
/// shutdown is signaled, not before.
pub async fn run(config: AppConfig, args: CrawlArgs) -> Result<()> {
    let frontier = Arc::new(Frontier::new());
    let checkpointer = Checkpointer::new(config.general.checkpoint_path.clone());

    let resumed = if args.fresh {
        false
    } else {
        checkpointer.load(&frontier).await
    };

    if !resumed || frontier.is_empty().await {
        let seed_list = resolve_seeds(&args.seeds, &config);
        let added = frontier.seed(&seed_list).await;
        info!(added, "seeded frontier");
    } else {
        info!(queued = frontier.len().await, "resumed frontier from checkpoint");
    }

    let store = PgStore::new(&config.database.postgres_url, config.database.pool_size).await?;
    store.run_migrations().await?;

    let fetcher = Arc::new(Fetcher::new(
        config.general.thinness_threshold_bytes,
        config.general.max_body_size_mb * 1024 * 1024,
        Duration::from_secs(config.general.http_timeout_secs),
        &config.general.user_agent,
        config.general.default_crawl_delay_secs,
    )?);

    let worker_count = args.workers.unwrap_or(config.general.workers);
    let run_time_budget = Duration::from_secs(
        args.run_time_budget_secs
            .unwrap_or(config.general.run_time_budget_secs),
    );
    let render_min_delay = Duration::from_secs(config.general.render_min_delay_secs);

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let mut handles = Vec::with_capacity(worker_count);
    for id in 0..worker_count {
        let frontier = Arc::clone(&frontier);
        let fetcher = Arc::clone(&fetcher);
        let store = store.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        let renderer = HeadlessChromeRenderer::new(render_min_delay)?;

        handles.push(tokio::spawn(async move {
            let worker = Worker {
                frontier,
                fetcher,
                store,
                renderer,
            };
            worker.run(shutdown_rx).await;
            debug_worker_exit(id);
        }));
    }

    wait_for_shutdown_trigger(run_time_budget, &mut handles).await;

    let _ = shutdown_tx.send(());
    for handle in handles {
        let _ = handle.await;
    }

    if let Err(err) = checkpointer.save(&frontier).await {
        warn!(error = %err, "failed to write checkpoint");
    } else {
        info!("checkpoint written");
    }

    Ok(())
}

fn debug_worker_exit(id: usize) {
    tracing::debug!(worker = id, "worker exited");
}

fn resolve_seeds(cli_seeds: &Option<String>, config: &AppConfig) -> Vec<String> {
    if let Some(raw) = cli_seeds {
        return raw
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }
    if !config.general.seeds.is_empty() {
        return config.general.seeds.clone();
    }
    DEFAULT_SEEDS.iter().map(|s| s.to_string()).collect()
}

async fn wait_for_shutdown_trigger(
    run_time_budget: Duration,
    handles: &mut [tokio::task::JoinHandle<()>],
) {
    tokio::select! {
        _ = tokio::time::sleep(run_time_budget) => {
            info!("run-time budget elapsed");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("ctrl-c received");
        }
        _ = wait_for_escape() => {
            info!("esc pressed");
        }
        _ = wait_for_all_workers(handles) => {
            info!("all workers exited on their own");
        }
    }
}

async fn wait_for_all_workers(handles: &mut [tokio::task::JoinHandle<()>]) {
    for handle in handles.iter_mut() {
        let _ = handle.await;
    }
}

/// Polls the controlling terminal for an Esc keypress without blocking
/// the async runtime. Returns immediately (and forever pends) if no
/// terminal is attached.
async fn wait_for_escape() {
    loop {
        let hit = tokio::task::block_in_place(|| {
            crossterm::event::poll(Duration::from_millis(200))
                .ok()
                .unwrap_or(false)
                .then(|| crossterm::event::read().ok())
                .flatten()
        });

        if let Some(Event::Key(key)) = hit {
            if key.code == KeyCode::Esc {
                return;
            }
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}
