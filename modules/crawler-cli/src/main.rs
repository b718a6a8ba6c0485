//! Process entry point tying the crawl scheduling core together: one binary,
//! one subcommand per pipeline stage, the way `dev/cli` wires its own
//! subcommands to a shared `AppContext`. Here the shared context is a
//! `PgStore` behind a connection pool.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crawler_common::Config;
use crawler_coordinator::Coordinator;
use crawler_discovery::DiscoveryEngine;
use crawler_store::{PgStore, Store};
use crawler_verifier::Verifier;
use crawler_worker::ExtractionWorker;

#[derive(Parser)]
#[command(name = "crawler-cli", about = "Crawl scheduling core process entry points")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one discovery pass over all due sources (spec §4.B + §4.C).
    Discover {
        /// Ignore `next_due` and discover every source (manual re-crawl).
        #[arg(long)]
        force_all: bool,
    },
    /// Verify all candidates currently in `discovered` status (spec §4.D).
    Verify,
    /// Claim and extract one batch via the coordinator or direct fallback (spec §4.F).
    Extract {
        #[arg(long, default_value_t = 20)]
        batch_size: usize,
        #[arg(long, default_value_t = 5)]
        max_per_domain: usize,
        /// Base URL of a running coordinator; omit to claim directly from Store.
        #[arg(long)]
        coordinator_url: Option<String>,
        /// Identity this worker reports to the coordinator.
        #[arg(long, default_value = "worker-1")]
        worker_id: String,
    },
    /// Run the daily housekeeping sweep (spec §4.G).
    Housekeep {
        /// Compute counts without writing.
        #[arg(long)]
        dry_run: bool,
    },
    /// Serve the work queue coordinator's HTTP RPC surface (spec §4.E + §6).
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    config.log_redacted();

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(config.require_database_url())
        .await
        .context("failed to connect to database")?;
    let store = PgStore::new(pool);
    store.run_migrations().await.context("failed to run migrations")?;

    match cli.command {
        Commands::Discover { force_all } => run_discover(&store, &config, force_all).await,
        Commands::Verify => run_verify(&store).await,
        Commands::Extract { batch_size, max_per_domain, coordinator_url, worker_id } => {
            run_extract(store, config, batch_size, max_per_domain, coordinator_url, worker_id).await
        }
        Commands::Housekeep { dry_run } => run_housekeep(&store, &config, dry_run).await,
        Commands::Serve => run_serve(store, config).await,
    }
}

async fn run_discover(store: &PgStore, config: &Config, force_all: bool) -> Result<()> {
    let now = chrono::Utc::now();
    let sources = store.list_sources().await?;
    let due = crawler_scheduler::due_sources(&sources, now, config, force_all);
    tracing::info!(due = due.len(), total = sources.len(), force_all, "scheduler selected sources");

    let engine = DiscoveryEngine::new();
    let mut discovered = 0usize;
    for due_source in due {
        let summary = engine
            .discover_source(store, &due_source.source, due_source.skip_rss, config)
            .await?;
        tracing::info!(
            source_id = %summary.source_id,
            method = ?summary.method_used,
            inserted = summary.candidates_inserted,
            "discovery pass complete for source"
        );
        discovered += summary.candidates_inserted;
    }
    tracing::info!(total_inserted = discovered, "discover command finished");
    Ok(())
}

async fn run_verify(store: &PgStore) -> Result<()> {
    let pending = store.candidates_by_status(crawler_common::CandidateStatus::Discovered).await?;
    tracing::info!(count = pending.len(), "verifying pending candidates");
    let verifier = Verifier::new();
    for candidate in &pending {
        let status = verifier.verify(store, candidate).await?;
        tracing::debug!(candidate_id = %candidate.id, ?status, "candidate verification complete");
    }
    Ok(())
}

async fn run_extract(
    store: PgStore,
    config: Config,
    batch_size: usize,
    max_per_domain: usize,
    coordinator_url: Option<String>,
    worker_id: String,
) -> Result<()> {
    let store: Arc<dyn Store> = Arc::new(store);
    let worker = ExtractionWorker::new(worker_id, store, config, coordinator_url);
    let report = worker.run_once(batch_size, max_per_domain).await?;
    tracing::info!(
        extracted = report.extracted,
        failed = report.failed,
        aborted_domains = ?report.aborted_domains,
        "extraction batch complete"
    );
    Ok(())
}

async fn run_housekeep(store: &PgStore, config: &Config, dry_run: bool) -> Result<()> {
    let report = crawler_housekeeper::run_sweep(store, config, chrono::Utc::now(), dry_run).await?;
    tracing::info!(
        dry_run = report.dry_run,
        candidates_expired = report.candidates_expired,
        articles_null_text_paused = report.articles_null_text_paused,
        stuck_extracted_warned = report.stuck_extracted_warned,
        stuck_cleaned_warned = report.stuck_cleaned_warned,
        stuck_verified_warned = report.stuck_verified_warned,
        "housekeeping sweep complete"
    );
    Ok(())
}

async fn run_serve(store: PgStore, config: Config) -> Result<()> {
    let store: Arc<dyn Store> = Arc::new(store);
    let host = config.coordinator_host.clone();
    let port = config.coordinator_port;
    let coordinator = Arc::new(Coordinator::new(store, config));
    crawler_coordinator::serve(coordinator, &host, port).await
}
