//! # mcbrief - Microsoft 365 updates monitor
//!
//! Polls Message Center and Service Health, enriches new items with an AI
//! summary, and posts Adaptive Cards to a Teams webhook. One invocation is
//! one run; `watch` repeats runs on an interval without overlapping them.
//!
//! Usage:
//!   mcbrief run                      # one run (default command)
//!   mcbrief run --dry-run            # enrich and render, send nothing
//!   mcbrief watch                    # poll on run.poll_interval_hours
//!   mcbrief prune --older-than-days 90
//!
//! Exit status: 0 on success (per-item failures self-heal next run),
//! 2 on configuration errors, 1 on run-level failures.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mcbrief_cards::CardBuilder;
use mcbrief_core::error::BriefError;
use mcbrief_core::traits::Feed;
use mcbrief_core::BriefConfig;
use mcbrief_enrich::OpenAiEnricher;
use mcbrief_feed::{GraphAuth, MessageCenterFeed, RoadmapFeed, ServiceHealthFeed};
use mcbrief_ledger::DeliveryLedger;
use mcbrief_run::{Orchestrator, RunOptions};
use mcbrief_sink::TeamsSink;

#[derive(Parser)]
#[command(name = "mcbrief", version, about = "📡 Microsoft 365 updates monitor - AI-enriched cards to Teams")]
struct Cli {
    /// Path to config.toml (default: ~/.mcbrief/config.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Override the lookback window in hours
    #[arg(long, global = true)]
    lookback_hours: Option<u64>,

    /// Enrich and render but deliver nothing and record nothing
    #[arg(long, global = true)]
    dry_run: bool,

    /// Print the run report as JSON on stdout
    #[arg(long, global = true)]
    json: bool,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Execute a single run (the default)
    Run,
    /// Run repeatedly on the configured poll interval
    Watch,
    /// Drop ledger entries older than the given age
    Prune {
        #[arg(long)]
        older_than_days: u64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose { "mcbrief=debug" } else { "mcbrief=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match dispatch(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!("{error:#}");
            match error.downcast_ref::<BriefError>() {
                Some(BriefError::Config(_)) => ExitCode::from(2),
                _ => ExitCode::from(1),
            }
        }
    }
}

async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(hours) = cli.lookback_hours {
        config.run.lookback_hours = hours;
    }
    config.validate()?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            let orchestrator = build_orchestrator(&config, cli.dry_run)?;
            let result = orchestrator.run().await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            }
            Ok(())
        }
        Command::Watch => watch(&config, cli.dry_run).await,
        Command::Prune { older_than_days } => prune(&config, older_than_days),
    }
}

fn load_config(path: Option<&str>) -> anyhow::Result<BriefConfig> {
    match path {
        Some(p) => {
            let expanded = shellexpand::tilde(p).to_string();
            BriefConfig::load_from(&PathBuf::from(expanded)).context("loading config")
        }
        None => BriefConfig::load().context("loading config"),
    }
}

/// Wire the concrete adapters from configuration.
fn build_orchestrator(config: &BriefConfig, dry_run: bool) -> anyhow::Result<Orchestrator> {
    let mut feeds: Vec<Box<dyn Feed>> = Vec::new();
    if config.feeds.message_center || config.feeds.service_health {
        let auth = Arc::new(GraphAuth::new(
            &config.feeds.tenant_id,
            &config.feeds.client_id,
            &config.feeds.resolved_client_secret(),
        )?);
        if config.feeds.message_center {
            feeds.push(Box::new(MessageCenterFeed::new(
                Arc::clone(&auth),
                &config.feeds.graph_endpoint,
            )?));
        }
        if config.feeds.service_health {
            feeds.push(Box::new(ServiceHealthFeed::new(
                auth,
                &config.feeds.graph_endpoint,
            )?));
        }
    }
    if config.feeds.roadmap {
        feeds.push(Box::new(RoadmapFeed::new(&config.feeds.roadmap_endpoint)?));
    }
    if feeds.is_empty() {
        anyhow::bail!(BriefError::Config("no feeds enabled".into()));
    }

    let ledger = DeliveryLedger::open_with_policy(
        &config.ledger.resolved_path(),
        config.ledger.on_corrupt,
    )?;

    Ok(Orchestrator::new(
        feeds,
        Box::new(OpenAiEnricher::new(&config.enrich)?),
        Box::new(CardBuilder::new(&config.cards)),
        Box::new(TeamsSink::new(&config.sink)?),
        ledger,
        RunOptions::from_config(config, dry_run),
    ))
}

/// Repeated runs, strictly sequential so two runs can never race on the
/// ledger. A failed run logs and waits for the next tick.
async fn watch(config: &BriefConfig, dry_run: bool) -> anyhow::Result<()> {
    let interval_secs = config.run.poll_interval_hours * 3600;
    tracing::info!("⏰ watch mode: one run every {}h, Ctrl-C to stop", config.run.poll_interval_hours);

    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received, stopping watch loop");
                return Ok(());
            }
        }

        // Adapters and ledger are rebuilt per run; only the ledger file
        // carries state between iterations.
        match build_orchestrator(config, dry_run) {
            Ok(orchestrator) => {
                if let Err(error) = orchestrator.run().await {
                    tracing::error!("run failed, waiting for next tick: {error}");
                }
            }
            Err(error) => {
                tracing::error!("could not assemble pipeline: {error:#}");
            }
        }
    }
}

fn prune(config: &BriefConfig, older_than_days: u64) -> anyhow::Result<()> {
    let path = config.ledger.resolved_path();
    let mut ledger = DeliveryLedger::open_with_policy(&path, config.ledger.on_corrupt)?;
    let removed = ledger.prune(chrono::Duration::days(older_than_days as i64));
    ledger.save()?;
    tracing::info!("pruned {removed} entries, {} remain in {}", ledger.len(), path.display());
    Ok(())
}
