//! The run orchestrator - one invocation, one pass:
//!
//! ```text
//! START -> FETCHED -> FILTERED -> [ENRICH -> RENDER -> DELIVER -> RECORD]* -> REPORTED -> END
//! ```
//!
//! The one ordering rule that must never bend: the ledger is written only
//! after the sink confirms delivery. A crash between deliver and record
//! re-delivers the item next run (accepted); recording first would turn
//! the same crash into silent permanent loss.

use std::collections::HashSet;
use std::time::Instant;

use chrono::Utc;
use futures::StreamExt;
use mcbrief_core::config::BriefConfig;
use mcbrief_core::error::{BriefError, Result};
use mcbrief_core::traits::{Enricher, Feed, Renderer, Sink};
use mcbrief_core::types::FeedItem;
use mcbrief_ledger::DeliveryLedger;
use tokio::sync::Mutex;

use crate::report::{DeliveryAttempt, Outcome, RunResult, Stage};
use crate::retry::{with_retry, RetryPolicy};

/// Knobs for a single run, derived from `[run]` and `[ledger]` config.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub lookback: chrono::Duration,
    pub notify_on_empty: bool,
    pub retry: RetryPolicy,
    pub time_budget: Option<std::time::Duration>,
    pub concurrency: usize,
    pub prune_after: Option<chrono::Duration>,
    /// Enrich and render, log what would be sent, touch nothing.
    pub dry_run: bool,
}

impl RunOptions {
    pub fn from_config(config: &BriefConfig, dry_run: bool) -> Self {
        Self {
            lookback: chrono::Duration::hours(config.run.lookback_hours as i64),
            notify_on_empty: config.run.notify_on_empty,
            retry: RetryPolicy {
                max_retries: config.run.max_retries,
                base_delay: std::time::Duration::from_millis(config.run.retry_backoff_ms),
                max_delay: std::time::Duration::from_millis(config.run.retry_backoff_max_ms),
            },
            time_budget: config.run.time_budget_secs.map(std::time::Duration::from_secs),
            concurrency: config.run.concurrency.max(1),
            prune_after: config
                .ledger
                .prune_after_days
                .map(|days| chrono::Duration::days(days as i64)),
            dry_run,
        }
    }
}

/// Coordinates the adapters for one run. Owns the in-memory run state;
/// the ledger is the only thing that outlives it.
pub struct Orchestrator {
    feeds: Vec<Box<dyn Feed>>,
    enricher: Box<dyn Enricher>,
    renderer: Box<dyn Renderer>,
    sink: Box<dyn Sink>,
    ledger: Mutex<DeliveryLedger>,
    options: RunOptions,
}

impl Orchestrator {
    pub fn new(
        feeds: Vec<Box<dyn Feed>>,
        enricher: Box<dyn Enricher>,
        renderer: Box<dyn Renderer>,
        sink: Box<dyn Sink>,
        ledger: DeliveryLedger,
        options: RunOptions,
    ) -> Self {
        Self { feeds, enricher, renderer, sink, ledger: Mutex::new(ledger), options }
    }

    /// Execute one full run. Run-level failures (fetch) return `Err` after
    /// a best-effort operator notice; per-item failures land in the
    /// report and leave the item un-recorded for the next run.
    pub async fn run(&self) -> Result<RunResult> {
        let mut result = RunResult::new();
        tracing::info!(
            "▶ run {} started (lookback {}h, concurrency {}{})",
            result.run_id,
            self.options.lookback.num_hours(),
            self.options.concurrency,
            if self.options.dry_run { ", dry-run" } else { "" }
        );

        // FETCH - any feed failure is fatal: no partial credit, ledger untouched.
        let mut fetched: Vec<FeedItem> = Vec::new();
        for feed in &self.feeds {
            match feed.fetch(self.options.lookback).await {
                Ok(items) => fetched.extend(items),
                Err(error) => {
                    tracing::error!("fetch failed for {}: {error}", feed.source());
                    self.notify_run_failure(&error).await;
                    return Err(error);
                }
            }
        }
        result.items_fetched = fetched.len();

        // FILTER - combined newest-first order, then within-run dedupe,
        // then drop everything the ledger already has.
        fetched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        let new_items: Vec<FeedItem> = {
            let ledger = self.ledger.lock().await;
            let mut seen = HashSet::new();
            fetched
                .into_iter()
                .filter(|item| {
                    let key = item.ledger_key();
                    if !seen.insert(key.clone()) {
                        tracing::warn!("feed returned duplicate item {key}, keeping first");
                        return false;
                    }
                    !ledger.contains(&key)
                })
                .collect()
        };
        result.items_new = new_items.len();
        tracing::info!("{} of {} fetched items are new", result.items_new, result.items_fetched);

        if new_items.is_empty() {
            if self.options.notify_on_empty && !self.options.dry_run {
                // Informational only; not an item, never enters the ledger.
                let card = self.renderer.render_empty(self.options.lookback);
                if let Err(error) = self.sink.deliver(&card).await {
                    tracing::warn!("failed to deliver no-news card: {error}");
                }
            }
            self.maybe_prune().await;
            result.finish();
            result.log_summary();
            return Ok(result);
        }

        // Per-item pipelines, bounded concurrency. `buffered` keeps report
        // order deterministic; with concurrency 1 it degenerates to the
        // strictly sequential, order-preserving pipeline.
        let deadline = self.options.time_budget.map(|budget| Instant::now() + budget);
        let attempts: Vec<DeliveryAttempt> = futures::stream::iter(new_items)
            .map(|item| self.process_item(item, deadline))
            .buffered(self.options.concurrency)
            .collect()
            .await;
        for attempt in attempts {
            result.absorb(attempt);
        }

        self.maybe_prune().await;
        result.finish();
        result.log_summary();
        Ok(result)
    }

    /// One item through enrich → render → deliver → record. Failures are
    /// contained here; nothing an item does can abort the run.
    async fn process_item(&self, item: FeedItem, deadline: Option<Instant>) -> DeliveryAttempt {
        let key = item.ledger_key();

        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                tracing::warn!("run budget exhausted, deferring {key} to the next run");
                return DeliveryAttempt { key, outcome: Outcome::Deferred, record_error: None };
            }
        }

        // ENRICH - transient failures retry with backoff; permanent ones
        // (or exhaustion) fail the item without a ledger write so the next
        // run inside the window picks it up again.
        let summary = match with_retry(&self.options.retry, deadline, "enrich", || {
            self.enricher.enrich(&item, item.timestamp)
        })
        .await
        {
            Ok(summary) => summary,
            Err(error) => {
                return DeliveryAttempt {
                    key,
                    outcome: Outcome::Failed { stage: Stage::Enrich, error },
                    record_error: None,
                }
            }
        };

        // RENDER - deterministic; a failure is a data bug, retry won't help.
        let card = match self.renderer.render(&item, &summary) {
            Ok(card) => card,
            Err(error) => {
                return DeliveryAttempt {
                    key,
                    outcome: Outcome::Failed { stage: Stage::Render, error },
                    record_error: None,
                }
            }
        };

        if self.options.dry_run {
            tracing::info!("[dry-run] would deliver {key}: {}", summary.title);
            return DeliveryAttempt { key, outcome: Outcome::DryRun, record_error: None };
        }

        // DELIVER - transient failures retry; only a confirmed success
        // may flow into the ledger.
        if let Err(error) =
            with_retry(&self.options.retry, deadline, "deliver", || self.sink.deliver(&card)).await
        {
            return DeliveryAttempt {
                key,
                outcome: Outcome::Failed { stage: Stage::Deliver, error },
                record_error: None,
            };
        }

        // RECORD - immediately after confirmation, to keep the crash
        // window for a duplicate as small as possible.
        let record_error = {
            let mut ledger = self.ledger.lock().await;
            ledger.record(&key, Utc::now());
            match ledger.save() {
                Ok(()) => None,
                Err(error) => {
                    tracing::error!(
                        "🚨 delivered {key} but could not persist the ledger: {error} - \
                         this item will likely be delivered again next run"
                    );
                    Some(error.to_string())
                }
            }
        };

        tracing::info!("✅ delivered {key}");
        DeliveryAttempt { key, outcome: Outcome::Delivered, record_error }
    }

    /// Best-effort operator notice for a run-level failure; independent of
    /// the per-item pipeline.
    async fn notify_run_failure(&self, error: &BriefError) {
        if self.options.dry_run {
            return;
        }
        let card = self.renderer.render_failure(error);
        if let Err(notice_error) = self.sink.deliver(&card).await {
            tracing::warn!("failed to deliver run-failure notice: {notice_error}");
        }
    }

    async fn maybe_prune(&self) {
        let Some(older_than) = self.options.prune_after else {
            return;
        };
        let mut ledger = self.ledger.lock().await;
        if ledger.prune(older_than) > 0 {
            if let Err(error) = ledger.save() {
                tracing::warn!("failed to persist ledger after prune: {error}");
            }
        }
    }
}
