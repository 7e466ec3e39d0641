//! Per-run bookkeeping: delivery attempts and the final run report.

use chrono::{DateTime, Utc};
use mcbrief_core::error::BriefError;
use serde::Serialize;

/// Pipeline stage an item failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Enrich,
    Render,
    Deliver,
    Record,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Enrich => "enrich",
            Self::Render => "render",
            Self::Deliver => "deliver",
            Self::Record => "record",
        };
        f.write_str(name)
    }
}

/// Outcome of one item's trip through the pipeline. Transient - lives only
/// for the duration of the run.
#[derive(Debug)]
pub enum Outcome {
    Delivered,
    Failed { stage: Stage, error: BriefError },
    /// The run budget expired before this item's pipeline started.
    Deferred,
    DryRun,
}

#[derive(Debug)]
pub struct DeliveryAttempt {
    pub key: String,
    pub outcome: Outcome,
    /// A recorded delivery whose ledger save failed; the run continues
    /// but the report carries the duplicate-risk note.
    pub record_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemError {
    pub key: String,
    pub stage: Stage,
    pub error: String,
}

/// Aggregated result of one run, serializable for `--json` reporting.
#[derive(Debug, Serialize)]
pub struct RunResult {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub items_fetched: usize,
    pub items_new: usize,
    pub items_delivered: usize,
    pub items_failed: usize,
    /// Fetched-but-unprocessed items left for the next run by the time
    /// budget; they stay un-recorded and re-fetch naturally.
    pub items_deferred: usize,
    pub errors: Vec<ItemError>,
}

impl RunResult {
    pub fn new() -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            finished_at: None,
            items_fetched: 0,
            items_new: 0,
            items_delivered: 0,
            items_failed: 0,
            items_deferred: 0,
            errors: Vec::new(),
        }
    }

    pub fn absorb(&mut self, attempt: DeliveryAttempt) {
        match attempt.outcome {
            Outcome::Delivered | Outcome::DryRun => self.items_delivered += 1,
            Outcome::Failed { stage, error } => {
                self.items_failed += 1;
                self.errors.push(ItemError {
                    key: attempt.key.clone(),
                    stage,
                    error: error.to_string(),
                });
            }
            Outcome::Deferred => self.items_deferred += 1,
        }
        if let Some(save_error) = attempt.record_error {
            self.errors.push(ItemError {
                key: attempt.key,
                stage: Stage::Record,
                error: save_error,
            });
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn log_summary(&self) {
        tracing::info!(
            "run {} finished: {} fetched, {} new, {} delivered, {} failed, {} deferred",
            self.run_id,
            self.items_fetched,
            self.items_new,
            self.items_delivered,
            self.items_failed,
            self.items_deferred
        );
        for error in &self.errors {
            tracing::warn!("  {} failed at {}: {}", error.key, error.stage, error.error);
        }
    }
}

impl Default for RunResult {
    fn default() -> Self {
        Self::new()
    }
}
