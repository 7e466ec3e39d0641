//! Error taxonomy for the whole pipeline.
//!
//! Run-level failures (`Config`, `Fetch`, `CorruptLedger`) abort a run.
//! Per-item failures (`Enrichment`, `Render`, `Delivery`) are recorded in
//! the run report and never abort the run; the item is simply not written
//! to the ledger, so the next run inside the lookback window retries it.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BriefError>;

/// Whether a failed call is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Expected to succeed on retry (rate limit, timeout, 5xx).
    Transient,
    /// Will not succeed on retry (bad payload, auth rejection, 4xx).
    Permanent,
}

#[derive(Debug, Error)]
pub enum BriefError {
    /// Pre-run configuration validation failure. Fail fast, nothing runs.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Feed fetch failure. Fatal for the run: no items are processed and
    /// the ledger is left untouched.
    #[error("feed fetch failed: {0}")]
    Fetch(String),

    /// The persisted ledger exists but cannot be parsed.
    #[error("delivery ledger is corrupt: {0}")]
    CorruptLedger(String),

    /// Enrichment call failure for a single item.
    #[error("enrichment failed: {message}")]
    Enrichment { kind: FailureKind, message: String },

    /// Card rendering failure. Deterministic, never retried.
    #[error("card render failed: {0}")]
    Render(String),

    /// Sink delivery failure for a single card.
    #[error("delivery failed: {message}")]
    Delivery { kind: FailureKind, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BriefError {
    pub fn enrichment_transient(message: impl Into<String>) -> Self {
        Self::Enrichment { kind: FailureKind::Transient, message: message.into() }
    }

    pub fn enrichment_permanent(message: impl Into<String>) -> Self {
        Self::Enrichment { kind: FailureKind::Permanent, message: message.into() }
    }

    pub fn delivery_transient(message: impl Into<String>) -> Self {
        Self::Delivery { kind: FailureKind::Transient, message: message.into() }
    }

    pub fn delivery_permanent(message: impl Into<String>) -> Self {
        Self::Delivery { kind: FailureKind::Permanent, message: message.into() }
    }

    /// True iff a bounded retry with backoff may help.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Enrichment { kind: FailureKind::Transient, .. }
                | Self::Delivery { kind: FailureKind::Transient, .. }
        )
    }
}

/// Classify an HTTP status for the enrichment/delivery adapters.
/// 408/429 and server errors are transient; everything else permanent.
pub fn classify_status(status: u16) -> FailureKind {
    match status {
        408 | 429 => FailureKind::Transient,
        500..=599 => FailureKind::Transient,
        _ => FailureKind::Permanent,
    }
}
