//! Adapter traits consumed by the run orchestrator.
//!
//! Every external collaborator sits behind one of these, so the pipeline
//! can be driven end-to-end with fake implementations in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{BriefError, Result};
use crate::types::{CardPayload, FeedItem, FeedSource, Summary};

/// A source of raw items for a lookback window.
#[async_trait]
pub trait Feed: Send + Sync {
    fn source(&self) -> FeedSource;

    /// Fetch items whose last modification falls inside the window ending
    /// now. Errors are `BriefError::Fetch` and fatal for the run.
    async fn fetch(&self, window: chrono::Duration) -> Result<Vec<FeedItem>>;
}

/// Maps a raw item to a human-ready summary.
#[async_trait]
pub trait Enricher: Send + Sync {
    /// `report_date` anchors relative phrasing ("in ~35 days") to the
    /// item's own timeline rather than to wall-clock drift between runs.
    async fn enrich(&self, item: &FeedItem, report_date: DateTime<Utc>) -> Result<Summary>;
}

/// Maps (item, summary) to a renderable card. Deterministic; render
/// failures are treated as data errors and never retried.
pub trait Renderer: Send + Sync {
    fn render(&self, item: &FeedItem, summary: &Summary) -> Result<CardPayload>;

    /// The "no new updates" card posted when a run finds nothing new.
    fn render_empty(&self, window: chrono::Duration) -> CardPayload;

    /// Best-effort operator alert for a run-level failure.
    fn render_failure(&self, error: &BriefError) -> CardPayload;
}

/// Delivers a rendered card to its destination.
#[async_trait]
pub trait Sink: Send + Sync {
    fn name(&self) -> &str;

    async fn deliver(&self, card: &CardPayload) -> Result<()>;
}

impl std::fmt::Debug for dyn Feed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Feed({})", self.source())
    }
}
