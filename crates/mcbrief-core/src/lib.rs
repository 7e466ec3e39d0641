//! # mcbrief Core
//!
//! Shared foundation for the mcbrief pipeline: configuration, the error
//! taxonomy, the feed/enrichment/card/sink data model, and the adapter
//! traits every other crate implements or consumes.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::{BriefConfig, CorruptLedgerPolicy};
pub use error::{BriefError, FailureKind, Result};
pub use traits::{Enricher, Feed, Renderer, Sink};
pub use types::{Bucket, CardPayload, FeedItem, FeedSource, Severity, Summary};
