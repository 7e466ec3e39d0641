//! # mcbrief Run
//!
//! The run orchestrator and its supporting pieces: the per-run state
//! machine, the bounded retry/backoff policy, and the run report.
//!
//! One invocation is one run - fetch, filter against the ledger, enrich,
//! render, deliver, record, report. The process is expected to terminate
//! at the end of a run; nothing here spawns long-lived tasks.

pub mod orchestrator;
pub mod report;
pub mod retry;

pub use orchestrator::{Orchestrator, RunOptions};
pub use report::{DeliveryAttempt, ItemError, Outcome, RunResult, Stage};
pub use retry::{with_retry, RetryPolicy};
