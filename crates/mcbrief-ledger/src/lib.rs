//! Delivery ledger - the only state that survives across runs.
//!
//! A JSON file of `(id, delivered_at)` entries, loaded once at run start
//! and rewritten atomically after every confirmed delivery. Entries are
//! serialized sorted by id so the on-disk form is deterministic and
//! diff-friendly.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use mcbrief_core::config::CorruptLedgerPolicy;
use mcbrief_core::error::{BriefError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
struct LedgerFile {
    entries: Vec<LedgerEntry>,
    #[serde(default)]
    saved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LedgerEntry {
    id: String,
    delivered_at: DateTime<Utc>,
}

/// Persisted set of delivered item ids with their delivery times.
#[derive(Debug)]
pub struct DeliveryLedger {
    path: PathBuf,
    entries: HashMap<String, DateTime<Utc>>,
}

impl DeliveryLedger {
    /// Load the ledger at `path`. A missing file is an empty ledger; an
    /// unparseable file is `CorruptLedger` - the caller's policy decides
    /// whether that aborts the run or starts empty.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("no ledger at {}, starting empty", path.display());
            return Ok(Self { path: path.to_path_buf(), entries: HashMap::new() });
        }
        let content = std::fs::read_to_string(path)?;
        let file: LedgerFile = serde_json::from_str(&content).map_err(|e| {
            BriefError::CorruptLedger(format!("{}: {e}", path.display()))
        })?;
        let entries = file
            .entries
            .into_iter()
            .map(|e| (e.id, e.delivered_at))
            .collect::<HashMap<_, _>>();
        tracing::debug!("loaded ledger with {} entries from {}", entries.len(), path.display());
        Ok(Self { path: path.to_path_buf(), entries })
    }

    /// Load applying the configured corruption policy. `Reset` trades a
    /// possible mass re-delivery for availability and is logged loudly.
    pub fn open_with_policy(path: &Path, policy: CorruptLedgerPolicy) -> Result<Self> {
        match Self::open(path) {
            Ok(ledger) => Ok(ledger),
            Err(BriefError::CorruptLedger(msg)) if policy == CorruptLedgerPolicy::Reset => {
                tracing::error!(
                    "⚠️ ledger is corrupt ({msg}); on_corrupt=reset, starting empty - \
                     every item inside the lookback window will be delivered again"
                );
                Ok(Self { path: path.to_path_buf(), entries: HashMap::new() })
            }
            Err(e) => Err(e),
        }
    }

    /// True iff `id` has previously been recorded as delivered.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Idempotently record a delivery. Returns false if the id was
    /// already present (the original delivery time is kept).
    pub fn record(&mut self, id: &str, delivered_at: DateTime<Utc>) -> bool {
        match self.entries.entry(id.to_string()) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(delivered_at);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Persist the full set atomically: write a sibling temp file, then
    /// rename over the target. A crash mid-write leaves either the old
    /// ledger or the new one, never a truncated parseable file.
    pub fn save(&self) -> Result<()> {
        let mut entries: Vec<LedgerEntry> = self
            .entries
            .iter()
            .map(|(id, at)| LedgerEntry { id: id.clone(), delivered_at: *at })
            .collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));

        let file = LedgerFile { entries, saved_at: Some(Utc::now()) };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| BriefError::Io(std::io::Error::other(e)))?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, &self.path)?;
        tracing::debug!("💾 saved ledger ({} entries) to {}", self.len(), self.path.display());
        Ok(())
    }

    /// Remove entries delivered before `now - older_than`. Returns how
    /// many were dropped. The caller must keep the retention window at
    /// least as long as the fetch lookback, or pruned items re-deliver.
    pub fn prune(&mut self, older_than: chrono::Duration) -> usize {
        let cutoff = Utc::now() - older_than;
        let before = self.entries.len();
        self.entries.retain(|_, at| *at >= cutoff);
        let removed = before - self.entries.len();
        if removed > 0 {
            tracing::info!("pruned {removed} ledger entries older than {cutoff}");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ledger_path(dir: &TempDir) -> PathBuf {
        dir.path().join("ledger.json")
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let ledger = DeliveryLedger::open(&ledger_path(&dir)).unwrap();
        assert!(ledger.is_empty());
    }

    #[test]
    fn record_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut ledger = DeliveryLedger::open(&ledger_path(&dir)).unwrap();
        let t1 = Utc::now();
        assert!(ledger.record("message_center:MC1", t1));
        assert!(!ledger.record("message_center:MC1", Utc::now()));
        assert_eq!(ledger.len(), 1);
        assert!(ledger.contains("message_center:MC1"));
    }

    #[test]
    fn save_and_reload_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = ledger_path(&dir);
        let mut ledger = DeliveryLedger::open(&path).unwrap();
        ledger.record("message_center:MC1", Utc::now());
        ledger.record("service_health:SH1", Utc::now());
        ledger.save().unwrap();

        let reloaded = DeliveryLedger::open(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.contains("message_center:MC1"));
        assert!(reloaded.contains("service_health:SH1"));
        // No temp file left behind after the rename.
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn serialization_is_deterministic() {
        let dir = TempDir::new().unwrap();
        let path = ledger_path(&dir);
        let mut ledger = DeliveryLedger::open(&path).unwrap();
        let t = Utc::now();
        ledger.record("b", t);
        ledger.record("a", t);
        ledger.record("c", t);
        ledger.save().unwrap();
        let first = std::fs::read_to_string(&path).unwrap();
        let a = first.find("\"a\"").unwrap();
        let b = first.find("\"b\"").unwrap();
        let c = first.find("\"c\"").unwrap();
        assert!(a < b && b < c);
    }

    #[test]
    fn corrupt_file_errors_under_abort() {
        let dir = TempDir::new().unwrap();
        let path = ledger_path(&dir);
        std::fs::write(&path, "{ not json").unwrap();
        let err = DeliveryLedger::open(&path).unwrap_err();
        assert!(matches!(err, BriefError::CorruptLedger(_)));
        assert!(
            DeliveryLedger::open_with_policy(&path, CorruptLedgerPolicy::Abort).is_err()
        );
    }

    #[test]
    fn corrupt_file_resets_under_reset() {
        let dir = TempDir::new().unwrap();
        let path = ledger_path(&dir);
        std::fs::write(&path, "not even close").unwrap();
        let ledger =
            DeliveryLedger::open_with_policy(&path, CorruptLedgerPolicy::Reset).unwrap();
        assert!(ledger.is_empty());
    }

    #[test]
    fn prune_drops_only_old_entries() {
        let dir = TempDir::new().unwrap();
        let mut ledger = DeliveryLedger::open(&ledger_path(&dir)).unwrap();
        ledger.record("old", Utc::now() - chrono::Duration::days(90));
        ledger.record("recent", Utc::now());
        let removed = ledger.prune(chrono::Duration::days(30));
        assert_eq!(removed, 1);
        assert!(!ledger.contains("old"));
        assert!(ledger.contains("recent"));
    }
}
