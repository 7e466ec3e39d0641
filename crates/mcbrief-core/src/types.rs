//! Pipeline data model: raw feed items, enrichment summaries, and card
//! payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Which feed an item came from. The stable string form namespaces ledger
/// keys so ids from different feeds can never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedSource {
    MessageCenter,
    ServiceHealth,
    Roadmap,
}

impl FeedSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MessageCenter => "message_center",
            Self::ServiceHealth => "service_health",
            Self::Roadmap => "roadmap",
        }
    }

    /// Human-readable label shown on cards.
    pub fn label(&self) -> &'static str {
        match self {
            Self::MessageCenter => "Message Center",
            Self::ServiceHealth => "Service Health",
            Self::Roadmap => "Roadmap",
        }
    }
}

impl std::fmt::Display for FeedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw item as returned by a feed. `payload` is the untouched source
/// record; the enricher extracts what it needs from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: String,
    pub source: FeedSource,
    pub title: String,
    /// Last-modified time, falling back to start time, falling back to
    /// fetch time. Drives combined ordering and the enrichment report date.
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl FeedItem {
    /// Key under which this item is tracked in the delivery ledger.
    pub fn ledger_key(&self) -> String {
        format!("{}:{}", self.source.as_str(), self.id)
    }
}

/// Whether an item needs admin action or is informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Action,
    #[default]
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Important,
    #[default]
    Normal,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Important => "important",
            Self::Normal => "normal",
        }
    }

    pub fn is_alerting(&self) -> bool {
        matches!(self, Self::Critical | Self::High)
    }
}

/// The enrichment result for one item. Deserialization is deliberately
/// tolerant: models return `actions` as a string or a list, and `chips` as
/// bare strings or `{ "text": ... }` objects.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Summary {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub service: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub bucket: Bucket,
    #[serde(default, deserialize_with = "null_as_default")]
    pub severity: Severity,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_major_change: bool,
    #[serde(default, deserialize_with = "chips_or_strings")]
    pub chips: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub what: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub why: String,
    #[serde(default, deserialize_with = "string_or_seq")]
    pub actions: Vec<String>,
    #[serde(default)]
    pub window: Option<String>,
    #[serde(default)]
    pub countdown: Option<String>,
    #[serde(default)]
    pub latest_update: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub published: Option<String>,
    #[serde(default, deserialize_with = "string_or_seq")]
    pub affected_services: Vec<String>,
}

impl Summary {
    /// A summary with no title and no body text cannot produce a useful
    /// card; the renderer rejects it.
    pub fn is_blank(&self) -> bool {
        self.title.trim().is_empty() && self.what.trim().is_empty()
    }
}

/// A rendered card, opaque to the orchestrator and the sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardPayload(pub serde_json::Value);

impl CardPayload {
    pub fn into_inner(self) -> serde_json::Value {
        self.0
    }
}

/// The enrichment prompt says "use null or empty values if unknown", so
/// every summary field has to survive an explicit null.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: serde::Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn string_or_seq<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
        None,
    }
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) if s.trim().is_empty() => Vec::new(),
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
        OneOrMany::None => Vec::new(),
    })
}

fn chips_or_strings<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Chip {
        Text(String),
        Tagged { text: String },
    }
    let chips: Option<Vec<Chip>> = Option::deserialize(deserializer)?;
    Ok(chips
        .unwrap_or_default()
        .into_iter()
        .map(|c| match c {
            Chip::Text(t) => t,
            Chip::Tagged { text } => text,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_key_is_namespaced() {
        let item = FeedItem {
            id: "MC123456".into(),
            source: FeedSource::MessageCenter,
            title: "Update".into(),
            timestamp: Utc::now(),
            payload: serde_json::json!({}),
        };
        assert_eq!(item.ledger_key(), "message_center:MC123456");
    }

    #[test]
    fn summary_accepts_actions_as_string() {
        let s: Summary = serde_json::from_value(serde_json::json!({
            "title": "T",
            "actions": "Review the change",
        }))
        .unwrap();
        assert_eq!(s.actions, vec!["Review the change"]);
    }

    #[test]
    fn summary_accepts_chips_as_objects() {
        let s: Summary = serde_json::from_value(serde_json::json!({
            "title": "T",
            "chips": ["Admin impact", {"text": "Retirement"}],
        }))
        .unwrap();
        assert_eq!(s.chips, vec!["Admin impact", "Retirement"]);
    }

    #[test]
    fn summary_tolerates_null_fields() {
        let s: Summary = serde_json::from_value(serde_json::json!({
            "title": "T",
            "service": null,
            "severity": null,
            "is_major_change": null,
            "chips": null,
            "actions": null,
            "window": null,
            "link": null,
        }))
        .unwrap();
        assert!(s.service.is_empty());
        assert_eq!(s.severity, Severity::Normal);
        assert!(s.chips.is_empty());
        assert!(s.actions.is_empty());
        assert!(s.window.is_none());
    }

    #[test]
    fn summary_defaults_are_safe() {
        let s: Summary = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(s.bucket, Bucket::Info);
        assert_eq!(s.severity, Severity::Normal);
        assert!(s.is_blank());
    }

    #[test]
    fn severity_alerting() {
        assert!(Severity::Critical.is_alerting());
        assert!(Severity::High.is_alerting());
        assert!(!Severity::Important.is_alerting());
        assert!(!Severity::Normal.is_alerting());
    }
}
