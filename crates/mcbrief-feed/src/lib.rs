//! # mcbrief Feeds
//!
//! Source feed adapters: Microsoft Graph service announcements (Message
//! Center messages, Service Health issues) behind client-credentials
//! OAuth2, and the public Microsoft 365 roadmap.

pub mod auth;
pub mod message_center;
pub mod roadmap;
pub mod service_health;

use chrono::{DateTime, Utc};
use mcbrief_core::types::{FeedItem, FeedSource};

pub use auth::GraphAuth;
pub use message_center::MessageCenterFeed;
pub use roadmap::RoadmapFeed;
pub use service_health::ServiceHealthFeed;

/// Parse an ISO8601 timestamp as the Graph API emits it (`Z` suffix).
pub(crate) fn parse_graph_datetime(value: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = value?.trim();
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Convert a Graph `value` array into feed items. Records without an id
/// are skipped with a warning; the item timestamp is last-modified,
/// falling back to start time, falling back to `now`.
pub(crate) fn parse_feed_items(
    records: &[serde_json::Value],
    source: FeedSource,
    now: DateTime<Utc>,
) -> Vec<FeedItem> {
    let mut items = Vec::with_capacity(records.len());
    for record in records {
        let Some(id) = record["id"].as_str().filter(|s| !s.is_empty()) else {
            tracing::warn!("skipping {source} record without id");
            continue;
        };
        let timestamp = parse_graph_datetime(record["lastModifiedDateTime"].as_str())
            .or_else(|| parse_graph_datetime(record["startDateTime"].as_str()))
            .unwrap_or(now);
        items.push(FeedItem {
            id: id.to_string(),
            source,
            title: record["title"].as_str().unwrap_or("").to_string(),
            timestamp,
            payload: record.clone(),
        });
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_graph_records() {
        let records = vec![
            json!({
                "id": "MC100",
                "title": "Teams update",
                "startDateTime": "2026-08-01T10:00:00Z",
                "lastModifiedDateTime": "2026-08-02T08:30:00Z",
            }),
            json!({"title": "no id, dropped"}),
            json!({"id": "MC101", "title": "No dates"}),
        ];
        let now = Utc::now();
        let items = parse_feed_items(&records, FeedSource::MessageCenter, now);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "MC100");
        assert_eq!(items[0].title, "Teams update");
        assert_eq!(
            items[0].timestamp,
            DateTime::parse_from_rfc3339("2026-08-02T08:30:00Z").unwrap()
        );
        assert_eq!(items[1].timestamp, now);
        assert_eq!(items[0].payload["startDateTime"], "2026-08-01T10:00:00Z");
    }

    #[test]
    fn datetime_parsing_tolerates_empty() {
        assert!(parse_graph_datetime(None).is_none());
        assert!(parse_graph_datetime(Some("")).is_none());
        assert!(parse_graph_datetime(Some("garbage")).is_none());
        assert!(parse_graph_datetime(Some("2026-08-01T10:00:00Z")).is_some());
    }
}
