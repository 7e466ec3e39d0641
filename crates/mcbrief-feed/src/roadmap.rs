//! Public Microsoft 365 roadmap feed. No auth; the API has no server-side
//! window filter, so the cutoff is applied client-side.

use async_trait::async_trait;
use chrono::Utc;
use mcbrief_core::error::{BriefError, Result};
use mcbrief_core::traits::Feed;
use mcbrief_core::types::{FeedItem, FeedSource};

use crate::parse_graph_datetime;

pub struct RoadmapFeed {
    endpoint: String,
    client: reqwest::Client,
}

impl RoadmapFeed {
    pub fn new(endpoint: &str) -> Result<Self> {
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(15))
                .build()
                .map_err(|e| BriefError::Config(format!("http client: {e}")))?,
        })
    }
}

#[async_trait]
impl Feed for RoadmapFeed {
    fn source(&self) -> FeedSource {
        FeedSource::Roadmap
    }

    async fn fetch(&self, window: chrono::Duration) -> Result<Vec<FeedItem>> {
        let url = format!("{}/features", self.endpoint);
        let resp = self
            .client
            .get(&url)
            // The roadmap API rejects non-browser user agents.
            .header("User-Agent", "Mozilla/5.0 (Windows NT 10.0; Win64; x64)")
            .header("Accept", "application/json, text/plain, */*")
            .send()
            .await
            .map_err(|e| BriefError::Fetch(format!("roadmap request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(BriefError::Fetch(format!("roadmap API error {}", resp.status())));
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| BriefError::Fetch(format!("invalid roadmap response: {e}")))?;
        let records = match &body {
            serde_json::Value::Array(a) => a.clone(),
            other => other["features"].as_array().cloned().unwrap_or_default(),
        };

        let cutoff = Utc::now() - window;
        let mut items = Vec::new();
        for record in &records {
            let Some(id) = feature_id(record) else { continue };
            let Some(modified) = parse_graph_datetime(record["modified"].as_str()) else {
                continue;
            };
            if modified < cutoff {
                continue;
            }
            items.push(FeedItem {
                id,
                source: FeedSource::Roadmap,
                title: record["title"].as_str().unwrap_or("").to_string(),
                timestamp: modified,
                payload: record.clone(),
            });
        }
        tracing::info!("fetched {} roadmap features modified in window", items.len());
        Ok(items)
    }
}

/// Roadmap feature ids are numeric in the payload.
fn feature_id(record: &serde_json::Value) -> Option<String> {
    match &record["id"] {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
