//! Message Center feed - Microsoft 365 service announcement messages via
//! the Graph API.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use mcbrief_core::error::{BriefError, Result};
use mcbrief_core::traits::Feed;
use mcbrief_core::types::{FeedItem, FeedSource};

use crate::auth::GraphAuth;
use crate::parse_feed_items;

/// Fetches `admin/serviceAnnouncement/messages` filtered to the lookback
/// window.
pub struct MessageCenterFeed {
    auth: Arc<GraphAuth>,
    endpoint: String,
    client: reqwest::Client,
}

impl MessageCenterFeed {
    pub fn new(auth: Arc<GraphAuth>, graph_endpoint: &str) -> Result<Self> {
        Ok(Self {
            auth,
            endpoint: graph_endpoint.trim_end_matches('/').to_string(),
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .map_err(|e| BriefError::Config(format!("http client: {e}")))?,
        })
    }
}

#[async_trait]
impl Feed for MessageCenterFeed {
    fn source(&self) -> FeedSource {
        FeedSource::MessageCenter
    }

    async fn fetch(&self, window: chrono::Duration) -> Result<Vec<FeedItem>> {
        let token = self.auth.bearer().await?;
        let since = (Utc::now() - window).to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        let url = format!("{}/admin/serviceAnnouncement/messages", self.endpoint);

        let resp = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .query(&[
                ("$filter", format!("lastModifiedDateTime gt {since}")),
                ("$orderby", "lastModifiedDateTime desc".to_string()),
                ("$top", "100".to_string()),
            ])
            .send()
            .await
            .map_err(|e| BriefError::Fetch(format!("message center request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(BriefError::Fetch(format!(
                "message center Graph API error {status}: {body}"
            )));
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| BriefError::Fetch(format!("invalid message center response: {e}")))?;
        let records = body["value"].as_array().cloned().unwrap_or_default();
        let items = parse_feed_items(&records, FeedSource::MessageCenter, Utc::now());
        tracing::info!("fetched {} message center items updated since {since}", items.len());
        Ok(items)
    }
}
