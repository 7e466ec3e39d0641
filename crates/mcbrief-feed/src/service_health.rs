//! Service Health feed - Microsoft 365 service incident records via the
//! Graph API.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use mcbrief_core::error::{BriefError, Result};
use mcbrief_core::traits::Feed;
use mcbrief_core::types::{FeedItem, FeedSource};

use crate::auth::GraphAuth;
use crate::parse_feed_items;

/// Fetches `admin/serviceAnnouncement/issues` filtered to the lookback
/// window. Some tenants reject `$filter` on this endpoint with 400; the
/// fallback fetches unfiltered and applies the window cutoff client-side.
pub struct ServiceHealthFeed {
    auth: Arc<GraphAuth>,
    endpoint: String,
    client: reqwest::Client,
}

impl ServiceHealthFeed {
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

    async fn get_issues(&self, token: &str, filter: Option<&str>) -> Result<reqwest::Response> {
        let url = format!("{}/admin/serviceAnnouncement/issues", self.endpoint);
        let mut query: Vec<(&str, String)> = vec![
            ("$orderby", "lastModifiedDateTime desc".to_string()),
            ("$top", "100".to_string()),
        ];
        if let Some(f) = filter {
            query.push(("$filter", f.to_string()));
        }
        self.client
            .get(&url)
            .bearer_auth(token)
            .query(&query)
            .send()
            .await
            .map_err(|e| BriefError::Fetch(format!("service health request failed: {e}")))
    }
}

#[async_trait]
impl Feed for ServiceHealthFeed {
    fn source(&self) -> FeedSource {
        FeedSource::ServiceHealth
    }

    async fn fetch(&self, window: chrono::Duration) -> Result<Vec<FeedItem>> {
        let token = self.auth.bearer().await?;
        let cutoff = Utc::now() - window;
        let since = cutoff.to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        let filter = format!("lastModifiedDateTime gt {since}");

        let mut resp = self.get_issues(&token, Some(&filter)).await?;
        if resp.status() == reqwest::StatusCode::BAD_REQUEST {
            tracing::warn!("service health $filter rejected, retrying unfiltered");
            resp = self.get_issues(&token, None).await?;
        }

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(BriefError::Fetch(format!(
                "service health Graph API error {status}: {body}"
            )));
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| BriefError::Fetch(format!("invalid service health response: {e}")))?;
        let records = body["value"].as_array().cloned().unwrap_or_default();
        let mut items = parse_feed_items(&records, FeedSource::ServiceHealth, Utc::now());
        // The unfiltered fallback returns everything; enforce the window here.
        items.retain(|item| item.timestamp >= cutoff);
        tracing::info!("fetched {} service health issues updated since {since}", items.len());
        Ok(items)
    }
}
