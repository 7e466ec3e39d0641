//! Client-credentials OAuth2 token cache for Microsoft Graph.
//!
//! One `GraphAuth` is shared between the Message Center and Service Health
//! feeds so a run refreshes the token at most once.

use chrono::{DateTime, Duration, Utc};
use mcbrief_core::error::{BriefError, Result};
use serde::Deserialize;
use tokio::sync::Mutex;

/// Refresh this long before the reported expiry to avoid using a token
/// that dies mid-request.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Acquires and caches an app-only Graph access token.
pub struct GraphAuth {
    tenant_id: String,
    client_id: String,
    client_secret: String,
    login_endpoint: String,
    client: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
}

impl GraphAuth {
    pub fn new(tenant_id: &str, client_id: &str, client_secret: &str) -> Result<Self> {
        if tenant_id.is_empty() || client_id.is_empty() || client_secret.is_empty() {
            return Err(BriefError::Config(
                "Graph credentials missing: set feeds.tenant_id, feeds.client_id and \
                 MCBRIEF_CLIENT_SECRET"
                    .into(),
            ));
        }
        Ok(Self {
            tenant_id: tenant_id.to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            login_endpoint: "https://login.microsoftonline.com".to_string(),
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .map_err(|e| BriefError::Config(format!("http client: {e}")))?,
            token: Mutex::new(None),
        })
    }

    /// Override the login endpoint (tests, sovereign clouds).
    pub fn with_login_endpoint(mut self, endpoint: &str) -> Self {
        self.login_endpoint = endpoint.trim_end_matches('/').to_string();
        self
    }

    /// A valid bearer token, refreshed if the cached one is near expiry.
    pub async fn bearer(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Utc::now() < token.expires_at {
                return Ok(token.access_token.clone());
            }
        }

        let url = format!(
            "{}/{}/oauth2/v2.0/token",
            self.login_endpoint, self.tenant_id
        );
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", "https://graph.microsoft.com/.default"),
        ];
        let resp = self
            .client
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(|e| BriefError::Fetch(format!("token request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(BriefError::Fetch(format!("token request failed: {status} - {body}")));
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| BriefError::Fetch(format!("invalid token response: {e}")))?;

        let expires_at =
            Utc::now() + Duration::seconds((token.expires_in - EXPIRY_MARGIN_SECS).max(60));
        tracing::debug!("Graph access token refreshed, valid until {expires_at}");
        *cached = Some(CachedToken { access_token: token.access_token.clone(), expires_at });
        Ok(token.access_token)
    }
}
