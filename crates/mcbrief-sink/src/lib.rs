//! # mcbrief Sink
//!
//! Posts rendered Adaptive Cards to a Teams webhook (Power Automate).
//! Power Automate acknowledges with 202, so 200/201/202 all count as
//! delivered. Rate limits and server errors are transient; anything else
//! is permanent for this run.

use async_trait::async_trait;
use mcbrief_core::config::SinkConfig;
use mcbrief_core::error::{classify_status, BriefError, FailureKind, Result};
use mcbrief_core::traits::Sink;
use mcbrief_core::types::CardPayload;

#[derive(Debug)]
pub struct TeamsSink {
    webhook_url: String,
    client: reqwest::Client,
}

impl TeamsSink {
    pub fn new(config: &SinkConfig) -> Result<Self> {
        let webhook_url = config.resolved_webhook_url();
        if webhook_url.is_empty() {
            return Err(BriefError::Config(
                "webhook URL missing: set sink.webhook_url or MCBRIEF_WEBHOOK_URL".into(),
            ));
        }
        Ok(Self {
            webhook_url,
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(config.timeout_secs))
                .build()
                .map_err(|e| BriefError::Config(format!("http client: {e}")))?,
        })
    }
}

#[async_trait]
impl Sink for TeamsSink {
    fn name(&self) -> &str {
        "teams"
    }

    async fn deliver(&self, card: &CardPayload) -> Result<()> {
        let resp = self
            .client
            .post(&self.webhook_url)
            .json(&card.0)
            .send()
            .await
            .map_err(|e| BriefError::delivery_transient(format!("webhook send failed: {e}")))?;

        let status = resp.status().as_u16();
        if matches!(status, 200 | 201 | 202) {
            tracing::debug!("✅ card delivered (status {status})");
            return Ok(());
        }

        let body = resp.text().await.unwrap_or_default();
        let message = format!("webhook error {status}: {body}");
        Err(match classify_status(status) {
            FailureKind::Transient => BriefError::delivery_transient(message),
            FailureKind::Permanent => BriefError::delivery_permanent(message),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_webhook_is_a_config_error() {
        // Guard against the env override masking the empty config.
        if std::env::var("MCBRIEF_WEBHOOK_URL").is_ok() {
            return;
        }
        let err = TeamsSink::new(&SinkConfig::default()).unwrap_err();
        assert!(matches!(err, BriefError::Config(_)));
    }
}
