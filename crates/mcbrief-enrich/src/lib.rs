//! # mcbrief Enrichment
//!
//! Turns raw feed items into human-ready summaries through an
//! OpenAI-compatible chat-completions endpoint. Supports the Azure OpenAI
//! auth style (`api-key` header, deployments URL with api-version) and
//! plain Bearer endpoints.
//!
//! Error classification matters more than the call itself: connect errors,
//! timeouts, 408/429 and 5xx responses are transient and retried by the
//! orchestrator; everything else - including a response the model filled
//! with unparseable JSON - is permanent for this run and the item is left
//! un-recorded so the next run retries it.

pub mod prompts;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mcbrief_core::config::{EnrichAuthStyle, EnrichConfig};
use mcbrief_core::error::{classify_status, BriefError, FailureKind, Result};
use mcbrief_core::traits::Enricher;
use mcbrief_core::types::{FeedItem, FeedSource, Summary};
use serde_json::{json, Value};

/// Cap on raw text shipped to the model per field.
const MAX_FIELD_CHARS: usize = 1000;

pub struct OpenAiEnricher {
    endpoint: String,
    api_key: String,
    model: String,
    api_version: String,
    auth_style: EnrichAuthStyle,
    temperature: f32,
    max_tokens: u32,
    client: reqwest::Client,
}

impl OpenAiEnricher {
    pub fn new(config: &EnrichConfig) -> Result<Self> {
        if config.endpoint.is_empty() {
            return Err(BriefError::Config("enrich.endpoint is not set".into()));
        }
        let api_key = config.resolved_api_key();
        if api_key.is_empty() {
            return Err(BriefError::Config(
                "enrichment API key missing: set enrich.api_key or MCBRIEF_OPENAI_API_KEY".into(),
            ));
        }
        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            api_version: config.api_version.clone(),
            auth_style: config.auth_style,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(60))
                .build()
                .map_err(|e| BriefError::Config(format!("http client: {e}")))?,
        })
    }

    fn chat_url(&self) -> String {
        match self.auth_style {
            EnrichAuthStyle::ApiKey => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                self.endpoint, self.model, self.api_version
            ),
            EnrichAuthStyle::Bearer => format!("{}/chat/completions", self.endpoint),
        }
    }

    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.auth_style {
            EnrichAuthStyle::ApiKey => req.header("api-key", &self.api_key),
            EnrichAuthStyle::Bearer => req.bearer_auth(&self.api_key),
        }
    }

    async fn complete(&self, system_prompt: &str, user_payload: &Value) -> Result<Summary> {
        let mut body = json!({
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_payload.to_string()},
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "response_format": {"type": "json_object"},
        });
        if self.auth_style == EnrichAuthStyle::Bearer {
            body["model"] = json!(self.model);
        }

        let req = self.client.post(self.chat_url()).json(&body);
        let resp = self.apply_auth(req).send().await.map_err(|e| {
            // Connect/timeout failures are worth retrying.
            BriefError::enrichment_transient(format!("request failed: {e}"))
        })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            let message = format!("API error {status}: {text}");
            return Err(match classify_status(status) {
                FailureKind::Transient => BriefError::enrichment_transient(message),
                FailureKind::Permanent => BriefError::enrichment_permanent(message),
            });
        }

        let response: Value = resp
            .json()
            .await
            .map_err(|e| BriefError::enrichment_transient(format!("invalid response: {e}")))?;
        let content = response["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| BriefError::enrichment_permanent("no content in response"))?;
        parse_enrichment(content)
    }
}

#[async_trait]
impl Enricher for OpenAiEnricher {
    async fn enrich(&self, item: &FeedItem, report_date: DateTime<Utc>) -> Result<Summary> {
        let (prompt, payload) = match item.source {
            FeedSource::ServiceHealth => (
                prompts::SERVICE_HEALTH_PROMPT,
                service_health_payload(item, report_date),
            ),
            _ => (
                prompts::MESSAGE_CENTER_PROMPT,
                message_center_payload(item, report_date),
            ),
        };
        let mut summary = self.complete(prompt, &payload).await?;
        apply_source_defaults(&mut summary, item);
        tracing::debug!("enriched {}: {}", item.ledger_key(), summary.title);
        Ok(summary)
    }
}

/// Parse the model's `{"items":[...]}` envelope into the first summary.
/// Anything malformed is a permanent failure - resending the same input
/// tends to produce the same shape.
pub fn parse_enrichment(content: &str) -> Result<Summary> {
    #[derive(serde::Deserialize)]
    struct Envelope {
        #[serde(default)]
        items: Vec<Summary>,
    }
    let envelope: Envelope = serde_json::from_str(content)
        .map_err(|e| BriefError::enrichment_permanent(format!("unparseable model output: {e}")))?;
    envelope
        .items
        .into_iter()
        .next()
        .ok_or_else(|| BriefError::enrichment_permanent("model returned no items"))
}

fn truncate(text: &str) -> String {
    if text.chars().count() > MAX_FIELD_CHARS {
        let cut: String = text.chars().take(MAX_FIELD_CHARS).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}

fn str_field<'a>(payload: &'a Value, key: &str) -> &'a str {
    payload[key].as_str().unwrap_or("")
}

fn message_center_payload(item: &FeedItem, report_date: DateTime<Utc>) -> Value {
    let p = &item.payload;
    let body_text = p["body"]["content"]
        .as_str()
        .or_else(|| p["summary"].as_str())
        .or_else(|| p["description"].as_str())
        .unwrap_or("");
    json!({
        "report_date": report_date.format("%Y-%m-%d").to_string(),
        "items": [{
            "message_id": item.id,
            "title": item.title,
            "service": first_service(p),
            "category": str_field(p, "category"),
            "severity": str_field(p, "severity"),
            "is_major_change": p["isMajorChange"].as_bool().unwrap_or(false),
            "admin_impact": p["actionRequiredByDateTime"].is_string(),
            "summary": truncate(body_text),
            "window_start": str_field(p, "startDateTime"),
            "window_end": str_field(p, "endDateTime"),
            "published": str_field(p, "startDateTime"),
            "last_updated": str_field(p, "lastModifiedDateTime"),
        }],
    })
}

fn service_health_payload(item: &FeedItem, report_date: DateTime<Utc>) -> Value {
    let p = &item.payload;
    json!({
        "report_date": report_date.format("%Y-%m-%d").to_string(),
        "items": [{
            "issue_id": item.id,
            "title": item.title,
            "service": str_field(p, "service"),
            "feature": str_field(p, "feature"),
            "status": str_field(p, "status"),
            "classification": str_field(p, "classification"),
            "severity_raw": str_field(p, "severity"),
            "impact_description": truncate(str_field(p, "impactDescription")),
            "start_date": str_field(p, "startDateTime"),
            "end_date": str_field(p, "endDateTime"),
            "last_updated": str_field(p, "lastModifiedDateTime"),
            "latest_posts": truncate(&latest_posts(p)),
        }],
    })
}

/// Condense the incident's post history to its most recent descriptions.
fn latest_posts(payload: &Value) -> String {
    let Some(posts) = payload["posts"].as_array() else {
        return String::new();
    };
    posts
        .iter()
        .rev()
        .take(3)
        .filter_map(|post| post["description"]["content"].as_str())
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Fill fields the model left blank from facts the raw payload carries.
fn apply_source_defaults(summary: &mut Summary, item: &FeedItem) {
    if summary.title.trim().is_empty() {
        summary.title = item.title.clone();
    }
    if summary.service.trim().is_empty() {
        summary.service = first_service(&item.payload);
    }
    if summary.published.as_deref().unwrap_or("").is_empty() {
        if let Some(published) = item.payload["startDateTime"].as_str() {
            summary.published = Some(published.to_string());
        }
    }
    if summary.affected_services.is_empty() {
        if let Some(services) = item.payload["services"].as_array() {
            summary.affected_services = services
                .iter()
                .filter_map(|s| match s {
                    Value::String(name) => Some(name.clone()),
                    other => other["displayName"].as_str().map(String::from),
                })
                .collect();
        }
    }
}

fn first_service(payload: &Value) -> String {
    if let Some(service) = payload["service"].as_str() {
        return service.to_string();
    }
    payload["services"]
        .as_array()
        .and_then(|services| services.first())
        .map(|s| match s {
            Value::String(name) => name.clone(),
            other => other["displayName"].as_str().unwrap_or("").to_string(),
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcbrief_core::types::{Bucket, Severity};
    use serde_json::json;

    fn sample_item() -> FeedItem {
        FeedItem {
            id: "MC654321".into(),
            source: FeedSource::MessageCenter,
            title: "Teams meeting change".into(),
            timestamp: Utc::now(),
            payload: json!({
                "id": "MC654321",
                "title": "Teams meeting change",
                "category": "planForChange",
                "startDateTime": "2026-07-01T00:00:00Z",
                "services": [{"displayName": "Microsoft Teams"}],
                "body": {"content": "Details about the change"},
            }),
        }
    }

    #[test]
    fn parses_model_envelope() {
        let content = r#"{"items":[{
            "title": "Teams meeting change",
            "service": "Microsoft Teams",
            "bucket": "action",
            "severity": "important",
            "what": "A change is coming.",
            "why": "Admins should prepare.",
            "actions": ["Review policy"],
            "chips": ["planForChange", "Admin impact"]
        }]}"#;
        let summary = parse_enrichment(content).unwrap();
        assert_eq!(summary.bucket, Bucket::Action);
        assert_eq!(summary.severity, Severity::Important);
        assert_eq!(summary.actions.len(), 1);
    }

    #[test]
    fn rejects_non_json_output() {
        let err = parse_enrichment("Sorry, I cannot help with that.").unwrap_err();
        assert!(matches!(
            err,
            BriefError::Enrichment { kind: FailureKind::Permanent, .. }
        ));
    }

    #[test]
    fn rejects_empty_items() {
        let err = parse_enrichment(r#"{"items":[]}"#).unwrap_err();
        assert!(!err.is_transient());
    }

    #[test]
    fn payload_carries_item_facts() {
        let item = sample_item();
        let payload = message_center_payload(&item, Utc::now());
        assert_eq!(payload["items"][0]["message_id"], "MC654321");
        assert_eq!(payload["items"][0]["service"], "Microsoft Teams");
        assert_eq!(payload["items"][0]["category"], "planForChange");
    }

    #[test]
    fn defaults_fill_blank_summary_fields() {
        let item = sample_item();
        let mut summary = Summary::default();
        apply_source_defaults(&mut summary, &item);
        assert_eq!(summary.title, "Teams meeting change");
        assert_eq!(summary.service, "Microsoft Teams");
        assert_eq!(summary.published.as_deref(), Some("2026-07-01T00:00:00Z"));
        assert_eq!(summary.affected_services, vec!["Microsoft Teams"]);
    }

    #[test]
    fn truncates_long_fields() {
        let long = "x".repeat(2 * MAX_FIELD_CHARS);
        let out = truncate(&long);
        assert!(out.len() <= MAX_FIELD_CHARS + 3);
        assert!(out.ends_with("..."));
    }
}
