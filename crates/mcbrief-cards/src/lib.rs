//! # mcbrief Cards
//!
//! Renders enrichment summaries into Teams Adaptive Cards (schema 1.4),
//! plus the no-news and run-failure notices.

use chrono::{DateTime, Utc};
use mcbrief_core::config::CardsConfig;
use mcbrief_core::error::{BriefError, Result};
use mcbrief_core::traits::Renderer;
use mcbrief_core::types::{CardPayload, FeedItem, FeedSource, Summary};
use serde_json::{json, Value};

const CARD_SCHEMA: &str = "http://adaptivecards.io/schemas/adaptive-card.json";
const CARD_VERSION: &str = "1.4";

/// Builds Adaptive Cards from enriched items.
pub struct CardBuilder {
    service_health_portal_url: String,
    alert_image_url: Option<String>,
}

impl CardBuilder {
    pub fn new(config: &CardsConfig) -> Self {
        Self {
            service_health_portal_url: config.service_health_portal_url.clone(),
            alert_image_url: if config.alert_image_url.is_empty() {
                None
            } else {
                Some(config.alert_image_url.clone())
            },
        }
    }

    fn resolve_link(&self, item: &FeedItem, summary: &Summary) -> Option<String> {
        if let Some(link) = summary.link.as_deref().filter(|l| !l.is_empty()) {
            return Some(link.to_string());
        }
        match item.source {
            FeedSource::MessageCenter => message_center_deep_link(&item.id),
            FeedSource::ServiceHealth => Some(self.service_health_portal_url.clone()),
            FeedSource::Roadmap => None,
        }
    }
}

impl Renderer for CardBuilder {
    fn render(&self, item: &FeedItem, summary: &Summary) -> Result<CardPayload> {
        if summary.is_blank() {
            return Err(BriefError::Render(format!(
                "summary for {} has no title and no body text",
                item.ledger_key()
            )));
        }

        let severity = summary.severity;
        let icon = severity_icon(severity);
        let highlight = summary.is_major_change
            || summary.chips.iter().any(|c| c.eq_ignore_ascii_case("admin impact"));

        let title = if summary.title.trim().is_empty() {
            item.title.clone()
        } else {
            summary.title.clone()
        };
        let service = if summary.service.trim().is_empty() {
            "Microsoft 365".to_string()
        } else {
            summary.service.clone()
        };

        // Header: icon | title + service | severity badge.
        let mut body = vec![json!({
            "type": "Container",
            "style": if highlight { "attention" } else { "emphasis" },
            "items": [{
                "type": "ColumnSet",
                "columns": [
                    {
                        "width": "auto",
                        "items": [{
                            "type": "TextBlock",
                            "text": icon,
                            "size": "extraLarge",
                            "spacing": "none",
                        }],
                    },
                    {
                        "width": "stretch",
                        "items": [
                            {
                                "type": "TextBlock",
                                "text": title,
                                "size": "large",
                                "weight": "bolder",
                                "wrap": true,
                                "spacing": "small",
                            },
                            {
                                "type": "TextBlock",
                                "text": format!("{service} • {}", item.source.label()),
                                "size": "small",
                                "isSubtle": true,
                                "spacing": "none",
                            },
                        ],
                    },
                    {
                        "width": "auto",
                        "items": [{
                            "type": "TextBlock",
                            "text": severity.as_str().to_uppercase(),
                            "size": "small",
                            "weight": "bolder",
                            "color": if severity.is_alerting() { "attention" } else { "default" },
                            "spacing": "none",
                        }],
                    },
                ],
            }],
        })];

        if severity.is_alerting() {
            if let Some(url) = &self.alert_image_url {
                body.push(json!({
                    "type": "Image",
                    "url": url,
                    "size": "small",
                    "spacing": "small",
                }));
            }
        }

        if !summary.chips.is_empty() {
            body.push(json!({
                "type": "TextBlock",
                "text": summary.chips.join(" | "),
                "size": "small",
                "isSubtle": true,
                "wrap": true,
                "spacing": "medium",
            }));
        }

        let mut content: Vec<Value> = Vec::new();
        push_section(&mut content, "**What's happening?**", &summary.what);
        push_section(&mut content, "**Why it matters?**", &summary.why);

        if !summary.actions.is_empty() {
            content.push(heading("**📋 Recommended actions:**"));
            for action in summary.actions.iter().take(3) {
                content.push(json!({
                    "type": "TextBlock",
                    "text": format!("• {action}"),
                    "wrap": true,
                    "spacing": "small",
                }));
            }
        }

        if let Some(update) = summary.latest_update.as_deref().filter(|u| !u.is_empty()) {
            push_section(&mut content, "**Latest update:**", update);
        }
        if let Some(window) = summary.window.as_deref().filter(|w| !w.is_empty()) {
            push_section(&mut content, "**⏰ Timeline:**", window);
        }
        if let Some(countdown) = summary.countdown.as_deref().filter(|c| !c.is_empty()) {
            content.push(json!({
                "type": "TextBlock",
                "text": format!("*{countdown}*"),
                "isSubtle": true,
                "size": "small",
                "wrap": true,
                "spacing": "small",
            }));
        }
        if let Some(published) = friendly_date(summary.published.as_deref()) {
            content.push(json!({
                "type": "TextBlock",
                "text": format!("Published: {published}"),
                "isSubtle": true,
                "size": "small",
                "wrap": true,
                "spacing": "small",
            }));
        }

        body.push(json!({"type": "Container", "spacing": "medium", "items": content}));
        body.push(json!({"type": "Container", "separator": true, "spacing": "medium"}));

        let actions = match self.resolve_link(item, summary) {
            Some(link) => json!([{
                "type": "Action.OpenUrl",
                "title": link_title(item.source),
                "url": link,
            }]),
            None => json!([]),
        };

        tracing::debug!("built card for {}", item.ledger_key());
        Ok(CardPayload(json!({
            "$schema": CARD_SCHEMA,
            "type": "AdaptiveCard",
            "version": CARD_VERSION,
            "body": body,
            "actions": actions,
        })))
    }

    fn render_empty(&self, window: chrono::Duration) -> CardPayload {
        let timestamp = Utc::now().format("%d %B %Y %H:%M UTC");
        CardPayload(json!({
            "$schema": CARD_SCHEMA,
            "type": "AdaptiveCard",
            "version": CARD_VERSION,
            "body": [
                {
                    "type": "TextBlock",
                    "text": "Microsoft 365 Updates Monitor",
                    "size": "large",
                    "weight": "bolder",
                },
                {
                    "type": "TextBlock",
                    "text": format!("No new Message Center or Service Health updates as of {timestamp}."),
                    "wrap": true,
                },
                {
                    "type": "TextBlock",
                    "text": format!("Lookback window: last {} hours.", window.num_hours()),
                    "isSubtle": true,
                    "size": "small",
                    "wrap": true,
                },
            ],
        }))
    }

    fn render_failure(&self, error: &BriefError) -> CardPayload {
        CardPayload(json!({
            "$schema": CARD_SCHEMA,
            "type": "AdaptiveCard",
            "version": CARD_VERSION,
            "body": [
                {
                    "type": "TextBlock",
                    "text": "⚠️ Updates monitor run failed",
                    "size": "large",
                    "weight": "bolder",
                    "color": "attention",
                },
                {
                    "type": "TextBlock",
                    "text": error.to_string(),
                    "wrap": true,
                    "isSubtle": true,
                },
            ],
        }))
    }
}

fn heading(text: &str) -> Value {
    json!({
        "type": "TextBlock",
        "text": text,
        "weight": "bolder",
        "size": "small",
        "spacing": "medium",
    })
}

fn push_section(content: &mut Vec<Value>, title: &str, text: &str) {
    if text.trim().is_empty() {
        return;
    }
    content.push(heading(title));
    content.push(json!({
        "type": "TextBlock",
        "text": text,
        "wrap": true,
        "spacing": "small",
    }));
}

fn severity_icon(severity: mcbrief_core::types::Severity) -> &'static str {
    use mcbrief_core::types::Severity::*;
    match severity {
        Critical | High => "⚠️",
        Important => "ℹ️",
        Normal => "📢",
    }
}

fn link_title(source: FeedSource) -> &'static str {
    match source {
        FeedSource::MessageCenter => "View in Message Center",
        FeedSource::ServiceHealth => "View in Service Health",
        FeedSource::Roadmap => "View on the roadmap",
    }
}

/// Deep link into the admin portal for MC-prefixed message ids.
fn message_center_deep_link(message_id: &str) -> Option<String> {
    let id = message_id.trim();
    if !id.to_uppercase().starts_with("MC") {
        return None;
    }
    Some(format!(
        "https://admin.microsoft.com/Adminportal/Home#/MessageCenter/:/messages/{id}"
    ))
}

/// "2026-07-01T00:00:00Z" -> "01 July 2026".
fn friendly_date(value: Option<&str>) -> Option<String> {
    let raw = value?.trim();
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc).format("%d %B %Y").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcbrief_core::types::Severity;
    use serde_json::json;

    fn builder() -> CardBuilder {
        CardBuilder::new(&CardsConfig::default())
    }

    fn item(source: FeedSource, id: &str) -> FeedItem {
        FeedItem {
            id: id.into(),
            source,
            title: "Raw title".into(),
            timestamp: Utc::now(),
            payload: json!({}),
        }
    }

    fn summary() -> Summary {
        Summary {
            title: "Teams meeting change".into(),
            service: "Microsoft Teams".into(),
            severity: Severity::Important,
            what: "Something is changing.".into(),
            why: "It affects admins.".into(),
            actions: vec!["Review".into(), "Notify users".into()],
            chips: vec!["planForChange".into()],
            published: Some("2026-07-01T00:00:00Z".into()),
            ..Summary::default()
        }
    }

    #[test]
    fn renders_full_card() {
        let card = builder()
            .render(&item(FeedSource::MessageCenter, "MC1"), &summary())
            .unwrap()
            .into_inner();
        assert_eq!(card["type"], "AdaptiveCard");
        assert_eq!(card["version"], CARD_VERSION);
        let header = &card["body"][0]["items"][0]["columns"][1]["items"][0];
        assert_eq!(header["text"], "Teams meeting change");
        // Deep link synthesized from the MC id.
        assert_eq!(card["actions"][0]["type"], "Action.OpenUrl");
        assert!(card["actions"][0]["url"]
            .as_str()
            .unwrap()
            .ends_with("/messages/MC1"));
    }

    #[test]
    fn blank_summary_is_a_render_error() {
        let err = builder()
            .render(&item(FeedSource::MessageCenter, "MC1"), &Summary::default())
            .unwrap_err();
        assert!(matches!(err, BriefError::Render(_)));
    }

    #[test]
    fn service_health_falls_back_to_portal_link() {
        let card = builder()
            .render(&item(FeedSource::ServiceHealth, "TM999"), &summary())
            .unwrap()
            .into_inner();
        assert!(card["actions"][0]["url"]
            .as_str()
            .unwrap()
            .contains("servicehealth"));
    }

    #[test]
    fn non_mc_ids_get_no_deep_link() {
        assert!(message_center_deep_link("MC123").is_some());
        assert!(message_center_deep_link("12345").is_none());
    }

    #[test]
    fn empty_card_names_the_window() {
        let card = builder().render_empty(chrono::Duration::hours(24)).into_inner();
        let text = card["body"][2]["text"].as_str().unwrap();
        assert!(text.contains("24 hours"));
    }

    #[test]
    fn failure_card_carries_the_error() {
        let card = builder()
            .render_failure(&BriefError::Fetch("graph is down".into()))
            .into_inner();
        assert!(card["body"][1]["text"].as_str().unwrap().contains("graph is down"));
    }

    #[test]
    fn friendly_date_formats() {
        assert_eq!(
            friendly_date(Some("2026-07-01T00:00:00Z")).as_deref(),
            Some("01 July 2026")
        );
        assert!(friendly_date(Some("nonsense")).is_none());
        assert!(friendly_date(None).is_none());
    }
}
