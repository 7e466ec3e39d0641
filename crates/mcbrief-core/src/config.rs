//! mcbrief configuration system.
//!
//! TOML file with serde defaults; secrets fall back to environment
//! variables so tokens never have to live in the config file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{BriefError, Result};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BriefConfig {
    #[serde(default)]
    pub feeds: FeedsConfig,
    #[serde(default)]
    pub enrich: EnrichConfig,
    #[serde(default)]
    pub sink: SinkConfig,
    #[serde(default)]
    pub cards: CardsConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub run: RunConfig,
}

impl BriefConfig {
    /// Load config from the default path (~/.mcbrief/config.toml).
    /// A missing file yields defaults; secrets still resolve from env.
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| BriefError::Config(format!("failed to read {}: {e}", path.display())))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| BriefError::Config(format!("failed to parse {}: {e}", path.display())))?;
        Ok(config)
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the mcbrief home directory (~/.mcbrief).
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".mcbrief")
    }

    /// Fail-fast validation, run before anything fetches.
    ///
    /// The lookback/interval check is a correctness requirement, not a
    /// sanity check: a window shorter than the gap between runs means
    /// items can fall between runs and never be delivered.
    pub fn validate(&self) -> Result<()> {
        if self.run.lookback_hours == 0 {
            return Err(BriefError::Config("run.lookback_hours must be at least 1".into()));
        }
        if self.run.poll_interval_hours == 0 {
            return Err(BriefError::Config("run.poll_interval_hours must be at least 1".into()));
        }
        if self.run.lookback_hours < self.run.poll_interval_hours {
            return Err(BriefError::Config(format!(
                "run.lookback_hours ({}) is shorter than run.poll_interval_hours ({}); \
                 items published between runs would be skipped permanently",
                self.run.lookback_hours, self.run.poll_interval_hours
            )));
        }
        if let Some(days) = self.ledger.prune_after_days {
            if days * 24 < self.run.lookback_hours {
                return Err(BriefError::Config(format!(
                    "ledger.prune_after_days ({days}) is inside the lookback window \
                     ({}h); pruned items would be re-delivered",
                    self.run.lookback_hours
                )));
            }
        }
        if self.run.concurrency == 0 || self.run.concurrency > 16 {
            return Err(BriefError::Config(format!(
                "run.concurrency ({}) must be between 1 and 16",
                self.run.concurrency
            )));
        }
        Ok(())
    }
}

/// Feed adapter configuration (Microsoft Graph + public roadmap).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedsConfig {
    #[serde(default = "default_graph_endpoint")]
    pub graph_endpoint: String,
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub client_id: String,
    /// Prefer the MCBRIEF_CLIENT_SECRET env var over this field.
    #[serde(default)]
    pub client_secret: String,
    #[serde(default = "bool_true")]
    pub message_center: bool,
    #[serde(default = "bool_true")]
    pub service_health: bool,
    #[serde(default)]
    pub roadmap: bool,
    #[serde(default = "default_roadmap_endpoint")]
    pub roadmap_endpoint: String,
}

fn default_graph_endpoint() -> String {
    "https://graph.microsoft.com/v1.0".into()
}
fn default_roadmap_endpoint() -> String {
    "https://www.microsoft.com/releasecommunications/api/v1/m365".into()
}

impl FeedsConfig {
    /// Resolved client secret: env var wins, config field is the fallback.
    pub fn resolved_client_secret(&self) -> String {
        std::env::var("MCBRIEF_CLIENT_SECRET").unwrap_or_else(|_| self.client_secret.clone())
    }
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            graph_endpoint: default_graph_endpoint(),
            tenant_id: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            message_center: true,
            service_health: true,
            roadmap: false,
            roadmap_endpoint: default_roadmap_endpoint(),
        }
    }
}

/// How the enrichment endpoint authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum EnrichAuthStyle {
    /// Azure OpenAI: `api-key` header, deployments URL with api-version.
    #[default]
    ApiKey,
    /// Plain OpenAI-compatible endpoint: `Authorization: Bearer`.
    Bearer,
}

/// Enrichment adapter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichConfig {
    #[serde(default)]
    pub endpoint: String,
    /// Prefer the MCBRIEF_OPENAI_API_KEY env var over this field.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default)]
    pub auth_style: EnrichAuthStyle,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_model() -> String {
    "gpt-4o".into()
}
fn default_api_version() -> String {
    "2024-10-01-preview".into()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_max_tokens() -> u32 {
    1500
}

impl EnrichConfig {
    pub fn resolved_api_key(&self) -> String {
        std::env::var("MCBRIEF_OPENAI_API_KEY").unwrap_or_else(|_| self.api_key.clone())
    }
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            model: default_model(),
            api_version: default_api_version(),
            auth_style: EnrichAuthStyle::default(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Sink adapter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Prefer the MCBRIEF_WEBHOOK_URL env var over this field.
    #[serde(default)]
    pub webhook_url: String,
    #[serde(default = "default_sink_timeout")]
    pub timeout_secs: u64,
}

fn default_sink_timeout() -> u64 {
    10
}

impl SinkConfig {
    pub fn resolved_webhook_url(&self) -> String {
        std::env::var("MCBRIEF_WEBHOOK_URL").unwrap_or_else(|_| self.webhook_url.clone())
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self { webhook_url: String::new(), timeout_secs: default_sink_timeout() }
    }
}

/// Presentation tweaks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardsConfig {
    /// Fallback link for Service Health items, which carry no deep link.
    #[serde(default = "default_sh_portal")]
    pub service_health_portal_url: String,
    /// Optional image attached to critical/high severity cards.
    #[serde(default)]
    pub alert_image_url: String,
}

fn default_sh_portal() -> String {
    "https://admin.microsoft.com/Adminportal/Home#/servicehealth".into()
}

impl Default for CardsConfig {
    fn default() -> Self {
        Self { service_health_portal_url: default_sh_portal(), alert_image_url: String::new() }
    }
}

/// What to do when the persisted ledger cannot be parsed.
///
/// `Abort` favors no-duplicate-mass-send over availability; `Reset` treats
/// the ledger as empty and accepts that everything inside the lookback
/// window will be delivered again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CorruptLedgerPolicy {
    #[default]
    Abort,
    Reset,
}

/// Delivery ledger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Path to the ledger file; `~` expands. Empty means the default
    /// location under the mcbrief home directory.
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub on_corrupt: CorruptLedgerPolicy,
    /// Drop entries older than this many days. Must cover the lookback
    /// window; validated at startup.
    #[serde(default)]
    pub prune_after_days: Option<u64>,
}

impl LedgerConfig {
    pub fn resolved_path(&self) -> PathBuf {
        if self.path.is_empty() {
            BriefConfig::home_dir().join("ledger.json")
        } else {
            PathBuf::from(shellexpand::tilde(&self.path).to_string())
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self { path: String::new(), on_corrupt: CorruptLedgerPolicy::default(), prune_after_days: None }
    }
}

/// Run orchestration knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: u64,
    /// Watch-mode poll interval. Must not exceed the lookback window.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_hours: u64,
    #[serde(default = "bool_true")]
    pub notify_on_empty: bool,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    pub retry_backoff_max_ms: u64,
    /// Optional overall run budget; items not started before it expires
    /// are deferred to the next run.
    #[serde(default)]
    pub time_budget_secs: Option<u64>,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_lookback_hours() -> u64 {
    24
}
fn default_poll_interval() -> u64 {
    6
}
fn default_max_retries() -> u32 {
    3
}
fn default_backoff_ms() -> u64 {
    500
}
fn default_backoff_max_ms() -> u64 {
    30_000
}
fn default_concurrency() -> usize {
    1
}
fn bool_true() -> bool {
    true
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            lookback_hours: default_lookback_hours(),
            poll_interval_hours: default_poll_interval(),
            notify_on_empty: true,
            max_retries: default_max_retries(),
            retry_backoff_ms: default_backoff_ms(),
            retry_backoff_max_ms: default_backoff_max_ms(),
            time_budget_secs: None,
            concurrency: default_concurrency(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = BriefConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.run.lookback_hours, 24);
        assert_eq!(config.run.poll_interval_hours, 6);
        assert!(config.run.notify_on_empty);
    }

    #[test]
    fn lookback_shorter_than_interval_is_rejected() {
        let mut config = BriefConfig::default();
        config.run.lookback_hours = 4;
        config.run.poll_interval_hours = 6;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, BriefError::Config(_)));
        assert!(err.to_string().contains("lookback"));
    }

    #[test]
    fn prune_inside_lookback_is_rejected() {
        let mut config = BriefConfig::default();
        config.run.lookback_hours = 48;
        config.ledger.prune_after_days = Some(1);
        assert!(config.validate().is_err());

        config.ledger.prune_after_days = Some(30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn concurrency_bounds() {
        let mut config = BriefConfig::default();
        config.run.concurrency = 0;
        assert!(config.validate().is_err());
        config.run.concurrency = 17;
        assert!(config.validate().is_err());
        config.run.concurrency = 4;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parses_minimal_toml() {
        let toml = r#"
            [feeds]
            tenant_id = "t"
            client_id = "c"

            [run]
            lookback_hours = 48
            concurrency = 2

            [ledger]
            on_corrupt = "reset"
        "#;
        let config: BriefConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.run.lookback_hours, 48);
        assert_eq!(config.run.concurrency, 2);
        assert_eq!(config.ledger.on_corrupt, CorruptLedgerPolicy::Reset);
        assert!(config.feeds.message_center);
        assert!(!config.feeds.roadmap);
        assert!(config.validate().is_ok());
    }
}
