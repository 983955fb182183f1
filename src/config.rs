use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::models::{AgentConfig, MatchPolicy};

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    #[serde(default)]
    pub sources: SourcesSettings,
    #[serde(default)]
    pub matching: MatchingSettings,
    #[serde(default)]
    pub dedup: DedupSettings,
    #[serde(default)]
    pub notifications: NotificationSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default = "default_agents_path")]
    pub agents_path: String,
}

fn default_agents_path() -> String { "config/agents.toml".to_string() }

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub workers: Option<usize>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: None,
        }
    }
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageSettings {
    #[serde(default)]
    pub backend: StorageBackend,
    pub url: Option<String>,
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub acquire_timeout_secs: Option<u64>,
    pub idle_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_true")]
    pub run_on_startup: bool,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_interval_secs(),
            run_on_startup: true,
        }
    }
}

impl SchedulerSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

fn default_true() -> bool { true }
fn default_interval_secs() -> u64 { 4 * 60 * 60 }

#[derive(Debug, Clone, Deserialize)]
pub struct SourcesSettings {
    #[serde(default = "default_politeness_delay_ms")]
    pub politeness_delay_ms: u64,
    #[serde(default = "default_max_consecutive_empty")]
    pub max_consecutive_empty: u32,
    #[serde(default)]
    pub marketcheck: MarketcheckSettings,
}

impl Default for SourcesSettings {
    fn default() -> Self {
        Self {
            politeness_delay_ms: default_politeness_delay_ms(),
            max_consecutive_empty: default_max_consecutive_empty(),
            marketcheck: MarketcheckSettings::default(),
        }
    }
}

fn default_politeness_delay_ms() -> u64 { 2000 }
fn default_max_consecutive_empty() -> u32 { 10 }

#[derive(Debug, Clone, Deserialize)]
pub struct MarketcheckSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_marketcheck_url")]
    pub base_url: String,
    pub api_key: Option<String>,
    #[serde(default = "default_rows")]
    pub rows: u32,
    #[serde(default = "default_radius_miles")]
    pub radius_miles: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for MarketcheckSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_marketcheck_url(),
            api_key: None,
            rows: default_rows(),
            radius_miles: default_radius_miles(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_marketcheck_url() -> String { "https://api.marketcheck.com/v2/search/car/active".to_string() }
fn default_rows() -> u32 { 50 }
fn default_radius_miles() -> u32 { 100 }
fn default_timeout_secs() -> u64 { 30 }

/// Matcher thresholds and score increments
#[derive(Debug, Clone, Deserialize)]
pub struct MatchingSettings {
    #[serde(default = "default_make_threshold")]
    pub make_threshold: f64,
    #[serde(default = "default_model_threshold")]
    pub model_threshold: f64,
    #[serde(default = "default_vehicle_score")]
    pub vehicle_score: f64,
    #[serde(default = "default_make_score")]
    pub make_score: f64,
    #[serde(default = "default_model_score")]
    pub model_score: f64,
    #[serde(default = "default_year_score")]
    pub year_score: f64,
    #[serde(default = "default_price_score")]
    pub price_score: f64,
    #[serde(default = "default_mileage_score")]
    pub mileage_score: f64,
    #[serde(default = "default_feature_score")]
    pub feature_score: f64,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            make_threshold: default_make_threshold(),
            model_threshold: default_model_threshold(),
            vehicle_score: default_vehicle_score(),
            make_score: default_make_score(),
            model_score: default_model_score(),
            year_score: default_year_score(),
            price_score: default_price_score(),
            mileage_score: default_mileage_score(),
            feature_score: default_feature_score(),
        }
    }
}

impl From<&MatchingSettings> for MatchPolicy {
    fn from(settings: &MatchingSettings) -> Self {
        Self {
            make_threshold: settings.make_threshold,
            model_threshold: settings.model_threshold,
            vehicle_score: settings.vehicle_score,
            make_score: settings.make_score,
            model_score: settings.model_score,
            year_score: settings.year_score,
            price_score: settings.price_score,
            mileage_score: settings.mileage_score,
            feature_score: settings.feature_score,
        }
    }
}

fn default_make_threshold() -> f64 { 90.0 }
fn default_model_threshold() -> f64 { 85.0 }
fn default_vehicle_score() -> f64 { 30.0 }
fn default_make_score() -> f64 { 10.0 }
fn default_model_score() -> f64 { 20.0 }
fn default_year_score() -> f64 { 5.0 }
fn default_price_score() -> f64 { 10.0 }
fn default_mileage_score() -> f64 { 5.0 }
fn default_feature_score() -> f64 { 5.0 }

#[derive(Debug, Clone, Deserialize)]
pub struct DedupSettings {
    #[serde(default = "default_lock_capacity")]
    pub lock_capacity: u64,
    #[serde(default = "default_lock_idle_secs")]
    pub lock_idle_secs: u64,
}

impl Default for DedupSettings {
    fn default() -> Self {
        Self {
            lock_capacity: default_lock_capacity(),
            lock_idle_secs: default_lock_idle_secs(),
        }
    }
}

fn default_lock_capacity() -> u64 { 10_000 }
fn default_lock_idle_secs() -> u64 { 300 }

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationSettings {
    #[serde(default)]
    pub default_recipients: Vec<String>,
    #[serde(default)]
    pub smtp: SmtpSettings,
}

impl NotificationSettings {
    /// Recipients for agents without their own `notify_to`
    ///
    /// Falls back to the SMTP account itself so alerts always have somewhere to go.
    pub fn fallback_recipients(&self) -> Vec<String> {
        if !self.default_recipients.is_empty() {
            return self.default_recipients.clone();
        }
        self.smtp.username.iter().cloned().collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_smtp_host")]
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for SmtpSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_smtp_host(),
            port: default_smtp_port(),
            username: None,
            password: None,
        }
    }
}

impl SmtpSettings {
    /// Account and password, when both are configured and SMTP is enabled
    pub fn credentials(&self) -> Option<(&str, &str)> {
        if !self.enabled {
            return None;
        }
        let username = self.username.as_deref().filter(|u| !u.trim().is_empty())?;
        let password = self.password.as_deref().filter(|p| !p.is_empty())?;
        Some((username, password))
    }
}

fn default_smtp_host() -> String { "smtp.gmail.com".to_string() }
fn default_smtp_port() -> u16 { 587 }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Local overrides (config/local.toml)
    /// 4. Environment variables (prefixed with LUXELINK__)
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., LUXELINK__SERVER__PORT -> server.port
            .add_source(
                Environment::with_prefix("LUXELINK")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        apply_well_known_env(settings)?.try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("LUXELINK")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }
}

/// Honour the conventional un-prefixed variables used by hosting platforms
fn apply_well_known_env(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let mut builder = Config::builder().add_source(settings);

    if let Ok(database_url) = env::var("DATABASE_URL") {
        builder = builder.set_override("storage.url", database_url)?;
    }
    if let Ok(api_key) = env::var("MARKETCHECK_API_KEY") {
        builder = builder.set_override("sources.marketcheck.api_key", api_key)?;
    }
    if let Ok(user) = env::var("GMAIL_USER") {
        builder = builder.set_override("notifications.smtp.username", user)?;
    }
    if let Ok(password) = env::var("GMAIL_APP_PASSWORD") {
        builder = builder.set_override("notifications.smtp.password", password)?;
    }

    builder.build()
}

/// Errors raised while loading the agents file
#[derive(Debug, Error)]
pub enum AgentsError {
    #[error("Failed to read agents file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse agents file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Duplicate agent id: {0}")]
    DuplicateId(String),
}

#[derive(Debug, Deserialize)]
struct AgentsFile {
    #[serde(default)]
    agents: Vec<AgentConfig>,
}

/// Load agent definitions from a TOML file with `[[agents]]` tables
///
/// A missing file yields no agents. Malformed profiles fail here, before any
/// of them can reach the matcher.
pub fn load_agents<P: AsRef<Path>>(path: P) -> Result<Vec<AgentConfig>, AgentsError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Vec::new());
    }

    let contents = std::fs::read_to_string(path)?;
    parse_agents(&contents)
}

/// Parse agent definitions from TOML text
pub fn parse_agents(contents: &str) -> Result<Vec<AgentConfig>, AgentsError> {
    let file: AgentsFile = toml::from_str(contents)?;

    let mut seen = HashSet::new();
    for agent in &file.agents {
        if !seen.insert(agent.id.as_str()) {
            return Err(AgentsError::DuplicateId(agent.id.clone()));
        }
    }

    Ok(file.agents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VehicleSelection;

    #[test]
    fn test_default_policy() {
        let policy = MatchPolicy::from(&MatchingSettings::default());
        assert_eq!(policy, MatchPolicy::default());
    }

    #[test]
    fn test_default_logging() {
        let level = default_log_level();
        let format = default_log_format();
        assert_eq!(level, "info");
        assert_eq!(format, "json");
    }

    #[test]
    fn test_fallback_recipients_default_to_smtp_account() {
        let mut notifications = NotificationSettings::default();
        assert!(notifications.fallback_recipients().is_empty());

        notifications.smtp.username = Some("alerts@example.com".to_string());
        assert_eq!(notifications.fallback_recipients(), vec!["alerts@example.com"]);

        notifications.default_recipients = vec!["desk@example.com".to_string()];
        assert_eq!(notifications.fallback_recipients(), vec!["desk@example.com"]);
    }

    #[test]
    fn test_smtp_credentials_require_both_parts() {
        let mut smtp = SmtpSettings::default();
        assert_eq!(smtp.port, 587);
        assert!(smtp.credentials().is_none());

        smtp.username = Some("alerts@example.com".to_string());
        assert!(smtp.credentials().is_none());

        smtp.password = Some("app-password".to_string());
        assert_eq!(smtp.credentials(), Some(("alerts@example.com", "app-password")));

        smtp.enabled = false;
        assert!(smtp.credentials().is_none());
    }

    #[test]
    fn test_parse_agents() {
        let agents = parse_agents(
            r#"
            [[agents]]
            id = "supercars"
            name = "Supercar Hunter"
            sources = ["marketcheck"]
            notify_to = ["client@example.com"]

            [agents.parameters]
            price_max = 300000.0
            exclude_keywords = ["salvage"]

            [[agents.parameters.vehicles]]
            make = "Ferrari"
            model = "F40"

            [[agents.parameters.vehicles]]
            make = "Porsche"
            model = "911"
            year_min = 2019

            [[agents]]
            id = "supra"
            name = "Supra"
            enabled = false

            [agents.parameters]
            makes = ["Toyota"]
            models = ["Supra"]
            "#,
        )
        .unwrap();

        assert_eq!(agents.len(), 2);
        assert!(agents[0].enabled);
        assert!(!agents[1].enabled);
        match &agents[0].parameters.selection {
            VehicleSelection::Vehicles(v) => assert_eq!(v[1].year_min, Some(2019)),
            other => panic!("expected vehicles, got {:?}", other),
        }
        assert_eq!(agents[0].parameters.price_max, Some(300000.0));
    }

    #[test]
    fn test_malformed_vehicle_fails_at_load() {
        let result = parse_agents(
            r#"
            [[agents]]
            id = "broken"
            name = "Broken"

            [agents.parameters]
            [[agents.parameters.vehicles]]
            make = "Ferrari"
            model = ""
            "#,
        );

        assert!(matches!(result, Err(AgentsError::Parse(_))));
    }

    #[test]
    fn test_duplicate_agent_ids_rejected() {
        let result = parse_agents(
            r#"
            [[agents]]
            id = "a"
            name = "A"
            parameters = {}

            [[agents]]
            id = "a"
            name = "Again"
            parameters = {}
            "#,
        );

        assert!(matches!(result, Err(AgentsError::DuplicateId(id)) if id == "a"));
    }

    #[test]
    fn test_missing_agents_file_is_empty() {
        let agents = load_agents("does/not/exist.toml").unwrap();
        assert!(agents.is_empty());
    }
}
