//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::{ConfigError, ConversationConfig, EscalationConfig, NluConfig, NluProviderKind};

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    /// Development mode - relaxed validation, warnings only
    #[default]
    Development,
    /// Staging mode - stricter validation
    Staging,
    /// Production mode - all validations enforced
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub nlu: NluConfig,

    #[serde(default)]
    pub faq: FaqConfig,

    #[serde(default)]
    pub scenario: ScenarioConfig,

    #[serde(default)]
    pub conversation: ConversationConfig,

    #[serde(default)]
    pub escalation: EscalationConfig,

    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_nlu()?;
        self.validate_faq()?;
        self.validate_scenario()?;
        self.validate_escalation()?;
        self.validate_server()?;
        Ok(())
    }

    fn validate_nlu(&self) -> Result<(), ConfigError> {
        let nlu = &self.nlu;

        if nlu.timeout_seconds == 0 || nlu.timeout_seconds > 10 {
            return Err(ConfigError::InvalidValue {
                field: "nlu.timeout_seconds".to_string(),
                message: format!("Must be between 1 and 10, got {}", nlu.timeout_seconds),
            });
        }

        for (intent, threshold) in nlu.intent_thresholds.iter().chain(&nlu.bypass_thresholds) {
            if !(0.0..=1.0).contains(threshold) {
                return Err(ConfigError::InvalidValue {
                    field: format!("nlu.thresholds.{}", intent),
                    message: format!("Must be between 0.0 and 1.0, got {}", threshold),
                });
            }
        }

        if nlu.provider != NluProviderKind::Keyword && nlu.endpoint.is_empty() {
            if self.environment.is_strict() {
                return Err(ConfigError::MissingField("nlu.endpoint".to_string()));
            }
            tracing::warn!(
                provider = ?nlu.provider,
                "nlu.endpoint not configured; remote NLU calls will fail"
            );
        }

        Ok(())
    }

    fn validate_faq(&self) -> Result<(), ConfigError> {
        let faq = &self.faq;

        for (field, value) in [
            ("faq.min_score", faq.min_score),
            ("faq.acceptance_threshold", faq.acceptance_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: format!("Must be between 0.0 and 1.0, got {}", value),
                });
            }
        }

        if faq.top_k == 0 {
            return Err(ConfigError::InvalidValue {
                field: "faq.top_k".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        if faq.timeout_ms == 0 || faq.timeout_ms > 2000 {
            return Err(ConfigError::InvalidValue {
                field: "faq.timeout_ms".to_string(),
                message: format!("Must be between 1 and 2000, got {}", faq.timeout_ms),
            });
        }

        if faq.acceptance_threshold < faq.min_score {
            tracing::warn!(
                "faq.acceptance_threshold ({}) is below faq.min_score ({}), \
                 the min_score filter will dominate",
                faq.acceptance_threshold,
                faq.min_score
            );
        }

        Ok(())
    }

    fn validate_scenario(&self) -> Result<(), ConfigError> {
        if self.scenario.max_retries == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scenario.max_retries".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        if self.scenario.utc_offset_minutes.abs() > 14 * 60 {
            return Err(ConfigError::InvalidValue {
                field: "scenario.utc_offset_minutes".to_string(),
                message: format!(
                    "Must be within +/-840, got {}",
                    self.scenario.utc_offset_minutes
                ),
            });
        }

        Ok(())
    }

    fn validate_escalation(&self) -> Result<(), ConfigError> {
        let esc = &self.escalation;

        if esc.average_handle_time_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "escalation.average_handle_time_seconds".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        if esc.turn_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "escalation.turn_limit".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        if esc.priority_queue_name.is_empty() {
            return Err(ConfigError::MissingField(
                "escalation.priority_queue_name".to_string(),
            ));
        }

        if esc.notifier.channel_capacity == 0 || esc.notifier.workers == 0 {
            return Err(ConfigError::InvalidValue {
                field: "escalation.notifier".to_string(),
                message: "channel_capacity and workers must be at least 1".to_string(),
            });
        }

        if esc.notifier.timeout_ms > 5000 {
            return Err(ConfigError::InvalidValue {
                field: "escalation.notifier.timeout_ms".to_string(),
                message: format!("Must be at most 5000, got {}", esc.notifier.timeout_ms),
            });
        }

        if esc.escalation_keywords.is_empty() {
            tracing::warn!("escalation.escalation_keywords is empty; explicit requests will not be detected");
        }

        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        let server = &self.server;

        if server.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.port".to_string(),
                message: "Port cannot be 0".to_string(),
            });
        }

        if self.environment.is_production() && server.cors_enabled && server.cors_origins.is_empty()
        {
            tracing::warn!(
                "CORS is enabled in production but no origins are configured. \
                 This may block legitimate requests."
            );
        }

        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_enabled: true,
            cors_origins: Vec::new(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit JSON log lines
    #[serde(default)]
    pub log_json: bool,

    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            metrics_enabled: true,
        }
    }
}

/// FAQ retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaqConfig {
    /// Results scoring below this are dropped
    #[serde(default = "default_faq_min_score")]
    pub min_score: f64,

    #[serde(default = "default_faq_top_k")]
    pub top_k: usize,

    /// Top score needed before the orchestrator answers with a FAQ
    #[serde(default = "default_faq_acceptance")]
    pub acceptance_threshold: f64,

    #[serde(default = "default_faq_timeout")]
    pub timeout_ms: u64,

    /// Seed the built-in FAQ set when the store is empty
    #[serde(default = "default_true")]
    pub seed_defaults: bool,

    /// Optional YAML file with FAQ entries
    #[serde(default)]
    pub data_path: Option<String>,
}

fn default_faq_min_score() -> f64 {
    0.6
}

fn default_faq_top_k() -> usize {
    5
}

fn default_faq_acceptance() -> f64 {
    0.7
}

fn default_faq_timeout() -> u64 {
    2000
}

impl Default for FaqConfig {
    fn default() -> Self {
        Self {
            min_score: default_faq_min_score(),
            top_k: default_faq_top_k(),
            acceptance_threshold: default_faq_acceptance(),
            timeout_ms: default_faq_timeout(),
            seed_defaults: true,
            data_path: None,
        }
    }
}

/// Scenario interpreter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    #[serde(default = "default_scenario_retries")]
    pub max_retries: u32,

    /// Offset used for `future_only` date checks when the session has none
    #[serde(default = "default_utc_offset")]
    pub utc_offset_minutes: i32,

    /// Optional YAML file (or directory of files) with flow definitions
    #[serde(default)]
    pub flows_path: Option<String>,

    /// intent -> flow id started for it
    #[serde(default = "default_intent_flows")]
    pub intent_flows: std::collections::HashMap<String, String>,
}

fn default_scenario_retries() -> u32 {
    3
}

fn default_utc_offset() -> i32 {
    9 * 60
}

fn default_intent_flows() -> std::collections::HashMap<String, String> {
    [
        ("product_inquiry", "product_inquiry"),
        ("reservation", "reservation"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            max_retries: default_scenario_retries(),
            utc_offset_minutes: default_utc_offset(),
            flows_path: None,
            intent_flows: default_intent_flows(),
        }
    }
}

/// Persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Closed sessions untouched for this long become archivable
    #[serde(default = "default_retention")]
    pub retention_seconds: u64,

    /// How often the archiver sweeps closed sessions
    #[serde(default = "default_archive_interval")]
    pub archive_interval_seconds: u64,

    /// Archived sessions are appended here as JSON lines; dropped when unset
    #[serde(default)]
    pub archive_path: Option<String>,

    /// JSON snapshot written on shutdown and read on start
    #[serde(default)]
    pub snapshot_path: Option<String>,
}

fn default_retention() -> u64 {
    30 * 24 * 60 * 60
}

fn default_archive_interval() -> u64 {
    60 * 60
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            retention_seconds: default_retention(),
            archive_interval_seconds: default_archive_interval(),
            archive_path: None,
            snapshot_path: None,
        }
    }
}

/// Load settings from files and environment
///
/// Priority: env vars > config/{env} > config/default > defaults
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("CONTACT_CENTER")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}

/// Load settings from a single file, without environment overrides
pub fn load_settings_from_file(path: &std::path::Path) -> Result<Settings, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config = Config::builder()
        .add_source(File::from(path))
        .build()?;
    let settings: Settings = config.try_deserialize()?;
    settings.validate()?;
    Ok(settings)
}
