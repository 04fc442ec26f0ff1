//! Configuration management for the contact-center orchestrator
//!
//! Supports loading configuration from:
//! - YAML/TOML files under `config/`
//! - Environment variables (CONTACT_CENTER_ prefix, `__` separator)
//!
//! Data files (FAQ entries, flow definitions) are read with [`load_document`],
//! which picks the format from the file extension.

pub mod conversation;
pub mod escalation;
pub mod nlu;
pub mod settings;

pub use conversation::{ConversationConfig, ConversationMessages};
pub use escalation::{EscalationConfig, NotifierConfig};
pub use nlu::{NluConfig, NluProviderKind};
pub use settings::{
    load_settings, load_settings_from_file, FaqConfig, ObservabilityConfig, PersistenceConfig,
    RuntimeEnvironment, ScenarioConfig, ServerConfig, Settings,
};

use serde::de::DeserializeOwned;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Environment error: {0}")]
    Environment(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl From<ConfigError> for contact_center_core::Error {
    fn from(err: ConfigError) -> Self {
        contact_center_core::Error::InvalidInput(err.to_string())
    }
}

/// Read a YAML, TOML or JSON document, chosen by extension (YAML otherwise)
pub fn load_document<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = std::fs::read_to_string(path)
        .map_err(|_| ConfigError::FileNotFound(path.display().to_string()))?;

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    let parsed = match ext.as_deref() {
        Some("toml") => toml::from_str(&content).map_err(|e| e.to_string()),
        Some("json") => serde_json::from_str(&content).map_err(|e| e.to_string()),
        _ => serde_yaml::from_str(&content).map_err(|e| e.to_string()),
    };

    parsed.map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::Write;

    #[derive(Debug, Deserialize)]
    struct Doc {
        name: String,
        count: u32,
    }

    fn write_temp(suffix: &str, body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        write!(file, "{}", body).unwrap();
        file
    }

    #[test]
    fn test_load_document_by_extension() {
        let yaml = write_temp(".yaml", "name: a\ncount: 1\n");
        let toml = write_temp(".toml", "name = \"b\"\ncount = 2\n");
        let json = write_temp(".json", r#"{"name": "c", "count": 3}"#);

        let a: Doc = load_document(yaml.path()).unwrap();
        let b: Doc = load_document(toml.path()).unwrap();
        let c: Doc = load_document(json.path()).unwrap();
        assert_eq!((a.name.as_str(), a.count), ("a", 1));
        assert_eq!((b.name.as_str(), b.count), ("b", 2));
        assert_eq!((c.name.as_str(), c.count), ("c", 3));
    }

    #[test]
    fn test_load_document_errors() {
        let missing: Result<Doc, _> = load_document(Path::new("/nonexistent/doc.yaml"));
        assert!(matches!(missing, Err(ConfigError::FileNotFound(_))));

        let bad = write_temp(".yaml", "name: [unclosed");
        let parsed: Result<Doc, _> = load_document(bad.path());
        assert!(matches!(parsed, Err(ConfigError::ParseError(_))));
    }
}
