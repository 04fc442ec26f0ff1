//! NLU provider configuration

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use contact_center_core::Intent;

/// Which NLU backend to construct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NluProviderKind {
    /// Slot-filling service that returns whatever slots it filled
    SlotBased,
    /// Chat-completion model asked to emit a JSON verdict
    Generative,
    /// Offline keyword matcher for development
    #[default]
    Keyword,
}

/// NLU configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NluConfig {
    #[serde(default)]
    pub provider: NluProviderKind,

    /// Provider endpoint (base URL)
    #[serde(default)]
    pub endpoint: String,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Model id for the generative provider
    #[serde(default = "default_model_id")]
    pub model_id: String,

    /// Bot id for the slot-based provider
    #[serde(default)]
    pub bot_id: String,

    /// Bot alias for the slot-based provider
    #[serde(default = "default_bot_alias")]
    pub bot_alias_id: String,

    #[serde(default = "default_locale")]
    pub locale: String,

    #[serde(default = "default_nlu_timeout")]
    pub timeout_seconds: u64,

    /// Retries after the first attempt
    #[serde(default = "default_nlu_retries")]
    pub max_retries: u32,

    #[serde(default = "default_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Minimum confidence per intent; `fallback` applies to unlisted intents
    #[serde(default = "default_intent_thresholds")]
    pub intent_thresholds: HashMap<String, f32>,

    /// Confidence at which security-sensitive intents go straight to an agent
    #[serde(default = "default_bypass_thresholds")]
    pub bypass_thresholds: HashMap<String, f32>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

fn default_model_id() -> String {
    "claude-3-haiku".to_string()
}

fn default_bot_alias() -> String {
    "TSTALIASID".to_string()
}

fn default_locale() -> String {
    "ko_KR".to_string()
}

fn default_nlu_timeout() -> u64 {
    10
}

fn default_nlu_retries() -> u32 {
    2
}

fn default_backoff_ms() -> u64 {
    200
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_tokens() -> usize {
    512
}

pub const FALLBACK_THRESHOLD_KEY: &str = "fallback";

fn default_intent_thresholds() -> HashMap<String, f32> {
    [
        ("greeting", 0.7),
        ("product_inquiry", 0.85),
        ("complaint", 0.9),
        ("reservation", 0.85),
        ("cancel_request", 0.9),
        ("technical_support", 0.85),
        ("payment_inquiry", 0.9),
        (FALLBACK_THRESHOLD_KEY, 0.7),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

fn default_bypass_thresholds() -> HashMap<String, f32> {
    [
        ("complaint", 0.8),
        ("payment_inquiry", 0.85),
        ("cancel_request", 0.85),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

impl Default for NluConfig {
    fn default() -> Self {
        Self {
            provider: NluProviderKind::default(),
            endpoint: String::new(),
            api_key: None,
            model_id: default_model_id(),
            bot_id: String::new(),
            bot_alias_id: default_bot_alias(),
            locale: default_locale(),
            timeout_seconds: default_nlu_timeout(),
            max_retries: default_nlu_retries(),
            initial_backoff_ms: default_backoff_ms(),
            intent_thresholds: default_intent_thresholds(),
            bypass_thresholds: default_bypass_thresholds(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl NluConfig {
    /// Threshold for `intent`, falling back to the `fallback` entry
    pub fn threshold_for(&self, intent: Intent) -> f32 {
        self.intent_thresholds
            .get(intent.as_str())
            .or_else(|| self.intent_thresholds.get(FALLBACK_THRESHOLD_KEY))
            .copied()
            .unwrap_or(0.7)
    }

    /// Bypass threshold for security-sensitive intents; `None` disables bypass
    pub fn bypass_threshold_for(&self, intent: Intent) -> Option<f32> {
        self.bypass_thresholds.get(intent.as_str()).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds() {
        let config = NluConfig::default();
        assert_eq!(config.threshold_for(Intent::Greeting), 0.7);
        assert_eq!(config.threshold_for(Intent::PaymentInquiry), 0.9);
        // Unlisted intents use the fallback entry
        assert_eq!(config.threshold_for(Intent::GeneralInquiry), 0.7);
        assert_eq!(config.bypass_threshold_for(Intent::Complaint), Some(0.8));
        assert_eq!(config.bypass_threshold_for(Intent::Greeting), None);
    }
}
