//! Escalation, routing and notifier configuration

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use contact_center_core::EscalationReason;

/// Escalation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationConfig {
    /// Explicit agent-request keywords
    #[serde(default = "default_escalation_keywords")]
    pub escalation_keywords: Vec<String>,

    #[serde(default = "default_urgency_keywords")]
    pub urgency_keywords: Vec<String>,

    /// History length that counts as a stuck conversation
    #[serde(default = "default_turn_limit")]
    pub turn_limit: usize,

    #[serde(default = "default_session_age")]
    pub session_age_seconds: u64,

    #[serde(default = "default_negative_sentiment_threshold")]
    pub negative_sentiment_threshold: f32,

    /// Identical consecutive user intents before escalating
    #[serde(default = "default_repeated_intent_window")]
    pub repeated_intent_window: usize,

    #[serde(default = "default_aht")]
    pub average_handle_time_seconds: u64,

    #[serde(default = "default_wait_floor")]
    pub wait_estimate_floor_seconds: u64,

    /// reason -> queue name
    #[serde(default = "default_queue_mapping")]
    pub queue_mapping: HashMap<String, String>,

    #[serde(default = "default_general_queue")]
    pub default_queue_name: String,

    #[serde(default = "default_priority_queue")]
    pub priority_queue_name: String,

    /// reason -> skills an agent needs
    #[serde(default = "default_skill_requirements")]
    pub agent_skill_requirements: HashMap<String, Vec<String>>,

    /// reason -> specialty skill worth the tier bonus
    #[serde(default = "default_specialty_skills")]
    pub specialty_skills: HashMap<String, String>,

    /// routing profile -> queues it serves; unlisted profiles serve every queue
    #[serde(default)]
    pub routing_profiles: HashMap<String, Vec<String>>,

    /// Pending requests older than this go through timeout handling
    #[serde(default = "default_pending_timeout")]
    pub pending_timeout_seconds: u64,

    #[serde(default = "default_callback_delay")]
    pub callback_delay_seconds: u64,

    #[serde(default = "default_snapshot_turns")]
    pub snapshot_turns: usize,

    #[serde(default)]
    pub notifier: NotifierConfig,
}

fn default_escalation_keywords() -> Vec<String> {
    ["상담원", "사람", "직원", "매니저", "책임자"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_urgency_keywords() -> Vec<String> {
    ["긴급", "즉시", "당장", "응급"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_turn_limit() -> usize {
    10
}

fn default_session_age() -> u64 {
    30 * 60
}

fn default_negative_sentiment_threshold() -> f32 {
    0.8
}

fn default_repeated_intent_window() -> usize {
    3
}

fn default_aht() -> u64 {
    180
}

fn default_wait_floor() -> u64 {
    900
}

fn default_general_queue() -> String {
    "general-queue".to_string()
}

fn default_priority_queue() -> String {
    "priority-queue".to_string()
}

fn default_queue_mapping() -> HashMap<String, String> {
    [
        ("complaint", "complaint-queue"),
        ("technical_support", "tech-support-queue"),
        ("system_error", "tech-support-queue"),
        ("payment_issue", "payment-queue"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_skill_requirements() -> HashMap<String, Vec<String>> {
    [
        ("complaint", vec!["complaint"]),
        ("technical_support", vec!["technical_support"]),
        ("system_error", vec!["technical_support"]),
        ("payment_issue", vec!["payment"]),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.into_iter().map(String::from).collect()))
    .collect()
}

fn default_specialty_skills() -> HashMap<String, String> {
    [
        ("complaint", "complaint"),
        ("technical_support", "technical_support"),
        ("payment_issue", "payment"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_pending_timeout() -> u64 {
    15 * 60
}

fn default_callback_delay() -> u64 {
    60 * 60
}

fn default_snapshot_turns() -> usize {
    10
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            escalation_keywords: default_escalation_keywords(),
            urgency_keywords: default_urgency_keywords(),
            turn_limit: default_turn_limit(),
            session_age_seconds: default_session_age(),
            negative_sentiment_threshold: default_negative_sentiment_threshold(),
            repeated_intent_window: default_repeated_intent_window(),
            average_handle_time_seconds: default_aht(),
            wait_estimate_floor_seconds: default_wait_floor(),
            queue_mapping: default_queue_mapping(),
            default_queue_name: default_general_queue(),
            priority_queue_name: default_priority_queue(),
            agent_skill_requirements: default_skill_requirements(),
            specialty_skills: default_specialty_skills(),
            routing_profiles: HashMap::new(),
            pending_timeout_seconds: default_pending_timeout(),
            callback_delay_seconds: default_callback_delay(),
            snapshot_turns: default_snapshot_turns(),
            notifier: NotifierConfig::default(),
        }
    }
}

impl EscalationConfig {
    pub fn queue_for(&self, reason: EscalationReason) -> &str {
        self.queue_mapping
            .get(reason.as_str())
            .map(String::as_str)
            .unwrap_or(&self.default_queue_name)
    }

    pub fn required_skills(&self, reason: EscalationReason) -> &[String] {
        self.agent_skill_requirements
            .get(reason.as_str())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn specialty_skill(&self, reason: EscalationReason) -> Option<&str> {
        self.specialty_skills.get(reason.as_str()).map(String::as_str)
    }
}

/// Notification delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default = "default_notifier_timeout")]
    pub timeout_ms: u64,

    /// Deliver to this URL instead of the log when set
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Oldest dead letters are dropped beyond this size
    #[serde(default = "default_dead_letter_capacity")]
    pub dead_letter_capacity: usize,
}

fn default_channel_capacity() -> usize {
    1024
}

fn default_workers() -> usize {
    2
}

fn default_notifier_timeout() -> u64 {
    5000
}

fn default_dead_letter_capacity() -> usize {
    1000
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            workers: default_workers(),
            timeout_ms: default_notifier_timeout(),
            webhook_url: None,
            dead_letter_capacity: default_dead_letter_capacity(),
        }
    }
}
