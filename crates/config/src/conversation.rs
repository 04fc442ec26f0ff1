//! Conversation orchestration configuration
//!
//! Reply templates, clarification texts and fallback texts are plain
//! read-only maps so they can be reloaded without touching code.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use contact_center_core::{Channel, ErrorCategory, Intent};

/// Conversation orchestration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Overall budget for one turn
    #[serde(default = "default_turn_budget")]
    pub turn_budget_ms: u64,

    /// Inputs at most this many characters count as flow continuations
    #[serde(default = "default_continuation_chars")]
    pub continuation_max_chars: usize,

    /// Channels allowed to mint a session when none is supplied
    #[serde(default = "default_minting_channels")]
    pub minting_channels: Vec<Channel>,

    /// Customer attributes copied from request metadata into the session
    #[serde(default = "default_customer_keys")]
    pub customer_metadata_keys: Vec<String>,

    #[serde(default)]
    pub messages: ConversationMessages,
}

fn default_turn_budget() -> u64 {
    15_000
}

fn default_continuation_chars() -> usize {
    20
}

fn default_minting_channels() -> Vec<Channel> {
    vec![
        Channel::WebChat,
        Channel::Sms,
        Channel::MobileApp,
        Channel::Messenger,
    ]
}

fn default_customer_keys() -> Vec<String> {
    ["vip", "segment", "repeat_customer", "phone", "utc_offset_minutes"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            turn_budget_ms: default_turn_budget(),
            continuation_max_chars: default_continuation_chars(),
            minting_channels: default_minting_channels(),
            customer_metadata_keys: default_customer_keys(),
            messages: ConversationMessages::default(),
        }
    }
}

impl ConversationConfig {
    pub fn can_mint(&self, channel: Channel) -> bool {
        self.minting_channels.contains(&channel)
    }
}

/// Customer-facing texts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessages {
    /// intent -> reply
    #[serde(default = "default_reply_templates")]
    pub reply_templates: HashMap<String, String>,

    /// intent -> clarification question
    #[serde(default = "default_clarifications")]
    pub clarifications: HashMap<String, String>,

    #[serde(default = "default_clarification")]
    pub default_clarification: String,

    #[serde(default = "default_faq_no_match")]
    pub faq_no_match: String,

    #[serde(default = "default_waiting_for_agent")]
    pub waiting_for_agent: String,

    #[serde(default = "default_agent_handling")]
    pub agent_handling: String,

    #[serde(default = "default_flow_completed")]
    pub flow_completed: String,

    #[serde(default = "default_negative_prefix")]
    pub negative_sentiment_prefix: String,

    #[serde(default = "default_session_ended")]
    pub session_ended: String,

    #[serde(default = "default_flow_cancelled")]
    pub flow_cancelled: String,

    /// error category (`degraded`, `internal`, `timeout`) -> text
    #[serde(default = "default_fallbacks")]
    pub fallbacks: HashMap<String, String>,
}

fn owned_map(entries: &[(&str, &str)]) -> HashMap<String, String> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn default_reply_templates() -> HashMap<String, String> {
    owned_map(&[
        ("greeting", "안녕하세요! 무엇을 도와드릴까요?"),
        ("goodbye", "이용해 주셔서 감사합니다. 좋은 하루 되세요!"),
        (
            "product_inquiry",
            "상품에 대해 문의해주셔서 감사합니다. 어떤 상품이 궁금하신가요?",
        ),
        ("reservation", "예약 도움을 드리겠습니다."),
        (
            "complaint",
            "불편을 끼쳐드려 죄송합니다. 어떤 점이 불편하셨는지 말씀해 주시면 바로 확인하겠습니다.",
        ),
        ("cancel_request", "취소 요청을 접수하겠습니다. 취소하실 내역을 알려주세요."),
        (
            "technical_support",
            "기술 지원이 필요하시군요. 어떤 문제가 발생했는지 자세히 말씀해 주시겠어요?",
        ),
        (
            "payment_inquiry",
            "결제 관련 문의를 도와드리겠습니다. 어떤 결제 건이 궁금하신가요?",
        ),
    ])
}

fn default_clarifications() -> HashMap<String, String> {
    owned_map(&[
        (
            "product_inquiry",
            "어떤 상품에 대해 문의하시는 건가요? 좀 더 구체적으로 말씀해 주세요.",
        ),
        (
            "complaint",
            "어떤 부분에서 불편을 겪으셨는지 자세히 말씀해 주시겠어요?",
        ),
        (
            "technical_support",
            "어떤 기술적인 문제가 발생했는지 구체적으로 설명해 주시겠어요?",
        ),
        ("reservation", "어떤 예약에 대해 문의하시는 건가요?"),
        ("cancel_request", "어떤 것을 취소하고 싶으신가요?"),
        ("payment_inquiry", "결제와 관련해서 어떤 문제가 있으신가요?"),
    ])
}

fn default_clarification() -> String {
    "좀 더 자세히 말씀해 주시겠어요?".to_string()
}

fn default_faq_no_match() -> String {
    "죄송합니다. 관련된 답변을 찾지 못했습니다. 조금 더 구체적으로 말씀해 주시겠어요?".to_string()
}

fn default_waiting_for_agent() -> String {
    "상담원 연결을 기다리고 있습니다. 잠시만 기다려주세요.".to_string()
}

fn default_agent_handling() -> String {
    "상담원이 응대 중입니다. 메시지는 상담원에게 전달됩니다.".to_string()
}

fn default_flow_completed() -> String {
    "요청이 완료되었습니다. 담당자가 검토 후 연락드리겠습니다.".to_string()
}

fn default_negative_prefix() -> String {
    "불편을 끼쳐드려 죄송합니다.".to_string()
}

fn default_session_ended() -> String {
    "상담이 종료되었습니다. 이용해 주셔서 감사합니다.".to_string()
}

fn default_flow_cancelled() -> String {
    "진행 중인 요청을 취소했습니다. 다른 도움이 필요하시면 말씀해 주세요.".to_string()
}

pub const FALLBACK_DEGRADED: &str = "degraded";
pub const FALLBACK_INTERNAL: &str = "internal";
pub const FALLBACK_TIMEOUT: &str = "timeout";

fn default_fallbacks() -> HashMap<String, String> {
    owned_map(&[
        (
            FALLBACK_DEGRADED,
            "죄송합니다. 일시적 오류가 발생했습니다. 잠시 후 다시 시도해주세요.",
        ),
        (
            FALLBACK_INTERNAL,
            "죄송합니다. 요청을 처리하지 못했습니다. 잠시 후 다시 시도해주세요.",
        ),
        (
            FALLBACK_TIMEOUT,
            "응답이 지연되고 있습니다. 잠시 후 다시 시도해주세요.",
        ),
    ])
}

impl Default for ConversationMessages {
    fn default() -> Self {
        Self {
            reply_templates: default_reply_templates(),
            clarifications: default_clarifications(),
            default_clarification: default_clarification(),
            faq_no_match: default_faq_no_match(),
            waiting_for_agent: default_waiting_for_agent(),
            agent_handling: default_agent_handling(),
            flow_completed: default_flow_completed(),
            negative_sentiment_prefix: default_negative_prefix(),
            session_ended: default_session_ended(),
            flow_cancelled: default_flow_cancelled(),
            fallbacks: default_fallbacks(),
        }
    }
}

impl ConversationMessages {
    pub fn reply_for(&self, intent: Intent) -> Option<&str> {
        self.reply_templates.get(intent.as_str()).map(String::as_str)
    }

    pub fn clarification_for(&self, intent: Intent) -> &str {
        self.clarifications
            .get(intent.as_str())
            .map(String::as_str)
            .unwrap_or(&self.default_clarification)
    }

    fn fallback(&self, key: &str) -> &str {
        self.fallbacks
            .get(key)
            .or_else(|| self.fallbacks.get(FALLBACK_INTERNAL))
            .map(String::as_str)
            .unwrap_or("잠시 후 다시 시도해주세요.")
    }

    pub fn fallback_for(&self, category: ErrorCategory) -> &str {
        match category {
            ErrorCategory::Degraded => self.fallback(FALLBACK_DEGRADED),
            _ => self.fallback(FALLBACK_INTERNAL),
        }
    }

    pub fn timeout_fallback(&self) -> &str {
        self.fallback(FALLBACK_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clarification_lookup() {
        let messages = ConversationMessages::default();
        assert!(messages
            .clarification_for(Intent::Complaint)
            .contains("불편"));
        assert_eq!(
            messages.clarification_for(Intent::Greeting),
            "좀 더 자세히 말씀해 주시겠어요?"
        );
    }

    #[test]
    fn test_fallback_per_category() {
        let messages = ConversationMessages::default();
        assert!(messages
            .fallback_for(ErrorCategory::Degraded)
            .contains("일시적 오류"));
        assert!(!messages.fallback_for(ErrorCategory::Internal).is_empty());
    }

    #[test]
    fn test_voice_does_not_mint() {
        let config = ConversationConfig::default();
        assert!(config.can_mint(Channel::WebChat));
        assert!(!config.can_mint(Channel::Voice));
    }
}
