//! NLU result types and the unified intent enumeration

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Unified intent enumeration shared by every NLU backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Greeting,
    Goodbye,
    ProductInquiry,
    Complaint,
    Reservation,
    CancelRequest,
    TechnicalSupport,
    PaymentInquiry,
    Inquiry,
    GeneralInquiry,
}

impl Intent {
    pub const ALL: [Intent; 10] = [
        Intent::Greeting,
        Intent::Goodbye,
        Intent::ProductInquiry,
        Intent::Complaint,
        Intent::Reservation,
        Intent::CancelRequest,
        Intent::TechnicalSupport,
        Intent::PaymentInquiry,
        Intent::Inquiry,
        Intent::GeneralInquiry,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Greeting => "greeting",
            Intent::Goodbye => "goodbye",
            Intent::ProductInquiry => "product_inquiry",
            Intent::Complaint => "complaint",
            Intent::Reservation => "reservation",
            Intent::CancelRequest => "cancel_request",
            Intent::TechnicalSupport => "technical_support",
            Intent::PaymentInquiry => "payment_inquiry",
            Intent::Inquiry => "inquiry",
            Intent::GeneralInquiry => "general_inquiry",
        }
    }

    /// Map a provider label onto the unified enumeration.
    ///
    /// Accepts snake_case, PascalCase and a few provider aliases. Anything
    /// unrecognised becomes `GeneralInquiry`.
    pub fn normalize(label: &str) -> Intent {
        let key: String = label
            .trim()
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(|c| c.to_lowercase())
            .collect();

        match key.as_str() {
            "greeting" | "hello" | "welcome" => Intent::Greeting,
            "goodbye" | "farewell" | "thanks" | "thankyou" => Intent::Goodbye,
            "productinquiry" | "product" | "productinfo" => Intent::ProductInquiry,
            "complaint" | "complain" => Intent::Complaint,
            "reservation" | "booking" | "makereservation" => Intent::Reservation,
            "cancelrequest" | "cancel" | "cancellation" => Intent::CancelRequest,
            "technicalsupport" | "techsupport" | "support" => Intent::TechnicalSupport,
            "paymentinquiry" | "payment" | "billing" => Intent::PaymentInquiry,
            "inquiry" | "faq" => Intent::Inquiry,
            _ => Intent::GeneralInquiry,
        }
    }

    /// Intents answered with a fixed template
    pub fn is_simple_informational(&self) -> bool {
        matches!(self, Intent::Greeting | Intent::Goodbye)
    }

    /// Intents routed to the FAQ retriever
    pub fn is_faq_class(&self) -> bool {
        matches!(self, Intent::Inquiry | Intent::GeneralInquiry)
    }

    /// Intents that may skip generated text and go straight to an agent
    pub fn is_security_sensitive(&self) -> bool {
        matches!(
            self,
            Intent::CancelRequest | Intent::PaymentInquiry | Intent::Complaint
        )
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of a single classification call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NluResult {
    pub intent: Intent,
    /// Always within [0, 1]
    pub confidence: f32,
    #[serde(default)]
    pub entities: BTreeMap<String, String>,
    /// Free-text audit trail; holds raw provider output on parse failure
    #[serde(default)]
    pub reasoning: String,
    /// Provider-suggested reply, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_text: Option<String>,
    /// Provider-suggested next action, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}

impl NluResult {
    pub fn new(intent: Intent, confidence: f32) -> Self {
        Self {
            intent,
            confidence: clamp_confidence(confidence),
            entities: BTreeMap::new(),
            reasoning: String::new(),
            response_text: None,
            suggested_action: None,
        }
    }

    pub fn with_entity(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entities.insert(key.into(), value.into());
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }

    pub fn with_response_text(mut self, text: impl Into<String>) -> Self {
        self.response_text = Some(text.into());
        self
    }
}

/// Clamp a provider-reported confidence into [0, 1]; NaN becomes 0
pub fn clamp_confidence(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Coarse sentiment label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SentimentLabel {
    Positive,
    Negative,
    #[default]
    Neutral,
    Mixed,
}

/// Per-label scores, each within [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct SentimentScores {
    pub positive: f32,
    pub negative: f32,
    pub neutral: f32,
    pub mixed: f32,
}

/// Sentiment of a single utterance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Sentiment {
    pub label: SentimentLabel,
    pub confidence: f32,
    pub scores: SentimentScores,
}

impl Sentiment {
    pub fn neutral() -> Self {
        Self {
            label: SentimentLabel::Neutral,
            confidence: 1.0,
            scores: SentimentScores {
                neutral: 1.0,
                ..Default::default()
            },
        }
    }

    /// Confidence that the utterance is negative
    pub fn negative_confidence(&self) -> f32 {
        self.scores.negative
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_provider_labels() {
        assert_eq!(Intent::normalize("Greeting"), Intent::Greeting);
        assert_eq!(Intent::normalize("ProductInquiry"), Intent::ProductInquiry);
        assert_eq!(Intent::normalize("payment_inquiry"), Intent::PaymentInquiry);
        assert_eq!(Intent::normalize("cancel-request"), Intent::CancelRequest);
        assert_eq!(Intent::normalize("weather"), Intent::GeneralInquiry);
    }

    #[test]
    fn test_confidence_is_clamped() {
        assert_eq!(NluResult::new(Intent::Greeting, 1.7).confidence, 1.0);
        assert_eq!(NluResult::new(Intent::Greeting, -0.2).confidence, 0.0);
        assert_eq!(clamp_confidence(f32::NAN), 0.0);
    }

    #[test]
    fn test_intent_serde_names() {
        let json = serde_json::to_string(&Intent::TechnicalSupport).unwrap();
        assert_eq!(json, "\"technical_support\"");
        for intent in Intent::ALL {
            assert_eq!(Intent::normalize(intent.as_str()), intent);
        }
    }
}
