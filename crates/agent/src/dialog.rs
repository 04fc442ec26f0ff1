//! Conversation context derivation
//!
//! Mood and stage are coarse labels kept in the session context. They feed
//! the NLU context summary and give agents a quick read on a handed-off
//! conversation.

use contact_center_core::{
    ConversationStage, CustomerMood, InputType, Intent, Sentiment, SentimentLabel,
};

/// Below this confidence the customer is treated as confused
pub const CONFUSED_CONFIDENCE: f32 = 0.5;

/// New mood for the turn, or `None` to keep the current one
pub fn derive_mood(
    intent: Intent,
    confidence: f32,
    sentiment: Option<&Sentiment>,
) -> Option<CustomerMood> {
    let label = sentiment.map(|s| s.label);
    if intent == Intent::Complaint {
        Some(CustomerMood::Frustrated)
    } else if confidence < CONFUSED_CONFIDENCE {
        Some(CustomerMood::Confused)
    } else if label == Some(SentimentLabel::Negative) {
        Some(CustomerMood::Frustrated)
    } else if intent == Intent::Greeting {
        Some(CustomerMood::Neutral)
    } else if label == Some(SentimentLabel::Positive) {
        Some(CustomerMood::Positive)
    } else {
        None
    }
}

/// New stage for the turn, or `None` to keep the current one
pub fn derive_stage(intent: Intent, flow_active: bool) -> Option<ConversationStage> {
    if flow_active {
        return Some(ConversationStage::DataCollection);
    }
    match intent {
        Intent::Greeting => Some(ConversationStage::Greeting),
        Intent::Goodbye => Some(ConversationStage::Closing),
        Intent::ProductInquiry
        | Intent::TechnicalSupport
        | Intent::PaymentInquiry
        | Intent::Inquiry
        | Intent::GeneralInquiry => Some(ConversationStage::Inquiry),
        Intent::Complaint | Intent::CancelRequest => Some(ConversationStage::ProblemSolving),
        Intent::Reservation => None,
    }
}

/// Whether input received during a flow answers the current step: short
/// input, or a step that waits for a value.
pub fn is_continuation(input: &str, step_input: Option<InputType>, max_chars: usize) -> bool {
    input.trim().chars().count() <= max_chars
        || step_input.is_some_and(|t| t.demands_value())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contact_center_core::SentimentScores;

    fn negative() -> Sentiment {
        Sentiment {
            label: SentimentLabel::Negative,
            confidence: 0.9,
            scores: SentimentScores {
                negative: 0.9,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_mood_rules() {
        assert_eq!(
            derive_mood(Intent::Complaint, 0.95, None),
            Some(CustomerMood::Frustrated)
        );
        assert_eq!(
            derive_mood(Intent::ProductInquiry, 0.3, None),
            Some(CustomerMood::Confused)
        );
        assert_eq!(
            derive_mood(Intent::Greeting, 0.9, None),
            Some(CustomerMood::Neutral)
        );
        assert_eq!(
            derive_mood(Intent::Inquiry, 0.9, Some(&negative())),
            Some(CustomerMood::Frustrated)
        );
        assert_eq!(derive_mood(Intent::Inquiry, 0.9, None), None);
    }

    #[test]
    fn test_stage_rules() {
        assert_eq!(
            derive_stage(Intent::TechnicalSupport, false),
            Some(ConversationStage::Inquiry)
        );
        assert_eq!(
            derive_stage(Intent::CancelRequest, false),
            Some(ConversationStage::ProblemSolving)
        );
        assert_eq!(
            derive_stage(Intent::Greeting, true),
            Some(ConversationStage::DataCollection)
        );
    }

    #[test]
    fn test_continuation_heuristic() {
        assert!(is_continuation("1", None, 20));
        assert!(is_continuation(
            "제가 원하는 날짜는 다음 달 셋째 주 화요일 오후입니다",
            Some(InputType::Date),
            20
        ));
        assert!(!is_continuation(
            "그런데 다른 상품의 재고도 궁금한데 알려주실 수 있나요",
            Some(InputType::Display),
            20
        ));
    }
}
