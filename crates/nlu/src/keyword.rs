//! Offline keyword backend
//!
//! First matching rule wins; anything unmatched is `general_inquiry`.

use async_trait::async_trait;

use contact_center_core::{Intent, NluContext, NluResult};

use crate::backend::NluBackend;
use crate::NluError;

struct KeywordRule {
    intent: Intent,
    keywords: &'static [&'static str],
    confidence: f32,
    reply: &'static str,
}

const RULES: &[KeywordRule] = &[
    KeywordRule {
        intent: Intent::Greeting,
        keywords: &["안녕", "안녕하세요", "hello", "hi"],
        confidence: 0.95,
        reply: "안녕하세요! 무엇을 도와드릴까요?",
    },
    KeywordRule {
        intent: Intent::ProductInquiry,
        keywords: &["상품", "제품", "가격", "product"],
        confidence: 0.90,
        reply: "상품 문의를 도와드리겠습니다. 어떤 상품에 대해 궁금하신가요?",
    },
    KeywordRule {
        intent: Intent::Complaint,
        keywords: &["불만", "문제", "별로", "나쁘", "싫어", "화나", "complaint", "불편"],
        confidence: 0.85,
        reply: "불편을 끼쳐드려 죄송합니다. 상담원 연결을 도와드리겠습니다.",
    },
    KeywordRule {
        intent: Intent::Reservation,
        keywords: &["예약", "reservation"],
        confidence: 0.88,
        reply: "예약 관련 도움을 드리겠습니다. 어떤 예약을 원하시나요?",
    },
    KeywordRule {
        intent: Intent::CancelRequest,
        keywords: &["취소", "환불", "cancel", "refund"],
        confidence: 0.86,
        reply: "취소 요청을 접수하겠습니다.",
    },
    KeywordRule {
        intent: Intent::PaymentInquiry,
        keywords: &["결제", "카드", "payment"],
        confidence: 0.86,
        reply: "결제 관련 문의를 도와드리겠습니다.",
    },
    KeywordRule {
        intent: Intent::TechnicalSupport,
        keywords: &["오류", "에러", "사용법", "로그인", "error"],
        confidence: 0.86,
        reply: "기술 지원이 필요하시군요. 어떤 문제가 발생했나요?",
    },
    KeywordRule {
        intent: Intent::Goodbye,
        keywords: &["감사합니다", "고마워", "bye"],
        confidence: 0.9,
        reply: "이용해 주셔서 감사합니다.",
    },
];

const FALLBACK_CONFIDENCE: f32 = 0.70;
const FALLBACK_REPLY: &str =
    "문의해 주셔서 감사합니다. 더 자세한 도움이 필요하시면 상담원과 연결해드릴 수 있습니다.";

/// Substring keyword matcher used for development and as the default backend
#[derive(Debug, Default, Clone)]
pub struct KeywordBackend;

impl KeywordBackend {
    pub fn new() -> Self {
        Self
    }

    fn match_rule(text: &str) -> Option<&'static KeywordRule> {
        let lowered = text.to_lowercase();
        RULES
            .iter()
            .find(|rule| rule.keywords.iter().any(|k| lowered.contains(k)))
    }
}

#[async_trait]
impl NluBackend for KeywordBackend {
    async fn classify(
        &self,
        utterance: &str,
        _context: &NluContext,
    ) -> Result<NluResult, NluError> {
        let result = match Self::match_rule(utterance) {
            Some(rule) => NluResult::new(rule.intent, rule.confidence)
                .with_reasoning(format!("keyword match for {}", rule.intent))
                .with_response_text(rule.reply),
            None => NluResult::new(Intent::GeneralInquiry, FALLBACK_CONFIDENCE)
                .with_reasoning("no keyword matched")
                .with_response_text(FALLBACK_REPLY),
        };
        Ok(result)
    }

    fn name(&self) -> &str {
        "keyword"
    }
}
