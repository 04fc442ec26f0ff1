//! Prompt building for the generative backend
//!
//! The system prompt lists every supported intent with a description and
//! examples, then pins the answer to the JSON shape in [`verdict_schema`].

use serde::{Deserialize, Serialize};
use std::fmt;

use contact_center_core::{Intent, NluContext};

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// Chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Intent description shown to the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentDefinition {
    pub intent: Intent,
    pub description: String,
    pub examples: Vec<String>,
}

impl IntentDefinition {
    fn new(intent: Intent, description: &str, examples: &[&str]) -> Self {
        Self {
            intent,
            description: description.to_string(),
            examples: examples.iter().map(|e| e.to_string()).collect(),
        }
    }

    /// Built-in catalog covering the unified enumeration
    pub fn defaults() -> Vec<IntentDefinition> {
        vec![
            Self::new(
                Intent::Greeting,
                "인사, 안녕하세요, 처음 대화 시작",
                &["안녕하세요", "안녕", "반갑습니다"],
            ),
            Self::new(
                Intent::ProductInquiry,
                "상품 문의, 제품 정보, 가격, 스펙 문의",
                &["상품이 궁금해요", "가격이 얼마인가요", "스펙을 알고 싶어요"],
            ),
            Self::new(
                Intent::Complaint,
                "불만, 항의, 문제 제기, 서비스 불만족",
                &["불만이 있어요", "서비스가 별로예요", "문제가 있어요"],
            ),
            Self::new(
                Intent::Reservation,
                "예약, 예약 변경, 예약 취소",
                &["예약하고 싶어요", "예약을 변경하고 싶어요", "예약을 취소해주세요"],
            ),
            Self::new(
                Intent::CancelRequest,
                "취소 요청, 환불 요청, 주문 취소",
                &["취소하고 싶어요", "환불해주세요", "주문을 취소해주세요"],
            ),
            Self::new(
                Intent::TechnicalSupport,
                "기술 지원, 사용법 문의, 오류 해결",
                &["사용법을 모르겠어요", "오류가 발생해요", "기술 지원이 필요해요"],
            ),
            Self::new(
                Intent::PaymentInquiry,
                "결제 문의, 결제 방법, 결제 오류",
                &["결제가 안돼요", "결제 방법이 궁금해요", "결제 오류가 발생했어요"],
            ),
            Self::new(
                Intent::GeneralInquiry,
                "일반 문의, 기타 질문",
                &["문의가 있어요", "질문이 있어요", "도움이 필요해요"],
            ),
        ]
    }
}

/// JSON schema every generative verdict must satisfy
pub fn verdict_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "required": ["intent", "confidence"],
        "properties": {
            "intent": { "type": "string", "minLength": 1 },
            "confidence": { "type": "number", "minimum": 0.0, "maximum": 1.0 },
            "entities": {
                "type": "object",
                "additionalProperties": { "type": ["string", "number", "boolean"] }
            },
            "reasoning": { "type": "string" },
            "response_text": { "type": "string" },
            "next_action": { "type": "string" },
            "suggested_actions": { "type": "array", "items": { "type": "string" } }
        }
    })
}

/// Builds the chat messages for one classification
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    definitions: Vec<IntentDefinition>,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(IntentDefinition::defaults())
    }
}

impl PromptBuilder {
    pub fn new(definitions: Vec<IntentDefinition>) -> Self {
        Self { definitions }
    }

    pub fn system_prompt(&self) -> String {
        let catalog: Vec<String> = self
            .definitions
            .iter()
            .map(|d| {
                let examples: Vec<&str> = d.examples.iter().take(3).map(String::as_str).collect();
                format!("- {}: {} (예: {})", d.intent, d.description, examples.join(", "))
            })
            .collect();

        format!(
            "당신은 한국어 고객센터 AI 어시스턴트입니다. 고객의 메시지를 분석하여 의도를 파악하고 적절한 응답을 제공해야 합니다.\n\n\
             ## 지원하는 의도 (Intent):\n{}\n\n\
             ## 분석 규칙:\n\
             1. 고객의 메시지에서 핵심 의도를 파악하세요\n\
             2. 신뢰도(confidence)를 0.0~1.0 사이로 평가하세요\n\
             3. 메시지에서 중요한 엔티티(이름, 날짜, 상품명 등)를 추출하세요\n\
             4. 고객에게 도움이 되는 응답을 생성하세요\n\
             5. 다음 단계 액션을 제안하세요\n\n\
             ## 응답 형식:\n\
             반드시 다음 JSON 형식으로만 응답하세요:\n\
             {{\"intent\": \"의도명\", \"confidence\": 0.0, \"entities\": {{\"엔티티명\": \"값\"}}, \
             \"reasoning\": \"분석 근거\", \"response_text\": \"고객 응답 메시지\", \
             \"next_action\": \"다음 액션\", \"suggested_actions\": [\"제안 액션\"]}}",
            catalog.join("\n")
        )
    }

    pub fn user_prompt(&self, utterance: &str, context: &NluContext) -> String {
        format!(
            "## 대화 컨텍스트:\n{}\n\n## 고객 메시지:\n\"{}\"\n\n위 고객 메시지를 분석하여 JSON 형식으로 응답해주세요.",
            context.summary(),
            utterance
        )
    }

    pub fn build(&self, utterance: &str, context: &NluContext) -> Vec<Message> {
        vec![
            Message::system(self.system_prompt()),
            Message::user(self.user_prompt(utterance, context)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_lists_catalog() {
        let prompt = PromptBuilder::default().system_prompt();
        assert!(prompt.contains("- greeting: 인사"));
        assert!(prompt.contains("- payment_inquiry: 결제 문의"));
        assert!(prompt.contains("\"suggested_actions\""));
    }

    #[test]
    fn test_user_prompt_carries_context() {
        let mut ctx = NluContext::new("s1");
        ctx.last_intent = Some("complaint".to_string());
        let prompt = PromptBuilder::default().user_prompt("환불해주세요", &ctx);
        assert!(prompt.contains("이전 의도: complaint"));
        assert!(prompt.contains("\"환불해주세요\""));
    }
}
