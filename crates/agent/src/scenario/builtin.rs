//! Flows available without any flow file

use std::collections::BTreeMap;

use contact_center_core::{FlowDefinition, InputType, Step, ValidationRules};

pub const PRODUCT_INQUIRY: &str = "product_inquiry";
pub const RESERVATION: &str = "reservation";

fn next(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn choices(values: &[&str]) -> ValidationRules {
    ValidationRules {
        choices: values.iter().map(|v| v.to_string()).collect(),
        ..Default::default()
    }
}

fn product_inquiry() -> FlowDefinition {
    FlowDefinition {
        flow_id: PRODUCT_INQUIRY.to_string(),
        name: "상품 문의".to_string(),
        description: "상품 관련 문의를 처리하는 시나리오".to_string(),
        steps: vec![
            Step {
                step_id: "ask_product_category".to_string(),
                message: "어떤 종류의 상품에 대해 문의하시나요?\n1. 전자제품\n2. 의류\n3. 생활용품\n4. 기타"
                    .to_string(),
                input_type: InputType::Choice,
                validation_rules: choices(&["1", "2", "3", "4", "전자제품", "의류", "생활용품", "기타"]),
                next_steps: next(&[("default", "ask_specific_product")]),
                field_name: Some("product_category".to_string()),
            },
            Step {
                step_id: "ask_specific_product".to_string(),
                message: "구체적으로 어떤 상품에 대해 문의하시나요?".to_string(),
                input_type: InputType::Text,
                validation_rules: ValidationRules {
                    min_length: Some(2),
                    max_length: Some(100),
                    ..Default::default()
                },
                next_steps: next(&[("default", "ask_inquiry_type")]),
                field_name: Some("product_name".to_string()),
            },
            Step {
                step_id: "ask_inquiry_type".to_string(),
                message: "{product_name}에 대해 어떤 내용을 문의하시나요?\n1. 가격 정보\n2. 재고 확인\n3. 상품 상세정보\n4. 기타"
                    .to_string(),
                input_type: InputType::Choice,
                validation_rules: choices(&["1", "2", "3", "4", "가격", "재고", "상세정보", "기타"]),
                next_steps: next(&[
                    ("1", "complete"),
                    ("2", "complete"),
                    ("3", "complete"),
                    ("4", "escalate"),
                    ("기타", "escalate"),
                ]),
                field_name: Some("inquiry_type".to_string()),
            },
        ],
    }
}

fn reservation() -> FlowDefinition {
    FlowDefinition {
        flow_id: RESERVATION.to_string(),
        name: "예약 서비스".to_string(),
        description: "각종 예약을 처리하는 시나리오".to_string(),
        steps: vec![
            Step {
                step_id: "ask_service_type".to_string(),
                message: "어떤 서비스 예약을 원하시나요?\n1. 상담 예약\n2. 방문 서비스\n3. 전화 상담\n4. 기타"
                    .to_string(),
                input_type: InputType::Choice,
                validation_rules: choices(&["1", "2", "3", "4"]),
                next_steps: next(&[("default", "ask_preferred_date")]),
                field_name: Some("service_type".to_string()),
            },
            Step {
                step_id: "ask_preferred_date".to_string(),
                message: "희망하시는 날짜를 알려주세요. (예: 2024-01-15)".to_string(),
                input_type: InputType::Date,
                validation_rules: ValidationRules {
                    future_only: true,
                    ..Default::default()
                },
                next_steps: next(&[("default", "ask_contact_info")]),
                field_name: Some("preferred_date".to_string()),
            },
            Step {
                step_id: "ask_contact_info".to_string(),
                message: "{preferred_date} 예약을 위해 연락 가능한 전화번호를 알려주세요.".to_string(),
                input_type: InputType::Text,
                validation_rules: ValidationRules {
                    pattern: Some(r"^01[0-9]-[0-9]{4}-[0-9]{4}$".to_string()),
                    error_message: Some(
                        "올바른 전화번호 형식으로 입력해주세요. (예: 010-1234-5678)".to_string(),
                    ),
                    ..Default::default()
                },
                next_steps: next(&[("default", "complete")]),
                field_name: Some("contact_number".to_string()),
            },
        ],
    }
}

/// The flows every deployment starts with
pub fn builtin_flows() -> Vec<FlowDefinition> {
    vec![product_inquiry(), reservation()]
}
