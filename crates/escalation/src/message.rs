//! Customer-facing escalation notice

use contact_center_core::{EscalationRequest, Priority};

/// Whole minutes, rounded up, never below one
pub fn wait_minutes(seconds: u64) -> u64 {
    seconds.div_ceil(60).max(1)
}

/// Notice shown to the customer once a request is queued
pub fn customer_message(request: &EscalationRequest) -> String {
    let priority_line = match request.priority {
        Priority::Critical => "긴급 요청으로 우선 처리됩니다.",
        Priority::High => "우선순위가 높은 요청입니다.",
        _ => "순서대로 처리됩니다.",
    };
    format!(
        "상담원 연결 요청이 접수되었습니다.\n참조번호: {}\n예상 대기시간: 약 {}분\n\n{}\n\n잠시만 기다려주세요. 곧 상담원이 연결됩니다.",
        request.reference_number(),
        wait_minutes(request.estimated_wait_seconds),
        priority_line,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use contact_center_core::{EscalationReason, EscalationStatus};

    fn request(priority: Priority, wait: u64) -> EscalationRequest {
        let now = Utc::now();
        EscalationRequest {
            escalation_id: "esc_ab12cd34ef56".to_string(),
            session_id: "s1".to_string(),
            customer_id: None,
            reason: EscalationReason::UrgentMatter,
            priority,
            status: EscalationStatus::Pending,
            description: String::new(),
            conversation_snapshot: Vec::new(),
            customer_data: Default::default(),
            assigned_agent: None,
            queue_name: "priority-queue".to_string(),
            created_at: now,
            updated_at: now,
            estimated_wait_seconds: wait,
            tags: Default::default(),
            callback_at: None,
        }
    }

    #[test]
    fn test_wait_minutes() {
        assert_eq!(wait_minutes(60), 1);
        assert_eq!(wait_minutes(61), 2);
        assert_eq!(wait_minutes(0), 1);
    }

    #[test]
    fn test_message_contents() {
        let text = customer_message(&request(Priority::Critical, 300));
        assert!(text.contains("참조번호: ESC_AB12"));
        assert!(text.contains("약 5분"));
        assert!(text.contains("긴급 요청"));

        let text = customer_message(&request(Priority::Low, 900));
        assert!(text.contains("순서대로"));
    }
}
