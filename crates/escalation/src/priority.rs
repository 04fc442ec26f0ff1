//! Escalation priority
//!
//! A base priority per reason, raised by customer modifiers. Modifiers only
//! ever raise the priority, so the result is monotone in both the VIP flag
//! and the history length.

use contact_center_core::{EscalationReason, Priority};

/// History length above which a priority is raised to at least medium
pub const LONG_HISTORY_TURNS: usize = 10;

pub fn base_priority(reason: EscalationReason) -> Priority {
    use EscalationReason::*;
    match reason {
        UrgentMatter => Priority::Critical,
        Complaint | PaymentIssue | NegativeSentiment | SystemError => Priority::High,
        TechnicalSupport | ComplexInquiry | UserRequest => Priority::Medium,
        CustomerRequest | BotLimitation | Timeout | ScenarioDirected => Priority::Low,
    }
}

/// Apply the VIP and long-history modifiers to `base`
pub fn adjust_priority(base: Priority, vip: bool, history_len: usize) -> Priority {
    let mut priority = base;
    if vip {
        priority = priority.at_least(Priority::High);
    }
    if history_len > LONG_HISTORY_TURNS {
        priority = priority.at_least(Priority::Medium);
    }
    priority
}
