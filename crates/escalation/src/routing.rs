//! Queue selection

use contact_center_config::EscalationConfig;
use contact_center_core::{EscalationReason, Priority};

/// Critical requests always go to the priority queue; everything else
/// follows the per-reason mapping.
pub fn select_queue(config: &EscalationConfig, reason: EscalationReason, priority: Priority) -> String {
    if priority == Priority::Critical {
        return config.priority_queue_name.clone();
    }
    config.queue_for(reason).to_string()
}
