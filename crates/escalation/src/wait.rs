//! Wait-time estimation, in seconds throughout

use contact_center_core::{Priority, QueueSnapshot};

pub const MIN_WAIT_SECONDS: u64 = 60;
pub const CRITICAL_CAP_SECONDS: u64 = 300;
pub const HIGH_CAP_SECONDS: u64 = 600;

/// Estimate how long a new contact waits in a queue
pub fn estimate_wait(
    snapshot: &QueueSnapshot,
    priority: Priority,
    average_handle_time: u64,
    floor: u64,
) -> u64 {
    let raw = if snapshot.agents_available > 0 {
        // ceil(contacts / agents * aht) in integer arithmetic
        let work = snapshot.contacts_in_queue.saturating_mul(average_handle_time);
        work.div_ceil(snapshot.agents_available)
    } else {
        snapshot.longest_queue_wait.max(floor)
    };

    let capped = match priority {
        Priority::Critical => raw.min(CRITICAL_CAP_SECONDS),
        Priority::High => raw.min(HIGH_CAP_SECONDS),
        _ => raw,
    };
    capped.max(MIN_WAIT_SECONDS)
}
