//! Skill-based agent selection
//!
//! Score out of 100:
//! - skill match, 40: fraction of required skills held (20 when none are required)
//! - load, 30: `30 - 10 * current_load`, floored at 0
//! - performance, 20: `0.2 * productivity_score`
//! - tier, 10: VIP customer with a `vip` agent, or the reason's specialty skill
//!
//! Ties go to the lower load, then the longest idle agent, then `agent_id`.

use std::cmp::Ordering;

use contact_center_core::Agent;

pub const VIP_TAG: &str = "vip";

/// What the request needs from an agent
#[derive(Debug, Clone, Default)]
pub struct SelectionCriteria<'a> {
    pub required_skills: &'a [String],
    pub vip: bool,
    pub specialty_skill: Option<&'a str>,
}

pub fn score_agent(agent: &Agent, criteria: &SelectionCriteria<'_>) -> f64 {
    let skill = if criteria.required_skills.is_empty() {
        20.0
    } else {
        let held = criteria
            .required_skills
            .iter()
            .filter(|s| agent.skills.contains(*s))
            .count();
        40.0 * held as f64 / criteria.required_skills.len() as f64
    };

    let load = (30.0 - 10.0 * agent.current_load as f64).max(0.0);
    let performance = 0.2 * agent.productivity_score.clamp(0.0, 100.0);

    let vip_match = criteria.vip && agent.tags.contains(VIP_TAG);
    let specialty_match = criteria
        .specialty_skill
        .is_some_and(|s| agent.skills.contains(s));
    let tier = if vip_match || specialty_match { 10.0 } else { 0.0 };

    skill + load + performance + tier
}

/// Eligible agents are available, below capacity and hold at least one
/// required skill when any are required.
pub fn is_eligible(agent: &Agent, criteria: &SelectionCriteria<'_>) -> bool {
    agent.can_take_contact()
        && (criteria.required_skills.is_empty()
            || criteria
                .required_skills
                .iter()
                .any(|s| agent.skills.contains(s)))
}

/// Best eligible agent, or `None` when nobody qualifies
pub fn select_agent<'a>(candidates: &'a [Agent], criteria: &SelectionCriteria<'_>) -> Option<&'a Agent> {
    candidates
        .iter()
        .filter(|a| is_eligible(a, criteria))
        .map(|a| (a, score_agent(a, criteria)))
        .min_by(|(a, sa), (b, sb)| {
            sb.partial_cmp(sa)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.current_load.cmp(&b.current_load))
                .then_with(|| a.last_activity_at.cmp(&b.last_activity_at))
                .then_with(|| a.agent_id.cmp(&b.agent_id))
        })
        .map(|(a, _)| a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use contact_center_core::AgentStatus;

    fn skills(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_score_components() {
        let required = skills(&["complaint"]);
        let criteria = SelectionCriteria {
            required_skills: &required,
            vip: false,
            specialty_skill: Some("complaint"),
        };
        let agent = Agent::new("a1", "김", 3)
            .with_skills(["complaint"])
            .with_productivity(50.0);
        // 40 skill + 30 load + 10 performance + 10 specialty
        assert_eq!(score_agent(&agent, &criteria), 90.0);

        let no_skills = SelectionCriteria::default();
        assert_eq!(score_agent(&agent, &no_skills), 60.0);
    }

    #[test]
    fn test_vip_tier_bonus() {
        let criteria = SelectionCriteria {
            vip: true,
            ..Default::default()
        };
        let plain = Agent::new("a1", "김", 3);
        let vip = Agent::new("a2", "이", 3).with_tags(["vip"]);
        assert_eq!(score_agent(&vip, &criteria) - score_agent(&plain, &criteria), 10.0);
        assert_eq!(select_agent(&[plain, vip], &criteria).unwrap().agent_id, "a2");
    }

    #[test]
    fn test_skill_filter() {
        let required = skills(&["payment"]);
        let criteria = SelectionCriteria {
            required_skills: &required,
            ..Default::default()
        };
        let agents = vec![
            Agent::new("a1", "김", 3).with_skills(["complaint"]),
            Agent::new("a2", "이", 3).with_skills(["payment"]),
        ];
        assert_eq!(select_agent(&agents, &criteria).unwrap().agent_id, "a2");

        let nobody = vec![Agent::new("a1", "김", 3).with_skills(["complaint"])];
        assert!(select_agent(&nobody, &criteria).is_none());
    }

    #[test]
    fn test_unavailable_agents_skipped() {
        let mut away = Agent::new("a1", "김", 3);
        away.status = AgentStatus::Away;
        let mut full = Agent::new("a2", "이", 1);
        full.current_load = 1;
        assert!(select_agent(&[away, full], &SelectionCriteria::default()).is_none());
    }

    #[test]
    fn test_tie_breaks() {
        let now = Utc::now();
        let mut idle = Agent::new("b", "이", 5);
        idle.last_activity_at = now - Duration::minutes(10);
        let mut recent = Agent::new("a", "김", 5);
        recent.last_activity_at = now;
        let criteria = SelectionCriteria::default();
        assert_eq!(
            select_agent(&[recent.clone(), idle.clone()], &criteria).unwrap().agent_id,
            "b"
        );

        // Identical on every criterion: agent_id decides
        let mut twin = recent.clone();
        twin.agent_id = "0".to_string();
        assert_eq!(select_agent(&[recent, twin], &criteria).unwrap().agent_id, "0");
    }

    #[test]
    fn test_load_beats_idle_time() {
        let now = Utc::now();
        let mut loaded = Agent::new("a", "김", 5);
        loaded.current_load = 1;
        loaded.last_activity_at = now - Duration::hours(1);
        let fresh = Agent::new("b", "이", 5);
        assert_eq!(
            select_agent(&[loaded, fresh], &SelectionCriteria::default()).unwrap().agent_id,
            "b"
        );
    }
}
