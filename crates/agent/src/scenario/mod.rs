//! Scenario interpreter
//!
//! Drives a session through a declarative flow. The interpreter owns no
//! state of its own: the active flow, step, retry count and collected
//! values all live on the `Session`, which the caller persists.
//!
//! ```text
//! start_flow ──► step ──advance(valid)──► next step ... ──► Complete
//!                  │                                    └─► Escalate (scenario_directed)
//!                  └─advance(invalid)──► InvalidInput, retry_count += 1
//!                        retry_count == max_retries ──► Escalate (repeated_invalid_input)
//! ```

pub mod builtin;
pub mod catalog;
pub mod render;
pub mod validate;

pub use builtin::builtin_flows;
pub use catalog::{FlowCatalog, FlowFile, FlowLoader};
pub use render::render_template;
pub use validate::{validate_input, value_key};

use chrono::{FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use contact_center_config::ScenarioConfig;
use contact_center_core::flow::{REASON_REPEATED_INVALID_INPUT, REASON_SCENARIO_DIRECTED};
use contact_center_core::session::keys;
use contact_center_core::{
    FlowDefinition, InputType, Outcome, Session, SessionStatus, Step, StepPrompt, Target,
};

use crate::ScenarioError;

/// Where a session stands in its flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowStatus {
    pub flow_id: String,
    pub flow_name: String,
    pub step_id: String,
    /// `(step index + 1) / step count`, as a percentage
    pub progress: u32,
    pub retry_count: u32,
    pub collected_data: BTreeMap<String, String>,
}

pub struct ScenarioInterpreter {
    catalog: Arc<FlowCatalog>,
    max_retries: u32,
    utc_offset_minutes: i32,
}

impl ScenarioInterpreter {
    pub fn new(catalog: Arc<FlowCatalog>, config: &ScenarioConfig) -> Self {
        Self {
            catalog,
            max_retries: config.max_retries,
            utc_offset_minutes: config.utc_offset_minutes,
        }
    }

    pub fn catalog(&self) -> &Arc<FlowCatalog> {
        &self.catalog
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    fn flow(&self, flow_id: &str) -> Result<Arc<FlowDefinition>, ScenarioError> {
        self.catalog
            .get(flow_id)
            .ok_or_else(|| ScenarioError::UnknownFlow(flow_id.to_string()))
    }

    /// Active flow and current step of `session`
    fn position(&self, session: &Session) -> Result<(Arc<FlowDefinition>, String), ScenarioError> {
        let no_flow = || ScenarioError::NoActiveFlow(session.session_id.clone());
        let flow_id = session.current_flow.as_deref().ok_or_else(no_flow)?;
        let step_id = session.current_step.clone().ok_or_else(no_flow)?;
        let flow = self.flow(flow_id)?;
        if flow.step(&step_id).is_none() {
            return Err(ScenarioError::UnknownStep {
                flow: flow.flow_id.clone(),
                step: step_id,
            });
        }
        Ok((flow, step_id))
    }

    /// Today's date in the session's timezone
    fn today(&self, session: &Session) -> NaiveDate {
        let minutes = session
            .context
            .get(keys::UTC_OFFSET_MINUTES)
            .and_then(Value::as_i64)
            .map(|m| m as i32)
            .unwrap_or(self.utc_offset_minutes);
        match FixedOffset::east_opt(minutes * 60) {
            Some(offset) => Utc::now().with_timezone(&offset).date_naive(),
            None => Utc::now().date_naive(),
        }
    }

    fn render(&self, flow: &FlowDefinition, step: &Step, session: &Session) -> StepPrompt {
        let mut message = render_template(&step.message, &session.collected_data());
        let choices = &step.validation_rules.choices;
        let lists_choices = matches!(step.input_type, InputType::Choice | InputType::Selection)
            && !choices.is_empty();
        if lists_choices && !choices.iter().any(|c| message.contains(c.as_str())) {
            message.push_str(&format!("\n({})", choices.join(" / ")));
        }
        StepPrompt {
            flow_id: flow.flow_id.clone(),
            step_id: step.step_id.clone(),
            message,
            input_type: step.input_type,
            options: lists_choices.then(|| choices.clone()),
        }
    }

    /// Enter `flow_id` at its first step. Previously collected values are
    /// replaced by `initial_context`.
    pub fn start_flow(
        &self,
        session: &mut Session,
        flow_id: &str,
        initial_context: BTreeMap<String, Value>,
    ) -> Result<StepPrompt, ScenarioError> {
        let flow = self.flow(flow_id)?;
        let first = flow.first_step().ok_or_else(|| {
            ScenarioError::InvalidDefinition(format!("flow {flow_id} has no steps"))
        })?;

        session.transition_to(SessionStatus::WaitingInput)?;
        session.context.remove(keys::COLLECTED_DATA);
        for (field, value) in initial_context {
            session.store_collected(field, value);
        }
        session.current_flow = Some(flow.flow_id.clone());
        session.current_step = Some(first.step_id.clone());
        session.retry_count = 0;

        tracing::info!(
            session_id = %session.session_id,
            flow_id = %flow.flow_id,
            step_id = %first.step_id,
            "Flow started"
        );
        Ok(self.render(&flow, first, session))
    }

    /// Prompt for the step the session is waiting on
    pub fn current_prompt(&self, session: &Session) -> Result<StepPrompt, ScenarioError> {
        let (flow, step_id) = self.position(session)?;
        let step = flow.step(&step_id).ok_or_else(|| ScenarioError::UnknownStep {
            flow: flow.flow_id.clone(),
            step: step_id.clone(),
        })?;
        Ok(self.render(&flow, step, session))
    }

    /// Whether the session's current step keeps its input out of transcripts
    pub fn awaits_secure_input(&self, session: &Session) -> bool {
        self.current_prompt(session)
            .map(|p| p.input_type.is_secure())
            .unwrap_or(false)
    }

    /// Feed one answer into the active flow
    pub fn advance(&self, session: &mut Session, user_input: &str) -> Result<Outcome, ScenarioError> {
        let (flow, step_id) = self.position(session)?;

        if session.retry_count >= self.max_retries {
            tracing::info!(
                session_id = %session.session_id,
                flow_id = %flow.flow_id,
                step_id = %step_id,
                retries = session.retry_count,
                "Retry cap reached"
            );
            session.clear_flow();
            return Ok(Outcome::Escalate {
                reason: REASON_REPEATED_INVALID_INPUT.to_string(),
            });
        }

        let step = flow.step(&step_id).ok_or_else(|| ScenarioError::UnknownStep {
            flow: flow.flow_id.clone(),
            step: step_id.clone(),
        })?;

        let value = match validate::validate_input(step, user_input, self.today(session)) {
            Ok(value) => value,
            Err(error_message) => {
                session.retry_count += 1;
                tracing::debug!(
                    session_id = %session.session_id,
                    step_id = %step_id,
                    retry_count = session.retry_count,
                    "Step input rejected"
                );
                return Ok(Outcome::InvalidInput {
                    error_message,
                    retry_count: session.retry_count,
                });
            },
        };

        let key = value_key(&value);
        if step.input_type.demands_value() {
            session.store_collected(step.field_name(), value);
        }
        session.retry_count = 0;

        match step.successor(&key) {
            Target::Step(next_id) => {
                let next = flow.step(&next_id).ok_or_else(|| ScenarioError::UnknownStep {
                    flow: flow.flow_id.clone(),
                    step: next_id.clone(),
                })?;
                session.current_step = Some(next_id);
                let prompt = self.render(&flow, next, session);
                Ok(Outcome::ContinuePrompt {
                    step_id: prompt.step_id,
                    rendered_message: prompt.message,
                    input_type: prompt.input_type,
                    options: prompt.options,
                })
            },
            Target::Complete => {
                let collected_data = session.collected_data();
                session.clear_flow();
                session.transition_to(SessionStatus::Active)?;
                tracing::info!(
                    session_id = %session.session_id,
                    flow_id = %flow.flow_id,
                    fields = collected_data.len(),
                    "Flow completed"
                );
                Ok(Outcome::Complete { collected_data })
            },
            Target::Escalate => {
                session.clear_flow();
                tracing::info!(
                    session_id = %session.session_id,
                    flow_id = %flow.flow_id,
                    "Flow directed escalation"
                );
                Ok(Outcome::Escalate {
                    reason: REASON_SCENARIO_DIRECTED.to_string(),
                })
            },
        }
    }

    /// Abandon the active flow and return the session to `active`
    pub fn cancel(&self, session: &mut Session) -> Result<(), ScenarioError> {
        if !session.has_active_flow() {
            return Err(ScenarioError::NoActiveFlow(session.session_id.clone()));
        }
        session.transition_to(SessionStatus::Active)?;
        session.clear_flow();
        session.context.remove(keys::COLLECTED_DATA);
        Ok(())
    }

    pub fn status(&self, session: &Session) -> Option<FlowStatus> {
        let (flow, step_id) = self.position(session).ok()?;
        let index = flow.step_index(&step_id)?;
        let progress = ((index + 1) as f64 / flow.steps.len() as f64 * 100.0).round() as u32;
        Some(FlowStatus {
            flow_id: flow.flow_id.clone(),
            flow_name: flow.name.clone(),
            step_id,
            progress,
            retry_count: session.retry_count,
            collected_data: session.collected_data(),
        })
    }
}
