//! Declarative scenario flow definitions

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Successor sentinel that completes the flow
pub const COMPLETE: &str = "complete";
/// Successor sentinel that hands the session to an agent
pub const ESCALATE: &str = "escalate";
/// Key used when no value-specific successor matches
pub const DEFAULT_NEXT: &str = "default";

/// Expected shape of the user's answer to a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InputType {
    #[default]
    Text,
    Choice,
    SecureText,
    Date,
    Number,
    Selection,
    Confirmation,
    Form,
    Display,
    FileUpload,
}

impl InputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputType::Text => "text",
            InputType::Choice => "choice",
            InputType::SecureText => "secure_text",
            InputType::Date => "date",
            InputType::Number => "number",
            InputType::Selection => "selection",
            InputType::Confirmation => "confirmation",
            InputType::Form => "form",
            InputType::Display => "display",
            InputType::FileUpload => "file_upload",
        }
    }

    /// Whether the step waits for a value from the user
    pub fn demands_value(&self) -> bool {
        !matches!(self, InputType::Display)
    }

    /// Whether the raw input must be kept out of transcripts
    pub fn is_secure(&self) -> bool {
        matches!(self, InputType::SecureText)
    }
}

/// Validation rules attached to a step. Unused fields are ignored per input type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ValidationRules {
    #[serde(default)]
    pub choices: Vec<String>,
    #[serde(default)]
    pub min_length: Option<usize>,
    #[serde(default)]
    pub max_length: Option<usize>,
    #[serde(default)]
    pub pattern: Option<String>,
    /// Message shown when `pattern` does not match
    #[serde(default)]
    pub error_message: Option<String>,
    /// chrono format string; defaults to `%Y-%m-%d`
    #[serde(default)]
    pub date_format: Option<String>,
    #[serde(default)]
    pub future_only: bool,
    #[serde(default)]
    pub min_value: Option<f64>,
    #[serde(default)]
    pub max_value: Option<f64>,
}

/// One node in a flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub step_id: String,
    /// Template with `{placeholder}` references into collected data
    pub message: String,
    #[serde(default)]
    pub input_type: InputType,
    #[serde(default)]
    pub validation_rules: ValidationRules,
    #[serde(default)]
    pub next_steps: BTreeMap<String, String>,
    /// Key under which the validated value is stored; `step_<id>` when absent
    #[serde(default)]
    pub field_name: Option<String>,
}

impl Step {
    pub fn field_name(&self) -> String {
        self.field_name
            .clone()
            .unwrap_or_else(|| format!("step_{}", self.step_id))
    }

    /// Resolve the successor for a validated value
    pub fn successor(&self, value: &str) -> Target {
        let raw = self
            .next_steps
            .get(value)
            .or_else(|| self.next_steps.get(DEFAULT_NEXT))
            .map(String::as_str)
            .unwrap_or(COMPLETE);
        Target::parse(raw)
    }
}

/// Where a transition leads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Step(String),
    Complete,
    Escalate,
}

impl Target {
    pub fn parse(raw: &str) -> Self {
        match raw {
            COMPLETE => Target::Complete,
            ESCALATE => Target::Escalate,
            other => Target::Step(other.to_string()),
        }
    }
}

/// A complete flow. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowDefinition {
    pub flow_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub steps: Vec<Step>,
}

impl FlowDefinition {
    pub fn first_step(&self) -> Option<&Step> {
        self.steps.first()
    }

    pub fn step(&self, step_id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.step_id == step_id)
    }

    pub fn step_index(&self, step_id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.step_id == step_id)
    }

    /// Every successor must be a known step or a sentinel
    pub fn validate(&self) -> Result<(), String> {
        if self.steps.is_empty() {
            return Err(format!("flow {} has no steps", self.flow_id));
        }
        let mut seen = std::collections::HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.step_id.as_str()) {
                return Err(format!(
                    "flow {} has duplicate step {}",
                    self.flow_id, step.step_id
                ));
            }
        }
        for step in &self.steps {
            for target in step.next_steps.values() {
                if let Target::Step(id) = Target::parse(target) {
                    if self.step(&id).is_none() {
                        return Err(format!(
                            "flow {} step {} points at unknown step {}",
                            self.flow_id, step.step_id, id
                        ));
                    }
                }
            }
            if let Some(pattern) = &step.validation_rules.pattern {
                if pattern.is_empty() {
                    return Err(format!("flow {} step {} has an empty pattern", self.flow_id, step.step_id));
                }
            }
        }
        Ok(())
    }
}

/// Rendered prompt for the step the session is waiting on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepPrompt {
    pub flow_id: String,
    pub step_id: String,
    pub message: String,
    pub input_type: InputType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

/// Result of feeding one answer into the interpreter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    ContinuePrompt {
        step_id: String,
        rendered_message: String,
        input_type: InputType,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        options: Option<Vec<String>>,
    },
    Complete {
        collected_data: BTreeMap<String, String>,
    },
    Escalate {
        reason: String,
    },
    InvalidInput {
        error_message: String,
        retry_count: u32,
    },
}

/// Escalation reason emitted when a flow points at `escalate`
pub const REASON_SCENARIO_DIRECTED: &str = "scenario_directed";
/// Escalation reason emitted when the retry cap is reached
pub const REASON_REPEATED_INVALID_INPUT: &str = "repeated_invalid_input";
