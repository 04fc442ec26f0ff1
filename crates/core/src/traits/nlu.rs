//! Natural-language understanding traits

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;
use crate::nlu::{NluResult, Sentiment};

/// Session attributes passed along with an utterance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NluContext {
    pub session_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub last_intent: Option<String>,
    #[serde(default)]
    pub conversation_stage: Option<String>,
    #[serde(default)]
    pub customer_mood: Option<String>,
    /// Extra provider-specific attributes
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl NluContext {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            ..Default::default()
        }
    }

    /// Human-readable summary used in generative prompts
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        if let Some(user) = &self.user_id {
            lines.push(format!("고객 ID: {}", user));
        }
        if let Some(intent) = &self.last_intent {
            lines.push(format!("이전 의도: {}", intent));
        }
        if let Some(stage) = &self.conversation_stage {
            lines.push(format!("대화 단계: {}", stage));
        }
        if let Some(mood) = &self.customer_mood {
            lines.push(format!("고객 감정: {}", mood));
        }
        if lines.is_empty() {
            "새로운 대화".to_string()
        } else {
            lines.join("\n")
        }
    }
}

/// Intent classifier
///
/// Implementations are stateless; everything conversational arrives in
/// the `NluContext`.
#[async_trait]
pub trait NluProvider: Send + Sync {
    /// Classify a single utterance
    async fn classify(&self, utterance: &str, context: &NluContext) -> Result<NluResult>;

    /// Provider name for logs and metrics
    fn name(&self) -> &str;
}

/// Sentiment scorer feeding the escalation rules
#[async_trait]
pub trait SentimentAnalyzer: Send + Sync {
    async fn analyze(&self, text: &str) -> Result<Sentiment>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_for_new_conversation() {
        assert_eq!(NluContext::new("s").summary(), "새로운 대화");
    }

    #[test]
    fn test_summary_lines() {
        let ctx = NluContext {
            session_id: "s".into(),
            user_id: Some("u1".into()),
            last_intent: Some("greeting".into()),
            ..Default::default()
        };
        assert_eq!(ctx.summary(), "고객 ID: u1\n이전 의도: greeting");
    }
}
