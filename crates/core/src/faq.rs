//! FAQ entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Stored question/answer pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaqItem {
    pub faq_id: String,
    pub category: String,
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub keywords: BTreeSet<String>,
    /// Also feeds the score boost; ties prefer the lower value
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub view_count: u64,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl FaqItem {
    pub fn new(
        category: impl Into<String>,
        question: impl Into<String>,
        answer: impl Into<String>,
        keywords: impl IntoIterator<Item = impl Into<String>>,
        priority: i32,
    ) -> Self {
        let now = Utc::now();
        Self {
            faq_id: Self::mint_id(),
            category: category.into(),
            question: question.into(),
            answer: answer.into(),
            keywords: keywords.into_iter().map(Into::into).collect(),
            priority,
            is_active: true,
            view_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// `faq_<8 hex>`
    pub fn mint_id() -> String {
        let hex = uuid::Uuid::new_v4().simple().to_string();
        format!("faq_{}", &hex[..8])
    }
}

/// Search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredFaq {
    pub item: FaqItem,
    pub score: f64,
}
