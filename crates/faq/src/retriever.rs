//! FAQ similarity retriever
//!
//! Score = 0.7 × S_q + 0.3 × S_k + 0.1 × priority, capped at 1.0.
//!
//! - S_q: share of query tokens found among the question tokens
//! - S_k: 1.0 when a keyword occurs in the query, else the share of query
//!   tokens found among the keyword tokens
//!
//! Tokens are lowercased whitespace words after punctuation is stripped.
//! Two tokens match when equal or when the shorter one (at least two
//! characters) starts the longer, so `영업시간` matches `영업시간이`.
//! Ordering is fully deterministic: score desc, then priority asc, then
//! view count desc, then id.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

use contact_center_config::FaqConfig;
use contact_center_core::{Error, FaqItem, FaqStore, Result, ScoredFaq};

use crate::FaqError;

static PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s가-힣]").expect("valid punctuation regex"));

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

const QUESTION_WEIGHT: f64 = 0.7;
const KEYWORD_WEIGHT: f64 = 0.3;
const PRIORITY_BOOST: f64 = 0.1;
const MIN_STEM_CHARS: usize = 2;

/// Lowercase, strip punctuation, collapse whitespace
pub fn preprocess(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped = PUNCTUATION.replace_all(lowered.trim(), " ");
    WHITESPACE.replace_all(stripped.trim(), " ").into_owned()
}

fn tokens(text: &str) -> HashSet<String> {
    preprocess(text)
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// A preprocessed query and its tokens
#[derive(Debug, Clone)]
pub struct QueryTerms {
    text: String,
    tokens: HashSet<String>,
}

impl QueryTerms {
    pub fn new(query: &str) -> Self {
        let text = preprocess(query);
        let tokens = text.split_whitespace().map(str::to_string).collect();
        Self { text, tokens }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Equal, or one token is a stem of the other plus trailing particles
fn token_matches(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    let (short, long) = if a.chars().count() <= b.chars().count() {
        (a, b)
    } else {
        (b, a)
    };
    short.chars().count() >= MIN_STEM_CHARS && long.starts_with(short)
}

fn coverage(query: &HashSet<String>, target: &HashSet<String>) -> f64 {
    if query.is_empty() || target.is_empty() {
        return 0.0;
    }
    let matched = query
        .iter()
        .filter(|q| target.iter().any(|t| token_matches(q, t)))
        .count();
    matched as f64 / query.len() as f64
}

/// Score one FAQ against a prepared query
pub fn score_item(query: &QueryTerms, item: &FaqItem) -> f64 {
    let question_similarity = coverage(&query.tokens, &tokens(&item.question));

    let keyword_contained = item.keywords.iter().any(|k| {
        let keyword = preprocess(k);
        !keyword.is_empty() && query.text.contains(keyword.as_str())
    });
    let keyword_similarity = if keyword_contained {
        1.0
    } else {
        let keyword_tokens: HashSet<String> =
            item.keywords.iter().flat_map(|k| tokens(k)).collect();
        coverage(&query.tokens, &keyword_tokens)
    };

    let base = QUESTION_WEIGHT * question_similarity + KEYWORD_WEIGHT * keyword_similarity;
    (base + PRIORITY_BOOST * item.priority as f64).clamp(0.0, 1.0)
}

/// Overall confidence of a ranked result list
///
/// `max × (1 + (similar − 1) × 0.1)` capped at 1.0, where `similar` counts
/// the top three hits scoring at least 80% of the best one.
pub fn overall_confidence(results: &[ScoredFaq]) -> f64 {
    let Some(best) = results.first() else {
        return 0.0;
    };
    let max = best.score;
    let similar = results
        .iter()
        .take(3)
        .filter(|r| r.score >= max * 0.8)
        .count();
    (max * (1.0 + (similar as f64 - 1.0) * 0.1)).min(1.0)
}

/// Search output with its overall confidence
#[derive(Debug, Clone, Default)]
pub struct FaqSearchResult {
    pub query: String,
    pub items: Vec<ScoredFaq>,
    pub confidence: f64,
}

impl FaqSearchResult {
    pub fn top(&self) -> Option<&ScoredFaq> {
        self.items.first()
    }
}

/// Ranks FAQ entries for a query
pub struct FaqRetriever {
    store: Arc<dyn FaqStore>,
    config: FaqConfig,
}

impl FaqRetriever {
    pub fn new(store: Arc<dyn FaqStore>, config: FaqConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &FaqConfig {
        &self.config
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(self.config.timeout_ms)
    }

    async fn scan(&self, category: Option<&str>) -> Result<Vec<FaqItem>> {
        match tokio::time::timeout(self.timeout(), self.store.scan_active(category)).await {
            Ok(Ok(items)) => Ok(items),
            Ok(Err(e)) => Err(match e {
                Error::FaqUnavailable(_) => e,
                other => FaqError::Store(other.to_string()).into(),
            }),
            Err(_) => Err(FaqError::Timeout.into()),
        }
    }

    /// Rank active entries against `query`; no side effects
    pub async fn search(
        &self,
        query: &str,
        category: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<ScoredFaq>> {
        let terms = QueryTerms::new(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let items = self.scan(category).await?;
        let mut scored: Vec<ScoredFaq> = items
            .into_iter()
            .map(|item| ScoredFaq {
                score: score_item(&terms, &item),
                item,
            })
            .filter(|hit| hit.score >= self.config.min_score)
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.item.priority.cmp(&b.item.priority))
                .then_with(|| b.item.view_count.cmp(&a.item.view_count))
                .then_with(|| a.item.faq_id.cmp(&b.item.faq_id))
        });
        scored.truncate(limit.unwrap_or(self.config.top_k));

        tracing::debug!(
            query = %query,
            hits = scored.len(),
            top_score = scored.first().map(|s| s.score).unwrap_or(0.0),
            "FAQ search"
        );
        Ok(scored)
    }

    /// `search` plus overall confidence
    pub async fn search_with_confidence(
        &self,
        query: &str,
        category: Option<&str>,
        limit: Option<usize>,
    ) -> Result<FaqSearchResult> {
        let items = self.search(query, category, limit).await?;
        Ok(FaqSearchResult {
            query: query.to_string(),
            confidence: overall_confidence(&items),
            items,
        })
    }

    /// Fetch without side effects
    pub async fn get(&self, faq_id: &str) -> Result<Option<FaqItem>> {
        self.store.get(faq_id).await
    }

    /// Mark an entry as shown to the customer; bumps its view count
    pub async fn select(&self, faq_id: &str) -> Result<Option<FaqItem>> {
        if self.store.get(faq_id).await?.is_none() {
            return Ok(None);
        }
        self.store.increment_view(faq_id).await?;
        self.store.get(faq_id).await
    }

    /// Most viewed active entries
    pub async fn popular(&self, category: Option<&str>, limit: usize) -> Result<Vec<FaqItem>> {
        let mut items = self.scan(category).await?;
        items.sort_by(|a, b| {
            b.view_count
                .cmp(&a.view_count)
                .then_with(|| a.faq_id.cmp(&b.faq_id))
        });
        items.truncate(limit);
        Ok(items)
    }

    /// Sorted distinct categories of active entries
    pub async fn categories(&self) -> Result<Vec<String>> {
        let items = self.scan(None).await?;
        let categories: BTreeSet<String> = items.into_iter().map(|item| item.category).collect();
        Ok(categories.into_iter().collect())
    }
}
