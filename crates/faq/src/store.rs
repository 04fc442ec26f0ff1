//! In-memory FAQ table

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;

use contact_center_core::{Error, FaqItem, FaqStore, Result};

use crate::defaults::default_faqs;

/// FAQ table held in process memory
#[derive(Default)]
pub struct InMemoryFaqStore {
    items: RwLock<HashMap<String, FaqItem>>,
}

impl InMemoryFaqStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: impl IntoIterator<Item = FaqItem>) -> Self {
        let store = Self::new();
        {
            let mut map = store.items.write();
            for item in items {
                map.insert(item.faq_id.clone(), item);
            }
        }
        store
    }

    /// Insert the default entries when the table is empty; returns how many were added
    pub fn seed_defaults(&self) -> usize {
        let mut map = self.items.write();
        if !map.is_empty() {
            return 0;
        }
        for item in default_faqs() {
            map.insert(item.faq_id.clone(), item);
        }
        tracing::info!(count = map.len(), "Seeded default FAQ entries");
        map.len()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

#[async_trait]
impl FaqStore for InMemoryFaqStore {
    async fn scan_active(&self, category: Option<&str>) -> Result<Vec<FaqItem>> {
        Ok(self
            .items
            .read()
            .values()
            .filter(|item| item.is_active)
            .filter(|item| category.map_or(true, |c| item.category == c))
            .cloned()
            .collect())
    }

    async fn get(&self, faq_id: &str) -> Result<Option<FaqItem>> {
        Ok(self.items.read().get(faq_id).cloned())
    }

    async fn put(&self, mut item: FaqItem) -> Result<()> {
        if item.question.trim().is_empty() || item.answer.trim().is_empty() {
            return Err(Error::InvalidInput(
                "FAQ question and answer must not be empty".to_string(),
            ));
        }
        item.updated_at = Utc::now();
        self.items.write().insert(item.faq_id.clone(), item);
        Ok(())
    }

    async fn increment_view(&self, faq_id: &str) -> Result<()> {
        let mut map = self.items.write();
        let item = map
            .get_mut(faq_id)
            .ok_or_else(|| Error::NotFound(format!("faq {}", faq_id)))?;
        item.view_count += 1;
        Ok(())
    }

    async fn scan_all(&self) -> Result<Vec<FaqItem>> {
        Ok(self.items.read().values().cloned().collect())
    }
}
