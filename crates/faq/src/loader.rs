//! FAQ file loader
//!
//! Loads FAQ entries from YAML, TOML or JSON files into any `FaqStore`.
//! A file holds a `faqs` array; entries without an id get a fresh one.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

use contact_center_config::load_document;
use contact_center_core::{FaqItem, FaqStore};

use crate::FaqError;

/// FAQ entry as written in data files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaqEntry {
    #[serde(default)]
    pub faq_id: Option<String>,
    pub category: String,
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub keywords: BTreeSet<String>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl From<FaqEntry> for FaqItem {
    fn from(entry: FaqEntry) -> Self {
        let mut item = FaqItem::new(
            entry.category,
            entry.question,
            entry.answer,
            entry.keywords,
            entry.priority,
        );
        if let Some(id) = entry.faq_id {
            item.faq_id = id;
        }
        item.is_active = entry.is_active;
        item
    }
}

/// FAQ file format
#[derive(Debug, Serialize, Deserialize)]
pub struct FaqFile {
    #[serde(default)]
    pub version: Option<String>,
    pub faqs: Vec<FaqEntry>,
}

/// Loader for populating a FAQ store
pub struct FaqLoader;

impl FaqLoader {
    /// Load one file; returns the number of entries stored
    pub async fn load_file(path: &Path, store: &dyn FaqStore) -> Result<usize, FaqError> {
        let file: FaqFile = load_document(path)?;
        let mut count = 0;
        for entry in file.faqs {
            store
                .put(entry.into())
                .await
                .map_err(|e| FaqError::Store(e.to_string()))?;
            count += 1;
        }
        Ok(count)
    }

    /// Load a file, or every YAML/TOML/JSON file in a directory
    ///
    /// Files that fail to parse are logged and skipped.
    pub async fn load_path(path: &Path, store: &dyn FaqStore) -> Result<usize, FaqError> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "FAQ path does not exist");
            return Ok(0);
        }

        if path.is_file() {
            return Self::load_file(path, store).await;
        }

        let mut files: Vec<_> = std::fs::read_dir(path)
            .map_err(|e| FaqError::Load(format!("Failed to read directory: {}", e)))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("yaml" | "yml" | "toml" | "json")
                )
            })
            .collect();
        files.sort();

        let mut total = 0;
        for file in files {
            match Self::load_file(&file, store).await {
                Ok(count) => {
                    tracing::info!(file = %file.display(), entries = count, "Loaded FAQ file");
                    total += count;
                }
                Err(e) => {
                    tracing::error!(file = %file.display(), error = %e, "Failed to load FAQ file");
                }
            }
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryFaqStore;
    use std::io::Write;

    const SAMPLE: &str = r#"
version: "1"
faqs:
  - faq_id: faq_hours001
    category: 일반
    question: 영업시간이 어떻게 되나요?
    answer: 평일 9시부터 18시까지입니다.
    keywords: [영업시간, 운영시간]
    priority: 7
  - category: 결제
    question: 환불은 얼마나 걸리나요?
    answer: 영업일 기준 3일 이내입니다.
    is_active: false
"#;

    #[tokio::test]
    async fn test_load_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        write!(file, "{}", SAMPLE).unwrap();

        let store = InMemoryFaqStore::new();
        let count = FaqLoader::load_file(file.path(), &store).await.unwrap();
        assert_eq!(count, 2);

        let hours = store.get("faq_hours001").await.unwrap().unwrap();
        assert_eq!(hours.priority, 7);
        assert!(hours.keywords.contains("운영시간"));
        assert_eq!(store.scan_active(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_load_directory_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.yaml"), SAMPLE).unwrap();
        std::fs::write(dir.path().join("b.yaml"), "faqs: [oops").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let store = InMemoryFaqStore::new();
        let count = FaqLoader::load_path(dir.path(), &store).await.unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_missing_path_loads_nothing() {
        let store = InMemoryFaqStore::new();
        let count = FaqLoader::load_path(Path::new("/nonexistent/faqs"), &store)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
