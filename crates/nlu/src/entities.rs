//! Regex entity enrichment
//!
//! Adds phone, email, date and amount entities the provider did not fill.
//! Provider-supplied values always win.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

static PHONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"01[0-9]-[0-9]{4}-[0-9]{4}").expect("valid phone regex"));

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("valid email regex")
});

static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{4}-\d{2}-\d{2}").expect("valid date regex"));

static KOREAN_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{4})년\s*(\d{1,2})월\s*(\d{1,2})일").expect("valid korean date regex")
});

static AMOUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,3}(?:,\d{3})*)\s*원").expect("valid amount regex"));

pub const PHONE_NUMBER: &str = "phone_number";
pub const EMAIL_ADDRESS: &str = "email";
pub const DATE: &str = "date";
pub const AMOUNT_KEY: &str = "amount";

/// Pattern-based entity extractor
#[derive(Debug, Default, Clone, Copy)]
pub struct EntityExtractor;

impl EntityExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Entities found in `text`
    pub fn extract(&self, text: &str) -> BTreeMap<String, String> {
        let mut found = BTreeMap::new();

        if let Some(m) = PHONE.find(text) {
            found.insert(PHONE_NUMBER.to_string(), m.as_str().to_string());
        }

        if let Some(m) = EMAIL.find(text) {
            found.insert(EMAIL_ADDRESS.to_string(), m.as_str().to_string());
        }

        if let Some(m) = ISO_DATE.find(text) {
            found.insert(DATE.to_string(), m.as_str().to_string());
        } else if let Some(caps) = KOREAN_DATE.captures(text) {
            let part = |i: usize| caps.get(i).map(|m| m.as_str()).unwrap_or("0");
            let month: u32 = part(2).parse().unwrap_or(0);
            let day: u32 = part(3).parse().unwrap_or(0);
            found.insert(
                DATE.to_string(),
                format!("{}-{:02}-{:02}", part(1), month, day),
            );
        }

        if let Some(caps) = AMOUNT.captures(text) {
            if let Some(m) = caps.get(1) {
                found.insert(AMOUNT_KEY.to_string(), m.as_str().replace(',', ""));
            }
        }

        found
    }

    /// Merge extracted entities into `entities` without overwriting
    pub fn enrich(&self, text: &str, entities: &mut BTreeMap<String, String>) {
        for (key, value) in self.extract(text) {
            entities.entry(key).or_insert(value);
        }
    }
}
