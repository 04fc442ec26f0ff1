//! Storage traits

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::error::Result;
use crate::faq::FaqItem;
use crate::session::{Channel, Session, SessionStatus, TurnRecord};

/// Narrowing filter for `SessionStore::list_active`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionFilter {
    pub statuses: Option<Vec<SessionStatus>>,
    pub channel: Option<Channel>,
    pub user_id: Option<String>,
}

impl SessionFilter {
    pub fn matches(&self, session: &Session) -> bool {
        if let Some(statuses) = &self.statuses {
            if !statuses.contains(&session.status) {
                return false;
            }
        }
        if let Some(channel) = self.channel {
            if session.channel != channel {
                return false;
            }
        }
        if let Some(user) = &self.user_id {
            if session.user_id.as_deref() != Some(user.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Session persistence
///
/// Operations on the same `session_id` are serialized; different sessions
/// proceed in parallel.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create a new session; `Conflict` if the id already exists
    async fn create(
        &self,
        session_id: &str,
        user_id: Option<String>,
        channel: Channel,
    ) -> Result<Session>;

    async fn get(&self, session_id: &str) -> Result<Option<Session>>;

    /// Replace the stored session. Fails with `Conflict` when `session.version`
    /// no longer matches the stored version.
    async fn update(&self, session: &Session) -> Result<()>;

    /// Append a turn; timestamps that would go backwards are replaced by a
    /// server timestamp
    async fn append_turn(&self, session_id: &str, turn: TurnRecord) -> Result<()>;

    /// Sessions that are not completed or cancelled, narrowed by `filter`
    async fn list_active(&self, filter: &SessionFilter) -> Result<Vec<Session>>;

    /// Remove and return sessions eligible for archival
    async fn purge_archivable(&self, now: DateTime<Utc>, retention: Duration) -> Result<Vec<Session>>;
}

/// FAQ backing store
#[async_trait]
pub trait FaqStore: Send + Sync {
    /// Active entries, optionally limited to one category
    async fn scan_active(&self, category: Option<&str>) -> Result<Vec<FaqItem>>;

    async fn get(&self, faq_id: &str) -> Result<Option<FaqItem>>;

    async fn put(&self, item: FaqItem) -> Result<()>;

    async fn increment_view(&self, faq_id: &str) -> Result<()>;

    /// Every entry including inactive ones
    async fn scan_all(&self) -> Result<Vec<FaqItem>>;
}
