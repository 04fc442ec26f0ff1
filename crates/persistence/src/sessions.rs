//! In-memory session store
//!
//! Sessions live in a `DashMap`; every mutation runs under the shard lock
//! of its key, which serializes operations on one session while different
//! sessions proceed in parallel.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use contact_center_core::{
    Channel, Error, Result, Session, SessionFilter, SessionStore, TurnRecord,
};

use crate::PersistenceError;

/// Session store backed by a concurrent map
pub struct InMemorySessionStore {
    sessions: DashMap<String, Session>,
    max_retries: u32,
}

impl InMemorySessionStore {
    /// `max_retries` bounds `retry_count` when updates are validated
    pub fn new(max_retries: u32) -> Self {
        Self {
            sessions: DashMap::new(),
            max_retries,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Copy of every stored session, ordered by creation time
    pub fn export(&self) -> Vec<Session> {
        let mut all: Vec<Session> = self.sessions.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });
        all
    }

    /// Load sessions from a snapshot, replacing entries with the same id
    pub fn import(&self, sessions: Vec<Session>) -> usize {
        let count = sessions.len();
        for session in sessions {
            self.sessions.insert(session.session_id.clone(), session);
        }
        count
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(
        &self,
        session_id: &str,
        user_id: Option<String>,
        channel: Channel,
    ) -> Result<Session> {
        if session_id.trim().is_empty() {
            return Err(Error::InvalidInput("session_id must not be empty".into()));
        }
        match self.sessions.entry(session_id.to_string()) {
            Entry::Occupied(_) => Err(PersistenceError::AlreadyExists {
                session_id: session_id.to_string(),
            }
            .into()),
            Entry::Vacant(slot) => {
                let session = Session::new(session_id, user_id, channel);
                tracing::debug!(session_id, channel = %channel, "Session created");
                slot.insert(session.clone());
                Ok(session)
            }
        }
    }

    async fn get(&self, session_id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.get(session_id).map(|e| e.value().clone()))
    }

    async fn update(&self, session: &Session) -> Result<()> {
        let mut stored = self
            .sessions
            .get_mut(&session.session_id)
            .ok_or_else(|| PersistenceError::NotFound(session.session_id.clone()))?;

        if stored.version != session.version {
            return Err(PersistenceError::VersionConflict {
                session_id: session.session_id.clone(),
                expected: session.version,
                actual: stored.version,
            }
            .into());
        }
        if !stored.status.can_transition_to(session.status) {
            return Err(Error::InvalidTransition {
                from: stored.status.to_string(),
                to: session.status.to_string(),
            });
        }
        session.check_invariants(self.max_retries)?;

        // History is owned by `append_turn`; the caller's copy may be stale.
        stored.user_id = session.user_id.clone();
        stored.status = session.status;
        stored.context = session.context.clone();
        stored.current_flow = session.current_flow.clone();
        stored.current_step = session.current_step.clone();
        stored.retry_count = session.retry_count;
        stored.updated_at = Utc::now();
        stored.version += 1;
        Ok(())
    }

    async fn append_turn(&self, session_id: &str, mut turn: TurnRecord) -> Result<()> {
        let mut stored = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| PersistenceError::NotFound(session_id.to_string()))?;

        if let Some(last) = stored.history.last() {
            if turn.timestamp < last.timestamp {
                let now = Utc::now();
                turn.timestamp = if now < last.timestamp {
                    last.timestamp
                } else {
                    now
                };
            }
        }
        stored.updated_at = turn.timestamp.max(stored.updated_at);
        stored.history.push(turn);
        stored.version += 1;
        Ok(())
    }

    async fn list_active(&self, filter: &SessionFilter) -> Result<Vec<Session>> {
        let mut sessions: Vec<Session> = self
            .sessions
            .iter()
            .filter(|e| !e.status.is_closed() && filter.matches(e.value()))
            .map(|e| e.value().clone())
            .collect();
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(sessions)
    }

    async fn purge_archivable(
        &self,
        now: DateTime<Utc>,
        retention: Duration,
    ) -> Result<Vec<Session>> {
        let expired: Vec<String> = self
            .sessions
            .iter()
            .filter(|e| e.is_archivable(now, retention))
            .map(|e| e.key().clone())
            .collect();

        let mut purged = Vec::with_capacity(expired.len());
        for id in expired {
            // Re-check under the removal lock in case the session moved on
            if let Some((_, session)) = self
                .sessions
                .remove_if(&id, |_, s| s.is_archivable(now, retention))
            {
                purged.push(session);
            }
        }
        if !purged.is_empty() {
            tracing::info!(count = purged.len(), "Purged archivable sessions");
        }
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contact_center_core::{SessionStatus, TurnSource};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_create_and_get() {
        let store = InMemorySessionStore::new(3);
        let created = store
            .create("s1", Some("u1".into()), Channel::WebChat)
            .await
            .unwrap();
        assert_eq!(created.status, SessionStatus::Active);

        let fetched = store.get("s1").await.unwrap().unwrap();
        assert_eq!(fetched.user_id.as_deref(), Some("u1"));
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_create_conflicts() {
        let store = InMemorySessionStore::new(3);
        store.create("s1", None, Channel::Sms).await.unwrap();
        let err = store.create("s1", None, Channel::Sms).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn test_stale_update_conflicts() {
        let store = InMemorySessionStore::new(3);
        store.create("s1", None, Channel::WebChat).await.unwrap();

        let mut first = store.get("s1").await.unwrap().unwrap();
        let mut second = first.clone();

        first.set_context("a", 1);
        store.update(&first).await.unwrap();

        second.set_context("b", 2);
        let err = store.update(&second).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        let stored = store.get("s1").await.unwrap().unwrap();
        assert!(stored.context.contains_key("a"));
        assert!(!stored.context.contains_key("b"));
    }

    #[tokio::test]
    async fn test_update_rejects_illegal_transition() {
        let store = InMemorySessionStore::new(3);
        store.create("s1", None, Channel::WebChat).await.unwrap();

        let mut session = store.get("s1").await.unwrap().unwrap();
        session.status = SessionStatus::Completed;
        store.update(&session).await.unwrap();

        let mut session = store.get("s1").await.unwrap().unwrap();
        session.status = SessionStatus::Active;
        let err = store.update(&session).await.unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_update_rejects_step_without_flow() {
        let store = InMemorySessionStore::new(3);
        store.create("s1", None, Channel::WebChat).await.unwrap();

        let mut session = store.get("s1").await.unwrap().unwrap();
        session.current_step = Some("ask_date".into());
        assert!(store.update(&session).await.is_err());
    }

    #[tokio::test]
    async fn test_update_keeps_history() {
        let store = InMemorySessionStore::new(3);
        store.create("s1", None, Channel::WebChat).await.unwrap();
        let mut session = store.get("s1").await.unwrap().unwrap();

        store.append_turn("s1", TurnRecord::user("안녕하세요")).await.unwrap();

        // The caller's copy predates the append; a fresh get is required
        session.set_context("x", true);
        assert!(store.update(&session).await.is_err());

        let mut session = store.get("s1").await.unwrap().unwrap();
        session.history.clear();
        session.set_context("x", true);
        store.update(&session).await.unwrap();

        let stored = store.get("s1").await.unwrap().unwrap();
        assert_eq!(stored.history.len(), 1);
    }

    #[tokio::test]
    async fn test_backdated_turn_gets_server_timestamp() {
        let store = InMemorySessionStore::new(3);
        store.create("s1", None, Channel::WebChat).await.unwrap();

        store.append_turn("s1", TurnRecord::user("first")).await.unwrap();
        let mut late = TurnRecord::bot("second");
        late.timestamp = Utc::now() - Duration::hours(1);
        store.append_turn("s1", late).await.unwrap();

        let session = store.get("s1").await.unwrap().unwrap();
        assert!(session.history[1].timestamp >= session.history[0].timestamp);
        assert_eq!(session.history[1].source, TurnSource::Bot);
    }

    #[tokio::test]
    async fn test_concurrent_appends_keep_every_turn() {
        let store = Arc::new(InMemorySessionStore::new(3));
        store.create("s1", None, Channel::WebChat).await.unwrap();

        let tasks: Vec<_> = (0..20)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .append_turn("s1", TurnRecord::user(format!("msg {i}")))
                        .await
                })
            })
            .collect();
        for result in futures::future::join_all(tasks).await {
            result.unwrap().unwrap();
        }

        let session = store.get("s1").await.unwrap().unwrap();
        assert_eq!(session.history.len(), 20);
        assert_eq!(session.version, 20);
        for pair in session.history.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    #[tokio::test]
    async fn test_list_active_excludes_closed() {
        let store = InMemorySessionStore::new(3);
        store.create("open", None, Channel::WebChat).await.unwrap();
        store.create("voice", None, Channel::Voice).await.unwrap();
        store.create("done", None, Channel::WebChat).await.unwrap();

        let mut done = store.get("done").await.unwrap().unwrap();
        done.status = SessionStatus::Completed;
        store.update(&done).await.unwrap();

        let active = store.list_active(&SessionFilter::default()).await.unwrap();
        assert_eq!(active.len(), 2);

        let filter = SessionFilter {
            channel: Some(Channel::Voice),
            ..Default::default()
        };
        let voice = store.list_active(&filter).await.unwrap();
        assert_eq!(voice.len(), 1);
        assert_eq!(voice[0].session_id, "voice");
    }

    #[tokio::test]
    async fn test_purge_archivable() {
        let store = InMemorySessionStore::new(3);
        store.create("old", None, Channel::WebChat).await.unwrap();
        store.create("live", None, Channel::WebChat).await.unwrap();

        let mut old = store.get("old").await.unwrap().unwrap();
        old.status = SessionStatus::Cancelled;
        store.update(&old).await.unwrap();

        let later = Utc::now() + Duration::days(31);
        let purged = store
            .purge_archivable(later, Duration::days(30))
            .await
            .unwrap();
        assert_eq!(purged.len(), 1);
        assert_eq!(purged[0].session_id, "old");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_export_import() {
        let store = InMemorySessionStore::new(3);
        store.create("a", None, Channel::WebChat).await.unwrap();
        store.create("b", None, Channel::Sms).await.unwrap();

        let other = InMemorySessionStore::new(3);
        assert_eq!(other.import(store.export()), 2);
        assert!(other.get("b").await.unwrap().is_some());
    }
}
