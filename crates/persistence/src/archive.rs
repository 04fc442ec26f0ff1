//! Retention enforcement
//!
//! Closed sessions untouched for longer than the retention period are
//! removed from the store and, when an archive path is configured,
//! appended to it as JSON lines.

use chrono::{Duration, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;

use contact_center_config::PersistenceConfig;
use contact_center_core::{Session, SessionStore};

use crate::PersistenceError;

/// Periodic purge of archivable sessions
pub struct Archiver {
    store: Arc<dyn SessionStore>,
    retention: Duration,
    interval: std::time::Duration,
    archive_path: Option<PathBuf>,
}

impl Archiver {
    pub fn new(store: Arc<dyn SessionStore>, config: &PersistenceConfig) -> Self {
        Self {
            store,
            retention: Duration::seconds(config.retention_seconds as i64),
            interval: std::time::Duration::from_secs(config.archive_interval_seconds.max(1)),
            archive_path: config.archive_path.as_ref().map(PathBuf::from),
        }
    }

    /// Run one purge pass; returns how many sessions were archived
    pub async fn run_once(&self) -> Result<usize, PersistenceError> {
        let purged = self
            .store
            .purge_archivable(Utc::now(), self.retention)
            .await
            .map_err(|e| PersistenceError::Store(e.to_string()))?;

        if let Some(path) = &self.archive_path {
            if !purged.is_empty() {
                append_lines(path, &purged).await?;
            }
        }
        Ok(purged.len())
    }

    /// Purge on an interval until `shutdown` flips to true
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match self.run_once().await {
                            Ok(0) => {}
                            Ok(count) => tracing::info!(count, "Archived sessions"),
                            Err(e) => tracing::error!(error = %e, "Archive pass failed"),
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            tracing::debug!("Archiver stopping");
                            break;
                        }
                    }
                }
            }
        })
    }
}

async fn append_lines(path: &PathBuf, sessions: &[Session]) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let mut body = Vec::new();
    for session in sessions {
        serde_json::to_writer(&mut body, session)?;
        body.push(b'\n');
    }
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(&body).await?;
    file.flush().await?;
    Ok(())
}
