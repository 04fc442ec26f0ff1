//! JSON snapshots of sessions, escalations and agents
//!
//! Written on shutdown and read on startup so a restart keeps in-flight
//! conversations. The file is replaced atomically through a sibling temp
//! file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use contact_center_core::{Agent, EscalationRequest, Session};

use crate::PersistenceError;

pub const SNAPSHOT_VERSION: u32 = 1;

/// The three logical collections at one point in time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub sessions: Vec<Session>,
    #[serde(default)]
    pub escalations: Vec<EscalationRequest>,
    #[serde(default)]
    pub agents: Vec<Agent>,
    #[serde(default)]
    pub written_at: Option<DateTime<Utc>>,
}

fn default_version() -> u32 {
    SNAPSHOT_VERSION
}

impl Snapshot {
    pub fn new(
        sessions: Vec<Session>,
        escalations: Vec<EscalationRequest>,
        agents: Vec<Agent>,
    ) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            sessions,
            escalations,
            agents,
            written_at: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty() && self.escalations.is_empty() && self.agents.is_empty()
    }

    /// Write the snapshot, replacing any existing file
    pub async fn write(&self, path: impl AsRef<Path>) -> Result<(), PersistenceError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut stamped = self.clone();
        stamped.written_at = Some(Utc::now());
        let body = serde_json::to_vec_pretty(&stamped)?;

        let tmp = temp_path(path);
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, path).await?;

        tracing::info!(
            path = %path.display(),
            sessions = self.sessions.len(),
            escalations = self.escalations.len(),
            agents = self.agents.len(),
            "Snapshot written"
        );
        Ok(())
    }

    /// Read a snapshot; a missing file yields `None`
    pub async fn read(path: impl AsRef<Path>) -> Result<Option<Self>, PersistenceError> {
        let path = path.as_ref();
        let body = match tokio::fs::read(path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let snapshot: Snapshot = serde_json::from_slice(&body)?;
        if snapshot.version != SNAPSHOT_VERSION {
            tracing::warn!(
                found = snapshot.version,
                expected = SNAPSHOT_VERSION,
                "Snapshot version mismatch, loading anyway"
            );
        }
        Ok(Some(snapshot))
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
