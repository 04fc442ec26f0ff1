//! Persistence layer for the contact-center core
//!
//! Provides:
//! - An in-memory session store with per-session serialization and
//!   optimistic concurrency
//! - A background archiver applying the retention policy
//! - JSON snapshots of the three logical collections (sessions,
//!   escalations, agents)

pub mod archive;
pub mod error;
pub mod sessions;
pub mod snapshot;

pub use archive::Archiver;
pub use error::PersistenceError;
pub use sessions::InMemorySessionStore;
pub use snapshot::Snapshot;
