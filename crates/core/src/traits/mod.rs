//! Collaborator traits for the orchestration core
//!
//! Every outward-facing dependency sits behind one of these traits so the
//! orchestrator can be wired with real backends in production and with
//! fakes in tests.
//!
//! ```text
//! Understanding:
//!   - NluProvider: utterance -> intent, confidence, entities
//!   - SentimentAnalyzer: utterance -> sentiment scores
//!
//! Storage:
//!   - SessionStore: per-session state with per-key serialization
//!   - FaqStore: FAQ backing store (in-memory table or document store)
//!
//! Side effects:
//!   - Notifier: best-effort event delivery
//! ```

mod nlu;
mod notifier;
mod store;

pub use nlu::{NluContext, NluProvider, SentimentAnalyzer};
pub use notifier::Notifier;
pub use store::{FaqStore, SessionFilter, SessionStore};
