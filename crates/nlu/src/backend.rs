//! NLU backend trait
//!
//! A backend performs exactly one classification attempt. Timeouts,
//! retries and error mapping live in [`crate::NluAdapter`].

use async_trait::async_trait;

use contact_center_core::{NluContext, NluResult};

use crate::NluError;

/// Single-attempt intent classifier
#[async_trait]
pub trait NluBackend: Send + Sync {
    /// Classify one utterance
    async fn classify(&self, utterance: &str, context: &NluContext)
        -> Result<NluResult, NluError>;

    /// Backend name for logs and metrics
    fn name(&self) -> &str;
}
