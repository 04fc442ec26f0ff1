//! NLU factory
//!
//! Builds the configured backend and wraps it in an [`NluAdapter`].

use std::sync::Arc;
use std::time::Duration;

use contact_center_config::{NluConfig, NluProviderKind};
use contact_center_core::NluProvider;

use crate::{
    adapter::NluAdapter,
    generative::{GenerativeBackend, GenerativeConfig},
    keyword::KeywordBackend,
    slot::{SlotBackend, SlotConfig},
    NluError,
};

/// Creates NLU providers from configuration
pub struct NluFactory;

impl NluFactory {
    pub fn create(config: &NluConfig) -> Result<Arc<dyn NluProvider>, NluError> {
        Ok(Arc::new(Self::create_adapter(config)?))
    }

    pub fn create_adapter(config: &NluConfig) -> Result<NluAdapter, NluError> {
        let timeout = Duration::from_secs(config.timeout_seconds);

        let adapter = match config.provider {
            NluProviderKind::Keyword => NluAdapter::new(KeywordBackend::new()),
            NluProviderKind::SlotBased => NluAdapter::new(SlotBackend::new(SlotConfig {
                endpoint: config.endpoint.clone(),
                api_key: config.api_key.clone(),
                bot_id: config.bot_id.clone(),
                bot_alias_id: config.bot_alias_id.clone(),
                locale: config.locale.clone(),
                timeout,
            })?),
            NluProviderKind::Generative => {
                NluAdapter::new(GenerativeBackend::new(GenerativeConfig {
                    endpoint: config.endpoint.clone(),
                    api_key: config.api_key.clone(),
                    model: config.model_id.clone(),
                    temperature: config.temperature,
                    max_tokens: config.max_tokens,
                    timeout,
                })?)
            }
        };

        tracing::info!(provider = ?config.provider, "NLU provider configured");

        Ok(adapter
            .with_timeout(timeout)
            .with_retries(
                config.max_retries,
                Duration::from_millis(config.initial_backoff_ms),
            ))
    }
}
