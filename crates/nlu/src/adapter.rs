//! NLU provider adapter
//!
//! Bridges an [`NluBackend`] to the core `NluProvider` trait, adding a
//! per-attempt timeout, retry with exponential backoff on transient
//! failures and regex entity enrichment.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};

use contact_center_core::{Error, NluContext, NluProvider, NluResult, Result};

use crate::backend::NluBackend;
use crate::entities::EntityExtractor;
use crate::NluError;

/// Adapter that wraps an NluBackend to implement the core NluProvider trait.
///
/// The adapter keeps no conversational state; it is safe to share one
/// instance across every session.
pub struct NluAdapter {
    backend: Arc<dyn NluBackend>,
    timeout: Duration,
    max_retries: u32,
    initial_backoff: Duration,
    extractor: EntityExtractor,
}

impl NluAdapter {
    pub fn new<B: NluBackend + 'static>(backend: B) -> Self {
        Self::from_arc(Arc::new(backend))
    }

    pub fn from_arc(backend: Arc<dyn NluBackend>) -> Self {
        Self {
            backend,
            timeout: Duration::from_secs(10),
            max_retries: 2,
            initial_backoff: Duration::from_millis(200),
            extractor: EntityExtractor::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, max_retries: u32, initial_backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.initial_backoff = initial_backoff;
        self
    }

    async fn attempt(&self, utterance: &str, context: &NluContext) -> std::result::Result<NluResult, NluError> {
        match tokio::time::timeout(self.timeout, self.backend.classify(utterance, context)).await {
            Ok(result) => result,
            Err(_) => Err(NluError::Timeout),
        }
    }
}

#[async_trait]
impl NluProvider for NluAdapter {
    async fn classify(&self, utterance: &str, context: &NluContext) -> Result<NluResult> {
        let start = Instant::now();
        let mut last_error = None;
        let mut backoff = self.initial_backoff;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tracing::warn!(
                    backend = self.backend.name(),
                    session_id = %context.session_id,
                    "NLU request failed, retrying in {:?} (attempt {}/{})",
                    backoff,
                    attempt,
                    self.max_retries
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }

            match self.attempt(utterance, context).await {
                Ok(mut result) => {
                    self.extractor.enrich(utterance, &mut result.entities);
                    metrics::histogram!("cc_nlu_latency_ms", "backend" => self.backend.name().to_string())
                        .record(start.elapsed().as_millis() as f64);
                    metrics::counter!("cc_nlu_requests_total", "backend" => self.backend.name().to_string(), "outcome" => "ok")
                        .increment(1);
                    tracing::debug!(
                        session_id = %context.session_id,
                        intent = %result.intent,
                        confidence = result.confidence,
                        "classified utterance"
                    );
                    return Ok(result);
                }
                Err(e) if e.is_retryable() => {
                    last_error = Some(e);
                }
                Err(e) => {
                    tracing::error!(backend = self.backend.name(), error = %e, "NLU request rejected");
                    metrics::counter!("cc_nlu_requests_total", "backend" => self.backend.name().to_string(), "outcome" => "rejected")
                        .increment(1);
                    return Err(e.into());
                }
            }
        }

        let error = last_error.unwrap_or(NluError::Network("Max retries exceeded".to_string()));
        tracing::error!(backend = self.backend.name(), error = %error, "NLU unavailable after retries");
        metrics::counter!("cc_nlu_requests_total", "backend" => self.backend.name().to_string(), "outcome" => "unavailable")
            .increment(1);
        Err(Error::NluUnavailable(error.to_string()))
    }

    fn name(&self) -> &str {
        self.backend.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contact_center_core::Intent;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails `failures` times with the given error, then succeeds
    struct Flaky {
        failures: u32,
        retryable: bool,
        calls: AtomicU32,
        delay: Duration,
    }

    impl Flaky {
        fn new(failures: u32, retryable: bool) -> Self {
            Self {
                failures,
                retryable,
                calls: AtomicU32::new(0),
                delay: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl NluBackend for Flaky {
        async fn classify(
            &self,
            _utterance: &str,
            _context: &NluContext,
        ) -> std::result::Result<NluResult, NluError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if call < self.failures {
                if self.retryable {
                    Err(NluError::Network("connection reset".to_string()))
                } else {
                    Err(NluError::Api("bad request".to_string()))
                }
            } else {
                Ok(NluResult::new(Intent::Greeting, 0.9))
            }
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    fn adapter(backend: Arc<Flaky>) -> NluAdapter {
        NluAdapter::from_arc(backend).with_retries(2, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_retries_transient_failures() {
        let backend = Arc::new(Flaky::new(2, true));
        let result = adapter(backend.clone())
            .classify("안녕하세요", &NluContext::new("s"))
            .await
            .unwrap();
        assert_eq!(result.intent, Intent::Greeting);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_unavailable_after_retries() {
        let backend = Arc::new(Flaky::new(10, true));
        let err = adapter(backend.clone())
            .classify("안녕하세요", &NluContext::new("s"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NluUnavailable(_)));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let backend = Arc::new(Flaky::new(1, false));
        let err = adapter(backend.clone())
            .classify("안녕하세요", &NluContext::new("s"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NluUnavailable(_)));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_transient() {
        let mut flaky = Flaky::new(0, true);
        flaky.delay = Duration::from_millis(200);
        let backend = Arc::new(flaky);
        let err = adapter(backend.clone())
            .with_timeout(Duration::from_millis(10))
            .classify("안녕하세요", &NluContext::new("s"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NluUnavailable(_)));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_entities_are_enriched() {
        let backend = Arc::new(Flaky::new(0, true));
        let result = adapter(backend)
            .classify("제 번호는 010-2222-3333 입니다", &NluContext::new("s"))
            .await
            .unwrap();
        assert_eq!(result.entities.get("phone_number").unwrap(), "010-2222-3333");
    }
}
