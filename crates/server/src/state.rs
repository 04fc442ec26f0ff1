//! Application State
//!
//! Builds every component from `Settings` and hands the shared handles to
//! the HTTP layer and the background tasks.

use metrics_exporter_prometheus::PrometheusHandle;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use contact_center_agent::{Collaborators, FlowCatalog, Orchestrator, ScenarioInterpreter};
use contact_center_config::Settings;
use contact_center_core::{Notifier, NluProvider};
use contact_center_escalation::{
    AgentRegistry, EscalationEngine, LoggingNotifier, NotificationDispatcher, WebhookNotifier,
};
use contact_center_faq::{FaqLoader, FaqRetriever, InMemoryFaqStore};
use contact_center_nlu::{LexiconSentimentAnalyzer, NluFactory};
use contact_center_persistence::{InMemorySessionStore, Snapshot};

use crate::ServerError;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub orchestrator: Orchestrator,
    pub sessions: Arc<InMemorySessionStore>,
    pub escalation: Arc<EscalationEngine>,
    pub faq: Arc<FaqRetriever>,
    pub catalog: Arc<FlowCatalog>,
    pub notifications: Arc<NotificationDispatcher>,
    pub metrics: Option<PrometheusHandle>,
    nlu_provider: String,
}

impl AppState {
    /// Wire every component from configuration. Must run inside a Tokio
    /// runtime (the notification workers are spawned here).
    pub async fn build(settings: Settings) -> Result<Self, ServerError> {
        let nlu = NluFactory::create(&settings.nlu)
            .map_err(|e| ServerError::Startup(format!("NLU provider: {}", e)))?;
        Self::with_nlu(settings, nlu).await
    }

    /// Same as `build` with a caller-supplied NLU provider
    pub async fn with_nlu(settings: Settings, nlu: Arc<dyn NluProvider>) -> Result<Self, ServerError> {
        let sessions = Arc::new(InMemorySessionStore::new(settings.scenario.max_retries));

        let faq_store = Arc::new(InMemoryFaqStore::new());
        if let Some(path) = &settings.faq.data_path {
            match FaqLoader::load_path(Path::new(path), faq_store.as_ref()).await {
                Ok(count) => tracing::info!(path = %path, entries = count, "FAQ data loaded"),
                Err(e) => tracing::error!(path = %path, error = %e, "Failed to load FAQ data"),
            }
        }
        if settings.faq.seed_defaults {
            faq_store.seed_defaults();
        }
        let faq = Arc::new(FaqRetriever::new(faq_store, settings.faq.clone()));

        let catalog = Arc::new(
            FlowCatalog::with_builtins().map_err(|e| ServerError::Startup(e.to_string()))?,
        );
        if let Some(path) = &settings.scenario.flows_path {
            match catalog.reload_from(Path::new(path)) {
                Ok(count) => tracing::info!(path = %path, flows = count, "Flow definitions loaded"),
                Err(e) => {
                    tracing::error!(path = %path, error = %e, "Failed to load flows, using built-ins")
                },
            }
        }
        let scenarios = Arc::new(ScenarioInterpreter::new(catalog.clone(), &settings.scenario));

        let notifier_config = &settings.escalation.notifier;
        let notifier: Arc<dyn Notifier> = match &notifier_config.webhook_url {
            Some(url) => Arc::new(
                WebhookNotifier::new(url.clone(), Duration::from_millis(notifier_config.timeout_ms))
                    .map_err(|e| ServerError::Startup(format!("webhook notifier: {}", e)))?,
            ),
            None => Arc::new(LoggingNotifier),
        };
        let notifications = Arc::new(NotificationDispatcher::spawn(notifier, notifier_config));

        let registry = Arc::new(AgentRegistry::with_routing_profiles(
            settings.escalation.routing_profiles.clone(),
        ));
        let escalation = Arc::new(EscalationEngine::new(
            settings.escalation.clone(),
            registry,
            notifications.clone(),
        ));

        let nlu_provider = nlu.name().to_string();
        let orchestrator = Orchestrator::new(
            &settings,
            Collaborators {
                sessions: sessions.clone(),
                nlu,
                sentiment: Arc::new(LexiconSentimentAnalyzer::new()),
                faq: faq.clone(),
                scenarios,
                escalation: escalation.clone(),
            },
        );

        Ok(Self {
            settings: Arc::new(settings),
            orchestrator,
            sessions,
            escalation,
            faq,
            catalog,
            notifications,
            metrics: None,
            nlu_provider,
        })
    }

    pub fn with_metrics(mut self, handle: Option<PrometheusHandle>) -> Self {
        self.metrics = handle;
        self
    }

    pub fn nlu_provider(&self) -> &str {
        &self.nlu_provider
    }

    /// Re-read flow definitions from the configured path
    pub fn reload_flows(&self) -> Result<usize, ServerError> {
        let path = self
            .settings
            .scenario
            .flows_path
            .as_deref()
            .ok_or_else(|| ServerError::InvalidRequest("scenario.flows_path is not set".to_string()))?;
        self.catalog
            .reload_from(Path::new(path))
            .map_err(|e| ServerError::InvalidRequest(e.to_string()))
    }

    /// Point-in-time copy of sessions, escalations and agents
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::new(
            self.sessions.export(),
            self.escalation.export(),
            self.escalation.registry().list(),
        )
    }

    /// Load a snapshot written by a previous run
    pub fn restore(&self, snapshot: Snapshot) {
        for agent in snapshot.agents {
            self.escalation.register_agent(agent);
        }
        let sessions = self.sessions.import(snapshot.sessions);
        let escalations = self.escalation.import(snapshot.escalations);
        tracing::info!(sessions, escalations, "Snapshot restored");
    }
}
