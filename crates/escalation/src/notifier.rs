//! Notification delivery
//!
//! The engine never awaits a notifier. Events go into a bounded channel
//! drained by a small worker pool; each delivery has a timeout and one
//! retry, after which the event lands in a dead-letter list. A full
//! channel dead-letters immediately.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use contact_center_config::NotifierConfig;
use contact_center_core::{Error, NotificationEvent, Notifier, Result};

/// Writes events to the log
#[derive(Debug, Default, Clone)]
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn notify(&self, event: &NotificationEvent) -> Result<()> {
        match event {
            NotificationEvent::EscalationCreated {
                escalation_id,
                session_id,
                reason,
                priority,
                queue_name,
            } => tracing::info!(
                escalation_id = %escalation_id,
                session_id = %session_id,
                reason = %reason,
                priority = %priority,
                queue = %queue_name,
                "escalation.created"
            ),
            NotificationEvent::EscalationAssigned {
                escalation_id,
                agent_id,
                context,
            } => tracing::info!(
                escalation_id = %escalation_id,
                agent_id = %agent_id,
                context_turns = context.len(),
                "escalation.assigned"
            ),
            NotificationEvent::EscalationUpdated {
                escalation_id,
                status,
            } => tracing::info!(escalation_id = %escalation_id, status = %status, "escalation.updated"),
            NotificationEvent::AgentStatusChanged { agent_id, status } => {
                tracing::info!(agent_id = %agent_id, status = %status, "agent.status_changed")
            },
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

/// POSTs events as JSON to a webhook
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Internal(format!("webhook client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, event: &NotificationEvent) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(event)
            .send()
            .await
            .map_err(|e| Error::Internal(format!("webhook delivery: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Internal(format!("webhook returned {status}")));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "webhook"
    }
}

/// An event that could not be delivered
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub event: NotificationEvent,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}

struct DispatchShared {
    notifier: Arc<dyn Notifier>,
    timeout: Duration,
    dead_letters: Mutex<VecDeque<DeadLetter>>,
    dead_letter_capacity: usize,
}

impl DispatchShared {
    fn dead_letter(&self, event: NotificationEvent, error: String) {
        tracing::warn!(event = event.event_type(), error = %error, "Notification dead-lettered");
        metrics::counter!("cc_notifications_dead_lettered_total", "event" => event.event_type())
            .increment(1);
        let mut letters = self.dead_letters.lock();
        if letters.len() >= self.dead_letter_capacity {
            letters.pop_front();
        }
        letters.push_back(DeadLetter {
            event,
            error,
            failed_at: Utc::now(),
        });
    }

    async fn attempt(&self, event: &NotificationEvent) -> std::result::Result<(), String> {
        match tokio::time::timeout(self.timeout, self.notifier.notify(event)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("timed out after {:?}", self.timeout)),
        }
    }

    async fn deliver(&self, event: NotificationEvent) {
        let mut last_error = String::new();
        for attempt in 0..2 {
            if attempt > 0 {
                tracing::debug!(event = event.event_type(), "Retrying notification");
            }
            match self.attempt(&event).await {
                Ok(()) => return,
                Err(e) => last_error = e,
            }
        }
        self.dead_letter(event, last_error);
    }
}

/// Bounded queue plus worker pool in front of a `Notifier`
pub struct NotificationDispatcher {
    sender: Mutex<Option<mpsc::Sender<NotificationEvent>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    shared: Arc<DispatchShared>,
    /// Accepted event keys per escalation, dropped once it is resolved or
    /// cancelled
    seen: DashMap<String, HashSet<String>>,
}

impl NotificationDispatcher {
    /// Spawn the worker pool. Must be called inside a Tokio runtime.
    pub fn spawn(notifier: Arc<dyn Notifier>, config: &NotifierConfig) -> Self {
        let (tx, rx) = mpsc::channel::<NotificationEvent>(config.channel_capacity.max(1));
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let shared = Arc::new(DispatchShared {
            notifier,
            timeout: Duration::from_millis(config.timeout_ms),
            dead_letters: Mutex::new(VecDeque::new()),
            dead_letter_capacity: config.dead_letter_capacity.max(1),
        });

        let workers = (0..config.workers.max(1))
            .map(|worker| {
                let rx = rx.clone();
                let shared = shared.clone();
                tokio::spawn(async move {
                    loop {
                        let next = { rx.lock().await.recv().await };
                        match next {
                            Some(event) => shared.deliver(event).await,
                            None => break,
                        }
                    }
                    tracing::debug!(worker, "Notification worker stopped");
                })
            })
            .collect();

        tracing::info!(
            notifier = shared.notifier.name(),
            workers = config.workers.max(1),
            capacity = config.channel_capacity,
            "Notification dispatcher started"
        );

        Self {
            sender: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
            shared,
            seen: DashMap::new(),
        }
    }

    /// Queue an event without waiting. Duplicate escalation events are
    /// dropped; a full or closed channel dead-letters the event.
    pub fn dispatch(&self, event: NotificationEvent) {
        if let Some((escalation_id, key)) = dedup_key(&event) {
            let fresh = self
                .seen
                .entry(escalation_id.to_string())
                .or_default()
                .insert(key);
            if !fresh {
                tracing::debug!(event = event.event_type(), "Duplicate notification dropped");
                return;
            }
        }
        if let NotificationEvent::EscalationUpdated {
            escalation_id,
            status,
        } = &event
        {
            if status.is_terminal() {
                self.seen.remove(escalation_id);
            }
        }

        let sender = self.sender.lock().clone();
        let Some(sender) = sender else {
            self.shared.dead_letter(event, "dispatcher shut down".to_string());
            return;
        };
        if let Err(e) = sender.try_send(event) {
            let (event, reason) = match e {
                mpsc::error::TrySendError::Full(ev) => (ev, "notification queue full"),
                mpsc::error::TrySendError::Closed(ev) => (ev, "notification queue closed"),
            };
            self.shared.dead_letter(event, reason.to_string());
        }
    }

    /// Escalations whose events are still being de-duplicated
    pub fn tracked_escalations(&self) -> usize {
        self.seen.len()
    }

    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.shared.dead_letters.lock().iter().cloned().collect()
    }

    /// Stop accepting events and wait for the queue to drain
    pub async fn shutdown(&self) {
        self.sender.lock().take();
        let workers: Vec<JoinHandle<()>> = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            if let Err(e) = worker.await {
                tracing::error!(error = %e, "Notification worker panicked");
            }
        }
    }
}

fn dedup_key(event: &NotificationEvent) -> Option<(&str, String)> {
    match event {
        NotificationEvent::EscalationCreated { escalation_id, .. } => {
            Some((escalation_id.as_str(), "created".to_string()))
        },
        NotificationEvent::EscalationAssigned {
            escalation_id,
            agent_id,
            ..
        } => Some((escalation_id.as_str(), format!("assigned:{agent_id}"))),
        NotificationEvent::EscalationUpdated {
            escalation_id,
            status,
        } => Some((escalation_id.as_str(), format!("updated:{status}"))),
        NotificationEvent::AgentStatusChanged { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contact_center_core::{EscalationReason, EscalationStatus, Priority};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct CountingNotifier {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for CountingNotifier {
        async fn notify(&self, _event: &NotificationEvent) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(Error::Internal("down".into()))
            } else {
                Ok(())
            }
        }
    }

    fn created(id: &str) -> NotificationEvent {
        NotificationEvent::EscalationCreated {
            escalation_id: id.to_string(),
            session_id: "s1".to_string(),
            reason: EscalationReason::UserRequest,
            priority: Priority::Medium,
            queue_name: "general-queue".to_string(),
        }
    }

    #[tokio::test]
    async fn test_delivers_and_dedups() {
        let notifier = Arc::new(CountingNotifier {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let dispatcher = NotificationDispatcher::spawn(notifier.clone(), &NotifierConfig::default());
        dispatcher.dispatch(created("esc_1"));
        dispatcher.dispatch(created("esc_1"));
        dispatcher.dispatch(created("esc_2"));
        dispatcher.shutdown().await;

        assert_eq!(notifier.calls.load(Ordering::SeqCst), 2);
        assert!(dispatcher.dead_letters().is_empty());
    }

    #[tokio::test]
    async fn test_closed_escalations_are_forgotten() {
        let notifier = Arc::new(CountingNotifier {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let dispatcher = NotificationDispatcher::spawn(notifier.clone(), &NotifierConfig::default());
        let updated = |id: &str, status| NotificationEvent::EscalationUpdated {
            escalation_id: id.to_string(),
            status,
        };

        dispatcher.dispatch(created("esc_1"));
        dispatcher.dispatch(updated("esc_1", EscalationStatus::InProgress));
        dispatcher.dispatch(updated("esc_1", EscalationStatus::InProgress));
        dispatcher.dispatch(created("esc_2"));
        assert_eq!(dispatcher.tracked_escalations(), 2);

        dispatcher.dispatch(updated("esc_1", EscalationStatus::Resolved));
        dispatcher.dispatch(updated("esc_2", EscalationStatus::Cancelled));
        assert_eq!(dispatcher.tracked_escalations(), 0);
        dispatcher.shutdown().await;

        assert_eq!(notifier.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_failure_retries_once_then_dead_letters() {
        let notifier = Arc::new(CountingNotifier {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let dispatcher = NotificationDispatcher::spawn(notifier.clone(), &NotifierConfig::default());
        dispatcher.dispatch(created("esc_1"));
        dispatcher.shutdown().await;

        assert_eq!(notifier.calls.load(Ordering::SeqCst), 2);
        let letters = dispatcher.dead_letters();
        assert_eq!(letters.len(), 1);
        assert!(letters[0].error.contains("down"));
    }

    #[tokio::test]
    async fn test_after_shutdown_dead_letters() {
        let dispatcher =
            NotificationDispatcher::spawn(Arc::new(LoggingNotifier), &NotifierConfig::default());
        dispatcher.shutdown().await;
        dispatcher.dispatch(created("esc_9"));
        assert_eq!(dispatcher.dead_letters().len(), 1);
    }

    #[tokio::test]
    async fn test_webhook_posts_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hooks/escalations"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(
            format!("{}/hooks/escalations", server.uri()),
            Duration::from_secs(2),
        )
        .unwrap();
        notifier.notify(&created("esc_1")).await.unwrap();
    }

    #[tokio::test]
    async fn test_webhook_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(server.uri(), Duration::from_secs(2)).unwrap();
        assert!(notifier.notify(&created("esc_1")).await.is_err());
    }
}
