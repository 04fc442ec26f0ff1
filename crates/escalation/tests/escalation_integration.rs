//! Escalation engine integration tests
//!
//! Drive the engine with a recording notifier and check idempotency,
//! ordering and agent-state invariants end to end.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use contact_center_config::{EscalationConfig, NotifierConfig};
use contact_center_core::{
    Agent, Channel, CustomerData, EscalationReason, EscalationStatus, NotificationEvent,
    Notifier, Priority, QueueSnapshot, Result, Session, TurnRecord,
};
use contact_center_escalation::{
    estimate_wait, AgentRegistry, EscalationDraft, EscalationEngine, NotificationDispatcher,
    TriggerInput,
};

#[derive(Default)]
struct RecordingNotifier {
    events: Mutex<Vec<NotificationEvent>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, event: &NotificationEvent) -> Result<()> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

fn engine_with(notifier: Arc<RecordingNotifier>) -> (EscalationEngine, Arc<NotificationDispatcher>) {
    let dispatcher = Arc::new(NotificationDispatcher::spawn(notifier, &NotifierConfig::default()));
    let engine = EscalationEngine::new(
        EscalationConfig::default(),
        Arc::new(AgentRegistry::new()),
        dispatcher.clone(),
    );
    (engine, dispatcher)
}

#[tokio::test]
async fn test_same_escalation_id_is_idempotent() {
    let notifier = Arc::new(RecordingNotifier::default());
    let (engine, dispatcher) = engine_with(notifier.clone());
    engine.register_agent(Agent::new("a1", "김상담", 3));

    let draft = EscalationDraft::new("s1", EscalationReason::UserRequest).with_id("esc_fixed000001");
    let first = engine.create(draft.clone()).unwrap();
    let second = engine.create(draft).unwrap();

    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.request.escalation_id, second.request.escalation_id);
    assert_eq!(engine.list().len(), 1);
    assert_eq!(engine.registry().get("a1").unwrap().current_load, 1);

    dispatcher.shutdown().await;
    let mut per_type: HashMap<&'static str, usize> = HashMap::new();
    for event in notifier.events.lock().iter() {
        *per_type.entry(event.event_type()).or_default() += 1;
    }
    assert_eq!(per_type.get("escalation.created"), Some(&1));
    assert_eq!(per_type.get("escalation.assigned"), Some(&1));
}

#[tokio::test]
async fn test_urgent_request_routes_to_priority_queue() {
    let notifier = Arc::new(RecordingNotifier::default());
    let (engine, _dispatcher) = engine_with(notifier);
    let session = Session::new("s1", None, Channel::WebChat);

    let decision = engine
        .evaluate(&session, &TriggerInput::new("긴급합니다 당장 처리해주세요"))
        .unwrap();
    assert_eq!(decision.reason, EscalationReason::UrgentMatter);

    let ticket = engine
        .create(
            EscalationDraft::from_session(&session, decision.reason).with_priority(decision.priority),
        )
        .unwrap();
    assert_eq!(ticket.request.priority, Priority::Critical);
    assert_eq!(ticket.request.queue_name, "priority-queue");
    assert!(ticket.request.estimated_wait_seconds <= 300);
    assert!(ticket.customer_message.contains("긴급 요청"));
}

#[tokio::test]
async fn test_priority_monotone_through_engine() {
    let notifier = Arc::new(RecordingNotifier::default());
    let (engine, _dispatcher) = engine_with(notifier);
    let reasons = [
        EscalationReason::UserRequest,
        EscalationReason::CustomerRequest,
        EscalationReason::BotLimitation,
        EscalationReason::Complaint,
        EscalationReason::Timeout,
    ];
    for reason in reasons {
        for history_len in 0..14 {
            let plain = CustomerData::default();
            let vip = CustomerData {
                vip: true,
                ..Default::default()
            };
            let base = engine.compute_priority(reason, None, &plain, history_len);
            assert!(engine.compute_priority(reason, None, &vip, history_len) >= base);
            assert!(engine.compute_priority(reason, None, &plain, history_len + 1) >= base);
        }
    }
}

#[tokio::test]
async fn test_snapshot_keeps_recent_turns() {
    let notifier = Arc::new(RecordingNotifier::default());
    let (engine, dispatcher) = engine_with(notifier.clone());

    let mut session = Session::new("s1", None, Channel::WebChat);
    for i in 0..14 {
        session.history.push(TurnRecord::user(format!("메시지 {i}")));
    }
    let ticket = engine
        .create(EscalationDraft::from_session(&session, EscalationReason::BotLimitation))
        .unwrap();
    assert_eq!(ticket.request.conversation_snapshot.len(), 10);
    assert_eq!(ticket.request.conversation_snapshot[0].content, "메시지 4");
    // More than ten turns lifts a low priority to medium
    assert_eq!(ticket.request.priority, Priority::Medium);

    engine.register_agent(Agent::new("a1", "김상담", 2));
    dispatcher.shutdown().await;

    let events = notifier.events.lock();
    let context = events.iter().find_map(|e| match e {
        NotificationEvent::EscalationAssigned { context, .. } => Some(context.clone()),
        _ => None,
    });
    let context = context.unwrap();
    assert_eq!(context.len(), 5);
    assert_eq!(context.last().unwrap().content, "메시지 13");
}

#[tokio::test]
async fn test_concurrent_creates_respect_capacity() {
    let notifier = Arc::new(RecordingNotifier::default());
    let (engine, _dispatcher) = engine_with(notifier);
    let engine = Arc::new(engine);
    engine.register_agent(Agent::new("a1", "김상담", 2));
    engine.register_agent(Agent::new("a2", "이상담", 3));

    let tasks: Vec<_> = (0..12)
        .map(|i| {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .create(EscalationDraft::new(format!("s{i}"), EscalationReason::UserRequest))
                    .map(|t| t.request.status)
            })
        })
        .collect();
    let statuses: Vec<EscalationStatus> = futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.unwrap().unwrap())
        .collect();

    let assigned = statuses
        .iter()
        .filter(|s| **s == EscalationStatus::Assigned)
        .count();
    assert_eq!(assigned, 5);
    assert_eq!(engine.pending().len(), 7);
    for agent in engine.registry().list() {
        assert!(agent.invariants_hold());
        assert_eq!(agent.current_load, agent.max_capacity);
    }
}

#[test]
fn test_wait_estimate_non_decreasing_in_queue_depth() {
    for agents in [0u64, 1, 3] {
        let mut previous = 0;
        for contacts in 0..50u64 {
            let snapshot = QueueSnapshot {
                contacts_in_queue: contacts,
                agents_available: agents,
                longest_queue_wait: 240,
            };
            let wait = estimate_wait(&snapshot, Priority::Medium, 180, 900);
            assert!(wait >= previous);
            previous = wait;
        }
    }
}
