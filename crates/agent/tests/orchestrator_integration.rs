//! End-to-end turn handling over in-memory collaborators
//!
//! NLU is scripted per utterance so each test controls intent and
//! confidence; everything else is the production implementation.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use contact_center_agent::{Collaborators, FlowCatalog, Orchestrator, ScenarioInterpreter};
use contact_center_config::{NotifierConfig, Settings};
use contact_center_core::session::keys;
use contact_center_core::{
    Agent, BotReply, Channel, Error, EscalationReason, EscalationStatus, FaqItem, Intent,
    NextAction, NluContext, NluProvider, NluResult, Priority, Result, Sentiment,
    SentimentAnalyzer, Session, SessionStatus, SessionStore, TurnRequest, TurnResponse,
    TurnSource,
};
use contact_center_escalation::{AgentRegistry, EscalationEngine, LoggingNotifier, NotificationDispatcher};
use contact_center_faq::{FaqRetriever, InMemoryFaqStore};
use contact_center_persistence::InMemorySessionStore;

const HOURS_QUESTION: &str = "영업시간이 어떻게 되나요?";
const HOURS_ANSWER: &str = "평일 오전 9시부터 오후 6시까지 운영합니다.";

struct ScriptedNlu {
    script: HashMap<String, NluResult>,
    delay: Option<Duration>,
}

impl ScriptedNlu {
    fn new(entries: &[(&str, Intent, f32)]) -> Self {
        Self {
            script: entries
                .iter()
                .map(|(text, intent, confidence)| {
                    (text.to_string(), NluResult::new(*intent, *confidence))
                })
                .collect(),
            delay: None,
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl NluProvider for ScriptedNlu {
    async fn classify(&self, utterance: &str, _context: &NluContext) -> Result<NluResult> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self
            .script
            .get(utterance.trim())
            .cloned()
            .unwrap_or_else(|| NluResult::new(Intent::GeneralInquiry, 0.3)))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

struct UnavailableNlu;

#[async_trait]
impl NluProvider for UnavailableNlu {
    async fn classify(&self, _utterance: &str, _context: &NluContext) -> Result<NluResult> {
        Err(Error::NluUnavailable("connection refused".to_string()))
    }

    fn name(&self) -> &str {
        "unavailable"
    }
}

struct NeutralSentiment;

#[async_trait]
impl SentimentAnalyzer for NeutralSentiment {
    async fn analyze(&self, _text: &str) -> Result<Sentiment> {
        Ok(Sentiment::neutral())
    }
}

struct Harness {
    orchestrator: Orchestrator,
    store: Arc<InMemorySessionStore>,
    engine: Arc<EscalationEngine>,
    faq: Arc<FaqRetriever>,
    hours_faq_id: String,
}

impl Harness {
    async fn turn(&self, session_id: &str, message: &str) -> TurnResponse {
        self.orchestrator
            .handle_turn(TurnRequest::new(session_id, message))
            .await
    }

    async fn reply(&self, session_id: &str, message: &str) -> BotReply {
        match self.turn(session_id, message).await {
            TurnResponse::Reply(reply) => reply,
            TurnResponse::Error(err) => panic!("unexpected error reply: {:?}", err),
        }
    }

    async fn session(&self, session_id: &str) -> Session {
        self.store.get(session_id).await.unwrap().unwrap()
    }
}

fn default_nlu() -> ScriptedNlu {
    ScriptedNlu::new(&[
        ("안녕하세요", Intent::Greeting, 0.95),
        ("상담원 연결해주세요", Intent::GeneralInquiry, 0.9),
        ("예약하고 싶어요", Intent::Reservation, 0.95),
        ("상품 문의드려요", Intent::ProductInquiry, 0.92),
        ("영업시간 알려주세요", Intent::Inquiry, 0.9),
        ("긴급합니다 당장 처리해주세요", Intent::GeneralInquiry, 0.8),
        ("음 그러니까 그게", Intent::ProductInquiry, 0.4),
        ("환불 안 해주시면 소비자원에 신고하겠습니다", Intent::Complaint, 0.95),
        ("감사합니다", Intent::Goodbye, 0.95),
        // Step answers inside flows
        ("1", Intent::GeneralInquiry, 0.9),
        ("4", Intent::GeneralInquiry, 0.9),
        ("노트북", Intent::GeneralInquiry, 0.9),
        ("2000-01-01", Intent::GeneralInquiry, 0.9),
        ("2999-12-31", Intent::GeneralInquiry, 0.9),
        ("010-1234-5678", Intent::GeneralInquiry, 0.9),
    ])
}

fn harness_with(settings: Settings, nlu: Arc<dyn NluProvider>) -> Harness {
    let store = Arc::new(InMemorySessionStore::new(settings.scenario.max_retries));

    let hours = FaqItem::new("general", HOURS_QUESTION, HOURS_ANSWER, ["영업시간", "운영시간"], 1);
    let hours_faq_id = hours.faq_id.clone();
    let faq_store = Arc::new(InMemoryFaqStore::with_items(vec![hours]));
    let faq = Arc::new(FaqRetriever::new(faq_store, settings.faq.clone()));

    let catalog = Arc::new(FlowCatalog::with_builtins().unwrap());
    let scenarios = Arc::new(ScenarioInterpreter::new(catalog, &settings.scenario));

    let dispatcher = Arc::new(NotificationDispatcher::spawn(
        Arc::new(LoggingNotifier),
        &NotifierConfig::default(),
    ));
    let engine = Arc::new(EscalationEngine::new(
        settings.escalation.clone(),
        Arc::new(AgentRegistry::new()),
        dispatcher,
    ));

    let orchestrator = Orchestrator::new(
        &settings,
        Collaborators {
            sessions: store.clone(),
            nlu,
            sentiment: Arc::new(NeutralSentiment),
            faq: faq.clone(),
            scenarios,
            escalation: engine.clone(),
        },
    );

    Harness {
        orchestrator,
        store,
        engine,
        faq,
        hours_faq_id,
    }
}

fn harness() -> Harness {
    harness_with(Settings::default(), Arc::new(default_nlu()))
}

/// Walk the reservation flow up to the date step
async fn reach_date_step(h: &Harness, session_id: &str) {
    let reply = h.reply(session_id, "예약하고 싶어요").await;
    assert_eq!(reply.next_action, NextAction::CollectInput);
    let reply = h.reply(session_id, "1").await;
    assert_eq!(reply.next_action, NextAction::CollectInput);
    assert_eq!(
        h.session(session_id).await.current_step.as_deref(),
        Some("ask_preferred_date")
    );
}

#[tokio::test]
async fn test_greeting_reply() {
    let h = harness();
    let reply = h.reply("s-greet", "안녕하세요").await;

    assert_eq!(reply.next_action, NextAction::Continue);
    assert!(reply.response_text.contains("안녕하세요"));
    assert_eq!(reply.intent, Some(Intent::Greeting));

    let session = h.session("s-greet").await;
    assert_eq!(session.history.len(), 2);
    assert_eq!(session.history[0].source, TurnSource::User);
    assert_eq!(session.history[1].source, TurnSource::Bot);
    assert!(session.current_flow.is_none());
    assert_eq!(session.status, SessionStatus::Active);
}

#[tokio::test]
async fn test_explicit_agent_request_escalates() {
    let h = harness();
    h.reply("s-agent", "안녕하세요").await;
    let reply = h.reply("s-agent", "상담원 연결해주세요").await;

    assert_eq!(reply.next_action, NextAction::Escalate);
    assert!(reply.escalation_required);
    assert!(reply.escalation_reference.is_some());

    let session = h.session("s-agent").await;
    assert_eq!(session.status, SessionStatus::Escalated);
    assert_eq!(
        session.context_str(keys::ESCALATION_REASON),
        Some("user_request")
    );

    let request = h.engine.open_for_session("s-agent").unwrap();
    assert_eq!(request.reason, EscalationReason::UserRequest);
    assert_eq!(request.priority, Priority::Medium);

    // Further messages wait for the agent without reaching NLU
    let reply = h.reply("s-agent", "아직인가요?").await;
    assert_eq!(reply.next_action, NextAction::WaitForAgent);
    assert_eq!(h.engine.list().len(), 1);
}

#[tokio::test]
async fn test_past_date_is_rejected() {
    let h = harness();
    reach_date_step(&h, "s-date").await;

    let reply = h.reply("s-date", "2000-01-01").await;
    assert_eq!(reply.next_action, NextAction::CollectInput);

    let session = h.session("s-date").await;
    assert_eq!(session.retry_count, 1);
    assert_eq!(session.status, SessionStatus::WaitingInput);
    assert_eq!(session.current_step.as_deref(), Some("ask_preferred_date"));
}

#[tokio::test]
async fn test_repeated_invalid_input_escalates() {
    let h = harness();
    reach_date_step(&h, "s-retry").await;

    for attempt in 1..=3 {
        let reply = h.reply("s-retry", "2000-01-01").await;
        assert_eq!(reply.next_action, NextAction::CollectInput);
        assert_eq!(h.session("s-retry").await.retry_count, attempt);
    }

    let reply = h.reply("s-retry", "2000-01-01").await;
    assert_eq!(reply.next_action, NextAction::Escalate);

    let session = h.session("s-retry").await;
    assert_eq!(session.status, SessionStatus::Escalated);
    assert!(session.current_flow.is_none());
    assert!(session.retry_count <= 3);

    let request = h.engine.open_for_session("s-retry").unwrap();
    assert_eq!(request.reason, EscalationReason::BotLimitation);
    assert!(request.description.contains("repeated_invalid_input"));
}

#[tokio::test]
async fn test_reservation_flow_completes() {
    let h = harness();
    reach_date_step(&h, "s-book").await;

    let reply = h.reply("s-book", "2999-12-31").await;
    assert_eq!(reply.next_action, NextAction::CollectInput);
    assert!(reply.response_text.starts_with("2999-12-31"));

    let reply = h.reply("s-book", "010-1234-5678").await;
    assert_eq!(reply.next_action, NextAction::Complete);

    let session = h.session("s-book").await;
    assert_eq!(session.status, SessionStatus::Active);
    assert!(session.current_flow.is_none());
    assert!(session.context_bool(keys::RESOLVED));
    let collected = session.collected_data();
    assert_eq!(collected.get("service_type").map(String::as_str), Some("1"));
    assert_eq!(
        collected.get("contact_number").map(String::as_str),
        Some("010-1234-5678")
    );
}

#[tokio::test]
async fn test_product_inquiry_renders_collected_name() {
    let h = harness();
    let reply = h.reply("s-product", "상품 문의드려요").await;
    assert_eq!(reply.next_action, NextAction::CollectInput);
    assert!(reply.response_text.contains("1. 전자제품"));

    h.reply("s-product", "1").await;
    let reply = h.reply("s-product", "노트북").await;
    assert!(reply.response_text.starts_with("노트북에 대해"));

    let reply = h.reply("s-product", "4").await;
    assert_eq!(reply.next_action, NextAction::Escalate);
    let request = h.engine.open_for_session("s-product").unwrap();
    assert_eq!(request.reason, EscalationReason::ScenarioDirected);
}

#[tokio::test]
async fn test_faq_answer() {
    let h = harness();
    let reply = h.reply("s-faq", "영업시간 알려주세요").await;

    assert_eq!(reply.response_text, HOURS_ANSWER);
    assert_eq!(reply.next_action, NextAction::Continue);

    let item = h.faq.get(&h.hours_faq_id).await.unwrap().unwrap();
    assert_eq!(item.view_count, 1);
}

#[tokio::test]
async fn test_unmatched_faq_query_clarifies() {
    let h = harness_with(
        Settings::default(),
        Arc::new(ScriptedNlu::new(&[("주차 가능한가요", Intent::Inquiry, 0.9)])),
    );
    let reply = h.reply("s-nofaq", "주차 가능한가요").await;
    assert_eq!(reply.next_action, NextAction::Clarify);
}

#[tokio::test]
async fn test_urgent_request_is_critical() {
    let h = harness();
    let reply = h.reply("s-urgent", "긴급합니다 당장 처리해주세요").await;
    assert_eq!(reply.next_action, NextAction::Escalate);

    let request = h.engine.open_for_session("s-urgent").unwrap();
    assert_eq!(request.reason, EscalationReason::UrgentMatter);
    assert_eq!(request.priority, Priority::Critical);
    assert_eq!(request.queue_name, "priority-queue");
    assert!(request.estimated_wait_seconds <= 300);
}

#[tokio::test]
async fn test_low_confidence_clarifies_without_side_effects() {
    let h = harness();
    let reply = h.reply("s-low", "음 그러니까 그게").await;

    assert_eq!(reply.next_action, NextAction::Clarify);
    assert!(!reply.escalation_required);

    let session = h.session("s-low").await;
    assert!(session.current_flow.is_none());
    assert_eq!(session.status, SessionStatus::Active);
    assert!(h.engine.open_for_session("s-low").is_none());
}

#[tokio::test]
async fn test_low_confidence_inside_flow_clarifies() {
    let h = harness_with(
        Settings::default(),
        Arc::new(ScriptedNlu::new(&[
            ("예약하고 싶어요", Intent::Reservation, 0.95),
            ("1", Intent::GeneralInquiry, 0.9),
            ("2999-12-31", Intent::GeneralInquiry, 0.3),
        ])),
    );
    reach_date_step(&h, "s-flow-low").await;

    let reply = h.reply("s-flow-low", "2999-12-31").await;
    assert_eq!(reply.next_action, NextAction::Clarify);
    assert!(!reply.escalation_required);

    let session = h.session("s-flow-low").await;
    assert_eq!(session.current_flow.as_deref(), Some("reservation"));
    assert_eq!(session.current_step.as_deref(), Some("ask_preferred_date"));
    assert_eq!(session.retry_count, 0);
    assert!(!session.collected_data().contains_key("preferred_date"));
    assert!(h.engine.open_for_session("s-flow-low").is_none());
}

#[tokio::test]
async fn test_confident_complaint_bypasses_to_agent() {
    let h = harness();
    let reply = h
        .reply("s-complaint", "환불 안 해주시면 소비자원에 신고하겠습니다")
        .await;
    assert_eq!(reply.next_action, NextAction::Escalate);

    let request = h.engine.open_for_session("s-complaint").unwrap();
    assert_eq!(request.reason, EscalationReason::Complaint);
    assert_eq!(request.queue_name, "complaint-queue");
}

#[tokio::test]
async fn test_concurrent_turns_never_interleave() {
    let nlu = default_nlu().with_delay(Duration::from_millis(100));
    let h = harness_with(Settings::default(), Arc::new(nlu));

    let (first, second) = futures::future::join(
        h.turn("s-race", "안녕하세요"),
        h.turn("s-race", "감사합니다"),
    )
    .await;

    let responses = [first, second];
    let replies = responses
        .iter()
        .filter(|r| matches!(r, TurnResponse::Reply(_)))
        .count();
    let busy = responses
        .iter()
        .filter(|r| matches!(r, TurnResponse::Error(e) if e.error_code == "session_busy"))
        .count();
    assert_eq!(replies + busy, 2);
    assert!(replies >= 1);

    let session = h.session("s-race").await;
    assert_eq!(session.history.len(), replies * 2);
    for pair in session.history.chunks(2) {
        assert_eq!(pair[0].source, TurnSource::User);
        assert_eq!(pair[1].source, TurnSource::Bot);
    }
}

#[tokio::test]
async fn test_turn_budget_returns_fallback() {
    let mut settings = Settings::default();
    settings.conversation.turn_budget_ms = 50;
    let timeout_text = settings.conversation.messages.timeout_fallback().to_string();
    let nlu = default_nlu().with_delay(Duration::from_millis(200));
    let h = harness_with(settings, Arc::new(nlu));

    let reply = h.reply("s-slow", "안녕하세요").await;
    assert_eq!(reply.next_action, NextAction::Error);
    assert_eq!(reply.response_text, timeout_text);

    // The detached turn still finishes its writes
    tokio::time::sleep(Duration::from_millis(400)).await;
    let session = h.session("s-slow").await;
    assert_eq!(session.history.len(), 2);
}

#[tokio::test]
async fn test_session_id_minting_per_channel() {
    let h = harness();

    let mut request = TurnRequest::new("", "안녕하세요");
    request.session_id = None;
    let reply = match h.orchestrator.handle_turn(request.clone()).await {
        TurnResponse::Reply(reply) => reply,
        TurnResponse::Error(err) => panic!("unexpected error reply: {:?}", err),
    };
    assert!(reply.session_id.starts_with("sess_"));

    let voice = request.with_channel(Channel::Voice);
    match h.orchestrator.handle_turn(voice).await {
        TurnResponse::Error(err) => assert_eq!(err.error_code, "invalid_input"),
        other => panic!("voice turn without session id was accepted: {:?}", other),
    }
}

#[tokio::test]
async fn test_empty_message_rejected() {
    let h = harness();
    match h.turn("s-empty", "   ").await {
        TurnResponse::Error(err) => assert_eq!(err.error_code, "invalid_input"),
        other => panic!("empty message was accepted: {:?}", other),
    }
    assert!(h.store.get("s-empty").await.unwrap().is_none());
}

#[tokio::test]
async fn test_nlu_outage_degrades_gracefully() {
    let h = harness_with(Settings::default(), Arc::new(UnavailableNlu));
    let reply = h.reply("s-down", "안녕하세요").await;

    assert_eq!(reply.next_action, NextAction::Error);
    let session = h.session("s-down").await;
    assert_eq!(session.history.len(), 2);
    assert_eq!(session.status, SessionStatus::Active);
}

#[tokio::test]
async fn test_agent_accepts_then_session_ends() {
    let h = harness();
    h.engine.register_agent(Agent::new("a1", "김상담", 3));

    h.reply("s-handoff", "상담원 연결해주세요").await;
    let request = h.engine.open_for_session("s-handoff").unwrap();
    assert_eq!(request.status, EscalationStatus::Assigned);

    let accepted = h
        .orchestrator
        .accept_escalation(&request.escalation_id)
        .await
        .unwrap();
    assert_eq!(accepted.status, EscalationStatus::InProgress);
    assert_eq!(
        h.session("s-handoff").await.status,
        SessionStatus::AgentAssigned
    );

    let reply = h.reply("s-handoff", "안녕하세요").await;
    assert_eq!(reply.next_action, NextAction::AgentHandling);

    let reply = h.orchestrator.end_session("s-handoff").await.unwrap();
    assert_eq!(reply.next_action, NextAction::End);
    assert_eq!(h.session("s-handoff").await.status, SessionStatus::Completed);
    assert_eq!(
        h.engine.get(&request.escalation_id).unwrap().status,
        EscalationStatus::Resolved
    );

    match h.turn("s-handoff", "하나 더 물어볼게요").await {
        TurnResponse::Error(err) => assert_eq!(err.error_code, "invalid_input"),
        other => panic!("closed session accepted a turn: {:?}", other),
    }
}

#[tokio::test]
async fn test_manual_escalation_is_idempotent() {
    let h = harness();
    h.reply("s-manual", "안녕하세요").await;

    let first = h
        .orchestrator
        .escalate_manually("s-manual", "technical_support", None)
        .await
        .unwrap();
    let second = h
        .orchestrator
        .escalate_manually("s-manual", "not_a_reason", None)
        .await
        .unwrap();

    assert_eq!(first.escalation_reference, second.escalation_reference);
    assert_eq!(h.engine.list().len(), 1);
    assert_eq!(
        h.engine.open_for_session("s-manual").unwrap().reason,
        EscalationReason::TechnicalSupport
    );
}

#[tokio::test]
async fn test_cancel_flow_and_status() {
    let h = harness();
    reach_date_step(&h, "s-cancel").await;

    let status = h.orchestrator.flow_status("s-cancel").await.unwrap().unwrap();
    assert_eq!(status.flow_id, "reservation");
    assert_eq!(status.step_id, "ask_preferred_date");

    let reply = h.orchestrator.cancel_flow("s-cancel").await.unwrap();
    assert_eq!(reply.next_action, NextAction::Continue);
    assert!(h.orchestrator.flow_status("s-cancel").await.unwrap().is_none());
    assert_eq!(h.session("s-cancel").await.status, SessionStatus::Active);
}

#[tokio::test]
async fn test_cancel_session_withdraws_escalation() {
    let h = harness();
    h.reply("s-withdraw", "상담원 연결해주세요").await;
    let request = h.engine.open_for_session("s-withdraw").unwrap();

    h.orchestrator.cancel_session("s-withdraw").await.unwrap();

    assert_eq!(
        h.session("s-withdraw").await.status,
        SessionStatus::Cancelled
    );
    assert_eq!(
        h.engine.get(&request.escalation_id).unwrap().status,
        EscalationStatus::Cancelled
    );
}
