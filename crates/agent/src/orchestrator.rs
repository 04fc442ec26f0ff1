//! Conversation orchestrator
//!
//! `handle_turn` is the single entry point for customer messages:
//!
//! ```text
//! resolve session ─► append user turn ─► NLU + sentiment ─► escalation pre-check
//!        │                                                       │ (fires)
//!        │                                                       ▼
//!        │                              confidence gate ─► dispatch by intent
//!        ▼                                                       │
//!   waiting notice when escalated          persist session ◄─────┘
//!                                          append bot turn ─► BotReply
//! ```
//!
//! Turns on one session never interleave: a second turn arriving while one
//! is in flight is rejected with `SessionBusy`. The pipeline runs in its own
//! task, so a caller that gives up (or the turn budget expiring) never
//! leaves a half-applied session write behind.

use dashmap::DashSet;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;

use contact_center_config::{ConversationConfig, NluConfig, Settings};
use contact_center_core::flow::REASON_REPEATED_INVALID_INPUT;
use contact_center_core::session::keys;
use contact_center_core::{
    BotReply, ConversationStage, Error, ErrorCategory, ErrorReply, EscalationReason,
    EscalationRequest, EscalationStatus, Intent, NextAction, NluContext, NluProvider, NluResult,
    Outcome, Priority, Result, Sentiment, SentimentAnalyzer, SentimentLabel, Session,
    SessionStatus, SessionStore, TurnRecord, TurnRequest, TurnResponse, TurnSource,
};
use contact_center_escalation::{EscalationDraft, EscalationEngine, TriggerInput};
use contact_center_faq::FaqRetriever;

use crate::dialog::{derive_mood, derive_stage, is_continuation};
use crate::scenario::{FlowStatus, ScenarioInterpreter};

/// Stored in place of secure step input
const REDACTED: &str = "[redacted]";

/// Re-reads after a version conflict before giving up
const MAX_CONFLICT_RETRIES: usize = 2;

/// Handles to every collaborator the orchestrator calls
#[derive(Clone)]
pub struct Collaborators {
    pub sessions: Arc<dyn SessionStore>,
    pub nlu: Arc<dyn NluProvider>,
    pub sentiment: Arc<dyn SentimentAnalyzer>,
    pub faq: Arc<FaqRetriever>,
    pub scenarios: Arc<ScenarioInterpreter>,
    pub escalation: Arc<EscalationEngine>,
}

/// Sessions with a turn in progress. The entry is removed when the guard drops.
struct InFlight {
    sessions: Arc<DashSet<String>>,
    session_id: String,
}

impl InFlight {
    fn acquire(sessions: &Arc<DashSet<String>>, session_id: &str) -> Result<Self> {
        if !sessions.insert(session_id.to_string()) {
            return Err(Error::SessionBusy(session_id.to_string()));
        }
        Ok(Self {
            sessions: sessions.clone(),
            session_id: session_id.to_string(),
        })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.sessions.remove(&self.session_id);
    }
}

struct Inner {
    deps: Collaborators,
    nlu: NluConfig,
    conversation: ConversationConfig,
    intent_flows: BTreeMap<String, String>,
    faq_acceptance: f64,
    in_flight: Arc<DashSet<String>>,
}

/// Turn pipeline over the NLU, FAQ, scenario and escalation components
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn new(settings: &Settings, deps: Collaborators) -> Self {
        let faq_acceptance = deps.faq.config().acceptance_threshold;
        Self {
            inner: Arc::new(Inner {
                deps,
                nlu: settings.nlu.clone(),
                conversation: settings.conversation.clone(),
                intent_flows: settings
                    .scenario
                    .intent_flows
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
                faq_acceptance,
                in_flight: Arc::new(DashSet::new()),
            }),
        }
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.inner.deps.sessions
    }

    pub fn escalation(&self) -> &Arc<EscalationEngine> {
        &self.inner.deps.escalation
    }

    pub fn scenarios(&self) -> &Arc<ScenarioInterpreter> {
        &self.inner.deps.scenarios
    }

    /// Process one customer message. Never fails: errors become either a
    /// structured `ErrorReply` (user-visible kinds) or a fallback reply.
    pub async fn handle_turn(&self, request: TurnRequest) -> TurnResponse {
        let started = Instant::now();
        let turn_id = uuid::Uuid::new_v4().simple().to_string();
        let span = tracing::info_span!(
            "turn",
            turn_id = %turn_id,
            session_id = tracing::field::Empty,
            channel = %request.channel,
        );

        let response = self.run_turn(request, &turn_id).instrument(span).await;

        let outcome = match &response {
            TurnResponse::Reply(reply) => reply.next_action.as_str().to_string(),
            TurnResponse::Error(err) => err.error_code.clone(),
        };
        metrics::counter!("cc_turns_total", "outcome" => outcome).increment(1);
        metrics::histogram!("cc_turn_latency_ms").record(started.elapsed().as_secs_f64() * 1000.0);
        response
    }

    async fn run_turn(&self, request: TurnRequest, turn_id: &str) -> TurnResponse {
        let inner = &self.inner;
        let message = request.message.trim().to_string();
        if message.is_empty() {
            return error_response(Error::InvalidInput("메시지를 입력해주세요.".to_string()));
        }

        let supplied = request
            .session_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty());
        let session_id = match supplied {
            Some(id) => id.to_string(),
            None if inner.conversation.can_mint(request.channel) => Session::mint_id(),
            None => {
                return error_response(Error::InvalidInput(
                    "세션 ID가 필요합니다.".to_string(),
                ))
            },
        };
        tracing::Span::current().record("session_id", session_id.as_str());

        let guard = match InFlight::acquire(&inner.in_flight, &session_id) {
            Ok(guard) => guard,
            Err(e) => {
                tracing::debug!("Turn rejected, session busy");
                return error_response(e);
            },
        };

        let task_inner = inner.clone();
        let task_session = session_id.clone();
        let task = tokio::spawn(
            async move {
                let _guard = guard;
                task_inner.process(&task_session, request, message).await
            }
            .in_current_span(),
        );

        let budget = Duration::from_millis(inner.conversation.turn_budget_ms);
        match tokio::time::timeout(budget, task).await {
            Ok(Ok(Ok(reply))) => TurnResponse::Reply(reply),
            Ok(Ok(Err(e))) => inner.failure(&session_id, turn_id, e),
            Ok(Err(join_error)) => inner.failure(
                &session_id,
                turn_id,
                Error::Internal(format!("turn task failed: {join_error}")),
            ),
            Err(_) => {
                tracing::warn!(budget_ms = budget.as_millis() as u64, "Turn budget exceeded");
                TurnResponse::Reply(BotReply::new(
                    session_id,
                    inner.conversation.messages.timeout_fallback(),
                    NextAction::Error,
                ))
            },
        }
    }

    /// Close the session at the customer's or the system's request
    pub async fn end_session(&self, session_id: &str) -> Result<BotReply> {
        let inner = &self.inner;
        let _guard = InFlight::acquire(&inner.in_flight, session_id)?;
        let mut session = inner.load(session_id).await?;

        inner.close_escalation(session_id, "session ended");
        session.clear_flow();
        session.transition_to(SessionStatus::Completed)?;
        session.set_context(keys::RESOLVED, true);
        session.set_context(keys::CONVERSATION_STAGE, ConversationStage::Closing.as_str());
        inner.persist(&session).await?;

        let reply = BotReply::new(
            session_id,
            inner.conversation.messages.session_ended.as_str(),
            NextAction::End,
        );
        inner.append_bot(&reply).await?;
        tracing::info!(session_id, "Session ended");
        Ok(reply)
    }

    /// Cancel the session outright, withdrawing any open escalation
    pub async fn cancel_session(&self, session_id: &str) -> Result<()> {
        let inner = &self.inner;
        let _guard = InFlight::acquire(&inner.in_flight, session_id)?;
        let mut session = inner.load(session_id).await?;

        inner.close_escalation(session_id, "session cancelled");
        session.clear_flow();
        session.transition_to(SessionStatus::Cancelled)?;
        inner.persist(&session).await?;
        inner
            .deps
            .sessions
            .append_turn(
                session_id,
                TurnRecord::new(TurnSource::System, "session cancelled"),
            )
            .await?;
        tracing::info!(session_id, "Session cancelled");
        Ok(())
    }

    /// Abandon the active flow without closing the session
    pub async fn cancel_flow(&self, session_id: &str) -> Result<BotReply> {
        let inner = &self.inner;
        let _guard = InFlight::acquire(&inner.in_flight, session_id)?;
        let mut session = inner.load(session_id).await?;

        inner.deps.scenarios.cancel(&mut session)?;
        inner.persist(&session).await?;
        let reply = BotReply::new(
            session_id,
            inner.conversation.messages.flow_cancelled.as_str(),
            NextAction::Continue,
        );
        inner.append_bot(&reply).await?;
        Ok(reply)
    }

    /// An agent picked up the escalation; the session moves to `agent_assigned`
    pub async fn accept_escalation(&self, escalation_id: &str) -> Result<EscalationRequest> {
        let inner = &self.inner;
        let request = inner.deps.escalation.get(escalation_id)?;
        let _guard = InFlight::acquire(&inner.in_flight, &request.session_id)?;

        let mut session = inner.load(&request.session_id).await?;
        if !session.status.can_transition_to(SessionStatus::AgentAssigned) {
            return Err(Error::InvalidTransition {
                from: session.status.to_string(),
                to: SessionStatus::AgentAssigned.to_string(),
            });
        }
        let accepted = inner.deps.escalation.accept(escalation_id)?;
        session.transition_to(SessionStatus::AgentAssigned)?;
        inner.persist(&session).await?;

        let agent = accepted.assigned_agent.as_deref().unwrap_or("unknown");
        inner
            .deps
            .sessions
            .append_turn(
                &session.session_id,
                TurnRecord::new(TurnSource::System, format!("agent {agent} joined")),
            )
            .await?;
        tracing::info!(
            escalation_id,
            session_id = %session.session_id,
            agent_id = %agent,
            "Escalation accepted"
        );
        Ok(accepted)
    }

    /// Escalate on behalf of the customer or an operator. Unknown reasons
    /// become `customer_request`. A session with an open escalation gets
    /// that escalation's reference back.
    pub async fn escalate_manually(
        &self,
        session_id: &str,
        reason: &str,
        description: Option<String>,
    ) -> Result<BotReply> {
        let inner = &self.inner;
        let _guard = InFlight::acquire(&inner.in_flight, session_id)?;
        let mut session = inner.load(session_id).await?;
        if session.status.is_closed() {
            return Err(Error::InvalidInput(format!(
                "session {session_id} is already closed"
            )));
        }

        if let Some(open) = inner.deps.escalation.open_for_session(session_id) {
            let mut reply = BotReply::new(
                session_id,
                inner.conversation.messages.waiting_for_agent.as_str(),
                NextAction::WaitForAgent,
            );
            reply.escalation_required = true;
            reply.escalation_reference = Some(open.reference_number());
            return Ok(reply);
        }

        let reason = EscalationReason::parse_or_default(reason);
        let description = description.unwrap_or_else(|| format!("manual escalation: {reason}"));
        let reply = inner.escalate(&mut session, reason, None, description)?;
        inner.persist(&session).await?;
        inner.append_bot(&reply).await?;
        Ok(reply)
    }

    pub async fn flow_status(&self, session_id: &str) -> Result<Option<FlowStatus>> {
        let session = self.inner.load(session_id).await?;
        Ok(self.inner.deps.scenarios.status(&session))
    }
}

fn error_response(err: Error) -> TurnResponse {
    TurnResponse::Error(ErrorReply::from(&err))
}

fn nlu_context(session: &Session) -> NluContext {
    let mut attributes = BTreeMap::new();
    if let Some(flow) = &session.current_flow {
        attributes.insert("current_flow".to_string(), flow.clone());
    }
    NluContext {
        session_id: session.session_id.clone(),
        user_id: session.user_id.clone(),
        last_intent: session.context_str(keys::LAST_INTENT).map(String::from),
        conversation_stage: session
            .context_str(keys::CONVERSATION_STAGE)
            .map(String::from),
        customer_mood: session.context_str(keys::CUSTOMER_MOOD).map(String::from),
        attributes,
    }
}

/// Reapply our changes on top of a fresher copy after a version conflict
fn rebase(ours: &Session, mut fresh: Session) -> Session {
    fresh.status = ours.status;
    for (key, value) in &ours.context {
        fresh.context.insert(key.clone(), value.clone());
    }
    fresh.current_flow = ours.current_flow.clone();
    fresh.current_step = ours.current_step.clone();
    fresh.retry_count = ours.retry_count;
    if fresh.user_id.is_none() {
        fresh.user_id = ours.user_id.clone();
    }
    fresh
}

impl Inner {
    fn failure(&self, session_id: &str, turn_id: &str, err: Error) -> TurnResponse {
        if err.is_user_visible() {
            return error_response(err);
        }
        match err.category() {
            ErrorCategory::Degraded => {
                tracing::warn!(turn_id, error = %err, "Turn degraded")
            },
            _ => tracing::error!(turn_id, error = %err, "Turn failed"),
        }
        TurnResponse::Reply(BotReply::new(
            session_id,
            self.conversation.messages.fallback_for(err.category()),
            NextAction::Error,
        ))
    }

    async fn load(&self, session_id: &str) -> Result<Session> {
        self.deps
            .sessions
            .get(session_id)
            .await?
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))
    }

    async fn resolve_session(&self, session_id: &str, request: &TurnRequest) -> Result<Session> {
        if let Some(session) = self.deps.sessions.get(session_id).await? {
            return Ok(session);
        }
        match self
            .deps
            .sessions
            .create(session_id, request.user_id.clone(), request.channel)
            .await
        {
            Ok(session) => {
                tracing::info!(session_id, "Session created");
                Ok(session)
            },
            Err(Error::Conflict(_)) => self.load(session_id).await,
            Err(e) => Err(e),
        }
    }

    /// Write the session, re-reading and reapplying on version conflicts
    async fn persist(&self, session: &Session) -> Result<()> {
        let mut candidate = session.clone();
        for attempt in 0..=MAX_CONFLICT_RETRIES {
            match self.deps.sessions.update(&candidate).await {
                Ok(()) => return Ok(()),
                Err(Error::Conflict(_)) if attempt < MAX_CONFLICT_RETRIES => {
                    tracing::debug!(
                        session_id = %session.session_id,
                        attempt,
                        "Session version conflict, retrying"
                    );
                    let fresh = self.load(&session.session_id).await?;
                    candidate = rebase(session, fresh);
                },
                Err(e) => return Err(e),
            }
        }
        Err(Error::Conflict(session.session_id.clone()))
    }

    async fn append_bot(&self, reply: &BotReply) -> Result<()> {
        let mut turn = TurnRecord::bot(reply.response_text.as_str())
            .with_next_action(reply.next_action.as_str())
            .with_entities(reply.entities.clone());
        if let (Some(intent), Some(confidence)) = (reply.intent, reply.confidence) {
            turn = turn.with_classification(intent, confidence);
        }
        self.deps.sessions.append_turn(&reply.session_id, turn).await
    }

    /// Withdraw or finish whatever escalation the session still has open
    fn close_escalation(&self, session_id: &str, reason: &str) {
        let Some(open) = self.deps.escalation.open_for_session(session_id) else {
            return;
        };
        let result = if open.status == EscalationStatus::InProgress {
            self.deps.escalation.resolve(&open.escalation_id)
        } else {
            self.deps.escalation.cancel(&open.escalation_id, reason)
        };
        if let Err(e) = result {
            tracing::warn!(
                escalation_id = %open.escalation_id,
                error = %e,
                "Failed to close escalation"
            );
        }
    }

    async fn process(&self, session_id: &str, request: TurnRequest, message: String) -> Result<BotReply> {
        let session = self.resolve_session(session_id, &request).await?;
        if session.status.is_closed() {
            return Err(Error::InvalidInput(
                "이미 종료된 상담입니다. 새 대화를 시작해주세요.".to_string(),
            ));
        }

        let content = if self.deps.scenarios.awaits_secure_input(&session) {
            REDACTED.to_string()
        } else {
            message.clone()
        };
        self.deps
            .sessions
            .append_turn(session_id, TurnRecord::user(content))
            .await?;

        if session.status.is_with_agent() {
            let reply = self.agent_side_reply(&session);
            self.append_bot(&reply).await?;
            return Ok(reply);
        }

        let mut session = self.load(session_id).await?;
        if session.user_id.is_none() {
            session.user_id = request.user_id.clone();
        }
        for key in &self.conversation.customer_metadata_keys {
            if let Some(value) = request.metadata.get(key) {
                session.set_context(key.clone(), value.clone());
            }
        }

        let nlu_started = Instant::now();
        let nlu = match self
            .deps
            .nlu
            .classify(&message, &nlu_context(&session))
            .await
        {
            Ok(nlu) => nlu,
            Err(e) => return self.degrade(&session, e).await,
        };
        tracing::info!(
            intent = %nlu.intent,
            confidence = nlu.confidence,
            provider = self.deps.nlu.name(),
            nlu_ms = nlu_started.elapsed().as_millis() as u64,
            "Utterance classified"
        );

        let sentiment = self
            .deps
            .sentiment
            .analyze(&message)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Sentiment analysis failed");
                Sentiment::neutral()
            });

        self.record_understanding(&mut session, &nlu, &sentiment);

        let mut reply = match self.decide(&mut session, &message, &nlu, &sentiment).await {
            Ok(reply) => reply,
            Err(e) if e.category() == ErrorCategory::Degraded => {
                return self.degrade(&session, e).await;
            },
            Err(e) => return Err(e),
        };

        if sentiment.label == SentimentLabel::Negative && !reply.escalation_required {
            reply.response_text = format!(
                "{} {}",
                self.conversation.messages.negative_sentiment_prefix, reply.response_text
            );
        }
        reply.intent = Some(nlu.intent);
        reply.confidence = Some(nlu.confidence);
        reply.entities = nlu.entities.clone();

        self.persist(&session).await?;
        self.append_bot(&reply).await?;
        tracing::info!(
            next_action = %reply.next_action,
            status = %session.status,
            "Turn handled"
        );
        Ok(reply)
    }

    fn agent_side_reply(&self, session: &Session) -> BotReply {
        let messages = &self.conversation.messages;
        let (text, action) = if session.status == SessionStatus::AgentAssigned {
            (messages.agent_handling.as_str(), NextAction::AgentHandling)
        } else {
            (messages.waiting_for_agent.as_str(), NextAction::WaitForAgent)
        };
        let mut reply = BotReply::new(session.session_id.as_str(), text, action);
        reply.escalation_required = true;
        reply.escalation_reference = session
            .context_str(keys::ESCALATION_ID)
            .and_then(|id| self.deps.escalation.get(id).ok())
            .map(|r| r.reference_number());
        reply
    }

    /// Fallback reply for a collaborator outage. The session keeps the
    /// user turn and gets the fallback as its bot turn.
    async fn degrade(&self, session: &Session, err: Error) -> Result<BotReply> {
        tracing::warn!(error = %err, "Collaborator unavailable, replying with fallback");
        let reply = BotReply::new(
            session.session_id.as_str(),
            self.conversation.messages.fallback_for(err.category()),
            NextAction::Error,
        );
        if let Err(e) = self.append_bot(&reply).await {
            tracing::warn!(error = %e, "Failed to record fallback turn");
        }
        Ok(reply)
    }

    fn record_understanding(&self, session: &mut Session, nlu: &NluResult, sentiment: &Sentiment) {
        session.set_context(keys::LAST_INTENT, nlu.intent.as_str());
        session.set_context(keys::LAST_CONFIDENCE, nlu.confidence as f64);
        for (name, value) in &nlu.entities {
            session.set_context(format!("{}{}", keys::ENTITY_PREFIX, name), value.clone());
        }
        if let Some(mood) = derive_mood(nlu.intent, nlu.confidence, Some(sentiment)) {
            session.set_context(keys::CUSTOMER_MOOD, mood.as_str());
        }
        if let Some(stage) = derive_stage(nlu.intent, session.has_active_flow()) {
            session.set_context(keys::CONVERSATION_STAGE, stage.as_str());
        }
    }

    /// Escalation pre-check, confidence gate and intent dispatch
    async fn decide(
        &self,
        session: &mut Session,
        message: &str,
        nlu: &NluResult,
        sentiment: &Sentiment,
    ) -> Result<BotReply> {
        let flow_active = session.has_active_flow();
        let trigger = TriggerInput::new(message)
            .with_intent(nlu.intent)
            .with_sentiment(sentiment)
            .flow_active(flow_active);
        if let Some(decision) = self.deps.escalation.evaluate(session, &trigger) {
            tracing::info!(reason = %decision.reason, priority = %decision.priority, "Escalation triggered");
            let description = format!("auto escalation ({}): {}", decision.reason, message);
            return self.escalate(session, decision.reason, Some(decision.priority), description);
        }

        // Applies inside flows too; the step stays where it is
        let messages = &self.conversation.messages;
        let threshold = self.nlu.threshold_for(nlu.intent);
        if nlu.confidence < threshold {
            tracing::debug!(threshold, flow_active, "Below confidence threshold, clarifying");
            return Ok(BotReply::new(
                session.session_id.as_str(),
                messages.clarification_for(nlu.intent),
                NextAction::Clarify,
            ));
        }

        let step_input = if flow_active {
            self.deps
                .scenarios
                .current_prompt(session)
                .ok()
                .map(|p| p.input_type)
        } else {
            None
        };
        let continuation = flow_active
            && is_continuation(message, step_input, self.conversation.continuation_max_chars);

        if !continuation {
            if let Some(reason) = self.bypass_reason(nlu) {
                let description = format!("{} at confidence {:.2}: {}", nlu.intent, nlu.confidence, message);
                return self.escalate(session, reason, None, description);
            }
        }

        if nlu.intent.is_simple_informational() {
            if nlu.intent == Intent::Goodbye {
                session.set_context(keys::RESOLVED, true);
            }
            let text = messages
                .reply_for(nlu.intent)
                .unwrap_or(messages.default_clarification.as_str());
            return Ok(BotReply::new(
                session.session_id.as_str(),
                text,
                NextAction::Continue,
            ));
        }

        if !flow_active {
            if let Some(flow_id) = self.intent_flows.get(nlu.intent.as_str()) {
                let prompt = self
                    .deps
                    .scenarios
                    .start_flow(session, flow_id, BTreeMap::new())?;
                session.set_context(
                    keys::CONVERSATION_STAGE,
                    ConversationStage::DataCollection.as_str(),
                );
                let text = match messages.reply_for(nlu.intent) {
                    Some(intro) => format!("{}\n{}", intro, prompt.message),
                    None => prompt.message,
                };
                return Ok(BotReply::new(
                    session.session_id.as_str(),
                    text,
                    NextAction::CollectInput,
                ));
            }
        }

        if continuation {
            return self.advance_flow(session, message);
        }

        if nlu.intent.is_faq_class() {
            return self.answer_from_faq(session, message).await;
        }

        let text = messages
            .reply_for(nlu.intent)
            .map(String::from)
            .or_else(|| nlu.response_text.clone())
            .unwrap_or_else(|| messages.clarification_for(nlu.intent).to_string());
        Ok(BotReply::new(
            session.session_id.as_str(),
            text,
            NextAction::Continue,
        ))
    }

    /// Security-sensitive intents above their bypass threshold go straight
    /// to an agent
    fn bypass_reason(&self, nlu: &NluResult) -> Option<EscalationReason> {
        if !nlu.intent.is_security_sensitive() {
            return None;
        }
        let threshold = self.nlu.bypass_threshold_for(nlu.intent)?;
        if nlu.confidence < threshold {
            return None;
        }
        match nlu.intent {
            Intent::Complaint => Some(EscalationReason::Complaint),
            Intent::PaymentInquiry => Some(EscalationReason::PaymentIssue),
            Intent::CancelRequest => Some(EscalationReason::CustomerRequest),
            _ => None,
        }
    }

    fn advance_flow(&self, session: &mut Session, message: &str) -> Result<BotReply> {
        let flow_id = session.current_flow.clone().unwrap_or_default();
        let outcome = self.deps.scenarios.advance(session, message)?;
        let session_id = session.session_id.clone();
        let messages = &self.conversation.messages;

        match outcome {
            Outcome::ContinuePrompt {
                rendered_message, ..
            } => Ok(BotReply::new(
                session_id,
                rendered_message,
                NextAction::CollectInput,
            )),
            Outcome::InvalidInput { error_message, .. } => Ok(BotReply::new(
                session_id,
                error_message,
                NextAction::CollectInput,
            )),
            Outcome::Complete { collected_data } => {
                tracing::info!(flow_id = %flow_id, fields = collected_data.len(), "Flow finished");
                session.set_context(keys::RESOLVED, true);
                session.set_context(keys::CONVERSATION_STAGE, ConversationStage::Closing.as_str());
                Ok(BotReply::new(
                    session_id,
                    messages.flow_completed.as_str(),
                    NextAction::Complete,
                ))
            },
            Outcome::Escalate { reason } => {
                let description = format!("flow {flow_id}: {reason}");
                if reason == REASON_REPEATED_INVALID_INPUT {
                    let forced = TriggerInput::new(message).scenario_forced();
                    let decision = self.deps.escalation.evaluate(session, &forced);
                    let (reason, priority) = decision
                        .map(|d| (d.reason, d.priority))
                        .unwrap_or((EscalationReason::BotLimitation, Priority::Medium));
                    self.escalate(session, reason, Some(priority), description)
                } else {
                    self.escalate(session, EscalationReason::ScenarioDirected, None, description)
                }
            },
        }
    }

    async fn answer_from_faq(&self, session: &mut Session, message: &str) -> Result<BotReply> {
        let messages = &self.conversation.messages;
        let hits = self.deps.faq.search(message, None, Some(1)).await?;
        match hits.first() {
            Some(top) if top.score >= self.faq_acceptance => {
                if let Err(e) = self.deps.faq.select(&top.item.faq_id).await {
                    tracing::warn!(faq_id = %top.item.faq_id, error = %e, "Failed to record FAQ view");
                }
                tracing::debug!(faq_id = %top.item.faq_id, score = top.score, "FAQ answered");
                session.set_context("last_faq_id", top.item.faq_id.as_str());
                Ok(BotReply::new(
                    session.session_id.as_str(),
                    top.item.answer.as_str(),
                    NextAction::Continue,
                ))
            },
            _ => Ok(BotReply::new(
                session.session_id.as_str(),
                messages.faq_no_match.as_str(),
                NextAction::Clarify,
            )),
        }
    }

    /// Open an escalation for the session and move it to `escalated`.
    /// The caller persists the session.
    fn escalate(
        &self,
        session: &mut Session,
        reason: EscalationReason,
        priority: Option<Priority>,
        description: String,
    ) -> Result<BotReply> {
        let mut draft = EscalationDraft::from_session(session, reason)
            .with_id(EscalationRequest::mint_id())
            .with_description(description);
        if let Some(priority) = priority {
            draft = draft.with_priority(priority);
        }
        let ticket = self.deps.escalation.create(draft)?;
        let request = &ticket.request;

        session.clear_flow();
        session.transition_to(SessionStatus::Escalated)?;
        session.set_context(keys::ESCALATION_REASON, reason.as_str());
        session.set_context(keys::ESCALATION_ID, request.escalation_id.as_str());
        session.set_context(keys::CONVERSATION_STAGE, ConversationStage::Handoff.as_str());

        tracing::info!(
            escalation_id = %request.escalation_id,
            reason = %reason,
            priority = %request.priority,
            queue = %request.queue_name,
            "Session escalated"
        );

        let mut reply = BotReply::new(
            session.session_id.as_str(),
            ticket.customer_message.as_str(),
            NextAction::Escalate,
        );
        reply.escalation_required = true;
        reply.escalation_reference = Some(request.reference_number());
        Ok(reply)
    }
}
