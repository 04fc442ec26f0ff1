//! Auto-escalation trigger rules
//!
//! Rules are evaluated in a fixed order and the first match wins:
//!
//! 1. explicit agent request keyword -> user_request / medium
//! 2. negative sentiment above threshold -> negative_sentiment / high
//! 3. scenario-forced escalation or a stuck conversation -> bot_limitation / medium
//! 4. same intent on the last N user turns -> bot_limitation / medium
//! 5. urgency keyword -> urgent_matter / critical
//! 6. session older than the configured age -> timeout / low

use chrono::{DateTime, Duration, Utc};

use contact_center_config::EscalationConfig;
use contact_center_core::session::keys;
use contact_center_core::{EscalationReason, Intent, Priority, Sentiment, Session, TurnSource};

/// What triggered an escalation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerDecision {
    pub reason: EscalationReason,
    pub priority: Priority,
}

impl TriggerDecision {
    pub fn new(reason: EscalationReason, priority: Priority) -> Self {
        Self { reason, priority }
    }
}

/// The latest user turn as seen by the trigger rules
#[derive(Debug, Clone, Copy)]
pub struct TriggerInput<'a> {
    pub text: &'a str,
    pub intent: Option<Intent>,
    pub sentiment: Option<&'a Sentiment>,
    /// The scenario interpreter demanded an escalation this turn
    pub scenario_forced: bool,
    /// A flow was active when the turn arrived
    pub flow_active: bool,
    pub now: DateTime<Utc>,
}

impl<'a> TriggerInput<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            intent: None,
            sentiment: None,
            scenario_forced: false,
            flow_active: false,
            now: Utc::now(),
        }
    }

    pub fn with_intent(mut self, intent: Intent) -> Self {
        self.intent = Some(intent);
        self
    }

    pub fn with_sentiment(mut self, sentiment: &'a Sentiment) -> Self {
        self.sentiment = Some(sentiment);
        self
    }

    pub fn scenario_forced(mut self) -> Self {
        self.scenario_forced = true;
        self
    }

    pub fn flow_active(mut self, active: bool) -> Self {
        self.flow_active = active;
        self
    }

    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }
}

/// Evaluates the trigger rules against a session
#[derive(Debug, Clone)]
pub struct TriggerEvaluator {
    escalation_keywords: Vec<String>,
    urgency_keywords: Vec<String>,
    negative_threshold: f32,
    turn_limit: usize,
    intent_window: usize,
    max_age: Duration,
}

impl TriggerEvaluator {
    pub fn new(config: &EscalationConfig) -> Self {
        Self {
            escalation_keywords: lowercase_all(&config.escalation_keywords),
            urgency_keywords: lowercase_all(&config.urgency_keywords),
            negative_threshold: config.negative_sentiment_threshold,
            turn_limit: config.turn_limit,
            intent_window: config.repeated_intent_window.max(2),
            max_age: Duration::seconds(config.session_age_seconds as i64),
        }
    }

    /// First matching rule, or `None` when the bot keeps the session
    pub fn evaluate(&self, session: &Session, input: &TriggerInput<'_>) -> Option<TriggerDecision> {
        let text = input.text.to_lowercase();

        if contains_any(&text, &self.escalation_keywords) {
            return Some(TriggerDecision::new(
                EscalationReason::UserRequest,
                Priority::Medium,
            ));
        }

        if let Some(sentiment) = input.sentiment {
            if sentiment.negative_confidence() > self.negative_threshold {
                return Some(TriggerDecision::new(
                    EscalationReason::NegativeSentiment,
                    Priority::High,
                ));
            }
        }

        if input.scenario_forced || self.is_stuck(session) {
            return Some(TriggerDecision::new(
                EscalationReason::BotLimitation,
                Priority::Medium,
            ));
        }

        // Answers inside a flow legitimately repeat the flow's intent
        if !input.flow_active && self.repeats_intent(session, input.intent) {
            return Some(TriggerDecision::new(
                EscalationReason::BotLimitation,
                Priority::Medium,
            ));
        }

        if contains_any(&text, &self.urgency_keywords) {
            return Some(TriggerDecision::new(
                EscalationReason::UrgentMatter,
                Priority::Critical,
            ));
        }

        if !session.status.is_closed() && session.age(input.now) > self.max_age {
            return Some(TriggerDecision::new(EscalationReason::Timeout, Priority::Low));
        }

        None
    }

    fn is_stuck(&self, session: &Session) -> bool {
        session.user_turns().count() >= self.turn_limit && !session.context_bool(keys::RESOLVED)
    }

    /// Bot turns carry the classification of the user turn they answered,
    /// so the previous user intents are read from there.
    fn repeats_intent(&self, session: &Session, current: Option<Intent>) -> bool {
        let Some(current) = current else {
            return false;
        };
        let previous: Vec<Intent> = session
            .history
            .iter()
            .rev()
            .filter(|t| t.source == TurnSource::Bot)
            .filter_map(|t| t.intent)
            .take(self.intent_window - 1)
            .collect();
        previous.len() == self.intent_window - 1 && previous.iter().all(|i| *i == current)
    }
}

fn lowercase_all(words: &[String]) -> Vec<String> {
    words
        .iter()
        .map(|w| w.trim().to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

fn contains_any(text: &str, words: &[String]) -> bool {
    words.iter().any(|w| text.contains(w.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use contact_center_core::{Channel, SentimentLabel, SentimentScores, TurnRecord};

    fn evaluator() -> TriggerEvaluator {
        TriggerEvaluator::new(&EscalationConfig::default())
    }

    fn session() -> Session {
        Session::new("s1", None, Channel::WebChat)
    }

    fn negative(score: f32) -> Sentiment {
        Sentiment {
            label: SentimentLabel::Negative,
            confidence: score,
            scores: SentimentScores {
                negative: score,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_explicit_request() {
        let decision = evaluator()
            .evaluate(&session(), &TriggerInput::new("상담원 연결해주세요"))
            .unwrap();
        assert_eq!(decision.reason, EscalationReason::UserRequest);
        assert_eq!(decision.priority, Priority::Medium);
    }

    #[test]
    fn test_explicit_request_wins_over_urgency() {
        let decision = evaluator()
            .evaluate(&session(), &TriggerInput::new("긴급해요 상담원 바꿔주세요"))
            .unwrap();
        assert_eq!(decision.reason, EscalationReason::UserRequest);
    }

    #[test]
    fn test_negative_sentiment_threshold_is_strict() {
        let eval = evaluator();
        let at = negative(0.8);
        assert!(eval
            .evaluate(&session(), &TriggerInput::new("음").with_sentiment(&at))
            .is_none());

        let above = negative(0.85);
        let decision = eval
            .evaluate(&session(), &TriggerInput::new("음").with_sentiment(&above))
            .unwrap();
        assert_eq!(decision.reason, EscalationReason::NegativeSentiment);
        assert_eq!(decision.priority, Priority::High);
    }

    #[test]
    fn test_long_history_without_resolution() {
        let mut s = session();
        for i in 0..10 {
            s.history.push(TurnRecord::user(format!("질문 {i}")));
        }
        let decision = evaluator().evaluate(&s, &TriggerInput::new("그리고요")).unwrap();
        assert_eq!(decision.reason, EscalationReason::BotLimitation);

        s.set_context(keys::RESOLVED, true);
        assert!(evaluator().evaluate(&s, &TriggerInput::new("그리고요")).is_none());
    }

    #[test]
    fn test_turn_limit_counts_only_user_turns() {
        let mut s = session();
        for i in 0..6 {
            s.history.push(TurnRecord::user(format!("질문 {i}")));
            s.history.push(TurnRecord::bot(format!("답변 {i}")));
        }
        assert!(evaluator().evaluate(&s, &TriggerInput::new("그리고요")).is_none());

        for i in 6..10 {
            s.history.push(TurnRecord::user(format!("질문 {i}")));
            s.history.push(TurnRecord::bot(format!("답변 {i}")));
        }
        let decision = evaluator().evaluate(&s, &TriggerInput::new("그리고요")).unwrap();
        assert_eq!(decision.reason, EscalationReason::BotLimitation);
    }

    #[test]
    fn test_scenario_forced() {
        let decision = evaluator()
            .evaluate(&session(), &TriggerInput::new("abc").scenario_forced())
            .unwrap();
        assert_eq!(decision.reason, EscalationReason::BotLimitation);
    }

    #[test]
    fn test_repeated_intent() {
        let mut s = session();
        for _ in 0..2 {
            s.history.push(TurnRecord::user("결제 문의"));
            s.history
                .push(TurnRecord::bot("네").with_classification(Intent::PaymentInquiry, 0.9));
        }
        let input = TriggerInput::new("결제 문의요").with_intent(Intent::PaymentInquiry);
        let decision = evaluator().evaluate(&s, &input).unwrap();
        assert_eq!(decision.reason, EscalationReason::BotLimitation);

        // A different intent this turn breaks the run
        let input = TriggerInput::new("안녕").with_intent(Intent::Greeting);
        assert!(evaluator().evaluate(&s, &input).is_none());

        // Flow answers do not count
        let input = TriggerInput::new("결제 문의요")
            .with_intent(Intent::PaymentInquiry)
            .flow_active(true);
        assert!(evaluator().evaluate(&s, &input).is_none());
    }

    #[test]
    fn test_urgency_is_critical() {
        let decision = evaluator()
            .evaluate(&session(), &TriggerInput::new("긴급합니다 당장 처리해주세요"))
            .unwrap();
        assert_eq!(decision.reason, EscalationReason::UrgentMatter);
        assert_eq!(decision.priority, Priority::Critical);
    }

    #[test]
    fn test_session_age() {
        let s = session();
        let later = Utc::now() + Duration::minutes(31);
        let decision = evaluator()
            .evaluate(&s, &TriggerInput::new("네").at(later))
            .unwrap();
        assert_eq!(decision.reason, EscalationReason::Timeout);
        assert_eq!(decision.priority, Priority::Low);
    }

    #[test]
    fn test_no_trigger() {
        assert!(evaluator()
            .evaluate(&session(), &TriggerInput::new("안녕하세요"))
            .is_none());
    }
}
