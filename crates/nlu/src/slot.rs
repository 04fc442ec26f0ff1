//! Slot-based backend
//!
//! Speaks the `recognize_text` contract of slot-filling bot services: the
//! reply carries the matched intent, its confidence and whatever slots the
//! bot filled. Unfilled slots are skipped.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use contact_center_core::{Intent, NluContext, NluResult};

use crate::backend::NluBackend;
use crate::NluError;

/// Slot-based backend configuration
#[derive(Debug, Clone)]
pub struct SlotConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub bot_id: String,
    pub bot_alias_id: String,
    pub locale: String,
    pub timeout: Duration,
}

impl Default for SlotConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: None,
            bot_id: String::new(),
            bot_alias_id: "TSTALIASID".to_string(),
            locale: "ko_KR".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Slot-filling bot classifier
pub struct SlotBackend {
    config: SlotConfig,
    client: Client,
}

impl SlotBackend {
    pub fn new(config: SlotConfig) -> Result<Self, NluError> {
        if config.endpoint.is_empty() || config.bot_id.is_empty() {
            return Err(NluError::Configuration(
                "slot backend needs endpoint and bot_id".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| NluError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn recognize_url(&self, session_id: &str) -> String {
        format!(
            "{}/bots/{}/botAliases/{}/botLocales/{}/sessions/{}/text",
            self.config.endpoint.trim_end_matches('/'),
            self.config.bot_id,
            self.config.bot_alias_id,
            self.config.locale,
            session_id
        )
    }

    fn session_attributes(context: &NluContext) -> BTreeMap<String, String> {
        let mut attrs = context.attributes.clone();
        let optional = [
            ("user_id", &context.user_id),
            ("last_intent", &context.last_intent),
            ("conversation_stage", &context.conversation_stage),
            ("customer_mood", &context.customer_mood),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                attrs.insert(key.to_string(), value.clone());
            }
        }
        attrs
    }

    /// Map a recognize_text reply onto an NLU result
    fn extract(response: RecognizeResponse) -> NluResult {
        let intent = response.session_state.intent.unwrap_or_default();

        let confidence = intent
            .nlu_intent_confidence
            .map(|c| c.score)
            .or_else(|| {
                response
                    .interpretations
                    .iter()
                    .find(|i| i.intent.as_ref().map(|x| &x.name) == Some(&intent.name))
                    .and_then(|i| i.nlu_confidence.as_ref().map(|c| c.score))
            })
            .unwrap_or(0.0);

        let entities: BTreeMap<String, String> = intent
            .slots
            .into_iter()
            .filter_map(|(name, slot)| {
                slot.and_then(|s| s.value)
                    .and_then(|v| v.interpreted_value)
                    .map(|value| (name, value))
            })
            .collect();

        let mut result = NluResult::new(Intent::normalize(&intent.name), confidence)
            .with_reasoning(format!("slot intent {}", intent.name));
        result.entities = entities;
        if let Some(message) = response.messages.into_iter().next() {
            result.response_text = Some(message.content);
        }
        result
    }
}

#[async_trait]
impl NluBackend for SlotBackend {
    async fn classify(
        &self,
        utterance: &str,
        context: &NluContext,
    ) -> Result<NluResult, NluError> {
        let request = RecognizeRequest {
            text: utterance.to_string(),
            session_state: RequestSessionState {
                session_attributes: Self::session_attributes(context),
            },
        };

        let mut builder = self
            .client
            .post(self.recognize_url(&context.session_id))
            .json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let error = response.text().await.unwrap_or_default();
            if status.is_server_error() {
                return Err(NluError::Network(format!("Server error {}: {}", status, error)));
            }
            return Err(NluError::Api(format!("HTTP {}: {}", status, error)));
        }

        let body: RecognizeResponse = response
            .json()
            .await
            .map_err(|e| NluError::InvalidResponse(e.to_string()))?;

        Ok(Self::extract(body))
    }

    fn name(&self) -> &str {
        "slot_based"
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecognizeRequest {
    text: String,
    session_state: RequestSessionState,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestSessionState {
    session_attributes: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RecognizeResponse {
    #[serde(default)]
    session_state: ResponseSessionState,
    #[serde(default)]
    interpretations: Vec<Interpretation>,
    #[serde(default)]
    messages: Vec<BotMessage>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ResponseSessionState {
    #[serde(default)]
    intent: Option<SlotIntent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SlotIntent {
    name: String,
    #[serde(default)]
    nlu_intent_confidence: Option<Score>,
    #[serde(default)]
    slots: BTreeMap<String, Option<Slot>>,
}

impl Default for SlotIntent {
    fn default() -> Self {
        Self {
            name: "general_inquiry".to_string(),
            nlu_intent_confidence: None,
            slots: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Interpretation {
    #[serde(default)]
    intent: Option<SlotIntent>,
    #[serde(default)]
    nlu_confidence: Option<Score>,
}

#[derive(Debug, Deserialize)]
struct Score {
    score: f32,
}

#[derive(Debug, Deserialize)]
struct Slot {
    #[serde(default)]
    value: Option<SlotValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SlotValue {
    #[serde(default)]
    interpreted_value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BotMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend(endpoint: &str) -> SlotBackend {
        SlotBackend::new(SlotConfig {
            endpoint: endpoint.to_string(),
            bot_id: "BOT1".to_string(),
            timeout: Duration::from_secs(2),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_requires_bot_id() {
        assert!(SlotBackend::new(SlotConfig {
            endpoint: "http://localhost".to_string(),
            ..Default::default()
        })
        .is_err());
    }

    #[test]
    fn test_extract_filled_slots_only() {
        let body: RecognizeResponse = serde_json::from_value(serde_json::json!({
            "sessionState": {
                "intent": {
                    "name": "MakeReservation",
                    "nluIntentConfidence": { "score": 0.91 },
                    "slots": {
                        "date": { "value": { "interpretedValue": "2025-05-01" } },
                        "party": null
                    }
                }
            }
        }))
        .unwrap();

        let result = SlotBackend::extract(body);
        assert_eq!(result.intent, Intent::Reservation);
        assert_eq!(result.confidence, 0.91);
        assert_eq!(result.entities.len(), 1);
        assert_eq!(result.entities.get("date").unwrap(), "2025-05-01");
    }

    #[test]
    fn test_confidence_from_interpretations() {
        let body: RecognizeResponse = serde_json::from_value(serde_json::json!({
            "sessionState": { "intent": { "name": "Greeting" } },
            "interpretations": [
                { "intent": { "name": "Greeting" }, "nluConfidence": { "score": 0.88 } }
            ]
        }))
        .unwrap();
        assert_eq!(SlotBackend::extract(body).confidence, 0.88);
    }

    #[tokio::test]
    async fn test_classify_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bots/BOT1/botAliases/TSTALIASID/botLocales/ko_KR/sessions/s1/text"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "sessionState": {
                    "intent": { "name": "Greeting", "nluIntentConfidence": { "score": 0.95 } }
                },
                "messages": [{ "content": "안녕하세요!" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = backend(&server.uri())
            .classify("안녕하세요", &NluContext::new("s1"))
            .await
            .unwrap();
        assert_eq!(result.intent, Intent::Greeting);
        assert_eq!(result.response_text.as_deref(), Some("안녕하세요!"));
    }

    #[tokio::test]
    async fn test_client_error_is_not_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let err = backend(&server.uri())
            .classify("안녕하세요", &NluContext::new("s1"))
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
    }
}
