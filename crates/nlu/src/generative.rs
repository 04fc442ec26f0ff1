//! Generative backend
//!
//! Talks to any OpenAI-compatible chat completion endpoint. The model is
//! asked for a JSON verdict; whatever comes back is checked against
//! [`verdict_schema`] before it is trusted. Output that cannot be parsed
//! degrades to a low-confidence `general_inquiry` carrying the raw text.

use async_trait::async_trait;
use jsonschema::JSONSchema;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use contact_center_core::{Intent, NluContext, NluResult};

use crate::backend::NluBackend;
use crate::prompt::{verdict_schema, Message, PromptBuilder};
use crate::NluError;

static JSON_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("valid regex"));

/// Confidence used when the reply holds no JSON at all
pub const NO_JSON_CONFIDENCE: f32 = 0.5;
/// Confidence used when the JSON is malformed or off-schema
pub const MALFORMED_JSON_CONFIDENCE: f32 = 0.3;

/// Generative backend configuration
#[derive(Debug, Clone)]
pub struct GenerativeConfig {
    /// Base URL, e.g. `https://api.openai.com/v1`
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: usize,
    pub timeout: Duration,
}

impl Default for GenerativeConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8000/v1".to_string(),
            api_key: None,
            model: "claude-3-haiku".to_string(),
            temperature: 0.1,
            max_tokens: 512,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Chat-completion classifier constrained to a JSON schema
pub struct GenerativeBackend {
    config: GenerativeConfig,
    client: Client,
    prompts: PromptBuilder,
    schema: JSONSchema,
}

impl GenerativeBackend {
    pub fn new(config: GenerativeConfig) -> Result<Self, NluError> {
        Self::with_prompts(config, PromptBuilder::default())
    }

    pub fn with_prompts(config: GenerativeConfig, prompts: PromptBuilder) -> Result<Self, NluError> {
        if config.endpoint.is_empty() {
            return Err(NluError::Configuration(
                "generative endpoint is required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| NluError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        let schema_doc = verdict_schema();
        let schema = JSONSchema::compile(&schema_doc)
            .map_err(|e| NluError::Configuration(format!("invalid verdict schema: {}", e)))?;

        Ok(Self {
            config,
            client,
            prompts,
            schema,
        })
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.config.endpoint.trim_end_matches('/'))
    }

    async fn execute_request(&self, messages: Vec<Message>) -> Result<String, NluError> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages,
            max_tokens: Some(self.config.max_tokens),
            temperature: Some(self.config.temperature),
            stream: Some(false),
        };

        let mut builder = self.client.post(self.chat_url()).json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let error = response.text().await.unwrap_or_default();
            // 5xx errors are retryable, 4xx are not
            if status.is_server_error() {
                return Err(NluError::Network(format!("Server error {}: {}", status, error)));
            }
            return Err(NluError::Api(format!("HTTP {}: {}", status, error)));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| NluError::InvalidResponse(e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| NluError::InvalidResponse("No choices in response".to_string()))
    }

    /// Turn raw model output into a result, never failing
    pub fn parse_verdict(&self, raw: &str) -> NluResult {
        let Some(found) = JSON_OBJECT.find(raw) else {
            return synthetic(NO_JSON_CONFIDENCE, "JSON 파싱 실패", raw);
        };

        let value: serde_json::Value = match serde_json::from_str(found.as_str()) {
            Ok(value) => value,
            Err(e) => {
                return synthetic(
                    MALFORMED_JSON_CONFIDENCE,
                    &format!("JSON 파싱 오류: {}", e),
                    raw,
                )
            }
        };

        if !self.schema.is_valid(&value) {
            return synthetic(MALFORMED_JSON_CONFIDENCE, "JSON 스키마 불일치", raw);
        }

        let verdict: Verdict = match serde_json::from_value(value) {
            Ok(verdict) => verdict,
            Err(e) => {
                return synthetic(
                    MALFORMED_JSON_CONFIDENCE,
                    &format!("JSON 파싱 오류: {}", e),
                    raw,
                )
            }
        };

        let mut result = NluResult::new(Intent::normalize(&verdict.intent), verdict.confidence)
            .with_reasoning(verdict.reasoning);
        result.entities = verdict
            .entities
            .into_iter()
            .map(|(k, v)| match v {
                serde_json::Value::String(s) => (k, s),
                other => (k, other.to_string()),
            })
            .collect();
        result.response_text = verdict.response_text.filter(|t| !t.is_empty());
        result.suggested_action = verdict.next_action.filter(|a| !a.is_empty());
        result
    }
}

fn synthetic(confidence: f32, why: &str, raw: &str) -> NluResult {
    tracing::warn!(reason = why, "generative NLU output rejected");
    NluResult::new(Intent::GeneralInquiry, confidence).with_reasoning(format!("{}: {}", why, raw))
}

#[async_trait]
impl NluBackend for GenerativeBackend {
    async fn classify(
        &self,
        utterance: &str,
        context: &NluContext,
    ) -> Result<NluResult, NluError> {
        let messages = self.prompts.build(utterance, context);
        let raw = self.execute_request(messages).await?;
        Ok(self.parse_verdict(&raw))
    }

    fn name(&self) -> &str {
        "generative"
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct Verdict {
    intent: String,
    confidence: f32,
    #[serde(default)]
    entities: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    response_text: Option<String>,
    #[serde(default)]
    next_action: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend(endpoint: &str) -> GenerativeBackend {
        GenerativeBackend::new(GenerativeConfig {
            endpoint: endpoint.to_string(),
            api_key: Some("test-key".to_string()),
            timeout: Duration::from_secs(2),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_parse_wrapped_json() {
        let raw = "분석 결과입니다:\n{\"intent\": \"ProductInquiry\", \"confidence\": 0.92, \
                   \"entities\": {\"product\": \"적금\", \"count\": 2}, \"reasoning\": \"상품 문의\"}";
        let result = backend("http://localhost").parse_verdict(raw);
        assert_eq!(result.intent, Intent::ProductInquiry);
        assert_eq!(result.confidence, 0.92);
        assert_eq!(result.entities.get("product").unwrap(), "적금");
        assert_eq!(result.entities.get("count").unwrap(), "2");
    }

    #[test]
    fn test_no_json_falls_back() {
        let result = backend("http://localhost").parse_verdict("잘 모르겠습니다");
        assert_eq!(result.intent, Intent::GeneralInquiry);
        assert!(result.confidence <= 0.5);
        assert!(result.reasoning.contains("잘 모르겠습니다"));
    }

    #[test]
    fn test_malformed_and_off_schema_json_fall_back() {
        let b = backend("http://localhost");

        let broken = b.parse_verdict("{\"intent\": \"greeting\", confidence: }");
        assert_eq!(broken.intent, Intent::GeneralInquiry);
        assert!(broken.confidence <= 0.5);

        let off_schema = b.parse_verdict("{\"intent\": \"greeting\", \"confidence\": 7}");
        assert_eq!(off_schema.intent, Intent::GeneralInquiry);
        assert!(off_schema.reasoning.contains("\"confidence\": 7"));
    }

    #[tokio::test]
    async fn test_classify_over_http() {
        let server = MockServer::start().await;
        let content = r#"{"intent": "greeting", "confidence": 0.97, "reasoning": "인사", "response_text": "안녕하세요!"}"#;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "role": "assistant", "content": content } }]
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
    async fn test_server_error_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = backend(&server.uri())
            .classify("안녕하세요", &NluContext::new("s1"))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
