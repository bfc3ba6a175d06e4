//! OpenAI API client
//!
//! Provides chat completions for replies, deterministic JSON-mode
//! classification calls for the guardrail classifiers, and the moderation
//! endpoint. Uses a long-lived reqwest::Client for connection pooling with
//! a bounded per-request timeout.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{error, info};

use crate::error::ChatError;
use crate::models::ChatMessage;
use crate::Result;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Classifier calls use a pinned-deterministic configuration: temperature
/// zero, a small output budget, and the strict JSON response contract.
const CLASSIFIER_MAX_TOKENS: u32 = 100;

//
// ================= Service Seams =================
//

/// Reply generation after guardrails pass
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Zero-shot JSON classification used by the topic/advice checks
#[async_trait]
pub trait ClassifierService: Send + Sync {
    /// Issue one deterministic classification request and return the
    /// parsed JSON object. Malformed JSON from the model is a
    /// `ClassifierError`, never an implicit verdict.
    async fn classify(&self, system: &str, user: &str) -> Result<serde_json::Value>;
}

/// Provider-side safety classification
#[async_trait]
pub trait ModerationService: Send + Sync {
    async fn moderate(&self, text: &str) -> Result<ModerationOutcome>;
}

/// Raw moderation result: flagged flag plus per-category booleans
#[derive(Debug, Clone)]
pub struct ModerationOutcome {
    pub flagged: bool,
    pub categories: HashMap<String, bool>,
}

//
// ================= Client =================
//

/// Reusable OpenAI client (connection-pooled)
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL.to_string())
    }

    /// Override the base URL (self-hosted gateways, tests)
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_key,
            base_url,
            model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
        }
    }

    /// Shared chat-completions POST. `wrap` decides whether a failure is
    /// a completion error (reply path) or a classifier error (guardrails).
    async fn chat_request(
        &self,
        request: &ChatCompletionRequest,
        wrap: fn(String) -> ChatError,
    ) -> Result<String> {
        if self.api_key.is_empty() {
            return Err(wrap("OPENAI_API_KEY not configured".to_string()));
        }

        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                error!("OpenAI chat request failed: {}", e);
                wrap(format!("OpenAI API error: {}", e))
            })?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("OpenAI error response: {}", error_text);
            return Err(wrap(format!("OpenAI API error: {}", error_text)));
        }

        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            error!("Failed to parse OpenAI response: {}", e);
            wrap(format!("OpenAI parse error: {}", e))
        })?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| wrap("No choices in OpenAI response".to_string()))?;

        Ok(choice.message.content)
    }
}

#[async_trait]
impl CompletionService for OpenAiClient {
    /// Send the assembled prompt and return the assistant reply
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: messages.to_vec(),
            temperature: 0.7,
            max_tokens: None,
            response_format: None,
        };

        info!("Calling OpenAI chat completion");
        let content = self
            .chat_request(&request, ChatError::CompletionError)
            .await?;
        Ok(content.trim().to_string())
    }
}

#[async_trait]
impl ClassifierService for OpenAiClient {
    async fn classify(&self, system: &str, user: &str) -> Result<serde_json::Value> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
            temperature: 0.0,
            max_tokens: Some(CLASSIFIER_MAX_TOKENS),
            response_format: Some(ResponseFormat {
                format_type: "json_object".to_string(),
            }),
        };

        let content = self
            .chat_request(&request, ChatError::ClassifierError)
            .await?;

        serde_json::from_str(&content).map_err(|e| {
            ChatError::ClassifierError(format!(
                "Classifier returned malformed JSON: {} | raw={}",
                e, content
            ))
        })
    }
}

#[async_trait]
impl ModerationService for OpenAiClient {
    async fn moderate(&self, text: &str) -> Result<ModerationOutcome> {
        if self.api_key.is_empty() {
            return Err(ChatError::ClassifierError(
                "OPENAI_API_KEY not configured".to_string(),
            ));
        }

        let url = format!("{}/moderations", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&ModerationRequest { input: text })
            .send()
            .await
            .map_err(|e| {
                error!("Moderation request failed: {}", e);
                ChatError::ClassifierError(format!("Moderation API error: {}", e))
            })?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Moderation error response: {}", error_text);
            return Err(ChatError::ClassifierError(format!(
                "Moderation API error: {}",
                error_text
            )));
        }

        let moderation: ModerationResponse = response.json().await.map_err(|e| {
            ChatError::ClassifierError(format!("Moderation parse error: {}", e))
        })?;

        let result = moderation.results.into_iter().next().ok_or_else(|| {
            ChatError::ClassifierError("Empty moderation response".to_string())
        })?;

        Ok(ModerationOutcome {
            flagged: result.flagged,
            categories: result.categories,
        })
    }
}

//
// ================= Wire Types =================
//

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(Debug, Serialize)]
struct ModerationRequest<'a> {
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct ModerationResponse {
    results: Vec<ModerationResult>,
}

#[derive(Debug, Deserialize)]
struct ModerationResult {
    flagged: bool,
    categories: HashMap<String, bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    #[test]
    fn test_completion_request_serialization() {
        let request = ChatCompletionRequest {
            model: "gpt-3.5-turbo".to_string(),
            messages: vec![
                ChatMessage::system("You are a coach"),
                ChatMessage::user("budget tips?"),
            ],
            temperature: 0.7,
            max_tokens: None,
            response_format: None,
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("budget tips?"));
        assert!(!json.contains("max_tokens"));
        assert!(!json.contains("response_format"));
    }

    #[test]
    fn test_classifier_request_is_json_mode() {
        let request = ChatCompletionRequest {
            model: "gpt-3.5-turbo".to_string(),
            messages: vec![ChatMessage {
                role: Role::User,
                content: "classify this".to_string(),
            }],
            temperature: 0.0,
            max_tokens: Some(CLASSIFIER_MAX_TOKENS),
            response_format: Some(ResponseFormat {
                format_type: "json_object".to_string(),
            }),
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains(r#""type":"json_object""#));
        assert!(json.contains(r#""max_tokens":100"#));
        assert!(json.contains(r#""temperature":0.0"#));
    }

    #[test]
    fn test_moderation_response_parsing() {
        let raw = r#"{
            "results": [{
                "flagged": true,
                "categories": {"harassment": true, "violence": false}
            }]
        }"#;

        let parsed: ModerationResponse = serde_json::from_str(raw).unwrap();
        let result = &parsed.results[0];
        assert!(result.flagged);
        assert_eq!(result.categories.get("harassment"), Some(&true));
        assert_eq!(result.categories.get("violence"), Some(&false));
    }
}
