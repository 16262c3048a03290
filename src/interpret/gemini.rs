//! Gemini API client implementation
//!
//! Implements `CommandInterpreter` over the `generateContent` endpoint. The
//! reply text is parsed with `parse_intent`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use super::{CommandInterpreter, Interpretation, parse_intent};
use crate::config::GeminiConfig;
use crate::error::{Result, UnlockError};
use crate::platform::body_excerpt;

/// Extraction instructions sent ahead of every command
pub const SYSTEM_INSTRUCTION: &str = r#"You are an assistant that extracts structured data from user commands about podcast episodes.

The user will give commands like:
- 'Make episode 5 free for everyone'
- 'Change episode 12 to advance access'
- 'Unlock episode 8'

You must respond with ONLY valid JSON in this exact format:
{
  "episode_number": 5,
  "access_type": "free",
  "confidence": "high"
}

Rules:
- access_type must be either "free" or "advance"
- If user says 'free', 'unlock', 'public', 'everyone' → use "free"
- If user says 'advance', 'paid', 'lock', 'patron only' → use "advance"
- episode_number must be an integer
- confidence can be "high", "medium", or "low"
- Respond ONLY with the JSON object, no other text"#;

const TOP_P: f64 = 0.95;
const TOP_K: u32 = 40;

/// Gemini API client
pub struct GeminiInterpreter {
    client: Client,
    api_key: Option<String>,
    config: GeminiConfig,
}

impl GeminiInterpreter {
    /// Create an interpreter. A missing key is reported per call, not here.
    pub fn new(config: &GeminiConfig, api_key: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| UnlockError::RemoteCallFailed(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            config: config.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    fn build_request(&self, command: &str) -> Value {
        let prompt = format!("{}\n\nUser command: {}", SYSTEM_INSTRUCTION, command);
        json!({
            "contents": [
                { "parts": [ { "text": prompt } ] }
            ],
            "generationConfig": {
                "temperature": self.config.temperature,
                "topP": TOP_P,
                "topK": TOP_K
            }
        })
    }

    /// Text of the first candidate's first part
    fn response_text(body: &Value) -> Option<&str> {
        body["candidates"][0]["content"]["parts"][0]["text"].as_str()
    }
}

#[async_trait]
impl CommandInterpreter for GeminiInterpreter {
    async fn interpret(&self, text: &str) -> Result<Interpretation> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| UnlockError::ConfigMissing("Gemini API key not configured.".to_string()))?;

        log::info!("Interpreting command via {}: {:?}", self.config.model, text);

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", api_key)])
            .header("content-type", "application/json")
            .json(&self.build_request(text))
            .send()
            .await
            .map_err(|e| UnlockError::RemoteCallFailed(format!("Gemini API error: {}", e.without_url())))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(UnlockError::RemoteCallFailed(format!(
                "Gemini API returned status {}. Response: {}",
                status.as_u16(),
                body_excerpt(&body)
            )));
        }

        let parsed: Value = serde_json::from_str(&body)
            .map_err(|_| UnlockError::MalformedResponse(format!("Unexpected API response format: {}", body_excerpt(&body))))?;

        let raw_text = Self::response_text(&parsed)
            .ok_or_else(|| UnlockError::MalformedResponse(format!("Unexpected API response format: {}", body_excerpt(&body))))?
            .to_string();

        log::debug!("Gemini interpretation: {}", raw_text);

        let intent = parse_intent(&raw_text)?;
        Ok(Interpretation { intent, raw_text })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AccessTier;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> GeminiConfig {
        GeminiConfig {
            base_url: server.uri(),
            timeout_secs: 5,
            ..Default::default()
        }
    }

    fn reply(text: &str) -> Value {
        json!({
            "candidates": [
                { "content": { "parts": [ { "text": text } ] } }
            ]
        })
    }

    #[test]
    fn test_build_request_carries_prompt_and_generation_config() {
        let interpreter = GeminiInterpreter::new(&GeminiConfig::default(), None).unwrap();
        let body = interpreter.build_request("Unlock episode 8");
        let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(prompt.starts_with("You are an assistant"));
        assert!(prompt.ends_with("User command: Unlock episode 8"));
        assert_eq!(body["generationConfig"]["topK"], json!(40));
    }

    #[test]
    fn test_endpoint_uses_model() {
        let interpreter = GeminiInterpreter::new(&GeminiConfig::default(), None).unwrap();
        assert_eq!(
            interpreter.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[tokio::test]
    async fn test_interpret_parses_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .and(query_param("key", "k-123"))
            .and(body_partial_json(json!({"generationConfig": {"topP": 0.95}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply(
                "```json\n{\"episode_number\": 8, \"access_type\": \"free\", \"confidence\": \"high\"}\n```",
            )))
            .expect(1)
            .mount(&server)
            .await;

        let interpreter = GeminiInterpreter::new(&config_for(&server), Some("k-123".to_string())).unwrap();
        let interpretation = interpreter.interpret("Unlock episode 8").await.unwrap();
        assert_eq!(interpretation.intent.episode_number, 8);
        assert_eq!(interpretation.intent.access_type, AccessTier::Free);
        assert!(interpretation.raw_text.contains("episode_number"));
    }

    #[tokio::test]
    async fn test_unexpected_shape_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
            .mount(&server)
            .await;

        let interpreter = GeminiInterpreter::new(&config_for(&server), Some("k".to_string())).unwrap();
        let err = interpreter.interpret("Unlock episode 8").await.unwrap_err();
        assert!(matches!(err, UnlockError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_http_error_is_remote_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
            .mount(&server)
            .await;

        let interpreter = GeminiInterpreter::new(&config_for(&server), Some("k".to_string())).unwrap();
        let err = interpreter.interpret("Unlock episode 8").await.unwrap_err();
        match err {
            UnlockError::RemoteCallFailed(msg) => assert!(msg.contains("429")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_transport_error_does_not_expose_key() {
        let config = GeminiConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            timeout_secs: 5,
            ..Default::default()
        };
        let interpreter = GeminiInterpreter::new(&config, Some("SECRET-KEY-123".to_string())).unwrap();
        let err = interpreter.interpret("Unlock episode 8").await.unwrap_err();
        assert!(matches!(err, UnlockError::RemoteCallFailed(_)));
        assert!(!err.to_string().contains("SECRET-KEY-123"));
        assert!(!err.to_string().contains("key="));
    }

    #[tokio::test]
    async fn test_missing_key_is_config_missing() {
        let interpreter = GeminiInterpreter::new(&GeminiConfig::default(), None).unwrap();
        let err = interpreter.interpret("Unlock episode 8").await.unwrap_err();
        assert!(matches!(err, UnlockError::ConfigMissing(_)));
    }
}
