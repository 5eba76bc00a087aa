//! LLM client for SQL generation and result narration.
//!
//! Supports Gemini (default), Ollama and OpenAI-compatible completion APIs.
//! Every call is a single non-streaming prompt/response exchange.

mod config;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use config::{LlmConfig, LlmProvider};

/// Something that turns a prompt into a completion.
#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

/// LLM client over HTTP.
pub struct LlmClient {
    config: LlmConfig,
    client: Client,
}

/// Gemini `generateContent` request format.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

/// Gemini `generateContent` response format.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

impl GeminiResponse {
    fn into_text(self) -> Result<String, LlmError> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(LlmError::Api(format!("Prompt blocked: {}", reason)));
        }

        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Parse("No candidates in response".to_string()))?;

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".to_string());
            return Err(LlmError::Parse(format!(
                "Empty response (finish reason: {})",
                reason
            )));
        }
        Ok(text)
    }
}

/// Ollama API request format.
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

/// Ollama API response format.
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

/// OpenAI chat completions request format.
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI chat completions response format.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

impl ChatResponse {
    fn into_text(self) -> Result<String, LlmError> {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| LlmError::Parse("Empty response".to_string()))
    }
}

/// Error payload shared by Gemini and OpenAI-compatible APIs.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Pull a readable message out of an error body, falling back to the raw text.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

impl LlmClient {
    /// Create a new LLM client with the given configuration.
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        if config.provider.api_key_var().is_some() && config.api_key.is_none() {
            return Err(LlmError::MissingApiKey(config.provider));
        }

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Connection(e.to_string()))?;

        Ok(Self { config, client })
    }

    /// Get the config.
    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Send a prompt to the configured provider.
    pub async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        debug!(
            "Sending {} char prompt to {} ({})",
            prompt.len(),
            self.config.provider.as_str(),
            self.config.model()
        );
        match self.config.provider {
            LlmProvider::Gemini => self.call_gemini(prompt).await,
            LlmProvider::Ollama => self.call_ollama(prompt).await,
            LlmProvider::OpenAI => self.call_openai(prompt).await,
        }
    }

    /// Call the Gemini `generateContent` API with a prompt.
    async fn call_gemini(&self, prompt: &str) -> Result<String, LlmError> {
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_tokens,
            },
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.endpoint(),
            self.config.model()
        );
        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.config.api_key.as_deref().unwrap_or_default())
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Connection(e.to_string()))?;

        let resp = Self::check_status(resp).await?;
        let gemini_resp: GeminiResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        gemini_resp.into_text()
    }

    /// Call Ollama API with a prompt.
    async fn call_ollama(&self, prompt: &str) -> Result<String, LlmError> {
        let request = OllamaRequest {
            model: self.config.model().to_string(),
            prompt: prompt.to_string(),
            stream: false,
            options: OllamaOptions {
                temperature: self.config.temperature,
                num_predict: self.config.max_tokens,
            },
        };

        let url = format!("{}/api/generate", self.config.endpoint());
        let resp = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Connection(e.to_string()))?;

        let resp = Self::check_status(resp).await?;
        let ollama_resp: OllamaResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        Ok(ollama_resp.response)
    }

    /// Call an OpenAI-compatible chat completions API with a prompt.
    async fn call_openai(&self, prompt: &str) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: self.config.model().to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: Some(prompt.to_string()),
            }],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let url = format!("{}/v1/chat/completions", self.config.endpoint());
        let resp = self
            .client
            .post(&url)
            .bearer_auth(self.config.api_key.as_deref().unwrap_or_default())
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Connection(e.to_string()))?;

        let resp = Self::check_status(resp).await?;
        let chat_resp: ChatResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        chat_resp.into_text()
    }

    async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, LlmError> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        Err(LlmError::Api(format!(
            "HTTP {}: {}",
            status,
            api_error_message(&body)
        )))
    }
}

#[async_trait]
impl Completion for LlmClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        self.generate(prompt).await
    }
}

/// Errors that can occur during LLM operations.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// Failed to connect to LLM service
    #[error("Connection error: {0}")]
    Connection(String),
    /// API returned an error
    #[error("API error: {0}")]
    Api(String),
    /// Failed to parse response
    #[error("Parse error: {0}")]
    Parse(String),
    #[error(
        "No API key configured for {}; set {}",
        .0.as_str(),
        .0.api_key_var().unwrap_or("LLM_API_KEY")
    )]
    MissingApiKey(LlmProvider),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gemini_request_shape() {
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: "How many orders?".to_string(),
                }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: 0.0,
                max_output_tokens: 512,
            },
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "How many orders?");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 512);
        assert_eq!(json["generationConfig"]["temperature"], 0.0);
    }

    #[test]
    fn test_gemini_response_joins_parts() {
        let body = r#"{
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "SELECT COUNT(*) "}, {"text": "FROM orders"}]},
                "finishReason": "STOP"
            }]
        }"#;
        let resp: GeminiResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.into_text().unwrap(), "SELECT COUNT(*) FROM orders");
    }

    #[test]
    fn test_gemini_blocked_prompt() {
        let body = r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#;
        let resp: GeminiResponse = serde_json::from_str(body).unwrap();
        let err = resp.into_text().unwrap_err();
        assert!(matches!(err, LlmError::Api(ref msg) if msg.contains("SAFETY")));
    }

    #[test]
    fn test_gemini_empty_candidate() {
        let body = r#"{"candidates": [{"finishReason": "MAX_TOKENS"}]}"#;
        let resp: GeminiResponse = serde_json::from_str(body).unwrap();
        let err = resp.into_text().unwrap_err();
        assert!(err.to_string().contains("MAX_TOKENS"));
    }

    #[test]
    fn test_chat_response() {
        let body = r#"{"choices": [{"message": {"role": "assistant", "content": "SELECT 1"}}]}"#;
        let resp: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.into_text().unwrap(), "SELECT 1");

        let resp: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(resp.into_text().is_err());
    }

    #[test]
    fn test_ollama_response() {
        let body = r#"{"model": "llama3.2", "response": "SELECT 1", "done": true}"#;
        let resp: OllamaResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.response, "SELECT 1");
    }

    #[test]
    fn test_api_error_message() {
        let body = r#"{"error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}}"#;
        assert_eq!(api_error_message(body), "API key not valid");
        assert_eq!(api_error_message("  upstream timeout \n"), "upstream timeout");
    }

    #[test]
    fn test_missing_api_key() {
        let err = LlmClient::new(LlmConfig::default()).err().unwrap();
        assert!(matches!(err, LlmError::MissingApiKey(LlmProvider::Gemini)));
        assert!(err.to_string().contains("GOOGLE_API_KEY"));

        let config = LlmConfig {
            provider: LlmProvider::Ollama,
            ..LlmConfig::default()
        };
        assert!(LlmClient::new(config).is_ok());
    }
}
