//! LLM client configuration.

use serde::{Deserialize, Serialize};

/// LLM provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Google Generative Language API (default)
    #[default]
    Gemini,
    /// Ollama API (local)
    Ollama,
    /// OpenAI-compatible API (OpenAI, Groq, Together.ai, etc.)
    OpenAI,
}

impl LlmProvider {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "gemini" | "google" => Some(Self::Gemini),
            "ollama" => Some(Self::Ollama),
            "openai" | "groq" | "together" => Some(Self::OpenAI),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Ollama => "ollama",
            Self::OpenAI => "openai",
        }
    }

    pub fn default_endpoint(&self) -> &'static str {
        match self {
            Self::Gemini => "https://generativelanguage.googleapis.com",
            Self::Ollama => "http://localhost:11434",
            Self::OpenAI => "https://api.openai.com",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Gemini => "gemma-3-4b-it",
            Self::Ollama => "llama3.2",
            Self::OpenAI => "gpt-4o-mini",
        }
    }

    /// Environment variable holding this provider's API key.
    pub fn api_key_var(&self) -> Option<&'static str> {
        match self {
            Self::Gemini => Some("GOOGLE_API_KEY"),
            Self::Ollama => None,
            Self::OpenAI => Some("OPENAI_API_KEY"),
        }
    }
}

/// Configuration for LLM client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProvider,
    /// API endpoint (provider default when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Model name (provider default when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Temperature for generation; 0 keeps SQL output deterministic
    #[serde(default)]
    pub temperature: f32,
    /// Maximum tokens in response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            endpoint: None,
            api_key: None,
            model: None,
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LlmConfig {
    /// Apply overrides from environment-style variables.
    ///
    /// Supported variables:
    /// - `LLM_PROVIDER`: "gemini" (default), "ollama", "openai", "groq" or "together"
    /// - `LLM_ENDPOINT`: API endpoint
    /// - `LLM_API_KEY`: API key; wins over the provider-specific key
    /// - `GOOGLE_API_KEY` / `OPENAI_API_KEY`: provider-specific keys
    /// - `LLM_MODEL`, `LLM_TEMPERATURE`, `LLM_MAX_TOKENS`, `LLM_TIMEOUT_SECS`
    pub fn with_overrides_from<F>(mut self, var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(provider) = var("LLM_PROVIDER").and_then(|v| LlmProvider::from_str(&v)) {
            self.provider = provider;
        }
        if let Some(endpoint) = var("LLM_ENDPOINT") {
            self.endpoint = Some(endpoint);
        }

        if let Some(key) = var("LLM_API_KEY") {
            self.api_key = Some(key);
        } else if self.api_key.is_none() {
            self.api_key = self.provider.api_key_var().and_then(&var);
        }

        if let Some(model) = var("LLM_MODEL") {
            self.model = Some(model);
        }
        if let Some(t) = var("LLM_TEMPERATURE").and_then(|v| v.parse().ok()) {
            self.temperature = t;
        }
        if let Some(n) = var("LLM_MAX_TOKENS").and_then(|v| v.parse().ok()) {
            self.max_tokens = n;
        }
        if let Some(n) = var("LLM_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.timeout_secs = n;
        }
        self
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = Some(endpoint.to_string());
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = Some(model.to_string());
        self
    }

    /// Endpoint without a trailing slash.
    pub fn endpoint(&self) -> &str {
        self.endpoint
            .as_deref()
            .unwrap_or(self.provider.default_endpoint())
            .trim_end_matches('/')
    }

    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or(self.provider.default_model())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn with_vars(pairs: &[(&str, &str)]) -> LlmConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        LlmConfig::default().with_overrides_from(|k| vars.get(k).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = LlmConfig::default();
        assert_eq!(config.provider, LlmProvider::Gemini);
        assert_eq!(config.model(), "gemma-3-4b-it");
        assert_eq!(config.temperature, 0.0);
        assert_eq!(
            config.endpoint(),
            "https://generativelanguage.googleapis.com"
        );
    }

    #[test]
    fn test_google_api_key_is_picked_up() {
        let config = with_vars(&[("GOOGLE_API_KEY", "g-key"), ("OPENAI_API_KEY", "o-key")]);
        assert_eq!(config.api_key.as_deref(), Some("g-key"));
    }

    #[test]
    fn test_provider_selects_matching_key() {
        let config = with_vars(&[
            ("LLM_PROVIDER", "groq"),
            ("GOOGLE_API_KEY", "g-key"),
            ("OPENAI_API_KEY", "o-key"),
        ]);
        assert_eq!(config.provider, LlmProvider::OpenAI);
        assert_eq!(config.api_key.as_deref(), Some("o-key"));
        assert_eq!(config.model(), "gpt-4o-mini");
    }

    #[test]
    fn test_explicit_key_wins() {
        let config = with_vars(&[("LLM_API_KEY", "explicit"), ("GOOGLE_API_KEY", "g-key")]);
        assert_eq!(config.api_key.as_deref(), Some("explicit"));
    }

    #[test]
    fn test_ollama_needs_no_key() {
        let config = with_vars(&[("LLM_PROVIDER", "ollama"), ("GOOGLE_API_KEY", "g-key")]);
        assert_eq!(config.api_key, None);
        assert_eq!(config.endpoint(), "http://localhost:11434");
    }

    #[test]
    fn test_numeric_overrides() {
        let config = with_vars(&[
            ("LLM_TEMPERATURE", "0.2"),
            ("LLM_MAX_TOKENS", "256"),
            ("LLM_TIMEOUT_SECS", "not-a-number"),
        ]);
        assert!((config.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.max_tokens, 256);
        assert_eq!(config.timeout_secs, 120);
    }

    #[test]
    fn test_endpoint_trailing_slash() {
        let config = LlmConfig::default().with_endpoint("http://gpu-box:11434/");
        assert_eq!(config.endpoint(), "http://gpu-box:11434");
    }

    #[test]
    fn test_unknown_provider_keeps_default() {
        assert_eq!(LlmProvider::from_str("claude"), None);
        let config = with_vars(&[("LLM_PROVIDER", "claude")]);
        assert_eq!(config.provider, LlmProvider::Gemini);
    }
}
