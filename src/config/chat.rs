//! Chat loop settings.

use serde::{Deserialize, Serialize};

use super::parse_bool;

/// Settings for query generation, retries and output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Total execution attempts per question, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Ask the LLM to explain results in natural language
    #[serde(default = "default_explain")]
    pub explain: bool,
    /// Rows rendered before output is cut
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,
    /// Custom SQL dialect rules appended to every generation prompt
    #[serde(default)]
    pub rules: Option<String>,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_explain() -> bool {
    true
}

fn default_max_rows() -> usize {
    200
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            explain: default_explain(),
            max_rows: default_max_rows(),
            rules: None,
        }
    }
}

impl ChatConfig {
    /// Apply overrides from `SQLCHAT_*` variables.
    pub fn with_overrides_from<F>(mut self, var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(n) = var("SQLCHAT_MAX_ATTEMPTS").and_then(|v| v.parse().ok()) {
            self.max_attempts = n;
        }
        if let Some(flag) = var("SQLCHAT_EXPLAIN").and_then(|v| parse_bool(&v)) {
            self.explain = flag;
        }
        if let Some(n) = var("SQLCHAT_MAX_ROWS").and_then(|v| v.parse().ok()) {
            self.max_rows = n;
        }
        if let Some(rules) = var("SQLCHAT_RULES") {
            self.rules = Some(rules);
        }
        self
    }

    /// Attempt budget, never below one.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}
