//! LLM integration for SQL generation and result narration.

mod client;

pub use client::{Completion, LlmClient, LlmConfig, LlmError, LlmProvider};
