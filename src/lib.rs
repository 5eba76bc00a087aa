//! sqlchat - ask questions of a SQL Server database in plain language.
//!
//! An LLM turns each question into T-SQL, the query is checked by a
//! SELECT-only sanitizer and executed, failures are fed back to the LLM for
//! correction, and the result is explained in natural language.

pub mod chat;
pub mod config;
pub mod db;
pub mod llm;
pub mod sanitize;

pub use chat::{Answer, ChatError, Chatbot, QueryOutcome, Request};
pub use config::Config;
