//! Results of running a query and of a whole chat turn.

use std::fmt;

use crate::db::QueryOutput;
use crate::sanitize::SanitizeError;

/// Message used when a statement succeeds without returning rows.
pub const NO_ROWS_MESSAGE: &str = "Query executed but returned no rows.";

/// Terminal state of [`super::Chatbot::execute_with_retry`].
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Rows {
        sql: String,
        output: QueryOutput,
        attempts: u32,
    },
    Empty {
        sql: String,
        attempts: u32,
    },
    /// Refused by the sanitizer; never sent to the database
    Rejected {
        sql: String,
        error: SanitizeError,
        attempts: u32,
    },
    /// Every attempt failed
    Failed {
        sql: String,
        error: String,
        attempts: u32,
    },
}

impl QueryOutcome {
    /// The last SQL tried.
    pub fn sql(&self) -> &str {
        match self {
            Self::Rows { sql, .. }
            | Self::Empty { sql, .. }
            | Self::Rejected { sql, .. }
            | Self::Failed { sql, .. } => sql,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::Rows { attempts, .. }
            | Self::Empty { attempts, .. }
            | Self::Rejected { attempts, .. }
            | Self::Failed { attempts, .. } => *attempts,
        }
    }

    /// Whether the query ran, with or without rows.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Rows { .. } | Self::Empty { .. })
    }

    /// Text form with at most `max_rows` rows rendered.
    pub fn render(&self, max_rows: usize) -> String {
        match self {
            Self::Rows { output, .. } => output.render(max_rows),
            other => other.to_string(),
        }
    }

    /// Convert to an answer that shows the result itself.
    pub fn into_answer(self, max_rows: usize) -> Answer {
        match self {
            Self::Rows { sql, output, .. } => Answer::Results {
                sql,
                output: output.render(max_rows),
            },
            Self::Empty { sql, .. } => Answer::NoRows { sql },
            Self::Rejected { sql, error, .. } => Answer::Rejected {
                reason: format!("Security validation failed: {}", error),
                sql,
            },
            Self::Failed {
                sql,
                error,
                attempts,
            } => Answer::Failed {
                sql,
                error,
                attempts,
            },
        }
    }
}

impl fmt::Display for QueryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rows { output, .. } => write!(f, "{}", output),
            Self::Empty { .. } => f.write_str(NO_ROWS_MESSAGE),
            Self::Rejected { error, .. } => write!(f, "Security validation failed: {}", error),
            Self::Failed {
                error, attempts, ..
            } => write!(f, "{}", failure_message(*attempts, error)),
        }
    }
}

fn failure_message(attempts: u32, error: &str) -> String {
    if attempts <= 1 {
        format!("SQL Error: {}", error)
    } else {
        format!("Query failed after {} attempts. Error: {}", attempts, error)
    }
}

/// What one chat turn prints.
#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    /// Natural-language reading of the result
    Explained { sql: String, explanation: String },
    /// Rendered result rows
    Results { sql: String, output: String },
    NoRows { sql: String },
    /// Not executed
    Rejected { sql: String, reason: String },
    Failed {
        sql: String,
        error: String,
        attempts: u32,
    },
}

impl Answer {
    /// SQL behind this answer, if any was produced.
    pub fn sql(&self) -> Option<&str> {
        let sql = match self {
            Self::Explained { sql, .. }
            | Self::Results { sql, .. }
            | Self::NoRows { sql }
            | Self::Rejected { sql, .. }
            | Self::Failed { sql, .. } => sql,
        };
        Some(sql.as_str()).filter(|s| !s.is_empty())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Rejected { .. } | Self::Failed { .. })
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explained { explanation, .. } => f.write_str(explanation),
            Self::Results { output, .. } => f.write_str(output),
            Self::NoRows { .. } => f.write_str(NO_ROWS_MESSAGE),
            Self::Rejected { reason, .. } => f.write_str(reason),
            Self::Failed {
                error, attempts, ..
            } => f.write_str(&failure_message(*attempts, error)),
        }
    }
}
