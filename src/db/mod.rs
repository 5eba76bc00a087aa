//! Database access.
//!
//! [`QueryRunner`] is the seam the chat loop talks to; [`SqlServer`] is the
//! production implementation over TDS.

mod output;
pub mod schema;
mod sqlserver;

use async_trait::async_trait;

pub use output::QueryOutput;
pub use sqlserver::SqlServer;

/// Errors from database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Database configuration error: {0}")]
    Config(String),
    #[error("Connection failed: {0}")]
    Connection(String),
    /// The server rejected or failed the statement
    #[error("{0}")]
    Query(String),
}

/// Executes SQL text and lists the tables it can see.
#[async_trait]
pub trait QueryRunner: Send + Sync {
    /// Run one statement and return its first result set.
    async fn run(&self, sql: &str) -> Result<QueryOutput, DbError>;

    /// Usable table names, `schema.table` outside the default schema.
    async fn table_names(&self) -> Result<Vec<String>, DbError>;
}
