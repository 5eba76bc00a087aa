//! Natural-language question answering over SQL.
//!
//! A turn generates SQL with the LLM, runs it through the sanitizer and the
//! database, feeds failures back to the LLM for correction within a fixed
//! attempt budget, and finally asks the LLM to explain the result.

mod outcome;
pub mod prompts;
mod request;

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::ChatConfig;
use crate::db::{DbError, QueryRunner};
use crate::llm::{Completion, LlmError};
use crate::sanitize::sanitize_sql;

pub use outcome::{Answer, QueryOutcome, NO_ROWS_MESSAGE};
pub use prompts::strip_code_fences;
pub use request::Request;

/// Errors that end a chat turn.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
    #[error("Database error: {0}")]
    Db(#[from] DbError),
}

/// A failed attempt that is about to be retried with corrected SQL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retry {
    /// Number of the attempt that failed
    pub attempt: u32,
    pub error: String,
    /// SQL the LLM proposed for the next attempt
    pub sql: String,
}

type RetryHook = Box<dyn Fn(&Retry) + Send + Sync>;

/// Answers questions against one database.
pub struct Chatbot {
    llm: Arc<dyn Completion>,
    db: Arc<dyn QueryRunner>,
    schema: String,
    config: ChatConfig,
    on_retry: Option<RetryHook>,
}

impl Chatbot {
    pub fn new(
        llm: Arc<dyn Completion>,
        db: Arc<dyn QueryRunner>,
        schema: String,
        config: ChatConfig,
    ) -> Self {
        Self {
            llm,
            db,
            schema,
            config,
            on_retry: None,
        }
    }

    /// Call `hook` each time a failed attempt is about to be retried.
    pub fn on_retry(mut self, hook: impl Fn(&Retry) + Send + Sync + 'static) -> Self {
        self.on_retry = Some(Box::new(hook));
        self
    }

    /// Usable table names.
    pub async fn table_names(&self) -> Result<Vec<String>, ChatError> {
        Ok(self.db.table_names().await?)
    }

    fn rules(&self) -> &str {
        self.config
            .rules
            .as_deref()
            .unwrap_or(prompts::SQL_SERVER_RULES)
    }

    /// Dispatch one parsed input line. `Empty` produces no answer.
    pub async fn handle(&self, request: Request) -> Result<Option<Answer>, ChatError> {
        let answer = match request {
            Request::Empty => return Ok(None),
            Request::Ask(question) => self.ask(&question).await?,
            Request::Direct(question) => self.ask_direct(&question).await?,
            Request::Raw(sql) => self.run_raw(&sql).await,
        };
        Ok(Some(answer))
    }

    /// Ask the LLM for SQL answering `question`.
    pub async fn generate_sql(&self, question: &str) -> Result<String, ChatError> {
        let prompt = prompts::generation_prompt(question, &self.schema, self.rules());
        debug!("Generation prompt: {}", prompt);
        let sql = strip_code_fences(&self.llm.complete(&prompt).await?);
        info!("Generated SQL: {}", sql);
        Ok(sql)
    }

    /// Sanitize and execute `sql`, asking the LLM to fix it after each
    /// database failure until the attempt budget runs out.
    ///
    /// Sanitizer rejections end the loop immediately.
    pub async fn execute_with_retry(
        &self,
        sql: &str,
        question: &str,
    ) -> Result<QueryOutcome, ChatError> {
        let max_attempts = self.config.attempts();
        let mut sql = sql.to_string();
        let mut attempt = 1;

        loop {
            let safe_sql = match sanitize_sql(&sql) {
                Ok(safe_sql) => safe_sql,
                Err(error) => {
                    warn!("Security validation failed: {}", error);
                    return Ok(QueryOutcome::Rejected {
                        sql,
                        error,
                        attempts: attempt,
                    });
                }
            };

            let error = match self.db.run(&safe_sql).await {
                Ok(output) if output.is_empty() => {
                    return Ok(QueryOutcome::Empty {
                        sql: safe_sql,
                        attempts: attempt,
                    })
                }
                Ok(output) => {
                    return Ok(QueryOutcome::Rows {
                        sql: safe_sql,
                        output,
                        attempts: attempt,
                    })
                }
                Err(e) => e.to_string(),
            };

            if attempt >= max_attempts {
                return Ok(QueryOutcome::Failed {
                    sql: safe_sql,
                    error,
                    attempts: attempt,
                });
            }

            info!("Attempt {} failed: {}", attempt, error);
            let prompt = prompts::correction_prompt(
                &safe_sql,
                &error,
                question,
                &self.schema,
                self.rules(),
            );
            sql = strip_code_fences(&self.llm.complete(&prompt).await?);
            info!("Retry {}: {}", attempt + 1, sql);

            if let Some(hook) = &self.on_retry {
                hook(&Retry {
                    attempt,
                    error,
                    sql: sql.clone(),
                });
            }
            attempt += 1;
        }
    }

    /// Ask the LLM to explain a result in natural language.
    pub async fn explain(
        &self,
        question: &str,
        sql: &str,
        result: &str,
    ) -> Result<String, ChatError> {
        let prompt = prompts::explanation_prompt(question, sql, result);
        Ok(self.llm.complete(&prompt).await?.trim().to_string())
    }

    /// Full pipeline: generate, execute with retry, explain.
    pub async fn ask(&self, question: &str) -> Result<Answer, ChatError> {
        let sql = self.generate_sql(question).await?;
        let outcome = self.execute_with_retry(&sql, question).await?;

        if !outcome.is_success() || !self.config.explain {
            return Ok(outcome.into_answer(self.config.max_rows));
        }

        let result = outcome.render(self.config.max_rows);
        let explanation = self.explain(question, outcome.sql(), &result).await?;
        Ok(Answer::Explained {
            sql: outcome.sql().to_string(),
            explanation,
        })
    }

    /// Generate SQL from table names alone and run it once.
    pub async fn ask_direct(&self, question: &str) -> Result<Answer, ChatError> {
        let tables = self.table_names().await?;
        let prompt = prompts::direct_prompt(question, &tables);
        let sql = strip_code_fences(&self.llm.complete(&prompt).await?);
        info!("Generated SQL: {}", sql);

        if !sql.to_uppercase().starts_with("SELECT") {
            return Ok(Answer::Rejected {
                sql,
                reason: "Generated query is not a SELECT statement".to_string(),
            });
        }
        Ok(self.run_once(&sql).await)
    }

    /// Run user-typed SQL once, without correction.
    pub async fn run_raw(&self, sql: &str) -> Answer {
        self.run_once(sql).await
    }

    async fn run_once(&self, sql: &str) -> Answer {
        let safe_sql = match sanitize_sql(sql) {
            Ok(safe_sql) => safe_sql,
            Err(error) => {
                return Answer::Rejected {
                    sql: sql.trim().to_string(),
                    reason: error.to_string(),
                }
            }
        };

        match self.db.run(&safe_sql).await {
            Ok(output) if output.is_empty() => Answer::NoRows { sql: safe_sql },
            Ok(output) => Answer::Results {
                sql: safe_sql,
                output: output.render(self.config.max_rows),
            },
            Err(e) => Answer::Failed {
                sql: safe_sql,
                error: e.to_string(),
                attempts: 1,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::QueryOutput;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replies with queued responses and records every prompt.
    #[derive(Default)]
    struct ScriptedLlm {
        replies: Mutex<VecDeque<String>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedLlm {
        fn new(replies: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Completion for ScriptedLlm {
        async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| LlmError::Connection("no scripted reply".to_string()))
        }
    }

    /// Returns queued results and records every statement.
    #[derive(Default)]
    struct ScriptedDb {
        results: Mutex<VecDeque<Result<QueryOutput, DbError>>>,
        executed: Mutex<Vec<String>>,
        tables: Vec<String>,
    }

    impl ScriptedDb {
        fn new(results: Vec<Result<QueryOutput, DbError>>) -> Arc<Self> {
            Arc::new(Self {
                results: Mutex::new(results.into()),
                executed: Mutex::new(Vec::new()),
                tables: vec!["Customers".to_string(), "Orders".to_string()],
            })
        }

        fn executed(&self) -> Vec<String> {
            self.executed.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl QueryRunner for ScriptedDb {
        async fn run(&self, sql: &str) -> Result<QueryOutput, DbError> {
            self.executed.lock().unwrap().push(sql.to_string());
            self.results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(DbError::Query("no scripted result".to_string())))
        }

        async fn table_names(&self) -> Result<Vec<String>, DbError> {
            Ok(self.tables.clone())
        }
    }

    fn query_error(message: &str) -> Result<QueryOutput, DbError> {
        Err(DbError::Query(message.to_string()))
    }

    fn rows(values: &[&str]) -> QueryOutput {
        QueryOutput::new(
            vec!["name".to_string()],
            values.iter().map(|v| vec![Some(v.to_string())]).collect(),
        )
    }

    fn bot(llm: &Arc<ScriptedLlm>, db: &Arc<ScriptedDb>, config: ChatConfig) -> Chatbot {
        Chatbot::new(llm.clone(), db.clone(), "SCHEMA".to_string(), config)
    }

    #[tokio::test]
    async fn test_ask_explains_result() {
        let llm = ScriptedLlm::new(&[
            "```sql\nSELECT TOP 2 name FROM Customers\n```",
            "  Your first two customers are Ada and Grace.  ",
        ]);
        let db = ScriptedDb::new(vec![Ok(rows(&["Ada", "Grace"]))]);
        let chatbot = bot(&llm, &db, ChatConfig::default());

        let answer = chatbot.ask("who are two customers?").await.unwrap();
        assert_eq!(
            answer,
            Answer::Explained {
                sql: "SELECT TOP 2 name FROM Customers".to_string(),
                explanation: "Your first two customers are Ada and Grace.".to_string(),
            }
        );
        assert_eq!(db.executed(), vec!["SELECT TOP 2 name FROM Customers"]);

        let prompts = llm.prompts();
        assert!(prompts[0].contains("SCHEMA"));
        assert!(prompts[0].contains("\"who are two customers?\""));
        assert!(prompts[1].contains("Ada"));
    }

    #[tokio::test]
    async fn test_ask_without_explanation_returns_rows() {
        let llm = ScriptedLlm::new(&["SELECT name FROM Customers"]);
        let db = ScriptedDb::new(vec![Ok(rows(&["Ada"]))]);
        let config = ChatConfig {
            explain: false,
            ..ChatConfig::default()
        };
        let chatbot = bot(&llm, &db, config);

        let answer = chatbot.ask("customers").await.unwrap();
        assert_eq!(answer.to_string(), "name\n----\nAda");
        assert_eq!(llm.prompts().len(), 1);
    }

    #[tokio::test]
    async fn test_ask_explains_empty_result() {
        let llm = ScriptedLlm::new(&["SELECT name FROM Customers WHERE 1 = 0", "Nobody matched."]);
        let db = ScriptedDb::new(vec![Ok(rows(&[]))]);
        let chatbot = bot(&llm, &db, ChatConfig::default());

        let answer = chatbot.ask("customers from Mars").await.unwrap();
        assert_eq!(answer.to_string(), "Nobody matched.");
        assert!(llm.prompts()[1].contains(NO_ROWS_MESSAGE));
    }

    #[tokio::test]
    async fn test_ask_does_not_explain_rejection() {
        let llm = ScriptedLlm::new(&["DELETE FROM Customers"]);
        let db = ScriptedDb::new(vec![]);
        let chatbot = bot(&llm, &db, ChatConfig::default());

        let answer = chatbot.ask("remove everyone").await.unwrap();
        assert!(answer.is_error());
        assert_eq!(
            answer.to_string(),
            "Security validation failed: Only SELECT statements allowed"
        );
        assert!(db.executed().is_empty());
        assert_eq!(llm.prompts().len(), 1);
    }

    #[tokio::test]
    async fn test_retry_uses_corrected_sql() {
        let llm = ScriptedLlm::new(&[
            "SELECT name FROM Customer",
            "SELECT name FROM Customers",
            "Ada.",
        ]);
        let db = ScriptedDb::new(vec![
            query_error("Invalid object name 'Customer'."),
            Ok(rows(&["Ada"])),
        ]);
        let chatbot = bot(&llm, &db, ChatConfig::default());

        let answer = chatbot.ask("customers").await.unwrap();
        assert_eq!(answer.sql(), Some("SELECT name FROM Customers"));

        let prompts = llm.prompts();
        assert!(prompts[1].starts_with("This SQL query failed: SELECT name FROM Customer"));
        assert!(prompts[1].contains("Invalid object name 'Customer'."));
        assert!(prompts[2].contains("SQL: SELECT name FROM Customers"));
    }

    #[tokio::test]
    async fn test_ask_does_not_explain_final_failure() {
        let llm = ScriptedLlm::new(&[
            "SELECT total FROM Orders",
            "SELECT total FROM dbo.Orders",
            "SELECT Orders.total FROM Orders",
            "unused explanation",
        ]);
        let db = ScriptedDb::new(vec![
            query_error("Invalid column name 'total'."),
            query_error("Invalid column name 'total'."),
            query_error("Invalid column name 'total'."),
        ]);
        let chatbot = bot(&llm, &db, ChatConfig::default());
        assert!(chatbot.config.explain);

        let answer = chatbot.ask("order totals").await.unwrap();
        assert!(answer.is_error());
        assert_eq!(
            answer.to_string(),
            "Query failed after 3 attempts. Error: Invalid column name 'total'."
        );
        assert_eq!(answer.sql(), Some("SELECT Orders.total FROM Orders"));
        assert_eq!(db.executed().len(), 3);

        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 3);
        assert!(prompts[1].starts_with("This SQL query failed:"));
        assert!(prompts[2].starts_with("This SQL query failed:"));
    }

    #[tokio::test]
    async fn test_retry_hook_sees_each_correction() {
        let llm = ScriptedLlm::new(&["SELECT a FROM t", "SELECT b FROM t"]);
        let db = ScriptedDb::new(vec![query_error("bad a"), Ok(rows(&["x"]))]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let config = ChatConfig {
            explain: false,
            ..ChatConfig::default()
        };
        let chatbot = bot(&llm, &db, config).on_retry(move |retry| {
            sink.lock().unwrap().push(retry.clone());
        });

        chatbot.ask("b please").await.unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![Retry {
                attempt: 1,
                error: "bad a".to_string(),
                sql: "SELECT b FROM t".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_llm_failure_during_correction_ends_turn() {
        let llm = ScriptedLlm::new(&["SELECT bad"]);
        let db = ScriptedDb::new(vec![query_error("Invalid column name 'bad'.")]);
        let chatbot = bot(&llm, &db, ChatConfig::default());

        let err = chatbot.ask("anything").await.unwrap_err();
        assert!(matches!(err, ChatError::Llm(_)));
    }

    #[tokio::test]
    async fn test_custom_rules_replace_defaults() {
        let llm = ScriptedLlm::new(&["SELECT 1"]);
        let db = ScriptedDb::new(vec![Ok(rows(&["1"]))]);
        let config = ChatConfig {
            rules: Some("Always alias columns.".to_string()),
            explain: false,
            ..ChatConfig::default()
        };
        let chatbot = bot(&llm, &db, config);

        chatbot.ask("one").await.unwrap();
        let prompt = &llm.prompts()[0];
        assert!(prompt.contains("Always alias columns."));
        assert!(!prompt.contains("STRICT SQL SERVER RULES"));
    }

    #[tokio::test]
    async fn test_direct_mode() {
        let llm = ScriptedLlm::new(&["```\nSELECT COUNT(*) FROM Orders\n```"]);
        let db = ScriptedDb::new(vec![Ok(QueryOutput::new(
            vec![String::new()],
            vec![vec![Some("7".to_string())]],
        ))]);
        let chatbot = bot(&llm, &db, ChatConfig::default());

        let answer = chatbot.ask_direct("how many orders").await.unwrap();
        assert_eq!(answer.sql(), Some("SELECT COUNT(*) FROM Orders"));
        assert!(answer.to_string().ends_with("7"));
        assert!(llm.prompts()[0].contains("Customers, Orders"));
    }

    #[tokio::test]
    async fn test_direct_mode_rejects_non_select() {
        let llm = ScriptedLlm::new(&["I cannot answer that."]);
        let db = ScriptedDb::new(vec![]);
        let chatbot = bot(&llm, &db, ChatConfig::default());

        let answer = chatbot.ask_direct("???").await.unwrap();
        assert_eq!(answer.to_string(), "Generated query is not a SELECT statement");
        assert!(db.executed().is_empty());
    }

    #[tokio::test]
    async fn test_direct_mode_does_not_retry() {
        let llm = ScriptedLlm::new(&["SELECT nope FROM Orders"]);
        let db = ScriptedDb::new(vec![query_error("Invalid column name 'nope'.")]);
        let chatbot = bot(&llm, &db, ChatConfig::default());

        let answer = chatbot.ask_direct("orders").await.unwrap();
        assert_eq!(answer.to_string(), "SQL Error: Invalid column name 'nope'.");
        assert_eq!(llm.prompts().len(), 1);
    }

    #[tokio::test]
    async fn test_raw_mode() {
        let llm = ScriptedLlm::new(&[]);
        let db = ScriptedDb::new(vec![Ok(rows(&["Ada"]))]);
        let chatbot = bot(&llm, &db, ChatConfig::default());

        let answer = chatbot.run_raw("  select name from Customers ").await;
        assert_eq!(answer.sql(), Some("select name from Customers"));
        assert!(!answer.is_error());

        let answer = chatbot.run_raw("DROP TABLE Customers").await;
        assert_eq!(answer.to_string(), "Only SELECT statements allowed");
        assert_eq!(db.executed().len(), 1);
        assert!(llm.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_handle_routes_requests() {
        let llm = ScriptedLlm::new(&[]);
        let db = ScriptedDb::new(vec![Ok(rows(&["Ada"]))]);
        let chatbot = bot(&llm, &db, ChatConfig::default());

        assert_eq!(chatbot.handle(Request::parse("  ")).await.unwrap(), None);
        let answer = chatbot
            .handle(Request::parse("sql: SELECT name FROM Customers"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(answer.to_string(), "name\n----\nAda");
    }
}
