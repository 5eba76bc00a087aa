//! Shared setup and output helpers for CLI commands.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use console::{style, Term};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use sqlchat::chat::{Answer, Retry};
use sqlchat::db::SqlServer;
use sqlchat::llm::LlmClient;
use sqlchat::{Chatbot, Config};

/// Options every command shares.
pub struct GlobalOptions {
    pub config: Option<PathBuf>,
    pub model: Option<String>,
    pub endpoint: Option<String>,
}

impl GlobalOptions {
    /// Load configuration with command-line overrides applied.
    pub async fn load(&self) -> anyhow::Result<Config> {
        let mut config = Config::load(self.config.as_deref())
            .await
            .context("Failed to load configuration")?;
        if let Some(ref model) = self.model {
            config.llm = config.llm.with_model(model);
        }
        if let Some(ref endpoint) = self.endpoint {
            config.llm = config.llm.with_endpoint(endpoint);
        }
        Ok(config)
    }

    /// Load configuration and make sure a database is named.
    pub async fn load_validated(&self) -> anyhow::Result<Config> {
        let config = self.load().await?;
        config.validate()?;
        Ok(config)
    }
}

fn new_spinner(message: impl Into<String>) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(message.into());
    pb
}

/// Spinner shown while waiting on the LLM or the database.
pub fn spinner(message: impl Into<String>) -> ProgressBar {
    let pb = new_spinner(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Spinner drawn through `progress`, so lines printed there stay above it.
pub fn attached_spinner(progress: &MultiProgress, message: impl Into<String>) -> ProgressBar {
    let pb = progress.add(new_spinner(message));
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Print a line above any running spinner.
pub fn print_above(progress: &MultiProgress, line: &str) {
    if !Term::stderr().is_term() || progress.println(line).is_err() {
        eprintln!("{}", line);
    }
}

/// Lines announcing a failed attempt and the corrected SQL.
pub fn retry_lines(retry: &Retry) -> [String; 2] {
    [
        format!(
            "{} Attempt {} failed: {}",
            style("!").yellow(),
            retry.attempt,
            retry.error
        ),
        format!("🔄 Retry {}: {}", retry.attempt + 1, style(&retry.sql).yellow()),
    ]
}

/// Open the database connection.
pub async fn connect(config: &Config) -> anyhow::Result<SqlServer> {
    let pb = spinner(format!("Connecting to {}...", config.database.server));
    let result = SqlServer::connect(&config.database).await;
    pb.finish_and_clear();

    let db = result.context("Database connection failed")?;
    println!(
        "{} Connected to database {}",
        style("✓").green(),
        style(db.database()).cyan()
    );
    Ok(db)
}

/// Connect, load the schema and build a chatbot that reports retries
/// through `progress`.
pub async fn build_chatbot(config: Config, progress: &MultiProgress) -> anyhow::Result<Chatbot> {
    let llm = LlmClient::new(config.llm.clone()).context("Failed to set up LLM client")?;
    let db = connect(&config).await?;

    let pb = spinner("Loading schema...");
    let schema = db.schema_info().await;
    pb.finish_and_clear();
    let schema = schema.context("Failed to load database schema")?;

    let progress = progress.clone();
    let chatbot = Chatbot::new(Arc::new(llm), Arc::new(db), schema, config.chat).on_retry(
        move |retry| {
            for line in retry_lines(retry) {
                print_above(&progress, &line);
            }
        },
    );
    Ok(chatbot)
}

/// Print an answer with its SQL.
pub fn print_answer(answer: &Answer) {
    if let Some(sql) = answer.sql() {
        println!("\n📝 SQL: {}", style(sql).yellow());
    }
    if answer.is_error() {
        println!("\n{} {}", style("✗").red(), style(answer).red());
    } else {
        println!("\n💡 Answer: {}", answer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_lines() {
        console::set_colors_enabled(false);
        let retry = Retry {
            attempt: 2,
            error: "Invalid column name 'x'.".to_string(),
            sql: "SELECT y FROM t".to_string(),
        };
        let [failed, next] = retry_lines(&retry);
        assert_eq!(failed, "! Attempt 2 failed: Invalid column name 'x'.");
        assert_eq!(next, "🔄 Retry 3: SELECT y FROM t");
    }

    #[tokio::test]
    async fn test_overrides_replace_model_and_endpoint() {
        let options = GlobalOptions {
            config: None,
            model: Some("qwen2.5-coder:7b".to_string()),
            endpoint: Some("http://gpu-box:11434/".to_string()),
        };
        let config = options.load().await.unwrap();
        assert_eq!(config.llm.model(), "qwen2.5-coder:7b");
        assert_eq!(config.llm.endpoint(), "http://gpu-box:11434");
    }
}
