//! One-shot commands.

use console::style;
use indicatif::MultiProgress;

use sqlchat::chat::Request;
use sqlchat::db::QueryRunner;
use sqlchat::sanitize::sanitize_sql;

use super::helpers::{
    attached_spinner, build_chatbot, connect, print_answer, spinner, GlobalOptions,
};

/// Answer one question through the full pipeline.
pub async fn cmd_ask(options: &GlobalOptions, question: &str) -> anyhow::Result<()> {
    answer(options, Request::Ask(question.trim().to_string())).await
}

/// Answer one question in direct mode.
pub async fn cmd_direct(options: &GlobalOptions, question: &str) -> anyhow::Result<()> {
    answer(options, Request::Direct(question.trim().to_string())).await
}

/// Run one statement typed by the user.
pub async fn cmd_sql(options: &GlobalOptions, query: &str) -> anyhow::Result<()> {
    answer(options, Request::Raw(query.trim().to_string())).await
}

async fn answer(options: &GlobalOptions, request: Request) -> anyhow::Result<()> {
    let config = options.load_validated().await?;
    let progress = MultiProgress::new();
    let chatbot = build_chatbot(config, &progress).await?;

    let pb = attached_spinner(&progress, "Thinking...");
    let result = chatbot.handle(request).await;
    pb.finish_and_clear();

    match result? {
        Some(answer) if answer.is_error() => {
            print_answer(&answer);
            std::process::exit(1);
        }
        Some(answer) => print_answer(&answer),
        None => {}
    }
    Ok(())
}

/// Check a statement against the sanitizer only.
pub fn cmd_check(query: &str) -> anyhow::Result<()> {
    match sanitize_sql(query) {
        Ok(sql) => {
            println!("{} Allowed: {}", style("✓").green(), sql);
            Ok(())
        }
        Err(e) => {
            println!("{} Rejected: {}", style("✗").red(), e);
            std::process::exit(1);
        }
    }
}

/// List usable tables.
pub async fn cmd_tables(options: &GlobalOptions) -> anyhow::Result<()> {
    let config = options.load_validated().await?;
    let db = connect(&config).await?;

    let tables = db.table_names().await?;
    if tables.is_empty() {
        println!("{} No tables found", style("!").yellow());
        return Ok(());
    }

    println!("\n{} tables:", tables.len());
    for table in tables {
        println!("  {} {}", style("→").dim(), table);
    }
    Ok(())
}

/// Print the schema text given to the LLM.
pub async fn cmd_schema(options: &GlobalOptions) -> anyhow::Result<()> {
    let config = options.load_validated().await?;
    let db = connect(&config).await?;

    let pb = spinner("Loading schema...");
    let schema = db.schema_info().await;
    pb.finish_and_clear();

    println!("{}", schema?);
    Ok(())
}

/// Show the effective configuration with secrets masked.
pub async fn cmd_config(options: &GlobalOptions, show_password: bool) -> anyhow::Result<()> {
    let config = options.load().await?;

    println!("{}", style("Configuration").bold());
    let source = config
        .source_path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "defaults and environment".to_string());
    println!("  {} Source: {}", style("→").dim(), source);

    println!("\n{}", style("Database").bold());
    println!("  {} Server: {}", style("→").dim(), config.database.server);
    println!(
        "  {} Database: {}",
        style("→").dim(),
        config.database.database_name().unwrap_or("(not set)")
    );
    let connection = if show_password {
        config.database.connection_string()
    } else {
        config.database.redacted_connection_string()
    };
    match connection {
        Ok(conn) => println!("  {} Connection: {}", style("→").dim(), conn),
        Err(e) => println!("  {} Connection: {}", style("✗").red(), e),
    }
    println!(
        "  {} Sample rows: {}",
        style("→").dim(),
        config.database.sample_rows
    );

    println!("\n{}", style("LLM").bold());
    println!("  {} Provider: {}", style("→").dim(), config.llm.provider.as_str());
    println!("  {} Endpoint: {}", style("→").dim(), config.llm.endpoint());
    println!("  {} Model: {}", style("→").dim(), config.llm.model());
    println!(
        "  {} API key: {}",
        style("→").dim(),
        if config.llm.api_key.is_some() {
            "set"
        } else {
            "not set"
        }
    );

    println!("\n{}", style("Chat").bold());
    println!(
        "  {} Max attempts: {}",
        style("→").dim(),
        config.chat.attempts()
    );
    println!("  {} Explain results: {}", style("→").dim(), config.chat.explain);
    println!("  {} Max rows: {}", style("→").dim(), config.chat.max_rows);

    if let Err(e) = config.validate() {
        println!("\n{} {}", style("!").yellow(), e);
    }
    Ok(())
}
