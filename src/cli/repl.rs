//! Interactive chat session.

use std::future::Future;
use std::io::{self, BufRead, BufReader, Write};

use console::style;
use indicatif::MultiProgress;
use tokio::sync::mpsc;

use sqlchat::chat::Request;

use super::helpers::{attached_spinner, build_chatbot, print_answer, GlobalOptions};

const PROMPT: &str = "❓ Question: ";

fn print_banner(database: &str, tables: &[String]) {
    println!();
    println!("{}", style("🤖 SQL Chatbot").bold().cyan());
    println!("Ask questions about the {} database.", style(database).cyan());
    if !tables.is_empty() {
        println!("📊 Tables: {}", tables.join(", "));
    }
    println!("  {} Type a question in plain language", style("→").dim());
    println!(
        "  {} Prefix with {} to run a SELECT yourself",
        style("→").dim(),
        style("sql:").yellow()
    );
    println!(
        "  {} Prefix with {} to answer from table names only",
        style("→").dim(),
        style("direct:").yellow()
    );
    println!("  {} Press Ctrl+C to exit", style("→").dim());
}

fn show_prompt() -> io::Result<()> {
    print!("\n{}", PROMPT);
    io::stdout().flush()
}

/// Read lines on a plain thread and hand them over a channel.
///
/// The thread is never joined: a read blocked on the terminal must not keep
/// the process alive once the loop has ended. The channel closes at end of
/// input.
fn spawn_line_reader<R>(mut reader: R) -> mpsc::Receiver<io::Result<String>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(1);
    std::thread::spawn(move || loop {
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {
                if tx.blocking_send(Ok(line)).is_err() {
                    break;
                }
            }
            Err(e) => {
                let _ = tx.blocking_send(Err(e));
                break;
            }
        }
    });
    rx
}

#[derive(Debug, PartialEq)]
enum Input {
    Line(String),
    Eof,
    Interrupted,
}

/// Wait for the next line or for `interrupt`, whichever comes first.
async fn next_input<F>(
    lines: &mut mpsc::Receiver<io::Result<String>>,
    interrupt: F,
) -> io::Result<Input>
where
    F: Future,
{
    tokio::select! {
        line = lines.recv() => match line {
            Some(line) => Ok(Input::Line(line?)),
            None => Ok(Input::Eof),
        },
        _ = interrupt => Ok(Input::Interrupted),
    }
}

/// Run the read-eval-print loop until Ctrl+C or end of input.
pub async fn cmd_chat(options: &GlobalOptions) -> anyhow::Result<()> {
    let config = options.load_validated().await?;
    let database = config.database.database_name().unwrap_or_default().to_string();
    let progress = MultiProgress::new();
    let chatbot = build_chatbot(config, &progress).await?;

    let tables = chatbot.table_names().await.unwrap_or_else(|e| {
        tracing::debug!("Could not list tables: {}", e);
        Vec::new()
    });
    print_banner(&database, &tables);

    let mut lines = spawn_line_reader(BufReader::new(io::stdin()));
    loop {
        show_prompt()?;

        let line = match next_input(&mut lines, tokio::signal::ctrl_c()).await? {
            Input::Line(line) => line,
            Input::Eof | Input::Interrupted => {
                println!();
                break;
            }
        };

        let request = Request::parse(&line);
        if request == Request::Empty {
            continue;
        }

        let pb = attached_spinner(&progress, "Thinking...");
        let result = tokio::select! {
            result = chatbot.handle(request) => Some(result),
            _ = tokio::signal::ctrl_c() => None,
        };
        pb.finish_and_clear();
        progress.remove(&pb);

        match result {
            Some(Ok(Some(answer))) => print_answer(&answer),
            Some(Ok(None)) => {}
            Some(Err(e)) => println!("\n{} {}", style("✗").red(), style(e).red()),
            None => {
                println!();
                break;
            }
        }
    }

    println!("{}", style("👋 Goodbye!").bold());
    Ok(())
}
