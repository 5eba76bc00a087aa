//! Command-line interface.
//!
//! Parses arguments and dispatches to the interactive REPL or a one-shot
//! command.

mod commands;
mod helpers;
mod repl;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;

use helpers::GlobalOptions;

#[derive(Parser)]
#[command(name = "sqlchat")]
#[command(about = "Ask questions of a SQL Server database in plain language")]
#[command(version)]
pub struct Cli {
    /// Config file path (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// LLM model (overrides config and LLM_MODEL)
    #[arg(long, global = true)]
    model: Option<String>,

    /// LLM endpoint URL (overrides config and LLM_ENDPOINT)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat session (default)
    Chat,

    /// Answer one natural-language question
    Ask {
        /// Question to answer
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },

    /// Answer one question using table names only, without retries
    Direct {
        /// Question to answer
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },

    /// Run one SELECT statement
    Sql {
        /// Statement to run
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },

    /// Check a statement against the sanitizer without running it
    Check {
        /// Statement to check
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },

    /// List usable tables
    Tables,

    /// Print the schema text given to the LLM
    Schema,

    /// Show the effective configuration
    Config {
        /// Print the connection string with the password in clear text
        #[arg(long)]
        show_password: bool,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let options = GlobalOptions {
        config: cli.config,
        model: cli.model,
        endpoint: cli.endpoint,
    };

    let result = match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => repl::cmd_chat(&options).await,
        Commands::Ask { question } => commands::cmd_ask(&options, &question.join(" ")).await,
        Commands::Direct { question } => commands::cmd_direct(&options, &question.join(" ")).await,
        Commands::Sql { query } => commands::cmd_sql(&options, &query.join(" ")).await,
        Commands::Check { query } => commands::cmd_check(&query.join(" ")),
        Commands::Tables => commands::cmd_tables(&options).await,
        Commands::Schema => commands::cmd_schema(&options).await,
        Commands::Config { show_password } => commands::cmd_config(&options, show_password).await,
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", style("✗").red(), e);
        std::process::exit(1);
    }
    Ok(())
}
