//! Live Feed CLI - a command-line front end for the Live Feed backend.
//!
//! Drives the same session core a mobile UI would: login and signup create
//! a session, every other command runs through the authenticated gateway,
//! and an expired session sends the user back to `livefeed login`.

mod commands;

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use livefeed_core::{Config, SessionController};

#[derive(Parser)]
#[command(name = "livefeed", version, about = "Live Feed command-line client")]
struct Cli {
    /// Backend base URL (overrides config and LIVEFEED_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in with email and password
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    /// Create an account and log in
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        phone: String,
        /// Date of birth, e.g. 1990-12-10
        #[arg(long)]
        date_of_birth: String,
    },
    /// Log out, invalidating the session on the server if reachable
    Logout,
    /// Show whether a session is active
    Status,
    /// List registered users
    Users,
    /// Update profile fields of the logged-in account
    UpdateProfile {
        #[arg(long)]
        name: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        phone: String,
        #[arg(long)]
        date_of_birth: String,
    },
    /// Delete the logged-in account
    DeleteAccount {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Show the linked social feed
    Feed,
    /// Show replies in a conversation
    Replies { conversation_id: String },
    /// Like a post
    Like { post_id: String },
    /// Remove a like
    Unlike { post_id: String },
    /// Reply to a post
    Comment { post_id: String, text: String },
}

/// Initialize the tracing subscriber for logging.
/// Returns a guard that must live until exit when logging to a file.
fn init_tracing(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let stderr_layer = fmt::layer().with_writer(io::stderr).with_target(false);

    match log_file {
        Some(path) => {
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("Invalid log file path: {}", path.display()))?;
            std::fs::create_dir_all(dir)?;
            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .init();
            Ok(None)
        }
    }
}

/// Prompt on stderr and read one trimmed line from stdin
fn prompt(label: &str) -> Result<String> {
    eprint!("{}", label);
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.log_file.as_deref())?;

    let mut config = Config::load()?;
    if let Some(url) = cli.api_url {
        config.api_base_url = url;
    }
    info!(api = %config.api_base_url, "Live Feed CLI starting");

    let controller = SessionController::from_config(&config)?;
    controller.restore().await;

    let result = commands::run(cli.command, &controller, &mut config).await;

    if let Err(ref e) = result {
        if commands::is_session_ended(e) {
            eprintln!("Session expired. Please log in again with `livefeed login`.");
        }
    }
    result
}
