//! Confab CLI — chat with your documentation from the terminal.

use anyhow::{Context, Result};
use clap::Parser;
use confab_api::ApiClient;
use confab_config::{CliOverrides, ConfabConfig};
use confab_core::{ChatSession, FALLBACK_ANSWER, IgnoreReason, SessionEvent};
use confab_session::{JsonFileStore, MemoryStore, TranscriptStore};
use std::io::{self, BufRead, Write};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "confab", version, about = "Chat with your documentation from the terminal")]
struct Cli {
    /// Ask a single question and print the answer (non-interactive)
    #[arg(short, long)]
    print: Option<String>,

    /// Base URL of the question-answering service
    #[arg(long)]
    base_url: Option<String>,

    /// Keep the conversation in memory only; the saved history is untouched
    #[arg(long)]
    ephemeral: bool,

    /// Enable verbose/debug logging
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(io::stderr)
        .init();

    let config = ConfabConfig::load(CliOverrides {
        base_url: cli.base_url,
    })
    .map_err(|e| anyhow::anyhow!("{e}"))?;

    let client = ApiClient::new(&config.base_url).context("Failed to create API client")?;

    let store: Arc<dyn TranscriptStore> = if cli.ephemeral {
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(
            JsonFileStore::new(config.config_dir.clone())
                .await
                .context("Failed to open the history store")?,
        )
    };

    let session = ChatSession::open(Arc::new(client.clone()), store).await;

    if let Some(question) = cli.print {
        // Print mode: single question, answer on stdout, exit
        return print_mode(&session, &question).await;
    }

    repl(&session, &client, &config).await
}

/// One-shot mode. Exits non-zero when the reply is the failure placeholder
/// so scripts can tell a real answer from an apology.
async fn print_mode(session: &ChatSession, question: &str) -> Result<()> {
    let mut failed = false;
    session
        .submit(question, |event| match event {
            SessionEvent::Answer { content, sources } => {
                println!("{content}");
                print_sources(&sources);
            }
            SessionEvent::Failure { detail } => {
                eprintln!("Error: {detail}");
                failed = true;
            }
            SessionEvent::Ignored { .. } => {
                eprintln!("Nothing to ask.");
                failed = true;
            }
            SessionEvent::Question { .. } | SessionEvent::Discarded => {}
        })
        .await;

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

async fn repl(session: &ChatSession, client: &ApiClient, config: &ConfabConfig) -> Result<()> {
    let stdin = io::stdin();

    let restored = session.messages().len();
    eprintln!(
        "confab v{} (service: {})",
        env!("CARGO_PKG_VERSION"),
        config.base_url
    );
    if restored > 0 {
        eprintln!("Restored {restored} messages from your last conversation. /clear starts fresh.");
    } else {
        print_suggestions();
    }
    eprintln!("Type a question, or /help for commands. Press Ctrl+D to exit.\n");

    loop {
        eprint!("> ");
        io::stderr().flush()?;

        let mut input = String::new();
        let bytes_read = stdin.lock().read_line(&mut input)?;
        if bytes_read == 0 {
            eprintln!();
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        // Handle slash commands
        if let Some(handled) = handle_slash_command(input, session, client).await {
            match handled {
                SlashResult::Continue => continue,
                SlashResult::Break => break,
                SlashResult::Unknown => {
                    eprintln!("Unknown command: {input}. Type /help for available commands.");
                    continue;
                }
            }
        }

        submit_and_render(session, input).await;
        println!();
    }

    Ok(())
}

enum SlashResult {
    Continue,
    Break,
    Unknown,
}

async fn handle_slash_command(
    input: &str,
    session: &ChatSession,
    client: &ApiClient,
) -> Option<SlashResult> {
    if !input.starts_with('/') {
        return None;
    }

    match input {
        "/quit" | "/exit" => Some(SlashResult::Break),
        "/clear" => {
            session.clear().await;
            eprintln!("Conversation cleared.");
            Some(SlashResult::Continue)
        }
        "/ingest" => {
            handle_ingest(client).await;
            Some(SlashResult::Continue)
        }
        "/health" => {
            handle_health(client).await;
            Some(SlashResult::Continue)
        }
        "/stats" => {
            handle_stats(client).await;
            Some(SlashResult::Continue)
        }
        "/help" => {
            print_help();
            Some(SlashResult::Continue)
        }
        _ => Some(SlashResult::Unknown),
    }
}

/// Submit a question and render its lifecycle to the terminal: answer text
/// on stdout, everything else on stderr.
async fn submit_and_render(session: &ChatSession, question: &str) {
    session
        .submit(question, |event| match event {
            SessionEvent::Question { .. } => {
                eprintln!("Thinking...");
            }
            SessionEvent::Answer { content, sources } => {
                println!("{content}");
                print_sources(&sources);
            }
            SessionEvent::Failure { detail } => {
                tracing::debug!("Ask failed: {detail}");
                println!("{FALLBACK_ANSWER}");
            }
            SessionEvent::Ignored {
                reason: IgnoreReason::RequestInFlight,
            } => {
                eprintln!("Hold on, still answering the previous question.");
            }
            SessionEvent::Ignored { .. } | SessionEvent::Discarded => {}
        })
        .await;
}

async fn handle_ingest(client: &ApiClient) {
    eprintln!("Re-ingesting the document folder. This can take a while...");
    match client.trigger_ingest().await {
        Ok(report) => {
            eprintln!(
                "Ingestion complete: {} files, {} chunks in {:.2}s.",
                report.files, report.chunks, report.elapsed_seconds
            );
        }
        Err(e) => {
            eprintln!("Ingestion failed: {e}");
        }
    }
}

async fn handle_health(client: &ApiClient) {
    match client.health().await {
        Ok(health) if health.is_ok() => eprintln!("Service is up."),
        Ok(health) => eprintln!("Service reports status: {}", health.status),
        Err(e) => eprintln!("Service is unreachable: {e}"),
    }
}

async fn handle_stats(client: &ApiClient) {
    match client.stats().await {
        Ok(stats) => {
            eprintln!(
                "Indexed: {} documents, {} chunks.",
                stats.documents, stats.chunks
            );
            if !stats.files.is_empty() {
                eprintln!("Files:");
                for file in &stats.files {
                    eprintln!("  {file}");
                }
            }
        }
        Err(e) => {
            eprintln!("Failed to fetch stats: {e}");
        }
    }
}

/// Print citation sources as a compact, de-duplicated file list.
fn print_sources(sources: &[String]) {
    if sources.is_empty() {
        return;
    }
    let mut names: Vec<&str> = Vec::new();
    for source in sources {
        let name = source.rsplit('/').next().unwrap_or(source.as_str());
        if !names.contains(&name) {
            names.push(name);
        }
    }
    eprintln!("  sources: {}", names.join(", "));
}

fn print_suggestions() {
    eprintln!("Try asking:");
    for suggestion in [
        "How do I configure the development environment?",
        "What are the system requirements?",
        "How do I deploy the application?",
        "Where do I find the logs?",
    ] {
        eprintln!("  {suggestion}");
    }
}

fn print_help() {
    eprintln!("Available commands:");
    eprintln!("  /help     — Show this help");
    eprintln!("  /clear    — Clear the conversation and its saved history");
    eprintln!("  /ingest   — Re-ingest the service's document folder");
    eprintln!("  /health   — Check that the service is up");
    eprintln!("  /stats    — Show what the service has indexed");
    eprintln!("  /quit     — Exit (also /exit or Ctrl+D)");
    eprintln!();
    eprintln!("Flags:");
    eprintln!("  --print <QUESTION>  — Ask one question and exit");
    eprintln!("  --ephemeral         — Don't read or write the saved history");
}
