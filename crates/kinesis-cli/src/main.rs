//! kinesis - conversational SRS drafting against a local model server

mod commands;
mod config;
mod export;
mod pdf;
mod printer;

use clap::Parser;
use kinesis_agent::{Session, TurnOutcome};
use kinesis_ai::OllamaClient;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

use commands::Command;
use config::Config;
use export::FileExporter;
use printer::{Output, TurnPrinter};

/// kinesis - draft a Software Requirements Specification by conversation
#[derive(Parser, Debug)]
#[command(name = "kinesis")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Base URL of the Ollama server (default: http://localhost:11434)
    #[arg(short, long)]
    url: Option<String>,

    /// Model to use (default: llama3.2)
    #[arg(short, long)]
    model: Option<String>,

    /// Run in non-interactive mode with a single prompt
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// List models on the server and exit
    #[arg(long)]
    list_models: bool,

    /// Directory exports are written to
    #[arg(long, default_value = ".")]
    export_dir: PathBuf,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr so streamed text on stdout stays clean
    if args.verbose {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("kinesis=debug"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    }

    // Initialize config and exit
    if args.init_config {
        match Config::init() {
            Ok(path) => {
                println!("Config file created at: {}", path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let mut cfg = Config::load();
    let endpoint = cfg.endpoint(args.url, args.model);
    tracing::debug!(base_url = %endpoint.base_url, model = %endpoint.model, "endpoint resolved");

    let client = Arc::new(OllamaClient::new());
    let exporter = Arc::new(FileExporter::new(args.export_dir));
    let mut session = Session::new(endpoint, client, exporter);

    if args.list_models {
        let models = session.list_models().await?;
        println!(
            "{}",
            commands::list_models_text(&session.endpoint().model, &models)
        );
        return Ok(());
    }

    // Non-interactive mode
    if let Some(command) = args.command {
        return run_command(&session, &command).await;
    }

    run_interactive(&mut session, &mut cfg).await
}

async fn run_command(session: &Session, command: &str) -> anyhow::Result<()> {
    println!("kinesis> {}", command);
    println!();

    let printer = spawn_printer(session);
    let result = session.submit(command).await;
    finish_printer(printer).await;
    result?;

    let snapshot = session.snapshot();
    if snapshot.document.is_empty() {
        println!("\n[No document extracted from the reply]");
    } else {
        println!("\n--- Document ({} words) ---\n", snapshot.document_words);
        println!("{}", snapshot.document);
    }

    Ok(())
}

async fn run_interactive(session: &mut Session, cfg: &mut Config) -> anyhow::Result<()> {
    // Show minimal startup info (only if TTY)
    if io::IsTerminal::is_terminal(&io::stderr()) {
        let endpoint = session.endpoint();
        eprintln!("kinesis ({} @ {})", endpoint.model, endpoint.base_url);
        eprintln!("Describe the system you want to specify. /help lists commands.");
        eprintln!();
    }

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            // EOF
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        if let Some(command) = commands::parse_command(input) {
            if !execute_command(command, session, cfg).await {
                break;
            }
            println!();
            continue;
        }

        println!();

        let printer = spawn_printer(session);
        match session.submit(input).await {
            Ok(TurnOutcome::Busy) => println!("A reply is still streaming."),
            Ok(_) => {}
            // Already reported by the printer
            Err(e) => tracing::debug!(error = %e, "turn failed"),
        }
        finish_printer(printer).await;

        println!();
    }

    Ok(())
}

/// Run a slash command. Returns false when the loop should exit.
async fn execute_command(command: Command, session: &mut Session, cfg: &mut Config) -> bool {
    match command {
        Command::Help => println!("{}", commands::help_message()),

        Command::Reset => {
            session.reset();
            println!("Cleared conversation and document.");
        }

        Command::Export(format) => match session.request_export(format).await {
            Ok(path) => println!("Exported to {}", path.display()),
            Err(e) => eprintln!("Error: {}", e),
        },

        Command::Document => {
            let snapshot = session.snapshot();
            if snapshot.document.is_empty() {
                println!("No document yet.");
            } else {
                println!("{}", snapshot.document);
                let updated = snapshot
                    .document_updated_at
                    .map(|at| at.format("%H:%M:%S UTC").to_string())
                    .unwrap_or_else(|| "never".to_string());
                println!(
                    "\n[{} words | updated {}]",
                    snapshot.document_words, updated
                );
            }
        }

        Command::Models => match session.list_models().await {
            Ok(models) => println!(
                "{}",
                commands::list_models_text(&session.endpoint().model, &models)
            ),
            Err(e) => eprintln!("Error: {}", e),
        },

        Command::Model(name) => {
            let model = match session.list_models().await {
                Ok(models) => match commands::find_model(&name, &models) {
                    Some(found) => found.to_string(),
                    None => {
                        println!(
                            "No model found matching '{}'\nUse /models to list available models",
                            name
                        );
                        return true;
                    }
                },
                Err(e) => {
                    eprintln!("Warning: could not list models ({}), using '{}' as given", e, name);
                    name
                }
            };
            let mut endpoint = session.endpoint().clone();
            endpoint.model = model;
            println!("Switched to: {}", endpoint.model);
            session.set_endpoint(endpoint);
        }

        Command::Url(url) => {
            let mut endpoint = session.endpoint().clone();
            endpoint.base_url = url;
            println!(
                "Using {}. Run /connect to test and save.",
                endpoint.base_url
            );
            session.set_endpoint(endpoint);
        }

        Command::Connect => match session.test_connection().await {
            Ok(()) => {
                cfg.remember(session.endpoint());
                match cfg.save() {
                    Ok(path) => println!(
                        "Connected to {}. Settings saved to {}",
                        session.endpoint().base_url,
                        path.display()
                    ),
                    Err(e) => eprintln!("Connected, but saving settings failed: {}", e),
                }
            }
            Err(e) => eprintln!("Error: {}", e),
        },

        Command::Status => {
            let snapshot = session.snapshot();
            let endpoint = session.endpoint();
            println!("Server:   {}", endpoint.base_url);
            println!("Model:    {}", endpoint.model);
            println!("Messages: {}", snapshot.messages.len());
            println!("Phase:    {:?}", snapshot.phase);
            println!("Document: {} words", snapshot.document_words);
            if let Some(err) = snapshot.last_error {
                println!("Last error: {}", err);
            }
        }

        Command::Quit => return false,

        Command::Message(msg) => println!("{}", msg),

        Command::Unknown(cmd) => {
            println!("Unknown command: /{}", cmd);
            println!("Type /help for available commands.");
        }
    }
    true
}

/// Print session events for one turn, stopping at the turn's end
fn spawn_printer(session: &Session) -> JoinHandle<()> {
    let mut receiver = session.subscribe();
    let mut printer = TurnPrinter::new(io::IsTerminal::is_terminal(&io::stdout()));

    tokio::spawn(async move {
        while let Ok(event) = receiver.recv().await {
            let terminal = event.is_terminal();
            for output in printer.handle(event) {
                match output {
                    Output::Stdout(text) => {
                        print!("{}", text);
                        io::stdout().flush().ok();
                    }
                    Output::Stderr(text) => eprint!("{}", text),
                }
            }
            if terminal {
                break;
            }
        }
    })
}

async fn finish_printer(printer: JoinHandle<()>) {
    // Every turn ends with a terminal event; Busy sends nothing
    let abort = printer.abort_handle();
    if tokio::time::timeout(Duration::from_millis(200), printer)
        .await
        .is_err()
    {
        abort.abort();
    }
}
