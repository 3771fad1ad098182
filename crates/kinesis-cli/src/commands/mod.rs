//! Slash commands for interactive mode

mod model;

pub use model::{find_model, list_models_text};

use kinesis_agent::ExportFormat;

/// A parsed slash command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Show help
    Help,
    /// Clear conversation and document
    Reset,
    /// Export the document
    Export(ExportFormat),
    /// Print the current document
    Document,
    /// List models on the server
    Models,
    /// Switch to a model, matched against the server's list
    Model(String),
    /// Point the session at another server
    Url(String),
    /// Test the endpoint and save the settings on success
    Connect,
    /// Show session state
    Status,
    /// Exit the application
    Quit,
    /// Show a message to the user
    Message(String),
    /// Unknown command
    Unknown(String),
}

/// Parse a slash command. Returns `None` for regular input.
pub fn parse_command(input: &str) -> Option<Command> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let parts: Vec<&str> = rest.splitn(2, ' ').collect();
    let command = parts[0].to_lowercase();
    let args = parts.get(1).map(|s| s.trim()).unwrap_or("");

    Some(match command.as_str() {
        "help" | "h" | "?" => Command::Help,

        "reset" | "clear" | "new" => Command::Reset,

        "export" | "e" => {
            let format = if args.is_empty() { "md" } else { args };
            match format.parse::<ExportFormat>() {
                Ok(format) => Command::Export(format),
                Err(e) => Command::Message(format!("{}\nUse /export md, html or pdf", e)),
            }
        }

        "doc" | "d" => Command::Document,

        "models" => Command::Models,

        "model" | "m" if args.is_empty() => Command::Models,
        "model" | "m" => Command::Model(args.to_string()),

        "url" | "u" if args.is_empty() => {
            Command::Message("Usage: /url <base-url>, e.g. /url http://localhost:11434".into())
        }
        "url" | "u" => Command::Url(args.trim_end_matches('/').to_string()),

        "connect" => Command::Connect,

        "status" | "s" => Command::Status,

        "quit" | "exit" | "q" => Command::Quit,

        _ => Command::Unknown(command),
    })
}

pub fn help_message() -> String {
    r#"Available commands:
  /help, /h, /?           Show this help message
  /reset, /clear          Start over with an empty conversation and document
  /export [md|html|pdf]   Write the document to the export directory
  /doc, /d                Print the current document
  /models                 List models on the server
  /model, /m <name>       Switch to a model
  /url, /u <url>          Use another server
  /connect                Test the connection and save url and model
  /status, /s             Show session state
  /quit, /exit, /q        Exit kinesis

Describe the system you want specified and kinesis will draft the SRS
as the conversation goes."#
        .to_string()
}
