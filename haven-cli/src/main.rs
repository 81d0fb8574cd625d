//! haven-cli: terminal client for the Haven chat endpoint
//!
//! Talks to a running `haven-server` the same way the site's chat widget does.
//!
//! # Subcommands
//! - `chat [--session <id>] [<message>]`: send one message, or start an interactive chat
//! - `status`                             : show server health

use std::io::{self, BufRead, Write};

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

const DEFAULT_SERVER: &str = "http://127.0.0.1:8787";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "haven-cli", version, about = "Haven chat endpoint client")]
struct Cli {
    /// Haven HTTP server URL (overrides HAVEN_HTTP_URL env var)
    #[arg(long, env = "HAVEN_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Chat with the site assistant
    Chat {
        /// Session id to continue (a new one is generated when omitted)
        #[arg(short, long)]
        session: Option<String>,

        /// Send a single message and exit instead of reading stdin
        message: Option<String>,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },

    /// Show Haven server status
    Status,
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatBody<'a> {
    pub message: &'a str,
    pub session_id: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct AssistantMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub response: AssistantMessage,
    pub is_crisis: bool,
    #[serde(default)]
    pub end_session: bool,
}

#[derive(Debug, Deserialize)]
pub struct ErrorReply {
    pub error: String,
    #[serde(default)]
    pub details: String,
}

/// Human-readable rendering of a reply.
pub fn format_reply(reply: &ChatReply) -> String {
    let mut out = String::new();
    if reply.is_crisis {
        out.push_str("[crisis resources]\n");
    }
    out.push_str(&reply.response.content);
    if reply.end_session {
        out.push_str("\n\n[session ended]");
    }
    out
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn send_message(
    client: &reqwest::blocking::Client,
    server: &str,
    session_id: &str,
    message: &str,
) -> anyhow::Result<(ChatReply, serde_json::Value)> {
    let url = format!("{}/chat", server);
    let resp = client
        .post(&url)
        .json(&ChatBody {
            message,
            session_id,
        })
        .send()
        .map_err(|e| anyhow::anyhow!("connection failed to {}: {}", url, e))?;

    let status = resp.status();
    let body: serde_json::Value = resp.json()?;

    if !status.is_success() {
        let err: ErrorReply = serde_json::from_value(body).unwrap_or(ErrorReply {
            error: format!("HTTP {}", status),
            details: String::new(),
        });
        anyhow::bail!("server returned {}: {} ({})", status, err.error, err.details);
    }

    let reply: ChatReply = serde_json::from_value(body.clone())?;
    Ok((reply, body))
}

fn do_chat(
    server: &str,
    session: Option<String>,
    message: Option<String>,
    json_output: bool,
) -> anyhow::Result<()> {
    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(90))
        .build()?;
    let session_id = session.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let show = |reply: &ChatReply, raw: &serde_json::Value| -> anyhow::Result<()> {
        if json_output {
            println!("{}", serde_json::to_string_pretty(raw)?);
        } else {
            println!("{}\n", format_reply(reply));
        }
        Ok(())
    };

    if let Some(message) = message {
        let (reply, raw) = send_message(&client, server, &session_id, &message)?;
        return show(&reply, &raw);
    }

    eprintln!("Session {} (Ctrl+D to quit)", session_id);
    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (reply, raw) = send_message(&client, server, &session_id, line)?;
        show(&reply, &raw)?;
        if reply.end_session {
            break;
        }
    }

    Ok(())
}

/// Show the server status by calling GET /health.
fn do_status(server: &str) -> anyhow::Result<()> {
    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()?;

    let url = format!("{}/health", server);
    let resp = client.get(&url).send();

    match resp {
        Ok(r) if r.status().is_success() => {
            let body: serde_json::Value = r.json().unwrap_or_default();
            println!("Haven server: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("Version:      {}", body["version"].as_str().unwrap_or("?"));
            println!("Store:        {}", body["store"].as_str().unwrap_or("?"));
            println!("Datastore:    {}", body["datastore"].as_str().unwrap_or("?"));
        }
        Ok(r) => {
            let status = r.status();
            eprintln!("haven-cli: server unhealthy (HTTP {})", status);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("haven-cli: cannot reach {}: {}", url, e);
            std::process::exit(1);
        }
    }

    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match cli.command {
        Commands::Chat {
            session,
            message,
            json,
        } => do_chat(&server, session, message, json),
        Commands::Status => do_status(&server),
    };

    if let Err(e) = result {
        eprintln!("haven-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
