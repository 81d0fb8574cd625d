use std::sync::Arc;

use clap::Parser;
use haven_core::completion::{CompletionSettings, OpenAiCompletionClient};
use haven_core::store::{MemoryStore, PgSessionStore, SessionStore};
use haven_core::HavenConfig;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use haven_server::chat::ChatService;
use haven_server::http::{self, HttpState};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "haven.toml")]
    config: String,

    /// Check datastore connectivity and exit
    #[arg(long)]
    health: bool,

    /// Keep sessions in process memory instead of PostgreSQL (development only)
    #[arg(long)]
    memory_store: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience; production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match HavenConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level)),
        )
        .init();

    let store: Arc<dyn SessionStore> = if args.memory_store {
        tracing::warn!("Using in-memory session store; sessions are lost on restart");
        Arc::new(MemoryStore::new())
    } else {
        match haven_core::db::create_pool(&config.database).await {
            Ok(pool) => Arc::new(PgSessionStore::new(pool)),
            Err(e) => {
                eprintln!("Failed to connect to database: {}", e);
                std::process::exit(1);
            }
        }
    };

    if args.health {
        match store.health().await {
            Ok(v) => println!("✅ Datastore connected ({}): {}", store.name(), v),
            Err(e) => {
                println!("❌ Datastore check failed: {}", e);
                std::process::exit(1);
            }
        }
        println!("✅ Haven health check passed");
        return Ok(());
    }

    let completion = match OpenAiCompletionClient::new(CompletionSettings::from_config(
        &config.completion,
        None,
    )) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("Failed to create completion client: {}", e);
            std::process::exit(1);
        }
    };

    let chat = ChatService::new(store, completion, &config)?;
    let state = Arc::new(HttpState {
        chat: Arc::new(chat),
    });

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    http::start_http_server(state, &config.http, tx.subscribe()).await?;

    Ok(())
}
