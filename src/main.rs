mod config;
mod db;
mod error;
mod llm;
mod store;
mod taiga;
mod web;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{Mutex, broadcast};
use tracing::{error, info};

use crate::config::Config;
use crate::llm::Generator;
use crate::taiga::TaigaClient;

#[tokio::main]
async fn main() {
    // Load .env file (if present) before anything reads env vars
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return;
    }

    if args.iter().any(|a| a == "--default-config") {
        print!("{}", Config::default_config_contents());
        return;
    }

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load config
    let config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from);

    let config = match Config::load(config_path.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!("failed to load config: {e}");
            return;
        }
    };

    info!(
        bind = %config.server_bind,
        primary_provider = %config.ai.primary_provider,
        "written starting"
    );

    // Open database
    let db_path = config.database_path();
    if let Some(parent) = db_path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            error!("failed to create data directory {}: {e}", parent.display());
            return;
        }
    }
    let conn = match db::open(&db_path) {
        Ok(c) => c,
        Err(e) => {
            error!("failed to open database: {e}");
            return;
        }
    };

    // Handle --seed-positions
    if args.iter().any(|a| a == "--seed-positions") {
        match store::seed_positions(&conn) {
            Ok(added) => {
                if let Err(e) = store::ensure_default_user(&conn) {
                    error!("failed to create default user: {e}");
                    return;
                }
                println!("Seeded {added} positions.");
            }
            Err(e) => error!("failed to seed positions: {e}"),
        }
        return;
    }

    let db = Arc::new(Mutex::new(conn));

    // Build the AI generator
    let generator = match Generator::new(&config.ai) {
        Ok(g) => Arc::new(g),
        Err(e) => {
            error!("failed to initialize AI generator: {e}");
            return;
        }
    };

    // Build the Taiga client
    let taiga = match TaigaClient::new(&config.taiga) {
        Ok(t) => Arc::new(t),
        Err(e) => {
            error!("failed to initialize Taiga client: {e}");
            return;
        }
    };

    // Shutdown signal
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let server_handle = {
        let state = web::AppState {
            config: config.clone(),
            db,
            generator,
            taiga,
        };
        let shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            if let Err(e) = web::serve(state, shutdown_rx).await {
                error!("web server error: {e}");
                std::process::exit(1);
            }
        })
    };

    info!("written is running — press Ctrl+C to stop");

    // Wait for shutdown signal
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for ctrl+c: {e}");
        return;
    }

    info!("shutting down");
    let _ = shutdown_tx.send(());
    let _ = server_handle.await;
}

fn print_usage() {
    println!(
        "written — AI-assisted activity logging with Taiga integration

USAGE:
    written [OPTIONS]

OPTIONS:
    --config <PATH>     Path to config file (default: ~/.config/written/config.toml)
    --default-config    Print default config to stdout and exit
    --seed-positions    Populate the position catalogue and default user, then exit
    -h, --help          Print this help message

AI PROVIDERS:
    GEMINI_API_KEY        Google AI Studio key (primary; must start with \"AIza\")
    OPENAI_API_KEY        OpenAI API key (optional)
    ANTHROPIC_API_KEY     Anthropic API key (optional)

TAIGA:
    TAIGA_AUTH_TOKEN      Pre-issued auth token (takes precedence)
    TAIGA_USERNAME        Username for password auth
    TAIGA_PASSWORD        Password for password auth

Set RUST_LOG to control logging, e.g. RUST_LOG=written=debug"
    );
}
