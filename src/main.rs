//! Case tracker HTTP server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use case_tracker::api::{create_router, AppState};
use case_tracker::config::Config;
use case_tracker::credentials::ServiceAccountKey;
use case_tracker::error::ServerError;
use case_tracker::metrics;
use case_tracker::store::{CaseStore, FirestoreStore, MemoryStore};
use case_tracker::utils::shutdown_signal;

/// Case tracking API server.
#[derive(Parser, Debug)]
#[command(name = "case-tracker")]
#[command(about = "HTTP API for creating, listing and updating cases stored in Firestore")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// HTTP server port (overrides PORT).
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Keep cases in process memory instead of Firestore.
    #[arg(long, global = true)]
    in_memory: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default).
    Serve,

    /// Check configuration and credential file validity.
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    let filter = if args.verbose {
        EnvFilter::new("case_tracker=debug,tower_http=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match args.command {
        Some(Command::CheckConfig) => cmd_check_config(),
        Some(Command::Serve) | None => cmd_serve(args.port, args.in_memory).await,
    }
}

/// Load configuration, applying a CLI port override and validating it.
fn load_config(port_override: Option<u16>) -> Result<Config, ServerError> {
    let mut config = Config::load()?;

    if let Some(port) = port_override {
        config.port = port;
    }

    config.validate().map_err(ServerError::InvalidConfig)?;
    Ok(config)
}

/// Check configuration validity.
fn cmd_check_config() -> anyhow::Result<()> {
    println!("======================================================================");
    println!("CASE TRACKER - CONFIGURATION CHECK");
    println!("======================================================================");

    print!("Loading configuration... ");
    let config = match load_config(None) {
        Ok(c) => {
            println!("OK");
            c
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration check failed"));
        }
    };

    let project_id = if config.uses_emulator() {
        println!("Skipping credential file (emulator mode)");
        config.firestore_project_id.clone()
    } else {
        print!("Reading credential file... ");
        match ServiceAccountKey::from_file(&config.google_application_credentials) {
            Ok(key) => {
                println!("OK");
                println!("  Service account: {}", key.client_email);
                Some(
                    config
                        .firestore_project_id
                        .clone()
                        .unwrap_or(key.project_id),
                )
            }
            Err(e) => {
                println!("FAILED");
                println!("  Error: {}", e);
                return Err(anyhow::anyhow!("Credential file invalid"));
            }
        }
    };

    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!("  Port: {}", config.port);
    println!("  Project: {}", project_id.as_deref().unwrap_or("(emulator default)"));
    println!("  Database: {}", config.firestore_database);
    println!("  Collection: {}", config.cases_collection);
    match &config.firestore_emulator_host {
        Some(host) => println!("  Emulator: {}", host),
        None => println!("  Endpoint: {}", config.firestore_base_url),
    }
    println!("  HTTP Timeout: {}ms", config.http_timeout_ms);
    println!(
        "  Metrics: {}",
        if config.metrics_enabled {
            format!("Enabled (port {})", config.metrics_port)
        } else {
            "Disabled".to_string()
        }
    );
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

/// Run the HTTP server until a shutdown signal arrives.
async fn cmd_serve(port_override: Option<u16>, in_memory: bool) -> anyhow::Result<()> {
    info!("Loading configuration...");
    let config = load_config(port_override).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    if config.metrics_enabled {
        metrics::install_exporter(config.metrics_port)?;
    }
    metrics::init_metrics();

    let store: Arc<dyn CaseStore> = if in_memory {
        warn!("Using in-memory store; cases are lost on exit");
        Arc::new(MemoryStore::new())
    } else {
        let store = FirestoreStore::from_config(&config).map_err(|e| {
            error!("Failed to initialize Firestore: {}", e);
            e
        })?;
        info!(collection = %store.collection_url(), "Firestore store ready");
        Arc::new(store)
    };

    let router = create_router(AppState::from_shared(store));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    info!("Server running on port {}", config.port);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}
