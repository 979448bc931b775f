//! Main Entrypoint for the Parley Relay Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment and the command line.
//! 2. Building the coaching session setup (system instruction and tools).
//! 3. Constructing the Gemini Live connector shared by every session.
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use clap::Parser;
use gemini_realtime::GeminiLiveConnector;
use parley_api::{config::Config, router::create_router, state::AppState};
use parley_core::{LiveConnector, coach};
use std::{
    fs,
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::{Level, error, info};

/// Relays browser audio to a live negotiation coach.
#[derive(Parser, Debug)]
#[command(name = "parley-api")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Address to listen on, overriding `BIND_ADDRESS`
    #[arg(long = "bind-address", value_name = "ADDR")]
    bind_address: Option<SocketAddr>,

    /// Maximum log level, overriding `RUST_LOG`
    #[arg(long = "log-level", value_name = "LEVEL")]
    log_level: Option<Level>,
}

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl+C");
        return;
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}

/// Reads `system_instruction.md` from the prompts directory.
fn load_system_instruction(prompts_path: &Path) -> anyhow::Result<String> {
    let path: PathBuf = prompts_path.join("system_instruction.md");
    fs::read_to_string(&path)
        .with_context(|| format!("Could not read system instruction from {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // --- 1. Load Configuration ---
    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(bind_address) = cli.bind_address {
        config.bind_address = bind_address;
    }
    if let Some(log_level) = cli.log_level {
        config.log_level = log_level;
    }

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Build the Session Setup ---
    let system_instruction = match &config.prompts_path {
        Some(path) => {
            let instruction = load_system_instruction(path)?;
            info!(path = %path.display(), "Loaded system instruction override");
            Some(instruction)
        }
        None => None,
    };
    let live = coach::connect_config(system_instruction);
    let settings = Arc::new(config.relay_settings(live));

    // --- 4. Initialize the Upstream Connector ---
    let mut connector = GeminiLiveConnector::new(config.api_key.clone());
    if let Some(endpoint) = &config.live_endpoint {
        info!(%endpoint, "Using custom Gemini Live endpoint");
        connector = connector.with_endpoint(endpoint.clone());
    }
    let connector: Arc<dyn LiveConnector> = Arc::new(connector);

    let app_state = Arc::new(AppState {
        config: Arc::new(config.clone()),
        settings,
        connector,
    });

    // --- 5. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 6. Start Server ---
    info!(
        model = %config.live_model,
        bind_address = %config.bind_address,
        connect_timeout = ?config.connect_timeout,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
