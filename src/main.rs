//! herakles-live-monitor - version 0.1.0
//!
//! Live Linux telemetry over WebSocket with tracing logging.
//! This is the main entry point that initializes the server and handles subcommands.

mod cli;
mod commands;
mod config;
mod handlers;
mod startup_checks;
mod state;

use axum::{routing::get, Router};
use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::{net::TcpListener, signal};
use tracing::{debug, error, info, warn, Level};

use cli::{Args, Commands, LogLevel};
use commands::{command_config, command_test};
use config::{
    resolve_config, show_config, validate_effective_config, Config, DEFAULT_BIND_ADDR, DEFAULT_PORT,
};
use handlers::{health_handler, root_handler, snapshot_handler, ws_handler};
use state::{AppState, SharedState};

/// Grace period for sessions to send their close frames on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(args: &Args) {
    let log_level = match args.log_level {
        LogLevel::Off => None,
        LogLevel::Error => Some(Level::ERROR),
        LogLevel::Warn => Some(Level::WARN),
        LogLevel::Info => Some(Level::INFO),
        LogLevel::Debug => Some(Level::DEBUG),
        LogLevel::Trace => Some(Level::TRACE),
    };
    let Some(log_level) = log_level else {
        return;
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return;
    }

    info!("Logging initialized with level: {:?}", args.log_level);
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

/// Resolves once SIGINT or SIGTERM arrives.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
    }
}

fn build_router(state: SharedState) -> Router {
    let mut app = Router::new()
        .route("/", get(root_handler))
        .route("/ws/{stream}", get(ws_handler))
        .route("/api/snapshot/{stream}", get(snapshot_handler));

    if state.config.enable_health.unwrap_or(true) {
        app = app.route("/health", get(health_handler));
    }

    app.with_state(state)
}

/// Main application entry point.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, args.config_format);
    }

    // Handle subcommands
    if let Some(command) = &args.command {
        return match command {
            Commands::Config {
                output,
                format,
                commented,
            } => command_config(output.clone(), format.clone(), *commented),

            Commands::Test {
                stream,
                iterations,
                pretty,
            } => {
                let config = load_validated_config(&args)?;
                command_test(*stream, *iterations, *pretty, &config).await
            }
        };
    }

    // Load configuration for main server mode
    let config = load_validated_config(&args)?;

    setup_logging(&args);

    info!("Starting herakles-live-monitor");

    let settings = config.source_settings();
    if let Err(e) =
        startup_checks::validate_requirements(&settings.paths.proc_root, &settings.paths.sys_root)
    {
        error!("❌ Startup validation failed: {}", e);
        error!("   The monitor will start but streams may stay empty!");
    }

    let bind_ip_str = config.bind.clone().unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
    let port = config.port.unwrap_or(DEFAULT_PORT);
    let addr: SocketAddr = format!("{}:{}", bind_ip_str, port).parse()?;

    let enabled: Vec<&str> = config.enabled_streams().iter().map(|k| k.as_str()).collect();
    info!(
        "Streams enabled: [{}], interval {} ms, max {} sessions",
        enabled.join(", "),
        config.interval().as_millis(),
        config.max_sessions()
    );
    if enabled.is_empty() {
        warn!("⚠️  All streams are disabled - only / and /health will answer");
    }

    let state: SharedState = Arc::new(AppState::new(config.clone()));
    let app = build_router(state.clone());
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();

    let enable_tls = config.enable_tls.unwrap_or(false);

    if enable_tls {
        // Both paths are checked by validate_effective_config()
        let (Some(cert_path), Some(key_path)) = (&config.tls_cert_path, &config.tls_key_path)
        else {
            return Err("TLS enabled without certificate and key paths".into());
        };

        info!("Loading TLS certificate from: {}", cert_path);
        info!("Loading TLS private key from: {}", key_path);

        let tls_config = RustlsConfig::from_pem_file(cert_path, key_path)
            .await
            .map_err(|e| {
                error!("Failed to load TLS configuration: {}", e);
                e
            })?;

        info!(
            "herakles-live-monitor listening on https://{}:{} (wss://.../ws/{{stream}})",
            bind_ip_str, port
        );

        let handle = axum_server::Handle::new();
        tokio::spawn({
            let handle = handle.clone();
            let state = state.clone();
            async move {
                shutdown_signal().await;
                info!("Shutdown signal received, closing sessions...");
                state.shutdown.cancel();
                handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
            }
        });

        axum_server::bind_rustls(addr, tls_config)
            .handle(handle)
            .serve(make_service)
            .await
            .map_err(|e| {
                error!("Server error: {}", e);
                e
            })?;
    } else {
        let listener = TcpListener::bind(addr).await?;
        info!(
            "herakles-live-monitor listening on http://{}:{} (ws://.../ws/{{stream}})",
            bind_ip_str, port
        );

        let shutdown_state = state.clone();
        axum::serve(listener, make_service)
            .with_graceful_shutdown(async move {
                shutdown_signal().await;
                info!("Shutdown signal received, closing sessions...");
                shutdown_state.shutdown.cancel();
            })
            .await
            .map_err(|e| {
                error!("Server error: {}", e);
                e
            })?;
    }

    // Let session tasks flush their close frames
    let deadline = tokio::time::Instant::now() + SHUTDOWN_GRACE;
    while !state.sessions.is_empty() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    debug!("{} session(s) still registered at exit", state.sessions.len());

    info!("herakles-live-monitor stopped gracefully");
    Ok(())
}
