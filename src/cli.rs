//! CLI arguments and subcommands for herakles-live-monitor.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use herakles_live_monitor::StreamKind;
use std::net::IpAddr;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "herakles-live-monitor",
    about = "Live Linux telemetry streamed over WebSocket",
    long_about = "Live Linux telemetry streamed over WebSocket.\n\n\
                  Every connected client gets its own polling session that pushes one JSON \
                  snapshot per interval: disk throughput, network throughput and drops, \
                  process-annotated TCP/UDP connections, CPU, memory, processes and NVIDIA GPUs.",
    author = "Michael Moll <exporter@herakles.now> - Herakles",
    version = "0.1.0",
    propagate_version = true,
    after_help = "Project: https://github.com/cansp-dev/herakles-live-monitor · More info: https://www.herakles.now · Support: exporter@herakles.now"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// HTTP listen port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Bind to specific interface/IP
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Push interval per session in milliseconds
    #[arg(short = 'i', long)]
    pub interval_ms: Option<u64>,

    /// EMA smoothing factor for disk throughput, in (0, 1]
    #[arg(long)]
    pub disk_smoothing: Option<f64>,

    /// Maximum number of concurrent streaming sessions
    #[arg(long)]
    pub max_sessions: Option<usize>,

    /// Root of the proc filesystem
    #[arg(long)]
    pub proc_root: Option<PathBuf>,

    /// Root of the sys filesystem
    #[arg(long)]
    pub sys_root: Option<PathBuf>,

    /// Streams to disable (comma-separated, e.g. "processes,connections")
    #[arg(long)]
    pub disable_streams: Option<String>,

    /// Do not attach the connection table to the network stream
    #[arg(long)]
    pub no_network_connections: bool,

    /// Disable /health endpoint
    #[arg(long)]
    pub disable_health: bool,

    /// Enable TLS/SSL for HTTPS
    #[arg(long)]
    pub enable_tls: bool,

    /// Path to TLS certificate file (PEM format)
    #[arg(long)]
    pub tls_cert: Option<PathBuf>,

    /// Path to TLS private key file (PEM format)
    #[arg(long)]
    pub tls_key: Option<PathBuf>,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate configuration files
    Config {
        /// Output file path
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },

    /// Run a stream locally and print its snapshots
    Test {
        /// Stream to sample
        #[arg(short = 's', long, default_value = "memory", value_parser = parse_stream)]
        stream: StreamKind,

        /// Number of snapshots to print
        #[arg(short = 'n', long, default_value_t = 2)]
        iterations: usize,

        /// Pretty-print JSON
        #[arg(long)]
        pretty: bool,
    },
}

fn parse_stream(s: &str) -> Result<StreamKind, String> {
    s.parse()
}
