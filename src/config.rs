//! Configuration management for herakles-live-monitor.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat};
use herakles_live_monitor::sources::{DEFAULT_DISK_SMOOTHING, DEFAULT_GPU_COMMAND};
use herakles_live_monitor::{HostPaths, SourceSettings, StreamKind};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

// Default configuration constants
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 9216;
pub const DEFAULT_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_MAX_SESSIONS: usize = 256;

/// Enhanced configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub port: Option<u16>,
    pub bind: Option<String>,
    #[serde(alias = "max-sessions")]
    pub max_sessions: Option<usize>,

    // Polling
    /// Push interval per session in milliseconds
    #[serde(alias = "interval-ms")]
    pub interval_ms: Option<u64>,
    /// EMA factor for disk throughput; 1.0 reports raw rates
    #[serde(alias = "disk-smoothing")]
    pub disk_smoothing: Option<f64>,

    // Kernel filesystem roots
    #[serde(alias = "proc-root")]
    pub proc_root: Option<PathBuf>,
    #[serde(alias = "sys-root")]
    pub sys_root: Option<PathBuf>,

    // Stream enable flags
    #[serde(alias = "enable-disks")]
    pub enable_disks: Option<bool>,
    #[serde(alias = "enable-network")]
    pub enable_network: Option<bool>,
    #[serde(alias = "enable-connections")]
    pub enable_connections: Option<bool>,
    #[serde(alias = "enable-memory")]
    pub enable_memory: Option<bool>,
    #[serde(alias = "enable-cpu")]
    pub enable_cpu: Option<bool>,
    #[serde(alias = "enable-processes")]
    pub enable_processes: Option<bool>,
    #[serde(alias = "enable-gpu")]
    pub enable_gpu: Option<bool>,
    /// Program queried by the GPU stream
    #[serde(alias = "gpu-command")]
    pub gpu_command: Option<PathBuf>,
    /// Attach the connection table to the network stream
    #[serde(alias = "network-connections")]
    pub network_connections: Option<bool>,

    // Feature flags
    #[serde(alias = "enable-health")]
    pub enable_health: Option<bool>,

    // Logging
    #[serde(alias = "log-level")]
    pub log_level: Option<String>,

    // TLS/SSL Configuration
    #[serde(alias = "enable-tls")]
    pub enable_tls: Option<bool>,
    #[serde(alias = "tls-cert-path")]
    pub tls_cert_path: Option<String>,
    #[serde(alias = "tls-key-path")]
    pub tls_key_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            port: Some(DEFAULT_PORT),
            max_sessions: Some(DEFAULT_MAX_SESSIONS),
            interval_ms: Some(DEFAULT_INTERVAL_MS),
            disk_smoothing: Some(DEFAULT_DISK_SMOOTHING),
            proc_root: Some(PathBuf::from("/proc")),
            sys_root: Some(PathBuf::from("/sys")),
            enable_disks: Some(true),
            enable_network: Some(true),
            enable_connections: Some(true),
            enable_memory: Some(true),
            enable_cpu: Some(true),
            enable_processes: Some(true),
            enable_gpu: Some(true),
            gpu_command: Some(PathBuf::from(DEFAULT_GPU_COMMAND)),
            network_connections: Some(true),
            enable_health: Some(true),
            log_level: Some("info".into()),
            enable_tls: Some(false),
            tls_cert_path: None,
            tls_key_path: None,
        }
    }
}

impl Config {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.unwrap_or(DEFAULT_INTERVAL_MS))
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions.unwrap_or(DEFAULT_MAX_SESSIONS)
    }

    pub fn stream_enabled(&self, kind: StreamKind) -> bool {
        let flag = match kind {
            StreamKind::Disks => self.enable_disks,
            StreamKind::Network => self.enable_network,
            StreamKind::Connections => self.enable_connections,
            StreamKind::Memory => self.enable_memory,
            StreamKind::Cpu => self.enable_cpu,
            StreamKind::Processes => self.enable_processes,
            StreamKind::Gpu => self.enable_gpu,
        };
        flag.unwrap_or(true)
    }

    pub fn enabled_streams(&self) -> Vec<StreamKind> {
        StreamKind::ALL
            .into_iter()
            .filter(|k| self.stream_enabled(*k))
            .collect()
    }

    fn set_stream_enabled(&mut self, kind: StreamKind, enabled: bool) {
        let flag = match kind {
            StreamKind::Disks => &mut self.enable_disks,
            StreamKind::Network => &mut self.enable_network,
            StreamKind::Connections => &mut self.enable_connections,
            StreamKind::Memory => &mut self.enable_memory,
            StreamKind::Cpu => &mut self.enable_cpu,
            StreamKind::Processes => &mut self.enable_processes,
            StreamKind::Gpu => &mut self.enable_gpu,
        };
        *flag = Some(enabled);
    }

    /// Settings handed to every source created by the server.
    pub fn source_settings(&self) -> SourceSettings {
        let defaults = HostPaths::default();
        // 1.0 is a pass-through average
        let disk_smoothing = match self.disk_smoothing.unwrap_or(DEFAULT_DISK_SMOOTHING) {
            f if f >= 1.0 => None,
            f => Some(f),
        };
        SourceSettings {
            paths: HostPaths {
                proc_root: self.proc_root.clone().unwrap_or(defaults.proc_root),
                sys_root: self.sys_root.clone().unwrap_or(defaults.sys_root),
            },
            disk_smoothing,
            network_connections: self.network_connections.unwrap_or(true),
            gpu_command: self
                .gpu_command
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_GPU_COMMAND)),
        }
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if cfg.interval_ms == Some(0) {
        return Err("interval_ms must be greater than 0".into());
    }

    if let Some(f) = cfg.disk_smoothing {
        if !(f > 0.0 && f <= 1.0) {
            return Err(format!("disk_smoothing must be in (0, 1], got {}", f).into());
        }
    }

    if cfg.max_sessions == Some(0) {
        return Err("max_sessions must be greater than 0".into());
    }

    if cfg.enabled_streams().is_empty() {
        return Err("At least one stream must be enabled".into());
    }

    // TLS validation
    if cfg.enable_tls.unwrap_or(false) {
        let cert_path = cfg.tls_cert_path.as_deref();
        let key_path = cfg.tls_key_path.as_deref();

        match (cert_path, key_path) {
            (None, None) => {
                return Err(
                    "TLS is enabled but neither tls_cert_path nor tls_key_path are set".into(),
                );
            }
            (Some(_), None) => {
                return Err("TLS is enabled but tls_key_path is not set".into());
            }
            (None, Some(_)) => {
                return Err("TLS is enabled but tls_cert_path is not set".into());
            }
            (Some(cert), Some(key)) => {
                check_pem_file(cert, "certificate")?;
                check_pem_file(key, "private key")?;
            }
        }
    }

    Ok(())
}

fn check_pem_file(path: &str, what: &str) -> Result<(), Box<dyn std::error::Error>> {
    match fs::metadata(path) {
        Ok(meta) if meta.len() == 0 => Err(format!("TLS {} file is empty: {}", what, path).into()),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(format!("TLS {} file not found: {}", what, path).into())
        }
        Err(e) => Err(format!("TLS {} file is not readable: {} ({})", what, path, e).into()),
    }
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }
    if let Some(cli_port) = args.port {
        config.port = Some(cli_port);
    }
    if let Some(ms) = args.interval_ms {
        config.interval_ms = Some(ms);
    }
    if let Some(f) = args.disk_smoothing {
        config.disk_smoothing = Some(f);
    }
    if let Some(n) = args.max_sessions {
        config.max_sessions = Some(n);
    }
    if let Some(root) = &args.proc_root {
        config.proc_root = Some(root.clone());
    }
    if let Some(root) = &args.sys_root {
        config.sys_root = Some(root.clone());
    }

    // Comma-separated stream names
    if let Some(list) = &args.disable_streams {
        for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let kind: StreamKind = name.parse()?;
            config.set_stream_enabled(kind, false);
        }
    }

    if args.no_network_connections {
        config.network_connections = Some(false);
    }
    if args.disable_health {
        config.enable_health = Some(false);
    }

    // TLS configuration: CLI wins if provided
    if args.enable_tls {
        config.enable_tls = Some(true);
    }
    if let Some(cert_path) = &args.tls_cert {
        config.tls_cert_path = Some(cert_path.to_string_lossy().to_string());
    }
    if let Some(key_path) = &args.tls_key {
        config.tls_key_path = Some(key_path.to_string_lossy().to_string());
    }

    Ok(config)
}

/// Enhanced configuration loading with multiple format support
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            // Try default locations
            let defaults = [
                "/etc/herakles/live-monitor.yaml",
                "/etc/herakles/live-monitor.yml",
                "/etc/herakles/live-monitor.json",
                "/etc/herakles/live-monitor.toml",
                "./herakles-live-monitor.yaml",
                "./herakles-live-monitor.yml",
                "./herakles-live-monitor.json",
                "./herakles-live-monitor.toml",
            ];

            match defaults.iter().map(Path::new).find(|p| p.exists()) {
                Some(p) => p.to_path_buf(),
                None => return Ok(Config::default()),
            }
        }
    };

    if !path.exists() {
        return Err(format!("Config file not found: {}", path.display()).into());
    }

    let content = fs::read_to_string(&path)?;
    parse_config(&content, &path)
}

pub(crate) fn parse_config(content: &str, path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config: Config = serde_json::from_str(content)?;
            info!("Loaded JSON configuration from: {}", path.display());
            Ok(config)
        }
        Some("toml") => {
            let config: Config = toml::from_str(content)?;
            info!("Loaded TOML configuration from: {}", path.display());
            Ok(config)
        }
        _ => {
            // Default to YAML
            let config: Config = serde_yaml::from_str(content)?;
            info!("Loaded YAML configuration from: {}", path.display());
            Ok(config)
        }
    }
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    let output = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    };

    println!("{output}");
    Ok(())
}
