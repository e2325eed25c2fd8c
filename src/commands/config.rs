//! Config command implementation.
//!
//! Generates configuration files in various formats.

use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;
use crate::config::Config;

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let output = output.unwrap_or_else(|| PathBuf::from("herakles-live-monitor.yaml"));

    let content = render_config(&config, format, commented)?;

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

fn render_config(
    config: &Config,
    format: ConfigFormat,
    commented: bool,
) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => {
            let content = serde_yaml::to_string(config)?;
            if commented {
                add_config_comments(content)
            } else {
                content
            }
        }
    })
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# Herakles Live Monitor Configuration
# ===================================
#
# Server Configuration
# --------------------
# bind: "0.0.0.0"              # Bind IP (0.0.0.0 = all interfaces)
# port: 9216                   # HTTP port
# max_sessions: 256            # Concurrent WebSocket sessions before 503
#
# Polling
# -------
# interval_ms: 1000            # Push interval per session
# disk_smoothing: 0.4          # EMA factor for disk speeds (1.0 = raw)
#
# Kernel Filesystems
# ------------------
# proc_root: "/proc"           # Point at a host mount when containerized
# sys_root: "/sys"
#
# Streams
# -------
# enable_disks: true           # /ws/disks
# enable_network: true         # /ws/network
# enable_connections: true     # /ws/connections
# enable_memory: true          # /ws/memory
# enable_cpu: true             # /ws/cpu
# enable_processes: true       # /ws/processes
# enable_gpu: true             # /ws/gpu (empty without nvidia-smi)
# gpu_command: "nvidia-smi"    # Program queried by /ws/gpu
# network_connections: true    # Attach connection table to /ws/network
#
# Feature Flags
# -------------
# enable_health: true          # Enable /health endpoint
#
# Logging
# -------
# log_level: "info"            # off, error, warn, info, debug, trace
#
# TLS/SSL Configuration
# ---------------------
# enable_tls: false            # Enable HTTPS/WSS (default: false)
# tls_cert_path: null          # Path to TLS certificate (PEM format)
# tls_key_path: null           # Path to TLS private key (PEM format)
"#;

    format!("{comments}\n{yaml}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use std::path::Path;
    use tempfile::tempdir;

    #[test]
    fn test_commented_yaml_parses_back() {
        let content = render_config(&Config::default(), ConfigFormat::Yaml, true).unwrap();
        assert!(content.starts_with("# Herakles Live Monitor Configuration"));
        let parsed = parse_config(&content, Path::new("x.yaml")).unwrap();
        assert_eq!(parsed.port, Some(9216));
    }

    #[test]
    fn test_writes_toml_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cfg.toml");
        command_config(Some(path.clone()), ConfigFormat::Toml, false).unwrap();
        let parsed = parse_config(&fs::read_to_string(&path).unwrap(), &path).unwrap();
        assert_eq!(parsed.interval_ms, Some(1000));
    }
}
