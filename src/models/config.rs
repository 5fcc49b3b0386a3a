// Router Control - Daemon Configuration
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Daemon configuration model.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Directory holding the persisted tables. None = default location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,

    /// Netplan file owned by this daemon.
    #[serde(default = "default_netplan_path")]
    pub netplan_path: PathBuf,

    /// dnsmasq drop-in for DNS forwarders.
    #[serde(default = "default_dns_conf_path")]
    pub dns_conf_path: PathBuf,

    /// dnsmasq drop-in for DHCP static leases.
    #[serde(default = "default_dhcp_conf_path")]
    pub dhcp_conf_path: PathBuf,

    /// Timeout for a single OS command, in seconds.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,

    /// Snapshots kept per (config type, config id).
    #[serde(default = "default_snapshot_retention")]
    pub snapshot_retention: usize,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_netplan_path() -> PathBuf {
    PathBuf::from("/etc/netplan/99-router-control.yaml")
}

fn default_dns_conf_path() -> PathBuf {
    PathBuf::from("/etc/dnsmasq.d/99-router-control-dns.conf")
}

fn default_dhcp_conf_path() -> PathBuf {
    PathBuf::from("/etc/dnsmasq.d/99-router-control-leases.conf")
}

fn default_command_timeout() -> u64 {
    10
}

fn default_snapshot_retention() -> usize {
    10
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            state_dir: None,
            netplan_path: default_netplan_path(),
            dns_conf_path: default_dns_conf_path(),
            dhcp_conf_path: default_dhcp_conf_path(),
            command_timeout_secs: default_command_timeout(),
            snapshot_retention: default_snapshot_retention(),
        }
    }
}

impl AppConfig {
    /// Load configuration from TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self, super::Error> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Locate and load the daemon configuration.
    ///
    /// Checks `/etc/router-control/config.toml` first, then the XDG config
    /// directory. A missing file yields the defaults.
    pub fn load() -> Self {
        let mut candidates = vec![PathBuf::from("/etc/router-control/config.toml")];
        if let Some(dir) = dirs::config_dir() {
            candidates.push(dir.join(super::CONFIG_DIR_NAME).join("config.toml"));
        }

        for path in candidates {
            if path.exists() {
                match Self::load_from_file(&path) {
                    Ok(config) => {
                        tracing::info!("Loaded configuration from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load {:?}: {}", path, e);
                    }
                }
            }
        }

        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.command_timeout_secs, 10);
        assert_eq!(config.snapshot_retention, 10);
        assert_eq!(
            config.netplan_path,
            PathBuf::from("/etc/netplan/99-router-control.yaml")
        );
    }

    #[test]
    fn test_partial_toml() {
        let config: AppConfig = toml::from_str("log_level = \"debug\"").unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.command_timeout_secs, 10);
    }
}
