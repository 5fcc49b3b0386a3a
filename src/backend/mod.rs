// Router Control - Backend Abstraction
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Uniform contract over host network-configuration systems.
//!
//! Exactly one backend owns network configuration on a given host.
//! Detection decides which one; the rest of the daemon only talks to
//! the [`NetworkBackend`] trait. Netplan is the reference
//! implementation; the others are read-only stubs that refuse every
//! mutation rather than guess at file formats they do not manage.

pub mod detect;
pub mod fallback;
pub mod netplan;

use serde::{Deserialize, Serialize};

use crate::models::error::Result;
use crate::models::interface::PhysicalInterface;
use crate::models::port::ConfiguredPort;

/// Which configuration system owns the host's network setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Netplan,
    NetworkManager,
    /// Debian-style `/etc/network/interfaces`.
    Interfaces,
    /// No recognized configuration system.
    Manual,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Netplan => "netplan",
            Self::NetworkManager => "networkmanager",
            Self::Interfaces => "interfaces",
            Self::Manual => "manual",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Netplan => "Netplan (YAML, netplan apply)",
            Self::NetworkManager => "NetworkManager (nmcli)",
            Self::Interfaces => "Debian /etc/network/interfaces",
            Self::Manual => "Manual (no managed configuration system)",
        }
    }

    /// Whether this backend can apply configuration changes.
    pub fn is_supported(&self) -> bool {
        matches!(self, Self::Netplan)
    }
}

/// Summary handed to clients asking which backend is active.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendInfo {
    pub kind: BackendKind,
    pub description: String,
    pub supported: bool,
}

impl BackendInfo {
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            description: kind.description().to_string(),
            supported: kind.is_supported(),
        }
    }
}

/// Everything a backend can report about the host's network state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Observed physical interfaces.
    pub interfaces: Vec<PhysicalInterface>,
    /// Ports parsed back from the backend's own configuration.
    pub ports: Vec<ConfiguredPort>,
}

/// Contract every backend implements.
///
/// Reads must work on every backend; mutations are only honest on
/// backends that actually manage the files involved, so stubs fail
/// closed instead of pretending.
pub trait NetworkBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Observed interfaces plus ports parsed from backend storage.
    fn read_system_config(&self) -> Result<SystemConfig>;

    /// Check a port without touching the host. `Ok(())` means apply
    /// may proceed; the error carries the reason.
    fn validate_config(&self, port: &ConfiguredPort) -> Result<()>;

    /// Persist the port and make it live.
    fn apply_config(&self, port: &ConfiguredPort) -> Result<()>;

    /// Remove the named port from backend storage and re-apply.
    /// Removing a port that is not present is a no-op.
    fn remove_config(&self, name: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_netplan_supported() {
        assert!(BackendKind::Netplan.is_supported());
        assert!(!BackendKind::NetworkManager.is_supported());
        assert!(!BackendKind::Interfaces.is_supported());
        assert!(!BackendKind::Manual.is_supported());
    }

    #[test]
    fn test_backend_info_serializes_kind_lowercase() {
        let info = BackendInfo::new(BackendKind::Netplan);
        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("\"kind\":\"netplan\""));
        assert!(json.contains("\"supported\":true"));
    }
}
