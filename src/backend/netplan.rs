// Router Control - Netplan Backend
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Reference backend: a dedicated netplan drop-in file.
//!
//! All managed configuration lives in one YAML file owned by this
//! daemon (default `/etc/netplan/99-router-control.yaml`); other
//! netplan files on the host are never touched. The document model
//! uses `BTreeMap` keys so emission is deterministic: applying the
//! same ports twice produces byte-identical YAML.
//!
//! A port with more than one member interface becomes a bridge keyed
//! by the port name, and any standalone `ethernets` entries for its
//! members are dropped. A single-member port configures that interface
//! directly under `ethernets`.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::backend::{BackendKind, NetworkBackend, SystemConfig};
use crate::models::error::{Error, Result};
use crate::models::port::{ConfiguredPort, PortProtocol};
use crate::models::validation;
use crate::monitor::InterfaceMonitor;
use crate::shell::CommandRunner;

// ============================================================================
// YAML document model
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct NetplanDocument {
    network: NetworkSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NetworkSection {
    version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    renderer: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    ethernets: BTreeMap<String, InterfaceEntry>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    bridges: BTreeMap<String, BridgeEntry>,
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            version: 2,
            renderer: Some("networkd".to_string()),
            ethernets: BTreeMap::new(),
            bridges: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct InterfaceEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    dhcp4: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    addresses: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    routes: Vec<RouteEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    nameservers: Option<NameserversEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RouteEntry {
    to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    via: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NameserversEntry {
    addresses: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct BridgeEntry {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    interfaces: Vec<String>,
    #[serde(flatten)]
    config: InterfaceEntry,
}

// ============================================================================
// Backend
// ============================================================================

pub struct NetplanBackend {
    runner: Arc<dyn CommandRunner>,
    monitor: Arc<InterfaceMonitor>,
    config_path: PathBuf,
}

impl NetplanBackend {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        monitor: Arc<InterfaceMonitor>,
        config_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            monitor,
            config_path: config_path.into(),
        }
    }

    /// Load the managed file. Missing or unreadable content yields an
    /// empty document: the file is fully owned by this daemon, so the
    /// recovery for a damaged file is rewriting it on the next apply.
    fn load_document(&self) -> NetplanDocument {
        let content = match std::fs::read_to_string(&self.config_path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return NetplanDocument::default();
            }
            Err(e) => {
                warn!(
                    "Cannot read {}: {}; treating as empty",
                    self.config_path.display(),
                    e
                );
                return NetplanDocument::default();
            }
        };
        if content.trim().is_empty() {
            return NetplanDocument::default();
        }
        match serde_yaml::from_str(&content) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(
                    "Cannot parse {}: {}; treating as empty",
                    self.config_path.display(),
                    e
                );
                NetplanDocument::default()
            }
        }
    }

    fn write_document(&self, doc: &NetplanDocument) -> Result<()> {
        let yaml = serde_yaml::to_string(doc)?;
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::ConfigWriteFailed(format!("{}: {}", parent.display(), e))
            })?;
        }
        std::fs::write(&self.config_path, yaml).map_err(|e| {
            Error::ConfigWriteFailed(format!("{}: {}", self.config_path.display(), e))
        })?;
        debug!("Wrote netplan config to {}", self.config_path.display());
        Ok(())
    }

    fn run_netplan_apply(&self) -> Result<()> {
        let out = self.runner.run("netplan", &["apply"])?;
        if !out.success() {
            return Err(Error::command_failed("netplan apply", out.error_message()));
        }
        Ok(())
    }

    /// Render a port's addressing into a netplan entry.
    fn entry_for_port(port: &ConfiguredPort) -> Result<InterfaceEntry> {
        let mut entry = InterfaceEntry::default();
        match port.protocol {
            PortProtocol::Dhcp => {
                entry.dhcp4 = Some(true);
            }
            PortProtocol::Static => {
                entry.dhcp4 = Some(false);
                let ip = port.ipaddr.as_deref().ok_or_else(|| {
                    Error::ValidationFailed(format!(
                        "static port '{}' requires an IP address",
                        port.name
                    ))
                })?;
                let netmask = port.netmask.as_deref().ok_or_else(|| {
                    Error::ValidationFailed(format!(
                        "static port '{}' requires a netmask",
                        port.name
                    ))
                })?;
                let prefix = validation::netmask_to_prefix(netmask)?;
                entry.addresses.push(format!("{}/{}", ip, prefix));
                if let Some(gateway) = &port.gateway {
                    entry.routes.push(RouteEntry {
                        to: "default".to_string(),
                        via: Some(gateway.clone()),
                    });
                }
                if !port.dns.is_empty() {
                    entry.nameservers = Some(NameserversEntry {
                        addresses: port.dns.clone(),
                    });
                }
            }
            // PPPoE session management belongs to pppd; netplan only
            // needs the underlying interface up without DHCP.
            PortProtocol::Pppoe => {
                entry.dhcp4 = Some(false);
            }
        }
        Ok(entry)
    }

    /// Reconstruct a port from a netplan entry. The file encodes no
    /// role, so the port type defaults to LAN.
    fn port_from_entry(name: &str, members: Vec<String>, entry: &InterfaceEntry) -> ConfiguredPort {
        let mut port = ConfiguredPort::new(name);
        port.physical_interfaces = members;
        // Read-back reflects live state; nothing is pending
        port.meta.pending_changes = false;
        if entry.dhcp4 == Some(true) {
            port.protocol = PortProtocol::Dhcp;
        } else if let Some(first) = entry.addresses.first() {
            port.protocol = PortProtocol::Static;
            match first.split_once('/') {
                Some((ip, prefix)) => {
                    port.ipaddr = Some(ip.to_string());
                    port.netmask = prefix
                        .parse::<u8>()
                        .ok()
                        .and_then(|p| validation::prefix_to_netmask(p).ok());
                }
                None => port.ipaddr = Some(first.clone()),
            }
            port.gateway = entry
                .routes
                .iter()
                .find(|r| r.to == "default")
                .and_then(|r| r.via.clone());
            if let Some(ns) = &entry.nameservers {
                port.dns = ns.addresses.clone();
            }
        } else {
            // dhcp4 off with no addresses is how a PPPoE carrier
            // interface is written
            port.protocol = PortProtocol::Pppoe;
        }
        port
    }
}

impl NetworkBackend for NetplanBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Netplan
    }

    fn read_system_config(&self) -> Result<SystemConfig> {
        let interfaces = self.monitor.list_physical_interfaces()?;
        let doc = self.load_document();

        let mut ports = Vec::new();
        for (name, entry) in &doc.network.ethernets {
            ports.push(Self::port_from_entry(name, vec![name.clone()], entry));
        }
        for (name, bridge) in &doc.network.bridges {
            ports.push(Self::port_from_entry(
                name,
                bridge.interfaces.clone(),
                &bridge.config,
            ));
        }
        Ok(SystemConfig { interfaces, ports })
    }

    fn validate_config(&self, port: &ConfiguredPort) -> Result<()> {
        validation::validate_name(&port.name)?;
        if port.physical_interfaces.is_empty() {
            return Err(Error::ValidationFailed(format!(
                "port '{}' has no physical interfaces assigned",
                port.name
            )));
        }
        if port.protocol == PortProtocol::Static {
            let ip = port.ipaddr.as_deref().ok_or_else(|| {
                Error::ValidationFailed(format!(
                    "static port '{}' requires an IP address",
                    port.name
                ))
            })?;
            validation::validate_ipv4(ip)?;
            let netmask = port.netmask.as_deref().ok_or_else(|| {
                Error::ValidationFailed(format!(
                    "static port '{}' requires a netmask",
                    port.name
                ))
            })?;
            validation::validate_netmask(netmask)?;
        }
        if let Some(gateway) = &port.gateway {
            validation::validate_ipv4(gateway)?;
        }
        for server in &port.dns {
            validation::validate_ipv4(server)?;
        }
        Ok(())
    }

    fn apply_config(&self, port: &ConfiguredPort) -> Result<()> {
        self.validate_config(port)?;
        let entry = Self::entry_for_port(port)?;
        let mut doc = self.load_document();

        if port.is_bridge() {
            // Member NICs must not keep standalone configuration
            for member in &port.physical_interfaces {
                doc.network.ethernets.remove(member);
            }
            doc.network.ethernets.remove(&port.name);
            doc.network.bridges.insert(
                port.name.clone(),
                BridgeEntry {
                    interfaces: port.physical_interfaces.clone(),
                    config: entry,
                },
            );
        } else {
            // Shrinking a bridge back to one NIC drops the bridge key
            doc.network.bridges.remove(&port.name);
            let nic = port.physical_interfaces[0].clone();
            doc.network.ethernets.insert(nic, entry);
        }

        self.write_document(&doc)?;
        self.run_netplan_apply()?;
        info!("Applied netplan configuration for port '{}'", port.name);
        Ok(())
    }

    fn remove_config(&self, name: &str) -> Result<()> {
        let mut doc = self.load_document();
        let removed = doc.network.ethernets.remove(name).is_some()
            | doc.network.bridges.remove(name).is_some();
        if !removed {
            debug!("No netplan entry for '{}', nothing to remove", name);
            return Ok(());
        }
        self.write_document(&doc)?;
        self.run_netplan_apply()?;
        info!("Removed netplan configuration for '{}'", name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::testing::ScriptedRunner;

    fn backend_with(runner: Arc<ScriptedRunner>, dir: &std::path::Path) -> NetplanBackend {
        let monitor = Arc::new(InterfaceMonitor::with_sysfs_root(
            runner.clone(),
            dir.join("sys"),
        ));
        NetplanBackend::new(runner, monitor, dir.join("99-router-control.yaml"))
    }

    fn static_lan_port() -> ConfiguredPort {
        let mut port = ConfiguredPort::new("lan0");
        port.physical_interfaces = vec!["eth1".to_string()];
        port.protocol = PortProtocol::Static;
        port.ipaddr = Some("192.168.1.1".to_string());
        port.netmask = Some("255.255.255.0".to_string());
        port
    }

    #[test]
    fn test_static_lan_apply_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        let backend = backend_with(runner.clone(), dir.path());

        let port = static_lan_port();
        backend.validate_config(&port).unwrap();
        backend.apply_config(&port).unwrap();

        let yaml =
            std::fs::read_to_string(dir.path().join("99-router-control.yaml")).unwrap();
        assert!(yaml.contains("eth1"));
        assert!(yaml.contains("192.168.1.1/24"));
        assert_eq!(runner.calls_matching("netplan apply").len(), 1);

        let config = backend.read_system_config().unwrap();
        assert_eq!(config.ports.len(), 1);
        let read = &config.ports[0];
        assert_eq!(read.name, "eth1");
        assert_eq!(read.protocol, PortProtocol::Static);
        assert_eq!(read.ipaddr.as_deref(), Some("192.168.1.1"));
        assert_eq!(read.netmask.as_deref(), Some("255.255.255.0"));
        assert!(!read.meta.pending_changes);
    }

    #[test]
    fn test_double_apply_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        let backend = backend_with(runner.clone(), dir.path());
        let path = dir.path().join("99-router-control.yaml");

        let port = static_lan_port();
        backend.apply_config(&port).unwrap();
        let first = std::fs::read(&path).unwrap();
        backend.apply_config(&port).unwrap();
        let second = std::fs::read(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_two_nics_become_bridge_and_drop_standalone_entries() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        let backend = backend_with(runner.clone(), dir.path());

        // eth2 first exists standalone
        let mut single = ConfiguredPort::new("eth2");
        single.physical_interfaces = vec!["eth2".to_string()];
        backend.apply_config(&single).unwrap();

        let mut bridged = static_lan_port();
        bridged.name = "br-lan".to_string();
        bridged.physical_interfaces = vec!["eth1".to_string(), "eth2".to_string()];
        backend.apply_config(&bridged).unwrap();

        let yaml =
            std::fs::read_to_string(dir.path().join("99-router-control.yaml")).unwrap();
        assert!(yaml.contains("bridges"));
        assert!(yaml.contains("br-lan"));
        // The standalone eth2 entry must be gone
        assert!(!yaml.contains("ethernets"));

        let config = backend.read_system_config().unwrap();
        assert_eq!(config.ports.len(), 1);
        assert_eq!(
            config.ports[0].physical_interfaces,
            vec!["eth1".to_string(), "eth2".to_string()]
        );
    }

    #[test]
    fn test_dhcp_and_pppoe_rendering() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        let backend = backend_with(runner.clone(), dir.path());

        let mut wan = ConfiguredPort::new("wan0");
        wan.physical_interfaces = vec!["eth0".to_string()];
        wan.protocol = PortProtocol::Dhcp;
        backend.apply_config(&wan).unwrap();

        let mut pppoe = ConfiguredPort::new("wan1");
        pppoe.physical_interfaces = vec!["eth3".to_string()];
        pppoe.protocol = PortProtocol::Pppoe;
        backend.apply_config(&pppoe).unwrap();

        let config = backend.read_system_config().unwrap();
        let eth0 = config.ports.iter().find(|p| p.name == "eth0").unwrap();
        assert_eq!(eth0.protocol, PortProtocol::Dhcp);
        let eth3 = config.ports.iter().find(|p| p.name == "eth3").unwrap();
        assert_eq!(eth3.protocol, PortProtocol::Pppoe);
    }

    #[test]
    fn test_netplan_apply_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(
            ScriptedRunner::new().respond_code("netplan apply", 1, "invalid YAML"),
        );
        let backend = backend_with(runner, dir.path());

        let err = backend.apply_config(&static_lan_port()).unwrap_err();
        assert!(matches!(err, Error::CommandFailed { .. }));
        assert!(err.to_string().contains("invalid YAML"));
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        let backend = backend_with(runner.clone(), dir.path());

        backend.remove_config("nope").unwrap();
        // No file written, no netplan apply run
        assert!(!dir.path().join("99-router-control.yaml").exists());
        assert!(runner.calls_matching("netplan apply").is_empty());
    }

    #[test]
    fn test_remove_existing_rewrites_and_applies() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        let backend = backend_with(runner.clone(), dir.path());

        backend.apply_config(&static_lan_port()).unwrap();
        backend.remove_config("eth1").unwrap();

        let config = backend.read_system_config().unwrap();
        assert!(config.ports.is_empty());
        assert_eq!(runner.calls_matching("netplan apply").len(), 2);
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        let backend = backend_with(runner, dir.path());
        let config = backend.read_system_config().unwrap();
        assert!(config.ports.is_empty());
    }

    #[test]
    fn test_validate_rejects_incomplete_static() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        let backend = backend_with(runner, dir.path());

        let mut port = static_lan_port();
        port.netmask = None;
        assert!(backend.validate_config(&port).is_err());

        let mut port = static_lan_port();
        port.ipaddr = Some("999.1.1.1".to_string());
        assert!(backend.validate_config(&port).is_err());

        let mut port = static_lan_port();
        port.physical_interfaces.clear();
        assert!(backend.validate_config(&port).is_err());
    }
}
