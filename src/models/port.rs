// Router Control - Port Models
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Logical port configuration.
//!
//! A port is the operator-facing unit of network configuration: a role
//! (WAN/LAN), one or more physical interfaces, and an addressing mode.
//! Ports are staged entities like rules; editing one sets
//! `pending_changes` and nothing reaches the backend until apply.

use serde::{Deserialize, Serialize};

use crate::models::rules::{Staged, StagedMeta};

/// Role of a configured port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PortType {
    Wan,
    /// Assumed when a backend read-back cannot tell the role.
    #[default]
    Lan,
}

/// Addressing mode of a configured port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PortProtocol {
    #[default]
    Dhcp,
    Static,
    Pppoe,
}

/// A logical port: role, member interfaces, and addressing.
///
/// With more than one member interface the backend renders the port as
/// a bridge keyed by the port name; with exactly one it configures that
/// interface directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfiguredPort {
    #[serde(default)]
    pub id: i64,
    /// Port name, also the bridge name when members > 1.
    pub name: String,
    #[serde(default)]
    pub port_type: PortType,
    /// Physical interfaces assigned to this port. Never empty on a
    /// validated port; disjoint across ports.
    #[serde(default)]
    pub physical_interfaces: Vec<String>,
    #[serde(default)]
    pub protocol: PortProtocol,
    /// Static address (required when `protocol` is `Static`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipaddr: Option<String>,
    /// Dotted-quad netmask paired with `ipaddr`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub netmask: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    /// DNS servers pushed with a static configuration.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dns: Vec<String>,
    #[serde(flatten)]
    pub meta: StagedMeta,
}

impl ConfiguredPort {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            port_type: PortType::default(),
            physical_interfaces: Vec::new(),
            protocol: PortProtocol::default(),
            ipaddr: None,
            netmask: None,
            gateway: None,
            dns: Vec::new(),
            meta: StagedMeta::default(),
        }
    }

    /// Whether the backend renders this port as a bridge.
    pub fn is_bridge(&self) -> bool {
        self.physical_interfaces.len() > 1
    }
}

impl Staged for ConfiguredPort {
    fn meta(&self) -> &StagedMeta {
        &self.meta
    }
    fn meta_mut(&mut self) -> &mut StagedMeta {
        &mut self.meta
    }
    fn display_name(&self) -> String {
        self.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_boundary() {
        let mut port = ConfiguredPort::new("lan0");
        port.physical_interfaces = vec!["eth1".to_string()];
        assert!(!port.is_bridge());
        port.physical_interfaces.push("eth2".to_string());
        assert!(port.is_bridge());
    }

    #[test]
    fn test_read_back_defaults() {
        // A backend read-back supplies only what the file encodes
        let json = r#"{"id":0,"name":"eth0","physical_interfaces":["eth0"]}"#;
        let port: ConfiguredPort = serde_json::from_str(json).unwrap();
        assert_eq!(port.port_type, PortType::Lan);
        assert_eq!(port.protocol, PortProtocol::Dhcp);
        assert!(port.dns.is_empty());
    }
}
