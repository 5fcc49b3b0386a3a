// Router Control - Port Service
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Port configuration on top of the active network backend.
//!
//! Ports follow the same staged lifecycle as rules, but apply goes
//! through the backend (netplan) rather than a reconciler chain. The
//! service enforces the one invariant the backend cannot see: a
//! physical interface belongs to at most one port.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::backend::BackendInfo;
use crate::manager::ConfigManager;
use crate::models::error::{Error, Result};
use crate::models::interface::PhysicalInterface;
use crate::models::port::{ConfiguredPort, PortProtocol, PortType};
use crate::models::report::ApplyReport;
use crate::models::rules::StagedMeta;
use crate::models::snapshot::ConfigKind;
use crate::store::{HasTable, Store, Table};

pub struct PortService {
    store: Arc<Store>,
    manager: Arc<ConfigManager>,
}

impl PortService {
    pub fn new(store: Arc<Store>, manager: Arc<ConfigManager>) -> Self {
        Self { store, manager }
    }

    fn table(&self) -> &Table<ConfiguredPort> {
        self.store.as_ref().table()
    }

    fn snapshot(&self, port: &ConfiguredPort, applied: bool) -> Result<()> {
        self.store
            .create_snapshot(ConfigKind::Port, port.id, serde_json::to_value(port)?, applied)?;
        Ok(())
    }

    /// Backend validation plus the cross-port invariant: every physical
    /// interface is assigned to at most one port.
    fn validate_port(&self, port: &ConfiguredPort) -> Result<()> {
        self.manager.backend().validate_config(port)?;
        for other in self.table().all().iter().filter(|p| p.id != port.id) {
            for nic in &port.physical_interfaces {
                if other.physical_interfaces.contains(nic) {
                    return Err(Error::ValidationFailed(format!(
                        "interface {} is already assigned to port '{}'",
                        nic, other.name
                    )));
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn list_ports(&self) -> Vec<ConfiguredPort> {
        self.table().all()
    }

    /// Live view of the physical interfaces, independent of any port.
    pub fn scan_devices(&self) -> Result<Vec<PhysicalInterface>> {
        self.manager.monitor().list_physical_interfaces()
    }

    pub fn get_backend_info(&self) -> BackendInfo {
        self.manager.backend_info()
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    pub fn create_port(&self, mut port: ConfiguredPort) -> Result<ConfiguredPort> {
        self.validate_port(&port)?;
        let enabled = port.meta.enabled;
        port.meta = StagedMeta {
            enabled,
            ..StagedMeta::default()
        };
        let stored = self.table().insert(port)?;
        self.snapshot(&stored, false)?;
        info!("Created port '{}' (#{})", stored.name, stored.id);
        Ok(stored)
    }

    pub fn update_port(&self, mut port: ConfiguredPort) -> Result<ConfiguredPort> {
        self.validate_port(&port)?;
        let existing = self.table().get(port.id)?;
        let enabled = port.meta.enabled;
        port.meta = existing.meta.clone();
        port.meta.enabled = enabled;
        port.meta.mark_pending();
        let stored = self.table().update(port)?;
        self.snapshot(&stored, false)?;
        Ok(stored)
    }

    /// Remove the port from the backend, then drop the row. A backend
    /// that refuses the removal keeps the row, so nothing is forgotten
    /// while its configuration may still be live.
    pub fn delete_port(&self, id: i64) -> Result<ConfiguredPort> {
        let port = self.table().get(id)?;
        let backend = self.manager.backend();
        // A bridge is keyed by the port name, a single-NIC port by the
        // member NIC; clear both shapes.
        backend.remove_config(&port.name)?;
        for nic in &port.physical_interfaces {
            if *nic != port.name {
                backend.remove_config(nic)?;
            }
        }
        let removed = self.table().remove(id)?;
        info!("Deleted port '{}' (#{})", removed.name, id);
        Ok(removed)
    }

    /// Seed a router-shaped starting point on an unconfigured host:
    /// WAN on the first NIC via DHCP, LAN on the second NIC at
    /// 192.168.1.1/24. Does nothing when any port already exists.
    pub fn create_default_config(&self) -> Result<Vec<ConfiguredPort>> {
        if self.table().count() > 0 {
            debug!("Ports already configured, not creating defaults");
            return Ok(Vec::new());
        }
        let nics = self.scan_devices()?;
        if nics.is_empty() {
            warn!("No physical interfaces found, cannot create default ports");
            return Ok(Vec::new());
        }

        let mut created = Vec::new();
        let mut wan = ConfiguredPort::new("wan");
        wan.port_type = PortType::Wan;
        wan.protocol = PortProtocol::Dhcp;
        wan.physical_interfaces = vec![nics[0].name.clone()];
        created.push(self.create_port(wan)?);

        if let Some(second) = nics.get(1) {
            let mut lan = ConfiguredPort::new("lan");
            lan.port_type = PortType::Lan;
            lan.protocol = PortProtocol::Static;
            lan.physical_interfaces = vec![second.name.clone()];
            lan.ipaddr = Some("192.168.1.1".to_string());
            lan.netmask = Some("255.255.255.0".to_string());
            created.push(self.create_port(lan)?);
        }
        info!("Created default configuration with {} port(s)", created.len());
        Ok(created)
    }

    /// Apply every enabled port through the backend, stamping the
    /// staged lifecycle outcomes back onto the rows. Per-port failures
    /// are collected; the batch keeps going.
    pub fn apply_all_configs(&self) -> Result<ApplyReport> {
        let ports = self.table().all();
        let backend = self.manager.backend();
        let mut report = ApplyReport::new("ports");
        let now = Utc::now();

        for port in ports.iter().filter(|p| p.meta.enabled) {
            let outcome = self
                .validate_port(port)
                .and_then(|_| backend.apply_config(port));
            match outcome {
                Ok(()) => {
                    let updated = self.table().modify(port.id, |p| p.meta.mark_applied(now))?;
                    self.snapshot(&updated, true)?;
                    report.record_success();
                }
                Err(e) => {
                    warn!("Failed to apply port '{}': {}", port.name, e);
                    let reason = e.to_string();
                    self.table()
                        .modify(port.id, |p| p.meta.mark_failed(reason))?;
                    report.record_failure(&port.name, e.to_string());
                }
            }
        }
        report.finished_at = Utc::now();
        info!("{}", report.summary());
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::detect::BackendDetector;
    use crate::models::rules::ApplyStatus;
    use crate::monitor::InterfaceMonitor;
    use crate::shell::testing::ScriptedRunner;
    use crate::store::DEFAULT_SNAPSHOT_RETENTION;
    use std::path::Path;

    const TWO_NICS: &str = "1: lo: <LOOPBACK,UP> mtu 65536\n\
2: eth0: <BROADCAST,UP> mtu 1500\n\
3: eth1: <BROADCAST,UP> mtu 1500\n";

    /// Store + manager wired to a netplan-detected tempdir host.
    fn fixture(root: &Path, runner: Arc<ScriptedRunner>) -> (Arc<Store>, PortService) {
        let netplan_dir = root.join("netplan");
        std::fs::create_dir_all(&netplan_dir).unwrap();
        std::fs::write(netplan_dir.join("00-seed.yaml"), "network:\n  version: 2\n").unwrap();

        let detector = BackendDetector::with_roots(
            runner.clone(),
            &netplan_dir,
            root.join("interfaces"),
        );
        let monitor = Arc::new(InterfaceMonitor::with_sysfs_root(
            runner.clone(),
            root.join("sys"),
        ));
        let manager = Arc::new(ConfigManager::with_parts(
            runner,
            detector,
            monitor,
            netplan_dir.join("99-router-control.yaml"),
        ));
        let store = Arc::new(Store::open(root.join("state"), DEFAULT_SNAPSHOT_RETENTION).unwrap());
        let service = PortService::new(store.clone(), manager);
        (store, service)
    }

    fn wan_port(nic: &str) -> ConfiguredPort {
        let mut port = ConfiguredPort::new("wan");
        port.port_type = PortType::Wan;
        port.protocol = PortProtocol::Dhcp;
        port.physical_interfaces = vec![nic.to_string()];
        port
    }

    #[test]
    fn test_nic_disjointness_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let (_, service) = fixture(dir.path(), Arc::new(ScriptedRunner::new()));

        service.create_port(wan_port("eth0")).unwrap();

        let mut overlap = ConfiguredPort::new("lan");
        overlap.physical_interfaces = vec!["eth1".to_string(), "eth0".to_string()];
        let err = service.create_port(overlap).unwrap_err();
        assert!(err.to_string().contains("eth0"));
        assert!(err.to_string().contains("wan"));
        assert_eq!(service.list_ports().len(), 1);
    }

    #[test]
    fn test_update_keeps_own_nics() {
        let dir = tempfile::tempdir().unwrap();
        let (_, service) = fixture(dir.path(), Arc::new(ScriptedRunner::new()));

        let stored = service.create_port(wan_port("eth0")).unwrap();
        // Same NICs on the same port are not an overlap
        let mut edit = stored.clone();
        edit.gateway = Some("203.0.113.1".to_string());
        let updated = service.update_port(edit).unwrap();
        assert!(updated.meta.pending_changes);
    }

    #[test]
    fn test_default_config_wan_dhcp_lan_static() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new().respond_ok("ip -o link show", TWO_NICS));
        let (_, service) = fixture(dir.path(), runner);

        let created = service.create_default_config().unwrap();
        assert_eq!(created.len(), 2);

        assert_eq!(created[0].name, "wan");
        assert_eq!(created[0].port_type, PortType::Wan);
        assert_eq!(created[0].protocol, PortProtocol::Dhcp);
        assert_eq!(created[0].physical_interfaces, vec!["eth0"]);

        assert_eq!(created[1].name, "lan");
        assert_eq!(created[1].protocol, PortProtocol::Static);
        assert_eq!(created[1].physical_interfaces, vec!["eth1"]);
        assert_eq!(created[1].ipaddr.as_deref(), Some("192.168.1.1"));
        assert_eq!(created[1].netmask.as_deref(), Some("255.255.255.0"));

        // Second run is a no-op
        assert!(service.create_default_config().unwrap().is_empty());
        assert_eq!(service.list_ports().len(), 2);
    }

    #[test]
    fn test_apply_writes_netplan_and_stamps_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        let (store, service) = fixture(dir.path(), runner.clone());

        let mut lan = ConfiguredPort::new("lan");
        lan.protocol = PortProtocol::Static;
        lan.physical_interfaces = vec!["eth1".to_string()];
        lan.ipaddr = Some("192.168.1.1".to_string());
        lan.netmask = Some("255.255.255.0".to_string());
        let stored = service.create_port(lan).unwrap();

        let report = service.apply_all_configs().unwrap();
        assert!(report.is_success());
        assert_eq!(report.applied, 1);

        let yaml = std::fs::read_to_string(
            dir.path().join("netplan").join("99-router-control.yaml"),
        )
        .unwrap();
        assert!(yaml.contains("eth1"));
        assert!(yaml.contains("192.168.1.1/24"));
        assert_eq!(runner.calls_matching("netplan apply").len(), 1);

        let applied = service.list_ports().remove(0);
        assert_eq!(applied.meta.apply_status, Some(ApplyStatus::Success));
        assert!(!applied.meta.pending_changes);
        assert!(store.last_applied_snapshot(ConfigKind::Port, stored.id).is_some());
    }

    #[test]
    fn test_apply_failure_marks_port_failed() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new().respond_code(
            "netplan apply",
            78,
            "Invalid YAML: inconsistent indentation",
        ));
        let (_, service) = fixture(dir.path(), runner);

        service.create_port(wan_port("eth0")).unwrap();
        let report = service.apply_all_configs().unwrap();
        assert!(!report.is_success());
        assert_eq!(report.failed(), 1);

        let port = service.list_ports().remove(0);
        assert_eq!(port.meta.apply_status, Some(ApplyStatus::Failed));
        assert!(port.meta.pending_changes);
        assert!(port
            .meta
            .apply_error
            .as_deref()
            .unwrap()
            .contains("inconsistent indentation"));
    }

    #[test]
    fn test_disabled_port_skipped_by_apply() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        let (_, service) = fixture(dir.path(), runner.clone());

        let mut off = wan_port("eth0");
        off.meta.enabled = false;
        service.create_port(off).unwrap();

        let report = service.apply_all_configs().unwrap();
        assert_eq!(report.total, 0);
        assert!(runner.calls_matching("netplan apply").is_empty());
    }

    #[test]
    fn test_delete_port_clears_backend_entry() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        let (_, service) = fixture(dir.path(), runner.clone());

        let stored = service.create_port(wan_port("eth0")).unwrap();
        service.apply_all_configs().unwrap();

        let yaml_path = dir.path().join("netplan").join("99-router-control.yaml");
        assert!(std::fs::read_to_string(&yaml_path).unwrap().contains("eth0"));

        service.delete_port(stored.id).unwrap();
        assert!(service.list_ports().is_empty());
        // The single-NIC entry is keyed by the NIC and must be gone
        assert!(!std::fs::read_to_string(&yaml_path).unwrap().contains("eth0"));
        // One apply for the original apply, one for the removal
        assert_eq!(runner.calls_matching("netplan apply").len(), 2);
    }
}
