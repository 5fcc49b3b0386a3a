// Router Control - Config Manager
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Facade over detection, the backends, and the interface monitor.
//!
//! Built once in `main.rs` and shared via `Arc`. All backend instances
//! exist up front; [`ConfigManager::backend`] just selects by the
//! detector's (cached) verdict, so a host that grows a netplan tree at
//! runtime switches over after `clear_detection_cache`.

use std::path::PathBuf;
use std::sync::Arc;

use crate::backend::detect::BackendDetector;
use crate::backend::fallback::FallbackBackend;
use crate::backend::netplan::NetplanBackend;
use crate::backend::{BackendInfo, BackendKind, NetworkBackend, SystemConfig};
use crate::models::error::Result;
use crate::monitor::InterfaceMonitor;
use crate::shell::CommandRunner;

pub struct ConfigManager {
    detector: BackendDetector,
    monitor: Arc<InterfaceMonitor>,
    netplan: NetplanBackend,
    network_manager: FallbackBackend,
    interfaces: FallbackBackend,
    manual: FallbackBackend,
}

impl ConfigManager {
    pub fn new(runner: Arc<dyn CommandRunner>, netplan_path: impl Into<PathBuf>) -> Self {
        let monitor = Arc::new(InterfaceMonitor::new(runner.clone()));
        let detector = BackendDetector::new(runner.clone());
        Self::with_parts(runner, detector, monitor, netplan_path)
    }

    /// Assemble from explicit parts; tests relocate the probe roots
    /// and the sysfs tree this way.
    pub fn with_parts(
        runner: Arc<dyn CommandRunner>,
        detector: BackendDetector,
        monitor: Arc<InterfaceMonitor>,
        netplan_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            detector,
            netplan: NetplanBackend::new(runner.clone(), monitor.clone(), netplan_path),
            network_manager: FallbackBackend::new(BackendKind::NetworkManager, monitor.clone()),
            interfaces: FallbackBackend::new(BackendKind::Interfaces, monitor.clone()),
            manual: FallbackBackend::new(BackendKind::Manual, monitor.clone()),
            monitor,
        }
    }

    pub fn monitor(&self) -> Arc<InterfaceMonitor> {
        self.monitor.clone()
    }

    /// The backend owning this host's network configuration.
    pub fn backend(&self) -> &dyn NetworkBackend {
        match self.detector.detect() {
            BackendKind::Netplan => &self.netplan,
            BackendKind::NetworkManager => &self.network_manager,
            BackendKind::Interfaces => &self.interfaces,
            BackendKind::Manual => &self.manual,
        }
    }

    pub fn backend_info(&self) -> BackendInfo {
        BackendInfo::new(self.detector.detect())
    }

    pub fn read_system_config(&self) -> Result<SystemConfig> {
        self.backend().read_system_config()
    }

    pub fn clear_detection_cache(&self) {
        self.detector.clear_cache();
    }
}
