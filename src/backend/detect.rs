// Router Control - Backend Detection
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Decides which configuration system owns the host.
//!
//! Probes run in a fixed order and the first hit wins; netplan
//! outranks an active NetworkManager, since a host with netplan YAML
//! present is netplan-rendered even when NetworkManager is the
//! renderer underneath. A probe that errors counts as "not
//! detected" and the chain moves on, so detection always yields a
//! value. The result is cached until `clear_cache`.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::backend::BackendKind;
use crate::shell::CommandRunner;

pub struct BackendDetector {
    runner: Arc<dyn CommandRunner>,
    netplan_dir: PathBuf,
    interfaces_file: PathBuf,
    cached: Mutex<Option<BackendKind>>,
}

impl BackendDetector {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self::with_roots(runner, "/etc/netplan", "/etc/network/interfaces")
    }

    /// Probe against non-default filesystem roots. Used by tests and by
    /// hosts with relocated configuration.
    pub fn with_roots(
        runner: Arc<dyn CommandRunner>,
        netplan_dir: impl Into<PathBuf>,
        interfaces_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            netplan_dir: netplan_dir.into(),
            interfaces_file: interfaces_file.into(),
            cached: Mutex::new(None),
        }
    }

    /// Detect the active backend, probing at most once.
    pub fn detect(&self) -> BackendKind {
        let mut cached = match self.cached.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(kind) = *cached {
            return kind;
        }
        let kind = self.probe();
        info!("Detected network backend: {}", kind.as_str());
        *cached = Some(kind);
        kind
    }

    /// Drop the memoized result; the next `detect` re-probes.
    pub fn clear_cache(&self) {
        let mut cached = match self.cached.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *cached = None;
        debug!("Backend detection cache cleared");
    }

    fn probe(&self) -> BackendKind {
        if self.netplan_present() {
            return BackendKind::Netplan;
        }
        if self.networkmanager_active() {
            return BackendKind::NetworkManager;
        }
        if self.interfaces_file.exists() {
            return BackendKind::Interfaces;
        }
        warn!("No network configuration system detected, falling back to manual");
        BackendKind::Manual
    }

    /// netplan binary present AND /etc/netplan holds at least one YAML.
    fn netplan_present(&self) -> bool {
        self.command_exists("netplan")
            && self.netplan_dir.is_dir()
            && dir_has_yaml(&self.netplan_dir)
    }

    /// nmcli present AND the NetworkManager unit reports active.
    fn networkmanager_active(&self) -> bool {
        if !self.command_exists("nmcli") {
            return false;
        }
        self.runner
            .run("systemctl", &["is-active", "NetworkManager"])
            .map(|out| out.success() && out.stdout.trim() == "active")
            .unwrap_or(false)
    }

    fn command_exists(&self, name: &str) -> bool {
        self.runner
            .run("which", &[name])
            .map(|out| out.success())
            .unwrap_or(false)
    }
}

fn dir_has_yaml(dir: &Path) -> bool {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return false,
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_file()
            && path
                .extension()
                .map_or(false, |ext| ext == "yaml" || ext == "yml")
        {
            return true;
        }
    }
    false
}
