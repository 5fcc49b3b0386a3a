// Router Control - Fallback Backends
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Read-only stubs for configuration systems without a writer.
//!
//! NetworkManager, ifupdown, and unmanaged hosts can still be
//! observed (interface enumeration works everywhere), but mutations
//! fail closed: guessing at a file format this daemon does not manage
//! could take the host offline.

use std::sync::Arc;

use tracing::warn;

use crate::backend::{BackendKind, NetworkBackend, SystemConfig};
use crate::models::error::{Error, Result};
use crate::models::port::ConfiguredPort;
use crate::monitor::InterfaceMonitor;

pub struct FallbackBackend {
    kind: BackendKind,
    monitor: Arc<InterfaceMonitor>,
}

impl FallbackBackend {
    pub fn new(kind: BackendKind, monitor: Arc<InterfaceMonitor>) -> Self {
        Self { kind, monitor }
    }

    fn not_supported(&self, operation: &str) -> Error {
        warn!(
            "Refusing {} on unsupported backend '{}'",
            operation,
            self.kind.as_str()
        );
        Error::BackendNotSupported(format!(
            "{} backend is read-only; {} requires netplan",
            self.kind.as_str(),
            operation
        ))
    }
}

impl NetworkBackend for FallbackBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn read_system_config(&self) -> Result<SystemConfig> {
        Ok(SystemConfig {
            interfaces: self.monitor.list_physical_interfaces()?,
            ports: Vec::new(),
        })
    }

    fn validate_config(&self, _port: &ConfiguredPort) -> Result<()> {
        Err(self.not_supported("configuration validation"))
    }

    fn apply_config(&self, _port: &ConfiguredPort) -> Result<()> {
        Err(self.not_supported("configuration apply"))
    }

    fn remove_config(&self, _name: &str) -> Result<()> {
        Err(self.not_supported("configuration removal"))
    }
}
