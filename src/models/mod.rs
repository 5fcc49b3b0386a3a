// Router Control - Shared Models
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! # Router Control Shared Models
//!
//! Types shared across the daemon, the service layer, and the appliers.
//! Everything here serializes to JSON: the same shapes land in the store
//! files and travel over the D-Bus payloads.
//!
//! The lifecycle vocabulary lives in [`rules::StagedMeta`]. Records are
//! edited in the store first and reconciled onto the host when a batch
//! apply runs, so every configurable record carries its pending/applied
//! state with it. [`interface::PhysicalInterface`] is the exception:
//! it is observed, never persisted as authoritative.

pub mod config;
pub mod error;
pub mod interface;
pub mod port;
pub mod report;
pub mod rules;
pub mod schema;
pub mod snapshot;
pub mod validation;

// Re-export main types for convenience
pub use config::AppConfig;
pub use error::{Error, Result};
pub use interface::{Duplex, InterfaceKind, LinkState, PhysicalInterface};
pub use port::{ConfiguredPort, PortProtocol, PortType};
pub use report::{ApplyFailure, ApplyReport};
pub use rules::{
    ApplyStatus, DhcpStaticLease, DnsForwarder, FirewallRule, ForwardProtocol, PortForwardRule,
    RouteType, RuleAction, RuleProtocol, Staged, StagedMeta, StaticRoute,
};
pub use snapshot::{ConfigKind, ConfigSnapshot};
// SchemaVersion available via schema:: when needed
// Validators available via validation:: when needed

/// Crate version reported by the daemon's Version method.
pub const CRATE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// D-Bus service name for the daemon.
pub const DBUS_SERVICE_NAME: &str = "com.chrisdaggas.RouterControld";

/// D-Bus object path for the main manager interface.
pub const DBUS_OBJECT_PATH: &str = "/com/chrisdaggas/RouterControl";

/// Configuration directory name (under XDG_CONFIG_HOME).
pub const CONFIG_DIR_NAME: &str = "router-control";

/// Data directory name (under XDG_DATA_HOME).
pub const DATA_DIR_NAME: &str = "router-control";
