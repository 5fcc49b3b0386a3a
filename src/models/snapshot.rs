// Router Control - Configuration Snapshots
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Point-in-time copies of staged records.
//!
//! A snapshot row is written on every create/update/toggle and again
//! when a record is successfully applied (with `applied_at` stamped).
//! Rows are append-only; revert restores an applied record from the
//! newest applied snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which staged table a snapshot row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigKind {
    Port,
    Firewall,
    Forwarding,
    Routes,
    Dns,
    Dhcp,
}

impl ConfigKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Port => "port",
            Self::Firewall => "firewall",
            Self::Forwarding => "forwarding",
            Self::Routes => "routes",
            Self::Dns => "dns",
            Self::Dhcp => "dhcp",
        }
    }
}

/// One stored copy of a record's serialized state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    pub id: i64,
    pub kind: ConfigKind,
    /// Id of the record the snapshot copies.
    pub config_id: i64,
    /// Full serialized record at snapshot time.
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    /// Set when the snapshot captured a successfully applied state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_at: Option<DateTime<Utc>>,
}

impl ConfigSnapshot {
    /// Whether this row captured an applied (live-confirmed) state.
    pub fn is_applied(&self) -> bool {
        self.applied_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_applied_flag() {
        let mut snap = ConfigSnapshot {
            id: 1,
            kind: ConfigKind::Firewall,
            config_id: 7,
            data: serde_json::json!({"name": "ssh"}),
            created_at: Utc::now(),
            applied_at: None,
        };
        assert!(!snap.is_applied());
        snap.applied_at = Some(Utc::now());
        assert!(snap.is_applied());
    }

    #[test]
    fn test_kind_round_trip() {
        let json = serde_json::to_string(&ConfigKind::Forwarding).unwrap();
        assert_eq!(json, "\"forwarding\"");
        let kind: ConfigKind = serde_json::from_str("\"dhcp\"").unwrap();
        assert_eq!(kind, ConfigKind::Dhcp);
    }
}
