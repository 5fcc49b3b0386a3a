// Router Control - Physical Interface Model
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Physical network interface observation types.
//!
//! These types are recomputed on every poll of the host and are never
//! persisted as authoritative state; they describe what the hardware
//! reports, not what the operator configured.

use serde::{Deserialize, Serialize};

/// Physical media kind of an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceKind {
    /// Twisted-pair Ethernet.
    #[default]
    Ethernet,
    /// Fiber (SFP/SFP+ and similar).
    Fiber,
}

/// Kernel operational state of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    /// Interface is up and operational.
    Up,
    /// Interface is administratively or physically down.
    Down,
    /// State could not be determined.
    #[default]
    Unknown,
}

/// Duplex mode reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Duplex {
    Full,
    Half,
}

/// A physical network interface as observed on the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicalInterface {
    /// Interface name (e.g., "eth0", "enp3s0").
    pub name: String,
    /// Media kind.
    pub kind: InterfaceKind,
    /// Operational link state.
    pub link: LinkState,
    /// Negotiated (or, without carrier, maximum supported) speed in Mbps.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed_mbps: Option<u32>,
    /// Duplex mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplex: Option<Duplex>,
    /// Hardware MAC address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
    /// Kernel driver name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    /// Configured MTU.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u32>,
    /// Physical link-detect signal (cable plugged, partner present).
    pub carrier: bool,
    /// Bytes were received since the previous poll.
    pub rx_activity: bool,
    /// Bytes were transmitted since the previous poll.
    pub tx_activity: bool,
}

impl PhysicalInterface {
    /// Create a new interface record with only the name known.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: InterfaceKind::Ethernet,
            link: LinkState::Unknown,
            speed_mbps: None,
            duplex: None,
            mac_address: None,
            driver: None,
            mtu: None,
            carrier: false,
            rx_activity: false,
            tx_activity: false,
        }
    }
}
