// Router Control - Staged Rule Models
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Persisted staged-rule records.
//!
//! Five rule domains share one lifecycle: a record is created or edited
//! with `pending_changes` set, an explicit apply reconciles it onto the
//! host, and success clears the pending flag and stamps
//! `last_applied_at`. A record whose `last_applied_at` is `None` has
//! never touched the host and may be hard-deleted on revert; anything
//! else is only removed from the host by re-running apply without it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of the most recent apply attempt for a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyStatus {
    /// The record was applied to the host.
    Success,
    /// The apply attempt failed; see `apply_error`.
    Failed,
}

/// Cross-cutting lifecycle fields carried by every staged record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagedMeta {
    /// Whether the record participates in apply.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Set whenever the record differs from what was last confirmed live.
    #[serde(default = "default_true")]
    pub pending_changes: bool,

    /// When the record was last successfully applied. `None` = never.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_applied_at: Option<DateTime<Utc>>,

    /// Outcome of the most recent apply attempt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apply_status: Option<ApplyStatus>,

    /// Error message from the most recent failed apply.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apply_error: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Default for StagedMeta {
    fn default() -> Self {
        Self {
            enabled: true,
            pending_changes: true,
            last_applied_at: None,
            apply_status: None,
            apply_error: None,
        }
    }
}

impl StagedMeta {
    /// Mark the record as confirmed live.
    pub fn mark_applied(&mut self, at: DateTime<Utc>) {
        self.pending_changes = false;
        self.last_applied_at = Some(at);
        self.apply_status = Some(ApplyStatus::Success);
        self.apply_error = None;
    }

    /// Mark the record's apply attempt as failed; it stays pending.
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.pending_changes = true;
        self.apply_status = Some(ApplyStatus::Failed);
        self.apply_error = Some(error.into());
    }

    /// Mark the record as edited and awaiting apply.
    pub fn mark_pending(&mut self) {
        self.pending_changes = true;
    }
}

/// Access to the shared lifecycle fields of a staged record.
pub trait Staged {
    fn meta(&self) -> &StagedMeta;
    fn meta_mut(&mut self) -> &mut StagedMeta;
    /// Human-readable identity used in apply reports and rule comments.
    fn display_name(&self) -> String;
}

// ============================================================================
// Firewall rules
// ============================================================================

/// Protocol selector for a firewall rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuleProtocol {
    /// Match any protocol; port selectors are invalid and omitted.
    #[default]
    All,
    Tcp,
    Udp,
    /// ICMP; port selectors are invalid and omitted.
    Icmp,
}

impl RuleProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Tcp => "tcp",
            Self::Udp => "udp",
            Self::Icmp => "icmp",
        }
    }

    /// Whether iptables accepts `--sport`/`--dport` for this protocol.
    pub fn supports_ports(&self) -> bool {
        matches!(self, Self::Tcp | Self::Udp)
    }
}

/// Verdict applied by a firewall rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    #[default]
    Accept,
    Drop,
    Reject,
}

impl RuleAction {
    /// iptables jump target for this action.
    pub fn target(&self) -> &'static str {
        match self {
            Self::Accept => "ACCEPT",
            Self::Drop => "DROP",
            Self::Reject => "REJECT",
        }
    }
}

/// A filter rule installed into the managed iptables chain.
///
/// Port fields accept a single port or an iptables-style `start:end`
/// range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirewallRule {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub protocol: RuleProtocol,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_port: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest_port: Option<String>,
    #[serde(default)]
    pub action: RuleAction,
    /// Apply order; smaller wins. Missing sinks to the bottom (999).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
    #[serde(flatten)]
    pub meta: StagedMeta,
}

/// Priority assumed for rules that do not carry one.
pub const DEFAULT_RULE_PRIORITY: u32 = 999;

impl FirewallRule {
    /// Effective apply priority (missing = lowest).
    pub fn effective_priority(&self) -> u32 {
        self.priority.unwrap_or(DEFAULT_RULE_PRIORITY)
    }
}

impl Staged for FirewallRule {
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

// ============================================================================
// Port forwarding
// ============================================================================

/// Protocol selector for a port forward (DNAT requires one).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ForwardProtocol {
    #[default]
    Tcp,
    Udp,
}

impl ForwardProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
        }
    }
}

/// A DNAT port forward plus its companion FORWARD accept rule.
///
/// Port fields accept a single port or a `start-end` range; the dash is
/// the operator-facing convention and is translated to the iptables
/// syntax per flag when the command is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortForwardRule {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub protocol: ForwardProtocol,
    /// External port or `start-end` range.
    pub external_port: String,
    /// Internal destination host.
    pub internal_ip: String,
    /// Internal port or `start-end` range.
    pub internal_port: String,
    #[serde(flatten)]
    pub meta: StagedMeta,
}

impl Staged for PortForwardRule {
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

// ============================================================================
// Static routes
// ============================================================================

/// Kernel route type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RouteType {
    #[default]
    Unicast,
    Blackhole,
    Unreachable,
    Prohibit,
}

impl RouteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unicast => "unicast",
            Self::Blackhole => "blackhole",
            Self::Unreachable => "unreachable",
            Self::Prohibit => "prohibit",
        }
    }
}

/// A static kernel route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticRoute {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    /// Destination: `default` or an IPv4 address / CIDR prefix.
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u32>,
    /// Routing table name or number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default)]
    pub route_type: RouteType,
    #[serde(flatten)]
    pub meta: StagedMeta,
}

impl Staged for StaticRoute {
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

// ============================================================================
// DNS forwarders
// ============================================================================

/// An upstream DNS server pushed to the resolver daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsForwarder {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    /// Upstream server address.
    pub server: String,
    /// Upstream port when not 53.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Restrict forwarding to this domain and its subdomains.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(flatten)]
    pub meta: StagedMeta,
}

impl Staged for DnsForwarder {
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

// ============================================================================
// DHCP static leases
// ============================================================================

/// A fixed DHCP address reservation keyed by MAC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DhcpStaticLease {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    pub mac_address: String,
    pub ip_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(flatten)]
    pub meta: StagedMeta,
}

impl Staged for DhcpStaticLease {
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
