// Router Control - Validation Utilities
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Input validation utilities for ports and staged rules.
//!
//! All validators are pure functions that reject malformed input before
//! any system call is made. Port-range syntax differs by domain on
//! purpose: firewall rules use `start:end` (the iptables `--dport`
//! syntax), port forwards use `start-end` (the range convention the
//! operator enters). Both are kept, not unified.

use std::net::Ipv4Addr;
use std::str::FromStr;

use super::error::{Error, Result};

/// Separator accepted inside a port-range specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeSeparator {
    /// `start:end` (firewall rules, matches iptables).
    Colon,
    /// `start-end` (port forwards).
    Dash,
}

impl RangeSeparator {
    pub fn as_char(&self) -> char {
        match self {
            Self::Colon => ':',
            Self::Dash => '-',
        }
    }
}

/// Validate an IPv4 address string (dotted quad, each octet 0-255).
pub fn validate_ipv4(s: &str) -> Result<Ipv4Addr> {
    Ipv4Addr::from_str(s).map_err(|_| Error::InvalidIpAddress(s.to_string()))
}

/// Validate a CIDR prefix length (0-32).
pub fn validate_prefix(prefix: u8) -> Result<u8> {
    if prefix > 32 {
        return Err(Error::InvalidPrefix(format!(
            "prefix {} exceeds maximum 32",
            prefix
        )));
    }
    Ok(prefix)
}

/// Validate a CIDR notation string (e.g., "192.168.1.0/24").
pub fn validate_cidr(s: &str) -> Result<(Ipv4Addr, u8)> {
    let parts: Vec<&str> = s.split('/').collect();
    if parts.len() != 2 {
        return Err(Error::InvalidIpAddress(format!(
            "Invalid CIDR notation: {}",
            s
        )));
    }

    let ip = validate_ipv4(parts[0])?;
    let prefix: u8 = parts[1]
        .parse()
        .map_err(|_| Error::InvalidPrefix(format!("Invalid prefix: {}", parts[1])))?;

    Ok((ip, validate_prefix(prefix)?))
}

/// Convert a dotted-quad netmask to a CIDR prefix length.
///
/// Only contiguous masks are valid (e.g., `255.255.255.0`); a mask with
/// holes like `255.0.255.0` is rejected.
pub fn netmask_to_prefix(netmask: &str) -> Result<u8> {
    let addr = Ipv4Addr::from_str(netmask)
        .map_err(|_| Error::InvalidNetmask(netmask.to_string()))?;
    let bits = u32::from(addr);

    let prefix = bits.count_ones();
    // Contiguity check: the mask must be exactly `prefix` leading ones.
    if prefix > 0 && bits.leading_ones() != prefix {
        return Err(Error::InvalidNetmask(format!(
            "netmask is not contiguous: {}",
            netmask
        )));
    }

    Ok(prefix as u8)
}

/// Convert a CIDR prefix length to a dotted-quad netmask.
pub fn prefix_to_netmask(prefix: u8) -> Result<String> {
    validate_prefix(prefix)?;
    let bits: u32 = if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix))
    };
    Ok(Ipv4Addr::from(bits).to_string())
}

/// Validate a dotted-quad netmask string.
pub fn validate_netmask(s: &str) -> Result<()> {
    netmask_to_prefix(s).map(|_| ())
}

/// Validate a single port number (1-65535).
pub fn validate_port(port: u32) -> Result<u16> {
    if port == 0 || port > 65535 {
        return Err(Error::InvalidPort(format!(
            "port must be 1-65535: {}",
            port
        )));
    }
    Ok(port as u16)
}

/// Validate a port specification: a single port or a range.
///
/// The range separator is domain-specific (see [`RangeSeparator`]).
/// For ranges, both bounds are validated and `start <= end` is required.
pub fn validate_port_spec(spec: &str, separator: RangeSeparator) -> Result<()> {
    let sep = separator.as_char();

    if let Some((start, end)) = spec.split_once(sep) {
        let start: u32 = start
            .parse()
            .map_err(|_| Error::InvalidPortRange(spec.to_string()))?;
        let end: u32 = end
            .parse()
            .map_err(|_| Error::InvalidPortRange(spec.to_string()))?;
        let start = validate_port(start)?;
        let end = validate_port(end)?;
        if start > end {
            return Err(Error::InvalidPortRange(format!(
                "range start exceeds end: {}",
                spec
            )));
        }
        return Ok(());
    }

    let port: u32 = spec
        .parse()
        .map_err(|_| Error::InvalidPort(spec.to_string()))?;
    validate_port(port).map(|_| ())
}

/// Validate a route target: "default" or an IPv4 CIDR / host address.
pub fn validate_route_target(s: &str) -> Result<()> {
    if s == "default" {
        return Ok(());
    }
    if s.contains('/') {
        return validate_cidr(s).map(|_| ());
    }
    validate_ipv4(s).map(|_| ())
}

/// Validate a MAC address string, normalizing to uppercase colon form.
pub fn validate_mac_address(s: &str) -> Result<String> {
    // Accept formats: AA:BB:CC:DD:EE:FF or AA-BB-CC-DD-EE-FF
    let normalized = s.replace('-', ":").to_uppercase();
    let parts: Vec<&str> = normalized.split(':').collect();

    if parts.len() != 6 {
        return Err(Error::InvalidMacAddress(s.to_string()));
    }

    for part in &parts {
        if part.len() != 2 || !part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidMacAddress(s.to_string()));
        }
    }

    Ok(normalized)
}

/// Validate a rule or port name.
pub fn validate_name(s: &str) -> Result<String> {
    let s = s.trim();
    if s.is_empty() {
        return Err(Error::ValidationFailed("name cannot be empty".to_string()));
    }
    if s.len() > 100 {
        return Err(Error::ValidationFailed(
            "name must be 100 characters or less".to_string(),
        ));
    }
    Ok(s.to_string())
}
