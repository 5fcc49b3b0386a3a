// Router Control - DHCP Reservation Applier
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Static DHCP leases rendered into a dnsmasq drop-in.
//!
//! One `dhcp-host=` line per enabled reservation, MAC normalized to the
//! canonical colon form so the same device entered as `aa-bb-...` and
//! `AA:BB:...` cannot produce two conflicting lines. Same rewrite model
//! as the DNS drop-in: full file per apply, then a dnsmasq restart.

use std::path::PathBuf;

use crate::models::error::{Error, Result};
use crate::models::rules::DhcpStaticLease;
use crate::models::validation;
use crate::shell::CommandRunner;
use crate::staging::{commit_dnsmasq_file, ApplyStrategy};

pub struct DhcpStrategy {
    conf_path: PathBuf,
}

impl DhcpStrategy {
    pub fn new(conf_path: impl Into<PathBuf>) -> Self {
        Self {
            conf_path: conf_path.into(),
        }
    }

    fn host_line(rule: &DhcpStaticLease) -> Result<String> {
        let mac = validation::validate_mac_address(&rule.mac_address)?;
        let mut line = format!("dhcp-host={},{}", mac, rule.ip_address);
        if let Some(hostname) = &rule.hostname {
            line.push(',');
            line.push_str(hostname);
        }
        Ok(line)
    }
}

impl ApplyStrategy for DhcpStrategy {
    type Rule = DhcpStaticLease;

    fn domain(&self) -> &'static str {
        "dhcp"
    }

    fn validate(&self, rule: &DhcpStaticLease) -> Result<()> {
        validation::validate_name(&rule.name)?;
        validation::validate_mac_address(&rule.mac_address)?;
        validation::validate_ipv4(&rule.ip_address)?;
        if let Some(hostname) = &rule.hostname {
            // Hostnames ride in a comma-separated dnsmasq line.
            if hostname.trim().is_empty()
                || hostname.contains(',')
                || hostname.contains(char::is_whitespace)
            {
                return Err(Error::ValidationFailed(format!(
                    "invalid hostname: {}",
                    hostname
                )));
            }
        }
        Ok(())
    }

    fn begin(&self, _runner: &dyn CommandRunner) -> Result<()> {
        Ok(())
    }

    fn emit(
        &self,
        _runner: &dyn CommandRunner,
        lines: &mut Vec<String>,
        rule: &DhcpStaticLease,
    ) -> Result<()> {
        lines.push(Self::host_line(rule)?);
        Ok(())
    }

    fn commit(&self, runner: &dyn CommandRunner, lines: &[String]) -> Result<()> {
        commit_dnsmasq_file(runner, &self.conf_path, lines)
    }
}
