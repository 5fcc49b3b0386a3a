// Router Control - Firewall Applier
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Filter rules in a dedicated iptables chain.
//!
//! All managed rules live in `ROUTERCTL_RULES` (filter table), jumped
//! to from `FORWARD`. Apply flushes the chain and rebuilds it from the
//! enabled records in priority order, so deleted or disabled records
//! disappear without per-rule bookkeeping. Rules carry the record name
//! as an iptables comment so `iptables -L` output maps back to
//! records.

use crate::models::error::{Error, Result};
use crate::models::rules::{FirewallRule, RuleProtocol};
use crate::models::validation::{self, RangeSeparator};
use crate::shell::CommandRunner;
use crate::staging::{ensure_managed_chain, run_args, ApplyStrategy};

/// Managed filter chain.
pub const FIREWALL_CHAIN: &str = "ROUTERCTL_RULES";

pub struct FirewallStrategy;

impl FirewallStrategy {
    fn build_args(rule: &FirewallRule) -> Vec<String> {
        let mut args: Vec<String> = vec!["-A".to_string(), FIREWALL_CHAIN.to_string()];
        if rule.protocol != RuleProtocol::All {
            args.push("-p".to_string());
            args.push(rule.protocol.as_str().to_string());
        }
        if let Some(ip) = &rule.source_ip {
            args.push("-s".to_string());
            args.push(ip.clone());
        }
        if rule.protocol.supports_ports() {
            if let Some(port) = &rule.source_port {
                args.push("--sport".to_string());
                args.push(port.clone());
            }
        }
        if let Some(ip) = &rule.dest_ip {
            args.push("-d".to_string());
            args.push(ip.clone());
        }
        if rule.protocol.supports_ports() {
            if let Some(port) = &rule.dest_port {
                args.push("--dport".to_string());
                args.push(port.clone());
            }
        }
        args.push("-j".to_string());
        args.push(rule.action.target().to_string());
        args.push("-m".to_string());
        args.push("comment".to_string());
        args.push("--comment".to_string());
        args.push(rule.name.clone());
        args
    }
}

impl ApplyStrategy for FirewallStrategy {
    type Rule = FirewallRule;

    fn domain(&self) -> &'static str {
        "firewall"
    }

    /// Ascending priority; records without one sink to the bottom.
    /// Ties keep creation order via the id.
    fn order(&self, rules: &mut Vec<FirewallRule>) {
        rules.sort_by_key(|r| (r.effective_priority(), r.id));
    }

    fn validate(&self, rule: &FirewallRule) -> Result<()> {
        validation::validate_name(&rule.name)?;
        if let Some(ip) = &rule.source_ip {
            validation::validate_ipv4(ip)?;
        }
        if let Some(ip) = &rule.dest_ip {
            validation::validate_ipv4(ip)?;
        }
        if let Some(port) = &rule.source_port {
            validation::validate_port_spec(port, RangeSeparator::Colon)?;
        }
        if let Some(port) = &rule.dest_port {
            validation::validate_port_spec(port, RangeSeparator::Colon)?;
        }
        Ok(())
    }

    fn begin(&self, runner: &dyn CommandRunner) -> Result<()> {
        ensure_managed_chain(runner, None, FIREWALL_CHAIN, "FORWARD")
    }

    fn emit(
        &self,
        runner: &dyn CommandRunner,
        _lines: &mut Vec<String>,
        rule: &FirewallRule,
    ) -> Result<()> {
        let args = Self::build_args(rule);
        let out = run_args(runner, "iptables", &args)?;
        if !out.success() {
            return Err(Error::apply_failed(&rule.name, out.error_message()));
        }
        Ok(())
    }
}
