// Router Control - Port Forwarding Applier
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! DNAT port forwards plus their companion FORWARD accepts.
//!
//! Each record installs two iptables rules: the DNAT in
//! `ROUTERCTL_DNAT` (nat table, reached from `PREROUTING`) and an
//! accept in `ROUTERCTL_FWD` (filter table, reached from `FORWARD`) so
//! the translated traffic survives a restrictive forward policy. The
//! pair is installed atomically per record: if the accept fails, the
//! DNAT just added is removed again.
//!
//! Records store ranges as `start-end`; iptables wants `start:end` for
//! `--dport` and `start-end` for `--to-destination`, so the separator
//! is translated per flag here.

use tracing::warn;

use crate::models::error::{Error, Result};
use crate::models::rules::PortForwardRule;
use crate::models::validation::{self, RangeSeparator};
use crate::shell::CommandRunner;
use crate::staging::{ensure_managed_chain, run_args, ApplyStrategy};

/// Managed DNAT chain (nat table).
pub const DNAT_CHAIN: &str = "ROUTERCTL_DNAT";

/// Managed accept chain (filter table).
pub const FORWARD_CHAIN: &str = "ROUTERCTL_FWD";

pub struct ForwardingStrategy;

impl ForwardingStrategy {
    /// `--dport` wants the iptables colon form.
    fn dport(spec: &str) -> String {
        spec.replace('-', ":")
    }

    fn dnat_args(rule: &PortForwardRule, verb: &str) -> Vec<String> {
        vec![
            "-t".to_string(),
            "nat".to_string(),
            verb.to_string(),
            DNAT_CHAIN.to_string(),
            "-p".to_string(),
            rule.protocol.as_str().to_string(),
            "--dport".to_string(),
            Self::dport(&rule.external_port),
            "-j".to_string(),
            "DNAT".to_string(),
            "--to-destination".to_string(),
            format!("{}:{}", rule.internal_ip, rule.internal_port),
            "-m".to_string(),
            "comment".to_string(),
            "--comment".to_string(),
            rule.name.clone(),
        ]
    }

    fn accept_args(rule: &PortForwardRule) -> Vec<String> {
        vec![
            "-A".to_string(),
            FORWARD_CHAIN.to_string(),
            "-p".to_string(),
            rule.protocol.as_str().to_string(),
            "-d".to_string(),
            rule.internal_ip.clone(),
            "--dport".to_string(),
            Self::dport(&rule.internal_port),
            "-j".to_string(),
            "ACCEPT".to_string(),
            "-m".to_string(),
            "comment".to_string(),
            "--comment".to_string(),
            rule.name.clone(),
        ]
    }
}

impl ApplyStrategy for ForwardingStrategy {
    type Rule = PortForwardRule;

    fn domain(&self) -> &'static str {
        "forwarding"
    }

    fn validate(&self, rule: &PortForwardRule) -> Result<()> {
        validation::validate_name(&rule.name)?;
        validation::validate_ipv4(&rule.internal_ip)?;
        validation::validate_port_spec(&rule.external_port, RangeSeparator::Dash)?;
        validation::validate_port_spec(&rule.internal_port, RangeSeparator::Dash)?;
        Ok(())
    }

    fn begin(&self, runner: &dyn CommandRunner) -> Result<()> {
        ensure_managed_chain(runner, Some("nat"), DNAT_CHAIN, "PREROUTING")?;
        ensure_managed_chain(runner, None, FORWARD_CHAIN, "FORWARD")
    }

    fn emit(
        &self,
        runner: &dyn CommandRunner,
        _lines: &mut Vec<String>,
        rule: &PortForwardRule,
    ) -> Result<()> {
        let out = run_args(runner, "iptables", &Self::dnat_args(rule, "-A"))?;
        if !out.success() {
            return Err(Error::apply_failed(&rule.name, out.error_message()));
        }

        let out = run_args(runner, "iptables", &Self::accept_args(rule))?;
        if !out.success() {
            // Half-installed forward: take the DNAT back out so the
            // record is either fully live or fully absent.
            match run_args(runner, "iptables", &Self::dnat_args(rule, "-D")) {
                Ok(del) if !del.success() => {
                    warn!(
                        "Could not roll back DNAT for '{}': {}",
                        rule.name,
                        del.error_message()
                    );
                }
                Err(e) => warn!("Could not roll back DNAT for '{}': {}", rule.name, e),
                _ => {}
            }
            return Err(Error::apply_failed(&rule.name, out.error_message()));
        }
        Ok(())
    }
}
