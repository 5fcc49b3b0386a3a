// Router Control - DNS Forwarder Applier
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Upstream DNS forwarders rendered into a dnsmasq drop-in.
//!
//! Each enabled record becomes one `server=` line. The whole drop-in is
//! rewritten on every apply and dnsmasq is restarted, so an empty batch
//! leaves an empty (but still managed) file and no stale forwarders.
//!
//! Line forms, matching dnsmasq syntax:
//!   `server=1.1.1.1`
//!   `server=10.2.0.53#5353`
//!   `server=/corp.example/10.2.0.53`

use std::path::PathBuf;

use crate::models::error::{Error, Result};
use crate::models::rules::DnsForwarder;
use crate::models::validation;
use crate::shell::CommandRunner;
use crate::staging::{commit_dnsmasq_file, ApplyStrategy};

pub struct DnsStrategy {
    conf_path: PathBuf,
}

impl DnsStrategy {
    pub fn new(conf_path: impl Into<PathBuf>) -> Self {
        Self {
            conf_path: conf_path.into(),
        }
    }

    fn server_line(rule: &DnsForwarder) -> String {
        let mut upstream = rule.server.clone();
        if let Some(port) = rule.port {
            upstream.push('#');
            upstream.push_str(&port.to_string());
        }
        match &rule.domain {
            Some(domain) => format!("server=/{}/{}", domain, upstream),
            None => format!("server={}", upstream),
        }
    }
}

impl ApplyStrategy for DnsStrategy {
    type Rule = DnsForwarder;

    fn domain(&self) -> &'static str {
        "dns"
    }

    fn validate(&self, rule: &DnsForwarder) -> Result<()> {
        validation::validate_name(&rule.name)?;
        validation::validate_ipv4(&rule.server)?;
        if let Some(port) = rule.port {
            validation::validate_port(u32::from(port))?;
        }
        if let Some(domain) = &rule.domain {
            // Embedded in server=/domain/addr, so slashes would change
            // the line's meaning.
            if domain.trim().is_empty()
                || domain.contains('/')
                || domain.contains(char::is_whitespace)
            {
                return Err(Error::ValidationFailed(format!(
                    "invalid forward domain: {}",
                    domain
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
        rule: &DnsForwarder,
    ) -> Result<()> {
        lines.push(Self::server_line(rule));
        Ok(())
    }

    fn commit(&self, runner: &dyn CommandRunner, lines: &[String]) -> Result<()> {
        commit_dnsmasq_file(runner, &self.conf_path, lines)
    }
}
