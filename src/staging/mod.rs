// Router Control - Staged-Change Engine
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Shared reconciliation engine for the five apply domains.
//!
//! Every domain follows the same clear-and-rebuild shape: `begin`
//! clears whatever this daemon manages on the host, `emit` installs
//! one enabled record (or contributes its file lines), and `commit`
//! finalizes file-backed domains. A record that fails validation or
//! emission is collected into the report and the batch keeps going;
//! `begin` and `commit` failures abort the whole batch because nothing
//! (or everything) is live at that point.
//!
//! One batch per domain runs at a time; different domains may run
//! concurrently.

pub mod dhcp;
pub mod dns;
pub mod firewall;
pub mod forwarding;
pub mod routes;

use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing::{debug, info, trace, warn};

use crate::models::error::{Error, Result};
use crate::models::report::ApplyReport;
use crate::models::rules::Staged;
use crate::shell::{CommandOutput, CommandRunner};
use crate::store::Record;

/// How one domain reconciles its records onto the host.
pub trait ApplyStrategy {
    type Rule: Staged + Record;

    /// Domain name used in reports and logs.
    fn domain(&self) -> &'static str;

    fn is_enabled(&self, rule: &Self::Rule) -> bool {
        rule.meta().enabled
    }

    fn rule_name(&self, rule: &Self::Rule) -> String {
        rule.display_name()
    }

    /// Reorder the enabled batch before emission. Most domains keep
    /// store order; firewall sorts by priority.
    fn order(&self, _rules: &mut Vec<Self::Rule>) {}

    /// Check one record without touching the host.
    fn validate(&self, rule: &Self::Rule) -> Result<()>;

    /// Clear all managed state for this domain.
    fn begin(&self, runner: &dyn CommandRunner) -> Result<()>;

    /// Install one record. File-backed domains push lines instead of
    /// running commands.
    fn emit(
        &self,
        runner: &dyn CommandRunner,
        lines: &mut Vec<String>,
        rule: &Self::Rule,
    ) -> Result<()>;

    /// Finalize the batch. Command-backed domains have nothing to do.
    fn commit(&self, _runner: &dyn CommandRunner, _lines: &[String]) -> Result<()> {
        Ok(())
    }
}

/// Per-record outcome of a batch, keyed by record id.
#[derive(Debug)]
pub struct BatchResult {
    pub report: ApplyReport,
    /// Ids confirmed live.
    pub succeeded: Vec<i64>,
    /// Ids that failed, with the reason.
    pub failed: Vec<(i64, String)>,
}

/// Runs one domain's strategy under that domain's serialization lock.
pub struct Reconciler<S: ApplyStrategy> {
    strategy: S,
    runner: Arc<dyn CommandRunner>,
    guard: Mutex<()>,
}

impl<S: ApplyStrategy> Reconciler<S> {
    pub fn new(strategy: S, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            strategy,
            runner,
            guard: Mutex::new(()),
        }
    }

    pub fn domain(&self) -> &'static str {
        self.strategy.domain()
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    /// Reconcile the given records onto the host.
    ///
    /// Disabled records participate by omission: after a successful
    /// batch their absence from the host is the applied state. `Err`
    /// means the batch never reached per-record work (`begin`) or
    /// could not finalize (`commit`); per-record failures are inside
    /// the returned [`BatchResult`].
    pub fn apply_batch(&self, rules: &[S::Rule]) -> Result<BatchResult> {
        let _serialized = match self.guard.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let mut batch: Vec<S::Rule> = rules
            .iter()
            .filter(|r| self.strategy.is_enabled(r))
            .cloned()
            .collect();
        self.strategy.order(&mut batch);
        debug!(
            "Applying {} enabled {} record(s) of {}",
            batch.len(),
            self.domain(),
            rules.len()
        );

        self.strategy.begin(self.runner.as_ref())?;

        let mut report = ApplyReport::new(self.domain());
        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        let mut lines = Vec::new();

        for rule in &batch {
            let outcome = self
                .strategy
                .validate(rule)
                .and_then(|_| self.strategy.emit(self.runner.as_ref(), &mut lines, rule));
            match outcome {
                Ok(()) => {
                    report.record_success();
                    succeeded.push(rule.id());
                }
                Err(e) => {
                    warn!(
                        "Failed to apply {} rule '{}': {}",
                        self.domain(),
                        self.strategy.rule_name(rule),
                        e
                    );
                    report.record_failure(self.strategy.rule_name(rule), e.to_string());
                    failed.push((rule.id(), e.to_string()));
                }
            }
        }

        self.strategy.commit(self.runner.as_ref(), &lines)?;

        report.finished_at = chrono::Utc::now();
        info!("{}", report.summary());
        Ok(BatchResult {
            report,
            succeeded,
            failed,
        })
    }
}

// ============================================================================
// Shared helpers for the domain strategies
// ============================================================================

/// Run with owned args (strategies build argument vectors).
pub(crate) fn run_args(
    runner: &dyn CommandRunner,
    program: &str,
    args: &[String],
) -> Result<CommandOutput> {
    let refs: Vec<&str> = args.iter().map(String::as_str).collect();
    runner.run(program, &refs)
}

/// Make sure a managed chain exists, is empty, and is jumped to from
/// its parent chain exactly once.
///
/// Chain creation failure is swallowed: `-N` on an existing chain
/// exits non-zero and that is the normal steady state. The flush and
/// the jump check must succeed.
pub(crate) fn ensure_managed_chain(
    runner: &dyn CommandRunner,
    table: Option<&str>,
    chain: &str,
    parent: &str,
) -> Result<()> {
    let base: Vec<String> = match table {
        Some(t) => vec!["-t".to_string(), t.to_string()],
        None => Vec::new(),
    };

    let mut create = base.clone();
    create.extend(["-N".to_string(), chain.to_string()]);
    let out = run_args(runner, "iptables", &create)?;
    if !out.success() {
        trace!("Chain {} already exists", chain);
    }

    let mut flush = base.clone();
    flush.extend(["-F".to_string(), chain.to_string()]);
    let out = run_args(runner, "iptables", &flush)?;
    if !out.success() {
        return Err(Error::command_failed(
            format!("iptables -F {}", chain),
            out.error_message(),
        ));
    }

    let mut list = base.clone();
    list.extend(["-S".to_string(), parent.to_string()]);
    let out = run_args(runner, "iptables", &list)?;
    if !out.success() {
        return Err(Error::command_failed(
            format!("iptables -S {}", parent),
            out.error_message(),
        ));
    }
    let jump = format!("-j {}", chain);
    if !out.stdout.lines().any(|line| line.contains(&jump)) {
        let mut insert = base;
        insert.extend([
            "-I".to_string(),
            parent.to_string(),
            "-j".to_string(),
            chain.to_string(),
        ]);
        let out = run_args(runner, "iptables", &insert)?;
        if !out.success() {
            return Err(Error::command_failed(
                format!("iptables -I {} -j {}", parent, chain),
                out.error_message(),
            ));
        }
        debug!("Installed jump from {} to {}", parent, chain);
    }
    Ok(())
}

/// Rewrite a dnsmasq drop-in with the batch's lines and restart the
/// daemon so it picks them up. An empty batch writes an empty file,
/// which is how stale entries disappear.
pub(crate) fn commit_dnsmasq_file(
    runner: &dyn CommandRunner,
    path: &Path,
    lines: &[String],
) -> Result<()> {
    let mut content =
        String::from("# Managed by router-control; edits are overwritten on apply\n");
    for line in lines {
        content.push_str(line);
        content.push('\n');
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::ConfigWriteFailed(format!("{}: {}", parent.display(), e)))?;
    }
    std::fs::write(path, content)
        .map_err(|e| Error::ConfigWriteFailed(format!("{}: {}", path.display(), e)))?;

    let out = runner.run("systemctl", &["restart", "dnsmasq"])?;
    if !out.success() {
        return Err(Error::command_failed(
            "systemctl restart dnsmasq",
            out.error_message(),
        ));
    }
    debug!("Rewrote {} with {} line(s)", path.display(), lines.len());
    Ok(())
}
