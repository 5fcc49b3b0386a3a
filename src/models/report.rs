// Router Control - Apply Reports
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Aggregated outcome of a batch apply.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One record that failed during a batch apply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyFailure {
    /// Display name of the failing record.
    pub name: String,
    /// Why it failed, verbatim from the applier.
    pub error: String,
}

/// Outcome of reconciling one domain's enabled records onto the host.
///
/// A batch never aborts on a per-record failure; the report carries
/// every failure alongside the success count so the caller can mark
/// each record individually.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyReport {
    /// Domain the batch ran against ("firewall", "routes", ...).
    pub domain: String,
    /// Enabled records the batch attempted.
    pub total: usize,
    /// Records confirmed live.
    pub applied: usize,
    /// Records that failed, with reasons.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<ApplyFailure>,
    pub finished_at: DateTime<Utc>,
}

impl ApplyReport {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            total: 0,
            applied: 0,
            failures: Vec::new(),
            finished_at: Utc::now(),
        }
    }

    pub fn record_success(&mut self) {
        self.total += 1;
        self.applied += 1;
    }

    pub fn record_failure(&mut self, name: impl Into<String>, error: impl Into<String>) {
        self.total += 1;
        self.failures.push(ApplyFailure {
            name: name.into(),
            error: error.into(),
        });
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// True when every attempted record was applied.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// One-line human summary for responses and logs.
    pub fn summary(&self) -> String {
        if self.failures.is_empty() {
            format!("applied {} {} change(s)", self.applied, self.domain)
        } else {
            let detail: Vec<String> = self
                .failures
                .iter()
                .map(|f| format!("{}: {}", f.name, f.error))
                .collect();
            format!(
                "{} of {} failed: {}",
                self.failures.len(),
                self.total,
                detail.join("; ")
            )
        }
    }
}

impl fmt::Display for ApplyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}
