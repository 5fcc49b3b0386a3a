// Router Control - Staged Rule Service
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! One service per staged-rule domain, generic over the domain's
//! apply strategy.
//!
//! The service owns the lifecycle bookkeeping around the reconciler:
//! creates and edits mark the record pending and snapshot it, apply
//! stamps the per-record outcome back onto the rows and snapshots the
//! confirmed state, revert walks pending rows back to their last
//! applied snapshot (or deletes rows that never reached the host).
//! Lifecycle fields are daemon-owned: values a caller sends for them
//! are discarded.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::models::error::Result;
use crate::models::report::ApplyReport;
use crate::models::rules::{Staged, StagedMeta};
use crate::models::snapshot::ConfigKind;
use crate::shell::CommandRunner;
use crate::staging::{ApplyStrategy, Reconciler};
use crate::store::{HasTable, Record, Store, Table};

pub struct RuleService<S: ApplyStrategy> {
    store: Arc<Store>,
    kind: ConfigKind,
    reconciler: Reconciler<S>,
}

impl<S: ApplyStrategy> RuleService<S>
where
    Store: HasTable<S::Rule>,
{
    pub fn new(
        store: Arc<Store>,
        kind: ConfigKind,
        strategy: S,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            store,
            kind,
            reconciler: Reconciler::new(strategy, runner),
        }
    }

    pub fn domain(&self) -> &'static str {
        self.reconciler.domain()
    }

    fn table(&self) -> &Table<S::Rule> {
        self.store.as_ref().table()
    }

    fn snapshot(&self, rule: &S::Rule, applied: bool) -> Result<()> {
        self.store
            .create_snapshot(self.kind, rule.id(), serde_json::to_value(rule)?, applied)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn get_all(&self) -> Vec<S::Rule> {
        self.table().all()
    }

    pub fn get(&self, id: i64) -> Result<S::Rule> {
        self.table().get(id)
    }

    /// Records whose staged state differs from what was last confirmed.
    pub fn pending_count(&self) -> usize {
        self.table()
            .all()
            .iter()
            .filter(|r| r.meta().pending_changes)
            .count()
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Validate and stage a new record. The record starts pending and
    /// never-applied regardless of the lifecycle fields in the payload.
    pub fn create(&self, mut rule: S::Rule) -> Result<S::Rule> {
        self.reconciler.strategy().validate(&rule)?;
        let enabled = rule.meta().enabled;
        *rule.meta_mut() = StagedMeta {
            enabled,
            ..StagedMeta::default()
        };
        let stored = self.table().insert(rule)?;
        self.snapshot(&stored, false)?;
        info!(
            "Created {} rule #{} '{}'",
            self.domain(),
            stored.id(),
            stored.display_name()
        );
        Ok(stored)
    }

    /// Validate and stage an edit. Apply history carries over from the
    /// stored row; only `enabled` is taken from the payload's meta.
    pub fn update(&self, mut rule: S::Rule) -> Result<S::Rule> {
        self.reconciler.strategy().validate(&rule)?;
        let existing = self.get(rule.id())?;
        let enabled = rule.meta().enabled;
        *rule.meta_mut() = existing.meta().clone();
        rule.meta_mut().enabled = enabled;
        rule.meta_mut().mark_pending();
        let stored = self.table().update(rule)?;
        self.snapshot(&stored, false)?;
        Ok(stored)
    }

    /// Remove the row. A previously applied record's live entry stays
    /// on the host until the next apply rebuilds without it.
    pub fn delete(&self, id: i64) -> Result<S::Rule> {
        let removed = self.table().remove(id)?;
        info!(
            "Deleted {} rule #{} '{}'",
            self.domain(),
            id,
            removed.display_name()
        );
        Ok(removed)
    }

    pub fn toggle_enabled(&self, id: i64) -> Result<S::Rule> {
        let updated = self.table().modify(id, |r| {
            let meta = r.meta_mut();
            meta.enabled = !meta.enabled;
            meta.pending_changes = true;
        })?;
        self.snapshot(&updated, false)?;
        Ok(updated)
    }

    /// Reconcile every record onto the host and write the per-record
    /// outcomes back.
    ///
    /// On a completed batch, successes are stamped applied and
    /// snapshotted, failures keep their pending flag with the error,
    /// and disabled records are marked reconciled since their absence
    /// is now the live state. A batch that never completed (`begin` or
    /// `commit` failed) marks every enabled record failed.
    pub fn apply_all(&self) -> Result<ApplyReport> {
        let rules = self.table().all();
        match self.reconciler.apply_batch(&rules) {
            Ok(result) => {
                let now = Utc::now();
                for id in &result.succeeded {
                    let updated = self.table().modify(*id, |r| r.meta_mut().mark_applied(now))?;
                    self.snapshot(&updated, true)?;
                }
                for (id, reason) in &result.failed {
                    let reason = reason.clone();
                    self.table()
                        .modify(*id, move |r| r.meta_mut().mark_failed(reason))?;
                }
                for rule in rules.iter().filter(|r| !r.meta().enabled) {
                    self.table()
                        .modify(rule.id(), |r| r.meta_mut().pending_changes = false)?;
                }
                Ok(result.report)
            }
            Err(e) => {
                let reason = e.to_string();
                for rule in rules.iter().filter(|r| r.meta().enabled) {
                    let reason = reason.clone();
                    let _ = self
                        .table()
                        .modify(rule.id(), move |r| r.meta_mut().mark_failed(reason));
                }
                Err(e)
            }
        }
    }

    /// Walk back staged-but-unapplied state. Returns how many records
    /// were reverted.
    ///
    /// A pending record that never reached the host is deleted; one
    /// with an applied history is overwritten from its last applied
    /// snapshot.
    pub fn revert(&self) -> Result<usize> {
        let mut reverted = 0;
        for rule in self.table().all() {
            if !rule.meta().pending_changes {
                continue;
            }
            if rule.meta().last_applied_at.is_none() {
                self.table().remove(rule.id())?;
                info!(
                    "Reverted {} rule #{} (never applied, deleted)",
                    self.domain(),
                    rule.id()
                );
                reverted += 1;
                continue;
            }
            match self.store.last_applied_snapshot(self.kind, rule.id()) {
                Some(snap) => {
                    let mut restored: S::Rule = serde_json::from_value(snap.data.clone())?;
                    restored.set_id(rule.id());
                    restored.meta_mut().pending_changes = false;
                    self.table().update(restored)?;
                    reverted += 1;
                }
                None => {
                    warn!(
                        "No applied snapshot for {} rule #{}, leaving as-is",
                        self.domain(),
                        rule.id()
                    );
                }
            }
        }
        Ok(reverted)
    }
}
