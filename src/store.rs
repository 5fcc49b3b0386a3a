// Router Control - Persistent Store
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Authoritative storage for staged configuration.
//!
//! One JSON file per table under the state directory; each file
//! carries a schema version stamp and a `next_id` counter, so record
//! ids are never reused after deletion. Unlike a cache, this data is
//! the source of truth for apply, so the store fails fast when a file
//! cannot be opened or its schema does not match.
//!
//! Tables use RwLock for thread-safe access. Lock poisoning is handled
//! gracefully by recovering the inner value, as poison indicates a
//! panic in another thread but the data itself may still be valid.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::models::error::{Error, Result};
use crate::models::port::ConfiguredPort;
use crate::models::rules::{
    DhcpStaticLease, DnsForwarder, FirewallRule, PortForwardRule, StaticRoute,
};
use crate::models::schema::SchemaVersion;
use crate::models::snapshot::{ConfigKind, ConfigSnapshot};

/// Snapshot rows kept per record when nothing else is configured.
pub const DEFAULT_SNAPSHOT_RETENTION: usize = 10;

/// A persisted record with a stable integer identity.
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync {
    /// Table name; also the file stem and the kind in error messages.
    const KIND: &'static str;
    fn id(&self) -> i64;
    fn set_id(&mut self, id: i64);
}

// ============================================================================
// Record implementations
// ============================================================================

impl Record for ConfiguredPort {
    const KIND: &'static str = "ports";
    fn id(&self) -> i64 {
        self.id
    }
    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}

impl Record for FirewallRule {
    const KIND: &'static str = "firewall_rules";
    fn id(&self) -> i64 {
        self.id
    }
    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}

impl Record for PortForwardRule {
    const KIND: &'static str = "port_forwards";
    fn id(&self) -> i64 {
        self.id
    }
    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}

impl Record for StaticRoute {
    const KIND: &'static str = "static_routes";
    fn id(&self) -> i64 {
        self.id
    }
    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}

impl Record for DnsForwarder {
    const KIND: &'static str = "dns_forwarders";
    fn id(&self) -> i64 {
        self.id
    }
    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}

impl Record for DhcpStaticLease {
    const KIND: &'static str = "dhcp_leases";
    fn id(&self) -> i64 {
        self.id
    }
    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}

impl Record for ConfigSnapshot {
    const KIND: &'static str = "config_snapshots";
    fn id(&self) -> i64 {
        self.id
    }
    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}

// ============================================================================
// Table
// ============================================================================

/// On-disk shape of one table file.
#[derive(Debug, Serialize, Deserialize)]
struct TableFile<T> {
    schema: SchemaVersion,
    next_id: i64,
    records: Vec<T>,
}

#[derive(Debug)]
struct TableData<T> {
    next_id: i64,
    records: Vec<T>,
}

/// One persisted table of records.
#[derive(Debug)]
pub struct Table<T: Record> {
    file: PathBuf,
    data: RwLock<TableData<T>>,
}

impl<T: Record> Table<T> {
    /// Load the table, creating an empty one when the file is absent.
    fn open(state_dir: &Path) -> Result<Self> {
        let file = state_dir.join(format!("{}.json", T::KIND));
        let data = if file.exists() {
            let handle = File::open(&file).map_err(|e| {
                Error::StoreUnavailable(format!("{}: {}", file.display(), e))
            })?;
            let parsed: TableFile<T> = serde_json::from_reader(BufReader::new(handle))
                .map_err(|e| {
                    Error::StoreUnavailable(format!("{}: {}", file.display(), e))
                })?;
            parsed.schema.ensure_compatible()?;
            debug!("Loaded {} {} record(s)", parsed.records.len(), T::KIND);
            TableData {
                next_id: parsed.next_id,
                records: parsed.records,
            }
        } else {
            TableData {
                next_id: 1,
                records: Vec::new(),
            }
        };
        Ok(Self {
            file,
            data: RwLock::new(data),
        })
    }

    // ------------------------------------------------------------------
    // RwLock helpers (handle poisoning gracefully)
    // ------------------------------------------------------------------

    fn read_lock<R>(&self, reader: impl FnOnce(&TableData<T>) -> R) -> R {
        match self.data.read() {
            Ok(guard) => reader(&guard),
            Err(poisoned) => {
                warn!("RwLock poisoned reading {}, recovering", T::KIND);
                reader(&poisoned.into_inner())
            }
        }
    }

    fn write_lock<R>(&self, writer: impl FnOnce(&mut TableData<T>) -> R) -> R {
        match self.data.write() {
            Ok(mut guard) => writer(&mut guard),
            Err(poisoned) => {
                warn!("RwLock poisoned writing {}, recovering", T::KIND);
                writer(&mut poisoned.into_inner())
            }
        }
    }

    // ------------------------------------------------------------------
    // CRUD
    // ------------------------------------------------------------------

    pub fn all(&self) -> Vec<T> {
        self.read_lock(|data| data.records.clone())
    }

    pub fn get(&self, id: i64) -> Result<T> {
        self.read_lock(|data| data.records.iter().find(|r| r.id() == id).cloned())
            .ok_or(Error::RecordNotFound { kind: T::KIND, id })
    }

    pub fn count(&self) -> usize {
        self.read_lock(|data| data.records.len())
    }

    /// Insert with a fresh id and persist. Returns the stored record.
    pub fn insert(&self, mut record: T) -> Result<T> {
        let stored = self.write_lock(|data| {
            record.set_id(data.next_id);
            data.next_id += 1;
            data.records.push(record.clone());
            record
        });
        self.save()?;
        Ok(stored)
    }

    /// Replace the record with the same id and persist.
    pub fn update(&self, record: T) -> Result<T> {
        let id = record.id();
        let replaced = self.write_lock(|data| {
            match data.records.iter_mut().find(|r| r.id() == id) {
                Some(slot) => {
                    *slot = record.clone();
                    true
                }
                None => false,
            }
        });
        if !replaced {
            return Err(Error::RecordNotFound { kind: T::KIND, id });
        }
        self.save()?;
        Ok(record)
    }

    /// Mutate a record in place and persist. Returns the updated copy.
    pub fn modify(&self, id: i64, f: impl FnOnce(&mut T)) -> Result<T> {
        let updated = self.write_lock(|data| {
            data.records.iter_mut().find(|r| r.id() == id).map(|slot| {
                f(slot);
                slot.clone()
            })
        });
        let updated = updated.ok_or(Error::RecordNotFound { kind: T::KIND, id })?;
        self.save()?;
        Ok(updated)
    }

    /// Delete by id and persist. Returns the removed record.
    pub fn remove(&self, id: i64) -> Result<T> {
        let removed = self.write_lock(|data| {
            let pos = data.records.iter().position(|r| r.id() == id)?;
            Some(data.records.remove(pos))
        });
        let removed = removed.ok_or(Error::RecordNotFound { kind: T::KIND, id })?;
        self.save()?;
        Ok(removed)
    }

    /// Keep only records matching the predicate and persist.
    pub fn retain(&self, f: impl FnMut(&T) -> bool) -> Result<()> {
        self.write_lock(|data| data.records.retain(f));
        self.save()
    }

    fn save(&self) -> Result<()> {
        let snapshot = self.read_lock(|data| TableFile {
            schema: SchemaVersion::current(),
            next_id: data.next_id,
            records: data.records.clone(),
        });
        let handle = File::create(&self.file).map_err(|e| {
            Error::ConfigWriteFailed(format!("{}: {}", self.file.display(), e))
        })?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&self.file, fs::Permissions::from_mode(0o600));
        }
        serde_json::to_writer_pretty(BufWriter::new(handle), &snapshot).map_err(|e| {
            Error::ConfigWriteFailed(format!("{}: {}", self.file.display(), e))
        })?;
        Ok(())
    }
}

// ============================================================================
// Store
// ============================================================================

/// Gives generic services access to the table for their record type.
pub trait HasTable<T: Record> {
    fn table(&self) -> &Table<T>;
}

/// All persisted tables plus the snapshot service.
#[derive(Debug)]
pub struct Store {
    state_dir: PathBuf,
    snapshot_retention: usize,
    ports: Table<ConfiguredPort>,
    firewall_rules: Table<FirewallRule>,
    port_forwards: Table<PortForwardRule>,
    static_routes: Table<StaticRoute>,
    dns_forwarders: Table<DnsForwarder>,
    dhcp_leases: Table<DhcpStaticLease>,
    snapshots: Table<ConfigSnapshot>,
}

impl Store {
    /// Open (or initialize) the store under `state_dir`.
    pub fn open(state_dir: impl Into<PathBuf>, snapshot_retention: usize) -> Result<Self> {
        let state_dir = state_dir.into();
        fs::create_dir_all(&state_dir).map_err(|e| {
            Error::StoreUnavailable(format!("{}: {}", state_dir.display(), e))
        })?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&state_dir, fs::Permissions::from_mode(0o700));
        }

        let store = Self {
            ports: Table::open(&state_dir)?,
            firewall_rules: Table::open(&state_dir)?,
            port_forwards: Table::open(&state_dir)?,
            static_routes: Table::open(&state_dir)?,
            dns_forwarders: Table::open(&state_dir)?,
            dhcp_leases: Table::open(&state_dir)?,
            snapshots: Table::open(&state_dir)?,
            snapshot_retention,
            state_dir,
        };
        info!("Store opened at {}", store.state_dir.display());
        Ok(store)
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    /// Append a snapshot row, then prune that record's history to the
    /// configured retention. Rows are never mutated after creation.
    pub fn create_snapshot(
        &self,
        kind: ConfigKind,
        config_id: i64,
        data: serde_json::Value,
        applied: bool,
    ) -> Result<ConfigSnapshot> {
        let now = Utc::now();
        let snapshot = self.snapshots.insert(ConfigSnapshot {
            id: 0,
            kind,
            config_id,
            data,
            created_at: now,
            applied_at: if applied { Some(now) } else { None },
        })?;

        let mut history: Vec<ConfigSnapshot> = self
            .snapshots
            .all()
            .into_iter()
            .filter(|s| s.kind == kind && s.config_id == config_id)
            .collect();
        if history.len() > self.snapshot_retention {
            history.sort_by_key(|s| (s.created_at, s.id));
            let cutoff = history.len() - self.snapshot_retention;
            let stale: Vec<i64> = history[..cutoff].iter().map(|s| s.id).collect();
            self.snapshots
                .retain(|s| !(s.kind == kind && s.config_id == config_id && stale.contains(&s.id)))?;
            debug!(
                "Pruned {} old snapshot(s) for {} #{}",
                stale.len(),
                kind.as_str(),
                config_id
            );
        }
        Ok(snapshot)
    }

    /// Newest snapshot of this record that captured an applied state.
    pub fn last_applied_snapshot(
        &self,
        kind: ConfigKind,
        config_id: i64,
    ) -> Option<ConfigSnapshot> {
        let mut applied: Vec<ConfigSnapshot> = self
            .snapshots
            .all()
            .into_iter()
            .filter(|s| s.kind == kind && s.config_id == config_id && s.is_applied())
            .collect();
        applied.sort_by_key(|s| (s.created_at, s.id));
        applied.pop()
    }

    /// All snapshots of one record, oldest first.
    pub fn snapshots_for(&self, kind: ConfigKind, config_id: i64) -> Vec<ConfigSnapshot> {
        let mut rows: Vec<ConfigSnapshot> = self
            .snapshots
            .all()
            .into_iter()
            .filter(|s| s.kind == kind && s.config_id == config_id)
            .collect();
        rows.sort_by_key(|s| (s.created_at, s.id));
        rows
    }
}

impl HasTable<ConfiguredPort> for Store {
    fn table(&self) -> &Table<ConfiguredPort> {
        &self.ports
    }
}

impl HasTable<FirewallRule> for Store {
    fn table(&self) -> &Table<FirewallRule> {
        &self.firewall_rules
    }
}

impl HasTable<PortForwardRule> for Store {
    fn table(&self) -> &Table<PortForwardRule> {
        &self.port_forwards
    }
}

impl HasTable<StaticRoute> for Store {
    fn table(&self) -> &Table<StaticRoute> {
        &self.static_routes
    }
}

impl HasTable<DnsForwarder> for Store {
    fn table(&self) -> &Table<DnsForwarder> {
        &self.dns_forwarders
    }
}

impl HasTable<DhcpStaticLease> for Store {
    fn table(&self) -> &Table<DhcpStaticLease> {
        &self.dhcp_leases
    }
}
