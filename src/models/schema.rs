// Router Control - Schema Versioning
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Version stamp carried by every persisted table file.
//!
//! A table loads when its major matches ours and its minor does not
//! exceed ours; patch level never matters. Files stamped by a newer
//! minor or a different major refuse to load.

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::models::error::{Error, Result};

/// Stamp written into table files by this build.
pub const CURRENT_SCHEMA_VERSION: &str = "1.0.0";

/// Semver stamp read from and written to table files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaVersion(String);

impl SchemaVersion {
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    /// The stamp this build writes.
    pub fn current() -> Self {
        Self(CURRENT_SCHEMA_VERSION.to_string())
    }

    fn semver(&self) -> Option<Version> {
        Version::parse(&self.0).ok()
    }

    /// Whether a file carrying this stamp is loadable by this build.
    /// Unparseable stamps never are.
    pub fn is_compatible(&self) -> bool {
        let ours = match Version::parse(CURRENT_SCHEMA_VERSION) {
            Ok(v) => v,
            Err(_) => return false,
        };
        match self.semver() {
            Some(theirs) => theirs.major == ours.major && theirs.minor <= ours.minor,
            None => false,
        }
    }

    /// Compatibility check that names the offending stamp on failure.
    pub fn ensure_compatible(&self) -> Result<()> {
        if self.is_compatible() {
            Ok(())
        } else {
            Err(Error::SchemaMismatch {
                expected: CURRENT_SCHEMA_VERSION.to_string(),
                found: self.to_string(),
            })
        }
    }
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self::current()
    }
}

impl std::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
