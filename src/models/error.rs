// Router Control - Error Types
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Shared error types for the Router Control daemon.

use thiserror::Error;

/// Result type alias for Router Control operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Router Control operations.
#[derive(Debug, Error)]
pub enum Error {
    // ========================================
    // Validation Errors
    // ========================================
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Invalid IP address: {0}")]
    InvalidIpAddress(String),

    #[error("Invalid netmask: {0}")]
    InvalidNetmask(String),

    #[error("Invalid CIDR prefix: {0}")]
    InvalidPrefix(String),

    #[error("Invalid port: {0}")]
    InvalidPort(String),

    #[error("Invalid port range: {0}")]
    InvalidPortRange(String),

    #[error("Invalid MAC address: {0}")]
    InvalidMacAddress(String),

    // ========================================
    // Backend Errors
    // ========================================
    #[error("Backend not supported: {0}")]
    BackendNotSupported(String),

    #[error("Apply failed: {target} - {reason}")]
    ApplyFailed { target: String, reason: String },

    // ========================================
    // Command Errors
    // ========================================
    #[error("Command failed: {command} - {reason}")]
    CommandFailed { command: String, reason: String },

    #[error("Command timed out: {0}")]
    CommandTimeout(String),

    // ========================================
    // Store Errors
    // ========================================
    #[error("Data store not available: {0}")]
    StoreUnavailable(String),

    #[error("Record not found: {kind} #{id}")]
    RecordNotFound { kind: &'static str, id: i64 },

    #[error("Store schema version mismatch: expected {expected}, found {found}")]
    SchemaMismatch { expected: String, found: String },

    #[error("Failed to write configuration: {0}")]
    ConfigWriteFailed(String),

    #[error("Failed to parse configuration: {0}")]
    ConfigParseFailed(String),

    // ========================================
    // D-Bus Errors
    // ========================================
    #[error("D-Bus error: {0}")]
    Dbus(String),

    // ========================================
    // System Errors
    // ========================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a new apply failed error.
    pub fn apply_failed(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ApplyFailed {
            target: target.into(),
            reason: reason.into(),
        }
    }

    /// Create a new command failed error.
    pub fn command_failed(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CommandFailed {
            command: command.into(),
            reason: reason.into(),
        }
    }

}

// Convert from zbus errors
impl From<zbus::Error> for Error {
    fn from(err: zbus::Error) -> Self {
        Error::Dbus(err.to_string())
    }
}

// Convert from toml parse errors
impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::ConfigParseFailed(err.to_string())
    }
}

// Convert from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::ConfigParseFailed(err.to_string())
    }
}

// Convert from serde_yaml errors
impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::ConfigParseFailed(err.to_string())
    }
}
