// Router Control - Service API
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! In-process service layer behind the D-Bus daemon.
//!
//! Services expose typed methods over the store, the staged-change
//! reconcilers, and the network backend; `daemon.rs` wraps their
//! results in [`ApiResponse`] JSON for the bus.

pub mod ports;
pub mod rules;

use serde::{Deserialize, Serialize};

pub use ports::PortService;
pub use rules::RuleService;

/// Envelope returned to D-Bus callers for every mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub message: String,
    /// Entity payload for calls that return one (e.g. the stored
    /// record with its assigned id).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ApiResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Collapse a service result into an envelope, keeping the error
    /// text verbatim so validation messages reach the operator.
    pub fn from_result<T>(result: crate::models::error::Result<T>, ok_message: &str) -> Self
    where
        T: Serialize,
    {
        match result {
            Ok(value) => match serde_json::to_value(&value).ok().filter(|v| !v.is_null()) {
                Some(data) => Self::ok(ok_message).with_data(data),
                None => Self::ok(ok_message),
            },
            Err(e) => Self::error(e.to_string()),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"success":false,"message":"internal serialization error"}"#.to_string()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::error::Error;

    #[test]
    fn test_envelope_round_trip() {
        let response = ApiResponse::ok("created firewall rule")
            .with_data(serde_json::json!({"id": 4}));
        let json = response.to_json();
        assert!(json.contains("\"success\":true"));
        assert!(json.contains("\"id\":4"));

        let parsed: ApiResponse = serde_json::from_str(&json).unwrap();
        assert!(parsed.success);
        assert_eq!(parsed.data.unwrap()["id"], 4);
    }

    #[test]
    fn test_from_result_keeps_error_text() {
        let result: crate::models::error::Result<()> =
            Err(Error::ValidationFailed("name cannot be empty".to_string()));
        let response = ApiResponse::from_result(result, "unused");
        assert!(!response.success);
        assert!(response.message.contains("name cannot be empty"));
        // Unit success payloads are omitted entirely
        let response = ApiResponse::from_result(Ok(()), "done");
        assert!(response.success);
        assert!(response.data.is_none());
    }
}
