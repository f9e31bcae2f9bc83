// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Playbridge.

use thiserror::Error;

/// Top-level error type for all Playbridge operations.
///
/// `Clone` because a single deferred outcome is handed to every caller that
/// joined the same in-flight operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    // -- Configuration --
    #[error("missing configuration for {platform}: {field}")]
    MissingConfig { platform: String, field: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // -- Platform SDK --
    #[error("platform SDK error: {0}")]
    Sdk(String),

    #[error("malformed platform response: {0}")]
    MalformedResponse(String),

    #[error("failed to load script {url}: {reason}")]
    ScriptLoad { url: String, reason: String },

    #[error("script {0} did not load in time")]
    ScriptTimeout(String),

    #[error("{0} timed out")]
    Timeout(String),

    // -- Storage --
    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    // -- Caller errors --
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("adapter is not initialized")]
    NotInitialized,

    #[error("operation was cancelled before it settled")]
    Cancelled,

    #[error("feature not available on this platform")]
    Unsupported,
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl BridgeError {
    /// Configuration error for a required platform option.
    pub fn missing_config(platform: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingConfig {
            platform: platform.into(),
            field: field.into(),
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Sdk(_)
                | Self::MalformedResponse(_)
                | Self::ScriptLoad { .. }
                | Self::ScriptTimeout(_)
                | Self::Timeout(_)
                | Self::Storage(_)
                | Self::Cancelled
        )
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sdk_errors_are_retryable() {
        assert!(BridgeError::Sdk("USER_DENIED".into()).is_retryable());
        assert!(BridgeError::Timeout("get_server_time".into()).is_retryable());
    }

    #[test]
    fn config_and_unsupported_are_not_retryable() {
        assert!(!BridgeError::missing_config("game_distribution", "gameId").is_retryable());
        assert!(!BridgeError::Unsupported.is_retryable());
    }

    #[test]
    fn json_errors_convert() {
        let err: BridgeError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, BridgeError::Serialization(_)));
    }
}
