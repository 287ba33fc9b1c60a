//! Error types for telemetry ingestion.
//!
//! This module provides the error taxonomy for the slipstream recorder.
//! All errors implement the `std::error::Error` trait and carry structured
//! context for logging and recovery guidance.
//!
//! ## Error Categories
//!
//! - **Decode Errors**: A datagram did not match the fixed packet layout. These
//!   are recovered inside the receive loop; the packet is dropped.
//! - **Socket Errors**: Bind or receive failures. A session that hits one ends
//!   and the controller returns to idle.
//! - **File Errors**: Problems writing session rows, summaries or reading
//!   reference data.
//! - **Config / Parse Errors**: Invalid configuration or malformed row files.
//!
//! Control-surface no-ops (starting twice, stopping while idle) are not errors;
//! they are reported through [`ControlOutcome`](crate::session::ControlOutcome).
//!
//! ## Recovery
//!
//! ```rust
//! use slipstream::TelemetryError;
//!
//! let error = TelemetryError::socket("bind 0.0.0.0:5300", std::io::Error::other("in use"));
//! assert!(!error.is_retryable());
//! for suggestion in error.recovery_suggestions() {
//!     println!("  - {}", suggestion);
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for telemetry operations.
pub type Result<T, E = TelemetryError> = std::result::Result<T, E>;

/// Failure to map a datagram onto the fixed packet layout.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum DecodeError {
    #[error("packet length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}

/// Main error type for telemetry operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TelemetryError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("UDP socket error during {operation}")]
    Socket {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("File error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {details}")]
    Config { path: Option<PathBuf>, details: String },

    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },

    #[error("Failed to serialize {context}")]
    Serialization {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Session controller is no longer running")]
    ControllerClosed,
}

impl TelemetryError {
    /// Returns whether this error is potentially recoverable through retry.
    ///
    /// Socket errors are deliberately not retryable: a failed bind is reported
    /// to the operator instead of being retried in the background.
    pub fn is_retryable(&self) -> bool {
        match self {
            TelemetryError::Decode(_) => true,
            TelemetryError::Socket { .. } => false,
            TelemetryError::File { .. } => false,
            TelemetryError::Config { .. } => false,
            TelemetryError::Parse { .. } => false,
            TelemetryError::Serialization { .. } => false,
            TelemetryError::ControllerClosed => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            TelemetryError::Decode(_) => vec![
                "Set the game's Data Out packet format to 'Car Dash'",
                "Check that only one game is sending to this port",
            ],
            TelemetryError::Socket { .. } => vec![
                "Check no other recorder is bound to the same UDP port",
                "Verify the configured bind address exists on this machine",
                "Check firewall rules for inbound UDP traffic",
            ],
            TelemetryError::File { .. } => vec![
                "Check the output directory exists and is writable",
                "Ensure sufficient disk space",
                "Check file permissions",
            ],
            TelemetryError::Config { .. } => vec![
                "Compare the configuration file against the documented defaults",
                "Check YAML indentation and value types",
            ],
            TelemetryError::Parse { .. } => vec![
                "Verify the file was written by this recorder",
                "Check the header row matches the current column layout",
            ],
            TelemetryError::Serialization { .. } => {
                vec!["Check for non-finite values in the summary", "Ensure sufficient disk space"]
            }
            TelemetryError::ControllerClosed => {
                vec!["Create a new controller", "Check logs for a controller task panic"]
            }
        }
    }

    /// Helper constructor for socket errors.
    pub fn socket(operation: impl Into<String>, source: std::io::Error) -> Self {
        TelemetryError::Socket { operation: operation.into(), source }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        TelemetryError::File { path, source }
    }

    /// Helper constructor for configuration errors.
    pub fn config(path: Option<PathBuf>, details: impl Into<String>) -> Self {
        TelemetryError::Config { path, details: details.into() }
    }

    /// Helper constructor for parse errors.
    pub fn parse(context: impl Into<String>, details: impl Into<String>) -> Self {
        TelemetryError::Parse { context: context.into(), details: details.into() }
    }

    /// Returns true when this is a [`DecodeError`].
    pub fn is_decode(&self) -> bool {
        matches!(self, TelemetryError::Decode(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn length_mismatch_message_names_both_lengths(
            expected in 0usize..4096,
            actual in 0usize..4096,
        ) {
            let error: TelemetryError = DecodeError::LengthMismatch { expected, actual }.into();
            let message = error.to_string();
            prop_assert!(message.contains(&expected.to_string()));
            prop_assert!(message.contains(&actual.to_string()));
            prop_assert!(error.is_decode());
        }

        #[test]
        fn parse_errors_keep_their_context(context in "\\w+", details in ".*") {
            let error = TelemetryError::parse(context.clone(), details.clone());
            let message = error.to_string();
            prop_assert!(message.contains(&context));
            prop_assert!(message.contains(&details));
        }
    }

    #[test]
    fn socket_errors_chain_their_source() {
        let error = TelemetryError::socket("bind", std::io::Error::other("address in use"));
        let source = std::error::Error::source(&error).expect("socket error has a source");
        assert_eq!(source.to_string(), "address in use");
        assert!(!error.is_retryable());
    }

    #[test]
    fn error_traits_validation() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<TelemetryError>();
        assert_send_sync_static::<DecodeError>();
    }

    #[test]
    fn every_variant_has_suggestions() {
        let errors = [
            TelemetryError::from(DecodeError::LengthMismatch { expected: 331, actual: 311 }),
            TelemetryError::socket("recv", std::io::Error::other("boom")),
            TelemetryError::file_error(PathBuf::from("/tmp/x"), std::io::Error::other("boom")),
            TelemetryError::config(None, "bad"),
            TelemetryError::parse("rows", "bad"),
            TelemetryError::ControllerClosed,
        ];

        for error in &errors {
            let suggestions = error.recovery_suggestions();
            assert!(!suggestions.is_empty(), "{error} has no suggestions");
            assert!(suggestions.iter().all(|s| s.len() > 5));
        }
    }
}
