//! Error types for the client
//!
//! Every failure is one of four kinds, each detected at a well-defined point:
//!
//! - [`ValidationError`]: an entity or query failed its own checks before any I/O
//! - [`TransportError`]: the store (or the network) rejected a request
//! - [`ReconciliationError`]: a bulk UID-assignment response did not account for a name
//! - [`ProtocolMismatchError`]: a response could not be mapped onto the expected shape

use crate::status;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Main error type for the client
#[derive(Error, Debug)]
pub enum Error {
    /// Entity or query validation failed
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Request failed at the transport or was rejected by the store
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// UID assignment response could not be reconciled
    #[error("Reconciliation error: {0}")]
    Reconciliation(#[from] ReconciliationError),

    /// Response shape did not match the expected entity
    #[error("Protocol mismatch: {0}")]
    ProtocolMismatch(#[from] ProtocolMismatchError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// JSON encoding or decoding failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a validation failure on `entity`
    pub fn validation(entity: &'static str, message: impl Into<String>) -> Self {
        Error::Validation(ValidationError::new(entity, message))
    }

    /// Shorthand for a protocol mismatch carrying the offending payload
    pub fn protocol(message: impl Into<String>, payload: Value) -> Self {
        Error::ProtocolMismatch(ProtocolMismatchError::new(message, payload))
    }

    /// HTTP status code, when the error came from the store
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Transport(e) => Some(e.code),
            _ => None,
        }
    }
}

/// A constructed entity or query failed its own checks
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {entity}: {message}")]
pub struct ValidationError {
    /// Kind of object that failed validation (e.g. "TimeSeries")
    pub entity: &'static str,
    /// What was wrong with it
    pub message: String,
}

impl ValidationError {
    /// Create a new validation error
    pub fn new(entity: &'static str, message: impl Into<String>) -> Self {
        Self {
            entity,
            message: message.into(),
        }
    }
}

/// Error reported by the transport or by the store
///
/// Mirrors the store's error object:
///
/// | Field   | Always present | Meaning                                  |
/// |---------|----------------|------------------------------------------|
/// | code    | yes            | HTTP status code                         |
/// | message | yes            | short description of what went wrong     |
/// | details | no             | details about the error, often a trace   |
/// | trace   | no             | server-side stack trace                  |
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    /// HTTP status code (0 when no response was received)
    pub code: u16,
    /// Descriptive error message
    pub message: String,
    /// Optional details
    pub details: Option<String>,
    /// Optional server-side trace
    pub trace: Option<String>,
}

impl TransportError {
    /// Create a new transport error
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            trace: None,
        }
    }

    /// Error for a request that never produced a response
    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(0, message)
    }

    /// Attach details
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Attach a trace
    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = Some(trace.into());
        self
    }

    /// Human-readable description of the status code
    pub fn description(&self) -> Option<&'static str> {
        status::describe(self.code)
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error {}: {}", self.code, self.message)
    }
}

/// Which name table of a UID-assignment response a name belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UidCategory {
    /// Metric names
    Metric,
    /// Tag keys
    TagKey,
    /// Tag values
    TagValue,
}

impl UidCategory {
    /// Key of the success table in the response
    pub fn success_key(&self) -> &'static str {
        match self {
            UidCategory::Metric => "metric",
            UidCategory::TagKey => "tagk",
            UidCategory::TagValue => "tagv",
        }
    }

    /// Key of the error table in the response
    pub fn error_key(&self) -> &'static str {
        match self {
            UidCategory::Metric => "metric_errors",
            UidCategory::TagKey => "tagk_errors",
            UidCategory::TagValue => "tagv_errors",
        }
    }
}

impl fmt::Display for UidCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.success_key())
    }
}

/// A bulk UID-assignment response did not account for a requested name
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{category} '{name}': {reason}")]
pub struct ReconciliationError {
    /// Table the name was looked up in
    pub category: UidCategory,
    /// The requested name
    pub name: String,
    /// Why the name could not be resolved
    pub reason: String,
    /// Raw response, for diagnostics
    pub raw: Value,
}

/// A decoded response cannot be mapped onto the expected entity shape
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct ProtocolMismatchError {
    /// What was expected
    pub message: String,
    /// The payload that did not fit
    pub payload: Value,
}

impl ProtocolMismatchError {
    /// Create a new protocol mismatch error
    pub fn new(message: impl Into<String>, payload: Value) -> Self {
        Self {
            message: message.into(),
            payload,
        }
    }
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, Error>;
