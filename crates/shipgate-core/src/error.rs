//! Error types for the Shipgate core library
//!
//! This module defines the error handling system for Shipgate, using
//! thiserror for ergonomic error definitions and anyhow for flexible
//! error contexts.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for Shipgate operations
#[derive(Error, Debug)]
pub enum Error {
    /// Credentials missing or rejected by the carrier. Produced after the
    /// single 401 refresh attempt has already been consumed; never retried
    /// beyond that.
    #[error("Carrier authentication failed: {carrier} - {message}")]
    Auth { carrier: String, message: String },

    /// Carrier rejected the request with field-level validation detail
    #[error("Carrier validation failed: {0}")]
    Validation(CarrierFailure),

    /// Carrier rejected the request for a non-validation reason (5xx,
    /// business rule, malformed response)
    #[error("Carrier error: {0}")]
    Carrier(CarrierFailure),

    /// Timeout or connection failure, surfaced after the transport layer
    /// exhausted its own retries
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// Factory could not resolve a selector to a registered carrier
    #[error("Unsupported carrier: {selector}")]
    UnsupportedCarrier { selector: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// JSON parsing and serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Convenience type alias for Results using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Raw carrier text carried by this error, used by the fallback
    /// pattern matching. Only carrier-originated failures expose text;
    /// transport and configuration errors never trigger payload fallbacks.
    pub fn carrier_text(&self) -> Option<String> {
        match self {
            Error::Validation(failure) | Error::Carrier(failure) => Some(failure.match_text()),
            _ => None,
        }
    }
}

/// One field-level error reported by a carrier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Carrier-specific error code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Human-readable message from the carrier
    pub message: String,

    /// Field or parameter the error refers to, when reported
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

/// A structured carrier failure
///
/// Always carries enough raw data to reconstruct a user-facing message
/// via the error translator: the top-level code/message, the per-field
/// detail list, the HTTP status, and a bounded preview of the raw body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarrierFailure {
    /// Carrier that produced the failure
    pub carrier: String,

    /// Carrier-specific top-level error code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Top-level error message
    pub message: String,

    /// Field-level detail list parsed from the response body
    pub errors: Vec<ErrorDetail>,

    /// HTTP status of the failed response, if one was received
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,

    /// Raw response body (bounded preview when not JSON)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_body: Option<String>,
}

impl CarrierFailure {
    /// All carrier text joined for substring matching: code, message,
    /// and every detail line.
    pub fn match_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if let Some(code) = &self.code {
            parts.push(code);
        }
        parts.push(&self.message);
        for detail in &self.errors {
            if let Some(code) = &detail.code {
                parts.push(code);
            }
            parts.push(&detail.message);
        }
        parts.join(" ")
    }
}

impl std::fmt::Display for CarrierFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.code, self.http_status) {
            (Some(code), Some(status)) => {
                write!(f, "{} [{} / HTTP {}]: {}", self.carrier, code, status, self.message)
            }
            (Some(code), None) => write!(f, "{} [{}]: {}", self.carrier, code, self.message),
            (None, Some(status)) => write!(f, "{} [HTTP {}]: {}", self.carrier, status, self.message),
            (None, None) => write!(f, "{}: {}", self.carrier, self.message),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json {
            message: err.to_string(),
            source: err,
        }
    }
}
