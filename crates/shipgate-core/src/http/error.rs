//! HTTP error classification and normalization
//!
//! Each carrier reports failures in its own body shape. This module
//! normalizes them into a single [`HttpError`] carrying the status, a
//! retry classification, and whatever structured error list could be
//! parsed out of the body.

use reqwest::StatusCode;
use serde_json::Value;
use std::fmt;

use crate::error::{CarrierFailure, Error, ErrorDetail};

/// Longest raw-body preview retained when the body is not JSON
const RAW_PREVIEW_MAX: usize = 2048;

/// Classification of HTTP errors for retry logic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClassification {
    /// 401/403 - credential refresh path, never blind-retried
    Authentication,
    /// Other 4xx with field detail - surfaced unless a payload fallback applies
    Validation,
    /// 5xx - surfaced; the carriers reject replayed shipment ids
    Server,
    /// Timeout/connection - retried by the transport layer itself
    Network,
    /// Anything else
    Unknown,
}

impl ErrorClassification {
    /// Only connectivity failures are retried at the transport layer
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorClassification::Network)
    }
}

/// Normalized HTTP failure
#[derive(Debug, Clone)]
pub struct HttpError {
    /// HTTP status code if a response was received
    pub status: Option<u16>,
    /// Classification for retry logic
    pub classification: ErrorClassification,
    /// Provider-specific top-level error code
    pub code: Option<String>,
    /// Human-readable error message
    pub message: String,
    /// Field-level detail parsed from the body
    pub errors: Vec<ErrorDetail>,
    /// Raw body (bounded preview when not JSON)
    pub raw_body: Option<String>,
}

impl HttpError {
    /// Build from a non-success response body
    pub fn from_response(status: u16, body: &str) -> Self {
        let classification = classify_status(status);
        let parsed = serde_json::from_str::<Value>(body).ok();

        let (code, message, errors) = match &parsed {
            Some(json) => extract_provider_error(json, body),
            None => (None, preview(body).to_string(), Vec::new()),
        };

        Self {
            status: Some(status),
            classification,
            code,
            message,
            errors,
            raw_body: Some(preview(body).to_string()),
        }
    }

    /// Build from a network/request error
    pub fn from_request_error(error: &reqwest::Error) -> Self {
        let classification = if error.is_timeout() || error.is_connect() {
            ErrorClassification::Network
        } else {
            ErrorClassification::Unknown
        };
        Self {
            status: error.status().map(|s| s.as_u16()),
            classification,
            code: None,
            message: error.to_string(),
            errors: Vec::new(),
            raw_body: None,
        }
    }

    /// Check if this error should trigger a transport retry
    pub fn should_retry(&self) -> bool {
        self.classification.is_retryable()
    }

    /// True for the 401 credential-refresh path
    pub fn is_unauthorized(&self) -> bool {
        self.status == Some(401)
    }

    /// Convert into the crate error taxonomy for a specific carrier
    pub fn into_error(self, carrier: &str) -> Error {
        match self.classification {
            ErrorClassification::Authentication => Error::Auth {
                carrier: carrier.to_string(),
                message: self.message,
            },
            ErrorClassification::Network | ErrorClassification::Unknown if self.status.is_none() => {
                Error::Transport {
                    message: self.message,
                    source: None,
                }
            }
            ErrorClassification::Validation => Error::Validation(self.into_failure(carrier)),
            _ => Error::Carrier(self.into_failure(carrier)),
        }
    }

    fn into_failure(self, carrier: &str) -> CarrierFailure {
        CarrierFailure {
            carrier: carrier.to_string(),
            code: self.code,
            message: self.message,
            errors: self.errors,
            http_status: self.status,
            raw_body: self.raw_body,
        }
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "HTTP {}: {}", status, self.message),
            None => write!(f, "HTTP error: {}", self.message),
        }
    }
}

impl std::error::Error for HttpError {}

/// Classify an HTTP status code for retry purposes
pub fn classify_status(status: u16) -> ErrorClassification {
    match StatusCode::from_u16(status) {
        Ok(code) if code == StatusCode::UNAUTHORIZED || code == StatusCode::FORBIDDEN => {
            ErrorClassification::Authentication
        }
        Ok(code) if code.is_client_error() => ErrorClassification::Validation,
        Ok(code) if code.is_server_error() => ErrorClassification::Server,
        _ => ErrorClassification::Unknown,
    }
}

/// Extract (code, message, detail list) from a carrier error body.
///
/// Tries each carrier's shape in turn: FedEx `errors[]`, UPS
/// `response.errors[]`, DHL problem-detail, OAuth token errors, then a
/// generic `message` field, falling back to the raw body preview.
fn extract_provider_error(json: &Value, body: &str) -> (Option<String>, String, Vec<ErrorDetail>) {
    // FedEx: {"errors":[{"code","message","parameterList":[{"key"}]}]}
    if let Some(list) = json.get("errors").and_then(Value::as_array) {
        let details = detail_list(list);
        if let Some(first) = details.first() {
            return (first.code.clone(), first.message.clone(), details);
        }
    }

    // UPS: {"response":{"errors":[{"code","message"}]}}
    if let Some(list) = json
        .pointer("/response/errors")
        .and_then(Value::as_array)
    {
        let details = detail_list(list);
        if let Some(first) = details.first() {
            return (first.code.clone(), first.message.clone(), details);
        }
    }

    // DHL problem detail: {"title","detail","additionalDetails":[..]}
    if let Some(detail) = json.get("detail").and_then(Value::as_str) {
        let mut details = vec![ErrorDetail {
            code: json.get("title").and_then(Value::as_str).map(str::to_string),
            message: detail.to_string(),
            field: None,
        }];
        if let Some(additional) = json.get("additionalDetails").and_then(Value::as_array) {
            for entry in additional.iter().filter_map(Value::as_str) {
                details.push(ErrorDetail {
                    code: None,
                    message: entry.to_string(),
                    field: None,
                });
            }
        }
        let code = json.get("title").and_then(Value::as_str).map(str::to_string);
        return (code, detail.to_string(), details);
    }

    // OAuth token endpoints: {"error":"invalid_client","error_description":".."}
    if let Some(error) = json.get("error").and_then(Value::as_str) {
        let message = json
            .get("error_description")
            .and_then(Value::as_str)
            .unwrap_or(error)
            .to_string();
        return (Some(error.to_string()), message, Vec::new());
    }

    // Generic {"message": ...}
    if let Some(message) = json.get("message").and_then(Value::as_str) {
        return (
            json.get("code").and_then(Value::as_str).map(str::to_string),
            message.to_string(),
            Vec::new(),
        );
    }

    (None, preview(body).to_string(), Vec::new())
}

fn detail_list(list: &[Value]) -> Vec<ErrorDetail> {
    list.iter()
        .map(|entry| ErrorDetail {
            code: entry.get("code").and_then(Value::as_str).map(str::to_string),
            message: entry
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Unspecified carrier error")
                .to_string(),
            field: entry
                .pointer("/parameterList/0/key")
                .or_else(|| entry.get("field"))
                .and_then(Value::as_str)
                .map(str::to_string),
        })
        .collect()
}

fn preview(body: &str) -> &str {
    let mut end = body.len().min(RAW_PREVIEW_MAX);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(classify_status(401), ErrorClassification::Authentication);
        assert_eq!(classify_status(403), ErrorClassification::Authentication);
        assert_eq!(classify_status(400), ErrorClassification::Validation);
        assert_eq!(classify_status(422), ErrorClassification::Validation);
        assert_eq!(classify_status(500), ErrorClassification::Server);
        assert_eq!(classify_status(503), ErrorClassification::Server);
    }

    #[test]
    fn test_only_network_errors_retry() {
        assert!(ErrorClassification::Network.is_retryable());
        assert!(!ErrorClassification::Server.is_retryable());
        assert!(!ErrorClassification::Validation.is_retryable());
        assert!(!ErrorClassification::Authentication.is_retryable());
    }

    #[test]
    fn test_fedex_error_extraction() {
        let body = r#"{"transactionId":"x","errors":[{"code":"SERVICETYPE.INVALID","message":"Service type is invalid.","parameterList":[{"key":"serviceType","value":""}]}]}"#;
        let error = HttpError::from_response(400, body);
        assert_eq!(error.code.as_deref(), Some("SERVICETYPE.INVALID"));
        assert_eq!(error.message, "Service type is invalid.");
        assert_eq!(error.errors.len(), 1);
        assert_eq!(error.errors[0].field.as_deref(), Some("serviceType"));
    }

    #[test]
    fn test_ups_error_extraction() {
        let body = r#"{"response":{"errors":[{"code":"120100","message":"Missing or invalid shipper number"}]}}"#;
        let error = HttpError::from_response(400, body);
        assert_eq!(error.code.as_deref(), Some("120100"));
        assert_eq!(error.errors.len(), 1);
    }

    #[test]
    fn test_dhl_problem_detail_extraction() {
        let body = r#"{"title":"Bad request","detail":"7008: Requested product HDP not available","additionalDetails":["Contract rate unavailable"],"status":400}"#;
        let error = HttpError::from_response(400, body);
        assert_eq!(error.message, "7008: Requested product HDP not available");
        assert_eq!(error.errors.len(), 2);
    }

    #[test]
    fn test_non_json_body_preview_retained() {
        let error = HttpError::from_response(502, "<html>Bad gateway</html>");
        assert_eq!(error.message, "<html>Bad gateway</html>");
        assert_eq!(error.classification, ErrorClassification::Server);
        assert!(error.raw_body.is_some());
    }

    #[test]
    fn test_into_error_maps_taxonomy() {
        let auth = HttpError::from_response(401, "{}").into_error("fedex");
        assert!(matches!(auth, Error::Auth { .. }));

        let validation = HttpError::from_response(400, r#"{"message":"bad"}"#).into_error("ups");
        assert!(matches!(validation, Error::Validation(_)));

        let server = HttpError::from_response(500, "oops").into_error("dhl");
        assert!(matches!(server, Error::Carrier(_)));
    }
}
