//! Authentication schemes and per-client auth state
//!
//! Two transport schemes cover the integrated carriers:
//! - OAuth2 client-credentials (FedEx, UPS): a form-encoded token
//!   exchange yielding a bearer token with a server-provided TTL
//! - HTTP Basic (DHL): a static credential sent on every request, no
//!   token endpoint, never expires
//!
//! The state machine per client instance is
//! `NoToken -> Authenticating -> Authenticated(expires_at)`, degenerating
//! to permanent `Authenticated` for basic-auth carriers.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::http::transport::CarrierRequest;

/// How a carrier authenticates outbound calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthScheme {
    /// POST form-encoded client-credentials exchange at `token_path`
    OAuth2ClientCredentials {
        token_path: String,
        /// Send client id/secret as HTTP Basic on the token call (UPS)
        /// instead of form fields (FedEx)
        basic_token_auth: bool,
    },
    /// HTTP Basic on every request; credential is `key:secret`
    Basic,
}

/// A live credential ready to apply to a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    Bearer(String),
    Basic { username: String, password: String },
}

impl Credential {
    /// Apply this credential to an outbound request
    pub fn apply(&self, request: CarrierRequest) -> CarrierRequest {
        match self {
            Credential::Bearer(token) => {
                request.with_header("Authorization", format!("Bearer {}", token))
            }
            Credential::Basic { username, password } => {
                request.with_basic_auth(username.clone(), password.clone())
            }
        }
    }
}

/// Authentication state of one carrier client instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    NoToken,
    Authenticated {
        credential: Credential,
        /// None for basic-auth carriers: valid until the server says otherwise
        expires_at: Option<DateTime<Utc>>,
    },
}

impl AuthState {
    /// Credential usable right now, if any
    pub fn valid_credential(&self, now: DateTime<Utc>) -> Option<&Credential> {
        match self {
            AuthState::Authenticated { credential, expires_at } => match expires_at {
                Some(expiry) if *expiry <= now => None,
                _ => Some(credential),
            },
            AuthState::NoToken => None,
        }
    }
}

/// Parsed token-exchange response
#[derive(Debug, Clone, PartialEq)]
pub struct TokenGrant {
    pub access_token: String,
    pub expires_in_secs: i64,
}

/// Parse an OAuth2 token response body.
///
/// `expires_in` arrives as a number from FedEx and as a string from UPS;
/// both forms are accepted.
pub fn parse_token_grant(body: &Value) -> Option<TokenGrant> {
    let access_token = body.get("access_token")?.as_str()?.to_string();
    if access_token.is_empty() {
        return None;
    }
    let expires_in_secs = match body.get("expires_in") {
        Some(Value::Number(number)) => number.as_i64()?,
        Some(Value::String(text)) => text.trim().parse().ok()?,
        _ => return None,
    };
    Some(TokenGrant { access_token, expires_in_secs })
}
