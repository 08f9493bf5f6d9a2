//! HTTP plumbing for carrier API communication
//!
//! This module provides the transport machinery shared by every carrier
//! client:
//! - Request/response types and a `Transport` seam over reqwest
//! - Fixed-delay retry handling for connectivity failures
//! - Authentication schemes and per-client auth state
//! - A shared token cache with TTL semantics
//! - Error classification and provider error extraction

pub mod auth;
pub mod cache;
pub mod error;
pub mod retry;
pub mod transport;

pub use auth::{AuthScheme, AuthState, Credential, TokenGrant};
pub use cache::{CachedToken, InMemoryTokenCache, TokenCache};
pub use error::{ErrorClassification, HttpError};
pub use retry::{execute_with_retry, TransportRetryPolicy};
pub use transport::{CarrierRequest, HttpResponse, ReqwestTransport, Transport};

// Re-export commonly used types
pub use reqwest::{Method, StatusCode};
