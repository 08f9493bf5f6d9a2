//! Transport seam over reqwest
//!
//! Carrier clients describe outbound calls as [`CarrierRequest`] values
//! and send them through the [`Transport`] trait. Production uses
//! [`ReqwestTransport`]; tests script responses behind the same trait.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use crate::http::error::HttpError;
use crate::http::retry::{execute_with_retry, TransportRetryPolicy};

/// One outbound carrier API call
#[derive(Debug, Clone)]
pub struct CarrierRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// HTTP Basic credentials, applied per request (DHL, OAuth token calls)
    pub basic_auth: Option<(String, String)>,
    /// Form-encoded body (OAuth client-credentials exchanges)
    pub form: Option<Vec<(String, String)>>,
    /// JSON body
    pub body: Option<Value>,
}

impl CarrierRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            basic_auth: None,
            form: None,
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.basic_auth = Some((username.into(), password.into()));
        self
    }

    pub fn with_form(mut self, form: Vec<(String, String)>) -> Self {
        self.form = Some(form);
        self
    }

    pub fn with_json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Response body with status, already read to completion
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse the body as JSON, if it is JSON
    pub fn json(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }
}

/// Blocking point for every carrier call; the per-attempt timeout is the
/// only bound on call duration.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &CarrierRequest) -> Result<HttpResponse, HttpError>;
}

/// Production transport over a shared reqwest client
pub struct ReqwestTransport {
    client: reqwest::Client,
    policy: TransportRetryPolicy,
}

impl ReqwestTransport {
    pub fn new(policy: TransportRetryPolicy) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .timeout(policy.timeout)
            .build()
            .map_err(|e| HttpError {
                status: None,
                classification: crate::http::error::ErrorClassification::Unknown,
                code: None,
                message: format!("Failed to create HTTP client: {}", e),
                errors: Vec::new(),
                raw_body: None,
            })?;
        Ok(Self { client, policy })
    }

    pub fn with_default_policy() -> Result<Self, HttpError> {
        Self::new(TransportRetryPolicy::default())
    }

    async fn send_once(&self, request: &CarrierRequest) -> Result<HttpResponse, HttpError> {
        let mut builder = self.client.request(request.method.clone(), &request.url);

        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some((username, password)) = &request.basic_auth {
            builder = builder.basic_auth(username, Some(password));
        }
        if let Some(form) = &request.form {
            builder = builder.form(form);
        } else if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| HttpError::from_request_error(&e))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| HttpError::from_request_error(&e))?;

        Ok(HttpResponse { status, body })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &CarrierRequest) -> Result<HttpResponse, HttpError> {
        execute_with_retry(|| self.send_once(request), &self.policy).await
    }
}
