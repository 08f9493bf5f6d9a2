//! Per-carrier credential and endpoint configuration
//!
//! Credentials come from the environment (a `.env` file is honored for
//! local development): `SHIPGATE_<CARRIER>_BASE_URL`, `_ACCOUNT`,
//! `_CLIENT_ID`, `_CLIENT_SECRET`, `_SANDBOX`. Base URLs default to the
//! carrier's sandbox or production host depending on the sandbox flag.

use crate::error::{Error, Result};
use crate::types::CarrierId;

/// Configuration for one carrier client
#[derive(Debug, Clone)]
pub struct CarrierConfig {
    pub carrier: CarrierId,
    /// Base URL for API requests
    pub base_url: String,
    /// Carrier account / shipper number
    pub account_number: String,
    /// OAuth2 client id, or the API key for basic-auth carriers
    pub client_id: String,
    /// OAuth2 client secret, or the API secret for basic-auth carriers
    pub client_secret: String,
    /// Route calls to the carrier's test environment
    pub sandbox: bool,
}

impl CarrierConfig {
    /// Explicit construction, mainly for tests and embedded setups
    pub fn new(
        carrier: CarrierId,
        base_url: impl Into<String>,
        account_number: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            carrier,
            base_url: base_url.into(),
            account_number: account_number.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            sandbox: false,
        }
    }

    /// Load configuration for a carrier from the environment
    pub fn from_env(carrier: CarrierId) -> Result<Self> {
        dotenv::dotenv().ok();
        let key = carrier.env_key();

        let sandbox = std::env::var(format!("SHIPGATE_{}_SANDBOX", key))
            .map(|raw| matches!(raw.trim(), "1" | "true" | "TRUE" | "yes"))
            .unwrap_or(false);

        let base_url = std::env::var(format!("SHIPGATE_{}_BASE_URL", key))
            .unwrap_or_else(|_| default_base_url(carrier, sandbox).to_string());

        let require = |suffix: &str| -> Result<String> {
            std::env::var(format!("SHIPGATE_{}_{}", key, suffix)).map_err(|_| Error::Configuration {
                message: format!("SHIPGATE_{}_{} is not set", key, suffix),
                source: None,
            })
        };

        Ok(Self {
            carrier,
            base_url,
            account_number: require("ACCOUNT")?,
            client_id: require("CLIENT_ID")?,
            client_secret: require("CLIENT_SECRET")?,
            sandbox,
        })
    }

    /// Join a path onto the configured base URL. The base may carry its
    /// own path prefix (DHL does), so the endpoint path is appended rather
    /// than resolved against the host root.
    pub fn url(&self, path: &str) -> Result<String> {
        url::Url::parse(&self.base_url).map_err(|e| Error::Configuration {
            message: format!("Invalid base URL {}: {}", self.base_url, e),
            source: None,
        })?;
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Ok(format!("{}/{}", base, path))
    }
}

fn default_base_url(carrier: CarrierId, sandbox: bool) -> &'static str {
    match (carrier, sandbox) {
        (CarrierId::FedEx, false) => "https://apis.fedex.com",
        (CarrierId::FedEx, true) => "https://apis-sandbox.fedex.com",
        (CarrierId::Dhl, false) => "https://express.api.dhl.com/mydhlapi",
        (CarrierId::Dhl, true) => "https://express.api.dhl.com/mydhlapi/test",
        (CarrierId::Ups, false) => "https://onlinetools.ups.com",
        (CarrierId::Ups, true) => "https://wwwcie.ups.com",
    }
}
