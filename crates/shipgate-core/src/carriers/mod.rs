//! Carrier clients behind one uniform contract
//!
//! Each provider module owns only its payload shapes; the retry, auth,
//! and error machinery lives in [`CarrierCore`] and is shared. A client
//! instance is stateful (cached credential and expiry) and reusable
//! across calls; instances are independent, so rating several carriers
//! concurrently needs no coordination.

pub mod dhl;
pub mod fallback;
pub mod fedex;
pub mod ups;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::Method;
use serde_json::Value;

use crate::config::CarrierConfig;
use crate::error::{Error, Result};
use crate::http::auth::{parse_token_grant, AuthScheme, AuthState, Credential, TokenGrant};
use crate::http::cache::TokenCache;
use crate::http::error::HttpError;
use crate::http::transport::{CarrierRequest, HttpResponse, Transport};
use crate::normalize::country::CountryLookup;
use crate::types::{Address, RateQuote, ShipmentDocuments, ShipmentOutcome, ShipmentRequest, TrackingInfo};

pub use dhl::DhlCarrier;
pub use fedex::FedExCarrier;
pub use ups::UpsCarrier;

/// Uniform carrier contract
///
/// Identical signatures across providers. Failure semantics differ per
/// operation by design: rates and tracking propagate typed errors,
/// shipment creation always returns an outcome value, cancellation is
/// best-effort, and address validation never fails visibly.
#[async_trait]
pub trait Carrier: Send + Sync {
    /// Canonical lowercase carrier name
    fn name(&self) -> &'static str;

    /// Establish or refresh the credential used on subsequent calls.
    /// Idempotent; safe to call speculatively.
    async fn authenticate(&self) -> Result<()>;

    /// Quote zero or more services for a shipment. An empty list is a
    /// valid outcome, not an error.
    async fn get_rates(&self, request: &ShipmentRequest) -> Result<Vec<RateQuote>>;

    /// Create a shipment and label. Always returns an outcome, even on
    /// failure, so the caller can persist partial state.
    async fn create_shipment(
        &self,
        request: &ShipmentRequest,
        documents: Option<&ShipmentDocuments>,
    ) -> ShipmentOutcome;

    /// Current tracking state for a shipment
    async fn track(&self, tracking_number: &str) -> Result<TrackingInfo>;

    /// Best-effort cancellation; false on any failure
    async fn cancel_shipment(&self, tracking_number: &str) -> bool;

    /// Return a corrected address, or the input unchanged on any failure
    async fn validate_address(&self, address: &Address) -> Address;
}

/// Shared engine owned by every carrier client: configuration, transport,
/// token cache, country reference, and the per-instance auth state.
pub struct CarrierCore {
    config: CarrierConfig,
    scheme: AuthScheme,
    transport: Arc<dyn Transport>,
    cache: Arc<dyn TokenCache>,
    countries: Arc<dyn CountryLookup>,
    state: Mutex<AuthState>,
}

impl CarrierCore {
    pub fn new(
        config: CarrierConfig,
        scheme: AuthScheme,
        transport: Arc<dyn Transport>,
        cache: Arc<dyn TokenCache>,
        countries: Arc<dyn CountryLookup>,
    ) -> Self {
        Self {
            config,
            scheme,
            transport,
            cache,
            countries,
            state: Mutex::new(AuthState::NoToken),
        }
    }

    pub fn config(&self) -> &CarrierConfig {
        &self.config
    }

    pub fn countries(&self) -> &dyn CountryLookup {
        self.countries.as_ref()
    }

    pub fn carrier_name(&self) -> &'static str {
        self.config.carrier.as_str()
    }

    /// Idempotent authentication: a valid cached credential short-circuits
    /// without any network call.
    pub async fn authenticate(&self) -> Result<()> {
        self.ensure_credential().await.map(|_| ())
    }

    async fn ensure_credential(&self) -> Result<Credential> {
        let name = self.carrier_name();

        if self.scheme == AuthScheme::Basic {
            // No token exchange: synthesize the static credential and stay
            // authenticated until the server judges it invalid.
            let credential = Credential::Basic {
                username: self.config.client_id.clone(),
                password: self.config.client_secret.clone(),
            };
            let mut state = self.state.lock().expect("auth state poisoned");
            *state = AuthState::Authenticated {
                credential: credential.clone(),
                expires_at: None,
            };
            return Ok(credential);
        }

        let now = Utc::now();
        {
            let state = self.state.lock().expect("auth state poisoned");
            if let Some(credential) = state.valid_credential(now) {
                return Ok(credential.clone());
            }
        }

        // Shared cache next, so concurrent processes reuse one token
        if let Some(entry) = self.cache.get(name) {
            let credential = Credential::Bearer(entry.token);
            let mut state = self.state.lock().expect("auth state poisoned");
            *state = AuthState::Authenticated {
                credential: credential.clone(),
                expires_at: Some(entry.expires_at),
            };
            return Ok(credential);
        }

        tracing::debug!(carrier = name, "authenticating against carrier token endpoint");
        let grant = self.exchange_token().await?;
        self.cache.put(name, grant.access_token.clone(), grant.expires_in_secs);

        let credential = Credential::Bearer(grant.access_token);
        let mut state = self.state.lock().expect("auth state poisoned");
        *state = AuthState::Authenticated {
            credential: credential.clone(),
            expires_at: Some(now + Duration::seconds(grant.expires_in_secs)),
        };
        Ok(credential)
    }

    async fn exchange_token(&self) -> Result<TokenGrant> {
        let name = self.carrier_name();
        let (token_path, basic_token_auth) = match &self.scheme {
            AuthScheme::OAuth2ClientCredentials { token_path, basic_token_auth } => {
                (token_path.clone(), *basic_token_auth)
            }
            AuthScheme::Basic => unreachable!("basic auth has no token exchange"),
        };

        let mut form = vec![("grant_type".to_string(), "client_credentials".to_string())];
        let mut request = CarrierRequest::new(Method::POST, self.config.url(&token_path)?)
            .with_header("Content-Type", "application/x-www-form-urlencoded");
        if basic_token_auth {
            request = request
                .with_basic_auth(self.config.client_id.clone(), self.config.client_secret.clone());
        } else {
            form.push(("client_id".to_string(), self.config.client_id.clone()));
            form.push(("client_secret".to_string(), self.config.client_secret.clone()));
        }
        let request = request.with_form(form);

        let response = self
            .transport
            .send(&request)
            .await
            .map_err(|error| error.into_error(name))?;

        if !response.is_success() {
            return Err(HttpError::from_response(response.status, &response.body).into_error(name));
        }

        let body: Value = response.json().ok_or_else(|| Error::Auth {
            carrier: name.to_string(),
            message: "Token response was not JSON".to_string(),
        })?;
        parse_token_grant(&body).ok_or_else(|| Error::Auth {
            carrier: name.to_string(),
            message: "Token response missing access_token or expires_in".to_string(),
        })
    }

    fn invalidate(&self) {
        self.cache.evict(self.carrier_name());
        let mut state = self.state.lock().expect("auth state poisoned");
        *state = AuthState::NoToken;
    }

    /// Send an authenticated request.
    ///
    /// A 401 response evicts the shared cache entry, re-authenticates,
    /// and retries the same call exactly once; a second 401 surfaces as
    /// an auth error. This refresh path is keyed on status code and is
    /// disjoint from the transport layer's connectivity retries.
    pub async fn send_authed(&self, request: CarrierRequest) -> Result<HttpResponse> {
        let name = self.carrier_name();
        let credential = self.ensure_credential().await?;
        let response = self
            .transport
            .send(&credential.apply(request.clone()))
            .await
            .map_err(|error| error.into_error(name))?;

        if response.status != 401 {
            return self.finalize(response);
        }

        tracing::warn!(carrier = name, "credential rejected, refreshing and retrying once");
        self.invalidate();
        let credential = self.ensure_credential().await?;
        let retried = self
            .transport
            .send(&credential.apply(request))
            .await
            .map_err(|error| error.into_error(name))?;

        if retried.status == 401 {
            let failure = HttpError::from_response(retried.status, &retried.body);
            return Err(Error::Auth {
                carrier: name.to_string(),
                message: failure.message,
            });
        }
        self.finalize(retried)
    }

    fn finalize(&self, response: HttpResponse) -> Result<HttpResponse> {
        if response.is_success() {
            Ok(response)
        } else {
            Err(HttpError::from_response(response.status, &response.body)
                .into_error(self.carrier_name()))
        }
    }
}

/// Parse the timestamp formats the carriers emit: RFC 3339, bare local
/// datetimes, and bare dates (taken as midnight UTC).
pub(crate) fn parse_datetime(raw: &str) -> Option<chrono::DateTime<Utc>> {
    if let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(parsed.and_utc());
    }
    if let Ok(parsed) = chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return parsed.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    None
}
