//! Carrier resolution
//!
//! Maps a caller-facing selector - a carrier name, a persisted
//! service-catalog identifier, or a raw service-code string - to a
//! registered client instance. Resolution order: exact name, catalog
//! lookup, service-code vocabulary heuristics (FedEx, DHL, UPS, in that
//! fixed order), then the designated fallback carrier. "Manual" carrier
//! codes (sea/air freight) never resolve to a client and are handled
//! entirely outside this subsystem.

use std::collections::HashMap;
use std::sync::Arc;

use crate::carriers::Carrier;
use crate::error::{Error, Result};

/// One persisted service-catalog row
#[derive(Debug, Clone)]
pub struct CatalogService {
    pub id: i64,
    pub carrier_name: String,
    pub service_code: String,
}

/// Service catalog collaborator: carrier name <-> code <-> persisted id
pub trait ServiceCatalog: Send + Sync {
    fn find_service(&self, id: i64) -> Option<CatalogService>;
}

/// What the caller hands to [`CarrierFactory::resolve`]
#[derive(Debug, Clone)]
pub enum CarrierSelector {
    /// Exact carrier name, case-insensitive
    Name(String),
    /// Persisted service-catalog identifier
    CatalogId(i64),
    /// Raw service-code string, e.g. `FEDEX_INTERNATIONAL_PRIORITY`
    ServiceCode(String),
}

/// Carrier codes that are booked by hand and never have an API client
const MANUAL_CARRIER_CODES: [&str; 5] = ["SEA", "AIR", "SEA_FREIGHT", "AIR_FREIGHT", "MANUAL"];

/// FedEx service-code vocabulary beyond the `FEDEX` prefix
const FEDEX_SERVICE_CODES: [&str; 8] = [
    "FIRST_OVERNIGHT",
    "PRIORITY_OVERNIGHT",
    "STANDARD_OVERNIGHT",
    "GROUND_HOME_DELIVERY",
    "INTERNATIONAL_PRIORITY",
    "INTERNATIONAL_ECONOMY",
    "INTERNATIONAL_FIRST",
    "SMART_POST",
];

/// DHL product vocabulary beyond the `DHL` prefix
const DHL_SERVICE_CODES: [&str; 6] = [
    "EXPRESS_WORLDWIDE",
    "EXPRESS_12",
    "EXPRESS_9",
    "ECONOMY_SELECT",
    "MEDICAL_EXPRESS",
    "BREAKBULK_EXPRESS",
];

/// UPS numeric product codes
const UPS_SERVICE_CODES: [&str; 12] =
    ["01", "02", "03", "07", "08", "11", "12", "14", "54", "59", "65", "96"];

/// Registry of carrier clients plus the resolution rules
pub struct CarrierFactory {
    carriers: HashMap<String, Arc<dyn Carrier>>,
    catalog: Option<Arc<dyn ServiceCatalog>>,
    fallback: Option<String>,
}

impl CarrierFactory {
    pub fn new() -> Self {
        Self {
            carriers: HashMap::new(),
            catalog: None,
            fallback: None,
        }
    }

    /// Register a client under its canonical name
    pub fn register(mut self, carrier: Arc<dyn Carrier>) -> Self {
        self.carriers.insert(carrier.name().to_lowercase(), carrier);
        self
    }

    /// Attach the service-catalog collaborator
    pub fn with_catalog(mut self, catalog: Arc<dyn ServiceCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Designate the carrier used when heuristics find no match
    pub fn with_fallback(mut self, name: impl Into<String>) -> Self {
        self.fallback = Some(name.into().to_lowercase());
        self
    }

    /// Resolve a selector to a registered client
    pub fn resolve(&self, selector: &CarrierSelector) -> Result<Arc<dyn Carrier>> {
        match selector {
            CarrierSelector::Name(name) => self.resolve_text(name),
            CarrierSelector::ServiceCode(code) => self.resolve_text(code),
            CarrierSelector::CatalogId(id) => {
                let catalog = self.catalog.as_ref().ok_or_else(|| Error::UnsupportedCarrier {
                    selector: format!("catalog id {} (no catalog attached)", id),
                })?;
                let service = catalog.find_service(*id).ok_or_else(|| Error::UnsupportedCarrier {
                    selector: format!("catalog id {}", id),
                })?;
                self.resolve(&CarrierSelector::Name(service.carrier_name))
            }
        }
    }

    fn resolve_text(&self, text: &str) -> Result<Arc<dyn Carrier>> {
        let trimmed = text.trim();
        if is_manual_code(trimmed) {
            return Err(Error::UnsupportedCarrier {
                selector: format!("{} (manual carrier, no API client)", trimmed),
            });
        }

        // Exact name match first
        if let Some(carrier) = self.carriers.get(&trimmed.to_lowercase()) {
            return Ok(carrier.clone());
        }

        // Service-code vocabularies, checked in fixed order
        if let Some(name) = match_service_code(trimmed) {
            if let Some(carrier) = self.carriers.get(name) {
                return Ok(carrier.clone());
            }
        }

        // Designated fallback last
        if let Some(fallback) = &self.fallback {
            if let Some(carrier) = self.carriers.get(fallback) {
                tracing::debug!(selector = trimmed, fallback = %fallback, "falling back to default carrier");
                return Ok(carrier.clone());
            }
        }

        Err(Error::UnsupportedCarrier {
            selector: trimmed.to_string(),
        })
    }
}

impl Default for CarrierFactory {
    fn default() -> Self {
        Self::new()
    }
}

/// True for carrier codes booked outside the API integration
pub fn is_manual_code(code: &str) -> bool {
    let upper = code.trim().to_uppercase();
    MANUAL_CARRIER_CODES.iter().any(|manual| upper == *manual)
}

/// Service-code heuristics, fixed order: FedEx, DHL, UPS
fn match_service_code(code: &str) -> Option<&'static str> {
    let upper = code.trim().to_uppercase();

    if upper.contains("FEDEX") || FEDEX_SERVICE_CODES.iter().any(|known| upper == *known) {
        return Some("fedex");
    }
    if upper.contains("DHL") || DHL_SERVICE_CODES.iter().any(|known| upper == *known) {
        return Some("dhl");
    }
    if upper.starts_with("UPS") || UPS_SERVICE_CODES.iter().any(|known| upper == *known) {
        return Some("ups");
    }
    None
}
