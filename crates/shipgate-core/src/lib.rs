//! Shipgate Core - uniform carrier integration for FedEx, DHL Express and UPS
//!
//! This crate hides three incompatible carrier REST APIs behind one
//! contract: get rates, create a shipment and label, track, cancel, and
//! validate an address. Per-carrier authentication lifecycles, transient
//! failures, and validation quirks stay inside the carrier clients; the
//! caller only sees the uniform types and the typed error taxonomy.
//!
//! # Main Components
//!
//! - **Carrier clients**: one per provider, sharing the retry/auth/error
//!   engine and diverging only in payload shape and auth transport
//! - **Normalizer**: pure functions fixing numeric precision, street-line
//!   layout, units, country codes, and customs line items
//! - **Error Translator**: ordered pattern tables mapping raw carrier
//!   text to operator-friendly messages and coarse categories
//! - **Factory**: resolves names, catalog ids, and raw service codes to
//!   registered clients
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use shipgate_core::carriers::{Carrier, FedExCarrier};
//! use shipgate_core::config::CarrierConfig;
//! use shipgate_core::http::{InMemoryTokenCache, ReqwestTransport};
//! use shipgate_core::normalize::StaticCountryTable;
//! use shipgate_core::types::CarrierId;
//!
//! # async fn example(request: shipgate_core::types::ShipmentRequest) -> shipgate_core::Result<()> {
//! let carrier = FedExCarrier::new(
//!     CarrierConfig::from_env(CarrierId::FedEx)?,
//!     Arc::new(ReqwestTransport::with_default_policy().expect("client")),
//!     Arc::new(InMemoryTokenCache::new()),
//!     Arc::new(StaticCountryTable::new()),
//! );
//! let quotes = carrier.get_rates(&request).await?;
//! # let _ = quotes;
//! # Ok(())
//! # }
//! ```

pub mod carriers;
pub mod config;
pub mod error;
pub mod factory;
pub mod http;
pub mod normalize;
pub mod translate;
pub mod types;

// Re-export main types for convenience
pub use error::{CarrierFailure, Error, ErrorDetail, Result};
pub use types::{
    // Parties and addresses
    Address, Contact, Party,

    // Shipment inputs
    CommodityDetail, DimensionUnit, PackageDetail, ShipmentDocuments, ShipmentRequest, WeightUnit,

    // Results
    Label, RateQuote, ShipmentOutcome, Surcharge,

    // Tracking
    TrackingEvent, TrackingInfo, TrackingStatus,

    // Carrier identity
    CarrierId,
};

pub use carriers::{Carrier, DhlCarrier, FedExCarrier, UpsCarrier};
pub use factory::{CarrierFactory, CarrierSelector, CatalogService, ServiceCatalog};
pub use translate::{ErrorCategory, ErrorTranslator};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
