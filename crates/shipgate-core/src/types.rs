//! Core types and data structures for the carrier integration layer
//!
//! This module defines the fundamental value objects used throughout the
//! library for representing shipments, rates, labels, and tracking state.
//! All of them are constructed once per call and treated as immutable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, ErrorDetail};

/// Identifier for an API-integrated carrier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CarrierId {
    FedEx,
    Dhl,
    Ups,
}

impl CarrierId {
    /// Canonical lowercase name used for registry and cache keys
    pub fn as_str(&self) -> &'static str {
        match self {
            CarrierId::FedEx => "fedex",
            CarrierId::Dhl => "dhl",
            CarrierId::Ups => "ups",
        }
    }

    /// Uppercase key used in environment variable names
    pub fn env_key(&self) -> &'static str {
        match self {
            CarrierId::FedEx => "FEDEX",
            CarrierId::Dhl => "DHL",
            CarrierId::Ups => "UPS",
        }
    }
}

impl std::fmt::Display for CarrierId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A postal address for a sender or recipient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    /// First street line
    pub street1: String,

    /// Second street line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street2: Option<String>,

    /// City name; substituted with a per-country default when absent
    pub city: String,

    /// State or province code, optional per country
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// Postal code, optional per country
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,

    /// ISO-3166 country code; normalized to 2 letters before transmission
    pub country: String,
}

/// Contact details attached to an address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// A contact/address pairing for one side of a shipment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Party {
    pub contact: Contact,
    pub address: Address,
}

/// Weight unit for package weights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WeightUnit {
    Lb,
    Kg,
}

/// Dimension unit for package dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DimensionUnit {
    In,
    Cm,
}

/// One physical package in a shipment
///
/// Dimensions are either all present (> 0) or all omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageDetail {
    pub weight: f64,
    pub weight_unit: WeightUnit,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    pub dimension_unit: DimensionUnit,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declared_value: Option<f64>,
}

impl PackageDetail {
    /// True when all three dimensions are present and positive
    pub fn has_dimensions(&self) -> bool {
        matches!(
            (self.length, self.width, self.height),
            (Some(l), Some(w), Some(h)) if l > 0.0 && w > 0.0 && h > 0.0
        )
    }
}

/// One customs line item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommodityDetail {
    pub description: String,
    pub quantity: u32,
    pub unit_value: f64,
    pub total_value: f64,
    pub weight: f64,
    /// Harmonized System code; normalized to 6-10 digits before transmission
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hs_code: Option<String>,
    pub origin_country: String,
}

/// Carrier-required documents sourced from collaborators
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShipmentDocuments {
    /// Commercial invoice as base64 PDF content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_pdf: Option<String>,
    /// Invoice number printed on the attached document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,
}

/// One outbound shipment intent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentRequest {
    pub sender: Party,
    pub recipient: Party,
    pub packages: Vec<PackageDetail>,
    /// Customs line items, required when the route is customs-declarable
    #[serde(default)]
    pub commodities: Vec<CommodityDetail>,
    /// Requested service type in the carrier's vocabulary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,
    /// Declared currency for values and charges
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Optional carrier features requested alongside the shipment
    #[serde(default)]
    pub value_added_services: Vec<String>,
    /// Planned shipping date; defaults to now when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ship_date: Option<DateTime<Utc>>,
}

impl ShipmentRequest {
    /// True when sender and recipient countries differ, which makes the
    /// route customs-declarable.
    pub fn is_customs_declarable(&self) -> bool {
        let from = self.sender.address.country.trim().to_uppercase();
        let to = self.recipient.address.country.trim().to_uppercase();
        from.chars().take(2).ne(to.chars().take(2))
    }

    /// Check the construction invariants the carriers rely on
    pub fn validate(&self) -> crate::Result<()> {
        if self.packages.is_empty() {
            return Err(Error::Configuration {
                message: "Shipment request has no packages".to_string(),
                source: None,
            });
        }
        for (index, package) in self.packages.iter().enumerate() {
            if package.weight <= 0.0 {
                return Err(Error::Configuration {
                    message: format!("Package {} has non-positive weight", index + 1),
                    source: None,
                });
            }
            let dims = [package.length, package.width, package.height];
            let present = dims.iter().filter(|d| d.is_some()).count();
            if present != 0 && !package.has_dimensions() {
                return Err(Error::Configuration {
                    message: format!(
                        "Package {} has partial dimensions; provide all of length/width/height or none",
                        index + 1
                    ),
                    source: None,
                });
            }
        }
        if self.is_customs_declarable() && self.commodities.is_empty() {
            return Err(Error::Configuration {
                message: "International shipment requires at least one commodity line".to_string(),
                source: None,
            });
        }
        Ok(())
    }
}

/// One surcharge entry in a rate breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Surcharge {
    pub description: String,
    pub amount: f64,
}

/// One quoted service option
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateQuote {
    pub carrier: CarrierId,
    pub service_code: String,
    pub service_name: String,
    pub total_charge: f64,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_charge: Option<f64>,
    #[serde(default)]
    pub surcharges: Vec<Surcharge>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transit_days: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_delivery: Option<DateTime<Utc>>,
    /// Raw provider payload for this quote
    pub raw: Value,
}

/// Shipping label output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Label {
    /// Inline base64-encoded document
    Inline { format: String, content: String },
    /// Fetchable URL provided by the carrier
    Url { url: String },
}

/// Result of shipment creation
///
/// Failure is represented as `success == false` with populated error
/// detail, never as a propagated error, so the caller can always persist
/// partial state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<Label>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_charge: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub errors: Vec<ErrorDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
}

impl ShipmentOutcome {
    /// Build a failed outcome from a propagated error, keeping whatever
    /// structured detail the carrier supplied.
    pub fn from_error(error: &Error) -> Self {
        match error {
            Error::Validation(failure) | Error::Carrier(failure) => ShipmentOutcome {
                success: false,
                tracking_number: None,
                label: None,
                total_charge: None,
                currency: None,
                message: Some(failure.message.clone()),
                errors: failure.errors.clone(),
                raw: failure.raw_body.clone().map(Value::String),
            },
            other => ShipmentOutcome {
                success: false,
                tracking_number: None,
                label: None,
                total_charge: None,
                currency: None,
                message: Some(other.to_string()),
                errors: Vec::new(),
                raw: None,
            },
        }
    }

    /// Failed outcome with just a message
    pub fn failed(message: impl Into<String>) -> Self {
        ShipmentOutcome {
            success: false,
            tracking_number: None,
            label: None,
            total_charge: None,
            currency: None,
            message: Some(message.into()),
            errors: Vec::new(),
            raw: None,
        }
    }
}

/// Normalized tracking status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingStatus {
    Created,
    InTransit,
    OutForDelivery,
    Delivered,
    Exception,
    Returned,
    Unknown,
}

/// One tracking scan event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    pub status: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Current state of a shipment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingInfo {
    pub tracking_number: String,
    pub status: TrackingStatus,
    pub status_text: String,
    /// Ordered most-recent-first, mirroring the source APIs
    pub events: Vec<TrackingEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_delivery: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_delivery: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed_by: Option<String>,
}
