//! UPS carrier client
//!
//! OAuth2 client-credentials with HTTP Basic on the token call, street
//! lines capped at 35 characters. The UPS JSON APIs carry numbers as
//! strings and collapse single-element arrays into bare objects; both
//! quirks are handled here.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::carriers::{fallback, Carrier, CarrierCore};
use crate::config::CarrierConfig;
use crate::error::{CarrierFailure, Error, Result};
use crate::http::auth::AuthScheme;
use crate::http::cache::TokenCache;
use crate::http::transport::{CarrierRequest, Transport};
use crate::normalize::commodity::{self, CustomsLine};
use crate::normalize::{address, country, precision, units};
use crate::types::{
    Address, CarrierId, DimensionUnit, Label, Party, RateQuote, ShipmentDocuments,
    ShipmentOutcome, ShipmentRequest, Surcharge, TrackingEvent, TrackingInfo, TrackingStatus,
    WeightUnit,
};

const LINE_CAP: usize = address::FEDEX_UPS_LINE_CAP;

/// UPS bills nothing below a tenth of a pound
const MIN_WEIGHT_LB: f64 = 0.1;

pub struct UpsCarrier {
    core: CarrierCore,
}

impl UpsCarrier {
    pub fn new(
        config: CarrierConfig,
        transport: Arc<dyn Transport>,
        cache: Arc<dyn TokenCache>,
        countries: Arc<dyn crate::normalize::country::CountryLookup>,
    ) -> Self {
        let scheme = AuthScheme::OAuth2ClientCredentials {
            token_path: "/security/v1/oauth/token".to_string(),
            basic_token_auth: true,
        };
        Self {
            core: CarrierCore::new(config, scheme, transport, cache, countries),
        }
    }

    fn build_address(&self, address: &Address) -> Value {
        let countries = self.core.countries();
        let code = country::normalize_code(&address.country, CarrierId::Ups, countries);
        let (line1, line2) =
            address::split_street(&address.street1, address.street2.as_deref().unwrap_or(""), LINE_CAP);
        let mut lines = vec![Value::String(line1)];
        if let Some(line2) = line2 {
            lines.push(Value::String(line2));
        }

        let mut built = json!({
            "AddressLine": lines,
            "City": address::city_or_default(&address.city, &code, countries),
            "CountryCode": code,
        });
        if let Some(state) = address.state.as_deref().filter(|s| !s.trim().is_empty()) {
            built["StateProvinceCode"] = json!(state);
        }
        if let Some(postal) =
            country::postal_code_or_placeholder(address.postal_code.as_deref(), &code, countries)
        {
            built["PostalCode"] = json!(postal);
        }
        built
    }

    fn build_party(&self, party: &Party, with_account: bool) -> Value {
        let mut built = json!({
            "Name": party.contact.company.as_deref().unwrap_or(&party.contact.name),
            "AttentionName": party.contact.name,
            "Phone": {"Number": party.contact.phone},
            "Address": self.build_address(&party.address),
        });
        if with_account {
            built["ShipperNumber"] = json!(self.core.config().account_number);
        }
        built
    }

    fn build_packages(&self, request: &ShipmentRequest, packaging_key: &str) -> Vec<Value> {
        request
            .packages
            .iter()
            .map(|package| {
                let unit = match package.weight_unit {
                    WeightUnit::Lb => "LBS",
                    WeightUnit::Kg => "KGS",
                };
                let minimum = match package.weight_unit {
                    WeightUnit::Lb => MIN_WEIGHT_LB,
                    WeightUnit::Kg => units::to_kg(MIN_WEIGHT_LB, WeightUnit::Lb),
                };
                let weight = units::floor_weight(package.weight, minimum);
                let mut built = json!({
                    "PackageWeight": {
                        "UnitOfMeasurement": {"Code": unit},
                        "Weight": number_string(weight),
                    },
                });
                // Rating says PackagingType, shipping says Packaging
                built[packaging_key] = json!({"Code": "02"});
                if package.has_dimensions() {
                    let unit = match package.dimension_unit {
                        DimensionUnit::In => "IN",
                        DimensionUnit::Cm => "CM",
                    };
                    built["Dimensions"] = json!({
                        "UnitOfMeasurement": {"Code": unit},
                        "Length": number_string(package.length.unwrap_or_default().ceil()),
                        "Width": number_string(package.width.unwrap_or_default().ceil()),
                        "Height": number_string(package.height.unwrap_or_default().ceil()),
                    });
                }
                built
            })
            .collect()
    }

    fn build_rate_request(&self, request: &ShipmentRequest) -> Value {
        json!({
            "RateRequest": {
                "Request": {
                    "RequestOption": "Shop",
                    "TransactionReference": {
                        "CustomerContext": request.reference.as_deref().unwrap_or("Rating"),
                    },
                },
                "Shipment": {
                    "Shipper": self.build_party(&request.sender, true),
                    "ShipTo": self.build_party(&request.recipient, false),
                    "ShipFrom": self.build_party(&request.sender, false),
                    "PaymentDetails": {
                        "ShipmentCharge": [{
                            "Type": "01",
                            "BillShipper": {"AccountNumber": self.core.config().account_number},
                        }],
                    },
                    "Package": self.build_packages(request, "PackagingType"),
                },
            },
        })
    }

    async fn rates_once(&self, request: &ShipmentRequest) -> Result<Vec<RateQuote>> {
        let mut payload = self.build_rate_request(request);
        precision::normalize_payload(&mut payload);
        let url = self.core.config().url("/api/rating/v1/Shop")?;
        let response = self.core.send_authed(CarrierRequest::post(url).with_json(payload)).await?;
        let body = response.json().unwrap_or(Value::Null);
        Ok(self.parse_rates(&body, request))
    }

    fn parse_rates(&self, body: &Value, request: &ShipmentRequest) -> Vec<RateQuote> {
        let rated = match body.pointer("/RateResponse/RatedShipment") {
            Some(rated) => array_or_single(rated),
            None => return Vec::new(),
        };
        rated
            .into_iter()
            .filter_map(|entry| {
                let service_code = entry.pointer("/Service/Code").and_then(Value::as_str)?;
                let total_charge =
                    entry.pointer("/TotalCharges/MonetaryValue").and_then(number_value)?;
                let surcharges = entry
                    .get("ItemizedCharges")
                    .map(array_or_single)
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|charge| {
                        Some(Surcharge {
                            description: charge
                                .get("Code")
                                .and_then(Value::as_str)
                                .unwrap_or("SURCHARGE")
                                .to_string(),
                            amount: charge.get("MonetaryValue").and_then(number_value)?,
                        })
                    })
                    .collect();
                Some(RateQuote {
                    carrier: CarrierId::Ups,
                    service_code: service_code.to_string(),
                    service_name: service_name(service_code).to_string(),
                    total_charge,
                    currency: entry
                        .pointer("/TotalCharges/CurrencyCode")
                        .and_then(Value::as_str)
                        .unwrap_or(&request.currency)
                        .to_string(),
                    base_charge: entry
                        .pointer("/TransportationCharges/MonetaryValue")
                        .and_then(number_value),
                    surcharges,
                    transit_days: entry
                        .pointer("/GuaranteedDelivery/BusinessDaysInTransit")
                        .and_then(number_value)
                        .map(|days| days as u32),
                    estimated_delivery: None,
                    raw: entry.clone(),
                })
            })
            .collect()
    }

    fn build_international_forms(&self, request: &ShipmentRequest) -> Option<Value> {
        if !request.is_customs_declarable() || request.commodities.is_empty() {
            return None;
        }
        let lines = commodity::customs_lines(&request.commodities);
        let products: Vec<Value> = lines.iter().map(|line| self.build_product(line)).collect();
        Some(json!({
            "FormType": "01",
            "InvoiceNumber": request.reference.as_deref().unwrap_or("1"),
            "InvoiceDate": request
                .ship_date
                .unwrap_or_else(chrono::Utc::now)
                .format("%Y%m%d")
                .to_string(),
            "ReasonForExport": "SALE",
            "CurrencyCode": request.currency,
            "Product": products,
        }))
    }

    fn build_product(&self, line: &CustomsLine) -> Value {
        let countries = self.core.countries();
        let mut built = json!({
            "Description": line.description,
            "Unit": {
                "Number": number_string(line.quantity as f64),
                "Value": number_string(line.unit_value),
                "UnitOfMeasurement": {"Code": "PCS"},
            },
            "OriginCountryCode": country::normalize_code(&line.origin_country, CarrierId::Ups, countries),
            "ProductWeight": {
                "UnitOfMeasurement": {"Code": "LBS"},
                "Weight": number_string(line.weight),
            },
        });
        if let Some(hs_code) = &line.hs_code {
            built["CommodityCode"] = json!(hs_code);
        }
        built
    }

    fn build_ship_request(
        &self,
        request: &ShipmentRequest,
        _documents: Option<&ShipmentDocuments>,
    ) -> Value {
        let mut shipment = json!({
            "Description": request
                .commodities
                .first()
                .map(|commodity| commodity.description.clone())
                .unwrap_or_else(|| "Goods".to_string()),
            "Shipper": self.build_party(&request.sender, true),
            "ShipTo": self.build_party(&request.recipient, false),
            "ShipFrom": self.build_party(&request.sender, false),
            "PaymentInformation": {
                "ShipmentCharge": {
                    "Type": "01",
                    "BillShipper": {"AccountNumber": self.core.config().account_number},
                },
            },
            "Service": {"Code": request.service_type.as_deref().unwrap_or("03")},
            "Package": self.build_packages(request, "Packaging"),
        });
        if let Some(reference) = &request.reference {
            shipment["ReferenceNumber"] = json!({"Value": reference});
        }
        if let Some(forms) = self.build_international_forms(request) {
            shipment["ShipmentServiceOptions"] = json!({"InternationalForms": forms});
        }
        json!({
            "ShipmentRequest": {
                "Request": {"RequestOption": "nonvalidate"},
                "Shipment": shipment,
                "LabelSpecification": {
                    "LabelImageFormat": {"Code": "PDF"},
                    "LabelStockSize": {"Height": "6", "Width": "4"},
                },
            },
        })
    }

    async fn ship_once(
        &self,
        request: &ShipmentRequest,
        documents: Option<&ShipmentDocuments>,
    ) -> Result<ShipmentOutcome> {
        let mut payload = self.build_ship_request(request, documents);
        precision::normalize_payload(&mut payload);
        let url = self.core.config().url("/api/shipments/v1/ship")?;
        let response = self.core.send_authed(CarrierRequest::post(url).with_json(payload)).await?;
        let body = response.json().unwrap_or(Value::Null);
        Ok(self.parse_shipment(body))
    }

    fn parse_shipment(&self, body: Value) -> ShipmentOutcome {
        let results = body.pointer("/ShipmentResponse/ShipmentResults").cloned().unwrap_or(Value::Null);
        let package_results = results
            .get("PackageResults")
            .map(array_or_single)
            .unwrap_or_default();
        let first_package = package_results.first().copied();

        let tracking_number = results
            .get("ShipmentIdentificationNumber")
            .and_then(Value::as_str)
            .or_else(|| {
                first_package.and_then(|package| package.get("TrackingNumber").and_then(Value::as_str))
            })
            .map(str::to_string)
            .filter(|number| !number.is_empty());

        let tracking_number = match tracking_number {
            Some(number) => number,
            None => {
                let mut outcome = ShipmentOutcome::failed("No tracking number received");
                outcome.raw = Some(body);
                return outcome;
            }
        };

        let label = first_package.and_then(|package| {
            package
                .pointer("/ShippingLabel/GraphicImage")
                .and_then(Value::as_str)
                .map(|content| Label::Inline {
                    format: package
                        .pointer("/ShippingLabel/ImageFormat/Code")
                        .and_then(Value::as_str)
                        .unwrap_or("PDF")
                        .to_string(),
                    content: content.to_string(),
                })
        });

        ShipmentOutcome {
            success: true,
            tracking_number: Some(tracking_number),
            label,
            total_charge: results
                .pointer("/ShipmentCharges/TotalCharges/MonetaryValue")
                .and_then(number_value),
            currency: results
                .pointer("/ShipmentCharges/TotalCharges/CurrencyCode")
                .and_then(Value::as_str)
                .map(str::to_string),
            message: None,
            errors: Vec::new(),
            raw: Some(body),
        }
    }

    fn parse_tracking(&self, tracking_number: &str, body: &Value) -> Result<TrackingInfo> {
        let package = body
            .pointer("/trackResponse/shipment/0/package/0")
            .ok_or_else(|| {
                Error::Carrier(CarrierFailure {
                    carrier: self.name().to_string(),
                    code: None,
                    message: format!("No tracking information returned for {}", tracking_number),
                    errors: Vec::new(),
                    http_status: None,
                    raw_body: Some(body.to_string()),
                })
            })?;

        let events: Vec<TrackingEvent> = package
            .get("activity")
            .map(array_or_single)
            .unwrap_or_default()
            .into_iter()
            .map(|activity| TrackingEvent {
                timestamp: ups_datetime(
                    activity.get("date").and_then(Value::as_str),
                    activity.get("time").and_then(Value::as_str),
                ),
                status: activity
                    .pointer("/status/type")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string(),
                description: activity
                    .pointer("/status/description")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .trim()
                    .to_string(),
                location: activity
                    .pointer("/location/address/city")
                    .and_then(Value::as_str)
                    .map(|city| {
                        match activity.pointer("/location/address/countryCode").and_then(Value::as_str) {
                            Some(cc) => format!("{}, {}", city, cc),
                            None => city.to_string(),
                        }
                    }),
            })
            .collect();

        let latest_type = events.first().map(|event| event.status.clone()).unwrap_or_default();
        let status = map_status(&latest_type);
        let status_text = events.first().map(|event| event.description.clone()).unwrap_or_default();

        let delivery_dates = package.get("deliveryDate").map(array_or_single).unwrap_or_default();
        let find_date = |kinds: &[&str]| {
            delivery_dates
                .iter()
                .find(|entry| {
                    entry
                        .get("type")
                        .and_then(Value::as_str)
                        .map(|t| kinds.contains(&t))
                        .unwrap_or(false)
                })
                .and_then(|entry| entry.get("date").and_then(Value::as_str))
                .and_then(|date| ups_datetime(Some(date), None))
        };

        Ok(TrackingInfo {
            tracking_number: tracking_number.to_string(),
            status,
            status_text,
            events,
            estimated_delivery: find_date(&["SDD", "RDD"]),
            actual_delivery: find_date(&["DEL"]),
            signed_by: package
                .pointer("/deliveryInformation/receivedBy")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }
}

/// UPS numeric fields travel as strings; responses use either form
fn number_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Serialize a number the way UPS request schemas want it: a string,
/// without a trailing `.0` for whole values
fn number_string(value: f64) -> String {
    format!("{}", precision::weight(value))
}

/// UPS collapses single-element arrays into bare objects
fn array_or_single(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

/// UPS timestamps arrive as yyyyMMdd / HHmmss pairs
fn ups_datetime(date: Option<&str>, time: Option<&str>) -> Option<chrono::DateTime<chrono::Utc>> {
    let date = chrono::NaiveDate::parse_from_str(date?, "%Y%m%d").ok()?;
    let time = time
        .and_then(|t| chrono::NaiveTime::parse_from_str(t, "%H%M%S").ok())
        .unwrap_or_else(|| chrono::NaiveTime::from_hms_opt(0, 0, 0).expect("midnight is valid"));
    Some(date.and_time(time).and_utc())
}

/// UPS activity status types to the normalized enum
fn map_status(status_type: &str) -> TrackingStatus {
    match status_type {
        "M" | "MV" | "P" => TrackingStatus::Created,
        "I" => TrackingStatus::InTransit,
        "O" => TrackingStatus::OutForDelivery,
        "D" => TrackingStatus::Delivered,
        "X" => TrackingStatus::Exception,
        "RS" => TrackingStatus::Returned,
        _ => TrackingStatus::Unknown,
    }
}

/// Human names for the UPS numeric service codes
fn service_name(code: &str) -> &'static str {
    match code {
        "01" => "UPS Next Day Air",
        "02" => "UPS 2nd Day Air",
        "03" => "UPS Ground",
        "07" => "UPS Worldwide Express",
        "08" => "UPS Worldwide Expedited",
        "11" => "UPS Standard",
        "12" => "UPS 3 Day Select",
        "14" => "UPS Next Day Air Early",
        "54" => "UPS Worldwide Express Plus",
        "59" => "UPS 2nd Day Air A.M.",
        "65" => "UPS Worldwide Saver",
        "96" => "UPS Worldwide Express Freight",
        _ => "UPS",
    }
}

#[async_trait]
impl Carrier for UpsCarrier {
    fn name(&self) -> &'static str {
        "ups"
    }

    async fn authenticate(&self) -> Result<()> {
        self.core.authenticate().await
    }

    async fn get_rates(&self, request: &ShipmentRequest) -> Result<Vec<RateQuote>> {
        request.validate()?;
        match self.rates_once(request).await {
            Ok(quotes) => Ok(quotes),
            Err(original) if fallback::is_address_failure(&original) => {
                let stripped = fallback::strip_address_fields(request);
                match self.rates_once(&stripped).await {
                    Ok(quotes) => Ok(quotes),
                    Err(_) => Err(original),
                }
            }
            Err(original) => Err(original),
        }
    }

    async fn create_shipment(
        &self,
        request: &ShipmentRequest,
        documents: Option<&ShipmentDocuments>,
    ) -> ShipmentOutcome {
        if let Err(error) = request.validate() {
            return ShipmentOutcome::from_error(&error);
        }
        match self.ship_once(request, documents).await {
            Ok(outcome) => outcome,
            Err(original) if fallback::is_address_failure(&original) => {
                let stripped = fallback::strip_address_fields(request);
                match self.ship_once(&stripped, documents).await {
                    Ok(outcome) => outcome,
                    Err(_) => ShipmentOutcome::from_error(&original),
                }
            }
            Err(original) => ShipmentOutcome::from_error(&original),
        }
    }

    async fn track(&self, tracking_number: &str) -> Result<TrackingInfo> {
        let url = self
            .core
            .config()
            .url(&format!("/api/track/v1/details/{}", tracking_number))?;
        let response = self.core.send_authed(CarrierRequest::get(url)).await?;
        let body = response.json().unwrap_or(Value::Null);
        self.parse_tracking(tracking_number, &body)
    }

    async fn cancel_shipment(&self, tracking_number: &str) -> bool {
        let url = match self
            .core
            .config()
            .url(&format!("/api/shipments/v1/void/cancel/{}", tracking_number))
        {
            Ok(url) => url,
            Err(_) => return false,
        };
        match self.core.send_authed(CarrierRequest::delete(url)).await {
            Ok(response) => response
                .json()
                .and_then(|body| {
                    body.pointer("/VoidShipmentResponse/Response/ResponseStatus/Code")
                        .and_then(Value::as_str)
                        .map(|code| code == "1")
                })
                .unwrap_or(response.is_success()),
            Err(error) => {
                tracing::debug!(carrier = "ups", %error, "cancellation failed");
                false
            }
        }
    }

    async fn validate_address(&self, address: &Address) -> Address {
        let url = match self.core.config().url("/api/addressvalidation/v1/1") {
            Ok(url) => url,
            Err(_) => return address.clone(),
        };
        let payload = json!({
            "XAVRequest": {"AddressKeyFormat": self.build_key_format(address)},
        });
        let response = match self.core.send_authed(CarrierRequest::post(url).with_json(payload)).await {
            Ok(response) => response,
            Err(error) => {
                tracing::debug!(carrier = "ups", %error, "address validation failed");
                return address.clone();
            }
        };
        let body = match response.json() {
            Some(body) => body,
            None => return address.clone(),
        };
        let candidates = match body.pointer("/XAVResponse/Candidate") {
            Some(candidates) => array_or_single(candidates),
            None => return address.clone(),
        };
        let key_format = match candidates.first().and_then(|c| c.get("AddressKeyFormat")) {
            Some(key_format) => key_format,
            None => return address.clone(),
        };

        let mut corrected = address.clone();
        if let Some(lines) = key_format.get("AddressLine") {
            let lines = array_or_single(lines);
            if let Some(line1) = lines.first().and_then(|l| l.as_str()) {
                corrected.street1 = line1.to_string();
            }
            corrected.street2 = lines.get(1).and_then(|l| l.as_str()).map(str::to_string);
        }
        if let Some(city) = key_format.get("PoliticalDivision2").and_then(Value::as_str) {
            corrected.city = city.to_string();
        }
        if let Some(state) = key_format.get("PoliticalDivision1").and_then(Value::as_str) {
            corrected.state = Some(state.to_string());
        }
        if let Some(postal) = key_format.get("PostcodePrimaryLow").and_then(Value::as_str) {
            corrected.postal_code = Some(postal.to_string());
        }
        if let Some(country) = key_format.get("CountryCode").and_then(Value::as_str) {
            corrected.country = country.to_string();
        }
        corrected
    }
}

impl UpsCarrier {
    fn build_key_format(&self, address: &Address) -> Value {
        let countries = self.core.countries();
        let code = country::normalize_code(&address.country, CarrierId::Ups, countries);
        let (line1, line2) =
            address::split_street(&address.street1, address.street2.as_deref().unwrap_or(""), LINE_CAP);
        let mut lines = vec![Value::String(line1)];
        if let Some(line2) = line2 {
            lines.push(Value::String(line2));
        }
        let mut built = json!({
            "AddressLine": lines,
            "PoliticalDivision2": address.city,
            "CountryCode": code,
        });
        if let Some(state) = address.state.as_deref() {
            built["PoliticalDivision1"] = json!(state);
        }
        if let Some(postal) = address.postal_code.as_deref() {
            built["PostcodePrimaryLow"] = json!(postal);
        }
        built
    }
}
