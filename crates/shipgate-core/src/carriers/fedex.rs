//! FedEx carrier client
//!
//! OAuth2 client-credentials against `/oauth/token`; JSON APIs for
//! rating, shipping, tracking, cancellation, and address resolution.
//! Street lines are capped at 35 characters.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::carriers::{fallback, parse_datetime, Carrier, CarrierCore};
use crate::config::CarrierConfig;
use crate::error::{CarrierFailure, Error, Result};
use crate::http::auth::AuthScheme;
use crate::http::cache::TokenCache;
use crate::http::transport::{CarrierRequest, Transport};
use crate::normalize::{address, country, precision, units};
use crate::normalize::commodity::{self, CustomsLine};
use crate::types::{
    Address, CarrierId, Label, Party, RateQuote, ShipmentDocuments, ShipmentOutcome,
    ShipmentRequest, Surcharge, TrackingEvent, TrackingInfo, TrackingStatus, WeightUnit,
};

const LINE_CAP: usize = address::FEDEX_UPS_LINE_CAP;

/// FedEx rejects weights below half a pound on most services
const MIN_WEIGHT_LB: f64 = 0.5;

pub struct FedExCarrier {
    core: CarrierCore,
}

impl FedExCarrier {
    pub fn new(
        config: CarrierConfig,
        transport: Arc<dyn Transport>,
        cache: Arc<dyn TokenCache>,
        countries: Arc<dyn crate::normalize::country::CountryLookup>,
    ) -> Self {
        let scheme = AuthScheme::OAuth2ClientCredentials {
            token_path: "/oauth/token".to_string(),
            basic_token_auth: false,
        };
        Self {
            core: CarrierCore::new(config, scheme, transport, cache, countries),
        }
    }

    fn build_address(&self, address: &Address) -> Value {
        let countries = self.core.countries();
        let code = country::normalize_code(&address.country, CarrierId::FedEx, countries);
        let (line1, line2) =
            address::split_street(&address.street1, address.street2.as_deref().unwrap_or(""), LINE_CAP);
        let mut street_lines = vec![Value::String(line1)];
        if let Some(line2) = line2 {
            street_lines.push(Value::String(line2));
        }

        let mut built = json!({
            "streetLines": street_lines,
            "city": address::city_or_default(&address.city, &code, countries),
            "countryCode": code,
        });
        if let Some(state) = address.state.as_deref().filter(|s| !s.trim().is_empty()) {
            built["stateOrProvinceCode"] = json!(state);
        }
        if let Some(postal) =
            country::postal_code_or_placeholder(address.postal_code.as_deref(), &code, countries)
        {
            built["postalCode"] = json!(postal);
        }
        built
    }

    fn build_party(&self, party: &Party) -> Value {
        json!({
            "contact": {
                "personName": party.contact.name,
                "companyName": party.contact.company,
                "phoneNumber": party.contact.phone,
            },
            "address": self.build_address(&party.address),
        })
    }

    fn build_package_line_items(&self, request: &ShipmentRequest) -> Vec<Value> {
        request
            .packages
            .iter()
            .map(|package| {
                let unit = match package.weight_unit {
                    WeightUnit::Lb => "LB",
                    WeightUnit::Kg => "KG",
                };
                let minimum = match package.weight_unit {
                    WeightUnit::Lb => MIN_WEIGHT_LB,
                    WeightUnit::Kg => units::to_kg(MIN_WEIGHT_LB, WeightUnit::Lb),
                };
                let mut item = json!({
                    "weight": {
                        "units": unit,
                        "value": units::floor_weight(package.weight, minimum),
                    },
                });
                if package.has_dimensions() {
                    let dimension_unit = match package.dimension_unit {
                        crate::types::DimensionUnit::In => "IN",
                        crate::types::DimensionUnit::Cm => "CM",
                    };
                    item["dimensions"] = json!({
                        "length": package.length.unwrap_or_default().ceil(),
                        "width": package.width.unwrap_or_default().ceil(),
                        "height": package.height.unwrap_or_default().ceil(),
                        "units": dimension_unit,
                    });
                }
                if let Some(value) = package.declared_value {
                    item["declaredValue"] = json!({
                        "amount": precision::money(value),
                        "currency": request.currency,
                    });
                }
                item
            })
            .collect()
    }

    fn build_customs(&self, request: &ShipmentRequest) -> Option<Value> {
        if !request.is_customs_declarable() || request.commodities.is_empty() {
            return None;
        }
        let lines = commodity::customs_lines(&request.commodities);
        let commodities: Vec<Value> = lines.iter().map(|line| self.build_commodity(line, request)).collect();
        Some(json!({
            "dutiesPayment": {"paymentType": "SENDER"},
            "commercialInvoice": {"shipmentPurpose": "SOLD"},
            "totalCustomsValue": {
                "amount": commodity::total_value(&lines),
                "currency": request.currency,
            },
            "commodities": commodities,
        }))
    }

    fn build_commodity(&self, line: &CustomsLine, request: &ShipmentRequest) -> Value {
        let countries = self.core.countries();
        let mut built = json!({
            "description": line.description,
            "quantity": line.quantity,
            "quantityUnits": "PCS",
            "numberOfPieces": line.number,
            "unitPrice": {"amount": line.unit_value, "currency": request.currency},
            "customsValue": {"amount": line.total_value, "currency": request.currency},
            "weight": {"units": "LB", "value": line.weight},
            "countryOfManufacture": country::normalize_code(&line.origin_country, CarrierId::FedEx, countries),
        });
        if let Some(hs_code) = &line.hs_code {
            built["harmonizedCode"] = json!(hs_code);
        }
        built
    }

    fn build_rate_request(&self, request: &ShipmentRequest) -> Value {
        let mut shipment = json!({
            "shipper": {"address": self.build_address(&request.sender.address)},
            "recipient": {"address": self.build_address(&request.recipient.address)},
            "preferredCurrency": request.currency,
            "pickupType": "DROPOFF_AT_FEDEX_LOCATION",
            "rateRequestType": ["ACCOUNT"],
            "requestedPackageLineItems": self.build_package_line_items(request),
        });
        if let Some(service) = &request.service_type {
            shipment["serviceType"] = json!(service);
        }
        if let Some(customs) = self.build_customs(request) {
            shipment["customsClearanceDetail"] = customs;
        }
        json!({
            "accountNumber": {"value": self.core.config().account_number},
            "rateRequestControlParameters": {"returnTransitTimes": true},
            "requestedShipment": shipment,
        })
    }

    async fn rates_once(&self, request: &ShipmentRequest) -> Result<Vec<RateQuote>> {
        let mut payload = self.build_rate_request(request);
        precision::normalize_payload(&mut payload);
        let url = self.core.config().url("/rate/v1/rates/quotes")?;
        let response = self.core.send_authed(CarrierRequest::post(url).with_json(payload)).await?;
        let body = response.json().unwrap_or(Value::Null);
        Ok(self.parse_rates(&body, request))
    }

    fn parse_rates(&self, body: &Value, request: &ShipmentRequest) -> Vec<RateQuote> {
        let details = match body.pointer("/output/rateReplyDetails").and_then(Value::as_array) {
            Some(details) => details,
            None => return Vec::new(),
        };
        details
            .iter()
            .filter_map(|detail| {
                let service_code = detail.get("serviceType").and_then(Value::as_str)?;
                let rated = detail.pointer("/ratedShipmentDetails/0")?;
                let total_charge = rated.get("totalNetCharge").and_then(Value::as_f64)?;
                let surcharges = rated
                    .pointer("/shipmentRateDetail/surCharges")
                    .and_then(Value::as_array)
                    .map(|entries| {
                        entries
                            .iter()
                            .filter_map(|entry| {
                                Some(Surcharge {
                                    description: entry
                                        .get("description")
                                        .or_else(|| entry.get("type"))
                                        .and_then(Value::as_str)?
                                        .to_string(),
                                    amount: entry.get("amount").and_then(Value::as_f64)?,
                                })
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                Some(RateQuote {
                    carrier: CarrierId::FedEx,
                    service_code: service_code.to_string(),
                    service_name: detail
                        .get("serviceName")
                        .and_then(Value::as_str)
                        .unwrap_or(service_code)
                        .to_string(),
                    total_charge,
                    currency: rated
                        .get("currency")
                        .and_then(Value::as_str)
                        .unwrap_or(&request.currency)
                        .to_string(),
                    base_charge: rated.pointer("/shipmentRateDetail/totalBaseCharge").and_then(Value::as_f64),
                    surcharges,
                    transit_days: detail
                        .pointer("/operationalDetail/transitTime")
                        .and_then(Value::as_str)
                        .and_then(transit_days_from_code),
                    estimated_delivery: detail
                        .pointer("/commit/dateDetail/dayFormat")
                        .and_then(Value::as_str)
                        .and_then(parse_datetime),
                    raw: detail.clone(),
                })
            })
            .collect()
    }

    fn build_ship_request(&self, request: &ShipmentRequest, _documents: Option<&ShipmentDocuments>) -> Value {
        let mut shipment = json!({
            "shipper": self.build_party(&request.sender),
            "recipients": [self.build_party(&request.recipient)],
            "serviceType": request.service_type.as_deref().unwrap_or("FEDEX_GROUND"),
            "packagingType": "YOUR_PACKAGING",
            "pickupType": "DROPOFF_AT_FEDEX_LOCATION",
            "shippingChargesPayment": {"paymentType": "SENDER"},
            "labelSpecification": {
                "imageType": "PDF",
                "labelStockType": "PAPER_4X6",
            },
            "preferredCurrency": request.currency,
            "requestedPackageLineItems": self.build_package_line_items(request),
        });
        if let Some(reference) = &request.reference {
            shipment["customerReferences"] =
                json!([{"customerReferenceType": "CUSTOMER_REFERENCE", "value": reference}]);
        }
        if let Some(customs) = self.build_customs(request) {
            shipment["customsClearanceDetail"] = customs;
        }
        json!({
            "labelResponseOptions": "LABEL",
            "accountNumber": {"value": self.core.config().account_number},
            "requestedShipment": shipment,
        })
    }

    async fn ship_once(
        &self,
        request: &ShipmentRequest,
        documents: Option<&ShipmentDocuments>,
    ) -> Result<ShipmentOutcome> {
        let mut payload = self.build_ship_request(request, documents);
        precision::normalize_payload(&mut payload);
        let url = self.core.config().url("/ship/v1/shipments")?;
        let response = self.core.send_authed(CarrierRequest::post(url).with_json(payload)).await?;
        let body = response.json().unwrap_or(Value::Null);
        Ok(self.parse_shipment(body))
    }

    fn parse_shipment(&self, body: Value) -> ShipmentOutcome {
        let shipment = body.pointer("/output/transactionShipments/0").cloned().unwrap_or(Value::Null);
        let tracking_number = shipment
            .get("masterTrackingNumber")
            .and_then(Value::as_str)
            .or_else(|| shipment.pointer("/pieceResponses/0/trackingNumber").and_then(Value::as_str))
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

        let label = shipment
            .pointer("/pieceResponses/0/packageDocuments/0")
            .and_then(|document| {
                if let Some(url) = document.get("url").and_then(Value::as_str) {
                    return Some(Label::Url { url: url.to_string() });
                }
                document.get("encodedLabel").and_then(Value::as_str).map(|content| Label::Inline {
                    format: document
                        .get("docType")
                        .and_then(Value::as_str)
                        .unwrap_or("PDF")
                        .to_string(),
                    content: content.to_string(),
                })
            });

        let total_charge = shipment
            .pointer("/completedShipmentDetail/shipmentRating/shipmentRateDetails/0/totalNetCharge")
            .and_then(Value::as_f64);
        let currency = shipment
            .pointer("/completedShipmentDetail/shipmentRating/shipmentRateDetails/0/currency")
            .and_then(Value::as_str)
            .map(str::to_string);

        ShipmentOutcome {
            success: true,
            tracking_number: Some(tracking_number),
            label,
            total_charge,
            currency,
            message: None,
            errors: Vec::new(),
            raw: Some(body),
        }
    }

    fn parse_tracking(&self, tracking_number: &str, body: &Value) -> Result<TrackingInfo> {
        let result = body
            .pointer("/output/completeTrackResults/0/trackResults/0")
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

        let status_code = result.pointer("/latestStatusDetail/code").and_then(Value::as_str).unwrap_or("");
        let status_text = result
            .pointer("/latestStatusDetail/description")
            .and_then(Value::as_str)
            .unwrap_or(status_code)
            .to_string();

        let events = result
            .get("scanEvents")
            .and_then(Value::as_array)
            .map(|scans| {
                scans
                    .iter()
                    .map(|scan| TrackingEvent {
                        timestamp: scan.get("date").and_then(Value::as_str).and_then(parse_datetime),
                        status: scan
                            .get("derivedStatusCode")
                            .or_else(|| scan.get("eventType"))
                            .and_then(Value::as_str)
                            .unwrap_or("")
                            .to_string(),
                        description: scan
                            .get("eventDescription")
                            .and_then(Value::as_str)
                            .unwrap_or("")
                            .to_string(),
                        location: scan.pointer("/scanLocation/city").and_then(Value::as_str).map(|city| {
                            match scan.pointer("/scanLocation/countryCode").and_then(Value::as_str) {
                                Some(cc) => format!("{}, {}", city, cc),
                                None => city.to_string(),
                            }
                        }),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let find_date = |kind: &str| {
            result
                .get("dateAndTimes")
                .and_then(Value::as_array)
                .and_then(|entries| {
                    entries
                        .iter()
                        .find(|entry| entry.get("type").and_then(Value::as_str) == Some(kind))
                })
                .and_then(|entry| entry.get("dateTime").and_then(Value::as_str))
                .and_then(parse_datetime)
        };

        Ok(TrackingInfo {
            tracking_number: tracking_number.to_string(),
            status: map_status(status_code),
            status_text,
            events,
            estimated_delivery: find_date("ESTIMATED_DELIVERY"),
            actual_delivery: find_date("ACTUAL_DELIVERY"),
            signed_by: result
                .pointer("/deliveryDetails/receivedByName")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }
}

/// FedEx latest-status codes to the normalized enum
fn map_status(code: &str) -> TrackingStatus {
    match code {
        "OC" => TrackingStatus::Created,
        "PU" | "IT" | "DP" | "AR" | "CD" => TrackingStatus::InTransit,
        "OD" => TrackingStatus::OutForDelivery,
        "DL" => TrackingStatus::Delivered,
        "DE" | "SE" | "CA" => TrackingStatus::Exception,
        "RS" | "RT" => TrackingStatus::Returned,
        _ => TrackingStatus::Unknown,
    }
}

/// FedEx reports transit time as a word code rather than a number
fn transit_days_from_code(code: &str) -> Option<u32> {
    match code {
        "ONE_DAY" => Some(1),
        "TWO_DAYS" => Some(2),
        "THREE_DAYS" => Some(3),
        "FOUR_DAYS" => Some(4),
        "FIVE_DAYS" => Some(5),
        "SIX_DAYS" => Some(6),
        "SEVEN_DAYS" => Some(7),
        _ => None,
    }
}

#[async_trait]
impl Carrier for FedExCarrier {
    fn name(&self) -> &'static str {
        "fedex"
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
        let payload = json!({
            "includeDetailedScans": true,
            "trackingInfo": [{"trackingNumberInfo": {"trackingNumber": tracking_number}}],
        });
        let url = self.core.config().url("/track/v1/trackingnumbers")?;
        let response = self.core.send_authed(CarrierRequest::post(url).with_json(payload)).await?;
        let body = response.json().unwrap_or(Value::Null);
        self.parse_tracking(tracking_number, &body)
    }

    async fn cancel_shipment(&self, tracking_number: &str) -> bool {
        let url = match self.core.config().url("/ship/v1/shipments/cancel") {
            Ok(url) => url,
            Err(_) => return false,
        };
        let payload = json!({
            "accountNumber": {"value": self.core.config().account_number},
            "trackingNumber": tracking_number,
        });
        match self.core.send_authed(CarrierRequest::put(url).with_json(payload)).await {
            Ok(response) => response
                .json()
                .and_then(|body| body.pointer("/output/cancelledShipment").and_then(Value::as_bool))
                .unwrap_or(true),
            Err(error) => {
                tracing::debug!(carrier = "fedex", %error, "cancellation failed");
                false
            }
        }
    }

    async fn validate_address(&self, address: &Address) -> Address {
        let url = match self.core.config().url("/address/v1/addresses/resolve") {
            Ok(url) => url,
            Err(_) => return address.clone(),
        };
        let payload = json!({
            "addressesToValidate": [{"address": self.build_address(address)}],
        });
        let response = match self.core.send_authed(CarrierRequest::post(url).with_json(payload)).await {
            Ok(response) => response,
            Err(error) => {
                tracing::debug!(carrier = "fedex", %error, "address validation failed");
                return address.clone();
            }
        };
        let body = match response.json() {
            Some(body) => body,
            None => return address.clone(),
        };
        let resolved = match body.pointer("/output/resolvedAddresses/0") {
            Some(resolved) => resolved,
            None => return address.clone(),
        };

        let mut corrected = address.clone();
        if let Some(lines) = resolved.get("streetLines").and_then(Value::as_array) {
            if let Some(line1) = lines.first().and_then(Value::as_str) {
                corrected.street1 = line1.to_string();
            }
            corrected.street2 = lines.get(1).and_then(Value::as_str).map(str::to_string);
        }
        if let Some(city) = resolved.get("city").and_then(Value::as_str) {
            corrected.city = city.to_string();
        }
        if let Some(state) = resolved.get("stateOrProvinceCode").and_then(Value::as_str) {
            corrected.state = Some(state.to_string());
        }
        if let Some(postal) = resolved.get("postalCode").and_then(Value::as_str) {
            corrected.postal_code = Some(postal.to_string());
        }
        if let Some(country) = resolved.get("countryCode").and_then(Value::as_str) {
            corrected.country = country.to_string();
        }
        corrected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carriers::testing::{token_response, ScriptedTransport};
    use crate::http::cache::InMemoryTokenCache;
    use crate::http::transport::HttpResponse;
    use crate::normalize::country::StaticCountryTable;
    use crate::types::{Contact, DimensionUnit, PackageDetail};

    fn carrier_with(transport: Arc<ScriptedTransport>) -> FedExCarrier {
        FedExCarrier::new(
            CarrierConfig::new(CarrierId::FedEx, "https://apis-sandbox.fedex.com", "510087", "id", "secret"),
            transport,
            Arc::new(InMemoryTokenCache::new()),
            Arc::new(StaticCountryTable::new()),
        )
    }

    fn party(country: &str, postal: Option<&str>, state: Option<&str>) -> Party {
        Party {
            contact: Contact {
                name: "Shipping Dept".to_string(),
                company: None,
                phone: "9015550100".to_string(),
                email: None,
            },
            address: Address {
                street1: "3875 Airways Blvd".to_string(),
                street2: None,
                city: "Memphis".to_string(),
                state: state.map(str::to_string),
                postal_code: postal.map(str::to_string),
                country: country.to_string(),
            },
        }
    }

    fn request_to(country: &str, postal: Option<&str>, state: Option<&str>) -> ShipmentRequest {
        let mut recipient = party(country, postal, state);
        recipient.address.city = String::new();
        ShipmentRequest {
            sender: party("US", Some("38118"), Some("TN")),
            recipient,
            packages: vec![PackageDetail {
                weight: 5.0,
                weight_unit: WeightUnit::Lb,
                length: None,
                width: None,
                height: None,
                dimension_unit: DimensionUnit::In,
                declared_value: None,
            }],
            commodities: vec![crate::types::CommodityDetail {
                description: "T-shirts".to_string(),
                quantity: 10,
                unit_value: 4.0,
                total_value: 40.0,
                weight: 2.0,
                hs_code: Some("6109.10".to_string()),
                origin_country: "US".to_string(),
            }],
            service_type: None,
            currency: "USD".to_string(),
            reference: None,
            value_added_services: Vec::new(),
            ship_date: None,
        }
    }

    #[test]
    fn test_rate_payload_shape_for_island_destination() {
        let carrier = carrier_with(Arc::new(ScriptedTransport::new(vec![])));
        let request = request_to("VG", None, None);
        let payload = carrier.build_rate_request(&request);

        let recipient = payload.pointer("/requestedShipment/recipient/address").unwrap();
        assert_eq!(recipient["countryCode"], json!("VG"));
        // No postal system, no state: the fields are omitted entirely
        assert!(recipient.get("postalCode").is_none());
        assert!(recipient.get("stateOrProvinceCode").is_none());
        // Missing city filled from the reference table
        assert_eq!(recipient["city"], json!("Road Town"));
        // Customs block present for the international route
        assert!(payload.pointer("/requestedShipment/customsClearanceDetail").is_some());
    }

    #[test]
    fn test_weight_floor_applied() {
        let carrier = carrier_with(Arc::new(ScriptedTransport::new(vec![])));
        let mut request = request_to("US", Some("38118"), Some("TN"));
        request.commodities.clear();
        request.packages[0].weight = 0.2;
        let payload = carrier.build_rate_request(&request);
        let weight = payload
            .pointer("/requestedShipment/requestedPackageLineItems/0/weight/value")
            .and_then(Value::as_f64)
            .unwrap();
        assert_eq!(weight, MIN_WEIGHT_LB);
    }

    #[test]
    fn test_parse_rates() {
        let carrier = carrier_with(Arc::new(ScriptedTransport::new(vec![])));
        let request = request_to("US", Some("38118"), Some("TN"));
        let body = json!({
            "output": {
                "rateReplyDetails": [{
                    "serviceType": "FEDEX_GROUND",
                    "serviceName": "FedEx Ground",
                    "operationalDetail": {"transitTime": "THREE_DAYS"},
                    "ratedShipmentDetails": [{
                        "totalNetCharge": 18.45,
                        "currency": "USD",
                        "shipmentRateDetail": {
                            "totalBaseCharge": 15.00,
                            "surCharges": [{"type": "FUEL", "description": "Fuel surcharge", "amount": 3.45}]
                        }
                    }]
                }]
            }
        });
        let quotes = carrier.parse_rates(&body, &request);
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].service_code, "FEDEX_GROUND");
        assert_eq!(quotes[0].total_charge, 18.45);
        assert_eq!(quotes[0].base_charge, Some(15.0));
        assert_eq!(quotes[0].transit_days, Some(3));
        assert_eq!(quotes[0].surcharges[0].description, "Fuel surcharge");
    }

    #[test]
    fn test_shipment_without_tracking_number_fails() {
        let carrier = carrier_with(Arc::new(ScriptedTransport::new(vec![])));
        let outcome = carrier.parse_shipment(json!({"output": {"transactionShipments": [{}]}}));
        assert!(!outcome.success);
        assert_eq!(outcome.message.as_deref(), Some("No tracking number received"));
        assert!(outcome.raw.is_some());
    }

    #[test]
    fn test_shipment_parse_success() {
        let carrier = carrier_with(Arc::new(ScriptedTransport::new(vec![])));
        let outcome = carrier.parse_shipment(json!({
            "output": {"transactionShipments": [{
                "masterTrackingNumber": "794658912345",
                "pieceResponses": [{
                    "trackingNumber": "794658912345",
                    "packageDocuments": [{"docType": "PDF", "encodedLabel": "JVBERi0xLjQ="}]
                }],
                "completedShipmentDetail": {"shipmentRating": {"shipmentRateDetails": [{
                    "totalNetCharge": 42.10, "currency": "USD"
                }]}}
            }]}
        }));
        assert!(outcome.success);
        assert_eq!(outcome.tracking_number.as_deref(), Some("794658912345"));
        assert!(matches!(outcome.label, Some(Label::Inline { .. })));
        assert_eq!(outcome.total_charge, Some(42.10));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(map_status("DL"), TrackingStatus::Delivered);
        assert_eq!(map_status("OD"), TrackingStatus::OutForDelivery);
        assert_eq!(map_status("IT"), TrackingStatus::InTransit);
        assert_eq!(map_status("DE"), TrackingStatus::Exception);
        assert_eq!(map_status("??"), TrackingStatus::Unknown);
    }

    #[tokio::test]
    async fn test_address_fallback_single_retry() {
        let rates_ok = json!({
            "output": {"rateReplyDetails": [{
                "serviceType": "FEDEX_INTERNATIONAL_PRIORITY",
                "ratedShipmentDetails": [{"totalNetCharge": 120.0, "currency": "USD"}]
            }]}
        });
        let transport = Arc::new(ScriptedTransport::new(vec![
            token_response("tok"),
            HttpResponse {
                status: 400,
                body: json!({"errors": [{"code": "POSTALCODE.INVALID", "message": "Postal code invalid"}]})
                    .to_string(),
            },
            HttpResponse { status: 200, body: rates_ok.to_string() },
        ]));
        let carrier = carrier_with(transport.clone());

        // Destination populated with values the carrier cannot validate
        let request = request_to("VG", Some("VG1110"), Some("TORTOLA"));
        let quotes = carrier.get_rates(&request).await.unwrap();
        assert_eq!(quotes.len(), 1);

        // token + first rate call + stripped retry
        assert_eq!(transport.request_count(), 3);
        let requests = transport.requests.lock().unwrap();
        let second = requests[2].body.as_ref().unwrap();
        let recipient = second.pointer("/requestedShipment/recipient/address").unwrap();
        assert!(recipient.get("postalCode").is_none());
        assert!(recipient.get("stateOrProvinceCode").is_none());
    }

    #[tokio::test]
    async fn test_fallback_failure_surfaces_original_error() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            token_response("tok"),
            HttpResponse {
                status: 400,
                body: json!({"errors": [{"code": "POSTALCODE.INVALID", "message": "Postal code invalid"}]})
                    .to_string(),
            },
            HttpResponse {
                status: 400,
                body: json!({"errors": [{"code": "SERVICE.UNAVAILABLE", "message": "No service"}]})
                    .to_string(),
            },
        ]));
        let carrier = carrier_with(transport.clone());
        let request = request_to("VG", Some("VG1110"), None);

        let error = carrier.get_rates(&request).await.unwrap_err();
        match error {
            Error::Validation(failure) => {
                assert_eq!(failure.code.as_deref(), Some("POSTALCODE.INVALID"));
            }
            other => panic!("expected original validation error, got {:?}", other),
        }
        assert_eq!(transport.request_count(), 3);
    }

    #[tokio::test]
    async fn test_unrelated_error_not_retried() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            token_response("tok"),
            HttpResponse {
                status: 400,
                body: json!({"errors": [{"code": "WEIGHT.EXCEEDED", "message": "Package 1 exceeds weight limit"}]})
                    .to_string(),
            },
        ]));
        let carrier = carrier_with(transport.clone());
        let request = request_to("US", Some("38118"), Some("TN"));
        let mut request = request;
        request.commodities.clear();

        assert!(carrier.get_rates(&request).await.is_err());
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn test_cancel_swallows_errors() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            token_response("tok"),
            HttpResponse { status: 500, body: "boom".to_string() },
        ]));
        let carrier = carrier_with(transport);
        assert!(!carrier.cancel_shipment("794658912345").await);
    }

    #[tokio::test]
    async fn test_validate_address_returns_input_on_failure() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            token_response("tok"),
            HttpResponse { status: 503, body: "unavailable".to_string() },
        ]));
        let carrier = carrier_with(transport);
        let input = party("US", Some("38118"), Some("TN")).address;
        let result = carrier.validate_address(&input).await;
        assert_eq!(result, input);
    }
}
