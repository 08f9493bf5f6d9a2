//! DHL Express carrier client
//!
//! HTTP Basic on every request (no token endpoint), metric units, street
//! lines capped at 45 characters. The heaviest client: international
//! shipments carry a full export declaration with numbered line items,
//! and a commercial invoice PDF can be attached from the collaborator
//! documents.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use crate::carriers::{fallback, parse_datetime, Carrier, CarrierCore};
use crate::config::CarrierConfig;
use crate::error::{CarrierFailure, Error, Result};
use crate::http::auth::AuthScheme;
use crate::http::cache::TokenCache;
use crate::http::transport::{CarrierRequest, Transport};
use crate::normalize::commodity::{self, CustomsLine};
use crate::normalize::{address, country, precision, units};
use crate::types::{
    Address, CarrierId, Label, Party, RateQuote, ShipmentDocuments, ShipmentOutcome,
    ShipmentRequest, TrackingEvent, TrackingInfo, TrackingStatus,
};

const LINE_CAP: usize = address::DHL_LINE_CAP;

/// DHL rates below 0.1 kg are rejected
const MIN_WEIGHT_KG: f64 = 0.1;

/// Value-added service codes DHL files under "HDP" (paperless trade)
const PAPERLESS_SERVICE_CODES: [&str; 2] = ["WY", "HDP"];

/// Error signature for the optional-service fallback. Only this
/// documented trigger is honored; other DHL codes surface as-is.
const HDP_ERROR_MARKERS: [&str; 2] = ["7008", "HDP"];

pub struct DhlCarrier {
    core: CarrierCore,
}

impl DhlCarrier {
    pub fn new(
        config: CarrierConfig,
        transport: Arc<dyn Transport>,
        cache: Arc<dyn TokenCache>,
        countries: Arc<dyn crate::normalize::country::CountryLookup>,
    ) -> Self {
        Self {
            core: CarrierCore::new(config, AuthScheme::Basic, transport, cache, countries),
        }
    }

    fn build_postal_address(&self, address: &Address) -> Value {
        let countries = self.core.countries();
        let code = country::normalize_code(&address.country, CarrierId::Dhl, countries);
        let (line1, line2) =
            address::split_street(&address.street1, address.street2.as_deref().unwrap_or(""), LINE_CAP);

        let mut built = json!({
            "addressLine1": line1,
            "cityName": address::city_or_default(&address.city, &code, countries),
            "countryCode": code,
        });
        if let Some(line2) = line2 {
            built["addressLine2"] = json!(line2);
        }
        if let Some(state) = address.state.as_deref().filter(|s| !s.trim().is_empty()) {
            built["provinceCode"] = json!(state);
        }
        if let Some(postal) =
            country::postal_code_or_placeholder(address.postal_code.as_deref(), &code, countries)
        {
            built["postalCode"] = json!(postal);
        }
        built
    }

    fn build_customer_details(&self, request: &ShipmentRequest) -> Value {
        let contact = |party: &Party| {
            json!({
                "fullName": party.contact.name,
                "companyName": party.contact.company.as_deref().unwrap_or(&party.contact.name),
                "phone": party.contact.phone,
                "email": party.contact.email,
            })
        };
        json!({
            "shipperDetails": {
                "postalAddress": self.build_postal_address(&request.sender.address),
                "contactInformation": contact(&request.sender),
            },
            "receiverDetails": {
                "postalAddress": self.build_postal_address(&request.recipient.address),
                "contactInformation": contact(&request.recipient),
            },
        })
    }

    fn build_packages(&self, request: &ShipmentRequest) -> Vec<Value> {
        request
            .packages
            .iter()
            .map(|package| {
                let kg = units::floor_weight(units::to_kg(package.weight, package.weight_unit), MIN_WEIGHT_KG);
                let mut built = json!({"weight": kg});
                if package.has_dimensions() {
                    built["dimensions"] = json!({
                        "length": units::to_cm(package.length.unwrap_or_default(), package.dimension_unit),
                        "width": units::to_cm(package.width.unwrap_or_default(), package.dimension_unit),
                        "height": units::to_cm(package.height.unwrap_or_default(), package.dimension_unit),
                    });
                }
                if let Some(reference) = &request.reference {
                    built["customerReferences"] = json!([{"value": reference}]);
                }
                built
            })
            .collect()
    }

    fn planned_shipping_date(&self, request: &ShipmentRequest) -> String {
        let date = request.ship_date.unwrap_or_else(Utc::now);
        date.format("%Y-%m-%dT%H:%M:%S GMT+00:00").to_string()
    }

    fn declared_value(&self, request: &ShipmentRequest) -> f64 {
        let lines = commodity::customs_lines(&request.commodities);
        if lines.is_empty() {
            precision::money(
                request.packages.iter().filter_map(|package| package.declared_value).sum(),
            )
        } else {
            commodity::total_value(&lines)
        }
    }

    fn build_rate_request(&self, request: &ShipmentRequest) -> Value {
        let mut built = json!({
            "customerDetails": {
                "shipperDetails": self.build_postal_address(&request.sender.address),
                "receiverDetails": self.build_postal_address(&request.recipient.address),
            },
            "accounts": [{"typeCode": "shipper", "number": self.core.config().account_number}],
            "plannedShippingDateAndTime": self.planned_shipping_date(request),
            "unitOfMeasurement": "metric",
            "isCustomsDeclarable": request.is_customs_declarable(),
            "packages": self.build_packages(request),
        });
        if request.is_customs_declarable() {
            built["monetaryAmount"] = json!([{
                "typeCode": "declaredValue",
                "value": self.declared_value(request),
                "currency": request.currency,
            }]);
        }
        if let Some(product) = &request.service_type {
            built["productCode"] = json!(product);
        }
        built
    }

    fn build_export_declaration(
        &self,
        request: &ShipmentRequest,
        documents: Option<&ShipmentDocuments>,
    ) -> Value {
        let lines = commodity::customs_lines(&request.commodities);
        let line_items: Vec<Value> = lines.iter().map(|line| self.build_line_item(line)).collect();
        let invoice_number = documents
            .and_then(|docs| docs.invoice_number.clone())
            .or_else(|| request.reference.clone())
            .unwrap_or_else(|| "1".to_string());
        json!({
            "lineItems": line_items,
            "invoice": {
                "number": invoice_number,
                "date": request.ship_date.unwrap_or_else(Utc::now).format("%Y-%m-%d").to_string(),
            },
            "exportReasonType": "permanent",
        })
    }

    fn build_line_item(&self, line: &CustomsLine) -> Value {
        let countries = self.core.countries();
        let mut built = json!({
            "number": line.number,
            "description": line.description,
            "price": line.unit_value,
            "quantity": {"value": line.quantity, "unitOfMeasurement": "PCS"},
            "exportReasonType": "permanent",
            "manufacturerCountry": country::normalize_code(&line.origin_country, CarrierId::Dhl, countries),
            "weight": {"netValue": line.weight, "grossValue": line.weight},
        });
        if let Some(hs_code) = &line.hs_code {
            built["commodityCodes"] = json!([{"typeCode": "outbound", "value": hs_code}]);
        }
        built
    }

    fn build_ship_request(
        &self,
        request: &ShipmentRequest,
        documents: Option<&ShipmentDocuments>,
    ) -> Value {
        let declarable = request.is_customs_declarable();
        let mut content = json!({
            "packages": self.build_packages(request),
            "isCustomsDeclarable": declarable,
            "description": request
                .commodities
                .first()
                .map(|commodity| commodity.description.clone())
                .unwrap_or_else(|| "General merchandise".to_string()),
            "unitOfMeasurement": "metric",
            "incoterm": "DAP",
        });
        if declarable {
            content["declaredValue"] = json!(self.declared_value(request));
            content["declaredValueCurrency"] = json!(request.currency);
            content["exportDeclaration"] = self.build_export_declaration(request, documents);
        }

        let mut built = json!({
            "plannedShippingDateAndTime": self.planned_shipping_date(request),
            "pickup": {"isRequested": false},
            "productCode": request.service_type.as_deref().unwrap_or("P"),
            "accounts": [{"typeCode": "shipper", "number": self.core.config().account_number}],
            "customerDetails": self.build_customer_details(request),
            "content": content,
            "outputImageProperties": {
                "encodingFormat": "pdf",
                "imageOptions": [{"typeCode": "label"}],
            },
        });
        if !request.value_added_services.is_empty() {
            let services: Vec<Value> = request
                .value_added_services
                .iter()
                .map(|code| json!({"serviceCode": code}))
                .collect();
            built["valueAddedServices"] = Value::Array(services);
        }
        if let Some(invoice) = documents.and_then(|docs| docs.invoice_pdf.as_deref()) {
            built["documentImages"] = json!([{
                "typeCode": "INV",
                "imageFormat": "PDF",
                "content": invoice,
            }]);
        }
        built
    }

    async fn rates_once(&self, request: &ShipmentRequest) -> Result<Vec<RateQuote>> {
        let mut payload = self.build_rate_request(request);
        precision::normalize_payload(&mut payload);
        let url = self.core.config().url("/rates")?;
        let response = self.core.send_authed(CarrierRequest::post(url).with_json(payload)).await?;
        let body = response.json().unwrap_or(Value::Null);
        Ok(self.parse_rates(&body, request))
    }

    fn parse_rates(&self, body: &Value, request: &ShipmentRequest) -> Vec<RateQuote> {
        let products = match body.get("products").and_then(Value::as_array) {
            Some(products) => products,
            None => return Vec::new(),
        };
        products
            .iter()
            .filter_map(|product| {
                let product_code = product.get("productCode").and_then(Value::as_str)?;
                let prices = product.get("totalPrice").and_then(Value::as_array)?;
                let billing = prices
                    .iter()
                    .find(|price| price.get("currencyType").and_then(Value::as_str) == Some("BILLC"))
                    .or_else(|| prices.first())?;
                let total_charge = billing.get("price").and_then(Value::as_f64)?;
                let transit_days = product
                    .pointer("/deliveryCapabilities/totalTransitDays")
                    .and_then(|days| match days {
                        Value::Number(number) => number.as_u64().map(|n| n as u32),
                        Value::String(text) => text.trim().parse().ok(),
                        _ => None,
                    });
                Some(RateQuote {
                    carrier: CarrierId::Dhl,
                    service_code: product_code.to_string(),
                    service_name: product
                        .get("productName")
                        .and_then(Value::as_str)
                        .unwrap_or(product_code)
                        .to_string(),
                    total_charge,
                    currency: billing
                        .get("priceCurrency")
                        .and_then(Value::as_str)
                        .unwrap_or(&request.currency)
                        .to_string(),
                    base_charge: None,
                    surcharges: Vec::new(),
                    transit_days,
                    estimated_delivery: product
                        .pointer("/deliveryCapabilities/estimatedDeliveryDateAndTime")
                        .and_then(Value::as_str)
                        .and_then(parse_datetime),
                    raw: product.clone(),
                })
            })
            .collect()
    }

    async fn ship_once(
        &self,
        request: &ShipmentRequest,
        documents: Option<&ShipmentDocuments>,
    ) -> Result<ShipmentOutcome> {
        let mut payload = self.build_ship_request(request, documents);
        precision::normalize_payload(&mut payload);
        let url = self.core.config().url("/shipments")?;
        let response = self.core.send_authed(CarrierRequest::post(url).with_json(payload)).await?;
        let body = response.json().unwrap_or(Value::Null);
        Ok(self.parse_shipment(body))
    }

    fn parse_shipment(&self, body: Value) -> ShipmentOutcome {
        let tracking_number = body
            .get("shipmentTrackingNumber")
            .and_then(Value::as_str)
            .or_else(|| body.pointer("/packages/0/trackingNumber").and_then(Value::as_str))
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

        let label = body.get("documents").and_then(Value::as_array).and_then(|documents| {
            documents
                .iter()
                .find(|document| {
                    document.get("typeCode").and_then(Value::as_str).unwrap_or("label") == "label"
                })
                .and_then(|document| {
                    document.get("content").and_then(Value::as_str).map(|content| Label::Inline {
                        format: document
                            .get("imageFormat")
                            .and_then(Value::as_str)
                            .unwrap_or("PDF")
                            .to_string(),
                        content: content.to_string(),
                    })
                })
        });

        let charge = body.pointer("/shipmentCharges/0");
        ShipmentOutcome {
            success: true,
            tracking_number: Some(tracking_number),
            label,
            total_charge: charge.and_then(|entry| entry.get("price").and_then(Value::as_f64)),
            currency: charge
                .and_then(|entry| entry.get("currency").and_then(Value::as_str))
                .map(str::to_string),
            message: None,
            errors: Vec::new(),
            raw: Some(body),
        }
    }

    fn parse_tracking(&self, tracking_number: &str, body: &Value) -> Result<TrackingInfo> {
        let shipment = body.pointer("/shipments/0").ok_or_else(|| {
            Error::Carrier(CarrierFailure {
                carrier: self.name().to_string(),
                code: None,
                message: format!("No tracking information returned for {}", tracking_number),
                errors: Vec::new(),
                http_status: None,
                raw_body: Some(body.to_string()),
            })
        })?;

        let events: Vec<TrackingEvent> = shipment
            .get("events")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .map(|event| {
                        let timestamp = match (
                            event.get("date").and_then(Value::as_str),
                            event.get("time").and_then(Value::as_str),
                        ) {
                            (Some(date), Some(time)) => {
                                parse_datetime(&format!("{}T{}", date, time))
                            }
                            (Some(date), None) => parse_datetime(date),
                            _ => None,
                        };
                        TrackingEvent {
                            timestamp,
                            status: event
                                .get("typeCode")
                                .and_then(Value::as_str)
                                .unwrap_or("")
                                .to_string(),
                            description: event
                                .get("description")
                                .and_then(Value::as_str)
                                .unwrap_or("")
                                .to_string(),
                            location: event
                                .pointer("/serviceArea/0/description")
                                .and_then(Value::as_str)
                                .map(str::to_string),
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        let latest_code = events.first().map(|event| event.status.as_str()).unwrap_or("");
        let status_text = shipment
            .get("status")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| events.first().map(|event| event.description.clone()))
            .unwrap_or_default();

        let actual_delivery = if map_status(latest_code) == TrackingStatus::Delivered {
            events.first().and_then(|event| event.timestamp)
        } else {
            None
        };

        Ok(TrackingInfo {
            tracking_number: tracking_number.to_string(),
            status: map_status(latest_code),
            status_text,
            events,
            estimated_delivery: shipment
                .get("estimatedDeliveryDate")
                .and_then(Value::as_str)
                .and_then(parse_datetime),
            actual_delivery,
            signed_by: shipment
                .pointer("/details/proofOfDelivery/signedBy")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }

    fn has_paperless_service(request: &ShipmentRequest) -> bool {
        request.value_added_services.iter().any(|code| {
            PAPERLESS_SERVICE_CODES.iter().any(|known| code.eq_ignore_ascii_case(known))
        })
    }

    fn without_paperless_service(request: &ShipmentRequest) -> ShipmentRequest {
        let mut reduced = request.clone();
        reduced.value_added_services.retain(|code| {
            !PAPERLESS_SERVICE_CODES.iter().any(|known| code.eq_ignore_ascii_case(known))
        });
        tracing::info!("retrying DHL shipment without the paperless trade service");
        reduced
    }

    /// The documented optional-service failure: the message carries both
    /// the 7008 code and the HDP product marker.
    fn is_hdp_failure(error: &Error) -> bool {
        match error.carrier_text() {
            Some(text) => {
                let upper = text.to_uppercase();
                HDP_ERROR_MARKERS.iter().all(|marker| upper.contains(marker))
            }
            None => false,
        }
    }
}

/// DHL event type codes to the normalized enum
fn map_status(code: &str) -> TrackingStatus {
    match code {
        "PU" => TrackingStatus::Created,
        "PL" | "DF" | "AF" | "AR" | "CC" | "CR" => TrackingStatus::InTransit,
        "WC" => TrackingStatus::OutForDelivery,
        "OK" | "DD" => TrackingStatus::Delivered,
        "OH" | "CA" | "NH" | "RD" => TrackingStatus::Exception,
        "RT" => TrackingStatus::Returned,
        _ => TrackingStatus::Unknown,
    }
}

#[async_trait]
impl Carrier for DhlCarrier {
    fn name(&self) -> &'static str {
        "dhl"
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
            Err(original) => {
                if Self::is_hdp_failure(&original) && Self::has_paperless_service(request) {
                    let reduced = Self::without_paperless_service(request);
                    match self.ship_once(&reduced, documents).await {
                        Ok(outcome) => outcome,
                        Err(_) => ShipmentOutcome::from_error(&original),
                    }
                } else if fallback::is_address_failure(&original) {
                    let stripped = fallback::strip_address_fields(request);
                    match self.ship_once(&stripped, documents).await {
                        Ok(outcome) => outcome,
                        Err(_) => ShipmentOutcome::from_error(&original),
                    }
                } else {
                    ShipmentOutcome::from_error(&original)
                }
            }
        }
    }

    async fn track(&self, tracking_number: &str) -> Result<TrackingInfo> {
        let url = self
            .core
            .config()
            .url(&format!("/shipments/{}/tracking", tracking_number))?;
        let response = self.core.send_authed(CarrierRequest::get(url)).await?;
        let body = response.json().unwrap_or(Value::Null);
        self.parse_tracking(tracking_number, &body)
    }

    async fn cancel_shipment(&self, tracking_number: &str) -> bool {
        let url = match self.core.config().url(&format!("/shipments/{}", tracking_number)) {
            Ok(url) => url,
            Err(_) => return false,
        };
        match self.core.send_authed(CarrierRequest::delete(url)).await {
            Ok(response) => response.is_success(),
            Err(error) => {
                tracing::debug!(carrier = "dhl", %error, "cancellation failed");
                false
            }
        }
    }

    async fn validate_address(&self, address: &Address) -> Address {
        let countries = self.core.countries();
        let code = country::normalize_code(&address.country, CarrierId::Dhl, countries);
        let base = match self.core.config().url("/address-validate") {
            Ok(base) => base,
            Err(_) => return address.clone(),
        };
        let mut url = match url::Url::parse(&base) {
            Ok(url) => url,
            Err(_) => return address.clone(),
        };
        url.query_pairs_mut()
            .append_pair("type", "delivery")
            .append_pair("countryCode", &code)
            .append_pair("cityName", &address.city);
        if let Some(postal) = address.postal_code.as_deref() {
            url.query_pairs_mut().append_pair("postalCode", postal);
        }

        let response = match self.core.send_authed(CarrierRequest::get(url.to_string())).await {
            Ok(response) => response,
            Err(error) => {
                tracing::debug!(carrier = "dhl", %error, "address validation failed");
                return address.clone();
            }
        };
        let body = match response.json() {
            Some(body) => body,
            None => return address.clone(),
        };
        let candidate = match body.pointer("/address/0") {
            Some(candidate) => candidate,
            None => return address.clone(),
        };

        let mut corrected = address.clone();
        if let Some(city) = candidate.get("cityName").and_then(Value::as_str) {
            corrected.city = city.to_string();
        }
        if let Some(postal) = candidate.get("postalCode").and_then(Value::as_str) {
            corrected.postal_code = Some(postal.to_string());
        }
        corrected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carriers::testing::ScriptedTransport;
    use crate::http::cache::InMemoryTokenCache;
    use crate::http::transport::HttpResponse;
    use crate::normalize::country::StaticCountryTable;
    use crate::types::{CommodityDetail, Contact, DimensionUnit, PackageDetail, WeightUnit};

    fn carrier_with(transport: Arc<ScriptedTransport>) -> DhlCarrier {
        DhlCarrier::new(
            CarrierConfig::new(
                CarrierId::Dhl,
                "https://express.api.dhl.com/mydhlapi/test",
                "123456789",
                "api-key",
                "api-secret",
            ),
            transport,
            Arc::new(InMemoryTokenCache::new()),
            Arc::new(StaticCountryTable::new()),
        )
    }

    fn international_request() -> ShipmentRequest {
        let party = |country: &str, city: &str| Party {
            contact: Contact {
                name: "Ops".to_string(),
                company: Some("Acme".to_string()),
                phone: "15550100".to_string(),
                email: Some("ops@acme.test".to_string()),
            },
            address: Address {
                street1: "Carretera Federal Cancun-Playa del Carmen Km 298".to_string(),
                street2: None,
                city: city.to_string(),
                state: None,
                postal_code: None,
                country: country.to_string(),
            },
        };
        ShipmentRequest {
            sender: party("DE", "Bonn"),
            recipient: party("bq-bo", ""),
            packages: vec![PackageDetail {
                weight: 5.0,
                weight_unit: WeightUnit::Lb,
                length: Some(10.0),
                width: Some(8.0),
                height: Some(4.0),
                dimension_unit: DimensionUnit::In,
                declared_value: None,
            }],
            commodities: vec![CommodityDetail {
                description: "Ceramic mugs".to_string(),
                quantity: 12,
                unit_value: 3.5,
                total_value: 42.0,
                weight: 2.0 * 2.204_622_621_85,
                hs_code: Some("6912.00".to_string()),
                origin_country: "DE".to_string(),
            }],
            service_type: Some("P".to_string()),
            currency: "EUR".to_string(),
            reference: Some("ORDER-7781".to_string()),
            value_added_services: vec!["WY".to_string()],
            ship_date: None,
        }
    }

    #[test]
    fn test_address_uses_dhl_territory_code_and_cap() {
        let carrier = carrier_with(Arc::new(ScriptedTransport::new(vec![])));
        let request = international_request();
        let built = carrier.build_postal_address(&request.recipient.address);

        // Bonaire files under the DHL gateway code, default city filled in
        assert_eq!(built["countryCode"], json!("XB"));
        assert_eq!(built["cityName"], json!("Kralendijk"));
        // 48-char street reflows into two lines under the 45 cap
        assert!(built["addressLine1"].as_str().unwrap().chars().count() <= 45);
        assert!(built["addressLine2"].as_str().unwrap().chars().count() <= 45);
    }

    #[test]
    fn test_ship_payload_carries_export_declaration() {
        let carrier = carrier_with(Arc::new(ScriptedTransport::new(vec![])));
        let request = international_request();
        let documents = ShipmentDocuments {
            invoice_pdf: Some("JVBERi0xLjQ=".to_string()),
            invoice_number: Some("INV-2026-031".to_string()),
        };
        let mut payload = carrier.build_ship_request(&request, Some(&documents));
        precision::normalize_payload(&mut payload);

        let line = payload.pointer("/content/exportDeclaration/lineItems/0").unwrap();
        assert_eq!(line["number"], json!(1));
        assert_eq!(line["exportReasonType"], json!("permanent"));
        assert_eq!(line.pointer("/commodityCodes/0/value"), Some(&json!("691200")));
        // Conversion noise repaired to 3 decimals
        assert_eq!(line.pointer("/weight/netValue"), Some(&json!(4.409)));

        assert_eq!(payload.pointer("/content/exportDeclaration/invoice/number"), Some(&json!("INV-2026-031")));
        assert_eq!(payload.pointer("/documentImages/0/typeCode"), Some(&json!("INV")));
        assert_eq!(payload.pointer("/valueAddedServices/0/serviceCode"), Some(&json!("WY")));
        // Metric weight with noise repaired
        assert_eq!(payload.pointer("/content/packages/0/weight"), Some(&json!(2.268)));
    }

    #[test]
    fn test_parse_rates_billing_currency_preferred() {
        let carrier = carrier_with(Arc::new(ScriptedTransport::new(vec![])));
        let request = international_request();
        let body = json!({
            "products": [{
                "productName": "EXPRESS WORLDWIDE",
                "productCode": "P",
                "totalPrice": [
                    {"currencyType": "BASEC", "priceCurrency": "USD", "price": 130.0},
                    {"currencyType": "BILLC", "priceCurrency": "EUR", "price": 118.52}
                ],
                "deliveryCapabilities": {
                    "totalTransitDays": "2",
                    "estimatedDeliveryDateAndTime": "2026-08-12T23:59:00"
                }
            }]
        });
        let quotes = carrier.parse_rates(&body, &request);
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].total_charge, 118.52);
        assert_eq!(quotes[0].currency, "EUR");
        assert_eq!(quotes[0].transit_days, Some(2));
    }

    #[test]
    fn test_shipment_without_tracking_number_fails() {
        let carrier = carrier_with(Arc::new(ScriptedTransport::new(vec![])));
        let outcome = carrier.parse_shipment(json!({"documents": []}));
        assert!(!outcome.success);
        assert_eq!(outcome.message.as_deref(), Some("No tracking number received"));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(map_status("OK"), TrackingStatus::Delivered);
        assert_eq!(map_status("WC"), TrackingStatus::OutForDelivery);
        assert_eq!(map_status("PU"), TrackingStatus::Created);
        assert_eq!(map_status("OH"), TrackingStatus::Exception);
        assert_eq!(map_status("zz"), TrackingStatus::Unknown);
    }

    #[tokio::test]
    async fn test_hdp_fallback_removes_only_that_service() {
        let created = json!({
            "shipmentTrackingNumber": "1234567890",
            "documents": [{"typeCode": "label", "imageFormat": "PDF", "content": "JVBERi0="}]
        });
        let transport = Arc::new(ScriptedTransport::new(vec![
            HttpResponse {
                status: 400,
                body: json!({
                    "title": "Bad request",
                    "detail": "7008: Product HDP not offered on requested route"
                })
                .to_string(),
            },
            HttpResponse { status: 200, body: created.to_string() },
        ]));
        let carrier = carrier_with(transport.clone());
        let mut request = international_request();
        request.value_added_services = vec!["WY".to_string(), "II".to_string()];

        let outcome = carrier.create_shipment(&request, None).await;
        assert!(outcome.success);
        assert_eq!(transport.request_count(), 2);

        let requests = transport.requests.lock().unwrap();
        let retry_services = requests[1]
            .body
            .as_ref()
            .unwrap()
            .get("valueAddedServices")
            .and_then(Value::as_array)
            .unwrap()
            .clone();
        // Insurance stays, paperless trade is gone
        assert_eq!(retry_services.len(), 1);
        assert_eq!(retry_services[0]["serviceCode"], json!("II"));
    }

    #[tokio::test]
    async fn test_hdp_fallback_needs_service_in_request() {
        let transport = Arc::new(ScriptedTransport::new(vec![HttpResponse {
            status: 400,
            body: json!({
                "title": "Bad request",
                "detail": "7008: Product HDP not offered on requested route"
            })
            .to_string(),
        }]));
        let carrier = carrier_with(transport.clone());
        let mut request = international_request();
        request.value_added_services.clear();

        let outcome = carrier.create_shipment(&request, None).await;
        assert!(!outcome.success);
        // No retry without the service present in the request
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_hdp_fallback_failure_surfaces_original() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            HttpResponse {
                status: 400,
                body: json!({"title": "Bad request", "detail": "7008: Product HDP not offered"}).to_string(),
            },
            HttpResponse {
                status: 400,
                body: json!({"title": "Bad request", "detail": "Some other rejection"}).to_string(),
            },
        ]));
        let carrier = carrier_with(transport.clone());
        let request = international_request();

        let outcome = carrier.create_shipment(&request, None).await;
        assert!(!outcome.success);
        assert_eq!(outcome.message.as_deref(), Some("7008: Product HDP not offered"));
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn test_basic_auth_applied_to_every_call() {
        let transport = Arc::new(ScriptedTransport::new(vec![HttpResponse {
            status: 200,
            body: json!({"products": []}).to_string(),
        }]));
        let carrier = carrier_with(transport.clone());
        let request = international_request();

        let quotes = carrier.get_rates(&request).await.unwrap();
        assert!(quotes.is_empty());
        // Single call, carrying the static basic credential, no token exchange
        assert_eq!(transport.request_count(), 1);
        let requests = transport.requests.lock().unwrap();
        assert_eq!(
            requests[0].basic_auth,
            Some(("api-key".to_string(), "api-secret".to_string()))
        );
    }

    #[tokio::test]
    async fn test_cancel_true_on_success_false_on_failure() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            HttpResponse { status: 200, body: "{}".to_string() },
            HttpResponse { status: 404, body: "{}".to_string() },
        ]));
        let carrier = carrier_with(transport);
        assert!(carrier.cancel_shipment("1234567890").await);
        assert!(!carrier.cancel_shipment("1234567890").await);
    }
}
