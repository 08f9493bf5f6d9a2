//! End-to-end carrier flows over a scripted transport
//!
//! These tests drive the public API the way the shipping application
//! does: build a request, resolve a carrier, and exercise the full
//! auth -> call -> fallback pipeline against canned carrier responses.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use shipgate_core::carriers::{Carrier, DhlCarrier, FedExCarrier, UpsCarrier};
use shipgate_core::config::CarrierConfig;
use shipgate_core::factory::{CarrierFactory, CarrierSelector};
use shipgate_core::http::{
    CarrierRequest, HttpError, HttpResponse, InMemoryTokenCache, TokenCache, Transport,
};
use shipgate_core::normalize::StaticCountryTable;
use shipgate_core::types::{
    Address, CarrierId, CommodityDetail, Contact, DimensionUnit, Label, PackageDetail, Party,
    ShipmentDocuments, ShipmentRequest, WeightUnit,
};
use shipgate_core::Error;

/// Scripted transport: pops canned responses, records every request
struct MockTransport {
    responses: Mutex<Vec<HttpResponse>>,
    requests: Mutex<Vec<CarrierRequest>>,
}

impl MockTransport {
    fn new(responses: Vec<HttpResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn request(&self, index: usize) -> CarrierRequest {
        self.requests.lock().unwrap()[index].clone()
    }

    fn token_calls(&self) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|request| request.url.contains("oauth"))
            .count()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &CarrierRequest) -> Result<HttpResponse, HttpError> {
        self.requests.lock().unwrap().push(request.clone());
        let mut responses = self.responses.lock().unwrap();
        assert!(!responses.is_empty(), "mock transport exhausted");
        Ok(responses.remove(0))
    }
}

fn ok(body: Value) -> HttpResponse {
    HttpResponse { status: 200, body: body.to_string() }
}

fn status(code: u16, body: Value) -> HttpResponse {
    HttpResponse { status: code, body: body.to_string() }
}

fn token(token: &str) -> HttpResponse {
    ok(json!({"access_token": token, "expires_in": 3600}))
}

fn party(country: &str, city: &str, state: Option<&str>, postal: Option<&str>) -> Party {
    Party {
        contact: Contact {
            name: "Warehouse".to_string(),
            company: Some("Acme Outfitters".to_string()),
            phone: "9015550100".to_string(),
            email: None,
        },
        address: Address {
            street1: "3875 Airways Blvd".to_string(),
            street2: None,
            city: city.to_string(),
            state: state.map(str::to_string),
            postal_code: postal.map(str::to_string),
            country: country.to_string(),
        },
    }
}

/// 5 lb package from US/38118 to the British Virgin Islands, no
/// destination postal or state
fn island_request() -> ShipmentRequest {
    ShipmentRequest {
        sender: party("US", "Memphis", Some("TN"), Some("38118")),
        recipient: party("VG", "", None, None),
        packages: vec![PackageDetail {
            weight: 5.0,
            weight_unit: WeightUnit::Lb,
            length: None,
            width: None,
            height: None,
            dimension_unit: DimensionUnit::In,
            declared_value: None,
        }],
        commodities: vec![CommodityDetail {
            description: "Cotton shirts".to_string(),
            quantity: 10,
            unit_value: 8.0,
            total_value: 80.0,
            weight: 4.0,
            hs_code: Some("6109.10".to_string()),
            origin_country: "US".to_string(),
        }],
        service_type: None,
        currency: "USD".to_string(),
        reference: Some("SO-1009".to_string()),
        value_added_services: Vec::new(),
        ship_date: None,
    }
}

fn fedex_with(transport: Arc<MockTransport>) -> FedExCarrier {
    FedExCarrier::new(
        CarrierConfig::new(CarrierId::FedEx, "https://apis-sandbox.fedex.com", "510087", "id", "secret"),
        transport,
        Arc::new(InMemoryTokenCache::new()),
        Arc::new(StaticCountryTable::new()),
    )
}

fn ups_with(transport: Arc<MockTransport>, cache: Arc<InMemoryTokenCache>) -> UpsCarrier {
    UpsCarrier::new(
        CarrierConfig::new(CarrierId::Ups, "https://wwwcie.ups.com", "A1B2C3", "client", "secret"),
        transport,
        cache,
        Arc::new(StaticCountryTable::new()),
    )
}

fn dhl_with(transport: Arc<MockTransport>) -> DhlCarrier {
    DhlCarrier::new(
        CarrierConfig::new(
            CarrierId::Dhl,
            "https://express.api.dhl.com/mydhlapi/test",
            "987654321",
            "api-key",
            "api-secret",
        ),
        transport,
        Arc::new(InMemoryTokenCache::new()),
        Arc::new(StaticCountryTable::new()),
    )
}

#[tokio::test]
async fn island_destination_rates_without_postal_or_state() {
    // Carrier has no services on the route: zero rates, not an error
    let transport = MockTransport::new(vec![
        token("tok"),
        ok(json!({"output": {"rateReplyDetails": []}})),
    ]);
    let carrier = fedex_with(transport.clone());

    let quotes = carrier.get_rates(&island_request()).await.expect("no error for VG");
    assert!(quotes.is_empty());

    // The outbound payload omitted both fields instead of sending blanks
    let rate_request = transport.request(1);
    let recipient = rate_request
        .body
        .as_ref()
        .unwrap()
        .pointer("/requestedShipment/recipient/address")
        .unwrap()
        .clone();
    assert!(recipient.get("postalCode").is_none());
    assert!(recipient.get("stateOrProvinceCode").is_none());
    assert_eq!(recipient["city"], json!("Road Town"));
}

#[tokio::test]
async fn expired_credential_refreshes_once_and_returns_second_body() {
    let rates = json!({
        "RateResponse": {"RatedShipment": [{
            "Service": {"Code": "65"},
            "TotalCharges": {"CurrencyCode": "USD", "MonetaryValue": "95.10"}
        }]}
    });
    let cache = Arc::new(InMemoryTokenCache::new());
    // Stale token planted in the shared cache: first call 401s, the
    // client evicts, re-authenticates, and replays exactly once
    cache.put("ups", "stale-token".to_string(), 3600);

    let transport = MockTransport::new(vec![
        status(401, json!({"response": {"errors": [{"code": "250002", "message": "Invalid token"}]}})),
        token("fresh-token"),
        ok(rates),
    ]);
    let carrier = ups_with(transport.clone(), cache.clone());

    let mut request = island_request();
    request.recipient = party("US", "Marietta", Some("GA"), Some("30060"));
    request.commodities.clear();

    let quotes = carrier.get_rates(&request).await.expect("second attempt succeeds");
    assert_eq!(quotes.len(), 1);
    assert_eq!(quotes[0].total_charge, 95.10);

    // 1 rate call with the stale token, 1 token exchange, 1 replay
    assert_eq!(transport.count(), 3);
    assert_eq!(transport.token_calls(), 1);
    assert_eq!(cache.get("ups").unwrap().token, "fresh-token");
}

#[tokio::test]
async fn address_pattern_failure_strips_and_returns_retry_rates() {
    let good_rates = json!({
        "output": {"rateReplyDetails": [{
            "serviceType": "FEDEX_INTERNATIONAL_PRIORITY",
            "serviceName": "FedEx International Priority",
            "ratedShipmentDetails": [{"totalNetCharge": 142.35, "currency": "USD"}]
        }]}
    });
    let transport = MockTransport::new(vec![
        token("tok"),
        status(400, json!({"errors": [{"code": "POSTALCODE.INVALID", "message": "Postal code not served"}]})),
        ok(good_rates),
    ]);
    let carrier = fedex_with(transport.clone());

    let mut request = island_request();
    request.recipient = party("VG", "Road Town", Some("TORTOLA"), Some("VG1110"));

    let quotes = carrier.get_rates(&request).await.expect("stripped retry succeeds");
    assert_eq!(quotes.len(), 1);
    assert_eq!(quotes[0].service_code, "FEDEX_INTERNATIONAL_PRIORITY");

    // Exactly one extra call, with the destination fields cleared
    assert_eq!(transport.count(), 3);
    let retry = transport.request(2);
    let recipient = retry
        .body
        .as_ref()
        .unwrap()
        .pointer("/requestedShipment/recipient/address")
        .unwrap()
        .clone();
    assert!(recipient.get("postalCode").is_none());
    assert!(recipient.get("stateOrProvinceCode").is_none());
}

#[tokio::test]
async fn shipment_creation_never_raises() {
    // Success status but no tracking number anywhere in the body
    let transport = MockTransport::new(vec![
        token("tok"),
        ok(json!({"output": {"transactionShipments": [{"pieceResponses": []}]}})),
    ]);
    let carrier = fedex_with(transport);

    let outcome = carrier.create_shipment(&island_request(), None).await;
    assert!(!outcome.success);
    assert_eq!(outcome.message.as_deref(), Some("No tracking number received"));
    assert!(outcome.raw.is_some());

    // Hard carrier failure also comes back as a value
    let transport = MockTransport::new(vec![
        token("tok"),
        status(400, json!({"errors": [{"code": "ACCOUNTNUMBER.INVALID", "message": "Bad account"}]})),
    ]);
    let carrier = fedex_with(transport);
    let outcome = carrier.create_shipment(&island_request(), None).await;
    assert!(!outcome.success);
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].code.as_deref(), Some("ACCOUNTNUMBER.INVALID"));
}

#[tokio::test]
async fn dhl_international_shipment_with_invoice_document() {
    let created = json!({
        "shipmentTrackingNumber": "4781234567",
        "documents": [{"typeCode": "label", "imageFormat": "PDF", "content": "JVBERi0xLjQ="}],
        "shipmentCharges": [{"currency": "USD", "price": 88.70}]
    });
    let transport = MockTransport::new(vec![ok(created)]);
    let carrier = dhl_with(transport.clone());

    let documents = ShipmentDocuments {
        invoice_pdf: Some("JVBERi0xLjQtaW52".to_string()),
        invoice_number: Some("INV-88".to_string()),
    };
    let outcome = carrier.create_shipment(&island_request(), Some(&documents)).await;

    assert!(outcome.success);
    assert_eq!(outcome.tracking_number.as_deref(), Some("4781234567"));
    assert!(matches!(outcome.label, Some(Label::Inline { .. })));
    assert_eq!(outcome.total_charge, Some(88.70));

    // Basic auth on the single call, invoice attached, customs block built
    let request = transport.request(0);
    assert_eq!(request.basic_auth, Some(("api-key".to_string(), "api-secret".to_string())));
    let body = request.body.as_ref().unwrap();
    assert_eq!(body.pointer("/documentImages/0/content"), Some(&json!("JVBERi0xLjQtaW52")));
    assert_eq!(
        body.pointer("/content/exportDeclaration/invoice/number"),
        Some(&json!("INV-88"))
    );
    assert_eq!(
        body.pointer("/content/exportDeclaration/lineItems/0/number"),
        Some(&json!(1))
    );
}

#[tokio::test]
async fn factory_resolves_service_code_to_working_client() {
    let transport = MockTransport::new(vec![
        token("tok"),
        ok(json!({"output": {"rateReplyDetails": []}})),
    ]);
    let factory = CarrierFactory::new()
        .register(Arc::new(fedex_with(transport.clone())))
        .with_fallback("fedex");

    let carrier = factory
        .resolve(&CarrierSelector::ServiceCode("FEDEX_INTERNATIONAL_PRIORITY".to_string()))
        .expect("resolves by vocabulary");
    assert_eq!(carrier.name(), "fedex");

    let quotes = carrier.get_rates(&island_request()).await.unwrap();
    assert!(quotes.is_empty());

    // Manual freight codes stay outside the subsystem
    let manual = factory.resolve(&CarrierSelector::ServiceCode("SEA_FREIGHT".to_string()));
    assert!(matches!(manual, Err(Error::UnsupportedCarrier { .. })));
}

#[tokio::test]
async fn validation_and_cancel_swallow_failures() {
    let transport = MockTransport::new(vec![
        token("tok"),
        status(500, json!({"message": "internal error"})),
        status(500, json!({"message": "internal error"})),
    ]);
    let carrier = fedex_with(transport);

    let input = party("US", "Memphis", Some("TN"), Some("38118")).address;
    let validated = carrier.validate_address(&input).await;
    assert_eq!(validated, input);

    assert!(!carrier.cancel_shipment("794658912345").await);
}
