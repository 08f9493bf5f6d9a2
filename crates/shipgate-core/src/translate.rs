//! Carrier error translation
//!
//! Raw carrier codes and messages are never shown to end users. This
//! module maps them to operator-friendly text and a coarse category via
//! ordered pattern tables: matching is case-insensitive substring
//! containment, first match wins, so ordering encodes precedence and the
//! more specific carrier-prefixed codes must precede the generic ones.
//! Both tables are plain data so they can be extended without touching
//! control flow.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Coarse error category, used only for UI grouping, never for retry
/// decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Address,
    Service,
    Customs,
    Package,
    Account,
    Network,
    General,
}

/// Ordered pattern tables driving translation and categorization
pub struct ErrorTranslator {
    translations: Vec<(String, String)>,
    categories: Vec<(String, ErrorCategory)>,
    fallback: String,
}

/// Generic apology shown when no pattern matches and no embedded error
/// object can be extracted
const GENERIC_FALLBACK: &str =
    "The carrier could not process this request. Please review the shipment details and try again.";

impl Default for ErrorTranslator {
    fn default() -> Self {
        Self::new(default_translations(), default_categories(), GENERIC_FALLBACK.to_string())
    }
}

impl ErrorTranslator {
    /// Build a translator from explicit tables. Order is preserved and
    /// meaningful.
    pub fn new(
        translations: Vec<(String, String)>,
        categories: Vec<(String, ErrorCategory)>,
        fallback: String,
    ) -> Self {
        Self { translations, categories, fallback }
    }

    /// Translate a raw carrier message into an operator-friendly one.
    ///
    /// First match against the ordered table wins. When nothing matches,
    /// the raw text is scanned for an embedded JSON error object and the
    /// match is retried against its extracted code; the generic fallback
    /// covers everything else.
    pub fn translate(&self, raw: &str) -> String {
        if let Some(friendly) = self.lookup(raw) {
            return friendly;
        }
        if let Some(extracted) = extract_embedded_error(raw) {
            if let Some(friendly) = self.lookup(&extracted) {
                return friendly;
            }
        }
        self.fallback.clone()
    }

    /// Coarse category for UI grouping; independent keyword table, first
    /// match wins, defaults to `General`.
    pub fn categorize(&self, raw: &str) -> ErrorCategory {
        let haystack = raw.to_lowercase();
        self.categories
            .iter()
            .find(|(keyword, _)| haystack.contains(&keyword.to_lowercase()))
            .map(|(_, category)| *category)
            .unwrap_or(ErrorCategory::General)
    }

    fn lookup(&self, raw: &str) -> Option<String> {
        let haystack = raw.to_lowercase();
        self.translations
            .iter()
            .find(|(pattern, _)| haystack.contains(&pattern.to_lowercase()))
            .map(|(_, friendly)| friendly.clone())
    }
}

/// Pull the `code` (preferred) or `message` out of a JSON error object
/// embedded somewhere inside raw carrier text.
fn extract_embedded_error(raw: &str) -> Option<String> {
    let start = raw.find('{')?;
    let mut stream = serde_json::Deserializer::from_str(&raw[start..]).into_iter::<Value>();
    let value = match stream.next() {
        Some(Ok(value)) if value.is_object() => value,
        _ => return None,
    };
    for key in ["code", "errorCode", "type"] {
        if let Some(code) = value.get(key).and_then(Value::as_str) {
            return Some(code.to_string());
        }
    }
    value.get("message").and_then(Value::as_str).map(str::to_string)
}

/// Production translation table. Specific carrier-prefixed codes first,
/// generic field keywords last.
fn default_translations() -> Vec<(String, String)> {
    [
        ("SERVICETYPE.INVALID", "The selected shipping service is not available for this route."),
        ("SERVICE.UNAVAILABLE", "The carrier's service is temporarily unavailable. Please try again shortly."),
        ("POSTALCODE.MISSINGORINVALID", "A postal code is required and was missing or not recognized."),
        ("POSTALCODE.INVALID", "The destination postal code was not recognized by the carrier."),
        ("COUNTRY.POSTALCODEORZIP.INVALID", "The postal code does not match the destination country."),
        ("STATEORPROVINCECODE.INVALID", "The state or province code was not recognized for the destination country."),
        ("ACCOUNTNUMBER.INVALID", "The carrier account number is not valid for this operation."),
        ("DECLAREDVALUE.EXCEEDED", "The declared value exceeds what this service allows."),
        ("WEIGHT.EXCEEDED", "A package exceeds the maximum weight for the selected service."),
        ("COMMODITY.HARMONIZEDCODE.INVALID", "A customs line has an invalid harmonized (HS) code."),
        ("7008", "The requested optional service is not available on this route."),
        ("998", "The carrier rejected the shipment contents description."),
        ("120100", "The carrier account (shipper number) is missing or invalid."),
        ("120202", "The destination address could not be validated by the carrier."),
        ("111210", "The requested service is not available between these locations."),
        ("HARD_FAILURE", "The carrier rejected the request outright. Please verify the shipment details."),
        ("invalid_grant", "Carrier API credentials were rejected. Please verify the configured key and secret."),
        ("unauthorized", "Carrier API credentials were rejected. Please verify the configured key and secret."),
        ("destination", "The carrier cannot ship to this destination as entered."),
        ("postal", "The postal code appears to be invalid for the destination."),
        ("address", "The address could not be validated by the carrier."),
        ("timeout", "The carrier did not respond in time. Please try again."),
    ]
    .into_iter()
    .map(|(pattern, friendly)| (pattern.to_string(), friendly.to_string()))
    .collect()
}

/// Production category table. Independent from the translation table.
fn default_categories() -> Vec<(String, ErrorCategory)> {
    [
        ("postal", ErrorCategory::Address),
        ("zip", ErrorCategory::Address),
        ("state", ErrorCategory::Address),
        ("province", ErrorCategory::Address),
        ("address", ErrorCategory::Address),
        ("destination", ErrorCategory::Address),
        ("city", ErrorCategory::Address),
        ("country", ErrorCategory::Address),
        ("servicetype", ErrorCategory::Service),
        ("service", ErrorCategory::Service),
        ("product", ErrorCategory::Service),
        ("customs", ErrorCategory::Customs),
        ("commodity", ErrorCategory::Customs),
        ("harmonized", ErrorCategory::Customs),
        ("declaration", ErrorCategory::Customs),
        ("invoice", ErrorCategory::Customs),
        ("weight", ErrorCategory::Package),
        ("dimension", ErrorCategory::Package),
        ("package", ErrorCategory::Package),
        ("piece", ErrorCategory::Package),
        ("account", ErrorCategory::Account),
        ("credential", ErrorCategory::Account),
        ("authent", ErrorCategory::Account),
        ("unauthorized", ErrorCategory::Account),
        ("timeout", ErrorCategory::Network),
        ("connection", ErrorCategory::Network),
        ("unavailable", ErrorCategory::Network),
        ("network", ErrorCategory::Network),
    ]
    .into_iter()
    .map(|(keyword, category)| (keyword.to_string(), category))
    .collect()
}
