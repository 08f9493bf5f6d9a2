//! Address-field retry fallback
//!
//! Certain destination territories (small island nations, the Caribbean
//! in particular) are rejected when `state`/`postal code` carry values
//! the carrier cannot validate. When a rate or shipment call fails and
//! the error text matches the address-field pattern set, the client
//! rebuilds the same payload with those fields cleared and retries
//! exactly once; if the retry also fails, the original error is
//! surfaced. Carrier-agnostic, implemented identically in each client.

use crate::error::Error;
use crate::types::ShipmentRequest;

/// Error-text patterns that trigger the address-stripped retry,
/// case-insensitive substring match
pub const ADDRESS_FIELD_PATTERNS: [&str; 6] =
    ["STATE", "PROVINCE", "POSTAL", "ZIP", "ADDRESS", "DESTINATION"];

/// True when a carrier failure's text matches the address pattern set.
/// Transport and auth errors never qualify.
pub fn is_address_failure(error: &Error) -> bool {
    match error.carrier_text() {
        Some(text) => {
            let upper = text.to_uppercase();
            ADDRESS_FIELD_PATTERNS.iter().any(|pattern| upper.contains(pattern))
        }
        None => false,
    }
}

/// The same request with the destination state and postal code cleared.
/// The origin side is left alone: it is the destination territory the
/// carrier cannot validate.
pub fn strip_address_fields(request: &ShipmentRequest) -> ShipmentRequest {
    let mut stripped = request.clone();
    stripped.recipient.address.state = None;
    stripped.recipient.address.postal_code = None;
    tracing::info!(
        carrier_destination = %stripped.recipient.address.country,
        "retrying with destination state/postal code stripped"
    );
    stripped
}
