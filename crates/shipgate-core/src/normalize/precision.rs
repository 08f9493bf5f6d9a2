//! Numeric precision fixing for carrier payloads
//!
//! Carrier-side validators reject values like `4.40899999999999981`, which
//! is what naive unit conversion produces once a weight has been through
//! LB↔KG math. Every weight and customs value is serialized with at most
//! 3 fractional digits and every monetary amount with at most 2, and the
//! whole payload gets a recursive cleanup pass immediately before
//! serialization because intermediate conversions reintroduce float error.

use serde_json::Value;

/// Fractional digits allowed for weights and customs values
pub const WEIGHT_DECIMALS: u32 = 3;

/// Fractional digits allowed for monetary amounts
pub const MONEY_DECIMALS: u32 = 2;

/// Round to `decimals` fractional digits: multiply by 10^n, round to the
/// nearest integer, divide back. The result is the closest double to a
/// fixed-point decimal, which serializes without floating-point noise.
pub fn fix(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Weight granularity (3 fractional digits)
pub fn weight(value: f64) -> f64 {
    fix(value, WEIGHT_DECIMALS)
}

/// Money granularity (2 fractional digits)
pub fn money(value: f64) -> f64 {
    fix(value, MONEY_DECIMALS)
}

/// Recursively repair every fractional number in a JSON tree to weight
/// granularity. Integers pass through untouched. Applied to the full
/// payload just before serialization, not earlier.
pub fn normalize_payload(value: &mut Value) {
    match value {
        Value::Number(number) => {
            // Integer-representable numbers need no repair
            if number.is_i64() || number.is_u64() {
                return;
            }
            if let Some(float) = number.as_f64() {
                if let Some(fixed) = serde_json::Number::from_f64(fix(float, WEIGHT_DECIMALS)) {
                    *value = Value::Number(fixed);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                normalize_payload(item);
            }
        }
        Value::Object(map) => {
            for (_, item) in map.iter_mut() {
                normalize_payload(item);
            }
        }
        _ => {}
    }
}
