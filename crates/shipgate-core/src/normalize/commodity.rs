//! Customs line-item normalization
//!
//! When a shipment is customs-declarable, each carrier wants the same
//! facts in a different layout: numbered line items, unit-of-measure
//! codes, a fixed export-reason enumeration, and an HS code cut to the
//! carrier's digit-length rule. This module produces a carrier-neutral
//! line list the payload builders then reshape.

use crate::normalize::precision;
use crate::types::CommodityDetail;

/// Minimum HS code digits carriers accept
const HS_MIN_DIGITS: usize = 6;

/// Maximum HS code digits carriers accept
const HS_MAX_DIGITS: usize = 10;

/// One normalized customs line, numbered from 1
#[derive(Debug, Clone, PartialEq)]
pub struct CustomsLine {
    pub number: u32,
    pub description: String,
    pub quantity: u32,
    pub unit_value: f64,
    pub total_value: f64,
    pub weight: f64,
    pub hs_code: Option<String>,
    pub origin_country: String,
}

/// Normalize a raw HS code to 6-10 digits.
///
/// Strips separators and any non-digit characters; codes shorter than 6
/// digits are unusable and dropped, codes longer than 10 are cut to the
/// 10-digit statistical suffix boundary.
pub fn normalize_hs_code(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < HS_MIN_DIGITS {
        return None;
    }
    Some(digits.chars().take(HS_MAX_DIGITS).collect())
}

/// Build numbered customs lines with values and weights at carrier
/// granularity. Line numbering starts at 1.
pub fn customs_lines(commodities: &[CommodityDetail]) -> Vec<CustomsLine> {
    commodities
        .iter()
        .enumerate()
        .map(|(index, commodity)| CustomsLine {
            number: index as u32 + 1,
            description: commodity.description.clone(),
            quantity: commodity.quantity,
            unit_value: precision::money(commodity.unit_value),
            total_value: precision::money(commodity.total_value),
            weight: precision::weight(commodity.weight),
            hs_code: commodity.hs_code.as_deref().and_then(normalize_hs_code),
            origin_country: commodity.origin_country.trim().to_uppercase(),
        })
        .collect()
}

/// Sum of all line weights, at weight granularity
pub fn total_weight(lines: &[CustomsLine]) -> f64 {
    precision::weight(lines.iter().map(|line| line.weight).sum())
}

/// Sum of all line values, at money granularity
pub fn total_value(lines: &[CustomsLine]) -> f64 {
    precision::money(lines.iter().map(|line| line.total_value).sum())
}
