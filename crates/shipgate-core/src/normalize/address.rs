//! Street-line formatting for carrier address layouts
//!
//! Carriers accept at most two street lines, each capped at a
//! carrier-specific length (DHL 45, FedEx/UPS 35). Free-form input is
//! reflowed against that cap without splitting words where it can be
//! avoided.

use crate::normalize::country::CountryLookup;

/// Street line cap for DHL Express payloads
pub const DHL_LINE_CAP: usize = 45;

/// Street line cap for FedEx and UPS payloads
pub const FEDEX_UPS_LINE_CAP: usize = 35;

/// Fraction of the cap a whitespace split point must clear, in tenths.
/// A split in the first 60% of the line would leave a degenerate
/// first line, so it falls back to a hard cut instead.
const MIN_SPLIT_TENTHS: usize = 6;

/// Split street text into at most two lines of at most `cap` characters.
///
/// If both input lines already fit independently they are returned
/// unchanged (empty second line filtered out). If the space-joined
/// concatenation fits one line, a single line is returned. Otherwise the
/// combined string is split at the last whitespace boundary at or before
/// the cap, accepted only past 60% of the cap, else hard-cut at the cap;
/// the remainder becomes line two, itself hard-truncated to the cap.
pub fn split_street(street1: &str, street2: &str, cap: usize) -> (String, Option<String>) {
    let s1 = street1.trim();
    let s2 = street2.trim();

    if char_len(s1) <= cap && char_len(s2) <= cap {
        let second = if s2.is_empty() { None } else { Some(s2.to_string()) };
        return (s1.to_string(), second);
    }

    let combined = if s2.is_empty() {
        s1.to_string()
    } else {
        format!("{} {}", s1, s2)
    };

    if char_len(&combined) <= cap {
        return (combined, None);
    }

    // Last whitespace within the first `cap` characters, tracked in both
    // character position (for the 60% rule) and byte offset (for slicing).
    let mut hard_cut_bytes = combined.len();
    let mut last_ws: Option<(usize, usize)> = None;
    for (position, (offset, ch)) in combined.char_indices().enumerate() {
        if position >= cap {
            hard_cut_bytes = offset;
            break;
        }
        if ch.is_whitespace() {
            last_ws = Some((position, offset));
        }
    }

    let split_bytes = match last_ws {
        Some((position, offset)) if position * 10 >= cap * MIN_SPLIT_TENTHS => offset,
        _ => hard_cut_bytes,
    };

    let line1 = combined[..split_bytes].trim_end().to_string();
    let rest = combined[split_bytes..].trim_start();
    let line2 = truncate_chars(rest, cap);

    let second = if line2.is_empty() { None } else { Some(line2) };
    (line1, second)
}

/// City value for transmission: the input when present, otherwise the
/// per-country default capital from the reference lookup, otherwise the
/// country code itself so the field is never empty.
pub fn city_or_default(city: &str, country: &str, lookup: &dyn CountryLookup) -> String {
    let trimmed = city.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }
    lookup
        .find(country)
        .and_then(|info| info.default_city)
        .unwrap_or_else(|| country.trim().to_uppercase())
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn truncate_chars(s: &str, cap: usize) -> String {
    s.chars().take(cap).collect()
}
