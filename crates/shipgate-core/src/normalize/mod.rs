//! Pure normalization functions for carrier payloads
//!
//! Everything in this module converts the generic address/package/commodity
//! representation into carrier-ready field values: line truncation, unit
//! conversion, country-code resolution, and numeric precision fixing.
//! No I/O happens here.

pub mod address;
pub mod commodity;
pub mod country;
pub mod precision;
pub mod units;

pub use address::{city_or_default, split_street};
pub use commodity::{customs_lines, normalize_hs_code, CustomsLine};
pub use country::{normalize_code, CountryInfo, CountryLookup, StaticCountryTable};
pub use precision::{fix, money, normalize_payload, weight};
