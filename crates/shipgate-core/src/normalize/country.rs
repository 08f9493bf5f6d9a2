//! Country and region normalization
//!
//! Country codes are normalized to exactly 2 uppercase letters before
//! transmission. Special territories (Caribbean Netherlands sub-codes,
//! legacy Antilles codes) are remapped per carrier through a reference
//! lookup; when the lookup has no entry, codes are truncated to the first
//! 2 characters so the payload stays well-formed.

use std::collections::HashMap;

use crate::types::CarrierId;

/// Reference data for one country or territory
#[derive(Debug, Clone)]
pub struct CountryInfo {
    /// ISO-3166 alpha-2 code transmitted by default
    pub iso2: String,

    /// Carrier-specific code overrides for territories a carrier files
    /// under its own region code
    pub carrier_codes: HashMap<CarrierId, String>,

    /// Whether the postal service of this country uses postal codes
    pub has_postal_code: bool,

    /// Whether carriers accept a state/province field for this country
    pub accepts_state: bool,

    /// Capital used when the caller supplies no city
    pub default_city: Option<String>,
}

impl CountryInfo {
    /// Code to transmit for the given carrier
    pub fn code_for(&self, carrier: CarrierId) -> &str {
        self.carrier_codes.get(&carrier).map(String::as_str).unwrap_or(&self.iso2)
    }
}

/// Lookup service for country reference data. The production
/// implementation sits on the reference database; [`StaticCountryTable`]
/// covers the special territories when that collaborator is unavailable.
pub trait CountryLookup: Send + Sync {
    fn find(&self, code: &str) -> Option<CountryInfo>;
}

/// Built-in table of the territories the carriers treat specially.
/// Everything not listed here falls back to plain 2-letter truncation.
pub struct StaticCountryTable {
    entries: HashMap<String, CountryInfo>,
}

impl StaticCountryTable {
    pub fn new() -> Self {
        let mut entries = HashMap::new();

        let mut add = |keys: &[&str], info: CountryInfo| {
            for key in keys {
                entries.insert((*key).to_string(), info.clone());
            }
        };

        // Caribbean Netherlands: ISO files the three islands under BQ,
        // sub-coded BQ-BO / BQ-SA / BQ-SE. DHL routes them via the legacy
        // Netherlands Antilles gateway code.
        add(
            &["BQ", "BQ-BO"],
            CountryInfo {
                iso2: "BQ".to_string(),
                carrier_codes: HashMap::from([(CarrierId::Dhl, "XB".to_string())]),
                has_postal_code: false,
                accepts_state: false,
                default_city: Some("Kralendijk".to_string()),
            },
        );
        add(
            &["BQ-SA"],
            CountryInfo {
                iso2: "BQ".to_string(),
                carrier_codes: HashMap::from([(CarrierId::Dhl, "XS".to_string())]),
                has_postal_code: false,
                accepts_state: false,
                default_city: Some("The Bottom".to_string()),
            },
        );
        add(
            &["BQ-SE"],
            CountryInfo {
                iso2: "BQ".to_string(),
                carrier_codes: HashMap::from([(CarrierId::Dhl, "XE".to_string())]),
                has_postal_code: false,
                accepts_state: false,
                default_city: Some("Oranjestad".to_string()),
            },
        );
        // Legacy Netherlands Antilles code still appears in old address books
        add(
            &["AN"],
            CountryInfo {
                iso2: "CW".to_string(),
                carrier_codes: HashMap::new(),
                has_postal_code: false,
                accepts_state: false,
                default_city: Some("Willemstad".to_string()),
            },
        );
        add(
            &["CW"],
            CountryInfo {
                iso2: "CW".to_string(),
                carrier_codes: HashMap::new(),
                has_postal_code: false,
                accepts_state: false,
                default_city: Some("Willemstad".to_string()),
            },
        );
        add(
            &["VG"],
            CountryInfo {
                iso2: "VG".to_string(),
                carrier_codes: HashMap::new(),
                has_postal_code: false,
                accepts_state: false,
                default_city: Some("Road Town".to_string()),
            },
        );
        add(
            &["AG"],
            CountryInfo {
                iso2: "AG".to_string(),
                carrier_codes: HashMap::new(),
                has_postal_code: false,
                accepts_state: false,
                default_city: Some("St. John's".to_string()),
            },
        );
        add(
            &["KY"],
            CountryInfo {
                iso2: "KY".to_string(),
                carrier_codes: HashMap::new(),
                has_postal_code: true,
                accepts_state: false,
                default_city: Some("George Town".to_string()),
            },
        );
        add(
            &["HK"],
            CountryInfo {
                iso2: "HK".to_string(),
                carrier_codes: HashMap::new(),
                has_postal_code: false,
                accepts_state: false,
                default_city: Some("Hong Kong".to_string()),
            },
        );
        add(
            &["AE"],
            CountryInfo {
                iso2: "AE".to_string(),
                carrier_codes: HashMap::new(),
                has_postal_code: false,
                accepts_state: true,
                default_city: Some("Dubai".to_string()),
            },
        );

        Self { entries }
    }
}

impl Default for StaticCountryTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CountryLookup for StaticCountryTable {
    fn find(&self, code: &str) -> Option<CountryInfo> {
        self.entries.get(&code.trim().to_uppercase()).cloned()
    }
}

/// Normalize a raw country code to the exact 2-letter form the given
/// carrier expects. Reference lookup first; first-2-characters
/// truncation when the territory is unknown.
pub fn normalize_code(raw: &str, carrier: CarrierId, lookup: &dyn CountryLookup) -> String {
    let cleaned = raw.trim().to_uppercase();
    if let Some(info) = lookup.find(&cleaned) {
        return info.code_for(carrier).to_string();
    }
    cleaned.chars().filter(|c| c.is_ascii_alphabetic()).take(2).collect()
}

/// Postal code for transmission: the supplied value when present, a
/// carrier placeholder when the country mandates one and the true value
/// is absent, nothing otherwise.
pub fn postal_code_or_placeholder(
    postal_code: Option<&str>,
    country: &str,
    lookup: &dyn CountryLookup,
) -> Option<String> {
    match postal_code.map(str::trim).filter(|p| !p.is_empty()) {
        Some(value) => Some(value.to_string()),
        None => {
            let mandatory = lookup.find(country).map(|info| info.has_postal_code).unwrap_or(false);
            if mandatory {
                Some("00000".to_string())
            } else {
                None
            }
        }
    }
}
