//! Unit conversion between the generic representation and carrier units
//!
//! Conversions go through [`precision`](crate::normalize::precision) so the
//! results are already at carrier granularity.

use crate::normalize::precision;
use crate::types::{DimensionUnit, WeightUnit};

/// Pounds per kilogram
pub const LB_PER_KG: f64 = 2.204_622_621_85;

/// Centimeters per inch
pub const CM_PER_IN: f64 = 2.54;

/// Convert a weight to kilograms at weight granularity
pub fn to_kg(value: f64, unit: WeightUnit) -> f64 {
    match unit {
        WeightUnit::Kg => precision::weight(value),
        WeightUnit::Lb => precision::weight(value / LB_PER_KG),
    }
}

/// Convert a weight to pounds at weight granularity
pub fn to_lb(value: f64, unit: WeightUnit) -> f64 {
    match unit {
        WeightUnit::Lb => precision::weight(value),
        WeightUnit::Kg => precision::weight(value * LB_PER_KG),
    }
}

/// Convert a weight to the requested unit
pub fn convert_weight(value: f64, from: WeightUnit, to: WeightUnit) -> f64 {
    match to {
        WeightUnit::Kg => to_kg(value, from),
        WeightUnit::Lb => to_lb(value, from),
    }
}

/// Convert a dimension to centimeters, rounded up to a whole unit the way
/// carriers bill dimensional weight
pub fn to_cm(value: f64, unit: DimensionUnit) -> f64 {
    match unit {
        DimensionUnit::Cm => value.ceil(),
        DimensionUnit::In => (value * CM_PER_IN).ceil(),
    }
}

/// Convert a dimension to inches, rounded up to a whole unit
pub fn to_in(value: f64, unit: DimensionUnit) -> f64 {
    match unit {
        DimensionUnit::In => value.ceil(),
        DimensionUnit::Cm => (value / CM_PER_IN).ceil(),
    }
}

/// Convert a dimension to the requested unit
pub fn convert_dimension(value: f64, from: DimensionUnit, to: DimensionUnit) -> f64 {
    match to {
        DimensionUnit::Cm => to_cm(value, from),
        DimensionUnit::In => to_in(value, from),
    }
}

/// Apply a carrier minimum weight floor. Carriers reject zero or
/// near-zero billable weights, so anything below the floor is raised to it.
pub fn floor_weight(value: f64, minimum: f64) -> f64 {
    if value < minimum {
        minimum
    } else {
        precision::weight(value)
    }
}
