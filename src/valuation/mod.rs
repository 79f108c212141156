// 🏠 Valuation - estimated market value from a property description
//
// Two independent closed-form models:
// - residential: per-feature dollar values scaled by a condition multiplier
// - commercial: income capitalisation blended with replacement cost, scaled
//   by occupancy
//
// Both are pure. No range validation beyond the required address fields:
// pathological inputs (negative lot size, very old buildings) may produce
// negative estimates and are reported as-is.

pub mod commercial;
pub mod residential;

use serde::{Deserialize, Serialize};

use crate::error::{RealtyError, Result};

pub use commercial::{CommercialBreakdown, CommercialPropertyInput, PropertySubtype};
pub use residential::{Condition, ResidentialBreakdown, ResidentialPropertyInput};

/// Fixed year the residential age adjustment is measured from
pub const REFERENCE_YEAR: i32 = 2025;

// ============================================================================
// SHARED INPUT PIECES
// ============================================================================

/// Location fields both forms require
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
}

impl Address {
    pub fn new(address: &str, city: &str, state: &str, zip_code: &str) -> Self {
        Address {
            address: address.to_string(),
            city: city.to_string(),
            state: state.to_string(),
            zip_code: zip_code.to_string(),
        }
    }

    /// Presence check only, in form order
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("address", &self.address),
            ("city", &self.city),
            ("state", &self.state),
            ("zipCode", &self.zip_code),
        ];

        for (field, value) in fields {
            if value.is_empty() {
                return Err(RealtyError::MissingRequiredField { field });
            }
        }
        Ok(())
    }

    pub fn one_line(&self) -> String {
        format!("{}, {}, {} {}", self.address, self.city, self.state, self.zip_code)
    }
}

// ============================================================================
// RESULT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    Residential,
    Commercial,
}

impl PropertyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::Residential => "residential",
            PropertyType::Commercial => "commercial",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "lowercase")]
pub enum Breakdown {
    Residential(ResidentialBreakdown),
    Commercial(CommercialBreakdown),
}

/// Ephemeral - recomputed on demand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValuationResult {
    pub estimated_value: i64,
    pub breakdown: Breakdown,
}

impl ValuationResult {
    pub fn property_type(&self) -> PropertyType {
        match self.breakdown {
            Breakdown::Residential(_) => PropertyType::Residential,
            Breakdown::Commercial(_) => PropertyType::Commercial,
        }
    }
}

/// Either form, as submitted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "propertyType", rename_all = "lowercase")]
pub enum PropertyInput {
    Residential(ResidentialPropertyInput),
    Commercial(CommercialPropertyInput),
}

impl PropertyInput {
    pub fn address(&self) -> &Address {
        match self {
            PropertyInput::Residential(input) => &input.location,
            PropertyInput::Commercial(input) => &input.location,
        }
    }
}

// ============================================================================
// VALUATOR
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Valuator {
    pub reference_year: i32,
}

impl Valuator {
    pub fn new(reference_year: i32) -> Self {
        Valuator { reference_year }
    }

    pub fn residential(&self, input: &ResidentialPropertyInput) -> Result<ValuationResult> {
        input.location.validate()?;
        let (estimated_value, breakdown) = residential::estimate(input, self.reference_year);

        tracing::debug!(model = "residential", estimated_value, "Valuation calculated");
        Ok(ValuationResult {
            estimated_value,
            breakdown: Breakdown::Residential(breakdown),
        })
    }

    pub fn commercial(&self, input: &CommercialPropertyInput) -> Result<ValuationResult> {
        input.location.validate()?;
        let (estimated_value, breakdown) = commercial::estimate(input);

        tracing::debug!(model = "commercial", estimated_value, "Valuation calculated");
        Ok(ValuationResult {
            estimated_value,
            breakdown: Breakdown::Commercial(breakdown),
        })
    }

    pub fn valuate(&self, input: &PropertyInput) -> Result<ValuationResult> {
        match input {
            PropertyInput::Residential(input) => self.residential(input),
            PropertyInput::Commercial(input) => self.commercial(input),
        }
    }
}

impl Default for Valuator {
    fn default() -> Self {
        Valuator::new(REFERENCE_YEAR)
    }
}

pub fn value_residential(input: &ResidentialPropertyInput) -> Result<ValuationResult> {
    Valuator::default().residential(input)
}

pub fn value_commercial(input: &CommercialPropertyInput) -> Result<ValuationResult> {
    Valuator::default().commercial(input)
}

/// Half-up rounding to the nearest integer (-2.5 → -2, 2.5 → 3)
pub fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location() -> Address {
        Address::new("123 Main St", "New York", "NY", "10001")
    }

    #[test]
    fn test_address_validation_order() {
        let mut addr = Address::default();
        assert!(matches!(
            addr.validate(),
            Err(RealtyError::MissingRequiredField { field: "address" })
        ));

        addr.address = "1 A St".to_string();
        addr.city = "Austin".to_string();
        assert!(matches!(
            addr.validate(),
            Err(RealtyError::MissingRequiredField { field: "state" })
        ));

        addr.state = "TX".to_string();
        assert!(matches!(
            addr.validate(),
            Err(RealtyError::MissingRequiredField { field: "zipCode" })
        ));

        addr.zip_code = "78701".to_string();
        assert!(addr.validate().is_ok());
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_half_up(2.5), 3);
        assert_eq!(round_half_up(2.4999), 2);
        assert_eq!(round_half_up(-2.5), -2);
        assert_eq!(round_half_up(-2.6), -3);
        assert_eq!(round_half_up(407500.0), 407500);
    }

    #[test]
    fn test_valuate_dispatches_by_type() {
        let valuator = Valuator::default();

        let residential = PropertyInput::Residential(ResidentialPropertyInput {
            location: location(),
            ..Default::default()
        });
        let result = valuator.valuate(&residential).unwrap();
        assert_eq!(result.property_type(), PropertyType::Residential);
        assert_eq!(result.estimated_value, 407_500);

        let commercial = PropertyInput::Commercial(CommercialPropertyInput {
            location: location(),
            ..Default::default()
        });
        let result = valuator.valuate(&commercial).unwrap();
        assert_eq!(result.property_type(), PropertyType::Commercial);
        assert_eq!(result.estimated_value, 1_597_500);
    }

    #[test]
    fn test_missing_field_produces_no_result() {
        let input = CommercialPropertyInput::default();
        assert!(matches!(
            value_commercial(&input),
            Err(RealtyError::MissingRequiredField { field: "address" })
        ));
    }

    #[test]
    fn test_reference_year_is_configurable() {
        let input = ResidentialPropertyInput {
            location: location(),
            ..Default::default()
        };

        // One more year of age at $500 per year
        let later = Valuator::new(2026).residential(&input).unwrap();
        assert_eq!(later.estimated_value, 407_000);
    }

    #[test]
    fn test_property_input_from_json() {
        let json = r#"{
            "propertyType": "commercial",
            "address": "500 W 2nd St", "city": "Austin", "state": "TX", "zipCode": "78701",
            "propertySubtype": "retail",
            "squareFeet": 1000, "yearBuilt": 1999, "numFloors": 2, "parkingSpaces": 4,
            "occupancyRate": 100, "annualIncome": 130000, "annualExpenses": 0
        }"#;

        let input: PropertyInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.address().city, "Austin");

        // 130000 / 0.065 = 2,000,000 → 1,400,000 + 1000*200*0.3 = 1,460,000
        let result = Valuator::default().valuate(&input).unwrap();
        assert_eq!(result.estimated_value, 1_460_000);
    }
}
