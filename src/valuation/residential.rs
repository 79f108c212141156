// Residential model
//
// estimated = round((base + bedrooms + bathrooms + lot + amenities - age) * condition)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{round_half_up, Address};
use crate::error::RealtyError;

pub const PRICE_PER_SQFT: f64 = 200.0;
pub const PER_BEDROOM: f64 = 15_000.0;
pub const PER_BATHROOM: f64 = 10_000.0;
pub const AGE_PENALTY_PER_YEAR: f64 = 500.0;
pub const PER_ACRE: f64 = 100_000.0;
pub const GARAGE_VALUE: f64 = 25_000.0;
pub const POOL_VALUE: f64 = 35_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl Condition {
    pub const ALL: [Condition; 4] = [
        Condition::Excellent,
        Condition::Good,
        Condition::Fair,
        Condition::Poor,
    ];

    pub fn multiplier(&self) -> f64 {
        match self {
            Condition::Excellent => 1.2,
            Condition::Good => 1.0,
            Condition::Fair => 0.8,
            Condition::Poor => 0.6,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::Excellent => "excellent",
            Condition::Good => "good",
            Condition::Fair => "fair",
            Condition::Poor => "poor",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Condition {
    type Err = RealtyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        Condition::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| RealtyError::UnknownCondition(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResidentialPropertyInput {
    #[serde(flatten)]
    pub location: Address,
    pub bedrooms: u32,
    /// Half-bath steps (2.5 etc.)
    pub bathrooms: f64,
    pub square_feet: f64,
    pub year_built: i32,
    /// Acres
    pub lot_size: f64,
    pub has_garage: bool,
    pub has_pool: bool,
    pub condition: Condition,
}

impl Default for ResidentialPropertyInput {
    /// Initial values of the residential form
    fn default() -> Self {
        ResidentialPropertyInput {
            location: Address::default(),
            bedrooms: 3,
            bathrooms: 2.0,
            square_feet: 1500.0,
            year_built: 2010,
            lot_size: 0.25,
            has_garage: true,
            has_pool: false,
            condition: Condition::Good,
        }
    }
}

impl ResidentialPropertyInput {
    /// Bedroom stepper: never below one
    pub fn decrement_bedrooms(&mut self) {
        self.bedrooms = self.bedrooms.saturating_sub(1).max(1);
    }

    pub fn increment_bedrooms(&mut self) {
        self.bedrooms += 1;
    }

    /// Bathroom stepper moves in half baths, never below one
    pub fn decrement_bathrooms(&mut self) {
        self.bathrooms = (self.bathrooms - 0.5).max(1.0);
    }

    pub fn increment_bathrooms(&mut self) {
        self.bathrooms += 0.5;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResidentialBreakdown {
    pub base_value: f64,
    pub bedroom_value: f64,
    pub bathroom_value: f64,
    pub age_adjustment: f64,
    pub lot_size_value: f64,
    pub amenities_value: f64,
    pub condition_multiplier: f64,
    /// Sum before the condition multiplier
    pub raw_total: f64,
}

pub(crate) fn estimate(input: &ResidentialPropertyInput, reference_year: i32) -> (i64, ResidentialBreakdown) {
    let base_value = input.square_feet * PRICE_PER_SQFT;
    let bedroom_value = f64::from(input.bedrooms) * PER_BEDROOM;
    let bathroom_value = input.bathrooms * PER_BATHROOM;
    let age_adjustment = f64::from(reference_year - input.year_built) * AGE_PENALTY_PER_YEAR;
    let lot_size_value = input.lot_size * PER_ACRE;

    let mut amenities_value = 0.0;
    if input.has_garage {
        amenities_value += GARAGE_VALUE;
    }
    if input.has_pool {
        amenities_value += POOL_VALUE;
    }

    let condition_multiplier = input.condition.multiplier();
    let raw_total =
        base_value + bedroom_value + bathroom_value + lot_size_value + amenities_value - age_adjustment;

    let breakdown = ResidentialBreakdown {
        base_value,
        bedroom_value,
        bathroom_value,
        age_adjustment,
        lot_size_value,
        amenities_value,
        condition_multiplier,
        raw_total,
    };

    (round_half_up(raw_total * condition_multiplier), breakdown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::valuation::{value_residential, Breakdown};

    fn sample() -> ResidentialPropertyInput {
        ResidentialPropertyInput {
            location: Address::new("123 Main St", "New York", "NY", "10001"),
            ..Default::default()
        }
    }

    #[test]
    fn test_reference_example() {
        let result = value_residential(&sample()).unwrap();
        assert_eq!(result.estimated_value, 407_500);

        let Breakdown::Residential(b) = result.breakdown else {
            panic!("expected residential breakdown");
        };
        assert_eq!(b.base_value, 300_000.0);
        assert_eq!(b.bedroom_value, 45_000.0);
        assert_eq!(b.bathroom_value, 20_000.0);
        assert_eq!(b.age_adjustment, 7_500.0);
        assert_eq!(b.lot_size_value, 25_000.0);
        assert_eq!(b.amenities_value, 25_000.0);
        assert_eq!(b.raw_total, 407_500.0);
    }

    #[test]
    fn test_condition_multipliers() {
        let mut input = sample();
        let expected = [
            (Condition::Excellent, 489_000),
            (Condition::Good, 407_500),
            (Condition::Fair, 326_000),
            (Condition::Poor, 244_500),
        ];

        for (condition, value) in expected {
            input.condition = condition;
            assert_eq!(value_residential(&input).unwrap().estimated_value, value, "{}", condition);
        }
    }

    #[test]
    fn test_amenities() {
        let mut input = sample();
        input.has_garage = false;
        input.has_pool = true;
        // garage -25000, pool +35000
        assert_eq!(value_residential(&input).unwrap().estimated_value, 417_500);

        input.has_garage = true;
        assert_eq!(value_residential(&input).unwrap().estimated_value, 442_500);
    }

    #[test]
    fn test_half_baths() {
        let mut input = sample();
        input.bathrooms = 2.5;
        assert_eq!(value_residential(&input).unwrap().estimated_value, 412_500);
    }

    #[test]
    fn test_fractional_square_feet() {
        let mut input = sample();
        input.square_feet = 1500.75;
        assert_eq!(value_residential(&input).unwrap().estimated_value, 407_650);
    }

    #[test]
    fn test_negative_total_not_clamped() {
        let mut input = sample();
        input.square_feet = 1.0;
        input.bedrooms = 1;
        input.bathrooms = 1.0;
        input.lot_size = -1.0;
        input.has_garage = false;
        input.year_built = 1825;
        // 200 + 15000 + 10000 - 100000 - 100000 = -174800
        assert_eq!(value_residential(&input).unwrap().estimated_value, -174_800);
    }

    #[test]
    fn test_future_year_adds_value() {
        let mut input = sample();
        input.year_built = 2027;
        // age adjustment of -1000 adds value
        assert_eq!(value_residential(&input).unwrap().estimated_value, 416_000);
    }

    #[test]
    fn test_idempotent() {
        let input = sample();
        let first = value_residential(&input).unwrap();
        let second = value_residential(&input).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_condition_parsing() {
        assert_eq!("excellent".parse::<Condition>().unwrap(), Condition::Excellent);
        assert_eq!(" Fair ".parse::<Condition>().unwrap(), Condition::Fair);
        assert!(matches!(
            "mint".parse::<Condition>(),
            Err(RealtyError::UnknownCondition(ref s)) if s == "mint"
        ));
    }

    #[test]
    fn test_unknown_condition_rejected_in_json() {
        let json = r#"{"address":"a","city":"b","state":"c","zipCode":"d","bedrooms":3,
            "bathrooms":2,"squareFeet":1500,"yearBuilt":2010,"lotSize":0.25,
            "hasGarage":true,"hasPool":false,"condition":"mint"}"#;
        assert!(serde_json::from_str::<ResidentialPropertyInput>(json).is_err());
    }

    #[test]
    fn test_steppers_respect_minimums() {
        let mut input = sample();
        input.bedrooms = 1;
        input.decrement_bedrooms();
        assert_eq!(input.bedrooms, 1);
        input.increment_bedrooms();
        assert_eq!(input.bedrooms, 2);

        input.bathrooms = 1.5;
        input.decrement_bathrooms();
        input.decrement_bathrooms();
        assert_eq!(input.bathrooms, 1.0);
        input.increment_bathrooms();
        assert_eq!(input.bathrooms, 1.5);
    }
}
