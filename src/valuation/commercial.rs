// Commercial model
//
// NOI = income - expenses
// estimated = round((NOI / cap_rate * 0.7 + sqft * per_sqft * 0.3) * occupancy / 100)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{round_half_up, Address};
use crate::error::RealtyError;

pub const INCOME_WEIGHT: f64 = 0.7;
pub const REPLACEMENT_WEIGHT: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertySubtype {
    Office,
    Retail,
    Industrial,
    Multifamily,
}

impl PropertySubtype {
    pub const ALL: [PropertySubtype; 4] = [
        PropertySubtype::Office,
        PropertySubtype::Retail,
        PropertySubtype::Industrial,
        PropertySubtype::Multifamily,
    ];

    /// Income-to-value ratio; never zero
    pub fn cap_rate(&self) -> f64 {
        match self {
            PropertySubtype::Office => 0.06,
            PropertySubtype::Retail => 0.065,
            PropertySubtype::Industrial => 0.07,
            PropertySubtype::Multifamily => 0.08,
        }
    }

    /// Replacement cost per square foot
    pub fn per_square_foot(&self) -> f64 {
        match self {
            PropertySubtype::Office => 250.0,
            PropertySubtype::Retail => 200.0,
            PropertySubtype::Industrial => 120.0,
            PropertySubtype::Multifamily => 150.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PropertySubtype::Office => "office",
            PropertySubtype::Retail => "retail",
            PropertySubtype::Industrial => "industrial",
            PropertySubtype::Multifamily => "multifamily",
        }
    }
}

impl fmt::Display for PropertySubtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PropertySubtype {
    type Err = RealtyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        PropertySubtype::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| RealtyError::UnknownPropertySubtype(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommercialPropertyInput {
    #[serde(flatten)]
    pub location: Address,
    pub property_subtype: PropertySubtype,
    pub square_feet: f64,
    pub year_built: i32,
    pub num_floors: u32,
    pub parking_spaces: u32,
    /// Percent, 0-100
    pub occupancy_rate: f64,
    pub annual_income: f64,
    pub annual_expenses: f64,
}

impl Default for CommercialPropertyInput {
    /// Initial values of the commercial form
    fn default() -> Self {
        CommercialPropertyInput {
            location: Address::default(),
            property_subtype: PropertySubtype::Office,
            square_feet: 5000.0,
            year_built: 2000,
            num_floors: 1,
            parking_spaces: 20,
            occupancy_rate: 90.0,
            annual_income: 200_000.0,
            annual_expenses: 80_000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommercialBreakdown {
    pub net_operating_income: f64,
    pub cap_rate: f64,
    pub income_value: f64,
    pub per_square_foot: f64,
    pub replacement_value: f64,
    pub occupancy_factor: f64,
}

pub(crate) fn estimate(input: &CommercialPropertyInput) -> (i64, CommercialBreakdown) {
    let subtype = input.property_subtype;

    let net_operating_income = input.annual_income - input.annual_expenses;
    let cap_rate = subtype.cap_rate();
    let income_value = net_operating_income / cap_rate;

    let per_square_foot = subtype.per_square_foot();
    let replacement_value = input.square_feet * per_square_foot;

    let occupancy_factor = input.occupancy_rate / 100.0;
    let total = (income_value * INCOME_WEIGHT + replacement_value * REPLACEMENT_WEIGHT) * occupancy_factor;

    let breakdown = CommercialBreakdown {
        net_operating_income,
        cap_rate,
        income_value,
        per_square_foot,
        replacement_value,
        occupancy_factor,
    };

    (round_half_up(total), breakdown)
}
