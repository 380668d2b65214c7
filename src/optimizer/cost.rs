//! Cost estimation
//!
//! Prices are per kilogram, so a line costs `dosage × V × price / 1000`.

use serde::{Deserialize, Serialize};

/// Batch cost of one fertilizer
pub fn line_cost(dosage_g_per_l: f64, volume_liters: f64, price_per_kg: f64) -> f64 {
    dosage_g_per_l * volume_liters * price_per_kg / 1000.0
}

/// Share of `total` in percent; 0 when the total is 0
pub fn cost_percentage(cost: f64, total: f64) -> f64 {
    if total > 0.0 {
        cost / total * 100.0
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostRating {
    VeryLow,
    Low,
    Moderate,
    High,
    VeryHigh,
}

impl CostRating {
    /// Rate a cost per liter of final solution
    pub fn from_cost_per_liter(cost_per_liter: f64) -> Self {
        match cost_per_liter {
            c if c < 0.001 => CostRating::VeryLow,
            c if c < 0.005 => CostRating::Low,
            c if c < 0.015 => CostRating::Moderate,
            c if c < 0.030 => CostRating::High,
            _ => CostRating::VeryHigh,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CostRating::VeryLow => "Very low",
            CostRating::Low => "Low",
            CostRating::Moderate => "Moderate",
            CostRating::High => "High",
            CostRating::VeryHigh => "Very high",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostSummary {
    pub total_cost: f64,
    pub cost_per_liter: f64,
    pub rating: CostRating,
}

/// Totals for a batch from per-line costs
pub fn summarize(line_costs: &[f64], volume_liters: f64) -> CostSummary {
    let total_cost: f64 = line_costs.iter().sum();
    let cost_per_liter = if volume_liters > 0.0 { total_cost / volume_liters } else { 0.0 };
    CostSummary {
        total_cost,
        cost_per_liter,
        rating: CostRating::from_cost_per_liter(cost_per_liter),
    }
}
