//! Fertilizer selection and dosing
//!
//! `scorer` ranks candidates against the open gaps, `concentration` doses
//! the chosen one, `selector` runs the bounded greedy loop, and `cost` prices
//! the result.

pub mod concentration;
pub mod cost;
pub mod scorer;
pub mod selector;

pub use concentration::{calculate_dosage, DosageCalculation, DosageClamp};
pub use cost::{CostRating, CostSummary};
pub use scorer::{best_candidate, score};
pub use selector::{select_fertilizers, Selection, SelectionContext, SelectionOutcome, StopReason};

use crate::composition::FertilizerCandidate;
use crate::nutrients::NutrientMap;
use serde::{Deserialize, Serialize};

/// One fertilizer in the final recipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormulationLineItem {
    pub fertilizer_id: String,
    pub fertilizer_name: String,
    /// g/L
    pub dosage: f64,
    /// g for the whole batch
    pub total_grams: f64,
    pub cost: f64,
    pub cost_percentage: f64,
    /// mg/L delivered per nutrient
    pub contributions: NutrientMap,
    pub dosage_clamp: DosageClamp,
    pub balanced_fallback: bool,
}

/// Price each selection and turn it into a line item
///
/// Returns the items in selection order together with the batch totals.
pub fn price_selections(
    pool: &[FertilizerCandidate],
    selections: &[Selection],
    volume_liters: f64,
) -> (Vec<FormulationLineItem>, CostSummary) {
    let costs: Vec<f64> = selections
        .iter()
        .map(|s| {
            let price = pool[s.candidate_index].price_per_unit.unwrap_or(0.0);
            cost::line_cost(s.dosage(), volume_liters, price)
        })
        .collect();
    let summary = cost::summarize(&costs, volume_liters);

    let items = selections
        .iter()
        .zip(&costs)
        .map(|(s, &line_cost)| {
            let candidate = &pool[s.candidate_index];
            FormulationLineItem {
                fertilizer_id: candidate.id.clone(),
                fertilizer_name: candidate.name.clone(),
                dosage: s.dosage(),
                total_grams: s.dosage() * volume_liters,
                cost: line_cost,
                cost_percentage: cost::cost_percentage(line_cost, summary.total_cost),
                contributions: s.contribution.clone(),
                dosage_clamp: s.calculation.clamp,
                balanced_fallback: s.balanced_fallback,
            }
        })
        .collect();

    (items, summary)
}
