//! Mixing instructions and recipe warnings

use crate::composition::FertilizerCandidate;
use crate::config::EngineConfig;
use crate::diagnostics::ionic_balance::IonicBalance;
use crate::nutrients::{AchievedState, NutrientTargetSet};
use crate::optimizer::selector::{DiscardReason, DiscardedCandidate};
use crate::optimizer::FormulationLineItem;

/// Ordered preparation steps for one batch
pub fn mixing_instructions(
    items: &[FormulationLineItem],
    targets: &NutrientTargetSet,
    volume_liters: f64,
) -> Vec<String> {
    let mut steps = vec![
        format!("Preparation for {} L of nutrient solution:", volume_liters),
        "Mixing order:".to_string(),
    ];

    steps.extend(items.iter().enumerate().map(|(i, item)| {
        format!(
            "{}. {}: {:.1} g ({:.3} g/L)",
            i + 1,
            item.fertilizer_name,
            item.total_grams,
            item.dosage
        )
    }));

    steps.push("Dissolve each fertilizer completely before adding the next".to_string());
    steps.push(format!(
        "Check final pH (target {:.1}) and EC (target {:.1} dS/m), adjust if needed",
        targets.ph, targets.ec
    ));
    steps
}

/// Everything the warning pass looks at
pub struct WarningInputs<'a> {
    pub targets: &'a NutrientTargetSet,
    pub achieved: &'a AchievedState,
    pub items: &'a [FormulationLineItem],
    pub pool: &'a [FertilizerCandidate],
    pub discarded: &'a [DiscardedCandidate],
    pub ionic_balance: &'a IonicBalance,
    pub estimated_ec: f64,
}

pub fn recipe_warnings(inputs: &WarningInputs<'_>, config: &EngineConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    for (&nutrient, &target) in inputs.targets.concentrations.iter().filter(|(_, t)| **t > 0.0) {
        let ratio = inputs.achieved.get(nutrient) / target;
        if ratio < config.deficit_warning_ratio {
            warnings.push(format!(
                "{} below target ({:.0}% of {:.1} mg/L)",
                nutrient.display_name(),
                ratio * 100.0,
                target
            ));
        } else if ratio > config.excess_warning_ratio {
            warnings.push(format!(
                "{} excess ({:.0}% of {:.1} mg/L): reduce concentrations",
                nutrient.display_name(),
                ratio * 100.0,
                target
            ));
        }
    }

    if inputs.items.len() > config.max_fertilizers {
        warnings.push(format!("Formulation needs many fertilizers ({})", inputs.items.len()));
    }

    let low: Vec<&str> = inputs
        .items
        .iter()
        .filter(|item| item.dosage < config.low_dosage_warning)
        .map(|item| item.fertilizer_name.as_str())
        .collect();
    if !low.is_empty() {
        warnings.push(format!(
            "Very low dosage (< {} g/L), check effectiveness: {}",
            config.low_dosage_warning,
            low.join(", ")
        ));
    }

    let unpriced: Vec<&str> = inputs
        .items
        .iter()
        .filter(|item| {
            inputs
                .pool
                .iter()
                .any(|c| c.id == item.fertilizer_id && c.price_per_unit.is_none())
        })
        .map(|item| item.fertilizer_name.as_str())
        .collect();
    if !unpriced.is_empty() {
        warnings.push(format!("No price on record, cost excludes: {}", unpriced.join(", ")));
    }

    for discard in inputs.discarded {
        let name = &inputs.pool[discard.candidate_index].name;
        match discard.reason {
            DiscardReason::ExceedsSolubility => {
                warnings.push(format!("{} skipped: required dosage exceeds its solubility limit", name))
            }
            DiscardReason::NoUsableDosage => {
                warnings.push(format!("{} skipped: no usable dosage for the remaining gaps", name))
            }
        }
    }

    if inputs.ionic_balance.difference_percent > 10.0 {
        warnings.push(format!(
            "Ionic imbalance of {:.1}% (cations {:.2} meq/L, anions {:.2} meq/L)",
            inputs.ionic_balance.difference_percent,
            inputs.ionic_balance.cation_meq,
            inputs.ionic_balance.anion_meq
        ));
    }

    if inputs.estimated_ec > inputs.targets.ec + config.ec_tolerance {
        warnings.push(format!(
            "Estimated EC {:.2} dS/m exceeds target {:.2} dS/m",
            inputs.estimated_ec, inputs.targets.ec
        ));
    }

    warnings
}
