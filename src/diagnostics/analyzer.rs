//! Per-nutrient deviation analysis
//!
//! deviation % = (achieved - target) / target × 100, 0 when the target is 0.

use crate::config::EngineConfig;
use crate::diagnostics::types::{Direction, NutrientDiagnostic, ReasonTag, Severity};
use crate::nutrients::{AchievedState, Nutrient, NutrientTargetSet};
use crate::optimizer::{DosageClamp, FormulationLineItem, StopReason};
use smallvec::SmallVec;
use std::collections::BTreeMap;

/// What the analyzer needs to know about how the recipe was built
pub struct DiagnosticContext<'a> {
    /// Achieved state before any fertilizer (irrigation water)
    pub baseline: &'a AchievedState,
    pub line_items: &'a [FormulationLineItem],
    pub stop_reason: StopReason,
}

pub fn deviation_percent(achieved: f64, target: f64) -> f64 {
    if target > 0.0 {
        (achieved - target) / target * 100.0
    } else {
        0.0
    }
}

/// Line items supplying `nutrient`, largest contribution first
fn suppliers<'a>(nutrient: Nutrient, items: &'a [FormulationLineItem]) -> Vec<(&'a FormulationLineItem, f64)> {
    let mut supplying: Vec<_> = items
        .iter()
        .filter_map(|item| {
            let ppm = item.contributions.get(&nutrient).copied().unwrap_or(0.0);
            (ppm > 0.0).then_some((item, ppm))
        })
        .collect();
    // Stable: equal contributions keep selection order
    supplying.sort_by(|a, b| b.1.total_cmp(&a.1));
    supplying
}

/// Diagnose one nutrient
pub fn diagnose_nutrient(
    nutrient: Nutrient,
    target: f64,
    achieved: f64,
    ctx: &DiagnosticContext<'_>,
    config: &EngineConfig,
) -> NutrientDiagnostic {
    let deviation = deviation_percent(achieved, target);
    let severity = Severity::from_deviation(deviation, &config.severity);
    let has_discrepancy = severity != Severity::None;
    let direction = match (has_discrepancy, deviation < 0.0) {
        (false, _) => Direction::OnTarget,
        (true, true) => Direction::Deficit,
        (true, false) => Direction::Excess,
    };

    let supplying = suppliers(nutrient, ctx.line_items);
    let names: SmallVec<[String; 4]> = supplying
        .iter()
        .map(|(item, _)| item.fertilizer_name.clone())
        .collect();

    let mut reasons = Vec::new();
    match direction {
        Direction::Deficit => {
            if supplying.is_empty() {
                reasons.push(ReasonTag::NoSupplier);
            }
            if supplying.iter().any(|(item, _)| item.dosage_clamp == DosageClamp::Max) {
                reasons.push(ReasonTag::DosageCapped);
            }
            if matches!(
                ctx.stop_reason,
                StopReason::FertilizerLimit | StopReason::PassBudgetExhausted
            ) {
                reasons.push(ReasonTag::SelectionLimit);
            }
            if !supplying.is_empty() {
                reasons.push(ReasonTag::PartialFill);
            }
        }
        Direction::Excess => {
            if target > 0.0 && ctx.baseline.get(nutrient) >= target {
                reasons.push(ReasonTag::ExcessFromWater);
            }
            if supplying.iter().any(|(item, _)| item.dosage_clamp == DosageClamp::Min) {
                reasons.push(ReasonTag::DosageCapped);
            }
            if !supplying.is_empty() {
                reasons.push(ReasonTag::Overshoot);
            }
        }
        Direction::OnTarget => {}
    }

    let message = diagnostic_message(nutrient, target, achieved, deviation, direction, &names);

    NutrientDiagnostic {
        nutrient,
        target,
        achieved,
        deviation_percent: deviation,
        direction,
        severity,
        has_discrepancy,
        message,
        reasons,
        suppliers: names,
    }
}

fn diagnostic_message(
    nutrient: Nutrient,
    target: f64,
    achieved: f64,
    deviation: f64,
    direction: Direction,
    suppliers: &[String],
) -> String {
    let supplied_by = if suppliers.is_empty() {
        format!("no selected fertilizer supplies {}", nutrient.display_name().to_lowercase())
    } else {
        format!("supplied by {}", suppliers.join(", "))
    };

    match direction {
        Direction::OnTarget => format!(
            "{}: {:.1} mg/L against a target of {:.1} ({:+.1}%), within tolerance; {}",
            nutrient, achieved, target, deviation, supplied_by
        ),
        Direction::Deficit => format!(
            "{} deficit of {:.1}% ({:.1} of {:.1} mg/L); {}",
            nutrient,
            deviation.abs(),
            achieved,
            target,
            supplied_by
        ),
        Direction::Excess => format!(
            "{} excess of {:.1}% ({:.1} against {:.1} mg/L); {}",
            nutrient, deviation, achieved, target, supplied_by
        ),
    }
}

/// Diagnose every target nutrient
pub fn analyze(
    targets: &NutrientTargetSet,
    achieved: &AchievedState,
    ctx: &DiagnosticContext<'_>,
    config: &EngineConfig,
) -> BTreeMap<Nutrient, NutrientDiagnostic> {
    targets
        .concentrations
        .iter()
        .map(|(&nutrient, &target)| {
            (
                nutrient,
                diagnose_nutrient(nutrient, target, achieved.get(nutrient), ctx, config),
            )
        })
        .collect()
}
