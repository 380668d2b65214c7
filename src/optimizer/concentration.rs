//! Dosage for one candidate against the remaining gaps
//!
//! Per nutrient the gap-closing dose is `gap × V / (pct × 10)` grams for the
//! batch, i.e. `gap / (pct × 10)` g/L. The smallest of these (no nutrient
//! overshoots) is damped and clamped to the configured dosage bounds.

use crate::config::EngineConfig;
use crate::nutrients::{Nutrient, NutrientComposition, NutrientMap};
use serde::{Deserialize, Serialize};

/// Which bound, if any, the dosage was clamped to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DosageClamp {
    None,
    Min,
    Max,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DosageCalculation {
    /// Nutrient whose gap set the minimum
    pub limiting_nutrient: Nutrient,
    /// g/L before damping
    pub undamped: f64,
    /// g/L after damping and clamping
    pub dosage: f64,
    pub clamp: DosageClamp,
}

/// g/L of fertilizer that closes `gap` mg/L of a nutrient present at `percent`
pub fn gap_closing_dosage(gap: f64, percent: f64) -> f64 {
    gap / (percent * 10.0)
}

/// Compute the damped, clamped dosage
///
/// `None` when no nutrient is both open in `gaps` and supplied by the
/// composition.
pub fn calculate_dosage(
    composition: &NutrientComposition,
    gaps: &NutrientMap,
    config: &EngineConfig,
) -> Option<DosageCalculation> {
    let (limiting_nutrient, undamped) = composition
        .iter()
        .filter_map(|(n, pct)| {
            let gap = gaps.get(&n).copied().unwrap_or(0.0);
            (gap > 0.0).then(|| (n, gap_closing_dosage(gap, pct)))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))?;

    let damped = undamped * config.damping_factor;
    let (dosage, clamp) = if damped < config.min_dosage {
        (config.min_dosage, DosageClamp::Min)
    } else if damped > config.max_dosage {
        (config.max_dosage, DosageClamp::Max)
    } else {
        (damped, DosageClamp::None)
    };

    Some(DosageCalculation {
        limiting_nutrient,
        undamped,
        dosage,
        clamp,
    })
}
