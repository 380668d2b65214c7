//! Realistic concentration limits on targets
//!
//! A target above its nutrient's maximum is lowered to that maximum. A
//! positive target below the minimum is kept as requested and only reported.
//! Zero targets and nutrients without a configured range pass through.

use crate::config::TargetRange;
use crate::nutrients::{Nutrient, NutrientTargetSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapKind {
    CappedAtMaximum,
    BelowMinimum,
}

/// One target that fell outside its realistic range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetCapFinding {
    pub nutrient: Nutrient,
    /// mg/L as resolved
    pub requested: f64,
    /// mg/L used for formulation
    pub applied: f64,
    /// The bound that was crossed
    pub limit: f64,
    pub kind: CapKind,
    pub note: String,
}

impl TargetCapFinding {
    pub fn warning(&self) -> String {
        match self.kind {
            CapKind::CappedAtMaximum => format!(
                "{} target of {:.2} mg/L exceeds the maximum safe limit of {} mg/L and was capped: {}",
                self.nutrient, self.requested, self.limit, self.note
            ),
            CapKind::BelowMinimum => format!(
                "{} target of {:.2} mg/L is below the minimum effective level of {} mg/L: {}",
                self.nutrient, self.requested, self.limit, self.note
            ),
        }
    }
}

fn excess_note(nutrient: Nutrient) -> &'static str {
    match nutrient {
        Nutrient::N => "high nitrogen raises EC sharply and risks burn",
        Nutrient::P => "excess phosphorus blocks zinc and iron uptake",
        Nutrient::K => "this level only suits heavy fruiting",
        Nutrient::Ca => "excess calcium competes with potassium and magnesium",
        Nutrient::Mg => "excess magnesium competes with calcium uptake",
        Nutrient::S => "sulfur at this level is excessive",
        Nutrient::Fe | Nutrient::Mn | Nutrient::Zn | Nutrient::B | Nutrient::Mo => {
            "micronutrient toxicity is likely"
        }
        Nutrient::Cu => "copper is very toxic at this level",
    }
}

/// Apply `caps` to every target, returning the capped set and the findings
pub fn apply_target_caps(
    targets: &NutrientTargetSet,
    caps: &BTreeMap<Nutrient, TargetRange>,
) -> (NutrientTargetSet, Vec<TargetCapFinding>) {
    let mut capped = targets.clone();
    let mut findings = Vec::new();

    for (&nutrient, &requested) in &targets.concentrations {
        let Some(range) = caps.get(&nutrient) else {
            continue;
        };
        if requested > range.max {
            capped.concentrations.insert(nutrient, range.max);
            findings.push(TargetCapFinding {
                nutrient,
                requested,
                applied: range.max,
                limit: range.max,
                kind: CapKind::CappedAtMaximum,
                note: excess_note(nutrient).to_string(),
            });
        } else if requested > 0.0 && requested < range.min {
            findings.push(TargetCapFinding {
                nutrient,
                requested,
                applied: requested,
                limit: range.min,
                kind: CapKind::BelowMinimum,
                note: format!("consider at least {} mg/L", range.min),
            });
        }
    }

    for finding in &findings {
        tracing::warn!("{}", finding.warning());
    }
    (capped, findings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn targets(pairs: &[(Nutrient, f64)]) -> NutrientTargetSet {
        NutrientTargetSet::new(pairs.iter().copied().collect(), 6.0, 1.8)
    }

    #[test]
    fn test_excess_target_capped_at_maximum() {
        let caps = EngineConfig::default().target_caps;
        let (capped, findings) = apply_target_caps(&targets(&[(Nutrient::N, 420.0), (Nutrient::K, 250.0)]), &caps);

        assert_eq!(capped.target(Nutrient::N), 300.0);
        assert_eq!(capped.target(Nutrient::K), 250.0);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, CapKind::CappedAtMaximum);
        assert_eq!(findings[0].requested, 420.0);
        assert!(findings[0].warning().contains("maximum safe limit of 300 mg/L"));
    }

    #[test]
    fn test_low_target_warns_without_substitution() {
        let caps = EngineConfig::default().target_caps;
        let (capped, findings) =
            apply_target_caps(&targets(&[(Nutrient::Ca, 40.0), (Nutrient::Mg, 0.0)]), &caps);

        // Kept as requested, never raised to a default
        assert_eq!(capped.target(Nutrient::Ca), 40.0);
        assert_eq!(capped.target(Nutrient::Mg), 0.0);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, CapKind::BelowMinimum);
        assert_eq!(findings[0].applied, 40.0);
        assert_eq!(findings[0].limit, 80.0);
        assert!(findings[0].warning().contains("below the minimum effective level"));
    }

    #[test]
    fn test_uncapped_nutrient_passes_through() {
        let mut caps = EngineConfig::default().target_caps;
        caps.remove(&Nutrient::P);
        let input = targets(&[(Nutrient::P, 500.0)]);
        let (capped, findings) = apply_target_caps(&input, &caps);
        assert_eq!(capped, input);
        assert!(findings.is_empty());
    }
}
