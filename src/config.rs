//! Engine configuration
//!
//! All numeric knobs of the formulation heuristic live here, with one fixed
//! default set. A JSON file can override any subset of fields.

use crate::nutrients::Nutrient;
use crate::FormulationError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Scoring weight for one nutrient
///
/// A fertilizer carrying `reference_percent` of the nutrient (or more) earns
/// the full `weight`; below that the points scale linearly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeight {
    pub weight: f64,
    pub reference_percent: f64,
}

impl ScoreWeight {
    const fn new(weight: f64, reference_percent: f64) -> Self {
        Self { weight, reference_percent }
    }
}

/// Realistic mg/L range for a target concentration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetRange {
    pub min: f64,
    pub max: f64,
}

impl TargetRange {
    const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

/// Severity cut-offs on |deviation %|
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeverityThresholds {
    pub none: f64,
    pub low: f64,
    pub medium: f64,
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self { none: 5.0, low: 15.0, medium: 30.0 }
    }
}

/// Tunable constants of the formulation engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Fraction of the gap-closing dosage actually applied
    pub damping_factor: f64,
    /// g/L
    pub min_dosage: f64,
    /// g/L
    pub max_dosage: f64,
    /// Dosage must not exceed this fraction of a fertilizer's max solubility
    pub solubility_safety_factor: f64,
    /// Used when a catalog record carries no solubility (g/L)
    pub default_max_solubility: f64,
    /// A primary nutrient counts as closed at achieved/target >= this ratio
    pub sufficiency_ratio: f64,
    pub max_fertilizers: usize,
    /// Every selecting pass, accepted or discarded, consumes one
    pub max_selection_passes: usize,
    /// Price per kg at which the cost-efficiency bonus reaches zero
    pub cost_ceiling: f64,
    pub score_weights: BTreeMap<Nutrient, ScoreWeight>,
    /// Minimum share (%) for a nutrient to count toward a balanced fertilizer
    pub balanced_min_percent: f64,
    pub balanced_min_nutrients: usize,
    pub severity: SeverityThresholds,
    /// Achieved/target below this ratio raises a deficit warning
    pub deficit_warning_ratio: f64,
    /// Achieved/target above this ratio raises an excess warning
    pub excess_warning_ratio: f64,
    /// g/L
    pub low_dosage_warning: f64,
    /// dS/m above target EC before a warning is raised
    pub ec_tolerance: f64,
    /// Targets above `max` are lowered to it; positive targets below `min` only warn
    pub target_caps: BTreeMap<Nutrient, TargetRange>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            damping_factor: 0.8,
            min_dosage: 0.1,
            max_dosage: 8.0,
            solubility_safety_factor: 0.8,
            default_max_solubility: 500.0,
            sufficiency_ratio: 0.9,
            max_fertilizers: 4,
            max_selection_passes: 12,
            cost_ceiling: 20.0,
            score_weights: default_score_weights(),
            balanced_min_percent: 5.0,
            balanced_min_nutrients: 2,
            severity: SeverityThresholds::default(),
            deficit_warning_ratio: 0.8,
            excess_warning_ratio: 1.2,
            low_dosage_warning: 0.5,
            ec_tolerance: 0.5,
            target_caps: default_target_caps(),
        }
    }
}

fn default_score_weights() -> BTreeMap<Nutrient, ScoreWeight> {
    Nutrient::ALL
        .iter()
        .map(|n| {
            let weight = match n {
                Nutrient::N => ScoreWeight::new(40.0, 50.0),
                Nutrient::P => ScoreWeight::new(30.0, 20.0),
                Nutrient::K => ScoreWeight::new(30.0, 50.0),
                Nutrient::Ca => ScoreWeight::new(5.0, 20.0),
                Nutrient::Mg => ScoreWeight::new(5.0, 10.0),
                Nutrient::S => ScoreWeight::new(5.0, 15.0),
                _ => ScoreWeight::new(2.0, 10.0),
            };
            (*n, weight)
        })
        .collect()
}

fn default_target_caps() -> BTreeMap<Nutrient, TargetRange> {
    [
        (Nutrient::N, TargetRange::new(50.0, 300.0)),
        (Nutrient::P, TargetRange::new(15.0, 70.0)),
        (Nutrient::K, TargetRange::new(100.0, 300.0)),
        (Nutrient::Ca, TargetRange::new(80.0, 220.0)),
        (Nutrient::Mg, TargetRange::new(15.0, 80.0)),
        (Nutrient::S, TargetRange::new(20.0, 150.0)),
        (Nutrient::Fe, TargetRange::new(0.5, 4.0)),
        (Nutrient::Mn, TargetRange::new(0.1, 1.5)),
        (Nutrient::Zn, TargetRange::new(0.05, 0.8)),
        (Nutrient::Cu, TargetRange::new(0.02, 0.2)),
        (Nutrient::B, TargetRange::new(0.1, 1.0)),
        (Nutrient::Mo, TargetRange::new(0.005, 0.15)),
    ]
    .into_iter()
    .collect()
}

impl EngineConfig {
    /// Load overrides from a JSON file; missing fields keep their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read engine config: {:?}", path))?;

        let config: EngineConfig = serde_json::from_str(&contents)
            .with_context(|| "Failed to parse engine config JSON")?;

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the selection loop cannot honour
    pub fn validate(&self) -> Result<(), FormulationError> {
        let bad = |msg: &str| Err(FormulationError::InvalidInput(msg.to_string()));

        if !(self.damping_factor > 0.0 && self.damping_factor <= 1.0) {
            return bad("damping_factor must be in (0, 1]");
        }
        if !(self.min_dosage > 0.0 && self.min_dosage <= self.max_dosage) {
            return bad("dosage bounds must satisfy 0 < min_dosage <= max_dosage");
        }
        if !(self.solubility_safety_factor > 0.0 && self.solubility_safety_factor <= 1.0) {
            return bad("solubility_safety_factor must be in (0, 1]");
        }
        if self.default_max_solubility <= 0.0 {
            return bad("default_max_solubility must be positive");
        }
        if !(self.sufficiency_ratio > 0.0 && self.sufficiency_ratio <= 1.0) {
            return bad("sufficiency_ratio must be in (0, 1]");
        }
        if self.max_fertilizers == 0 || self.max_selection_passes < self.max_fertilizers {
            return bad("max_selection_passes must be at least max_fertilizers (> 0)");
        }
        if self.score_weights.values().any(|w| w.weight < 0.0 || w.reference_percent <= 0.0) {
            return bad("score weights must be non-negative with positive reference percentages");
        }
        let s = &self.severity;
        if !(0.0 <= s.none && s.none <= s.low && s.low <= s.medium) {
            return bad("severity thresholds must be ordered none <= low <= medium");
        }
        if self.target_caps.values().any(|r| !(0.0 <= r.min && r.min <= r.max)) {
            return bad("target caps must satisfy 0 <= min <= max");
        }
        Ok(())
    }

    pub fn weight_for(&self, nutrient: Nutrient) -> Option<ScoreWeight> {
        self.score_weights.get(&nutrient).copied()
    }
}
