//! Nutrient vocabulary and the per-run value types
//!
//! Every nutrient-keyed map in the crate is a `BTreeMap<Nutrient, f64>` so
//! iteration order is fixed by the `Nutrient` declaration order. Two runs over
//! the same inputs therefore visit nutrients, and serialize them, identically.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Nutrient symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Nutrient {
    N,
    P,
    K,
    Ca,
    Mg,
    S,
    Fe,
    Mn,
    Zn,
    Cu,
    B,
    Mo,
}

impl Nutrient {
    pub const ALL: [Nutrient; 12] = [
        Nutrient::N,
        Nutrient::P,
        Nutrient::K,
        Nutrient::Ca,
        Nutrient::Mg,
        Nutrient::S,
        Nutrient::Fe,
        Nutrient::Mn,
        Nutrient::Zn,
        Nutrient::Cu,
        Nutrient::B,
        Nutrient::Mo,
    ];

    /// Primary macronutrients; these drive the sufficiency check.
    pub const PRIMARY: [Nutrient; 3] = [Nutrient::N, Nutrient::P, Nutrient::K];

    pub fn symbol(self) -> &'static str {
        match self {
            Nutrient::N => "N",
            Nutrient::P => "P",
            Nutrient::K => "K",
            Nutrient::Ca => "Ca",
            Nutrient::Mg => "Mg",
            Nutrient::S => "S",
            Nutrient::Fe => "Fe",
            Nutrient::Mn => "Mn",
            Nutrient::Zn => "Zn",
            Nutrient::Cu => "Cu",
            Nutrient::B => "B",
            Nutrient::Mo => "Mo",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Nutrient::N => "Nitrogen",
            Nutrient::P => "Phosphorus",
            Nutrient::K => "Potassium",
            Nutrient::Ca => "Calcium",
            Nutrient::Mg => "Magnesium",
            Nutrient::S => "Sulfur",
            Nutrient::Fe => "Iron",
            Nutrient::Mn => "Manganese",
            Nutrient::Zn => "Zinc",
            Nutrient::Cu => "Copper",
            Nutrient::B => "Boron",
            Nutrient::Mo => "Molybdenum",
        }
    }

    pub fn is_primary(self) -> bool {
        Self::PRIMARY.contains(&self)
    }

    pub fn is_micronutrient(self) -> bool {
        matches!(
            self,
            Nutrient::Fe | Nutrient::Mn | Nutrient::Zn | Nutrient::Cu | Nutrient::B | Nutrient::Mo
        )
    }
}

impl fmt::Display for Nutrient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Nutrient {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Nutrient::ALL
            .iter()
            .copied()
            .find(|n| n.symbol().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown nutrient symbol '{}'", s))
    }
}

/// Nutrient → value map with deterministic ordering
pub type NutrientMap = BTreeMap<Nutrient, f64>;

/// Percentage-by-weight composition of a fertilizer
///
/// Only strictly positive entries are stored, so `get` returning 0.0 means the
/// fertilizer does not supply that nutrient.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NutrientComposition {
    percentages: NutrientMap,
}

impl NutrientComposition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from (nutrient, percent) pairs, dropping zero entries
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (Nutrient, f64)>,
    {
        let mut composition = Self::new();
        for (nutrient, percent) in pairs {
            composition.set(nutrient, percent);
        }
        composition
    }

    pub fn set(&mut self, nutrient: Nutrient, percent: f64) {
        if percent > 0.0 && percent.is_finite() {
            self.percentages.insert(nutrient, percent);
        } else {
            self.percentages.remove(&nutrient);
        }
    }

    pub fn get(&self, nutrient: Nutrient) -> f64 {
        self.percentages.get(&nutrient).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Nutrient, f64)> + '_ {
        self.percentages.iter().map(|(n, p)| (*n, *p))
    }

    pub fn is_empty(&self) -> bool {
        self.percentages.is_empty()
    }

    pub fn has_primary(&self) -> bool {
        Nutrient::PRIMARY.iter().any(|n| self.get(*n) > 0.0)
    }

    /// Number of nutrients at or above `threshold` percent
    pub fn count_at_least(&self, threshold: f64) -> usize {
        self.percentages.values().filter(|p| **p >= threshold).count()
    }

    /// ppm of each nutrient delivered by `dosage_g_per_l` of this fertilizer
    ///
    /// 1 g/L of a fertilizer carrying 1% of a nutrient yields 10 mg/L.
    pub fn contribution_at(&self, dosage_g_per_l: f64) -> NutrientMap {
        self.percentages
            .iter()
            .map(|(n, pct)| (*n, pct * dosage_g_per_l * 10.0))
            .collect()
    }
}

/// Target concentrations for one formulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NutrientTargetSet {
    /// Nutrient → target mg/L
    pub concentrations: NutrientMap,
    pub ph: f64,
    /// dS/m
    pub ec: f64,
}

impl NutrientTargetSet {
    pub fn new(concentrations: NutrientMap, ph: f64, ec: f64) -> Self {
        Self { concentrations, ph, ec }
    }

    pub fn target(&self, nutrient: Nutrient) -> f64 {
        self.concentrations.get(&nutrient).copied().unwrap_or(0.0)
    }

    pub fn nutrients(&self) -> impl Iterator<Item = Nutrient> + '_ {
        self.concentrations.keys().copied()
    }

    /// True when at least one nutrient has a positive target
    pub fn has_demand(&self) -> bool {
        self.concentrations.values().any(|v| *v > 0.0)
    }
}

/// Accumulated concentration per target nutrient during and after selection
///
/// Keys are always a subset of the target set's keys: contributions to
/// nutrients without a target are dropped on entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievedState {
    pub concentrations: NutrientMap,
}

impl AchievedState {
    /// Start from a baseline (e.g. irrigation water), restricted to target keys
    pub fn from_baseline(targets: &NutrientTargetSet, baseline: &NutrientMap) -> Self {
        let concentrations = targets
            .nutrients()
            .map(|n| (n, baseline.get(&n).copied().unwrap_or(0.0).max(0.0)))
            .collect();
        Self { concentrations }
    }

    pub fn get(&self, nutrient: Nutrient) -> f64 {
        self.concentrations.get(&nutrient).copied().unwrap_or(0.0)
    }

    /// Fold a contribution in, returning the new state
    pub fn with_contribution(mut self, contribution: &NutrientMap) -> Self {
        for (nutrient, ppm) in contribution {
            if let Some(value) = self.concentrations.get_mut(nutrient) {
                *value += ppm;
            }
        }
        self
    }

    /// Unmet portion of each target, `max(0, target - achieved)`
    pub fn gaps(&self, targets: &NutrientTargetSet) -> NutrientMap {
        targets
            .concentrations
            .iter()
            .map(|(n, target)| (*n, (target - self.get(*n)).max(0.0)))
            .collect()
    }
}
