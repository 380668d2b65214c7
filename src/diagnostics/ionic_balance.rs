//! Cation/anion balance of the final solution
//!
//! Elemental mg/L are converted to meq/L with the equivalent weight of the
//! ion each nutrient is delivered as. N is counted as NO3-, P as H2PO4-,
//! S as SO4(2-).

use crate::nutrients::{AchievedState, Nutrient};
use serde::{Deserialize, Serialize};

/// mg per meq, elemental basis
pub fn equivalent_weight(nutrient: Nutrient) -> Option<f64> {
    match nutrient {
        Nutrient::Ca => Some(20.04),
        Nutrient::K => Some(39.10),
        Nutrient::Mg => Some(12.15),
        Nutrient::Fe => Some(27.92),
        Nutrient::Mn => Some(27.47),
        Nutrient::Zn => Some(32.69),
        Nutrient::Cu => Some(31.77),
        Nutrient::N => Some(14.01),
        Nutrient::P => Some(30.97),
        Nutrient::S => Some(16.03),
        Nutrient::B | Nutrient::Mo => None,
    }
}

pub fn is_cation(nutrient: Nutrient) -> bool {
    matches!(
        nutrient,
        Nutrient::Ca | Nutrient::K | Nutrient::Mg | Nutrient::Fe | Nutrient::Mn | Nutrient::Zn | Nutrient::Cu
    )
}

pub fn is_anion(nutrient: Nutrient) -> bool {
    matches!(nutrient, Nutrient::N | Nutrient::P | Nutrient::S)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceStatus {
    Excellent,
    Good,
    Caution,
    Poor,
    Critical,
}

impl BalanceStatus {
    pub fn from_difference(difference_percent: f64) -> Self {
        match difference_percent {
            d if d <= 5.0 => BalanceStatus::Excellent,
            d if d <= 10.0 => BalanceStatus::Good,
            d if d <= 15.0 => BalanceStatus::Caution,
            d if d <= 25.0 => BalanceStatus::Poor,
            _ => BalanceStatus::Critical,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IonicBalance {
    pub cation_meq: f64,
    pub anion_meq: f64,
    /// |cations - anions| relative to their mean, in percent
    pub difference_percent: f64,
    pub status: BalanceStatus,
}

pub fn meq_per_liter(nutrient: Nutrient, mg_per_liter: f64) -> f64 {
    equivalent_weight(nutrient).map_or(0.0, |w| mg_per_liter / w)
}

pub fn ionic_balance(achieved: &AchievedState) -> IonicBalance {
    let (cation_meq, anion_meq) = achieved.concentrations.iter().fold(
        (0.0, 0.0),
        |(cations, anions), (&n, &mg)| {
            let meq = meq_per_liter(n, mg.max(0.0));
            if is_cation(n) {
                (cations + meq, anions)
            } else if is_anion(n) {
                (cations, anions + meq)
            } else {
                (cations, anions)
            }
        },
    );

    let mean = (cation_meq + anion_meq) / 2.0;
    let difference_percent = if mean > 0.0 {
        (cation_meq - anion_meq).abs() / mean * 100.0
    } else {
        0.0
    };

    IonicBalance {
        cation_meq,
        anion_meq,
        difference_percent,
        status: BalanceStatus::from_difference(difference_percent),
    }
}

/// EC (dS/m) from the cation sum, about 10 meq/L per dS/m
pub fn estimated_ec(balance: &IonicBalance) -> f64 {
    balance.cation_meq / 10.0
}


/// Verification status of one nutrient ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatioStatus {
    /// Within 10% of the optimum
    Excellent,
    Good,
    /// Outside the range by at most 20%
    Caution,
    Imbalanced,
}

impl RatioStatus {
    pub fn evaluate(actual: f64, range: &RatioRange) -> Self {
        if (actual - range.optimal).abs() / range.optimal <= 0.10 {
            RatioStatus::Excellent
        } else if (range.min..=range.max).contains(&actual) {
            RatioStatus::Good
        } else if (range.min * 0.8..=range.max * 1.2).contains(&actual) {
            RatioStatus::Caution
        } else {
            RatioStatus::Imbalanced
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatioRange {
    pub min: f64,
    pub max: f64,
    pub optimal: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RatioBasis {
    Meq,
    Mg,
}

/// (numerator, denominator, basis, range)
const RATIOS: [(Nutrient, Nutrient, RatioBasis, RatioRange); 4] = [
    (Nutrient::K, Nutrient::Ca, RatioBasis::Meq, RatioRange { min: 0.8, max: 1.5, optimal: 1.2 }),
    (Nutrient::Ca, Nutrient::Mg, RatioBasis::Meq, RatioRange { min: 3.0, max: 8.0, optimal: 4.0 }),
    (Nutrient::K, Nutrient::Mg, RatioBasis::Meq, RatioRange { min: 2.0, max: 6.0, optimal: 3.0 }),
    (Nutrient::N, Nutrient::K, RatioBasis::Mg, RatioRange { min: 0.6, max: 1.2, optimal: 0.75 }),
];

/// One checked nutrient ratio of the final solution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IonicRatio {
    /// e.g. "K:Ca"
    pub name: String,
    pub actual: f64,
    pub min: f64,
    pub max: f64,
    pub optimal: f64,
    /// "meq/L" or "mg/L"
    pub basis: String,
    pub status: RatioStatus,
    pub recommendation: String,
}

fn ratio_recommendation(name: &str, status: RatioStatus) -> String {
    match status {
        RatioStatus::Excellent => format!("{} ratio is optimal", name),
        RatioStatus::Good => format!("{} ratio is within acceptable range", name),
        RatioStatus::Caution => format!("{} ratio is outside optimal range but manageable", name),
        RatioStatus::Imbalanced => format!("{} ratio is severely imbalanced and requires correction", name),
    }
}

/// K:Ca, Ca:Mg and K:Mg on a meq/L basis, N:K on mg/L
///
/// A ratio whose denominator is absent from the solution is skipped.
pub fn ionic_ratios(achieved: &AchievedState) -> Vec<IonicRatio> {
    RATIOS
        .iter()
        .filter_map(|&(num, den, basis, range)| {
            let value = |n: Nutrient| {
                let mg = achieved.get(n).max(0.0);
                match basis {
                    RatioBasis::Meq => meq_per_liter(n, mg),
                    RatioBasis::Mg => mg,
                }
            };
            let denominator = value(den);
            if denominator <= 0.0 {
                return None;
            }
            let actual = value(num) / denominator;
            let name = format!("{}:{}", num, den);
            let status = RatioStatus::evaluate(actual, &range);
            Some(IonicRatio {
                recommendation: ratio_recommendation(&name, status),
                name,
                actual,
                min: range.min,
                max: range.max,
                optimal: range.optimal,
                basis: match basis {
                    RatioBasis::Meq => "meq/L".to_string(),
                    RatioBasis::Mg => "mg/L".to_string(),
                },
                status,
            })
        })
        .collect()
}
