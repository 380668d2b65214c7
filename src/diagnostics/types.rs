use crate::config::SeverityThresholds;
use crate::nutrients::Nutrient;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// Severity of a nutrient's deviation from target
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    None,
    Low,
    Medium,
    High,
}

impl Severity {
    /// Derive severity from a deviation percentage (sign ignored)
    pub fn from_deviation(deviation_percent: f64, thresholds: &SeverityThresholds) -> Self {
        match deviation_percent.abs() {
            d if d <= thresholds.none => Severity::None,
            d if d <= thresholds.low => Severity::Low,
            d if d <= thresholds.medium => Severity::Medium,
            _ => Severity::High,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Severity::None => "excellent",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

/// Direction of a deviation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Deficit,
    OnTarget,
    Excess,
}

/// Contributing cause of a discrepancy
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonTag {
    /// No selected fertilizer carries the nutrient
    NoSupplier,
    /// Irrigation water alone meets or exceeds the target
    ExcessFromWater,
    /// A supplier's dosage was clamped to a dosage bound
    DosageCapped,
    /// The run stopped on the fertilizer cap or pass budget
    SelectionLimit,
    /// Fertilizers dosed for other nutrients pushed this one over
    Overshoot,
    /// Suppliers were dosed but the damped doses left a gap
    PartialFill,
}

impl ReasonTag {
    pub fn as_str(self) -> &'static str {
        match self {
            ReasonTag::NoSupplier => "no_supplier",
            ReasonTag::ExcessFromWater => "excess_from_water",
            ReasonTag::DosageCapped => "dosage_capped",
            ReasonTag::SelectionLimit => "selection_limit",
            ReasonTag::Overshoot => "overshoot",
            ReasonTag::PartialFill => "partial_fill",
        }
    }
}

impl fmt::Display for ReasonTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Diagnostic for one target nutrient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NutrientDiagnostic {
    pub nutrient: Nutrient,
    pub target: f64,
    pub achieved: f64,
    pub deviation_percent: f64,
    pub direction: Direction,
    pub severity: Severity,
    pub has_discrepancy: bool,
    pub message: String,
    pub reasons: Vec<ReasonTag>,
    /// Supplying fertilizer names, largest contribution first
    pub suppliers: SmallVec<[String; 4]>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_bands() {
        let t = SeverityThresholds::default();
        assert_eq!(Severity::from_deviation(0.9, &t), Severity::None);
        assert_eq!(Severity::from_deviation(-5.0, &t), Severity::None);
        assert_eq!(Severity::from_deviation(-12.0, &t), Severity::Low);
        assert_eq!(Severity::from_deviation(30.0, &t), Severity::Medium);
        assert_eq!(Severity::from_deviation(50.0, &t), Severity::High);
    }

    #[test]
    fn test_reason_tag_serializes_snake_case() {
        let json = serde_json::to_string(&ReasonTag::ExcessFromWater).unwrap();
        assert_eq!(json, "\"excess_from_water\"");
        assert_eq!(ReasonTag::PartialFill.to_string(), "partial_fill");
    }
}
