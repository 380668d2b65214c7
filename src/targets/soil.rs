//! Soil adjustment of fertigation targets
//!
//! Adjusted target = max(0, target - soil supply × availability), where
//! availability is the pH band factor scaled by a texture modifier, and the
//! soil supply is the rooting-layer test level re-expressed per liter of the
//! effective weekly irrigation volume.

use crate::data::{SoilAnalysis, TextureClass};
use crate::nutrients::{Nutrient, NutrientMap, NutrientTargetSet};
use crate::FormulationError;
use serde::{Deserialize, Serialize};

/// cm of soil a standard soil test represents
pub const REFERENCE_DEPTH_CM: f64 = 30.0;
/// L of effective weekly irrigation the soil level is referenced to
pub const REFERENCE_VOLUME_L: f64 = 1000.0;
/// P availability below which the fixation buffer applies
pub const P_FIXATION_THRESHOLD: f64 = 0.30;
pub const P_FIXATION_BUFFER: f64 = 1.5;
/// Availability used when the pH table has no entry (Mo)
pub const DEFAULT_AVAILABILITY: f64 = 0.5;

/// Irrigation parameters plus the soil snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SoilAdjustmentInput {
    pub soil_analysis: Option<SoilAnalysis>,
    /// L per irrigation event
    pub irrigation_volume: f64,
    pub irrigations_per_week: f64,
    /// 0-1
    pub leaching_fraction: f64,
    /// 0-1
    pub application_efficiency: f64,
    pub rooting_depth_cm: f64,
}

impl Default for SoilAdjustmentInput {
    fn default() -> Self {
        Self {
            soil_analysis: None,
            irrigation_volume: 1000.0,
            irrigations_per_week: 3.0,
            leaching_fraction: 0.15,
            application_efficiency: 0.9,
            rooting_depth_cm: REFERENCE_DEPTH_CM,
        }
    }
}

impl SoilAdjustmentInput {
    /// Weekly irrigation volume that actually stays in the root zone
    pub fn effective_volume(&self) -> f64 {
        self.irrigation_volume
            * self.irrigations_per_week
            * self.application_efficiency
            * (1.0 - self.leaching_fraction)
    }

    fn validate(&self) -> Result<(), FormulationError> {
        let bad = |msg: String| Err(FormulationError::InvalidInput(msg));

        if let Some(soil) = &self.soil_analysis {
            if !(soil.ph.is_finite() && (0.0..=14.0).contains(&soil.ph)) {
                return bad(format!("soil pH must be within 0-14, got {}", soil.ph));
            }
        }

        if !(0.0..1.0).contains(&self.leaching_fraction) {
            return bad(format!("leaching fraction must be in [0, 1), got {}", self.leaching_fraction));
        }
        if !(self.application_efficiency > 0.0 && self.application_efficiency <= 1.0) {
            return bad(format!(
                "application efficiency must be in (0, 1], got {}",
                self.application_efficiency
            ));
        }
        if !(self.rooting_depth_cm > 0.0 && self.rooting_depth_cm.is_finite()) {
            return bad(format!("rooting depth must be positive, got {}", self.rooting_depth_cm));
        }
        let effective = self.effective_volume();
        if !(effective > 0.0 && effective.is_finite()) {
            return bad(format!("effective irrigation volume must be positive, got {}", effective));
        }
        Ok(())
    }
}

// ============================================================================
// Availability
// ============================================================================

/// Plant-available fraction by soil pH band (< 5.5, 5.5-7.0, 7.0-8.0, > 8.0)
pub fn ph_availability(ph: f64) -> NutrientMap {
    use Nutrient::*;

    // N, P, K, Ca, Mg, S, Fe, Mn, Zn, Cu, B
    let row: [f64; 11] = if ph < 5.5 {
        [0.60, 0.15, 0.70, 0.60, 0.50, 0.60, 0.90, 0.85, 0.75, 0.70, 0.50]
    } else if ph <= 7.0 {
        [0.75, 0.40, 0.85, 0.90, 0.75, 0.80, 0.60, 0.60, 0.60, 0.60, 0.70]
    } else if ph <= 8.0 {
        [0.60, 0.25, 0.75, 0.85, 0.70, 0.70, 0.25, 0.20, 0.25, 0.35, 0.60]
    } else {
        [0.50, 0.10, 0.75, 0.85, 0.70, 0.60, 0.05, 0.10, 0.15, 0.25, 0.50]
    };

    [N, P, K, Ca, Mg, S, Fe, Mn, Zn, Cu, B]
        .into_iter()
        .zip(row)
        .chain(std::iter::once((Mo, DEFAULT_AVAILABILITY)))
        .collect()
}

/// Coarse soils leach more, heavy clays hold more in unavailable forms
pub fn texture_modifier(texture: TextureClass) -> f64 {
    match texture {
        TextureClass::Sand => 0.85,
        TextureClass::LoamySand => 0.90,
        TextureClass::SandyLoam => 0.95,
        TextureClass::Loam | TextureClass::SiltLoam => 1.0,
        TextureClass::Silt => 0.95,
        TextureClass::ClayLoam | TextureClass::SandyClayLoam => 0.95,
        TextureClass::SiltyClayLoam | TextureClass::SandyClay => 0.90,
        TextureClass::SiltyClay => 0.85,
        TextureClass::Clay => 0.80,
    }
}

/// Combined availability factor per nutrient, clamped to [0, 1]
pub fn availability_factors(soil: &SoilAnalysis) -> NutrientMap {
    let modifier = texture_modifier(soil.texture_class);
    ph_availability(soil.ph)
        .into_iter()
        .map(|(n, f)| (n, (f * modifier).clamp(0.0, 1.0)))
        .collect()
}

/// Soil test level re-expressed as mg/L of effective irrigation water
pub fn soil_supply(level_ppm: f64, rooting_depth_cm: f64, effective_volume: f64) -> f64 {
    if level_ppm <= 0.0 || effective_volume <= 0.0 {
        return 0.0;
    }
    level_ppm * (rooting_depth_cm / REFERENCE_DEPTH_CM) * REFERENCE_VOLUME_L / effective_volume
}

// ============================================================================
// Report types
// ============================================================================

/// How one nutrient's target moved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NutrientAdjustment {
    pub nutrient: Nutrient,
    pub original_target: f64,
    pub soil_supply: f64,
    pub availability: f64,
    /// soil_supply × availability
    pub soil_contribution: f64,
    pub adjusted_target: f64,
    pub fixation_buffer_applied: bool,
    pub reasoning: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferingStrength {
    Low,
    Medium,
    High,
}

/// Cation exchange buffering and expected retention (%)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoilBuffering {
    pub cation_exchange_capacity: f64,
    pub strength: BufferingStrength,
    pub retention_percent: NutrientMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSchedule {
    pub volume_per_application: f64,
    pub applications_per_week: f64,
    /// mg/L, raised by the leaching fraction
    pub concentration_in_solution: NutrientMap,
    pub kg_per_week: NutrientMap,
}

/// Native supply estimate for one soil-tested nutrient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoilNutrientSupply {
    pub nutrient: Nutrient,
    /// ppm
    pub soil_test_value: f64,
    /// soil_test_value × availability
    pub available_amount: f64,
    /// Whole weeks the available pool covers at typical weekly demand
    pub supply_weeks: u32,
    pub needs_fertigation: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoilAdjustmentReport {
    pub availability: NutrientMap,
    pub effective_volume: f64,
    pub adjustments: Vec<NutrientAdjustment>,
    pub supplies: Vec<SoilNutrientSupply>,
    pub buffering: SoilBuffering,
    pub schedule: ApplicationSchedule,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
}

// ============================================================================
// Calculation
// ============================================================================

/// Discount native soil supply from `targets`
///
/// The returned set has exactly the input's nutrient keys, pH and EC.
pub fn adjust_targets(
    targets: &NutrientTargetSet,
    input: &SoilAdjustmentInput,
) -> Result<(NutrientTargetSet, SoilAdjustmentReport), FormulationError> {
    let soil = input
        .soil_analysis
        .as_ref()
        .ok_or(FormulationError::MissingSoilAnalysis)?;
    input.validate()?;

    let availability = availability_factors(soil);
    let effective_volume = input.effective_volume();

    let adjustments: Vec<NutrientAdjustment> = targets
        .concentrations
        .iter()
        .map(|(&nutrient, &target)| {
            let level = soil.nutrient_levels.get(&nutrient).copied().unwrap_or(0.0);
            let supply = soil_supply(level, input.rooting_depth_cm, effective_volume);
            let factor = availability.get(&nutrient).copied().unwrap_or(DEFAULT_AVAILABILITY);
            adjust_one(nutrient, target, supply, factor)
        })
        .collect();

    let concentrations: NutrientMap = adjustments
        .iter()
        .map(|a| (a.nutrient, a.adjusted_target))
        .collect();
    let adjusted = NutrientTargetSet::new(concentrations, targets.ph, targets.ec);

    let supplies = soil_nutrient_supplies(soil, &availability);
    let buffering = soil_buffering(soil);
    let (warnings, recommendations) = soil_advisories(soil, input, &adjustments, &buffering);
    let schedule = application_schedule(&adjusted, input);

    tracing::debug!(
        "Soil adjustment: pH {:.1}, {:?}, effective volume {:.0} L/week",
        soil.ph,
        soil.texture_class,
        effective_volume
    );

    Ok((
        adjusted,
        SoilAdjustmentReport {
            availability,
            effective_volume,
            adjustments,
            supplies,
            buffering,
            schedule,
            warnings,
            recommendations,
        },
    ))
}

fn adjust_one(nutrient: Nutrient, target: f64, supply: f64, availability: f64) -> NutrientAdjustment {
    let contribution = supply * availability;
    let mut adjusted = (target - contribution).max(0.0);

    let buffer = nutrient == Nutrient::P && availability < P_FIXATION_THRESHOLD && supply > 0.0;
    if buffer {
        adjusted *= P_FIXATION_BUFFER;
    }

    let reasoning = if target <= 0.0 {
        "No target for this nutrient".to_string()
    } else if contribution > target * 0.5 {
        format!(
            "Soil supplies {:.1} ppm ({:.0}% of target)",
            contribution,
            contribution / target * 100.0
        )
    } else if contribution > target * 0.2 {
        format!("Soil partially supplies the target ({:.1} ppm)", contribution)
    } else {
        format!("Low soil supply ({:.1} ppm), fertigation required", contribution)
    };

    NutrientAdjustment {
        nutrient,
        original_target: target,
        soil_supply: supply,
        availability,
        soil_contribution: contribution,
        adjusted_target: adjusted,
        fixation_buffer_applied: buffer,
        reasoning,
    }
}

/// Typical weekly demand (mg/L) and the available level below which the
/// soil alone cannot carry the crop
const SUPPLY_REFERENCE: [(Nutrient, f64, f64); 6] = [
    (Nutrient::N, 150.0, 50.0),
    (Nutrient::P, 40.0, 10.0),
    (Nutrient::K, 200.0, 80.0),
    (Nutrient::Ca, 180.0, 100.0),
    (Nutrient::Mg, 50.0, 20.0),
    (Nutrient::S, 80.0, 15.0),
];

/// Supply duration and fertigation need for each soil-tested macro nutrient
pub fn soil_nutrient_supplies(soil: &SoilAnalysis, availability: &NutrientMap) -> Vec<SoilNutrientSupply> {
    SUPPLY_REFERENCE
        .iter()
        .filter_map(|&(nutrient, weekly_demand, threshold)| {
            let level = soil.nutrient_levels.get(&nutrient).copied().unwrap_or(0.0);
            if level <= 0.0 {
                return None;
            }
            let factor = availability.get(&nutrient).copied().unwrap_or(DEFAULT_AVAILABILITY);
            let available = level * factor;
            Some(SoilNutrientSupply {
                nutrient,
                soil_test_value: level,
                available_amount: available,
                supply_weeks: (available / weekly_demand).floor() as u32,
                needs_fertigation: available < threshold,
            })
        })
        .collect()
}

/// Buffering class from CEC (meq/100g); 10 assumed when not measured
pub fn soil_buffering(soil: &SoilAnalysis) -> SoilBuffering {
    let cec = soil.cation_exchange_capacity.unwrap_or(10.0);
    let (strength, retention) = if cec < 10.0 {
        (BufferingStrength::Low, [10.0, 20.0, 15.0, 20.0, 15.0])
    } else if cec < 20.0 {
        (BufferingStrength::Medium, [15.0, 40.0, 25.0, 30.0, 25.0])
    } else {
        (BufferingStrength::High, [20.0, 60.0, 35.0, 40.0, 35.0])
    };

    SoilBuffering {
        cation_exchange_capacity: cec,
        strength,
        retention_percent: [Nutrient::N, Nutrient::P, Nutrient::K, Nutrient::Ca, Nutrient::Mg]
            .into_iter()
            .zip(retention)
            .collect(),
    }
}

fn soil_advisories(
    soil: &SoilAnalysis,
    input: &SoilAdjustmentInput,
    adjustments: &[NutrientAdjustment],
    buffering: &SoilBuffering,
) -> (Vec<String>, Vec<String>) {
    let mut warnings = Vec::new();
    let mut recommendations = Vec::new();

    if soil.ph < 5.5 {
        warnings.push("Acidic soil pH (< 5.5): phosphorus availability strongly reduced".to_string());
        recommendations.push("Consider liming to raise pH to 6.0-6.5".to_string());
    } else if soil.ph > 8.0 {
        warnings.push("Alkaline soil pH (> 8.0): risk of Fe, Mn and Zn deficiency".to_string());
        recommendations.push("Apply Fe and Zn chelates; consider elemental sulfur to lower pH".to_string());
    }

    if soil.electrical_conductivity.unwrap_or(0.0) > 2.0 {
        warnings.push("High soil EC (> 2.0 dS/m): excess salinity".to_string());
        recommendations.push("Raise the leaching fraction to 25-30% to flush salts".to_string());
    }

    for adjustment in adjustments.iter().filter(|a| a.availability < 0.30) {
        warnings.push(format!(
            "{}: very low availability ({:.0}%)",
            adjustment.nutrient,
            adjustment.availability * 100.0
        ));
        recommendations.push(format!(
            "Increase {} dosing by 50% to offset low availability",
            adjustment.nutrient
        ));
    }

    match buffering.strength {
        BufferingStrength::High => recommendations
            .push("High CEC: apply frequent low doses to limit fixation".to_string()),
        BufferingStrength::Low => recommendations
            .push("Low CEC: fertigate more often, the soil retains little".to_string()),
        BufferingStrength::Medium => {}
    }

    if input.leaching_fraction < 0.15 {
        warnings.push("Low leaching fraction (< 15%): risk of salt build-up".to_string());
        recommendations.push("Raise the leaching fraction to 15-25%".to_string());
    }

    (warnings, recommendations)
}

/// Weekly dosing plan for the adjusted targets
pub fn application_schedule(targets: &NutrientTargetSet, input: &SoilAdjustmentInput) -> ApplicationSchedule {
    let concentration_in_solution: NutrientMap = targets
        .concentrations
        .iter()
        .map(|(n, t)| (*n, t * (1.0 + input.leaching_fraction)))
        .collect();

    // mg/L × L → kg
    let kg_per_week = concentration_in_solution
        .iter()
        .map(|(n, c)| (*n, c * input.irrigation_volume * input.irrigations_per_week / 1_000_000.0))
        .collect();

    ApplicationSchedule {
        volume_per_application: input.irrigation_volume,
        applications_per_week: input.irrigations_per_week,
        concentration_in_solution,
        kg_per_week,
    }
}

// ============================================================================
// Soil vs hydroponic comparison
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonReason {
    SimilarToHydroponic,
    ReducedBySoilSupply,
    IncreasedForFixation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetComparison {
    pub nutrient: Nutrient,
    pub hydroponic: f64,
    pub soil: f64,
    pub difference: f64,
    pub percent_difference: f64,
    pub reason: ComparisonReason,
}

/// Row per hydroponic target nutrient; within ±10% counts as similar
pub fn compare_with_hydroponic(soil: &NutrientTargetSet, hydroponic: &NutrientTargetSet) -> Vec<TargetComparison> {
    hydroponic
        .concentrations
        .iter()
        .map(|(&nutrient, &hydro)| {
            let soil_amount = soil.target(nutrient);
            let difference = soil_amount - hydro;
            let percent_difference = if hydro > 0.0 { difference / hydro * 100.0 } else { 0.0 };

            let reason = if percent_difference.abs() < 10.0 {
                ComparisonReason::SimilarToHydroponic
            } else if percent_difference < 0.0 {
                ComparisonReason::ReducedBySoilSupply
            } else {
                ComparisonReason::IncreasedForFixation
            };

            TargetComparison {
                nutrient,
                hydroponic: hydro,
                soil: soil_amount,
                difference,
                percent_difference,
                reason,
            }
        })
        .collect()
}
