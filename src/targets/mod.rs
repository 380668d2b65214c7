//! Target resolution
//!
//! Hydroponic mode reads the crop-phase requirement as-is. Soil mode starts
//! from the same base targets and discounts native soil supply (see `soil`).
//! Irrigation water is never subtracted here; it seeds the achieved state.
//! Both modes cap the base targets to realistic ranges first (see `caps`).

pub mod caps;
pub mod soil;

pub use caps::{apply_target_caps, CapKind, TargetCapFinding};
pub use soil::{SoilAdjustmentInput, SoilAdjustmentReport};

use crate::config::EngineConfig;
use crate::data::{CropPhaseRequirement, WaterChemistry};
use crate::nutrients::{AchievedState, Nutrient, NutrientMap, NutrientTargetSet};
use crate::FormulationError;
use serde::{Deserialize, Serialize};

pub const DEFAULT_TARGET_PH: f64 = 6.5;
/// dS/m
pub const DEFAULT_TARGET_EC: f64 = 2.0;

/// Where the unadjusted targets come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BaseTargets {
    /// Crop-phase requirement record (ion forms)
    CropPhase(CropPhaseRequirement),
    /// Ready-made elemental targets
    Explicit(NutrientTargetSet),
}

/// Target mode for one formulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum TargetSource {
    Hydroponic { base: BaseTargets },
    Soil { base: BaseTargets, adjustment: SoilAdjustmentInput },
}

/// Final targets, plus the soil report when soil mode ran
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedTargets {
    pub targets: NutrientTargetSet,
    pub soil: Option<SoilAdjustmentReport>,
    pub caps: Vec<TargetCapFinding>,
}

/// Resolve the run's target set
pub fn resolve_targets(source: &TargetSource, config: &EngineConfig) -> Result<ResolvedTargets, FormulationError> {
    match source {
        TargetSource::Hydroponic { base } => {
            let (targets, caps) = apply_target_caps(&base_targets(base)?, &config.target_caps);
            Ok(ResolvedTargets {
                targets,
                soil: None,
                caps,
            })
        }
        TargetSource::Soil { base, adjustment } => {
            // Checked before the base so a missing analysis is never masked
            if adjustment.soil_analysis.is_none() {
                return Err(FormulationError::MissingSoilAnalysis);
            }
            let (base, caps) = apply_target_caps(&base_targets(base)?, &config.target_caps);
            let (targets, report) = soil::adjust_targets(&base, adjustment)?;
            Ok(ResolvedTargets {
                targets,
                soil: Some(report),
                caps,
            })
        }
    }
}

fn base_targets(base: &BaseTargets) -> Result<NutrientTargetSet, FormulationError> {
    match base {
        BaseTargets::CropPhase(requirement) => hydroponic_targets(requirement),
        BaseTargets::Explicit(targets) => validate_explicit(targets),
    }
}

fn non_negative(label: &str, value: Option<f64>) -> Result<f64, FormulationError> {
    match value {
        None => Ok(0.0),
        Some(v) if v.is_finite() && v >= 0.0 => Ok(v),
        Some(v) => Err(FormulationError::InvalidInput(format!(
            "requirement field {} must be non-negative, got {}",
            label, v
        ))),
    }
}

/// Elemental targets from a crop-phase requirement
///
/// N = NO3 + NH4, P = H2PO4, S = SO4; K, Ca, Mg and Fe are taken directly.
/// Absent fields count as zero, and a record with no positive field is
/// `MissingTargets`.
pub fn hydroponic_targets(requirement: &CropPhaseRequirement) -> Result<NutrientTargetSet, FormulationError> {
    let nitrogen = non_negative("no3", requirement.no3)? + non_negative("nh4", requirement.nh4)?;

    let concentrations: NutrientMap = [
        (Nutrient::N, nitrogen),
        (Nutrient::P, non_negative("h2po4", requirement.h2po4)?),
        (Nutrient::K, non_negative("k", requirement.k)?),
        (Nutrient::Ca, non_negative("ca", requirement.ca)?),
        (Nutrient::Mg, non_negative("mg", requirement.mg)?),
        (Nutrient::S, non_negative("so4", requirement.so4)?),
        (Nutrient::Fe, non_negative("fe", requirement.fe)?),
    ]
    .into_iter()
    .collect();

    let targets = NutrientTargetSet::new(
        concentrations,
        requirement.ph.unwrap_or(DEFAULT_TARGET_PH),
        requirement.ec.unwrap_or(DEFAULT_TARGET_EC),
    );

    if !targets.has_demand() {
        let phase = requirement
            .crop_phase_id
            .map(|id| format!("crop phase {}", id))
            .unwrap_or_else(|| "crop phase requirement".to_string());
        return Err(FormulationError::MissingTargets(format!("{} has no positive nutrient field", phase)));
    }

    Ok(targets)
}

fn validate_explicit(targets: &NutrientTargetSet) -> Result<NutrientTargetSet, FormulationError> {
    if let Some((n, v)) = targets.concentrations.iter().find(|(_, v)| !v.is_finite() || **v < 0.0) {
        return Err(FormulationError::InvalidInput(format!(
            "target for {} must be non-negative, got {}",
            n, v
        )));
    }
    if !targets.has_demand() {
        return Err(FormulationError::MissingTargets("explicit target set is empty".to_string()));
    }
    Ok(targets.clone())
}

/// Starting state: what the irrigation water already carries
pub fn water_baseline(targets: &NutrientTargetSet, water: Option<&WaterChemistry>) -> AchievedState {
    match water {
        Some(w) => AchievedState::from_baseline(targets, &w.concentrations),
        None => AchievedState::from_baseline(targets, &NutrientMap::new()),
    }
}
