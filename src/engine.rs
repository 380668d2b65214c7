//! Formulation engine - main coordinator
//!
//! Resolves targets, validates the fertilizer pool, runs the gap-filling
//! selector, then prices and diagnoses the recipe. The engine is stateless
//! between calls; independent requests can run in parallel (`formulate_batch`).

use crate::composition::{build_candidate_pool, CompositionSource, RejectedRecord};
use crate::config::EngineConfig;
use crate::data::{FertilizerRecord, WaterChemistry};
use crate::diagnostics::{
    analyze, deviation_percent, estimated_ec, ionic_balance, ionic_ratios, mixing_instructions,
    recipe_warnings, DiagnosticContext, IonicBalance, IonicRatio, NutrientDiagnostic, RatioStatus,
    WarningInputs,
};
use crate::nutrients::{AchievedState, Nutrient, NutrientMap, NutrientTargetSet};
use crate::optimizer::{
    price_selections, select_fertilizers, CostRating, FormulationLineItem, SelectionContext, StopReason,
};
use crate::targets::{resolve_targets, water_baseline, SoilAdjustmentReport, TargetCapFinding, TargetSource};
use crate::FormulationError;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything one run needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormulationRequest {
    pub targets: TargetSource,
    pub fertilizers: Vec<FertilizerRecord>,
    #[serde(default)]
    pub water: Option<WaterChemistry>,
    pub volume_liters: f64,
}

/// Where each selected fertilizer's composition came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionProvenance {
    pub fertilizer_id: String,
    pub source: CompositionSource,
}

/// Complete result of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormulationResult {
    pub targets: NutrientTargetSet,
    pub volume_liters: f64,
    pub line_items: Vec<FormulationLineItem>,
    pub achieved: AchievedState,
    /// Nutrient → deviation from target (%)
    pub deviations: NutrientMap,
    pub total_cost: f64,
    pub cost_per_liter: f64,
    pub cost_rating: CostRating,
    pub instructions: Vec<String>,
    pub warnings: Vec<String>,
    pub diagnostics: BTreeMap<Nutrient, NutrientDiagnostic>,
    pub ionic_balance: IonicBalance,
    pub ionic_ratios: Vec<IonicRatio>,
    /// dS/m
    pub estimated_ec: f64,
    pub stop_reason: StopReason,
    pub provenance: Vec<CompositionProvenance>,
    pub rejected_fertilizers: Vec<RejectedRecord>,
    pub soil: Option<SoilAdjustmentReport>,
    /// Targets that fell outside their realistic range
    pub target_caps: Vec<TargetCapFinding>,
}

/// Stateless formulation engine holding one validated configuration
#[derive(Debug, Clone)]
pub struct FormulationEngine {
    config: EngineConfig,
}

impl Default for FormulationEngine {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
        }
    }
}

impl FormulationEngine {
    pub fn new(config: EngineConfig) -> Result<Self, FormulationError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one formulation
    ///
    /// Fails instead of substituting data: unresolvable targets, an empty
    /// validated pool or a run that accepts no fertilizer are all errors.
    pub fn formulate(&self, request: &FormulationRequest) -> Result<FormulationResult, FormulationError> {
        let volume = request.volume_liters;
        if !(volume.is_finite() && volume > 0.0) {
            return Err(FormulationError::InvalidInput(format!(
                "volume must be positive, got {}",
                volume
            )));
        }

        let resolved = resolve_targets(&request.targets, &self.config)?;
        let targets = resolved.targets;
        let pool = build_candidate_pool(&request.fertilizers, self.config.default_max_solubility)?;

        let start = water_baseline(&targets, request.water.as_ref());
        let ctx = SelectionContext {
            pool: &pool.candidates,
            targets: &targets,
            config: &self.config,
        };
        let outcome = select_fertilizers(&ctx, start.clone());

        if outcome.selections.is_empty() {
            tracing::warn!(
                "No fertilizer accepted after {} passes ({:?})",
                outcome.passes,
                outcome.stop_reason
            );
            return Err(FormulationError::InfeasibleFormulation);
        }

        // Assemble
        let (line_items, costs) = price_selections(&pool.candidates, &outcome.selections, volume);
        let achieved = outcome.achieved;

        let deviations: NutrientMap = targets
            .concentrations
            .iter()
            .map(|(n, t)| (*n, deviation_percent(achieved.get(*n), *t)))
            .collect();

        let diagnostics = analyze(
            &targets,
            &achieved,
            &DiagnosticContext {
                baseline: &start,
                line_items: &line_items,
                stop_reason: outcome.stop_reason,
            },
            &self.config,
        );

        let balance = ionic_balance(&achieved);
        let ec = estimated_ec(&balance);
        let ratios = ionic_ratios(&achieved);

        let mut warnings = recipe_warnings(
            &WarningInputs {
                targets: &targets,
                achieved: &achieved,
                items: &line_items,
                pool: &pool.candidates,
                discarded: &outcome.discarded,
                ionic_balance: &balance,
                estimated_ec: ec,
            },
            &self.config,
        );
        warnings.extend(
            ratios
                .iter()
                .filter(|r| r.status == RatioStatus::Imbalanced)
                .map(|r| format!("{} ({:.2}, range {}-{})", r.recommendation, r.actual, r.min, r.max)),
        );
        warnings.extend(resolved.caps.iter().map(TargetCapFinding::warning));
        if let Some(soil) = &resolved.soil {
            warnings.extend(soil.warnings.iter().cloned());
        }

        let instructions = mixing_instructions(&line_items, &targets, volume);

        let provenance = outcome
            .selections
            .iter()
            .map(|s| {
                let candidate = &pool.candidates[s.candidate_index];
                CompositionProvenance {
                    fertilizer_id: candidate.id.clone(),
                    source: candidate.source.clone(),
                }
            })
            .collect();

        tracing::info!(
            "Formulated {} L with {} fertilizers: total cost {:.2} ({:.4}/L), stop: {:?}",
            volume,
            line_items.len(),
            costs.total_cost,
            costs.cost_per_liter,
            outcome.stop_reason
        );

        Ok(FormulationResult {
            targets,
            volume_liters: volume,
            line_items,
            achieved,
            deviations,
            total_cost: costs.total_cost,
            cost_per_liter: costs.cost_per_liter,
            cost_rating: costs.rating,
            instructions,
            warnings,
            diagnostics,
            ionic_balance: balance,
            ionic_ratios: ratios,
            estimated_ec: ec,
            stop_reason: outcome.stop_reason,
            provenance,
            rejected_fertilizers: pool.rejected,
            soil: resolved.soil,
            target_caps: resolved.caps,
        })
    }

    /// Run independent requests in parallel, results in input order
    pub fn formulate_batch(
        &self,
        requests: &[FormulationRequest],
    ) -> Vec<Result<FormulationResult, FormulationError>> {
        requests.par_iter().map(|request| self.formulate(request)).collect()
    }
}

/// `formulate` with the default configuration
pub fn formulate(request: &FormulationRequest) -> Result<FormulationResult, FormulationError> {
    FormulationEngine::default().formulate(request)
}
