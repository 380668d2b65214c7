//! Async front for upstream collaborators
//!
//! Catalog, crop-phase requirement, soil analysis and water chemistry are
//! fetched concurrently and joined before the synchronous engine runs. Dropping
//! the returned future cancels whichever fetches are still outstanding; once
//! the engine starts it runs to completion. Retries belong to the collaborators.

use crate::data::{CropPhaseRequirement, FertilizerRecord, SoilAnalysis, WaterChemistry};
use crate::engine::{FormulationEngine, FormulationRequest, FormulationResult};
use crate::targets::{BaseTargets, SoilAdjustmentInput, TargetSource};
use crate::FormulationError;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[async_trait]
pub trait FertilizerCatalog: Send + Sync {
    async fn fertilizers(&self) -> Result<Vec<FertilizerRecord>>;
}

#[async_trait]
pub trait RequirementSource: Send + Sync {
    async fn requirement(&self, crop_phase_id: i64) -> Result<Option<CropPhaseRequirement>>;
}

#[async_trait]
pub trait SoilAnalysisSource: Send + Sync {
    async fn latest_analysis(&self, production_unit_id: i64) -> Result<Option<SoilAnalysis>>;
}

#[async_trait]
pub trait WaterChemistrySource: Send + Sync {
    async fn water_chemistry(&self, water_source_id: i64) -> Result<Option<WaterChemistry>>;
}

/// Soil-mode part of a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoilQuery {
    pub production_unit_id: i64,
    /// Irrigation parameters; any soil analysis set here is replaced by the fetched one
    pub irrigation: SoilAdjustmentInput,
}

/// What to formulate, by collaborator ids
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormulationQuery {
    pub crop_phase_id: i64,
    #[serde(default)]
    pub water_source_id: Option<i64>,
    #[serde(default)]
    pub soil: Option<SoilQuery>,
    pub volume_liters: f64,
}

/// Fetch or engine failure
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("upstream fetch failed: {0:#}")]
    Upstream(#[from] anyhow::Error),
    #[error(transparent)]
    Formulation(#[from] FormulationError),
}

pub struct FormulationService {
    engine: Arc<FormulationEngine>,
    catalog: Arc<dyn FertilizerCatalog>,
    requirements: Arc<dyn RequirementSource>,
    soil: Arc<dyn SoilAnalysisSource>,
    water: Arc<dyn WaterChemistrySource>,
}

impl FormulationService {
    pub fn new(
        engine: Arc<FormulationEngine>,
        catalog: Arc<dyn FertilizerCatalog>,
        requirements: Arc<dyn RequirementSource>,
        soil: Arc<dyn SoilAnalysisSource>,
        water: Arc<dyn WaterChemistrySource>,
    ) -> Self {
        Self {
            engine,
            catalog,
            requirements,
            soil,
            water,
        }
    }

    /// Fan out the fetches, then build the engine request
    pub async fn gather(&self, query: &FormulationQuery) -> Result<FormulationRequest, ServiceError> {
        let soil_fetch = async {
            match &query.soil {
                Some(soil) => self.soil.latest_analysis(soil.production_unit_id).await,
                None => Ok(None),
            }
        };
        let water_fetch = async {
            match query.water_source_id {
                Some(id) => self.water.water_chemistry(id).await,
                None => Ok(None),
            }
        };

        let (fertilizers, requirement, soil_analysis, water) = tokio::try_join!(
            self.catalog.fertilizers(),
            self.requirements.requirement(query.crop_phase_id),
            soil_fetch,
            water_fetch,
        )?;

        tracing::debug!(
            "Fetched {} fertilizers for crop phase {} (soil: {}, water: {})",
            fertilizers.len(),
            query.crop_phase_id,
            soil_analysis.is_some(),
            water.is_some()
        );

        let requirement = requirement.ok_or_else(|| {
            FormulationError::MissingTargets(format!(
                "no requirement found for crop phase {}",
                query.crop_phase_id
            ))
        })?;
        let base = BaseTargets::CropPhase(requirement);

        let targets = match &query.soil {
            Some(soil) => TargetSource::Soil {
                base,
                adjustment: SoilAdjustmentInput {
                    soil_analysis,
                    ..soil.irrigation.clone()
                },
            },
            None => TargetSource::Hydroponic { base },
        };

        Ok(FormulationRequest {
            targets,
            fertilizers,
            water,
            volume_liters: query.volume_liters,
        })
    }

    pub async fn formulate(&self, query: &FormulationQuery) -> Result<FormulationResult, ServiceError> {
        let request = self.gather(query).await?;
        Ok(self.engine.formulate(&request)?)
    }
}
