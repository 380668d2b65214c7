//! Nutrient Solution Formulation Engine
//!
//! Selects fertilizers and per-liter dosages that approximate a target
//! nutrient profile at low cost, then reports achieved concentrations,
//! deviations, cost and diagnostics.
//!
//! Module layout:
//! - `nutrients`: nutrient vocabulary, compositions, targets, achieved state
//! - `data`: collaborator records and the Polars CSV catalog loader
//! - `composition`: record → composition cascade and candidate pool
//! - `targets`: hydroponic targets, soil adjustment, water baseline
//! - `optimizer`: scorer, dosage calculator, greedy selector, cost
//! - `diagnostics`: severities, explanations, ionic balance, warnings
//! - `engine`: `FormulationEngine::formulate` and batch runs (Rayon)
//! - `service` (feature `service`): async collaborator fan-out (Tokio)

pub mod composition;
pub mod config;
pub mod data;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod nutrients;
pub mod optimizer;
pub mod targets;

#[cfg(feature = "service")]
pub mod service;

// Re-export commonly used types
pub use composition::{resolve_composition, CompositionSource, FertilizerCandidate, ResolvedComposition};
pub use config::{EngineConfig, TargetRange};
pub use data::{load_fertilizer_catalog, CropPhaseRequirement, FertilizerRecord, SoilAnalysis, WaterChemistry};
pub use diagnostics::{NutrientDiagnostic, Severity};
pub use engine::{formulate, FormulationEngine, FormulationRequest, FormulationResult};
pub use error::FormulationError;
pub use nutrients::{AchievedState, Nutrient, NutrientComposition, NutrientMap, NutrientTargetSet};
pub use optimizer::FormulationLineItem;
pub use targets::{BaseTargets, SoilAdjustmentInput, TargetSource};
