//! Composition resolution
//!
//! Turns a heterogeneous catalog record into a canonical
//! `NutrientComposition`, trying sources in a fixed priority order:
//!
//! 1. `composition` sub-object, when it carries any positive N/P/K
//! 2. discrete percentage fields, when any of N/P/K is positive
//! 3. raw chemical-analysis fields (H2PO4 and SO4 converted to P and S)
//! 4. the known-compound dictionary, matched on name then description
//! 5. a literal `NN-PP-KK` grade in the name or description
//!
//! A record that none of these resolve is excluded from the candidate pool.
//! Nothing is ever guessed beyond these sources.

pub mod compounds;

pub use compounds::{match_compound, KnownCompound, KNOWN_COMPOUNDS};

use crate::data::{ChemicalAnalysis, FertilizerRecord, NutrientFields};
use crate::nutrients::{Nutrient, NutrientComposition};
use crate::FormulationError;
use serde::{Deserialize, Serialize};

/// Mass fraction of P in H2PO4
pub const H2PO4_TO_P: f64 = 0.32;
/// Mass fraction of S in SO4
pub const SO4_TO_S: f64 = 0.33;

/// Where a resolved composition came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompositionSource {
    CompositionObject,
    PercentageFields,
    ChemicalAnalysis,
    CompoundDictionary { compound: String },
    GradePattern { grade: String },
}

/// Composition together with its source of truth
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedComposition {
    pub composition: NutrientComposition,
    pub source: CompositionSource,
}

/// Resolve a record's composition
///
/// Returns `Ok(None)` when no source applies and `InvalidInput` when an
/// explicit field holds a negative or non-finite value.
pub fn resolve_composition(
    record: &FertilizerRecord,
) -> Result<Option<ResolvedComposition>, FormulationError> {
    if let Some(fields) = &record.composition {
        if let Some(composition) = from_fields(&record.name, "composition", fields)? {
            return Ok(Some(ResolvedComposition {
                composition,
                source: CompositionSource::CompositionObject,
            }));
        }
    }

    let flat = record.flat_percentages.to_fields();
    for fields in record.percentages.iter().chain(flat.iter()) {
        if let Some(composition) = from_fields(&record.name, "percentage", fields)? {
            return Ok(Some(ResolvedComposition {
                composition,
                source: CompositionSource::PercentageFields,
            }));
        }
    }

    if let Some(analysis) = &record.analysis {
        if let Some(composition) = from_analysis(&record.name, analysis)? {
            return Ok(Some(ResolvedComposition {
                composition,
                source: CompositionSource::ChemicalAnalysis,
            }));
        }
    }

    let texts = std::iter::once(record.name.as_str()).chain(record.description.as_deref());

    for text in texts.clone() {
        if let Some(compound) = match_compound(text) {
            return Ok(Some(ResolvedComposition {
                composition: compound.composition(),
                source: CompositionSource::CompoundDictionary {
                    compound: compound.key.to_string(),
                },
            }));
        }
    }

    for text in texts {
        if let Some((n, p, k)) = parse_grade(text) {
            let composition =
                NutrientComposition::from_pairs([(Nutrient::N, n), (Nutrient::P, p), (Nutrient::K, k)]);
            if composition.has_primary() {
                return Ok(Some(ResolvedComposition {
                    composition,
                    source: CompositionSource::GradePattern {
                        grade: format!("{}-{}-{}", n, p, k),
                    },
                }));
            }
        }
    }

    Ok(None)
}

fn check_value(name: &str, field: &str, nutrient: Nutrient, value: f64) -> Result<f64, FormulationError> {
    if !value.is_finite() || value < 0.0 || value > 100.0 {
        return Err(FormulationError::InvalidInput(format!(
            "fertilizer '{}': {} value for {} must be within 0-100%, got {}",
            name, field, nutrient, value
        )));
    }
    Ok(value)
}

fn from_fields(
    name: &str,
    field: &str,
    fields: &NutrientFields,
) -> Result<Option<NutrientComposition>, FormulationError> {
    let mut composition = NutrientComposition::new();
    for (nutrient, value) in fields.pairs() {
        if let Some(value) = value {
            composition.set(nutrient, check_value(name, field, nutrient, value)?);
        }
    }
    Ok(composition.has_primary().then_some(composition))
}

fn from_analysis(
    name: &str,
    analysis: &ChemicalAnalysis,
) -> Result<Option<NutrientComposition>, FormulationError> {
    let direct = |v: Option<f64>| v.filter(|x| *x != 0.0);

    // Raw ion fields are range-checked before conversion
    let converted = |field: &str, nutrient: Nutrient, raw: Option<f64>, factor: f64| {
        raw.map(|v| check_value(name, field, nutrient, v).map(|v| v * factor))
            .transpose()
    };
    let phosphorus = match direct(analysis.p) {
        Some(p) => Some(p),
        None => converted("analysis h2po4", Nutrient::P, analysis.h2po4, H2PO4_TO_P)?,
    };
    let sulfur = match direct(analysis.s) {
        Some(s) => Some(s),
        None => converted("analysis so4", Nutrient::S, analysis.so4, SO4_TO_S)?,
    };

    let pairs = [
        (Nutrient::N, analysis.n),
        (Nutrient::P, phosphorus),
        (Nutrient::K, analysis.k),
        (Nutrient::Ca, analysis.ca),
        (Nutrient::Mg, analysis.mg),
        (Nutrient::S, sulfur),
        (Nutrient::Fe, analysis.fe),
        (Nutrient::Mn, analysis.mn),
        (Nutrient::Zn, analysis.zn),
        (Nutrient::Cu, analysis.cu),
        (Nutrient::B, analysis.b),
        (Nutrient::Mo, analysis.mo),
    ];

    let mut composition = NutrientComposition::new();
    for (nutrient, value) in pairs {
        if let Some(value) = value {
            composition.set(nutrient, check_value(name, "analysis", nutrient, value)?);
        }
    }
    Ok(composition.has_primary().then_some(composition))
}

// ============================================================================
// Candidate pool
// ============================================================================

/// A validated fertilizer the selector may choose
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FertilizerCandidate {
    pub id: String,
    pub name: String,
    pub composition: NutrientComposition,
    pub source: CompositionSource,
    /// Price per kilogram; `None` when the catalog has no price
    pub price_per_unit: Option<f64>,
    /// g/L
    pub max_solubility: f64,
}

impl FertilizerCandidate {
    /// Price used for tie-breaking; unknown prices sort last
    pub fn sort_price(&self) -> f64 {
        self.price_per_unit.unwrap_or(f64::INFINITY)
    }

    /// Supplies at least `min_nutrients` nutrients at `min_percent` or more
    pub fn is_balanced(&self, min_percent: f64, min_nutrients: usize) -> bool {
        self.composition.count_at_least(min_percent) >= min_nutrients
    }
}

/// Why a catalog record did not make it into the pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    Inactive,
    NoComposition,
    DuplicateId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedRecord {
    pub id: String,
    pub name: String,
    pub reason: RejectionReason,
}

/// Candidates in catalog order plus the records that were dropped
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidatePool {
    pub candidates: Vec<FertilizerCandidate>,
    pub rejected: Vec<RejectedRecord>,
}

/// Validate catalog records and resolve their compositions
///
/// Inactive records are dropped before resolution, later duplicates of an id
/// are dropped after it. An empty result is `EmptyFertilizerPool`.
pub fn build_candidate_pool(
    records: &[FertilizerRecord],
    default_max_solubility: f64,
) -> Result<CandidatePool, FormulationError> {
    let mut pool = CandidatePool::default();
    let mut seen = rustc_hash::FxHashSet::default();

    for record in records {
        let reject = |reason| RejectedRecord {
            id: record.id.clone(),
            name: record.name.clone(),
            reason,
        };

        if !record.is_active {
            pool.rejected.push(reject(RejectionReason::Inactive));
            continue;
        }
        if seen.contains(record.id.as_str()) {
            tracing::warn!("Duplicate fertilizer id '{}' ({}), keeping the first", record.id, record.name);
            pool.rejected.push(reject(RejectionReason::DuplicateId));
            continue;
        }

        let Some(resolved) = resolve_composition(record)? else {
            tracing::warn!("No usable composition for fertilizer '{}' ({})", record.name, record.id);
            pool.rejected.push(reject(RejectionReason::NoComposition));
            continue;
        };

        if let Some(price) = record.price_per_unit {
            if !price.is_finite() || price < 0.0 {
                return Err(FormulationError::InvalidInput(format!(
                    "fertilizer '{}': price must be non-negative, got {}",
                    record.name, price
                )));
            }
        }
        let max_solubility = match record.max_solubility {
            Some(s) if s.is_finite() && s > 0.0 => s,
            Some(s) => {
                return Err(FormulationError::InvalidInput(format!(
                    "fertilizer '{}': max solubility must be positive, got {}",
                    record.name, s
                )))
            }
            None => default_max_solubility,
        };

        seen.insert(record.id.as_str());
        pool.candidates.push(FertilizerCandidate {
            id: record.id.clone(),
            name: record.name.clone(),
            composition: resolved.composition,
            source: resolved.source,
            price_per_unit: record.price_per_unit,
            max_solubility,
        });
    }

    if pool.candidates.is_empty() {
        return Err(FormulationError::EmptyFertilizerPool {
            rejected: pool.rejected.len(),
        });
    }

    tracing::debug!(
        "Candidate pool: {} usable, {} rejected",
        pool.candidates.len(),
        pool.rejected.len()
    );
    Ok(pool)
}

/// Find a literal `N-P-K` grade such as `20-20-20` or `(13-0-46)`
pub fn parse_grade(text: &str) -> Option<(f64, f64, f64)> {
    text.split_whitespace().find_map(|word| {
        let word = word.trim_matches(|c: char| !c.is_ascii_digit());
        let parts: Vec<&str> = word.split('-').collect();
        if parts.len() != 3 {
            return None;
        }
        let numbers: Vec<f64> = parts
            .iter()
            .filter(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit() || c == '.'))
            .filter_map(|p| p.parse::<f64>().ok())
            .filter(|v| *v <= 100.0)
            .collect();
        match numbers.as_slice() {
            [n, p, k] => Some((*n, *p, *k)),
            _ => None,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn record(name: &str) -> FertilizerRecord {
        FertilizerRecord {
            id: "1".to_string(),
            name: name.to_string(),
            is_active: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_composition_object_first() {
        let mut r = record("Potassium nitrate");
        r.composition = Some(NutrientFields {
            nitrogen: Some(13.0),
            potassium: Some(46.0),
            ..Default::default()
        });
        r.percentages = Some(NutrientFields {
            nitrogen: Some(99.0),
            ..Default::default()
        });

        let resolved = resolve_composition(&r).unwrap().unwrap();
        assert_eq!(resolved.source, CompositionSource::CompositionObject);
        assert_relative_eq!(resolved.composition.get(Nutrient::K), 46.0);
    }

    #[test]
    fn test_composition_object_without_npk_falls_through() {
        let mut r = record("Potassium nitrate");
        r.composition = Some(NutrientFields {
            calcium: Some(10.0),
            ..Default::default()
        });
        r.percentages = Some(NutrientFields {
            nitrogen: Some(13.0),
            potassium: Some(44.0),
            ..Default::default()
        });

        let resolved = resolve_composition(&r).unwrap().unwrap();
        assert_eq!(resolved.source, CompositionSource::PercentageFields);
        assert_eq!(resolved.composition.get(Nutrient::Ca), 0.0);
    }

    #[test]
    fn test_analysis_converts_ion_forms() {
        let mut r = record("Custom acid blend");
        r.analysis = Some(ChemicalAnalysis {
            h2po4: Some(50.0),
            so4: Some(30.0),
            ..Default::default()
        });

        let resolved = resolve_composition(&r).unwrap().unwrap();
        assert_eq!(resolved.source, CompositionSource::ChemicalAnalysis);
        assert_relative_eq!(resolved.composition.get(Nutrient::P), 16.0);
        assert_relative_eq!(resolved.composition.get(Nutrient::S), 9.9, epsilon = 1e-9);
    }

    #[test]
    fn test_dictionary_by_description() {
        let mut r = record("Product A-17");
        r.description = Some("Nitrato de calcio granulado".to_string());

        let resolved = resolve_composition(&r).unwrap().unwrap();
        assert_eq!(
            resolved.source,
            CompositionSource::CompoundDictionary { compound: "calcium_nitrate".to_string() }
        );
        assert_relative_eq!(resolved.composition.get(Nutrient::Ca), 19.0);
    }

    #[test]
    fn test_grade_pattern_last() {
        let resolved = resolve_composition(&record("Hydro Grow 20-10-20")).unwrap().unwrap();
        assert_eq!(resolved.source, CompositionSource::GradePattern { grade: "20-10-20".to_string() });
        assert_relative_eq!(resolved.composition.get(Nutrient::P), 10.0);
    }

    #[test]
    fn test_unresolvable_record() {
        assert!(resolve_composition(&record("Mystery")).unwrap().is_none());
        assert!(resolve_composition(&record("Blend 0-0-0")).unwrap().is_none());
    }

    #[test]
    fn test_negative_value_is_invalid() {
        let mut r = record("Broken");
        r.percentages = Some(NutrientFields {
            nitrogen: Some(-5.0),
            potassium: Some(10.0),
            ..Default::default()
        });

        let err = resolve_composition(&r).unwrap_err();
        assert!(matches!(err, FormulationError::InvalidInput(_)));
    }

    #[test]
    fn test_flat_percentage_fields_resolve() {
        let json = r#"{ "id": "cn", "name": "Producto A", "nitrogenPercentage": 15.5, "calciumPercentage": 19.0, "pricePerUnit": 1.2 }"#;
        let r: FertilizerRecord = serde_json::from_str(json).unwrap();

        let resolved = resolve_composition(&r).unwrap().unwrap();
        assert_eq!(resolved.source, CompositionSource::PercentageFields);
        assert_relative_eq!(resolved.composition.get(Nutrient::N), 15.5);
        assert_relative_eq!(resolved.composition.get(Nutrient::Ca), 19.0);

        let pool = build_candidate_pool(&[r], 500.0).unwrap();
        assert_eq!(pool.candidates.len(), 1);
        assert_eq!(pool.candidates[0].price_per_unit, Some(1.2));
    }

    #[test]
    fn test_nested_percentages_win_over_flat() {
        let mut r = record("Producto B");
        r.percentages = Some(NutrientFields { potassium: Some(44.0), ..Default::default() });
        r.flat_percentages.potassium_percentage = Some(10.0);

        let resolved = resolve_composition(&r).unwrap().unwrap();
        assert_relative_eq!(resolved.composition.get(Nutrient::K), 44.0);
    }

    #[test]
    fn test_raw_ion_fields_range_checked_before_conversion() {
        let mut r = record("Custom acid blend");
        r.analysis = Some(ChemicalAnalysis {
            h2po4: Some(250.0),
            ..Default::default()
        });
        assert!(matches!(resolve_composition(&r), Err(FormulationError::InvalidInput(_))));

        r.analysis = Some(ChemicalAnalysis {
            n: Some(10.0),
            so4: Some(-3.0),
            ..Default::default()
        });
        assert!(matches!(resolve_composition(&r), Err(FormulationError::InvalidInput(_))));
    }

    #[test]
    fn test_pool_drops_inactive_unresolved_and_duplicates() {
        let mut inactive = record("Potassium nitrate");
        inactive.is_active = false;
        let mut duplicate = record("Calcium nitrate");
        duplicate.id = "2".to_string();
        let mut first = record("Urea");
        first.id = "2".to_string();
        first.price_per_unit = Some(0.6);

        let records = vec![inactive, record("Mystery"), first, duplicate];
        let pool = build_candidate_pool(&records, 500.0).unwrap();

        assert_eq!(pool.candidates.len(), 1);
        assert_eq!(pool.candidates[0].name, "Urea");
        assert_eq!(pool.candidates[0].max_solubility, 500.0);
        let reasons: Vec<_> = pool.rejected.iter().map(|r| r.reason.clone()).collect();
        assert_eq!(
            reasons,
            vec![RejectionReason::Inactive, RejectionReason::NoComposition, RejectionReason::DuplicateId]
        );
    }

    #[test]
    fn test_empty_pool_is_error() {
        let err = build_candidate_pool(&[record("Mystery")], 500.0).unwrap_err();
        assert_eq!(err, FormulationError::EmptyFertilizerPool { rejected: 1 });

        let err = build_candidate_pool(&[], 500.0).unwrap_err();
        assert_eq!(err, FormulationError::EmptyFertilizerPool { rejected: 0 });
    }

    #[test]
    fn test_pool_rejects_bad_solubility() {
        let mut r = record("Urea");
        r.max_solubility = Some(0.0);
        assert!(matches!(
            build_candidate_pool(&[r], 500.0),
            Err(FormulationError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_parse_grade() {
        assert_eq!(parse_grade("(13-0-46)"), Some((13.0, 0.0, 46.0)));
        assert_eq!(parse_grade("2024-05-01 batch"), None);
        assert_eq!(parse_grade("no grade here"), None);
        assert_eq!(parse_grade("A-17"), None);
    }
}
