// End-to-end formulation tests
//
// Run with: cargo test --test formulation_integration_tests

use approx::assert_relative_eq;
use nutrient_formulator::data::{NutrientFields, SoilAnalysis, TextureClass};
use nutrient_formulator::diagnostics::{RatioStatus, Severity};
use nutrient_formulator::targets::{resolve_targets, CapKind};
use nutrient_formulator::{
    formulate, EngineConfig, load_fertilizer_catalog, BaseTargets, CropPhaseRequirement, FertilizerRecord,
    FormulationError, FormulationRequest, Nutrient, NutrientTargetSet, SoilAdjustmentInput,
    TargetSource, WaterChemistry,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::io::Write;

// ============================================================================
// Helpers
// ============================================================================

fn explicit(pairs: &[(Nutrient, f64)]) -> TargetSource {
    TargetSource::Hydroponic {
        base: BaseTargets::Explicit(NutrientTargetSet::new(pairs.iter().copied().collect(), 6.0, 2.0)),
    }
}

fn record(id: &str, name: &str, fields: NutrientFields, price: Option<f64>) -> FertilizerRecord {
    FertilizerRecord {
        id: id.to_string(),
        name: name.to_string(),
        percentages: Some(fields),
        price_per_unit: price,
        is_active: true,
        ..Default::default()
    }
}

fn tomato_requirement() -> CropPhaseRequirement {
    CropPhaseRequirement {
        crop_phase_id: Some(12),
        no3: Some(180.0),
        nh4: Some(10.0),
        h2po4: Some(45.0),
        k: Some(250.0),
        ca: Some(160.0),
        mg: Some(45.0),
        so4: Some(60.0),
        fe: Some(2.0),
        ph: Some(5.8),
        ec: Some(2.4),
    }
}

fn standard_catalog() -> Vec<FertilizerRecord> {
    vec![
        record(
            "can",
            "Calcium nitrate",
            NutrientFields { nitrogen: Some(15.5), calcium: Some(19.0), ..Default::default() },
            Some(1.1),
        ),
        record(
            "kno3",
            "Potassium nitrate",
            NutrientFields { nitrogen: Some(13.0), potassium: Some(38.0), ..Default::default() },
            Some(1.8),
        ),
        record(
            "mkp",
            "Monopotassium phosphate",
            NutrientFields { phosphorus: Some(22.7), potassium: Some(28.7), ..Default::default() },
            Some(2.4),
        ),
        record(
            "mgso4",
            "Magnesium sulfate",
            NutrientFields { magnesium: Some(9.9), sulfur: Some(13.0), ..Default::default() },
            Some(0.6),
        ),
        record(
            "k2so4",
            "Potassium sulfate",
            NutrientFields { potassium: Some(44.9), sulfur: Some(18.4), ..Default::default() },
            Some(1.5),
        ),
    ]
}

// ============================================================================
// Section 1: Documented behaviour
// ============================================================================

#[test]
fn test_single_pure_nitrogen_source() {
    let request = FormulationRequest {
        targets: explicit(&[(Nutrient::N, 100.0), (Nutrient::P, 0.0), (Nutrient::K, 0.0)]),
        fertilizers: vec![FertilizerRecord {
            id: "pure-n".to_string(),
            name: "Pure nitrogen".to_string(),
            composition: Some(NutrientFields { nitrogen: Some(100.0), ..Default::default() }),
            is_active: true,
            ..Default::default()
        }],
        water: None,
        volume_liters: 1000.0,
    };

    let result = formulate(&request).unwrap();
    assert_eq!(result.line_items.len(), 1);

    // 100 mg/L * 1000 L / (100 % * 10) = 100 g before damping; the damped
    // 0.08 g/L sits under the 0.1 g/L floor and is raised back to it.
    let item = &result.line_items[0];
    assert_eq!(item.fertilizer_id, "pure-n");
    assert_relative_eq!(item.dosage, 0.1, epsilon = 1e-9);
    assert_relative_eq!(item.total_grams, 100.0, epsilon = 1e-6);
    assert_relative_eq!(result.achieved.get(Nutrient::N), 100.0, epsilon = 1e-6);
    assert_eq!(result.total_cost, 0.0);
    assert!(result.warnings.iter().any(|w| w.contains("Pure nitrogen")));
}

#[test]
fn test_empty_pool_is_an_error() {
    let request = FormulationRequest {
        targets: TargetSource::Hydroponic { base: BaseTargets::CropPhase(tomato_requirement()) },
        fertilizers: Vec::new(),
        water: None,
        volume_liters: 500.0,
    };
    assert_eq!(
        formulate(&request).unwrap_err(),
        FormulationError::EmptyFertilizerPool { rejected: 0 }
    );

    // Only inactive records left is still an empty pool
    let mut inactive = standard_catalog();
    for r in &mut inactive {
        r.is_active = false;
    }
    let request = FormulationRequest { fertilizers: inactive, ..request };
    assert!(matches!(
        formulate(&request),
        Err(FormulationError::EmptyFertilizerPool { rejected: 5 })
    ));
}

#[test]
fn test_diagnostic_severity_extremes() {
    // Water already carries 150 mg/L N against a 100 target; K is filled by
    // the only fertilizer.
    let request = FormulationRequest {
        targets: explicit(&[(Nutrient::N, 100.0), (Nutrient::K, 100.0)]),
        fertilizers: vec![record(
            "kcl",
            "Potassium chloride",
            NutrientFields { potassium: Some(50.0), ..Default::default() },
            Some(0.9),
        )],
        water: Some(WaterChemistry {
            concentrations: [(Nutrient::N, 150.0)].into_iter().collect(),
            ph: Some(7.4),
            ec: Some(0.4),
        }),
        volume_liters: 200.0,
    };

    let result = formulate(&request).unwrap();
    let n = &result.diagnostics[&Nutrient::N];
    assert_relative_eq!(n.deviation_percent, 50.0, epsilon = 1e-9);
    assert_eq!(n.severity, Severity::High);
    assert!(n.suppliers.is_empty());

    let on_target = FormulationRequest {
        targets: explicit(&[(Nutrient::N, 100.0), (Nutrient::K, 100.0)]),
        water: Some(WaterChemistry {
            concentrations: [(Nutrient::N, 100.5)].into_iter().collect(),
            ..Default::default()
        }),
        ..request
    };
    let result = formulate(&on_target).unwrap();
    assert_eq!(result.diagnostics[&Nutrient::N].severity, Severity::None);
    assert!(!result.diagnostics[&Nutrient::N].has_discrepancy);
}

#[test]
fn test_soil_without_native_supply_keeps_targets() {
    let base = BaseTargets::CropPhase(tomato_requirement());
    let config = EngineConfig::default();
    let hydro = resolve_targets(&TargetSource::Hydroponic { base: base.clone() }, &config).unwrap();

    let soil = resolve_targets(
        &TargetSource::Soil {
            base,
            adjustment: SoilAdjustmentInput {
                soil_analysis: Some(SoilAnalysis {
                    sample_date: Some("2026-03-02".to_string()),
                    ph: 5.2,
                    texture_class: TextureClass::Clay,
                    nutrient_levels: Default::default(),
                    cation_exchange_capacity: Some(8.0),
                    electrical_conductivity: Some(0.6),
                }),
                ..Default::default()
            },
        },
        &config,
    )
    .unwrap();

    assert_eq!(soil.targets, hydro.targets);
    let report = soil.soil.unwrap();
    assert!(report.warnings.iter().any(|w| w.to_lowercase().contains("acid")));
}

#[test]
fn test_soil_mode_requires_analysis() {
    let request = FormulationRequest {
        targets: TargetSource::Soil {
            base: BaseTargets::CropPhase(tomato_requirement()),
            adjustment: SoilAdjustmentInput::default(),
        },
        fertilizers: standard_catalog(),
        water: None,
        volume_liters: 1000.0,
    };
    assert_eq!(formulate(&request).unwrap_err(), FormulationError::MissingSoilAnalysis);
}

#[test]
fn test_identical_runs_serialize_identically() {
    let request = FormulationRequest {
        targets: TargetSource::Hydroponic { base: BaseTargets::CropPhase(tomato_requirement()) },
        fertilizers: standard_catalog(),
        water: Some(WaterChemistry {
            concentrations: [(Nutrient::Ca, 30.0), (Nutrient::Mg, 8.0)].into_iter().collect(),
            ph: Some(7.2),
            ec: Some(0.3),
        }),
        volume_liters: 1000.0,
    };

    let first = serde_json::to_vec(&formulate(&request).unwrap()).unwrap();
    let second = serde_json::to_vec(&formulate(&request).unwrap()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_request_json_round_trip() {
    let json = r#"{
        "targets": { "mode": "hydroponic", "base": { "cropPhase": { "no3": 150, "k": 200 } } },
        "fertilizers": [
            { "id": "1", "name": "Nitrato de potasio" },
            { "id": "2", "name": "Fertilizante 20-20-20", "pricePerUnit": 2.5 }
        ],
        "volumeLiters": 100
    }"#;
    let request: FormulationRequest = serde_json::from_str(json).unwrap();
    let result = formulate(&request).unwrap();

    assert!(!result.line_items.is_empty());
    assert!(result.provenance.iter().all(|p| result
        .line_items
        .iter()
        .any(|i| i.fertilizer_id == p.fertilizer_id)));

    // Request and result use camelCase keys throughout
    let value = serde_json::to_value(&result).unwrap();
    for key in ["volumeLiters", "lineItems", "costPerLiter", "ionicBalance", "ionicRatios", "stopReason", "targetCaps"] {
        assert!(value.get(key).is_some(), "missing {}", key);
    }
    assert!(value.get("line_items").is_none());
    assert!(value["lineItems"][0].get("fertilizerId").is_some());

    let echoed = serde_json::to_value(&request).unwrap();
    assert!(echoed.get("volumeLiters").is_some());
    assert!(echoed["targets"]["base"].get("cropPhase").is_some());
    let snake = r#"{ "targets": { "mode": "hydroponic", "base": { "crop_phase": { "no3": 150 } } },
                     "fertilizers": [], "volume_liters": 100 }"#;
    assert!(serde_json::from_str::<FormulationRequest>(snake).is_err());
}

#[test]
fn test_unrealistic_targets_capped_with_warnings() {
    let request = FormulationRequest {
        targets: explicit(&[(Nutrient::N, 450.0), (Nutrient::K, 60.0), (Nutrient::Ca, 150.0)]),
        fertilizers: standard_catalog(),
        water: None,
        volume_liters: 1000.0,
    };
    let result = formulate(&request).unwrap();

    assert_relative_eq!(result.targets.target(Nutrient::N), 300.0);
    // Low K stays as requested, only reported
    assert_relative_eq!(result.targets.target(Nutrient::K), 60.0);
    let kinds: Vec<_> = result.target_caps.iter().map(|c| (c.nutrient, c.kind)).collect();
    assert_eq!(kinds, [(Nutrient::N, CapKind::CappedAtMaximum), (Nutrient::K, CapKind::BelowMinimum)]);
    assert!(result.warnings.iter().any(|w| w.contains("maximum safe limit of 300 mg/L")));
    assert!(result.warnings.iter().any(|w| w.contains("minimum effective level of 100 mg/L")));
}

#[test]
fn test_ionic_ratios_reported_and_imbalance_warned() {
    // Potassium only, no calcium or magnesium to balance it
    let request = FormulationRequest {
        targets: explicit(&[(Nutrient::K, 200.0), (Nutrient::Ca, 100.0)]),
        fertilizers: vec![record(
            "kcl",
            "Potassium chloride",
            NutrientFields { potassium: Some(50.0), ..Default::default() },
            Some(0.9),
        )],
        water: Some(WaterChemistry {
            concentrations: [(Nutrient::Ca, 10.0)].into_iter().collect(),
            ..Default::default()
        }),
        volume_liters: 100.0,
    };
    let result = formulate(&request).unwrap();

    let k_ca = result.ionic_ratios.iter().find(|r| r.name == "K:Ca").unwrap();
    assert!(k_ca.actual > 1.5 * 1.2);
    assert_eq!(k_ca.status, RatioStatus::Imbalanced);
    assert!(result.warnings.iter().any(|w| w.contains("K:Ca ratio is severely imbalanced")));
    // No magnesium in solution: ratios against Mg are skipped
    assert!(result.ionic_ratios.iter().all(|r| !r.name.ends_with(":Mg")));
}

// ============================================================================
// Section 2: Invariants over random catalogs
// ============================================================================

fn random_fields(rng: &mut StdRng) -> NutrientFields {
    let mut fields = NutrientFields::default();
    for nutrient in Nutrient::ALL {
        if rng.gen_bool(0.35) {
            fields.set(nutrient, Some(rng.gen_range(0.5..45.0)));
        }
    }
    fields
}

fn random_request(rng: &mut StdRng) -> FormulationRequest {
    let count = rng.gen_range(1..=12);
    let fertilizers = (0..count)
        .map(|i| FertilizerRecord {
            // Occasional duplicate ids exercise the pool's first-wins rule
            id: format!("f{}", rng.gen_range(0..count + 2).min(i + 1)),
            name: format!("Fertilizer {}", i),
            percentages: Some(random_fields(rng)),
            price_per_unit: rng.gen_bool(0.8).then(|| rng.gen_range(0.2..30.0)),
            max_solubility: rng.gen_bool(0.7).then(|| rng.gen_range(0.5..800.0)),
            is_active: rng.gen_bool(0.9),
            ..Default::default()
        })
        .collect();

    let requirement = CropPhaseRequirement {
        no3: Some(rng.gen_range(50.0..250.0)),
        h2po4: Some(rng.gen_range(0.0..80.0)),
        k: Some(rng.gen_range(50.0..350.0)),
        ca: Some(rng.gen_range(0.0..200.0)),
        mg: Some(rng.gen_range(0.0..70.0)),
        so4: Some(rng.gen_range(0.0..120.0)),
        ..Default::default()
    };

    FormulationRequest {
        targets: TargetSource::Hydroponic { base: BaseTargets::CropPhase(requirement) },
        fertilizers,
        water: None,
        volume_liters: rng.gen_range(10.0..5000.0),
    }
}

#[test]
fn test_random_catalog_invariants() {
    let mut rng = StdRng::seed_from_u64(20261018);
    let mut formulated = 0;

    for _ in 0..300 {
        let request = random_request(&mut rng);
        let result = match formulate(&request) {
            Ok(result) => result,
            Err(FormulationError::InfeasibleFormulation) | Err(FormulationError::EmptyFertilizerPool { .. }) => {
                continue
            }
            Err(other) => panic!("unexpected error: {}", other),
        };
        formulated += 1;

        // First record per id is the one the pool keeps
        let mut solubility: HashMap<&str, f64> = HashMap::new();
        for r in request.fertilizers.iter().filter(|r| r.is_active) {
            solubility
                .entry(r.id.as_str())
                .or_insert_with(|| r.max_solubility.unwrap_or(500.0));
        }

        assert!(!result.line_items.is_empty());
        assert!(result.line_items.len() <= 5);
        for item in &result.line_items {
            assert!(item.dosage > 0.0);
            assert!(item.dosage <= solubility[item.fertilizer_id.as_str()]);
        }

        let mut ids: Vec<_> = result.line_items.iter().map(|i| &i.fertilizer_id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), result.line_items.len());

        let summed: f64 = result.line_items.iter().map(|i| i.cost).sum();
        if result.total_cost > 0.0 {
            assert_relative_eq!(summed, result.total_cost, max_relative = 1e-6);
        } else {
            assert_eq!(summed, 0.0);
        }

        for nutrient in result.achieved.concentrations.keys() {
            assert!(result.targets.concentrations.contains_key(nutrient));
        }
    }

    assert!(formulated > 100, "only {} of 300 random runs formulated", formulated);
}

// ============================================================================
// Section 3: CSV catalog
// ============================================================================

#[test]
fn test_csv_catalog_end_to_end() {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    writeln!(
        file,
        "id,name,nitrogen_percentage,phosphorus_percentage,potassium_percentage,calcium_percentage,price_per_unit,max_solubility,is_active"
    )
    .unwrap();
    writeln!(file, "1,Calcium nitrate,15.5,,,19.0,1.1,1200,true").unwrap();
    writeln!(file, "2,Potassium nitrate,13.0,,38.0,,1.8,316,true").unwrap();
    writeln!(file, "3,Monopotassium phosphate,,22.7,28.7,,2.4,226,true").unwrap();
    writeln!(file, "4,Old stock,20,20,20,,0.5,300,false").unwrap();
    file.flush().unwrap();

    let records = load_fertilizer_catalog(file.path()).unwrap();
    assert_eq!(records.len(), 4);
    assert!(!records[3].is_active);

    let request = FormulationRequest {
        targets: TargetSource::Hydroponic { base: BaseTargets::CropPhase(tomato_requirement()) },
        fertilizers: records,
        water: None,
        volume_liters: 1000.0,
    };
    let result = formulate(&request).unwrap();

    assert!(result.line_items.iter().all(|i| i.fertilizer_id != "4"));
    assert!(result.rejected_fertilizers.iter().any(|r| r.id == "4"));
    assert!(result.total_cost > 0.0);
}
