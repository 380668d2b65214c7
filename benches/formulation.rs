use criterion::{black_box, criterion_group, criterion_main, Criterion};
use nutrient_formulator::data::NutrientFields;
use nutrient_formulator::{
    BaseTargets, CropPhaseRequirement, FertilizerRecord, FormulationEngine, FormulationRequest, Nutrient,
    TargetSource,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn synthetic_catalog(size: usize) -> Vec<FertilizerRecord> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..size)
        .map(|i| {
            let mut fields = NutrientFields::default();
            for nutrient in Nutrient::ALL {
                if rng.gen_bool(0.3) {
                    fields.set(nutrient, Some(rng.gen_range(1.0..40.0)));
                }
            }
            fields.set(Nutrient::ALL[i % 3], Some(rng.gen_range(5.0..45.0)));

            FertilizerRecord {
                id: format!("f{}", i),
                name: format!("Synthetic fertilizer {}", i),
                percentages: Some(fields),
                price_per_unit: Some(rng.gen_range(0.5..25.0)),
                max_solubility: Some(rng.gen_range(50.0..1200.0)),
                is_active: true,
                ..Default::default()
            }
        })
        .collect()
}

fn request(fertilizers: Vec<FertilizerRecord>) -> FormulationRequest {
    FormulationRequest {
        targets: TargetSource::Hydroponic {
            base: BaseTargets::CropPhase(CropPhaseRequirement {
                no3: Some(180.0),
                nh4: Some(10.0),
                h2po4: Some(45.0),
                k: Some(250.0),
                ca: Some(160.0),
                mg: Some(45.0),
                so4: Some(60.0),
                fe: Some(2.0),
                ..Default::default()
            }),
        },
        fertilizers,
        water: None,
        volume_liters: 1000.0,
    }
}

fn formulate_benchmark(c: &mut Criterion) {
    let engine = FormulationEngine::default();
    let single = request(synthetic_catalog(200));

    c.bench_function("formulate 200 fertilizers", |b| {
        b.iter(|| engine.formulate(black_box(&single)))
    });

    let batch: Vec<_> = (0..32).map(|_| single.clone()).collect();
    c.bench_function("formulate_batch 32 x 200 fertilizers", |b| {
        b.iter(|| engine.formulate_batch(black_box(&batch)))
    });
}

criterion_group!(benches, formulate_benchmark);
criterion_main!(benches);
