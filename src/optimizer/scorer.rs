//! Candidate scoring against the current gap
//!
//! score = Σ min(w, c/ref × w) over nutrients the fertilizer supplies and the
//! solution still lacks, plus max(0, ceiling - price) once that sum is
//! positive. A fertilizer that closes no open gap scores exactly 0.

use crate::composition::FertilizerCandidate;
use crate::config::EngineConfig;
use crate::nutrients::NutrientMap;
use std::cmp::Ordering;

/// Nutrient part of the score
pub fn nutrient_score(candidate: &FertilizerCandidate, gaps: &NutrientMap, config: &EngineConfig) -> f64 {
    candidate
        .composition
        .iter()
        .filter(|(n, _)| gaps.get(n).copied().unwrap_or(0.0) > 0.0)
        .filter_map(|(n, pct)| {
            let w = config.weight_for(n)?;
            Some((pct / w.reference_percent * w.weight).min(w.weight))
        })
        .sum()
}

/// Cost-efficiency bonus; unknown prices earn none
pub fn cost_bonus(candidate: &FertilizerCandidate, config: &EngineConfig) -> f64 {
    candidate
        .price_per_unit
        .map(|price| (config.cost_ceiling - price).max(0.0))
        .unwrap_or(0.0)
}

/// Full score for one candidate
pub fn score(candidate: &FertilizerCandidate, gaps: &NutrientMap, config: &EngineConfig) -> f64 {
    let nutrient_part = nutrient_score(candidate, gaps, config);
    if nutrient_part > 0.0 {
        nutrient_part + cost_bonus(candidate, config)
    } else {
        0.0
    }
}

/// Order two scored candidates: score desc, price asc, catalog index asc
pub fn compare_ranked(
    a: (usize, f64, &FertilizerCandidate),
    b: (usize, f64, &FertilizerCandidate),
) -> Ordering {
    b.1.total_cmp(&a.1)
        .then_with(|| a.2.sort_price().total_cmp(&b.2.sort_price()))
        .then_with(|| a.0.cmp(&b.0))
}

/// Best positive-scoring candidate among those `eligible` admits
pub fn best_candidate<F>(
    pool: &[FertilizerCandidate],
    gaps: &NutrientMap,
    config: &EngineConfig,
    eligible: F,
) -> Option<(usize, f64)>
where
    F: Fn(usize, &FertilizerCandidate) -> bool,
{
    pool.iter()
        .enumerate()
        .filter(|(idx, c)| eligible(*idx, *c))
        .map(|(idx, c)| (idx, score(c, gaps, config), c))
        .filter(|(_, s, _)| *s > 0.0)
        .min_by(|a, b| compare_ranked(*a, *b))
        .map(|(idx, s, _)| (idx, s))
}
