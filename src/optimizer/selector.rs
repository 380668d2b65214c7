//! Gap-filling selection loop
//!
//! A small state machine, `Scanning → Selecting → Dosing → Updating`, driven
//! by `step`, which consumes the current state and accumulator and returns the
//! next pair. Nothing is shared between steps except what the accumulator
//! carries, and every `Selecting` pass spends one unit of the pass budget, so
//! the loop is bounded by `max_selection_passes × pool size` scorer calls.

use crate::composition::FertilizerCandidate;
use crate::config::EngineConfig;
use crate::nutrients::{AchievedState, Nutrient, NutrientMap, NutrientTargetSet};
use crate::optimizer::concentration::{calculate_dosage, DosageCalculation};
use crate::optimizer::scorer::best_candidate;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Every driving nutrient reached the sufficiency ratio
    TargetsSatisfied,
    /// Specialist cap reached and the balanced fallback was spent or unavailable
    FertilizerLimit,
    /// No unused candidate scores above zero
    NoScoringCandidate,
    PassBudgetExhausted,
}

/// Why a picked candidate was not added
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscardReason {
    NoUsableDosage,
    ExceedsSolubility,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscardedCandidate {
    pub candidate_index: usize,
    pub reason: DiscardReason,
}

/// One accepted pick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub candidate_index: usize,
    pub score: f64,
    pub calculation: DosageCalculation,
    /// mg/L delivered per nutrient, over the full composition
    pub contribution: NutrientMap,
    pub balanced_fallback: bool,
}

impl Selection {
    pub fn dosage(&self) -> f64 {
        self.calculation.dosage
    }
}

/// Loop state
#[derive(Debug, Clone, PartialEq)]
pub enum SelectorState {
    Scanning,
    Selecting { balanced_only: bool },
    Dosing { index: usize, score: f64, balanced_only: bool },
    Updating { index: usize, score: f64, calculation: DosageCalculation, balanced_only: bool },
    Done(StopReason),
}

/// Everything threaded from one step to the next
#[derive(Debug, Clone)]
pub struct SelectionAccumulator {
    pub achieved: AchievedState,
    pub selections: Vec<Selection>,
    pub discarded: Vec<DiscardedCandidate>,
    used: FxHashSet<usize>,
    passes: usize,
    fallback_spent: bool,
}

impl SelectionAccumulator {
    pub fn new(start: AchievedState) -> Self {
        Self {
            achieved: start,
            selections: Vec::new(),
            discarded: Vec::new(),
            used: FxHashSet::default(),
            passes: 0,
            fallback_spent: false,
        }
    }

    pub fn passes(&self) -> usize {
        self.passes
    }
}

/// Final output of the loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionOutcome {
    pub selections: Vec<Selection>,
    pub achieved: AchievedState,
    pub discarded: Vec<DiscardedCandidate>,
    pub stop_reason: StopReason,
    pub passes: usize,
}

/// Inputs that stay fixed for the whole run
pub struct SelectionContext<'a> {
    pub pool: &'a [FertilizerCandidate],
    pub targets: &'a NutrientTargetSet,
    pub config: &'a EngineConfig,
}

impl SelectionContext<'_> {
    /// Nutrients whose closure ends the run: primaries with a positive target,
    /// or every positive target when no primary has one
    fn driving_nutrients(&self) -> Vec<Nutrient> {
        let positive: Vec<Nutrient> = self
            .targets
            .concentrations
            .iter()
            .filter(|(_, t)| **t > 0.0)
            .map(|(n, _)| *n)
            .collect();
        let primary: Vec<Nutrient> = positive.iter().copied().filter(|n| n.is_primary()).collect();
        if primary.is_empty() {
            positive
        } else {
            primary
        }
    }

    fn is_sufficient(&self, achieved: &AchievedState) -> bool {
        self.driving_nutrients().iter().all(|n| {
            achieved.get(*n) >= self.config.sufficiency_ratio * self.targets.target(*n)
        })
    }
}

/// Advance the loop by one transition
pub fn step(
    state: SelectorState,
    mut acc: SelectionAccumulator,
    ctx: &SelectionContext<'_>,
) -> (SelectorState, SelectionAccumulator) {
    let config = ctx.config;

    match state {
        SelectorState::Scanning => {
            let next = if ctx.is_sufficient(&acc.achieved) {
                SelectorState::Done(StopReason::TargetsSatisfied)
            } else if acc.passes >= config.max_selection_passes {
                SelectorState::Done(StopReason::PassBudgetExhausted)
            } else if acc.selections.len() >= config.max_fertilizers {
                if acc.fallback_spent {
                    SelectorState::Done(StopReason::FertilizerLimit)
                } else {
                    acc.fallback_spent = true;
                    SelectorState::Selecting { balanced_only: true }
                }
            } else {
                SelectorState::Selecting { balanced_only: false }
            };
            (next, acc)
        }

        SelectorState::Selecting { balanced_only } => {
            acc.passes += 1;
            let gaps = acc.achieved.gaps(ctx.targets);
            let best = best_candidate(ctx.pool, &gaps, config, |idx, candidate| {
                !acc.used.contains(&idx)
                    && (!balanced_only
                        || candidate.is_balanced(config.balanced_min_percent, config.balanced_min_nutrients))
            });

            let next = match best {
                Some((index, score)) => {
                    tracing::debug!(
                        "Pass {}: selected '{}' (score {:.2}{})",
                        acc.passes,
                        ctx.pool[index].name,
                        score,
                        if balanced_only { ", balanced fallback" } else { "" }
                    );
                    SelectorState::Dosing { index, score, balanced_only }
                }
                None if balanced_only => SelectorState::Done(StopReason::FertilizerLimit),
                None => SelectorState::Done(StopReason::NoScoringCandidate),
            };
            (next, acc)
        }

        SelectorState::Dosing { index, score, balanced_only } => {
            let candidate = &ctx.pool[index];
            acc.used.insert(index);

            let gaps = acc.achieved.gaps(ctx.targets);
            let ceiling = config.solubility_safety_factor * candidate.max_solubility;

            let next = match calculate_dosage(&candidate.composition, &gaps, config) {
                Some(calculation) if calculation.dosage > 0.0 && calculation.dosage <= ceiling => {
                    SelectorState::Updating { index, score, calculation, balanced_only }
                }
                Some(calculation) if calculation.dosage > 0.0 => {
                    tracing::warn!(
                        "Discarding '{}': dosage {:.3} g/L exceeds solubility cap {:.3} g/L",
                        candidate.name,
                        calculation.dosage,
                        ceiling
                    );
                    acc.discarded.push(DiscardedCandidate {
                        candidate_index: index,
                        reason: DiscardReason::ExceedsSolubility,
                    });
                    SelectorState::Scanning
                }
                _ => {
                    tracing::warn!("Discarding '{}': no usable dosage", candidate.name);
                    acc.discarded.push(DiscardedCandidate {
                        candidate_index: index,
                        reason: DiscardReason::NoUsableDosage,
                    });
                    SelectorState::Scanning
                }
            };
            (next, acc)
        }

        SelectorState::Updating { index, score, calculation, balanced_only } => {
            let contribution = ctx.pool[index].composition.contribution_at(calculation.dosage);
            tracing::debug!(
                "Dosed '{}' at {:.3} g/L (limited by {})",
                ctx.pool[index].name,
                calculation.dosage,
                calculation.limiting_nutrient
            );

            acc.achieved = acc.achieved.with_contribution(&contribution);
            acc.selections.push(Selection {
                candidate_index: index,
                score,
                calculation,
                contribution,
                balanced_fallback: balanced_only,
            });
            (SelectorState::Scanning, acc)
        }

        done @ SelectorState::Done(_) => (done, acc),
    }
}

/// Run the loop from `start` to `Done`
pub fn select_fertilizers(ctx: &SelectionContext<'_>, start: AchievedState) -> SelectionOutcome {
    let mut state = SelectorState::Scanning;
    let mut acc = SelectionAccumulator::new(start);

    let stop_reason = loop {
        if let SelectorState::Done(reason) = state {
            break reason;
        }
        (state, acc) = step(state, acc, ctx);
    };

    tracing::debug!(
        "Selection finished after {} passes: {} selected, {} discarded ({:?})",
        acc.passes,
        acc.selections.len(),
        acc.discarded.len(),
        stop_reason
    );

    SelectionOutcome {
        selections: acc.selections,
        achieved: acc.achieved,
        discarded: acc.discarded,
        stop_reason,
        passes: acc.passes,
    }
}
