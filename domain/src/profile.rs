//! Hidden additive preference profile
//!
//! The ground truth a simulated user carries: normalized issue weights times
//! normalized value evaluations. It answers elicitation queries for the
//! engine and samples the partial ranking the engine starts from.

use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use tracing::debug;

use parley_engine::index::{Outcome, OutcomeIndex, ValueSlot};
use parley_engine::ranking::Ranking;
use parley_engine::{Bid, EngineError, PreferenceOracle};

use crate::error::{DomainFileError, Result};
use crate::file::ProfileSpec;

/// u(o) = Σ weight[i] · eval[i][slot_i], weights summing to 1 and each
/// issue's best value evaluated at 1.
#[derive(Debug, Clone, PartialEq)]
pub struct AdditiveProfile {
    weights: Vec<f64>,
    evaluations: Vec<Vec<f64>>,
    reservation: f64,
    queries: u64,
}

impl AdditiveProfile {
    /// Build from raw weights and evaluations in index order. Both are
    /// normalized; negative or non-finite numbers are rejected.
    pub fn new(
        index: &OutcomeIndex,
        weights: Vec<f64>,
        evaluations: Vec<Vec<f64>>,
        reservation: f64,
    ) -> Result<Self> {
        if weights.len() != index.issue_count() || evaluations.len() != index.issue_count() {
            return Err(DomainFileError::Profile(format!(
                "expected {} issues, got {} weights and {} evaluation lists",
                index.issue_count(),
                weights.len(),
                evaluations.len()
            )));
        }
        let bad = |v: &f64| !v.is_finite() || *v < 0.0;
        if weights.iter().any(bad) || evaluations.iter().flatten().any(bad) {
            return Err(DomainFileError::Profile(
                "weights and evaluations must be finite and non-negative".into(),
            ));
        }
        if !(0.0..=1.0).contains(&reservation) {
            return Err(DomainFileError::Profile(format!("reservation {reservation} outside [0, 1]")));
        }
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return Err(DomainFileError::Profile("issue weights sum to zero".into()));
        }

        let mut normalized = Vec::with_capacity(evaluations.len());
        for (position, evals) in evaluations.into_iter().enumerate() {
            if evals.len() != index.value_count(position) {
                return Err(DomainFileError::Profile(format!(
                    "issue {} has {} values but {} evaluations",
                    index.issue_name(position),
                    index.value_count(position),
                    evals.len()
                )));
            }
            let max = evals.iter().copied().fold(0.0, f64::max);
            normalized.push(if max > 0.0 { evals.iter().map(|e| e / max).collect() } else { evals });
        }

        Ok(AdditiveProfile {
            weights: weights.iter().map(|w| w / total).collect(),
            evaluations: normalized,
            reservation,
            queries: 0,
        })
    }

    /// Build from a file profile keyed by issue and value names.
    pub fn from_spec(index: &OutcomeIndex, spec: &ProfileSpec) -> Result<Self> {
        let mut weights = Vec::with_capacity(index.issue_count());
        let mut evaluations = Vec::with_capacity(index.issue_count());
        for position in 0..index.issue_count() {
            let name = index.issue_name(position);
            let issue = spec
                .issues
                .get(name)
                .ok_or_else(|| DomainFileError::Profile(format!("no profile entry for issue {name:?}")))?;
            let evals = (0..index.value_count(position))
                .map(|slot| {
                    let label = index.label(position, slot as ValueSlot);
                    issue.evaluations.get(label).copied().ok_or_else(|| {
                        DomainFileError::Profile(format!("issue {name:?} has no evaluation for {label:?}"))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            weights.push(issue.weight);
            evaluations.push(evals);
        }
        Self::new(index, weights, evaluations, spec.reservation)
    }

    /// Uniformly random weights and evaluations.
    pub fn random(index: &OutcomeIndex, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let weights: Vec<f64> = (0..index.issue_count()).map(|_| rng.gen_range(0.05..1.0)).collect();
        let total: f64 = weights.iter().sum();
        let evaluations = (0..index.issue_count())
            .map(|position| {
                let evals: Vec<f64> = (0..index.value_count(position)).map(|_| rng.gen::<f64>()).collect();
                let max = evals.iter().copied().fold(f64::MIN_POSITIVE, f64::max);
                evals.iter().map(|e| e / max).collect()
            })
            .collect();
        AdditiveProfile {
            weights: weights.iter().map(|w| w / total).collect(),
            evaluations,
            reservation: 0.0,
            queries: 0,
        }
    }

    /// Opposed preferences: same weights, each issue's evaluations reversed
    /// (`1 - e`, renormalized).
    pub fn mirrored(&self) -> Self {
        let evaluations = self
            .evaluations
            .iter()
            .map(|evals| {
                let flipped: Vec<f64> = evals.iter().map(|e| 1.0 - e).collect();
                let max = flipped.iter().copied().fold(0.0, f64::max);
                if max > 0.0 {
                    flipped.iter().map(|e| e / max).collect()
                } else {
                    flipped
                }
            })
            .collect();
        AdditiveProfile {
            weights: self.weights.clone(),
            evaluations,
            reservation: self.reservation,
            queries: 0,
        }
    }

    pub fn with_reservation(mut self, reservation: f64) -> Self {
        self.reservation = reservation.clamp(0.0, 1.0);
        self
    }

    pub fn reservation(&self) -> f64 {
        self.reservation
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Elicitation queries answered so far
    pub fn queries(&self) -> u64 {
        self.queries
    }

    /// True utility of an outcome
    pub fn utility(&self, outcome: &Outcome) -> f64 {
        outcome
            .slots()
            .iter()
            .enumerate()
            .map(|(position, &slot)| self.weights[position] * self.evaluations[position][slot as usize])
            .sum()
    }

    /// True utility of a bid
    pub fn bid_utility(&self, index: &OutcomeIndex, bid: &Bid) -> parley_engine::Result<f64> {
        let outcome = index.encode(bid)?;
        Ok(self.utility(&outcome))
    }

    /// Every outcome of the index, least to most preferred.
    pub fn sorted_outcomes(&self, index: &OutcomeIndex, limit: usize) -> parley_engine::Result<Vec<Outcome>> {
        let mut outcomes = index.enumerate(limit)?;
        outcomes.sort_by(|a, b| self.utility(a).total_cmp(&self.utility(b)));
        Ok(outcomes)
    }
}

impl PreferenceOracle for AdditiveProfile {
    /// Binary search by true utility; the ranking is assumed to be in true
    /// order already.
    fn elicit_rank(
        &mut self,
        index: &OutcomeIndex,
        outcome: &Outcome,
        ranking: &Ranking,
    ) -> parley_engine::Result<usize> {
        if !index.contains(outcome) {
            return Err(EngineError::Oracle(format!(
                "outcome {:?} is not part of the domain",
                outcome.slots()
            )));
        }
        self.queries += 1;
        let u = self.utility(outcome);
        Ok(ranking.as_slice().partition_point(|ranked| self.utility(ranked) < u))
    }

    fn reveal_utility(&self, _index: &OutcomeIndex, outcome: &Outcome) -> Option<f64> {
        Some(self.utility(outcome))
    }
}

/// Deterministic partial ranking of `size` distinct outcomes, least to most
/// preferred. The worst and the best outcome are always included. Fails when
/// the outcome space exceeds `limit`.
pub fn sample_ranking(
    profile: &AdditiveProfile,
    index: &OutcomeIndex,
    limit: usize,
    size: usize,
    seed: u64,
) -> parley_engine::Result<Vec<Bid>> {
    let all = profile.sorted_outcomes(index, limit)?;
    if all.len() < 2 {
        return Err(EngineError::InfeasibleRanking { len: all.len() });
    }
    let size = size.clamp(2, all.len());

    let mut rng = StdRng::seed_from_u64(seed);
    let mut picked: Vec<usize> = sample(&mut rng, all.len() - 2, size - 2)
        .into_iter()
        .map(|i| i + 1)
        .collect();
    picked.push(0);
    picked.push(all.len() - 1);
    picked.sort_unstable();

    debug!(size, outcomes = all.len(), seed, "sampled initial ranking");
    Ok(picked.into_iter().map(|i| index.decode(&all[i])).collect())
}
