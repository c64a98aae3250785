//! Active elicitation: decide which unranked outcomes are worth a query
//!
//! Each unranked outcome gets a combined score net of the query cost:
//!
//! ```text
//! z(o) = w · U(o) + (1 - w) · aspiration - cost
//! ```
//!
//! and the best already-ranked outcome sets the bar `v` (same formula without
//! the cost). Best-first: pop the highest `z`; stop once it falls below `v`,
//! otherwise ask the oracle, insert, refit, raise `v` and rescore the rest.
//! The unranked set shrinks by one per query, so a pass ends after at most
//! `|unranked|` queries.

use ordered_float::OrderedFloat;
use rayon::prelude::*;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::fitter::UtilityFitter;
use crate::index::{Outcome, OutcomeIndex};
use crate::ranking::Ranking;

/// External source of true preference order.
pub trait PreferenceOracle {
    /// Position (0 = least preferred, `ranking.len()` = most preferred) at
    /// which `outcome` belongs in `ranking`.
    fn elicit_rank(&mut self, index: &OutcomeIndex, outcome: &Outcome, ranking: &Ranking) -> Result<usize>;

    /// True utility, if the oracle knows it. Only used to track prediction accuracy.
    fn reveal_utility(&self, _index: &OutcomeIndex, _outcome: &Outcome) -> Option<f64> {
        None
    }
}

/// Mixture of own utility and a flat aspiration baseline.
pub fn combined_score(mixture_weight: f64, utility: f64, aspiration: f64) -> f64 {
    mixture_weight * utility + (1.0 - mixture_weight) * aspiration
}

/// Inputs of one elicitation pass.
#[derive(Debug, Clone, Copy)]
pub struct PassParams {
    pub mixture_weight: f64,
    pub aspiration: f64,
    pub cost: f64,
    pub max_queries: Option<usize>,
}

impl PassParams {
    /// Scores built from these must compare meaningfully against each other.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.mixture_weight) {
            return Err(EngineError::InvalidParameter(format!(
                "mixture weight must be in [0, 1], got {}",
                self.mixture_weight
            )));
        }
        if !self.aspiration.is_finite() {
            return Err(EngineError::InvalidParameter(format!(
                "aspiration must be finite, got {}",
                self.aspiration
            )));
        }
        if !self.cost.is_finite() || self.cost < 0.0 {
            return Err(EngineError::InvalidParameter(format!(
                "query cost must be finite and non-negative, got {}",
                self.cost
            )));
        }
        Ok(())
    }
}

/// Why a pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Best unranked score fell below the best known score
    NotWorthIt,
    /// Every outcome is ranked
    Exhausted,
    /// Per-pass query cap reached
    QueryCap,
}

/// Summary of one pass.
#[derive(Debug, Clone, Serialize)]
pub struct ElicitationReport {
    pub elicited: Vec<Outcome>,
    pub total_cost: f64,
    pub best_known_before: f64,
    pub best_known_after: f64,
    pub stop: StopReason,
}

/// Heap entry: highest `z` first, earlier insertion wins ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Candidate {
    z: OrderedFloat<f64>,
    order: Reverse<usize>,
}

/// Running error of utility predictions against revealed true utilities.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PredictionAccuracy {
    samples: u64,
    relative_error_sum: f64,
}

impl PredictionAccuracy {
    fn record(&mut self, predicted: f64, actual: f64) {
        if actual > 0.0 {
            self.samples += 1;
            self.relative_error_sum += (actual - predicted).abs() / actual;
        }
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// Mean relative error, `None` before the first sample
    pub fn mean_relative_error(&self) -> Option<f64> {
        (self.samples > 0).then(|| self.relative_error_sum / self.samples as f64)
    }
}

/// Elicitation loop state kept across passes.
#[derive(Debug, Clone, Default)]
pub struct Elicitor {
    queries: u64,
    cost_spent: f64,
    accuracy: PredictionAccuracy,
}

impl Elicitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total queries over all passes
    pub fn queries(&self) -> u64 {
        self.queries
    }

    /// Total cost over all passes
    pub fn cost_spent(&self) -> f64 {
        self.cost_spent
    }

    pub fn accuracy(&self) -> &PredictionAccuracy {
        &self.accuracy
    }

    /// Run one best-first pass. Ranked outcomes move from `unranked` into
    /// `ranking`; the fitter is refit after every query. Fit failures keep the
    /// previous model and the pass continues; oracle errors abort the pass.
    pub fn run_pass<O: PreferenceOracle + ?Sized>(
        &mut self,
        index: &OutcomeIndex,
        fitter: &mut UtilityFitter,
        ranking: &mut Ranking,
        unranked: &mut Vec<Outcome>,
        oracle: &mut O,
        params: PassParams,
    ) -> Result<ElicitationReport> {
        params.validate()?;
        let mut best_known = best_known_score(index, fitter, ranking, &params)?;
        let best_known_before = best_known;
        let mut elicited = Vec::new();
        let mut total_cost = 0.0;

        let stop = loop {
            if params.max_queries.is_some_and(|cap| elicited.len() >= cap) {
                break StopReason::QueryCap;
            }
            let Some((z, slot)) = top_candidate(index, fitter, unranked, &params)? else {
                break StopReason::Exhausted;
            };
            if z < best_known {
                break StopReason::NotWorthIt;
            }

            let outcome = unranked[slot].clone();
            let predicted = fitter.utility(index, &outcome)?;
            let position = oracle.elicit_rank(index, &outcome, ranking)?;
            ranking.insert(position, outcome.clone())?;
            unranked.remove(slot);
            debug!(
                outcome = ?outcome.slots(),
                position,
                z,
                best_known,
                remaining = unranked.len(),
                "elicited outcome rank"
            );

            if let Err(err) = fitter.fit(index, ranking) {
                if !err.is_fit_failure() {
                    return Err(err);
                }
            }
            if let Some(actual) = oracle.reveal_utility(index, &outcome) {
                self.accuracy.record(predicted, actual);
            }

            total_cost += params.cost;
            self.queries += 1;
            self.cost_spent += params.cost;
            elicited.push(outcome);
            best_known = best_known_score(index, fitter, ranking, &params)?;
        };

        debug!(?stop, queries = elicited.len(), total_cost, "elicitation pass finished");
        Ok(ElicitationReport {
            elicited,
            total_cost,
            best_known_before,
            best_known_after: best_known,
            stop,
        })
    }
}

/// Best combined score (no cost term) over the ranked outcomes.
fn best_known_score(
    index: &OutcomeIndex,
    fitter: &UtilityFitter,
    ranking: &Ranking,
    params: &PassParams,
) -> Result<f64> {
    let mut best = f64::NEG_INFINITY;
    for outcome in ranking.iter() {
        let u = fitter.utility(index, outcome)?;
        best = best.max(combined_score(params.mixture_weight, u, params.aspiration));
    }
    Ok(best)
}

/// Highest-`z` unranked outcome and its position in `unranked`.
fn top_candidate(
    index: &OutcomeIndex,
    fitter: &UtilityFitter,
    unranked: &[Outcome],
    params: &PassParams,
) -> Result<Option<(f64, usize)>> {
    let utilities: Result<Vec<f64>> = unranked
        .par_iter()
        .map(|outcome| fitter.utility(index, outcome))
        .collect();
    let mut heap: BinaryHeap<Candidate> = utilities?
        .into_iter()
        .enumerate()
        .map(|(order, u)| Candidate {
            z: OrderedFloat(combined_score(params.mixture_weight, u, params.aspiration) - params.cost),
            order: Reverse(order),
        })
        .collect();
    Ok(heap.pop().map(|c| (c.z.into_inner(), c.order.0)))
}

/// Oracle that fails every query. Useful when elicitation must never happen.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOracle;

impl PreferenceOracle for NoOracle {
    fn elicit_rank(&mut self, _index: &OutcomeIndex, _outcome: &Outcome, _ranking: &Ranking) -> Result<usize> {
        Err(EngineError::Oracle("no preference oracle available".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_domain::{build_test_domain, partial_test_ranking, test_utility};
    use std::collections::HashSet;

    /// Ranks by the fixture's hidden utility and counts queries.
    struct FixtureOracle {
        asked: Vec<Outcome>,
    }

    impl PreferenceOracle for FixtureOracle {
        fn elicit_rank(&mut self, _index: &OutcomeIndex, outcome: &Outcome, ranking: &Ranking) -> Result<usize> {
            self.asked.push(outcome.clone());
            let u = test_utility(outcome);
            Ok(ranking.iter().filter(|o| test_utility(o) < u).count())
        }

        fn reveal_utility(&self, _index: &OutcomeIndex, outcome: &Outcome) -> Option<f64> {
            Some(test_utility(outcome))
        }
    }

    struct Setup {
        index: OutcomeIndex,
        fitter: UtilityFitter,
        ranking: Ranking,
        unranked: Vec<Outcome>,
    }

    fn setup(stride: usize) -> Setup {
        let index = OutcomeIndex::new(&build_test_domain()).unwrap();
        let ranking = Ranking::new(partial_test_ranking(&index, stride)).unwrap();
        let unranked = index.enumerate_excluding(1_000, ranking.members()).unwrap();
        let mut fitter = UtilityFitter::new();
        fitter.fit(&index, &ranking).unwrap();
        Setup { index, fitter, ranking, unranked }
    }

    fn params(cost: f64) -> PassParams {
        PassParams { mixture_weight: 1.0, aspiration: 0.0, cost, max_queries: None }
    }

    #[test]
    fn test_combined_score_mixture() {
        assert!((combined_score(1.0, 0.8, 0.3) - 0.8).abs() < 1e-12);
        assert!((combined_score(0.0, 0.8, 0.3) - 0.3).abs() < 1e-12);
        assert!((combined_score(0.5, 0.8, 0.2) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_prohibitive_cost_elicits_nothing() {
        let mut s = setup(4);
        let before = s.unranked.len();
        let mut oracle = FixtureOracle { asked: vec![] };
        let mut elicitor = Elicitor::new();
        let report = elicitor
            .run_pass(&s.index, &mut s.fitter, &mut s.ranking, &mut s.unranked, &mut oracle, params(10.0))
            .unwrap();
        assert!(report.elicited.is_empty());
        assert_eq!(report.stop, StopReason::NotWorthIt);
        assert!(oracle.asked.is_empty());
        assert_eq!(s.unranked.len(), before);
        assert_eq!(elicitor.queries(), 0);
    }

    #[test]
    fn test_free_queries_never_repeat_and_terminate() {
        let mut s = setup(3);
        let unknown = s.unranked.len();
        let total = unknown + s.ranking.len();
        let mut oracle = FixtureOracle { asked: vec![] };
        let mut elicitor = Elicitor::new();
        let report = elicitor
            .run_pass(&s.index, &mut s.fitter, &mut s.ranking, &mut s.unranked, &mut oracle, params(0.0))
            .unwrap();

        assert!(report.elicited.len() <= unknown);
        let distinct: HashSet<_> = oracle.asked.iter().cloned().collect();
        assert_eq!(distinct.len(), oracle.asked.len());
        assert_eq!(s.unranked.len(), unknown - report.elicited.len());
        assert_eq!(s.ranking.len() + s.unranked.len(), total);
        for outcome in &s.unranked {
            assert!(!s.ranking.contains(outcome));
        }
        assert!(report.best_known_after >= report.best_known_before - 1e-9);
    }

    #[test]
    fn test_ranking_stays_in_true_order() {
        let mut s = setup(3);
        let mut oracle = FixtureOracle { asked: vec![] };
        let mut elicitor = Elicitor::new();
        let capped = PassParams { max_queries: Some(5), ..params(0.0) };
        elicitor
            .run_pass(&s.index, &mut s.fitter, &mut s.ranking, &mut s.unranked, &mut oracle, capped)
            .unwrap();
        for pair in s.ranking.as_slice().windows(2) {
            assert!(test_utility(&pair[0]) < test_utility(&pair[1]));
        }
    }

    #[test]
    fn test_query_cap_respected() {
        let mut s = setup(3);
        let mut oracle = FixtureOracle { asked: vec![] };
        let mut elicitor = Elicitor::new();
        let capped = PassParams { max_queries: Some(2), mixture_weight: 0.0, aspiration: 0.5, cost: 0.0 };
        // Flat scores: every candidate ties the best known, so only the cap stops the pass
        let report = elicitor
            .run_pass(&s.index, &mut s.fitter, &mut s.ranking, &mut s.unranked, &mut oracle, capped)
            .unwrap();
        assert_eq!(report.elicited.len(), 2);
        assert_eq!(report.stop, StopReason::QueryCap);
        assert_eq!(elicitor.queries(), 2);
    }

    #[test]
    fn test_ties_broken_by_insertion_order() {
        let mut s = setup(3);
        let first_unranked = s.unranked[0].clone();
        let mut oracle = FixtureOracle { asked: vec![] };
        let mut elicitor = Elicitor::new();
        let flat = PassParams { max_queries: Some(1), mixture_weight: 0.0, aspiration: 0.5, cost: 0.0 };
        elicitor
            .run_pass(&s.index, &mut s.fitter, &mut s.ranking, &mut s.unranked, &mut oracle, flat)
            .unwrap();
        assert_eq!(oracle.asked, vec![first_unranked]);
    }

    #[test]
    fn test_accuracy_and_cost_tracked() {
        let mut s = setup(3);
        let mut oracle = FixtureOracle { asked: vec![] };
        let mut elicitor = Elicitor::new();
        let flat = PassParams { max_queries: Some(3), mixture_weight: 0.0, aspiration: 0.5, cost: 0.0 };
        elicitor
            .run_pass(&s.index, &mut s.fitter, &mut s.ranking, &mut s.unranked, &mut oracle, flat)
            .unwrap();
        assert_eq!(elicitor.accuracy().samples(), 3);
        assert!(elicitor.accuracy().mean_relative_error().is_some());

        let priced = PassParams { max_queries: None, ..params(0.001) };
        let report = elicitor
            .run_pass(&s.index, &mut s.fitter, &mut s.ranking, &mut s.unranked, &mut oracle, priced)
            .unwrap();
        let expected = report.elicited.len() as f64 * 0.001;
        assert!((report.total_cost - expected).abs() < 1e-12);
        assert!((elicitor.cost_spent() - expected).abs() < 1e-12);
        assert_eq!(elicitor.queries(), 3 + report.elicited.len() as u64);
    }

    #[test]
    fn test_non_finite_params_rejected_before_any_query() {
        let mut s = setup(3);
        let before = s.unranked.len();
        let mut oracle = FixtureOracle { asked: vec![] };
        let mut elicitor = Elicitor::new();
        let bad = [
            PassParams { mixture_weight: f64::NAN, ..params(0.0) },
            PassParams { mixture_weight: 1.5, ..params(0.0) },
            PassParams { aspiration: f64::INFINITY, ..params(0.0) },
            params(f64::NAN),
            params(f64::INFINITY),
            params(-0.1),
        ];
        for p in bad {
            let err = elicitor
                .run_pass(&s.index, &mut s.fitter, &mut s.ranking, &mut s.unranked, &mut oracle, p)
                .unwrap_err();
            assert!(matches!(err, EngineError::InvalidParameter(_)), "{p:?}");
        }
        assert!(oracle.asked.is_empty());
        assert_eq!(s.unranked.len(), before);
        assert_eq!(elicitor.queries(), 0);
        assert_eq!(elicitor.cost_spent(), 0.0);
    }

    #[test]
    fn test_oracle_failure_aborts_pass() {
        let mut s = setup(3);
        let before = s.unranked.len();
        let mut elicitor = Elicitor::new();
        let err = elicitor
            .run_pass(&s.index, &mut s.fitter, &mut s.ranking, &mut s.unranked, &mut NoOracle, params(0.0))
            .unwrap_err();
        assert!(matches!(err, EngineError::Oracle(_)));
        assert_eq!(s.unranked.len(), before);
    }
}
