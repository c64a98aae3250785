//! LP utility fitter
//!
//! Turns an ordinal ranking into an additive utility model. One LP variable
//! per (issue, value) slot, plus epsilon:
//!
//! ```text
//! maximize   ε
//! subject to u(b_i) + ε <= u(b_{i+1})   for consecutive ranked outcomes
//!            u(first) >= 0,  u(last) <= 1
//!            0 <= u_slot <= 1,  0 <= ε <= 1
//! ```
//!
//! where `u(b)` sums the slot utilities of the outcome's values. A failed solve
//! never touches the current model.

use tracing::{debug, info, warn};

use crate::domain::Bid;
use crate::error::{EngineError, Result};
use crate::index::{Outcome, OutcomeIndex};
use crate::ranking::Ranking;
use crate::simplex::{Comparison, Direction, LinearProgram, Var};

/// Fitted utility per global slot, plus the epsilon achieved.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueUtilities {
    slots: Vec<f64>,
    epsilon: f64,
}

impl ValueUtilities {
    /// Utility of one global slot
    pub fn slot(&self, global: usize) -> f64 {
        self.slots[global]
    }

    pub fn slots(&self) -> &[f64] {
        &self.slots
    }

    /// Minimum gap between consecutive ranked outcomes
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }
}

/// Owns the current utility model and refits it from rankings.
#[derive(Debug, Clone, Default)]
pub struct UtilityFitter {
    current: Option<ValueUtilities>,
    fits: u64,
    failures: u64,
}

impl UtilityFitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current model, if any fit has succeeded
    pub fn current(&self) -> Option<&ValueUtilities> {
        self.current.as_ref()
    }

    /// Successful fits so far
    pub fn fits(&self) -> u64 {
        self.fits
    }

    /// Failed fits so far
    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Refit from `ranking`. On error the previous model is kept.
    pub fn fit(&mut self, index: &OutcomeIndex, ranking: &Ranking) -> Result<&ValueUtilities> {
        let result = build_and_solve(index, ranking);
        self.record(result, ranking.len())
    }

    fn record(&mut self, result: Result<ValueUtilities>, ranked: usize) -> Result<&ValueUtilities> {
        match result {
            Ok(fitted) => {
                self.fits += 1;
                info!(ranked, epsilon = fitted.epsilon, "fitted value utilities");
                let fitted = self.current.insert(fitted);
                Ok(&*fitted)
            }
            Err(err) => {
                self.failures += 1;
                warn!(error = %err, ranked, "utility fit failed; keeping previous model");
                Err(err)
            }
        }
    }

    /// Additive own utility of an outcome under the current model.
    pub fn utility(&self, index: &OutcomeIndex, outcome: &Outcome) -> Result<f64> {
        let model = self
            .current
            .as_ref()
            .ok_or_else(|| EngineError::StaleModel("no utility model has been fitted yet".into()))?;
        if model.slots.len() != index.total_slots() {
            return Err(EngineError::StaleModel(format!(
                "model covers {} slots, index has {}",
                model.slots.len(),
                index.total_slots()
            )));
        }
        if !index.contains(outcome) {
            return Err(EngineError::StaleModel(format!(
                "outcome {:?} has slots outside the index",
                outcome.slots()
            )));
        }
        Ok(index.global_slots(outcome).map(|g| model.slots[g]).sum())
    }

    /// Label-level utility lookup.
    pub fn bid_utility(&self, index: &OutcomeIndex, bid: &Bid) -> Result<f64> {
        let outcome = index.encode(bid)?;
        self.utility(index, &outcome)
    }
}

fn build_and_solve(index: &OutcomeIndex, ranking: &Ranking) -> Result<ValueUtilities> {
    if ranking.len() < 2 {
        return Err(EngineError::InfeasibleRanking { len: ranking.len() });
    }
    if let Some(bad) = ranking.iter().find(|outcome| !index.contains(outcome)) {
        return Err(EngineError::StaleModel(format!(
            "ranked outcome {:?} has slots outside the index",
            bad.slots()
        )));
    }

    let mut lp = LinearProgram::new(Direction::Maximize);
    let slot_vars: Vec<Var> = (0..index.total_slots()).map(|_| lp.add_var(0.0, Some(1.0))).collect();
    let epsilon = lp.add_var(1.0, Some(1.0));

    let terms_of = |outcome: &Outcome, coef: f64| -> Vec<(Var, f64)> {
        index.global_slots(outcome).map(|g| (slot_vars[g], coef)).collect()
    };

    // u(b_i) - u(b_{i+1}) + ε <= 0
    for pair in ranking.as_slice().windows(2) {
        let mut terms = terms_of(&pair[0], 1.0);
        terms.extend(terms_of(&pair[1], -1.0));
        terms.push((epsilon, 1.0));
        lp.add_constraint(&terms, Comparison::Le, 0.0);
    }
    if let (Some(worst), Some(best)) = (ranking.worst(), ranking.best()) {
        lp.add_constraint(&terms_of(worst, 1.0), Comparison::Ge, 0.0);
        lp.add_constraint(&terms_of(best, 1.0), Comparison::Le, 1.0);
    }

    debug!(
        variables = lp.var_count(),
        constraints = lp.constraint_count(),
        "solving utility LP"
    );
    let solution = lp.solve()?;
    debug!(pivots = solution.pivots(), "utility LP solved");

    let slots = slot_vars
        .iter()
        .map(|&var| solution.value(var).clamp(0.0, 1.0))
        .collect();
    Ok(ValueUtilities { slots, epsilon: solution.value(epsilon).clamp(0.0, 1.0) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simplex::LpError;
    use crate::test_domain::{build_test_domain, full_test_ranking, partial_test_ranking, small_domain};

    fn small_ranking(index: &OutcomeIndex) -> Ranking {
        let bids = [("x", "p"), ("x", "q"), ("y", "q")];
        let outcomes = bids
            .iter()
            .map(|(a, b)| index.encode(&Bid::new().with(1, *a).with(2, *b)).unwrap())
            .collect();
        Ranking::new(outcomes).unwrap()
    }

    #[test]
    fn test_three_bid_ranking_strictly_increasing() {
        let index = OutcomeIndex::new(&small_domain()).unwrap();
        let ranking = small_ranking(&index);
        let mut fitter = UtilityFitter::new();
        let epsilon = fitter.fit(&index, &ranking).unwrap().epsilon();
        assert!((epsilon - 0.5).abs() < 1e-7);

        let utils: Vec<f64> = ranking.iter().map(|o| fitter.utility(&index, o).unwrap()).collect();
        assert!(utils[0] < utils[1] && utils[1] < utils[2]);
        for pair in utils.windows(2) {
            assert!(pair[1] - pair[0] >= epsilon - 1e-7);
        }
        assert!(utils[0] >= -1e-9 && utils[2] <= 1.0 + 1e-9);
    }

    #[test]
    fn test_full_ranking_monotone() {
        let index = OutcomeIndex::new(&build_test_domain()).unwrap();
        let ranking = Ranking::new(full_test_ranking(&index)).unwrap();
        let mut fitter = UtilityFitter::new();
        let epsilon = fitter.fit(&index, &ranking).unwrap().epsilon();
        assert!(epsilon > 0.0);
        let utils: Vec<f64> = ranking.iter().map(|o| fitter.utility(&index, o).unwrap()).collect();
        for pair in utils.windows(2) {
            assert!(pair[1] + 1e-7 >= pair[0] + epsilon, "{:?}", pair);
        }
        for &u in fitter.current().unwrap().slots() {
            assert!((0.0..=1.0).contains(&u));
        }
    }

    #[test]
    fn test_refit_is_idempotent() {
        let index = OutcomeIndex::new(&build_test_domain()).unwrap();
        let ranking = Ranking::new(partial_test_ranking(&index, 3)).unwrap();
        let mut fitter = UtilityFitter::new();
        let first = fitter.fit(&index, &ranking).unwrap().clone();
        let second = fitter.fit(&index, &ranking).unwrap().clone();
        for (a, b) in first.slots().iter().zip(second.slots()) {
            assert!((a - b).abs() < 1e-9);
        }
        assert_eq!(fitter.fits(), 2);
    }

    #[test]
    fn test_short_ranking_keeps_previous_model() {
        let index = OutcomeIndex::new(&small_domain()).unwrap();
        let mut fitter = UtilityFitter::new();
        let good = fitter.fit(&index, &small_ranking(&index)).unwrap().clone();

        let single = Ranking::new(vec![Outcome::from_slots(vec![0, 0])]).unwrap();
        assert_eq!(
            fitter.fit(&index, &single).unwrap_err(),
            EngineError::InfeasibleRanking { len: 1 }
        );
        assert_eq!(
            fitter.fit(&index, &Ranking::default()).unwrap_err(),
            EngineError::InfeasibleRanking { len: 0 }
        );
        assert_eq!(fitter.current(), Some(&good));
        assert_eq!(fitter.failures(), 2);
    }

    #[test]
    fn test_solver_failure_keeps_previous_model() {
        let index = OutcomeIndex::new(&small_domain()).unwrap();
        let mut fitter = UtilityFitter::new();
        let good = fitter.fit(&index, &small_ranking(&index)).unwrap().clone();

        let mut broken = LinearProgram::new(Direction::Maximize);
        broken.add_var(f64::NAN, Some(1.0));
        let lp_err = broken.solve().unwrap_err();
        assert_eq!(lp_err, LpError::NonFinite);

        let err = fitter.record(Err(lp_err.into()), 3).unwrap_err();
        assert_eq!(err, EngineError::Solver(LpError::NonFinite));
        assert!(err.is_fit_failure());
        assert_eq!(fitter.current(), Some(&good));
        assert_eq!(fitter.fits(), 1);
        assert_eq!(fitter.failures(), 1);
        assert!(fitter.utility(&index, &Outcome::from_slots(vec![1, 1])).is_ok());
    }

    #[test]
    fn test_utility_before_fit_is_stale() {
        let index = OutcomeIndex::new(&small_domain()).unwrap();
        let fitter = UtilityFitter::new();
        assert!(matches!(
            fitter.utility(&index, &Outcome::from_slots(vec![0, 0])),
            Err(EngineError::StaleModel(_))
        ));
    }

    #[test]
    fn test_utility_outside_index_is_stale() {
        let index = OutcomeIndex::new(&small_domain()).unwrap();
        let mut fitter = UtilityFitter::new();
        fitter.fit(&index, &small_ranking(&index)).unwrap();
        assert!(matches!(
            fitter.utility(&index, &Outcome::from_slots(vec![0, 7])),
            Err(EngineError::StaleModel(_))
        ));
    }

    #[test]
    fn test_bid_utility_by_label() {
        let index = OutcomeIndex::new(&small_domain()).unwrap();
        let mut fitter = UtilityFitter::new();
        fitter.fit(&index, &small_ranking(&index)).unwrap();
        let best = fitter.bid_utility(&index, &Bid::new().with(1, "y").with(2, "q")).unwrap();
        assert!((best - 1.0).abs() < 1e-7);
        assert!(matches!(
            fitter.bid_utility(&index, &Bid::new().with(1, "w").with(2, "q")),
            Err(EngineError::UnknownValue { issue: 1, .. })
        ));
    }
}
