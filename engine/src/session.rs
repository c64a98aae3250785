//! Negotiation session engine
//!
//! One `NegotiationEngine` per negotiation. It owns every piece of mutable
//! state (observation table, utility model, ranking, unranked set, policy
//! state) and exposes the three turn-loop entry points:
//!
//! - [`NegotiationEngine::observe_offer`]
//! - [`NegotiationEngine::choose_turn_action`]
//! - [`NegotiationEngine::run_elicitation_pass`]
//!
//! Each call runs to completion before returning; there is no background work.

use serde::Serialize;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::domain::{Bid, Domain};
use crate::elicitation::{ElicitationReport, Elicitor, PassParams, PreferenceOracle};
use crate::error::{EngineError, Result};
use crate::fitter::UtilityFitter;
use crate::index::{Outcome, OutcomeIndex};
use crate::opponent::{FrequencyModel, OpponentSnapshot};
use crate::policy::{Decision, DecisionPolicy, OfferView, TurnInputs};
use crate::ranking::Ranking;

/// Action chosen for one turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnAction {
    Offer(Bid),
    Accept,
    End,
}

/// Cumulative counters of one session.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub turns: u64,
    pub offers_observed: u64,
    pub ranked: usize,
    pub unranked: usize,
    pub fits: u64,
    pub fit_failures: u64,
    pub elicitations: u64,
    pub elicitation_cost: f64,
    pub epsilon: Option<f64>,
    pub mean_prediction_error: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct NegotiationEngine {
    config: EngineConfig,
    index: OutcomeIndex,
    opponent: FrequencyModel,
    fitter: UtilityFitter,
    ranking: Ranking,
    unranked: Vec<Outcome>,
    elicitor: Elicitor,
    policy: DecisionPolicy,
    last_offer: Option<Outcome>,
    previous_offer: Option<Outcome>,
}

impl NegotiationEngine {
    /// Build an engine from a domain and an initial ranking, least to most
    /// preferred. Fits the utility model once, so every later utility query
    /// has a model to work with.
    pub fn new(domain: &Domain, initial_ranking: &[Bid], config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let index = OutcomeIndex::new(domain)?;
        if initial_ranking.len() < 2 {
            return Err(EngineError::InfeasibleRanking { len: initial_ranking.len() });
        }

        let outcomes = initial_ranking
            .iter()
            .map(|bid| index.encode(bid))
            .collect::<Result<Vec<_>>>()?;
        let ranking = Ranking::new(outcomes)?;
        let unranked = index.enumerate_excluding(config.max_outcomes, ranking.members())?;

        let mut fitter = UtilityFitter::new();
        fitter.fit(&index, &ranking)?;

        info!(
            domain = %domain.name,
            issues = index.issue_count(),
            ranked = ranking.len(),
            unranked = unranked.len(),
            "negotiation engine ready"
        );

        Ok(NegotiationEngine {
            opponent: FrequencyModel::new(&index),
            policy: DecisionPolicy::new(&config),
            config,
            index,
            fitter,
            ranking,
            unranked,
            elicitor: Elicitor::new(),
            last_offer: None,
            previous_offer: None,
        })
    }

    /// Record an opponent offer in the observation table.
    pub fn observe_offer(&mut self, bid: &Bid) -> Result<()> {
        let outcome = self.index.encode(bid)?;
        self.opponent.observe(&outcome)?;
        self.previous_offer = self.last_offer.replace(outcome);
        debug!(observations = self.opponent.observations(), offer = %bid, "observed opponent offer");
        Ok(())
    }

    /// Decide this turn's action given the offer on the table (if any), the
    /// normalized time `t` and the reservation value.
    pub fn choose_turn_action(
        &mut self,
        current_offer: Option<&Bid>,
        time: f64,
        reservation: f64,
    ) -> Result<TurnAction> {
        let time = time.clamp(0.0, 1.0);
        let offer = current_offer.map(|bid| self.index.encode(bid)).transpose()?;

        let own_utilities = self
            .ranking
            .iter()
            .map(|outcome| self.fitter.utility(&self.index, outcome))
            .collect::<Result<Vec<_>>>()?;
        let opponent_utilities = self.opponent.estimate_many(self.ranking.as_slice())?;

        let view = match &offer {
            Some(outcome) => {
                // The offer on the table is normally the last one observed
                let previous = if self.last_offer.as_ref() == Some(outcome) {
                    self.previous_offer.as_ref()
                } else {
                    self.last_offer.as_ref()
                };
                Some(OfferView {
                    outcome,
                    own_utility: self.fitter.utility(&self.index, outcome)?,
                    opponent_utility: self.opponent.estimate_utility(outcome)?,
                    previous_opponent_utility: previous
                        .map(|o| self.opponent.estimate_utility(o))
                        .transpose()?,
                })
            }
            None => None,
        };

        let decision = self.policy.decide(&TurnInputs {
            ranked: self.ranking.as_slice(),
            own_utilities: &own_utilities,
            opponent_utilities: &opponent_utilities,
            offer: view,
            time,
            reservation,
        });

        let action = match decision {
            Decision::Offer(outcome) => TurnAction::Offer(self.index.decode(&outcome)),
            Decision::Accept => TurnAction::Accept,
            Decision::End => TurnAction::End,
        };
        info!(
            turn = self.policy.turns(),
            time,
            aspiration = self.policy.aspiration(),
            ?action,
            "turn decided"
        );
        Ok(action)
    }

    /// One best-first elicitation pass at the current aspiration. Finite
    /// mixture weights are clamped to `[0, 1]`; a non-finite weight or a
    /// non-finite or negative cost is rejected before any query.
    pub fn run_elicitation_pass<O: PreferenceOracle + ?Sized>(
        &mut self,
        oracle: &mut O,
        mixture_weight: f64,
        cost: f64,
    ) -> Result<ElicitationReport> {
        let params = PassParams {
            mixture_weight: mixture_weight.clamp(0.0, 1.0),
            aspiration: self.policy.aspiration(),
            cost,
            max_queries: self.config.max_queries_per_pass,
        };
        let report = self.elicitor.run_pass(
            &self.index,
            &mut self.fitter,
            &mut self.ranking,
            &mut self.unranked,
            oracle,
            params,
        )?;
        if !report.elicited.is_empty() {
            info!(
                elicited = report.elicited.len(),
                cost = report.total_cost,
                ranked = self.ranking.len(),
                "elicitation pass ranked new outcomes"
            );
        }
        Ok(report)
    }

    /// Estimated opponent utility of the most recently observed offer.
    /// The usual mixture weight for an elicitation pass.
    pub fn last_offer_estimate(&self) -> Option<f64> {
        self.last_offer
            .as_ref()
            .and_then(|o| self.opponent.estimate_utility(o).ok())
    }

    /// Own utility of a bid under the current model
    pub fn utility(&self, bid: &Bid) -> Result<f64> {
        self.fitter.bid_utility(&self.index, bid)
    }

    /// Estimated opponent utility of a bid
    pub fn opponent_utility(&self, bid: &Bid) -> Result<f64> {
        let outcome = self.index.encode(bid)?;
        self.opponent.estimate_utility(&outcome)
    }

    /// Known ranking as bids, least to most preferred
    pub fn ranked_bids(&self) -> Vec<Bid> {
        self.ranking.iter().map(|o| self.index.decode(o)).collect()
    }

    pub fn snapshot(&self) -> OpponentSnapshot {
        self.opponent.snapshot(&self.index)
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            turns: self.policy.turns(),
            offers_observed: self.opponent.observations(),
            ranked: self.ranking.len(),
            unranked: self.unranked.len(),
            fits: self.fitter.fits(),
            fit_failures: self.fitter.failures(),
            elicitations: self.elicitor.queries(),
            elicitation_cost: self.elicitor.cost_spent(),
            epsilon: self.fitter.current().map(|m| m.epsilon()),
            mean_prediction_error: self.elicitor.accuracy().mean_relative_error(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn index(&self) -> &OutcomeIndex {
        &self.index
    }

    pub fn ranking(&self) -> &Ranking {
        &self.ranking
    }

    pub fn opponent(&self) -> &FrequencyModel {
        &self.opponent
    }

    pub fn aspiration(&self) -> f64 {
        self.policy.aspiration()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Bidding;
    use crate::test_domain::{build_test_domain, partial_test_ranking, small_domain, test_utility};

    struct FixtureOracle;

    impl PreferenceOracle for FixtureOracle {
        fn elicit_rank(&mut self, _index: &OutcomeIndex, outcome: &Outcome, ranking: &Ranking) -> Result<usize> {
            let u = test_utility(outcome);
            Ok(ranking.iter().filter(|o| test_utility(o) < u).count())
        }
    }

    fn party_engine(config: EngineConfig) -> NegotiationEngine {
        let domain = build_test_domain();
        let index = OutcomeIndex::new(&domain).unwrap();
        let bids: Vec<Bid> = partial_test_ranking(&index, 3).iter().map(|o| index.decode(o)).collect();
        NegotiationEngine::new(&domain, &bids, config).unwrap()
    }

    fn best_bid() -> Bid {
        Bid::new().with(1, "sushi").with(2, "band").with(3, "hall")
    }

    fn worst_bid() -> Bid {
        Bid::new().with(1, "chips").with(2, "none").with(3, "garden")
    }

    #[test]
    fn test_short_initial_ranking_rejected() {
        let domain = small_domain();
        let one = [Bid::new().with(1, "x").with(2, "p")];
        assert_eq!(
            NegotiationEngine::new(&domain, &one, EngineConfig::default()).unwrap_err(),
            EngineError::InfeasibleRanking { len: 1 }
        );
    }

    #[test]
    fn test_unknown_value_in_ranking_rejected() {
        let domain = small_domain();
        let bids = [Bid::new().with(1, "x").with(2, "p"), Bid::new().with(1, "z").with(2, "q")];
        assert!(matches!(
            NegotiationEngine::new(&domain, &bids, EngineConfig::default()),
            Err(EngineError::UnknownValue { issue: 1, .. })
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let domain = small_domain();
        let bids = [Bid::new().with(1, "x").with(2, "p"), Bid::new().with(1, "y").with(2, "q")];
        let config = EngineConfig { deadline: 2.0, ..EngineConfig::default() };
        assert!(matches!(
            NegotiationEngine::new(&domain, &bids, config),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_outcome_space_cap_enforced() {
        let domain = build_test_domain();
        let bids = [worst_bid(), best_bid()];
        let config = EngineConfig { max_outcomes: 10, ..EngineConfig::default() };
        assert!(matches!(
            NegotiationEngine::new(&domain, &bids, config),
            Err(EngineError::Domain(_))
        ));
    }

    #[test]
    fn test_first_turn_offers_best_ranked() {
        let mut engine = party_engine(EngineConfig::default());
        let action = engine.choose_turn_action(None, 0.0, 0.0).unwrap();
        assert_eq!(action, TurnAction::Offer(best_bid()));
    }

    #[test]
    fn test_deadline_below_reservation_ends() {
        let mut engine = party_engine(EngineConfig::default());
        let offer = worst_bid();
        engine.observe_offer(&offer).unwrap();
        let reservation = engine.utility(&offer).unwrap() + 0.1;
        let action = engine.choose_turn_action(Some(&offer), 1.0, reservation).unwrap();
        assert_eq!(action, TurnAction::End);
    }

    #[test]
    fn test_deadline_accepts_good_offer() {
        let mut engine = party_engine(EngineConfig::default());
        let offer = best_bid();
        engine.observe_offer(&offer).unwrap();
        let reservation = engine.utility(&offer).unwrap();
        let action = engine.choose_turn_action(Some(&offer), 1.0, reservation).unwrap();
        assert_eq!(action, TurnAction::Accept);
    }

    #[test]
    fn test_best_offer_accepted_mid_negotiation() {
        let mut engine = party_engine(EngineConfig::default());
        let offer = best_bid();
        engine.observe_offer(&offer).unwrap();
        assert_eq!(engine.choose_turn_action(Some(&offer), 0.3, 0.0).unwrap(), TurnAction::Accept);
    }

    #[test]
    fn test_poor_offer_countered() {
        let mut engine = party_engine(EngineConfig::default());
        let offer = worst_bid();
        engine.observe_offer(&offer).unwrap();
        let action = engine.choose_turn_action(Some(&offer), 0.3, 0.0).unwrap();
        assert!(matches!(action, TurnAction::Offer(_)));
    }

    #[test]
    fn test_target_bidding_counter_offers_above_target() {
        let config = EngineConfig { bidding: Bidding::Target, ..EngineConfig::default() };
        let mut engine = party_engine(config);
        let offer = worst_bid();
        engine.observe_offer(&offer).unwrap();
        match engine.choose_turn_action(Some(&offer), 0.3, 0.0).unwrap() {
            TurnAction::Offer(bid) => {
                let target = engine.policy.target_utility().unwrap();
                assert!(engine.utility(&bid).unwrap() >= target - 1e-9);
            }
            other => panic!("expected an offer, got {other:?}"),
        }
    }

    #[test]
    fn test_observe_tracks_last_two_offers() {
        let mut engine = party_engine(EngineConfig::default());
        assert!(engine.last_offer_estimate().is_none());
        engine.observe_offer(&worst_bid()).unwrap();
        engine.observe_offer(&best_bid()).unwrap();
        assert_eq!(engine.previous_offer, Some(engine.index.encode(&worst_bid()).unwrap()));
        assert_eq!(engine.last_offer, Some(engine.index.encode(&best_bid()).unwrap()));
        assert_eq!(engine.stats().offers_observed, 2);
        assert!(engine.last_offer_estimate().is_some());
    }

    #[test]
    fn test_observe_unknown_value_rejected() {
        let mut engine = party_engine(EngineConfig::default());
        let bad = Bid::new().with(1, "tacos").with(2, "dj").with(3, "hall");
        assert!(matches!(engine.observe_offer(&bad), Err(EngineError::UnknownValue { .. })));
        assert_eq!(engine.stats().offers_observed, 0);
    }

    #[test]
    fn test_elicitation_pass_grows_ranking() {
        let mut engine = party_engine(EngineConfig { max_queries_per_pass: Some(4), ..EngineConfig::default() });
        let before = engine.stats();
        let report = engine.run_elicitation_pass(&mut FixtureOracle, 0.0, 0.0).unwrap();
        let after = engine.stats();
        assert_eq!(report.elicited.len(), 4);
        assert_eq!(after.ranked, before.ranked + 4);
        assert_eq!(after.unranked, before.unranked - 4);
        assert_eq!(after.elicitations, 4);
        for pair in engine.ranking().as_slice().windows(2) {
            assert!(test_utility(&pair[0]) < test_utility(&pair[1]));
        }
    }

    #[test]
    fn test_prohibitive_cost_elicits_nothing() {
        let mut engine = party_engine(EngineConfig::default());
        let report = engine.run_elicitation_pass(&mut FixtureOracle, 0.5, 5.0).unwrap();
        assert!(report.elicited.is_empty());
        assert_eq!(engine.stats().elicitations, 0);
    }

    #[test]
    fn test_non_finite_pass_inputs_rejected() {
        let mut engine = party_engine(EngineConfig::default());
        let unranked = engine.stats().unranked;
        for (mixture, cost) in [(f64::NAN, 100.0), (0.5, f64::NAN), (0.5, f64::INFINITY), (0.5, -1.0)] {
            assert!(matches!(
                engine.run_elicitation_pass(&mut FixtureOracle, mixture, cost),
                Err(EngineError::InvalidParameter(_))
            ));
        }
        let stats = engine.stats();
        assert_eq!(stats.elicitations, 0);
        assert_eq!(stats.elicitation_cost, 0.0);
        assert_eq!(stats.unranked, unranked);

        // Finite weights outside [0, 1] are clamped, not rejected
        assert!(engine.run_elicitation_pass(&mut FixtureOracle, 7.0, 10.0).is_ok());
    }
}
