//! Per-turn decision policy: accept, counter-offer, or end
//!
//! Pure decision logic over precomputed utilities. The session feeds it the
//! ranked outcomes with their fitted own utilities and estimated opponent
//! utilities; the policy owns only its per-session state (aspiration, target
//! utility, turn count).
//!
//! Order of checks each turn:
//! 1. no offer on the table: open with the best ranked outcome
//! 2. deadline reached: accept at or above reservation, otherwise end
//! 3. nothing ranked beats the reservation value: end
//! 4. offer scores at least as well as our best candidate: accept
//! 5. otherwise counter-offer the best candidate

use tracing::debug;

use crate::config::{Bidding, EngineConfig};
use crate::elicitation::combined_score;
use crate::index::Outcome;

/// What the policy decided this turn.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Offer(Outcome),
    Accept,
    End,
}

/// The opponent's offer currently on the table.
#[derive(Debug, Clone, Copy)]
pub struct OfferView<'a> {
    pub outcome: &'a Outcome,
    /// Fitted own utility of the offer
    pub own_utility: f64,
    /// Estimated opponent utility of the offer
    pub opponent_utility: f64,
    /// Estimated opponent utility of the opponent's previous offer
    pub previous_opponent_utility: Option<f64>,
}

/// Everything one decision needs. The three ranked slices are parallel.
#[derive(Debug, Clone, Copy)]
pub struct TurnInputs<'a> {
    pub ranked: &'a [Outcome],
    pub own_utilities: &'a [f64],
    pub opponent_utilities: &'a [f64],
    pub offer: Option<OfferView<'a>>,
    pub time: f64,
    pub reservation: f64,
}

/// Conceding target utility used by [`Bidding::Target`].
#[derive(Debug, Clone, Copy, PartialEq)]
struct Target {
    utility: f64,
    /// No time-based concession below this level
    floor: f64,
}

#[derive(Debug, Clone)]
pub struct DecisionPolicy {
    aspiration: f64,
    decay: f64,
    deadline: f64,
    tolerance: f64,
    bidding: Bidding,
    target: Option<Target>,
    turns: u64,
}

impl DecisionPolicy {
    pub fn new(config: &EngineConfig) -> Self {
        DecisionPolicy {
            aspiration: config.initial_aspiration,
            decay: config.aspiration_decay,
            deadline: config.deadline,
            tolerance: config.tolerance,
            bidding: config.bidding,
            target: None,
            turns: 0,
        }
    }

    /// Current aspiration value
    pub fn aspiration(&self) -> f64 {
        self.aspiration
    }

    /// Current target utility, once initialized
    pub fn target_utility(&self) -> Option<f64> {
        self.target.map(|t| t.utility)
    }

    pub fn turns(&self) -> u64 {
        self.turns
    }

    /// True when `time` is at or past the terminal threshold
    pub fn deadline_reached(&self, time: f64) -> bool {
        time >= self.deadline
    }

    /// Decide this turn's action. Decays the aspiration first.
    pub fn decide(&mut self, inputs: &TurnInputs<'_>) -> Decision {
        self.turns += 1;
        self.aspiration *= self.decay;

        let Some(best_own) = argmax(inputs.own_utilities) else {
            return Decision::End;
        };
        if self.target.is_none() {
            let max = inputs.own_utilities[best_own];
            let min = inputs.own_utilities.iter().copied().fold(f64::INFINITY, f64::min);
            self.target = Some(Target { utility: max, floor: (max + min) / 2.0 });
        }

        let Some(offer) = inputs.offer else {
            if self.deadline_reached(inputs.time) {
                return Decision::End;
            }
            return Decision::Offer(inputs.ranked[best_own].clone());
        };

        if self.deadline_reached(inputs.time) {
            return if offer.own_utility >= inputs.reservation {
                Decision::Accept
            } else {
                Decision::End
            };
        }

        if inputs.own_utilities[best_own] <= inputs.reservation + self.tolerance {
            return Decision::End;
        }

        let mixture = offer.opponent_utility.clamp(0.0, 1.0);
        let aspiration = self.aspiration;
        let score = move |u: f64| combined_score(mixture, u, aspiration);

        let candidate = match self.bidding {
            Bidding::Mixture => argmax_by(inputs.own_utilities, |_, &u| score(u)).unwrap_or(best_own),
            Bidding::Target => {
                self.concede(&offer, inputs.time);
                self.target_candidate(inputs).unwrap_or(best_own)
            }
        };

        let candidate_score = score(inputs.own_utilities[candidate]);
        let offer_score = score(offer.own_utility);
        debug!(
            turn = self.turns,
            aspiration = self.aspiration,
            mixture,
            candidate_score,
            offer_score,
            "scored turn"
        );

        let meets_target = self.bidding == Bidding::Target
            && self.target.is_some_and(|t| offer.own_utility >= t.utility);
        if inputs.ranked[candidate] == *offer.outcome
            || offer_score + self.tolerance >= candidate_score
            || meets_target
        {
            return Decision::Accept;
        }
        Decision::Offer(inputs.ranked[candidate].clone())
    }

    /// Concede the target: follow the opponent's concession when it concedes,
    /// otherwise concede with time. Never below the floor.
    fn concede(&mut self, offer: &OfferView<'_>, time: f64) {
        let Some(target) = self.target.as_mut() else {
            return;
        };
        if target.utility <= target.floor {
            return;
        }
        let timed = target.utility * (1.0 - time);
        let next = match offer.previous_opponent_utility {
            Some(previous) if previous > 0.0 && offer.opponent_utility < previous => {
                let drop = (previous - offer.opponent_utility) / previous;
                let matched = target.utility * (1.0 - drop);
                matched.max(timed)
            }
            _ => timed,
        };
        target.utility = next.max(target.floor);
    }

    /// Ranked outcome above the target that the opponent likes best.
    fn target_candidate(&self, inputs: &TurnInputs<'_>) -> Option<usize> {
        let target = self.target?.utility;
        argmax_by(inputs.opponent_utilities, |i, _| {
            if inputs.own_utilities[i] >= target {
                inputs.opponent_utilities[i]
            } else {
                f64::NEG_INFINITY
            }
        })
        .filter(|&i| inputs.own_utilities[i] >= target)
    }
}

fn argmax(values: &[f64]) -> Option<usize> {
    argmax_by(values, |_, &v| v)
}

/// Index of the largest key; the first one wins ties.
fn argmax_by<F: Fn(usize, &f64) -> f64>(values: &[f64], key: F) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, v) in values.iter().enumerate() {
        let k = key(i, v);
        if best.map_or(true, |(_, b)| k > b) {
            best = Some((i, k));
        }
    }
    best.map(|(i, _)| i)
}
