//! Scripted opponents for simulated negotiations
//!
//! Each opponent has its own hidden [`AdditiveProfile`] and a target utility
//! that may move with time. It accepts an offer worth at least its current
//! target to itself.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use parley_engine::index::{Outcome, OutcomeIndex};

use crate::profile::AdditiveProfile;

pub trait Opponent {
    fn name(&self) -> &str;

    /// Own utility of an outcome
    fn utility(&self, outcome: &Outcome) -> f64;

    /// Lowest utility this opponent settles for at time `t`
    fn target(&self, time: f64) -> f64;

    /// Next offer at time `t`
    fn propose(&mut self, time: f64) -> Outcome;

    fn accepts(&self, offer: &Outcome, time: f64) -> bool {
        self.utility(offer) >= self.target(time)
    }
}

/// Profile plus the outcome space sorted by the profile's utility.
#[derive(Debug, Clone)]
struct Preferences {
    profile: AdditiveProfile,
    /// (outcome, utility), least to most preferred
    sorted: Vec<(Outcome, f64)>,
}

impl Preferences {
    fn new(profile: AdditiveProfile, index: &OutcomeIndex, limit: usize) -> parley_engine::Result<Self> {
        let sorted = profile
            .sorted_outcomes(index, limit)?
            .into_iter()
            .map(|o| {
                let u = profile.utility(&o);
                (o, u)
            })
            .collect();
        Ok(Preferences { profile, sorted })
    }

    fn best(&self) -> &(Outcome, f64) {
        // Non-empty: a valid index has at least one outcome
        &self.sorted[self.sorted.len() - 1]
    }

    /// Outcome whose utility is closest to `target`; higher utility wins ties.
    fn closest(&self, target: f64) -> &Outcome {
        let mut best = self.best();
        for entry in self.sorted.iter().rev() {
            if (entry.1 - target).abs() < (best.1 - target).abs() {
                best = entry;
            }
        }
        &best.0
    }
}

/// Never concedes: always offers its best outcome.
#[derive(Debug, Clone)]
pub struct Hardliner {
    prefs: Preferences,
}

impl Hardliner {
    pub fn new(profile: AdditiveProfile, index: &OutcomeIndex, limit: usize) -> parley_engine::Result<Self> {
        Ok(Hardliner { prefs: Preferences::new(profile, index, limit)? })
    }
}

impl Opponent for Hardliner {
    fn name(&self) -> &str {
        "hardliner"
    }

    fn utility(&self, outcome: &Outcome) -> f64 {
        self.prefs.profile.utility(outcome)
    }

    fn target(&self, _time: f64) -> f64 {
        self.prefs.best().1
    }

    fn propose(&mut self, _time: f64) -> Outcome {
        self.prefs.best().0.clone()
    }
}

/// Time-dependent concession from its best utility down to its reservation:
///
/// ```text
/// target(t) = r + (max - r) · (1 - t^(1/e))
/// ```
///
/// `e < 1` holds out until late (boulware), `e > 1` concedes early.
#[derive(Debug, Clone)]
pub struct TimeConceder {
    prefs: Preferences,
    exponent: f64,
}

impl TimeConceder {
    pub fn new(
        profile: AdditiveProfile,
        index: &OutcomeIndex,
        limit: usize,
        exponent: f64,
    ) -> parley_engine::Result<Self> {
        Ok(TimeConceder {
            prefs: Preferences::new(profile, index, limit)?,
            exponent: exponent.max(f64::EPSILON),
        })
    }
}

impl Opponent for TimeConceder {
    fn name(&self) -> &str {
        "time-conceder"
    }

    fn utility(&self, outcome: &Outcome) -> f64 {
        self.prefs.profile.utility(outcome)
    }

    fn target(&self, time: f64) -> f64 {
        let max = self.prefs.best().1;
        let floor = self.prefs.profile.reservation().min(max);
        let t = time.clamp(0.0, 1.0);
        floor + (max - floor) * (1.0 - t.powf(1.0 / self.exponent))
    }

    fn propose(&mut self, time: f64) -> Outcome {
        let target = self.target(time);
        self.prefs.closest(target).clone()
    }
}

/// Offers a random outcome at or above a fixed utility floor.
#[derive(Debug, Clone)]
pub struct RandomAbove {
    prefs: Preferences,
    floor: f64,
    rng: StdRng,
}

impl RandomAbove {
    pub fn new(
        profile: AdditiveProfile,
        index: &OutcomeIndex,
        limit: usize,
        floor: f64,
        seed: u64,
    ) -> parley_engine::Result<Self> {
        let prefs = Preferences::new(profile, index, limit)?;
        // Clamp so at least the best outcome qualifies
        let floor = floor.min(prefs.best().1);
        Ok(RandomAbove { prefs, floor, rng: StdRng::seed_from_u64(seed) })
    }
}

impl Opponent for RandomAbove {
    fn name(&self) -> &str {
        "random-above"
    }

    fn utility(&self, outcome: &Outcome) -> f64 {
        self.prefs.profile.utility(outcome)
    }

    fn target(&self, _time: f64) -> f64 {
        self.floor
    }

    fn propose(&mut self, _time: f64) -> Outcome {
        let first = self.prefs.sorted.partition_point(|(_, u)| *u < self.floor);
        let pick = self.rng.gen_range(first..self.prefs.sorted.len());
        self.prefs.sorted[pick].0.clone()
    }
}
