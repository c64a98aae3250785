//! Frequency-based opponent model
//!
//! Counts how often each value of each issue appears in the opponent's offers.
//! From the counters alone it derives:
//! - per-value rank scores in (0, 1]: most frequent value scores 1.0
//! - per-issue weights summing to 1: issues where the opponent concentrates
//!   on few values weigh more
//!
//! Nothing but the counter table is stored; every estimate is recomputed on
//! demand.

use rayon::prelude::*;
use serde::Serialize;

use crate::domain::IssueId;
use crate::error::{EngineError, Result};
use crate::index::{Outcome, OutcomeIndex, ValueSlot};

/// Observation table and derived estimates.
#[derive(Debug, Clone)]
pub struct FrequencyModel {
    /// counts[issue_position][value_slot]
    counts: Vec<Vec<u32>>,
    /// Lower-cased value labels, for deterministic tie-breaking
    folded_labels: Vec<Vec<String>>,
    observations: u64,
}

impl FrequencyModel {
    /// Allocate zeroed counters for every (issue, value) slot of the index.
    pub fn new(index: &OutcomeIndex) -> Self {
        let counts = (0..index.issue_count())
            .map(|position| vec![0u32; index.value_count(position)])
            .collect();
        let folded_labels = (0..index.issue_count())
            .map(|position| {
                (0..index.value_count(position))
                    .map(|slot| index.label(position, slot as ValueSlot).to_lowercase())
                    .collect()
            })
            .collect();
        FrequencyModel { counts, folded_labels, observations: 0 }
    }

    /// Count one opponent offer. Outcomes that do not fit the table are
    /// rejected without touching any counter.
    pub fn observe(&mut self, outcome: &Outcome) -> Result<()> {
        self.check(outcome)?;
        for (position, &slot) in outcome.slots().iter().enumerate() {
            self.counts[position][slot as usize] += 1;
        }
        self.observations += 1;
        Ok(())
    }

    fn check(&self, outcome: &Outcome) -> Result<()> {
        let fits = outcome.len() == self.counts.len()
            && outcome
                .slots()
                .iter()
                .zip(&self.counts)
                .all(|(&slot, counts)| (slot as usize) < counts.len());
        if fits {
            Ok(())
        } else {
            Err(EngineError::StaleModel(format!(
                "outcome {:?} does not match the observation table",
                outcome.slots()
            )))
        }
    }

    /// Number of offers observed so far
    pub fn observations(&self) -> u64 {
        self.observations
    }

    /// Counter array of one issue
    pub fn counts(&self, position: usize) -> Option<&[u32]> {
        self.counts.get(position).map(Vec::as_slice)
    }

    /// Rank score of a value within its issue, in (0, 1].
    ///
    /// rank = #other values with strictly lower frequency
    ///      + #other values with equal frequency whose folded label sorts lower
    /// score = (rank + 1) / k
    pub fn value_score(&self, position: usize, slot: ValueSlot) -> Result<f64> {
        match self.counts.get(position) {
            Some(counts) if (slot as usize) < counts.len() => Ok(self.score(position, slot)),
            _ => Err(EngineError::StaleModel(format!(
                "no value slot {slot} at issue position {position}"
            ))),
        }
    }

    fn score(&self, position: usize, slot: ValueSlot) -> f64 {
        let frequencies = &self.counts[position];
        let labels = &self.folded_labels[position];
        let own = slot as usize;
        let k = frequencies.len();

        let mut rank = 0usize;
        for (other, &frequency) in frequencies.iter().enumerate() {
            if other == own {
                continue;
            }
            if frequency < frequencies[own] {
                rank += 1;
            } else if frequency == frequencies[own] && labels[own] > labels[other] {
                rank += 1;
            }
        }

        // Inverted rank k - rank, normalized as (k - inverted + 1) / k
        let inverted = k - rank;
        (k - inverted + 1) as f64 / k as f64
    }

    /// Label-level rank score lookup.
    pub fn value_rank(&self, index: &OutcomeIndex, issue: IssueId, value: &str) -> Result<f64> {
        let (position, slot) = index.slot_of(issue, value)?;
        self.value_score(position, slot)
    }

    /// Unnormalized concentration statistic Σ (f / (n - 1))² of one issue.
    /// Only meaningful once at least two offers have been observed.
    fn concentration(&self, position: usize) -> f64 {
        let span = self.observations.saturating_sub(1) as f64;
        self.counts[position]
            .iter()
            .map(|&frequency| {
                let share = frequency as f64 / span;
                share * share
            })
            .sum()
    }

    /// Issue weights in issue order. Uniform until two offers have been seen.
    pub fn issue_weights(&self) -> Vec<f64> {
        let n = self.counts.len();
        let uniform = || vec![1.0 / n as f64; n];
        if self.observations <= 1 {
            return uniform();
        }
        let raw: Vec<f64> = (0..n).map(|position| self.concentration(position)).collect();
        let total: f64 = raw.iter().sum();
        if total <= 0.0 || !total.is_finite() {
            return uniform();
        }
        raw.iter().map(|&c| c / total).collect()
    }

    /// Weight of the issue at `position`; `None` past the last issue.
    pub fn issue_weight(&self, position: usize) -> Option<f64> {
        self.issue_weights().get(position).copied()
    }

    /// Label-level issue weight lookup; `None` for issues outside the domain.
    pub fn issue_weight_of(&self, index: &OutcomeIndex, issue: IssueId) -> Option<f64> {
        index.position(issue).and_then(|position| self.issue_weight(position))
    }

    /// Estimated opponent utility: Σ weight(issue) · score(issue, value)
    pub fn estimate_utility(&self, outcome: &Outcome) -> Result<f64> {
        self.check(outcome)?;
        let weights = self.issue_weights();
        Ok(self.estimate_with(&weights, outcome))
    }

    /// Estimate many outcomes at once, sharing one weight computation.
    pub fn estimate_many(&self, outcomes: &[Outcome]) -> Result<Vec<f64>> {
        outcomes.iter().try_for_each(|outcome| self.check(outcome))?;
        let weights = self.issue_weights();
        Ok(outcomes
            .par_iter()
            .map(|outcome| self.estimate_with(&weights, outcome))
            .collect())
    }

    fn estimate_with(&self, weights: &[f64], outcome: &Outcome) -> f64 {
        outcome
            .slots()
            .iter()
            .enumerate()
            .map(|(position, &slot)| weights[position] * self.score(position, slot))
            .sum()
    }

    /// Readable copy of the current estimates.
    pub fn snapshot(&self, index: &OutcomeIndex) -> OpponentSnapshot {
        let weights = self.issue_weights();
        let issues = weights
            .iter()
            .enumerate()
            .map(|(position, &weight)| IssueEstimate {
                issue: index.issue_number(position),
                name: index.issue_name(position).to_string(),
                weight,
                values: (0..index.value_count(position))
                    .map(|slot| {
                        let slot = slot as ValueSlot;
                        ValueEstimate {
                            value: index.label(position, slot).to_string(),
                            count: self.counts[position][slot as usize],
                            score: self.score(position, slot),
                        }
                    })
                    .collect(),
            })
            .collect();
        OpponentSnapshot { observations: self.observations, issues }
    }
}

/// Serializable view of the opponent model.
#[derive(Debug, Clone, Serialize)]
pub struct OpponentSnapshot {
    pub observations: u64,
    pub issues: Vec<IssueEstimate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssueEstimate {
    pub issue: IssueId,
    pub name: String,
    pub weight: f64,
    pub values: Vec<ValueEstimate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValueEstimate {
    pub value: String,
    pub count: u32,
    pub score: f64,
}
