//! Partial ordinal ranking of outcomes, least to most preferred
//!
//! Grows monotonically: outcomes are inserted at the position the preference
//! oracle reports and are never removed or moved afterwards.

use std::collections::HashSet;

use crate::error::{EngineError, Result};
use crate::index::Outcome;

#[derive(Debug, Clone, Default)]
pub struct Ranking {
    order: Vec<Outcome>,
    members: HashSet<Outcome>,
}

impl Ranking {
    /// Build from an ordered list. Fails if an outcome appears twice.
    pub fn new(outcomes: Vec<Outcome>) -> Result<Self> {
        let mut members = HashSet::with_capacity(outcomes.len());
        for (position, outcome) in outcomes.iter().enumerate() {
            if !members.insert(outcome.clone()) {
                return Err(EngineError::DuplicateRanking { position });
            }
        }
        Ok(Ranking { order: outcomes, members })
    }

    /// Insert an unranked outcome so that it lands at `position`
    /// (0 = least preferred, `len()` = most preferred).
    pub fn insert(&mut self, position: usize, outcome: Outcome) -> Result<()> {
        if position > self.order.len() {
            return Err(EngineError::InvalidRankPosition { position, len: self.order.len() });
        }
        if let Some(existing) = self.position(&outcome) {
            return Err(EngineError::DuplicateRanking { position: existing });
        }
        self.members.insert(outcome.clone());
        self.order.insert(position, outcome);
        Ok(())
    }

    pub fn contains(&self, outcome: &Outcome) -> bool {
        self.members.contains(outcome)
    }

    pub fn position(&self, outcome: &Outcome) -> Option<usize> {
        if !self.contains(outcome) {
            return None;
        }
        self.order.iter().position(|o| o == outcome)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&Outcome> {
        self.order.get(position)
    }

    /// Least preferred ranked outcome
    pub fn worst(&self) -> Option<&Outcome> {
        self.order.first()
    }

    /// Most preferred ranked outcome
    pub fn best(&self) -> Option<&Outcome> {
        self.order.last()
    }

    pub fn as_slice(&self) -> &[Outcome] {
        &self.order
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Outcome> {
        self.order.iter()
    }

    pub fn members(&self) -> &HashSet<Outcome> {
        &self.members
    }
}
