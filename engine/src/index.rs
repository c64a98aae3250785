//! Outcome index: dense slot numbering for (issue, value) pairs
//!
//! Built once per domain, in issue order. Every array in the engine (observation
//! counters, LP variables, fitted utilities) is indexed through this structure,
//! so no string keys are ever concatenated or hashed after construction.
//!
//! Two numberings exist:
//! - local slot: zero-based position of a value within its issue
//! - global slot: `offset[issue] + local`, dense over the whole domain

use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::domain::{Bid, Domain, IssueId, IssueKind};
use crate::error::{DomainError, EngineError, Result};

/// Local value slot within an issue.
pub type ValueSlot = u32;

/// Dense engine-internal outcome: one local slot per issue, in domain order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Outcome(Vec<ValueSlot>);

impl Outcome {
    pub fn from_slots(slots: Vec<ValueSlot>) -> Self {
        Outcome(slots)
    }

    /// Local slot chosen for the issue at `position`
    pub fn slot(&self, position: usize) -> ValueSlot {
        self.0[position]
    }

    pub fn slots(&self) -> &[ValueSlot] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Per-issue slot table.
#[derive(Debug, Clone)]
struct IssueSlots {
    number: IssueId,
    name: String,
    labels: Vec<String>,
    lookup: HashMap<String, ValueSlot>,
}

/// Bijection between (issue, value) and dense slot numbers. Immutable after
/// construction.
#[derive(Debug, Clone)]
pub struct OutcomeIndex {
    issues: Vec<IssueSlots>,
    /// offsets[i] = global slot of value 0 of issue i
    offsets: Vec<usize>,
    total_slots: usize,
    positions: HashMap<IssueId, usize>,
}

impl OutcomeIndex {
    /// Build the index. Rejects empty domains, empty or continuous issues, and
    /// duplicate issue numbers or value labels.
    pub fn new(domain: &Domain) -> std::result::Result<Self, DomainError> {
        if domain.issues.is_empty() {
            return Err(DomainError::NoIssues);
        }

        let mut issues = Vec::with_capacity(domain.issues.len());
        let mut offsets = Vec::with_capacity(domain.issues.len());
        let mut positions = HashMap::with_capacity(domain.issues.len());
        let mut total_slots = 0usize;

        for (position, issue) in domain.issues.iter().enumerate() {
            let labels = match &issue.kind {
                IssueKind::Discrete(values) => values,
                IssueKind::Continuous { .. } => {
                    return Err(DomainError::NonDiscrete {
                        issue: issue.number,
                        name: issue.name.clone(),
                    })
                }
            };
            if labels.is_empty() {
                return Err(DomainError::EmptyIssue {
                    issue: issue.number,
                    name: issue.name.clone(),
                });
            }
            if positions.insert(issue.number, position).is_some() {
                return Err(DomainError::DuplicateIssue(issue.number));
            }

            let mut lookup = HashMap::with_capacity(labels.len());
            for (slot, label) in labels.iter().enumerate() {
                if lookup.insert(label.clone(), slot as ValueSlot).is_some() {
                    return Err(DomainError::DuplicateValue {
                        issue: issue.number,
                        value: label.clone(),
                    });
                }
            }

            offsets.push(total_slots);
            total_slots += labels.len();
            issues.push(IssueSlots {
                number: issue.number,
                name: issue.name.clone(),
                labels: labels.clone(),
                lookup,
            });
        }

        Ok(OutcomeIndex { issues, offsets, total_slots, positions })
    }

    /// Number of issues
    pub fn issue_count(&self) -> usize {
        self.issues.len()
    }

    /// Number of values of the issue at `position`
    pub fn value_count(&self, position: usize) -> usize {
        self.issues[position].labels.len()
    }

    /// Total number of (issue, value) slots across the domain
    pub fn total_slots(&self) -> usize {
        self.total_slots
    }

    pub fn issue_number(&self, position: usize) -> IssueId {
        self.issues[position].number
    }

    pub fn issue_name(&self, position: usize) -> &str {
        &self.issues[position].name
    }

    /// Position of an issue number in domain order
    pub fn position(&self, issue: IssueId) -> Option<usize> {
        self.positions.get(&issue).copied()
    }

    /// Value text of a local slot
    pub fn label(&self, position: usize, slot: ValueSlot) -> &str {
        &self.issues[position].labels[slot as usize]
    }

    /// Global slot of a local slot
    pub fn global_slot(&self, position: usize, slot: ValueSlot) -> usize {
        self.offsets[position] + slot as usize
    }

    /// Global slots used by an outcome, in issue order
    pub fn global_slots<'a>(&'a self, outcome: &'a Outcome) -> impl Iterator<Item = usize> + 'a {
        outcome
            .slots()
            .iter()
            .enumerate()
            .map(move |(position, &slot)| self.global_slot(position, slot))
    }

    /// Resolve (issue number, value text) to (issue position, local slot)
    pub fn slot_of(&self, issue: IssueId, value: &str) -> Result<(usize, ValueSlot)> {
        let unknown = || EngineError::UnknownValue { issue, value: value.to_string() };
        let position = self.position(issue).ok_or_else(unknown)?;
        let slot = self.issues[position].lookup.get(value).copied().ok_or_else(unknown)?;
        Ok((position, slot))
    }

    /// Convert a label-level bid to the dense form. The bid must assign
    /// every issue of the domain and nothing else.
    pub fn encode(&self, bid: &Bid) -> Result<Outcome> {
        if let Some(foreign) = bid.issues().find(|issue| self.position(*issue).is_none()) {
            return Err(DomainError::ForeignIssue(foreign).into());
        }
        let mut slots = Vec::with_capacity(self.issues.len());
        for issue in &self.issues {
            let value = bid
                .value(issue.number)
                .ok_or(DomainError::MissingIssue(issue.number))?;
            let (_, slot) = self.slot_of(issue.number, value)?;
            slots.push(slot);
        }
        Ok(Outcome(slots))
    }

    /// Convert a dense outcome back to labels
    pub fn decode(&self, outcome: &Outcome) -> Bid {
        outcome
            .slots()
            .iter()
            .enumerate()
            .map(|(position, &slot)| (self.issue_number(position), self.label(position, slot).to_string()))
            .collect()
    }

    /// True if every slot of the outcome is in range for this index
    pub fn contains(&self, outcome: &Outcome) -> bool {
        outcome.len() == self.issues.len()
            && outcome
                .slots()
                .iter()
                .enumerate()
                .all(|(position, &slot)| (slot as usize) < self.value_count(position))
    }

    /// Number of distinct outcomes (product of value counts)
    pub fn outcome_space_size(&self) -> u128 {
        self.issues
            .iter()
            .map(|issue| issue.labels.len() as u128)
            .fold(1u128, |acc, n| acc.saturating_mul(n))
    }

    /// Enumerate every outcome in lexicographic slot order (last issue varies
    /// fastest). Refuses spaces larger than `limit`.
    pub fn enumerate(&self, limit: usize) -> std::result::Result<Vec<Outcome>, DomainError> {
        let size = self.outcome_space_size();
        if size > limit as u128 {
            return Err(DomainError::OutcomeSpaceTooLarge { size, limit });
        }

        let mut outcomes = Vec::with_capacity(size as usize);
        let mut current = vec![0 as ValueSlot; self.issues.len()];
        loop {
            outcomes.push(Outcome(current.clone()));

            // Odometer increment from the last issue
            let mut position = self.issues.len();
            loop {
                if position == 0 {
                    return Ok(outcomes);
                }
                position -= 1;
                current[position] += 1;
                if (current[position] as usize) < self.value_count(position) {
                    break;
                }
                current[position] = 0;
            }
        }
    }

    /// Enumerate the outcomes not present in `exclude`, preserving enumeration order
    pub fn enumerate_excluding(
        &self,
        limit: usize,
        exclude: &HashSet<Outcome>,
    ) -> std::result::Result<Vec<Outcome>, DomainError> {
        let mut outcomes = self.enumerate(limit)?;
        outcomes.retain(|outcome| !exclude.contains(outcome));
        Ok(outcomes)
    }
}
