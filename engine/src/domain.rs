//! Negotiation domain definitions
//!
//! A domain is an ordered list of issues, each with a set of discrete values.
//! These types are immutable descriptions; the engine never mutates them and
//! keeps all learned state in separate dense arrays built by [`OutcomeIndex`].
//!
//! [`OutcomeIndex`]: crate::index::OutcomeIndex

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Issue number, unique within a domain.
pub type IssueId = u32;

/// Value set of an issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Finite set of labelled options
    Discrete(Vec<String>),
    /// Real-valued range; representable only so it can be rejected
    Continuous { low: f64, high: f64 },
}

/// One negotiable attribute of an outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub number: IssueId,
    pub name: String,
    pub kind: IssueKind,
}

impl Issue {
    /// Create a discrete issue from its value labels
    pub fn discrete<S: Into<String>>(number: IssueId, name: impl Into<String>, values: Vec<S>) -> Self {
        Issue {
            number,
            name: name.into(),
            kind: IssueKind::Discrete(values.into_iter().map(Into::into).collect()),
        }
    }

    /// Value labels, or `None` for continuous issues
    pub fn values(&self) -> Option<&[String]> {
        match &self.kind {
            IssueKind::Discrete(values) => Some(values),
            IssueKind::Continuous { .. } => None,
        }
    }
}

/// Ordered collection of issues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    pub name: String,
    pub issues: Vec<Issue>,
}

impl Domain {
    pub fn new(name: impl Into<String>, issues: Vec<Issue>) -> Self {
        Domain { name: name.into(), issues }
    }

    /// Get an issue by its number
    pub fn issue(&self, number: IssueId) -> Option<&Issue> {
        self.issues.iter().find(|issue| issue.number == number)
    }
}

/// Label-level outcome: one value text per issue number.
///
/// This is the representation exchanged with the transport and the
/// preference oracle. The engine converts it to a dense [`Outcome`] on entry.
///
/// [`Outcome`]: crate::index::Outcome
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bid {
    values: BTreeMap<IssueId, String>,
}

impl Bid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style assignment of one issue
    pub fn with(mut self, issue: IssueId, value: impl Into<String>) -> Self {
        self.values.insert(issue, value.into());
        self
    }

    pub fn set(&mut self, issue: IssueId, value: impl Into<String>) {
        self.values.insert(issue, value.into());
    }

    pub fn value(&self, issue: IssueId) -> Option<&str> {
        self.values.get(&issue).map(String::as_str)
    }

    pub fn issues(&self) -> impl Iterator<Item = IssueId> + '_ {
        self.values.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(IssueId, S)> for Bid {
    fn from_iter<T: IntoIterator<Item = (IssueId, S)>>(iter: T) -> Self {
        Bid {
            values: iter.into_iter().map(|(k, v)| (k, v.into())).collect(),
        }
    }
}

impl fmt::Display for Bid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, value) in self.values.values().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", value)?;
        }
        write!(f, ")")
    }
}
