//! Error taxonomy for the negotiation engine
//!
//! Domain and lookup errors are caller bugs and propagate immediately.
//! Fitting errors are recoverable: the engine keeps the previous utility
//! vector and carries on with stale estimates.

use thiserror::Error;

use crate::simplex::LpError;

/// Errors raised by the engine and its components.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("invalid domain: {0}")]
    Domain(#[from] DomainError),

    #[error("unknown value {value:?} for issue {issue}")]
    UnknownValue { issue: u32, value: String },

    #[error("ranking has {len} outcome(s), at least 2 are required to fit utilities")]
    InfeasibleRanking { len: usize },

    #[error("LP solver failed: {0}")]
    Solver(#[from] LpError),

    #[error("utility model is stale: {0}")]
    StaleModel(String),

    #[error("outcome already present in the ranking at position {position}")]
    DuplicateRanking { position: usize },

    #[error("oracle returned rank position {position} for a ranking of length {len}")]
    InvalidRankPosition { position: usize, len: usize },

    #[error("preference oracle failed: {0}")]
    Oracle(String),

    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid elicitation parameter: {0}")]
    InvalidParameter(String),
}

impl EngineError {
    /// Fit failures the engine recovers from by keeping the previous model
    pub fn is_fit_failure(&self) -> bool {
        matches!(self, EngineError::InfeasibleRanking { .. } | EngineError::Solver(_))
    }
}

/// Malformed or unsupported domain definitions. Fatal at initialization.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("domain has no issues")]
    NoIssues,

    #[error("issue {issue} ({name}) has no values")]
    EmptyIssue { issue: u32, name: String },

    #[error("issue {issue} ({name}) is continuous; only discrete issues are supported")]
    NonDiscrete { issue: u32, name: String },

    #[error("issue number {0} appears more than once")]
    DuplicateIssue(u32),

    #[error("issue {issue} lists value {value:?} more than once")]
    DuplicateValue { issue: u32, value: String },

    #[error("bid does not assign issue {0}")]
    MissingIssue(u32),

    #[error("bid assigns issue {0}, which is not part of the domain")]
    ForeignIssue(u32),

    #[error("outcome space has {size} outcomes, above the limit of {limit}")]
    OutcomeSpaceTooLarge { size: u128, limit: usize },
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_failures_are_recoverable_others_are_not() {
        assert!(EngineError::InfeasibleRanking { len: 1 }.is_fit_failure());
        assert!(EngineError::Solver(LpError::Infeasible).is_fit_failure());
        assert!(EngineError::Solver(LpError::IterationLimit(10)).is_fit_failure());
        assert!(!EngineError::StaleModel("stale".into()).is_fit_failure());
        assert!(!EngineError::Oracle("down".into()).is_fit_failure());
        assert!(!EngineError::Domain(DomainError::NoIssues).is_fit_failure());
        assert!(!EngineError::InvalidParameter("nan".into()).is_fit_failure());
    }
}
