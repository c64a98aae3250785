//! parley Engine - Core negotiation types and logic
//!
//! This crate contains the negotiation engine for preference-uncertain
//! bilateral negotiation: the outcome index, the frequency-based opponent
//! model, the LP utility fitter (with its built-in simplex solver), the
//! elicitation selector and the per-turn decision policy.
//!
//! The engine is transport-agnostic and has zero I/O dependencies.

pub mod config;
pub mod domain;
pub mod elicitation;
pub mod error;
pub mod fitter;
pub mod index;
pub mod opponent;
pub mod policy;
pub mod ranking;
pub mod session;
pub mod simplex;
pub mod test_domain;

pub use config::{Bidding, EngineConfig};
pub use domain::{Bid, Domain, Issue, IssueId, IssueKind};
pub use elicitation::{ElicitationReport, NoOracle, PreferenceOracle, StopReason};
pub use error::{DomainError, EngineError, Result};
pub use fitter::{UtilityFitter, ValueUtilities};
pub use index::{Outcome, OutcomeIndex};
pub use opponent::{FrequencyModel, OpponentSnapshot};
pub use ranking::Ranking;
pub use session::{EngineStats, NegotiationEngine, TurnAction};
