//! parley Domain - Negotiation scenario construction
//!
//! This crate builds concrete negotiation scenarios for the engine: it loads
//! domain files, carries the hidden preference profile that answers
//! elicitation queries, samples the initial partial ranking, and provides
//! scripted opponents for simulation.

pub mod error;
pub mod file;
pub mod opponents;
pub mod profile;

pub use error::{DomainFileError, Result};
pub use file::{DomainFile, IssueProfileSpec, IssueSpec, ProfileSpec};
pub use opponents::{Hardliner, Opponent, RandomAbove, TimeConceder};
pub use profile::{sample_ranking, AdditiveProfile};
