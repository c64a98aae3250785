//! Per-session engine configuration

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// How counter-offers are chosen each turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bidding {
    /// Highest mixture score over the ranking
    #[default]
    Mixture,
    /// Best estimated opponent utility among outcomes above a conceding target
    Target,
}

/// Tunables of one negotiation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Starting aspiration value
    pub initial_aspiration: f64,
    /// Multiplicative aspiration decay applied once per turn
    pub aspiration_decay: f64,
    /// Time fraction at or past which the negotiation is terminal
    pub deadline: f64,
    /// Largest outcome space the engine will enumerate
    pub max_outcomes: usize,
    /// Cap on elicitations in a single pass; unbounded when `None`
    pub max_queries_per_pass: Option<usize>,
    pub bidding: Bidding,
    /// Float tolerance for score comparisons
    pub tolerance: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            initial_aspiration: 0.5,
            aspiration_decay: 0.9,
            deadline: 0.99,
            max_outcomes: 250_000,
            max_queries_per_pass: None,
            bidding: Bidding::Mixture,
            tolerance: 1e-9,
        }
    }
}

impl EngineConfig {
    /// Reject out-of-range settings.
    pub fn validate(&self) -> Result<()> {
        let unit = |name: &str, v: f64| {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(EngineError::InvalidConfig(format!("{name} must be in [0, 1], got {v}")))
            }
        };
        unit("initial_aspiration", self.initial_aspiration)?;
        unit("aspiration_decay", self.aspiration_decay)?;
        unit("deadline", self.deadline)?;
        if self.max_outcomes == 0 {
            return Err(EngineError::InvalidConfig("max_outcomes must be positive".into()));
        }
        if !(self.tolerance >= 0.0 && self.tolerance < 1.0) {
            return Err(EngineError::InvalidConfig(format!(
                "tolerance must be in [0, 1), got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}
