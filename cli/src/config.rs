//! Layered CLI configuration
//!
//! Precedence (lowest to highest):
//! 1. Programmatic defaults
//! 2. `parley.toml` in the working directory, or the file given by `--config`
//! 3. `PARLEY_*` environment variables (`__` separates nested keys, e.g.
//!    `PARLEY_ENGINE__ASPIRATION_DECAY=0.8`)
//! 4. Command-line flags

use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use parley_engine::EngineConfig;

pub const DEFAULT_CONFIG_FILE: &str = "parley.toml";

/// Scripted opponent strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OpponentKind {
    /// Always offers its best outcome
    Hardliner,
    /// Concedes early (exponent 2)
    Conceder,
    /// Holds out until late (exponent 0.2)
    Boulware,
    /// Random outcomes above a utility floor
    Random,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub log_level: String,
    pub log_format: LogFormat,
    pub simulation: SimulationConfig,
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub rounds: usize,
    pub ranking_size: usize,
    pub elicitation_cost: f64,
    pub seed: u64,
    pub opponent: OpponentKind,
    /// Utility floor of the random opponent
    pub opponent_floor: f64,
}

impl Default for CliConfig {
    fn default() -> Self {
        CliConfig {
            log_level: "warn".into(),
            log_format: LogFormat::Pretty,
            simulation: SimulationConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            rounds: 100,
            ranking_size: 10,
            elicitation_cost: 0.01,
            seed: 0,
            opponent: OpponentKind::Conceder,
            opponent_floor: 0.6,
        }
    }
}

/// Flag values that override every other layer. `None` leaves the lower
/// layers untouched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FlagOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_format: Option<LogFormat>,
    pub simulation: SimulationOverrides,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SimulationOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rounds: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ranking_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elicitation_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opponent: Option<OpponentKind>,
}

impl CliConfig {
    /// Merge every layer. A missing config file is skipped silently unless
    /// it was named explicitly.
    pub fn load(config_file: Option<&Path>, flags: &FlagOverrides) -> Result<Self> {
        let file = match config_file {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("config file {} does not exist", path.display());
                }
                path
            }
            None => Path::new(DEFAULT_CONFIG_FILE),
        };
        Self::figment(file, flags).extract().context("failed to load configuration")
    }

    fn figment(file: &Path, flags: &FlagOverrides) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(CliConfig::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed("PARLEY_").split("__"))
            .merge(Serialized::defaults(flags))
    }

    pub fn validate(&self) -> Result<()> {
        self.engine.validate().context("invalid [engine] configuration")?;
        let sim = &self.simulation;
        anyhow::ensure!(sim.rounds > 0, "simulation.rounds must be positive");
        anyhow::ensure!(sim.ranking_size >= 2, "simulation.ranking_size must be at least 2");
        anyhow::ensure!(
            sim.elicitation_cost.is_finite() && sim.elicitation_cost >= 0.0,
            "simulation.elicitation_cost must be a non-negative number"
        );
        anyhow::ensure!(
            (0.0..=1.0).contains(&sim.opponent_floor),
            "simulation.opponent_floor must be in [0, 1], got {}",
            sim.opponent_floor
        );
        Ok(())
    }
}
