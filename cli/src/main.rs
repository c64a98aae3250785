//! parley CLI - Command-line interface for the parley negotiation engine
//!
//! This binary provides a harness for exercising the engine outside a live
//! negotiation: simulated negotiations against scripted opponents, domain
//! file inspection, and a fitter throughput benchmark.

mod config;
mod simulate;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use parley_domain::DomainFile;
use parley_engine::ranking::Ranking;
use parley_engine::test_domain::{build_test_domain, full_test_ranking};
use parley_engine::{OutcomeIndex, UtilityFitter};

use config::{CliConfig, FlagOverrides, LogFormat, OpponentKind, SimulationOverrides};

#[derive(Parser)]
#[command(name = "parley")]
#[command(about = "parley - negotiation under preference uncertainty", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (default: ./parley.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level filter; RUST_LOG takes precedence
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log output format
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulated negotiation against a scripted opponent
    Simulate {
        /// Domain file (.toml or .json)
        #[arg(short, long)]
        domain: PathBuf,

        /// Opponent strategy
        #[arg(short, long, value_enum)]
        opponent: Option<OpponentKind>,

        /// Number of rounds
        #[arg(short, long)]
        rounds: Option<usize>,

        /// Size of the initial ranking
        #[arg(long)]
        ranking: Option<usize>,

        /// Cost of one elicitation query
        #[arg(long)]
        cost: Option<f64>,

        /// Seed for ranking sampling and random opponents
        #[arg(long)]
        seed: Option<u64>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the issues and outcome space of a domain file
    Inspect {
        /// Domain file (.toml or .json)
        #[arg(short, long)]
        domain: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Benchmarks
    #[command(subcommand)]
    Bench(BenchCommands),
}

#[derive(Subcommand)]
enum BenchCommands {
    /// Time the LP utility fitter on the built-in party domain
    Fitter {
        /// Ranked outcomes per fit (2..=18)
        ranking_size: Option<usize>,

        /// Number of fits
        #[arg(long, default_value = "200")]
        iterations: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut flags = FlagOverrides {
        log_level: cli.log_level.clone(),
        log_format: cli.log_format,
        ..Default::default()
    };
    if let Commands::Simulate { opponent, rounds, ranking, cost, seed, .. } = &cli.command {
        flags.simulation = SimulationOverrides {
            rounds: *rounds,
            ranking_size: *ranking,
            elicitation_cost: *cost,
            seed: *seed,
            opponent: *opponent,
        };
    }
    let config = CliConfig::load(cli.config.as_deref(), &flags)?;
    config.validate()?;
    init_tracing(&config.log_level, config.log_format)?;

    match cli.command {
        Commands::Simulate { domain, json, .. } => {
            let file = DomainFile::load(&domain).with_context(|| format!("loading {}", domain.display()))?;
            let report = simulate::run(&file, &config)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                simulate::print_report(&report);
            }
        }
        Commands::Inspect { domain, json } => {
            let file = DomainFile::load(&domain).with_context(|| format!("loading {}", domain.display()))?;
            inspect(&file, json)?;
        }
        Commands::Bench(BenchCommands::Fitter { ranking_size, iterations }) => {
            bench_fitter(ranking_size.unwrap_or(18), iterations)?;
        }
    }
    Ok(())
}

fn init_tracing(level: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("invalid log level {level:?}"))?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.try_init(),
    }
    .map_err(|e| anyhow!(e))
}

#[derive(Serialize)]
struct IssueSummary {
    number: u32,
    name: String,
    values: Vec<String>,
}

#[derive(Serialize)]
struct DomainSummary {
    name: String,
    issues: Vec<IssueSummary>,
    outcome_space: u128,
    has_profile: bool,
    reservation: Option<f64>,
}

fn inspect(file: &DomainFile, json: bool) -> Result<()> {
    let domain = file.to_domain();
    let index = OutcomeIndex::new(&domain).context("invalid domain")?;
    let summary = DomainSummary {
        name: domain.name.clone(),
        issues: domain
            .issues
            .iter()
            .map(|issue| IssueSummary {
                number: issue.number,
                name: issue.name.clone(),
                values: issue.values().map(<[String]>::to_vec).unwrap_or_default(),
            })
            .collect(),
        outcome_space: index.outcome_space_size(),
        has_profile: file.profile.is_some(),
        reservation: file.profile.as_ref().map(|p| p.reservation),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }
    println!("Domain {:?}", summary.name);
    for issue in &summary.issues {
        println!("  [{}] {} ({} values): {}", issue.number, issue.name, issue.values.len(), issue.values.join(", "));
    }
    println!("Outcome space: {} outcomes", summary.outcome_space);
    match summary.reservation {
        Some(r) => println!("Profile: yes (reservation {r:.3})"),
        None => println!("Profile: none"),
    }
    Ok(())
}

fn bench_fitter(ranking_size: usize, iterations: usize) -> Result<()> {
    println!("Running LP fitter benchmark...");
    let index = OutcomeIndex::new(&build_test_domain())?;
    let full = full_test_ranking(&index);
    let size = ranking_size.clamp(2, full.len());
    // Evenly spaced picks, always keeping both ends
    let picks: Vec<_> = (0..size)
        .map(|i| full[i * (full.len() - 1) / (size - 1)].clone())
        .collect();
    let ranking = Ranking::new(picks)?;

    println!("Ranking size: {} outcomes, {} fits", ranking.len(), iterations);
    let start = Instant::now();
    let mut fitter = UtilityFitter::new();
    for _ in 0..iterations {
        fitter.fit(&index, &ranking)?;
    }
    let elapsed = start.elapsed();
    let fits_per_sec = iterations as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
    let epsilon = fitter.current().map(|m| m.epsilon()).unwrap_or_default();

    println!("Results:");
    println!("  Duration: {} ms", elapsed.as_millis());
    println!("  Throughput: {fits_per_sec:.2} fits/sec");
    println!("  Epsilon: {epsilon:.6}");
    Ok(())
}
