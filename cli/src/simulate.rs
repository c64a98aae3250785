//! Alternating-offers simulation between the engine and a scripted opponent

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info};

use parley_domain::{
    sample_ranking, AdditiveProfile, DomainFile, Hardliner, Opponent, RandomAbove, TimeConceder,
};
use parley_engine::{Bid, EngineStats, NegotiationEngine, OutcomeIndex, TurnAction};

use crate::config::{CliConfig, OpponentKind};

/// Who closed the negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Closure {
    /// Engine accepted the opponent's offer
    EngineAccepted,
    /// Opponent accepted the engine's offer
    OpponentAccepted,
    /// Engine walked away
    EngineEnded,
    /// Ran out of rounds
    Timeout,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub domain: String,
    pub opponent: String,
    pub rounds_played: usize,
    pub closure: Closure,
    pub agreement: Option<Bid>,
    /// True own utility of the agreement, or the reservation value without one
    pub own_utility: f64,
    /// Engine's fitted estimate of the agreement's own utility
    pub fitted_utility: Option<f64>,
    pub opponent_utility: Option<f64>,
    pub reservation: f64,
    pub stats: EngineStats,
}

pub fn run(file: &DomainFile, config: &CliConfig) -> Result<SimulationReport> {
    let sim = &config.simulation;
    let domain = file.to_domain();
    let index = OutcomeIndex::new(&domain).context("invalid domain")?;

    let mut profile = match &file.profile {
        Some(spec) => AdditiveProfile::from_spec(&index, spec).context("invalid preference profile")?,
        None => {
            info!(seed = sim.seed, "domain file has no profile; drawing a random one");
            AdditiveProfile::random(&index, sim.seed)
        }
    };
    let reservation = profile.reservation();

    let limit = config.engine.max_outcomes;
    let ranking = sample_ranking(&profile, &index, limit, sim.ranking_size, sim.seed)?;
    let mut engine = NegotiationEngine::new(&domain, &ranking, config.engine.clone())?;
    let mut opponent = build_opponent(sim.opponent, &profile, &index, config)?;

    let mut closure = Closure::Timeout;
    let mut agreement: Option<Bid> = None;
    let mut rounds_played = 0;

    for round in 0..sim.rounds {
        rounds_played = round + 1;
        // t reaches 1.0 on the last round
        let t = (round + 1) as f64 / sim.rounds as f64;

        let offer = index.decode(&opponent.propose(t));
        engine.observe_offer(&offer)?;

        let mixture = engine.last_offer_estimate().unwrap_or(0.5);
        let report = engine.run_elicitation_pass(&mut profile, mixture, sim.elicitation_cost)?;
        debug!(round, elicited = report.elicited.len(), stop = ?report.stop, "elicitation pass");

        match engine.choose_turn_action(Some(&offer), t, reservation)? {
            TurnAction::Accept => {
                closure = Closure::EngineAccepted;
                agreement = Some(offer);
                break;
            }
            TurnAction::End => {
                closure = Closure::EngineEnded;
                break;
            }
            TurnAction::Offer(bid) => {
                if opponent.accepts(&index.encode(&bid)?, t) {
                    closure = Closure::OpponentAccepted;
                    agreement = Some(bid);
                    break;
                }
            }
        }
    }

    let (own_utility, fitted_utility, opponent_utility) = match &agreement {
        Some(bid) => {
            let outcome = index.encode(bid)?;
            (
                profile.utility(&outcome),
                Some(engine.utility(bid)?),
                Some(opponent.utility(&outcome)),
            )
        }
        None => (reservation, None, None),
    };
    info!(?closure, rounds_played, own_utility, "simulation finished");

    Ok(SimulationReport {
        domain: domain.name,
        opponent: opponent.name().to_string(),
        rounds_played,
        closure,
        agreement,
        own_utility,
        fitted_utility,
        opponent_utility,
        reservation,
        stats: engine.stats(),
    })
}

/// Opponents get the mirrored profile, so interests conflict.
fn build_opponent(
    kind: OpponentKind,
    profile: &AdditiveProfile,
    index: &OutcomeIndex,
    config: &CliConfig,
) -> Result<Box<dyn Opponent>> {
    let theirs = profile.mirrored();
    let limit = config.engine.max_outcomes;
    let opponent: Box<dyn Opponent> = match kind {
        OpponentKind::Hardliner => Box::new(Hardliner::new(theirs, index, limit)?),
        OpponentKind::Conceder => Box::new(TimeConceder::new(theirs, index, limit, 2.0)?),
        OpponentKind::Boulware => Box::new(TimeConceder::new(theirs, index, limit, 0.2)?),
        OpponentKind::Random => Box::new(RandomAbove::new(
            theirs,
            index,
            limit,
            config.simulation.opponent_floor,
            config.simulation.seed.wrapping_add(1),
        )?),
    };
    Ok(opponent)
}

pub fn print_report(report: &SimulationReport) {
    println!("Negotiation on {:?} against {}", report.domain, report.opponent);
    println!("  Rounds played:   {}", report.rounds_played);
    println!("  Closure:         {:?}", report.closure);
    match &report.agreement {
        Some(bid) => println!("  Agreement:       {bid}"),
        None => println!("  Agreement:       none"),
    }
    println!("  Own utility:     {:.4} (reservation {:.4})", report.own_utility, report.reservation);
    if let Some(fitted) = report.fitted_utility {
        println!("  Fitted utility:  {fitted:.4}");
    }
    if let Some(theirs) = report.opponent_utility {
        println!("  Opponent:        {theirs:.4}");
    }
    let stats = &report.stats;
    println!("Engine:");
    println!("  Turns:           {}", stats.turns);
    println!("  Ranked outcomes: {} ({} unranked)", stats.ranked, stats.unranked);
    println!("  Elicitations:    {} (cost {:.4})", stats.elicitations, stats.elicitation_cost);
    println!("  Fits:            {} ({} failed)", stats.fits, stats.fit_failures);
    if let Some(error) = stats.mean_prediction_error {
        println!("  Prediction error: {:.2}%", error * 100.0);
    }
}
