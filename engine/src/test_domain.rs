//! Hardcoded fixture domains for engine tests and benchmarks
//!
//! `small_domain`: two issues, two values each.
//!   1 "A": [x, y]
//!   2 "B": [p, q]
//!
//! `build_test_domain`: a 3-issue party domain (18 outcomes) with a fixed
//! hidden additive utility, so rankings can be generated without an oracle.
//!
//!   1 "food"  [chips, pizza, sushi]   weight 0.5  evals [0.0, 0.5, 1.0]
//!   2 "music" [band, dj, none]        weight 0.3  evals [1.0, 0.7, 0.0]
//!   3 "venue" [garden, hall]          weight 0.2  evals [0.3, 1.0]

use crate::domain::{Domain, Issue};
use crate::index::{Outcome, OutcomeIndex};

const WEIGHTS: [f64; 3] = [0.5, 0.3, 0.2];
const EVALS: [&[f64]; 3] = [&[0.0, 0.5, 1.0], &[1.0, 0.7, 0.0], &[0.3, 1.0]];

/// Two issues with two values each.
pub fn small_domain() -> Domain {
    Domain::new(
        "small",
        vec![Issue::discrete(1, "A", vec!["x", "y"]), Issue::discrete(2, "B", vec!["p", "q"])],
    )
}

/// Three-issue fixture domain with 18 outcomes.
pub fn build_test_domain() -> Domain {
    Domain::new(
        "party",
        vec![
            Issue::discrete(1, "food", vec!["chips", "pizza", "sushi"]),
            Issue::discrete(2, "music", vec!["band", "dj", "none"]),
            Issue::discrete(3, "venue", vec!["garden", "hall"]),
        ],
    )
}

/// Hidden true utility of an outcome of `build_test_domain`.
pub fn test_utility(outcome: &Outcome) -> f64 {
    outcome
        .slots()
        .iter()
        .enumerate()
        .map(|(position, &slot)| WEIGHTS[position] * EVALS[position][slot as usize])
        .sum()
}

/// Every outcome of `build_test_domain`, least to most preferred.
pub fn full_test_ranking(index: &OutcomeIndex) -> Vec<Outcome> {
    let mut all = index.enumerate(usize::MAX).expect("fixture domain is small");
    all.sort_by(|a, b| test_utility(a).total_cmp(&test_utility(b)));
    all
}

/// Every `stride`-th outcome of the full ranking, plus the best one.
pub fn partial_test_ranking(index: &OutcomeIndex, stride: usize) -> Vec<Outcome> {
    let full = full_test_ranking(index);
    let last = full.len() - 1;
    full.into_iter()
        .enumerate()
        .filter(|(i, _)| i % stride == 0 || *i == last)
        .map(|(_, outcome)| outcome)
        .collect()
}
