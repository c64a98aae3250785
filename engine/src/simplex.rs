//! Dense two-phase primal simplex
//!
//! Small, dependency-free LP solver sized for utility fitting: tens of
//! variables, up to a few hundred constraints. All variables have lower bound
//! 0 and an optional upper bound (stored as an extra `<=` row).
//!
//! Phase 1 minimizes the sum of artificial variables to find a feasible basis;
//! phase 2 optimizes the real objective from there. Entering columns are picked
//! by largest reduced cost, switching to Bland's rule after a run of degenerate
//! pivots, which rules out cycling.

use thiserror::Error;

/// Feasibility / pivot tolerance
const EPS: f64 = 1e-9;
/// Phase 1 residual above which the problem is declared infeasible
const FEASIBILITY_TOL: f64 = 1e-7;
/// Consecutive degenerate pivots before switching to Bland's rule
const DEGENERATE_STREAK: usize = 32;

/// Optimization direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Maximize,
    Minimize,
}

/// Constraint sense
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Le,
    Ge,
    Eq,
}

impl Comparison {
    fn flipped(self) -> Self {
        match self {
            Comparison::Le => Comparison::Ge,
            Comparison::Ge => Comparison::Le,
            Comparison::Eq => Comparison::Eq,
        }
    }
}

/// Handle to a variable of one [`LinearProgram`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Var(usize);

impl Var {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Reasons a solve can fail.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LpError {
    #[error("problem is infeasible")]
    Infeasible,
    #[error("objective is unbounded")]
    Unbounded,
    #[error("no optimum after {0} pivots")]
    IterationLimit(usize),
    #[error("non-finite coefficient or result")]
    NonFinite,
    #[error("constraint references unknown variable {0}")]
    UnknownVariable(usize),
}

#[derive(Debug, Clone)]
struct Row {
    terms: Vec<(usize, f64)>,
    cmp: Comparison,
    rhs: f64,
}

/// LP under construction.
#[derive(Debug, Clone)]
pub struct LinearProgram {
    direction: Direction,
    objective: Vec<f64>,
    upper: Vec<Option<f64>>,
    rows: Vec<Row>,
}

/// Optimal assignment returned by [`LinearProgram::solve`].
#[derive(Debug, Clone, PartialEq)]
pub struct LpSolution {
    values: Vec<f64>,
    objective: f64,
    pivots: usize,
}

impl LpSolution {
    pub fn value(&self, var: Var) -> f64 {
        self.values[var.0]
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn objective(&self) -> f64 {
        self.objective
    }

    /// Total pivots over both phases
    pub fn pivots(&self) -> usize {
        self.pivots
    }
}

impl LinearProgram {
    pub fn new(direction: Direction) -> Self {
        LinearProgram {
            direction,
            objective: Vec::new(),
            upper: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Add a variable in `[0, upper]` (unbounded above when `upper` is `None`)
    /// with the given objective coefficient.
    pub fn add_var(&mut self, objective: f64, upper: Option<f64>) -> Var {
        self.objective.push(objective);
        self.upper.push(upper);
        Var(self.objective.len() - 1)
    }

    /// Add `Σ coef · var  (cmp)  rhs`. Repeated variables are summed.
    pub fn add_constraint(&mut self, terms: &[(Var, f64)], cmp: Comparison, rhs: f64) {
        self.rows.push(Row {
            terms: terms.iter().map(|&(var, coef)| (var.0, coef)).collect(),
            cmp,
            rhs,
        });
    }

    pub fn var_count(&self) -> usize {
        self.objective.len()
    }

    pub fn constraint_count(&self) -> usize {
        self.rows.len()
    }

    /// Solve to optimality.
    pub fn solve(&self) -> Result<LpSolution, LpError> {
        let n = self.objective.len();
        if self.objective.iter().any(|c| !c.is_finite()) {
            return Err(LpError::NonFinite);
        }

        // Dense rows: explicit constraints, then upper bounds
        let mut dense: Vec<(Vec<f64>, Comparison, f64)> = Vec::with_capacity(self.rows.len() + n);
        for row in &self.rows {
            let mut coeffs = vec![0.0_f64; n];
            for &(j, coef) in &row.terms {
                if j >= n {
                    return Err(LpError::UnknownVariable(j));
                }
                coeffs[j] += coef;
            }
            dense.push((coeffs, row.cmp, row.rhs));
        }
        for (j, upper) in self.upper.iter().enumerate() {
            if let Some(u) = *upper {
                let mut coeffs = vec![0.0_f64; n];
                coeffs[j] = 1.0;
                dense.push((coeffs, Comparison::Le, u));
            }
        }
        if dense
            .iter()
            .any(|(coeffs, _, rhs)| !rhs.is_finite() || coeffs.iter().any(|c| !c.is_finite()))
        {
            return Err(LpError::NonFinite);
        }

        // Non-negative right-hand sides
        for (coeffs, cmp, rhs) in dense.iter_mut() {
            if *rhs < 0.0 {
                coeffs.iter_mut().for_each(|c| *c = -*c);
                *rhs = -*rhs;
                *cmp = cmp.flipped();
            }
        }

        let m = dense.len();
        let n_slack = dense.iter().filter(|(_, cmp, _)| *cmp != Comparison::Eq).count();
        let n_art = dense.iter().filter(|(_, cmp, _)| *cmp != Comparison::Le).count();
        let art_start = n + n_slack;
        let cols = art_start + n_art;

        let mut tableau = Tableau {
            rows: vec![vec![0.0_f64; cols + 1]; m],
            basis: vec![0usize; m],
            cols,
            pivots: 0,
            limit: (50 * (m + cols)).max(1_000),
        };

        let mut slack_col = n;
        let mut art_col = art_start;
        for (i, (coeffs, cmp, rhs)) in dense.into_iter().enumerate() {
            let row = &mut tableau.rows[i];
            row[..n].copy_from_slice(&coeffs);
            row[cols] = rhs;
            match cmp {
                Comparison::Le => {
                    row[slack_col] = 1.0;
                    tableau.basis[i] = slack_col;
                    slack_col += 1;
                }
                Comparison::Ge => {
                    row[slack_col] = -1.0;
                    slack_col += 1;
                    row[art_col] = 1.0;
                    tableau.basis[i] = art_col;
                    art_col += 1;
                }
                Comparison::Eq => {
                    row[art_col] = 1.0;
                    tableau.basis[i] = art_col;
                    art_col += 1;
                }
            }
        }

        // Phase 1: maximize -Σ artificials
        if n_art > 0 {
            let mut cost = vec![0.0_f64; cols];
            cost[art_start..].iter_mut().for_each(|c| *c = -1.0);
            tableau.optimize(&cost, cols)?;
            if tableau.value(&cost) < -FEASIBILITY_TOL {
                return Err(LpError::Infeasible);
            }
            tableau.evict_artificials(art_start);
        }

        // Phase 2
        let sign = match self.direction {
            Direction::Maximize => 1.0,
            Direction::Minimize => -1.0,
        };
        let mut cost = vec![0.0_f64; cols];
        for (j, &c) in self.objective.iter().enumerate() {
            cost[j] = sign * c;
        }
        tableau.optimize(&cost, art_start)?;

        let mut values = vec![0.0_f64; n];
        for (i, &b) in tableau.basis.iter().enumerate() {
            if b < n {
                values[b] = tableau.rows[i][cols].max(0.0);
            }
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(LpError::NonFinite);
        }
        let objective = values.iter().zip(&self.objective).map(|(x, c)| x * c).sum();
        Ok(LpSolution { values, objective, pivots: tableau.pivots })
    }
}

/// Simplex tableau in canonical form: `rows[i][cols]` is the right-hand side,
/// `basis[i]` the column basic in row i.
struct Tableau {
    rows: Vec<Vec<f64>>,
    basis: Vec<usize>,
    cols: usize,
    pivots: usize,
    limit: usize,
}

impl Tableau {
    /// Objective value of the current basic solution
    fn value(&self, cost: &[f64]) -> f64 {
        self.basis
            .iter()
            .zip(&self.rows)
            .map(|(&b, row)| cost[b] * row[self.cols])
            .sum()
    }

    /// Maximize `cost · x`, only letting columns `< allowed` enter the basis.
    fn optimize(&mut self, cost: &[f64], allowed: usize) -> Result<(), LpError> {
        let mut bland = false;
        let mut degenerate = 0usize;

        loop {
            if self.pivots >= self.limit {
                return Err(LpError::IterationLimit(self.pivots));
            }

            let basic_cost: Vec<f64> = self.basis.iter().map(|&b| cost[b]).collect();
            let mut is_basic = vec![false; self.cols];
            for &b in &self.basis {
                is_basic[b] = true;
            }

            // Entering column
            let mut entering = None;
            let mut best = EPS;
            for j in 0..allowed {
                if is_basic[j] {
                    continue;
                }
                let reduced = cost[j]
                    - basic_cost
                        .iter()
                        .zip(&self.rows)
                        .map(|(&cb, row)| cb * row[j])
                        .sum::<f64>();
                if !reduced.is_finite() {
                    return Err(LpError::NonFinite);
                }
                if bland {
                    if reduced > EPS {
                        entering = Some(j);
                        break;
                    }
                } else if reduced > best {
                    best = reduced;
                    entering = Some(j);
                }
            }
            let Some(j) = entering else {
                return Ok(());
            };

            // Ratio test, ties to the smallest basic column
            let mut leaving: Option<(usize, f64)> = None;
            for (i, row) in self.rows.iter().enumerate() {
                let a = row[j];
                if a <= EPS {
                    continue;
                }
                let ratio = row[self.cols] / a;
                leaving = match leaving {
                    None => Some((i, ratio)),
                    Some((r, best_ratio)) => {
                        if ratio < best_ratio - EPS
                            || (ratio <= best_ratio + EPS && self.basis[i] < self.basis[r])
                        {
                            Some((i, ratio))
                        } else {
                            Some((r, best_ratio))
                        }
                    }
                };
            }
            let Some((r, ratio)) = leaving else {
                return Err(LpError::Unbounded);
            };

            if ratio <= EPS {
                degenerate += 1;
                if degenerate >= DEGENERATE_STREAK {
                    bland = true;
                }
            } else {
                degenerate = 0;
            }

            self.pivot(r, j);
        }
    }

    fn pivot(&mut self, r: usize, j: usize) {
        let p = self.rows[r][j];
        for v in self.rows[r].iter_mut() {
            *v /= p;
        }
        let pivot_row = self.rows[r].clone();
        for (i, row) in self.rows.iter_mut().enumerate() {
            if i == r {
                continue;
            }
            let factor = row[j];
            if factor == 0.0 {
                continue;
            }
            for (v, &pv) in row.iter_mut().zip(&pivot_row) {
                *v -= factor * pv;
            }
            row[j] = 0.0;
            let rhs = &mut row[self.cols];
            if *rhs < 0.0 && *rhs > -EPS {
                *rhs = 0.0;
            }
        }
        self.basis[r] = j;
        self.pivots += 1;
    }

    /// Pivot zero-level artificials out of the basis. Rows with no usable
    /// column are redundant and keep their artificial at zero.
    fn evict_artificials(&mut self, art_start: usize) {
        for i in 0..self.rows.len() {
            if self.basis[i] < art_start {
                continue;
            }
            if let Some(j) = (0..art_start).find(|&j| self.rows[i][j].abs() > EPS) {
                self.pivot(i, j);
            }
        }
    }
}
