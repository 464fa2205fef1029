//! Implements a solver interface for Clarabel
//!
//! Clarabel solves `min 1/2 x'Px + q'x` subject to `Ax + s = b`, `s` in a product of cones.
//! Equalities (and fixed variables) go to the zero cone, every finite inequality side and
//! variable bound becomes one row of the nonnegative cone.
use clarabel::algebra::CscMatrix;
use clarabel::solver::*;
use nalgebra::DVector;
use nalgebra_sparse::CooMatrix;

use crate::configuration::Configuration;
use crate::optimize::constraint::{Constraint, ConstraintTerm};
use crate::optimize::objective::ObjectiveSense;
use crate::optimize::problem::{Problem, ProblemOverlay};
use crate::optimize::solvers::{LpSolver, SolverError};
use crate::optimize::{OptimizationStatus, ProblemSolution};

/// Settings passed to every Clarabel solve
#[derive(Clone, Debug, PartialEq)]
pub struct ClarabelSettings {
    pub max_iterations: u32,
    /// Seconds, `None` for no limit
    pub time_limit: Option<f64>,
}

impl From<&Configuration> for ClarabelSettings {
    fn from(config: &Configuration) -> Self {
        ClarabelSettings {
            max_iterations: config.max_iterations,
            time_limit: config.time_limit,
        }
    }
}

/// A Clarabel session
#[derive(Clone, Debug)]
pub struct ClarabelSolver {
    settings: ClarabelSettings,
}

impl ClarabelSolver {
    pub fn new(settings: ClarabelSettings) -> Self {
        ClarabelSolver { settings }
    }
}

/// One row of `Ax + s = b`
struct ConeRow {
    terms: Vec<(usize, f64)>,
    rhs: f64,
}

impl ConeRow {
    fn from_terms(terms: &[ConstraintTerm], sign: f64, rhs: f64) -> Self {
        ConeRow {
            terms: terms
                .iter()
                .map(|t| (t.variable, sign * t.coefficient))
                .collect(),
            rhs,
        }
    }

    fn bound(variable: usize, sign: f64, rhs: f64) -> Self {
        ConeRow {
            terms: vec![(variable, sign)],
            rhs,
        }
    }
}

/// Split the problem into zero cone rows and nonnegative cone rows
fn cone_rows(problem: &Problem, overlay: &ProblemOverlay) -> (Vec<ConeRow>, Vec<ConeRow>) {
    let mut zero = Vec::new();
    let mut nonnegative = Vec::new();
    for (_, constraint) in problem.constraints() {
        match constraint {
            Constraint::Equality { terms, equals } => {
                zero.push(ConeRow::from_terms(terms, 1., *equals))
            }
            Constraint::Inequality {
                terms,
                lower_bound,
                upper_bound,
            } => {
                if upper_bound.is_finite() {
                    nonnegative.push(ConeRow::from_terms(terms, 1., *upper_bound));
                }
                if lower_bound.is_finite() {
                    nonnegative.push(ConeRow::from_terms(terms, -1., -lower_bound));
                }
            }
        }
    }
    for variable in problem.variables() {
        let (lower_bound, upper_bound) = overlay.bounds(variable);
        if lower_bound == upper_bound && lower_bound.is_finite() {
            zero.push(ConeRow::bound(variable.index, 1., lower_bound));
            continue;
        }
        if upper_bound.is_finite() {
            nonnegative.push(ConeRow::bound(variable.index, 1., upper_bound));
        }
        if lower_bound.is_finite() {
            nonnegative.push(ConeRow::bound(variable.index, -1., -lower_bound));
        }
    }
    (zero, nonnegative)
}

fn status_from_clarabel(status: SolverStatus) -> OptimizationStatus {
    match status {
        SolverStatus::Solved => OptimizationStatus::Optimal,
        SolverStatus::AlmostSolved => OptimizationStatus::AlmostOptimal,
        SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
            OptimizationStatus::Infeasible
        }
        SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => {
            OptimizationStatus::Unbounded
        }
        SolverStatus::NumericalError => OptimizationStatus::NumericalError,
        SolverStatus::Unsolved => OptimizationStatus::Unoptimized,
        SolverStatus::MaxIterations
        | SolverStatus::MaxTime
        | SolverStatus::InsufficientProgress => OptimizationStatus::SolverHalted,
        #[allow(unreachable_patterns)]
        _ => OptimizationStatus::SolverHalted,
    }
}

impl LpSolver for ClarabelSolver {
    fn name(&self) -> &'static str {
        "clarabel"
    }

    fn solve(
        &mut self,
        problem: &Problem,
        overlay: &ProblemOverlay,
    ) -> Result<ProblemSolution, SolverError> {
        let num_variables = problem.num_variables();
        let (zero, nonnegative) = cone_rows(problem, overlay);
        let num_rows = zero.len() + nonnegative.len();

        let mut coo = CooMatrix::new(num_rows, num_variables);
        let mut b = Vec::with_capacity(num_rows);
        for (row, cone_row) in zero.iter().chain(nonnegative.iter()).enumerate() {
            for (column, value) in &cone_row.terms {
                coo.push(row, *column, *value);
            }
            b.push(cone_row.rhs);
        }
        let csc = nalgebra_sparse::CscMatrix::from(&coo);
        let a = CscMatrix::new(
            num_rows,
            num_variables,
            csc.col_offsets().to_vec(),
            csc.row_indices().to_vec(),
            csc.values().to_vec(),
        );
        let p = CscMatrix::zeros((num_variables, num_variables));

        let sense = overlay.objective().sense();
        let mut q = overlay.objective().coefficients(num_variables);
        if sense == ObjectiveSense::Maximize {
            q.iter_mut().for_each(|c| *c = -*c);
        }

        let mut cones = Vec::new();
        if !zero.is_empty() {
            cones.push(ZeroConeT(zero.len()));
        }
        if !nonnegative.is_empty() {
            cones.push(NonnegativeConeT(nonnegative.len()));
        }

        let settings = DefaultSettingsBuilder::<f64>::default()
            .verbose(false)
            .max_iter(self.settings.max_iterations)
            .time_limit(self.settings.time_limit.unwrap_or(f64::INFINITY))
            .build()
            .map_err(|err| SolverError::InvalidSettings(err.to_string()))?;

        let mut solver = DefaultSolver::new(&p, &q, &a, &b, &cones, settings);
        solver.solve();

        let status = status_from_clarabel(solver.solution.status);
        if !matches!(
            status,
            OptimizationStatus::Optimal | OptimizationStatus::AlmostOptimal
        ) {
            return Ok(ProblemSolution::without_values(status));
        }
        let objective_value = match sense {
            ObjectiveSense::Minimize => solver.solution.obj_val,
            ObjectiveSense::Maximize => -solver.solution.obj_val,
        };
        Ok(ProblemSolution {
            status,
            objective_value: Some(objective_value),
            variable_values: Some(DVector::from_vec(solver.solution.x.clone())),
        })
    }
}
