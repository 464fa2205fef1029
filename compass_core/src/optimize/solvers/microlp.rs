//! Implements a solver interface for the pure Rust microlp simplex solver
use microlp::{ComparisonOp, LinearExpr, OptimizationDirection, Variable};
use nalgebra::DVector;

use crate::optimize::constraint::{Constraint, ConstraintTerm};
use crate::optimize::objective::ObjectiveSense;
use crate::optimize::problem::{Problem, ProblemOverlay};
use crate::optimize::solvers::{LpSolver, SolverError};
use crate::optimize::{OptimizationStatus, ProblemSolution};

/// A microlp session, the solver itself is stateless
#[derive(Clone, Debug, Default)]
pub struct MicrolpSolver {}

impl MicrolpSolver {
    pub fn new() -> Self {
        MicrolpSolver {}
    }
}

fn linear_expression(variables: &[Variable], terms: &[ConstraintTerm]) -> LinearExpr {
    let mut expression = LinearExpr::empty();
    for term in terms {
        expression.add(variables[term.variable], term.coefficient);
    }
    expression
}

impl LpSolver for MicrolpSolver {
    fn name(&self) -> &'static str {
        "microlp"
    }

    fn solve(
        &mut self,
        problem: &Problem,
        overlay: &ProblemOverlay,
    ) -> Result<ProblemSolution, SolverError> {
        let direction = match overlay.objective().sense() {
            ObjectiveSense::Minimize => OptimizationDirection::Minimize,
            ObjectiveSense::Maximize => OptimizationDirection::Maximize,
        };
        let mut lp = microlp::Problem::new(direction);
        let coefficients = overlay.objective().coefficients(problem.num_variables());
        let variables: Vec<Variable> = problem
            .variables()
            .map(|variable| lp.add_var(coefficients[variable.index], overlay.bounds(variable)))
            .collect();
        for (_, constraint) in problem.constraints() {
            match constraint {
                Constraint::Equality { terms, equals } => lp.add_constraint(
                    linear_expression(&variables, terms),
                    ComparisonOp::Eq,
                    *equals,
                ),
                Constraint::Inequality {
                    terms,
                    lower_bound,
                    upper_bound,
                } => {
                    if lower_bound.is_finite() {
                        lp.add_constraint(
                            linear_expression(&variables, terms),
                            ComparisonOp::Ge,
                            *lower_bound,
                        );
                    }
                    if upper_bound.is_finite() {
                        lp.add_constraint(
                            linear_expression(&variables, terms),
                            ComparisonOp::Le,
                            *upper_bound,
                        );
                    }
                }
            }
        }
        match lp.solve() {
            Ok(solution) => Ok(ProblemSolution {
                status: OptimizationStatus::Optimal,
                objective_value: Some(solution.objective()),
                variable_values: Some(DVector::from_iterator(
                    variables.len(),
                    variables.iter().map(|v| solution[*v]),
                )),
            }),
            Err(microlp::Error::Infeasible) => Ok(ProblemSolution::without_values(
                OptimizationStatus::Infeasible,
            )),
            Err(microlp::Error::Unbounded) => Ok(ProblemSolution::without_values(
                OptimizationStatus::Unbounded,
            )),
            #[allow(unreachable_patterns)]
            Err(_) => Ok(ProblemSolution::without_values(
                OptimizationStatus::NumericalError,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimize::objective::Objective;

    #[test]
    fn maximize_linear_program() {
        let mut problem = Problem::new();
        problem.add_new_variable("x", 0., 4.).unwrap();
        problem.add_new_variable("y", 0., f64::INFINITY).unwrap();
        problem
            .add_new_inequality_constraint_by_id("cap", &["x", "y"], &[1., 1.], f64::NEG_INFINITY, 6.)
            .unwrap();
        let mut objective = Objective::new_maximize();
        objective.add_linear_terms(&[0, 1], &[2., 1.]);
        let solution = MicrolpSolver::new()
            .solve(&problem, &ProblemOverlay::new(&objective))
            .unwrap();
        assert_eq!(solution.status, OptimizationStatus::Optimal);
        assert!((solution.objective_value.unwrap() - 10.).abs() < 1e-8);
    }
}
