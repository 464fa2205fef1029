//! Provides struct representing an optimization problem
//!
//! A [`Problem`] holds the variables and constraints shared by every solve. The per-solve
//! pieces, the objective and any temporary bound changes, live in a [`ProblemOverlay`] so
//! the base problem can be shared between threads without being cloned or mutated.
use crate::optimize::constraint::Constraint;
use crate::optimize::objective::Objective;
use crate::optimize::variable::Variable;
use indexmap::IndexMap;
use thiserror::Error;

/// An optimization problem
#[derive(Debug, Clone, Default)]
pub struct Problem {
    /// Variables of the optimization problem
    variables: IndexMap<String, Variable>,
    /// Constraints of the optimization problem
    constraints: IndexMap<String, Constraint>,
}

impl Problem {
    // region Creation Functions
    /// Create a new optimization problem, with no variables or constraints
    pub fn new() -> Self {
        Self::default()
    }
    // endregion Creation Functions

    // region Adding Variables
    /// Create a new variable and add it to the optimization problem, returning its index
    pub fn add_new_variable(
        &mut self,
        id: &str,
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<usize, ProblemError> {
        if self.variables.contains_key(id) {
            return Err(ProblemError::VariableIdAlreadyExists(id.to_string()));
        }
        if lower_bound.is_nan() || upper_bound.is_nan() || lower_bound > upper_bound {
            return Err(ProblemError::InvalidVariableBounds(id.to_string()));
        }
        let index = self.variables.len();
        self.variables.insert(
            id.to_string(),
            Variable::new(id, lower_bound, upper_bound, index),
        );
        Ok(index)
    }
    // endregion Adding Variables

    // region Adding Constraints
    /// Create a new equality constraint using variable ids, and add it to the problem
    pub fn add_new_equality_constraint_by_id(
        &mut self,
        id: &str,
        variables: &[&str],
        coefficients: &[f64],
        equals: f64,
    ) -> Result<(), ProblemError> {
        let indices = self.variable_indices(variables)?;
        self.add_constraint(id, Constraint::new_equality(&indices, coefficients, equals))
    }

    /// Create a new inequality constraint using variable ids, and add it to the problem
    pub fn add_new_inequality_constraint_by_id(
        &mut self,
        id: &str,
        variables: &[&str],
        coefficients: &[f64],
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<(), ProblemError> {
        if lower_bound.is_nan() || upper_bound.is_nan() || lower_bound > upper_bound {
            return Err(ProblemError::InvalidConstraintBounds(id.to_string()));
        }
        let indices = self.variable_indices(variables)?;
        self.add_constraint(
            id,
            Constraint::new_inequality(&indices, coefficients, lower_bound, upper_bound),
        )
    }

    /// Create a new equality constraint over variable indices, and add it to the problem
    pub fn add_new_equality_constraint(
        &mut self,
        id: &str,
        variables: &[usize],
        coefficients: &[f64],
        equals: f64,
    ) -> Result<(), ProblemError> {
        if let Some(missing) = variables.iter().find(|index| **index >= self.num_variables()) {
            return Err(ProblemError::NonExistentVariable(format!("#{missing}")));
        }
        self.add_constraint(id, Constraint::new_equality(variables, coefficients, equals))
    }

    fn add_constraint(&mut self, id: &str, constraint: Constraint) -> Result<(), ProblemError> {
        if self.constraints.contains_key(id) {
            return Err(ProblemError::ConstraintAlreadyExists(id.to_string()));
        }
        self.constraints.insert(id.to_string(), constraint);
        Ok(())
    }
    // endregion Adding Constraints

    // region Accessors
    /// Look up the index of a variable by id
    pub fn variable_index(&self, id: &str) -> Option<usize> {
        self.variables.get_index_of(id)
    }

    pub fn variable(&self, index: usize) -> Option<&Variable> {
        self.variables.get_index(index).map(|(_, var)| var)
    }

    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.values()
    }

    pub fn constraints(&self) -> impl Iterator<Item = (&str, &Constraint)> {
        self.constraints.iter().map(|(id, cons)| (id.as_str(), cons))
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    fn variable_indices(&self, variables: &[&str]) -> Result<Vec<usize>, ProblemError> {
        variables
            .iter()
            .map(|id| {
                self.variable_index(id)
                    .ok_or_else(|| ProblemError::NonExistentVariable(id.to_string()))
            })
            .collect()
    }
    // endregion Accessors
}

/// The per-solve view of a [`Problem`]: an objective plus bound overrides
///
/// Overrides replace the bounds of the base variable for this solve only.
#[derive(Debug, Clone)]
pub struct ProblemOverlay<'o> {
    objective: &'o Objective,
    bounds: IndexMap<usize, (f64, f64)>,
}

impl<'o> ProblemOverlay<'o> {
    pub fn new(objective: &'o Objective) -> Self {
        Self {
            objective,
            bounds: IndexMap::new(),
        }
    }

    pub fn objective(&self) -> &Objective {
        self.objective
    }

    /// Override the bounds of the variable at `index` for this solve
    pub fn set_bounds(
        &mut self,
        problem: &Problem,
        index: usize,
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<(), ProblemError> {
        let variable = problem
            .variable(index)
            .ok_or_else(|| ProblemError::NonExistentVariable(format!("#{index}")))?;
        if lower_bound.is_nan() || upper_bound.is_nan() || lower_bound > upper_bound {
            return Err(ProblemError::InvalidVariableBounds(variable.id.clone()));
        }
        self.bounds.insert(index, (lower_bound, upper_bound));
        Ok(())
    }

    /// Effective bounds of the variable, taking overrides into account
    pub fn bounds(&self, variable: &Variable) -> (f64, f64) {
        self.bounds
            .get(&variable.index)
            .copied()
            .unwrap_or((variable.lower_bound, variable.upper_bound))
    }
}

/// Errors associated with the optimization problem
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProblemError {
    /// Error when trying to add a variable which already exists
    #[error("Variable {0} already exists in the problem")]
    VariableIdAlreadyExists(String),
    /// Error when trying to add a constraint which already exists
    #[error("Constraint {0} already exists in the problem")]
    ConstraintAlreadyExists(String),
    /// Error when variable bounds are invalid (lower bound is greater than upper bound)
    #[error("Variable {0} has invalid bounds")]
    InvalidVariableBounds(String),
    /// Error when constraint bounds are invalid (lower bound is greater than upper bound)
    #[error("Constraint {0} has invalid bounds")]
    InvalidConstraintBounds(String),
    /// Error when referencing a variable which doesn't exist
    #[error("Variable {0} doesn't exist in the problem")]
    NonExistentVariable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_variables_and_constraints() {
        let mut problem = Problem::new();
        assert_eq!(problem.add_new_variable("x", 0., 10.).unwrap(), 0);
        assert_eq!(problem.add_new_variable("y", 0., f64::INFINITY).unwrap(), 1);
        problem
            .add_new_equality_constraint_by_id("balance", &["x", "y"], &[1., -1.], 0.)
            .unwrap();
        problem
            .add_new_inequality_constraint_by_id("cap", &["x"], &[2.], 1., 4.)
            .unwrap();
        assert_eq!(problem.num_variables(), 2);
        assert_eq!(problem.num_constraints(), 2);
        assert_eq!(problem.variable_index("y"), Some(1));
        let (id, cons) = problem.constraints().next().unwrap();
        assert_eq!(id, "balance");
        assert_eq!(format!("{}", cons), "1*x0 + -1*x1 = 0");
    }

    #[test]
    fn invalid_additions() {
        let mut problem = Problem::new();
        problem.add_new_variable("x", 0., 1.).unwrap();
        assert_eq!(
            problem.add_new_variable("x", 0., 1.),
            Err(ProblemError::VariableIdAlreadyExists("x".to_string()))
        );
        assert_eq!(
            problem.add_new_variable("z", 2., 1.),
            Err(ProblemError::InvalidVariableBounds("z".to_string()))
        );
        assert_eq!(
            problem.add_new_equality_constraint_by_id("c", &["missing"], &[1.], 0.),
            Err(ProblemError::NonExistentVariable("missing".to_string()))
        );
        problem
            .add_new_equality_constraint_by_id("c", &["x"], &[1.], 0.)
            .unwrap();
        assert_eq!(
            problem.add_new_equality_constraint_by_id("c", &["x"], &[1.], 0.),
            Err(ProblemError::ConstraintAlreadyExists("c".to_string()))
        );
    }

    #[test]
    fn overlay_overrides_bounds_without_touching_problem() {
        let mut problem = Problem::new();
        problem.add_new_variable("x", 0., 10.).unwrap();
        problem.add_new_variable("y", -5., 5.).unwrap();
        let objective = Objective::new_maximize();
        let mut overlay = ProblemOverlay::new(&objective);
        overlay.set_bounds(&problem, 0, 3., 4.).unwrap();
        let x = problem.variable(0).unwrap();
        let y = problem.variable(1).unwrap();
        assert_eq!(overlay.bounds(x), (3., 4.));
        assert_eq!(overlay.bounds(y), (-5., 5.));
        assert_eq!((x.lower_bound, x.upper_bound), (0., 10.));
        assert!(overlay.set_bounds(&problem, 1, 1., 0.).is_err());
        assert!(overlay.set_bounds(&problem, 7, 0., 1.).is_err());
    }
}
