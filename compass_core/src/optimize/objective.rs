//! Provides struct for representing an optimization problem's objective

/// Represents the linear Objective of an optimization problem
#[derive(Debug, Clone, PartialEq)]
pub struct Objective {
    /// Terms included in the objective (See [`ObjectiveTerm`])
    terms: Vec<ObjectiveTerm>,
    /// Sense of the objective (maximize, or minimize), see [`ObjectiveSense`]
    sense: ObjectiveSense,
}

impl Objective {
    /// Create a new empty objective, with a given sense
    pub fn new(sense: ObjectiveSense) -> Self {
        Self {
            terms: Vec::new(),
            sense,
        }
    }

    /// Create a new empty maximization objective
    pub fn new_maximize() -> Self {
        Self::new(ObjectiveSense::Maximize)
    }

    /// Create a new empty minimization objective
    pub fn new_minimize() -> Self {
        Self::new(ObjectiveSense::Minimize)
    }

    pub fn sense(&self) -> ObjectiveSense {
        self.sense
    }

    /// Add a new linear term to the objective
    pub fn add_linear_term(&mut self, variable: usize, coefficient: f64) {
        self.terms.push(ObjectiveTerm {
            variable,
            coefficient,
        });
    }

    /// Add a series of linear terms to the objective function
    pub fn add_linear_terms(&mut self, variables: &[usize], coefficients: &[f64]) {
        self.terms.extend(
            variables
                .iter()
                .zip(coefficients)
                .map(|(variable, coefficient)| ObjectiveTerm {
                    variable: *variable,
                    coefficient: *coefficient,
                }),
        );
    }

    pub fn terms(&self) -> &[ObjectiveTerm] {
        &self.terms
    }

    /// Dense coefficient vector over `num_variables` variables, repeated terms are summed
    pub fn coefficients(&self, num_variables: usize) -> Vec<f64> {
        let mut coefficients = vec![0.; num_variables];
        for term in &self.terms {
            coefficients[term.variable] += term.coefficient;
        }
        coefficients
    }
}

/// Represents the sense of the objective, whether it should be maximized or minimized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectiveSense {
    /// The objective should be minimized
    Minimize,
    /// The objective should be maximized
    Maximize,
}

/// A linear term in the objective
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectiveTerm {
    /// Index of the variable in the problem
    pub variable: usize,
    /// Coefficient for linear term
    pub coefficient: f64,
}
