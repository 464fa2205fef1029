//! Module providing representation of optimization problem variables
use std::fmt::{Display, Formatter};

/// A continuous variable of a linear problem
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    /// Used to identify the variable
    pub id: String,
    /// Lowest value the variable can take, may be `f64::NEG_INFINITY`
    pub lower_bound: f64,
    /// Highest value the variable can take, may be `f64::INFINITY`
    pub upper_bound: f64,
    /// Position of the variable in the problem
    pub index: usize,
}

impl Variable {
    /// Create a new variable
    pub(crate) fn new(id: &str, lower_bound: f64, upper_bound: f64, index: usize) -> Variable {
        Variable {
            id: id.to_string(),
            lower_bound,
            upper_bound,
            index,
        }
    }
}

impl Display for Variable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} <= {} <= {}", self.lower_bound, self.id, self.upper_bound)
    }
}
