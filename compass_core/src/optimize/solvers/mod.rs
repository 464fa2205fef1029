//! Linear solver backends
//!
//! Every backend implements [`LpSolver`]. A solver instance is a session owned by a single
//! worker; sessions are created through a [`SolverFactory`] so each thread gets its own.
use std::sync::Arc;

use cfg_if::cfg_if;
use thiserror::Error;

use crate::configuration::{Configuration, Solver};
use crate::optimize::problem::{Problem, ProblemOverlay};
use crate::optimize::ProblemSolution;

pub mod clarabel;
#[cfg(feature = "minilp")]
pub mod microlp;

/// A linear program solver session
pub trait LpSolver {
    /// Name of the backend, for logging
    fn name(&self) -> &'static str;

    /// Solve `problem` with the objective and bound overrides of `overlay`
    ///
    /// Infeasible, unbounded or halted solves are reported through the returned
    /// [`ProblemSolution::status`]; an `Err` means the backend could not run at all.
    fn solve(
        &mut self,
        problem: &Problem,
        overlay: &ProblemOverlay,
    ) -> Result<ProblemSolution, SolverError>;
}

/// Creates independent solver sessions
pub type SolverFactory = Arc<dyn Fn() -> Result<Box<dyn LpSolver>, SolverError> + Send + Sync>;

/// Factory for the backend named in the configuration
pub fn solver_factory(config: &Configuration) -> Result<SolverFactory, SolverError> {
    match config.solver {
        Solver::Clarabel => {
            let settings = clarabel::ClarabelSettings::from(config);
            Ok(Arc::new(move || {
                Ok(Box::new(clarabel::ClarabelSolver::new(settings.clone())) as Box<dyn LpSolver>)
            }))
        }
        Solver::Microlp => microlp_factory(),
    }
}

cfg_if! {
    if #[cfg(feature = "minilp")] {
        fn microlp_factory() -> Result<SolverFactory, SolverError> {
            Ok(Arc::new(|| Ok(Box::new(microlp::MicrolpSolver::new()) as Box<dyn LpSolver>)))
        }
    } else {
        fn microlp_factory() -> Result<SolverFactory, SolverError> {
            Err(SolverError::FeatureNotEnabled("minilp"))
        }
    }
}

/// Errors raised when a backend can't run
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("solver requires the {0} feature, which is not enabled")]
    FeatureNotEnabled(&'static str),
    #[error("invalid solver settings: {0}")]
    InvalidSettings(String),
    #[error("solver failed: {0}")]
    Backend(String),
}
