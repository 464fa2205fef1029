//! Reaction penalties
//!
//! The penalty of a directional reaction `R` in a sample is the least total flux cost the
//! sample pays to keep `R` near its maximal flux. It takes two linear programs:
//!
//! 1. The reference: maximise `R` with its opposite direction pinned to 0. This does not
//!    depend on the sample, so it is computed once per network as [`ReferenceFluxes`].
//! 2. The penalty: require `R >= optimality_fraction * max_R`, keep the opposite direction
//!    at 0, and minimise the sample's cost weighted flux. The optimum is the penalty.
//!
//! Reactions that can't carry flux, and solves that don't reach an optimum, give an
//! [`PenaltyResult::Unsolved`] sentinel instead of an error.
use indexmap::IndexMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::configuration::Configuration;
use crate::metabolic_model::expression::ReactionWeights;
use crate::optimize::network::NetworkProblem;
use crate::optimize::objective::Objective;
use crate::optimize::problem::ProblemOverlay;
use crate::optimize::solvers::{LpSolver, SolverError, SolverFactory};
use crate::optimize::OptimizationStatus;

/// Outcome of one (sample, reaction) penalty computation
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PenaltyResult {
    /// Optimal objective of the penalty problem
    Penalty(f64),
    /// No penalty could be computed
    Unsolved(UnsolvedReason),
}

impl PenaltyResult {
    pub fn value(&self) -> Option<f64> {
        match self {
            PenaltyResult::Penalty(value) => Some(*value),
            PenaltyResult::Unsolved(_) => None,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        matches!(self, PenaltyResult::Unsolved(_))
    }
}

/// Why a penalty is missing
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnsolvedReason {
    /// The reaction can't carry flux under the media
    Blocked,
    Infeasible,
    Unbounded,
    /// Iteration or time limit, or stalled progress
    SolverHalted,
    NumericalError,
}

impl UnsolvedReason {
    fn from_status(status: OptimizationStatus) -> Self {
        match status {
            OptimizationStatus::Infeasible => UnsolvedReason::Infeasible,
            OptimizationStatus::Unbounded => UnsolvedReason::Unbounded,
            OptimizationStatus::NumericalError => UnsolvedReason::NumericalError,
            OptimizationStatus::SolverHalted
            | OptimizationStatus::Unoptimized
            | OptimizationStatus::Optimal
            | OptimizationStatus::AlmostOptimal => UnsolvedReason::SolverHalted,
        }
    }
}

/// Outcome of the reference maximisation of one directional variable
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceFlux {
    Maximum(f64),
    /// The maximisation did not reach an optimum
    Unsolved(UnsolvedReason),
}

impl ReferenceFlux {
    pub fn maximum(&self) -> Option<f64> {
        match self {
            ReferenceFlux::Maximum(max) => Some(*max),
            ReferenceFlux::Unsolved(_) => None,
        }
    }
}

/// Maximal flux of `network`'s directional variable at `index`
pub fn reference_flux(
    network: &NetworkProblem,
    solver: &mut dyn LpSolver,
    index: usize,
) -> Result<ReferenceFlux, SolverError> {
    let mut objective = Objective::new_maximize();
    objective.add_linear_term(index, 1.);
    let mut overlay = ProblemOverlay::new(&objective);
    if let Some(partner) = network.partner(index) {
        overlay
            .set_bounds(network.problem(), partner, 0., 0.)
            .map_err(|err| SolverError::Backend(err.to_string()))?;
    }
    let solution = solver.solve(network.problem(), &overlay)?;
    match (solution.is_optimal(), solution.objective_value) {
        (true, Some(max)) => Ok(ReferenceFlux::Maximum(max)),
        (true, None) => Ok(ReferenceFlux::Unsolved(UnsolvedReason::NumericalError)),
        (false, _) => {
            debug!(index, status = ?solution.status, "reference solve not optimal");
            Ok(ReferenceFlux::Unsolved(UnsolvedReason::from_status(solution.status)))
        }
    }
}

/// Reference (maximal) flux of every directional variable, keyed by directional id
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReferenceFluxes {
    maxima: IndexMap<String, ReferenceFlux>,
}

impl ReferenceFluxes {
    /// Solve the reference problem for every directional variable, in parallel on the
    /// current rayon pool with one solver session per thread
    pub fn compute(network: &NetworkProblem, factory: &SolverFactory) -> Result<Self, SolverError> {
        let maxima = network
            .directions()
            .par_iter()
            .enumerate()
            .map_init(
                || factory(),
                |session, (index, direction)| {
                    let solver = session.as_mut().map_err(|err| err.clone())?;
                    let max = reference_flux(network, solver.as_mut(), index)?;
                    Ok((direction.id.clone(), max))
                },
            )
            .collect::<Result<Vec<_>, SolverError>>()?;
        Ok(ReferenceFluxes {
            maxima: maxima.into_iter().collect(),
        })
    }

    /// Reference flux of a directional reaction, `None` if unknown
    pub fn get(&self, id: &str) -> Option<ReferenceFlux> {
        self.maxima.get(id).copied()
    }

    /// Whether these fluxes were computed for exactly the directions of `network`
    pub fn covers(&self, network: &NetworkProblem) -> bool {
        self.maxima.len() == network.directions().len()
            && self
                .maxima
                .keys()
                .zip(network.directions())
                .all(|(id, direction)| *id == direction.id)
    }
}

/// Penalty problems of one sample
///
/// Holds the sample's objective, the base problem is only borrowed.
#[derive(Debug)]
pub struct SamplePenalties<'n> {
    network: &'n NetworkProblem,
    objective: Objective,
    tolerance: f64,
    optimality_fraction: f64,
}

impl<'n> SamplePenalties<'n> {
    pub fn new(network: &'n NetworkProblem, weights: &ReactionWeights, config: &Configuration) -> Self {
        SamplePenalties {
            network,
            objective: network.sample_objective(weights),
            tolerance: config.tolerance,
            optimality_fraction: config.optimality_fraction,
        }
    }

    /// Penalty of the directional variable at `index`, given its reference flux
    ///
    /// A missing, infeasible or near zero reference means the reaction is blocked; any
    /// other unsolved reference passes its reason through.
    pub fn penalty(
        &self,
        solver: &mut dyn LpSolver,
        index: usize,
        reference: Option<ReferenceFlux>,
    ) -> Result<PenaltyResult, SolverError> {
        let max = match reference {
            Some(ReferenceFlux::Maximum(max)) if max > self.tolerance => max,
            Some(ReferenceFlux::Unsolved(reason)) if reason != UnsolvedReason::Infeasible => {
                return Ok(PenaltyResult::Unsolved(reason))
            }
            _ => return Ok(PenaltyResult::Unsolved(UnsolvedReason::Blocked)),
        };
        let problem = self.network.problem();
        let variable = problem
            .variable(index)
            .ok_or_else(|| SolverError::Backend(format!("no variable at index {index}")))?;
        // never looser than the model's own lower bound
        let lower_bound = (self.optimality_fraction * max)
            .max(variable.lower_bound)
            .min(variable.upper_bound);
        let mut overlay = ProblemOverlay::new(&self.objective);
        overlay
            .set_bounds(problem, index, lower_bound, variable.upper_bound)
            .map_err(|err| SolverError::Backend(err.to_string()))?;
        if let Some(partner) = self.network.partner(index) {
            overlay
                .set_bounds(problem, partner, 0., 0.)
                .map_err(|err| SolverError::Backend(err.to_string()))?;
        }
        let solution = solver.solve(problem, &overlay)?;
        let result = match (solution.is_optimal(), solution.objective_value) {
            (true, Some(value)) => PenaltyResult::Penalty(value),
            _ => PenaltyResult::Unsolved(UnsolvedReason::from_status(solution.status)),
        };
        debug!(reaction = %variable.id, ?result, "penalty solved");
        Ok(result)
    }
}
