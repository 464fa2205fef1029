//! Builds the base flux balance problem shared by every sample
//!
//! Each reaction is split into non-negative directional variables (see
//! [`Reaction::directions`](crate::metabolic_model::reaction::Reaction::directions)), and
//! each metabolite contributes one steady state row, `S v = 0`. The media is applied to
//! the reaction bounds before the split.
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use thiserror::Error;
use tracing::debug;

use crate::io::media::{MediaConstraints, MediaError};
use crate::metabolic_model::expression::ReactionWeights;
use crate::metabolic_model::model::{Model, ModelError};
use crate::metabolic_model::reaction::ReactionDirection;
use crate::optimize::objective::Objective;
use crate::optimize::problem::{Problem, ProblemError, ProblemOverlay};
use crate::optimize::solvers::{LpSolver, SolverError};
use crate::optimize::ProblemSolution;

/// Immutable base problem of a model under a media
#[derive(Debug, Clone)]
pub struct NetworkProblem {
    problem: Problem,
    /// Directional variables, index aligned with the problem variables
    directions: Vec<ReactionDirection>,
    /// Index of the opposite direction of the same reaction, if any
    partners: Vec<Option<usize>>,
}

impl NetworkProblem {
    /// Build the base problem for `model` with the bounds of `media` applied
    pub fn build(model: &Model, media: &MediaConstraints) -> Result<Self, NetworkError> {
        media.validate(model)?;
        let mut directions = Vec::new();
        let mut partners = Vec::new();
        let mut entries = Vec::new();
        for reaction in model.reactions.values() {
            let mut effective = reaction.clone();
            (effective.lower_bound, effective.upper_bound) =
                media.bounds_for(&reaction.id, (reaction.lower_bound, reaction.upper_bound));
            let first = directions.len();
            let reaction_directions = effective.directions();
            let paired = reaction_directions.len() == 2;
            for (offset, direction) in reaction_directions.into_iter().enumerate() {
                let column = first + offset;
                for (metabolite, coefficient) in &reaction.metabolites {
                    let row = model.metabolites.get_index_of(metabolite).ok_or_else(|| {
                        ModelError::UnknownMetabolite {
                            reaction: reaction.id.clone(),
                            metabolite: metabolite.clone(),
                        }
                    })?;
                    entries.push((row, column, direction.direction.sign() * coefficient));
                }
                partners.push(paired.then_some(first + 1 - offset));
                directions.push(direction);
            }
        }

        let mut coo = CooMatrix::new(model.metabolites.len(), directions.len());
        for (row, column, value) in entries {
            coo.push(row, column, value);
        }
        let stoichiometry = CsrMatrix::from(&coo);

        let mut problem = Problem::new();
        for direction in &directions {
            problem.add_new_variable(&direction.id, direction.bounds.0, direction.bounds.1)?;
        }
        for ((metabolite, _), row) in model.metabolites.iter().zip(stoichiometry.row_iter()) {
            if row.nnz() == 0 {
                continue;
            }
            problem.add_new_equality_constraint(metabolite, row.col_indices(), row.values(), 0.)?;
        }
        debug!(
            media = %media.name,
            variables = problem.num_variables(),
            constraints = problem.num_constraints(),
            "built network problem"
        );
        Ok(NetworkProblem {
            problem,
            directions,
            partners,
        })
    }

    pub fn problem(&self) -> &Problem {
        &self.problem
    }

    /// Directional variables, in problem order
    pub fn directions(&self) -> &[ReactionDirection] {
        &self.directions
    }

    pub fn direction_index(&self, id: &str) -> Option<usize> {
        self.problem.variable_index(id)
    }

    /// Opposite direction of the reaction owning the variable at `index`
    pub fn partner(&self, index: usize) -> Option<usize> {
        self.partners.get(index).copied().flatten()
    }

    /// Solve the base problem with no objective, to check the media admits a steady state
    pub fn check_feasible(&self, solver: &mut dyn LpSolver) -> Result<ProblemSolution, SolverError> {
        let objective = Objective::new_minimize();
        solver.solve(&self.problem, &ProblemOverlay::new(&objective))
    }

    /// Minimization objective charging every directional flux its reaction's cost
    pub fn sample_objective(&self, weights: &ReactionWeights) -> Objective {
        let mut objective = Objective::new_minimize();
        for (index, direction) in self.directions.iter().enumerate() {
            objective.add_linear_term(index, weights.cost(&direction.reaction).unwrap_or(1.));
        }
        objective
    }
}

/// Errors building the base problem
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("invalid model: {0}")]
    Model(#[from] ModelError),
    #[error("invalid media: {0}")]
    Media(#[from] MediaError),
    #[error("unable to build problem: {0}")]
    Problem(#[from] ProblemError),
}
