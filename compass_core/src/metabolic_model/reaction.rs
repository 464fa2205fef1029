//! This module provides a struct for representing reactions
use derive_builder::Builder;
use indexmap::IndexMap;

use super::gene::Gpr;
use crate::configuration::CONFIGURATION;

/// Represents a reaction in the metabolic model
#[derive(Builder, Debug, Clone)]
pub struct Reaction {
    /// Used to identify the reaction
    pub id: String,
    /// Metabolite stoichiometry of the reaction
    #[builder(default = "IndexMap::new()")]
    pub metabolites: IndexMap<String, f64>,
    /// Human-readable reaction name
    #[builder(default = "None")]
    pub name: Option<String>,
    /// Gene Protein Reaction rule relating gene expression to the reaction
    #[builder(default = "None")]
    pub gpr: Option<Gpr>,
    /// Lower flux bound
    #[builder(default = "default_lower_bound()")]
    pub lower_bound: f64,
    /// Upper flux bound
    #[builder(default = "default_upper_bound()")]
    pub upper_bound: f64,
    /// Reaction subsystem, informational only
    #[builder(default = "None")]
    pub subsystem: Option<String>,
}

fn default_lower_bound() -> f64 {
    CONFIGURATION
        .read()
        .map(|config| config.lower_bound)
        .unwrap_or(-1000.)
}

fn default_upper_bound() -> f64 {
    CONFIGURATION
        .read()
        .map(|config| config.upper_bound)
        .unwrap_or(1000.)
}

impl Reaction {
    /// Determine the id to be associated with the forward reaction in the optimization problem
    ///
    /// # Note:
    /// The forward id is "{reaction_id}_forward"
    pub fn get_forward_id(&self) -> String {
        format!("{}_forward", &self.id)
    }

    /// Determine the id to be associated with the reverse reaction in the optimization problem
    ///
    /// # Note:
    /// The reverse id is "{reaction_id}_reverse"
    pub fn get_reverse_id(&self) -> String {
        format!("{}_reverse", &self.id)
    }

    /// Whether the reaction can run backwards, and so gets a reverse variable
    pub fn is_reversible(&self) -> bool {
        self.lower_bound < 0f64
    }

    /// Bounds of the variable associated with the forward reaction
    pub(crate) fn get_forward_bounds(&self) -> (f64, f64) {
        (self.lower_bound.max(0f64), self.upper_bound.max(0f64))
    }

    /// Bounds of the variable associated with the reverse reaction
    pub(crate) fn get_reverse_bounds(&self) -> (f64, f64) {
        ((-self.upper_bound).max(0f64), (-self.lower_bound).max(0f64))
    }

    /// The directional variables of this reaction, forward first
    pub fn directions(&self) -> Vec<ReactionDirection> {
        let mut directions = vec![ReactionDirection {
            id: self.get_forward_id(),
            reaction: self.id.clone(),
            direction: Direction::Forward,
            bounds: self.get_forward_bounds(),
        }];
        if self.is_reversible() {
            directions.push(ReactionDirection {
                id: self.get_reverse_id(),
                reaction: self.id.clone(),
                direction: Direction::Reverse,
                bounds: self.get_reverse_bounds(),
            });
        }
        directions
    }
}

/// Which way a directional variable runs its reaction
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Forward,
    Reverse,
}

impl Direction {
    /// Sign applied to the reaction's stoichiometry
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Forward => 1.,
            Direction::Reverse => -1.,
        }
    }
}

/// One direction of a reaction, the unit penalties are computed for
#[derive(Clone, Debug, PartialEq)]
pub struct ReactionDirection {
    /// Id of the directional variable, e.g. `PGI_forward`
    pub id: String,
    /// Id of the model reaction
    pub reaction: String,
    pub direction: Direction,
    /// Non-negative bounds of the directional flux
    pub bounds: (f64, f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reaction(lower_bound: f64, upper_bound: f64) -> Reaction {
        ReactionBuilder::default()
            .id("R".to_string())
            .lower_bound(lower_bound)
            .upper_bound(upper_bound)
            .build()
            .unwrap()
    }

    #[test]
    fn irreversible_reaction_has_one_direction() {
        let directions = reaction(0., 10.).directions();
        assert_eq!(directions.len(), 1);
        assert_eq!(directions[0].id, "R_forward");
        assert_eq!(directions[0].bounds, (0., 10.));
    }

    #[test]
    fn reversible_reaction_is_split() {
        let directions = reaction(-5., 10.).directions();
        assert_eq!(directions.len(), 2);
        assert_eq!(directions[0].bounds, (0., 10.));
        assert_eq!(directions[1].id, "R_reverse");
        assert_eq!(directions[1].direction, Direction::Reverse);
        assert_eq!(directions[1].bounds, (0., 5.));
    }

    #[test]
    fn backwards_only_reaction() {
        let directions = reaction(-5., -1.).directions();
        assert_eq!(directions[0].bounds, (0., 0.));
        assert_eq!(directions[1].bounds, (1., 5.));
    }

    #[test]
    fn builder_defaults_come_from_configuration() {
        let r = ReactionBuilder::default().id("R".to_string()).build().unwrap();
        assert_eq!(r.lower_bound, -1000.);
        assert_eq!(r.upper_bound, 1000.);
        assert!(r.gpr.is_none());
    }
}
