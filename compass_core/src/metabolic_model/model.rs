//! This module provides the Model struct for representing an entire metabolic model
use indexmap::IndexMap;
use thiserror::Error;

use crate::io::gpr_parse::{parse_gpr, GprParseError};
use crate::metabolic_model::gene::Gene;
use crate::metabolic_model::metabolite::Metabolite;
use crate::metabolic_model::reaction::Reaction;

/// Represents a Genome Scale Metabolic Model
///
/// Models are assembled once by a loader, then treated as read only.
#[derive(Clone, Debug, Default)]
pub struct Model {
    /// Map of reaction ids to Reactions
    pub reactions: IndexMap<String, Reaction>,
    /// Map of gene ids to Genes
    pub genes: IndexMap<String, Gene>,
    /// Map of metabolite ids to Metabolites
    pub metabolites: IndexMap<String, Metabolite>,
    /// Id associated with the Model
    pub id: Option<String>,
    /// A version identifier for the Model, stored as a string
    pub version: Option<String>,
}

impl Model {
    pub fn new_empty() -> Self {
        Model::default()
    }

    /// Create an empty model with an id and version, both of which feed the cache fingerprint
    pub fn new(id: &str, version: Option<&str>) -> Self {
        Model {
            id: Some(id.to_string()),
            version: version.map(str::to_string),
            ..Model::default()
        }
    }

    /// Add a reaction to the model
    ///
    /// # Parameters
    /// - reaction: Reaction to add
    ///
    /// # Examples
    /// ```rust
    /// use compass_core::metabolic_model::model::Model;
    /// use compass_core::metabolic_model::reaction::ReactionBuilder;
    /// let mut model = Model::new_empty();
    /// let new_reaction = ReactionBuilder::default().id("new_reaction".to_string()).build().unwrap();
    /// model.add_reaction(new_reaction).unwrap();
    /// ```
    pub fn add_reaction(&mut self, reaction: Reaction) -> Result<(), ModelError> {
        if self.reactions.contains_key(&reaction.id) {
            return Err(ModelError::DuplicateReaction(reaction.id));
        }
        if let Some(gpr) = &reaction.gpr {
            for gene in gpr.genes() {
                if !self.genes.contains_key(gene) {
                    self.add_gene(Gene::new(gene.to_string(), None));
                }
            }
        }
        let id = reaction.id.clone();
        self.reactions.insert(id, reaction);
        Ok(())
    }

    /// Add a metabolite to the model
    pub fn add_metabolite(&mut self, metabolite: Metabolite) -> Result<(), ModelError> {
        if self.metabolites.contains_key(&metabolite.id) {
            return Err(ModelError::DuplicateMetabolite(metabolite.id));
        }
        let id = metabolite.id.clone();
        self.metabolites.insert(id, metabolite);
        Ok(())
    }

    /// Add a gene to the model
    ///
    /// # Examples
    /// ```rust
    /// use compass_core::metabolic_model::gene::GeneBuilder;
    /// use compass_core::metabolic_model::model::Model;
    /// let mut model=Model::new_empty();
    /// let new_gene = GeneBuilder::default().id("new_gene".to_string()).build().unwrap();
    /// model.add_gene(new_gene);
    /// ```
    pub fn add_gene(&mut self, gene: Gene) {
        let id = gene.id.clone();
        self.genes.insert(id, gene);
    }

    /// Parse a gene reaction rule string and attach it to a reaction
    ///
    /// An empty (or all whitespace) rule removes the reaction's GPR. Malformed rules
    /// are rejected here, at model load time, rather than when a sample is evaluated.
    pub fn set_gene_reaction_rule(&mut self, reaction_id: &str, rule: &str) -> Result<(), ModelError> {
        let reaction = self
            .reactions
            .get_mut(reaction_id)
            .ok_or_else(|| ModelError::UnknownReaction(reaction_id.to_string()))?;
        reaction.gpr = if rule.trim().is_empty() {
            None
        } else {
            Some(
                parse_gpr(rule, &mut self.genes).map_err(|source| ModelError::InvalidGpr {
                    reaction: reaction_id.to_string(),
                    source,
                })?,
            )
        };
        Ok(())
    }

    /// Check the model invariants: every stoichiometric coefficient references a known,
    /// metabolite, coefficients are finite, and bounds are ordered
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.reactions.is_empty() {
            return Err(ModelError::EmptyModel);
        }
        for reaction in self.reactions.values() {
            if reaction.lower_bound.is_nan()
                || reaction.upper_bound.is_nan()
                || reaction.lower_bound > reaction.upper_bound
            {
                return Err(ModelError::InvalidBounds {
                    reaction: reaction.id.clone(),
                    lower_bound: reaction.lower_bound,
                    upper_bound: reaction.upper_bound,
                });
            }
            for (metabolite, coefficient) in &reaction.metabolites {
                if !self.metabolites.contains_key(metabolite) {
                    return Err(ModelError::UnknownMetabolite {
                        reaction: reaction.id.clone(),
                        metabolite: metabolite.clone(),
                    });
                }
                if !coefficient.is_finite() {
                    return Err(ModelError::InvalidCoefficient {
                        reaction: reaction.id.clone(),
                        metabolite: metabolite.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Errors for models which can't be used
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("model has no reactions")]
    EmptyModel,
    #[error("reaction {0} is already in the model")]
    DuplicateReaction(String),
    #[error("metabolite {0} is already in the model")]
    DuplicateMetabolite(String),
    #[error("reaction {0} is not in the model")]
    UnknownReaction(String),
    #[error("reaction {reaction} references metabolite {metabolite}, which is not in the model")]
    UnknownMetabolite { reaction: String, metabolite: String },
    #[error("reaction {reaction} has a non finite coefficient for {metabolite}")]
    InvalidCoefficient { reaction: String, metabolite: String },
    #[error("reaction {reaction} has lower bound {lower_bound} above upper bound {upper_bound}")]
    InvalidBounds {
        reaction: String,
        lower_bound: f64,
        upper_bound: f64,
    },
    #[error("reaction {reaction} has an invalid GPR: {source}")]
    InvalidGpr {
        reaction: String,
        source: GprParseError,
    },
}
