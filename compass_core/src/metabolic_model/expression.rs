//! Per-sample gene expression, and the reaction weights derived from it
use indexmap::IndexMap;
use thiserror::Error;

use crate::configuration::Configuration;
use crate::metabolic_model::model::Model;

/// Expression values for one sample (cell), keyed by gene id
#[derive(Clone, Debug, PartialEq)]
pub struct SampleExpression {
    /// Identifies the sample, used for caching and as the output column
    pub id: String,
    values: IndexMap<String, f64>,
}

impl SampleExpression {
    /// Create a new sample, expression values must be finite and non-negative
    pub fn new(id: impl Into<String>, values: IndexMap<String, f64>) -> Result<Self, ExpressionError> {
        let id = id.into();
        if let Some((gene, value)) = values.iter().find(|(_, v)| !(v.is_finite() && **v >= 0.)) {
            return Err(ExpressionError::InvalidValue {
                sample: id,
                gene: gene.clone(),
                value: *value,
            });
        }
        Ok(SampleExpression { id, values })
    }

    /// Expression value of a gene, if it was measured
    pub fn get(&self, gene: &str) -> Option<f64> {
        self.values.get(gene).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Expression derived weight for every reaction in the model, for one sample
#[derive(Clone, Debug, PartialEq)]
pub struct ReactionWeights {
    weights: IndexMap<String, f64>,
}

impl ReactionWeights {
    /// Evaluate every reaction's GPR against the sample
    ///
    /// Reactions without a GPR, or whose genes were all unmeasured, get
    /// [`Configuration::default_weight`].
    pub fn from_expression(model: &Model, expression: &SampleExpression, config: &Configuration) -> Self {
        let weights = model
            .reactions
            .values()
            .map(|reaction| {
                let weight = reaction
                    .gpr
                    .as_ref()
                    .and_then(|gpr| gpr.eval_weight(expression, config.missing_gene_value))
                    .unwrap_or(config.default_weight);
                (reaction.id.clone(), weight)
            })
            .collect();
        ReactionWeights { weights }
    }

    /// Weight of a model reaction
    pub fn weight(&self, reaction_id: &str) -> Option<f64> {
        self.weights.get(reaction_id).copied()
    }

    /// Cost of carrying one unit of flux through a reaction, `1 / (1 + weight)`
    ///
    /// Highly expressed reactions are cheap, unexpressed ones cost 1.
    pub fn cost(&self, reaction_id: &str) -> Option<f64> {
        self.weight(reaction_id).map(|w| 1. / (1. + w))
    }
}

/// Errors in sample expression data
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("sample {sample} has invalid expression value {value} for gene {gene}")]
    InvalidValue { sample: String, gene: String, value: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::ConfigurationBuilder;
    use crate::metabolic_model::reaction::ReactionBuilder;

    fn model() -> Model {
        let mut model = Model::new_empty();
        model
            .add_reaction(ReactionBuilder::default().id("with_gpr".to_string()).build().unwrap())
            .unwrap();
        model
            .add_reaction(ReactionBuilder::default().id("no_gpr".to_string()).build().unwrap())
            .unwrap();
        model
            .set_gene_reaction_rule("with_gpr", "g1 and (g2 or g3)")
            .unwrap();
        model
    }

    #[test]
    fn negative_or_nan_expression_is_rejected() {
        let res = SampleExpression::new("c1", IndexMap::from([("g1".to_string(), -1.)]));
        assert!(matches!(res, Err(ExpressionError::InvalidValue { .. })));
        let res = SampleExpression::new("c1", IndexMap::from([("g1".to_string(), f64::NAN)]));
        assert!(res.is_err());
    }

    #[test]
    fn weights_follow_gpr_logic() {
        let model = model();
        let config = ConfigurationBuilder::default().default_weight(2.5).build().unwrap();
        let sample = SampleExpression::new(
            "c1",
            IndexMap::from([
                ("g1".to_string(), 4.),
                ("g2".to_string(), 1.),
                ("g3".to_string(), 3.),
                ("not_in_model".to_string(), 100.),
            ]),
        )
        .unwrap();
        let weights = ReactionWeights::from_expression(&model, &sample, &config);
        assert_eq!(weights.weight("with_gpr"), Some(3.));
        assert_eq!(weights.weight("no_gpr"), Some(2.5));
        assert_eq!(weights.cost("with_gpr"), Some(0.25));
    }

    #[test]
    fn reaction_without_genes_gets_default_whatever_the_expression() {
        let model = model();
        let config = ConfigurationBuilder::default().default_weight(1.).build().unwrap();
        for values in [
            IndexMap::new(),
            IndexMap::from([("g1".to_string(), 10.)]),
            IndexMap::from([("g1".to_string(), 0.), ("no_gpr".to_string(), 50.)]),
        ] {
            let sample = SampleExpression::new("c", values).unwrap();
            let weights = ReactionWeights::from_expression(&model, &sample, &config);
            assert_eq!(weights.weight("no_gpr"), Some(1.));
        }
    }

    #[test]
    fn unmeasured_rule_falls_back_to_default() {
        let model = model();
        let config = ConfigurationBuilder::default().default_weight(0.7).build().unwrap();
        let sample = SampleExpression::new("c", IndexMap::new()).unwrap();
        let weights = ReactionWeights::from_expression(&model, &sample, &config);
        assert_eq!(weights.weight("with_gpr"), Some(0.7));

        let config = ConfigurationBuilder::default()
            .missing_gene_value(Some(0.))
            .build()
            .unwrap();
        let weights = ReactionWeights::from_expression(&model, &sample, &config);
        assert_eq!(weights.weight("with_gpr"), Some(0.));
    }
}
