//! This module provides the Gene struct, representing a gene, and the Gpr enum, representing a
//! gene protein reaction rule
use std::fmt::{Display, Formatter};
use std::hash::Hash;

use derive_builder::Builder;

use crate::metabolic_model::expression::SampleExpression;

/// Structure Representing a Gene
#[derive(Builder, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Gene {
    /// Used to identify the gene
    pub id: String,
    /// Human Readable Gene Name
    #[builder(default = "None")]
    pub name: Option<String>,
}

impl Gene {
    pub fn new(id: String, name: Option<String>) -> Gene {
        Gene { id, name }
    }
}

impl Display for Gene {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Representation of a Gene Protein Reaction Rule as an AST
///
/// Chains of the same operator are kept in a single node, so
/// `a and b and c` is one [`Gpr::And`] with three children.
#[derive(Clone, Debug, PartialEq)]
pub enum Gpr {
    /// A terminal gene node, holding the gene id
    Gene(String),
    /// All children are required (e.g. subunits of a complex)
    And(Vec<Gpr>),
    /// Any child suffices (e.g. isozymes)
    Or(Vec<Gpr>),
}

/// Types of Allowed GPR Operations
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GprOperatorType {
    /// Or, limited by the best supplied child
    Or,
    /// And, limited by the scarcest child
    And,
}

impl Gpr {
    /// Create a new binary operation node, merging children which already use the same operator
    pub fn new_binary_operation(left: Gpr, operator: GprOperatorType, right: Gpr) -> Gpr {
        let mut children = Vec::new();
        for side in [left, right] {
            match (operator, side) {
                (GprOperatorType::And, Gpr::And(inner)) => children.extend(inner),
                (GprOperatorType::Or, Gpr::Or(inner)) => children.extend(inner),
                (_, other) => children.push(other),
            }
        }
        match operator {
            GprOperatorType::And => Gpr::And(children),
            GprOperatorType::Or => Gpr::Or(children),
        }
    }

    /// Create a new gene node
    pub fn new_gene_node(gene: &str) -> Gpr {
        Gpr::Gene(gene.to_string())
    }

    /// Ids of all genes appearing in the rule, in order of appearance
    pub fn genes(&self) -> Vec<&str> {
        let mut genes = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            match node {
                Gpr::Gene(id) => genes.push(id.as_str()),
                Gpr::And(children) | Gpr::Or(children) => stack.extend(children.iter().rev()),
            }
        }
        genes
    }

    /// Evaluate the rule against a sample's expression values
    ///
    /// `And` nodes take the minimum of their children and `Or` nodes the maximum.
    /// A gene without a measurement takes `missing_value`, or is skipped when that is
    /// `None`. Returns `None` if no gene under this node could be valued.
    pub fn eval_weight(&self, expression: &SampleExpression, missing_value: Option<f64>) -> Option<f64> {
        match self {
            Gpr::Gene(id) => expression.get(id).or(missing_value),
            Gpr::And(children) => children
                .iter()
                .filter_map(|child| child.eval_weight(expression, missing_value))
                .reduce(f64::min),
            Gpr::Or(children) => children
                .iter()
                .filter_map(|child| child.eval_weight(expression, missing_value))
                .reduce(f64::max),
        }
    }

    /// Generate a GPR string with gene ids from the GPR AST
    pub fn to_string_id(&self) -> String {
        match self {
            Gpr::Gene(id) => id.clone(),
            Gpr::And(children) => Self::join(children, " and "),
            Gpr::Or(children) => Self::join(children, " or "),
        }
    }

    fn join(children: &[Gpr], separator: &str) -> String {
        let inner = children
            .iter()
            .map(Gpr::to_string_id)
            .collect::<Vec<_>>()
            .join(separator);
        format!("({})", inner)
    }
}

impl Display for Gpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_string_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::gpr_parse::parse_gpr;
    use indexmap::IndexMap;
    use proptest::prelude::*;

    fn expression(values: &[(&str, f64)]) -> SampleExpression {
        SampleExpression::new(
            "cell",
            values.iter().map(|(g, v)| (g.to_string(), *v)).collect(),
        )
        .unwrap()
    }

    fn gene(id: &str) -> Gpr {
        Gpr::new_gene_node(id)
    }

    #[test]
    fn test_gene_node() {
        let expr = expression(&[("a", 3.)]);
        assert_eq!(gene("a").eval_weight(&expr, None), Some(3.));
        assert_eq!(gene("b").eval_weight(&expr, None), None);
        assert_eq!(gene("b").eval_weight(&expr, Some(0.5)), Some(0.5));
    }

    #[test]
    fn test_and_node() {
        let expr = expression(&[("a", 3.), ("b", 1.), ("c", 7.)]);
        let rule = Gpr::And(vec![gene("a"), gene("b"), gene("c")]);
        assert_eq!(rule.eval_weight(&expr, None), Some(1.));
    }

    #[test]
    fn test_or_node() {
        let expr = expression(&[("a", 3.), ("b", 1.), ("c", 7.)]);
        let rule = Gpr::Or(vec![gene("a"), gene("b"), gene("c")]);
        assert_eq!(rule.eval_weight(&expr, None), Some(7.));
    }

    #[test]
    fn test_nested_nodes() {
        let expr = expression(&[("a", 3.), ("b", 1.), ("c", 7.), ("d", 2.)]);
        // max(min(3, 1), min(7, 2))
        let rule = Gpr::Or(vec![
            Gpr::And(vec![gene("a"), gene("b")]),
            Gpr::And(vec![gene("c"), gene("d")]),
        ]);
        assert_eq!(rule.eval_weight(&expr, None), Some(2.));
    }

    #[test]
    fn missing_genes_are_skipped_or_substituted() {
        let expr = expression(&[("a", 3.)]);
        let rule = Gpr::And(vec![gene("a"), gene("missing")]);
        assert_eq!(rule.eval_weight(&expr, None), Some(3.));
        assert_eq!(rule.eval_weight(&expr, Some(0.)), Some(0.));

        let unmeasured = Gpr::Or(vec![gene("x"), gene("y")]);
        assert_eq!(unmeasured.eval_weight(&expr, None), None);
    }

    #[test]
    fn test_genes() {
        let rule = Gpr::Or(vec![
            Gpr::And(vec![gene("a"), gene("b")]),
            gene("c"),
        ]);
        assert_eq!(rule.genes(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", gene("ActiveGene1")), "ActiveGene1");
        let gpr_or = Gpr::Or(vec![gene("Active1"), gene("Active2")]);
        assert_eq!(format!("{}", gpr_or), "(Active1 or Active2)");

        // Display is explicit with parentheses, so one pair wraps the whole expression
        let mut gene_map = IndexMap::new();
        let gpr = parse_gpr("Rv0001 and Rv0002 or Rv0003", &mut gene_map).unwrap();
        assert_eq!(format!("{}", gpr), "((Rv0001 and Rv0002) or Rv0003)");
        let gpr = parse_gpr("Rv0001 and Rv0002 and Rv0003", &mut gene_map).unwrap();
        assert_eq!(format!("{}", gpr), "(Rv0001 and Rv0002 and Rv0003)");
    }

    proptest! {
        #[test]
        fn operators_ignore_child_order(
            values in prop::collection::vec(0.0_f64..1000.0_f64, 2..6),
            swap in 0usize..5,
        ) {
            let ids: Vec<String> = (0..values.len()).map(|i| format!("g{i}")).collect();
            let expr = SampleExpression::new(
                "cell",
                ids.iter().cloned().zip(values.iter().copied()).collect(),
            ).unwrap();
            let leaves: Vec<Gpr> = ids.iter().map(|id| gene(id)).collect();
            let mut swapped = leaves.clone();
            let j = swap % swapped.len();
            swapped.swap(0, j);

            for (original, reordered) in [
                (Gpr::And(leaves.clone()), Gpr::And(swapped.clone())),
                (Gpr::Or(leaves.clone()), Gpr::Or(swapped.clone())),
            ] {
                prop_assert_eq!(
                    original.eval_weight(&expr, None),
                    reordered.eval_weight(&expr, None)
                );
            }
        }
    }
}
