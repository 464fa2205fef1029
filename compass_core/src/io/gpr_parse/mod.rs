//! Module for parsing Gene Protein Reaction strings into AST values

use crate::io::gpr_parse::lexer::LexerError;
use crate::io::gpr_parse::parser::ParseError;
use crate::metabolic_model::gene::{Gene, Gpr};
use indexmap::IndexMap;
use thiserror::Error;

mod lexer;
pub mod parser;
mod token;

pub use lexer::LexerError as GprLexerError;

/// Parse a Gene Protein Reaction string into a GPR Tree
///
/// # Parameters
/// - `input`: &str representing the gene protein reaction rule
/// - `gene_map`: map of gene id strings to genes, genes found in the rule
///     which are not yet in the map are added
///
/// # Returns
/// Parse result which is
/// - `Ok`: The root node of the GPR tree
/// - `Err`: Returns the GprParseError describing the issue with the GPR rule which
///     was being parsed.
///
/// # Examples
/// ```rust
/// use indexmap::IndexMap;
/// use compass_core::io::gpr_parse::parse_gpr;
/// let gpr: &str = "Rv0001 and Rv0002";
/// let mut gene_map = IndexMap::new();
/// let gpr_tree = parse_gpr(gpr, &mut gene_map).unwrap();
/// assert_eq!(gene_map.len(), 2);
/// ```
pub fn parse_gpr(input: &str, gene_map: &mut IndexMap<String, Gene>) -> Result<Gpr, GprParseError> {
    // Convert the GPR string into tokens
    let tokens = lexer::Lexer::new(input).lex()?;
    // Parse the tokens into a tree, genes are only recorded once the whole rule parses
    let mut new_genes = IndexMap::new();
    let gpr = parser::GPRParser::new(tokens, &mut new_genes).parse()?;
    for (id, gene) in new_genes {
        gene_map.entry(id).or_insert(gene);
    }
    Ok(gpr)
}

/// Enum representing possible lex and parse errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GprParseError {
    /// Lexing Error
    #[error("Error occurred during lexing (conversion of GPR string to tokens): {0}")]
    LexingError(#[from] LexerError),
    /// Parsing Error
    #[error("Error occurred during parsing (conversion of tokens to GPR tree): {0}")]
    ParsingError(#[from] ParseError),
}
