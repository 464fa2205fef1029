use crate::io::gpr_parse::token::Token;
use crate::metabolic_model::gene::{Gene, Gpr, GprOperatorType};

use indexmap::IndexMap;
use thiserror::Error;
/*
GPR Grammar:
expression -> disjunction ;
disjunction -> conjunction ( "OR" conjunction )* ;
conjunction -> primary ( "AND" primary )* ;
primary -> GENE | "(" expression ")" ;

e.g. ( Gene1 AND Gene2) OR Gene3

`and` binds tighter than `or`, so "a or b and c" is "a or (b and c)".
 */

/// GPR Parser
pub struct GPRParser<'gm> {
    /// Vector of tokens from the GPR string
    tokens: Vec<Token>,
    /// Current token being processed
    current: usize,
    /// Map containing the Genes
    pub(crate) gene_map: &'gm mut IndexMap<String, Gene>,
}

impl<'gm> GPRParser<'gm> {
    /// Create a new GPRParser
    pub fn new(tokens: Vec<Token>, gene_map: &'gm mut IndexMap<String, Gene>) -> GPRParser<'gm> {
        GPRParser {
            tokens,
            current: 0,
            gene_map,
        }
    }

    // region Parsing Functions

    /// Parse the token vector into a GPR AST
    pub fn parse(&mut self) -> Result<Gpr, ParseError> {
        let gpr = self.disjunction()?;
        if !self.is_at_end() {
            // If entire expression has not been parsed, an error has occurred
            return Err(ParseError::UnexpectedToken(self.peek().clone()));
        }
        Ok(gpr)
    }

    fn disjunction(&mut self) -> Result<Gpr, ParseError> {
        let mut expr = self.conjunction()?;
        while self.match_token(Token::Or) {
            let right = self.conjunction()?;
            expr = Gpr::new_binary_operation(expr, GprOperatorType::Or, right);
        }
        Ok(expr)
    }

    fn conjunction(&mut self) -> Result<Gpr, ParseError> {
        let mut expr = self.primary()?;
        while self.match_token(Token::And) {
            let right = self.primary()?;
            expr = Gpr::new_binary_operation(expr, GprOperatorType::And, right);
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Gpr, ParseError> {
        if let Some(identifier) = self.match_identifier() {
            self.insert_if_needed(&identifier);
            return Ok(Gpr::new_gene_node(&identifier));
        }

        if self.match_token(Token::LeftParen) {
            let expr = self.disjunction()?;
            self.consume(Token::RightParen)?;
            return Ok(expr);
        }

        if self.check(&Token::Not) {
            return Err(ParseError::UnsupportedOperator(String::from("not")));
        }

        Err(ParseError::ExpectedExpression(self.peek().clone()))
    }

    // endregion Parsing Functions

    // region parsing helper functions

    /// Check whether the token at the current position matches `token`,
    /// if it does advance [`self.current`] and return true, otherwise return false
    fn match_token(&mut self, token: Token) -> bool {
        if self.check(&token) {
            self.advance();
            return true;
        }
        false
    }

    /// Similar to [`match_token`], but for matching an identifier token. If the current
    /// token is an identifier return `Some(GeneId)`, where GeneId is the gene's string identifier,
    /// otherwise return None
    fn match_identifier(&mut self) -> Option<String> {
        if let Token::Identifier(id) = self.peek() {
            let id = id.clone();
            self.advance();
            return Some(id);
        }
        None
    }

    /// Check whether the current token matches the provided `token`
    fn check(&self, token: &Token) -> bool {
        if self.is_at_end() {
            return false;
        }
        self.peek() == token
    }

    /// Advance `self.current` one position unless at end of GPR Vec
    fn advance(&mut self) {
        if !self.is_at_end() {
            self.current += 1;
        }
    }

    /// Check whether the parser is at the end of the source Vec
    fn is_at_end(&self) -> bool {
        *self.peek() == Token::Eof
    }

    /// Get the current token
    fn peek(&self) -> &Token {
        // The lexer always terminates with Eof, and advance never moves past it
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    /// Advance past `token`, or fail with what was found instead. Used for closing
    /// parentheses.
    fn consume(&mut self, token: Token) -> Result<(), ParseError> {
        if self.check(&token) {
            self.advance();
            return Ok(());
        }
        Err(ParseError::MissingToken {
            expected: token,
            found: self.peek().clone(),
        })
    }

    // endregion parsing helper functions

    // region Gene Map Functions

    /// Check if a gene_id exists as a key in gene_map, if it doesn't insert a new gene with that id
    fn insert_if_needed(&mut self, gene_id: &str) {
        if !self.gene_map.contains_key(gene_id) {
            self.gene_map
                .insert(gene_id.to_string(), Gene::new(gene_id.to_string(), None));
        }
    }

    // endregion Gene Map Functions
}

/// Enum representing possible parse errors
#[derive(Debug, Error, PartialEq, Clone)]
pub enum ParseError {
    /// An operator other than `and`/`or` was found
    #[error("Unsupported operator `{0}`, expected only `and` and `or`")]
    UnsupportedOperator(String),
    /// Missing expected token (e.g. a right parenthesis)
    #[error("Expected {expected}, found {found}")]
    MissingToken { expected: Token, found: Token },
    /// No expression found when one was expected
    #[error("Expected a gene or `(`, found {0}; check that the rule is not empty and has no dangling operators")]
    ExpectedExpression(Token),
    /// Tokens left over after a complete expression
    #[error("Unexpected {0} after a complete expression, check for unbalanced parentheses or two adjacent genes")]
    UnexpectedToken(Token),
}
