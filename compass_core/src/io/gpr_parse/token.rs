//! Tokens of a gene reaction rule
use std::fmt::{Display, Formatter};

/// A lexed piece of a GPR rule, the lexer always ends the stream with [`Token::Eof`]
#[derive(Debug, PartialEq, Clone, Eq, Hash)]
pub enum Token {
    /// A gene id
    Identifier(String),
    And,
    Or,
    /// Lexed so it can be rejected with a clear error, negation has no weight semantics
    Not,
    LeftParen,
    RightParen,
    Eof,
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Identifier(gene) => write!(f, "gene `{gene}`"),
            Token::And => write!(f, "`and`"),
            Token::Or => write!(f, "`or`"),
            Token::Not => write!(f, "`not`"),
            Token::LeftParen => write!(f, "`(`"),
            Token::RightParen => write!(f, "`)`"),
            Token::Eof => write!(f, "end of rule"),
        }
    }
}
