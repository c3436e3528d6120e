//! Token types and the token stream consumed by the parser.
//!
//!     The query grammar has very few token kinds. Conditions are kept as their raw source text
//!     (`[field<op>=value]`, brackets included) and are only split into field, operator and value
//!     when the parser reaches them, see [condition](crate::query::condition).
//!
//!     The stream is read left to right by index, without backtracking. Reading past the last
//!     token keeps yielding [Token::EndOfInput].

use serde::Serialize;
use std::fmt;

/// One lexical unit of a query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Token {
    /// A bracketed condition, raw text including the brackets
    Condition(String),
    And,
    Or,
    Not,
    GroupOpen,
    GroupClose,
    /// Produced by [TokenStream] once every token has been consumed
    EndOfInput,
}

static END_OF_INPUT: Token = Token::EndOfInput;

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Condition(text) => write!(f, "{}", text),
            Token::And => write!(f, "AND"),
            Token::Or => write!(f, "OR"),
            Token::Not => write!(f, "NOT"),
            Token::GroupOpen => write!(f, "("),
            Token::GroupClose => write!(f, ")"),
            Token::EndOfInput => write!(f, "end of query"),
        }
    }
}

/// Cursor over a tokenized query
#[derive(Debug, Clone)]
pub struct TokenStream {
    tokens: Vec<Token>,
    index: usize,
}

impl TokenStream {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, index: 0 }
    }

    /// The current token, without consuming it
    pub fn peek(&self) -> &Token {
        self.tokens.get(self.index).unwrap_or(&END_OF_INPUT)
    }

    /// Consume and return the current token
    pub fn next_token(&mut self) -> Token {
        match self.tokens.get(self.index) {
            Some(token) => {
                self.index += 1;
                token.clone()
            }
            None => Token::EndOfInput,
        }
    }

    /// Consume the current token only if it equals `expected`
    pub fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == expected {
            if self.index < self.tokens.len() {
                self.index += 1;
            }
            true
        } else {
            false
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.index >= self.tokens.len()
    }
}

impl From<Vec<Token>> for TokenStream {
    fn from(tokens: Vec<Token>) -> Self {
        Self::new(tokens)
    }
}
