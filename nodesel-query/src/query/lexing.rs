//! Lexer
//!
//!     Turns query text into a flat [Token] list. Keywords (`AND`, `OR`, `NOT`), grouping marks
//!     and whitespace are plain logos tokens. Conditions are not: a condition is written
//!     `[field<op>=value]` and nothing delimits `value`, which may itself contain `]` (or text
//!     that looks like a whole condition).
//!
//! Condition Termination
//!
//!     When logos sees `[` it hands over to [lex_condition], which asks the
//!     [ConditionTerminator] stored in the lexer extras for the end of the condition. A `]` ends
//!     the condition only if what follows it, after any whitespace and `)`, is one of:
//!         - the end of the query,
//!         - `AND`, `OR` or whitespace, then any run of whitespace, `(` and `NOT` (a `NOT` must
//!           follow whitespace or `(`), then the start of a condition on a known field, that is
//!           `[` + field + optional operator + `=`.
//!
//!     The first `]` satisfying this wins. Which text ends a condition therefore depends on the
//!     known field set: with fields `a, b` the query `[a=x] [b=y]` holds two conditions, with only
//!     `a` known it is a single condition whose value is `x] [b=y`.
//!
//!     The rule is a heuristic. A value that happens to contain `] [known=` is split at that
//!     point; there is no escape syntax for it.
//!
//!     The whole rule is compiled into one regex per known field set. The regex crate has no
//!     look-around, so the "NOT must follow whitespace or `(`" constraint is spelled out by
//!     making each repeated `NOT` carry its own trailing whitespace or `(`.

use crate::query::attributes::KnownFields;
use crate::query::error::{QueryError, QueryResult};
use crate::query::token::Token;
use logos::{Lexer, Logos};
use regex::Regex;

/// Compiled end-of-condition lookahead for one known field set
#[derive(Debug, Clone)]
pub struct ConditionTerminator {
    pattern: Regex,
}

impl ConditionTerminator {
    pub fn new(fields: &KnownFields) -> QueryResult<Self> {
        let names = fields
            .iter()
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join("|");
        let start = format!(r"\[(?:{names})[!=~$^*/]?=");
        let source = format!(
            r"\][\s)]*(?:$|(?:OR|AND){start}|(?:(?:OR|AND)[\s(]|\s)(?:[\s(]|NOT[\s(])*(?:NOT)?{start})"
        );
        let pattern = Regex::new(&source).map_err(|e| QueryError::InvalidPattern {
            pattern: source.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self { pattern })
    }

    /// Byte offset of the `]` that ends the condition starting just before `text`
    pub fn find_end(&self, text: &str) -> Option<usize> {
        self.pattern.find(text).map(|m| m.start())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
enum LexFault {
    #[default]
    Unrecognized,
    Unterminated,
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(extras = ConditionTerminator)]
#[logos(error = LexFault)]
#[logos(skip r"\s+")]
enum RawToken {
    #[token("[", lex_condition)]
    Condition(String),
    #[token("AND")]
    And,
    #[token("OR")]
    Or,
    #[token("NOT")]
    Not,
    #[token("(")]
    GroupOpen,
    #[token(")")]
    GroupClose,
}

/// Extends the `[` just matched up to and including the terminating `]`
fn lex_condition(lex: &mut Lexer<RawToken>) -> Result<String, LexFault> {
    let end = lex
        .extras
        .find_end(lex.remainder())
        .ok_or(LexFault::Unterminated)?;
    lex.bump(end + 1);
    Ok(lex.slice().to_string())
}

impl From<RawToken> for Token {
    fn from(raw: RawToken) -> Self {
        match raw {
            RawToken::Condition(text) => Token::Condition(text),
            RawToken::And => Token::And,
            RawToken::Or => Token::Or,
            RawToken::Not => Token::Not,
            RawToken::GroupOpen => Token::GroupOpen,
            RawToken::GroupClose => Token::GroupClose,
        }
    }
}

/// A lexer bound to one known field set
#[derive(Debug, Clone)]
pub struct Tokenizer {
    terminator: ConditionTerminator,
}

impl Tokenizer {
    pub fn new(fields: &KnownFields) -> QueryResult<Self> {
        Ok(Self {
            terminator: ConditionTerminator::new(fields)?,
        })
    }

    pub fn tokenize(&self, text: &str) -> QueryResult<Vec<Token>> {
        let mut lexer = RawToken::lexer_with_extras(text, self.terminator.clone());
        let mut tokens = Vec::new();
        while let Some(result) = lexer.next() {
            match result {
                Ok(raw) => tokens.push(raw.into()),
                Err(fault) => {
                    let near = text[lexer.span().start..].trim_end().to_string();
                    return Err(match fault {
                        LexFault::Unterminated => QueryError::UnterminatedCondition { near },
                        LexFault::Unrecognized => QueryError::UnrecognizedToken { near },
                    });
                }
            }
        }
        Ok(tokens)
    }
}

/// Tokenize `text`, using `fields` to decide where conditions end
pub fn tokenize(text: &str, fields: &KnownFields) -> QueryResult<Vec<Token>> {
    Tokenizer::new(fields)?.tokenize(text)
}
