//! Parser
//!
//!     Recursive descent over a [TokenStream], producing [Selector] trees. Precedence, low to
//!     high:
//!
//!         or   := and ( "OR" or )?
//!         and  := leaf ( "AND" and )?
//!         leaf := "NOT" leaf | "(" or ")" | condition
//!
//!     Both binary rules recurse on the right, so chains nest to the right. AND and OR are
//!     associative, the shape does not change results. `NOT` takes a single leaf: `NOT A AND B`
//!     is `(NOT A) AND B`.
//!
//!     Nesting is capped at [MAX_NESTING] levels so hostile input is rejected with
//!     [QueryError::NestingTooDeep] instead of exhausting the stack.
//!
//!     The parser stops after one `or` expression. It does not require the stream to be empty
//!     afterwards; the selector set compiler calls it repeatedly, see
//!     [selectors](crate::query::selectors).

use crate::query::attributes::{AttributeSource, KnownFields};
use crate::query::condition::Condition;
use crate::query::error::{QueryError, QueryResult};
use crate::query::token::{Token, TokenStream};
use std::fmt;

/// A compiled boolean test over one candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Condition(Condition),
    And(Box<Selector>, Box<Selector>),
    Or(Box<Selector>, Box<Selector>),
    Not(Box<Selector>),
}

impl Selector {
    /// Evaluate against one candidate. Never fails and never mutates anything.
    pub fn matches<A: AttributeSource + ?Sized>(&self, candidate: &A) -> bool {
        match self {
            Selector::Condition(condition) => condition.matches(candidate),
            Selector::And(left, right) => left.matches(candidate) && right.matches(candidate),
            Selector::Or(left, right) => left.matches(candidate) || right.matches(candidate),
            Selector::Not(inner) => !inner.matches(candidate),
        }
    }

    /// Every condition in the tree, left to right
    pub fn conditions(&self) -> Vec<&Condition> {
        let mut found = Vec::new();
        self.collect_conditions(&mut found);
        found
    }

    fn collect_conditions<'a>(&'a self, found: &mut Vec<&'a Condition>) {
        match self {
            Selector::Condition(condition) => found.push(condition),
            Selector::And(left, right) | Selector::Or(left, right) => {
                left.collect_conditions(found);
                right.collect_conditions(found);
            }
            Selector::Not(inner) => inner.collect_conditions(found),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Condition(condition) => write!(f, "{}", condition),
            Selector::And(left, right) => write!(f, "({} AND {})", left, right),
            Selector::Or(left, right) => write!(f, "({} OR {})", left, right),
            Selector::Not(inner) => write!(f, "NOT {}", inner),
        }
    }
}

/// Deepest nesting a selector tree may reach. Every `NOT`, every group and every `AND`/`OR`
/// link adds one level.
pub const MAX_NESTING: usize = 128;

/// Recursive descent parser over one token stream
pub struct Parser<'a> {
    stream: TokenStream,
    fields: &'a KnownFields,
    depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(stream: TokenStream, fields: &'a KnownFields) -> Self {
        Self {
            stream,
            fields,
            depth: 0,
        }
    }

    /// Consume the end of input if reached
    pub fn at_end(&mut self) -> bool {
        self.stream.eat(&Token::EndOfInput)
    }

    pub fn parse_or(&mut self) -> QueryResult<Selector> {
        let left = self.parse_and()?;
        if self.stream.eat(&Token::Or) {
            let right = self.nested(Self::parse_or)?;
            Ok(Selector::Or(Box::new(left), Box::new(right)))
        } else {
            Ok(left)
        }
    }

    fn parse_and(&mut self) -> QueryResult<Selector> {
        let left = self.parse_leaf()?;
        if self.stream.eat(&Token::And) {
            let right = self.nested(Self::parse_and)?;
            Ok(Selector::And(Box::new(left), Box::new(right)))
        } else {
            Ok(left)
        }
    }

    fn parse_leaf(&mut self) -> QueryResult<Selector> {
        if self.stream.eat(&Token::Not) {
            let inner = self.nested(Self::parse_leaf)?;
            return Ok(Selector::Not(Box::new(inner)));
        }
        if self.stream.eat(&Token::GroupOpen) {
            let inner = self.nested(Self::parse_or)?;
            if !self.stream.eat(&Token::GroupClose) {
                return Err(QueryError::ExpectedCloseParen {
                    near: self.stream.peek().to_string(),
                });
            }
            return Ok(inner);
        }
        match self.stream.next_token() {
            Token::Condition(text) => Ok(Selector::Condition(Condition::compile(
                &text,
                self.fields,
            )?)),
            other => Err(QueryError::InvalidCondition {
                near: other.to_string(),
            }),
        }
    }

    /// Run `rule` one level deeper, failing once [MAX_NESTING] is exceeded
    fn nested(&mut self, rule: fn(&mut Self) -> QueryResult<Selector>) -> QueryResult<Selector> {
        if self.depth >= MAX_NESTING {
            return Err(QueryError::NestingTooDeep {
                limit: MAX_NESTING,
                near: self.stream.peek().to_string(),
            });
        }
        self.depth += 1;
        let result = rule(self);
        self.depth -= 1;
        result
    }
}

/// Parse a single expression from `tokens`
pub fn parse(tokens: Vec<Token>, fields: &KnownFields) -> QueryResult<Selector> {
    Parser::new(TokenStream::new(tokens), fields).parse_or()
}
