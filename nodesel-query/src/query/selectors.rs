//! Selector set compiler
//!
//!     A query is a list of expressions written one after the other with no operator between
//!     them. Each becomes its own [Selector], and the list order is the slot order used by
//!     [assignment](crate::query::assignment):
//!
//!         [a*=1] AND [a*=2] [a*=3]
//!
//!     compiles to two selectors, `([a*=1] AND [a*=2])` and `[a*=3]`. Juxtaposition is not an
//!     implicit AND.
//!
//!     A compiled set is immutable and can be evaluated any number of times.

use crate::query::assignment::{assign, Assignment};
use crate::query::attributes::{AttributeSource, KnownFields};
use crate::query::error::QueryResult;
use crate::query::lexing::Tokenizer;
use crate::query::parsing::{Parser, Selector};
use crate::query::token::TokenStream;
use std::fmt;

/// The ordered, independent selectors compiled from one query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectorSet {
    selectors: Vec<Selector>,
}

impl SelectorSet {
    /// Compile `text` against `fields`
    pub fn compile(text: &str, fields: &KnownFields) -> QueryResult<Self> {
        let tokens = Tokenizer::new(fields)?.tokenize(text)?;
        let mut parser = Parser::new(TokenStream::new(tokens), fields);
        let mut selectors = Vec::new();
        while !parser.at_end() {
            selectors.push(parser.parse_or()?);
        }
        Ok(Self { selectors })
    }

    pub fn len(&self) -> usize {
        self.selectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }

    pub fn get(&self, slot: usize) -> Option<&Selector> {
        self.selectors.get(slot)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Selector> {
        self.selectors.iter()
    }

    pub fn as_slice(&self) -> &[Selector] {
        &self.selectors
    }

    /// The answer of every selector for one candidate, in slot order
    pub fn evaluate<A: AttributeSource + ?Sized>(&self, candidate: &A) -> Vec<bool> {
        self.selectors
            .iter()
            .map(|selector| selector.matches(candidate))
            .collect()
    }

    /// One greedy assignment pass over `pool`
    pub fn assign<'p, A: AttributeSource>(&self, pool: &'p [A]) -> Assignment<'p, A> {
        assign(&self.selectors, pool)
    }
}

impl From<Vec<Selector>> for SelectorSet {
    fn from(selectors: Vec<Selector>) -> Self {
        Self { selectors }
    }
}

impl<'s> IntoIterator for &'s SelectorSet {
    type Item = &'s Selector;
    type IntoIter = std::slice::Iter<'s, Selector>;

    fn into_iter(self) -> Self::IntoIter {
        self.selectors.iter()
    }
}

impl fmt::Display for SelectorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.selectors.iter().map(|s| s.to_string()).collect();
        write!(f, "{}", rendered.join(" "))
    }
}

/// Compile `text` into its selector set
pub fn compile(text: &str, fields: &KnownFields) -> QueryResult<SelectorSet> {
    SelectorSet::compile(text, fields)
}
