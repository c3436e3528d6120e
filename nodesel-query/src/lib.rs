//! # nodesel-query
//!
//! A compiler for the nodesel selector query language, and the slot assignment that consumes
//! its output.
//!
//! A query is a whitespace separated list of independent boolean expressions over bracketed
//! field conditions:
//!
//!     [name^=web] AND NOT [tag:role=db]    [capabilities~=gpu]
//!
//! compiles to two selectors. Every selector is a slot, and each polling pass hands the slots a
//! fresh pool of attribute maps to pick from. See [query::selectors] for the top level entry and
//! [query::assignment] for how slots are filled.
//!
//! File Layout
//!
//!     src/query
//!       ├── token        Token types and the token stream consumed by the parser
//!       ├── lexing       Context sensitive lexer (logos + known field lookahead)
//!       ├── condition    Single `[field<op>=value]` compilation
//!       ├── parsing      Recursive descent over the token stream, producing Selector trees
//!       ├── selectors    Query text to SelectorSet
//!       ├── assignment   Greedy slot filling over a candidate pool
//!       ├── attributes   AttributeSource trait and the known field set
//!       ├── error        QueryError
//!       └── testing      Factories shared by unit and integration tests

#![allow(rustdoc::invalid_html_tags)]

pub mod query;

pub use query::{
    compile, Assignment, AttributeMap, AttributeSource, KnownFields, QueryError, QueryErrorKind,
    Selector, SelectorSet,
};
