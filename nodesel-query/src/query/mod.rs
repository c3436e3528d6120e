//! Main module for the selector query library

pub mod assignment;
pub mod attributes;
pub mod condition;
pub mod error;
pub mod lexing;
pub mod parsing;
pub mod selectors;
pub mod testing;
pub mod token;

pub use assignment::{assign, Assignment};
pub use attributes::{AttributeMap, AttributeSource, KnownFields};
pub use condition::{Condition, Operator};
pub use error::{QueryError, QueryErrorKind, QueryResult};
pub use lexing::{tokenize, Tokenizer};
pub use parsing::{parse, Selector, MAX_NESTING};
pub use selectors::{compile, SelectorSet};
pub use token::{Token, TokenStream};
