//! Test factories
//!
//! Small constructors shared by the unit tests in this crate and by the integration tests under
//! `tests/`. They keep test tables readable: fields, attribute maps and token lists are written
//! as string slices.

use crate::query::attributes::{AttributeMap, KnownFields};
use crate::query::token::Token;

/// Build a known field set from names
pub fn fields(names: &[&str]) -> KnownFields {
    names.iter().copied().collect()
}

/// Build an attribute map from `(field, value)` pairs
pub fn attrs(pairs: &[(&str, &str)]) -> AttributeMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Build a token list from source spellings.
///
/// Keywords and grouping marks map to their token; anything else is a raw condition.
pub fn mk_tokens(items: &[&str]) -> Vec<Token> {
    items
        .iter()
        .map(|item| match *item {
            "AND" => Token::And,
            "OR" => Token::Or,
            "NOT" => Token::Not,
            "(" => Token::GroupOpen,
            ")" => Token::GroupClose,
            other => Token::Condition(other.to_string()),
        })
        .collect()
}
