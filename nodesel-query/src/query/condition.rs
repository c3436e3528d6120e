//! Condition compiler
//!
//!     A condition is the leaf of a selector: `[field<op>=value]`. The operator is a single
//!     optional character in front of `=`:
//!
//!         `=` or none   the whole field value equals `value`
//!         `!`           negation of `=`
//!         `~`           `value` is one of the whitespace separated words of the field
//!         `$`           the field ends with `value`
//!         `^`           the field starts with `value`
//!         `*`           the field contains `value`
//!         `/`           the field matches `value` read as a regex
//!
//!     Every operator compiles to one regex, case-insensitive and with `.` matching newlines.
//!     `value` is escaped except for `/`. A field the candidate does not carry is matched as the
//!     empty string, so `[field=]` selects candidates without the field.

use crate::query::attributes::{AttributeSource, KnownFields};
use crate::query::error::{QueryError, QueryResult};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use std::fmt;

/// Splits a condition body into field, operator symbol and value.
///
/// The field is the shortest prefix followed by an optional operator and `=`; the value is
/// everything after that `=`, newlines included.
static CONDITION_BODY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.*?)([!=~$^*/]?)=((?s:.*))$").expect("condition grammar is a valid regex")
});

/// Comparison performed by a condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equals,
    NotEquals,
    Word,
    EndsWith,
    StartsWith,
    Contains,
    Pattern,
}

impl Operator {
    /// Operator for the character written before `=`, empty for a bare `=`
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "" | "=" => Some(Operator::Equals),
            "!" => Some(Operator::NotEquals),
            "~" => Some(Operator::Word),
            "$" => Some(Operator::EndsWith),
            "^" => Some(Operator::StartsWith),
            "*" => Some(Operator::Contains),
            "/" => Some(Operator::Pattern),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Equals => "=",
            Operator::NotEquals => "!",
            Operator::Word => "~",
            Operator::EndsWith => "$",
            Operator::StartsWith => "^",
            Operator::Contains => "*",
            Operator::Pattern => "/",
        }
    }

    fn pattern_for(&self, value: &str) -> String {
        let escaped = regex::escape(value);
        match self {
            Operator::Equals | Operator::NotEquals => format!("^{}$", escaped),
            Operator::Word => format!(r"(?:^|\s){}(?:\s|$)", escaped),
            Operator::EndsWith => format!("{}$", escaped),
            Operator::StartsWith => format!("^{}", escaped),
            Operator::Contains => escaped,
            Operator::Pattern => value.to_string(),
        }
    }
}

/// A compiled `[field<op>=value]` test
#[derive(Debug, Clone)]
pub struct Condition {
    field: String,
    operator: Operator,
    value: String,
    matcher: Regex,
}

impl Condition {
    /// Compile a raw condition token (brackets included)
    pub fn compile(text: &str, fields: &KnownFields) -> QueryResult<Self> {
        let inner = text.strip_prefix('[').unwrap_or(text);
        let inner = inner.strip_suffix(']').unwrap_or(inner);
        let body = inner.trim_start();

        let invalid = || QueryError::InvalidCondition {
            near: body.to_string(),
        };
        let captures = CONDITION_BODY.captures(body).ok_or_else(invalid)?;
        let field = captures[1].trim();
        let operator = Operator::from_symbol(&captures[2]).ok_or_else(invalid)?;
        let value = &captures[3];

        if !fields.contains(field) {
            return Err(QueryError::UnknownField {
                field: field.to_string(),
            });
        }
        Self::new(field, operator, value)
    }

    /// Build a condition from its parts, without a known field check
    pub fn new(field: &str, operator: Operator, value: &str) -> QueryResult<Self> {
        let source = operator.pattern_for(value);
        let matcher = RegexBuilder::new(&source)
            .case_insensitive(true)
            .dot_matches_new_line(true)
            .build()
            .map_err(|e| QueryError::InvalidPattern {
                pattern: value.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            field: field.to_string(),
            operator,
            value: value.to_string(),
            matcher,
        })
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn matches<A: AttributeSource + ?Sized>(&self, candidate: &A) -> bool {
        let haystack = candidate.attribute(&self.field).unwrap_or("");
        let hit = self.matcher.is_match(haystack);
        match self.operator {
            Operator::NotEquals => !hit,
            _ => hit,
        }
    }
}

impl PartialEq for Condition {
    fn eq(&self, other: &Self) -> bool {
        self.field == other.field && self.operator == other.operator && self.value == other.value
    }
}

impl Eq for Condition {}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}{}={}]",
            self.field,
            self.operator.symbol(),
            self.value
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::error::QueryErrorKind;
    use crate::query::testing::{attrs, fields};

    fn cond(text: &str) -> Condition {
        Condition::compile(text, &fields(&["a", "b"])).expect("condition should compile")
    }

    #[test]
    fn test_split_field_operator_value() {
        let c = cond("[a==12]");
        assert_eq!(
            (c.field(), c.operator(), c.value()),
            ("a", Operator::Equals, "12")
        );

        let c = cond("[a=12]");
        assert_eq!(
            (c.field(), c.operator(), c.value()),
            ("a", Operator::Equals, "12")
        );

        let c = cond("[b!=x=y]");
        assert_eq!(
            (c.field(), c.operator(), c.value()),
            ("b", Operator::NotEquals, "x=y")
        );
    }

    #[test]
    fn test_field_is_trimmed_value_is_not() {
        let c = cond("[  a = 1]");
        assert_eq!(c.field(), "a");
        assert_eq!(c.value(), " 1");
    }

    #[test]
    fn test_value_may_span_lines() {
        let c = cond("[a*=x\ny]");
        assert_eq!(c.value(), "x\ny");
        assert!(c.matches(&attrs(&[("a", "0x\nY1")])));
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        assert!(cond("[a=Web]").matches(&attrs(&[("a", "WEB")])));
        assert!(cond("[a^=ab]").matches(&attrs(&[("a", "ABC")])));
    }

    #[test]
    fn test_absent_field_is_empty_string() {
        let empty = attrs(&[]);
        assert!(cond("[a=]").matches(&empty));
        assert!(!cond("[a!=]").matches(&empty));
        assert!(cond("[a!=x]").matches(&empty));
        assert!(!cond("[a~=x]").matches(&empty));
        assert!(cond("[a^=]").matches(&empty));
    }

    #[test]
    fn test_value_is_escaped() {
        let c = cond("[a*=1.2]");
        assert!(c.matches(&attrs(&[("a", "v1.2")])));
        assert!(!c.matches(&attrs(&[("a", "v122")])));
    }

    #[test]
    fn test_raw_pattern_is_not_escaped() {
        let c = cond("[a/=1.2]");
        assert!(c.matches(&attrs(&[("a", "122")])));
        assert!(!c.matches(&attrs(&[("a", "12")])));
    }

    #[test]
    fn test_invalid_raw_pattern() {
        let err = Condition::compile("[a/=(]", &fields(&["a"])).unwrap_err();
        assert_eq!(err.kind(), QueryErrorKind::InvalidPattern);
        assert_eq!(err.context(), "(");
    }

    #[test]
    fn test_missing_equals_is_invalid() {
        let err = Condition::compile("[a]", &fields(&["a"])).unwrap_err();
        assert_eq!(err.kind(), QueryErrorKind::InvalidCondition);
        assert_eq!(err.context(), "a");
    }

    #[test]
    fn test_unknown_field() {
        let err = Condition::compile("[zone=eu]", &fields(&["a"])).unwrap_err();
        assert_eq!(
            err,
            QueryError::UnknownField {
                field: "zone".to_string()
            }
        );
    }

    #[test]
    fn test_display_is_canonical() {
        assert_eq!(cond("[a=1]").to_string(), "[a==1]");
        assert_eq!(cond("[ b~=x y]").to_string(), "[b~=x y]");
    }
}
