//! Error types for query compilation
//!
//! Every failure is a syntax error found while compiling query text. Evaluating a compiled
//! selector never fails: absent fields match as empty strings.

use std::fmt;

/// Errors that can occur while tokenizing, parsing or compiling a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// A `[` was found but no `]` is followed by something a query can continue with
    UnterminatedCondition { near: String },
    /// The remaining text starts with neither a condition, a keyword nor a grouping mark
    UnrecognizedToken { near: String },
    /// A condition body does not have the `field [op] = value` shape
    InvalidCondition { near: String },
    /// A condition references a field outside the known field set
    UnknownField { field: String },
    /// A group was opened with `(` and never closed
    ExpectedCloseParen { near: String },
    /// A pattern was rejected by the regex engine
    InvalidPattern { pattern: String, reason: String },
    /// Groups, negations and operator chains nest past `limit` levels
    NestingTooDeep { limit: usize, near: String },
}

/// Discriminant of [QueryError], for callers that only care about the category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryErrorKind {
    UnterminatedCondition,
    UnrecognizedToken,
    InvalidCondition,
    UnknownField,
    ExpectedCloseParen,
    InvalidPattern,
    NestingTooDeep,
}

impl QueryError {
    pub fn kind(&self) -> QueryErrorKind {
        match self {
            QueryError::UnterminatedCondition { .. } => QueryErrorKind::UnterminatedCondition,
            QueryError::UnrecognizedToken { .. } => QueryErrorKind::UnrecognizedToken,
            QueryError::InvalidCondition { .. } => QueryErrorKind::InvalidCondition,
            QueryError::UnknownField { .. } => QueryErrorKind::UnknownField,
            QueryError::ExpectedCloseParen { .. } => QueryErrorKind::ExpectedCloseParen,
            QueryError::InvalidPattern { .. } => QueryErrorKind::InvalidPattern,
            QueryError::NestingTooDeep { .. } => QueryErrorKind::NestingTooDeep,
        }
    }

    /// The offending text, as reported in the message
    pub fn context(&self) -> &str {
        match self {
            QueryError::UnterminatedCondition { near }
            | QueryError::UnrecognizedToken { near }
            | QueryError::InvalidCondition { near }
            | QueryError::ExpectedCloseParen { near }
            | QueryError::NestingTooDeep { near, .. } => near,
            QueryError::UnknownField { field } => field,
            QueryError::InvalidPattern { pattern, .. } => pattern,
        }
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::UnterminatedCondition { near } => {
                write!(f, "Query syntax error: unterminated condition near: {}", near)
            }
            QueryError::UnrecognizedToken { near } => {
                write!(f, "Query syntax error: unrecognized token near: {}", near)
            }
            QueryError::InvalidCondition { near } => {
                write!(f, "Query syntax error: invalid condition near: {}", near)
            }
            QueryError::UnknownField { field } => {
                write!(f, "Query syntax error: unknown field: {}", field)
            }
            QueryError::ExpectedCloseParen { near } => {
                write!(f, "Query syntax error: expecting \")\" near: {}", near)
            }
            QueryError::InvalidPattern { pattern, reason } => {
                writeln!(f, "Query syntax error: invalid pattern near: {}", pattern)?;
                write!(f, "{}", reason)
            }
            QueryError::NestingTooDeep { limit, near } => write!(
                f,
                "Query syntax error: nesting deeper than {} levels near: {}",
                limit, near
            ),
        }
    }
}

impl std::error::Error for QueryError {}

impl From<QueryError> for String {
    fn from(err: QueryError) -> Self {
        err.to_string()
    }
}

/// Type alias for query compilation results
pub type QueryResult<T> = Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_context() {
        let err = QueryError::UnterminatedCondition {
            near: "[a=1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Query syntax error: unterminated condition near: [a=1"
        );
        assert_eq!(err.context(), "[a=1");
        assert_eq!(err.kind(), QueryErrorKind::UnterminatedCondition);
    }

    #[test]
    fn test_unknown_field_message() {
        let err = QueryError::UnknownField {
            field: "zone".to_string(),
        };
        assert_eq!(err.to_string(), "Query syntax error: unknown field: zone");
    }

    #[test]
    fn test_invalid_pattern_includes_reason() {
        let err = QueryError::InvalidPattern {
            pattern: "(".to_string(),
            reason: "unclosed group".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("invalid pattern near: ("));
        assert!(message.ends_with("unclosed group"));
    }

    #[test]
    fn test_nesting_message_names_limit() {
        let err = QueryError::NestingTooDeep {
            limit: 64,
            near: "NOT".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Query syntax error: nesting deeper than 64 levels near: NOT"
        );
        assert_eq!(err.context(), "NOT");
        assert_eq!(err.kind(), QueryErrorKind::NestingTooDeep);
    }
}
