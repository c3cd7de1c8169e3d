//! Expression result values

use serde::{Deserialize, Serialize};
use std::fmt;

/// The result of evaluating any expression: an integer or a string.
///
/// Ordering and equality are type-then-value: all integers sort before
/// all strings, and mixed-type values are never equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ExpressionResult {
    Int(i64),
    Text(String),
}

impl ExpressionResult {
    /// Build a text result from anything string-like.
    pub fn text(value: impl Into<String>) -> Self {
        ExpressionResult::Text(value.into())
    }

    pub fn is_int(&self) -> bool {
        matches!(self, ExpressionResult::Int(_))
    }

    pub fn is_text(&self) -> bool {
        matches!(self, ExpressionResult::Text(_))
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ExpressionResult::Int(v) => Some(*v),
            ExpressionResult::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ExpressionResult::Int(_) => None,
            ExpressionResult::Text(s) => Some(s),
        }
    }

    /// Truthiness: a non-zero integer. Strings are never truthy.
    pub fn truthy(&self) -> bool {
        matches!(self, ExpressionResult::Int(v) if *v != 0)
    }

    pub fn same_type(&self, other: &ExpressionResult) -> bool {
        matches!(
            (self, other),
            (ExpressionResult::Int(_), ExpressionResult::Int(_))
                | (ExpressionResult::Text(_), ExpressionResult::Text(_))
        )
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ExpressionResult::Int(_) => "int",
            ExpressionResult::Text(_) => "string",
        }
    }
}

impl fmt::Display for ExpressionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpressionResult::Int(v) => write!(f, "{}", v),
            ExpressionResult::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for ExpressionResult {
    fn from(value: i64) -> Self {
        ExpressionResult::Int(value)
    }
}

impl From<String> for ExpressionResult {
    fn from(value: String) -> Self {
        ExpressionResult::Text(value)
    }
}

impl From<&str> for ExpressionResult {
    fn from(value: &str) -> Self {
        ExpressionResult::Text(value.to_string())
    }
}
