//! Runtime error taxonomy
//!
//! Every error here is recoverable at the request level: a failed
//! evaluation leaves the program and session usable. The only exception
//! is `Internal`, which marks an invariant breach inside the evaluator
//! itself. The evaluator never panics.

use crate::random::RngError;
use thiserror::Error;

/// Errors surfaced while evaluating a compiled expression.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EvalError {
    #[error("variable not set: {name}")]
    UndefinedVariable { name: String },

    #[error("wrong type for parameter {index} of '{function}', expected {expected}")]
    WrongArgumentType {
        function: String,
        index: usize,
        expected: &'static str,
    },

    #[error("types do not match for function: {function}")]
    TypeMismatch { function: String },

    #[error("cannot convert '{value}' to an integer")]
    UnparsableInt { value: String },

    #[error("no row matching index {index} and no default row in table '{table}'")]
    NoIndexMatch { table: String, index: i64 },

    #[error("no row labeled '{label}' and no default row in table '{table}'")]
    NoLabelMatch { table: String, label: String },

    #[error("no default row set for table '{table}'")]
    NoDefaultRow { table: String },

    #[error("deck exhausted for table '{table}'")]
    DeckExhausted { table: String },

    #[error("unknown table call mode '{mode}'")]
    UnknownCallMode { mode: String },

    #[error("bad argument for table call mode '{mode}': {reason}")]
    BadCallArgument { mode: String, reason: String },

    #[error("cannot keep {keep} of {rolled} rolled dice")]
    SelectorTooLarge { keep: i64, rolled: i64 },

    #[error("count aggregation cannot be combined with '{aggr}' aggregation")]
    AggregatorConflict { aggr: String },

    #[error("unknown pack key '{key}'")]
    UnknownPack { key: String },

    #[error("unknown table '{table}' in pack '{pack}'")]
    UnknownTable { pack: String, table: String },

    #[error(transparent)]
    Rng(#[from] RngError),

    #[error("internal evaluation error: {message}")]
    Internal { message: String },
}

impl EvalError {
    /// Shorthand for invariant breaches in the evaluator machinery.
    pub fn internal(message: impl Into<String>) -> Self {
        EvalError::Internal {
            message: message.into(),
        }
    }
}

/// Result alias for evaluation operations.
pub type EvalResult<T> = Result<T, EvalError>;
