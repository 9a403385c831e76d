#![forbid(unsafe_code)]
#![allow(missing_docs)]

//! Structured errors emitted by the predicate compiler.
//!
//! Compilation is deterministic and never retried: the first failure aborts
//! the whole translation and surfaces one of these variants, each carrying
//! enough context (key path, operator, expected vs. actual type) for a
//! human-readable message.

use std::fmt;

use thiserror::Error;

use crate::query::schema::PropertyType;

/// Convenience alias for compiler results.
pub type CompileResult<T> = std::result::Result<T, CompileError>;

/// Compilation failure raised while translating a predicate into a query.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// A key-path segment names a property the schema does not declare.
    #[error("unknown property '{property}' in key path '{key_path}'")]
    UnknownProperty { key_path: String, property: String },
    /// A key-path segment other than the last names a non-relationship
    /// property, so the path cannot continue.
    #[error("property '{property}' in key path '{key_path}' is not a relationship")]
    InvalidKeyPath { key_path: String, property: String },
    /// The constant operand cannot be coerced to the resolved property type.
    #[error("cannot compare {expected} property '{key_path}' against {actual} value")]
    TypeMismatch {
        key_path: String,
        expected: PropertyType,
        actual: String,
    },
    /// `BETWEEN`/`IN` received a constant of the wrong shape.
    #[error("{operator} expects a {expected} (got {got} values)")]
    InvalidArity {
        operator: &'static str,
        expected: &'static str,
        got: usize,
    },
    /// A quantifier was required but absent, or supplied where no collection
    /// exists.
    #[error("{modifier} modifier invalid for key path '{key_path}': {reason}")]
    InvalidModifierPlacement {
        key_path: String,
        modifier: &'static str,
        reason: &'static str,
    },
    /// The operator is not defined for the operand it was applied to.
    #[error("operator '{operator}' not supported: {context}")]
    UnsupportedOperator {
        operator: &'static str,
        context: String,
    },
    /// An opaque or non-compilable expression kind reached the compiler.
    #[error("{kind} expressions cannot be compiled into a query")]
    UnsupportedExpressionKind { kind: &'static str },
    /// A function expression other than the supported count aggregate.
    #[error("function '{name}' is not supported in queries")]
    UnsupportedFunction { name: String },
    /// A string-comparison flag the engine has no equivalent for.
    #[error("comparison option '{option}' is not supported")]
    UnsupportedComparisonOption { option: &'static str },
    /// A compound node violated its arity contract (`NOT` takes one child).
    #[error("{connective} compound requires exactly one child (got {children})")]
    MalformedCompound {
        connective: &'static str,
        children: usize,
    },
}

impl CompileError {
    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            CompileError::UnknownProperty { .. } => "UnknownProperty",
            CompileError::InvalidKeyPath { .. } => "InvalidKeyPath",
            CompileError::TypeMismatch { .. } => "TypeMismatch",
            CompileError::InvalidArity { .. } => "InvalidArity",
            CompileError::InvalidModifierPlacement { .. } => "InvalidModifierPlacement",
            CompileError::UnsupportedOperator { .. } => "UnsupportedOperator",
            CompileError::UnsupportedExpressionKind { .. } => "UnsupportedExpressionKind",
            CompileError::UnsupportedFunction { .. } => "UnsupportedFunction",
            CompileError::UnsupportedComparisonOption { .. } => "UnsupportedComparisonOption",
            CompileError::MalformedCompound { .. } => "MalformedCompound",
        }
    }
}

/// Convenience wrapper that formats compile errors with their codes.
pub struct CompileErrorWithCode<'a>(pub &'a CompileError);

impl fmt::Display for CompileErrorWithCode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.0.code(), self.0)
    }
}
