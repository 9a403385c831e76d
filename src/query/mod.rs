#![forbid(unsafe_code)]

//! Predicate representation and query compilation.
//!
//! This module holds the three layers of the translation core: the tagged
//! literal container, the predicate AST handed over by the bindings, and the
//! compiler that walks a predicate against an object schema to build an
//! engine query.

/// Predicate and expression tree types.
///
/// Pure data produced by the bindings layer; construction only, no behavior.
pub mod ast;

/// Predicate-to-query translation.
///
/// Resolves key paths, applies type coercions, and assembles engine terms.
pub mod compile;

/// Query-engine surface and the in-memory reference engine.
pub mod engine;

/// Structured compilation errors.
pub mod errors;

/// Object schemas and the catalog trait used to resolve key paths.
pub mod schema;

/// Tagged literal values carried by predicate constants.
pub mod value;

pub use ast::{
    Comparison, ComparisonOptions, Connective, Modifier, Operator, Predicate, PredicateExpression,
};
pub use compile::compile;
pub use errors::{CompileError, CompileResult};
pub use value::{ObjectId, QueryValue, ValueKind};
