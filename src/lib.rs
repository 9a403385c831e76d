//! Criba translates platform-native predicate trees into typed object-store
//! queries.
//!
//! Bindings construct a [`query::Predicate`] from their native filter syntax
//! and hand it to [`query::compile`] together with an object schema, a schema
//! catalog, and a query engine. The compiler resolves key paths through
//! relationships, type-checks every constant against the declared property
//! types, and either returns a fully built engine query or a descriptive
//! [`query::CompileError`].

#![warn(missing_docs)]

pub mod query;
pub mod types;
