#![forbid(unsafe_code)]
#![allow(missing_docs)]

//! Predicate-to-query translation.
//!
//! [`compile`] walks a [`Predicate`] against an [`ObjectSchema`], resolving
//! key paths through the [`SchemaCatalog`], type-checking constants against
//! declared property types, and assembling the result through a
//! [`QueryEngine`]. The walk is synchronous and deterministic: the same
//! predicate and schema always produce the same query or the same error, and
//! the first failure aborts the whole translation.

use std::str::FromStr;

use rust_decimal::Decimal;
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::query::ast::{
    Comparison, ComparisonOptions, Connective, Modifier, Operator, Predicate, PredicateExpression,
};
use crate::query::engine::{
    ColumnTarget, CompareOp, LinkChain, Quantifier, QueryEngine, StringOptions,
};
use crate::query::errors::{CompileError, CompileResult};
use crate::query::schema::{ObjectSchema, PropertyType, SchemaCatalog};
use crate::query::value::QueryValue;
use crate::types::ObjKey;

/// Translates `predicate` into an engine query against `object_schema`.
///
/// Key paths crossing relationships are resolved through `catalog`; the
/// resulting terms are assembled by `engine`. On failure no partial query is
/// returned — intermediate terms are dropped with the error.
pub fn compile<E: QueryEngine>(
    predicate: &Predicate,
    object_schema: &ObjectSchema,
    catalog: &dyn SchemaCatalog,
    engine: &mut E,
) -> CompileResult<E::Query> {
    debug!(schema = %object_schema.name, "compiling predicate");
    let mut compiler = Compiler { catalog, engine };
    compiler.predicate(
        predicate,
        &Scope {
            schema: object_schema,
            variable: None,
        },
    )
}

/// Schema context a predicate node is evaluated in. Subqueries swap in the
/// collection element schema and bind their iteration variable.
struct Scope<'s> {
    schema: &'s ObjectSchema,
    variable: Option<&'s str>,
}

struct Compiler<'a, E: QueryEngine> {
    catalog: &'a dyn SchemaCatalog,
    engine: &'a mut E,
}

/// A comparison operand after expression classification.
enum Operand<'p> {
    /// Dot-separated property path.
    Path(&'p str),
    /// The evaluated object itself (`SELF`, or the subquery variable).
    SelfObject,
    /// `SUBQUERY(...).@count`.
    Count {
        key_path: &'p str,
        variable: &'p str,
        predicate: &'p Predicate,
    },
    /// Literal constant (aggregates of constants fold into a list).
    Constant(QueryValue),
}

impl<'a, E: QueryEngine> Compiler<'a, E> {
    fn predicate(&mut self, predicate: &Predicate, scope: &Scope<'_>) -> CompileResult<E::Query> {
        match predicate {
            Predicate::True => Ok(self.engine.true_query()),
            Predicate::False => Ok(self.engine.false_query()),
            Predicate::Base => Err(CompileError::UnsupportedExpressionKind {
                kind: "base predicate",
            }),
            Predicate::Compound {
                connective,
                children,
            } => self.compound(*connective, children, scope),
            Predicate::Comparison(cmp) => self.comparison(cmp, scope),
        }
    }

    fn compound(
        &mut self,
        connective: Connective,
        children: &[Predicate],
        scope: &Scope<'_>,
    ) -> CompileResult<E::Query> {
        match connective {
            Connective::Not => {
                if children.len() != 1 {
                    return Err(CompileError::MalformedCompound {
                        connective: "NOT",
                        children: children.len(),
                    });
                }
                let inner = self.predicate(&children[0], scope)?;
                Ok(self.engine.not(inner))
            }
            Connective::And => {
                if children.is_empty() {
                    return Ok(self.engine.true_query());
                }
                let mut terms = Vec::with_capacity(children.len());
                for child in children {
                    terms.push(self.predicate(child, scope)?);
                }
                Ok(self.engine.and(terms))
            }
            Connective::Or => {
                if children.is_empty() {
                    return Ok(self.engine.false_query());
                }
                let mut terms = Vec::with_capacity(children.len());
                for child in children {
                    terms.push(self.predicate(child, scope)?);
                }
                Ok(self.engine.or(terms))
            }
        }
    }

    fn comparison(&mut self, cmp: &Comparison, scope: &Scope<'_>) -> CompileResult<E::Query> {
        trace!(op = cmp.op.name(), "compiling comparison");
        let left = self.classify(&cmp.left, scope)?;
        let right = self.classify(&cmp.right, scope)?;
        let (operand, op, constant) = match (left, right) {
            (Operand::Constant(_), Operand::Constant(_)) => {
                return Err(CompileError::UnsupportedOperator {
                    operator: cmp.op.name(),
                    context: "comparison requires a key path operand".to_owned(),
                })
            }
            (Operand::Constant(value), operand) => (operand, flip_operator(cmp.op)?, value),
            (operand, Operand::Constant(value)) => (operand, cmp.op, value),
            (_, _) => {
                return Err(CompileError::UnsupportedOperator {
                    operator: cmp.op.name(),
                    context: "column-to-column comparisons are not supported".to_owned(),
                })
            }
        };
        match operand {
            Operand::Path(path) => self.keypath_comparison(
                path,
                op,
                &constant,
                cmp.modifier,
                cmp.options,
                scope,
                false,
            ),
            Operand::SelfObject => {
                if cmp.modifier != Modifier::Direct {
                    return Err(CompileError::InvalidModifierPlacement {
                        key_path: "SELF".to_owned(),
                        modifier: cmp.modifier.name(),
                        reason: "no collection to quantify over",
                    });
                }
                self.self_comparison("SELF", op, &constant, scope)
            }
            Operand::Count {
                key_path,
                variable,
                predicate,
            } => {
                if cmp.modifier != Modifier::Direct {
                    return Err(CompileError::InvalidModifierPlacement {
                        key_path: key_path.to_owned(),
                        modifier: cmp.modifier.name(),
                        reason: "no collection to quantify over",
                    });
                }
                self.count_comparison(key_path, variable, predicate, op, &constant, scope)
            }
            Operand::Constant(_) => unreachable!("constant operands handled above"),
        }
    }

    fn classify<'p>(
        &self,
        expr: &'p PredicateExpression,
        scope: &Scope<'_>,
    ) -> CompileResult<Operand<'p>> {
        match expr {
            PredicateExpression::Constant(value) => Ok(Operand::Constant(value.clone())),
            PredicateExpression::KeyPath(path) => Ok(Operand::Path(path.as_str())),
            PredicateExpression::EvaluatedObject => Ok(Operand::SelfObject),
            PredicateExpression::Variable(name) => match scope.variable {
                Some(bound) if bound == name.as_str() => Ok(Operand::SelfObject),
                _ => Err(CompileError::UnsupportedExpressionKind {
                    kind: "unbound variable",
                }),
            },
            PredicateExpression::Aggregate(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        PredicateExpression::Constant(value) => values.push(value.clone()),
                        _ => {
                            return Err(CompileError::UnsupportedExpressionKind {
                                kind: "aggregate of non-constant expressions",
                            })
                        }
                    }
                }
                Ok(Operand::Constant(QueryValue::List(values)))
            }
            PredicateExpression::Function { operand, name, .. } => {
                if name != "@count" && name != "count:" {
                    return Err(CompileError::UnsupportedFunction { name: name.clone() });
                }
                match operand.as_ref() {
                    PredicateExpression::Subquery {
                        key_path,
                        variable,
                        predicate,
                    } => Ok(Operand::Count {
                        key_path: key_path.as_str(),
                        variable: variable.as_str(),
                        predicate: predicate.as_ref(),
                    }),
                    _ => Err(CompileError::UnsupportedExpressionKind {
                        kind: "count over a non-subquery operand",
                    }),
                }
            }
            PredicateExpression::Subquery { .. } => Err(CompileError::UnsupportedExpressionKind {
                kind: "subquery outside a count comparison",
            }),
            PredicateExpression::UnionSet { .. } => Err(CompileError::UnsupportedExpressionKind {
                kind: "set union",
            }),
            PredicateExpression::IntersectSet { .. } => {
                Err(CompileError::UnsupportedExpressionKind {
                    kind: "set intersection",
                })
            }
            PredicateExpression::MinusSet { .. } => Err(CompileError::UnsupportedExpressionKind {
                kind: "set difference",
            }),
            PredicateExpression::AnyKey => Err(CompileError::UnsupportedExpressionKind {
                kind: "any-key",
            }),
            PredicateExpression::Block => Err(CompileError::UnsupportedExpressionKind {
                kind: "block",
            }),
            PredicateExpression::Conditional => Err(CompileError::UnsupportedExpressionKind {
                kind: "conditional",
            }),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn keypath_comparison(
        &mut self,
        path: &str,
        op: Operator,
        constant: &QueryValue,
        modifier: Modifier,
        options: ComparisonOptions,
        scope: &Scope<'_>,
        quantified: bool,
    ) -> CompileResult<E::Query> {
        match self.resolve_path(path, scope.schema)? {
            Resolved::Column { target, link_target } => {
                if modifier != Modifier::Direct && !quantified {
                    return Err(CompileError::InvalidModifierPlacement {
                        key_path: path.to_owned(),
                        modifier: modifier.name(),
                        reason: "key path contains no collection",
                    });
                }
                self.column_comparison(path, target, link_target.as_deref(), op, constant, options)
            }
            Resolved::Collection { chain, rest } => {
                let quantifier = match modifier {
                    Modifier::Any => Quantifier::Any,
                    Modifier::All => Quantifier::All,
                    Modifier::Direct => {
                        return Err(CompileError::InvalidModifierPlacement {
                            key_path: path.to_owned(),
                            modifier: "DIRECT",
                            reason: "comparison through a collection requires ANY or ALL",
                        })
                    }
                };
                let element_schema = self.schema_named(&chain.target, path)?;
                let element_scope = Scope {
                    schema: element_schema,
                    variable: None,
                };
                let inner = match rest {
                    Some(rest) => self.keypath_comparison(
                        &rest,
                        op,
                        constant,
                        modifier,
                        options,
                        &element_scope,
                        true,
                    )?,
                    // Leaf collection: quantify an identity comparison
                    // against the element itself.
                    None => self.self_comparison(path, op, constant, &element_scope)?,
                };
                Ok(self.engine.quantify(&chain, quantifier, inner))
            }
        }
    }

    fn column_comparison(
        &mut self,
        key_path: &str,
        target: ColumnTarget,
        link_target: Option<&str>,
        op: Operator,
        constant: &QueryValue,
        options: ComparisonOptions,
    ) -> CompileResult<E::Query> {
        let strings = string_options(options, target.ty)?;
        match op {
            Operator::Between => self.between(key_path, &target, constant, strings),
            Operator::In => self.in_list(key_path, &target, link_target, constant, strings),
            Operator::Matches => Err(CompileError::UnsupportedOperator {
                operator: op.name(),
                context: "regular expressions are not available in queries".to_owned(),
            }),
            Operator::BeginsWith | Operator::EndsWith | Operator::Contains | Operator::Like => {
                if target.ty != PropertyType::String {
                    return Err(CompileError::UnsupportedOperator {
                        operator: op.name(),
                        context: format!("{} property '{key_path}'", target.ty),
                    });
                }
                check_coercible(key_path, &target, link_target, constant)?;
                self.engine.compare(&target, engine_op(op), constant, strings)
            }
            Operator::Equal | Operator::NotEqual => {
                if constant.is_null() {
                    return Ok(self.engine.compare_null(&target, op == Operator::Equal));
                }
                check_coercible(key_path, &target, link_target, constant)?;
                self.engine.compare(&target, engine_op(op), constant, strings)
            }
            Operator::LessThan
            | Operator::LessThanOrEqual
            | Operator::GreaterThan
            | Operator::GreaterThanOrEqual => {
                // Coercion failures outrank operator support so that e.g.
                // `age > 30` against a string-typed column reports the type.
                check_coercible(key_path, &target, link_target, constant)?;
                if !orderable(target.ty) {
                    return Err(CompileError::UnsupportedOperator {
                        operator: op.name(),
                        context: format!("{} property '{key_path}'", target.ty),
                    });
                }
                self.engine.compare(&target, engine_op(op), constant, strings)
            }
        }
    }

    fn between(
        &mut self,
        key_path: &str,
        target: &ColumnTarget,
        constant: &QueryValue,
        strings: StringOptions,
    ) -> CompileResult<E::Query> {
        let bounds = match constant {
            QueryValue::List(items) => items,
            _ => {
                return Err(CompileError::InvalidArity {
                    operator: "between",
                    expected: "two-element bounds list",
                    got: 1,
                })
            }
        };
        if bounds.len() != 2 {
            return Err(CompileError::InvalidArity {
                operator: "between",
                expected: "two-element bounds list",
                got: bounds.len(),
            });
        }
        check_coercible(key_path, target, None, &bounds[0])?;
        check_coercible(key_path, target, None, &bounds[1])?;
        if !orderable(target.ty) {
            return Err(CompileError::UnsupportedOperator {
                operator: "between",
                context: format!("{} property '{key_path}'", target.ty),
            });
        }
        let lower = self
            .engine
            .compare(target, CompareOp::GreaterEqual, &bounds[0], strings)?;
        let upper = self
            .engine
            .compare(target, CompareOp::LessEqual, &bounds[1], strings)?;
        Ok(self.engine.and(vec![lower, upper]))
    }

    fn in_list(
        &mut self,
        key_path: &str,
        target: &ColumnTarget,
        link_target: Option<&str>,
        constant: &QueryValue,
        strings: StringOptions,
    ) -> CompileResult<E::Query> {
        let items = match constant {
            QueryValue::List(items) => items,
            _ => {
                return Err(CompileError::InvalidArity {
                    operator: "in",
                    expected: "non-empty value list",
                    got: 1,
                })
            }
        };
        if items.is_empty() {
            return Err(CompileError::InvalidArity {
                operator: "in",
                expected: "non-empty value list",
                got: 0,
            });
        }
        let mut terms = Vec::with_capacity(items.len());
        for item in items {
            if item.is_null() {
                terms.push(self.engine.compare_null(target, true));
                continue;
            }
            check_coercible(key_path, target, link_target, item)?;
            terms.push(self.engine.compare(target, CompareOp::Equal, item, strings)?);
        }
        Ok(self.engine.or(terms))
    }

    fn self_comparison(
        &mut self,
        key_path: &str,
        op: Operator,
        constant: &QueryValue,
        scope: &Scope<'_>,
    ) -> CompileResult<E::Query> {
        match op {
            Operator::Equal | Operator::NotEqual => {
                let key = link_key(constant, &scope.schema.name, key_path)?;
                Ok(self
                    .engine
                    .key_compare(&[], op == Operator::Equal, key))
            }
            Operator::In => {
                let items = match constant {
                    QueryValue::List(items) => items,
                    _ => {
                        return Err(CompileError::InvalidArity {
                            operator: "in",
                            expected: "non-empty value list",
                            got: 1,
                        })
                    }
                };
                if items.is_empty() {
                    return Err(CompileError::InvalidArity {
                        operator: "in",
                        expected: "non-empty value list",
                        got: 0,
                    });
                }
                let mut terms = Vec::with_capacity(items.len());
                for item in items {
                    let key = link_key(item, &scope.schema.name, key_path)?;
                    terms.push(self.engine.key_compare(&[], true, key));
                }
                Ok(self.engine.or(terms))
            }
            other => Err(CompileError::UnsupportedOperator {
                operator: other.name(),
                context: "only identity comparisons apply to objects".to_owned(),
            }),
        }
    }

    fn count_comparison(
        &mut self,
        key_path: &str,
        variable: &str,
        predicate: &Predicate,
        op: Operator,
        constant: &QueryValue,
        scope: &Scope<'_>,
    ) -> CompileResult<E::Query> {
        let rel_op = match op {
            Operator::Equal
            | Operator::NotEqual
            | Operator::LessThan
            | Operator::LessThanOrEqual
            | Operator::GreaterThan
            | Operator::GreaterThanOrEqual => engine_op(op),
            other => {
                return Err(CompileError::UnsupportedOperator {
                    operator: other.name(),
                    context: "counts only support relational comparisons".to_owned(),
                })
            }
        };
        let count = match constant {
            QueryValue::Int(value) => *value,
            other => {
                return Err(CompileError::TypeMismatch {
                    key_path: key_path.to_owned(),
                    expected: PropertyType::Int,
                    actual: other.type_name().to_owned(),
                })
            }
        };
        let chain = self.resolve_list_chain(key_path, scope.schema)?;
        let element_schema = self.schema_named(&chain.target, key_path)?;
        let element_scope = Scope {
            schema: element_schema,
            variable: Some(variable),
        };
        let inner = self.predicate(predicate, &element_scope)?;
        self.engine.count_compare(&chain, inner, rel_op, count)
    }

    fn resolve_path(&self, path: &str, schema: &ObjectSchema) -> CompileResult<Resolved> {
        let segments: SmallVec<[&str; 4]> = path.split('.').collect();
        let mut links = Vec::new();
        let mut current = schema;
        for (index, segment) in segments.iter().enumerate() {
            let property = current.property(segment).ok_or_else(|| {
                CompileError::UnknownProperty {
                    key_path: path.to_owned(),
                    property: (*segment).to_owned(),
                }
            })?;
            let last = index + 1 == segments.len();
            if property.to_many {
                let target = property.target.clone().ok_or_else(|| {
                    CompileError::InvalidKeyPath {
                        key_path: path.to_owned(),
                        property: (*segment).to_owned(),
                    }
                })?;
                let rest = (!last).then(|| segments[index + 1..].join("."));
                return Ok(Resolved::Collection {
                    chain: LinkChain {
                        links,
                        list: property.column,
                        target,
                    },
                    rest,
                });
            }
            if last {
                return Ok(Resolved::Column {
                    target: ColumnTarget {
                        links,
                        column: property.column,
                        ty: property.ty,
                    },
                    link_target: property.target.clone(),
                });
            }
            match (property.ty, property.target.as_deref()) {
                (PropertyType::Object, Some(target)) => {
                    links.push(property.column);
                    current = self.schema_named(target, path)?;
                }
                _ => {
                    return Err(CompileError::InvalidKeyPath {
                        key_path: path.to_owned(),
                        property: (*segment).to_owned(),
                    })
                }
            }
        }
        unreachable!("split yields at least one segment")
    }

    fn resolve_list_chain(&self, path: &str, schema: &ObjectSchema) -> CompileResult<LinkChain> {
        match self.resolve_path(path, schema)? {
            Resolved::Collection { chain, rest: None } => Ok(chain),
            Resolved::Collection {
                rest: Some(rest), ..
            } => Err(CompileError::InvalidKeyPath {
                key_path: path.to_owned(),
                property: rest.split('.').next().unwrap_or(&rest).to_owned(),
            }),
            Resolved::Column { .. } => Err(CompileError::InvalidKeyPath {
                key_path: path.to_owned(),
                property: path.rsplit('.').next().unwrap_or(path).to_owned(),
            }),
        }
    }

    fn schema_named(&self, name: &str, key_path: &str) -> CompileResult<&'a ObjectSchema> {
        self.catalog
            .object_schema(name)
            .ok_or_else(|| CompileError::UnknownProperty {
                key_path: key_path.to_owned(),
                property: name.to_owned(),
            })
    }
}

/// Outcome of resolving a key path against a schema.
enum Resolved {
    /// The path terminates at a scalar or to-one column.
    Column {
        target: ColumnTarget,
        /// Destination schema name when the leaf column is link-valued.
        link_target: Option<String>,
    },
    /// The path reaches a to-many column, possibly with segments left over.
    Collection {
        chain: LinkChain,
        /// Unresolved remainder, compiled inside the element schema.
        rest: Option<String>,
    },
}

fn string_options(options: ComparisonOptions, ty: PropertyType) -> CompileResult<StringOptions> {
    if ty != PropertyType::String {
        // Flags are only meaningful for string comparisons.
        return Ok(StringOptions::default());
    }
    if options.normalized {
        return Err(CompileError::UnsupportedComparisonOption {
            option: "normalized",
        });
    }
    if options.locale_sensitive {
        return Err(CompileError::UnsupportedComparisonOption {
            option: "locale-sensitive",
        });
    }
    Ok(StringOptions {
        case_insensitive: options.case_insensitive,
        diacritic_insensitive: options.diacritic_insensitive,
    })
}

fn check_coercible(
    key_path: &str,
    target: &ColumnTarget,
    link_target: Option<&str>,
    constant: &QueryValue,
) -> CompileResult<()> {
    let compatible = match target.ty {
        PropertyType::Bool | PropertyType::Int => {
            matches!(constant, QueryValue::Bool(_) | QueryValue::Int(_))
        }
        PropertyType::Float | PropertyType::Double => matches!(
            constant,
            QueryValue::Bool(_) | QueryValue::Int(_) | QueryValue::Float(_) | QueryValue::Double(_)
        ),
        PropertyType::Decimal => match constant {
            QueryValue::Bool(_)
            | QueryValue::Int(_)
            | QueryValue::Float(_)
            | QueryValue::Double(_)
            | QueryValue::Decimal(_) => true,
            // Strings coerce to decimal only when they parse as one.
            QueryValue::String(text) => Decimal::from_str(text).is_ok(),
            _ => false,
        },
        PropertyType::String => matches!(constant, QueryValue::String(_)),
        PropertyType::Bytes => matches!(constant, QueryValue::Bytes(_)),
        PropertyType::Timestamp => matches!(constant, QueryValue::Timestamp(_)),
        PropertyType::ObjectId => matches!(constant, QueryValue::ObjectId(_)),
        PropertyType::Object => match constant {
            QueryValue::Link { table, .. } => {
                if let Some(expected) = link_target {
                    if expected != table {
                        return Err(CompileError::TypeMismatch {
                            key_path: key_path.to_owned(),
                            expected: PropertyType::Object,
                            actual: format!("link to {table}"),
                        });
                    }
                }
                true
            }
            _ => false,
        },
    };
    if compatible {
        Ok(())
    } else {
        Err(CompileError::TypeMismatch {
            key_path: key_path.to_owned(),
            expected: target.ty,
            actual: constant.type_name().to_owned(),
        })
    }
}

fn link_key(constant: &QueryValue, expected_table: &str, key_path: &str) -> CompileResult<ObjKey> {
    match constant {
        QueryValue::Link { table, key } if table == expected_table => Ok(*key),
        QueryValue::Link { table, .. } => Err(CompileError::TypeMismatch {
            key_path: key_path.to_owned(),
            expected: PropertyType::Object,
            actual: format!("link to {table}"),
        }),
        other => Err(CompileError::TypeMismatch {
            key_path: key_path.to_owned(),
            expected: PropertyType::Object,
            actual: other.type_name().to_owned(),
        }),
    }
}

fn orderable(ty: PropertyType) -> bool {
    matches!(
        ty,
        PropertyType::Int
            | PropertyType::Float
            | PropertyType::Double
            | PropertyType::Decimal
            | PropertyType::Timestamp
            | PropertyType::ObjectId
    )
}

fn engine_op(op: Operator) -> CompareOp {
    match op {
        Operator::Equal => CompareOp::Equal,
        Operator::NotEqual => CompareOp::NotEqual,
        Operator::LessThan => CompareOp::Less,
        Operator::LessThanOrEqual => CompareOp::LessEqual,
        Operator::GreaterThan => CompareOp::Greater,
        Operator::GreaterThanOrEqual => CompareOp::GreaterEqual,
        Operator::BeginsWith => CompareOp::BeginsWith,
        Operator::EndsWith => CompareOp::EndsWith,
        Operator::Contains => CompareOp::Contains,
        Operator::Like => CompareOp::Like,
        Operator::In | Operator::Matches | Operator::Between => {
            unreachable!("lowered before engine mapping")
        }
    }
}

fn flip_operator(op: Operator) -> CompileResult<Operator> {
    Ok(match op {
        Operator::Equal => Operator::Equal,
        Operator::NotEqual => Operator::NotEqual,
        Operator::LessThan => Operator::GreaterThan,
        Operator::LessThanOrEqual => Operator::GreaterThanOrEqual,
        Operator::GreaterThan => Operator::LessThan,
        Operator::GreaterThanOrEqual => Operator::LessThanOrEqual,
        other => {
            return Err(CompileError::UnsupportedOperator {
                operator: other.name(),
                context: "key path must be on the left-hand side".to_owned(),
            })
        }
    })
}
