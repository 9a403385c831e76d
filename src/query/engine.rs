//! Query-engine surface consumed by the compiler, plus an in-memory
//! reference engine.
//!
//! The compiler hands engines fully resolved column identifiers and
//! type-checked literals; an engine only assembles terms. [`MemoryEngine`]
//! builds an evaluable term tree so compiled queries can be executed against
//! a [`MemoryStore`] in tests and prototypes; production bindings implement
//! the same trait over their native query objects.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use crate::query::errors::CompileResult;
use crate::query::schema::PropertyType;
use crate::query::value::QueryValue;
use crate::types::{ColumnId, ObjKey};

/// Engine-level comparison operators. `IN` and `BETWEEN` never reach an
/// engine; the compiler lowers them to disjunctions and range conjunctions.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CompareOp {
    /// Payload equality.
    Equal,
    /// Payload inequality.
    NotEqual,
    /// Strictly less than.
    Less,
    /// Less than or equal.
    LessEqual,
    /// Strictly greater than.
    Greater,
    /// Greater than or equal.
    GreaterEqual,
    /// String prefix match.
    BeginsWith,
    /// String suffix match.
    EndsWith,
    /// Substring match.
    Contains,
    /// Wildcard match (`?` one character, `*` any run).
    Like,
}

/// String-comparison flags forwarded to the engine. Only case and diacritic
/// sensitivity exist at this level.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub struct StringOptions {
    /// Fold letter case before comparing.
    pub case_insensitive: bool,
    /// Strip diacritic marks before comparing.
    pub diacritic_insensitive: bool,
}

/// Fully resolved comparison target: zero or more to-one hops followed by
/// the leaf column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnTarget {
    /// To-one link columns traversed in order.
    pub links: Vec<ColumnId>,
    /// Leaf column the comparison applies to.
    pub column: ColumnId,
    /// Declared type of the leaf column.
    pub ty: PropertyType,
}

/// Fully resolved path to a to-many column: to-one hops, then the list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkChain {
    /// To-one link columns traversed in order.
    pub links: Vec<ColumnId>,
    /// The to-many column holding the element links.
    pub list: ColumnId,
    /// Schema name of the collection elements.
    pub target: String,
}

/// Quantifier over a to-many collection.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Quantifier {
    /// At least one element must match.
    Any,
    /// Every element must match (vacuously true for empty collections).
    All,
}

/// Factory surface a query engine exposes to the compiler.
///
/// Implementations receive already-resolved columns and already-type-checked
/// literals; they may still reject combinations they have no primitive for.
pub trait QueryEngine {
    /// Engine-native query term.
    type Query;

    /// Term matching every row.
    fn true_query(&mut self) -> Self::Query;
    /// Term matching no row.
    fn false_query(&mut self) -> Self::Query;
    /// Conjunction of child terms, in order.
    fn and(&mut self, children: Vec<Self::Query>) -> Self::Query;
    /// Disjunction of child terms, in order.
    fn or(&mut self, children: Vec<Self::Query>) -> Self::Query;
    /// Negation of a single term.
    fn not(&mut self, child: Self::Query) -> Self::Query;
    /// Typed comparison of a column against a literal.
    fn compare(
        &mut self,
        target: &ColumnTarget,
        op: CompareOp,
        literal: &QueryValue,
        strings: StringOptions,
    ) -> CompileResult<Self::Query>;
    /// Null / non-null test on a column.
    fn compare_null(&mut self, target: &ColumnTarget, equal: bool) -> Self::Query;
    /// Row-identity comparison after following `links`.
    fn key_compare(&mut self, links: &[ColumnId], equal: bool, key: ObjKey) -> Self::Query;
    /// Existential or universal quantification of `inner` over a collection.
    fn quantify(
        &mut self,
        over: &LinkChain,
        quantifier: Quantifier,
        inner: Self::Query,
    ) -> Self::Query;
    /// Comparison of the number of collection elements matching `inner`.
    fn count_compare(
        &mut self,
        over: &LinkChain,
        inner: Self::Query,
        op: CompareOp,
        count: i64,
    ) -> CompileResult<Self::Query>;
}

/// Reference engine producing evaluable [`MemoryQuery`] terms. Used by the
/// test suites and as a template for real engine bindings.
#[derive(Clone, Debug, Default)]
pub struct MemoryEngine;

impl MemoryEngine {
    /// Creates the engine.
    pub fn new() -> Self {
        MemoryEngine
    }
}

/// Evaluable query term built by [`MemoryEngine`].
#[derive(Clone, Debug, PartialEq)]
pub enum MemoryQuery {
    /// Matches every row.
    True,
    /// Matches no row.
    False,
    /// All children match.
    And(Vec<MemoryQuery>),
    /// Any child matches.
    Or(Vec<MemoryQuery>),
    /// Child does not match.
    Not(Box<MemoryQuery>),
    /// Typed column comparison.
    Compare {
        /// Resolved comparison target.
        target: ColumnTarget,
        /// Engine operator.
        op: CompareOp,
        /// Type-checked literal.
        literal: QueryValue,
        /// String flags.
        strings: StringOptions,
    },
    /// Null test on a column.
    CompareNull {
        /// Resolved comparison target.
        target: ColumnTarget,
        /// True for `== nil`, false for `!= nil`.
        equal: bool,
    },
    /// Row-identity comparison.
    KeyCompare {
        /// To-one hops before the identity test.
        links: Vec<ColumnId>,
        /// True for equality, false for inequality.
        equal: bool,
        /// Expected row key.
        key: ObjKey,
    },
    /// Quantified term over a collection.
    Quantified {
        /// Path to the collection.
        over: LinkChain,
        /// Any or all.
        quantifier: Quantifier,
        /// Term evaluated per element.
        inner: Box<MemoryQuery>,
    },
    /// Count of matching collection elements compared against a constant.
    CountCompare {
        /// Path to the collection.
        over: LinkChain,
        /// Term evaluated per element.
        inner: Box<MemoryQuery>,
        /// Relational operator applied to the count.
        op: CompareOp,
        /// Constant the count is compared against.
        count: i64,
    },
}

impl QueryEngine for MemoryEngine {
    type Query = MemoryQuery;

    fn true_query(&mut self) -> MemoryQuery {
        MemoryQuery::True
    }

    fn false_query(&mut self) -> MemoryQuery {
        MemoryQuery::False
    }

    fn and(&mut self, children: Vec<MemoryQuery>) -> MemoryQuery {
        MemoryQuery::And(children)
    }

    fn or(&mut self, children: Vec<MemoryQuery>) -> MemoryQuery {
        MemoryQuery::Or(children)
    }

    fn not(&mut self, child: MemoryQuery) -> MemoryQuery {
        MemoryQuery::Not(Box::new(child))
    }

    fn compare(
        &mut self,
        target: &ColumnTarget,
        op: CompareOp,
        literal: &QueryValue,
        strings: StringOptions,
    ) -> CompileResult<MemoryQuery> {
        Ok(MemoryQuery::Compare {
            target: target.clone(),
            op,
            literal: literal.clone(),
            strings,
        })
    }

    fn compare_null(&mut self, target: &ColumnTarget, equal: bool) -> MemoryQuery {
        MemoryQuery::CompareNull {
            target: target.clone(),
            equal,
        }
    }

    fn key_compare(&mut self, links: &[ColumnId], equal: bool, key: ObjKey) -> MemoryQuery {
        MemoryQuery::KeyCompare {
            links: links.to_vec(),
            equal,
            key,
        }
    }

    fn quantify(
        &mut self,
        over: &LinkChain,
        quantifier: Quantifier,
        inner: MemoryQuery,
    ) -> MemoryQuery {
        MemoryQuery::Quantified {
            over: over.clone(),
            quantifier,
            inner: Box::new(inner),
        }
    }

    fn count_compare(
        &mut self,
        over: &LinkChain,
        inner: MemoryQuery,
        op: CompareOp,
        count: i64,
    ) -> CompileResult<MemoryQuery> {
        Ok(MemoryQuery::CountCompare {
            over: over.clone(),
            inner: Box::new(inner),
            op,
            count,
        })
    }
}

/// One stored row: column → cell. Link cells use [`QueryValue::Link`],
/// to-many cells a [`QueryValue::List`] of links.
pub type Row = BTreeMap<ColumnId, QueryValue>;

/// Tiny multi-table object store backing [`MemoryQuery`] evaluation.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    tables: HashMap<String, BTreeMap<ObjKey, Row>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts (or replaces) a row.
    pub fn insert_row(
        &mut self,
        table: impl Into<String>,
        key: ObjKey,
        cells: Vec<(ColumnId, QueryValue)>,
    ) {
        self.tables
            .entry(table.into())
            .or_default()
            .insert(key, cells.into_iter().collect());
    }

    fn row(&self, table: &str, key: ObjKey) -> Option<&Row> {
        self.tables.get(table)?.get(&key)
    }

    fn keys(&self, table: &str) -> Vec<ObjKey> {
        self.tables
            .get(table)
            .map(|rows| rows.keys().copied().collect())
            .unwrap_or_default()
    }
}

impl MemoryQuery {
    /// Runs the query over every row of `table`, returning matching keys in
    /// ascending order.
    pub fn run(&self, store: &MemoryStore, table: &str) -> Vec<ObjKey> {
        store
            .keys(table)
            .into_iter()
            .filter(|key| self.matches(store, table, *key))
            .collect()
    }

    /// Evaluates the query against a single row.
    pub fn matches(&self, store: &MemoryStore, table: &str, key: ObjKey) -> bool {
        match self {
            MemoryQuery::True => true,
            MemoryQuery::False => false,
            MemoryQuery::And(children) => {
                children.iter().all(|c| c.matches(store, table, key))
            }
            MemoryQuery::Or(children) => {
                children.iter().any(|c| c.matches(store, table, key))
            }
            MemoryQuery::Not(child) => !child.matches(store, table, key),
            MemoryQuery::Compare {
                target,
                op,
                literal,
                strings,
            } => read_cell(store, table, key, &target.links, target.column)
                .map(|cell| compare_cell(cell, target.ty, *op, literal, *strings))
                .unwrap_or(false),
            MemoryQuery::CompareNull { target, equal } => {
                match follow_links(store, table, key, &target.links) {
                    Some((t, k)) => {
                        let is_null = store
                            .row(t, k)
                            .and_then(|row| row.get(&target.column))
                            .map(QueryValue::is_null)
                            .unwrap_or(true);
                        is_null == *equal
                    }
                    // Broken link chain: the column is unreachable, not null.
                    None => false,
                }
            }
            MemoryQuery::KeyCompare {
                links,
                equal,
                key: expected,
            } => follow_links(store, table, key, links)
                .map(|(_, k)| (k == *expected) == *equal)
                .unwrap_or(false),
            MemoryQuery::Quantified {
                over,
                quantifier,
                inner,
            } => {
                let elements = list_elements(store, table, key, over);
                match quantifier {
                    Quantifier::Any => elements
                        .iter()
                        .any(|k| inner.matches(store, &over.target, *k)),
                    Quantifier::All => elements
                        .iter()
                        .all(|k| inner.matches(store, &over.target, *k)),
                }
            }
            MemoryQuery::CountCompare {
                over,
                inner,
                op,
                count,
            } => {
                let matching = list_elements(store, table, key, over)
                    .iter()
                    .filter(|k| inner.matches(store, &over.target, **k))
                    .count() as i64;
                ordering_matches(*op, matching.cmp(count))
            }
        }
    }
}

fn follow_links<'s>(
    store: &'s MemoryStore,
    table: &'s str,
    key: ObjKey,
    links: &[ColumnId],
) -> Option<(&'s str, ObjKey)> {
    let mut table = table;
    let mut key = key;
    for column in links {
        let row = store.row(table, key)?;
        match row.get(column) {
            Some(QueryValue::Link { table: t, key: k }) => {
                table = t;
                key = *k;
            }
            _ => return None,
        }
    }
    Some((table, key))
}

fn read_cell<'s>(
    store: &'s MemoryStore,
    table: &str,
    key: ObjKey,
    links: &[ColumnId],
    column: ColumnId,
) -> Option<&'s QueryValue> {
    let (table, key) = follow_links(store, table, key, links)?;
    let cell = store.row(table, key)?.get(&column)?;
    if cell.is_null() {
        return None;
    }
    Some(cell)
}

fn list_elements(store: &MemoryStore, table: &str, key: ObjKey, over: &LinkChain) -> Vec<ObjKey> {
    let Some((table, key)) = follow_links(store, table, key, &over.links) else {
        return Vec::new();
    };
    let Some(row) = store.row(table, key) else {
        return Vec::new();
    };
    match row.get(&over.list) {
        Some(QueryValue::List(items)) => items
            .iter()
            .filter_map(|item| match item {
                QueryValue::Link { key, .. } => Some(*key),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn compare_cell(
    cell: &QueryValue,
    ty: PropertyType,
    op: CompareOp,
    literal: &QueryValue,
    strings: StringOptions,
) -> bool {
    match ty {
        PropertyType::Bool => {
            let matched = cell.as_bool() == literal.as_bool();
            match op {
                CompareOp::Equal => matched,
                CompareOp::NotEqual => !matched,
                _ => false,
            }
        }
        PropertyType::Int => ordering_matches(op, cell.as_int().cmp(&literal.as_int())),
        PropertyType::Float => partial_ordering_matches(
            op,
            cell.as_float().partial_cmp(&literal.as_float()),
        ),
        PropertyType::Double => partial_ordering_matches(
            op,
            cell.as_double().partial_cmp(&literal.as_double()),
        ),
        PropertyType::Decimal => {
            ordering_matches(op, cell.as_decimal().cmp(&literal.as_decimal()))
        }
        PropertyType::Timestamp => {
            ordering_matches(op, cell.as_timestamp().cmp(&literal.as_timestamp()))
        }
        PropertyType::ObjectId => {
            ordering_matches(op, cell.as_object_id().cmp(&literal.as_object_id()))
        }
        PropertyType::Bytes => {
            let matched = cell.as_bytes() == literal.as_bytes();
            match op {
                CompareOp::Equal => matched,
                CompareOp::NotEqual => !matched,
                _ => false,
            }
        }
        PropertyType::Object => {
            let matched = cell.as_link() == literal.as_link();
            match op {
                CompareOp::Equal => matched,
                CompareOp::NotEqual => !matched,
                _ => false,
            }
        }
        PropertyType::String => {
            let cell = fold(cell.as_str(), strings);
            let literal = fold(literal.as_str(), strings);
            match op {
                CompareOp::Equal => cell == literal,
                CompareOp::NotEqual => cell != literal,
                CompareOp::BeginsWith => cell.starts_with(&literal),
                CompareOp::EndsWith => cell.ends_with(&literal),
                CompareOp::Contains => cell.contains(&literal),
                CompareOp::Like => like_match(&literal, &cell),
                _ => false,
            }
        }
    }
}

fn ordering_matches(op: CompareOp, ordering: Ordering) -> bool {
    match op {
        CompareOp::Equal => ordering == Ordering::Equal,
        CompareOp::NotEqual => ordering != Ordering::Equal,
        CompareOp::Less => ordering == Ordering::Less,
        CompareOp::LessEqual => ordering != Ordering::Greater,
        CompareOp::Greater => ordering == Ordering::Greater,
        CompareOp::GreaterEqual => ordering != Ordering::Less,
        _ => false,
    }
}

fn partial_ordering_matches(op: CompareOp, ordering: Option<Ordering>) -> bool {
    match ordering {
        Some(ordering) => ordering_matches(op, ordering),
        // NaN on either side: unequal to everything, unordered otherwise.
        None => op == CompareOp::NotEqual,
    }
}

fn fold(text: &str, strings: StringOptions) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        let ch = if strings.diacritic_insensitive {
            strip_diacritic(ch)
        } else {
            ch
        };
        if strings.case_insensitive {
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

// Latin-1 fold; enough for the reference engine.
fn strip_diacritic(ch: char) -> char {
    match ch {
        'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' => 'a',
        'Á' | 'À' | 'Â' | 'Ä' | 'Ã' | 'Å' => 'A',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'É' | 'È' | 'Ê' | 'Ë' => 'E',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
        'ó' | 'ò' | 'ô' | 'ö' | 'õ' => 'o',
        'Ó' | 'Ò' | 'Ô' | 'Ö' | 'Õ' => 'O',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
        'ç' => 'c',
        'Ç' => 'C',
        'ñ' => 'n',
        'Ñ' => 'N',
        other => other,
    }
}

fn like_match(pattern: &str, text: &str) -> bool {
    fn inner(pattern: &[char], text: &[char]) -> bool {
        match pattern.split_first() {
            None => text.is_empty(),
            Some(('*', rest)) => {
                (0..=text.len()).any(|skip| inner(rest, &text[skip..]))
            }
            Some(('?', rest)) => match text.split_first() {
                Some((_, text_rest)) => inner(rest, text_rest),
                None => false,
            },
            Some((ch, rest)) => match text.split_first() {
                Some((t, text_rest)) => ch == t && inner(rest, text_rest),
                None => false,
            },
        }
    }
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    inner(&pattern, &text)
}
