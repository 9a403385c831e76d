//! Abstract syntax tree for platform-native boolean filter predicates.
//!
//! Parsing the native filter syntax happens outside this crate; bindings hand
//! over fully built trees. The types here are pure data: exclusively owned,
//! acyclic, and immutable once constructed. [`PredicateExpression`] and
//! [`Predicate`] are mutually recursive through subqueries, which is why the
//! nested nodes are boxed.

use crate::query::value::QueryValue;

/// One operand of a comparison, or a nested construct wrapping further
/// expressions.
#[derive(Clone, Debug)]
pub enum PredicateExpression {
    /// Literal constant.
    Constant(QueryValue),
    /// The object being evaluated (`SELF`).
    EvaluatedObject,
    /// Reference to a named variable, e.g. a subquery's iteration binding.
    Variable(String),
    /// Dot-separated property path read from the evaluated object.
    KeyPath(String),
    /// Function application over an operand expression.
    Function {
        /// Expression the function applies to.
        operand: Box<PredicateExpression>,
        /// Function selector name, e.g. `@count`.
        name: String,
        /// Optional function argument.
        argument: Option<Box<PredicateExpression>>,
    },
    /// Set union of two expression operands.
    UnionSet {
        /// Left operand.
        left: Box<PredicateExpression>,
        /// Right operand.
        right: Box<PredicateExpression>,
    },
    /// Set intersection of two expression operands.
    IntersectSet {
        /// Left operand.
        left: Box<PredicateExpression>,
        /// Right operand.
        right: Box<PredicateExpression>,
    },
    /// Set difference of two expression operands.
    MinusSet {
        /// Left operand.
        left: Box<PredicateExpression>,
        /// Right operand.
        right: Box<PredicateExpression>,
    },
    /// Collection filter: iterates `key_path`, binding each element to
    /// `variable` and keeping elements matching `predicate`.
    Subquery {
        /// Path to the collection being filtered.
        key_path: String,
        /// Name of the per-element binding (without the `$` sigil).
        variable: String,
        /// Predicate applied to each element.
        predicate: Box<Predicate>,
    },
    /// Literal collection of subexpressions, e.g. `{1, 2, 3}`.
    Aggregate(Vec<PredicateExpression>),
    /// Any-key wildcard.
    AnyKey,
    /// Opaque block expression; never compilable.
    Block,
    /// Conditional expression; never compilable.
    Conditional,
}

impl From<QueryValue> for PredicateExpression {
    fn from(value: QueryValue) -> Self {
        PredicateExpression::Constant(value)
    }
}

impl PredicateExpression {
    /// Builds a key-path expression.
    pub fn key_path(path: impl Into<String>) -> Self {
        PredicateExpression::KeyPath(path.into())
    }

    /// Builds a constant expression from any supported literal.
    pub fn constant(value: impl Into<QueryValue>) -> Self {
        PredicateExpression::Constant(value.into())
    }
}

/// Binary comparison operators recognized by the native filter syntax.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Operator {
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `<`
    LessThan,
    /// `<=`
    LessThanOrEqual,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanOrEqual,
    /// String prefix match.
    BeginsWith,
    /// String suffix match.
    EndsWith,
    /// Substring match.
    Contains,
    /// Wildcard match (`?` one character, `*` any run).
    Like,
    /// Membership in a literal collection.
    In,
    /// Regular-expression match.
    Matches,
    /// Closed-range membership against a two-element bounds list.
    Between,
}

impl Operator {
    /// Lower-case operator name used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Operator::Equal => "==",
            Operator::NotEqual => "!=",
            Operator::LessThan => "<",
            Operator::LessThanOrEqual => "<=",
            Operator::GreaterThan => ">",
            Operator::GreaterThanOrEqual => ">=",
            Operator::BeginsWith => "beginswith",
            Operator::EndsWith => "endswith",
            Operator::Contains => "contains",
            Operator::Like => "like",
            Operator::In => "in",
            Operator::Matches => "matches",
            Operator::Between => "between",
        }
    }
}

/// Quantifier applied when a comparison reaches through a to-many
/// relationship.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum Modifier {
    /// Element-wise comparison against a single value; the default.
    #[default]
    Direct,
    /// Every collection element must satisfy the comparison.
    All,
    /// At least one collection element must satisfy the comparison.
    Any,
}

impl Modifier {
    /// Upper-case modifier name used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Modifier::Direct => "DIRECT",
            Modifier::All => "ALL",
            Modifier::Any => "ANY",
        }
    }
}

/// Independently combinable string-comparison flags. Only meaningful for
/// string-valued comparisons.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub struct ComparisonOptions {
    /// `[c]` — ignore letter case.
    pub case_insensitive: bool,
    /// `[d]` — ignore diacritic marks.
    pub diacritic_insensitive: bool,
    /// `[n]` — compare canonically normalized forms.
    pub normalized: bool,
    /// `[l]` — use locale-aware ordering.
    pub locale_sensitive: bool,
}

impl ComparisonOptions {
    /// No flags set.
    pub const NONE: ComparisonOptions = ComparisonOptions {
        case_insensitive: false,
        diacritic_insensitive: false,
        normalized: false,
        locale_sensitive: false,
    };

    /// Only the case-insensitive flag.
    pub fn case_insensitive() -> Self {
        ComparisonOptions {
            case_insensitive: true,
            ..Self::NONE
        }
    }

    /// Only the diacritic-insensitive flag.
    pub fn diacritic_insensitive() -> Self {
        ComparisonOptions {
            diacritic_insensitive: true,
            ..Self::NONE
        }
    }

    /// Union of two flag sets.
    pub fn union(self, other: ComparisonOptions) -> Self {
        ComparisonOptions {
            case_insensitive: self.case_insensitive || other.case_insensitive,
            diacritic_insensitive: self.diacritic_insensitive || other.diacritic_insensitive,
            normalized: self.normalized || other.normalized,
            locale_sensitive: self.locale_sensitive || other.locale_sensitive,
        }
    }
}

/// Boolean connective of a compound predicate.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Connective {
    /// All children must hold.
    And,
    /// At least one child must hold.
    Or,
    /// The single child must not hold.
    Not,
}

impl Connective {
    /// Upper-case connective name used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Connective::And => "AND",
            Connective::Or => "OR",
            Connective::Not => "NOT",
        }
    }
}

/// Leaf comparison node: two expressions joined by an operator, with an
/// optional quantifier and string-comparison flags.
#[derive(Clone, Debug)]
pub struct Comparison {
    /// Left operand.
    pub left: PredicateExpression,
    /// Right operand.
    pub right: PredicateExpression,
    /// Comparison operator.
    pub op: Operator,
    /// Quantifier for to-many traversals.
    pub modifier: Modifier,
    /// String-comparison flags.
    pub options: ComparisonOptions,
}

impl Comparison {
    /// Builds a comparison with the default modifier and no options.
    pub fn new(left: PredicateExpression, op: Operator, right: PredicateExpression) -> Self {
        Comparison {
            left,
            right,
            op,
            modifier: Modifier::Direct,
            options: ComparisonOptions::NONE,
        }
    }

    /// Replaces the quantifier.
    pub fn with_modifier(mut self, modifier: Modifier) -> Self {
        self.modifier = modifier;
        self
    }

    /// Replaces the string-comparison flags.
    pub fn with_options(mut self, options: ComparisonOptions) -> Self {
        self.options = options;
        self
    }
}

/// Top-level boolean predicate tree.
#[derive(Clone, Debug)]
pub enum Predicate {
    /// Matches every object.
    True,
    /// Matches no object.
    False,
    /// Leaf comparison.
    Comparison(Comparison),
    /// Boolean combination of child predicates.
    Compound {
        /// Connective joining the children.
        connective: Connective,
        /// Ordered child predicates; `Not` requires exactly one.
        children: Vec<Predicate>,
    },
    /// Placeholder root kind; never valid as compiler input.
    Base,
}

impl Predicate {
    /// Conjunction of `children`.
    pub fn and(children: Vec<Predicate>) -> Self {
        Predicate::Compound {
            connective: Connective::And,
            children,
        }
    }

    /// Disjunction of `children`.
    pub fn or(children: Vec<Predicate>) -> Self {
        Predicate::Compound {
            connective: Connective::Or,
            children,
        }
    }

    /// Negation of a single child.
    pub fn not(child: Predicate) -> Self {
        Predicate::Compound {
            connective: Connective::Not,
            children: vec![child],
        }
    }

    /// Comparison of `key_path` against a literal with the default modifier.
    pub fn compare(
        key_path: impl Into<String>,
        op: Operator,
        value: impl Into<QueryValue>,
    ) -> Self {
        Predicate::Comparison(Comparison::new(
            PredicateExpression::KeyPath(key_path.into()),
            op,
            PredicateExpression::Constant(value.into()),
        ))
    }
}

impl From<Comparison> for Predicate {
    fn from(value: Comparison) -> Self {
        Predicate::Comparison(value)
    }
}
