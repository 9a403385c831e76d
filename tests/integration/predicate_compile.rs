#![allow(clippy::all)]

//! End-to-end checks: build predicates, compile them against a catalog, and
//! run the resulting queries over an in-memory store.

use criba::query::engine::{MemoryEngine, MemoryQuery, MemoryStore};
use criba::query::schema::{InMemoryCatalog, ObjectSchema, Property, PropertyType, SchemaCatalog};
use criba::query::{
    compile, Comparison, ComparisonOptions, CompileResult, Modifier, Operator, Predicate,
    PredicateExpression, QueryValue,
};
use criba::types::{ColumnId, ObjKey};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn catalog() -> InMemoryCatalog {
    InMemoryCatalog::new()
        .with_schema(
            ObjectSchema::new("Person")
                .with_property(Property::scalar("age", ColumnId(0), PropertyType::Int))
                .with_property(Property::scalar("name", ColumnId(1), PropertyType::String))
                .with_property(Property::scalar("balance", ColumnId(2), PropertyType::Double))
                .with_property(Property::to_one("dog", ColumnId(3), "Dog"))
                .with_property(Property::to_many("pets", ColumnId(4), "Dog")),
        )
        .with_schema(
            ObjectSchema::new("Dog")
                .with_property(Property::scalar("name", ColumnId(0), PropertyType::String))
                .with_property(Property::scalar("age", ColumnId(1), PropertyType::Int)),
        )
}

fn store() -> MemoryStore {
    let mut store = MemoryStore::new();
    store.insert_row(
        "Dog",
        ObjKey(10),
        vec![(ColumnId(0), "Rex".into()), (ColumnId(1), 3i64.into())],
    );
    store.insert_row(
        "Dog",
        ObjKey(11),
        vec![(ColumnId(0), "Fido".into()), (ColumnId(1), 7i64.into())],
    );
    store.insert_row(
        "Dog",
        ObjKey(12),
        vec![(ColumnId(0), "Ángel".into()), (ColumnId(1), 9i64.into())],
    );
    store.insert_row(
        "Person",
        ObjKey(1),
        vec![
            (ColumnId(0), 36i64.into()),
            (ColumnId(1), "Ada".into()),
            (ColumnId(2), 120.5f64.into()),
            (ColumnId(3), QueryValue::link("Dog", ObjKey(10))),
            (
                ColumnId(4),
                QueryValue::List(vec![
                    QueryValue::link("Dog", ObjKey(10)),
                    QueryValue::link("Dog", ObjKey(11)),
                ]),
            ),
        ],
    );
    store.insert_row(
        "Person",
        ObjKey(2),
        vec![
            (ColumnId(0), 25i64.into()),
            (ColumnId(1), "Grace".into()),
            (ColumnId(2), 40.0f64.into()),
            (ColumnId(4), QueryValue::List(vec![])),
        ],
    );
    store.insert_row(
        "Person",
        ObjKey(3),
        vec![
            (ColumnId(0), 41i64.into()),
            (ColumnId(1), "José".into()),
            (ColumnId(2), 9.75f64.into()),
            (ColumnId(3), QueryValue::link("Dog", ObjKey(12))),
            (
                ColumnId(4),
                QueryValue::List(vec![QueryValue::link("Dog", ObjKey(12))]),
            ),
        ],
    );
    store
}

fn compile_person(predicate: &Predicate) -> CompileResult<MemoryQuery> {
    let catalog = catalog();
    let schema = catalog.object_schema("Person").expect("registered").clone();
    let mut engine = MemoryEngine::new();
    compile(predicate, &schema, &catalog, &mut engine)
}

fn run(predicate: &Predicate) -> Vec<ObjKey> {
    let query = compile_person(predicate).expect("predicate compiles");
    query.run(&store(), "Person")
}

#[test]
fn compound_truth_table() {
    init_tracing();
    assert!(run(&Predicate::and(vec![Predicate::True, Predicate::False])).is_empty());
    assert_eq!(
        run(&Predicate::or(vec![Predicate::True, Predicate::False])),
        vec![ObjKey(1), ObjKey(2), ObjKey(3)]
    );
    assert!(run(&Predicate::not(Predicate::True)).is_empty());
}

#[test]
fn integer_comparison_filters_rows() {
    assert_eq!(
        run(&Predicate::compare("age", Operator::GreaterThan, 30i64)),
        vec![ObjKey(1), ObjKey(3)]
    );
    assert_eq!(
        run(&Predicate::not(Predicate::compare(
            "age",
            Operator::GreaterThan,
            30i64
        ))),
        vec![ObjKey(2)]
    );
}

#[test]
fn conjunction_narrows_the_match_set() {
    let predicate = Predicate::and(vec![
        Predicate::compare("age", Operator::GreaterThan, 30i64),
        Predicate::compare("name", Operator::BeginsWith, "A"),
    ]);
    assert_eq!(run(&predicate), vec![ObjKey(1)]);
}

#[test]
fn between_matches_the_closed_range() {
    let bounds = QueryValue::List(vec![26i64.into(), 40i64.into()]);
    assert_eq!(
        run(&Predicate::compare("age", Operator::Between, bounds)),
        vec![ObjKey(1)]
    );
    let everyone = QueryValue::List(vec![18i64.into(), 65i64.into()]);
    assert_eq!(
        run(&Predicate::compare("age", Operator::Between, everyone)),
        vec![ObjKey(1), ObjKey(2), ObjKey(3)]
    );
}

#[test]
fn in_matches_the_same_rows_as_a_disjunction() {
    let values = QueryValue::List(vec!["Ada".into(), "Grace".into()]);
    let via_in = run(&Predicate::compare("name", Operator::In, values));
    let via_or = run(&Predicate::or(vec![
        Predicate::compare("name", Operator::Equal, "Ada"),
        Predicate::compare("name", Operator::Equal, "Grace"),
    ]));
    assert_eq!(via_in, via_or);
    assert_eq!(via_in, vec![ObjKey(1), ObjKey(2)]);
}

#[test]
fn any_quantifier_is_existential() {
    let cmp = Comparison::new(
        PredicateExpression::key_path("pets.age"),
        Operator::GreaterThan,
        PredicateExpression::constant(5i64),
    )
    .with_modifier(Modifier::Any);
    assert_eq!(run(&cmp.into()), vec![ObjKey(1), ObjKey(3)]);
}

#[test]
fn all_quantifier_is_universal_and_vacuously_true() {
    let cmp = Comparison::new(
        PredicateExpression::key_path("pets.age"),
        Operator::GreaterThan,
        PredicateExpression::constant(5i64),
    )
    .with_modifier(Modifier::All);
    // Rex (age 3) fails for person 1; person 2 has no pets at all.
    assert_eq!(run(&cmp.into()), vec![ObjKey(2), ObjKey(3)]);
}

#[test]
fn string_flags_fold_case_and_diacritics() {
    let cmp = Comparison::new(
        PredicateExpression::key_path("name"),
        Operator::Equal,
        PredicateExpression::constant("ada"),
    )
    .with_options(ComparisonOptions::case_insensitive());
    assert_eq!(run(&cmp.into()), vec![ObjKey(1)]);

    let cmp = Comparison::new(
        PredicateExpression::key_path("pets.name"),
        Operator::Equal,
        PredicateExpression::constant("angel"),
    )
    .with_modifier(Modifier::Any)
    .with_options(
        ComparisonOptions::case_insensitive().union(ComparisonOptions::diacritic_insensitive()),
    );
    assert_eq!(run(&cmp.into()), vec![ObjKey(3)]);
}

#[test]
fn link_comparisons_match_by_row_identity() {
    assert_eq!(
        run(&Predicate::compare(
            "dog",
            Operator::Equal,
            QueryValue::link("Dog", ObjKey(10))
        )),
        vec![ObjKey(1)]
    );
    assert_eq!(
        run(&Predicate::compare("dog", Operator::Equal, QueryValue::Null)),
        vec![ObjKey(2)]
    );
}

#[test]
fn leaf_collection_membership() {
    let cmp = Comparison::new(
        PredicateExpression::key_path("pets"),
        Operator::Equal,
        PredicateExpression::constant(QueryValue::link("Dog", ObjKey(11))),
    )
    .with_modifier(Modifier::Any);
    assert_eq!(run(&cmp.into()), vec![ObjKey(1)]);
}

#[test]
fn subquery_count_comparison() {
    let subquery = PredicateExpression::Subquery {
        key_path: "pets".to_owned(),
        variable: "x".to_owned(),
        predicate: Box::new(Predicate::compare("age", Operator::GreaterThan, 5i64)),
    };
    let count = PredicateExpression::Function {
        operand: Box::new(subquery),
        name: "@count".to_owned(),
        argument: None,
    };
    let cmp = Comparison::new(
        count,
        Operator::GreaterThanOrEqual,
        PredicateExpression::constant(1i64),
    );
    // Persons 1 (Fido, 7) and 3 (Ángel, 9) each have one old-enough pet.
    assert_eq!(run(&cmp.into()), vec![ObjKey(1), ObjKey(3)]);
}

#[test]
fn double_column_accepts_integer_literals() {
    assert_eq!(
        run(&Predicate::compare("balance", Operator::LessThan, 10i64)),
        vec![ObjKey(3)]
    );
}

#[test]
fn compilation_is_idempotent_over_the_same_dataset() {
    let predicate = Predicate::and(vec![
        Predicate::compare("age", Operator::GreaterThan, 24i64),
        Predicate::or(vec![
            Predicate::compare("name", Operator::Contains, "a"),
            Predicate::compare("name", Operator::EndsWith, "é"),
        ]),
    ]);
    let store = store();
    let first = compile_person(&predicate).expect("first compile");
    let second = compile_person(&predicate).expect("second compile");
    assert_eq!(first.run(&store, "Person"), second.run(&store, "Person"));
}

#[test]
fn errors_surface_context_for_diagnostics() {
    let err = compile_person(&Predicate::compare("shoe_size", Operator::Equal, 44i64))
        .expect_err("unknown property must fail");
    assert_eq!(err.code(), "UnknownProperty");
    assert!(err.to_string().contains("shoe_size"));

    let cmp = Comparison::new(
        PredicateExpression::key_path("pets.name"),
        Operator::Equal,
        PredicateExpression::constant("Rex"),
    );
    let err = compile_person(&cmp.into()).expect_err("DIRECT through collection must fail");
    assert_eq!(err.code(), "InvalidModifierPlacement");
    assert!(err.to_string().contains("pets.name"));
}
