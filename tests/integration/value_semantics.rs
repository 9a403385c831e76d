#![allow(clippy::all)]

//! Wire-format and coercion properties of the tagged literal container.

use criba::query::{ObjectId, QueryValue};
use criba::types::ObjKey;
use proptest::prelude::*;
use rust_decimal::Decimal;

#[test]
fn adjacent_tag_layout_is_stable() {
    let json = serde_json::to_value(&QueryValue::Int(5)).expect("serializes");
    assert_eq!(json, serde_json::json!({"t": "Int", "v": 5}));
    let json = serde_json::to_value(&QueryValue::Null).expect("serializes");
    assert_eq!(json, serde_json::json!({"t": "Null"}));
}

#[test]
fn all_variants_round_trip_through_json() {
    let values = vec![
        QueryValue::Null,
        QueryValue::Bool(true),
        QueryValue::Int(-42),
        QueryValue::Float(1.25),
        QueryValue::Double(-0.5),
        QueryValue::String("café".to_owned()),
        QueryValue::Bytes(vec![0, 1, 254]),
        QueryValue::Timestamp(1_577_836_800_000_000_000),
        QueryValue::Decimal(Decimal::new(1275, 2)),
        QueryValue::ObjectId("0123456789abcdef01234567".parse::<ObjectId>().unwrap()),
        QueryValue::link("Dog", ObjKey(7)),
        QueryValue::List(vec![QueryValue::Int(1), QueryValue::String("x".into())]),
    ];
    for value in values {
        let json = serde_json::to_string(&value).expect("serializes");
        let back: QueryValue = serde_json::from_str(&json).expect("deserializes");
        assert_eq!(back, value, "round trip failed for {json}");
    }
}

#[test]
fn timestamps_deserialize_from_strings_too() {
    let back: QueryValue =
        serde_json::from_str(r#"{"t":"Timestamp","v":"170141183460469231731687303715884105727"}"#)
            .expect("string timestamp accepted");
    assert_eq!(back, QueryValue::Timestamp(i128::MAX));
}

proptest! {
    #[test]
    fn ints_survive_the_numeric_coercion_table(v in any::<i64>()) {
        let value = QueryValue::Int(v);
        prop_assert_eq!(value.as_int(), v);
        prop_assert_eq!(value.as_bool(), v != 0);
        prop_assert_eq!(value.as_double(), v as f64);
        prop_assert_eq!(value.as_decimal(), Decimal::from(v));
    }

    #[test]
    fn bools_widen_to_every_numeric_type(v in any::<bool>()) {
        let value = QueryValue::Bool(v);
        prop_assert_eq!(value.as_int(), i64::from(v));
        prop_assert_eq!(value.as_float(), u8::from(v) as f32);
        prop_assert_eq!(value.as_double(), u8::from(v) as f64);
        prop_assert_eq!(value.as_decimal(), Decimal::from(u8::from(v)));
    }

    #[test]
    fn floats_widen_to_double(v in any::<f32>().prop_filter("finite", |f| f.is_finite())) {
        let value = QueryValue::Float(v);
        prop_assert_eq!(value.as_float(), v);
        prop_assert_eq!(value.as_double(), f64::from(v));
    }

    #[test]
    fn list_clones_are_deep(items in proptest::collection::vec(any::<i64>(), 0..8)) {
        let original = QueryValue::List(items.iter().copied().map(QueryValue::Int).collect());
        let mut copy = original.clone();
        if let QueryValue::List(values) = &mut copy {
            values.push(QueryValue::Null);
        }
        if let QueryValue::List(values) = &original {
            prop_assert_eq!(values.len(), items.len());
        }
    }
}
