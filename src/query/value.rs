//! Canonical literal representation carried by predicate expressions.
//!
//! Every constant that appears in a predicate is stored as a [`QueryValue`],
//! a closed tagged container. The compiler inspects the tag to type-check
//! comparisons; engines read payloads through the typed accessors only after
//! that check has passed. The accessors therefore treat a mismatched tag as a
//! caller bug and panic instead of returning an error.

use std::fmt;
use std::str::FromStr;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ObjKey;

/// Typed literal tagged with explicit type information so the wire format
/// remains unambiguous across bindings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum QueryValue {
    /// Null literal.
    Null,
    /// Boolean literal.
    Bool(bool),
    /// Signed 64-bit integer literal.
    Int(i64),
    /// 32-bit floating point literal.
    Float(f32),
    /// 64-bit floating point literal.
    Double(f64),
    /// UTF-8 string literal.
    String(String),
    /// Arbitrary binary payload.
    Bytes(Vec<u8>),
    /// Nanoseconds since Unix epoch in UTC.
    #[serde(deserialize_with = "serde_timestamp::deserialize")]
    Timestamp(i128),
    /// 128-bit decimal literal.
    Decimal(Decimal),
    /// 12-byte object identifier.
    ObjectId(ObjectId),
    /// Link to a row in another table.
    Link {
        /// Table the linked row lives in.
        table: String,
        /// Key of the linked row.
        key: ObjKey,
    },
    /// Ordered sequence of values, used by `IN` and `BETWEEN` constants.
    List(Vec<QueryValue>),
}

/// Discriminant of a non-null [`QueryValue`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ValueKind {
    /// Boolean payload.
    Bool,
    /// Integer payload.
    Int,
    /// 32-bit float payload.
    Float,
    /// 64-bit float payload.
    Double,
    /// String payload.
    String,
    /// Binary payload.
    Bytes,
    /// Timestamp payload.
    Timestamp,
    /// Decimal payload.
    Decimal,
    /// Object id payload.
    ObjectId,
    /// Link payload.
    Link,
    /// Nested value list.
    List,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Double => "double",
            ValueKind::String => "string",
            ValueKind::Bytes => "binary",
            ValueKind::Timestamp => "timestamp",
            ValueKind::Decimal => "decimal",
            ValueKind::ObjectId => "object id",
            ValueKind::Link => "link",
            ValueKind::List => "list",
        })
    }
}

mod serde_timestamp {
    use serde::de::{self, Deserializer, Visitor};
    use std::fmt;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<i128, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct TimestampVisitor;

        impl<'de> Visitor<'de> for TimestampVisitor {
            type Value = i128;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a string or number representing nanoseconds since Unix epoch")
            }

            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(value as i128)
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(value as i128)
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                value
                    .parse::<i128>()
                    .map_err(|err| E::custom(format!("invalid timestamp literal '{value}': {err}")))
            }

            fn visit_string<E>(self, value: String) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                self.visit_str(&value)
            }
        }

        deserializer.deserialize_any(TimestampVisitor)
    }
}

impl QueryValue {
    /// Builds a link literal pointing at `key` in `table`.
    pub fn link(table: impl Into<String>, key: ObjKey) -> Self {
        QueryValue::Link {
            table: table.into(),
            key,
        }
    }

    /// Returns true iff no value was supplied.
    pub fn is_null(&self) -> bool {
        matches!(self, QueryValue::Null)
    }

    /// Returns the active tag.
    ///
    /// # Panics
    ///
    /// Panics if the value is null; null carries no tag.
    pub fn kind(&self) -> ValueKind {
        match self {
            QueryValue::Null => panic!("kind requested from a null value"),
            QueryValue::Bool(_) => ValueKind::Bool,
            QueryValue::Int(_) => ValueKind::Int,
            QueryValue::Float(_) => ValueKind::Float,
            QueryValue::Double(_) => ValueKind::Double,
            QueryValue::String(_) => ValueKind::String,
            QueryValue::Bytes(_) => ValueKind::Bytes,
            QueryValue::Timestamp(_) => ValueKind::Timestamp,
            QueryValue::Decimal(_) => ValueKind::Decimal,
            QueryValue::ObjectId(_) => ValueKind::ObjectId,
            QueryValue::Link { .. } => ValueKind::Link,
            QueryValue::List(_) => ValueKind::List,
        }
    }

    /// Name of the active tag, including `null`, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            QueryValue::Null => "null",
            QueryValue::Bool(_) => "bool",
            QueryValue::Int(_) => "int",
            QueryValue::Float(_) => "float",
            QueryValue::Double(_) => "double",
            QueryValue::String(_) => "string",
            QueryValue::Bytes(_) => "binary",
            QueryValue::Timestamp(_) => "timestamp",
            QueryValue::Decimal(_) => "decimal",
            QueryValue::ObjectId(_) => "object id",
            QueryValue::Link { .. } => "link",
            QueryValue::List(_) => "list",
        }
    }

    /// Integer payload; accepts bool (0/1) and int tags.
    pub fn as_int(&self) -> i64 {
        match self {
            QueryValue::Bool(v) => i64::from(*v),
            QueryValue::Int(v) => *v,
            other => panic!("int requested from {} value", other.type_name()),
        }
    }

    /// Boolean payload; accepts bool and int (nonzero → true) tags.
    pub fn as_bool(&self) -> bool {
        match self {
            QueryValue::Bool(v) => *v,
            QueryValue::Int(v) => *v != 0,
            other => panic!("bool requested from {} value", other.type_name()),
        }
    }

    /// 32-bit float payload; accepts any numeric tag.
    pub fn as_float(&self) -> f32 {
        match self {
            QueryValue::Bool(v) => u8::from(*v) as f32,
            QueryValue::Int(v) => *v as f32,
            QueryValue::Float(v) => *v,
            QueryValue::Double(v) => *v as f32,
            other => panic!("float requested from {} value", other.type_name()),
        }
    }

    /// 64-bit float payload; accepts any numeric tag.
    pub fn as_double(&self) -> f64 {
        match self {
            QueryValue::Bool(v) => u8::from(*v) as f64,
            QueryValue::Int(v) => *v as f64,
            QueryValue::Float(v) => f64::from(*v),
            QueryValue::Double(v) => *v,
            other => panic!("double requested from {} value", other.type_name()),
        }
    }

    /// Decimal payload; accepts numeric tags, parseable strings, and decimal.
    pub fn as_decimal(&self) -> Decimal {
        match self {
            QueryValue::Bool(v) => Decimal::from(i64::from(*v)),
            QueryValue::Int(v) => Decimal::from(*v),
            QueryValue::Float(v) => {
                Decimal::from_f32(*v).expect("float literal representable as decimal")
            }
            QueryValue::Double(v) => {
                Decimal::from_f64(*v).expect("double literal representable as decimal")
            }
            QueryValue::String(v) => {
                Decimal::from_str(v).expect("string literal parseable as decimal")
            }
            QueryValue::Decimal(v) => *v,
            other => panic!("decimal requested from {} value", other.type_name()),
        }
    }

    /// String payload; exact-tag only.
    pub fn as_str(&self) -> &str {
        match self {
            QueryValue::String(v) => v,
            other => panic!("string requested from {} value", other.type_name()),
        }
    }

    /// Binary payload; exact-tag only.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            QueryValue::Bytes(v) => v,
            other => panic!("binary requested from {} value", other.type_name()),
        }
    }

    /// Timestamp payload; exact-tag only.
    pub fn as_timestamp(&self) -> i128 {
        match self {
            QueryValue::Timestamp(v) => *v,
            other => panic!("timestamp requested from {} value", other.type_name()),
        }
    }

    /// Object id payload; exact-tag only.
    pub fn as_object_id(&self) -> ObjectId {
        match self {
            QueryValue::ObjectId(v) => *v,
            other => panic!("object id requested from {} value", other.type_name()),
        }
    }

    /// Link payload; exact-tag only.
    pub fn as_link(&self) -> (&str, ObjKey) {
        match self {
            QueryValue::Link { table, key } => (table, *key),
            other => panic!("link requested from {} value", other.type_name()),
        }
    }

    /// Nested value list; exact-tag only.
    pub fn as_list(&self) -> &[QueryValue] {
        match self {
            QueryValue::List(v) => v,
            other => panic!("list requested from {} value", other.type_name()),
        }
    }
}

impl fmt::Display for QueryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryValue::Null => f.write_str("<null>"),
            QueryValue::Bool(v) => write!(f, "{v}"),
            QueryValue::Int(v) => write!(f, "{v}"),
            QueryValue::Float(v) => write!(f, "{v}"),
            QueryValue::Double(v) => write!(f, "{v}"),
            QueryValue::String(v) => write!(f, "{v}"),
            QueryValue::Bytes(_) => f.write_str("binary"),
            QueryValue::Timestamp(v) => write!(f, "{v}"),
            QueryValue::Decimal(v) => write!(f, "{v}"),
            QueryValue::ObjectId(v) => write!(f, "{v}"),
            QueryValue::Link { table, .. } => write!(f, "{table}"),
            QueryValue::List(_) => f.write_str("array"),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::String(value.to_owned())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::String(value)
    }
}

impl From<bool> for QueryValue {
    fn from(value: bool) -> Self {
        QueryValue::Bool(value)
    }
}

impl From<i32> for QueryValue {
    fn from(value: i32) -> Self {
        QueryValue::Int(i64::from(value))
    }
}

impl From<i64> for QueryValue {
    fn from(value: i64) -> Self {
        QueryValue::Int(value)
    }
}

impl From<f32> for QueryValue {
    fn from(value: f32) -> Self {
        QueryValue::Float(value)
    }
}

impl From<f64> for QueryValue {
    fn from(value: f64) -> Self {
        QueryValue::Double(value)
    }
}

impl From<Vec<u8>> for QueryValue {
    fn from(value: Vec<u8>) -> Self {
        QueryValue::Bytes(value)
    }
}

impl From<&[u8]> for QueryValue {
    fn from(value: &[u8]) -> Self {
        QueryValue::Bytes(value.to_vec())
    }
}

impl From<Decimal> for QueryValue {
    fn from(value: Decimal) -> Self {
        QueryValue::Decimal(value)
    }
}

impl From<ObjectId> for QueryValue {
    fn from(value: ObjectId) -> Self {
        QueryValue::ObjectId(value)
    }
}

impl From<time::OffsetDateTime> for QueryValue {
    fn from(value: time::OffsetDateTime) -> Self {
        QueryValue::Timestamp(value.unix_timestamp_nanos())
    }
}

impl From<Vec<QueryValue>> for QueryValue {
    fn from(value: Vec<QueryValue>) -> Self {
        QueryValue::List(value)
    }
}

/// 12-byte object identifier rendered as 24 hex characters.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct ObjectId(pub [u8; 12]);

/// Error returned when parsing an [`ObjectId`] from text fails.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("object id must be 24 hex characters")]
pub struct ObjectIdParseError;

impl FromStr for ObjectId {
    type Err = ObjectIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 12];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| ObjectIdParseError)?;
        Ok(ObjectId(bytes))
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl Serialize for ObjectId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_sets_expected_tag() {
        assert_eq!(QueryValue::from(true).kind(), ValueKind::Bool);
        assert_eq!(QueryValue::from(7i64).kind(), ValueKind::Int);
        assert_eq!(QueryValue::from(1.5f32).kind(), ValueKind::Float);
        assert_eq!(QueryValue::from(2.5f64).kind(), ValueKind::Double);
        assert_eq!(QueryValue::from("abc").kind(), ValueKind::String);
        assert_eq!(QueryValue::from(vec![1u8, 2]).kind(), ValueKind::Bytes);
        assert_eq!(QueryValue::link("Dog", ObjKey(3)).kind(), ValueKind::Link);
        assert!(QueryValue::Null.is_null());
        assert!(!QueryValue::from(0i64).is_null());
    }

    #[test]
    fn bare_str_promotes_to_string_not_bool() {
        // The original needed explicit overloads so a C string would not decay
        // into a bool; the From impls carry that guarantee here.
        let v: QueryValue = "true".into();
        assert_eq!(v, QueryValue::String("true".to_owned()));
    }

    #[test]
    fn numeric_tags_interconvert() {
        let int = QueryValue::from(3i64);
        assert_eq!(int.as_int(), 3);
        assert!(int.as_bool());
        assert_eq!(int.as_float(), 3.0);
        assert_eq!(int.as_double(), 3.0);
        assert_eq!(int.as_decimal(), Decimal::from(3));

        let flag = QueryValue::from(true);
        assert_eq!(flag.as_int(), 1);
        assert_eq!(flag.as_double(), 1.0);

        let double = QueryValue::from(2.5f64);
        assert_eq!(double.as_float(), 2.5);
    }

    #[test]
    fn decimal_accepts_string_payloads() {
        let v = QueryValue::from("12.75");
        assert_eq!(v.as_decimal(), Decimal::from_str("12.75").unwrap());
    }

    #[test]
    #[should_panic(expected = "int requested from string value")]
    fn int_from_string_is_a_contract_violation() {
        QueryValue::from("12").as_int();
    }

    #[test]
    #[should_panic(expected = "string requested from int value")]
    fn string_accessor_requires_exact_tag() {
        QueryValue::from(12i64).as_str();
    }

    #[test]
    #[should_panic(expected = "kind requested from a null value")]
    fn kind_of_null_is_a_contract_violation() {
        QueryValue::Null.kind();
    }

    #[test]
    fn clone_of_list_is_an_independent_deep_copy() {
        let original = QueryValue::List(vec![
            QueryValue::from(1i64),
            QueryValue::List(vec![QueryValue::from("inner")]),
        ]);
        let mut copy = original.clone();
        assert_eq!(copy, original);
        if let QueryValue::List(items) = &mut copy {
            if let QueryValue::List(inner) = &mut items[1] {
                inner.push(QueryValue::from(9i64));
            }
        }
        assert_ne!(copy, original);
        assert_eq!(original.as_list().len(), 2);
        assert_eq!(original.as_list()[1].as_list().len(), 1);
    }

    #[test]
    fn object_id_round_trips_through_hex() {
        let id: ObjectId = "0123456789abcdef01234567".parse().unwrap();
        assert_eq!(id.to_string(), "0123456789abcdef01234567");
        assert!("not-hex".parse::<ObjectId>().is_err());
        assert!("0123".parse::<ObjectId>().is_err());
    }

    #[test]
    fn offset_datetime_converts_to_epoch_nanos() {
        let dt = time::macros::datetime!(2020-01-01 00:00:00 UTC);
        let v = QueryValue::from(dt);
        assert_eq!(v.as_timestamp(), dt.unix_timestamp_nanos());
    }
}
