//! Schema descriptions bridging property names to engine column identifiers.
//!
//! The compiler never talks to storage directly: it resolves each key-path
//! segment against an [`ObjectSchema`] obtained from a [`SchemaCatalog`],
//! yielding the column identifier and declared type the engine expects.

use std::collections::HashMap;
use std::fmt;

use crate::types::ColumnId;

/// Declared type of a schema property.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum PropertyType {
    /// Boolean column.
    Bool,
    /// 64-bit integer column.
    Int,
    /// 32-bit float column.
    Float,
    /// 64-bit float column.
    Double,
    /// UTF-8 string column.
    String,
    /// Binary column.
    Bytes,
    /// Timestamp column (epoch nanoseconds).
    Timestamp,
    /// 128-bit decimal column.
    Decimal,
    /// Object id column.
    ObjectId,
    /// Link-valued column; `Property::target` names the destination schema.
    Object,
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PropertyType::Bool => "bool",
            PropertyType::Int => "int",
            PropertyType::Float => "float",
            PropertyType::Double => "double",
            PropertyType::String => "string",
            PropertyType::Bytes => "binary",
            PropertyType::Timestamp => "timestamp",
            PropertyType::Decimal => "decimal",
            PropertyType::ObjectId => "object id",
            PropertyType::Object => "object",
        })
    }
}

/// One named, typed property of an object schema.
#[derive(Clone, Debug)]
pub struct Property {
    /// Property name as written in key paths.
    pub name: String,
    /// Resolved engine column.
    pub column: ColumnId,
    /// Declared type.
    pub ty: PropertyType,
    /// Destination schema name for `Object` properties.
    pub target: Option<String>,
    /// True when the property holds a collection of links.
    pub to_many: bool,
}

impl Property {
    /// Scalar (non-relationship) property.
    pub fn scalar(name: impl Into<String>, column: ColumnId, ty: PropertyType) -> Self {
        Property {
            name: name.into(),
            column,
            ty,
            target: None,
            to_many: false,
        }
    }

    /// Single link to an object of schema `target`.
    pub fn to_one(name: impl Into<String>, column: ColumnId, target: impl Into<String>) -> Self {
        Property {
            name: name.into(),
            column,
            ty: PropertyType::Object,
            target: Some(target.into()),
            to_many: false,
        }
    }

    /// Collection of links to objects of schema `target`.
    pub fn to_many(name: impl Into<String>, column: ColumnId, target: impl Into<String>) -> Self {
        Property {
            name: name.into(),
            column,
            ty: PropertyType::Object,
            target: Some(target.into()),
            to_many: true,
        }
    }
}

/// Ordered set of named, typed properties describing one object type.
#[derive(Clone, Debug, Default)]
pub struct ObjectSchema {
    /// Schema (table) name.
    pub name: String,
    properties: Vec<Property>,
}

impl ObjectSchema {
    /// Creates an empty schema named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        ObjectSchema {
            name: name.into(),
            properties: Vec::new(),
        }
    }

    /// Appends a property, builder style.
    pub fn with_property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    /// Looks up a property by name.
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Returns the ordered property list.
    pub fn properties(&self) -> &[Property] {
        &self.properties
    }
}

/// Resolves schema names for the compiler when key paths cross relationships.
pub trait SchemaCatalog {
    /// Looks up the schema declared under `name`.
    fn object_schema(&self, name: &str) -> Option<&ObjectSchema>;
}

/// Simple in-memory catalog used for tests or prototyping.
#[derive(Clone, Debug, Default)]
pub struct InMemoryCatalog {
    schemas: HashMap<String, ObjectSchema>,
}

impl InMemoryCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a schema under its own name.
    pub fn with_schema(mut self, schema: ObjectSchema) -> Self {
        self.schemas.insert(schema.name.clone(), schema);
        self
    }
}

impl SchemaCatalog for InMemoryCatalog {
    fn object_schema(&self, name: &str) -> Option<&ObjectSchema> {
        self.schemas.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_lookup_by_name() {
        let schema = ObjectSchema::new("Person")
            .with_property(Property::scalar("age", ColumnId(0), PropertyType::Int))
            .with_property(Property::to_many("pets", ColumnId(1), "Dog"));
        let age = schema.property("age").expect("age resolves");
        assert_eq!(age.column, ColumnId(0));
        assert_eq!(age.ty, PropertyType::Int);
        assert!(!age.to_many);
        let pets = schema.property("pets").expect("pets resolves");
        assert!(pets.to_many);
        assert_eq!(pets.target.as_deref(), Some("Dog"));
        assert!(schema.property("missing").is_none());
    }

    #[test]
    fn catalog_resolves_registered_schemas() {
        let catalog = InMemoryCatalog::new()
            .with_schema(ObjectSchema::new("Person"))
            .with_schema(ObjectSchema::new("Dog"));
        assert!(catalog.object_schema("Person").is_some());
        assert!(catalog.object_schema("Cat").is_none());
    }
}
