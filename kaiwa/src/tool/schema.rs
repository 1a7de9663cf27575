//! Parameter schemas and tool descriptors.
//!
//! [`Schema`] is the small JSON-schema subset tools describe their
//! parameters with; [`ToolDescriptor`] binds a unique name and description
//! to one.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The value type a schema node accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    /// A JSON object.
    Object,
    /// A JSON array.
    Array,
    /// A string.
    String,
    /// A boolean.
    Boolean,
    /// A floating-point number.
    Number,
    /// An integer.
    Integer,
}

/// A parameter schema node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// The accepted value type.
    #[serde(rename = "type")]
    pub kind: SchemaType,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Named sub-schemas, for objects.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, Schema>>,
    /// Names of required properties, for objects.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    /// Element schema, for arrays.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
}

impl Schema {
    const fn of(kind: SchemaType) -> Self {
        Self {
            kind,
            description: None,
            properties: None,
            required: None,
            items: None,
        }
    }

    /// An object schema with no properties yet.
    #[must_use]
    pub const fn object() -> Self {
        Self::of(SchemaType::Object)
    }

    /// A string schema.
    #[must_use]
    pub const fn string() -> Self {
        Self::of(SchemaType::String)
    }

    /// A boolean schema.
    #[must_use]
    pub const fn boolean() -> Self {
        Self::of(SchemaType::Boolean)
    }

    /// A number schema.
    #[must_use]
    pub const fn number() -> Self {
        Self::of(SchemaType::Number)
    }

    /// An integer schema.
    #[must_use]
    pub const fn integer() -> Self {
        Self::of(SchemaType::Integer)
    }

    /// An array schema with the given element schema.
    #[must_use]
    pub fn array(items: Self) -> Self {
        let mut schema = Self::of(SchemaType::Array);
        schema.items = Some(Box::new(items));
        schema
    }

    /// Attach a description.
    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a named property (objects only; ignored otherwise).
    #[must_use]
    pub fn property(mut self, name: impl Into<String>, schema: Self) -> Self {
        if self.kind == SchemaType::Object {
            self.properties
                .get_or_insert_with(BTreeMap::new)
                .insert(name.into(), schema);
        }
        self
    }

    /// Mark a property as required (objects only; ignored otherwise).
    #[must_use]
    pub fn require(mut self, name: impl Into<String>) -> Self {
        if self.kind == SchemaType::Object {
            self.required.get_or_insert_with(Vec::new).push(name.into());
        }
        self
    }
}

/// Describes one tool: a unique name, free-form description, and the
/// parameter schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique tool name within a registry.
    pub name: String,
    /// Description shown to the model.
    pub description: String,
    /// Parameter schema.
    pub parameters: Schema,
}

impl ToolDescriptor {
    /// Create a new descriptor.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Schema,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_builder() {
        let schema = Schema::object()
            .property("city", Schema::string().describe("City name"))
            .property("days", Schema::integer())
            .require("city");

        let props = schema.properties.as_ref().unwrap();
        assert_eq!(props.len(), 2);
        assert_eq!(props["city"].kind, SchemaType::String);
        assert_eq!(schema.required.as_deref(), Some(&["city".to_string()][..]));
    }

    #[test]
    fn test_serde_shape() {
        let schema = Schema::object()
            .property("query", Schema::string())
            .require("query");
        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(json["type"], "object");
        assert_eq!(json["properties"]["query"]["type"], "string");
        assert_eq!(json["required"][0], "query");
    }

    #[test]
    fn test_array_items() {
        let schema = Schema::array(Schema::string());
        assert_eq!(schema.kind, SchemaType::Array);
        assert_eq!(schema.items.unwrap().kind, SchemaType::String);
    }

    #[test]
    fn test_property_ignored_on_non_objects() {
        let schema = Schema::string().property("x", Schema::integer()).require("x");
        assert!(schema.properties.is_none());
        assert!(schema.required.is_none());
    }
}
