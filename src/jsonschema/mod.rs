//! The JSON-Schema (OpenAPI v3) subset the engine accepts.
//!
//! Resource-definitions carry one of these documents under
//! `spec.versions[0].schema.openAPIV3Schema`; the synthesizer in
//! [`crate::schema::synthesis`] walks it to produce the relational schema.
//! Properties are kept in a `BTreeMap`, so traversal is lexicographic and
//! two semantically equal schemas always synthesize the same tables.

mod definition;
mod object_meta;

pub use definition::resource_definition_schema;
pub use object_meta::object_meta_schema;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// JSON-Schema value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    Array,
    Boolean,
    Integer,
    Number,
    Object,
    String,
}

impl fmt::Display for JsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Array => "array",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Object => "object",
            Self::String => "string",
        };
        f.write_str(name)
    }
}

/// `additionalProperties` is either a blanket boolean or an item schema;
/// only the schema form maps onto a key-value table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AdditionalProperties {
    Allowed(bool),
    Schema(Box<JsonSchemaProps>),
}

/// A JSON-Schema node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JsonSchemaProps {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<JsonType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, JsonSchemaProps>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<AdditionalProperties>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<JsonSchemaProps>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<i64>,
    /// Marks an object whose raw JSON encoding is stored alongside its
    /// structural columns.
    #[serde(
        rename = "x-kubernetes-embedded-resource",
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub x_embedded_resource: bool,
    /// Names the fields that jointly identify an entry of an object list.
    #[serde(
        rename = "x-kubernetes-list-map-keys",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub x_list_map_keys: Vec<String>,
}

impl JsonSchemaProps {
    /// A scalar node; an empty format means none.
    pub fn scalar(schema_type: JsonType, format: &str) -> Self {
        Self {
            schema_type: Some(schema_type),
            format: if format.is_empty() {
                None
            } else {
                Some(format.to_string())
            },
            ..Self::default()
        }
    }

    pub fn string() -> Self {
        Self::scalar(JsonType::String, "")
    }

    pub fn int64() -> Self {
        Self::scalar(JsonType::Integer, "int64")
    }

    /// An object node with the given properties and required names.
    pub fn object(properties: BTreeMap<String, JsonSchemaProps>, required: &[&str]) -> Self {
        Self {
            schema_type: Some(JsonType::Object),
            required: required.iter().map(|s| s.to_string()).collect(),
            properties,
            ..Self::default()
        }
    }

    /// An object node mapping free-form keys onto values of `items` shape.
    pub fn map_of(items: JsonSchemaProps) -> Self {
        Self {
            schema_type: Some(JsonType::Object),
            additional_properties: Some(AdditionalProperties::Schema(Box::new(items))),
            ..Self::default()
        }
    }

    /// An array node.
    pub fn array_of(items: JsonSchemaProps, max_items: Option<i64>) -> Self {
        Self {
            schema_type: Some(JsonType::Array),
            items: Some(Box::new(items)),
            max_items,
            ..Self::default()
        }
    }
}
