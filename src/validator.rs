//! The pluggable validation collaborator.
//!
//! The repository resolves the OpenAPI schema registered for a document's
//! GVK and hands both to the validator before anything is written. The
//! shipped implementation checks structure only: type agreement, required
//! properties, array bounds. Anything stricter can be swapped in.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Error;
use crate::jsonschema::{AdditionalProperties, JsonSchemaProps, JsonType};

#[async_trait]
pub trait Validator: Send + Sync {
    async fn validate(&self, schema: &JsonSchemaProps, document: &Value) -> Result<(), Error>;
}

/// Accepts every document; useful when validation happens elsewhere.
pub struct AcceptAll;

#[async_trait]
impl Validator for AcceptAll {
    async fn validate(&self, _schema: &JsonSchemaProps, _document: &Value) -> Result<(), Error> {
        Ok(())
    }
}

/// Structural validation against the registered schema.
pub struct StructuralValidator;

#[async_trait]
impl Validator for StructuralValidator {
    async fn validate(&self, schema: &JsonSchemaProps, document: &Value) -> Result<(), Error> {
        check(schema, document, &mut Vec::new())
    }
}

fn check(schema: &JsonSchemaProps, value: &Value, path: &mut Vec<String>) -> Result<(), Error> {
    let rendered = |path: &[String]| crate::error::path_string(path);

    // untyped nodes with properties are treated as objects; bare untyped
    // nodes constrain nothing
    let schema_type = match schema.schema_type {
        Some(t) => t,
        None if !schema.properties.is_empty() => JsonType::Object,
        None => return Ok(()),
    };

    let mismatch = |path: &[String]| {
        Err(Error::validation(format!(
            "expected {} at '{}'",
            schema_type,
            rendered(path)
        )))
    };

    match schema_type {
        JsonType::String => {
            if !value.is_string() {
                return mismatch(path);
            }
        }
        JsonType::Boolean => {
            if !value.is_boolean() {
                return mismatch(path);
            }
        }
        JsonType::Integer => {
            if value.as_i64().is_none() {
                return mismatch(path);
            }
        }
        JsonType::Number => {
            if !value.is_number() {
                return mismatch(path);
            }
        }
        JsonType::Array => {
            let Some(items) = value.as_array() else {
                return mismatch(path);
            };
            if let Some(max) = schema.max_items {
                if items.len() as i64 > max {
                    return Err(Error::validation(format!(
                        "more than {} items at '{}'",
                        max,
                        rendered(path)
                    )));
                }
            }
            if let Some(item_schema) = schema.items.as_deref() {
                for (index, item) in items.iter().enumerate() {
                    path.push(index.to_string());
                    check(item_schema, item, path)?;
                    path.pop();
                }
            }
        }
        JsonType::Object => {
            let Some(object) = value.as_object() else {
                return mismatch(path);
            };
            for required in &schema.required {
                if !object.contains_key(required) {
                    return Err(Error::validation(format!(
                        "required property '{}' is missing at '{}'",
                        required,
                        rendered(path)
                    )));
                }
            }
            for (name, property_schema) in &schema.properties {
                if let Some(property) = object.get(name) {
                    path.push(name.clone());
                    check(property_schema, property, path)?;
                    path.pop();
                }
            }
            if let Some(AdditionalProperties::Schema(item_schema)) =
                schema.additional_properties.as_ref()
            {
                for (name, property) in object {
                    path.push(name.clone());
                    check(item_schema, property, path)?;
                    path.pop();
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn schema() -> JsonSchemaProps {
        serde_json::from_value(json!({
            "type": "object",
            "properties": {
                "spec": {
                    "type": "object",
                    "required": ["simple"],
                    "properties": {
                        "simple": {"type": "string"},
                        "replicas": {"type": "integer"},
                        "labels": {
                            "type": "object",
                            "additionalProperties": {"type": "string"}
                        },
                        "tags": {"type": "array", "maxItems": 2, "items": {"type": "string"}}
                    }
                }
            }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn accepts_conforming_documents() {
        let document = json!({
            "spec": {
                "simple": "ok",
                "replicas": 2,
                "labels": {"app": "x"},
                "tags": ["a", "b"]
            },
            "unknown": "ignored"
        });
        assert!(StructuralValidator
            .validate(&schema(), &document)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn rejects_type_mismatches() {
        let document = json!({"spec": {"simple": 42}});
        let error = StructuralValidator
            .validate(&schema(), &document)
            .await
            .unwrap_err();
        assert!(error.to_string().contains("spec.simple"));
    }

    #[tokio::test]
    async fn rejects_missing_required_properties() {
        let document = json!({"spec": {"replicas": 2}});
        assert!(StructuralValidator
            .validate(&schema(), &document)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn rejects_oversized_arrays_and_bad_map_values() {
        let long = json!({"spec": {"simple": "ok", "tags": ["a", "b", "c"]}});
        assert!(StructuralValidator.validate(&schema(), &long).await.is_err());

        let bad_map = json!({"spec": {"simple": "ok", "labels": {"app": 7}}});
        assert!(StructuralValidator
            .validate(&schema(), &bad_map)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn accept_all_accepts_everything() {
        let document = json!({"spec": {"simple": 42}});
        assert!(AcceptAll.validate(&schema(), &document).await.is_ok());
    }
}
