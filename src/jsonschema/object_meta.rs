use std::collections::BTreeMap;

use super::{JsonSchemaProps, JsonType};

fn date_time() -> JsonSchemaProps {
    JsonSchemaProps::scalar(JsonType::String, "date-time")
}

/// `ObjectMeta.managedFields`: one entry per field manager.
fn managed_fields() -> JsonSchemaProps {
    let mut properties = BTreeMap::new();
    properties.insert("apiVersion".to_string(), JsonSchemaProps::string());
    properties.insert("manager".to_string(), JsonSchemaProps::string());
    properties.insert("operation".to_string(), JsonSchemaProps::string());
    properties.insert("time".to_string(), date_time());
    JsonSchemaProps::array_of(JsonSchemaProps::object(properties, &[]), None)
}

/// `ObjectMeta.ownerReferences`: one entry per owning resource.
fn owner_references() -> JsonSchemaProps {
    let mut properties = BTreeMap::new();
    properties.insert("apiVersion".to_string(), JsonSchemaProps::string());
    properties.insert(
        "blockOwnerDeletion".to_string(),
        JsonSchemaProps::scalar(JsonType::Boolean, ""),
    );
    properties.insert(
        "controller".to_string(),
        JsonSchemaProps::scalar(JsonType::Boolean, ""),
    );
    properties.insert("kind".to_string(), JsonSchemaProps::string());
    properties.insert("name".to_string(), JsonSchemaProps::string());
    properties.insert("uid".to_string(), JsonSchemaProps::string());
    JsonSchemaProps::array_of(JsonSchemaProps::object(properties, &[]), None)
}

/// The built-in metadata schema injected into every registered kind.
///
/// `namespace` and `name` are both required and listed as list-map keys,
/// which synthesizes a composite unique constraint on the metadata table:
/// the namespaced name is the identity of a stored resource, and no two
/// rows may share it. Labels and annotations are free-form string maps,
/// which synthesize into key-value child tables and make label filtering
/// possible on `list`; owner references and managed fields become
/// one-to-many children.
pub fn object_meta_schema() -> JsonSchemaProps {
    let mut properties = BTreeMap::new();
    properties.insert("name".to_string(), JsonSchemaProps::string());
    properties.insert("generateName".to_string(), JsonSchemaProps::string());
    properties.insert("namespace".to_string(), JsonSchemaProps::string());
    properties.insert("selfLink".to_string(), JsonSchemaProps::string());
    properties.insert("uid".to_string(), JsonSchemaProps::string());
    properties.insert("resourceVersion".to_string(), JsonSchemaProps::string());
    properties.insert("generation".to_string(), JsonSchemaProps::int64());
    properties.insert("creationTimestamp".to_string(), JsonSchemaProps::string());
    properties.insert("deletionTimestamp".to_string(), date_time());
    properties.insert(
        "deletionGracePeriodSeconds".to_string(),
        JsonSchemaProps::int64(),
    );
    properties.insert(
        "labels".to_string(),
        JsonSchemaProps::map_of(JsonSchemaProps::string()),
    );
    properties.insert(
        "annotations".to_string(),
        JsonSchemaProps::map_of(JsonSchemaProps::string()),
    );
    properties.insert(
        "finalizers".to_string(),
        JsonSchemaProps::array_of(JsonSchemaProps::string(), None),
    );
    properties.insert("clusterName".to_string(), JsonSchemaProps::string());
    properties.insert("managedFields".to_string(), managed_fields());
    properties.insert("ownerReferences".to_string(), owner_references());

    let keys = ["namespace", "name"];
    JsonSchemaProps {
        x_list_map_keys: keys.iter().map(|k| k.to_string()).collect(),
        ..JsonSchemaProps::object(properties, &keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_fields_are_required_and_unique() {
        let schema = object_meta_schema();
        assert_eq!(schema.schema_type, Some(JsonType::Object));
        assert_eq!(
            schema.required,
            vec!["namespace".to_string(), "name".to_string()]
        );
        assert_eq!(
            schema.x_list_map_keys,
            vec!["namespace".to_string(), "name".to_string()]
        );
    }

    #[test]
    fn carries_the_full_field_set() {
        let schema = object_meta_schema();
        for field in ["labels", "annotations", "managedFields", "ownerReferences"] {
            assert!(schema.properties.contains_key(field), "{field}");
        }
        let owners = &schema.properties["ownerReferences"];
        assert_eq!(owners.schema_type, Some(JsonType::Array));
        let items = owners.items.as_deref().unwrap();
        assert!(items.properties.contains_key("blockOwnerDeletion"));
    }
}
