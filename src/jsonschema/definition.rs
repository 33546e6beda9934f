use std::collections::BTreeMap;

use super::JsonSchemaProps;

/// The meta-schema describing resource-definition documents themselves.
///
/// Definitions are stored like any other resource, but their root table is
/// marked as an embedded resource: alongside the structural columns it keeps
/// the complete raw document in a `data` column, because the interesting part
/// of a definition (the schema it registers) is not worth flattening.
pub fn resource_definition_schema() -> JsonSchemaProps {
    let mut properties = BTreeMap::new();
    properties.insert("apiVersion".to_string(), JsonSchemaProps::string());
    properties.insert("kind".to_string(), JsonSchemaProps::string());

    JsonSchemaProps {
        x_embedded_resource: true,
        ..JsonSchemaProps::object(properties, &["apiVersion", "kind"])
    }
}
