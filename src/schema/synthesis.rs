//! Recursive translation of a JSON-Schema into the relational schema model.
//!
//! Objects with `properties` become tables; a nested object hangs off its
//! parent as a one-to-one relationship (the parent holds a unique foreign
//! key to the child table). Objects with `additionalProperties` become
//! key-value child tables, arrays of objects become one-to-many child tables
//! (both hold the foreign key back to the parent), and scalars become
//! columns. Property traversal is lexicographic, so semantically equal
//! schemas always synthesize identical table sets.

use std::collections::BTreeMap;

use log::debug;

use crate::error::Error;
use crate::jsonschema::{AdditionalProperties, JsonSchemaProps, JsonType};

use super::column::{Column, PgType};
use super::table::DATA_COLUMN;
use super::{Relationship, Schema};

pub struct Synthesizer<'a> {
    schema: &'a mut Schema,
}

impl<'a> Synthesizer<'a> {
    pub fn new(schema: &'a mut Schema) -> Self {
        Self { schema }
    }

    /// Builds the synthetic `(key, value)` schema a key-value table is
    /// synthesized from. Keys are always text; the value column follows the
    /// additional-properties item type.
    fn expand_additional_properties(item: &JsonSchemaProps, item_type: JsonType) -> JsonSchemaProps {
        let mut properties = BTreeMap::new();
        properties.insert("key".to_string(), JsonSchemaProps::string());
        properties.insert(
            "value".to_string(),
            JsonSchemaProps::scalar(item_type, item.format.as_deref().unwrap_or("")),
        );
        JsonSchemaProps::object(properties, &["key", "value"])
    }

    /// An object-typed property: either a one-to-one child table reached
    /// through a unique foreign key on the current table, or a key-value
    /// child table when the node declares `additionalProperties`.
    fn object(
        &mut self,
        table_name: &str,
        column_name: &str,
        not_null: bool,
        parent_path: &[String],
        node: &JsonSchemaProps,
    ) -> Result<(), Error> {
        let mut path = parent_path.to_vec();
        path.push(column_name.to_string());
        let child_table = format!("{table_name}_{column_name}").to_lowercase();
        let has_properties = !node.properties.is_empty();

        match &node.additional_properties {
            None if !has_properties => Err(Error::synthesis(
                &path,
                "object node declares neither properties nor additionalProperties",
            )),
            Some(_) if has_properties => Err(Error::synthesis(
                &path,
                "object node declares both properties and additionalProperties",
            )),
            None => {
                debug!("one-to-one: '{table_name}' gets a unique foreign key to '{child_table}'");
                let table = self.schema.get_table_mut(table_name)?;
                if table.get_column(column_name).is_none() {
                    table.add_foreign_key(column_name, &child_table, not_null);
                    table.add_unique(vec![column_name.to_string()]);
                }
                let relationship = Relationship {
                    path,
                    ..Relationship::default()
                };
                self.parse(&child_table, relationship, node)
            }
            Some(AdditionalProperties::Allowed(_)) => Err(Error::synthesis(
                &path,
                "boolean additionalProperties is unsupported",
            )),
            Some(AdditionalProperties::Schema(item)) => {
                let item_type = item.schema_type.ok_or_else(|| {
                    Error::synthesis(&path, "additionalProperties item lacks a type")
                })?;
                debug!("key-value: expanding '{child_table}' as a one-to-many child of '{table_name}'");
                let expanded = Self::expand_additional_properties(item, item_type);
                let relationship = Relationship {
                    path,
                    foreign_keys: vec![(table_name.to_string(), table_name.to_string())],
                    one_to_many: true,
                    kv: true,
                };
                self.parse(&child_table, relationship, &expanded)
            }
        }
    }

    /// An array-typed property: a one-to-many child table for object items,
    /// a scalar-array column otherwise.
    fn array(
        &mut self,
        table_name: &str,
        column_name: &str,
        not_null: bool,
        parent_path: &[String],
        node: &JsonSchemaProps,
    ) -> Result<(), Error> {
        let mut path = parent_path.to_vec();
        path.push(column_name.to_string());
        let items = node
            .items
            .as_deref()
            .ok_or_else(|| Error::synthesis(&path, "array node lacks an item schema"))?;

        match items.schema_type {
            Some(JsonType::Object) => {
                let child_table = format!("{table_name}_{column_name}").to_lowercase();
                debug!("array of objects: '{child_table}' becomes a one-to-many child of '{table_name}'");
                let relationship = Relationship {
                    path,
                    foreign_keys: vec![(table_name.to_string(), table_name.to_string())],
                    one_to_many: true,
                    kv: false,
                };
                self.parse(&child_table, relationship, items)
            }
            Some(item_type) => {
                let column = Column::new_array(
                    &path,
                    column_name,
                    item_type,
                    items.format.as_deref(),
                    node.max_items,
                    not_null,
                )?;
                self.schema.get_table_mut(table_name)?.add_column(column);
                Ok(())
            }
            None => Err(Error::synthesis(&path, "array item lacks a type")),
        }
    }

    fn column(
        &mut self,
        table_name: &str,
        column_name: &str,
        not_null: bool,
        parent_path: &[String],
        json_type: JsonType,
        node: &JsonSchemaProps,
    ) -> Result<(), Error> {
        let mut path = parent_path.to_vec();
        path.push(column_name.to_string());
        let column = Column::new(
            &path,
            column_name,
            json_type,
            node.format.as_deref(),
            not_null,
        )?;
        self.schema.get_table_mut(table_name)?.add_column(column);
        Ok(())
    }

    /// Materializes `table_name` for the given node and recurses into its
    /// properties.
    pub fn parse(
        &mut self,
        table_name: &str,
        relationship: Relationship,
        node: &JsonSchemaProps,
    ) -> Result<(), Error> {
        debug!(
            "table '{}' at path '{}' (one_to_many={}, kv={})",
            table_name,
            crate::error::path_string(&relationship.path),
            relationship.one_to_many,
            relationship.kv
        );

        let table = self.schema.table_factory(table_name, relationship.one_to_many);
        if relationship.one_to_many {
            table.add_bigserial_pk();
        } else {
            table.add_serial_pk();
        }
        table.path = relationship.path.clone();
        table.one_to_many = relationship.one_to_many;
        table.kv = relationship.kv;
        for (column, ref_table) in &relationship.foreign_keys {
            table.add_foreign_key(column, ref_table, true);
        }
        if relationship.kv {
            // key uniqueness holds per parent row, not across the table
            if let Some((parent_column, _)) = relationship.foreign_keys.first() {
                table.add_unique(vec![parent_column.clone(), "key".to_string()]);
            }
        }
        if node.x_embedded_resource {
            table.add_column(Column::raw(
                DATA_COLUMN,
                PgType::Jsonb,
                JsonType::Object,
                false,
            ));
        }
        if !node.x_list_map_keys.is_empty() {
            table.add_unique(node.x_list_map_keys.clone());
        }
        let table_name = table.name.clone();

        for (name, property) in &node.properties {
            let not_null = node.required.contains(name);
            match property.schema_type {
                Some(JsonType::Object) => {
                    self.object(&table_name, name, not_null, &relationship.path, property)?
                }
                Some(JsonType::Array) => {
                    self.array(&table_name, name, not_null, &relationship.path, property)?
                }
                Some(scalar) => {
                    self.column(&table_name, name, not_null, &relationship.path, scalar, property)?
                }
                None => {
                    let mut path = relationship.path.clone();
                    path.push(name.clone());
                    return Err(Error::synthesis(&path, "property lacks a type"));
                }
            }
        }
        Ok(())
    }
}
