//! Reassembly of nested documents from a result set.
//!
//! The root table's primary keys drive the rebuild: one document per id.
//! Foreign-key columns are replaced by the recursively built child object.
//! One-to-many children are gathered by their parent foreign-key value and
//! placed under the last segment of the child table's path, as a map for
//! key-value tables and as an ordered list otherwise. Columns that read back
//! SQL NULL are omitted, so documents return in their original shape.

use serde_json::Value;

use crate::db::result_set::ResultSet;
use crate::error::Error;
use crate::schema::{PgType, Schema, Table, DATA_COLUMN};

use super::Entry;

pub struct Assembler<'a> {
    schema: &'a Schema,
    rs: &'a ResultSet,
}

impl<'a> Assembler<'a> {
    pub fn new(schema: &'a Schema, rs: &'a ResultSet) -> Self {
        Self { schema, rs }
    }

    /// One document per root-table row, in result order.
    pub fn build(&self) -> Result<Vec<Value>, Error> {
        let root = self.schema.get_table(self.schema.name())?;
        let embedded = root
            .get_column(DATA_COLUMN)
            .map(|c| c.pg_type == PgType::Jsonb)
            .unwrap_or(false);

        let mut documents = Vec::new();
        for pk in self.rs.get_column(&root.name, crate::schema::PK_COLUMN) {
            let pk = pk
                .as_i64()
                .ok_or_else(|| Error::internal("root primary key is not an integer"))?;
            let entry = self.object(&root.name, pk)?;

            // an embedded resource returns the stored raw document itself
            let stored = if embedded {
                entry.get(DATA_COLUMN).and_then(Value::as_object).cloned()
            } else {
                None
            };
            let document = match stored {
                Some(raw) => Value::Object(raw),
                None => Value::Object(entry),
            };
            documents.push(document);
        }
        Ok(documents)
    }

    /// Builds the object stored as `(table, pk)`, recursing through
    /// one-to-one references and gathering one-to-many children.
    fn object(&self, table_name: &str, pk: i64) -> Result<Entry, Error> {
        let table = self.schema.get_table(table_name)?;
        let entry = self.rs.get_pk(table_name, pk)?;

        let mut assembled = Entry::new();
        for column in &table.columns {
            if table.is_primary_key(&column.name) {
                continue;
            }
            let value = entry.get(&column.name).cloned().unwrap_or(Value::Null);

            if let Some(child_table) = table.foreign_key_table(&column.name) {
                // one-to-one: the key becomes the nested document
                if let Some(child_pk) = value.as_i64() {
                    assembled.insert(
                        column.name.clone(),
                        Value::Object(self.object(child_table, child_pk)?),
                    );
                }
                continue;
            }
            if !value.is_null() {
                assembled.insert(column.name.clone(), value);
            }
        }

        for child in self.schema.one_to_many_tables(table_name) {
            let property = child.path.last().ok_or_else(|| {
                Error::internal(format!("one-to-many table '{}' has no path", child.name))
            })?;
            if child.kv {
                let map = self.key_value(child, table_name, pk);
                if !map.is_empty() {
                    assembled.insert(property.clone(), Value::Object(map));
                }
            } else {
                let items = self.slice(child, table_name, pk);
                if !items.is_empty() {
                    assembled.insert(property.clone(), Value::Array(items));
                }
            }
        }
        Ok(assembled)
    }

    /// Gathers a key-value child's rows into a map.
    fn key_value(&self, child: &Table, parent: &str, pk: i64) -> Entry {
        let mut map = Entry::new();
        for row in self.rs.get(&child.name, parent, &Value::from(pk)) {
            let Some(key) = row.get("key").and_then(Value::as_str) else {
                continue;
            };
            let Some(value) = row.get("value") else {
                continue;
            };
            map.insert(key.to_string(), value.clone());
        }
        map
    }

    /// Gathers a one-to-many child's rows into an ordered list of row maps,
    /// stripped down to plain data columns.
    fn slice(&self, child: &Table, parent: &str, pk: i64) -> Vec<Value> {
        let columns = child.data_column_names();
        self.rs
            .get(&child.name, parent, &Value::from(pk))
            .into_iter()
            .map(|row| Value::Object(ResultSet::strip(row, &columns)))
            .collect()
    }
}
