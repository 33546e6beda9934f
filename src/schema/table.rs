use crate::jsonschema::JsonType;

use super::column::{Column, PgType};
use super::constraint::Constraint;

/// Name of every primary-key column.
pub const PK_COLUMN: &str = "id";

/// Name of the embedded-resource document column.
pub const DATA_COLUMN: &str = "data";

/// A synthesized table: ordered columns, ordered constraints, and the
/// metadata relating its rows back to the document tree.
#[derive(Debug, Clone)]
pub struct Table {
    pub name: String,
    /// Short alias used inside generated SQL; unique within a schema.
    pub hint: String,
    /// JSON path from the document root at which this table's rows
    /// originate; empty for the root table.
    pub path: Vec<String>,
    /// True when each row belongs to a parent row via a foreign key.
    pub one_to_many: bool,
    /// True for additional-properties tables with `(key, value)` columns.
    pub kv: bool,
    pub columns: Vec<Column>,
    pub constraints: Vec<Constraint>,
}

impl Table {
    pub(crate) fn new(name: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            hint: hint.to_string(),
            path: Vec::new(),
            one_to_many: false,
            kv: false,
            columns: Vec::new(),
            constraints: Vec::new(),
        }
    }

    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Appends a column unless one with the same name already exists.
    pub fn add_column(&mut self, column: Column) {
        if self.get_column(&column.name).is_none() {
            self.columns.push(column);
        }
    }

    pub fn add_constraint(&mut self, constraint: Constraint) {
        if !self.constraints.contains(&constraint) {
            self.constraints.push(constraint);
        }
    }

    /// Serial bigint primary key for object tables.
    pub fn add_serial_pk(&mut self) {
        self.add_pk(PgType::Serial8);
    }

    /// Serial bigint primary key for one-to-many child tables.
    pub fn add_bigserial_pk(&mut self) {
        self.add_pk(PgType::BigSerial);
    }

    fn add_pk(&mut self, pg_type: PgType) {
        self.add_column(Column::raw(PK_COLUMN, pg_type, JsonType::Integer, false));
        self.add_constraint(Constraint::PrimaryKey {
            column: PK_COLUMN.to_string(),
        });
    }

    /// A bigint column referencing `ref_table`'s primary key.
    pub fn add_foreign_key(&mut self, column: &str, ref_table: &str, not_null: bool) {
        self.add_column(Column::raw(
            column,
            PgType::BigInt,
            JsonType::Object,
            not_null,
        ));
        self.add_constraint(Constraint::ForeignKey {
            column: column.to_string(),
            ref_table: ref_table.to_string(),
            ref_column: PK_COLUMN.to_string(),
        });
    }

    pub fn add_unique(&mut self, columns: Vec<String>) {
        self.add_constraint(Constraint::Unique { columns });
    }

    pub fn is_primary_key(&self, column: &str) -> bool {
        self.constraints
            .iter()
            .any(|c| matches!(c, Constraint::PrimaryKey { column: pk } if pk == column))
    }

    pub fn is_foreign_key(&self, column: &str) -> bool {
        self.foreign_key_table(column).is_some()
    }

    /// The table referenced by the foreign key held in `column`, if any.
    pub fn foreign_key_table(&self, column: &str) -> Option<&str> {
        self.constraints.iter().find_map(|c| match c {
            Constraint::ForeignKey {
                column: fk,
                ref_table,
                ..
            } if fk == column => Some(ref_table.as_str()),
            _ => None,
        })
    }

    /// Foreign-key constraints in declaration order.
    pub fn foreign_keys(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.constraints.iter().filter_map(|c| match c {
            Constraint::ForeignKey {
                column,
                ref_table,
                ref_column,
            } => Some((column.as_str(), ref_table.as_str(), ref_column.as_str())),
            _ => None,
        })
    }

    /// Columns that participate in `INSERT`: everything but the primary key.
    pub fn insert_columns(&self) -> Vec<&Column> {
        self.columns
            .iter()
            .filter(|c| !self.is_primary_key(&c.name))
            .collect()
    }

    /// Names of plain data columns: neither primary key nor foreign key.
    pub fn data_column_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| !self.is_primary_key(&c.name) && !self.is_foreign_key(&c.name))
            .map(|c| c.name.clone())
            .collect()
    }
}
