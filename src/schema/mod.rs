//! The relational schema model: a [`Schema`] holds the tables synthesized
//! for one resource kind, ordered so that creation and insertion can walk
//! them front to back without dependency violations. One-to-one child tables
//! are prepended (they must exist before the table holding a foreign key to
//! them), one-to-many child tables are appended (they hold the foreign key
//! back to their parent).

mod column;
mod constraint;
mod table;

pub mod synthesis;

pub use column::{column_type, Column, PgType};
pub use constraint::Constraint;
pub use table::{Table, DATA_COLUMN, PK_COLUMN};

use crate::error::Error;
use crate::jsonschema::{object_meta_schema, JsonSchemaProps};

use self::synthesis::Synthesizer;

/// What a newly synthesized table needs in order to hang off its parent.
#[derive(Debug, Clone, Default)]
pub struct Relationship {
    /// JSON path of the table's rows in the original document.
    pub path: Vec<String>,
    /// Foreign keys back to the parent: `(column, referenced table)` pairs.
    pub foreign_keys: Vec<(String, String)>,
    pub one_to_many: bool,
    pub kv: bool,
}

/// The group of tables required to store one resource kind.
#[derive(Debug, Clone)]
pub struct Schema {
    name: String,
    tables: Vec<Table>,
}

impl Schema {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_lowercase(),
            tables: Vec::new(),
        }
    }

    /// The schema name; also the name of the root table.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Derives a child table name from the schema name.
    pub fn table_name(&self, suffix: &str) -> String {
        format!("{}_{}", self.name, suffix).to_lowercase()
    }

    /// Populates the schema from an OpenAPI v3 schema. The built-in object
    /// metadata schema is injected under the `metadata` property, so every
    /// stored resource is addressable by namespace and name.
    pub fn generate(&mut self, openapi: &JsonSchemaProps) -> Result<(), Error> {
        let mut root = openapi.clone();
        root.properties
            .insert("metadata".to_string(), object_meta_schema());
        let name = self.name.clone();
        Synthesizer::new(self).parse(&name, Relationship::default(), &root)
    }

    /// Derives the alias for a table name: the first letter of each
    /// underscore-separated segment. Collisions append the smallest free
    /// integer, so hints stay unique for the schema's lifetime.
    fn hint_for(&self, table_name: &str) -> String {
        let base: String = table_name
            .split('_')
            .filter(|s| !s.is_empty())
            .filter_map(|s| s.chars().next())
            .collect::<String>()
            .to_lowercase();
        let taken = |hint: &str| self.tables.iter().any(|t| t.hint == hint);
        if !taken(&base) {
            return base;
        }
        let mut n = 2;
        loop {
            let candidate = format!("{base}{n}");
            if !taken(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Returns the existing table with this name, or creates it: prepended
    /// by default so referenced tables precede their referrers, appended for
    /// one-to-many children so they follow their parent.
    pub(crate) fn table_factory(&mut self, table_name: &str, append: bool) -> &mut Table {
        let table_name = table_name.to_lowercase();
        if let Some(position) = self.tables.iter().position(|t| t.name == table_name) {
            return &mut self.tables[position];
        }
        let hint = self.hint_for(&table_name);
        let table = Table::new(&table_name, &hint);
        if append {
            self.tables.push(table);
            self.tables.last_mut().expect("table was just appended")
        } else {
            self.tables.insert(0, table);
            &mut self.tables[0]
        }
    }

    pub fn get_table(&self, table_name: &str) -> Result<&Table, Error> {
        let table_name = table_name.to_lowercase();
        self.tables
            .iter()
            .find(|t| t.name == table_name)
            .ok_or(Error::UnknownTable { name: table_name })
    }

    pub(crate) fn get_table_mut(&mut self, table_name: &str) -> Result<&mut Table, Error> {
        let table_name = table_name.to_lowercase();
        self.tables
            .iter_mut()
            .find(|t| t.name == table_name)
            .ok_or(Error::UnknownTable { name: table_name })
    }

    /// The table whose rows originate at `path`, if any.
    pub fn get_table_by_path(&self, path: &[String]) -> Option<&Table> {
        self.tables.iter().find(|t| t.path == path)
    }

    pub fn has_one_to_many(&self, path: &[String]) -> bool {
        self.get_table_by_path(path)
            .map(|t| t.one_to_many)
            .unwrap_or(false)
    }

    pub fn is_kv(&self, path: &[String]) -> bool {
        self.get_table_by_path(path).map(|t| t.kv).unwrap_or(false)
    }

    /// Tables in dependency-safe insertion order.
    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn tables_reversed(&self) -> impl Iterator<Item = &Table> {
        self.tables.iter().rev()
    }

    /// Child tables holding a one-to-many foreign key into `table_name`.
    pub fn one_to_many_tables(&self, table_name: &str) -> Vec<&Table> {
        self.tables
            .iter()
            .filter(|t| t.name != table_name)
            .filter(|t| {
                t.foreign_keys()
                    .any(|(column, ref_table, _)| column == table_name && ref_table == table_name)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jsonschema::JsonType;

    #[test]
    fn factory_prepends_by_default_and_appends_one_to_many() {
        let mut schema = Schema::new("cr");
        schema.table_factory("cr", false);
        schema.table_factory("cr_spec", false);
        schema.table_factory("cr_spec_ports", true);

        let names: Vec<&str> = schema.tables().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["cr_spec", "cr", "cr_spec_ports"]);

        // existing tables are returned, not recreated
        schema.table_factory("cr", false);
        assert_eq!(schema.tables().len(), 3);
    }

    #[test]
    fn reversed_iteration() {
        let mut schema = Schema::new("cr");
        schema.table_factory("cr", false);
        schema.table_factory("cr_spec", false);

        let reversed: Vec<&str> = schema.tables_reversed().map(|t| t.name.as_str()).collect();
        assert_eq!(reversed, vec!["cr", "cr_spec"]);
    }

    #[test]
    fn lookups_do_not_create() {
        let schema = Schema::new("cr");
        assert!(matches!(
            schema.get_table("missing"),
            Err(Error::UnknownTable { .. })
        ));
        assert!(schema.get_table_by_path(&["spec".to_string()]).is_none());
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let mut schema = Schema::new("v1_CustomResourceDefinition");
        schema.table_factory("v1_customresourcedefinition", false);
        assert!(schema.get_table("v1_CustomResourceDefinition").is_ok());
    }

    #[test]
    fn hints_are_unique() {
        let mut schema = Schema::new("cr");
        schema.table_factory("cr_spec", false);
        schema.table_factory("cr_status", false);
        schema.table_factory("cr_sidecars", true);

        let hints: Vec<&str> = schema.tables().iter().map(|t| t.hint.as_str()).collect();
        assert_eq!(hints, vec!["cs2", "cs", "cs3"]);
        let unique: std::collections::HashSet<&&str> = hints.iter().collect();
        assert_eq!(unique.len(), hints.len());
    }

    #[test]
    fn one_to_many_enumeration() {
        let mut schema = Schema::new("cr");
        schema.table_factory("cr", false).add_serial_pk();
        {
            let ports = schema.table_factory("cr_ports", true);
            ports.add_bigserial_pk();
            ports.add_foreign_key("cr", "cr", true);
            ports.one_to_many = true;
        }
        {
            let spec = schema.table_factory("cr_spec", false);
            spec.add_serial_pk();
            spec.add_column(Column::raw("x", PgType::Text, JsonType::String, false));
        }

        let children = schema.one_to_many_tables("cr");
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].name, "cr_ports");
    }
}
